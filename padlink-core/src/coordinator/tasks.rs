//! Owned background tasks with cooperative cancellation

use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Cancellation signal handed to a spawned task
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Resolve once the owning handle cancels (or is dropped)
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}

/// Handle to a spawned task; cancelling or dropping it stops the task
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    cancel_tx: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Spawn `task` on the current runtime, giving it its cancellation token
    pub fn spawn<F, Fut>(name: &'static str, task: F) -> Self
    where
        F: FnOnce(CancelToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, rx) = watch::channel(false);
        let join = tokio::spawn(task(CancelToken { rx }));

        Self {
            name,
            cancel_tx,
            join: Some(join),
        }
    }

    /// Signal the task to stop at its next suspension point
    pub fn cancel(&self) {
        if !*self.cancel_tx.borrow() {
            debug!(task = self.name, "Cancelling task");
            self.cancel_tx.send_replace(true);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel the task and wait until it has exited
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                if e.is_panic() {
                    error!(task = self.name, "Task panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Set of tasks owned by one scope
#[derive(Debug, Default)]
pub struct TaskSet {
    tasks: Vec<TaskHandle>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: TaskHandle) {
        self.tasks.push(task);
    }

    /// Number of tasks held, finished or not
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of held tasks that are still running
    pub fn running(&self) -> usize {
        self.tasks.iter().filter(|task| !task.is_finished()).count()
    }

    /// Cancel and release every task
    pub fn cancel_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.cancel();
        }
    }
}
