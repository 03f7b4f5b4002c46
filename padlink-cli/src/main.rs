use anyhow::{bail, Context, Result};
use clap::Parser;
use padlink_core::config::Config;
use padlink_core::coordinator::{CoordinatorError, SessionCoordinator, SessionDelegate};
use padlink_core::envelope::{ControllerEvent, Envelope, Payload};
use padlink_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use padlink_core::loopback::LoopbackCall;
use padlink_core::metrics::init_metrics;
use padlink_core::AppVersion;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "padlink")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Configuration file (TOML); PADLINK_* environment variables still apply
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run controller peers on an in-memory call and exchange button presses
    Demo {
        /// Number of participants in the call
        #[arg(long, default_value_t = 2)]
        peers: usize,

        /// Button presses sent by the host
        #[arg(long, default_value_t = 3)]
        presses: usize,
    },
    /// Write the default configuration to a file
    InitConfig {
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the version announced to other participants
    Version,
}

/// Delegate that logs every callback and counts controller events
struct LoggingDelegate {
    name: String,
    events_received: AtomicUsize,
}

impl LoggingDelegate {
    fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            events_received: AtomicUsize::new(0),
        })
    }

    fn events_received(&self) -> usize {
        self.events_received.load(Ordering::SeqCst)
    }
}

impl SessionDelegate for LoggingDelegate {
    fn did_connect(&self) {
        info!(peer = %self.name, "Connected");
    }

    fn did_disconnect(&self) {
        info!(peer = %self.name, "Disconnected");
    }

    fn participants_changed(&self, count: usize) {
        info!(peer = %self.name, count, "Participants changed");
    }

    fn session_status(&self, status: &str) {
        info!(peer = %self.name, status, "Session status");
    }

    fn update_message(&self, envelope: &Envelope) {
        if envelope.payload().is_event() {
            self.events_received.fetch_add(1, Ordering::SeqCst);
        }
        info!(peer = %self.name, "Received {}", envelope);
    }

    fn report_error(&self, error: &CoordinatorError) {
        warn!(peer = %self.name, %error, "Session error");
    }
}

struct DemoPeer {
    coordinator: SessionCoordinator,
    delegate: Arc<LoggingDelegate>,
}

#[derive(Debug, PartialEq, Eq)]
struct DemoSummary {
    events_sent: usize,
    events_received: Vec<usize>,
}

async fn wait_for(what: &str, limit: Duration, mut done: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + limit;
    while !done() {
        if tokio::time::Instant::now() >= deadline {
            bail!("timed out after {:?} waiting for {}", limit, what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

fn demo_events(presses: usize) -> Vec<Payload> {
    let mut events = vec![Payload::from(ControllerEvent::ControllerIdentified(
        "PadLink Demo Pad".to_string(),
    ))];

    for press in 0..presses {
        let (down, up) = match press % 4 {
            0 => (
                ControllerEvent::ButtonAChanged { value: 1.0, pressed: true },
                ControllerEvent::ButtonAChanged { value: 0.0, pressed: false },
            ),
            1 => (
                ControllerEvent::ButtonBChanged { value: 1.0, pressed: true },
                ControllerEvent::ButtonBChanged { value: 0.0, pressed: false },
            ),
            2 => (
                ControllerEvent::LeftPadChanged { x: -1.0, y: 0.5 },
                ControllerEvent::LeftPadChanged { x: 0.0, y: 0.0 },
            ),
            _ => (
                ControllerEvent::RightPadChanged { x: 0.25, y: 1.0 },
                ControllerEvent::RightPadChanged { x: 0.0, y: 0.0 },
            ),
        };
        events.push(down.into());
        events.push(up.into());
    }

    events
}

/// Run `peers` coordinators on one loopback call; the first one hosts
async fn run_demo(config: &Config, peers: usize, presses: usize) -> Result<DemoSummary> {
    if peers < 2 {
        bail!("a demo needs at least two peers, got {}", peers);
    }

    let call = LoopbackCall::new();
    let activity = config.activity.descriptor();

    let mut demo_peers = Vec::with_capacity(peers);
    for index in 0..peers {
        let delegate = LoggingDelegate::new(format!("peer-{}", index));
        let coordinator = SessionCoordinator::new(
            activity.clone(),
            call.add_device(),
            delegate.clone(),
            config.session.clone(),
        );
        coordinator.begin_waiting_for_sessions()?;
        demo_peers.push(DemoPeer {
            coordinator,
            delegate,
        });
    }

    let host = &demo_peers[0];
    host.coordinator.activate().await;
    wait_for("all peers to join", Duration::from_secs(5), || {
        call.participant_count() == peers
    })
    .await?;
    info!(peers, activity = %activity.identifier, "All peers joined");

    let events = demo_events(presses);
    for event in &events {
        host.coordinator.send(event.clone()).await;
    }

    let guests = &demo_peers[1..];
    wait_for("guests to receive every event", Duration::from_secs(5), || {
        guests
            .iter()
            .all(|peer| peer.delegate.events_received() >= events.len())
    })
    .await?;

    let summary = DemoSummary {
        events_sent: events.len(),
        events_received: guests
            .iter()
            .map(|peer| peer.delegate.events_received())
            .collect(),
    };

    // Guests leave first so the host is the last participant and ends it.
    for peer in demo_peers.iter().rev() {
        peer.coordinator.leave_session().await;
    }
    wait_for("the session to end", Duration::from_secs(5), || {
        !call.has_live_session()
    })
    .await
    .context("host leaving last should end the session")?;

    Ok(summary)
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    Config::default()
        .save_to_file(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env()?;

    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let mut log_config = LogConfig::try_from(&config.logging)?;
    if matches!(args.command, Some(Command::Demo { .. })) {
        log_config = log_config.target_level("padlink_core::loopback", LogLevel::Warn);
    }
    init_logging_with_config(log_config)?;
    init_metrics();

    info!("PadLink CLI started");

    match args.command {
        Some(Command::Demo { peers, presses }) => {
            let summary = run_demo(&config, peers, presses).await?;
            info!(
                sent = summary.events_sent,
                received = ?summary.events_received,
                "Demo finished"
            );
        }
        Some(Command::InitConfig { path, force }) => {
            init_config(&path, force)?;
            info!(path = %path.display(), "Wrote default configuration");
        }
        Some(Command::Version) => {
            println!("{}", AppVersion::current());
        }
        None => {
            info!("No command specified. Use --help for usage information.");
        }
    }

    info!("PadLink CLI finished");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_demo_delivers_every_event_to_every_guest() {
        let summary = run_demo(&Config::default(), 3, 2).await.unwrap();

        assert_eq!(summary.events_sent, 5);
        assert_eq!(summary.events_received, vec![5, 5]);
    }

    #[tokio::test]
    async fn test_demo_with_version_announcement_counts_only_events() {
        let mut config = Config::default();
        config.session.announce_version = true;

        let summary = run_demo(&config, 2, 1).await.unwrap();
        assert_eq!(summary.events_received, vec![3]);
    }

    #[tokio::test]
    async fn test_demo_rejects_single_peer() {
        assert!(run_demo(&Config::default(), 1, 1).await.is_err());
    }

    #[test]
    fn test_demo_events_alternate_controls() {
        let events = demo_events(4);
        assert_eq!(events.len(), 9);
        assert!(events.iter().all(Payload::is_event));
    }

    #[test]
    fn test_init_config_round_trips_and_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("padlink.toml");

        init_config(&path, false).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), Config::default());

        assert!(init_config(&path, false).is_err());
        init_config(&path, true).unwrap();
    }

    #[test]
    fn test_cli_flags_override_config() {
        let args = Args::parse_from(["padlink", "--log-level", "debug", "--json-logs", "version"]);
        let config = load_config(&args).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert!(matches!(args.command, Some(Command::Version)));
    }
}
