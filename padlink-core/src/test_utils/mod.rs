//! Test utilities and helpers for PadLink
//!
//! Recording delegates, timeout helpers and fixtures shared by unit and
//! integration tests. Built for this crate's own tests and behind the
//! `test-utils` feature.

pub mod async_helpers;
pub mod fixtures;
pub mod recording;

pub use async_helpers::*;
pub use fixtures::*;
pub use recording::*;
