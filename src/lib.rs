//! fritz-capture: traffic accounting for a live packet-capture feed
//!
//! Capture lines are parsed into classified packets, buffered into reporting
//! windows, compacted into per-flow aggregates and written out as:
//! - an append-only monthly CSV of flow aggregates
//! - additive hourly, daily and monthly JSON rollups keyed by local and remote IP
//! - a leased, disk-persisted reverse-DNS cache for local addresses

pub mod capture;
pub mod cli;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod resolver;

pub use error::{CaptureError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
