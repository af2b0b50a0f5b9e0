use crate::{CaptureError, Result};
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Subdirectory of the web root receiving all report files
pub const DATA_DIR: &str = "data";

#[derive(Parser, Debug)]
#[command(name = "fritz-capture")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Aggregates a packet-capture stream from stdin into traffic reports",
    long_about = None
)]
pub struct Cli {
    #[arg(
        long,
        env = "WWW_ROOT",
        default_value = ".",
        help = "Base directory, reports go to <WWW_ROOT>/data"
    )]
    pub www_root: PathBuf,

    #[arg(
        long,
        env = "DNS_SERVER",
        default_value = "192.168.2.1",
        help = "DNS server used for reverse lookups of local hosts"
    )]
    pub dns_server: IpAddr,

    #[arg(
        long,
        env = "REPORT_INTERVAL",
        default_value_t = 60,
        help = "Seconds between report flushes"
    )]
    pub report_interval: u64,

    #[arg(
        long,
        env = "HOSTNAME_LEASE",
        default_value_t = 3600,
        help = "Seconds a resolved host name stays valid"
    )]
    pub lease_time: u64,

    #[arg(
        long,
        env = "QUEUE_CAPACITY",
        default_value_t = 1024,
        help = "Parsed packets buffered between reader and scheduler"
    )]
    pub queue_capacity: usize,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,
}

impl Cli {
    pub fn config(&self) -> Result<Config> {
        if self.queue_capacity == 0 {
            return Err(CaptureError::ConfigError(
                "queue capacity must be at least 1".to_string(),
            ));
        }

        Ok(Config {
            data_dir: self.www_root.join(DATA_DIR),
            dns_server: self.dns_server,
            report_interval: Duration::from_secs(self.report_interval),
            lease_time: Duration::from_secs(self.lease_time),
            queue_capacity: self.queue_capacity,
        })
    }
}

/// Runtime settings of the pipeline
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub dns_server: IpAddr,
    pub report_interval: Duration,
    pub lease_time: Duration,
    pub queue_capacity: usize,
}

impl Config {
    /// Defaults rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            dns_server: IpAddr::from([192, 168, 2, 1]),
            report_interval: Duration::from_secs(60),
            lease_time: Duration::from_secs(3600),
            queue_capacity: 1024,
        }
    }
}
