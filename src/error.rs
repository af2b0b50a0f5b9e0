use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Reverse lookup failed for {ip}: {reason}")]
    DnsError { ip: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Pipeline channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("Pipeline task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, CaptureError>;
