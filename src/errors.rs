use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModsyncError>;

#[derive(Error, Debug)]
pub enum ModsyncError {
    #[error("Malformed component entry: {0}")]
    MalformedEntry(String),
    #[error("Fault while handling untrusted payload: {0}")]
    UntrustedPayloadFault(String),
    #[error("Payload error: {0}")]
    Payload(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for ModsyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Payload(e.to_string())
    }
}

impl From<toml::de::Error> for ModsyncError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for ModsyncError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Config(e.to_string())
    }
}
