use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Sync timeout after {0} seconds")]
    Timeout(u64),

    #[error("No active session")]
    NoSession,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<bridge_traits::BridgeError> for SyncError {
    fn from(e: bridge_traits::BridgeError) -> Self {
        SyncError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
