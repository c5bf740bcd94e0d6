use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Storage error: {0}")]
    Storage(#[from] bridge_traits::BridgeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
