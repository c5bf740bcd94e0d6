use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("No timestamped lines in lyric text")]
    EmptyLyrics,

    #[error("Persistence error: {0}")]
    Persistence(#[from] core_library::LibraryError),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
