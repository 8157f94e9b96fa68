use thiserror::Error;

use crate::progress::Canceled;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A bulk load or subsampling run was canceled through its progress
    /// listener. Any partial state must be discarded.
    #[error("operation canceled")]
    Canceled,

    #[error("format error: {0}")]
    Format(String),

    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<Canceled> for Error {
    fn from(_: Canceled) -> Self {
        Error::Canceled
    }
}

impl Error {
    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled)
    }
}
