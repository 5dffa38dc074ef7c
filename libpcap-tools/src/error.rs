use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Generic(&'static str),
    /// A header or field would extend past the available bytes
    #[error("buffer too short: need {needed} bytes, {available} available")]
    BufferTooShort { needed: usize, available: usize },
    /// Configuration-integrity error (unknown mode, malformed value)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Captured data is inconsistent with its descriptor
    #[error("inconsistent capture: {0}")]
    Capture(String),
    #[error("checksum error: {0}")]
    Checksum(String),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl From<&'static str> for Error {
    fn from(s: &'static str) -> Self {
        Error::Generic(s)
    }
}

impl Error {
    /// Build a `BufferTooShort` error, unless `needed` bytes fit in `available`
    pub fn check_len(needed: usize, available: usize) -> Result<(), Error> {
        if needed > available {
            Err(Error::BufferTooShort { needed, available })
        } else {
            Ok(())
        }
    }
}
