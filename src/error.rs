use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid session goal or configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Text generator answered but the answer was unusable
    #[error("Text generation failed: {0}")]
    Generator(String),

    /// Text generator did not answer inside the bounded timeout
    #[error("Text generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
