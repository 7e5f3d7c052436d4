use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    /// Errors that drop a single candidate or query without aborting the run.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScanError::Network(_) | ScanError::HttpStatus { .. } | ScanError::MalformedResponse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
