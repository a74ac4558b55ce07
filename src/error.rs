use thiserror::Error;

/// Failures that can end an ETL run or a single extraction attempt.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("SSO authentication failed: {0}")]
    Authentication(String),

    #[error("HTTP request failed for {url}: {message}")]
    Http { url: String, message: String },

    #[error("table '{table_id}' not found at {url}")]
    TableNotFound { table_id: String, url: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl EtlError {
    pub fn http(url: &str, message: impl Into<String>) -> Self {
        EtlError::Http {
            url: url.to_string(),
            message: message.into(),
        }
    }
}
