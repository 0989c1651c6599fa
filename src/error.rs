use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// HTTP transport failure (connect, timeout, TLS, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Malformed feed document
    #[error("feed parse error: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),

    /// Lookup of an article id that is not in the store
    #[error("article not found: {0}")]
    NotFound(String),

    /// The backing database is unreachable or rejected an operation
    #[error("storage error: {0}")]
    Storage(#[from] tokio_rusqlite::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
