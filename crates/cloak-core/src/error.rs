use thiserror::Error;

pub type CloakResult<T> = Result<T, CloakError>;

#[derive(Debug, Error)]
pub enum CloakError {
    #[error("config error: {0}")]
    Config(String),

    #[error("metadata error: {0}")]
    Metadata(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
