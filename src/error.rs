use thiserror::Error;

/// Failures that can reach the caller of a caricature request. Provider,
/// download and reference-guided generation failures are recovered where they
/// happen and never show up here.
#[derive(Error, Debug)]
pub enum CaricatureError {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    ExternalService(String),

    #[error("{0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, CaricatureError>;
