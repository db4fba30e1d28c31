use thiserror::Error;

#[derive(Debug, Error)]
pub enum AregError {
    #[error("configuration error: tape length must be at least 1")]
    EmptyTape,
    #[error("i/o error")]
    Io(#[from] std::io::Error),
}
