use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    /// A settings value failed validation.
    #[error("invalid consensus settings: {0}")]
    Config(String),

    /// Misuse of a consensus builder (bad sequence number, bad substitution).
    #[error("consensus builder error: {0}")]
    Builder(String),

    /// A replacement string does not fit the edited range.
    #[error("replacement of length {actual} does not match range length {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("range {start}..={end} is outside a consensus of length {len}")]
    IndexOutOfRange { start: usize, end: usize, len: usize },

    #[error("alignment error: {0}")]
    Alignment(String),

    #[error("trace error: {0}")]
    Trace(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
