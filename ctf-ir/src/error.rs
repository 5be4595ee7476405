use thiserror::Error;

/// Errors produced while building or validating the trace IR.
///
/// Mirrors the small set of contract violations the original library
/// reports through its cause chain (`FROZEN`, `INVALID_FIELD_PATH`, plain
/// `ERROR`) rather than a single catch-all string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("object is frozen and cannot be mutated: {0}")]
    Frozen(String),

    #[error("invalid field path: target `{target}` is not reachable from source `{source}`: {reason}")]
    InvalidFieldPath {
        source: String,
        target: String,
        reason: String,
    },

    #[error("field class is invalid: {0}")]
    InvalidFieldClass(String),

    #[error("clock conversion overflowed i64 range")]
    ClockOverflow,

    #[error("name `{0}` is not unique in this scope")]
    DuplicateName(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
