//! The crate-wide `Result`/`Error` type, distinct from [`crate::error`]'s
//! per-thread `Cause` chain: this is the ordinary `?`-propagated error
//! returned by fallible constructors and methods.

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("invalid component: {0}")]
    InvalidComponent(String),
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
    #[error(transparent)]
    Ir(#[from] ctf_ir::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
