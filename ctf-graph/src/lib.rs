//! Component/message-graph runtime.
//!
//! Messages, component classes, MIP version negotiation, the pull-based
//! graph scheduler, and the per-thread error chain. Ported from
//! `babeltrace2`'s `lib/graph`, built on top of the `ctf-ir` trace IR.

pub mod component;
pub mod error;
pub mod graph;
pub mod message;
pub mod mip;
pub mod status;

mod errors;
pub use errors::{Error, Result};
