//! Trace intermediate representation.
//!
//! Field classes, clock classes, interval sets, the trace/stream/event
//! class hierarchy, the field-path resolver, the two-pass validator, and
//! a TSDL text serializer. Ported from `babeltrace2`'s `lib/trace-ir`
//! and `lib/ctf-ir` with a Rust-idiomatic object runtime: `Rc<RefCell<_>>`
//! handles and a `Cell<bool>` freeze bit stand in for the original's
//! manual `get_ref`/`put_ref` counting (spec §9 invites this swap
//! explicitly).

pub mod clock;
pub mod error;
pub mod field_class;
pub mod field_path;
pub mod interval;
pub mod pool;
pub mod resolve;
pub mod trace;
pub mod tsdl;
pub mod validator;
pub mod value;

pub use error::{Error, Result};
pub use value::Value;
