//! # autoserv-id
//!
//! Typed identifiers for the resources the service portal exchanges with the
//! backend.
//!
//! ## Design Principles
//!
//! - Identifiers are opaque and backend-assigned; the client never mints them
//! - Each resource kind has its own type so a task id cannot be passed where an
//!   employee id is expected
//! - Identifiers are embedded in URL paths and STOMP destinations, so parsing
//!   rejects anything that would change the shape of a path
//!
//! ## Wire Format
//!
//! The backend serializes identifiers either as JSON strings or as integers.
//! Both deserialize into the same typed id; serialization always emits a string.
//!
//! Examples:
//! - `TaskId`: `"t1"`, `42`
//! - `EmployeeId`: `"emp-7"`
//! - `Username`: `"alice"`

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Maximum accepted identifier length in bytes.
pub const MAX_ID_LEN: usize = 128;
