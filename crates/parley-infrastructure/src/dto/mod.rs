//! Data Transfer Objects for persistence.
//!
//! DTOs keep the on-disk layout separate from the domain model so that the
//! domain can evolve without breaking files already written.

mod session;

pub use session::{MessageDto, SESSION_SCHEMA_VERSION, SessionDto};
