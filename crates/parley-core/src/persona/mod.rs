//! Persona domain module.

mod model;

pub use model::{Persona, PersonaSource};
