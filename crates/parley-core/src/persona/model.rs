//! Persona domain model.
//!
//! A persona is a named system-instruction profile. A model turn generated on
//! behalf of a persona carries the persona's display name.

use serde::{Deserialize, Serialize};

/// Represents the source of a persona (system-provided or user-created).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub enum PersonaSource {
    /// System-provided default personas
    System,
    /// User-created custom personas
    #[default]
    User,
}

/// A persona the completion service can speak as.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Persona {
    /// Unique identifier (UUID format)
    pub id: String,
    /// Display name of the persona
    pub name: String,
    /// Role or title describing the persona
    #[serde(default)]
    pub role: String,
    /// Background description
    #[serde(default)]
    pub background: String,
    /// Communication style characteristics
    #[serde(default)]
    pub communication_style: String,
    /// Explicit system instruction; overrides the derived one
    #[serde(default)]
    pub system_instruction: Option<String>,
    /// Source of the persona (System or User)
    #[serde(default)]
    pub source: PersonaSource,
}

impl Persona {
    /// Creates a user persona with an explicit instruction.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        system_instruction: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: String::new(),
            background: String::new(),
            communication_style: String::new(),
            system_instruction: Some(system_instruction.into()),
            source: PersonaSource::User,
        }
    }

    /// The instruction sent to the completion service for this persona.
    pub fn instruction(&self) -> String {
        if let Some(instruction) = &self.system_instruction {
            return instruction.clone();
        }

        let mut lines = vec![format!("You are {}.", self.name)];
        if !self.role.is_empty() {
            lines.push(format!("Role: {}", self.role));
        }
        if !self.background.is_empty() {
            lines.push(format!("Background: {}", self.background));
        }
        if !self.communication_style.is_empty() {
            lines.push(format!("Communication style: {}", self.communication_style));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_instruction_wins() {
        let persona = Persona::new("p1", "Mai", "Speak like a pirate.");
        assert_eq!(persona.instruction(), "Speak like a pirate.");
    }

    #[test]
    fn test_derived_instruction() {
        let persona = Persona {
            id: "p2".to_string(),
            name: "Yui".to_string(),
            role: "Reviewer".to_string(),
            background: String::new(),
            communication_style: "Blunt".to_string(),
            system_instruction: None,
            source: PersonaSource::System,
        };
        assert_eq!(
            persona.instruction(),
            "You are Yui.\nRole: Reviewer\nCommunication style: Blunt"
        );
    }
}
