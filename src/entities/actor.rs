// 👤 Actor identity
//
// Opaque name of the appraiser who owns the records. How it was authenticated is not
// this crate's concern.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorId(String);

impl ActorId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyActor);
        }
        Ok(ActorId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ActorId {
    type Error = ValidationError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        ActorId::new(raw)
    }
}

impl From<ActorId> for String {
    fn from(actor: ActorId) -> Self {
        actor.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_trims_and_rejects_blank() {
        assert_eq!(ActorId::new("  asha ").unwrap().as_str(), "asha");
        assert_eq!(ActorId::new("   "), Err(ValidationError::EmptyActor));
    }
}
