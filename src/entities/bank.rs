// 🏦 Bank Entity - a partner branch the appraiser works for
//
// "Bank name is a VALUE (can change), Bank id is IDENTITY (never changes)"
//
// Renaming a branch keeps every loan pointing at it. Deleting a branch leaves its
// loans in place as orphans.

use crate::error::ValidationError;
use crate::identity::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of client-side placeholder ids for banks
pub const PENDING_PREFIX: &str = "B";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bank {
    /// Stable identity - assigned by the store on first insert
    #[serde(default)]
    pub id: RecordId,

    /// Display name, e.g. "AU Bank Lalgudi"
    pub name: String,

    /// Set once on creation
    pub created_at: DateTime<Utc>,
}

impl Bank {
    /// New, not yet persisted bank
    pub fn new(name: impl Into<String>) -> Self {
        Bank {
            id: RecordId::pending_token(PENDING_PREFIX),
            name: name.into(),
            created_at: Utc::now(),
        }
    }

    /// Copy with a new name; identity and creation time are kept
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Bank {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Name must contain something other than whitespace
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyBankName);
        }
        Ok(())
    }

    /// Case-insensitive substring match used by the branch list filter
    pub fn matches_search(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(&query.to_lowercase())
    }
}
