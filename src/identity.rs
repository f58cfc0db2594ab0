// 🔑 Identity Resolution - insert or update?
//
// A record id is either PERSISTED (assigned by the store, canonical UUID shape) or
// PENDING (a client-side placeholder such as "L-1718000000000").
//
// The string-shape check runs exactly once, when an id enters the system. From then on
// insert-vs-update is decided by the RecordId variant, never by re-inspecting strings.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// RECORD ID
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordId {
    /// Assigned by the store on first insert
    Persisted(Uuid),

    /// Client-side placeholder; never sent to the store
    Pending(String),
}

impl RecordId {
    /// Classify an incoming identifier by shape
    pub fn classify(raw: &str) -> RecordId {
        if is_canonical_uuid(raw) {
            // Shape already checked; parse cannot fail on 8-4-4-4-12 hex
            match Uuid::parse_str(raw) {
                Ok(uuid) => RecordId::Persisted(uuid),
                Err(_) => RecordId::Pending(raw.to_string()),
            }
        } else {
            RecordId::Pending(raw.to_string())
        }
    }

    /// Parse an id read back from the store. Non-canonical ids are an error here,
    /// not a pending record.
    pub fn from_stored(raw: &str) -> Option<RecordId> {
        match RecordId::classify(raw) {
            RecordId::Persisted(uuid) => Some(RecordId::Persisted(uuid)),
            RecordId::Pending(_) => None,
        }
    }

    /// Fresh placeholder, e.g. `L-1718000000000`
    pub fn pending_token(prefix: &str) -> RecordId {
        RecordId::Pending(format!("{}-{}", prefix, Utc::now().timestamp_millis()))
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, RecordId::Persisted(_))
    }

    /// String used to match foreign references (`Loan::bank_id`)
    pub fn key(&self) -> String {
        match self {
            RecordId::Persisted(uuid) => uuid.to_string(),
            RecordId::Pending(token) => token.clone(),
        }
    }

    /// Does this id equal the given foreign-reference string?
    pub fn matches(&self, reference: &str) -> bool {
        match self {
            RecordId::Persisted(uuid) => {
                is_canonical_uuid(reference)
                    && Uuid::parse_str(reference).map(|r| r == *uuid).unwrap_or(false)
            }
            RecordId::Pending(token) => token == reference,
        }
    }
}

impl Default for RecordId {
    fn default() -> Self {
        RecordId::Pending(String::new())
    }
}

impl From<String> for RecordId {
    fn from(raw: String) -> Self {
        RecordId::classify(&raw)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.key()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Persisted(uuid) => write!(f, "{}", uuid),
            RecordId::Pending(token) => write!(f, "{}", token),
        }
    }
}

// ============================================================================
// SAVE ACTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAction {
    /// Insert with a store-generated id
    Insert,

    /// Update the existing row with this id (scoped to the actor)
    Update(Uuid),
}

/// Stored form of an id reference: canonical UUIDs are lower-cased, anything else is
/// kept as given
pub fn canonical_reference(raw: &str) -> String {
    RecordId::classify(raw).key()
}

/// Decide how a save is applied
pub fn resolve(id: &RecordId) -> SaveAction {
    match id {
        RecordId::Persisted(uuid) => SaveAction::Update(*uuid),
        RecordId::Pending(_) => SaveAction::Insert,
    }
}

/// 36 chars, hex groups 8-4-4-4-12 separated by hyphens, any case.
///
/// Stricter than `Uuid::parse_str`, which also accepts simple, braced and urn forms.
pub fn is_canonical_uuid(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    if bytes.len() != 36 {
        return false;
    }

    bytes.iter().enumerate().all(|(i, b)| match i {
        8 | 13 | 18 | 23 => *b == b'-',
        _ => b.is_ascii_hexdigit(),
    })
}
