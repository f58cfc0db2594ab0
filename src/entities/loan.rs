// 💍 Loan Entity - one gold-loan appraisal
//
// bank_id is a plain reference string: the bank may have been deleted since, and the
// loan must still list, aggregate and report.

use crate::entities::Bank;
use crate::error::ValidationError;
use crate::identity::{canonical_reference, RecordId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of client-side placeholder ids for loans
pub const PENDING_PREFIX: &str = "L";

/// Display name for a loan whose bank no longer exists
pub const UNKNOWN_BANK: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    #[serde(default)]
    pub id: RecordId,

    /// Reference to Bank::id
    pub bank_id: String,

    /// Read-time copy of the bank's name (None when the bank is gone)
    #[serde(default)]
    pub bank_name: Option<String>,

    pub date: NaiveDate,

    /// Appraised value; None until valued
    #[serde(default)]
    pub amount: Option<f64>,

    #[serde(default)]
    pub customer_name: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// New, not yet persisted loan against `bank_id`
    pub fn new(bank_id: impl Into<String>, date: NaiveDate) -> Self {
        Loan {
            id: RecordId::pending_token(PENDING_PREFIX),
            bank_id: bank_id.into(),
            bank_name: None,
            date,
            amount: None,
            customer_name: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_amount(mut self, amount: Option<f64>) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_customer(mut self, customer: Option<String>) -> Self {
        self.customer_name = customer;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Blank optional text is stored as NULL; a zero amount counts as "not valued".
    /// The bank reference is put in canonical form.
    pub fn normalized(mut self) -> Self {
        self.bank_id = canonical_reference(&self.bank_id);
        self.customer_name = non_blank(self.customer_name);
        self.notes = non_blank(self.notes);
        if self.amount == Some(0.0) {
            self.amount = None;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.bank_id.trim().is_empty() {
            return Err(ValidationError::MissingBankId);
        }

        if let Some(amount) = self.amount {
            if !amount.is_finite() || amount < 0.0 {
                return Err(ValidationError::NegativeAmount(amount.to_string()));
            }
        }

        Ok(())
    }

    /// Amount with "not valued" read as zero
    pub fn amount_or_zero(&self) -> f64 {
        self.amount.unwrap_or(0.0)
    }

    /// Does this loan reference `bank`?
    pub fn belongs_to(&self, bank: &Bank) -> bool {
        bank.id.matches(&self.bank_id)
    }

    /// Bank name for display, "Unknown" for orphans
    pub fn bank_display_name(&self) -> &str {
        self.bank_name.as_deref().unwrap_or(UNKNOWN_BANK)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
