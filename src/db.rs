// 🗄️ Record Store Access Layer - SQLite + WAL
//
// Two tables (banks, loans), every row owned by an appraiser. Every call is scoped by
// an explicit ActorId; there is no ambient session.
//
// The `try_*` methods return StoreResult for callers that want detail. The
// RecordStore trait is the contract the rest of the app uses: failures become an
// empty list or `false`, with the detail logged for operators.

use crate::entities::{ActorId, Bank, Loan};
use crate::error::{StoreError, StoreResult};
use crate::identity::{canonical_reference, resolve, RecordId, SaveAction};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use uuid::Uuid;

/// Storage format of Loan::date
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// ACCESS LAYER CONTRACT
// ============================================================================

pub trait RecordStore {
    /// All banks owned by `actor`, ordered by name
    fn list_banks(&self, actor: &ActorId) -> Vec<Bank>;

    /// Insert or update, decided by the bank's RecordId
    fn save_bank(&self, actor: &ActorId, bank: &Bank) -> bool;

    fn delete_bank(&self, actor: &ActorId, id: &str) -> bool;

    /// All loans owned by `actor` with bank names joined in,
    /// ordered by date desc then created_at desc
    fn list_loans(&self, actor: &ActorId) -> Vec<Loan>;

    /// Insert or update, decided by the loan's RecordId
    fn save_loan(&self, actor: &ActorId, loan: &Loan) -> bool;

    fn delete_loan(&self, actor: &ActorId, id: &str) -> bool;
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    // ------------------------------------------------------------------------
    // Banks
    // ------------------------------------------------------------------------

    pub fn try_list_banks(&self, actor: &ActorId) -> StoreResult<Vec<Bank>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, created_at
             FROM banks
             WHERE appraiser_id = ?1
             ORDER BY name",
        )?;

        let rows = stmt
            .query_map(params![actor.as_str()], |row| {
                Ok(RawBank {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().filter_map(|raw| skip_invalid(raw.into_bank())).collect())
    }

    /// Returns the id the bank is stored under
    pub fn try_save_bank(&self, actor: &ActorId, bank: &Bank) -> StoreResult<RecordId> {
        bank.validate()?;
        let name = bank.name.trim();

        match resolve(&bank.id) {
            SaveAction::Update(uuid) => {
                let changed = self.conn.execute(
                    "UPDATE banks SET name = ?1 WHERE id = ?2 AND appraiser_id = ?3",
                    params![name, uuid.to_string(), actor.as_str()],
                )?;
                if changed == 0 {
                    tracing::debug!(bank_id = %uuid, actor = %actor, "Bank update matched no rows");
                }
                Ok(RecordId::Persisted(uuid))
            }
            SaveAction::Insert => {
                let uuid = Uuid::new_v4();
                self.conn.execute(
                    "INSERT INTO banks (id, appraiser_id, name, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![uuid.to_string(), actor.as_str(), name, timestamp(bank.created_at)],
                )?;
                Ok(RecordId::Persisted(uuid))
            }
        }
    }

    /// Loans referencing the bank are left alone
    pub fn try_delete_bank(&self, actor: &ActorId, id: &str) -> StoreResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM banks WHERE id = ?1 AND appraiser_id = ?2",
            params![canonical_reference(id), actor.as_str()],
        )?;
        Ok(deleted)
    }

    // ------------------------------------------------------------------------
    // Loans
    // ------------------------------------------------------------------------

    pub fn try_list_loans(&self, actor: &ActorId) -> StoreResult<Vec<Loan>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.id, l.bank_id, b.name, l.date, l.amount,
                    l.customer_name, l.notes, l.created_at
             FROM loans l
             LEFT JOIN banks b
                ON b.id = l.bank_id AND b.appraiser_id = l.appraiser_id
             WHERE l.appraiser_id = ?1
             ORDER BY l.date DESC, l.created_at DESC",
        )?;

        let rows = stmt
            .query_map(params![actor.as_str()], |row| {
                Ok(RawLoan {
                    id: row.get(0)?,
                    bank_id: row.get(1)?,
                    bank_name: row.get(2)?,
                    date: row.get(3)?,
                    amount: row.get(4)?,
                    customer_name: row.get(5)?,
                    notes: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().filter_map(|raw| skip_invalid(raw.into_loan())).collect())
    }

    /// Returns the id the loan is stored under
    pub fn try_save_loan(&self, actor: &ActorId, loan: &Loan) -> StoreResult<RecordId> {
        loan.validate()?;
        let bank_id = canonical_reference(&loan.bank_id);
        let date = loan.date.format(DATE_FORMAT).to_string();

        match resolve(&loan.id) {
            SaveAction::Update(uuid) => {
                let changed = self.conn.execute(
                    "UPDATE loans
                     SET bank_id = ?1, date = ?2, amount = ?3, customer_name = ?4, notes = ?5
                     WHERE id = ?6 AND appraiser_id = ?7",
                    params![
                        bank_id,
                        date,
                        loan.amount,
                        loan.customer_name,
                        loan.notes,
                        uuid.to_string(),
                        actor.as_str(),
                    ],
                )?;
                if changed == 0 {
                    tracing::debug!(loan_id = %uuid, actor = %actor, "Loan update matched no rows");
                }
                Ok(RecordId::Persisted(uuid))
            }
            SaveAction::Insert => {
                let uuid = Uuid::new_v4();
                self.conn.execute(
                    "INSERT INTO loans (
                        id, appraiser_id, bank_id, date, amount, customer_name, notes, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        uuid.to_string(),
                        actor.as_str(),
                        bank_id,
                        date,
                        loan.amount,
                        loan.customer_name,
                        loan.notes,
                        timestamp(loan.created_at),
                    ],
                )?;
                Ok(RecordId::Persisted(uuid))
            }
        }
    }

    pub fn try_delete_loan(&self, actor: &ActorId, id: &str) -> StoreResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM loans WHERE id = ?1 AND appraiser_id = ?2",
            params![canonical_reference(id), actor.as_str()],
        )?;
        Ok(deleted)
    }
}

impl RecordStore for SqliteStore {
    fn list_banks(&self, actor: &ActorId) -> Vec<Bank> {
        self.try_list_banks(actor).unwrap_or_else(|e| {
            tracing::error!(error = %e, actor = %actor, "Error fetching banks");
            Vec::new()
        })
    }

    fn save_bank(&self, actor: &ActorId, bank: &Bank) -> bool {
        match self.try_save_bank(actor, bank) {
            Ok(id) => {
                tracing::info!(bank_id = %id, actor = %actor, "Bank saved");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, actor = %actor, "Error saving bank");
                false
            }
        }
    }

    fn delete_bank(&self, actor: &ActorId, id: &str) -> bool {
        match self.try_delete_bank(actor, id) {
            Ok(deleted) => {
                tracing::info!(bank_id = id, deleted, actor = %actor, "Bank deleted");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, bank_id = id, "Error deleting bank");
                false
            }
        }
    }

    fn list_loans(&self, actor: &ActorId) -> Vec<Loan> {
        self.try_list_loans(actor).unwrap_or_else(|e| {
            tracing::error!(error = %e, actor = %actor, "Error fetching loans");
            Vec::new()
        })
    }

    fn save_loan(&self, actor: &ActorId, loan: &Loan) -> bool {
        match self.try_save_loan(actor, loan) {
            Ok(id) => {
                tracing::info!(loan_id = %id, actor = %actor, "Loan saved");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, actor = %actor, "Error saving loan");
                false
            }
        }
    }

    fn delete_loan(&self, actor: &ActorId, id: &str) -> bool {
        match self.try_delete_loan(actor, id) {
            Ok(deleted) => {
                tracing::info!(loan_id = id, deleted, actor = %actor, "Loan deleted");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, loan_id = id, "Error deleting loan");
                false
            }
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // Enable WAL mode for crash recovery (in-memory databases report "memory")
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // No foreign key on bank_id: deleting a bank leaves its loans as orphans
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS banks (
            id TEXT PRIMARY KEY,
            appraiser_id TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS loans (
            id TEXT PRIMARY KEY,
            appraiser_id TEXT NOT NULL,
            bank_id TEXT NOT NULL,
            date TEXT NOT NULL,
            amount REAL,
            customer_name TEXT,
            notes TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_banks_appraiser ON banks(appraiser_id, name);
        CREATE INDEX IF NOT EXISTS idx_loans_appraiser_date ON loans(appraiser_id, date);
        CREATE INDEX IF NOT EXISTS idx_loans_bank ON loans(bank_id);",
    )?;

    Ok(())
}

// ============================================================================
// ROW DECODING
// ============================================================================

struct RawBank {
    id: String,
    name: String,
    created_at: String,
}

impl RawBank {
    fn into_bank(self) -> StoreResult<Bank> {
        Ok(Bank {
            id: stored_id(&self.id)?,
            name: self.name,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

struct RawLoan {
    id: String,
    bank_id: String,
    bank_name: Option<String>,
    date: String,
    amount: Option<f64>,
    customer_name: Option<String>,
    notes: Option<String>,
    created_at: String,
}

impl RawLoan {
    fn into_loan(self) -> StoreResult<Loan> {
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT)
            .map_err(|_| StoreError::InvalidStoredDate(self.date.clone()))?;

        Ok(Loan {
            id: stored_id(&self.id)?,
            bank_id: self.bank_id,
            bank_name: self.bank_name,
            date,
            amount: self.amount,
            customer_name: self.customer_name,
            notes: self.notes,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// A stored id that is not canonical must not come back as "pending",
/// or the next save would insert a duplicate.
fn stored_id(raw: &str) -> StoreResult<RecordId> {
    RecordId::from_stored(raw).ok_or_else(|| StoreError::InvalidStoredId(raw.to_string()))
}

fn skip_invalid<T>(decoded: StoreResult<T>) -> Option<T> {
    match decoded {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unreadable row");
            None
        }
    }
}

/// Fixed-width RFC 3339 so text ordering equals time ordering
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidStoredDate(raw.to_string()))
}
