// 🧭 Workspace - the appraiser's working copy of banks and loans
//
// Writes go to the store first; only after the write has finished is the affected
// list fetched again. Fetch results carry a ticket, and a result older than the last
// one applied is dropped.

use crate::config::FeeSchedule;
use crate::db::RecordStore;
use crate::entities::{ActorId, Bank, Loan};
use crate::filters::LoanFilter;
use crate::reports::{build_report, Report, ReportMode};
use crate::stats::{compute_dashboard, DashboardStats};
use chrono::NaiveDate;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// FETCH SEQUENCING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

/// Hands out increasing tickets and remembers the newest one applied
#[derive(Debug, Default)]
pub struct FetchSequencer {
    issued: AtomicU64,
    applied: AtomicU64,
}

impl FetchSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> FetchTicket {
        FetchTicket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// True if `ticket` is newer than everything applied so far (and marks it applied)
    pub fn accept(&self, ticket: FetchTicket) -> bool {
        let previous = self.applied.fetch_max(ticket.0, Ordering::SeqCst);
        ticket.0 > previous
    }
}

// ============================================================================
// WORKSPACE
// ============================================================================

pub struct Workspace<S: RecordStore> {
    store: S,
    actor: ActorId,
    banks: Vec<Bank>,
    loans: Vec<Loan>,
    sequencer: FetchSequencer,
}

impl<S: RecordStore> Workspace<S> {
    /// Empty workspace; call `refresh` to load
    pub fn new(store: S, actor: ActorId) -> Self {
        Workspace {
            store,
            actor,
            banks: Vec::new(),
            loans: Vec::new(),
            sequencer: FetchSequencer::new(),
        }
    }

    /// Workspace with both lists loaded
    pub fn load(store: S, actor: ActorId) -> Self {
        let mut workspace = Workspace::new(store, actor);
        workspace.refresh();
        workspace
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn banks(&self) -> &[Bank] {
        &self.banks
    }

    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }

    pub fn begin_fetch(&self) -> FetchTicket {
        self.sequencer.begin()
    }

    /// Replace both lists unless a newer fetch has already been applied
    pub fn apply_snapshot(&mut self, ticket: FetchTicket, banks: Vec<Bank>, loans: Vec<Loan>) -> bool {
        if !self.sequencer.accept(ticket) {
            tracing::debug!(?ticket, "Dropping stale fetch result");
            return false;
        }
        self.banks = banks;
        self.loans = loans;
        true
    }

    /// Re-fetch banks and loans
    pub fn refresh(&mut self) {
        let ticket = self.begin_fetch();
        let banks = self.store.list_banks(&self.actor);
        let loans = self.store.list_loans(&self.actor);
        self.apply_snapshot(ticket, banks, loans);
    }

    // ------------------------------------------------------------------------
    // Writes (write, then re-fetch)
    // ------------------------------------------------------------------------

    pub fn save_bank(&mut self, bank: &Bank) -> bool {
        self.after_write(|store, actor| store.save_bank(actor, bank))
    }

    pub fn delete_bank(&mut self, id: &str) -> bool {
        self.after_write(|store, actor| store.delete_bank(actor, id))
    }

    pub fn save_loan(&mut self, loan: &Loan) -> bool {
        self.after_write(|store, actor| store.save_loan(actor, loan))
    }

    pub fn delete_loan(&mut self, id: &str) -> bool {
        self.after_write(|store, actor| store.delete_loan(actor, id))
    }

    /// On failure the in-memory lists are left as they were
    fn after_write<F>(&mut self, write: F) -> bool
    where
        F: FnOnce(&S, &ActorId) -> bool,
    {
        let ok = write(&self.store, &self.actor);
        if ok {
            self.refresh();
        }
        ok
    }

    // ------------------------------------------------------------------------
    // Lookups and derived views
    // ------------------------------------------------------------------------

    /// Find a bank by id string
    pub fn bank(&self, id: &str) -> Option<&Bank> {
        self.banks.iter().find(|b| b.id.matches(id))
    }

    /// Find a loan by id string
    pub fn loan(&self, id: &str) -> Option<&Loan> {
        self.loans.iter().find(|l| l.id.matches(id))
    }

    pub fn filtered_loans(&self, filter: &LoanFilter) -> Vec<&Loan> {
        filter.apply(&self.loans)
    }

    pub fn dashboard(&self, fees: &FeeSchedule, today: NaiveDate) -> DashboardStats {
        compute_dashboard(&self.loans, &self.banks, today, fees.dashboard)
    }

    pub fn report(&self, mode: ReportMode, fees: &FeeSchedule, today: NaiveDate) -> Report {
        build_report(mode, &self.loans, &self.banks, today, fees.report)
    }
}
