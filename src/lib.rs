// Appraisal Ledger - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod filters;
pub mod identity;
pub mod insight;
pub mod reports;
pub mod session;
pub mod stats;

// Re-export commonly used types
pub use config::{AppConfig, FeeSchedule};
pub use db::{setup_database, RecordStore, SqliteStore};
pub use entities::{ActorId, Bank, Loan, UNKNOWN_BANK};
pub use error::{ConfigError, ExportError, InsightError, StoreError, ValidationError};
pub use filters::{filter_banks, LoanFilter};
pub use identity::{is_canonical_uuid, resolve, RecordId, SaveAction};
pub use insight::{
    insight_or_fallback, insight_within, provider_from_config, InsightProvider, InsightRequest,
    OfflineInsightProvider, FALLBACK_INSIGHT, NO_DATA_INSIGHT,
};
pub use reports::{build_report, Report, ReportMode, ReportRow, ReportTotals};
pub use session::{FetchSequencer, FetchTicket, Workspace};
pub use stats::{compute_dashboard, compute_dashboard_now, BankCount, DashboardStats, Month, PeriodStat};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the tracing subscriber used by both binaries (`RUST_LOG`, default `info`)
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
