// 📊 Aggregation Engine - dashboard statistics
//
// Pure function of (loans, banks, today, fee). No caching: recompute whenever either
// list changes. Same inputs always give the same output.

use crate::entities::{Bank, Loan};
use crate::error::ValidationError;
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// MONTH
// ============================================================================

/// Calendar month, written `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    pub fn of(date: NaiveDate) -> Self {
        Month {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Month::of(Utc::now().date_naive())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl FromStr for Month {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidMonth(s.to_string());

        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let digits = |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(year, 4) || !digits(month, 2) {
            return Err(invalid());
        }

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }

        Ok(Month { year, month })
    }
}

impl TryFrom<String> for Month {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Month> for String {
    fn from(m: Month) -> Self {
        m.to_string()
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

// ============================================================================
// DASHBOARD STATISTICS
// ============================================================================

/// Count of appraisals and the fee they earned
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStat {
    pub count: usize,
    pub earnings: f64,
}

impl PeriodStat {
    fn new(count: usize, fee: f64) -> Self {
        PeriodStat {
            count,
            earnings: count as f64 * fee,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankCount {
    pub bank_id: String,
    pub bank_name: String,
    pub count: usize,
    pub earnings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub as_of: NaiveDate,
    pub fee_per_loan: f64,
    pub today: PeriodStat,
    pub month: PeriodStat,
    pub overall: PeriodStat,

    /// Number of known banks
    pub active_banks: usize,

    /// One entry per bank, busiest first
    pub bank_wise: Vec<BankCount>,

    /// Loans whose bank no longer exists (absent from `bank_wise`)
    pub orphaned: usize,
}

/// Compute dashboard statistics as of `today`
pub fn compute_dashboard(
    loans: &[Loan],
    banks: &[Bank],
    today: NaiveDate,
    fee: f64,
) -> DashboardStats {
    let this_month = Month::of(today);

    let today_count = loans.iter().filter(|l| l.date == today).count();
    let month_count = loans.iter().filter(|l| this_month.contains(l.date)).count();

    let bank_wise = bank_counts(loans, banks, fee);
    let orphaned = loans
        .iter()
        .filter(|l| !banks.iter().any(|b| l.belongs_to(b)))
        .count();

    tracing::debug!(
        loans = loans.len(),
        banks = banks.len(),
        today = today_count,
        month = month_count,
        "Dashboard statistics computed"
    );

    DashboardStats {
        as_of: today,
        fee_per_loan: fee,
        today: PeriodStat::new(today_count, fee),
        month: PeriodStat::new(month_count, fee),
        overall: PeriodStat::new(loans.len(), fee),
        active_banks: banks.len(),
        bank_wise,
        orphaned,
    }
}

/// Same as `compute_dashboard`, with today taken from the UTC clock
pub fn compute_dashboard_now(loans: &[Loan], banks: &[Bank], fee: f64) -> DashboardStats {
    compute_dashboard(loans, banks, Utc::now().date_naive(), fee)
}

/// Per-bank loan counts, zero-loan banks included, orphans dropped.
///
/// `sort_by` is stable, so banks with equal counts keep their list order.
pub fn bank_counts(loans: &[Loan], banks: &[Bank], fee: f64) -> Vec<BankCount> {
    let mut counts: Vec<BankCount> = banks
        .iter()
        .map(|bank| {
            let count = loans.iter().filter(|l| l.belongs_to(bank)).count();
            BankCount {
                bank_id: bank.id.key(),
                bank_name: bank.name.clone(),
                count,
                earnings: count as f64 * fee,
            }
        })
        .collect();

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}
