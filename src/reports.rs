// 📑 Report Projection - bank-wise, monthly and daily views
//
// Each view turns the same (loans, banks) pair into rows of a fixed shape. The row
// type is an enum, one variant per view, so a consumer never guesses which fields a
// row carries.
//
// Export paths:
// - CSV (csv crate, proper quoting)
// - print: the same table shown on screen, plus a title and the fee note

use crate::entities::{Bank, Loan};
use crate::error::{ExportError, ValidationError};
use crate::stats::Month;
use chrono::{DateTime, NaiveDate, Utc};
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Table};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

// ============================================================================
// MODE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "month", rename_all = "camelCase")]
pub enum ReportMode {
    /// One row per bank
    BankWise,

    /// One row per day of the selected month that has loans
    Monthly(Month),

    /// One row per loan dated today
    Daily,
}

impl ReportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportMode::BankWise => "bankwise",
            ReportMode::Monthly(_) => "monthly",
            ReportMode::Daily => "daily",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportMode::BankWise => "Bank-wise",
            ReportMode::Monthly(_) => "Monthly",
            ReportMode::Daily => "Daily Log",
        }
    }

    /// Parse a mode name; `month` is used by (and defaults to the current month for)
    /// the monthly view
    pub fn parse(name: &str, month: Option<&str>) -> Result<Self, ValidationError> {
        match name.to_ascii_lowercase().as_str() {
            "bankwise" | "bank-wise" | "bank_wise" => Ok(ReportMode::BankWise),
            "daily" => Ok(ReportMode::Daily),
            "monthly" => {
                let month = match month {
                    Some(m) if !m.is_empty() => m.parse()?,
                    _ => Month::current(),
                };
                Ok(ReportMode::Monthly(month))
            }
            other => Err(ValidationError::InvalidReportMode(other.to_string())),
        }
    }
}

// ============================================================================
// ROWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReportRow {
    #[serde(rename_all = "camelCase")]
    BankWise {
        label: String,
        count: usize,
        total_amount: f64,
        salary: f64,
    },

    #[serde(rename_all = "camelCase")]
    Monthly {
        label: String,
        count: usize,
        amount: f64,
        salary: f64,
    },

    #[serde(rename_all = "camelCase")]
    Daily {
        /// Loan id
        label: String,
        count: usize,
        amount: f64,
        salary: f64,
        bank: String,
        customer: Option<String>,
    },
}

impl ReportRow {
    pub fn label(&self) -> &str {
        match self {
            ReportRow::BankWise { label, .. }
            | ReportRow::Monthly { label, .. }
            | ReportRow::Daily { label, .. } => label,
        }
    }

    pub fn count(&self) -> usize {
        match self {
            ReportRow::BankWise { count, .. }
            | ReportRow::Monthly { count, .. }
            | ReportRow::Daily { count, .. } => *count,
        }
    }

    /// Appraised value column (total_amount for bank-wise rows)
    pub fn amount(&self) -> f64 {
        match self {
            ReportRow::BankWise { total_amount, .. } => *total_amount,
            ReportRow::Monthly { amount, .. } | ReportRow::Daily { amount, .. } => *amount,
        }
    }

    pub fn salary(&self) -> f64 {
        match self {
            ReportRow::BankWise { salary, .. }
            | ReportRow::Monthly { salary, .. }
            | ReportRow::Daily { salary, .. } => *salary,
        }
    }
}

/// Footer sums over all rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTotals {
    pub count: usize,
    pub amount: f64,
    pub salary: f64,
}

/// Loans left out of a bank-wise report because their bank is gone
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanSummary {
    pub count: usize,
    pub amount: f64,
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub mode: ReportMode,
    pub as_of: NaiveDate,
    pub fee_per_loan: f64,
    pub rows: Vec<ReportRow>,

    /// Bank-wise only; the other views have no bank filter and include every loan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphaned: Option<OrphanSummary>,
}

/// Build one view. `today` selects the daily rows; `fee` is the report fee.
pub fn build_report(
    mode: ReportMode,
    loans: &[Loan],
    banks: &[Bank],
    today: NaiveDate,
    fee: f64,
) -> Report {
    let (rows, orphaned) = match mode {
        ReportMode::BankWise => {
            let (rows, orphaned) = bank_wise_rows(loans, banks, fee);
            (rows, Some(orphaned))
        }
        ReportMode::Monthly(month) => (monthly_rows(loans, month, fee), None),
        ReportMode::Daily => (daily_rows(loans, today, fee), None),
    };

    Report {
        mode,
        as_of: today,
        fee_per_loan: fee,
        rows,
        orphaned,
    }
}

fn bank_wise_rows(loans: &[Loan], banks: &[Bank], fee: f64) -> (Vec<ReportRow>, OrphanSummary) {
    let mut rows: Vec<ReportRow> = banks
        .iter()
        .map(|bank| {
            let bank_loans: Vec<&Loan> = loans.iter().filter(|l| l.belongs_to(bank)).collect();
            ReportRow::BankWise {
                label: bank.name.clone(),
                count: bank_loans.len(),
                total_amount: bank_loans.iter().map(|l| l.amount_or_zero()).sum(),
                salary: bank_loans.len() as f64 * fee,
            }
        })
        .collect();

    // Stable: equal counts keep bank-list order
    rows.sort_by(|a, b| b.count().cmp(&a.count()));

    let orphans: Vec<&Loan> = loans
        .iter()
        .filter(|l| !banks.iter().any(|b| l.belongs_to(b)))
        .collect();
    let orphaned = OrphanSummary {
        count: orphans.len(),
        amount: orphans.iter().map(|l| l.amount_or_zero()).sum(),
    };

    (rows, orphaned)
}

fn monthly_rows(loans: &[Loan], month: Month, fee: f64) -> Vec<ReportRow> {
    let mut days: BTreeMap<NaiveDate, (usize, f64)> = BTreeMap::new();
    for loan in loans.iter().filter(|l| month.contains(l.date)) {
        let entry = days.entry(loan.date).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += loan.amount_or_zero();
    }

    days.into_iter()
        .rev()
        .map(|(date, (count, amount))| ReportRow::Monthly {
            label: date.format("%Y-%m-%d").to_string(),
            count,
            amount,
            salary: count as f64 * fee,
        })
        .collect()
}

fn daily_rows(loans: &[Loan], today: NaiveDate, fee: f64) -> Vec<ReportRow> {
    loans
        .iter()
        .filter(|l| l.date == today)
        .map(|l| ReportRow::Daily {
            label: l.id.key(),
            count: 1,
            amount: l.amount_or_zero(),
            salary: fee,
            bank: l.bank_display_name().to_string(),
            customer: l.customer_name.clone(),
        })
        .collect()
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn totals(&self) -> ReportTotals {
        self.rows.iter().fold(ReportTotals::default(), |acc, row| ReportTotals {
            count: acc.count + row.count(),
            amount: acc.amount + row.amount(),
            salary: acc.salary + row.salary(),
        })
    }

    // ------------------------------------------------------------------------
    // CSV
    // ------------------------------------------------------------------------

    pub fn csv_header(&self) -> Vec<&'static str> {
        match self.mode {
            ReportMode::Daily => vec!["Label", "Branch", "Customer", "Count", "Total Valuation", "Earnings"],
            _ => vec!["Label", "Count", "Total Valuation", "Earnings"],
        }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.csv_header())?;

        for row in &self.rows {
            let record = match row {
                ReportRow::Daily {
                    label,
                    count,
                    amount,
                    salary,
                    bank,
                    customer,
                } => vec![
                    label.clone(),
                    bank.clone(),
                    customer.clone().unwrap_or_default(),
                    count.to_string(),
                    amount.to_string(),
                    salary.to_string(),
                ],
                _ => vec![
                    row.label().to_string(),
                    row.count().to_string(),
                    row.amount().to_string(),
                    row.salary().to_string(),
                ],
            };
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String, ExportError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Download name, e.g. `appraisal_report_monthly_1718000000000.csv`
    pub fn file_name(&self, at: DateTime<Utc>) -> String {
        format!("appraisal_report_{}_{}.csv", self.mode.as_str(), at.timestamp_millis())
    }

    // ------------------------------------------------------------------------
    // TABLE / PRINT
    // ------------------------------------------------------------------------

    /// On-screen table with a Totals footer
    pub fn to_table(&self) -> Table {
        let daily = matches!(self.mode, ReportMode::Daily);

        let mut header = vec![if daily { "Loan Ref" } else { "Category" }];
        if daily {
            header.push("Branch");
        }
        header.extend(["Appraisals", "Value", "Salary (₹)"]);

        let mut table = Table::new();
        table.load_preset(UTF8_FULL).set_header(header);

        for row in &self.rows {
            let mut cells = vec![Cell::new(row.label())];
            if let ReportRow::Daily { bank, .. } = row {
                cells.push(Cell::new(bank));
            }
            cells.push(Cell::new(row.count()).set_alignment(CellAlignment::Center));
            cells.push(Cell::new(format_money(row.amount())).set_alignment(CellAlignment::Right));
            cells.push(Cell::new(format_money(row.salary())).set_alignment(CellAlignment::Right));
            table.add_row(cells);
        }

        if self.rows.is_empty() {
            table.add_row(vec![Cell::new("No records found.")]);
        } else {
            let totals = self.totals();
            let mut cells = vec![Cell::new("Totals")];
            if daily {
                cells.push(Cell::new(""));
            }
            cells.push(Cell::new(totals.count).set_alignment(CellAlignment::Center));
            cells.push(Cell::new(format_money(totals.amount)).set_alignment(CellAlignment::Right));
            cells.push(
                Cell::new(format!("₹{}", format_money(totals.salary))).set_alignment(CellAlignment::Right),
            );
            table.add_row(cells);
        }

        table
    }

    pub fn heading(&self) -> String {
        match self.mode {
            ReportMode::Monthly(month) => format!("{} Breakdown ({})", self.mode.title(), month),
            _ => format!("{} Breakdown", self.mode.title()),
        }
    }

    /// Printable page: the on-screen table plus title, date and fee note
    pub fn render_for_print(&self) -> String {
        format!(
            "{}\nReport Date: {}\n\n{}\n\nSalary estimate calculated @ ₹{} per successfully recorded loan entry.\n",
            self.heading(),
            self.as_of.format("%Y-%m-%d"),
            self.to_table(),
            format_money(self.fee_per_loan),
        )
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_table())
    }
}

/// Thousands-grouped amount; whole numbers without decimals
pub fn format_money(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let negative = rounded < 0.0;
    let abs = rounded.abs();
    let whole = abs.trunc() as u64;
    let cents = ((abs - abs.trunc()) * 100.0).round() as u64;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    if cents == 0 {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{:02}", sign, grouped, cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::RecordId;

    fn bank(id: &str, name: &str) -> Bank {
        let mut bank = Bank::new(name);
        bank.id = RecordId::classify(id);
        bank
    }

    fn loan(bank_id: &str, date: &str, amount: Option<f64>) -> Loan {
        Loan::new(bank_id, day(date)).with_amount(amount)
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn scenario() -> (Vec<Bank>, Vec<Loan>) {
        let banks = vec![bank("b1", "Alpha"), bank("b2", "Beta")];
        let loans = vec![
            loan("b1", "2024-05-01", Some(1000.0)),
            loan("b1", "2024-05-02", Some(2000.0)),
            loan("b2", "2024-05-02", Some(500.0)),
        ];
        (banks, loans)
    }

    #[test]
    fn test_bank_wise_scenario() {
        let (banks, loans) = scenario();
        let report = build_report(ReportMode::BankWise, &loans, &banks, day("2024-05-02"), 300.0);

        assert_eq!(
            report.rows,
            vec![
                ReportRow::BankWise { label: "Alpha".into(), count: 2, total_amount: 3000.0, salary: 600.0 },
                ReportRow::BankWise { label: "Beta".into(), count: 1, total_amount: 500.0, salary: 300.0 },
            ]
        );
        assert_eq!(report.orphaned, Some(OrphanSummary { count: 0, amount: 0.0 }));
    }

    #[test]
    fn test_monthly_scenario() {
        let (banks, loans) = scenario();
        let mode = ReportMode::parse("monthly", Some("2024-05")).unwrap();
        let report = build_report(mode, &loans, &banks, day("2024-06-10"), 300.0);

        assert_eq!(
            report.rows,
            vec![
                ReportRow::Monthly { label: "2024-05-02".into(), count: 2, amount: 2500.0, salary: 600.0 },
                ReportRow::Monthly { label: "2024-05-01".into(), count: 1, amount: 1000.0, salary: 300.0 },
            ]
        );
    }

    #[test]
    fn test_monthly_excludes_other_months_and_empty_days() {
        let banks = vec![bank("b1", "Alpha")];
        let loans = vec![
            loan("b1", "2024-05-31", None),
            loan("b1", "2024-06-01", Some(100.0)),
            loan("b1", "2024-04-30", Some(100.0)),
        ];
        let report = build_report(
            ReportMode::Monthly("2024-05".parse().unwrap()),
            &loans,
            &banks,
            day("2024-05-31"),
            350.0,
        );

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.totals().count, 1);
        assert_eq!(report.rows[0].amount(), 0.0);
    }

    #[test]
    fn test_daily_one_row_per_loan_today() {
        let banks = vec![bank("b1", "Alpha")];
        let mut with_name = loan("b1", "2024-05-02", Some(1200.0));
        with_name.bank_name = Some("Alpha".to_string());
        with_name.customer_name = Some("Ravi".to_string());
        let orphan = loan("gone", "2024-05-02", None);
        let yesterday = loan("b1", "2024-05-01", Some(10.0));
        let loans = vec![with_name.clone(), orphan.clone(), yesterday];

        let report = build_report(ReportMode::Daily, &loans, &banks, day("2024-05-02"), 350.0);

        assert_eq!(report.rows.len(), 2);
        assert!(report.rows.iter().all(|r| r.count() == 1 && r.salary() == 350.0));
        assert_eq!(report.rows[0].label(), with_name.id.key());
        match &report.rows[1] {
            ReportRow::Daily { bank, customer, amount, .. } => {
                assert_eq!(bank, "Unknown");
                assert_eq!(customer, &None);
                assert_eq!(*amount, 0.0);
            }
            other => panic!("unexpected row {:?}", other),
        }

        // Orphans are part of the daily footer
        assert_eq!(report.totals(), ReportTotals { count: 2, amount: 1200.0, salary: 700.0 });
    }

    #[test]
    fn test_bank_wise_footer_excludes_orphans() {
        let (banks, mut loans) = scenario();
        loans.push(loan("nonexistent", "2024-05-02", Some(750.0)));

        let report = build_report(ReportMode::BankWise, &loans, &banks, day("2024-05-02"), 300.0);
        let totals = report.totals();

        assert_eq!(report.rows.len(), banks.len());
        assert_eq!(totals.count, 3);
        assert_eq!(totals.amount, 3500.0);
        assert_eq!(report.orphaned, Some(OrphanSummary { count: 1, amount: 750.0 }));
    }

    #[test]
    fn test_csv_export_quotes_fields() {
        let banks = vec![bank("b1", "Alpha, Main Road"), bank("b2", "Beta")];
        let loans = vec![loan("b1", "2024-05-01", Some(1000.0))];
        let report = build_report(ReportMode::BankWise, &loans, &banks, day("2024-05-02"), 300.0);

        let csv = report.to_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Label,Count,Total Valuation,Earnings");
        assert_eq!(lines[1], "\"Alpha, Main Road\",1,1000,300");
        assert_eq!(lines[2], "Beta,0,0,0");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_daily_csv_has_branch_and_customer() {
        let mut l = loan("b1", "2024-05-02", None);
        l.bank_name = Some("Alpha".to_string());
        l.customer_name = Some("Meena".to_string());
        let report = build_report(ReportMode::Daily, &[l], &[], day("2024-05-02"), 350.0);

        let csv = report.to_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Label,Branch,Customer,Count,Total Valuation,Earnings");
        assert!(lines[1].ends_with(",Alpha,Meena,1,0,350"));
    }

    #[test]
    fn test_print_reuses_table() {
        let (banks, loans) = scenario();
        let report = build_report(ReportMode::BankWise, &loans, &banks, day("2024-05-02"), 300.0);

        let table = report.to_table().to_string();
        let page = report.render_for_print();

        assert!(page.contains(&table));
        assert!(page.starts_with("Bank-wise Breakdown"));
        assert!(table.contains("Alpha"));
        assert!(table.contains("Totals"));
        assert!(table.contains("₹900"));
    }

    #[test]
    fn test_empty_report_table() {
        let report = build_report(ReportMode::Daily, &[], &[], day("2024-05-02"), 350.0);
        assert!(report.is_empty());
        assert_eq!(report.totals(), ReportTotals::default());
        assert!(report.to_table().to_string().contains("No records found."));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(ReportMode::parse("bank-wise", None).unwrap(), ReportMode::BankWise);
        assert_eq!(ReportMode::parse("Daily", None).unwrap(), ReportMode::Daily);
        assert!(matches!(ReportMode::parse("monthly", None).unwrap(), ReportMode::Monthly(_)));
        assert!(ReportMode::parse("monthly", Some("2024-99")).is_err());
        assert!(ReportMode::parse("weekly", None).is_err());
    }

    #[test]
    fn test_file_name() {
        let report = build_report(ReportMode::Daily, &[], &[], day("2024-05-02"), 350.0);
        let at = DateTime::from_timestamp_millis(1_718_000_000_000).unwrap();
        assert_eq!(report.file_name(at), "appraisal_report_daily_1718000000000.csv");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "0");
        assert_eq!(format_money(950.0), "950");
        assert_eq!(format_money(1500.0), "1,500");
        assert_eq!(format_money(1234567.5), "1,234,567.50");
    }
}
