// End-to-end flows through SqliteStore + Workspace

use appraisal_ledger::{
    build_report, resolve, ActorId, Bank, FeeSchedule, Loan, LoanFilter, RecordId, RecordStore,
    ReportMode, ReportRow, SaveAction, SqliteStore, Workspace,
};
use chrono::NaiveDate;

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Alpha and Beta with three loans in May 2024
fn seeded() -> (Workspace<SqliteStore>, String, String) {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut ws = Workspace::load(store, ActorId::new("appraiser-1").unwrap());

    assert!(ws.save_bank(&Bank::new("Beta")));
    assert!(ws.save_bank(&Bank::new("Alpha")));
    let alpha = ws.banks().iter().find(|b| b.name == "Alpha").unwrap().id.key();
    let beta = ws.banks().iter().find(|b| b.name == "Beta").unwrap().id.key();

    assert!(ws.save_loan(&Loan::new(&alpha, day("2024-05-01")).with_amount(Some(1000.0))));
    assert!(ws.save_loan(&Loan::new(&alpha, day("2024-05-02")).with_amount(Some(2000.0))));
    assert!(ws.save_loan(&Loan::new(&beta, day("2024-05-02")).with_amount(Some(500.0))));

    (ws, alpha, beta)
}

fn bank_wise_summary(rows: &[ReportRow]) -> Vec<(String, usize, f64, f64)> {
    rows.iter()
        .map(|r| (r.label().to_string(), r.count(), r.amount(), r.salary()))
        .collect()
}

#[test]
fn test_bank_wise_report_for_two_branches() {
    let (ws, _, _) = seeded();
    let report = build_report(ReportMode::BankWise, ws.loans(), ws.banks(), day("2024-05-02"), 300.0);

    assert_eq!(
        bank_wise_summary(&report.rows),
        vec![
            ("Alpha".to_string(), 2, 3000.0, 600.0),
            ("Beta".to_string(), 1, 500.0, 300.0),
        ]
    );
    assert_eq!(report.totals().count, 3);
    assert_eq!(report.orphaned.map(|o| o.count), Some(0));
}

#[test]
fn test_monthly_report_groups_by_day_newest_first() {
    let (ws, _, _) = seeded();
    let mode = ReportMode::parse("monthly", Some("2024-05")).unwrap();
    let report = build_report(mode, ws.loans(), ws.banks(), day("2024-05-02"), 300.0);

    let rows: Vec<(&str, usize, f64)> = report.rows.iter().map(|r| (r.label(), r.count(), r.amount())).collect();
    assert_eq!(rows, vec![("2024-05-02", 2, 2500.0), ("2024-05-01", 1, 1000.0)]);

    let other = ReportMode::parse("monthly", Some("2024-06")).unwrap();
    assert!(build_report(other, ws.loans(), ws.banks(), day("2024-05-02"), 300.0).is_empty());
}

#[test]
fn test_daily_report_has_one_row_per_loan() {
    let (ws, _, _) = seeded();
    let report = build_report(ReportMode::Daily, ws.loans(), ws.banks(), day("2024-05-02"), 350.0);

    assert_eq!(report.rows.len(), 2);
    assert!(report.rows.iter().all(|r| r.count() == 1 && r.salary() == 350.0));
    assert!(report
        .rows
        .iter()
        .all(|r| ws.loans().iter().any(|l| l.id.key() == r.label())));
}

#[test]
fn test_deleted_branch_leaves_orphaned_loans() {
    let (mut ws, _, beta) = seeded();
    assert!(ws.delete_bank(&beta));

    assert_eq!(ws.banks().len(), 1);
    assert_eq!(ws.loans().len(), 3, "loans survive their branch");

    let orphan = ws.loans().iter().find(|l| l.bank_id == beta).unwrap();
    assert_eq!(orphan.bank_display_name(), "Unknown");

    let today = day("2024-05-02");
    let bank_wise = build_report(ReportMode::BankWise, ws.loans(), ws.banks(), today, 300.0);
    assert_eq!(bank_wise.rows.len(), 1);
    assert_eq!(bank_wise.totals().count, 2);
    assert_eq!(bank_wise.totals().amount, 3000.0);
    let orphaned = bank_wise.orphaned.unwrap();
    assert_eq!((orphaned.count, orphaned.amount), (1, 500.0));

    // Views without a branch filter still count every loan
    let monthly = build_report(ReportMode::parse("monthly", Some("2024-05")).unwrap(), ws.loans(), ws.banks(), today, 300.0);
    assert_eq!(monthly.totals().count, 3);

    let fees = FeeSchedule::default();
    let stats = ws.dashboard(&fees, today);
    assert_eq!(stats.overall.count, 3);
    assert_eq!(stats.orphaned, 1);
    assert_eq!(stats.bank_wise.len(), 1);
}

#[test]
fn test_update_keeps_identity_and_count() {
    let (mut ws, _, _) = seeded();
    let mut loan = ws.loans().iter().find(|l| l.amount == Some(500.0)).unwrap().clone();
    let id = loan.id.clone();
    assert!(id.is_persisted());

    loan.amount = Some(750.0);
    loan.customer_name = Some("R. Iyer".to_string());
    assert!(ws.save_loan(&loan));

    assert_eq!(ws.loans().len(), 3);
    let updated = ws.loan(&id.key()).unwrap();
    assert_eq!(updated.amount, Some(750.0));
    assert_eq!(updated.customer_name.as_deref(), Some("R. Iyer"));
}

#[test]
fn test_pending_id_is_replaced_on_insert() {
    let (mut ws, alpha, _) = seeded();
    let mut loan = Loan::new(&alpha, day("2024-05-03"));
    loan.id = RecordId::classify("L-1718000000000");
    assert!(matches!(resolve(&loan.id), SaveAction::Insert));

    assert!(ws.save_loan(&loan));
    assert_eq!(ws.loans().len(), 4);
    assert!(ws.loans().iter().all(|l| l.id.is_persisted()));
    assert!(ws.loan("L-1718000000000").is_none());
}

#[test]
fn test_identity_examples() {
    assert!(matches!(
        resolve(&RecordId::classify("550e8400-e29b-41d4-a716-446655440000")),
        SaveAction::Update(_)
    ));
    assert!(matches!(resolve(&RecordId::classify("L-1718000000000")), SaveAction::Insert));
    assert!(matches!(resolve(&RecordId::classify("")), SaveAction::Insert));
}

#[test]
fn test_upper_case_bank_reference_is_one_branch_everywhere() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut ws = Workspace::load(store, ActorId::new("appraiser-1").unwrap());
    assert!(ws.save_bank(&Bank::new("Alpha")));
    let alpha = ws.banks()[0].id.key();

    let today = day("2024-05-02");
    assert!(ws.save_loan(&Loan::new(alpha.to_uppercase(), today).with_amount(Some(900.0))));

    let stats = ws.dashboard(&FeeSchedule::default(), today);
    assert_eq!(stats.bank_wise[0].count, 1);
    assert_eq!(stats.orphaned, 0);

    let daily = build_report(ReportMode::Daily, ws.loans(), ws.banks(), today, 350.0);
    assert!(matches!(&daily.rows[0], ReportRow::Daily { bank, .. } if bank == "Alpha"));

    let filter = LoanFilter { bank_id: Some(alpha.clone()), ..Default::default() };
    assert_eq!(ws.filtered_loans(&filter).len(), 1);

    assert!(ws.delete_bank(&alpha.to_uppercase()));
    assert!(ws.banks().is_empty());
}

#[test]
fn test_other_appraiser_sees_nothing() {
    let (ws, _, _) = seeded();
    let stranger = ActorId::new("appraiser-2").unwrap();

    assert!(ws.store().list_banks(&stranger).is_empty());
    assert!(ws.store().list_loans(&stranger).is_empty());
}

#[test]
fn test_aggregation_is_idempotent() {
    let (ws, _, _) = seeded();
    let fees = FeeSchedule::default();
    let today = day("2024-05-02");

    assert_eq!(ws.dashboard(&fees, today), ws.dashboard(&fees, today));
    assert_eq!(
        ws.report(ReportMode::BankWise, &fees, today),
        ws.report(ReportMode::BankWise, &fees, today)
    );
}
