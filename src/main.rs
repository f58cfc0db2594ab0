use anyhow::{anyhow, bail, Context, Result};
use appraisal_ledger::{
    filter_banks, init_logging, insight_within, provider_from_config, ActorId, AppConfig, Bank,
    DashboardStats, Loan, LoanFilter, ReportMode, SqliteStore, Workspace,
};
use appraisal_ledger::reports::format_money;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Gold-loan appraisal ledger
#[derive(Parser)]
#[command(name = "appraisal-ledger", version, about)]
struct Cli {
    /// Config file (default: ./appraisal.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Appraiser identity (overrides config)
    #[arg(long, global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage partner bank branches
    Bank {
        #[command(subcommand)]
        action: BankCommand,
    },
    /// Manage loan appraisal entries
    Loan {
        #[command(subcommand)]
        action: LoanCommand,
    },
    /// Today / month / overall statistics and the insight text
    Dashboard,
    /// Bank-wise, monthly or daily report
    Report(ReportArgs),
}

#[derive(Subcommand)]
enum BankCommand {
    List {
        #[arg(long)]
        search: Option<String>,
    },
    Add {
        name: String,
    },
    Rename {
        id: String,
        name: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum LoanCommand {
    List {
        /// Loan id or customer name
        #[arg(long)]
        search: Option<String>,
        /// Bank id or name
        #[arg(long)]
        bank: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Add(LoanFields),
    Edit {
        id: String,
        #[command(flatten)]
        fields: LoanFields,
    },
    Delete {
        id: String,
    },
}

#[derive(Args)]
struct LoanFields {
    /// Bank id or name
    #[arg(long)]
    bank: Option<String>,
    /// Appraisal date (default: today)
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long)]
    amount: Option<f64>,
    #[arg(long)]
    customer: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct ReportArgs {
    /// bankwise | monthly | daily
    mode: String,
    /// Month for the monthly report (YYYY-MM, default: current month)
    #[arg(long)]
    month: Option<String>,
    /// Write CSV to this file (or into this directory)
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Print the printable page instead of the bare table
    #[arg(long)]
    print: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let actor = ActorId::new(cli.actor.clone().unwrap_or_else(|| config.actor.clone()))?;

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    let mut ws = Workspace::load(store, actor);

    match cli.command {
        Command::Bank { action } => run_bank(&mut ws, action),
        Command::Loan { action } => run_loan(&mut ws, action),
        Command::Dashboard => run_dashboard(&ws, &config).await,
        Command::Report(args) => run_report(&ws, &config, args),
    }
}

// ============================================================================
// BANKS
// ============================================================================

fn run_bank(ws: &mut Workspace<SqliteStore>, action: BankCommand) -> Result<()> {
    match action {
        BankCommand::List { search } => {
            let banks = filter_banks(ws.banks(), search.as_deref().unwrap_or(""));
            if banks.is_empty() {
                println!("No branches found.");
            }
            for bank in banks {
                println!("{}  {}", bank.id, bank.name);
            }
        }
        BankCommand::Add { name } => {
            require(ws.save_bank(&Bank::new(name.trim())), "save bank")?;
            println!("✓ Branch added ({} total)", ws.banks().len());
        }
        BankCommand::Rename { id, name } => {
            let bank = ws.bank(&id).ok_or_else(|| anyhow!("No branch with id {}", id))?.renamed(name.trim());
            require(ws.save_bank(&bank), "rename bank")?;
            println!("✓ Branch renamed to {}", bank.name);
        }
        BankCommand::Delete { id } => {
            require(ws.delete_bank(&id), "delete bank")?;
            println!("✓ Branch deleted. Existing appraisals remain.");
        }
    }
    Ok(())
}

// ============================================================================
// LOANS
// ============================================================================

fn run_loan(ws: &mut Workspace<SqliteStore>, action: LoanCommand) -> Result<()> {
    match action {
        LoanCommand::List { search, bank, date } => {
            let bank_id = bank.map(|b| resolve_bank(ws, &b)).transpose()?;
            let filter = LoanFilter { search, bank_id, date };
            let loans = ws.filtered_loans(&filter);

            if loans.is_empty() {
                if filter.is_empty() {
                    println!("No appraisals yet.");
                } else {
                    println!("No appraisals match the filter.");
                }
            }
            for loan in loans {
                println!(
                    "{}  {}  {:<20}  {:>12}  {}",
                    loan.id,
                    loan.date,
                    loan.bank_display_name(),
                    loan.amount
                        .map(|a| format!("₹{}", format_money(a)))
                        .unwrap_or_else(|| "-".to_string()),
                    loan.customer_name.as_deref().unwrap_or("-"),
                );
            }
        }
        LoanCommand::Add(fields) => {
            let bank = fields.bank.as_deref().ok_or_else(|| anyhow!("--bank is required"))?;
            let bank_id = resolve_bank(ws, bank)?;
            let date = fields.date.unwrap_or_else(|| Utc::now().date_naive());

            let loan = Loan::new(bank_id, date)
                .with_amount(fields.amount)
                .with_customer(fields.customer)
                .with_notes(fields.notes)
                .normalized();
            require(ws.save_loan(&loan), "save loan")?;
            println!("✓ Appraisal recorded for {} ({} total)", date, ws.loans().len());
        }
        LoanCommand::Edit { id, fields } => {
            let mut loan = ws.loan(&id).cloned().ok_or_else(|| anyhow!("No appraisal with id {}", id))?;
            if let Some(bank) = fields.bank.as_deref() {
                loan.bank_id = resolve_bank(ws, bank)?;
            }
            if let Some(date) = fields.date {
                loan.date = date;
            }
            if fields.amount.is_some() {
                loan.amount = fields.amount;
            }
            if fields.customer.is_some() {
                loan.customer_name = fields.customer;
            }
            if fields.notes.is_some() {
                loan.notes = fields.notes;
            }
            require(ws.save_loan(&loan.normalized()), "update loan")?;
            println!("✓ Appraisal updated");
        }
        LoanCommand::Delete { id } => {
            require(ws.delete_loan(&id), "delete loan")?;
            println!("✓ Appraisal deleted");
        }
    }
    Ok(())
}

/// Accept a bank id or a (case-insensitive) bank name
fn resolve_bank(ws: &Workspace<SqliteStore>, bank: &str) -> Result<String> {
    if let Some(found) = ws.bank(bank) {
        return Ok(found.id.key());
    }
    ws.banks()
        .iter()
        .find(|b| b.name.eq_ignore_ascii_case(bank.trim()))
        .map(|b| b.id.key())
        .ok_or_else(|| anyhow!("No branch matching {:?}", bank))
}

fn require(ok: bool, what: &str) -> Result<()> {
    if !ok {
        bail!("Could not {} (see log for details)", what);
    }
    Ok(())
}

// ============================================================================
// DASHBOARD
// ============================================================================

async fn run_dashboard(ws: &Workspace<SqliteStore>, config: &AppConfig) -> Result<()> {
    let today = Utc::now().date_naive();
    let stats = ws.dashboard(&config.fees, today);

    // Numbers first; the insight may take a while
    print_dashboard(&stats);

    let provider = provider_from_config(config);
    let insight = insight_within(
        provider.as_ref(),
        ws.loans(),
        ws.banks(),
        today,
        Duration::from_secs(config.insight.timeout_secs),
    )
    .await;

    println!("\n✨ Appraiser Intelligence");
    println!("   {}", insight);
    Ok(())
}

fn print_dashboard(stats: &DashboardStats) {
    println!("📊 Dashboard Overview ({})", stats.as_of);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Today's Appraisals: {:>6}   Salary: ₹{}", stats.today.count, format_money(stats.today.earnings));
    println!("This Month:         {:>6}   Salary: ₹{}", stats.month.count, format_money(stats.month.earnings));
    println!("Total Overall:      {:>6}   Earnings: ₹{}", stats.overall.count, format_money(stats.overall.earnings));
    println!("Active Banks:       {:>6}", stats.active_banks);
    println!("Rate: ₹{} / loan", format_money(stats.fee_per_loan));

    println!("\n🏦 Salary Breakdown");
    if stats.bank_wise.is_empty() {
        println!("   No data yet.");
    }
    for bank in &stats.bank_wise {
        println!(
            "   {:<30} {:>4} loans   ₹{}",
            bank.bank_name,
            bank.count,
            format_money(bank.earnings)
        );
    }
    if stats.orphaned > 0 {
        println!("   ({} appraisals reference deleted branches)", stats.orphaned);
    }
}

// ============================================================================
// REPORTS
// ============================================================================

fn run_report(ws: &Workspace<SqliteStore>, config: &AppConfig, args: ReportArgs) -> Result<()> {
    let mode = ReportMode::parse(&args.mode, args.month.as_deref())?;
    let report = ws.report(mode, &config.fees, Utc::now().date_naive());

    if let Some(target) = args.csv {
        let path = csv_target(&target, &report.file_name(Utc::now()));
        let file = std::fs::File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
        report.write_csv(file).context("Failed to write CSV")?;
        println!("✓ CSV written to {}", path.display());
        return Ok(());
    }

    if args.print {
        print!("{}", report.render_for_print());
    } else {
        println!("{}", report.heading());
        println!("{}", report);
    }
    Ok(())
}

fn csv_target(target: &Path, default_name: &str) -> PathBuf {
    if target.is_dir() {
        target.join(default_name)
    } else {
        target.to_path_buf()
    }
}
