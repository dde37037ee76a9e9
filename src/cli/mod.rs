use std::fs::File;
use std::io::{stdin, stdout, BufRead, Read, Write};

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::application::{
    AppError, Command, Conversations, Intent, LedgerEntry, LedgerService, Outcome, Step,
    DEFAULT_HISTORY_LIMIT, DEFAULT_TIMEOUT_SECS,
};
use crate::domain::{
    format_amount, parse_amount, Amount, PeriodSummary, Transaction, TransactionKind,
};
use crate::io::{export_csv, export_json, ImportOptions};

/// Tally - shared income and expense ledger
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Keep an income and expense ledger per account, with a running balance")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "TALLY_DATABASE", default_value = "tally.db", global = true)]
    pub database: String,

    /// Account (chat) the command applies to
    #[arg(short, long, env = "TALLY_ACCOUNT", default_value = "default", global = true)]
    pub account: String,

    /// Name recorded as the author of new entries (defaults to $USER)
    #[arg(long, env = "TALLY_AUTHOR", global = true)]
    pub author: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Record an income
    Income {
        /// Amount received (e.g., "1500" or "1500.50")
        amount: String,

        /// Where the money came from
        source: Vec<String>,
    },

    /// Record an expense
    Expense {
        /// Amount spent
        amount: String,

        /// What the money was spent on
        #[arg(required = true)]
        category: Vec<String>,
    },

    /// Show the current balance
    Balance,

    /// List the latest entries with their numbers
    History {
        /// Maximum number of entries to show
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },

    /// Change the amount of an entry
    Edit {
        /// Entry number, as shown by `history`
        position: usize,

        /// New amount
        amount: String,
    },

    /// Delete an entry. Later entries are renumbered
    Delete {
        /// Entry number, as shown by `history`
        position: usize,
    },

    /// Delete every entry of the account and zero the balance
    Reset,

    /// Export the ledger
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
    },

    /// Append the entries of a CSV file to the ledger
    Import {
        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Validate and show the resulting balance without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Show or change account settings
    Settings {
        /// Currency shown next to amounts (empty to clear)
        #[arg(long)]
        currency: Option<String>,

        /// Day of the month the budgeting period starts (0 to clear)
        #[arg(long)]
        salary_day: Option<u32>,
    },

    /// Show entries and totals of the current budgeting period
    Period,

    /// Verify that balances match the ledger
    Check {
        /// Check every stored account instead of the selected one
        #[arg(long)]
        all: bool,
    },

    /// Interactive session answering one line at a time
    Chat {
        /// Seconds a question waits for an answer
        #[arg(
            long,
            default_value_t = DEFAULT_TIMEOUT_SECS,
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        timeout_secs: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

/// Install the tracing subscriber. `RUST_LOG` takes precedence over `verbose`.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose { "tally=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        init_logging(self.verbose);

        match self.dispatch().await {
            Err(err) => match err.downcast_ref::<AppError>() {
                Some(app_err) if app_err.is_informational() => {
                    println!("{}", app_err);
                    Ok(())
                }
                _ => Err(err),
            },
            ok => ok,
        }
    }

    fn author(&self) -> String {
        self.author
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    async fn dispatch(self) -> Result<()> {
        let author = self.author();
        let key = self.account.as_str();

        if let Commands::Init = self.command {
            LedgerService::init(&self.database).await?;
            println!("Database initialized: {}", self.database);
            return Ok(());
        }

        let mut service = LedgerService::connect(&self.database).await?;
        let currency = service.settings(key).await?.currency;
        let currency = currency.as_deref();

        match self.command {
            Commands::Init => {}

            Commands::Income { amount, source } => {
                let command = Command::Record {
                    kind: TransactionKind::Income,
                    category: source.join(" "),
                    amount: parse_amount(&amount).map_err(AppError::from)?,
                };
                let outcome = service.execute(key, &author, command).await?;
                println!("{}", render(&outcome, currency));
            }

            Commands::Expense { amount, category } => {
                let command = Command::Record {
                    kind: TransactionKind::Expense,
                    category: category.join(" "),
                    amount: parse_amount(&amount).map_err(AppError::from)?,
                };
                let outcome = service.execute(key, &author, command).await?;
                println!("{}", render(&outcome, currency));
            }

            Commands::Balance => {
                let outcome = service.execute(key, &author, Command::Balance).await?;
                println!("{}", render(&outcome, currency));
            }

            Commands::History { limit } => {
                let command = Command::History { limit: Some(limit) };
                let outcome = service.execute(key, &author, command).await?;
                println!("{}", render(&outcome, currency));
            }

            Commands::Edit { position, amount } => {
                let command = Command::Edit {
                    position,
                    amount: parse_amount(&amount).map_err(AppError::from)?,
                };
                let outcome = service.execute(key, &author, command).await?;
                println!("{}", render(&outcome, currency));
            }

            Commands::Delete { position } => {
                let outcome = service
                    .execute(key, &author, Command::Delete { position })
                    .await?;
                println!("{}", render(&outcome, currency));
            }

            Commands::Reset => {
                let outcome = service.execute(key, &author, Command::Reset).await?;
                println!("{}", render(&outcome, currency));
            }

            Commands::Period => {
                let outcome = service.execute(key, &author, Command::Period).await?;
                println!("{}", render(&outcome, currency));
            }

            Commands::Export { output, format } => {
                run_export_command(&mut service, key, output.as_deref(), format).await?;
            }

            Commands::Import { input, dry_run } => {
                run_import_command(&mut service, key, input.as_deref(), dry_run, currency).await?;
            }

            Commands::Settings {
                currency,
                salary_day,
            } => {
                run_settings_command(&mut service, key, currency, salary_day).await?;
            }

            Commands::Check { all } => {
                run_check_command(&mut service, key, all).await?;
            }

            Commands::Chat { timeout_secs } => {
                run_chat(&mut service, key, &author, timeout_secs, currency).await?;
            }
        }

        Ok(())
    }
}

async fn run_export_command(
    service: &mut LedgerService,
    key: &str,
    output: Option<&str>,
    format: ExportFormat,
) -> Result<()> {
    let account = service.export_account(key).await?;

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match format {
        ExportFormat::Csv => {
            let count = export_csv(account.ledger.entries(), writer)?;
            if output.is_some() {
                eprintln!("Exported {} entries", count);
            }
        }
        ExportFormat::Json => {
            let snapshot = export_json(&account, writer)?;
            if output.is_some() {
                eprintln!(
                    "Exported account {}: {} entries, balance {}",
                    snapshot.account,
                    snapshot.transactions.len(),
                    format_amount(snapshot.balance)
                );
            }
        }
    }

    Ok(())
}

async fn run_import_command(
    service: &mut LedgerService,
    key: &str,
    input: Option<&str>,
    dry_run: bool,
    currency: Option<&str>,
) -> Result<()> {
    let mut text = String::new();
    match input {
        Some(path) => {
            File::open(path)
                .with_context(|| format!("Failed to open input file: {}", path))?
                .read_to_string(&mut text)
                .with_context(|| format!("Failed to read input file: {}", path))?;
        }
        None => {
            stdin()
                .read_to_string(&mut text)
                .context("Failed to read from stdin")?;
        }
    }

    let summary = service
        .import_csv(key, &text, ImportOptions { dry_run })
        .await?;

    if summary.dry_run {
        println!("Validation successful, nothing was saved");
    } else {
        println!("Import complete");
    }
    println!("  Entries: {}", summary.imported);
    println!("  Balance: {}", money(summary.balance, currency));

    Ok(())
}

async fn run_settings_command(
    service: &mut LedgerService,
    key: &str,
    currency: Option<String>,
    salary_day: Option<u32>,
) -> Result<()> {
    let settings = if currency.is_none() && salary_day.is_none() {
        service.settings(key).await?
    } else {
        service.update_settings(key, currency, salary_day).await?
    };

    println!("Settings for {}", key);
    println!(
        "  Currency:   {}",
        settings.currency.as_deref().unwrap_or("(none)")
    );
    match settings.salary_day {
        Some(day) => println!("  Salary day: {}", day),
        None => println!("  Salary day: (calendar month)"),
    }
    Ok(())
}

async fn run_check_command(service: &mut LedgerService, key: &str, all: bool) -> Result<()> {
    let keys = if all {
        service.account_keys().await?
    } else {
        vec![key.to_string()]
    };

    println!("Checking ledger integrity...");
    let mut failures = 0;
    for key in &keys {
        let report = service.verify(key).await?;
        let stored = report
            .stored
            .map(format_amount)
            .unwrap_or_else(|| "-".to_string());
        let status = if report.is_consistent() { "OK" } else { "MISMATCH" };
        println!(
            "  {:<20} {:>5} entries  cached {:>12}  stored {:>12}  ledger {:>12}  {}",
            report.account,
            report.transactions,
            format_amount(report.cached),
            stored,
            format_amount(report.recomputed),
            status
        );
        if !report.is_consistent() {
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{} account(s) failed the integrity check", failures);
    }
    println!("All balances match their ledgers");
    Ok(())
}

const CHAT_HELP: &str = "Commands: /income /expense /edit /delete /balance /history [n] \
/period /reset /cancel /help /quit";

/// One line typed in a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChatInput {
    Begin(Intent),
    Run(Command),
    Cancel,
    Help,
    Quit,
    Unknown(String),
    /// A known command with bad arguments, carries the reply
    Invalid(String),
    Text(String),
}

fn parse_chat_line(line: &str) -> ChatInput {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return ChatInput::Text(line.to_string());
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or_default().to_lowercase();
    match name.as_str() {
        "income" => ChatInput::Begin(Intent::AddIncome),
        "expense" => ChatInput::Begin(Intent::AddExpense),
        "edit" => ChatInput::Begin(Intent::Edit),
        "delete" => ChatInput::Begin(Intent::Delete),
        "balance" => ChatInput::Run(Command::Balance),
        "history" => match words.next() {
            None => ChatInput::Run(Command::History {
                limit: Some(DEFAULT_HISTORY_LIMIT),
            }),
            Some(count) => match count.parse::<usize>() {
                Ok(limit) if limit > 0 => ChatInput::Run(Command::History { limit: Some(limit) }),
                _ => ChatInput::Invalid(format!(
                    "'{}' is not a number of entries. Usage: /history [count]",
                    count
                )),
            },
        },
        "period" => ChatInput::Run(Command::Period),
        "reset" => ChatInput::Run(Command::Reset),
        "cancel" => ChatInput::Cancel,
        "help" | "start" => ChatInput::Help,
        "quit" | "exit" => ChatInput::Quit,
        _ => ChatInput::Unknown(line.to_string()),
    }
}

async fn run_chat(
    service: &mut LedgerService,
    key: &str,
    author: &str,
    timeout_secs: u32,
    currency: Option<&str>,
) -> Result<()> {
    let mut conversations = Conversations::new(TimeDelta::seconds(i64::from(timeout_secs)));
    println!("{}", CHAT_HELP);

    for line in stdin().lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        let now = Utc::now();

        let reply = match parse_chat_line(&line) {
            ChatInput::Quit => break,
            ChatInput::Help => CHAT_HELP.to_string(),
            ChatInput::Cancel => {
                if conversations.cancel(key) {
                    "Cancelled.".to_string()
                } else {
                    "Nothing to cancel.".to_string()
                }
            }
            ChatInput::Begin(intent) => conversations.begin(key, intent, now),
            ChatInput::Run(command) => {
                conversations.cancel(key);
                execute_reply(service, key, author, command, currency).await
            }
            ChatInput::Invalid(message) => message,
            ChatInput::Unknown(text) => {
                format!("Unknown command {}. Type /help for the list.", text)
            }
            ChatInput::Text(text) => match conversations.feed(key, &text, now) {
                Step::Prompt(prompt) | Step::Retry(prompt) => prompt,
                Step::Ready(command) => {
                    execute_reply(service, key, author, command, currency).await
                }
                Step::Expired => "That question timed out, start again.".to_string(),
                Step::Idle => "Type /help for the list of commands.".to_string(),
            },
        };
        println!("{}", reply);
    }

    Ok(())
}

/// Run a command and turn the outcome, or the error, into a reply.
async fn execute_reply(
    service: &mut LedgerService,
    key: &str,
    author: &str,
    command: Command,
    currency: Option<&str>,
) -> String {
    match service.execute(key, author, command).await {
        Ok(outcome) => render(&outcome, currency),
        Err(err) => err.to_string(),
    }
}

fn money(amount: Amount, currency: Option<&str>) -> String {
    match currency {
        Some(code) => format!("{} {}", format_amount(amount), code),
        None => format_amount(amount),
    }
}

fn render(outcome: &Outcome, currency: Option<&str>) -> String {
    match outcome {
        Outcome::Recorded(recorded) => format!(
            "Recorded entry {}: {}\nBalance: {}",
            recorded.position,
            describe(&recorded.transaction, currency),
            money(recorded.balance, currency)
        ),
        Outcome::Balance(balance) => format!("Balance: {}", money(*balance, currency)),
        Outcome::History(entries) => entries
            .iter()
            .map(|entry| render_entry(entry, currency))
            .collect::<Vec<_>>()
            .join("\n"),
        Outcome::Edited(edited) => format!(
            "Entry {} changed from {} to {}\nBalance: {}",
            edited.position,
            money(edited.previous.amount, currency),
            money(edited.transaction.amount, currency),
            money(edited.balance, currency)
        ),
        Outcome::Deleted(deleted) => format!(
            "Deleted entry {}: {}\nBalance: {}",
            deleted.position,
            describe(&deleted.transaction, currency),
            money(deleted.balance, currency)
        ),
        Outcome::Reset => format!("Ledger cleared. Balance: {}", money(Amount::ZERO, currency)),
        Outcome::Period(summary) => render_period(summary, currency),
    }
}

/// Kind, amount and category, skipping an empty category.
fn describe(transaction: &Transaction, currency: Option<&str>) -> String {
    let mut text = format!("{} {}", transaction.kind, money(transaction.amount, currency));
    if !transaction.category.is_empty() {
        text.push(' ');
        text.push_str(&transaction.category);
    }
    text
}

fn render_entry(entry: &LedgerEntry, currency: Option<&str>) -> String {
    let t = &entry.transaction;
    format!(
        "{}. {} {} - {}",
        entry.position,
        describe(t, currency),
        t.timestamp.format("%Y-%m-%d %H:%M"),
        t.author
    )
}

fn render_period(summary: &PeriodSummary, currency: Option<&str>) -> String {
    let mut lines = vec![format!("Period since {}", summary.start.format("%Y-%m-%d"))];
    for (position, transaction) in &summary.entries {
        lines.push(render_entry(
            &LedgerEntry {
                position: *position,
                transaction: transaction.clone(),
            },
            currency,
        ));
    }
    lines.push(format!("Income:  {}", money(summary.totals.income, currency)));
    lines.push(format!("Expense: {}", money(summary.totals.expense, currency)));
    lines.push(format!("Net:     {}", money(summary.totals.net(), currency)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::application::Recorded;
    use crate::domain::{NewTransaction, Totals};

    fn expense(amount: Amount, category: &str) -> Transaction {
        Transaction::from_new(
            NewTransaction::expense(amount)
                .with_author("bob")
                .with_category(category)
                .with_timestamp(
                    NaiveDate::from_ymd_opt(2024, 3, 5)
                        .unwrap()
                        .and_hms_opt(12, 30, 0)
                        .unwrap()
                        .and_utc(),
                ),
        )
    }

    #[test]
    fn test_parse_chat_commands() {
        assert_eq!(parse_chat_line("/income"), ChatInput::Begin(Intent::AddIncome));
        assert_eq!(parse_chat_line(" /Expense "), ChatInput::Begin(Intent::AddExpense));
        assert_eq!(
            parse_chat_line("/history 5"),
            ChatInput::Run(Command::History { limit: Some(5) })
        );
        assert_eq!(
            parse_chat_line("/history"),
            ChatInput::Run(Command::History {
                limit: Some(DEFAULT_HISTORY_LIMIT)
            })
        );
        assert_eq!(parse_chat_line("/quit"), ChatInput::Quit);
        assert!(matches!(parse_chat_line("/history 0"), ChatInput::Invalid(_)));
        assert_eq!(parse_chat_line("/bogus"), ChatInput::Unknown("/bogus".to_string()));
        assert_eq!(parse_chat_line(" 42.50 "), ChatInput::Text("42.50".to_string()));
    }

    #[test]
    fn test_bad_history_count_gets_usage() {
        let ChatInput::Invalid(reply) = parse_chat_line("/history abc") else {
            panic!("expected a usage reply");
        };
        assert!(reply.contains("'abc'"));
        assert!(reply.contains("Usage: /history"));
        assert!(matches!(parse_chat_line("/history -3"), ChatInput::Invalid(_)));
    }

    #[test]
    fn test_chat_timeout_must_be_positive() {
        for bad in ["0", "-5", "abc", "99999999999"] {
            assert!(
                Cli::try_parse_from(["tally", "chat", "--timeout-secs", bad]).is_err(),
                "accepted --timeout-secs {}",
                bad
            );
        }

        let cli = Cli::try_parse_from(["tally", "chat", "--timeout-secs", "60"]).unwrap();
        assert!(matches!(cli.command, Commands::Chat { timeout_secs: 60 }));

        let cli = Cli::try_parse_from(["tally", "chat"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Chat { timeout_secs } if timeout_secs == DEFAULT_TIMEOUT_SECS
        ));
    }

    #[test]
    fn test_salary_day_zero_parses() {
        let cli = Cli::try_parse_from(["tally", "settings", "--salary-day", "0"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Settings { salary_day: Some(0), currency: None }
        ));
    }

    #[test]
    fn test_render_history_line() {
        let entry = LedgerEntry {
            position: 3,
            transaction: expense(dec!(40), "food"),
        };
        assert_eq!(
            render_entry(&entry, Some("EUR")),
            "3. Expense 40.00 EUR food 2024-03-05 12:30 - bob"
        );
    }

    #[test]
    fn test_render_recorded_and_balance() {
        let outcome = Outcome::Recorded(Recorded {
            position: 2,
            transaction: expense(dec!(40), "food"),
            balance: dec!(60),
        });
        assert_eq!(
            render(&outcome, None),
            "Recorded entry 2: Expense 40.00 food\nBalance: 60.00"
        );
        assert_eq!(
            render(&Outcome::Balance(dec!(-0.5)), Some("USD")),
            "Balance: -0.50 USD"
        );
    }

    #[test]
    fn test_render_period_totals() {
        let summary = PeriodSummary {
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            entries: vec![(1, expense(dec!(40), "food"))],
            totals: Totals {
                income: dec!(0),
                expense: dec!(40),
            },
        };
        let text = render(&Outcome::Period(summary), None);
        assert!(text.starts_with("Period since 2024-03-01"));
        assert!(text.contains("1. Expense 40.00 food"));
        assert!(text.ends_with("Net:     -40.00"));
    }
}
