use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use repairlog::{Config, DisplayRow, FileBackend, RecordBook, RecordForm, SaveOutcome, Store, rank_scored};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "repairlog")]
#[command(about = "RepairLog CLI - customer and job records for a repair shop")]
#[command(version)]
struct Cli {
    /// Path to a config file (default: per-user config.yaml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the record store (overrides config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new job record
    Add(FormArgs),

    /// Update fields of an existing record
    Update {
        id: String,
        #[command(flatten)]
        fields: FormArgs,
    },

    /// Delete a record
    Delete { id: String },

    /// Delete several records at once
    DeleteMany {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Search records by id or name, best match first
    Search { query: String },

    /// List all records
    List,

    /// Show one record as it would be loaded into the form
    Show { id: String },

    /// Print the customer message for a record
    Message { id: String },
}

#[derive(Args)]
struct FormArgs {
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    mobile: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    problem: Option<String>,
    #[arg(long)]
    amount: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    return_date: Option<String>,
}

impl FormArgs {
    /// Overlay the given flags onto `form`
    fn apply(self, mut form: RecordForm) -> RecordForm {
        let overlay = |slot: &mut String, value: Option<String>| {
            if let Some(v) = value {
                *slot = v;
            }
        };
        overlay(&mut form.date, self.date);
        overlay(&mut form.name, self.name);
        overlay(&mut form.mobile, self.mobile);
        overlay(&mut form.address, self.address);
        overlay(&mut form.model, self.model);
        overlay(&mut form.problem, self.problem);
        overlay(&mut form.ammount, self.amount);
        overlay(&mut form.status, self.status);
        overlay(&mut form.return_date, self.return_date);
        form
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let backend = FileBackend::open(&config.data_dir)
        .with_context(|| format!("Failed to open store at {}", config.data_dir.display()))?
        .with_quota(config.quota_bytes);
    let book = RecordBook::new(Store::with_key(backend, config.storage_key.clone())).with_shop_name(config.shop_name);

    match cli.command {
        Commands::Add(fields) => {
            let outcome = book.submit_form(fields.apply(RecordForm::default()))?;
            report(&outcome.save)?;
            println!("Saved record {}", outcome.id.bold());
        }
        Commands::Update { id, fields } => {
            let current = book.edit(&id).ok_or_else(|| eyre!("No record with id '{}'", id))?;
            let outcome = book.submit_form(fields.apply(RecordForm::from_record(&current)))?;
            report(&outcome.save)?;
            println!("Updated record {}", outcome.id.bold());
        }
        Commands::Delete { id } => {
            report(&book.delete(&id)?)?;
        }
        Commands::DeleteMany { ids } => {
            report(&book.delete_many(&ids)?)?;
        }
        Commands::Search { query } => {
            let records = book.store().load();
            match rank_scored(&records, &query) {
                None => print_rows(&records.iter().map(DisplayRow::from).collect::<Vec<_>>()),
                Some(hits) if hits.is_empty() => println!("No matching records"),
                Some(hits) => {
                    for (kind, record) in hits {
                        print_row(&DisplayRow::from(record));
                        println!("    {}", format!("matched: {}", kind).dimmed());
                    }
                }
            }
        }
        Commands::List => print_rows(&book.display_rows("")),
        Commands::Show { id } => {
            let record = book.edit(&id).ok_or_else(|| eyre!("No record with id '{}'", id))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Message { id } => {
            let message = book.message(&id).ok_or_else(|| eyre!("No record with id '{}'", id))?;
            println!("{}", message);
        }
    }

    Ok(())
}

/// Tell the user about evictions; a failed save is an error
fn report(outcome: &SaveOutcome) -> Result<()> {
    match outcome {
        SaveOutcome::Saved { .. } => Ok(()),
        SaveOutcome::Purged { removed, .. } => {
            eprintln!(
                "{}",
                format!("Storage was full - removed oldest {} record(s) to save data.", removed).yellow()
            );
            Ok(())
        }
        SaveOutcome::Failed { .. } => Err(eyre!("Unable to save: storage is full and could not be purged")),
    }
}

fn print_rows(rows: &[DisplayRow]) {
    if rows.is_empty() {
        println!("No records");
        return;
    }
    for row in rows {
        print_row(row);
    }
}

fn print_row(row: &DisplayRow) {
    println!(
        "{}  {}  {}  {}  {}  {}  {}  {}  {}",
        row.id.bold(),
        row.date,
        row.name.cyan(),
        row.mobile,
        row.model,
        row.problem,
        row.ammount,
        row.status.green(),
        row.return_date
    );
}
