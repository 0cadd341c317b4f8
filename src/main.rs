use anyhow::{bail, Context, Result};
use billing_catalog::{
    logging, loader, parse_directives, Catalog, CatalogConfig, CatalogItem, InsertStatus,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "billing-catalog", version, about = "Billable item catalog with duplicate reconciliation")]
struct Cli {
    /// Database file (overrides config and BILLING_CATALOG_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (default: ~/.config/billing-catalog/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import items from CSV through the insertion policy
    Import {
        csv: PathBuf,
        /// Insert exact duplicates instead of merging them
        #[arg(long)]
        allow_duplicates: bool,
        /// Load as vendor baseline data
        #[arg(long, conflicts_with = "allow_duplicates")]
        system: bool,
    },
    /// Pre-flight duplicate check for a CSV batch (prints JSON)
    Check { csv: PathBuf },
    /// Apply resolved directives (JSON) to a CSV batch
    Reconcile { csv: PathBuf, directives: PathBuf },
    /// Collapse duplicate clusters in the whole catalog
    Cleanup,
    /// List items as JSON
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long, conflicts_with = "user")]
        system: bool,
        #[arg(long)]
        user: bool,
    },
    /// List saved bills as JSON
    Bills,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CatalogConfig::load_from(path)?.with_env_overrides(),
        None => CatalogConfig::load()?,
    };
    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }

    logging::init(&config.log_level);

    let catalog = Catalog::open(&config)
        .with_context(|| format!("Failed to open catalog at {}", config.database_path.display()))?;

    match cli.command {
        Command::Import { csv, allow_duplicates, system } => {
            run_import(&catalog, &csv, allow_duplicates, system)
        }
        Command::Check { csv } => run_check(&catalog, &csv),
        Command::Reconcile { csv, directives } => run_reconcile(&catalog, &csv, &directives),
        Command::Cleanup => run_cleanup(&catalog),
        Command::List { category, system, user } => {
            let items = if system {
                catalog.get_system_items()?
            } else if user {
                catalog.get_user_items()?
            } else {
                catalog.get_all_items(category.as_deref())?
            };
            let items: Vec<CatalogItem> = match (&category, system || user) {
                (Some(c), true) => items.into_iter().filter(|i| &i.category == c).collect(),
                _ => items,
            };
            println!("{}", serde_json::to_string_pretty(&items)?);
            Ok(())
        }
        Command::Bills => {
            println!("{}", serde_json::to_string_pretty(&catalog.get_bills()?)?);
            Ok(())
        }
    }
}

fn run_import(catalog: &Catalog, csv: &Path, allow_duplicates: bool, system: bool) -> Result<()> {
    println!("📂 Loading {}...", csv.display());
    let rows = loader::load_csv(csv)?;
    println!("✓ Read {} rows", rows.len());

    let (valid, failures) = loader::split_rows(rows);
    let mut rejected = failures.len();
    for (row, e) in &failures {
        eprintln!("✗ Row {}: {}", row, e);
    }

    if system {
        let items: Vec<CatalogItem> = valid.into_iter().map(|(_, item)| item).collect();
        let inserted = catalog.import_system_data_default(&items)?;
        println!("✓ System items inserted: {}", inserted);
    } else {
        let (mut inserted, mut merged) = (0, 0);
        for (row, item) in &valid {
            match catalog.add_item_with_duplicate_handling(item, allow_duplicates) {
                Ok(outcome) if outcome.status == InsertStatus::Merged => merged += 1,
                Ok(_) => inserted += 1,
                Err(e) => {
                    eprintln!("✗ Row {}: {}", row, e);
                    rejected += 1;
                }
            }
        }
        println!("✓ Inserted: {}", inserted);
        println!("✓ Merged into existing: {}", merged);
    }

    println!("✓ Rejected: {}", rejected);
    Ok(())
}

fn run_check(catalog: &Catalog, csv: &Path) -> Result<()> {
    let mut items = Vec::new();
    for (index, row) in loader::load_csv(csv)?.into_iter().enumerate() {
        match row {
            Ok(item) => items.push(item),
            Err(e) => bail!("Row {} is invalid: {}", index + 1, e),
        }
    }

    let report = catalog.check_duplicates(&items)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_reconcile(catalog: &Catalog, csv: &Path, directives_path: &Path) -> Result<()> {
    let rows = loader::load_csv(csv)?;

    let text = std::fs::read_to_string(directives_path)
        .with_context(|| format!("Failed to read directives {}", directives_path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).context("Directives file is not valid JSON")?;
    let directives = parse_directives(&value);

    let report = catalog.bulk_import_parsed(rows, &directives);
    println!("{}", report.summary());
    for error in &report.errors {
        eprintln!("✗ {}", error);
    }
    Ok(())
}

fn run_cleanup(catalog: &Catalog) -> Result<()> {
    let report = catalog.cleanup_duplicates()?;
    println!("🧹 {}", report.message);
    println!("✓ Duplicates removed: {}", report.duplicates_removed);
    println!("✓ Items merged: {}", report.items_merged);
    for error in &report.errors {
        eprintln!("✗ {}", error);
    }
    Ok(())
}
