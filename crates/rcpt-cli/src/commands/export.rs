//! Export command - write stored receipts as CSV or JSON.

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Args;
use console::style;
use rust_decimal::Decimal;
use tracing::info;

use rcpt_core::analytics::sort;
use rcpt_core::export::{to_csv, to_json};
use rcpt_core::{Category, Currency, SearchFilters, SortKey};

use super::{load_config, open_store};

/// Arguments for the export command.
#[derive(Args)]
pub struct ExportArgs {
    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: ExportFormat,

    /// Database file (default: from configuration)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Vendor name or part of it
    #[arg(long)]
    vendor: Option<String>,

    /// Match vendors approximately
    #[arg(long)]
    fuzzy: bool,

    /// Earliest transaction date (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Latest transaction date (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    #[arg(long)]
    min_amount: Option<Decimal>,

    #[arg(long)]
    max_amount: Option<Decimal>,

    #[arg(long)]
    category: Option<Category>,

    #[arg(long)]
    currency: Option<Currency>,

    /// Only receipts at or above this confidence (0-1)
    #[arg(long)]
    min_confidence: Option<f32>,

    /// Maximum number of receipts
    #[arg(long)]
    limit: Option<usize>,

    /// Sort by date, amount, vendor, category, confidence or currency
    #[arg(long)]
    sort: Option<SortKey>,

    /// Sort ascending instead of descending
    #[arg(long)]
    ascending: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportArgs {
    fn filters(&self) -> SearchFilters {
        SearchFilters {
            vendor: self.vendor.clone(),
            date_from: self.from,
            date_to: self.to,
            amount_min: self.min_amount,
            amount_max: self.max_amount,
            category: self.category,
            currency: self.currency,
            min_confidence: self.min_confidence,
            fuzzy: self.fuzzy,
            limit: self.limit,
        }
    }
}

pub async fn run(args: ExportArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let db_path = args.database.clone().unwrap_or(config.database.path);

    let filters = args.filters();
    filters.validate()?;

    let store = open_store(&db_path)?;
    let mut receipts = store.search(&filters)?;
    if let Some(key) = args.sort {
        sort(&mut receipts, key, args.ascending);
    }
    info!("Exporting {} receipts from {}", receipts.len(), db_path.display());

    let output = match args.format {
        ExportFormat::Csv => to_csv(&receipts)?,
        ExportFormat::Json => to_json(&receipts)?,
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Exported {} receipts to {}",
            style("✓").green(),
            receipts.len(),
            output_path.display()
        );
    } else {
        print!("{}", output);
    }

    Ok(())
}
