//! Process command - extract receipt fields from a single file.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use rcpt_core::{
    ExtractionEngine, ExtractionResult, IngestLimits, RcptConfig, ReceiptParser,
    RuleReceiptParser, UploadedFile, Validator,
};

use super::{load_config, open_store};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// OCR model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Skip OCR and use only the PDF text layer
    #[arg(long)]
    text_only: bool,

    /// Validate the result and store it in the receipt database
    #[arg(long)]
    save: bool,

    /// Database file (default: from configuration)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Show extraction confidence scores
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = load_config(config_path)?;
    if let Some(dir) = &args.model_dir {
        config.ocr.model_dir = dir.clone();
    }
    if let Some(path) = &args.database {
        config.database.path = path.clone();
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let limits = IngestLimits {
        max_bytes: config.server.max_upload_bytes,
    };
    let file = UploadedFile::from_path(&args.input, &limits)?;
    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    pb.set_message("Extracting text...");
    let engine = build_engine(&config, args.text_only);
    let extracted = engine.extract_text(&file)?;

    pb.set_message("Inferring receipt fields...");
    let parser = RuleReceiptParser::from_config(&config.extraction);
    let result = parser.parse_extracted(&extracted);
    pb.finish_and_clear();

    let review = result.fields_needing_review(parser.review_threshold());
    if !review.is_empty() {
        eprintln!(
            "{} Please review: {}",
            style("!").yellow(),
            review.join(", ")
        );
    }
    for warning in &result.warnings {
        eprintln!("  - {}", warning);
    }

    let output = format_result(&result, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.save {
        save_result(&result, &file.file_name, &config)?;
    }

    if args.show_confidence {
        println!();
        println!(
            "{} Extraction confidence: {:.1}%",
            style("ℹ").blue(),
            result.confidence * 100.0
        );
        println!(
            "{} Processing time: {}ms",
            style("ℹ").blue(),
            result.processing_time_ms
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

#[cfg(feature = "native")]
fn build_engine(config: &RcptConfig, text_only: bool) -> ExtractionEngine {
    if text_only {
        ExtractionEngine::new(config)
    } else {
        ExtractionEngine::from_config(config)
    }
}

#[cfg(not(feature = "native"))]
fn build_engine(config: &RcptConfig, _text_only: bool) -> ExtractionEngine {
    ExtractionEngine::new(config)
}

fn save_result(result: &ExtractionResult, file_name: &str, config: &RcptConfig) -> anyhow::Result<()> {
    let draft = result.to_draft(file_name);
    let receipt = match Validator::from_config(&config.extraction).validate(&draft) {
        Ok(receipt) => receipt,
        Err(errors) => {
            eprintln!("{}", style("Validation issues:").yellow());
            for error in &errors.errors {
                eprintln!("  - {}", error);
            }
            anyhow::bail!("Receipt not saved: fix the fields above and process again");
        }
    };

    let store = open_store(&config.database.path)?;
    let saved = store.insert(receipt)?;
    eprintln!(
        "{} Saved receipt #{} to {}",
        style("✓").green(),
        saved.id,
        config.database.path.display()
    );
    Ok(())
}

fn format_result(result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn format_csv(result: &ExtractionResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "vendor",
        "transaction_date",
        "amount",
        "currency",
        "category",
        "payment_method",
        "items",
        "confidence",
    ])?;

    wtr.write_record([
        result.vendor.value.clone().unwrap_or_default(),
        result
            .transaction_date
            .value
            .map(|d| d.to_string())
            .unwrap_or_default(),
        result.amount.value.map(|a| a.to_string()).unwrap_or_default(),
        result.currency.value.map(|c| c.to_string()).unwrap_or_default(),
        result.category.value.map(|c| c.to_string()).unwrap_or_default(),
        result.payment_method.value.clone().unwrap_or_default(),
        result.items.join("; "),
        format!("{:.3}", result.confidence),
    ])?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(result: &ExtractionResult) -> String {
    fn line(label: &str, value: Option<String>, confidence: f32) -> String {
        match value {
            Some(value) => format!("{:<10} {} ({:.0}%)\n", label, value, confidence * 100.0),
            None => format!("{:<10} -\n", label),
        }
    }

    let mut output = String::new();
    output.push_str(&line("Vendor:", result.vendor.value.clone(), result.vendor.confidence));
    output.push_str(&line(
        "Date:",
        result.transaction_date.value.map(|d| d.to_string()),
        result.transaction_date.confidence,
    ));
    output.push_str(&line(
        "Amount:",
        result.amount.value.map(|a| a.to_string()),
        result.amount.confidence,
    ));
    output.push_str(&line(
        "Currency:",
        result.currency.value.map(|c| c.to_string()),
        result.currency.confidence,
    ));
    output.push_str(&line(
        "Category:",
        result.category.value.map(|c| c.to_string()),
        result.category.confidence,
    ));
    output.push_str(&line(
        "Payment:",
        result.payment_method.value.clone(),
        result.payment_method.confidence,
    ));

    if !result.items.is_empty() {
        output.push_str("\nItems:\n");
        for item in &result.items {
            output.push_str(&format!("  {}\n", item));
        }
    }

    output
}
