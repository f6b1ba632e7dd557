use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use pdf_table_extract::{
    AssemblyReport, DEFAULT_CONFIDENCE_FLOOR, DEFAULT_CONFIDENCE_THRESHOLD, DetectionStrategy,
    InMemoryJobStore, JobRecord, JobStore, PageSelection, PdfSource, ProcessingOptions,
    Sensitivity, TablePipeline, TesseractOcr, process_job, write_workbook,
};
use serde_json::json;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "pdf2tables",
    version,
    about = "Detect tables in PDFs and write one CSV sheet per table"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log pipeline decisions to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract the tables of a single PDF.
    Extract(ExtractArgs),
    /// Extract every PDF in a directory, one job per file.
    Batch(BatchArgs),
}

#[derive(Debug, Args)]
struct ExtractArgs {
    /// Input PDF path.
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the CSV sheets.
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    detection: DetectionArgs,
}

#[derive(Debug, Args)]
struct BatchArgs {
    /// Directory containing the input PDFs.
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the CSV sheets.
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    detection: DetectionArgs,
}

#[derive(Debug, Args)]
struct DetectionArgs {
    /// Page selection like 1-3,5.
    #[arg(long)]
    pages: Option<String>,

    /// Tesseract language code; enables OCR.
    #[arg(long)]
    ocr_language: Option<String>,

    /// Minimum confidence for text-pattern tables.
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    confidence_threshold: u8,

    /// Line classification sensitivity: low, medium or high.
    #[arg(long, default_value = "medium")]
    sensitivity: Sensitivity,

    /// Lower clamp for computed confidence; 0 disables it.
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE_FLOOR)]
    confidence_floor: u8,

    /// Output delimiter character.
    #[arg(long, default_value = ",")]
    delimiter: char,

    /// Print the result as JSON on stdout.
    #[arg(long)]
    json: bool,
}

struct Settings {
    options: ProcessingOptions,
    pages: Option<PageSelection>,
    delimiter: u8,
}

fn parse_settings(args: &DetectionArgs) -> Result<Settings> {
    let pages = args
        .pages
        .as_deref()
        .map(PageSelection::from_str)
        .transpose()
        .context("failed to parse --pages")?;

    if !args.delimiter.is_ascii() {
        anyhow::bail!("delimiter must be a single ASCII character");
    }

    let options = ProcessingOptions {
        ocr_language: args.ocr_language.clone(),
        confidence_threshold: args.confidence_threshold,
        table_detection_sensitivity: args.sensitivity,
        confidence_floor: args.confidence_floor,
    };
    options.validate().map_err(|error| anyhow!("{error}"))?;

    Ok(Settings {
        options,
        pages,
        delimiter: args.delimiter as u8,
    })
}

fn build_pipeline(settings: &Settings) -> TablePipeline {
    let mut source = PdfSource::new();
    if let Some(pages) = settings.pages.clone() {
        source = source.with_pages(pages);
    }
    let pipeline = TablePipeline::for_pdf(source);
    if settings.options.ocr_language.is_none() {
        return pipeline;
    }
    if !TesseractOcr::is_available() {
        warn!("pdftoppm or tesseract not found; continuing without OCR");
        return pipeline;
    }
    pipeline.with_ocr(TesseractOcr::default())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "document".to_string(), |stem| stem.to_string_lossy().into_owned())
}

fn log_report(path: &Path, report: &AssemblyReport, verbose: bool) {
    if report.warnings.is_empty() {
        return;
    }

    eprintln!(
        "warning: {}: {} issue(s) detected",
        path.display(),
        report.warnings.len()
    );
    if verbose {
        for warning in &report.warnings {
            eprintln!(
                "  - {:?} table={:?} confidence={:?}: {}",
                warning.code, warning.table_index, warning.confidence, warning.message
            );
        }
    }
}

fn write_sheets(output: &Path, input: &Path, report: &AssemblyReport, delimiter: u8) -> Result<()> {
    write_workbook(output, &file_stem(input), &report.tables, delimiter)
        .with_context(|| format!("failed to write sheets to '{}'", output.display()))?;
    Ok(())
}

fn run_extract(args: &ExtractArgs, verbose: bool) -> Result<DetectionStrategy> {
    let settings = parse_settings(&args.detection)?;
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("failed to read '{}'", args.input.display()))?;
    let report = build_pipeline(&settings)
        .assemble(&bytes, &settings.options)
        .with_context(|| format!("failed to extract tables from '{}'", args.input.display()))?;

    write_sheets(&args.output, &args.input, &report, settings.delimiter)?;
    log_report(&args.input, &report, verbose);
    if args.detection.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(report.strategy)
}

fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory '{}'", dir.display()))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

#[derive(Debug, Default)]
struct BatchSummary {
    failed: usize,
    fallback: usize,
}

fn run_batch(args: &BatchArgs, verbose: bool) -> Result<BatchSummary> {
    let settings = parse_settings(&args.detection)?;
    let files = list_pdfs(&args.input)?;
    if files.is_empty() {
        anyhow::bail!("no PDF files found in '{}'", args.input.display());
    }

    let store = InMemoryJobStore::new();
    let pipeline = build_pipeline(&settings);
    let mut summary = BatchSummary::default();
    let mut results = Vec::with_capacity(files.len());

    for (index, path) in files.iter().enumerate() {
        let job_id = format!("batch-{}", index + 1);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let outcome = std::fs::read(path)
            .with_context(|| format!("failed to read '{}'", path.display()))
            .and_then(|bytes| {
                let record =
                    JobRecord::new(&job_id, &file_name, settings.options.clone(), Utc::now());
                store.create_job(record, bytes)?;
                Ok(process_job(&store, &pipeline, &job_id, Utc::now)?)
            })
            .and_then(|(record, report)| {
                write_sheets(&args.output, path, &report, settings.delimiter)?;
                Ok((record, report))
            });

        match outcome {
            Ok((record, report)) => {
                log_report(path, &report, verbose);
                if report.strategy == DetectionStrategy::Fallback {
                    summary.fallback += 1;
                }
                results.push(json!({
                    "file": file_name,
                    "status": record.status,
                    "strategy": report.strategy,
                    "tables": record.table_count,
                }));
            }
            Err(error) => {
                eprintln!("error: {}: {error:#}", path.display());
                summary.failed += 1;
                results.push(json!({
                    "file": file_name,
                    "status": "failed",
                    "error": format!("{error:#}"),
                }));
            }
        }
    }

    if args.detection.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    Ok(summary)
}

fn exit_code(strategy: DetectionStrategy) -> ExitCode {
    if strategy == DetectionStrategy::Fallback {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "pdf_table_extract=info"
    } else {
        "pdf_table_extract=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let result = match &cli.command {
        Commands::Extract(args) => run_extract(args, cli.verbose).map(exit_code),
        Commands::Batch(args) => run_batch(args, cli.verbose).map(|summary| {
            if summary.failed > 0 {
                ExitCode::from(1)
            } else if summary.fallback > 0 {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }),
    };

    result.unwrap_or_else(|error| {
        eprintln!("error: {error:#}");
        ExitCode::from(1)
    })
}
