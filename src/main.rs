use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use sheetpager::{
    HtmlRenderer, MarkdownRenderer, PageRenderer, PdfRenderer, Pipeline, PipelineConfig,
    SourceInfo, Table, list_sheets,
};
use sheetpager::table_model::source_file_name;

/// Convert wide Excel sheets into OCR-friendly paginated Markdown, HTML
/// or PDF documents.
#[derive(Parser, Debug)]
#[command(name = "sheetpager", version, about)]
struct Cli {
    /// Path to the input Excel (.xlsx) file
    #[arg(short, long)]
    input: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "markdown")]
    format: FormatArg,

    /// Maximum number of columns per page
    #[arg(short = 'm', long = "max-cols")]
    max_cols: Option<usize>,

    /// Sheet name to process (default: first sheet)
    #[arg(short, long)]
    sheet: Option<String>,

    /// Process all sheets in the workbook
    #[arg(short, long)]
    all_sheets: bool,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// List all sheets in the Excel file and exit
    #[arg(short, long)]
    list_sheets: bool,

    /// Write only the combined artifact, not the per-page files
    #[arg(long)]
    combined_only: bool,

    /// Path to a JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to this file in addition to stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable verbose (DEBUG) logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    #[value(alias = "md")]
    Markdown,
    Html,
    Pdf,
    All,
}

impl FormatArg {
    fn expand(self) -> Vec<FormatArg> {
        match self {
            FormatArg::All => vec![FormatArg::Markdown, FormatArg::Html, FormatArg::Pdf],
            other => vec![other],
        }
    }
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(0) => {}
        Ok(failed_pages) => {
            // Partial success still exits 0, with a distinguishable signal
            eprintln!(
                "PARTIAL SUCCESS: {} page(s) failed, see index.json for details",
                failed_pages
            );
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<usize> {
    setup_logging(cli.verbose, cli.log_file.as_deref())?;

    if cli.list_sheets {
        print_sheet_listing(&cli.input)?;
        return Ok(0);
    }

    let mut config = PipelineConfig::load_or_default(cli.config.as_deref());
    if let Some(max_cols) = cli.max_cols {
        config.slicing.max_columns_per_page = max_cols;
    }
    if cli.combined_only {
        config.output.keep_individual_pages = false;
    }

    log::info!("{}", "=".repeat(70));
    log::info!("Excel to OCR-friendly document converter");
    log::info!("{}", "=".repeat(70));
    log::info!("Input file: {}", cli.input);
    log::info!("Output format: {:?}", cli.format);
    log::info!("Output directory: {}", cli.output_dir.display());

    let sheets_to_process: Vec<Option<String>> = if cli.all_sheets {
        let sheets = list_sheets(&cli.input)?;
        log::info!("Processing all {} sheets", sheets.len());
        sheets.into_iter().map(|s| Some(s.name)).collect()
    } else {
        match &cli.sheet {
            Some(name) => vec![Some(name.clone())],
            None => vec![None],
        }
    };

    let formats = cli.format.expand();
    let pipeline = Pipeline::new(&config);
    let mut failed_pages = 0;
    let mut sheets_done = 0;

    for requested_sheet in &sheets_to_process {
        let (table, sheet_name) = Table::from_xlsx(&cli.input, requested_sheet.as_deref())
            .with_context(|| format!("Could not load table from {}", cli.input))?;
        log::info!(
            "Sheet '{}': {} rows x {} columns",
            sheet_name,
            table.row_count(),
            table.column_count()
        );
        let source = SourceInfo {
            file: cli.input.clone(),
            sheet: sheet_name.clone(),
        };

        for format in &formats {
            let renderer = make_renderer(*format, &config);
            let run_dir = cli.output_dir.join(format!(
                "{}_{}",
                renderer.format_name(),
                sheet_name.replace(' ', "_")
            ));

            let outcome = pipeline
                .run(&table, &source, renderer.as_ref(), &run_dir)
                .with_context(|| {
                    format!(
                        "{} run failed for sheet '{}'",
                        renderer.format_name(),
                        sheet_name
                    )
                })?;

            log::info!(
                "{} output completed: {} pages in {}",
                renderer.format_name(),
                outcome.total_pages,
                run_dir.display()
            );
            if let Some(combined) = &outcome.combined_path {
                log::info!("  Combined file: {}", combined.display());
            }
            failed_pages += outcome.report.page_failures.len();
        }
        sheets_done += 1;
    }

    log::info!("{}", "=".repeat(70));
    log::info!("CONVERSION COMPLETE");
    log::info!("Processed {} sheet(s)", sheets_done);
    log::info!("Output location: {}", cli.output_dir.display());
    log::info!("{}", "=".repeat(70));

    Ok(failed_pages)
}

fn make_renderer(format: FormatArg, config: &PipelineConfig) -> Box<dyn PageRenderer> {
    match format {
        FormatArg::Markdown => Box::new(MarkdownRenderer::new(config.output.clone())),
        FormatArg::Html => Box::new(HtmlRenderer::new(
            config.output.clone(),
            config.html.clone(),
            config.pdf.clone(),
        )),
        FormatArg::Pdf => Box::new(PdfRenderer::new(
            config.output.clone(),
            config.pdf.clone(),
            config.slicing.repeat_header,
        )),
        FormatArg::All => unreachable!("expanded before renderer construction"),
    }
}

fn print_sheet_listing(input: &str) -> Result<()> {
    let sheets = list_sheets(input)?;

    println!("\n{}", "=".repeat(70));
    println!("Excel File: {}", source_file_name(input));
    println!("{}", "=".repeat(70));
    println!("\nTotal Sheets: {}\n", sheets.len());
    for (idx, sheet) in sheets.iter().enumerate() {
        println!("{}. '{}'", idx + 1, sheet.name);
        println!("   - Rows: {}", sheet.rows);
        println!("   - Columns: {}", sheet.columns);
        println!();
    }
    Ok(())
}

fn setup_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} - {} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Could not create log directory {}", parent.display()))?;
            }
        }
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply().context("Failed to initialize logging")?;
    Ok(())
}
