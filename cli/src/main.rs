//! pdftab CLI - PDF table extraction tool

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use pdftab::{ExtractOptions, Flavor, PdfHandler, Table, TableList};

#[derive(Parser)]
#[command(name = "pdftab")]
#[command(version)]
#[command(about = "Extract tables from PDF documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract tables from a PDF
    Extract {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Page selection (e.g., "1", "1,3-4", "2-end", "all")
        #[arg(short, long, default_value = "1")]
        pages: String,

        /// Table detection flavor
        #[arg(short, long, value_enum, default_value = "lattice")]
        flavor: FlavorArg,

        /// Password for encrypted documents
        #[arg(long, env = "PDFTAB_PASSWORD")]
        password: Option<String>,

        /// Process pages in parallel
        #[arg(long)]
        parallel: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Show document information
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Password for encrypted documents
        #[arg(long, env = "PDFTAB_PASSWORD")]
        password: Option<String>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FlavorArg {
    Lattice,
    Stream,
    Network,
    Hybrid,
}

impl From<FlavorArg> for Flavor {
    fn from(arg: FlavorArg) -> Self {
        match arg {
            FlavorArg::Lattice => Flavor::Lattice,
            FlavorArg::Stream => Flavor::Stream,
            FlavorArg::Network => Flavor::Network,
            FlavorArg::Hybrid => Flavor::Hybrid,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            input,
            output,
            pages,
            flavor,
            password,
            parallel,
            format,
        } => cmd_extract(
            &input,
            output.as_deref(),
            &pages,
            flavor,
            password,
            parallel,
            format,
        ),
        Commands::Info { input, password } => cmd_info(&input, password),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_extract(
    input: &Path,
    output: Option<&Path>,
    pages: &str,
    flavor: FlavorArg,
    password: Option<String>,
    parallel: bool,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = ExtractOptions::new()
        .with_flavor(flavor.into())
        .with_pages(pages)
        .with_parallel(parallel);
    if let Some(password) = password {
        options = options.with_password(password);
    }

    let handler = PdfHandler::from_path(input, options)?;
    let tables = handler.parse()?;

    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&tables)?,
        OutputFormat::Csv => render_csv(&tables),
    };

    match output {
        Some(path) => {
            fs::write(path, rendered)?;
            eprintln!(
                "{} {} tables written to {}",
                "✓".green(),
                tables.len(),
                path.display()
            );
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn cmd_info(input: &Path, password: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = ExtractOptions::new();
    if let Some(password) = password {
        options = options.with_password(password);
    }
    let handler = PdfHandler::from_path(input, options)?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Pages".bold(), handler.page_count()?);
    println!(
        "{}: {}",
        "Encrypted".bold(),
        if handler.is_encrypted()? { "Yes" } else { "No" }
    );
    Ok(())
}

/// Render all tables as CSV, one block per table separated by a comment
/// line naming the source page.
fn render_csv(tables: &TableList) -> String {
    let mut out = String::new();
    for (i, table) in tables.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("# page {} table {}\n", table.page, table.order));
        out.push_str(&table_csv(table));
    }
    out
}

fn table_csv(table: &Table) -> String {
    let mut out = String::new();
    for row in &table.rows {
        let line: Vec<String> = row.iter().map(|cell| csv_field(cell)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
