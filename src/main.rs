//! CLI for matdb - Inspect and canonically re-emit YAML material files.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde_yaml::Value;
use tracing::Level;

use matdb::{dump, Material, MaterialStore, StoreError};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Inspect and canonically re-emit YAML material files
#[derive(Parser)]
#[command(name = "matdb")]
#[command(version)]
#[command(after_help = "\
Examples:
  matdb show Cu --base materials
  matdb show Cu --base materials --json
  matdb fmt Cu --base materials -o materials/Cu.yml
  matdb refs Cu --base materials")]
struct Cli {
    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a material and print a summary of its record
    #[command(after_help = "\
Examples:
  matdb show Cu --base materials
  matdb show Cu --base materials --json")]
    Show {
        /// Material identifier (file name without the .yml extension)
        material: String,

        /// Base directory containing the material files
        #[arg(short, long, default_value = ".")]
        base: PathBuf,

        /// Print the full record as pretty JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Load a material and re-emit it in the canonical layout
    #[command(after_help = "\
Examples:
  matdb fmt Cu --base materials
  matdb fmt Cu --base materials -o Cu.canonical.yml

The output parses back into the same record, so formatting a file twice
changes nothing.")]
    Fmt {
        /// Material identifier (file name without the .yml extension)
        material: String,

        /// Base directory containing the material files
        #[arg(short, long, default_value = ".")]
        base: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the citations of a material, one per line
    Refs {
        /// Material identifier (file name without the .yml extension)
        material: String,

        /// Base directory containing the material files
        #[arg(short, long, default_value = ".")]
        base: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// AppError — semantic exit codes
// ---------------------------------------------------------------------------

enum AppError {
    /// Exit 10 — base directory or material file not found / unreadable
    Store(String),
    /// Exit 11 — invalid YAML or invalid embedded BibTeX
    Parse(String),
    /// Exit 12 — file parsed but does not have the material shape
    Shape(String),
    /// Exit 14 — record cannot be serialized
    Dump(String),
    /// Exit 15 — cannot write output file
    OutputFile(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::Store(_) => 10,
            AppError::Parse(_) => 11,
            AppError::Shape(_) => 12,
            AppError::Dump(_) => 14,
            AppError::OutputFile(_) => 15,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Store(msg) => {
                write!(
                    f,
                    "{}\n  hint: verify the base directory and the material name",
                    msg
                )
            }
            AppError::Parse(msg) => {
                write!(
                    f,
                    "{}\n  hint: the file must be valid YAML with a BibTeX string under meta.references",
                    msg
                )
            }
            AppError::Shape(msg) => {
                write!(
                    f,
                    "{}\n  hint: a material file needs a meta block with references, and a data block of parameter records",
                    msg
                )
            }
            AppError::Dump(msg) => {
                write!(f, "{}", msg)
            }
            AppError::OutputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the output directory exists and is writable",
                    msg
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_writer(io::stderr)
            .init();
    }

    match cli.command {
        Commands::Show {
            material,
            base,
            json,
        } => {
            show_command(&material, &base, json)?;
        }
        Commands::Fmt {
            material,
            base,
            output,
        } => {
            fmt_command(&material, &base, output.as_deref())?;
        }
        Commands::Refs { material, base } => {
            refs_command(&material, &base)?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Print a one-line-per-section summary of a material, or the whole record
/// as pretty JSON.
fn show_command(material: &str, base: &Path, json: bool) -> Result<(), AppError> {
    let record = load_material(material, base)?;

    if json {
        let rendered = serde_json::to_string_pretty(&record)
            .map_err(|e| AppError::Dump(e.to_string()))?;
        println!("{}", rendered);
        return Ok(());
    }

    println!("ID: {}", record.id);
    let meta_fields: Vec<String> = record.meta.keys().map(key_name).collect();
    println!("meta: {}", meta_fields.join(", "));
    let citations: Vec<&str> = record.references.keys().map(String::as_str).collect();
    println!("references: {}", citations.join(", "));
    for (param, sources) in &record.data {
        let keys: Vec<&str> = sources.keys().map(String::as_str).collect();
        println!("data.{}: {}", param, keys.join(", "));
    }

    Ok(())
}

/// Re-emit a material in the canonical layout, to stdout or a file.
fn fmt_command(material: &str, base: &Path, output: Option<&Path>) -> Result<(), AppError> {
    let record = load_material(material, base)?;
    let text = dump(&record).map_err(|e| AppError::Dump(e.to_string()))?;

    if let Some(output_path) = output {
        fs::write(output_path, &text)
            .map_err(|e| AppError::OutputFile(format!("'{}': {}", output_path.display(), e)))?;
        eprintln!("wrote {}", output_path.display());
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        write!(handle, "{}", text).map_err(|e| AppError::OutputFile(format!("stdout: {}", e)))?;
    }

    Ok(())
}

/// List the citations of a material: key, entry type, title when present.
fn refs_command(material: &str, base: &Path) -> Result<(), AppError> {
    let record = load_material(material, base)?;

    for (key, reference) in &record.references {
        match reference.get("title") {
            Some(title) => println!("{} [{}] {}", key, reference.entry_type(), title),
            None => println!("{} [{}]", key, reference.entry_type()),
        }
    }

    Ok(())
}

/// Opens the store and loads one material.
fn load_material(material: &str, base: &Path) -> Result<Material, AppError> {
    let store = MaterialStore::open(base).map_err(map_store_error)?;
    store.load(material).map_err(map_store_error)
}

/// Maps a StoreError to an AppError using type-safe matching.
fn map_store_error(e: StoreError) -> AppError {
    match e {
        StoreError::BasePath { .. } | StoreError::Io(_) => AppError::Store(e.to_string()),
        StoreError::Yaml(_) | StoreError::Citation(_) => AppError::Parse(e.to_string()),
        StoreError::Shape { .. } => AppError::Shape(e.to_string()),
    }
}

/// Meta keys are almost always strings; anything else falls back to its
/// debug form so the summary never fails.
fn key_name(key: &Value) -> String {
    match key.as_str() {
        Some(text) => text.to_string(),
        None => format!("{:?}", key),
    }
}
