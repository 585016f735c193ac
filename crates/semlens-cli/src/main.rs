//! SemLens Command-Line Interface
//!
//! Inspects BI model packages: lists tables, describes the schema, previews
//! decoded rows, and exports tables to CSV or JSON.
//!
//! # Usage
//!
//! ```bash
//! # List tables, decompressing the model blob with an external program
//! semlens --decompressor-cmd "xpress9-decompress" report.pbix tables
//!
//! # Schema as JSON
//! semlens --decompressor-cmd xpress9-decompress report.pbix schema --json
//!
//! # First 20 rows of a table
//! semlens --decompressor-cmd xpress9-decompress report.pbix preview Sales -n 20
//!
//! # Distinct and blank counts per column
//! semlens --decompressor-cmd xpress9-decompress report.pbix profile Sales
//!
//! # Export every table; the model entry is stored uncompressed
//! semlens --raw report.pbix export --all --format csv --out ./out
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use semlens_common::LensConfig;
use semlens_model::{BlockDecompressor, ExternalCommand, ModelLoader, Passthrough};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod export;
mod formatter;

use commands::ExportTarget;
use export::ExportFormat;

/// SemLens command-line interface
#[derive(Parser, Debug)]
#[command(
    name = "semlens",
    author = "SemLens Team",
    version,
    about = "Inspect BI model packages",
    long_about = "Reads a BI model package, decodes its embedded catalog and columnar\n\
                  storage, and prints or exports the tables it contains."
)]
struct Args {
    /// Model package file
    package: PathBuf,

    /// External program that decompresses the model blob (stdin to stdout)
    #[arg(long, value_name = "COMMAND", env = "SEMLENS_DECOMPRESSOR")]
    decompressor_cmd: Option<String>,

    /// Treat the model entry as already decompressed
    #[arg(long, conflicts_with = "decompressor_cmd")]
    raw: bool,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Archive entry holding the compressed model
    #[arg(long, value_name = "NAME")]
    entry: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tables
    Tables,
    /// Describe tables, columns, measures, and relationships
    Schema {
        /// Print the schema as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the first rows of a table
    Preview {
        /// Table name
        table: String,
        /// Number of rows to show
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show per-column counts and value ranges of a table
    Profile {
        /// Table name
        table: String,
        /// Print the profile as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write tables to files
    Export {
        /// Table name
        #[arg(required_unless_present = "all")]
        table: Option<String>,
        /// Export every table
        #[arg(long, conflicts_with = "table")]
        all: bool,
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "csv")]
        format: ExportFormatArg,
        /// Output directory
        #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
        out: PathBuf,
    },
}

/// Export format argument
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormatArg {
    /// Comma-separated values
    Csv,
    /// JSON array of row objects
    Json,
    /// Parquet file
    Parquet,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Csv => ExportFormat::Csv,
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Parquet => ExportFormat::Parquet,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    let config = load_config(&args)?;
    let preview_rows = config.limits.preview_rows;
    let decompressor = select_decompressor(&args)?;
    let loader = ModelLoader::new(config, decompressor)?;

    info!(
        package = %args.package.display(),
        decompressor = loader.decompressor_name(),
        "loading"
    );
    let model = loader
        .load_path(&args.package)
        .await
        .with_context(|| format!("failed to load {}", args.package.display()))?;
    for w in model.warnings() {
        warn!("{w}");
    }

    match &args.command {
        Command::Tables => println!("{}", commands::tables(&model)),
        Command::Schema { json } => println!("{}", commands::schema(&model, *json)?),
        Command::Preview { table, limit } => {
            let limit = limit.unwrap_or(preview_rows);
            println!("{}", commands::preview(&model, table, limit)?);
        }
        Command::Profile { table, json } => {
            println!("{}", commands::profile(&model, table, *json)?);
        }
        Command::Export {
            table,
            all,
            format,
            out,
        } => {
            let target = match (table, all) {
                (_, true) => ExportTarget::All,
                (Some(name), false) => ExportTarget::Table(name.clone()),
                (None, false) => bail!("name a table or pass --all"),
            };
            for path in commands::export(&model, &target, (*format).into(), out)? {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("semlens=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("semlens=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<LensConfig> {
    let mut config = match &args.config {
        Some(path) => LensConfig::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => LensConfig::default(),
    };

    // Command line overrides the file
    if let Some(entry) = &args.entry {
        config = config.with_data_model_entry(entry.clone());
    }
    config.validate()?;

    Ok(config)
}

fn select_decompressor(args: &Args) -> Result<Arc<dyn BlockDecompressor>> {
    if args.raw {
        return Ok(Arc::new(Passthrough));
    }
    match args.decompressor_cmd.as_deref().and_then(ExternalCommand::from_command_line) {
        Some(command) => Ok(Arc::new(command)),
        None => bail!(
            "the model blob needs a block decompressor; pass --decompressor-cmd or --raw"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_export_all() {
        let args = Args::try_parse_from([
            "semlens", "--raw", "m.pbix", "export", "--all", "--format", "json", "--out", "out",
        ])
        .unwrap();
        assert!(args.raw);
        match args.command {
            Command::Export { table, all, out, .. } => {
                assert!(table.is_none());
                assert!(all);
                assert_eq!(out, PathBuf::from("out"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_profile_and_parquet() {
        let args =
            Args::try_parse_from(["semlens", "--raw", "m.pbix", "profile", "Sales", "--json"])
                .unwrap();
        match args.command {
            Command::Profile { table, json } => {
                assert_eq!(table, "Sales");
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let args = Args::try_parse_from([
            "semlens", "--raw", "m.pbix", "export", "Sales", "-f", "parquet",
        ])
        .unwrap();
        match args.command {
            Command::Export { format, .. } => {
                assert_eq!(ExportFormat::from(format), ExportFormat::Parquet);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_conflicts() {
        assert!(Args::try_parse_from(["semlens", "m.pbix", "export"]).is_err());
        assert!(Args::try_parse_from([
            "semlens",
            "--raw",
            "--decompressor-cmd",
            "cat",
            "m.pbix",
            "tables"
        ])
        .is_err());
    }

    #[test]
    fn test_select_decompressor() {
        let args = Args::try_parse_from(["semlens", "--raw", "m.pbix", "tables"]).unwrap();
        assert_eq!(select_decompressor(&args).unwrap().name(), "passthrough");

        let args =
            Args::try_parse_from(["semlens", "--decompressor-cmd", "cat -u", "m.pbix", "tables"])
                .unwrap();
        assert_eq!(select_decompressor(&args).unwrap().name(), "external");
    }

    #[test]
    fn test_entry_override() {
        let args =
            Args::try_parse_from(["semlens", "--raw", "--entry", "Model", "m.pbix", "tables"])
                .unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.archive.data_model_entry, "Model");
    }
}
