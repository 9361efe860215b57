//! xlsxdocgen command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use xlsxdocgen::{Config, DocxTemplate, Generator, NameCollision, SheetSelector, XlsxToDocxError};

#[derive(Parser, Debug)]
#[command(
    name = "xlsxdocgen",
    version,
    about = "Generate one Word document per spreadsheet row from .docx templates"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full generation described by a config file.
    Generate(GenerateArgs),
    /// List the column names of a spreadsheet (usable as placeholders).
    Fields {
        /// Spreadsheet file (xlsx, xlsm, xls, ods).
        excel: PathBuf,
        /// Sheet index (0-based) or name.
        #[arg(long)]
        sheet: Option<String>,
    },
    /// List the placeholders found in a .docx template.
    Placeholders {
        /// Template file.
        template: PathBuf,
    },
    /// Write an example config file.
    InitConfig {
        /// Destination path.
        path: PathBuf,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Config file (JSON).
    #[arg(long, short)]
    config: PathBuf,

    /// Override the output directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Override the text inserted for missing fields.
    #[arg(long)]
    missing: Option<String>,

    /// Override the name collision policy (overwrite, fail, rename).
    #[arg(long, value_parser = parse_collision)]
    on_name_collision: Option<NameCollision>,
}

fn parse_collision(s: &str) -> Result<NameCollision, String> {
    match s.to_ascii_lowercase().as_str() {
        "overwrite" => Ok(NameCollision::Overwrite),
        "fail" => Ok(NameCollision::Fail),
        "rename" => Ok(NameCollision::Rename),
        other => Err(format!(
            "unknown policy '{}' (expected overwrite, fail or rename)",
            other
        )),
    }
}

fn parse_sheet(sheet: Option<String>) -> SheetSelector {
    match sheet {
        Some(s) => match s.parse::<usize>() {
            Ok(index) => SheetSelector::Index(index),
            Err(_) => SheetSelector::Name(s),
        },
        None => SheetSelector::default(),
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the run finished but some records failed.
fn run(command: Command) -> Result<bool, XlsxToDocxError> {
    match command {
        Command::Generate(args) => {
            let mut config = Config::load(&args.config)?;
            if let Some(dir) = args.output_dir {
                config.output_dir = dir;
            }
            if let Some(text) = args.missing {
                config.missing_placeholder = text;
            }
            if let Some(policy) = args.on_name_collision {
                config.on_name_collision = policy;
            }

            let summary = config.into_builder().build()?.run()?;
            for failure in &summary.failures {
                error!(row = failure.row, "{}", failure.error);
            }
            info!(
                "{} of {} documents generated in {:.2}s",
                summary.generated.len(),
                summary.total(),
                summary.elapsed.as_secs_f64()
            );
            Ok(summary.is_success())
        }
        Command::Fields { excel, sheet } => {
            for field in Generator::fields(&excel, &parse_sheet(sheet))? {
                println!("{}", field);
            }
            Ok(true)
        }
        Command::Placeholders { template } => {
            for name in DocxTemplate::open(&template)?.placeholders() {
                println!("{}", name);
            }
            Ok(true)
        }
        Command::InitConfig { path, force } => {
            if path.exists() && !force {
                return Err(XlsxToDocxError::Config(format!(
                    "'{}' already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            Config::example().save(&path)?;
            info!("example config written to {}", path.display());
            Ok(true)
        }
    }
}
