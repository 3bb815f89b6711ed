//! pxdgen - generates and maintains Cython .pxd declaration files.

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use pxdgen::generator::{Generator, Outcome, Report};
use std::path::PathBuf;

/// Command-line interface for pxdgen.
#[derive(Parser, Debug)]
#[command(
    name = "pxdgen",
    version,
    about = "Generates and maintains Cython .pxd declaration files from Python sources",
    long_about = None
)]
struct Cli {
    /// Sets the verbosity level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Generate or refresh declaration files for a file or directory
    Generate {
        /// Python source file or directory to process
        path: PathBuf,

        /// Declaration file path (single-file input only; defaults to the
        /// source path with a .pxd extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn setup_logging(level: &str) {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
}

fn render_text(reports: &[Report]) {
    for report in reports {
        let outcome = match report.outcome {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Unchanged => "unchanged",
        };
        println!("{}: {} ({})", report.source, report.output, outcome);
        for event in &report.events {
            println!("  {}", event);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Commands::Generate { path, output, dry_run, format } => {
            anyhow::ensure!(path.exists(), "path not found: {}", path.display());
            anyhow::ensure!(
                output.is_none() || path.is_file(),
                "--output only applies to single-file input"
            );

            let generator = Generator::new(dry_run);
            let reports = generator
                .generate_path(&path, output.as_deref())
                .with_context(|| format!("failed to process {}", path.display()))?;

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&reports)?),
                _ => render_text(&reports),
            }

            let conflicts = reports
                .iter()
                .flat_map(|r| r.events.iter())
                .filter(|e| e.severity() == pxdgen::diagnostics::Severity::Warning)
                .count();
            if conflicts > 0 {
                log::warn!("{} declaration(s) need manual attention", conflicts);
            }
        },
    }

    Ok(())
}
