use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;
use sdk_trim::{TrimOptions, TrimReport};
use tracing_subscriber::EnvFilter;

/// Exit status when the run finished but some directories could not be removed.
const EXIT_PARTIAL: u8 = 3;

#[derive(clap::Parser)]
#[command(version, about)]
struct Options {
    /// Root of the installed SDK tree, e.g. site-packages/azure
    root: PathBuf,

    /// Report what would be deleted without deleting anything
    #[arg(short = 'n', long)]
    dry_run: bool,
    /// Package or directory never to trim (repeatable, comma separated)
    #[arg(short, long, value_name = "NAME", value_delimiter = ',')]
    keep: Vec<String>,
    /// Source file extensions scanned for imports
    #[arg(
        long = "ext",
        value_name = "EXT",
        value_delimiter = ',',
        default_values = ["py", "pyi"]
    )]
    extensions: Vec<String>,
    /// Print the report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Use verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// No summary printed to stdout, only errors logged
    #[arg(short, long, default_value_t = false, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> ExitCode {
    let options = Options::parse();
    init_logging(options.verbose, options.quiet);

    match real_main(options) {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            eprintln!(
                "error: {} director{} could not be removed",
                report.failures.len(),
                if report.failures.len() == 1 { "y" } else { "ies" }
            );
            ExitCode::from(EXIT_PARTIAL)
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    // RUST_LOG wins over -v/-q
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn real_main(options: Options) -> anyhow::Result<TrimReport> {
    let keep = options
        .keep
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty());
    let mut trim_options = TrimOptions::new(&options.root)
        .dry_run(options.dry_run)
        .keep(keep);
    trim_options.source_extensions = options.extensions;

    let report = sdk_trim::trim(&trim_options)
        .with_context(|| format!("failed to trim `{}`", options.root.display()))?;

    if options.json {
        let json = serde_json::to_string_pretty(&report)
            .with_context(|| "failed to serialize report")?;
        println!("{}", json);
    } else if !options.quiet {
        print!("{}", report);
    }

    Ok(report)
}
