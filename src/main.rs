use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use miette::{IntoDiagnostic, Result};
use slicer::config::Config;
use slicer::probe::ProbeResult;
use slicer::report::{ReportFormat, Reporter};
use slicer::scan::{ScanOptions, Scanner};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, warn};

/// Exit status after Ctrl-C, as a shell would report it
const EXIT_INTERRUPTED: i32 = 130;

/// slicer - Extract the attack surface and secrets of a decompiled APK
#[derive(Parser, Debug)]
#[command(name = "slicer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the jadx output directory
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Path to the jadx output directory (same as --dir)
    #[arg(value_name = "PATH", conflicts_with = "dir")]
    path: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "terminal")]
    format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Don't show the banner
    #[arg(long)]
    no_banner: bool,

    /// Maximum number of probes in flight
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Per-probe timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Don't send any network request; probed secrets are listed as not probed
    #[arg(long)]
    no_probe: bool,

    /// Also list every http(s) URL found under the directory
    #[arg(long)]
    extract_urls: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only output results
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug, Default)]
enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Terminal => ReportFormat::Terminal,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.quiet);

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let terminal = matches!(cli.format, OutputFormat::Terminal);
    if terminal && !cli.no_banner && !cli.quiet {
        print_banner();
    }

    info!("slicer v{}", env!("CARGO_PKG_VERSION"));

    let dir = cli
        .dir
        .clone()
        .or_else(|| cli.path.clone())
        .ok_or_else(|| miette::miette!("No directory given, use -d <DIR>"))?;

    let config = load_config(&cli)?;

    // Ctrl-C aborts in-flight probes; the partial report is still printed
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            let _ = cancel_tx.send(true);
        }
    });

    let spinner = probe_spinner(terminal && !cli.quiet && std::io::stderr().is_terminal())?;
    let observer = spinner.clone();

    let options = ScanOptions {
        probe: !cli.no_probe,
        extract_urls: cli.extract_urls,
    };
    let scanner = Scanner::new(config, options)?.with_observer(move |result: &ProbeResult| {
        observer.inc(1);
        observer.set_message(result.url.clone());
    });

    let start_time = Instant::now();
    let report = scanner.scan(&dir, cancel_rx).await;
    spinner.finish_and_clear();
    let report = report?;

    let reporter = Reporter::new(cli.format.clone().into(), cli.output.clone());
    reporter.report(&report)?;

    info!("Scan completed in {:.2}s", start_time.elapsed().as_secs_f64());

    if report.cancelled {
        std::process::exit(EXIT_INTERRUPTED);
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        // Try to load from default locations
        let working_dir = std::env::current_dir().into_diagnostic()?;
        let home = std::env::var_os("HOME").map(PathBuf::from);
        Config::from_default_locations(&working_dir, home.as_deref())?
    };

    // Override with CLI arguments
    if let Some(concurrency) = cli.concurrency {
        config.probe.concurrency = concurrency;
    }
    if let Some(timeout) = cli.timeout {
        config.probe.timeout_secs = timeout;
    }
    config.validate()?;

    Ok(config)
}

fn probe_spinner(visible: bool) -> Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} probes done {wide_msg:.dim}")
            .into_diagnostic()?,
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    Ok(spinner)
}

fn print_banner() {
    let banner = r"
     _____ _ _
    / ____| (_)
   | (___ | |_  ___ ___ _ __
    \___ \| | |/ __/ _ \ '__|
    ____) | | | (_|  __/ |
   |_____/|_|_|\___\___|_|
";
    println!("{}", banner.green().bold());
    println!();
}
