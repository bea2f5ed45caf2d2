pub mod stats;

use anyhow::Context;
use clap::{Parser, Subcommand};
use libprotocol::{Profile, ProtocolError, RequestMode, ValidationErrors};
use libruntime::client_logs;
use libruntime::events::EventSink;
use libruntime::report::{load_datasets, to_csv, write_csv, write_results};
use libruntime::{AdvisoryDecision, Advisor, LoadTestResult, SysinfoCpuProbe};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "modebench")]
#[command(about = "Mode advisor & load testing. Generate profile -> Validate -> Run sweep -> Summarize", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generates a profile example with default values
    #[command(arg_required_else_help = false)]
    Generate {
        #[arg(
            long,
            require_equals = true,
            default_missing_value = "./demo-profile.json"
        )]
        path: Option<String>,
        #[arg(long, require_equals = false, default_missing_value = "1")]
        version: Option<String>,
    },
    /// Export a json schema for profiles
    #[command(arg_required_else_help = false)]
    Schema {
        #[arg(long, require_equals = true, default_missing_value = "./schema.json")]
        path: Option<String>,
        #[arg(long, require_equals = false, default_missing_value = "1")]
        version: Option<String>,
    },
    /// Validate given profile
    #[command(arg_required_else_help = true)]
    Validate {
        #[arg(long, required = true, require_equals = true)]
        profile: Option<String>,
    },
    /// Run the concurrency sweep of a profile
    #[command(arg_required_else_help = true)]
    Run {
        #[arg(long, required = true, require_equals = true)]
        profile: String,
        /// Overrides the profile's concurrency levels, e.g. --concurrency=1,5,10
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        concurrency: Option<Vec<u32>>,
        /// Overrides the per-level duration, in seconds
        #[arg(long)]
        duration: Option<u32>,
        /// Overrides the request mode: full_remote, classify_only or auto
        #[arg(long)]
        mode: Option<String>,
        /// Results file; printed to stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
        /// Use the deterministic mock executor instead of HTTP
        #[arg(long, default_value_t = false)]
        mock: bool,
    },
    /// Combine result files into a CSV comparison table
    #[command(arg_required_else_help = true)]
    Summarize {
        #[arg(long, required = true, num_args = 1..)]
        files: Vec<PathBuf>,
        /// CSV file; printed to stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Benchmark request modes one after another, one request at a time
    #[command(arg_required_else_help = true)]
    Compare {
        #[arg(long, required = true, require_equals = true)]
        profile: String,
        /// Modes to compare, in order
        #[arg(long, value_delimiter = ',', num_args = 1.., default_value = "full_remote,auto")]
        modes: Vec<String>,
        /// Requests per input and mode
        #[arg(long, default_value_t = 3)]
        repeat: usize,
        /// Report file; printed to stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        mock: bool,
    },
    /// Group client performance logs by mode, resize target and network type
    #[command(arg_required_else_help = true)]
    Logs {
        #[arg(long, required = true)]
        input: PathBuf,
        /// JSON summary; printed to stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also write a CSV table here
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Print a routing recommendation for the given telemetry
    #[command(arg_required_else_help = false)]
    Advise {
        /// Takes the advisor policy from this profile instead of the defaults
        #[arg(long, require_equals = true)]
        profile: Option<String>,
        /// Observed server latencies, oldest first
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        latency_ms: Vec<f64>,
        /// Observed request sizes, oldest first
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        file_size: Vec<u64>,
        #[arg(long)]
        current_file_size: Option<u64>,
        /// CPU utilization in percent; sampled from the host when omitted
        #[arg(long)]
        cpu: Option<f64>,
    },
}

pub fn run() -> anyhow::Result<()> {
    let args = Cli::parse();

    match args.command {
        Commands::Generate { path, version } => libprotocol::generate_profile(
            path.unwrap_or_else(|| "./demo-profile.json".to_string()),
            &version.unwrap_or_else(|| "1".to_string()),
        ),
        Commands::Schema { path, version } => {
            libprotocol::export_schema(path.unwrap_or_else(|| "./schema.json".to_string()), version)?;
            Ok(())
        }
        Commands::Validate { profile } => {
            let path = profile.context("--profile is required")?;
            Ok(libprotocol::validate(path)?)
        }
        Commands::Run { profile, concurrency, duration, mode, out, mock } => {
            let overrides = Overrides { concurrency, duration, mode };
            run_profile(profile, overrides, out.as_deref(), mock)
        }
        Commands::Summarize { files, out } => summarize(&files, out.as_deref()),
        Commands::Compare { profile, modes, repeat, out, mock } => {
            compare(profile, &modes, repeat, out.as_deref(), mock)
        }
        Commands::Logs { input, out, csv } => summarize_logs(&input, out.as_deref(), csv.as_deref()),
        Commands::Advise { profile, latency_ms, file_size, current_file_size, cpu } => {
            let policy = match profile {
                Some(path) => libprotocol::load_profile(path)?.advisor,
                None => Profile::default().advisor,
            };
            let decision = advise(Advisor::from_policy(policy), &latency_ms, &file_size, current_file_size, cpu);
            println!("{}", serde_json::to_string_pretty(&decision)?);
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
pub struct Overrides {
    pub concurrency: Option<Vec<u32>>,
    pub duration: Option<u32>,
    pub mode: Option<String>,
}

/// CLI values win over the profile; the result is checked again.
pub fn apply_overrides(mut profile: Profile, overrides: Overrides) -> Result<Profile, ProtocolError> {
    if let Some(levels) = overrides.concurrency {
        profile.load_test.concurrency = levels;
    }
    if let Some(duration) = overrides.duration {
        profile.load_test.duration_sec = duration;
    }
    if let Some(mode) = overrides.mode {
        profile.load_test.mode = RequestMode::try_from(mode.as_str())
            .map_err(|e| ProtocolError::Validation(ValidationErrors { items: vec![e] }))?;
    }
    libprotocol::check_profile(&profile)?;
    Ok(profile)
}

pub fn run_profile(path: impl AsRef<Path>, overrides: Overrides, out: Option<&Path>, is_mock: bool) -> anyhow::Result<()> {
    let path = path.as_ref();
    let profile = apply_overrides(libprotocol::load_profile(path)?, overrides)?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let results = runtime.block_on(run_with_progress(&profile, &base_dir, is_mock))?;

    match out {
        Some(out) => {
            create_parent(out)?;
            write_results(out, &results)?;
            info!(path = %out.display(), levels = results.len(), "results saved");
        }
        None => println!("{}", serde_json::to_string_pretty(&results)?),
    }
    Ok(())
}

async fn run_with_progress(profile: &Profile, base_dir: &Path, is_mock: bool) -> anyhow::Result<Vec<LoadTestResult>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(stats::live::report_progress(rx));

    let outcome = libruntime::run_sweep(profile, base_dir, is_mock, EventSink::new(tx)).await;

    match reporter.await {
        Ok(Ok(live)) => info!(
            ok = live.totals.requests_ok,
            err = live.totals.requests_err,
            levels = live.totals.levels_finished,
            "sweep finished"
        ),
        Ok(Err(e)) => warn!(error = %e, "progress reporter unavailable"),
        Err(e) => warn!(error = %e, "progress reporter stopped"),
    }
    Ok(outcome?)
}

pub fn summarize(files: &[PathBuf], out: Option<&Path>) -> anyhow::Result<()> {
    let datasets = load_datasets(files)?;
    match out {
        Some(out) => {
            write_csv(&datasets, out)?;
            info!(path = %out.display(), datasets = datasets.len(), "summary saved");
        }
        None => print!("{}", to_csv(&datasets)),
    }
    Ok(())
}

pub fn compare(path: impl AsRef<Path>, modes: &[String], repeat: usize, out: Option<&Path>, is_mock: bool) -> anyhow::Result<()> {
    let path = path.as_ref();
    let profile = libprotocol::load_profile(path)?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let modes = parse_modes(modes)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let reports = runtime.block_on(libruntime::compare_modes(&profile, &base_dir, &modes, repeat, is_mock))?;

    let json = serde_json::to_string_pretty(&reports)?;
    match out {
        Some(out) => {
            create_parent(out)?;
            fs::write(out, json)?;
            info!(path = %out.display(), modes = reports.len(), "mode comparison saved");
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub fn parse_modes(modes: &[String]) -> Result<Vec<RequestMode>, ProtocolError> {
    modes
        .iter()
        .map(|m| RequestMode::try_from(m.trim()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ProtocolError::Validation(ValidationErrors { items: vec![e] }))
}

pub fn summarize_logs(input: &Path, out: Option<&Path>, csv: Option<&Path>) -> anyhow::Result<()> {
    let entries = client_logs::load_logs(input)?;
    let groups = client_logs::summarize_logs(&entries);
    info!(entries = entries.len(), groups = groups.len(), "client logs grouped");

    let json = client_logs::to_json(&groups)?;
    match out {
        Some(out) => {
            create_parent(out)?;
            fs::write(out, json)?;
            info!(path = %out.display(), "log summary saved");
        }
        None => println!("{json}"),
    }
    if let Some(csv) = csv {
        create_parent(csv)?;
        fs::write(csv, client_logs::to_csv(&groups))?;
        info!(path = %csv.display(), "log summary table saved");
    }
    Ok(())
}

fn create_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Replays the observations into a fresh advisor, then asks it once. Sizes
/// beyond the latency history only feed the size window.
pub fn advise(
    advisor: Advisor,
    latency_ms: &[f64],
    file_size: &[u64],
    current_file_size: Option<u64>,
    cpu: Option<f64>,
) -> AdvisoryDecision {
    for (i, &ms) in latency_ms.iter().enumerate() {
        advisor.record(ms, file_size.get(i).copied());
    }
    for &size in file_size.iter().skip(latency_ms.len()) {
        advisor.telemetry().request_size().push(size as f64);
    }
    match cpu {
        Some(cpu) => advisor.advise(current_file_size, cpu),
        None => advisor.advise_with_probe(current_file_size, &SysinfoCpuProbe::new()),
    }
}
