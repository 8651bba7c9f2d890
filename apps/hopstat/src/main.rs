use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use hopstat_model::{ReportFile, TraceReport};
use hopstat_trace::{process_mtr_raw, run_traces, MtrSettings};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod summary;

use summary::render_summary;

#[derive(Parser)]
#[command(name = "hopstat", version, about = "Per-hop path statistics from mtr --raw")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Trace(TraceArgs),
    Parse(ParseArgs),
    Summary(SummaryArgs),
}

#[derive(Args)]
#[command(
    about = "Run mtr in raw mode. Only target networks you own or have permission to test."
)]
struct TraceArgs {
    #[arg(long)]
    targets: Option<PathBuf>,

    #[arg(long = "target")]
    target_list: Vec<String>,

    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 10)]
    rounds: u32,

    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    #[arg(long = "mtr", default_value = "mtr")]
    program: String,

    /// Passed to mtr after the target.
    #[arg(last = true)]
    extra: Vec<String>,
}

#[derive(Args)]
#[command(about = "Process saved mtr --raw output")]
struct ParseArgs {
    #[arg(long = "in")]
    in_path: PathBuf,

    #[arg(long)]
    out: PathBuf,

    #[arg(long)]
    rounds: u32,

    #[arg(long)]
    target: Option<String>,
}

#[derive(Args)]
#[command(about = "Print a report file as a table")]
struct SummaryArgs {
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli.command) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Trace(args) => run_trace(args),
        Commands::Parse(args) => run_parse(args),
        Commands::Summary(args) => run_summary(args),
    }
}

fn run_trace(args: TraceArgs) -> Result<()> {
    let mut targets: Vec<String> = Vec::new();

    if let Some(path) = &args.targets {
        let contents = fs::read_to_string(path)
            .map_err(|err| anyhow!("failed to read targets file {:?}: {}", path, err))?;
        targets.extend(parse_targets(&contents));
    }

    targets.extend(args.target_list);

    if targets.is_empty() {
        return Err(anyhow!("no targets provided (use --targets or --target)"));
    }

    let settings = MtrSettings {
        program: args.program,
        rounds: args.rounds,
        extra_args: args.extra,
    };
    settings.validate()?;

    info!(targets = targets.len(), concurrency = args.concurrency, "starting traces");

    let mut reports = Vec::new();
    for job in run_traces(&targets, &settings, args.concurrency) {
        match job.result {
            Ok(path) => reports.push(TraceReport {
                target: job.target,
                timestamp_utc: now_utc(),
                path,
            }),
            Err(err) => error!(host = %job.target, "trace failed: {err:#}"),
        }
    }

    if reports.is_empty() {
        return Err(anyhow!("every trace failed; nothing written"));
    }
    if reports.len() < targets.len() {
        warn!(
            written = reports.len(),
            requested = targets.len(),
            "some traces failed"
        );
    }

    write_json(&args.out, &ReportFile { version: 1, reports })
}

fn run_parse(args: ParseArgs) -> Result<()> {
    let raw = fs::read(&args.in_path)
        .map_err(|err| anyhow!("failed to read input {:?}: {}", args.in_path, err))?;
    let path = process_mtr_raw(&raw, args.rounds)
        .map_err(|err| anyhow!("failed to parse mtr output {:?}: {}", args.in_path, err))?;

    let target = args.target.unwrap_or_else(|| {
        args.in_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("unknown")
            .to_string()
    });

    let report = TraceReport {
        target,
        timestamp_utc: now_utc(),
        path,
    };
    write_json(
        &args.out,
        &ReportFile {
            version: 1,
            reports: vec![report],
        },
    )
}

fn run_summary(args: SummaryArgs) -> Result<()> {
    let file: ReportFile = read_json(&args.in_path)?;
    let mut stdout = std::io::stdout().lock();
    for report in &file.reports {
        writeln!(stdout, "{}", render_summary(report))?;
    }
    Ok(())
}

fn parse_targets(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)
        .map_err(|err| anyhow!("failed to read input {:?}: {}", path, err))?;
    serde_json::from_str(&contents).map_err(|err| anyhow!("failed to parse {:?}: {}", path, err))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    atomic_write(path, &json)
}

/// Writes through a sibling temp file, then renames it over `path` and syncs
/// the directory so the rename itself survives a crash.
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = output_dir(path);
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let staging = staging_path(path);
    let written = fs::File::create(&staging).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    if let Err(err) = written.and_then(|()| fs::rename(&staging, path)) {
        let _ = fs::remove_file(&staging);
        return Err(err).with_context(|| format!("failed to write report {}", path.display()));
    }

    if let Ok(handle) = fs::File::open(dir) {
        handle
            .sync_all()
            .with_context(|| format!("failed to sync output directory {}", dir.display()))?;
    }
    Ok(())
}

fn output_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// `<dir>/.<name>.hopstat-<pid>-<nanos>.tmp`
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.json".to_string());
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    output_dir(path).join(format!(".{name}.hopstat-{}-{nanos}.tmp", std::process::id()))
}
