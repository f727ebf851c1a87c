use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Args, Parser, Subcommand};
use ingest::sample::generate_sample_log;
use ingest::{BatchIngestor, IngestReport, Level, ParseStats};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::filter::FilterCriteria;
use crate::records::RecordStore;

#[derive(Debug, Parser)]
#[command(name = "logstore", version, about = "Ingest web-server access logs into a queryable store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse access-log files and store the valid records
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Parse and report only, do not write to the database
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        json: bool,
    },
    /// List stored records, newest first
    List {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show aggregate statistics
    Stats {
        /// Number of busiest IPs to show
        #[arg(long, default_value_t = 10)]
        top: usize,
        #[arg(long)]
        json: bool,
    },
    /// Delete every stored record
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Write a synthetic access log
    Sample {
        #[arg(long, default_value_t = 10)]
        lines: usize,
        #[arg(long)]
        seed: Option<u64>,
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check that the database is reachable
    Ping,
}

impl Command {
    /// Whether the command needs a database connection.
    pub fn needs_store(&self) -> bool {
        match self {
            Command::Sample { .. } => false,
            Command::Ingest { dry_run, .. } => !dry_run,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Start of the time range: `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`
    #[arg(long, value_parser = parse_range_start)]
    pub since: Option<NaiveDateTime>,
    /// End of the time range (a bare date covers the whole day)
    #[arg(long, value_parser = parse_range_end)]
    pub until: Option<NaiveDateTime>,
    #[arg(long)]
    pub level: Option<Level>,
    #[arg(long)]
    pub ip: Option<String>,
    #[arg(long)]
    pub min_status: Option<u16>,
    #[arg(long)]
    pub max_status: Option<u16>,
}

impl From<FilterArgs> for FilterCriteria {
    fn from(args: FilterArgs) -> Self {
        FilterCriteria {
            start: args.since,
            end: args.until,
            level: args.level,
            ip: args.ip,
            min_status: args.min_status,
            max_status: args.max_status,
        }
    }
}

fn parse_datetime(raw: &str, day_time: NaiveTime) -> Result<NaiveDateTime, String> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(day_time))
        .map_err(|_| format!("expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS, got '{}'", raw))
}

pub fn parse_range_start(raw: &str) -> Result<NaiveDateTime, String> {
    parse_datetime(raw, NaiveTime::MIN)
}

pub fn parse_range_end(raw: &str) -> Result<NaiveDateTime, String> {
    // last nanosecond of the day
    let end_of_day = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN);
    parse_datetime(raw, end_of_day)
}

/// Run one command. `store` must be present when [`Command::needs_store`].
pub async fn run(command: Command, store: Option<RecordStore>) -> Result<()> {
    match command {
        Command::Sample { lines, seed, out } => write_sample(lines, seed, out),
        Command::Ingest { paths, dry_run, json } => {
            let store = if dry_run { None } else { Some(require(store)?) };
            ingest_files(paths, store, json).await
        }
        Command::List { filter, limit, json } => list(require(store)?, filter.into(), limit, json).await,
        Command::Stats { top, json } => stats(require(store)?, top, json).await,
        Command::Clear { yes } => clear(require(store)?, yes).await,
        Command::Ping => {
            let store = require(store)?;
            let pool = store.pool().clone();
            blocking(move || store.ping()).await?;
            let status = pool.status();
            println!(
                "Database is reachable ({} of {} connections open, {} idle)",
                status.open, status.max_size, status.idle
            );
            Ok(())
        }
    }
}

fn require(store: Option<RecordStore>) -> Result<RecordStore> {
    store.context("This command needs a database connection")
}

/// Run store work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> crate::error::StoreResult<T> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(work)
        .await
        .context("Database task panicked")??)
}

#[derive(Debug, Serialize)]
struct FileOutcome {
    path: PathBuf,
    stats: ParseStats,
    stored: usize,
    rejections: Vec<ingest::ingest::RejectedLine>,
}

/// Each file is parsed on its own blocking task; results are stored in the
/// order the paths were given.
pub async fn ingest_files(paths: Vec<PathBuf>, store: Option<RecordStore>, json: bool) -> Result<()> {
    let tasks: Vec<_> = paths
        .into_iter()
        .map(|path| {
            tokio::task::spawn_blocking(move || {
                let result = BatchIngestor::new().ingest_path(&path);
                (path, result)
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    let mut failures = 0usize;

    for task in tasks {
        let (path, result) = task.await.context("Ingest task panicked")?;
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                error!("{}", e);
                failures += 1;
                continue;
            }
        };

        let IngestReport { records, stats, rejections, .. } = report;
        info!("{}: parsed {} of {} lines", path.display(), stats.parsed_success, stats.total_lines);

        let stored = match &store {
            Some(store) if !records.is_empty() => {
                let store = store.clone();
                match blocking(move || store.insert_batch(&records)).await {
                    Ok(n) => n,
                    Err(e) => {
                        error!("{}: records not stored: {:#}", path.display(), e);
                        failures += 1;
                        0
                    }
                }
            }
            Some(_) => {
                warn!("{}: nothing to store", path.display());
                0
            }
            None => 0,
        };

        outcomes.push(FileOutcome { path, stats, stored, rejections });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        for outcome in &outcomes {
            print_file_outcome(outcome);
        }
    }

    if failures > 0 {
        anyhow::bail!("{} file(s) failed", failures);
    }
    Ok(())
}

fn print_file_outcome(outcome: &FileOutcome) {
    let s = &outcome.stats;
    println!("{}", outcome.path.display());
    println!("  lines:            {}", s.total_lines);
    println!("  parsed:           {} ({:.1}%)", s.parsed_success, s.success_rate());
    println!("  empty:            {}", s.empty_lines);
    println!("  pattern mismatch: {}", s.parse_errors);
    println!("  invalid ip:       {}", s.invalid_ips);
    println!("  bad timestamp:    {}", s.timestamp_errors);
    println!("  invalid status:   {}", s.invalid_status);
    println!("  stored:           {}", outcome.stored);
    for rejection in &outcome.rejections {
        println!("  line {}: {}", rejection.line_number, rejection.message);
    }
}

async fn list(store: RecordStore, criteria: FilterCriteria, limit: usize, json: bool) -> Result<()> {
    let mut records = blocking(move || store.scan_filtered(&criteria)).await?;
    records.truncate(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for stored in &records {
        let r = &stored.record;
        println!(
            "{:>6}  {}  {:<15}  {}  {:<7}  {}",
            stored.id,
            r.timestamp().format("%Y-%m-%d %H:%M:%S"),
            r.ip(),
            r.status(),
            r.level(),
            r.response_text()
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatsOutput {
    summary: crate::records::LogSummary,
    top_ips: Vec<crate::records::IpCount>,
    statuses: Vec<crate::records::StatusCount>,
}

async fn stats(store: RecordStore, top: usize, json: bool) -> Result<()> {
    let output = blocking(move || {
        Ok(StatsOutput {
            summary: store.aggregate_stats()?,
            top_ips: store.top_ips(top)?,
            statuses: store.status_breakdown()?,
        })
    })
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let s = &output.summary;
    println!("total:      {}", s.total);
    println!("unique ips: {}", s.unique_ips);
    println!("info:       {}", s.info_count);
    println!("warning:    {}", s.warning_count);
    println!("error:      {}", s.error_count);
    if let (Some(earliest), Some(latest)) = (s.earliest, s.latest) {
        println!("span:       {} .. {}", earliest, latest);
    }
    for ip in &output.top_ips {
        println!("  {:<15} {}", ip.ip, ip.count);
    }
    for status in &output.statuses {
        println!("  {} {}", status.status, status.count);
    }
    Ok(())
}

async fn clear(store: RecordStore, confirmed: bool) -> Result<()> {
    if !confirmed {
        anyhow::bail!("Refusing to delete every record without --yes");
    }
    let deleted = blocking(move || store.delete_all()).await?;
    println!("Deleted {} records", deleted);
    Ok(())
}

fn write_sample(lines: usize, seed: Option<u64>, out: Option<PathBuf>) -> Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let text = generate_sample_log(lines, &mut rng);

    match out {
        Some(path) => {
            std::fs::write(&path, format!("{}\n", text))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} sample lines to {}", lines, path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
