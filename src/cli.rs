//! Command-line surface and post-parse normalization.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::buckets::Buckets;
use crate::errors::CliError;

#[derive(Parser, Debug)]
#[command(
    name = "hammerhdr",
    about = "HTTP load generator with periodic bucketed latency reporting",
    disable_help_flag = false
)]
struct RawArgs {
    /// Concurrency per worker.
    #[arg(short = 'c', default_value_t = 1)]
    concurrency: u64,

    /// Total request count across all workers (default unlimited).
    #[arg(short = 'n')]
    count: Option<i64>,

    /// Number of worker processes.
    #[arg(short = 'p', default_value_t = 1)]
    nprocs: u64,

    /// Report interval in seconds.
    #[arg(short = 'i', default_value_t = 1)]
    report_interval_secs: u64,

    /// Requests per connection; mutually exclusive with -l.
    #[arg(short = 'r')]
    rpc: Option<u64>,

    /// Aggregate target QPS (global); mutually exclusive with -r.
    #[arg(short = 'l')]
    qps: Option<u64>,

    /// Comma-separated strictly-increasing bucket upper bounds in ms.
    #[arg(short = 'b', default_value = "1,10,100")]
    buckets: String,

    /// Request path.
    #[arg(short = 'u', default_value = "/")]
    path: String,

    /// Value of the Host: header (defaults to host:port).
    #[arg(short = 'H')]
    host_hdr: Option<String>,

    /// TSV per-request log file.
    #[arg(short = 'o')]
    tsv_path: Option<PathBuf>,

    /// Target host (default 127.0.0.1).
    host: Option<String>,

    /// Target port (default 80).
    port: Option<u16>,
}

/// Fully normalized, validated configuration ready to drive the
/// supervisor. `count` and `qps` have already had the post-parse
/// normalization applied (`count /= nprocs`; `qps /= nprocs`, then
/// `/= concurrency`), so downstream code can treat them as per-worker and
/// per-runner values respectively.
#[derive(Debug, Clone)]
pub struct Config {
    pub concurrency: u64,
    pub per_worker_count: Option<u64>,
    pub nprocs: u64,
    pub report_interval: Duration,
    pub rpc: Option<u64>,
    pub per_runner_qps: Option<u64>,
    pub buckets: Buckets,
    pub path: String,
    pub host_hdr: String,
    pub host: String,
    pub port: u16,
    pub tsv_path: Option<PathBuf>,
}

impl Config {
    /// Parses `std::env::args()` and validates/normalizes into a
    /// [`Config`]: bucket parsing, `-l`/`-r` mutual exclusion, then the
    /// count/qps normalization division.
    pub fn parse() -> Result<Config, CliError> {
        let raw = RawArgs::parse();
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawArgs) -> Result<Config, CliError> {
        if raw.concurrency == 0 {
            return Err(CliError::ZeroConcurrency);
        }
        if raw.nprocs == 0 {
            return Err(CliError::ZeroWorkers);
        }
        if raw.report_interval_secs == 0 {
            return Err(CliError::ZeroReportInterval);
        }
        if raw.rpc.is_some() && raw.qps.is_some() {
            return Err(CliError::QpsConflictsWithRpc);
        }

        let buckets = Buckets::parse(&raw.buckets)?;

        let host = raw.host.unwrap_or_else(|| "127.0.0.1".to_string());
        let port = raw.port.unwrap_or(80);
        let host_hdr = raw.host_hdr.unwrap_or_else(|| format!("{host}:{port}"));

        // The parent divides count by nprocs; each worker's own qps share
        // is further divided by concurrency below. A negative or absent
        // -n means unlimited.
        let per_worker_count = match raw.count {
            Some(count) if count >= 0 => Some((count as u64) / raw.nprocs),
            _ => None,
        };

        let per_runner_qps = raw.qps.map(|qps| (qps / raw.nprocs.max(1)) / raw.concurrency.max(1));

        if let Some(path) = &raw.tsv_path {
            // Validated once, eagerly, at startup: each worker later opens
            // its own handle to the same path, but a bad path or
            // permission failure should abort before any worker is spawned
            // rather than surface only from inside a spawned task.
            std::fs::File::create(path).map_err(|source| CliError::TsvOpenFailed {
                path: path.clone(),
                source,
            })?;
        }

        Ok(Config {
            concurrency: raw.concurrency,
            per_worker_count,
            nprocs: raw.nprocs,
            report_interval: Duration::from_secs(raw.report_interval_secs),
            rpc: raw.rpc,
            per_runner_qps,
            buckets,
            path: raw.path,
            host_hdr,
            host,
            port,
            tsv_path: raw.tsv_path,
        })
    }
}
