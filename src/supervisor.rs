//! Supervisor (C6): wires the CLI-derived [`Config`] into `nprocs` worker
//! tasks and the aggregator, prints the banner, and races the aggregator
//! against SIGINT. Worker processes become `tokio::spawn`ed tasks sharing
//! one `mpsc` channel to the aggregator instead of forked children piping
//! over socketpairs.

use std::io::{self, Write};
use std::sync::atomic::AtomicI64;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::aggregator::{run_aggregator, MergedReport, NBUFFER};
use crate::buckets::Buckets;
use crate::cli::Config;
use crate::errors::EngineError;
use crate::report::NUM_COLS;
use crate::runner::ScheduleMode;
use crate::summary::write_summary;
use crate::worker::WorkerConfig;

pub fn print_banner<W: Write>(w: &mut W, config: &Config) -> io::Result<()> {
    writeln!(w, "# Host: {}", config.host_hdr)?;
    writeln!(
        w,
        "# params: -c {} -n {} -p {} -r {} -i {} -l {} -u {} {} {}",
        config.concurrency,
        config.per_worker_count.map(|c| c as i64).unwrap_or(-1),
        config.nprocs,
        config.rpc.map(|r| r as i64).unwrap_or(-1),
        config.report_interval.as_secs(),
        config.per_runner_qps.unwrap_or(0),
        config.path,
        config.host,
        config.port
    )?;

    write!(w, "# \t\t")?;
    writeln!(w, "conn\tconn\tconn\tconn\thttp\thttp")?;
    write!(w, "# ts\t\t")?;
    writeln!(w, "success\terrors\ttimeout\tcloses\tsuccess\terror\t")?;
    Ok(())
}

fn merged_line(merged: &MergedReport) -> String {
    let r = &merged.report;
    let mut cols = vec![
        merged.wall_unix_seconds.to_string(),
        r.conn_successes.to_string(),
        r.conn_errors.to_string(),
        r.conn_timeouts.to_string(),
        r.conn_closes.to_string(),
        r.http_successes.to_string(),
        r.http_errors.to_string(),
    ];
    cols.extend(r.histogram.iter().map(|c| c.to_string()));
    cols.push(merged.hz.to_string());
    debug_assert_eq!(cols.len(), 1 + NUM_COLS + r.histogram.len() + 1);
    cols.join("\t")
}

/// Build the schedule mode and per-worker request budget shared by this
/// config — NOT the per-runner instant it's spawned, since `count` and
/// `qps` are shared across a worker's `concurrency` runners.
fn mode_for(config: &Config) -> ScheduleMode {
    if let Some(qps) = config.per_runner_qps {
        ScheduleMode::Qps {
            period: ScheduleMode::qps_period(qps),
        }
    } else if let Some(rpc) = config.rpc {
        ScheduleMode::RpcRecycle { rpc }
    } else {
        ScheduleMode::Unbounded
    }
}

/// Run the full engine to completion, or until SIGINT. Returns the
/// accumulated totals and elapsed time so the caller can print the final
/// summary exactly once, in one place.
pub async fn run(config: Config) -> Result<(), EngineError> {
    let mut stderr = io::stderr();
    let _ = print_banner(&mut stderr, &config);

    let buckets = Arc::new(config.buckets.clone());
    let url = format!(
        "http://{}:{}{}",
        config.host, config.port, config.path
    );

    let (sender, receiver) = mpsc::channel(config.nprocs as usize * 4);

    let mut worker_handles = Vec::with_capacity(config.nprocs as usize);
    for worker_id in 0..config.nprocs {
        let budget = config
            .per_worker_count
            .map(|count| Arc::new(AtomicI64::new(count as i64)));
        let worker_config = WorkerConfig {
            id: worker_id,
            concurrency: config.concurrency as usize,
            url: url.clone(),
            host_hdr: config.host_hdr.clone(),
            mode: mode_for(&config),
            budget,
            report_interval: config.report_interval,
            buckets: buckets.clone(),
            tsv_path: config.tsv_path.clone(),
            sender: sender.clone(),
        };
        worker_handles.push(tokio::spawn(crate::worker::run_worker(worker_config)));
    }
    // Drop the supervisor's own sender so the channel closes once every
    // worker's clone has been dropped.
    drop(sender);

    let totals = Arc::new(std::sync::Mutex::new(totals_accumulator(&buckets)));
    let totals_for_emit = totals.clone();
    let start = tokio::time::Instant::now();

    let aggregator_fut = run_aggregator(receiver, config.nprocs, move |merged| {
        println!("{}", merged_line(merged));
        let mut totals = totals_for_emit.lock().unwrap();
        totals.conn_successes += merged.report.conn_successes;
        totals.conn_errors += merged.report.conn_errors;
        totals.conn_timeouts += merged.report.conn_timeouts;
        totals.conn_closes += merged.report.conn_closes;
        totals.http_successes += merged.report.http_successes;
        totals.http_errors += merged.report.http_errors;
        for (a, b) in totals.histogram.iter_mut().zip(merged.report.histogram.iter()) {
            *a += b;
        }
    });

    tokio::select! {
        result = aggregator_fut => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            // Worker tasks are abandoned here, matching forked children
            // being implicitly reaped by process exit.
        }
    }

    let totals = totals.lock().unwrap().clone();
    let elapsed_secs = start.elapsed().as_secs_f64();
    // Overall average rate across the whole run, not the most recent
    // report interval's rate (which `MergedReport::hz` tracks).
    let elapsed_ms = (elapsed_secs * 1000.0).max(1.0) as i64;
    let hz = (1000 * totals.conn_successes as i64) / elapsed_ms;
    let _ = write_summary(&mut stderr, &totals, &buckets, hz, elapsed_secs);

    Ok(())
}

fn totals_accumulator(buckets: &Buckets) -> crate::counters::Counters {
    crate::counters::Counters::new(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_size_is_exported_for_tests() {
        assert_eq!(NBUFFER, 10);
    }

    #[test]
    fn merged_line_has_expected_column_count() {
        let merged = MergedReport {
            wall_unix_seconds: 1_700_000_000,
            report: crate::report::Report {
                seq: 0,
                conn_successes: 1,
                conn_errors: 0,
                conn_timeouts: 0,
                conn_closes: 0,
                http_successes: 1,
                http_errors: 0,
                histogram: vec![1, 0, 0, 0],
            },
            hz: 42,
        };
        let line = merged_line(&merged);
        // wall_seconds + 6 scalar cols + 4 histogram cols + hz
        assert_eq!(line.split('\t').count(), 1 + NUM_COLS + 4 + 1);
    }
}
