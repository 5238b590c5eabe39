//! Worker loop: hosts `concurrency` runners plus a periodic report timer,
//! emitting one [`Report`] per tick over a shared channel.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::buckets::Buckets;
use crate::connection::ConnectionConfig;
use crate::counters::Counters;
use crate::report::Report;
use crate::runner::{run_runner, RunnerContext, ScheduleMode, SharedBudget};
use crate::tsv::TsvSink;

pub struct WorkerConfig {
    pub id: u64,
    pub concurrency: usize,
    pub url: String,
    pub host_hdr: String,
    pub mode: ScheduleMode,
    pub budget: SharedBudget,
    pub report_interval: Duration,
    pub buckets: Arc<Buckets>,
    pub tsv_path: Option<PathBuf>,
    pub sender: mpsc::Sender<Report>,
}

fn drain_report(seq: u64, counters: &Arc<Mutex<Counters>>) -> Report {
    let drained = counters.lock().unwrap().drain();
    Report::from_counters(seq, &drained)
}

/// Runs a worker to completion: spawns its runners, emits periodic
/// reports, and emits one final report after the last runner terminates.
pub async fn run_worker(config: WorkerConfig) -> std::io::Result<()> {
    let counters = Arc::new(Mutex::new(Counters::new(&config.buckets)));
    let tsv = match &config.tsv_path {
        Some(path) => Some(Arc::new(AsyncMutex::new(TsvSink::open(path)?))),
        None => None,
    };

    let connection_config = ConnectionConfig {
        host_hdr: config.host_hdr.clone(),
    };

    let mut runners = JoinSet::new();
    for i in 0..config.concurrency {
        let ctx = RunnerContext {
            id: config.id * 1000 + i as u64,
            url: config.url.clone(),
            connection_config: connection_config.clone(),
            mode: config.mode,
            budget: config.budget.clone(),
            counters: counters.clone(),
            buckets: config.buckets.clone(),
            tsv: tsv.clone(),
        };
        runners.spawn(run_runner(ctx));
    }

    let mut interval = tokio::time::interval(config.report_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the real first report should be
    // one interval after start, matching `reporttv` being armed (not
    // fired) at worker startup.
    interval.tick().await;

    let mut seq = 0u64;
    loop {
        if runners.is_empty() {
            break;
        }
        tokio::select! {
            _ = interval.tick() => {
                let report = drain_report(seq, &counters);
                seq += 1;
                if config.sender.send(report).await.is_err() {
                    warn!(worker = config.id, "aggregator channel closed; stopping reports");
                    break;
                }
            }
            joined = runners.join_next() => {
                match joined {
                    Some(Ok(())) => {}
                    Some(Err(err)) => warn!(worker = config.id, error = %err, "runner task panicked"),
                    None => break,
                }
            }
        }
    }

    let final_report = drain_report(seq, &counters);
    let _ = config.sender.send(final_report).await;
    info!(worker = config.id, "worker finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn worker_emits_at_least_one_report_with_expected_successes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::channel(16);
        let config = WorkerConfig {
            id: 0,
            concurrency: 4,
            url: format!("{}/", server.uri()),
            host_hdr: "example.com:80".to_string(),
            mode: ScheduleMode::Unbounded,
            budget: Some(Arc::new(std::sync::atomic::AtomicI64::new(20))),
            report_interval: Duration::from_millis(50),
            buckets: Arc::new(Buckets::default_buckets()),
            tsv_path: None,
            sender: tx,
        };

        run_worker(config).await.unwrap();

        let mut total_successes = 0u64;
        while let Some(report) = rx.recv().await {
            total_successes += report.http_successes;
        }
        assert_eq!(total_successes, 20);
    }
}
