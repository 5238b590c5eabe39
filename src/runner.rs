//! Runner: owns one connection slot and decides when to dispatch the
//! next request. Composes three scheduling modes: unbounded, recycle
//! after a fixed number of requests per connection, or a rate-limited
//! tick.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::buckets::Buckets;
use crate::connection::{Connection, ConnectionConfig};
use crate::counters::Counters;
use crate::outcome::Outcome;
use crate::request::dispatch_and_await;
use crate::tsv::TsvSink;

/// Empirical scheduling compensation for the QPS tick period. Without it
/// the achieved rate consistently lands a little under the nominal
/// target because of scheduler wakeup latency.
pub const RATE_FUDGE_US: i64 = -300;

/// `None` means unbounded (run until the shared request budget, if any,
/// is exhausted).
#[derive(Debug, Clone, Copy)]
pub enum ScheduleMode {
    Unbounded,
    RpcRecycle { rpc: u64 },
    Qps { period: Duration },
}

impl ScheduleMode {
    /// Compute a runner's tick period from the per-runner QPS target
    /// (already divided down from the aggregate target by nprocs and
    /// concurrency during CLI normalization).
    pub fn qps_period(per_runner_qps: u64) -> Duration {
        if per_runner_qps == 0 {
            return Duration::from_micros(1);
        }
        let nominal_us = 1_000_000i64 / per_runner_qps as i64;
        let fudged = (nominal_us + RATE_FUDGE_US).max(1);
        Duration::from_micros(fudged as u64)
    }
}

/// Shared, worker-scoped request budget. `None` means unlimited. Runners
/// across a worker's `concurrency` slots race to decrement this; the
/// first to see it exhausted stops.
pub type SharedBudget = Option<Arc<AtomicI64>>;

/// Attempt to claim one slot from the shared budget. Returns `false` if
/// the budget is exhausted (and restores the slot it speculatively took).
fn try_claim(budget: &SharedBudget) -> bool {
    match budget {
        None => true,
        Some(remaining) => {
            let prev = remaining.fetch_sub(1, Ordering::SeqCst);
            if prev <= 0 {
                remaining.fetch_add(1, Ordering::SeqCst);
                false
            } else {
                true
            }
        }
    }
}

pub struct RunnerContext {
    pub id: u64,
    pub url: String,
    pub connection_config: ConnectionConfig,
    pub mode: ScheduleMode,
    pub budget: SharedBudget,
    pub counters: Arc<std::sync::Mutex<Counters>>,
    pub buckets: Arc<Buckets>,
    pub tsv: Option<Arc<AsyncMutex<TsvSink>>>,
}

/// Runs one runner to completion: dispatches requests according to its
/// `mode` until the shared budget (if any) is exhausted. Never returns an
/// error — per-request faults are always folded into counters.
pub async fn run_runner(ctx: RunnerContext) {
    let mut conn = Connection::new(&ctx.connection_config);
    let mut conn_reqno: u64 = 0;
    let mut next_tick = Instant::now();

    loop {
        if !try_claim(&ctx.budget) {
            break;
        }

        if let ScheduleMode::Qps { period } = ctx.mode {
            sleep_until(next_tick).await;
            next_tick += period;
        }

        let dispatched = dispatch_and_await(&conn, &ctx.url).await;
        conn_reqno += 1;

        let latency_ms = dispatched.end_us.saturating_sub(dispatched.start_us) / 1000;
        {
            let mut counters = ctx.counters.lock().unwrap();
            counters.record(dispatched.outcome, latency_ms, &ctx.buckets);
        }
        if let Some(tsv) = &ctx.tsv {
            let mut sink = tsv.lock().await;
            if let Err(err) = sink.record(dispatched.start_us, dispatched.end_us, dispatched.outcome) {
                tracing::warn!(error = %err, "failed writing TSV record");
            }
        }

        match dispatched.outcome {
            Outcome::Timeout => {
                debug!(runner = ctx.id, "timeout: recycling connection");
                conn.reconnect(&ctx.connection_config);
                conn_reqno = 0;
            }
            _ => {
                if let ScheduleMode::RpcRecycle { rpc } = ctx.mode {
                    if conn_reqno >= rpc {
                        debug!(runner = ctx.id, rpc, "requests-per-connection exhausted: recycling");
                        conn.reconnect(&ctx.connection_config);
                        conn_reqno = 0;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qps_period_applies_rate_fudge() {
        let period = ScheduleMode::qps_period(1000);
        // 1_000_000 / 1000 - 300 = 700us
        assert_eq!(period, Duration::from_micros(700));
    }

    #[test]
    fn qps_period_floors_at_one_microsecond() {
        let period = ScheduleMode::qps_period(10_000_000);
        assert_eq!(period, Duration::from_micros(1));
    }

    #[test]
    fn try_claim_unlimited_always_succeeds() {
        let budget: SharedBudget = None;
        for _ in 0..100 {
            assert!(try_claim(&budget));
        }
    }

    #[test]
    fn try_claim_stops_exactly_at_budget() {
        let budget: SharedBudget = Some(Arc::new(AtomicI64::new(3)));
        assert!(try_claim(&budget));
        assert!(try_claim(&budget));
        assert!(try_claim(&budget));
        assert!(!try_claim(&budget));
    }
}
