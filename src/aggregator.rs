//! Aggregator: merges per-worker [`Report`]s into one time-aligned
//! stream via a bounded ring of `NBUFFER` slots.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::info;

use crate::errors::EngineError;
use crate::report::Report;

/// Size of the ring buffer of in-flight report sequences. Exceeding this
/// many sequences behind `next_seq` is a fatal malfunction, not a
/// recoverable condition.
pub const NBUFFER: u64 = 10;

struct Slot {
    sums: Option<Report>,
    contributors: u64,
}

impl Slot {
    fn empty() -> Self {
        Slot {
            sums: None,
            contributors: 0,
        }
    }
}

/// One merged, completed sequence ready for emission.
pub struct MergedReport {
    pub wall_unix_seconds: u64,
    pub report: Report,
    pub hz: i64,
}

pub struct Aggregator {
    nprocs: u64,
    next_seq: u64,
    ring: Vec<Slot>,
    last_report_time: Instant,
    start_time: Instant,
}

impl Aggregator {
    pub fn new(nprocs: u64) -> Self {
        let now = Instant::now();
        Aggregator {
            nprocs,
            next_seq: 0,
            ring: (0..NBUFFER).map(|_| Slot::empty()).collect(),
            last_report_time: now,
            start_time: now,
        }
    }

    /// Feed one report from a worker into the ring. Returns `Ok(Some(_))`
    /// when this contribution completes its slot, ready for emission.
    /// Returns `Err` if the worker has fallen too far behind.
    pub fn ingest(&mut self, report: Report) -> Result<Option<MergedReport>, EngineError> {
        if report.seq >= self.next_seq + NBUFFER {
            return Err(EngineError::AggregatorLagFatal {
                seq: report.seq,
                next_seq: self.next_seq,
                nbuffer: NBUFFER,
            });
        }

        let slot_index = (report.seq % NBUFFER) as usize;
        let slot = &mut self.ring[slot_index];

        match &mut slot.sums {
            Some(sums) => sums.add_assign(&report),
            None => slot.sums = Some(report),
        }
        slot.contributors += 1;

        if slot.contributors < self.nprocs {
            return Ok(None);
        }

        let completed = slot.sums.take().expect("slot has contributions");
        let seq = self.next_seq;
        slot.contributors = 0;
        self.next_seq += 1;

        let elapsed_ms = self.last_report_time.elapsed().as_millis().max(1) as u64;
        let hz = (1000 * completed.conn_successes as i64) / elapsed_ms as i64;
        self.last_report_time = Instant::now();

        Ok(Some(MergedReport {
            wall_unix_seconds: unix_seconds(),
            report: Report { seq, ..completed },
            hz,
        }))
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

fn unix_seconds() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Drives the aggregator from a channel of reports until all worker
/// senders are dropped, writing merged lines via `emit`. Returns on a
/// clean channel close; propagates `EngineError` on fatal lag.
pub async fn run_aggregator<F>(
    mut receiver: mpsc::Receiver<Report>,
    nprocs: u64,
    mut emit: F,
) -> Result<(), EngineError>
where
    F: FnMut(&MergedReport),
{
    let mut aggregator = Aggregator::new(nprocs);
    while let Some(report) = receiver.recv().await {
        if let Some(merged) = aggregator.ingest(report)? {
            emit(&merged);
        }
    }
    info!("aggregator: all workers finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(seq: u64, conn_successes: u64) -> Report {
        Report {
            seq,
            conn_successes,
            conn_errors: 0,
            conn_timeouts: 0,
            conn_closes: 0,
            http_successes: conn_successes,
            http_errors: 0,
            histogram: vec![conn_successes, 0, 0, 0],
        }
    }

    #[test]
    fn emits_only_after_all_workers_contribute() {
        let mut agg = Aggregator::new(2);
        assert!(agg.ingest(report(0, 5)).unwrap().is_none());
        let merged = agg.ingest(report(0, 3)).unwrap().unwrap();
        assert_eq!(merged.report.conn_successes, 8);
        assert_eq!(merged.report.seq, 0);
    }

    #[test]
    fn emits_in_strictly_increasing_sequence_order() {
        let mut agg = Aggregator::new(1);
        let mut seqs = Vec::new();
        for seq in 0..5 {
            let merged = agg.ingest(report(seq, 1)).unwrap().unwrap();
            seqs.push(merged.report.seq);
        }
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn lag_beyond_nbuffer_is_fatal() {
        let mut agg = Aggregator::new(2);
        // Worker A races ahead to seq = NBUFFER while worker B never
        // contributes to seq 0.
        let err = agg.ingest(report(NBUFFER, 1));
        assert!(matches!(err, Err(EngineError::AggregatorLagFatal { .. })));
    }

    #[test]
    fn column_wise_sums_are_correct() {
        let mut agg = Aggregator::new(2);
        agg.ingest(report(0, 4)).unwrap();
        let merged = agg.ingest(report(0, 6)).unwrap().unwrap();
        assert_eq!(merged.report.histogram, vec![10, 0, 0, 0]);
    }
}
