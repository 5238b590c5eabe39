//! Per-worker counters (C5), reset on every report emission.

use crate::buckets::Buckets;
use crate::outcome::Outcome;

/// The six scalar counters plus the latency histogram, scoped to one
/// worker between report ticks.
#[derive(Debug, Clone)]
pub struct Counters {
    pub conn_successes: u64,
    pub conn_errors: u64,
    pub conn_timeouts: u64,
    pub conn_closes: u64,
    pub http_successes: u64,
    pub http_errors: u64,
    pub histogram: Vec<u64>,
}

impl Counters {
    pub fn new(buckets: &Buckets) -> Self {
        Counters {
            conn_successes: 0,
            conn_errors: 0,
            conn_timeouts: 0,
            conn_closes: 0,
            http_successes: 0,
            http_errors: 0,
            histogram: vec![0; buckets.num_columns()],
        }
    }

    /// Apply a request's terminal outcome to the running counts.
    /// `latency_ms` is only meaningful for `Success`.
    pub fn record(&mut self, outcome: Outcome, latency_ms: u64, buckets: &Buckets) {
        match outcome {
            Outcome::Success { status } => {
                self.conn_successes += 1;
                if status == 200 {
                    let idx = buckets.index_for(latency_ms);
                    self.histogram[idx] += 1;
                    self.http_successes += 1;
                } else {
                    self.http_errors += 1;
                }
            }
            Outcome::Error => self.conn_errors += 1,
            Outcome::Timeout => self.conn_timeouts += 1,
            Outcome::Closed => self.conn_closes += 1,
        }
    }

    /// Take the current values and reset all counters to zero, leaving a
    /// fresh `Counters` in place (mirrors `reportcb`'s memset-after-print).
    pub fn drain(&mut self) -> Counters {
        let taken = self.clone();
        self.conn_successes = 0;
        self.conn_errors = 0;
        self.conn_timeouts = 0;
        self.conn_closes = 0;
        self.http_successes = 0;
        self.http_errors = 0;
        self.histogram.iter_mut().for_each(|c| *c = 0);
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_200_increments_bucket_and_http_successes() {
        let buckets = Buckets::default_buckets();
        let mut counters = Counters::new(&buckets);
        counters.record(Outcome::Success { status: 200 }, 5, &buckets);
        assert_eq!(counters.http_successes, 1);
        assert_eq!(counters.conn_successes, 1);
        assert_eq!(counters.histogram, vec![0, 1, 0, 0]);
    }

    #[test]
    fn success_non_200_increments_http_errors_not_histogram() {
        let buckets = Buckets::default_buckets();
        let mut counters = Counters::new(&buckets);
        counters.record(Outcome::Success { status: 500 }, 5, &buckets);
        assert_eq!(counters.conn_successes, 1);
        assert_eq!(counters.http_errors, 1);
        assert_eq!(counters.histogram, vec![0, 0, 0, 0]);
    }

    #[test]
    fn counter_conservation_only_200s_enter_histogram() {
        let buckets = Buckets::default_buckets();
        let mut counters = Counters::new(&buckets);
        for _ in 0..7 {
            counters.record(Outcome::Success { status: 200 }, 2, &buckets);
        }
        counters.record(Outcome::Success { status: 404 }, 2, &buckets);
        counters.record(Outcome::Error, 0, &buckets);
        counters.record(Outcome::Timeout, 0, &buckets);
        let sum: u64 = counters.histogram.iter().sum();
        assert_eq!(sum, counters.http_successes);
        assert_eq!(counters.http_successes, 7);
    }

    #[test]
    fn drain_resets_and_returns_prior_values() {
        let buckets = Buckets::default_buckets();
        let mut counters = Counters::new(&buckets);
        counters.record(Outcome::Error, 0, &buckets);
        let drained = counters.drain();
        assert_eq!(drained.conn_errors, 1);
        assert_eq!(counters.conn_errors, 0);
    }
}
