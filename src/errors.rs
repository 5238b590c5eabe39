//! Error types for configuration parsing and fatal engine conditions.
//!
//! Per-request faults (Error/Timeout/Closed) are *not* represented here —
//! they are outcomes, not errors, and never escape the runner loop. See
//! [`crate::outcome::Outcome`].

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while parsing or validating CLI arguments.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("first bucket must be > 0")]
    FirstBucketNotPositive,

    #[error("invalid bucket specification: buckets must be strictly increasing")]
    BucketsNotIncreasing,

    #[error("bucket list accepts at most {max} entries")]
    TooManyBuckets { max: usize },

    #[error("could not parse bucket value {value:?}: {source}")]
    InvalidBucketValue {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("-l (MAX_QPS) does not support -r (RPC)")]
    QpsConflictsWithRpc,

    #[error("concurrency must be >= 1")]
    ZeroConcurrency,

    #[error("number of worker processes (-p) must be >= 1")]
    ZeroWorkers,

    #[error("report interval must be >= 1 second")]
    ZeroReportInterval,

    #[error("could not open TSV output file {path:?}: {source}")]
    TsvOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal conditions raised by the running engine, as opposed to per-request
/// faults, which never propagate.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A worker produced reports faster than the aggregator could merge
    /// them; the aggregator's ring buffer has no room left for it.
    #[error(
        "a worker fell too far behind: sequence {seq} arrived while the aggregator was still \
         waiting on sequence {next_seq} (ring buffer holds {nbuffer} in flight)"
    )]
    AggregatorLagFatal {
        seq: u64,
        next_seq: u64,
        nbuffer: u64,
    },

    #[error("failed to write report line: {0}")]
    ReportWrite(#[source] std::io::Error),

    #[error("failed to write TSV record: {0}")]
    TsvWrite(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_error_messages_are_stable() {
        assert_eq!(
            CliError::FirstBucketNotPositive.to_string(),
            "first bucket must be > 0"
        );
        assert_eq!(
            CliError::QpsConflictsWithRpc.to_string(),
            "-l (MAX_QPS) does not support -r (RPC)"
        );
    }

    #[test]
    fn engine_error_lag_message_contains_counts() {
        let err = EngineError::AggregatorLagFatal {
            seq: 15,
            next_seq: 2,
            nbuffer: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("15"));
        assert!(msg.contains("2"));
        assert!(msg.contains("10"));
    }
}
