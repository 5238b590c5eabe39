//! Wire format for worker → aggregator report lines.
//!
//! A [`Report`] is the tab-separated line emitted by a worker at each
//! report tick and parsed back by the aggregator. The fixed column order
//! is `seq`, six scalar counters, then one column per latency bucket.

use thiserror::Error;

use crate::counters::Counters;

/// Number of fixed scalar columns before the histogram columns:
/// conn_successes, conn_errors, conn_timeouts, conn_closes,
/// http_successes, http_errors.
pub const NUM_COLS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub seq: u64,
    pub conn_successes: u64,
    pub conn_errors: u64,
    pub conn_timeouts: u64,
    pub conn_closes: u64,
    pub http_successes: u64,
    pub http_errors: u64,
    pub histogram: Vec<u64>,
}

#[derive(Debug, Error)]
pub enum ReportParseError {
    #[error("empty report line")]
    Empty,
    #[error("missing column {index} (need at least {needed} columns)")]
    MissingColumn { index: usize, needed: usize },
    #[error("could not parse column {index} value {value:?}: {source}")]
    InvalidColumn {
        index: usize,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

impl Report {
    pub fn from_counters(seq: u64, counters: &Counters) -> Self {
        Report {
            seq,
            conn_successes: counters.conn_successes,
            conn_errors: counters.conn_errors,
            conn_timeouts: counters.conn_timeouts,
            conn_closes: counters.conn_closes,
            http_successes: counters.http_successes,
            http_errors: counters.http_errors,
            histogram: counters.histogram.clone(),
        }
    }

    /// Serialize to the tab-separated wire line (no trailing newline).
    pub fn to_line(&self) -> String {
        let mut cols: Vec<String> = vec![
            self.seq.to_string(),
            self.conn_successes.to_string(),
            self.conn_errors.to_string(),
            self.conn_timeouts.to_string(),
            self.conn_closes.to_string(),
            self.http_successes.to_string(),
            self.http_errors.to_string(),
        ];
        cols.extend(self.histogram.iter().map(|c| c.to_string()));
        cols.join("\t")
    }

    /// Parse a line previously produced by [`Report::to_line`].
    pub fn parse_line(line: &str) -> Result<Self, ReportParseError> {
        let line = line.trim_end_matches('\n');
        if line.is_empty() {
            return Err(ReportParseError::Empty);
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let needed = 1 + NUM_COLS;
        if fields.len() < needed {
            return Err(ReportParseError::MissingColumn {
                index: fields.len(),
                needed,
            });
        }

        let parse = |index: usize| -> Result<u64, ReportParseError> {
            fields[index]
                .parse::<u64>()
                .map_err(|source| ReportParseError::InvalidColumn {
                    index,
                    value: fields[index].to_string(),
                    source,
                })
        };

        let seq = parse(0)?;
        let conn_successes = parse(1)?;
        let conn_errors = parse(2)?;
        let conn_timeouts = parse(3)?;
        let conn_closes = parse(4)?;
        let http_successes = parse(5)?;
        let http_errors = parse(6)?;

        let mut histogram = Vec::with_capacity(fields.len() - needed);
        for i in needed..fields.len() {
            histogram.push(parse(i)?);
        }

        Ok(Report {
            seq,
            conn_successes,
            conn_errors,
            conn_timeouts,
            conn_closes,
            http_successes,
            http_errors,
            histogram,
        })
    }

    /// Column-wise addition, used by the aggregator to accumulate
    /// contributions from multiple workers into one ring slot.
    pub fn add_assign(&mut self, other: &Report) {
        self.conn_successes += other.conn_successes;
        self.conn_errors += other.conn_errors;
        self.conn_timeouts += other.conn_timeouts;
        self.conn_closes += other.conn_closes;
        self.http_successes += other.http_successes;
        self.http_errors += other.http_errors;
        for (a, b) in self.histogram.iter_mut().zip(other.histogram.iter()) {
            *a += b;
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buckets::Buckets;

    #[test]
    fn round_trips_through_the_wire_format() {
        let buckets = Buckets::default_buckets();
        let mut counters = Counters::new(&buckets);
        counters.conn_successes = 10;
        counters.http_successes = 9;
        counters.http_errors = 1;
        counters.histogram = vec![3, 4, 2, 0];

        let report = Report::from_counters(42, &counters);
        let line = report.to_line();
        let parsed = Report::parse_line(&line).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn line_has_expected_column_count() {
        let report = Report {
            seq: 0,
            conn_successes: 1,
            conn_errors: 0,
            conn_timeouts: 0,
            conn_closes: 0,
            http_successes: 1,
            http_errors: 0,
            histogram: vec![1, 0, 0, 0],
        };
        let line = report.to_line();
        assert_eq!(line.split('\t').count(), 1 + NUM_COLS + 4);
    }

    #[test]
    fn rejects_truncated_lines() {
        assert!(matches!(
            Report::parse_line("1\t2\t3"),
            Err(ReportParseError::MissingColumn { .. })
        ));
    }

    #[test]
    fn rejects_non_numeric_column() {
        assert!(matches!(
            Report::parse_line("1\t2\t3\t4\t5\t6\tnope"),
            Err(ReportParseError::InvalidColumn { .. })
        ));
    }

    #[test]
    fn add_assign_sums_columns() {
        let mut a = Report {
            seq: 0,
            conn_successes: 1,
            conn_errors: 0,
            conn_timeouts: 0,
            conn_closes: 0,
            http_successes: 1,
            http_errors: 0,
            histogram: vec![1, 0],
        };
        let b = Report {
            seq: 0,
            conn_successes: 2,
            conn_errors: 1,
            conn_timeouts: 0,
            conn_closes: 0,
            http_successes: 2,
            http_errors: 0,
            histogram: vec![0, 2],
        };
        a.add_assign(&b);
        assert_eq!(a.conn_successes, 3);
        assert_eq!(a.conn_errors, 1);
        assert_eq!(a.histogram, vec![1, 2]);
    }
}
