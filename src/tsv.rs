//! Per-request TSV sink (C7): `start_us \t end_us \t outcome_code`.
//!
//! One sink per worker, shared by that worker's runners. Each worker opens
//! its own handle onto the same path, so the handle is always opened in
//! append mode: truncating on open would let one worker's handle zero out
//! bytes another worker has already written to the same file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::outcome::Outcome;

pub const TSV_BUFFER_SIZE: usize = 4096;

pub struct TsvSink {
    writer: BufWriter<File>,
}

impl TsvSink {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(TsvSink {
            writer: BufWriter::with_capacity(TSV_BUFFER_SIZE, file),
        })
    }

    /// Append one record. `start_us`/`end_us` are microseconds since the
    /// Unix epoch.
    pub fn record(&mut self, start_us: u64, end_us: u64, outcome: Outcome) -> std::io::Result<()> {
        writeln!(self.writer, "{start_us}\t{end_us}\t{}", outcome.code())?;
        // Line-buffered semantics: flush after every record rather than
        // relying on libc's _IOLBF, since Rust's BufWriter is always
        // fully-buffered.
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn writes_tab_separated_lines_with_outcome_codes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");

        {
            let mut sink = TsvSink::open(&path).unwrap();
            sink.record(100, 150, Outcome::Success { status: 200 }).unwrap();
            sink.record(200, 260, Outcome::Timeout).unwrap();
        }

        let file = File::open(&path).unwrap();
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .map(|l| l.unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "100\t150\t0");
        assert_eq!(lines[1], "200\t260\t3");
    }

    #[test]
    fn end_us_is_always_at_or_after_start_us() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let mut sink = TsvSink::open(&path).unwrap();
        sink.record(1_000, 1_050, Outcome::Success { status: 200 }).unwrap();
        drop(sink);

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut fields = contents.trim().split('\t');
        let start: u64 = fields.next().unwrap().parse().unwrap();
        let end: u64 = fields.next().unwrap().parse().unwrap();
        assert!(end >= start);
    }
}
