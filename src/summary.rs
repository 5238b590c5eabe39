//! Human-readable final summary, emitted on SIGINT or normal completion.

use std::io::Write;

use crate::buckets::Buckets;
use crate::counters::Counters;

/// Writes the `# hz`, `# time`, and per-counter/per-bucket summary lines
/// to `w` (stderr in production).
pub fn write_summary<W: Write>(
    w: &mut W,
    totals: &Counters,
    buckets: &Buckets,
    hz: i64,
    elapsed_secs: f64,
) -> std::io::Result<()> {
    writeln!(w, "# hz\t\t\t{hz}")?;
    writeln!(w, "# time\t\t\t{elapsed_secs:.3}")?;

    let total = totals.conn_successes + totals.conn_errors + totals.conn_timeouts;

    print_count(w, "conn_total    ", total, total)?;
    print_count(w, "conn_successes", total, totals.conn_successes)?;
    print_count(w, "conn_errors   ", total, totals.conn_errors)?;
    print_count(w, "conn_timeouts ", total, totals.conn_timeouts)?;
    print_count(w, "conn_closes   ", total, totals.conn_closes)?;
    print_count(w, "http_successes", total, totals.http_successes)?;
    print_count(w, "http_errors   ", total, totals.http_errors)?;

    let bounds = buckets.as_slice();
    for (i, upper) in bounds.iter().enumerate() {
        let label = format!("<{upper}\t\t");
        print_count(w, &label, total, totals.histogram[i])?;
    }
    let overflow_label = match bounds.last() {
        Some(last) => format!(">={last}\t\t"),
        None => ">=?\t\t".to_string(),
    };
    print_count(w, &overflow_label, total, *totals.histogram.last().unwrap_or(&0))?;

    Ok(())
}

fn print_count<W: Write>(w: &mut W, name: &str, total: u64, count: u64) -> std::io::Result<()> {
    write!(w, "# {name}")?;
    if total > 0 {
        let fraction = count as f64 / total as f64;
        write!(w, "\t{count}\t{fraction:.5}")?;
    }
    writeln!(w)
}
