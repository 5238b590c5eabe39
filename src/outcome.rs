//! Terminal outcomes for a dispatched request.
//!
//! A request reaches exactly one of these at its terminus; the outcome
//! drives both the TSV record and the bucket/counter bookkeeping.

use std::fmt;

/// How one dispatched request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The connection accepted the request and a response came back.
    /// `status` is inspected separately to decide `http_successes` vs
    /// `http_errors`.
    Success { status: u16 },

    /// The underlying connection was observed to be closed by the peer
    /// while this request was in flight. Bookkeeping only — it does not
    /// change how the request itself is classified beyond this variant.
    Closed,

    /// The send failed, or the response indicated an invalid/absent
    /// status line.
    Error,

    /// The 1-second engine-enforced timeout fired before completion.
    Timeout,
}

impl Outcome {
    /// The TSV outcome code: 0=Success, 1=Closed, 2=Error, 3=Timeout.
    pub fn code(&self) -> u8 {
        match self {
            Outcome::Success { .. } => 0,
            Outcome::Closed => 1,
            Outcome::Error => 2,
            Outcome::Timeout => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Closed => "closed",
            Outcome::Error => "error",
            Outcome::Timeout => "timeout",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success { status } => write!(f, "success(status={status})"),
            other => write!(f, "{}", other.label()),
        }
    }
}
