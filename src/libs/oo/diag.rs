use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Why a piece of evidence was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rejection {
    ConflictingEdge,
    FailedExtension,
    DeferredMerge,
    ShortLine,
    OrientationConflict,
    FlipRefused,
    WouldCycle,
    ImpossibleRange,
    InconsistentRange,
    WeakEvidence,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::ConflictingEdge => "conflicting edge",
            Rejection::FailedExtension => "failed extension",
            Rejection::DeferredMerge => "deferred merge",
            Rejection::ShortLine => "short line",
            Rejection::OrientationConflict => "orientation conflict",
            Rejection::FlipRefused => "flip refused",
            Rejection::WouldCycle => "would cycle",
            Rejection::ImpossibleRange => "impossible range",
            Rejection::InconsistentRange => "inconsistent range",
            Rejection::WeakEvidence => "weak evidence",
        }
    }
}

/// Receiver of every decision the assembler makes.
pub trait Diagnostics {
    fn record_rejection(&mut self, kind: Rejection, detail: &str);
    fn record_merge(&mut self, detail: &str);
    fn record_accept(&mut self, detail: &str);
    fn record_degraded(&mut self, detail: &str);
}

/// Outcome counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub accepted: usize,
    pub merged: usize,
    pub degraded: usize,
    pub rejected: BTreeMap<String, usize>,
}

impl Tally {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn rejected_of(&self, kind: Rejection) -> usize {
        self.rejected.get(kind.as_str()).copied().unwrap_or(0)
    }

    fn reject(&mut self, kind: Rejection) {
        *self.rejected.entry(kind.as_str().to_string()).or_insert(0) += 1;
    }
}

/// Sends decisions to the `log` facade and, optionally, one line each to a decision log.
pub struct LogDiagnostics {
    tally: Tally,
    out: Option<Box<dyn Write>>,
    failure: Option<io::Error>,
}

impl LogDiagnostics {
    pub fn new() -> Self {
        Self {
            tally: Tally::default(),
            out: None,
            failure: None,
        }
    }

    pub fn with_writer(out: Box<dyn Write>) -> Self {
        Self {
            tally: Tally::default(),
            out: Some(out),
            failure: None,
        }
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    /// Flushes the decision log, surfacing the first write error.
    pub fn finish(mut self) -> io::Result<Tally> {
        if let Some(err) = self.failure.take() {
            return Err(err);
        }
        if let Some(out) = self.out.as_mut() {
            out.flush()?;
        }
        Ok(self.tally)
    }

    fn emit(&mut self, tag: &str, detail: &str) {
        if self.failure.is_some() {
            return;
        }
        if let Some(out) = self.out.as_mut() {
            if let Err(err) = writeln!(out, "{}\t{}", tag, detail) {
                self.failure = Some(err);
            }
        }
    }
}

impl Default for LogDiagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics for LogDiagnostics {
    fn record_rejection(&mut self, kind: Rejection, detail: &str) {
        log::debug!("rejected ({}): {}", kind.as_str(), detail);
        self.tally.reject(kind);
        self.emit(kind.as_str(), detail);
    }

    fn record_merge(&mut self, detail: &str) {
        log::debug!("merged: {}", detail);
        self.tally.merged += 1;
        self.emit("merge", detail);
    }

    fn record_accept(&mut self, detail: &str) {
        log::debug!("accepted: {}", detail);
        self.tally.accepted += 1;
        self.emit("accept", detail);
    }

    fn record_degraded(&mut self, detail: &str) {
        log::warn!("{}", detail);
        self.tally.degraded += 1;
        self.emit("degraded", detail);
    }
}

/// Keeps every decision in memory.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    pub tally: Tally,
    pub events: Vec<(String, String)>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.events.iter().any(|(t, _)| t == tag)
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn record_rejection(&mut self, kind: Rejection, detail: &str) {
        self.tally.reject(kind);
        self.events
            .push((kind.as_str().to_string(), detail.to_string()));
    }

    fn record_merge(&mut self, detail: &str) {
        self.tally.merged += 1;
        self.events.push(("merge".to_string(), detail.to_string()));
    }

    fn record_accept(&mut self, detail: &str) {
        self.tally.accepted += 1;
        self.events.push(("accept".to_string(), detail.to_string()));
    }

    fn record_degraded(&mut self, detail: &str) {
        self.tally.degraded += 1;
        self.events.push(("degraded".to_string(), detail.to_string()));
    }
}
