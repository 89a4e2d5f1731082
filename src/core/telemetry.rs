use crate::core::Phase;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// What happened to a phase when the engine reached it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseOutcome {
    Ran,
    /// Gated off by a flag or by the pre-check.
    Skipped,
    Failed,
}

/// A single entry in the execution trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp_ms: u64,
    pub hook_id: Uuid,
    pub hook: String,
    pub phase: Phase,
    pub outcome: PhaseOutcome,
}

impl TraceEntry {
    pub fn new(hook_id: Uuid, hook: &str, phase: Phase, outcome: PhaseOutcome) -> Self {
        let timestamp_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        TraceEntry {
            timestamp_ms,
            hook_id,
            hook: hook.to_string(),
            phase,
            outcome,
        }
    }
}

/// Trait for recording execution traces.
pub trait Tracer: Send + Sync {
    fn record(&self, entry: TraceEntry);
    fn flush(&self);
}

/// Simple in-memory collector for traces.
#[derive(Debug, Default)]
pub struct MemoryTracer {
    entries: Mutex<Vec<TraceEntry>>,
}

impl MemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `(hook, phase)` pairs of the phases that actually ran, in order.
    pub fn ran(&self) -> Vec<(String, Phase)> {
        self.entries()
            .into_iter()
            .filter(|e| e.outcome == PhaseOutcome::Ran)
            .map(|e| (e.hook, e.phase))
            .collect()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Tracer for MemoryTracer {
    fn record(&self, entry: TraceEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    fn flush(&self) {
        // No-op for memory collector
    }
}
