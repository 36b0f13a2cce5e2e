//! Adjustment trace construction.
//!
//! Each per-rule result carries a trace recording which context fields
//! were read and which modifiers actually fired, for audit and breakdown
//! display.

use serde::{Deserialize, Serialize};

/// Trace attached to a single rule's evaluation result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentTrace {
    /// Context paths read while evaluating the rule's condition, formula
    /// and modifiers.
    pub fields_read: Vec<String>,
    /// Modifiers that changed (or clamped) the running amount, in
    /// application order, e.g. `multiplier:condition=used`.
    pub modifiers_fired: Vec<String>,
}

/// Collector threaded through condition, formula and action evaluation.
#[derive(Debug, Clone, Default)]
pub struct TraceCollector {
    fields_read: Vec<String>,
    modifiers_fired: Vec<String>,
}

impl TraceCollector {
    pub fn new() -> Self {
        TraceCollector::default()
    }

    /// Record a context field access.
    pub fn record_field(&mut self, path: &str) {
        if !self.fields_read.iter().any(|p| p == path) {
            self.fields_read.push(path.to_string());
        }
    }

    /// Record a modifier that fired. Not deduplicated — the same
    /// modifier firing for two actions is two entries.
    pub fn record_modifier(&mut self, label: impl Into<String>) {
        self.modifiers_fired.push(label.into());
    }

    /// Finalize into an AdjustmentTrace.
    pub fn into_trace(self) -> AdjustmentTrace {
        AdjustmentTrace {
            fields_read: self.fields_read,
            modifiers_fired: self.modifiers_fired,
        }
    }
}
