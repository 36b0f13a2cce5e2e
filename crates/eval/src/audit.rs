//! Audit entry construction.
//!
//! The engine never writes audit logs itself — the surrounding
//! application emits these around rule mutation and application. This
//! module only builds the record, including an impact summary derived
//! from an evaluation outcome.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::ruleset::EvaluationSummary;

/// One audit record, ready for the environment to persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: String,
    pub actor: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub changes: BTreeMap<String, serde_json::Value>,
    pub impact_summary: String,
    /// RFC 3339 timestamp, UTC.
    pub timestamp: String,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, actor: impl Into<String>) -> Self {
        AuditEntry {
            action: action.into(),
            actor: actor.into(),
            changes: BTreeMap::new(),
            impact_summary: String::new(),
            timestamp: now_rfc3339(),
        }
    }

    /// Record one changed field (old value, new value).
    pub fn with_change(
        mut self,
        field: impl Into<String>,
        from: serde_json::Value,
        to: serde_json::Value,
    ) -> Self {
        self.changes
            .insert(field.into(), serde_json::json!({ "from": from, "to": to }));
        self
    }

    /// Build the entry the environment emits around applying rules to a
    /// listing.
    pub fn for_application(
        actor: impl Into<String>,
        listing_id: &str,
        summary: &EvaluationSummary,
    ) -> Self {
        let mut entry = AuditEntry::new("apply_rules", actor);
        entry.impact_summary = format!(
            "listing {}: {} rule(s) matched, total adjustment {} USD",
            listing_id, summary.matched_rules_count, summary.total_adjustment
        );
        entry
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn application_entry_summarizes_impact() {
        let summary = EvaluationSummary {
            total_adjustment: Decimal::from_str("-45.50").unwrap(),
            matched_rules_count: 3,
            matched_rules: vec![],
        };
        let entry = AuditEntry::for_application("pricing-bot", "l42", &summary);
        assert_eq!(entry.action, "apply_rules");
        assert_eq!(entry.actor, "pricing-bot");
        assert!(entry.impact_summary.contains("l42"));
        assert!(entry.impact_summary.contains("3 rule(s)"));
        assert!(entry.impact_summary.contains("-45.50"));
        assert!(entry.timestamp.contains('T'));
    }

    #[test]
    fn changes_record_old_and_new() {
        let entry = AuditEntry::new("update_rule", "ops")
            .with_change("value_usd", serde_json::json!("-10"), serde_json::json!("-20"));
        let change = &entry.changes["value_usd"];
        assert_eq!(change["from"], serde_json::json!("-10"));
        assert_eq!(change["to"], serde_json::json!("-20"));
    }
}
