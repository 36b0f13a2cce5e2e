//! Bulk rule application over many listings.
//!
//! Work is chunked so the surrounding persistence layer can commit in
//! bounded transactions, and per-listing failures are isolated: one bad
//! listing never fails the run. Reported errors are capped.

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::model::Ruleset;
use crate::ruleset::{evaluate_listing, select_ruleset, EvaluationSummary};

/// Listings are processed in chunks of this size.
pub const CHUNK: usize = 100;

/// At most this many failures are carried in the report.
pub const MAX_REPORTED_ERRORS: usize = 10;

/// One successfully evaluated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub listing_id: String,
    pub ruleset_id: String,
    pub summary: EvaluationSummary,
}

/// One failed listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    pub listing_id: String,
    pub message: String,
}

/// Aggregate batch report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// First `MAX_REPORTED_ERRORS` failures only.
    pub errors: Vec<BatchError>,
    pub outcomes: Vec<BatchOutcome>,
}

/// Apply the rulesets to a batch of listing records.
///
/// `resolve` joins one listing record into its evaluation context — the
/// caller owns catalog lookups, so a listing referencing a missing or
/// invalid catalog entity fails there and is reported against its id.
/// An optional `ruleset_id` member on the listing record selects the
/// ruleset explicitly.
pub fn apply_batch<F>(
    rulesets: &[Ruleset],
    listings: &[serde_json::Value],
    resolve: F,
) -> BatchReport
where
    F: Fn(&serde_json::Value) -> Result<Context, String>,
{
    let mut report = BatchReport {
        total: listings.len(),
        processed: 0,
        succeeded: 0,
        failed: 0,
        errors: Vec::new(),
        outcomes: Vec::new(),
    };

    for chunk in listings.chunks(CHUNK) {
        for (offset, listing) in chunk.iter().enumerate() {
            let listing_id = listing_id(listing, report.processed + offset);
            match apply_one(rulesets, listing, &resolve) {
                Ok((ruleset_id, summary)) => {
                    report.succeeded += 1;
                    report.outcomes.push(BatchOutcome {
                        listing_id,
                        ruleset_id,
                        summary,
                    });
                }
                Err(message) => {
                    report.failed += 1;
                    if report.errors.len() < MAX_REPORTED_ERRORS {
                        report.errors.push(BatchError {
                            listing_id,
                            message,
                        });
                    }
                }
            }
        }
        report.processed += chunk.len();
    }

    report
}

fn apply_one<F>(
    rulesets: &[Ruleset],
    listing: &serde_json::Value,
    resolve: &F,
) -> Result<(String, EvaluationSummary), String>
where
    F: Fn(&serde_json::Value) -> Result<Context, String>,
{
    let ctx = resolve(listing)?;
    let assigned = listing.get("ruleset_id").and_then(|v| v.as_str());
    let ruleset = select_ruleset(rulesets, assigned, &ctx).map_err(|e| e.to_string())?;
    Ok((ruleset.id.clone(), evaluate_listing(ruleset, &ctx)))
}

fn listing_id(listing: &serde_json::Value, index: usize) -> String {
    match listing.get("id") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => format!("listing-{}", index),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
