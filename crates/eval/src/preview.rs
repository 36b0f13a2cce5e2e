//! Candidate-rule preview.
//!
//! Runs an unsaved condition + action pair against a bounded pool of
//! listing contexts and reports match statistics with a few example
//! rows. Strictly read-only: the pool is an explicitly passed store, the
//! engine shares no mutable state with live evaluation and persists
//! nothing.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::action::compute_adjustment;
use crate::condition::eval_condition;
use crate::context::Context;
use crate::model::{Action, Condition};
use crate::trace::TraceCollector;

/// Upper bound on how many contexts a preview will consider, regardless
/// of pool size.
pub const MAX_POOL: usize = 1000;

/// How many non-matched examples a preview returns.
const NON_MATCHED_SAMPLE: usize = 3;

/// One listing context available for preview.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub listing_id: String,
    pub category: Option<String>,
    pub context: Context,
}

/// Source of preview contexts. Implementations are passed in by the
/// caller — the engine never owns a process-wide pool.
pub trait ContextPool {
    /// Up to `limit` entries, optionally narrowed to a category. The
    /// filter only narrows the candidate pool; it never alters how the
    /// candidate rule evaluates.
    fn entries(&self, category: Option<&str>, limit: usize) -> Vec<PoolEntry>;
}

/// A pool backed by an in-memory list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPool {
    entries: Vec<PoolEntry>,
}

impl InMemoryPool {
    pub fn new(entries: Vec<PoolEntry>) -> Self {
        InMemoryPool { entries }
    }
}

impl ContextPool for InMemoryPool {
    fn entries(&self, category: Option<&str>, limit: usize) -> Vec<PoolEntry> {
        self.entries
            .iter()
            .filter(|e| match category {
                Some(cat) => e.category.as_deref() == Some(cat),
                None => true,
            })
            .take(limit)
            .cloned()
            .collect()
    }
}

/// The unsaved rule under preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRule {
    #[serde(default)]
    pub condition: Condition,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// One example row in the preview output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewRow {
    pub listing_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated preview statistics plus capped example rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResult {
    pub evaluated_count: usize,
    pub matched_count: usize,
    /// Percentage of evaluated contexts that matched, rounded to two
    /// decimal places.
    pub match_percentage: Decimal,
    pub total_adjustment: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_adjustment: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_adjustment: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_adjustment: Option<Decimal>,
    pub matched_sample: Vec<PreviewRow>,
    pub non_matched_sample: Vec<PreviewRow>,
}

/// Evaluate a candidate rule against the pool.
///
/// Reuses the live condition evaluator and action calculator unchanged;
/// a per-context action failure lands on that row's `error` and counts
/// as a match with no adjustment.
pub fn preview_rule(
    candidate: &CandidateRule,
    pool: &dyn ContextPool,
    sample_size: usize,
    category: Option<&str>,
) -> PreviewResult {
    let entries = pool.entries(category, MAX_POOL);
    let evaluated_count = entries.len();

    let mut matched_count = 0usize;
    let mut total = Decimal::ZERO;
    let mut min: Option<Decimal> = None;
    let mut max: Option<Decimal> = None;
    let mut matched_sample = Vec::new();
    let mut non_matched_sample = Vec::new();

    for entry in &entries {
        let mut collector = TraceCollector::new();
        if !eval_condition(&candidate.condition, &entry.context, &mut collector) {
            if non_matched_sample.len() < NON_MATCHED_SAMPLE {
                non_matched_sample.push(PreviewRow {
                    listing_id: entry.listing_id.clone(),
                    adjustment: None,
                    error: None,
                });
            }
            continue;
        }

        matched_count += 1;
        match compute_adjustment(&candidate.actions, &entry.context, &mut collector) {
            Ok(amount) => {
                total = total.saturating_add(amount);
                min = Some(min.map_or(amount, |m| m.min(amount)));
                max = Some(max.map_or(amount, |m| m.max(amount)));
                if matched_sample.len() < sample_size {
                    matched_sample.push(PreviewRow {
                        listing_id: entry.listing_id.clone(),
                        adjustment: Some(amount),
                        error: None,
                    });
                }
            }
            Err(e) => {
                if matched_sample.len() < sample_size {
                    matched_sample.push(PreviewRow {
                        listing_id: entry.listing_id.clone(),
                        adjustment: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
    }

    let match_percentage = if evaluated_count == 0 {
        Decimal::ZERO
    } else {
        (Decimal::from(matched_count as u64) * Decimal::from(100)
            / Decimal::from(evaluated_count as u64))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
    };
    let avg_adjustment = if matched_count == 0 {
        None
    } else {
        Some(
            (total / Decimal::from(matched_count as u64))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven),
        )
    };

    PreviewResult {
        evaluated_count,
        matched_count,
        match_percentage,
        total_adjustment: total,
        avg_adjustment,
        min_adjustment: min,
        max_adjustment: max,
        matched_sample,
        non_matched_sample,
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
