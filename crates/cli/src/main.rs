use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use appraise_core::Severity;
use appraise_eval::{
    apply_batch, evaluate_listing, preview_rule, select_ruleset, validate_definitions,
    validate_formula, CandidateRule, Context, EntityKind, InMemoryPool, PoolEntry, Rule, Ruleset,
};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Appraise listing valuation toolchain.
#[derive(Parser)]
#[command(name = "appraise", version, about = "Appraise listing valuation toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a pricing formula against the known field catalog
    Check {
        /// The formula text, e.g. "max(ram_gb * 2.5, 50)"
        formula: String,
        /// Entity the formula is written against
        #[arg(long, default_value = "listing")]
        entity: String,
        /// Path to a sample context JSON used for the preview value
        #[arg(long)]
        sample: Option<PathBuf>,
    },

    /// Evaluate a listing (or an array of listings) against rulesets
    Eval {
        /// Path to the listing JSON file (object, or array for batch mode)
        listing: PathBuf,
        /// Path to the rulesets JSON file
        #[arg(long)]
        rules: PathBuf,
        /// Explicitly assigned ruleset id (overrides the listing's own)
        #[arg(long)]
        ruleset: Option<String>,
    },

    /// Simulate a candidate rule against a pool of listing contexts
    Preview {
        /// Path to the candidate rule JSON (condition + actions)
        candidate: PathBuf,
        /// Path to the context pool JSON (array of listing objects)
        #[arg(long)]
        pool: PathBuf,
        /// Maximum matched example rows to return
        #[arg(long, default_value = "10")]
        sample_size: usize,
        /// Narrow the pool to one category before evaluating
        #[arg(long)]
        category: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            formula,
            entity,
            sample,
        } => {
            cmd_check(&formula, &entity, sample.as_deref(), cli.output, cli.quiet);
        }
        Commands::Eval {
            listing,
            rules,
            ruleset,
        } => {
            cmd_eval(&listing, &rules, ruleset.as_deref(), cli.output, cli.quiet);
        }
        Commands::Preview {
            candidate,
            pool,
            sample_size,
            category,
        } => {
            cmd_preview(
                &candidate,
                &pool,
                sample_size,
                category.as_deref(),
                cli.output,
                cli.quiet,
            );
        }
    }
}

fn cmd_check(
    formula: &str,
    entity_name: &str,
    sample_path: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) {
    let Some(entity) = EntityKind::from_name(entity_name) else {
        let msg = format!(
            "unknown entity '{}': expected listing, cpu_spec, gpu_spec, ram_spec or storage_spec",
            entity_name
        );
        report_error(&msg, output, quiet);
        process::exit(1);
    };

    let sample = sample_path.map(|p| Context::from_json(&read_json(p, output, quiet)));
    let result = validate_formula(formula, entity, sample.as_ref());

    if !quiet {
        match output {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result)
                        .unwrap_or_else(|e| format!("serialization error: {}", e))
                );
            }
            OutputFormat::Text => {
                if result.valid {
                    println!("valid");
                    if let Some(preview) = result.preview {
                        println!("preview: {}", preview);
                    }
                    if !result.used_fields.is_empty() {
                        println!("fields used: {}", result.used_fields.join(", "));
                    }
                } else {
                    println!("invalid");
                }
                for d in &result.errors {
                    let severity = match d.severity {
                        Severity::Error => "error",
                        Severity::Warning => "warning",
                        Severity::Info => "info",
                    };
                    let position = d
                        .position
                        .map(|p| format!(" at {}", p))
                        .unwrap_or_default();
                    println!("  [{}]{} {}", severity, position, d.message);
                    if let Some(s) = &d.suggestion {
                        println!("    {}", s);
                    }
                }
            }
        }
    }

    if !result.valid {
        process::exit(1);
    }
}

fn cmd_eval(
    listing_path: &Path,
    rules_path: &Path,
    assigned: Option<&str>,
    output: OutputFormat,
    quiet: bool,
) {
    let rulesets = load_rulesets(rules_path, output, quiet);
    let listing = read_json(listing_path, output, quiet);

    // An array of listings switches to batch application.
    if let serde_json::Value::Array(listings) = &listing {
        let report = apply_batch(&rulesets, listings, |record| {
            Ok(Context::from_json(record))
        });
        if !quiet {
            match output {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&report)
                            .unwrap_or_else(|e| format!("serialization error: {}", e))
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "{} listing(s): {} succeeded, {} failed",
                        report.total, report.succeeded, report.failed
                    );
                    for err in &report.errors {
                        println!("  {}: {}", err.listing_id, err.message);
                    }
                }
            }
        }
        if report.failed > 0 {
            process::exit(1);
        }
        return;
    }

    let ctx = Context::from_json(&listing);
    let assigned = assigned.or_else(|| listing.get("ruleset_id").and_then(|v| v.as_str()));
    let ruleset = match select_ruleset(&rulesets, assigned, &ctx) {
        Ok(rs) => rs,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };
    let summary = evaluate_listing(ruleset, &ctx);
    let adjusted = listing_price(&listing).map(|p| summary.adjusted_price(p));

    if !quiet {
        match output {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "ruleset_id": ruleset.id,
                    "summary": summary,
                    "adjusted_price": adjusted,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json)
                        .unwrap_or_else(|e| format!("serialization error: {}", e))
                );
            }
            OutputFormat::Text => {
                println!("ruleset: {}", ruleset.id);
                println!(
                    "{} rule(s) matched, total adjustment {} USD",
                    summary.matched_rules_count, summary.total_adjustment
                );
                for r in &summary.matched_rules {
                    match &r.error {
                        Some(e) => println!("  {} : failed ({})", r.rule_id, e),
                        None => println!("  {} : {} USD", r.rule_id, r.adjustment_value),
                    }
                }
                if let Some(adjusted) = adjusted {
                    println!("adjusted price: {} USD", adjusted);
                }
            }
        }
    }
}

fn cmd_preview(
    candidate_path: &Path,
    pool_path: &Path,
    sample_size: usize,
    category: Option<&str>,
    output: OutputFormat,
    quiet: bool,
) {
    let candidate_json = read_json(candidate_path, output, quiet);
    let candidate: CandidateRule = match serde_json::from_value(candidate_json) {
        Ok(c) => c,
        Err(e) => {
            let msg = format!(
                "error parsing candidate rule in '{}': {}",
                candidate_path.display(),
                e
            );
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    // Same save-time checks a stored rule would get.
    let probe = Rule {
        id: "candidate".to_string(),
        name: "candidate".to_string(),
        priority: 0,
        evaluation_order: 0,
        is_active: true,
        version: 1,
        condition: candidate.condition.clone(),
        actions: candidate.actions.clone(),
    };
    let mut definition_errors = Vec::new();
    probe.validate(&mut definition_errors);
    if !definition_errors.is_empty() {
        for e in &definition_errors {
            report_error(&e.to_string(), output, quiet);
        }
        process::exit(1);
    }

    let pool_json = read_json(pool_path, output, quiet);
    let serde_json::Value::Array(records) = pool_json else {
        let msg = format!(
            "error: pool file '{}' must hold a JSON array of listing objects",
            pool_path.display()
        );
        report_error(&msg, output, quiet);
        process::exit(1);
    };
    let entries: Vec<PoolEntry> = records
        .iter()
        .enumerate()
        .map(|(i, record)| PoolEntry {
            listing_id: record
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("listing-{}", i)),
            category: record
                .get("category")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            context: Context::from_json(record),
        })
        .collect();
    let pool = InMemoryPool::new(entries);

    let result = preview_rule(&candidate, &pool, sample_size, category);

    if !quiet {
        match output {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result)
                        .unwrap_or_else(|e| format!("serialization error: {}", e))
                );
            }
            OutputFormat::Text => {
                println!(
                    "{} of {} context(s) matched ({}%)",
                    result.matched_count, result.evaluated_count, result.match_percentage
                );
                if let (Some(avg), Some(min), Some(max)) = (
                    result.avg_adjustment,
                    result.min_adjustment,
                    result.max_adjustment,
                ) {
                    println!(
                        "adjustment: total {} USD, avg {}, min {}, max {}",
                        result.total_adjustment, avg, min, max
                    );
                }
                for row in &result.matched_sample {
                    match (&row.adjustment, &row.error) {
                        (Some(a), _) => println!("  {} : {} USD", row.listing_id, a),
                        (None, Some(e)) => println!("  {} : failed ({})", row.listing_id, e),
                        (None, None) => println!("  {}", row.listing_id),
                    }
                }
                if !result.non_matched_sample.is_empty() {
                    println!("not matched:");
                    for row in &result.non_matched_sample {
                        println!("  {}", row.listing_id);
                    }
                }
            }
        }
    }
}

/// Read and parse a JSON file, exiting with a report on failure.
fn read_json(path: &Path, output: OutputFormat, quiet: bool) -> serde_json::Value {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Parse and validate a rulesets file, exiting on any definition error.
fn load_rulesets(path: &Path, output: OutputFormat, quiet: bool) -> Vec<Ruleset> {
    let json = read_json(path, output, quiet);
    let rulesets: Vec<Ruleset> = match serde_json::from_value(json) {
        Ok(r) => r,
        Err(e) => {
            let msg = format!("error parsing rulesets in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    if let Err(errors) = validate_definitions(&rulesets) {
        for e in &errors {
            report_error(&e.to_string(), output, quiet);
        }
        process::exit(1);
    }
    rulesets
}

/// The listing's own price, when it carries a usable one.
fn listing_price(listing: &serde_json::Value) -> Option<Decimal> {
    match listing.get("price_usd")? {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(Decimal::from_f64)
            }
        }
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{{\"error\": \"{}\"}}", msg.replace('"', "\\\""));
        }
    }
}
