//! Known-field catalog for formula validation.
//!
//! Lists the dot-path fields a formula may reference per entity kind,
//! drives misspelling suggestions, and synthesizes a sample context for
//! preview evaluation when the caller supplies none.

use rust_decimal::Decimal;

use crate::context::Context;
use crate::value::Value;

/// Coarse field kind, used only for sample synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Text,
    Boolean,
}

/// The entity a formula is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A listing with its joined catalog relations — the usual case.
    Listing,
    CpuSpec,
    GpuSpec,
    RamSpec,
    StorageSpec,
}

impl EntityKind {
    pub fn from_name(name: &str) -> Option<EntityKind> {
        match name {
            "listing" => Some(EntityKind::Listing),
            "cpu_spec" => Some(EntityKind::CpuSpec),
            "gpu_spec" => Some(EntityKind::GpuSpec),
            "ram_spec" => Some(EntityKind::RamSpec),
            "storage_spec" => Some(EntityKind::StorageSpec),
            _ => None,
        }
    }
}

const CPU_FIELDS: &[(&str, FieldKind)] = &[
    ("manufacturer", FieldKind::Text),
    ("model_name", FieldKind::Text),
    ("cores", FieldKind::Number),
    ("threads", FieldKind::Number),
    ("base_clock_ghz", FieldKind::Number),
    ("boost_clock_ghz", FieldKind::Number),
    ("tdp_watts", FieldKind::Number),
    ("generation", FieldKind::Text),
];

const GPU_FIELDS: &[(&str, FieldKind)] = &[
    ("manufacturer", FieldKind::Text),
    ("model_name", FieldKind::Text),
    ("vram_gb", FieldKind::Number),
    ("tdp_watts", FieldKind::Number),
    ("generation", FieldKind::Text),
];

const RAM_FIELDS: &[(&str, FieldKind)] = &[
    ("ddr_generation", FieldKind::Text),
    ("speed_mhz", FieldKind::Number),
    ("modules", FieldKind::Number),
    ("capacity_gb", FieldKind::Number),
];

const STORAGE_FIELDS: &[(&str, FieldKind)] = &[
    ("kind", FieldKind::Text),
    ("interface", FieldKind::Text),
    ("capacity_gb", FieldKind::Number),
    ("read_mbps", FieldKind::Number),
];

const LISTING_OWN_FIELDS: &[(&str, FieldKind)] = &[
    ("price_usd", FieldKind::Number),
    ("condition", FieldKind::Text),
    ("category", FieldKind::Text),
    ("brand", FieldKind::Text),
    ("model_name", FieldKind::Text),
    ("ram_gb", FieldKind::Number),
    ("storage_gb", FieldKind::Number),
    ("screen_inches", FieldKind::Number),
    ("age_months", FieldKind::Number),
    ("quantity", FieldKind::Number),
    ("has_warranty", FieldKind::Boolean),
];

/// Every field path known for the given entity. For `Listing` this
/// includes the dotted paths of each catalog relation.
pub fn known_fields(entity: EntityKind) -> Vec<(String, FieldKind)> {
    let own: &[(&str, FieldKind)] = match entity {
        EntityKind::Listing => LISTING_OWN_FIELDS,
        EntityKind::CpuSpec => CPU_FIELDS,
        EntityKind::GpuSpec => GPU_FIELDS,
        EntityKind::RamSpec => RAM_FIELDS,
        EntityKind::StorageSpec => STORAGE_FIELDS,
    };
    let mut out: Vec<(String, FieldKind)> = own
        .iter()
        .map(|(path, kind)| (path.to_string(), *kind))
        .collect();
    if entity == EntityKind::Listing {
        for (prefix, fields) in [
            ("cpu_spec", CPU_FIELDS),
            ("gpu_spec", GPU_FIELDS),
            ("ram_spec", RAM_FIELDS),
            ("storage_spec", STORAGE_FIELDS),
        ] {
            for (path, kind) in fields {
                out.push((format!("{}.{}", prefix, path), *kind));
            }
        }
    }
    out
}

/// Just the paths, for cross-referencing identifiers.
pub fn known_field_paths(entity: EntityKind) -> Vec<String> {
    known_fields(entity).into_iter().map(|(p, _)| p).collect()
}

/// Synthesize a plausible sample context for preview evaluation: every
/// known field present, numbers non-zero so ratios and divisions behave.
pub fn sample_context(entity: EntityKind) -> Context {
    let mut ctx = Context::new();
    for (path, kind) in known_fields(entity) {
        let value = match kind {
            FieldKind::Number => {
                if path == "price_usd" {
                    Value::Decimal(Decimal::from(500))
                } else {
                    Value::Decimal(Decimal::from(8))
                }
            }
            FieldKind::Text => Value::Text("sample".to_string()),
            FieldKind::Boolean => Value::Bool(true),
        };
        ctx.insert(path, value);
    }
    ctx
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_catalog_includes_relation_paths() {
        let paths = known_field_paths(EntityKind::Listing);
        assert!(paths.iter().any(|p| p == "price_usd"));
        assert!(paths.iter().any(|p| p == "cpu_spec.cores"));
        assert!(paths.iter().any(|p| p == "ram_spec.ddr_generation"));
    }

    #[test]
    fn relation_catalog_is_flat() {
        let paths = known_field_paths(EntityKind::RamSpec);
        assert!(paths.iter().any(|p| p == "ddr_generation"));
        assert!(!paths.iter().any(|p| p.contains('.')));
    }

    #[test]
    fn sample_context_covers_every_known_field() {
        let ctx = sample_context(EntityKind::Listing);
        for path in known_field_paths(EntityKind::Listing) {
            assert!(ctx.contains(&path), "missing sample for {}", path);
        }
    }

    #[test]
    fn entity_from_name() {
        assert_eq!(EntityKind::from_name("listing"), Some(EntityKind::Listing));
        assert_eq!(EntityKind::from_name("ram_spec"), Some(EntityKind::RamSpec));
        assert_eq!(EntityKind::from_name("unknown"), None);
    }
}
