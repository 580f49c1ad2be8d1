// 🔎 Mapping Resolver - reported SKU → canonical MSKUs
//
// Priority order, first match wins:
//   1. combo lookup   (marketplace ignored)
//   2. single lookup  (scope-filtered by marketplace when it has a scope code)
//   3. identity       (SKU passes through unchanged)

use crate::catalog::{ComboTable, SingleTable};
use crate::marketplace::{Marketplace, ScopeCodes};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// RESOLUTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchSource {
    Combo,
    Single,
}

/// Outcome of one lookup. Every variant carries at least one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Exactly one catalog answer
    Resolved {
        source: MatchSource,
        identifiers: Vec<String>,
    },

    /// Several single mappings disagree; the first in load order is used
    Ambiguous {
        identifier: String,
        candidates: Vec<String>,
    },

    /// Not in any catalog; assumed to already be canonical
    Fallback { identifier: String },
}

impl Resolution {
    /// Canonical identifiers this SKU expands into, in order.
    pub fn identifiers(&self) -> Vec<&str> {
        match self {
            Resolution::Resolved { identifiers, .. } => {
                identifiers.iter().map(|s| s.as_str()).collect()
            }
            Resolution::Ambiguous { identifier, .. } => vec![identifier.as_str()],
            Resolution::Fallback { identifier } => vec![identifier.as_str()],
        }
    }

    pub fn into_identifiers(self) -> Vec<String> {
        match self {
            Resolution::Resolved { identifiers, .. } => identifiers,
            Resolution::Ambiguous { identifier, .. } => vec![identifier],
            Resolution::Fallback { identifier } => vec![identifier],
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback { .. })
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Resolution::Ambiguous { .. })
    }

    pub fn is_combo(&self) -> bool {
        matches!(
            self,
            Resolution::Resolved {
                source: MatchSource::Combo,
                ..
            }
        )
    }

    /// Short tag for logs and CLI output
    pub fn tag(&self) -> &'static str {
        match self {
            Resolution::Resolved {
                source: MatchSource::Combo,
                ..
            } => "combo",
            Resolution::Resolved {
                source: MatchSource::Single,
                ..
            } => "single",
            Resolution::Ambiguous { .. } => "ambiguous",
            Resolution::Fallback { .. } => "fallback",
        }
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Immutable lookup over loaded catalogs. Share it by reference; it holds no
/// interior state, so concurrent `resolve` calls are fine.
#[derive(Debug, Clone)]
pub struct MappingResolver {
    combos: ComboTable,
    singles: Option<SingleTable>,
    scopes: ScopeCodes,
}

impl MappingResolver {
    pub fn new(combos: ComboTable, singles: Option<SingleTable>) -> Self {
        Self::with_scopes(combos, singles, ScopeCodes::default())
    }

    pub fn with_scopes(combos: ComboTable, singles: Option<SingleTable>, scopes: ScopeCodes) -> Self {
        MappingResolver {
            combos,
            singles,
            scopes,
        }
    }

    pub fn combos(&self) -> &ComboTable {
        &self.combos
    }

    pub fn singles(&self) -> Option<&SingleTable> {
        self.singles.as_ref()
    }

    pub fn resolve(&self, sku: &str, marketplace: Option<&Marketplace>) -> Resolution {
        let sku = sku.trim();
        let market = marketplace.map(|m| m.name()).unwrap_or("-");

        if let Some(entry) = self.combos.get(sku) {
            debug!(sku, marketplace = market, mskus = ?entry.constituents, "combo SKU mapped");
            return Resolution::Resolved {
                source: MatchSource::Combo,
                identifiers: entry.constituents.clone(),
            };
        }

        if let Some(resolution) = self.resolve_single(sku, marketplace) {
            debug!(sku, marketplace = market, tag = resolution.tag(), "single SKU mapped");
            return resolution;
        }

        Resolution::Fallback {
            identifier: sku.to_string(),
        }
    }

    fn resolve_single(&self, sku: &str, marketplace: Option<&Marketplace>) -> Option<Resolution> {
        let singles = self.singles.as_ref()?;
        let scope = marketplace.and_then(|m| self.scopes.code_for(m));

        let matches: Vec<&str> = singles
            .candidates(sku)
            .iter()
            .filter(|m| scope.map_or(true, |code| m.scope == code))
            .map(|m| m.msku.as_str())
            .collect();

        let first = *matches.first()?;

        let mut distinct: Vec<String> = Vec::new();
        for msku in &matches {
            if !distinct.iter().any(|d| d == msku) {
                distinct.push(msku.to_string());
            }
        }

        if distinct.len() > 1 {
            Some(Resolution::Ambiguous {
                identifier: first.to_string(),
                candidates: distinct,
            })
        } else {
            Some(Resolution::Resolved {
                source: MatchSource::Single,
                identifiers: vec![first.to_string()],
            })
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ComboEntry, SingleMapping};

    fn combo(id: &str, parts: &[&str]) -> ComboEntry {
        ComboEntry {
            combo_id: id.to_string(),
            constituents: parts.iter().map(|s| s.to_string()).collect(),
            status: Some("Combo".to_string()),
        }
    }

    fn single(sku: &str, msku: &str, scope: &str) -> SingleMapping {
        SingleMapping {
            sku: sku.to_string(),
            msku: msku.to_string(),
            scope: scope.to_string(),
        }
    }

    fn resolver() -> MappingResolver {
        let combos = ComboTable::from_entries(vec![combo("BUNDLE1", &["A", "A", "B"])]);
        let singles = SingleTable::from_mappings(vec![
            single("FK-RED", "MSKU-RED", "CSTE FK"),
            single("FK-RED", "MSKU-RED-AMZ", "CSTE AMAZON"),
            single("BLUE", "MSKU-BLUE", "CSTE FK"),
            single("BLUE", "MSKU-BLUE-ALT", "CSTE FK"),
            single("TWIN", "MSKU-TWIN", "CSTE FK"),
            single("TWIN", "MSKU-TWIN", "CSTE FK"),
            single("BUNDLE1", "SHADOWED", "CSTE FK"),
        ]);
        MappingResolver::new(combos, Some(singles))
    }

    #[test]
    fn test_combo_ignores_marketplace() {
        let resolver = resolver();
        for market in [None, Some(Marketplace::Flipkart), Some(Marketplace::Amazon)] {
            let resolution = resolver.resolve("BUNDLE1", market.as_ref());
            assert!(resolution.is_combo());
            assert_eq!(resolution.identifiers(), vec!["A", "A", "B"]);
        }
    }

    #[test]
    fn test_combo_takes_priority_over_single() {
        let resolution = resolver().resolve("  BUNDLE1 ", Some(&Marketplace::Flipkart));
        assert_eq!(resolution.tag(), "combo");
    }

    #[test]
    fn test_single_lookup_uses_scope_code() {
        let resolver = resolver();

        let fk = resolver.resolve("FK-RED", Some(&Marketplace::Flipkart));
        assert_eq!(fk.into_identifiers(), vec!["MSKU-RED"]);

        let amz = resolver.resolve("FK-RED", Some(&Marketplace::Amazon));
        assert_eq!(amz.into_identifiers(), vec!["MSKU-RED-AMZ"]);
    }

    #[test]
    fn test_no_marketplace_means_no_scope_filter() {
        let resolution = resolver().resolve("FK-RED", None);
        assert!(resolution.is_ambiguous());
        assert_eq!(resolution.identifiers(), vec!["MSKU-RED"]);
    }

    #[test]
    fn test_unknown_marketplace_means_no_scope_filter() {
        let other = Marketplace::Other("Meesho".to_string());
        let resolution = resolver().resolve("BLUE", Some(&other));
        assert!(resolution.is_ambiguous());
    }

    #[test]
    fn test_conflicting_singles_are_ambiguous_first_wins() {
        let resolution = resolver().resolve("BLUE", Some(&Marketplace::Flipkart));
        match resolution {
            Resolution::Ambiguous {
                identifier,
                candidates,
            } => {
                assert_eq!(identifier, "MSKU-BLUE");
                assert_eq!(candidates, vec!["MSKU-BLUE", "MSKU-BLUE-ALT"]);
            }
            other => panic!("expected ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_identical_duplicates_are_not_ambiguous() {
        let resolution = resolver().resolve("TWIN", Some(&Marketplace::Flipkart));
        assert_eq!(resolution.tag(), "single");
        assert_eq!(resolution.into_identifiers(), vec!["MSKU-TWIN"]);
    }

    #[test]
    fn test_scope_mismatch_falls_back() {
        let resolution = resolver().resolve("BLUE", Some(&Marketplace::Amazon));
        assert!(resolution.is_fallback());
        assert_eq!(resolution.into_identifiers(), vec!["BLUE"]);
    }

    #[test]
    fn test_unmapped_sku_passes_through_trimmed() {
        let resolution = resolver().resolve("  NEW-SKU-9 ", Some(&Marketplace::Flipkart));
        assert_eq!(
            resolution,
            Resolution::Fallback {
                identifier: "NEW-SKU-9".to_string()
            }
        );
    }

    #[test]
    fn test_without_single_catalog() {
        let combos = ComboTable::from_entries(vec![combo("X", &["P", "Q"])]);
        let resolver = MappingResolver::new(combos, None);

        assert!(resolver.resolve("X", None).is_combo());
        assert!(resolver.resolve("FK-RED", Some(&Marketplace::Flipkart)).is_fallback());
    }
}
