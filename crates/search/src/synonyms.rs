//! Reverse synonym index over the parts vocabulary
//!
//! Built once at startup from a declarative category→variants table.
//! Every variant is canonicalized and mapped back to its category key, so
//! lookups happen in the same text space as user queries.

use partsbot_common::text::normalize;
use std::collections::HashMap;

/// Declarative vocabulary: (category key, variants, co-occurrence weight).
/// Variants carry plural forms, common typos, and Tunisian-dialect
/// spellings alongside the standard term.
const CATEGORY_TABLE: &[(&str, &[&str], f32)] = &[
    ("amortisseur", &["amortisseurs", "amortiseur", "amortisur", "jambe de force"], 1.5),
    ("frein", &["freins", "freinage", "fren", "fran"], 1.3),
    ("plaquette", &["plaquettes", "plaquette frein", "plaquettes frein", "plakette", "blakat"], 1.4),
    ("disque", &["disques", "disque frein", "disques frein"], 1.2),
    ("filtre", &["filtres", "filtre a air", "filtre air", "filtre a huile", "filtre huile", "filtre gasoil"], 1.2),
    ("phare", &["phares", "optique", "fanar"], 1.2),
    ("feu", &["feux", "veilleuse", "feu stop"], 1.1),
    ("clignotant", &["clignotants", "clignoteur"], 1.1),
    ("retroviseur", &["retroviseurs", "retro", "meraya", "mrya"], 1.2),
    ("pare-chocs", &["pare choc", "pare chocs", "parechoc"], 1.1),
    ("aile", &["ailes"], 1.0),
    ("capot", &["capo"], 1.0),
    ("portiere", &["portieres", "porte"], 1.0),
    ("vitre", &["vitres", "glace"], 1.0),
    ("moteur", &["makina", "bloc moteur"], 1.1),
    ("courroie", &["courroies", "courroi", "courroie distribution"], 1.2),
    ("bougie", &["bougies", "bouji"], 1.1),
    ("embrayage", &["embriyaj", "kit embrayage"], 1.3),
    ("radiateur", &["radiateurs", "radiatur"], 1.1),
    ("alternateur", &["alternateurs", "dinamo"], 1.1),
    ("demarreur", &["demarreurs", "demarur"], 1.1),
    ("batterie", &["batteries", "batri"], 1.1),
    ("pneu", &["pneus", "goma", "pneumatique"], 1.0),
    ("rotule", &["rotules"], 1.1),
    ("triangle", &["triangles", "bras suspension"], 1.1),
    ("cardan", &["cardans"], 1.1),
    ("echappement", &["pot echappement", "silencieux", "chakman"], 1.1),
];

/// Part types that physically exist in mirrored left/right instances.
/// Side clarification is only meaningful for these.
const BILATERAL_TYPES: &[&str] = &[
    "amortisseur",
    "retroviseur",
    "phare",
    "feu",
    "clignotant",
    "aile",
    "portiere",
    "vitre",
    "cardan",
    "rotule",
    "triangle",
];

/// Immutable reverse synonym index
pub struct SynonymIndex {
    /// category → normalized variants (category key included)
    categories: HashMap<String, Vec<String>>,

    /// normalized variant token → category key
    reverse: HashMap<String, String>,

    /// category → co-occurrence weight
    weights: HashMap<String, f32>,
}

impl Default for SynonymIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SynonymIndex {
    /// Build the index from the declarative table
    pub fn new() -> Self {
        let mut categories = HashMap::new();
        let mut reverse = HashMap::new();
        let mut weights = HashMap::new();

        for (category, variants, weight) in CATEGORY_TABLE {
            let key = normalize(category);
            let mut normalized_variants = vec![key.clone()];

            reverse.insert(key.clone(), key.clone());
            for variant in *variants {
                let norm = normalize(variant);
                reverse.insert(norm.clone(), key.clone());
                normalized_variants.push(norm);
            }

            weights.insert(key.clone(), *weight);
            categories.insert(key, normalized_variants);
        }

        Self {
            categories,
            reverse,
            weights,
        }
    }

    /// Category key for a normalized token, if any
    pub fn category_of(&self, token: &str) -> Option<&str> {
        self.reverse.get(token).map(|s| s.as_str())
    }

    /// All normalized variants of a category (category key first)
    pub fn variants(&self, category: &str) -> &[String] {
        self.categories
            .get(category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Co-occurrence weight of a category (1.0 when unknown)
    pub fn weight(&self, category: &str) -> f32 {
        self.weights.get(category).copied().unwrap_or(1.0)
    }

    /// Whether the part type exists in mirrored left/right instances
    pub fn is_bilateral(&self, category: &str) -> bool {
        BILATERAL_TYPES.contains(&category)
    }

    /// Expand a token: the category key plus at most one additional
    /// variant. Caps synonym blow-up to ≤2 extra terms per token.
    pub fn expand(&self, token: &str) -> Vec<String> {
        let mut extra = Vec::new();

        if let Some(category) = self.category_of(token) {
            if category != token {
                extra.push(category.to_string());
            }
            if let Some(variant) = self
                .variants(category)
                .iter()
                .find(|v| v.as_str() != token && v.as_str() != category)
            {
                extra.push(variant.clone());
            }
        }

        extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_lookup() {
        let index = SynonymIndex::new();
        assert_eq!(index.category_of("fren"), Some("frein"));
        assert_eq!(index.category_of("amortiseur"), Some("amortisseur"));
        assert_eq!(index.category_of("fanar"), Some("phare"));
        assert_eq!(index.category_of("volant"), None);
    }

    #[test]
    fn test_expansion_is_capped() {
        let index = SynonymIndex::new();
        for token in ["fren", "plaquettes", "amortisseur", "filtre"] {
            assert!(index.expand(token).len() <= 2, "blow-up for {}", token);
        }
    }

    #[test]
    fn test_expansion_includes_category() {
        let index = SynonymIndex::new();
        let expanded = index.expand("fren");
        assert!(expanded.contains(&"frein".to_string()));
    }

    #[test]
    fn test_bilateral_types() {
        let index = SynonymIndex::new();
        assert!(index.is_bilateral("retroviseur"));
        assert!(index.is_bilateral("amortisseur"));
        assert!(!index.is_bilateral("plaquette"));
        assert!(!index.is_bilateral("batterie"));
    }

    #[test]
    fn test_weights() {
        let index = SynonymIndex::new();
        assert!(index.weight("amortisseur") > index.weight("frein"));
        assert_eq!(index.weight("inconnu"), 1.0);
    }
}
