//! Resolution of heterogeneous gene identifiers into the reference
//! identifier space
//!
//! Expression tables and reference databases rarely agree on gene
//! identifiers, especially across strains of the same organism. The
//! resolver maps each input identifier to a reference identifier through
//! an ordered cascade of match strategies, from strict to permissive:
//!
//! 1. exact identifier match
//! 2. case-insensitive identifier match
//! 3. alternate name against the reference gene symbol
//! 4. the identifier itself against the reference gene symbol
//! 5. product description match (exact, or substring for long texts)
//!
//! The first strategy that matches wins; each input identifier is
//! resolved independently. Identifiers with no match under any strategy
//! are omitted from the result: unmapped genes are excluded from
//! enrichment, never guessed.
//!
//! Resolution is deterministic: the reference table is indexed in
//! lexicographic identifier order, so ties between equally valid
//! candidates always break the same way.
//!
//! # Examples
//!
//! ```
//! use std::collections::{HashMap, HashSet};
//! use gset::resolve;
//!
//! let input: HashSet<String> = ["abc1".to_string()].into_iter().collect();
//! let mut reference = HashMap::new();
//! reference.insert("ABC1".to_string(), "abc1; some transporter".to_string());
//!
//! let mapping = resolve(&input, &reference, &HashMap::new(), &HashMap::new());
//! assert_eq!(mapping.get("abc1"), Some("ABC1"));
//! ```

use std::collections::{HashMap, HashSet};

use tracing::debug;

mod strategies;

use strategies::{cascade, Query};

/// A reference product description shorter than this is too generic to
/// be worth indexing
const MIN_REFERENCE_PRODUCT_LEN: usize = 5;

/// An input product description must be longer than this before
/// strategy 5 is attempted at all
const MIN_QUERY_PRODUCT_LEN: usize = 10;

/// Substring (rather than exact) product matches are only accepted for
/// input descriptions longer than this, to avoid spurious short-string
/// hits
const MIN_SUBSTRING_QUERY_LEN: usize = 15;

/// A reference gene description, pre-split into its components
///
/// Reference descriptions come in two shapes: `"<symbol>; <product>"`
/// or a bare product text with no symbol.
#[derive(Debug, Clone)]
struct ReferenceEntry {
    id: String,
    symbol: Option<String>,
    product: Option<String>,
}

impl ReferenceEntry {
    fn from_description(id: &str, description: &str) -> Self {
        let (symbol, product) = match description.split_once(';') {
            Some((symbol, product)) => {
                (Some(symbol.trim().to_string()), Some(product.trim().to_string()))
            }
            None => (None, Some(description.trim().to_string())),
        };
        Self {
            id: id.to_string(),
            symbol: symbol.filter(|s| !s.is_empty()),
            product: product.filter(|p| p.len() > MIN_REFERENCE_PRODUCT_LEN),
        }
    }
}

/// The reference identifier universe, indexed for each match strategy
///
/// All lookup tables are populated in lexicographic identifier order
/// with first-wins semantics, so resolution never depends on hash-map
/// iteration order.
pub(crate) struct ReferenceTable {
    ids: HashSet<String>,
    by_lower_id: HashMap<String, String>,
    by_symbol: HashMap<String, String>,
    /// `(lowercased product, reference id)` in identifier order
    products: Vec<(String, String)>,
}

impl ReferenceTable {
    fn new(reference: &HashMap<String, String>) -> Self {
        let mut sorted: Vec<(&String, &String)> = reference.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let mut table = Self {
            ids: HashSet::with_capacity(reference.len()),
            by_lower_id: HashMap::with_capacity(reference.len()),
            by_symbol: HashMap::new(),
            products: Vec::new(),
        };
        for (id, description) in sorted {
            let entry = ReferenceEntry::from_description(id, description);
            table.ids.insert(entry.id.clone());
            table
                .by_lower_id
                .entry(entry.id.to_lowercase())
                .or_insert_with(|| entry.id.clone());
            if let Some(symbol) = &entry.symbol {
                table
                    .by_symbol
                    .entry(symbol.to_lowercase())
                    .or_insert_with(|| entry.id.clone());
            }
            if let Some(product) = &entry.product {
                table.products.push((product.to_lowercase(), entry.id));
            }
        }
        table
    }

    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn by_lower_id(&self, lower: &str) -> Option<&String> {
        self.by_lower_id.get(lower)
    }

    fn by_symbol(&self, lower: &str) -> Option<&String> {
        self.by_symbol.get(lower)
    }

    fn products(&self) -> &[(String, String)] {
        &self.products
    }
}

/// A one-directional mapping from input identifiers to reference
/// identifiers
///
/// Every mapped value is a member of the reference identifier universe.
/// Input identifiers without a resolvable counterpart are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierMapping {
    inner: HashMap<String, String>,
}

impl IdentifierMapping {
    /// The reference identifier for an input identifier, if resolved
    pub fn get(&self, input_id: &str) -> Option<&str> {
        self.inner.get(input_id).map(String::as_str)
    }

    /// The number of resolved identifiers
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if no identifier could be resolved
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Fraction of `total` input identifiers that were resolved,
    /// for "N/M genes mapped" coverage reporting
    pub fn coverage(&self, total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        self.inner.len() as f64 / total as f64
    }

    /// Iterates over `(input identifier, reference identifier)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.inner.iter()
    }

    /// Translates a set of input identifiers into reference identifiers,
    /// dropping unmapped members
    pub fn translate(&self, ids: &HashSet<String>) -> HashSet<String> {
        ids.iter()
            .filter_map(|id| self.inner.get(id).cloned())
            .collect()
    }

    /// Translates a ranking into the reference identifier space
    ///
    /// Unmapped identifiers keep their original spelling so the ranking
    /// stays complete; they simply never intersect a category.
    pub fn translate_ranking(&self, ranking: &[(String, f64)]) -> Vec<(String, f64)> {
        ranking
            .iter()
            .map(|(id, score)| {
                let id = self.inner.get(id).unwrap_or(id).clone();
                (id, *score)
            })
            .collect()
    }
}

impl FromIterator<(String, String)> for IdentifierMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

/// Resolves input identifiers against a reference gene list
///
/// - `reference` maps each reference identifier to its description,
///   either `"<symbol>; <product>"` or a bare product text
/// - `alt_names` and `product_descriptions` carry the optional alternate
///   name and free-text description per input identifier; both may be
///   empty
///
/// Given identical inputs the returned mapping is always identical.
pub fn resolve(
    input_ids: &HashSet<String>,
    reference: &HashMap<String, String>,
    alt_names: &HashMap<String, String>,
    product_descriptions: &HashMap<String, String>,
) -> IdentifierMapping {
    let table = ReferenceTable::new(reference);

    let mut sorted_inputs: Vec<&String> = input_ids.iter().collect();
    sorted_inputs.sort();

    let mut mapping = HashMap::new();
    for input_id in sorted_inputs {
        let id = input_id.trim();
        if id.is_empty() {
            continue;
        }
        let query = Query {
            id,
            name: alt_names.get(input_id).map(String::as_str),
            description: product_descriptions.get(input_id).map(String::as_str),
        };
        for strategy in cascade() {
            if let Some(hit) = strategy.try_match(&query, &table) {
                debug!(input = id, reference = %hit, strategy = strategy.name(), "resolved");
                mapping.insert(input_id.clone(), hit);
                break;
            }
        }
    }
    IdentifierMapping { inner: mapping }
}

#[cfg(test)]
mod test {
    use super::*;

    fn reference() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(
            "ABC1".to_string(),
            "abcX; ATP-binding cassette transporter subunit".to_string(),
        );
        map.insert(
            "b0002".to_string(),
            "thrA; bifunctional aspartokinase I / homoserine dehydrogenase I".to_string(),
        );
        map.insert("b0003".to_string(), "hypothetical protein".to_string());
        map
    }

    fn resolve_ids(ids: &[&str]) -> IdentifierMapping {
        let input: HashSet<String> = ids.iter().map(|s| s.to_string()).collect();
        resolve(&input, &reference(), &HashMap::new(), &HashMap::new())
    }

    #[test]
    fn exact_match() {
        let mapping = resolve_ids(&["b0002"]);
        assert_eq!(mapping.get("b0002"), Some("b0002"));
    }

    #[test]
    fn case_insensitive_match() {
        let mapping = resolve_ids(&["abc1"]);
        assert_eq!(mapping.get("abc1"), Some("ABC1"));
    }

    #[test]
    fn exact_beats_symbol() {
        // "ABC1" exists verbatim; the symbol "abcX" of the same entry must
        // not redirect a verbatim id elsewhere
        let mut reference = reference();
        reference.insert("abcX".to_string(), "other; unrelated protein".to_string());
        let input: HashSet<String> = ["abcX".to_string()].into_iter().collect();
        let mapping = resolve(&input, &reference, &HashMap::new(), &HashMap::new());
        assert_eq!(mapping.get("abcX"), Some("abcX"));
    }

    #[test]
    fn alternate_name_against_symbol() {
        let input: HashSet<String> = ["locus_77".to_string()].into_iter().collect();
        let mut alt = HashMap::new();
        alt.insert("locus_77".to_string(), "THRA".to_string());
        let mapping = resolve(&input, &reference(), &alt, &HashMap::new());
        assert_eq!(mapping.get("locus_77"), Some("b0002"));
    }

    #[test]
    fn id_as_symbol() {
        let mapping = resolve_ids(&["thrA"]);
        assert_eq!(mapping.get("thrA"), Some("b0002"));
    }

    #[test]
    fn product_exact_match() {
        let input: HashSet<String> = ["locus_9".to_string()].into_iter().collect();
        let mut products = HashMap::new();
        products.insert(
            "locus_9".to_string(),
            "ATP-binding cassette transporter subunit".to_string(),
        );
        let mapping = resolve(&input, &reference(), &HashMap::new(), &products);
        assert_eq!(mapping.get("locus_9"), Some("ABC1"));
    }

    #[test]
    fn product_substring_match() {
        let input: HashSet<String> = ["locus_9".to_string()].into_iter().collect();
        let mut products = HashMap::new();
        // long enough for a substring match against the full product
        products.insert(
            "locus_9".to_string(),
            "bifunctional aspartokinase I".to_string(),
        );
        let mapping = resolve(&input, &reference(), &HashMap::new(), &products);
        assert_eq!(mapping.get("locus_9"), Some("b0002"));
    }

    #[test]
    fn short_product_is_ignored() {
        let input: HashSet<String> = ["locus_9".to_string()].into_iter().collect();
        let mut products = HashMap::new();
        products.insert("locus_9".to_string(), "protein".to_string());
        let mapping = resolve(&input, &reference(), &HashMap::new(), &products);
        assert!(mapping.is_empty());
    }

    #[test]
    fn unmatchable_id_is_absent() {
        let mapping = resolve_ids(&["no_such_gene"]);
        assert!(mapping.get("no_such_gene").is_none());
        assert!(mapping.is_empty());
    }

    #[test]
    fn resolution_is_deterministic() {
        // two reference entries share the symbol; the lexicographically
        // first id must win, every time
        let mut reference = HashMap::new();
        reference.insert("z9".to_string(), "dupA; some protein".to_string());
        reference.insert("a1".to_string(), "dupA; some other protein".to_string());
        let input: HashSet<String> = ["dupA".to_string()].into_iter().collect();
        for _ in 0..10 {
            let mapping = resolve(&input, &reference, &HashMap::new(), &HashMap::new());
            assert_eq!(mapping.get("dupA"), Some("a1"));
        }
    }

    #[test]
    fn repeated_runs_are_identical() {
        let first = resolve_ids(&["b0002", "abc1", "thrA", "missing"]);
        let second = resolve_ids(&["b0002", "abc1", "thrA", "missing"]);
        assert_eq!(first, second);
    }

    #[test]
    fn coverage_and_translate() {
        let mapping = resolve_ids(&["abc1", "missing"]);
        assert_eq!(mapping.len(), 1);
        assert!((mapping.coverage(2) - 0.5).abs() < f64::EPSILON);

        let set: HashSet<String> =
            ["abc1".to_string(), "missing".to_string()].into_iter().collect();
        let translated = mapping.translate(&set);
        assert_eq!(translated.len(), 1);
        assert!(translated.contains("ABC1"));

        let ranking = vec![("abc1".to_string(), 2.0), ("missing".to_string(), -1.0)];
        let translated = mapping.translate_ranking(&ranking);
        assert_eq!(translated[0], ("ABC1".to_string(), 2.0));
        assert_eq!(translated[1], ("missing".to_string(), -1.0));
    }

    #[test]
    fn empty_inputs() {
        let mapping = resolve(
            &HashSet::new(),
            &HashMap::new(),
            &HashMap::new(),
            &HashMap::new(),
        );
        assert!(mapping.is_empty());
        assert!((mapping.coverage(0) - 0.0).abs() < f64::EPSILON);
    }
}
