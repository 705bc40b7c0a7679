//! The individual match strategies of the resolver cascade
//!
//! Each strategy is a stateless unit struct implementing
//! [`MatchStrategy`]. The resolver walks [`cascade`] in order and stops
//! at the first strategy that returns a hit, so adding a new heuristic
//! means adding a struct here and a slot in the cascade, with no
//! branching logic in the resolver itself.

use super::{ReferenceTable, MIN_QUERY_PRODUCT_LEN, MIN_SUBSTRING_QUERY_LEN};

/// Everything known about one input identifier
pub(crate) struct Query<'a> {
    pub(crate) id: &'a str,
    pub(crate) name: Option<&'a str>,
    pub(crate) description: Option<&'a str>,
}

/// A single identifier-matching heuristic
pub(crate) trait MatchStrategy {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Returns the matched reference identifier, or `None` to let the
    /// next strategy in the cascade try
    fn try_match(&self, query: &Query, table: &ReferenceTable) -> Option<String>;
}

/// Strategy 1: the input identifier exists verbatim in the reference
struct ExactId;

impl MatchStrategy for ExactId {
    fn name(&self) -> &'static str {
        "exact-id"
    }

    fn try_match(&self, query: &Query, table: &ReferenceTable) -> Option<String> {
        table.contains(query.id).then(|| query.id.to_string())
    }
}

/// Strategy 2: case-insensitive identifier match
struct CaseInsensitiveId;

impl MatchStrategy for CaseInsensitiveId {
    fn name(&self) -> &'static str {
        "case-insensitive-id"
    }

    fn try_match(&self, query: &Query, table: &ReferenceTable) -> Option<String> {
        table.by_lower_id(&query.id.to_lowercase()).cloned()
    }
}

/// Strategy 3: the input's alternate name against the reference gene
/// symbol (the text before the semicolon of the description)
///
/// This is the primary strategy for cross-strain mapping, where locus
/// tags differ but gene symbols are shared.
struct AlternateSymbol;

impl MatchStrategy for AlternateSymbol {
    fn name(&self) -> &'static str {
        "alternate-symbol"
    }

    fn try_match(&self, query: &Query, table: &ReferenceTable) -> Option<String> {
        let name = query.name?.trim();
        if name.is_empty() {
            return None;
        }
        table.by_symbol(&name.to_lowercase()).cloned()
    }
}

/// Strategy 4: the input identifier itself, treated as a gene symbol
struct IdAsSymbol;

impl MatchStrategy for IdAsSymbol {
    fn name(&self) -> &'static str {
        "id-as-symbol"
    }

    fn try_match(&self, query: &Query, table: &ReferenceTable) -> Option<String> {
        table.by_symbol(&query.id.to_lowercase()).cloned()
    }
}

/// Strategy 5: the input's product description against reference product
/// texts
///
/// Exact matches are accepted for any description longer than
/// [`MIN_QUERY_PRODUCT_LEN`]; substring containment additionally
/// requires the query to be longer than [`MIN_SUBSTRING_QUERY_LEN`].
struct ProductDescription;

impl MatchStrategy for ProductDescription {
    fn name(&self) -> &'static str {
        "product-description"
    }

    fn try_match(&self, query: &Query, table: &ReferenceTable) -> Option<String> {
        let product = query.description?.trim().to_lowercase();
        if product.len() <= MIN_QUERY_PRODUCT_LEN {
            return None;
        }
        let allow_substring = product.len() > MIN_SUBSTRING_QUERY_LEN;
        table
            .products()
            .iter()
            .find(|(reference_product, _)| {
                product == *reference_product
                    || (allow_substring && reference_product.contains(&product))
            })
            .map(|(_, id)| id.clone())
    }
}

/// The strategies in priority order
pub(crate) fn cascade() -> [&'static dyn MatchStrategy; 5] {
    [
        &ExactId,
        &CaseInsensitiveId,
        &AlternateSymbol,
        &IdAsSymbol,
        &ProductDescription,
    ]
}
