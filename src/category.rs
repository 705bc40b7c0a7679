//! Functional categories and the category → gene-set index
//!
//! Categories come from two kinds of reference data: pathway annotations
//! (category codes and labels fetched per organism) and the static
//! catalog of broad functional classes defined in this module. Both are
//! consumed by the enrichment engines through the same shape: a mapping
//! from category code to the set of member genes, built by
//! [`build_index`].

use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;

/// The category codes a single gene belongs to
///
/// Genes rarely carry more than a handful of annotations, so the codes
/// are kept inline.
pub type CategoryCodes = SmallVec<[String; 4]>;

/// Gene identifier → category codes, as delivered by the reference data
pub type CategoryMembership = HashMap<String, CategoryCodes>;

/// A named functional grouping that genes may belong to
///
/// Static reference data; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDefinition {
    code: String,
    label: String,
    group: Option<String>,
}

impl CategoryDefinition {
    /// Creates a definition without a super-group
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            group: None,
        }
    }

    /// Attaches the broader super-group this category belongs to
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// The category code, e.g. a pathway identifier or a one-letter
    /// functional class
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The human-readable label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The super-group label, if the category belongs to one
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }
}

/// Inverts gene → categories links into a category → gene-set index
///
/// Only genes present in `universe` contribute; membership entries for
/// genes outside the universe are ignored. Pure function: calling it
/// twice with the same inputs yields equal indices.
pub fn build_index(
    membership: &CategoryMembership,
    universe: &HashSet<String>,
) -> HashMap<String, HashSet<String>> {
    let mut index: HashMap<String, HashSet<String>> = HashMap::new();
    for (gene, codes) in membership {
        if !universe.contains(gene) {
            continue;
        }
        for code in codes {
            index
                .entry(code.clone())
                .or_default()
                .insert(gene.clone());
        }
    }
    index
}

/// The broad functional classes, one-letter codes with labels
const FUNCTIONAL_CLASSES: [(&str, &str); 26] = [
    ("A", "RNA processing and modification"),
    ("B", "Chromatin structure and dynamics"),
    ("C", "Energy production and conversion"),
    ("D", "Cell cycle control, cell division, chromosome partitioning"),
    ("E", "Amino acid transport and metabolism"),
    ("F", "Nucleotide transport and metabolism"),
    ("G", "Carbohydrate transport and metabolism"),
    ("H", "Coenzyme transport and metabolism"),
    ("I", "Lipid transport and metabolism"),
    ("J", "Translation, ribosomal structure and biogenesis"),
    ("K", "Transcription"),
    ("L", "Replication, recombination and repair"),
    ("M", "Cell wall/membrane/envelope biogenesis"),
    ("N", "Cell motility"),
    ("O", "Post-translational modification, protein turnover, chaperones"),
    ("P", "Inorganic ion transport and metabolism"),
    ("Q", "Secondary metabolites biosynthesis, transport, and catabolism"),
    ("R", "General function prediction only"),
    ("S", "Function unknown"),
    ("T", "Signal transduction mechanisms"),
    ("U", "Intracellular trafficking, secretion, and vesicular transport"),
    ("V", "Defense mechanisms"),
    ("W", "Extracellular structures"),
    ("X", "Mobilome: prophages, transposons"),
    ("Y", "Nuclear structure"),
    ("Z", "Cytoskeleton"),
];

/// Super-groups of the functional classes
const FUNCTIONAL_CLASS_GROUPS: [(&str, &str); 4] = [
    ("INFORMATION STORAGE AND PROCESSING", "ABJKL"),
    ("CELLULAR PROCESSES AND SIGNALING", "DMNOTUVWYZ"),
    ("METABOLISM", "CEFGHIPQ"),
    ("POORLY CHARACTERIZED", "RSX"),
];

/// The built-in catalog of broad functional classes, in code order
///
/// Each definition carries its super-group label.
pub fn functional_classes() -> Vec<CategoryDefinition> {
    FUNCTIONAL_CLASSES
        .iter()
        .map(|(code, label)| {
            let group = FUNCTIONAL_CLASS_GROUPS
                .iter()
                .find(|(_, codes)| codes.contains(code))
                .map(|(group, _)| *group)
                .expect("every functional class belongs to a super-group");
            CategoryDefinition::new(*code, *label).with_group(group)
        })
        .collect()
}

/// Gene counts per functional class over an identifier set
///
/// Returns `(code, count, percentage)` triples in code order, where the
/// percentage is relative to the total of all class assignments (a gene
/// in two classes counts twice). Classes with no members are included
/// with a zero count.
pub fn class_distribution(
    ids: &HashSet<String>,
    membership: &CategoryMembership,
) -> Vec<(String, usize, f64)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for id in ids {
        if let Some(codes) = membership.get(id) {
            for code in codes {
                *counts.entry(code.as_str()).or_default() += 1;
            }
        }
    }
    let total: usize = counts.values().sum();
    FUNCTIONAL_CLASSES
        .iter()
        .map(|(code, _)| {
            let count = counts.get(code).copied().unwrap_or(0);
            let percentage = if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            (code.to_string(), count, percentage)
        })
        .collect()
}
