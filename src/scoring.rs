//! Per-item score domain and stage aggregation.
//!
//! Scores live in free-text spreadsheet cells, so parsing is deliberately
//! forgiving: anything that is not a readable in-range number counts as zero,
//! and the `N/A` sentinel excludes an item from both the total and the
//! maximum. An item marked `N/A` at the self stage stays `N/A` for every
//! later stage of that case; the aggregator is the final authority on that
//! invariant regardless of what the input layer allowed through.

use std::collections::{BTreeMap, HashMap};

use crate::catalog::Catalog;

/// Highest score a single item can contribute.
pub const MAX_ITEM_SCORE: u8 = 10;

/// Cell text for the not-applicable sentinel.
pub const NOT_APPLICABLE_CELL: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Value(u8),
    NotApplicable,
}

impl Score {
    /// Parse a raw spreadsheet cell. Empty cells parse to `None`; garbage
    /// parses to `None` as well and is treated as zero downstream.
    pub fn parse_cell(cell: &str) -> Option<Score> {
        let cell = cell.trim();
        if cell.is_empty() {
            return None;
        }
        if cell.eq_ignore_ascii_case("n/a") || cell.eq_ignore_ascii_case("na") {
            return Some(Score::NotApplicable);
        }
        cell.parse::<u8>().ok().map(Score::Value)
    }

    pub fn to_cell(self) -> String {
        match self {
            Score::Value(v) => v.to_string(),
            Score::NotApplicable => NOT_APPLICABLE_CELL.to_string(),
        }
    }

    /// Points contributed to a stage total. Out-of-range values are treated
    /// as zero rather than rejected.
    fn points(self) -> u32 {
        match self {
            Score::Value(v) if v <= MAX_ITEM_SCORE => u32::from(v),
            Score::Value(_) => 0,
            Score::NotApplicable => 0,
        }
    }
}

/// Aggregate of one stage's scoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTotal {
    pub total: u32,
    pub max: u32,
}

/// Folds raw per-item score maps into stage totals against the catalog.
#[derive(Debug, Clone, Copy)]
pub struct ScoreAggregator<'a> {
    catalog: &'a Catalog,
}

impl<'a> ScoreAggregator<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Fold `stage_scores` into a `(total, max)` pair. Items the reference
    /// stage marked `N/A` contribute to neither; every other catalog item
    /// raises the maximum by ten and contributes its (defensively zeroed)
    /// score. Items absent from both maps count as zero against a full
    /// maximum. The fold is pure: re-running it on the same inputs yields
    /// the same totals.
    pub fn fold(
        &self,
        stage_scores: &HashMap<String, Score>,
        reference_scores: &HashMap<String, Score>,
    ) -> StageTotal {
        let mut total = 0u32;
        let mut max = 0u32;
        for item in self.catalog.items() {
            if matches!(
                reference_scores.get(&item.name),
                Some(Score::NotApplicable)
            ) {
                continue;
            }
            max += u32::from(MAX_ITEM_SCORE);
            total += stage_scores
                .get(&item.name)
                .copied()
                .map_or(0, Score::points);
        }
        StageTotal { total, max }
    }

    /// The per-item scores that actually get persisted for a stage: the
    /// reference's `N/A` markings override whatever the caller submitted,
    /// and unsubmitted applicable items are written as zero.
    pub fn effective_scores(
        &self,
        stage_scores: &HashMap<String, Score>,
        reference_scores: &HashMap<String, Score>,
    ) -> BTreeMap<String, Score> {
        let mut effective = BTreeMap::new();
        for item in self.catalog.items() {
            let score = if matches!(
                reference_scores.get(&item.name),
                Some(Score::NotApplicable)
            ) {
                Score::NotApplicable
            } else {
                match stage_scores.get(&item.name) {
                    Some(Score::Value(v)) if *v <= MAX_ITEM_SCORE => Score::Value(*v),
                    // Out-of-range input and a reviewer-side N/A on an item
                    // the self stage kept applicable both collapse to zero.
                    _ => Score::Value(0),
                }
            };
            effective.insert(item.name.clone(), score);
        }
        effective
    }
}
