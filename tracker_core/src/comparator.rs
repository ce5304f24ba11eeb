//! Result comparators: rate how well a report fits a track, and aggregate the
//! rates of a matched list.
//!
//! A per-report rate combines feature grades (each weighted by the configured
//! grade-weight table, 0 for names not in it) with positional closeness:
//! `min(1/d, max_rate) / max_rate` over lon/lat/mos.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Feature name → grade in [0, 1].
pub type Grades = BTreeMap<&'static str, f64>;

/// Feature name → weight applied to its grade.
pub type GradeWeights = BTreeMap<String, f64>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparatorKind {
    And,
    #[default]
    Or,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListComparatorKind {
    And,
    #[default]
    Or,
}

/// Normalized positional closeness in [0, 1]. A coincident position is 1.
pub fn closeness(distance: f64, max_rate: f64) -> f64 {
    (1.0 / distance).min(max_rate) / max_rate
}

// ---------------------------------------------------------------------------
// Per-report comparators
// ---------------------------------------------------------------------------

pub trait ResultComparator: Send + Sync {
    /// Rate one report against one track given its feature grades and the
    /// distance between them.
    fn rate(&self, grades: &Grades, distance: f64) -> f64;
}

fn weight(weights: &GradeWeights, name: &str) -> f64 {
    weights.get(name).copied().unwrap_or(0.0)
}

/// Every graded feature must agree, and the position must be close.
#[derive(Clone, Debug)]
pub struct AndComparator {
    pub weights: GradeWeights,
    pub max_rate: f64,
}

impl ResultComparator for AndComparator {
    fn rate(&self, grades: &Grades, distance: f64) -> f64 {
        let features: f64 = grades
            .iter()
            .map(|(name, g)| weight(&self.weights, name) * g)
            .product();
        features * closeness(distance, self.max_rate)
    }
}

/// Average of the feature agreement and the positional closeness. With an
/// empty weight table the rate is closeness alone; a report without graded
/// features still averages in a feature agreement of 0.
#[derive(Clone, Debug)]
pub struct OrComparator {
    pub weights: GradeWeights,
    pub max_rate: f64,
}

impl ResultComparator for OrComparator {
    fn rate(&self, grades: &Grades, distance: f64) -> f64 {
        let position = closeness(distance, self.max_rate);
        if self.weights.is_empty() {
            return position;
        }
        let features = if grades.is_empty() {
            0.0
        } else {
            let sum: f64 = grades
                .iter()
                .map(|(name, g)| weight(&self.weights, name) * g)
                .sum();
            sum / grades.len() as f64
        };
        (features + position) / 2.0
    }
}

// ---------------------------------------------------------------------------
// List comparators
// ---------------------------------------------------------------------------

pub trait ListResultComparator: Send + Sync {
    /// Aggregate the rates of a matched list. An empty list rates 0.
    fn rate(&self, rates: &[f64]) -> f64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AndListComparator;

impl ListResultComparator for AndListComparator {
    fn rate(&self, rates: &[f64]) -> f64 {
        if rates.is_empty() {
            return 0.0;
        }
        rates.iter().product()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OrListComparator;

impl ListResultComparator for OrListComparator {
    fn rate(&self, rates: &[f64]) -> f64 {
        if rates.is_empty() {
            return 0.0;
        }
        rates.iter().sum::<f64>() / rates.len() as f64
    }
}

/// Build the configured per-report comparator.
pub fn build_comparator(
    kind: ComparatorKind,
    weights: GradeWeights,
    max_rate: f64,
) -> Box<dyn ResultComparator> {
    match kind {
        ComparatorKind::And => Box::new(AndComparator { weights, max_rate }),
        ComparatorKind::Or => Box::new(OrComparator { weights, max_rate }),
    }
}

/// Build the configured list comparator.
pub fn build_list_comparator(kind: ListComparatorKind) -> Box<dyn ListResultComparator> {
    match kind {
        ListComparatorKind::And => Box::new(AndListComparator),
        ListComparatorKind::Or => Box::new(OrListComparator),
    }
}
