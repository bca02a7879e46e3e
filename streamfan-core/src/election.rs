//! Weighted file election.
//!
//! A [`WeightedCollection`] holds `(identifier, weight)` pairs kept in tuple
//! order. Each call to [`WeightedCollection::elect`] draws one identifier with
//! probability `weight / total`, by mapping a uniform draw over `[0, total)`
//! onto the inclusive prefix sums of the weights (bisect-right), and tallies
//! the choice so a run can report its distribution afterwards.
//!
//! Two observable quirks are kept as-is:
//! - when every weight is zero, the first item in tuple order always wins;
//! - inserts never deduplicate, so a repeated identifier gets extra buckets.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest total weight [`WeightedCollection::insert_fields`] accepts.
///
/// Draws scale an `f64` in `[0, 1)` by the total, which is exact only up to 2^53.
pub const MAX_TOTAL_WEIGHT: u64 = 1 << 53;

/// Errors from building or drawing from a weighted collection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ElectionError {
    #[error("empty collection: no files to elect from")]
    Empty,

    #[error("malformed item: expected (identifier, weight), got {found} field(s)")]
    Malformed { found: usize },

    #[error("invalid weight '{value}' for '{identifier}': expected a non-negative integer")]
    InvalidWeight { identifier: String, value: String },

    #[error("weight {weight} for '{identifier}' pushes the total weight past {limit}")]
    WeightOverflow {
        identifier: String,
        weight: u64,
        limit: u64,
    },
}

/// A selectable identifier and its relative weight.
///
/// Field order matters: the derived `Ord` compares `identifier` first, then
/// `weight`, which is the ordering the collection keeps its items in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeightedItem {
    pub identifier: String,
    pub weight: u64,
}

impl WeightedItem {
    pub fn new(identifier: impl Into<String>, weight: u64) -> Self {
        Self {
            identifier: identifier.into(),
            weight,
        }
    }

    /// Build an item from raw fields, e.g. one manifest row.
    ///
    /// Exactly two fields are accepted: the identifier and an integer weight.
    /// Surrounding whitespace on the weight is ignored.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Result<Self, ElectionError> {
        let [identifier, weight] = fields else {
            return Err(ElectionError::Malformed {
                found: fields.len(),
            });
        };
        let identifier: &str = identifier.as_ref();
        let raw: &str = weight.as_ref();
        let weight = raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ElectionError::InvalidWeight {
                identifier: identifier.to_string(),
                value: raw.to_string(),
            })?;
        Ok(Self::new(identifier, weight))
    }
}

/// Sorted `(identifier, weight)` pairs plus a tally of past elections.
#[derive(Debug, Clone, Default)]
pub struct WeightedCollection {
    items: Vec<WeightedItem>,
    selections: BTreeMap<String, u64>,
}

impl WeightedCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item and re-sort the whole sequence by tuple order.
    ///
    /// Returns the sorted items so callers can inspect the result of the insert.
    /// No limit is checked here; totals past [`MAX_TOTAL_WEIGHT`] lose draw
    /// precision and saturate at `u64::MAX`.
    pub fn insert(&mut self, item: WeightedItem) -> &[WeightedItem] {
        self.items.push(item);
        self.items.sort();
        &self.items
    }

    /// Validate raw fields as a pair and insert them.
    ///
    /// Rejects an item that would take the total weight past
    /// [`MAX_TOTAL_WEIGHT`]. On error the collection is left unchanged.
    pub fn insert_fields<S: AsRef<str>>(
        &mut self,
        fields: &[S],
    ) -> Result<&[WeightedItem], ElectionError> {
        let item = WeightedItem::from_fields(fields)?;
        let within_limit = self
            .total_weight()
            .checked_add(item.weight)
            .is_some_and(|total| total <= MAX_TOTAL_WEIGHT);
        if !within_limit {
            return Err(ElectionError::WeightOverflow {
                identifier: item.identifier,
                weight: item.weight,
                limit: MAX_TOTAL_WEIGHT,
            });
        }
        Ok(self.insert(item))
    }

    pub fn items(&self) -> &[WeightedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all weights. Saturates rather than wrapping.
    pub fn total_weight(&self) -> u64 {
        self.items
            .iter()
            .fold(0u64, |acc, item| acc.saturating_add(item.weight))
    }

    /// Elect one identifier using the thread-local RNG.
    pub fn elect(&mut self) -> Result<String, ElectionError> {
        self.elect_with(&mut rand::thread_rng())
    }

    /// Elect one identifier using the given RNG.
    ///
    /// The cumulative weights are rebuilt on every call, so the result always
    /// reflects the current contents of the collection.
    pub fn elect_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<String, ElectionError> {
        if self.items.is_empty() {
            return Err(ElectionError::Empty);
        }

        let (identifiers, weights): (Vec<&str>, Vec<u64>) = self
            .items
            .iter()
            .map(|item| (item.identifier.as_str(), item.weight))
            .unzip();
        let cumulative = cumulative_weights(&weights);

        let x = rng.gen::<f64>() * (*cumulative.last().unwrap_or(&0)) as f64;
        let chosen = identifiers[bucket_index(&cumulative, x)].to_string();

        *self.selections.entry(chosen.clone()).or_insert(0) += 1;
        Ok(chosen)
    }

    /// How many times `identifier` has been elected so far.
    pub fn selection_count(&self, identifier: &str) -> u64 {
        self.selections.get(identifier).copied().unwrap_or(0)
    }

    /// Every identifier elected at least once, with its count.
    pub fn selections(&self) -> &BTreeMap<String, u64> {
        &self.selections
    }

    /// Total number of elections performed.
    pub fn total_selections(&self) -> u64 {
        self.selections.values().sum()
    }
}

impl FromIterator<WeightedItem> for WeightedCollection {
    fn from_iter<I: IntoIterator<Item = WeightedItem>>(iter: I) -> Self {
        let mut items: Vec<WeightedItem> = iter.into_iter().collect();
        items.sort();
        Self {
            items,
            selections: BTreeMap::new(),
        }
    }
}

/// Inclusive prefix sums: `cum[i] = weights[0] + ... + weights[i]`.
fn cumulative_weights(weights: &[u64]) -> Vec<u64> {
    weights
        .iter()
        .scan(0u64, |total, &w| {
            *total = total.saturating_add(w);
            Some(*total)
        })
        .collect()
}

/// First index whose cumulative bound exceeds `x`.
///
/// A zero total always maps to index 0. A draw that rounds up to the total
/// falls into the last bucket that actually carries weight.
fn bucket_index(cumulative: &[u64], x: f64) -> usize {
    let total = match cumulative.last() {
        Some(&0) | None => return 0,
        Some(&total) => total,
    };
    let index = cumulative.partition_point(|&c| (c as f64) <= x);
    if index < cumulative.len() {
        index
    } else {
        cumulative.partition_point(|&c| c < total)
    }
}
