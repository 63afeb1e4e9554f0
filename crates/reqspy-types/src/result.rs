//! The ordered, concatenable outcome of a comparison.
//!
//! A [`ComparisonResult`] is a monoid: [`ComparisonResult::empty`] is the
//! identity and `+` appends. Differences are never reordered or
//! deduplicated -- insertion order is traversal order, and callers assert
//! on it directly.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::difference::Difference;

/// Ordered list of [`Difference`]s. Empty means "equivalent".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComparisonResult {
    differences: Vec<Difference>,
}

impl ComparisonResult {
    /// The result of comparing two equivalent trees.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if the trees were found equivalent.
    pub fn is_empty(&self) -> bool {
        self.differences.is_empty()
    }

    /// Number of differences.
    pub fn len(&self) -> usize {
        self.differences.len()
    }

    /// Iterate over the differences in traversal order.
    pub fn iter(&self) -> std::slice::Iter<'_, Difference> {
        self.differences.iter()
    }

    /// The differences in traversal order.
    pub fn differences(&self) -> &[Difference] {
        &self.differences
    }

    /// The rendered message of every difference, in order.
    pub fn messages(&self) -> Vec<&str> {
        self.differences.iter().map(|d| d.message.as_str()).collect()
    }

    /// Consume the result, returning the underlying differences.
    pub fn into_differences(self) -> Vec<Difference> {
        self.differences
    }
}

impl From<Difference> for ComparisonResult {
    fn from(difference: Difference) -> Self {
        Self {
            differences: vec![difference],
        }
    }
}

impl From<Vec<Difference>> for ComparisonResult {
    fn from(differences: Vec<Difference>) -> Self {
        Self { differences }
    }
}

impl Add<Difference> for ComparisonResult {
    type Output = Self;

    fn add(mut self, difference: Difference) -> Self {
        self.differences.push(difference);
        self
    }
}

impl Add for ComparisonResult {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self.differences.extend(other.differences);
        self
    }
}

impl AddAssign<Difference> for ComparisonResult {
    fn add_assign(&mut self, difference: Difference) {
        self.differences.push(difference);
    }
}

impl AddAssign for ComparisonResult {
    fn add_assign(&mut self, other: Self) {
        self.differences.extend(other.differences);
    }
}

impl FromIterator<Difference> for ComparisonResult {
    fn from_iter<I: IntoIterator<Item = Difference>>(iter: I) -> Self {
        Self {
            differences: iter.into_iter().collect(),
        }
    }
}

impl Sum for ComparisonResult {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::empty(), Add::add)
    }
}

impl IntoIterator for ComparisonResult {
    type Item = Difference;
    type IntoIter = std::vec::IntoIter<Difference>;

    fn into_iter(self) -> Self::IntoIter {
        self.differences.into_iter()
    }
}

impl<'a> IntoIterator for &'a ComparisonResult {
    type Item = &'a Difference;
    type IntoIter = std::slice::Iter<'a, Difference>;

    fn into_iter(self) -> Self::IntoIter {
        self.differences.iter()
    }
}

/// One `- {difference}` line per difference.
impl fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for difference in &self.differences {
            writeln!(f, "- {difference}")?;
        }
        Ok(())
    }
}
