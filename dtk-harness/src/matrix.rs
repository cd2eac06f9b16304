//! Lazy cartesian product over parameter axes.
//!
//! The matrix never materializes its combinations. A linear index is treated
//! as a mixed-radix number whose radices are the axis cardinalities, with the
//! first declared axis as the least significant digit; `at(index)` decodes
//! one concrete configuration on demand. Descriptions and build arguments
//! are derived positionally from the declared axis order, so that order is
//! part of the public contract.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::axis::{Axis, Candidate};
use crate::outcome::{Outcome, worst_of};

/// Errors raised while assembling or indexing a matrix.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatrixError {
    /// An axis with zero candidates would silently collapse the matrix to
    /// zero tests; callers must treat that as a configuration error.
    #[error("axis '{label}' has no candidate values")]
    EmptyAxis { label: String },

    #[error("configuration index {index} out of range (cardinality {cardinality})")]
    IndexOutOfRange { index: usize, cardinality: usize },
}

/// One value selected from one axis, carried with enough context to build
/// the test description and argument list without another axis lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub axis_label: String,
    pub var: String,
    pub candidate: Candidate,
}

/// One concrete combination of axis values, identified by its linear index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub index: usize,
    pub selections: Vec<Selection>,
}

impl Configuration {
    /// The worst expected floor among the selected values: a single bad
    /// parameter forces the whole combination down to its failure mode.
    pub fn expected_outcome(&self) -> Outcome {
        worst_of(self.selections.iter().map(|s| s.candidate.floor))
            .unwrap_or(Outcome::Success)
    }

    /// Positional description, e.g.
    /// `[Install Path]:empty [Parent Path]:secured [Key Limit]:valid`.
    pub fn description(&self) -> String {
        self.selections
            .iter()
            .map(|s| format!("[{}]:{}", s.axis_label, s.candidate.description))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `VAR=value` argument for every axis, in declared axis order.
    pub fn build_args(&self) -> Vec<String> {
        self.selections
            .iter()
            .map(|s| format!("{}={}", s.var, s.candidate.value))
            .collect()
    }

    /// Selected value for a given build variable, if the matrix drives it.
    pub fn value_of(&self, var: &str) -> Option<&str> {
        self.selections
            .iter()
            .find(|s| s.var == var)
            .map(|s| s.candidate.value.as_str())
    }
}

/// An ordered list of axes with lazy index-based enumeration.
#[derive(Debug, Clone)]
pub struct ConfigMatrix {
    axes: Vec<Axis>,
}

impl ConfigMatrix {
    /// Validate and assemble a matrix. Empty axes are rejected here, up
    /// front, so a suite can never silently run zero tests.
    pub fn new(axes: Vec<Axis>) -> Result<Self, MatrixError> {
        if let Some(empty) = axes.iter().find(|axis| axis.is_empty()) {
            return Err(MatrixError::EmptyAxis {
                label: empty.label.clone(),
            });
        }
        Ok(Self { axes })
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Total number of combinations: the product of axis cardinalities.
    pub fn cardinality(&self) -> usize {
        self.axes.iter().map(Axis::len).product()
    }

    /// Decode the configuration at a linear index.
    ///
    /// Pure: the same index always yields the same combination, and indices
    /// `0..cardinality()` enumerate every combination exactly once.
    pub fn at(&self, index: usize) -> Result<Configuration, MatrixError> {
        let cardinality = self.cardinality();
        if index >= cardinality {
            return Err(MatrixError::IndexOutOfRange { index, cardinality });
        }

        let mut remainder = index;
        let mut selections = Vec::with_capacity(self.axes.len());
        for axis in &self.axes {
            let local = remainder % axis.len();
            remainder /= axis.len();
            let candidate = axis
                .get(local)
                .expect("local index bounded by axis length")
                .clone();
            selections.push(Selection {
                axis_label: axis.label.clone(),
                var: axis.var.clone(),
                candidate,
            });
        }
        Ok(Configuration { index, selections })
    }

    /// Lazy, restartable traversal in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = Configuration> + '_ {
        (0..self.cardinality()).map(move |index| {
            self.at(index)
                .expect("iteration index bounded by cardinality")
        })
    }
}
