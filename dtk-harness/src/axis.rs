//! Parameter axes: the tunable configuration dimensions of the test matrix.
//!
//! One axis drives one build variable and holds an ordered list of candidate
//! values, each tagged with a description and the best outcome a combination
//! using that value can achieve.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::outcome::Outcome;

/// Errors produced by axis lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AxisError {
    #[error("candidate index {index} out of range for axis '{label}' ({len} candidates)")]
    IndexOutOfRange {
        label: String,
        index: usize,
        len: usize,
    },
}

/// One candidate value for a single configuration dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// The raw value substituted into the build argument list.
    pub value: String,
    /// A brief description of this value's intent.
    pub description: String,
    /// The best outcome expected of any combination that selects this value.
    pub floor: Outcome,
}

/// An ordered list of candidates for one build variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis {
    /// Human-readable dimension name, e.g. "Install Path".
    pub label: String,
    /// The build variable this axis assigns, e.g. `DT_DAEMON_PATH`.
    pub var: String,
    candidates: Vec<Candidate>,
}

impl Axis {
    pub fn new(label: impl Into<String>, var: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            var: var.into(),
            candidates: Vec::new(),
        }
    }

    /// Append one candidate value. Axes are populated once at suite assembly
    /// time and only read afterwards.
    pub fn push(
        &mut self,
        value: impl Into<String>,
        description: impl Into<String>,
        floor: Outcome,
    ) {
        self.candidates.push(Candidate {
            value: value.into(),
            description: description.into(),
            floor,
        });
    }

    /// Builder-style variant of [`push`](Self::push) for literal suite tables.
    pub fn with(
        mut self,
        value: impl Into<String>,
        description: impl Into<String>,
        floor: Outcome,
    ) -> Self {
        self.push(value, description, floor);
        self
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Candidate, AxisError> {
        self.candidates.get(index).ok_or(AxisError::IndexOutOfRange {
            label: self.label.clone(),
            index,
            len: self.candidates.len(),
        })
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }
}
