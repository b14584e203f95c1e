//! Definition of the variable module
//!
//! A `Variable` represents a discrete random variable in a Bayesian network: a name and an
//! ordered list of state labels. An `Assignment` maps variables to state indices.

use crate::util::{Result, SedRiskError};

use indexmap::IndexMap;
use itertools::{Either, Itertools};

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Variable {
    /// The name of the `Variable`, unique within a model
    name: String,

    /// The labels of the states, in declared order
    states: Vec<String>,
}

impl Variable {

    /// Construct a new `Variable`
    ///
    /// # Errors
    /// * `SedRiskError::StructuralMismatch` if the name is empty
    /// * `SedRiskError::InvalidState` if there are no states or a label is repeated
    pub fn new<N, I, S>(name: N, states: I) -> Result<Self>
        where N: Into<String>,
              I: IntoIterator<Item = S>,
              S: Into<String>
    {
        let name = name.into();
        let states: Vec<String> = states.into_iter().map(Into::into).collect();

        if name.is_empty() {
            return Err(SedRiskError::StructuralMismatch(
                String::from("variable names may not be empty")
            ));
        }

        if states.is_empty() {
            return Err(SedRiskError::InvalidState {
                variable: name,
                state: String::from("<none>"),
            });
        }

        if let Some(dup) = states.iter().duplicates().next() {
            return Err(SedRiskError::InvalidState {
                variable: name.clone(),
                state: dup.clone(),
            });
        }

        Ok(Variable { name, states })
    }

    /// Get the name of the `Variable`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The state labels in declared order
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// The number of states the `Variable` can take
    pub fn cardinality(&self) -> usize {
        self.states.len()
    }

    /// The label of state `idx`, if it exists
    pub fn state(&self, idx: usize) -> Option<&str> {
        self.states.get(idx).map(String::as_str)
    }

    /// Resolve a state label to its index
    pub fn state_index(&self, label: &str) -> Result<usize> {
        self.states
            .iter()
            .position(|s| s == label)
            .ok_or_else(|| SedRiskError::InvalidState {
                variable: self.name.clone(),
                state: String::from(label),
            })
    }

    /// Check that `idx` is a valid state index
    pub fn check_state(&self, idx: usize) -> Result<()> {
        if idx < self.cardinality() {
            Ok(())
        } else {
            Err(SedRiskError::InvalidState {
                variable: self.name.clone(),
                state: idx.to_string(),
            })
        }
    }
}

impl fmt::Display for Variable {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}


/// A (partial) assignment of states to `Variable`s, keyed by variable name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Assignment {
    values: IndexMap<String, usize>,
}

impl Assignment {

    pub fn new() -> Self {
        Assignment { values: IndexMap::new() }
    }

    /// Assign state `state` to `var`, replacing any previous assignment
    pub fn set(&mut self, var: &Variable, state: usize) {
        self.values.insert(String::from(var.name()), state);
    }

    pub fn get(&self, var: &Variable) -> Option<usize> {
        self.get_by_name(var.name())
    }

    pub fn get_by_name(&self, name: &str) -> Option<usize> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, state)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.values.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Render the assignment using the state labels of `scope`, e.g. `TOC=Low, Grain_Size=Fine`
    pub fn describe(&self, scope: &[Variable]) -> String {
        scope.iter()
             .filter_map(|v| {
                 self.get(v).map(|s| format!("{}={}", v.name(), v.state(s).unwrap_or("?")))
             })
             .join(", ")
    }
}


/// Enumerate every complete `Assignment` to `scope` in row-major order: the last `Variable`
/// varies fastest. An empty scope has exactly one (empty) assignment.
pub fn all_assignments(scope: &[Variable]) -> impl Iterator<Item = Assignment> + '_ {
    let states = if scope.is_empty() {
        Either::Left(std::iter::once(Vec::new()))
    } else {
        Either::Right(scope.iter().map(|v| 0..v.cardinality()).multi_cartesian_product())
    };

    states.map(move |states| {
        let mut assn = Assignment::new();
        for (v, s) in scope.iter().zip(states) {
            assn.set(v, s);
        }
        assn
    })
}
