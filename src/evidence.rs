//! Typed evidence: observed states for a subset of a model's `Variable`s.
//!
//! `Evidence` is validated against the model when it is built, so unknown variable names and
//! state labels are rejected up front with `InvalidEvidence`.

use crate::model::DirectedModel;
use crate::util::{Result, SedRiskError};
use crate::variable::{Assignment, Variable};

use indexmap::IndexMap;


#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Evidence {
    /// observed state index per variable name, in observation order
    observed: IndexMap<String, usize>,
}

impl Evidence {

    /// No observations
    pub fn empty() -> Self {
        Evidence::default()
    }


    /// Build evidence from `(variable name, state label)` pairs.
    ///
    /// # Errors
    /// * `SedRiskError::InvalidEvidence` if a name or label is unknown to `model`, or a variable
    ///   is observed in two different states
    pub fn from_labels<I, K, V>(model: &DirectedModel, pairs: I) -> Result<Self>
        where I: IntoIterator<Item = (K, V)>,
              K: AsRef<str>,
              V: AsRef<str>
    {
        let mut evidence = Evidence::empty();
        for (name, label) in pairs {
            evidence.observe(model, name.as_ref(), label.as_ref())?;
        }
        Ok(evidence)
    }


    /// Record that `name` was observed in the state labelled `label`.
    pub fn observe(&mut self, model: &DirectedModel, name: &str, label: &str) -> Result<()> {
        let var = lookup(model, name)?;
        let state = var.state_index(label).map_err(|_| SedRiskError::InvalidEvidence(format!(
            "`{}` is not a state of `{}` (expected one of: {})",
            label, name, var.states().join(", ")
        )))?;
        self.insert(var, state)
    }


    /// Record that `name` was observed in state `state`.
    pub fn observe_index(&mut self, model: &DirectedModel, name: &str, state: usize) -> Result<()> {
        let var = lookup(model, name)?;
        var.check_state(state).map_err(|_| SedRiskError::InvalidEvidence(format!(
            "`{}` has {} states, got state index {}", name, var.cardinality(), state
        )))?;
        self.insert(var, state)
    }


    /// Builder-style `observe`
    pub fn with(mut self, model: &DirectedModel, name: &str, label: &str) -> Result<Self> {
        self.observe(model, name, label)?;
        Ok(self)
    }


    /// The observed state of `name`, if any
    pub fn get(&self, name: &str) -> Option<usize> {
        self.observed.get(name).copied()
    }


    pub fn contains(&self, name: &str) -> bool {
        self.observed.contains_key(name)
    }


    pub fn len(&self) -> usize {
        self.observed.len()
    }


    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }


    /// Iterate over `(name, state)` pairs in observation order
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.observed.iter().map(|(k, &v)| (k.as_str(), v))
    }


    /// Check that every observation is valid for `model`. Evidence is validated when built; this
    /// guards against evidence built for a different model.
    pub fn check_against(&self, model: &DirectedModel) -> Result<()> {
        for (name, state) in self.iter() {
            let var = lookup(model, name)?;
            if var.check_state(state).is_err() {
                return Err(SedRiskError::InvalidEvidence(format!(
                    "state index {} is out of range for `{}`", state, name
                )));
            }
        }
        Ok(())
    }


    /// The observations as an `Assignment`
    pub fn to_assignment(&self, model: &DirectedModel) -> Result<Assignment> {
        let mut assignment = Assignment::new();
        for (name, state) in self.iter() {
            assignment.set(lookup(model, name)?, state);
        }
        Ok(assignment)
    }


    fn insert(&mut self, var: &Variable, state: usize) -> Result<()> {
        match self.observed.get(var.name()) {
            Some(&previous) if previous != state => Err(SedRiskError::InvalidEvidence(format!(
                "`{}` is observed as both `{}` and `{}`",
                var.name(),
                var.state(previous).unwrap_or("?"),
                var.state(state).unwrap_or("?")
            ))),
            _ => {
                self.observed.insert(String::from(var.name()), state);
                Ok(())
            }
        }
    }
}


fn lookup<'m>(model: &'m DirectedModel, name: &str) -> Result<&'m Variable> {
    model.variable(name).ok_or_else(|| {
        SedRiskError::InvalidEvidence(format!("the model has no variable `{}`", name))
    })
}
