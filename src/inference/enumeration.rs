//! Defines a `ConditionalInferenceEngine` that answers queries by brute force: it sums the full
//! joint distribution, one complete assignment at a time.
//!
//! The cost is exponential in the number of `Variable`s, so this engine is only practical for
//! small models. It shares no code path with variable elimination, which makes it a useful
//! reference to check the latter against.

use crate::config::EngineConfig;
use crate::evidence::Evidence;
use crate::factor::{table_size, Factor};
use crate::model::DirectedModel;
use crate::posterior::Posterior;
use crate::util::{Result, SedRiskError};
use crate::variable::{all_assignments, Variable};
use super::{conditional, resolve_query, ConditionalInferenceEngine};

use tracing::debug;


pub struct Enumeration<'a> {
    model: &'a DirectedModel,
    config: EngineConfig,
}


impl<'a> Enumeration<'a> {

    pub fn new(model: &'a DirectedModel) -> Self {
        Enumeration::with_config(model, EngineConfig::default())
    }


    /// `config.max_factor_entries` bounds the size of the full joint this engine will walk
    pub fn with_config(model: &'a DirectedModel, config: EngineConfig) -> Self {
        Enumeration { model, config }
    }
}


impl<'a> ConditionalInferenceEngine for Enumeration<'a> {

    fn infer(&self, variables: &[&str], evidence: &Evidence) -> Result<Posterior> {
        let query = resolve_query(self.model, variables, evidence)?;

        let all: Vec<Variable> = self.model.variables().cloned().collect();
        let shape: Vec<usize> = all.iter().map(Variable::cardinality).collect();
        let joint = table_size(&shape)?;
        if joint > self.config.max_factor_entries {
            return Err(SedRiskError::ResourceExceeded(format!(
                "the full joint has {} entries, the limit is {}", joint, self.config.max_factor_entries
            )));
        }
        debug!(entries = joint, "enumerating the full joint");

        let size: usize = query.iter().map(|v| v.cardinality()).product();
        let mut acc = vec![0.0; size];

        for assn in all_assignments(&all) {
            let consistent = evidence.iter().all(|(name, state)| assn.get_by_name(name) == Some(state));
            if !consistent {
                continue;
            }

            // row-major position of the query part of the assignment
            let mut idx = 0;
            for v in query.iter() {
                let state = assn.get(v).ok_or_else(|| SedRiskError::IncompleteAssignment(String::from(v.name())))?;
                idx = idx * v.cardinality() + state;
            }
            acc[idx] += self.model.probability(&assn)?;
        }

        let scope = query.into_iter().cloned().collect();
        conditional(Factor::from_vec(scope, acc)?)
    }

}
