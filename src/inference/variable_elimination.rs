//! Defines a `ConditionalInferenceEngine` that uses exact inference by variable elimination to
//! answer conditional inference queries.
//!
//! Implementation of Koller & Friedman Algorithm 9.1 - Sum-Product-VE, with evidence reduction
//! (Algorithm 9.2) and removal of barren variables before elimination.

use crate::config::EngineConfig;
use crate::evidence::Evidence;
use crate::factor::{table_size, Factor};
use crate::model::DirectedModel;
use crate::posterior::{Marginal, Posterior};
use crate::util::{Result, SedRiskError};
use crate::variable::Variable;
use super::{conditional, resolve_query, ConditionalInferenceEngine};

use indexmap::IndexMap;
use itertools::Itertools;
use tracing::debug;

use std::collections::{BTreeMap, HashSet};


pub struct VariableElimination<'a> {

    /// The validated model to query. Never modified.
    model: &'a DirectedModel,

    config: EngineConfig,
}


/// Everything needed to run one elimination: the resolved query, the evidence-reduced factors
/// and the order in which to eliminate the hidden `Variable`s.
struct Plan<'a> {
    query: Vec<&'a Variable>,
    factors: Vec<Factor>,
    order: Vec<&'a Variable>,
}


impl<'a> VariableElimination<'a> {

    pub fn new(model: &'a DirectedModel) -> Self {
        VariableElimination::with_config(model, EngineConfig::default())
    }


    pub fn with_config(model: &'a DirectedModel, config: EngineConfig) -> Self {
        VariableElimination { model, config }
    }


    pub fn config(&self) -> &EngineConfig {
        &self.config
    }


    /// Compute `P(variables | evidence)`.
    ///
    /// # Errors
    /// * `SedRiskError::EmptyQuery`, `UnknownVariable` or `InvalidEvidence` for a bad request
    /// * `SedRiskError::ConflictingEvidence` if the evidence has probability zero
    /// * `SedRiskError::ResourceExceeded` if an intermediate factor would exceed
    ///   `EngineConfig::max_factor_entries`
    pub fn query(&self, variables: &[&str], evidence: &Evidence) -> Result<Posterior> {
        let plan = self.plan(variables, evidence)?;
        let names: Vec<&str> = plan.query.iter().map(|v| v.name()).collect();

        let mut phis = plan.factors;
        for var in plan.order.iter() {
            let (bucket, rest): (Vec<Factor>, Vec<Factor>) = phis
                .into_iter()
                .partition(|f| f.contains(var.name()));

            // product step - multiply the factors that mention var
            let psi = self.product(&bucket)?;
            debug!(variable = var.name(), factors = bucket.len(), entries = psi.len(), "eliminating");

            // sum step - marginalize psi over var
            let tau = psi.marginalize(var.name())?;

            phis = rest;
            phis.push(tau);
        }

        // multiply together remaining phis, which only mention the query variables
        let phi_star = self.product(&phis)?.aligned(&names)?;

        // now we have an unnormalized distribution. We need the partition function to return a
        // conditional probability.
        conditional(phi_star)
    }


    /// The posterior of each `Variable` in `variables` on its own, in request order. Each is
    /// answered by a separate single-variable query.
    pub fn query_marginals(&self, variables: &[&str], evidence: &Evidence) -> Result<Vec<Marginal>> {
        if variables.is_empty() {
            return Err(SedRiskError::EmptyQuery);
        }

        variables.iter()
                 .unique()
                 .map(|&name| self.query(&[name], evidence)?.marginal(name))
                 .collect()
    }


    /// The order in which `query` would eliminate the hidden `Variable`s for this request.
    pub fn elimination_order(&self, variables: &[&str], evidence: &Evidence) -> Result<Vec<&'a Variable>> {
        Ok(self.plan(variables, evidence)?.order)
    }


    fn plan(&self, variables: &[&str], evidence: &Evidence) -> Result<Plan<'a>> {
        let model = self.model;
        let query = resolve_query(model, variables, evidence)?;
        let topo = model.topological_order()?;

        // Variables that are neither queried, observed, nor ancestors of either are barren: their
        // CPDs sum out to 1.
        let relevant: HashSet<&str> = if self.config.prune_barren {
            let roots: Vec<&str> = query.iter()
                                        .map(|v| v.name())
                                        .chain(evidence.iter().map(|(name, _)| name))
                                        .collect();
            let ancestors = model.ancestors(&roots)?;
            topo.iter().map(|&v| v.name()).filter(|n| ancestors.contains(*n)).collect()
        } else {
            topo.iter().map(|&v| v.name()).collect()
        };

        let observed = evidence.to_assignment(model)?;
        let mut factors = Vec::with_capacity(relevant.len());
        for var in topo.iter().filter(|v| relevant.contains(v.name())) {
            let cpd = model.cpd(var.name()).ok_or_else(|| SedRiskError::StructuralMismatch(
                format!("no CPD is attached to `{}`", var.name())
            ))?;
            factors.push(cpd.factor().reduce_assignment(&observed)?);
        }

        let hidden: Vec<&'a Variable> = topo.into_iter()
            .filter(|v| relevant.contains(v.name()))
            .filter(|v| !evidence.contains(v.name()))
            .filter(|v| !query.iter().any(|q| q.name() == v.name()))
            .collect();

        let order = min_weight_elimination_order(&factors, hidden);
        debug!(
            query = %query.iter().join(", "),
            pruned = model.num_variables() - relevant.len(),
            order = %order.iter().join(", "),
            "elimination plan"
        );

        Ok(Plan { query, factors, order })
    }


    /// Multiply `factors` together, refusing if the result would be larger than the configured
    /// limit. The size is checked before any table is allocated.
    fn product(&self, factors: &[Factor]) -> Result<Factor> {
        let mut scope: IndexMap<&str, usize> = IndexMap::new();
        for v in factors.iter().flat_map(|f| f.scope()) {
            scope.insert(v.name(), v.cardinality());
        }

        let shape: Vec<usize> = scope.values().cloned().collect();
        let entries = table_size(&shape)?;
        if entries > self.config.max_factor_entries {
            return Err(SedRiskError::ResourceExceeded(format!(
                "a factor over ({}) needs {} entries, the limit is {}",
                scope.keys().join(", "), entries, self.config.max_factor_entries
            )));
        }

        factors.iter().try_fold(Factor::identity(), |acc, phi| acc.combine(phi))
    }
}


impl<'a> ConditionalInferenceEngine for VariableElimination<'a> {

    fn infer(&self, variables: &[&str], evidence: &Evidence) -> Result<Posterior> {
        self.query(variables, evidence)
    }

}


/// Compute an elimination order by the greedy min-weight heuristic: repeatedly eliminate the
/// `Variable` whose elimination creates the smallest factor (the product of the cardinalities of
/// its neighbours). Ties go to the `Variable` that comes first in `candidates`, which is in
/// topological order, so the order is deterministic.
///
/// See Koller & Friedman Section 9.4.3.2
fn min_weight_elimination_order<'a>(factors: &[Factor], mut candidates: Vec<&'a Variable>) -> Vec<&'a Variable> {
    // only the scopes matter for choosing the order
    let mut scopes: Vec<BTreeMap<&str, usize>> = factors
        .iter()
        .map(|f| f.scope().iter().map(|v| (v.name(), v.cardinality())).collect())
        .collect();

    let mut order = Vec::with_capacity(candidates.len());
    loop {
        let next = candidates
            .iter()
            .enumerate()
            .map(|(i, v)| (i, weight(&neighbourhood(&scopes, v.name()))))
            .min_by_key(|&(_, w)| w);

        let var = match next {
            Some((idx, _)) => candidates.remove(idx),
            None => break,
        };
        let merged = neighbourhood(&scopes, var.name());
        scopes.retain(|s| !s.contains_key(var.name()));
        scopes.push(merged);
        order.push(var);
    }

    order
}


/// The number of entries of a factor over `scope`
fn weight(scope: &BTreeMap<&str, usize>) -> usize {
    scope.values().fold(1, |w, &c| w.saturating_mul(c))
}


/// The union of the scopes that mention `name`, without `name` itself
fn neighbourhood<'s>(scopes: &[BTreeMap<&'s str, usize>], name: &str) -> BTreeMap<&'s str, usize> {
    let mut union: BTreeMap<&str, usize> = scopes
        .iter()
        .filter(|s| s.contains_key(name))
        .flat_map(|s| s.iter().map(|(&k, &c)| (k, c)))
        .collect();
    union.remove(name);
    union
}
