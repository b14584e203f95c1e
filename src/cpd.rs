//! Definition of a tabular Conditional Probability Distribution.
//!
//! A `Cpd` is a `Factor` over a child `Variable` and its parents, with the child on the first
//! axis. For every assignment to the parents the child values sum to 1.

use crate::factor::{table_size, Factor};
use crate::util::{Result, SedRiskError, CPD_TOLERANCE};
use crate::variable::{all_assignments, Variable};

use itertools::Itertools;
use ndarray::{Axis, IxDyn};

#[derive(Clone, Debug, PartialEq)]
pub struct Cpd {
    /// Scope is `[child, parents...]`
    factor: Factor,
}

impl Cpd {

    /// Construct a CPD from a table laid out as `values[child_state][column]`, where the columns
    /// enumerate the parent assignments with the right-most parent varying fastest.
    ///
    /// # Errors
    /// * `SedRiskError::DimensionMismatch` if the table does not have one row per child state and
    ///   one column per parent assignment
    /// * `SedRiskError::InvalidCpd` if a value is negative, the child is its own parent, or a
    ///   column does not sum to 1
    /// * `SedRiskError::ResourceExceeded` if the number of parent assignments is not addressable
    pub fn new(variable: Variable, parents: Vec<Variable>, values: Vec<Vec<f64>>) -> Result<Self> {
        if values.len() != variable.cardinality() {
            return Err(SedRiskError::DimensionMismatch(format!(
                "CPD for `{}` needs {} rows, got {}",
                variable.name(), variable.cardinality(), values.len()
            )));
        }

        let shape: Vec<usize> = parents.iter().map(Variable::cardinality).collect();
        let columns = table_size(&shape)?;
        if let Some(row) = values.iter().find(|row| row.len() != columns) {
            return Err(SedRiskError::DimensionMismatch(format!(
                "CPD for `{}` needs {} columns, got a row of {}",
                variable.name(), columns, row.len()
            )));
        }

        if parents.iter().any(|p| p.name() == variable.name()) {
            return Err(SedRiskError::InvalidCpd {
                variable: String::from(variable.name()),
                reason: String::from("the variable is listed among its own parents"),
            });
        }

        let name = String::from(variable.name());
        let mut scope = Vec::with_capacity(parents.len() + 1);
        scope.push(variable);
        scope.extend(parents);

        let factor = Factor::from_vec(scope, values.into_iter().flatten().collect())
            .map_err(|e| match e {
                SedRiskError::InvalidValue(reason) => SedRiskError::InvalidCpd {
                    variable: name.clone(),
                    reason,
                },
                other => other,
            })?;

        let cpd = Cpd { factor };
        cpd.validate()?;
        Ok(cpd)
    }


    /// Construct the prior distribution of a `Variable` without parents
    pub fn prior(variable: Variable, probabilities: Vec<f64>) -> Result<Self> {
        let values = probabilities.into_iter().map(|p| vec![p]).collect();
        Cpd::new(variable, vec![], values)
    }


    /// Interpret `factor` as a CPD whose child is the first `Variable` of its scope.
    ///
    /// Only the structure is checked here; normalization is left to `validate`, which
    /// `DirectedModel::check_model` runs for every CPD.
    pub fn from_factor(factor: Factor) -> Result<Self> {
        if factor.scope().is_empty() {
            return Err(SedRiskError::InvalidCpd {
                variable: String::new(),
                reason: String::from("a CPD needs a child variable"),
            });
        }

        Ok(Cpd { factor })
    }


    /// The child `Variable`
    pub fn variable(&self) -> &Variable {
        &self.factor.scope()[0]
    }


    /// The parent `Variable`s, in table order
    pub fn parents(&self) -> &[Variable] {
        &self.factor.scope()[1..]
    }


    /// The underlying `Factor`, scope `[child, parents...]`
    pub fn factor(&self) -> &Factor {
        &self.factor
    }


    /// The number of parent assignments
    pub fn columns(&self) -> usize {
        self.factor.len() / self.variable().cardinality()
    }


    /// The table in the `values[child_state][column]` layout accepted by `Cpd::new`
    pub fn values(&self) -> Vec<Vec<f64>> {
        let flat: Vec<f64> = self.factor.table().iter().cloned().collect();
        flat.chunks(self.columns()).map(<[f64]>::to_vec).collect()
    }


    /// `P(child = state | parents = parent_states)`
    pub fn probability(&self, state: usize, parent_states: &[usize]) -> Result<f64> {
        if parent_states.len() != self.parents().len() {
            return Err(SedRiskError::DimensionMismatch(format!(
                "`{}` has {} parents, got {} parent states",
                self.variable().name(), self.parents().len(), parent_states.len()
            )));
        }

        let mut idx = Vec::with_capacity(parent_states.len() + 1);
        idx.push(state);
        idx.extend_from_slice(parent_states);
        for (v, &s) in self.factor.scope().iter().zip(idx.iter()) {
            v.check_state(s)?;
        }

        Ok(self.factor.table()[IxDyn(&idx)])
    }


    /// Check that the child values sum to 1 for every parent assignment.
    ///
    /// # Errors
    /// * `SedRiskError::InvalidCpd` naming the first offending parent assignment
    pub fn validate(&self) -> Result<()> {
        let sums = self.factor.table().sum_axis(Axis(0));

        for (sum, assn) in sums.iter().zip(all_assignments(self.parents())) {
            if (sum - 1.0).abs() > CPD_TOLERANCE {
                let column = if assn.is_empty() {
                    String::from("the prior")
                } else {
                    format!("({})", assn.describe(self.parents()))
                };

                return Err(SedRiskError::InvalidCpd {
                    variable: String::from(self.variable().name()),
                    reason: format!(
                        "probabilities of {} for {} sum to {}, expected 1",
                        self.variable().states().iter().join("/"), column, sum
                    ),
                });
            }
        }

        Ok(())
    }
}
