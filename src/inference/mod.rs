//! Defines the interface to inference engines

use crate::evidence::Evidence;
use crate::factor::Factor;
use crate::model::DirectedModel;
use crate::posterior::Posterior;
use crate::util::{Result, SedRiskError};
use crate::variable::Variable;

use itertools::Itertools;

mod enumeration;
mod variable_elimination;

pub use self::enumeration::Enumeration;
pub use self::variable_elimination::VariableElimination;


/// A `ConditionalInferenceEngine` is capable of answering Conditional Probability Queries of the form:
///     ```P(Y | E = e)```
///
/// Engines only read the model, so one engine may answer any number of queries, concurrently.
pub trait ConditionalInferenceEngine {

    /// Infer the joint distribution ```P(variables | evidence)```
    fn infer(&self, variables: &[&str], evidence: &Evidence) -> Result<Posterior>;

}


/// Resolve the query `Variable`s of a request against `model`, collapsing repeated names.
///
/// # Errors
/// * `SedRiskError::StructuralMismatch` if the model is not validated
/// * `SedRiskError::EmptyQuery` if no variable is queried
/// * `SedRiskError::UnknownVariable` if a queried name is not in the model
/// * `SedRiskError::InvalidEvidence` if the evidence does not fit the model, or a variable is both
///   queried and observed
fn resolve_query<'m>(
    model: &'m DirectedModel,
    variables: &[&str],
    evidence: &Evidence
) -> Result<Vec<&'m Variable>> {
    model.ensure_validated()?;

    if variables.is_empty() {
        return Err(SedRiskError::EmptyQuery);
    }

    let query = variables.iter()
                         .unique()
                         .map(|name| model.require(name))
                         .collect::<Result<Vec<_>>>()?;

    evidence.check_against(model)?;
    if let Some(v) = query.iter().find(|v| evidence.contains(v.name())) {
        return Err(SedRiskError::InvalidEvidence(format!(
            "`{}` is both queried and observed", v.name()
        )));
    }

    Ok(query)
}


/// Normalize the unnormalized posterior. All-zero mass means the evidence is impossible.
fn conditional(unnormalized: Factor) -> Result<Posterior> {
    match unnormalized.normalize() {
        Ok(phi) => Ok(Posterior::new(phi)),
        Err(SedRiskError::DegenerateDistribution) => Err(SedRiskError::ConflictingEvidence),
        Err(e) => Err(e),
    }
}
