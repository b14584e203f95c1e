//! Exact inference on discrete Bayesian networks, with a reference network relating sediment
//! contamination, environmental modifiers and receptor sensitivity to ecological effects.
//!
//! A `DirectedModel` is assembled from `Variable`s, edges and `Cpd`s and validated once with
//! `check_model`. Queries of the form `P(Y | E = e)` are answered by `VariableElimination`, which
//! returns a normalized `Posterior`.

pub mod config;
pub mod cpd;
pub mod evidence;
pub mod factor;
pub mod inference;
pub mod model;
pub mod persist;
pub mod posterior;
pub mod serve;
pub mod util;
pub mod variable;

pub use config::EngineConfig;
pub use cpd::Cpd;
pub use evidence::Evidence;
pub use factor::Factor;
pub use inference::{ConditionalInferenceEngine, Enumeration, VariableElimination};
pub use model::{DirectedModel, DirectedModelBuilder};
pub use posterior::{Marginal, Posterior};
pub use util::{ErrorClass, Result, SedRiskError};
pub use variable::{all_assignments, Assignment, Variable};
