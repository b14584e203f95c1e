//! Defines the `DirectedModel`, a Bayesian network representing the factorization of a
//! probability distribution P over discrete `Variable`s, and the reference sediment network.

pub mod directed;
pub mod sediment;

pub use self::directed::{DirectedModel, DirectedModelBuilder};
