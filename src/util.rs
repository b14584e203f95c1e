//! Defines the `SedRiskError` type for the sedrisk library, along with the numeric tolerances
//! shared by the factor and CPD code.

use std::result;

use thiserror::Error;

pub type Result<T> = result::Result<T, SedRiskError>;

/// Maximum deviation from 1 allowed when checking that a CPD column is normalized.
pub const CPD_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum SedRiskError {

    /// Two tables (or a table and its declared scope) disagree on the size of a dimension
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A variable was referenced that is not part of the factor or model
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    /// A state (index or label) that does not exist for the variable
    #[error("invalid state `{state}` for variable `{variable}`")]
    InvalidState { variable: String, state: String },

    /// Represents an incomplete assignment where a complete assignment was required.
    /// The value is the name of the first variable missing from the assignment.
    #[error("assignment is missing variable `{0}`")]
    IncompleteAssignment(String),

    /// A factor table entry that is negative or not a number
    #[error("invalid factor value: {0}")]
    InvalidValue(String),

    /// Normalization was requested for a table whose values sum to zero
    #[error("degenerate distribution: values sum to zero")]
    DegenerateDistribution,

    /// A conditional probability table that is not a distribution for some parent assignment
    #[error("invalid CPD for `{variable}`: {reason}")]
    InvalidCpd { variable: String, reason: String },

    /// The graph and the CPDs attached to it disagree
    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),

    /// Evidence that names an unknown variable or state, or that overlaps the query
    #[error("invalid evidence: {0}")]
    InvalidEvidence(String),

    #[error("a query must name at least one variable")]
    EmptyQuery,

    /// The evidence has probability zero under the model
    #[error("conflicting evidence: the observed states are impossible under the model")]
    ConflictingEvidence,

    /// The model could not be produced (missing file, corrupt data, schema mismatch...)
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// An intermediate table would grow beyond the configured bound
    #[error("resource limit exceeded: {0}")]
    ResourceExceeded(String),
}

/// Which side of a request/response boundary is at fault for an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request was malformed or asks for something impossible
    Client,

    /// The service could not answer a well-formed request
    Server,
}

impl ErrorClass {

    /// The HTTP status code a transport would report for this class
    pub fn http_status(self) -> u16 {
        match self {
            ErrorClass::Client => 400,
            ErrorClass::Server => 500,
        }
    }
}

impl SedRiskError {

    /// Stable, machine readable identifier of the error kind
    pub fn code(&self) -> &'static str {
        match self {
            SedRiskError::DimensionMismatch(_) => "dimension_mismatch",
            SedRiskError::UnknownVariable(_) => "unknown_variable",
            SedRiskError::InvalidState { .. } => "invalid_state",
            SedRiskError::IncompleteAssignment(_) => "incomplete_assignment",
            SedRiskError::InvalidValue(_) => "invalid_value",
            SedRiskError::DegenerateDistribution => "degenerate_distribution",
            SedRiskError::InvalidCpd { .. } => "invalid_cpd",
            SedRiskError::StructuralMismatch(_) => "structural_mismatch",
            SedRiskError::InvalidEvidence(_) => "invalid_evidence",
            SedRiskError::EmptyQuery => "empty_query",
            SedRiskError::ConflictingEvidence => "conflicting_evidence",
            SedRiskError::ModelUnavailable(_) => "model_unavailable",
            SedRiskError::ResourceExceeded(_) => "resource_exceeded",
        }
    }

    /// Classify the error for a serving layer. Problems with the request itself are client
    /// errors; everything else means the service is at fault.
    pub fn class(&self) -> ErrorClass {
        match self {
            SedRiskError::InvalidEvidence(_)
            | SedRiskError::EmptyQuery
            | SedRiskError::ConflictingEvidence
            | SedRiskError::UnknownVariable(_)
            | SedRiskError::InvalidState { .. } => ErrorClass::Client,
            _ => ErrorClass::Server,
        }
    }
}
