//! Request handling for a prediction service.
//!
//! `Service` answers JSON query requests against a shared, validated model. It is transport
//! agnostic: `handle_json` returns the HTTP status a transport should use along with the body.
//! A service whose model could not be loaded keeps running and reports `model_unavailable`.

use crate::config::EngineConfig;
use crate::evidence::Evidence;
use crate::inference::VariableElimination;
use crate::model::sediment::ECOLOGICAL_EFFECT;
use crate::model::DirectedModel;
use crate::persist;
use crate::util::{ErrorClass, Result, SedRiskError};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use std::path::Path;
use std::sync::Arc;


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {

    /// Variables to compute posteriors for. The first one is used for the prediction.
    #[serde(default = "default_variables")]
    pub variables: Vec<String>,

    /// Observed state label per variable
    #[serde(default)]
    pub evidence: IndexMap<String, String>,
}

fn default_variables() -> Vec<String> {
    vec![String::from(ECOLOGICAL_EFFECT)]
}

impl Default for QueryRequest {

    fn default() -> Self {
        QueryRequest { variables: default_variables(), evidence: IndexMap::new() }
    }
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {

    /// Always `"success"`
    pub status: String,

    /// Per requested variable, the posterior probability of every state
    pub posteriors: IndexMap<String, IndexMap<String, f64>>,

    /// The most probable state of the first requested variable
    pub prediction: String,

    /// The posterior probability of `prediction`
    pub probability: f64,
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {

    /// Always `"error"`
    pub status: String,

    /// `SedRiskError::code` of the failure
    pub code: String,

    pub message: String,
}

impl From<&SedRiskError> for ErrorResponse {

    fn from(e: &SedRiskError) -> Self {
        ErrorResponse {
            status: String::from("error"),
            code: String::from(e.code()),
            message: e.to_string(),
        }
    }
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {

    /// `"healthy"` when a model is loaded, `"degraded"` otherwise
    pub status: String,

    pub model_loaded: bool,

    /// Why the model is unavailable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}


/// Whether the service has a model to answer queries with
#[derive(Clone, Debug)]
pub enum ModelState {
    Ready(Arc<DirectedModel>),
    Unavailable(String),
}


#[derive(Clone, Debug)]
pub struct Service {
    state: ModelState,
    config: EngineConfig,
}

impl Service {

    /// Serve a validated model
    ///
    /// # Errors
    /// * `SedRiskError::StructuralMismatch` if the model has not passed `check_model`
    pub fn new(model: Arc<DirectedModel>, config: EngineConfig) -> Result<Self> {
        model.ensure_validated()?;
        Ok(Service { state: ModelState::Ready(model), config })
    }


    /// A service without a model. Every query fails with `ModelUnavailable`.
    pub fn unavailable<S: Into<String>>(reason: S, config: EngineConfig) -> Self {
        Service { state: ModelState::Unavailable(reason.into()), config }
    }


    /// Load the model stored at `path`. Never fails: if the model cannot be loaded the service
    /// starts without one and reports why.
    pub fn load<P: AsRef<Path>>(path: P, config: EngineConfig) -> Self {
        match persist::load(path.as_ref()) {
            Ok(model) => {
                info!(path = %path.as_ref().display(), "serving model");
                Service { state: ModelState::Ready(Arc::new(model)), config }
            },
            Err(e) => {
                warn!(path = %path.as_ref().display(), error = %e, "starting without a model");
                Service::unavailable(e.to_string(), config)
            },
        }
    }


    pub fn state(&self) -> &ModelState {
        &self.state
    }


    /// The served model
    ///
    /// # Errors
    /// * `SedRiskError::ModelUnavailable` if the service has no model
    pub fn model(&self) -> Result<&DirectedModel> {
        match &self.state {
            ModelState::Ready(model) => Ok(model.as_ref()),
            ModelState::Unavailable(reason) => Err(SedRiskError::ModelUnavailable(reason.clone())),
        }
    }


    pub fn status(&self) -> StatusResponse {
        match &self.state {
            ModelState::Ready(_) => StatusResponse {
                status: String::from("healthy"),
                model_loaded: true,
                reason: None,
            },
            ModelState::Unavailable(reason) => StatusResponse {
                status: String::from("degraded"),
                model_loaded: false,
                reason: Some(reason.clone()),
            },
        }
    }


    /// Answer a query request
    pub fn handle(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let model = self.model()?;
        let evidence = Evidence::from_labels(model, request.evidence.iter())?;
        let names: Vec<&str> = request.variables.iter().map(String::as_str).collect();

        let engine = VariableElimination::with_config(model, self.config.clone());
        let marginals = engine.query_marginals(&names, &evidence)?;

        let (prediction, probability) = match marginals.first() {
            Some(m) => {
                let (state, p) = m.argmax_state();
                (String::from(state), p)
            },
            None => return Err(SedRiskError::EmptyQuery),
        };

        let posteriors = marginals.iter()
                                  .map(|m| (String::from(m.variable().name()), m.to_map()))
                                  .collect();

        debug!(prediction = %prediction, probability, "answered query");
        Ok(QueryResponse { status: String::from("success"), posteriors, prediction, probability })
    }


    /// Answer a JSON query request. Returns the HTTP status and the JSON body.
    pub fn handle_json(&self, body: &str) -> (u16, String) {
        let request: QueryRequest = match serde_json::from_str(body) {
            Ok(request) => request,
            Err(e) => {
                let response = ErrorResponse {
                    status: String::from("error"),
                    code: String::from("malformed_request"),
                    message: e.to_string(),
                };
                return (ErrorClass::Client.http_status(), render(&response));
            },
        };

        match self.handle(&request) {
            Ok(response) => (200, render(&response)),
            Err(e) => {
                debug!(error = %e, "query failed");
                (e.class().http_status(), render(&ErrorResponse::from(&e)))
            },
        }
    }
}


/// Serialize a response body, falling back to an `internal` error body if that fails
fn render<T: Serialize>(body: &T) -> String {
    serde_json::to_string(body).unwrap_or_else(|e| {
        json!({ "status": "error", "code": "internal", "message": e.to_string() }).to_string()
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sediment;

    use serde_json::Value;

    fn service() -> Service {
        Service::new(Arc::new(sediment::build().unwrap()), EngineConfig::default()).unwrap()
    }

    #[test]
    fn default_request() {
        let request: QueryRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(QueryRequest::default(), request);
        assert_eq!(vec!["Ecological_Effect"], request.variables);
    }

    #[test]
    fn prediction() {
        let request: QueryRequest = serde_json::from_str(r#"{
            "evidence": {
                "Contaminant_Conc": "High",
                "TOC": "Low",
                "Benthic_Community_Type": "Sensitive"
            }
        }"#).unwrap();

        let response = service().handle(&request).unwrap();
        assert_eq!("success", response.status);
        assert_eq!("Severe", response.prediction);
        assert!((response.probability - 0.435).abs() < 1e-9);

        let posterior = &response.posteriors["Ecological_Effect"];
        let labels: Vec<&str> = posterior.keys().map(String::as_str).collect();
        assert_eq!(vec!["None", "Moderate", "Severe"], labels);
    }

    #[test]
    fn several_variables() {
        let request = QueryRequest {
            variables: vec![String::from("Mortality_Growth"), String::from("Ecological_Effect")],
            evidence: IndexMap::new(),
        };
        let response = service().handle(&request).unwrap();

        assert_eq!(2, response.posteriors.len());
        assert_eq!("Normal", response.prediction);
        let keys: Vec<&str> = response.posteriors.keys().map(String::as_str).collect();
        assert_eq!(vec!["Mortality_Growth", "Ecological_Effect"], keys);
    }

    #[test]
    fn client_errors() {
        let svc = service();

        let (status, body) = svc.handle_json(r#"{ "evidence": { "TOC": "Medium" } }"#);
        assert_eq!(400, status);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!("error", body["status"]);
        assert_eq!("invalid_evidence", body["code"]);

        let (status, body) = svc.handle_json(r#"{ "variables": [] }"#);
        assert_eq!(400, status);
        assert!(body.contains("empty_query"));

        let (status, body) = svc.handle_json(r#"{ "variables": ["Turbidity"] }"#);
        assert_eq!(400, status);
        assert!(body.contains("unknown_variable"));

        let (status, body) = svc.handle_json("{ not json");
        assert_eq!(400, status);
        assert!(body.contains("malformed_request"));
    }

    #[test]
    fn success_json() {
        let (status, body) = service().handle_json(r#"{ "evidence": { "TOC": "High" } }"#);
        assert_eq!(200, status);

        let response: QueryResponse = serde_json::from_str(&body).unwrap();
        assert_eq!("success", response.status);
        let total: f64 = response.posteriors["Ecological_Effect"].values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn resource_errors_are_server_errors() {
        let config = EngineConfig { max_factor_entries: 4, ..EngineConfig::default() };
        let svc = Service::new(Arc::new(sediment::build().unwrap()), config).unwrap();

        let (status, body) = svc.handle_json("{}");
        assert_eq!(500, status);
        assert!(body.contains("resource_exceeded"));
    }

    #[test]
    fn without_a_model() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Service::load(dir.path().join("missing.json"), EngineConfig::default());

        let status = svc.status();
        assert!(!status.model_loaded);
        assert_eq!("degraded", status.status);
        assert!(status.reason.unwrap().contains("missing.json"));

        assert!(matches!(svc.model(), Err(SedRiskError::ModelUnavailable(_))));
        let (code, body) = svc.handle_json("{}");
        assert_eq!(500, code);
        assert!(body.contains("model_unavailable"));
    }

    #[test]
    fn loaded_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sediment.json");
        persist::save(&sediment::build().unwrap(), &path).unwrap();

        let svc = Service::load(&path, EngineConfig::default());
        let status = svc.status();
        assert!(status.model_loaded);
        assert_eq!("healthy", status.status);
        assert_eq!(r#"{"status":"healthy","model_loaded":true}"#, serde_json::to_string(&status).unwrap());
    }

    #[test]
    fn unserializable_bodies_render_as_json() {
        // JSON object keys must be strings, so a map keyed by pairs cannot be serialized
        let mut body = std::collections::BTreeMap::new();
        body.insert((1, 2), "a \"quoted\" value");

        let rendered: Value = serde_json::from_str(&render(&body)).unwrap();
        assert_eq!("error", rendered["status"]);
        assert_eq!("internal", rendered["code"]);
        assert!(rendered["message"].as_str().unwrap().contains("key must be a string"));
    }

    #[test]
    fn unvalidated_model_is_refused() {
        let mut model = sediment::build().unwrap();
        model.add_variable(crate::variable::Variable::new("Depth", vec!["Shallow", "Deep"]).unwrap()).unwrap();
        assert!(Service::new(Arc::new(model), EngineConfig::default()).is_err());
    }
}
