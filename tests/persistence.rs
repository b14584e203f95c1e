//! Saved models answer exactly as the models they were saved from.

use sedrisk::model::sediment::{self, *};
use sedrisk::persist;
use sedrisk::serve::{QueryRequest, Service};
use sedrisk::{EngineConfig, Evidence, SedRiskError, VariableElimination};

use std::fs;

#[test]
fn loaded_model_answers_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bn_sed_model.json");

    let model = sediment::build().unwrap();
    persist::save(&model, &path).unwrap();
    let loaded = persist::load(&path).unwrap();
    assert!(loaded.is_validated());

    let requests: Vec<(Vec<&str>, Vec<(&str, &str)>)> = vec![
        (vec![ECOLOGICAL_EFFECT], vec![]),
        (vec![ECOLOGICAL_EFFECT], vec![(CONTAMINANT_CONC, "High"), (TOC, "Low"), (BENTHIC_COMMUNITY_TYPE, "Sensitive")]),
        (vec![CONTAMINANT_CONC], vec![(ECOLOGICAL_EFFECT, "None")]),
        (vec![BIOAVAILABILITY, GRAIN_SIZE], vec![(COMMUNITY_RICHNESS, "Low")]),
    ];

    for (query, observations) in requests {
        let a = VariableElimination::new(&model)
            .query(&query, &Evidence::from_labels(&model, observations.clone()).unwrap())
            .unwrap();
        let b = VariableElimination::new(&loaded)
            .query(&query, &Evidence::from_labels(&loaded, observations).unwrap())
            .unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn saved_file_is_readable_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    persist::save(&sediment::build().unwrap(), &path).unwrap();

    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(1, doc["format_version"]);
    assert_eq!("Contaminant_Conc", doc["variables"][0]["name"]);
    assert_eq!(serde_json::json!(["Contaminant_Conc", "Bioavailability"]), doc["edges"][0]);
}

#[test]
fn broken_files_leave_the_service_degraded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    fs::write(&path, b"\x80\x81 not a model").unwrap();

    assert!(matches!(persist::load(&path), Err(SedRiskError::ModelUnavailable(_))));

    let svc = Service::load(&path, EngineConfig::default());
    assert!(!svc.status().model_loaded);
    assert!(matches!(svc.handle(&QueryRequest::default()), Err(SedRiskError::ModelUnavailable(_))));

    // repairing the file and reloading recovers
    persist::save(&sediment::build().unwrap(), &path).unwrap();
    let svc = Service::load(&path, EngineConfig::default());
    assert!(svc.status().model_loaded);
    let response = svc.handle(&QueryRequest::default()).unwrap();
    assert_eq!("None", response.prediction);
}
