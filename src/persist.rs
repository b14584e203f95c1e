//! Saving and loading `DirectedModel`s as JSON documents.
//!
//! A document lists the variables with their states, the edges, and every CPD in the layout
//! accepted by `Cpd::new`. Loading rebuilds the model through `DirectedModelBuilder`, so a loaded
//! model has passed `check_model`. Every failure to produce a model is reported as
//! `SedRiskError::ModelUnavailable`.

use crate::cpd::Cpd;
use crate::model::{DirectedModel, DirectedModelBuilder};
use crate::util::{Result, SedRiskError};
use crate::variable::Variable;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// The document layout written by this version
pub const FORMAT_VERSION: u32 = 1;


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    pub format_version: u32,
    pub variables: Vec<VariableDocument>,
    /// `(from, to)` pairs
    pub edges: Vec<(String, String)>,
    pub cpds: Vec<CpdDocument>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableDocument {
    pub name: String,
    pub states: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CpdDocument {
    pub variable: String,
    pub parents: Vec<String>,
    /// `values[child_state][parent assignment]`, right-most parent varying fastest
    pub values: Vec<Vec<f64>>,
}


/// Describe a validated model as a document.
///
/// # Errors
/// * `SedRiskError::StructuralMismatch` if the model is not validated
pub fn to_document(model: &DirectedModel) -> Result<ModelDocument> {
    model.ensure_validated()?;

    let variables = model.variables()
                         .map(|v| VariableDocument {
                             name: String::from(v.name()),
                             states: v.states().to_vec(),
                         })
                         .collect();

    let edges = model.edges()
                     .into_iter()
                     .map(|(from, to)| (String::from(from), String::from(to)))
                     .collect();

    let cpds = model.cpds()
                    .map(|cpd| CpdDocument {
                        variable: String::from(cpd.variable().name()),
                        parents: cpd.parents().iter().map(|p| String::from(p.name())).collect(),
                        values: cpd.values(),
                    })
                    .collect();

    Ok(ModelDocument { format_version: FORMAT_VERSION, variables, edges, cpds })
}


/// Rebuild and validate the model described by `doc`.
///
/// # Errors
/// * `SedRiskError::ModelUnavailable` if the format version is unknown or the document does not
///   describe a valid model
pub fn from_document(doc: &ModelDocument) -> Result<DirectedModel> {
    if doc.format_version != FORMAT_VERSION {
        return Err(SedRiskError::ModelUnavailable(format!(
            "unsupported format version {} (expected {})", doc.format_version, FORMAT_VERSION
        )));
    }

    build(doc).map_err(|e| SedRiskError::ModelUnavailable(format!("invalid model document: {}", e)))
}


/// Write `model` to `path` as pretty-printed JSON.
///
/// The document is written to a temporary file next to `path` and renamed into place, so an
/// existing model at `path` is either replaced whole or left untouched.
///
/// # Errors
/// * `SedRiskError::StructuralMismatch` if the model is not validated
/// * `SedRiskError::ModelUnavailable` if the file cannot be written
pub fn save<P: AsRef<Path>>(model: &DirectedModel, path: P) -> Result<()> {
    let path = path.as_ref();
    let doc = to_document(model)?;

    let unavailable = |e: &dyn std::fmt::Display| {
        SedRiskError::ModelUnavailable(format!("cannot write {}: {}", path.display(), e))
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| unavailable(&e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, &doc).map_err(|e| unavailable(&e))?;
        writer.flush().map_err(|e| unavailable(&e))?;
    }
    tmp.persist(path).map_err(|e| unavailable(&e.error))?;

    info!(path = %path.display(), variables = doc.variables.len(), "saved model");
    Ok(())
}


/// Read and validate the model stored at `path`.
///
/// # Errors
/// * `SedRiskError::ModelUnavailable` if the file is missing, unreadable, not a model document,
///   or describes an invalid model
pub fn load<P: AsRef<Path>>(path: P) -> Result<DirectedModel> {
    let path = path.as_ref();
    let res = read(path);

    match &res {
        Ok(model) => info!(
            path = %path.display(),
            variables = model.num_variables(),
            edges = model.edges().len(),
            "loaded model"
        ),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to load model"),
    }

    res
}


fn read(path: &Path) -> Result<DirectedModel> {
    let doc: ModelDocument = {
        let file = File::open(path).map_err(|e| SedRiskError::ModelUnavailable(
            format!("cannot open {}: {}", path.display(), e)
        ))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| SedRiskError::ModelUnavailable(
            format!("cannot parse {}: {}", path.display(), e)
        ))?
    };

    from_document(&doc)
}


fn build(doc: &ModelDocument) -> Result<DirectedModel> {
    let mut vars: IndexMap<&str, Variable> = IndexMap::new();
    for v in doc.variables.iter() {
        let var = Variable::new(v.name.as_str(), v.states.iter())?;
        if vars.insert(v.name.as_str(), var).is_some() {
            return Err(SedRiskError::StructuralMismatch(format!(
                "variable `{}` is declared more than once", v.name
            )));
        }
    }

    let lookup = |name: &str| -> Result<Variable> {
        vars.get(name).cloned().ok_or_else(|| SedRiskError::StructuralMismatch(format!(
            "the document has no variable `{}`", name
        )))
    };

    let mut builder = vars.values().cloned().fold(DirectedModelBuilder::new(), |b, v| b.with_variable(v));
    builder = builder.with_edges(doc.edges.iter().map(|(from, to)| (from.as_str(), to.as_str())));

    for cpd in doc.cpds.iter() {
        let parents = cpd.parents.iter().map(|p| lookup(p.as_str())).collect::<Result<Vec<_>>>()?;
        builder = builder.with_cpd(Cpd::new(lookup(cpd.variable.as_str())?, parents, cpd.values.clone())?);
    }

    builder.build()
}
