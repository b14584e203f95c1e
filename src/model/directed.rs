//! Defines a `DirectedModel`, which is a Bayesian model that represents the factorization of
//! a probability distribution P

use crate::cpd::Cpd;
use crate::util::{Result, SedRiskError};
use crate::variable::{Assignment, Variable};

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use tracing::{debug, info};


/// A node of the graph: a `Variable`, the names of its parents (in edge insertion order) and its
/// CPD, once attached.
#[derive(Clone, Debug)]
struct Node {
    variable: Variable,
    parents: Vec<String>,
    cpd: Option<Cpd>,
}


/// Represents a Bayesian Network - a Directed Probabilistic Graphical Model.
///
/// # Representation
/// The network is a Directed Acyclic Graph (DAG) held as an insertion-ordered map from variable
/// name to node. Each node records its parents, so the edges `P -> X` are exactly the parents of
/// every `X`. The insertion order is used to break ties whenever an ordering of the `Variable`s
/// is needed, which keeps every derived order deterministic.
///
/// # Lifecycle
/// A model is assembled with `add_variable`, `add_edge` and `add_cpd` (or with a
/// `DirectedModelBuilder`) and must then pass `check_model`. Any mutation clears the validation
/// mark. Once validated, a model is only read, and may be shared freely between threads.
#[derive(Clone, Debug, Default)]
pub struct DirectedModel {

    /// The nodes of the graph, keyed by `Variable` name
    nodes: IndexMap<String, Node>,

    /// `true` once `check_model` succeeded, until the next mutation
    validated: bool,
}

impl DirectedModel {

    /// Construct an empty `DirectedModel`
    pub fn new() -> Self {
        DirectedModel::default()
    }


    /// Add a `Variable` to the graph.
    ///
    /// # Errors
    /// * `SedRiskError::StructuralMismatch` if a `Variable` of the same name already exists
    pub fn add_variable(&mut self, variable: Variable) -> Result<()> {
        if self.nodes.contains_key(variable.name()) {
            return Err(SedRiskError::StructuralMismatch(format!(
                "variable `{}` is already in the model", variable.name()
            )));
        }

        self.validated = false;
        self.nodes.insert(
            String::from(variable.name()),
            Node { variable, parents: vec![], cpd: None }
        );
        Ok(())
    }


    /// Add the directed edge `from -> to`.
    ///
    /// # Errors
    /// * `SedRiskError::StructuralMismatch` if either end is unknown, the edge already exists,
    ///   `to` already has a CPD attached, or the edge would close a cycle
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<()> {
        for name in [from, to].iter() {
            if !self.nodes.contains_key(*name) {
                return Err(SedRiskError::StructuralMismatch(format!(
                    "edge {} -> {} references unknown variable `{}`", from, to, name
                )));
            }
        }

        if self.nodes[to].parents.iter().any(|p| p == from) {
            return Err(SedRiskError::StructuralMismatch(format!(
                "edge {} -> {} already exists", from, to
            )));
        }

        if self.nodes[to].cpd.is_some() {
            return Err(SedRiskError::StructuralMismatch(format!(
                "cannot add edge {} -> {}: a CPD is already attached to `{}`", from, to, to
            )));
        }

        if self.ancestors(&[from])?.contains(to) {
            return Err(SedRiskError::StructuralMismatch(format!(
                "edge {} -> {} would create a cycle", from, to
            )));
        }

        self.validated = false;
        if let Some(node) = self.nodes.get_mut(to) {
            node.parents.push(String::from(from));
        }
        Ok(())
    }


    /// Attach a CPD to the node of its child `Variable`.
    ///
    /// # Errors
    /// * `SedRiskError::StructuralMismatch` if the node does not exist, already has a CPD, or
    ///   the CPD's parents are not exactly the node's parents in the graph
    pub fn add_cpd(&mut self, cpd: Cpd) -> Result<()> {
        self.check_cpd_structure(&cpd)?;

        let name = cpd.variable().name();
        if self.nodes[name].cpd.is_some() {
            return Err(SedRiskError::StructuralMismatch(format!(
                "a CPD is already attached to `{}`", name
            )));
        }

        self.validated = false;
        if let Some(node) = self.nodes.get_mut(name) {
            node.cpd = Some(cpd);
        }
        Ok(())
    }


    /// Validate the model: every node has a CPD whose parents match the graph, every CPD is a
    /// proper distribution for each parent assignment, and the graph is acyclic. This is the
    /// single validation gate; inference relies on it and never re-validates.
    pub fn check_model(&mut self) -> Result<()> {
        self.validated = false;

        for node in self.nodes.values() {
            let cpd = node.cpd.as_ref().ok_or_else(|| SedRiskError::StructuralMismatch(
                format!("no CPD is attached to `{}`", node.variable.name())
            ))?;

            self.check_cpd_structure(cpd)?;
            cpd.validate()?;
        }

        let order = self.topological_order()?;
        debug!(order = %order.iter().join(", "), "topological order");

        self.validated = true;
        info!(variables = self.nodes.len(), edges = self.edges().len(), "model passed validation");
        Ok(())
    }


    /// `true` if the model passed `check_model` and has not been modified since
    pub fn is_validated(&self) -> bool {
        self.validated
    }


    /// Fail with `StructuralMismatch` unless the model is validated
    pub fn ensure_validated(&self) -> Result<()> {
        if self.validated {
            Ok(())
        } else {
            Err(SedRiskError::StructuralMismatch(
                String::from("the model has not passed check_model")
            ))
        }
    }


    /// Lookup a `Variable` in the `DirectedModel` based on the name
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.nodes.get(name).map(|n| &n.variable)
    }


    /// Lookup a `Variable`, failing with `UnknownVariable` if it is not in the model
    pub fn require(&self, name: &str) -> Result<&Variable> {
        self.variable(name).ok_or_else(|| SedRiskError::UnknownVariable(String::from(name)))
    }


    /// Get all `Variable`s in the model, in insertion order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.nodes.values().map(|n| &n.variable)
    }


    /// Get the number of `Variable`s in the the `DirectedModel`
    pub fn num_variables(&self) -> usize {
        self.nodes.len()
    }


    /// The parents of `name`, in edge insertion order
    pub fn parents(&self, name: &str) -> Result<Vec<&Variable>> {
        let node = self.node(name)?;
        Ok(node.parents.iter().map(|p| &self.nodes[p.as_str()].variable).collect())
    }


    /// The children of `name`, in insertion order
    pub fn children(&self, name: &str) -> Result<Vec<&Variable>> {
        self.node(name)?;
        Ok(self.nodes
               .values()
               .filter(|n| n.parents.iter().any(|p| p == name))
               .map(|n| &n.variable)
               .collect())
    }


    /// All edges `(from, to)` of the graph
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.nodes
            .values()
            .flat_map(|n| n.parents.iter().map(move |p| (p.as_str(), n.variable.name())))
            .collect()
    }


    /// Get the CPD for the given variable in this model.
    pub fn cpd(&self, name: &str) -> Option<&Cpd> {
        self.nodes.get(name).and_then(|n| n.cpd.as_ref())
    }


    /// All attached CPDs, in insertion order of their `Variable`s
    pub fn cpds(&self) -> impl Iterator<Item = &Cpd> {
        self.nodes.values().filter_map(|n| n.cpd.as_ref())
    }


    /// A topological order of the `Variable`s: every parent precedes its children. Among the
    /// `Variable`s that are ready at each step, the earliest inserted is taken first, so the order
    /// is fully determined by the construction sequence.
    ///
    /// # Errors
    /// * `SedRiskError::StructuralMismatch` if the graph contains a cycle
    pub fn topological_order(&self) -> Result<Vec<&Variable>> {
        let n = self.nodes.len();
        let mut pending: Vec<usize> = self.nodes.values().map(|n| n.parents.len()).collect();
        let mut emitted = vec![false; n];
        let mut order = Vec::with_capacity(n);

        while order.len() < n {
            let next = (0..n)
                .find(|&i| !emitted[i] && pending[i] == 0)
                .ok_or_else(|| SedRiskError::StructuralMismatch(
                    String::from("the graph contains a cycle")
                ))?;

            emitted[next] = true;
            let var = &self.nodes[next].variable;
            for (i, node) in self.nodes.values().enumerate() {
                pending[i] -= node.parents.iter().filter(|p| p.as_str() == var.name()).count();
            }
            order.push(var);
        }

        Ok(order)
    }


    /// The names of `names` and of all their ancestors.
    ///
    /// # Errors
    /// * `SedRiskError::UnknownVariable` if a name is not in the model
    pub fn ancestors(&self, names: &[&str]) -> Result<IndexSet<String>> {
        let mut seen = IndexSet::new();
        let mut stack: Vec<&str> = Vec::new();

        for &name in names.iter() {
            self.node(name)?;
            stack.push(name);
        }

        while let Some(name) = stack.pop() {
            if seen.insert(String::from(name)) {
                stack.extend(self.nodes[name].parents.iter().map(String::as_str));
            }
        }

        Ok(seen)
    }


    /// Determine the probability of a full `Assignment` to the `Variable`s in the `DirectedModel`.
    ///
    /// Specifically, this computes ```P(zeta)```, where ```zeta``` is a full assignment, by the
    /// chain rule over the CPDs.
    ///
    /// # Errors
    /// * `SedRiskError::StructuralMismatch` if the model is not validated
    /// * `SedRiskError::IncompleteAssignment` if a `Variable` is unassigned
    pub fn probability(&self, assignment: &Assignment) -> Result<f64> {
        self.ensure_validated()?;
        self.cpds()
            .map(|cpd| cpd.factor().value(assignment))
            .fold_ok(1.0, |p, v| p * v)
    }


    fn node(&self, name: &str) -> Result<&Node> {
        self.nodes.get(name).ok_or_else(|| SedRiskError::UnknownVariable(String::from(name)))
    }


    /// Check that `cpd` fits the graph: its child is a node, and its parents are exactly the
    /// node's parents with the same state spaces.
    fn check_cpd_structure(&self, cpd: &Cpd) -> Result<()> {
        let name = cpd.variable().name();
        let node = self.nodes.get(name).ok_or_else(|| SedRiskError::StructuralMismatch(
            format!("the model has no variable `{}` for this CPD", name)
        ))?;

        if node.variable != *cpd.variable() {
            return Err(SedRiskError::StructuralMismatch(format!(
                "CPD declares states ({}) for `{}` but the model declares ({})",
                cpd.variable().states().join(", "), name, node.variable.states().join(", ")
            )));
        }

        let same_parents = cpd.parents().len() == node.parents.len()
            && cpd.parents().iter().all(|p| node.parents.iter().any(|q| q == p.name()));
        if !same_parents {
            return Err(SedRiskError::StructuralMismatch(format!(
                "CPD for `{}` is conditioned on ({}) but its parents in the graph are ({})",
                name, cpd.parents().iter().join(", "), node.parents.join(", ")
            )));
        }

        for p in cpd.parents() {
            if self.nodes[p.name()].variable != *p {
                return Err(SedRiskError::StructuralMismatch(format!(
                    "CPD for `{}` declares different states for parent `{}` than the model",
                    name, p.name()
                )));
            }
        }

        Ok(())
    }
}


/// An implementation of the [builder pattern] for creating a `DirectedModel`.
///
/// The first error encountered is recorded and returned by `build`; later calls are ignored.
/// `build` runs `check_model`, so a built model is always validated.
///
/// [builder pattern]: https://en.wikipedia.org/wiki/Builder_pattern
#[derive(Default)]
pub struct DirectedModelBuilder {

    /// The model under construction
    model: DirectedModel,

    /// The error state of the builder
    err: Option<SedRiskError>
}


impl DirectedModelBuilder {

    /// Construct a new `DirectedModelBuilder` representing an empty `DirectedModel`
    pub fn new() -> Self {
        DirectedModelBuilder::default()
    }


    /// Add a `Variable` to the model.
    pub fn with_variable(self, var: Variable) -> Self {
        self.apply(|m| m.add_variable(var))
    }


    /// Add the edge `from -> to`. Both `Variable`s must already be in the model.
    pub fn with_edge(self, from: &str, to: &str) -> Self {
        self.apply(|m| m.add_edge(from, to))
    }


    /// Add several edges, in order.
    pub fn with_edges<'a, I>(self, edges: I) -> Self
        where I: IntoIterator<Item = (&'a str, &'a str)>
    {
        edges.into_iter().fold(self, |b, (from, to)| b.with_edge(from, to))
    }


    /// Attach a CPD. The edges into its `Variable` must already be in the model.
    pub fn with_cpd(self, cpd: Cpd) -> Self {
        self.apply(|m| m.add_cpd(cpd))
    }


    /// Complete building the model.
    ///
    /// # Returns
    /// the validated `DirectedModel`, or the first error generated during the building process
    pub fn build(self) -> Result<DirectedModel> {
        if let Some(e) = self.err {
            return Err(e);
        }

        let mut model = self.model;
        model.check_model()?;
        Ok(model)
    }


    /// Internal function that applies one step unless the builder is in an error state
    fn apply<F>(mut self, step: F) -> Self
        where F: FnOnce(&mut DirectedModel) -> Result<()>
    {
        if self.err.is_none() {
            if let Err(e) = step(&mut self.model) {
                self.err = Some(e);
            }
        }
        self
    }
}
