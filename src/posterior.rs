//! Query results: the normalized `Posterior` over the query variables, and per-variable
//! `Marginal`s with argmax extraction.

use crate::factor::Factor;
use crate::util::{Result, SedRiskError};
use crate::variable::{all_assignments, Assignment, Variable};

use indexmap::IndexMap;
use itertools::Itertools;
use serde::ser::{Serialize, SerializeMap, Serializer};

use std::fmt;


/// The joint posterior distribution over the query `Variable`s. Values sum to 1.
#[derive(Clone, Debug, PartialEq)]
pub struct Posterior {
    factor: Factor,
}

impl Posterior {

    /// Wrap a normalized `Factor`
    pub(crate) fn new(factor: Factor) -> Self {
        Posterior { factor }
    }


    /// The query `Variable`s, in query order
    pub fn variables(&self) -> &[Variable] {
        self.factor.scope()
    }


    pub fn factor(&self) -> &Factor {
        &self.factor
    }


    pub fn into_factor(self) -> Factor {
        self.factor
    }


    /// The probability of a complete assignment of state labels to the query `Variable`s
    ///
    /// # Errors
    /// * `SedRiskError::IncompleteAssignment` if a query `Variable` is not given a label
    /// * `SedRiskError::InvalidState` if a label is unknown
    pub fn probability(&self, labels: &[(&str, &str)]) -> Result<f64> {
        let mut assignment = Assignment::new();
        for v in self.variables() {
            let label = labels.iter()
                              .find(|(name, _)| *name == v.name())
                              .map(|&(_, label)| label)
                              .ok_or_else(|| SedRiskError::IncompleteAssignment(String::from(v.name())))?;
            assignment.set(v, v.state_index(label)?);
        }
        self.factor.value(&assignment)
    }


    /// The marginal distribution of one query `Variable`
    pub fn marginal(&self, name: &str) -> Result<Marginal> {
        let var = self.variables()
                      .iter()
                      .find(|v| v.name() == name)
                      .ok_or_else(|| SedRiskError::UnknownVariable(String::from(name)))?;

        let mut factor = self.factor.clone();
        for other in self.variables().iter().filter(|v| v.name() != name) {
            factor = factor.marginalize(other.name())?;
        }

        Ok(Marginal {
            variable: var.clone(),
            probabilities: factor.table().iter().cloned().collect(),
        })
    }


    /// The marginal of every query `Variable`, in query order
    pub fn marginals(&self) -> Result<Vec<Marginal>> {
        self.variables().iter().map(|v| self.marginal(v.name())).collect()
    }


    /// For a posterior over a single `Variable`: the most probable state and its probability.
    /// Ties go to the state declared first.
    ///
    /// # Errors
    /// * `SedRiskError::DimensionMismatch` if the posterior is over more than one `Variable`
    pub fn argmax_state(&self) -> Result<(&str, f64)> {
        match self.variables() {
            [var] => {
                let (idx, p) = first_max(self.factor.table().iter().cloned());
                Ok((var.state(idx).unwrap_or_default(), p))
            },
            vars => Err(SedRiskError::DimensionMismatch(format!(
                "argmax_state needs a posterior over one variable, this one covers ({})",
                vars.iter().join(", ")
            ))),
        }
    }


    /// The most probable joint assignment (as state labels, in query order) and its
    /// probability. Ties go to the assignment that comes first in row-major order.
    pub fn argmax(&self) -> (Vec<&str>, f64) {
        let (idx, p) = first_max(self.factor.table().iter().cloned());
        let labels = self.iter()
                         .nth(idx)
                         .map(|(labels, _)| labels)
                         .unwrap_or_default();
        (labels, p)
    }


    /// Iterate over `(state labels, probability)` in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (Vec<&str>, f64)> + '_ {
        let vars = self.variables();
        all_assignments(vars).zip(self.factor.table().iter().cloned()).map(move |(assn, p)| {
            let labels = vars.iter()
                             .map(|v| assn.get(v).and_then(|s| v.state(s)).unwrap_or("?"))
                             .collect();
            (labels, p)
        })
    }
}

impl fmt::Display for Posterior {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut header: Vec<String> = self.variables().iter().map(|v| v.name().to_string()).collect();
        header.push(format!("phi({})", self.variables().iter().join(",")));

        let rows = self.iter().map(|(labels, p)| {
            let mut row: Vec<String> = self.variables()
                                           .iter()
                                           .zip(labels)
                                           .map(|(v, l)| format!("{}({})", v.name(), l))
                                           .collect();
            row.push(format!("{:.4}", p));
            row
        }).collect();

        render_table(f, header, rows)
    }
}


/// The posterior distribution of a single `Variable`
#[derive(Clone, Debug, PartialEq)]
pub struct Marginal {
    variable: Variable,
    probabilities: Vec<f64>,
}

impl Marginal {

    pub fn variable(&self) -> &Variable {
        &self.variable
    }


    /// Probabilities in the declared state order
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }


    /// The probability of the state labelled `label`
    pub fn get(&self, label: &str) -> Option<f64> {
        self.variable.state_index(label).ok().map(|i| self.probabilities[i])
    }


    /// The most probable state and its probability. Ties go to the state declared first.
    pub fn argmax_state(&self) -> (&str, f64) {
        let (idx, p) = first_max(self.probabilities.iter().cloned());
        (self.variable.state(idx).unwrap_or_default(), p)
    }


    /// Iterate over `(state label, probability)` in declared order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.variable.states().iter().map(String::as_str).zip(self.probabilities.iter().cloned())
    }


    pub fn to_map(&self) -> IndexMap<String, f64> {
        self.iter().map(|(l, p)| (String::from(l), p)).collect()
    }
}

impl Serialize for Marginal {

    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.probabilities.len()))?;
        for (label, p) in self.iter() {
            map.serialize_entry(label, &p)?;
        }
        map.end()
    }
}

impl fmt::Display for Marginal {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = self.variable.name();
        let header = vec![String::from(name), format!("phi({})", name)];
        let rows = self.iter()
                       .map(|(l, p)| vec![format!("{}({})", name, l), format!("{:.4}", p)])
                       .collect();
        render_table(f, header, rows)
    }
}


/// Index and value of the first maximum
fn first_max<I: Iterator<Item = f64>>(values: I) -> (usize, f64) {
    values.enumerate().fold((0, std::f64::NEG_INFINITY), |best, (i, p)| {
        if p > best.1 { (i, p) } else { best }
    })
}


/// Render a bordered table. The last column is right-aligned.
fn render_table(f: &mut fmt::Formatter, header: Vec<String>, rows: Vec<Vec<String>>) -> fmt::Result {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows.iter() {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }

    let rule = |c: char| -> String {
        let inner = widths.iter().map(|&w| c.to_string().repeat(w + 2)).join("+");
        format!("+{}+", inner)
    };
    let line = |cells: &[String]| -> String {
        let last = cells.len() - 1;
        let inner = cells.iter().zip(widths.iter()).enumerate().map(|(i, (cell, &w))| {
            if i == last {
                format!(" {:>w$} ", cell, w = w)
            } else {
                format!(" {:<w$} ", cell, w = w)
            }
        }).join("|");
        format!("|{}|", inner)
    };

    writeln!(f, "{}", rule('-'))?;
    writeln!(f, "{}", line(&header))?;
    writeln!(f, "{}", rule('='))?;
    for row in rows.iter() {
        writeln!(f, "{}", line(row))?;
        writeln!(f, "{}", rule('-'))?;
    }
    Ok(())
}
