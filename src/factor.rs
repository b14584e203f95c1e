//! Definition of the factor module
//!
//! A `Factor` represents a relationship between some set of `Variable`s: a dense table holding
//! one non-negative value for every joint assignment of its scope. All operations are pure and
//! return new `Factor`s, so the CPDs of a shared model are never modified by inference.

use crate::util::{Result, SedRiskError};
use crate::variable::{Assignment, Variable};

use itertools::Itertools;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};

/// Alias f64 ndarray::ArrayD as Table
pub type Table = ArrayD<f64>;


#[derive(Clone, Debug, PartialEq)]
pub struct Factor {
    /// The scope of the `Factor`. The order of the `Variable`s is the order of the table axes.
    scope: Vec<Variable>,

    /// The values of the `Factor` table.
    table: Table,
}


impl Factor {

    /// Create a new `Factor`
    ///
    /// # Errors
    /// * `SedRiskError::DimensionMismatch` if the table shape does not match the cardinalities of
    ///   the scope, or a `Variable` appears twice in the scope
    /// * `SedRiskError::InvalidValue` if the table holds a negative or non-finite value
    pub fn new(scope: Vec<Variable>, table: Table) -> Result<Self> {
        let shape: Vec<usize> = scope.iter().map(Variable::cardinality).collect();
        if shape.as_slice() != table.shape() {
            return Err(SedRiskError::DimensionMismatch(format!(
                "scope ({}) has shape {:?} but the table has shape {:?}",
                scope.iter().join(", "), shape, table.shape()
            )));
        }

        if let Some(dup) = scope.iter().map(Variable::name).duplicates().next() {
            return Err(SedRiskError::DimensionMismatch(format!(
                "variable `{}` appears more than once in the scope", dup
            )));
        }

        if let Some(bad) = table.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(SedRiskError::InvalidValue(format!(
                "factor over ({}) contains {}", scope.iter().join(", "), bad
            )));
        }

        Ok(Factor { scope, table })
    }


    /// Create a new `Factor` from values in row-major order (the last `Variable` of the scope
    /// varies fastest).
    pub fn from_vec(scope: Vec<Variable>, values: Vec<f64>) -> Result<Self> {
        let shape: Vec<usize> = scope.iter().map(Variable::cardinality).collect();
        let expected = table_size(&shape)?;
        if values.len() != expected {
            return Err(SedRiskError::DimensionMismatch(format!(
                "scope ({}) needs {} values, got {}",
                scope.iter().join(", "), expected, values.len()
            )));
        }

        let table = Table::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| SedRiskError::DimensionMismatch(e.to_string()))?;

        Factor::new(scope, table)
    }


    /// Get the identity factor: the scalar 1 over the empty scope
    pub fn identity() -> Self {
        Factor {
            scope: vec![],
            table: Table::from_elem(IxDyn(&[]), 1.0),
        }
    }


    /// Check if the `Factor` is the identity `Factor`
    pub fn is_identity(&self) -> bool {
        self.scope.is_empty() && self.table.iter().all(|&v| v == 1.0)
    }


    /// Retrieve the scope of the `Factor`.
    pub fn scope(&self) -> &[Variable] {
        &self.scope
    }


    /// Retrieve the table of the `Factor`.
    pub fn table(&self) -> &Table {
        &self.table
    }


    /// The number of entries in the table
    pub fn len(&self) -> usize {
        self.table.len()
    }


    /// `true` if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }


    /// The sum of every entry of the table
    pub fn sum(&self) -> f64 {
        self.table.sum()
    }


    /// The position of the `Variable` named `name` in the scope
    pub fn position(&self, name: &str) -> Option<usize> {
        self.scope.iter().position(|v| v.name() == name)
    }


    /// Check if the `Variable` named `name` is in the scope
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }


    /// Retrieve the value for a complete assignment over the scope of this `Factor`
    ///
    /// # Args
    /// * `assignment`: a full assignment to the scope of a `Factor`. The assignment's scope may
    ///   be a superset of the `Factor`s scope.
    ///
    /// # Errors
    /// * `SedRiskError::IncompleteAssignment` if a scope `Variable` is unassigned
    /// * `SedRiskError::InvalidState` if an assigned state is out of range
    pub fn value(&self, assignment: &Assignment) -> Result<f64> {
        let mut idx = Vec::with_capacity(self.scope.len());
        for v in self.scope.iter() {
            let state = assignment
                .get(v)
                .ok_or_else(|| SedRiskError::IncompleteAssignment(String::from(v.name())))?;
            v.check_state(state)?;
            idx.push(state);
        }

        Ok(self.table[IxDyn(&idx)])
    }


    /// Product of this `Factor` and another `Factor`.
    ///
    /// Defined in Koller & Friedman Section 4.2.1. The scopes may overlap or be disjoint. The
    /// resulting scope is the scope of `self` followed by the `Variable`s of `other` that are not
    /// already present.
    ///
    /// # Errors
    /// * `SedRiskError::DimensionMismatch` if a shared `Variable` has a different cardinality in
    ///   the two operands
    /// * `SedRiskError::ResourceExceeded` if the resulting table size is not addressable
    pub fn combine(&self, other: &Factor) -> Result<Factor> {
        let mut scope = self.scope.clone();
        for v in other.scope.iter() {
            match self.position(v.name()) {
                Some(i) if self.scope[i].cardinality() != v.cardinality() => {
                    return Err(SedRiskError::DimensionMismatch(format!(
                        "variable `{}` has {} states in one factor and {} in the other",
                        v.name(), self.scope[i].cardinality(), v.cardinality()
                    )));
                },
                Some(_) => (),
                None => scope.push(v.clone()),
            }
        }

        let shape: Vec<usize> = scope.iter().map(Variable::cardinality).collect();
        table_size(&shape)?;
        let shape = IxDyn(&shape);

        // Psi(X, Y, Z) = phi1(X, Y) * phi2(Y, Z), computed by broadcasting both tables over the
        // union scope. See Koller & Friedman Definition 4.2
        let lhs = self.expand(&scope);
        let rhs = other.expand(&scope);
        let lhs = lhs.broadcast(shape.clone()).ok_or_else(|| broadcast_error(&scope))?;
        let rhs = rhs.broadcast(shape).ok_or_else(|| broadcast_error(&scope))?;

        let table = &lhs * &rhs;
        Ok(Factor { scope, table })
    }


    /// Marginalize the `Factor` over the `Variable` named `name`, summing it out.
    ///
    /// Defined in Koller & Friedman 9.3.1
    ///
    /// # Errors
    /// * `SedRiskError::UnknownVariable` if the `Variable` is not in the scope
    pub fn marginalize(&self, name: &str) -> Result<Factor> {
        let idx = self.position(name)
                      .ok_or_else(|| SedRiskError::UnknownVariable(String::from(name)))?;

        let table = self.table.sum_axis(Axis(idx));
        let scope = self.scope.iter()
                              .filter(|v| v.name() != name)
                              .cloned()
                              .collect();

        Ok(Factor { scope, table })
    }


    /// Reduce the `Factor` to the slice where the `Variable` named `name` takes state `state`.
    /// The `Variable` is removed from the scope.
    ///
    /// Defined in Koller & Friedman 4.2.3
    ///
    /// # Errors
    /// * `SedRiskError::UnknownVariable` if the `Variable` is not in the scope
    /// * `SedRiskError::InvalidState` if `state` is out of range
    pub fn reduce(&self, name: &str, state: usize) -> Result<Factor> {
        let idx = self.position(name)
                      .ok_or_else(|| SedRiskError::UnknownVariable(String::from(name)))?;
        self.scope[idx].check_state(state)?;

        let table = self.table.index_axis(Axis(idx), state).to_owned();
        let scope = self.scope.iter()
                              .filter(|v| v.name() != name)
                              .cloned()
                              .collect();

        Ok(Factor { scope, table })
    }


    /// Reduce the `Factor` by every `Variable` of `assignment` that is in the scope. Assigned
    /// `Variable`s outside of the scope are ignored.
    pub fn reduce_assignment(&self, assignment: &Assignment) -> Result<Factor> {
        let mut reduced = self.clone();
        for (name, state) in assignment.iter() {
            if reduced.contains(name) {
                reduced = reduced.reduce(name, state)?;
            }
        }
        Ok(reduced)
    }


    /// Divide every value by the sum of the table, so that the values sum to 1.
    ///
    /// # Errors
    /// * `SedRiskError::DegenerateDistribution` if the values sum to zero
    pub fn normalize(&self) -> Result<Factor> {
        let z = self.sum();
        if !(z > 0.0) || !z.is_finite() {
            return Err(SedRiskError::DegenerateDistribution);
        }

        Ok(Factor {
            scope: self.scope.clone(),
            table: self.table.mapv(|v| v / z),
        })
    }


    /// The same `Factor` with its axes permuted so the scope follows `order`.
    ///
    /// # Errors
    /// * `SedRiskError::DimensionMismatch` unless `order` names exactly the scope
    pub fn aligned(&self, order: &[&str]) -> Result<Factor> {
        if order.len() != self.scope.len() {
            return Err(SedRiskError::DimensionMismatch(format!(
                "cannot align scope ({}) to ({})", self.scope.iter().join(", "), order.join(", ")
            )));
        }

        let mut axes = Vec::with_capacity(order.len());
        for name in order.iter() {
            match self.position(name) {
                Some(i) if !axes.contains(&i) => axes.push(i),
                _ => return Err(SedRiskError::DimensionMismatch(format!(
                    "cannot align scope ({}) to ({})", self.scope.iter().join(", "), order.join(", ")
                ))),
            }
        }

        let scope = axes.iter().map(|&i| self.scope[i].clone()).collect();
        let table = self.table
                        .view()
                        .permuted_axes(IxDyn(&axes))
                        .as_standard_layout()
                        .into_owned();

        Ok(Factor { scope, table })
    }


    /// A view of the table with its axes arranged in the order of `scope` (a superset of this
    /// factor's scope) and a length-1 axis for every `Variable` it does not contain.
    fn expand(&self, scope: &[Variable]) -> ArrayViewD<'_, f64> {
        let target = |v: &Variable| scope.iter().position(|s| s.name() == v.name());

        let mut axes: Vec<usize> = (0..self.scope.len()).collect();
        axes.sort_by_key(|&a| target(&self.scope[a]));

        let mut view = self.table.view().permuted_axes(IxDyn(&axes));
        for (i, v) in scope.iter().enumerate() {
            if !self.contains(v.name()) {
                view = view.insert_axis(Axis(i));
            }
        }
        view
    }
}


/// The number of entries of a table of the given shape
pub(crate) fn table_size(shape: &[usize]) -> Result<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)).ok_or_else(|| {
        SedRiskError::ResourceExceeded(format!("a table of shape {:?} is not addressable", shape))
    })
}


fn broadcast_error(scope: &[Variable]) -> SedRiskError {
    SedRiskError::DimensionMismatch(format!(
        "cannot broadcast operands over ({})", scope.iter().join(", ")
    ))
}


// Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::all_assignments;
    use ndarray::array;

    fn var(name: &str, card: usize) -> Variable {
        Variable::new(name, (0..card).map(|i| i.to_string())).unwrap()
    }

    fn assn(pairs: &[(&Variable, usize)]) -> Assignment {
        let mut a = Assignment::new();
        for &(v, s) in pairs {
            a.set(v, s);
        }
        a
    }

    #[test]
    fn identity() {
        let f = Factor::identity();
        assert!(f.is_identity());
        assert!(f.scope().is_empty());
        assert_eq!(1, f.len());
        assert_eq!(1.0, f.value(&Assignment::new()).unwrap());
    }

    #[test]
    fn table_factor() {
        let a = var("A", 2);
        let b = var("B", 5);
        let c = var("C", 3);
        let mut table = Table::ones(IxDyn(&[2, 5, 3]));
        table[IxDyn(&[1, 1, 1])] = 5.;

        let f = Factor::new(vec![a.clone(), b.clone(), c.clone()], table).unwrap();
        assert!(!f.is_identity());
        for x in all_assignments(f.scope()) {
            let val = f.value(&x).unwrap();
            if x.get(&a) == Some(1) && x.get(&b) == Some(1) && x.get(&c) == Some(1) {
                assert_eq!(5., val);
            } else {
                assert_eq!(1., val);
            }
        }
    }

    #[test]
    fn table_factor_errs() {
        let a = var("A", 2);
        let b = var("B", 2);

        // mismatched number of dimensions
        let f = Factor::new(vec![a.clone(), b.clone()], Table::ones(IxDyn(&[2, 2, 2])));
        assert!(matches!(f, Err(SedRiskError::DimensionMismatch(_))));

        // wrong cardinality
        let f = Factor::new(vec![a.clone(), b.clone()], Table::ones(IxDyn(&[2, 3])));
        assert!(matches!(f, Err(SedRiskError::DimensionMismatch(_))));

        // repeated variable
        let f = Factor::new(vec![a.clone(), a.clone()], Table::ones(IxDyn(&[2, 2])));
        assert!(matches!(f, Err(SedRiskError::DimensionMismatch(_))));

        // negative value
        let f = Factor::from_vec(vec![a.clone()], vec![0.5, -0.5]);
        assert!(matches!(f, Err(SedRiskError::InvalidValue(_))));

        // NaN
        let f = Factor::from_vec(vec![a.clone()], vec![0.5, std::f64::NAN]);
        assert!(matches!(f, Err(SedRiskError::InvalidValue(_))));

        // wrong number of values
        let f = Factor::from_vec(vec![a, b], vec![0.5, 0.5, 0.5]);
        assert!(matches!(f, Err(SedRiskError::DimensionMismatch(_))));

        // more entries than a usize can count
        let huge: Vec<Variable> = (0..20).map(|i| var(&format!("V{}", i), 10)).collect();
        let f = Factor::from_vec(huge, vec![0.5]);
        assert!(matches!(f, Err(SedRiskError::ResourceExceeded(_))));
    }

    #[test]
    fn value_errs() {
        let a = var("A", 2);
        let b = var("B", 2);
        let f = Factor::from_vec(vec![a.clone(), b.clone()], vec![0., 1., 2., 3.]).unwrap();

        assert_eq!(2., f.value(&assn(&[(&a, 1), (&b, 0)])).unwrap());
        assert_eq!(
            Err(SedRiskError::IncompleteAssignment(String::from("B"))),
            f.value(&assn(&[(&a, 1)]))
        );
        assert!(matches!(
            f.value(&assn(&[(&a, 2), (&b, 0)])),
            Err(SedRiskError::InvalidState { .. })
        ));
    }

    #[test]
    /// Example taken from Koller & Friedman Figure 4.3
    fn combine() {
        let a = var("A", 3);
        let b = var("B", 2);
        let c = var("C", 2);

        let phi1 = Factor::from_vec(vec![a.clone(), b.clone()], vec![0.5, 0.8, 0.1, 0., 0.3, 0.9]).unwrap();
        let phi2 = Factor::from_vec(vec![b.clone(), c.clone()], vec![0.5, 0.7, 0.1, 0.2]).unwrap();

        let phi = phi1.combine(&phi2).unwrap();
        let names: Vec<&str> = phi.scope().iter().map(Variable::name).collect();
        assert_eq!(vec!["A", "B", "C"], names);

        let expected = vec![0.25, 0.35, 0.08, 0.16, 0.05, 0.07, 0., 0., 0.15, 0.21, 0.09, 0.18];
        for (x, e) in all_assignments(phi.scope()).zip(expected) {
            assert!((e - phi.value(&x).unwrap()).abs() < 1e-12);
        }
    }

    #[test]
    fn combine_reversed_scope() {
        // the shared variable sits on different axes in the two operands
        let a = var("A", 3);
        let b = var("B", 2);
        let c = var("C", 2);

        let phi1 = Factor::from_vec(vec![a.clone(), b.clone()], vec![0.5, 0.8, 0.1, 0., 0.3, 0.9]).unwrap();
        let phi2 = Factor::from_vec(vec![c.clone(), b.clone()], vec![0.5, 0.1, 0.7, 0.2]).unwrap();

        let phi = phi2.combine(&phi1).unwrap();
        let names: Vec<&str> = phi.scope().iter().map(Variable::name).collect();
        assert_eq!(vec!["C", "B", "A"], names);

        for x in all_assignments(phi.scope()) {
            let expected = phi1.value(&x).unwrap() * phi2.value(&x).unwrap();
            assert!((expected - phi.value(&x).unwrap()).abs() < 1e-12);
        }
    }

    #[test]
    fn combine_disjoint_and_scalar() {
        let a = var("A", 2);
        let b = var("B", 3);

        let phi1 = Factor::from_vec(vec![a.clone()], vec![0.25, 0.75]).unwrap();
        let phi2 = Factor::from_vec(vec![b.clone()], vec![1., 2., 3.]).unwrap();

        let phi = phi1.combine(&phi2).unwrap();
        assert_eq!(6, phi.len());
        assert_eq!(0.75 * 3., phi.value(&assn(&[(&a, 1), (&b, 2)])).unwrap());

        let scalar = Factor::from_vec(vec![], vec![0.5]).unwrap();
        let scaled = scalar.combine(&phi1).unwrap();
        assert_eq!(vec![a.clone()], scaled.scope().to_vec());
        assert_eq!(0.375, scaled.value(&assn(&[(&a, 1)])).unwrap());

        let same = Factor::identity().combine(&phi1).unwrap();
        assert_eq!(phi1, same);
    }

    #[test]
    fn combine_commutes_and_associates() {
        let a = var("A", 2);
        let b = var("B", 3);
        let c = var("C", 2);

        let phi1 = Factor::from_vec(vec![a.clone(), b.clone()], vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap();
        let phi2 = Factor::from_vec(vec![b.clone(), c.clone()], vec![1., 2., 3., 4., 5., 6.]).unwrap();
        let phi3 = Factor::from_vec(vec![c.clone(), a.clone()], vec![0.25, 0.5, 0.75, 1.]).unwrap();

        let left = phi1.combine(&phi2).unwrap().combine(&phi3).unwrap();
        let right = phi1.combine(&phi2.combine(&phi3).unwrap()).unwrap();
        let swapped = phi3.combine(&phi2).unwrap().combine(&phi1).unwrap();

        for x in all_assignments(left.scope()) {
            let expected = left.value(&x).unwrap();
            assert!((expected - right.value(&x).unwrap()).abs() < 1e-12);
            assert!((expected - swapped.value(&x).unwrap()).abs() < 1e-12);
        }
        assert_eq!(left.scope(), swapped.aligned(&["A", "B", "C"]).unwrap().scope());
    }

    #[test]
    fn combine_mismatch() {
        let phi1 = Factor::from_vec(vec![var("A", 2)], vec![0.5, 0.5]).unwrap();
        let phi2 = Factor::from_vec(vec![var("A", 3)], vec![0.2, 0.3, 0.5]).unwrap();
        assert!(matches!(phi1.combine(&phi2), Err(SedRiskError::DimensionMismatch(_))));
    }

    #[test]
    fn combine_does_not_modify_inputs() {
        let a = var("A", 2);
        let b = var("B", 2);
        let phi1 = Factor::from_vec(vec![a.clone()], vec![0.25, 0.75]).unwrap();
        let phi2 = Factor::from_vec(vec![a, b], vec![1., 2., 3., 4.]).unwrap();
        let before = (phi1.clone(), phi2.clone());

        let _ = phi1.combine(&phi2).unwrap();
        assert_eq!(before, (phi1, phi2));
    }

    #[test]
    /// Example take from Koller & Friedman Figure 4.5
    fn reduce_simple() {
        let a = var("A", 3);
        let b = var("B", 2);
        let c = var("C", 2);

        let phi = Factor::from_vec(
            vec![a.clone(), b.clone(), c.clone()],
            vec![0.25, 0.35, 0.08, 0.16, 0.05, 0.07, 0., 0., 0.15, 0.21, 0.09, 0.18]
        ).unwrap();

        let reduced = phi.reduce("C", 0).unwrap();
        assert_eq!(vec![a.clone(), b.clone()], reduced.scope().to_vec());
        assert_eq!(&array![[0.25, 0.08], [0.05, 0.], [0.15, 0.09]].into_dyn(), reduced.table());
    }

    #[test]
    fn reduce_multiple() {
        let a = var("A", 3);
        let b = var("B", 2);
        let c = var("C", 2);

        let phi = Factor::from_vec(
            vec![a.clone(), b.clone(), c.clone()],
            vec![0.25, 0.35, 0.08, 0.16, 0.05, 0.07, 0., 0., 0.15, 0.21, 0.09, 0.18]
        ).unwrap();

        let reduced = phi.reduce_assignment(&assn(&[(&c, 0), (&a, 2)])).unwrap();
        assert_eq!(vec![b.clone()], reduced.scope().to_vec());
        assert_eq!(&array![0.15, 0.09].into_dyn(), reduced.table());

        // reducing every variable leaves a scalar
        let scalar = reduced.reduce("B", 1).unwrap();
        assert!(scalar.scope().is_empty());
        assert_eq!(0.09, scalar.sum());
    }

    #[test]
    fn reduce_errs() {
        let phi = Factor::from_vec(vec![var("A", 2)], vec![0.5, 0.5]).unwrap();
        assert_eq!(
            Err(SedRiskError::UnknownVariable(String::from("B"))),
            phi.reduce("B", 0)
        );
        assert!(matches!(phi.reduce("A", 2), Err(SedRiskError::InvalidState { .. })));
    }

    #[test]
    /// Example taken from Koller & Friedman Figure 9.7
    fn marginalize() {
        let a = var("A", 3);
        let b = var("B", 2);
        let c = var("C", 2);

        let phi = Factor::from_vec(
            vec![a.clone(), b.clone(), c.clone()],
            vec![0.25, 0.35, 0.08, 0.16, 0.05, 0.07, 0., 0., 0.15, 0.21, 0.09, 0.18]
        ).unwrap();

        let marginalized = phi.marginalize("B").unwrap();
        assert_eq!(vec![a.clone(), c.clone()], marginalized.scope().to_vec());

        let expected = array![[0.33, 0.51], [0.05, 0.07], [0.24, 0.39]].into_dyn();
        for (got, want) in marginalized.table().iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-12);
        }

        // total mass is conserved
        assert!((phi.sum() - marginalized.sum()).abs() < 1e-12);

        assert_eq!(
            Err(SedRiskError::UnknownVariable(String::from("D"))),
            phi.marginalize("D")
        );
    }

    #[test]
    fn normalize() {
        let a = var("A", 4);
        let phi = Factor::from_vec(vec![a.clone()], vec![1., 2., 3., 4.]).unwrap();
        let norm = phi.normalize().unwrap();
        assert!((norm.sum() - 1.0).abs() < 1e-12);
        assert_eq!(0.4, norm.value(&assn(&[(&a, 3)])).unwrap());

        let zero = Factor::from_vec(vec![a], vec![0.; 4]).unwrap();
        assert_eq!(Err(SedRiskError::DegenerateDistribution), zero.normalize());
    }

    #[test]
    fn aligned() {
        let a = var("A", 3);
        let b = var("B", 2);
        let phi = Factor::from_vec(vec![a.clone(), b.clone()], vec![1., 2., 3., 4., 5., 6.]).unwrap();

        let flipped = phi.aligned(&["B", "A"]).unwrap();
        assert_eq!(vec![b.clone(), a.clone()], flipped.scope().to_vec());
        assert_eq!(&array![[1., 3., 5.], [2., 4., 6.]].into_dyn(), flipped.table());
        for x in all_assignments(phi.scope()) {
            assert_eq!(phi.value(&x).unwrap(), flipped.value(&x).unwrap());
        }

        assert!(phi.aligned(&["A"]).is_err());
        assert!(phi.aligned(&["A", "A"]).is_err());
        assert!(phi.aligned(&["A", "C"]).is_err());
    }
}
