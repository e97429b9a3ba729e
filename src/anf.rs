//! Algebraic normal forms: polynomials over GF(2) with set-valued monomials.
//!
//! A monomial is a set of variables (exponents over GF(2) are 0 or 1), a
//! polynomial is a set of monomials plus a constant term. Addition is the
//! symmetric difference of the monomial sets, multiplication the cartesian
//! product with toggle accumulation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Not};

use fnv::{FnvHashMap, FnvHashSet};

use crate::error::Result;
use crate::expr::{BinaryOp, BitExpr, Expr};
use crate::target::{ReadBit, TargetKind};

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// A product of distinct variables.
#[derive(Clone, Debug)]
pub struct Monomial<V: Clone + Eq + Hash> {
    variables: FnvHashSet<V>,
}

impl<V: Clone + Eq + Hash> Monomial<V> {
    /// The empty product.
    pub fn one() -> Monomial<V> {
        Monomial {
            variables: FnvHashSet::default(),
        }
    }

    pub fn from_variable(variable: V) -> Monomial<V> {
        let mut variables = FnvHashSet::default();
        variables.insert(variable);
        Monomial { variables }
    }

    pub fn from_variables(variables: impl IntoIterator<Item = V>) -> Monomial<V> {
        Monomial {
            variables: variables.into_iter().collect(),
        }
    }

    pub fn degree(&self) -> usize {
        self.variables.len()
    }

    pub fn contains(&self, variable: &V) -> bool {
        self.variables.contains(variable)
    }

    pub fn insert(&mut self, variable: V) {
        self.variables.insert(variable);
    }

    pub fn remove(&mut self, variable: &V) {
        self.variables.remove(variable);
    }

    pub fn variables(&self) -> impl Iterator<Item = &V> {
        self.variables.iter()
    }

    /// Maps every variable through `f`, which also receives the containing
    /// monomial so it can pick a different image for degree-1 contexts.
    pub fn translate<U, F>(&self, f: &mut F) -> Monomial<U>
    where
        U: Clone + Eq + Hash,
        F: FnMut(&V, &Monomial<V>) -> U,
    {
        Monomial {
            variables: self.variables.iter().map(|v| f(v, self)).collect(),
        }
    }
}

impl<V: Clone + Eq + Hash> PartialEq for Monomial<V> {
    fn eq(&self, other: &Monomial<V>) -> bool {
        self.variables == other.variables
    }
}

impl<V: Clone + Eq + Hash> Eq for Monomial<V> {}

impl<V: Clone + Eq + Hash> Hash for Monomial<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Order-independent fold so set semantics carry over to hashing.
        let mut acc = 0u64;
        for variable in &self.variables {
            acc ^= hash_of(variable);
        }
        state.write_u64(acc);
        state.write_usize(self.variables.len());
    }
}

impl<V: Clone + Eq + Hash> Mul for Monomial<V> {
    type Output = Monomial<V>;

    fn mul(mut self, rhs: Monomial<V>) -> Monomial<V> {
        for variable in rhs.variables {
            self.variables.insert(variable);
        }
        self
    }
}

impl<'a, V: Clone + Eq + Hash> Mul for &'a Monomial<V> {
    type Output = Monomial<V>;

    fn mul(self, rhs: &'a Monomial<V>) -> Monomial<V> {
        self.clone() * rhs.clone()
    }
}

/// A sum of monomials plus a constant term.
#[derive(Clone, Debug)]
pub struct Polynomial<V: Clone + Eq + Hash> {
    monomials: FnvHashSet<Monomial<V>>,
    pub constant: bool,
}

impl<V: Clone + Eq + Hash> Polynomial<V> {
    pub fn zero() -> Polynomial<V> {
        Polynomial::from_constant(false)
    }

    pub fn from_constant(constant: bool) -> Polynomial<V> {
        Polynomial {
            monomials: FnvHashSet::default(),
            constant,
        }
    }

    pub fn from_monomial(monomial: Monomial<V>) -> Polynomial<V> {
        let mut monomials = FnvHashSet::default();
        monomials.insert(monomial);
        Polynomial {
            monomials,
            constant: false,
        }
    }

    pub fn from_variable(variable: V) -> Polynomial<V> {
        Polynomial::from_monomial(Monomial::from_variable(variable))
    }

    pub fn is_zero(&self) -> bool {
        self.monomials.is_empty() && !self.constant
    }

    pub fn num_monomials(&self) -> usize {
        self.monomials.len()
    }

    pub fn monomials(&self) -> impl Iterator<Item = &Monomial<V>> {
        self.monomials.iter()
    }

    pub fn contains(&self, monomial: &Monomial<V>) -> bool {
        self.monomials.contains(monomial)
    }

    /// Toggles the membership of a monomial: adding a monomial twice removes
    /// it, which is exactly addition over GF(2).
    pub fn add_monomial(&mut self, monomial: Monomial<V>) {
        if !self.monomials.remove(&monomial) {
            self.monomials.insert(monomial);
        }
    }

    /// Maps every variable through `f`; see [`Monomial::translate`].
    pub fn translate<U, F>(&self, mut f: F) -> Polynomial<U>
    where
        U: Clone + Eq + Hash,
        F: FnMut(&V, &Monomial<V>) -> U,
    {
        let mut result = Polynomial::from_constant(self.constant);
        for monomial in &self.monomials {
            result.monomials.insert(monomial.translate(&mut f));
        }
        result
    }
}

impl<V: Clone + Eq + Hash> PartialEq for Polynomial<V> {
    fn eq(&self, other: &Polynomial<V>) -> bool {
        self.constant == other.constant && self.monomials == other.monomials
    }
}

impl<V: Clone + Eq + Hash> Eq for Polynomial<V> {}

impl<V: Clone + Eq + Hash> Hash for Polynomial<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut acc = 0u64;
        for monomial in &self.monomials {
            acc ^= hash_of(monomial);
        }
        state.write_u64(acc);
        state.write_usize(self.monomials.len());
        self.constant.hash(state);
    }
}

impl<V: Clone + Eq + Hash> Add for Polynomial<V> {
    type Output = Polynomial<V>;

    fn add(mut self, rhs: Polynomial<V>) -> Polynomial<V> {
        self.constant ^= rhs.constant;
        for monomial in rhs.monomials {
            self.add_monomial(monomial);
        }
        self
    }
}

impl<V: Clone + Eq + Hash> Mul for Polynomial<V> {
    type Output = Polynomial<V>;

    fn mul(self, rhs: Polynomial<V>) -> Polynomial<V> {
        let mut result = Polynomial::zero();

        if self.constant {
            result.monomials = rhs.monomials.clone();
            result.constant = rhs.constant;
        }
        if rhs.constant {
            for monomial in &self.monomials {
                result.add_monomial(monomial.clone());
            }
        }
        for lhs_monomial in &self.monomials {
            for rhs_monomial in &rhs.monomials {
                result.add_monomial(lhs_monomial * rhs_monomial);
            }
        }

        result
    }
}

impl<V: Clone + Eq + Hash> Not for Polynomial<V> {
    type Output = Polynomial<V>;

    fn not(mut self) -> Polynomial<V> {
        self.constant = !self.constant;
        self
    }
}

/// Flattens a polynomial whose variables are themselves polynomials by
/// multiplying out every monomial.
pub fn expand_anf<V: Clone + Eq + Hash>(poly: &Polynomial<Polynomial<V>>) -> Polynomial<V> {
    let mut result = Polynomial::from_constant(poly.constant);
    for monomial in poly.monomials() {
        let mut expanded = Polynomial::from_constant(true);
        for factor in monomial.variables() {
            expanded = expanded * factor.clone();
        }
        result = result + expanded;
    }
    result
}

/// Converts bit expressions into ANF polynomials over read bits, memoised on
/// node identity. One context is used per conversion pass, so the memo table
/// is keyed on the node alone.
#[derive(Default)]
pub struct AnfContext {
    cache: FnvHashMap<u64, Polynomial<ReadBit>>,
}

impl AnfContext {
    pub fn new() -> AnfContext {
        AnfContext::default()
    }

    /// Converts `expr` to ANF. State reads are chased through chains of
    /// plain reads; a non-trivial update expression is substituted while
    /// `read_depth` is positive and kept as a free variable otherwise.
    pub fn bit_expr_to_anf(&mut self, expr: &Expr, read_depth: i32) -> Result<Polynomial<ReadBit>> {
        if let Some(cached) = self.cache.get(&expr.id()) {
            return Ok(cached.clone());
        }
        let result = self.convert(expr, read_depth)?;
        self.cache.insert(expr.id(), result.clone());
        Ok(result)
    }

    fn convert(&mut self, expr: &Expr, read_depth: i32) -> Result<Polynomial<ReadBit>> {
        match &expr.expr {
            BitExpr::Constant(value) => Ok(Polynomial::from_constant(*value)),
            BitExpr::Read { .. } => {
                let mut current = expr.clone();
                loop {
                    let (target, offset) = match &current.expr {
                        BitExpr::Read { target, offset } => (target.clone(), *offset),
                        _ => unreachable!("read chain leads to reads only"),
                    };
                    if target.kind() != TargetKind::State {
                        return Ok(Polynomial::from_variable(ReadBit { target, offset }));
                    }
                    let expanded = target.update_expression(offset)?;
                    if !matches!(expanded.expr, BitExpr::Read { .. }) {
                        if read_depth > 0 {
                            return self.bit_expr_to_anf(&expanded, read_depth - 1);
                        }
                        return Ok(Polynomial::from_variable(ReadBit { target, offset }));
                    }
                    current = expanded;
                }
            }
            BitExpr::Lookup {
                table,
                inputs,
                output_offset,
            } => {
                if *output_offset >= table.output_width() {
                    // 8-bit aligned reads over narrower tables read as zero.
                    return Ok(Polynomial::from_constant(false));
                }
                let anf = table.anf_of(*output_offset)?;
                let mut result = Polynomial::from_constant(false);
                for index in 0..anf.len() {
                    if !anf[index] {
                        continue;
                    }
                    let mut term = Polynomial::from_constant(true);
                    for (j, input) in inputs.iter().enumerate() {
                        if index & (1 << j) != 0 {
                            term = term * self.bit_expr_to_anf(input, read_depth)?;
                        }
                    }
                    result = result + term;
                }
                Ok(result)
            }
            BitExpr::Not(operand) => Ok(!self.bit_expr_to_anf(operand, read_depth)?),
            BitExpr::Binary(BinaryOp::Xor, left, right) => {
                Ok(self.bit_expr_to_anf(left, read_depth)?
                    + self.bit_expr_to_anf(right, read_depth)?)
            }
            BitExpr::Binary(BinaryOp::And, left, right) => {
                Ok(self.bit_expr_to_anf(left, read_depth)?
                    * self.bit_expr_to_anf(right, read_depth)?)
            }
            BitExpr::Binary(BinaryOp::Or, left, right) => {
                let left = self.bit_expr_to_anf(left, read_depth)?;
                let right = self.bit_expr_to_anf(right, read_depth)?;
                Ok(!(!left * !right))
            }
        }
    }
}
