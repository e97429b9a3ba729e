//! A builder for CNF models: a 1-indexed variable store, clause gadgets for
//! the common boolean operators, a sequential counter for cardinality
//! bounds, weighted table templates and DIMACS output.

use std::io::{self, Write};
use std::ops::Neg;

use fnv::FnvHashSet;
use itertools::Itertools;
use thiserror::Error;

pub mod template;

pub use template::{build_table_template, ddt_weight, lat_weight, Entry, TableTemplate};

#[derive(Debug, Error)]
pub enum Error {
    #[error("sequential counter requires at least two variables, got {0}")]
    CounterTooFewVariables(usize),

    #[error("sequential counter bound must be positive")]
    CounterInvalidBound,

    #[error("weight {weight} does not fit in {positions} unary positions")]
    WeightOutOfRange { weight: usize, positions: usize },

    #[error("template expects {expected} variables, got {got}")]
    TemplateArity { expected: usize, got: usize },

    #[error("table must have power-of-two dimensions, got {rows}x{cols}")]
    TableShape { rows: usize, cols: usize },
}

/// A propositional variable. Index 0 is reserved and never assigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Variable(usize);

impl Variable {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Neg for Variable {
    type Output = Literal;

    fn neg(self) -> Literal {
        Literal(-(self.0 as isize))
    }
}

/// A signed literal; negative values denote negation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Literal(isize);

impl Literal {
    pub fn index(self) -> isize {
        self.0
    }

    pub fn variable(self) -> Variable {
        Variable(self.0.abs() as usize)
    }

    pub fn is_negated(self) -> bool {
        self.0 < 0
    }
}

impl From<Variable> for Literal {
    fn from(var: Variable) -> Literal {
        Literal(var.0 as isize)
    }
}

/// A disjunction of literals.
#[derive(Clone, Debug)]
pub struct Clause {
    pub literals: Vec<Literal>,
}

/// The CNF model under construction.
#[derive(Default)]
pub struct SatModel {
    names: Vec<String>,
    clauses: Vec<Clause>,
}

impl SatModel {
    pub fn new() -> SatModel {
        SatModel {
            // Index 0 is reserved so that literals can be signed indices.
            names: vec![String::new()],
            clauses: Vec::new(),
        }
    }

    pub fn create_variable(&mut self, name: &str) -> Variable {
        self.names.push(name.to_string());
        Variable(self.names.len() - 1)
    }

    pub fn create_variables(&mut self, count: usize, name_prefix: &str) -> Vec<Variable> {
        (0..count)
            .map(|i| self.create_variable(&format!("{}_{}", name_prefix, i)))
            .collect()
    }

    pub fn num_variables(&self) -> usize {
        self.names.len() - 1
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn variable_name(&self, var: Variable) -> &str {
        &self.names[var.0]
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn add_clause(&mut self, literals: Vec<Literal>) {
        self.clauses.push(Clause { literals });
    }

    /// CNF encoding of `result = xor(values)`: over the operand list
    /// `values ++ [result]`, one clause per odd-sized subset with exactly
    /// that subset negated. An assignment violates the clause of its own
    /// negation pattern iff its parity is odd.
    pub fn add_xor_clause(&mut self, values: &[Variable], result: Variable) {
        let mut operands = values.to_vec();
        operands.push(result);

        for size in (1..=operands.len()).step_by(2) {
            for subset in operands.iter().combinations(size) {
                let negated: FnvHashSet<Variable> = subset.into_iter().copied().collect();
                let clause = operands
                    .iter()
                    .map(|&operand| {
                        if negated.contains(&operand) {
                            -operand
                        } else {
                            operand.into()
                        }
                    })
                    .collect();
                self.add_clause(clause);
            }
        }
    }

    /// CNF encoding of `result = and(values)`.
    pub fn add_and_clause(&mut self, values: &[Variable], result: Variable) {
        for &value in values {
            self.add_clause(vec![value.into(), -result]);
        }
        let mut clause: Vec<Literal> = values.iter().map(|&value| -value).collect();
        clause.push(result.into());
        self.add_clause(clause);
    }

    /// CNF encoding of `result = or(values)`.
    pub fn add_or_clause(&mut self, values: &[Variable], result: Variable) {
        for &value in values {
            self.add_clause(vec![-value, result.into()]);
        }
        let mut clause: Vec<Literal> = values.iter().map(|&value| Literal::from(value)).collect();
        clause.push(-result);
        self.add_clause(clause);
    }

    /// Forces all listed variables equal through a ring of implications.
    pub fn add_equivalent_clause(&mut self, values: &[Variable]) {
        for (i, &value) in values.iter().enumerate() {
            let next = values[(i + 1) % values.len()];
            self.add_clause(vec![-value, next.into()]);
        }
    }

    /// Sinz sequential counter enforcing `sum(x) <= k` with `O(n*k)`
    /// auxiliary variables and clauses.
    pub fn add_sequential_counter_le(&mut self, x: &[Variable], k: usize) -> Result<(), Error> {
        let n = x.len();
        if n < 2 {
            return Err(Error::CounterTooFewVariables(n));
        }
        if k == 0 {
            return Err(Error::CounterInvalidBound);
        }

        let s: Vec<Vec<Variable>> = (0..n - 1)
            .map(|i| self.create_variables(k, &format!("seq_cnt_s_{}", i)))
            .collect();

        self.add_clause(vec![-x[0], s[0][0].into()]);
        for j in 1..k {
            self.add_clause(vec![-s[0][j]]);
        }

        for i in 1..n - 1 {
            self.add_clause(vec![-x[i], s[i][0].into()]);
            self.add_clause(vec![-s[i - 1][0], s[i][0].into()]);
            for j in 1..k {
                self.add_clause(vec![-x[i], -s[i - 1][j - 1], s[i][j].into()]);
            }
            for j in 1..k {
                self.add_clause(vec![-s[i - 1][j], s[i][j].into()]);
            }
            self.add_clause(vec![-x[i], -s[i - 1][k - 1]]);
        }
        self.add_clause(vec![-x[n - 1], -s[n - 2][k - 1]]);

        Ok(())
    }

    /// Writes the model in DIMACS format. The variable count excludes the
    /// reserved index 0.
    pub fn write_dimacs(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "p cnf {} {}", self.num_variables(), self.clauses.len())?;
        for clause in &self.clauses {
            for literal in &clause.literals {
                write!(out, "{} ", literal.index())?;
            }
            writeln!(out, "0")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Brute-force check: does any assignment of all variables extend the
    /// fixed prefix to satisfy the model?
    fn satisfiable_with(model: &SatModel, fixed: &[(Variable, bool)]) -> bool {
        let n = model.num_variables();
        'assignment: for bits in 0..1u64 << n {
            let value = |var: Variable| (bits >> (var.index() - 1)) & 1 == 1;
            for &(var, expected) in fixed {
                if value(var) != expected {
                    continue 'assignment;
                }
            }
            let ok = model.clauses().iter().all(|clause| {
                clause.literals.iter().any(|lit| {
                    let v = value(lit.variable());
                    if lit.is_negated() {
                        !v
                    } else {
                        v
                    }
                })
            });
            if ok {
                return true;
            }
        }
        false
    }

    #[test]
    fn xor_gadget_matches_xor() {
        for inputs in 1..=3usize {
            let mut model = SatModel::new();
            let x = model.create_variables(inputs, "x");
            let r = model.create_variable("r");
            model.add_xor_clause(&x, r);

            for bits in 0..1u64 << (inputs + 1) {
                let fixed: Vec<(Variable, bool)> = x
                    .iter()
                    .chain(std::iter::once(&r))
                    .enumerate()
                    .map(|(i, &var)| (var, (bits >> i) & 1 == 1))
                    .collect();
                let parity = (bits & ((1 << inputs) - 1)).count_ones() & 1 == 1;
                let result = (bits >> inputs) & 1 == 1;
                assert_eq!(
                    satisfiable_with(&model, &fixed),
                    parity == result,
                    "assignment {:b}",
                    bits
                );
            }
        }
    }

    #[test]
    fn and_or_gadgets() {
        let mut model = SatModel::new();
        let x = model.create_variables(2, "x");
        let r = model.create_variable("r");
        model.add_and_clause(&x, r);

        for bits in 0..4u64 {
            let a = bits & 1 == 1;
            let b = bits >> 1 & 1 == 1;
            assert!(satisfiable_with(
                &model,
                &[(x[0], a), (x[1], b), (r, a && b)]
            ));
            assert!(!satisfiable_with(
                &model,
                &[(x[0], a), (x[1], b), (r, !(a && b))]
            ));
        }

        let mut model = SatModel::new();
        let x = model.create_variables(2, "x");
        let r = model.create_variable("r");
        model.add_or_clause(&x, r);

        for bits in 0..4u64 {
            let a = bits & 1 == 1;
            let b = bits >> 1 & 1 == 1;
            assert!(satisfiable_with(
                &model,
                &[(x[0], a), (x[1], b), (r, a || b)]
            ));
            assert!(!satisfiable_with(
                &model,
                &[(x[0], a), (x[1], b), (r, !(a || b))]
            ));
        }
    }

    #[test]
    fn equivalence_ring() {
        let mut model = SatModel::new();
        let x = model.create_variables(3, "x");
        model.add_equivalent_clause(&x);

        for bits in 0..8u64 {
            let fixed: Vec<(Variable, bool)> = x
                .iter()
                .enumerate()
                .map(|(i, &var)| (var, (bits >> i) & 1 == 1))
                .collect();
            let all_equal = bits == 0 || bits == 7;
            assert_eq!(satisfiable_with(&model, &fixed), all_equal);
        }
    }

    #[test]
    fn sequential_counter_accepts_exactly_low_weights() {
        let mut model = SatModel::new();
        let x = model.create_variables(4, "x");
        model.add_sequential_counter_le(&x, 2).unwrap();

        let mut accepted = 0;
        for bits in 0..16u64 {
            let fixed: Vec<(Variable, bool)> = x
                .iter()
                .enumerate()
                .map(|(i, &var)| (var, (bits >> i) & 1 == 1))
                .collect();
            let ok = satisfiable_with(&model, &fixed);
            assert_eq!(ok, bits.count_ones() <= 2, "assignment {:04b}", bits);
            if ok {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 11);
    }

    #[test]
    fn sequential_counter_rejects_bad_parameters() {
        let mut model = SatModel::new();
        let x = model.create_variables(4, "x");
        assert!(model.add_sequential_counter_le(&x[..1], 2).is_err());
        assert!(model.add_sequential_counter_le(&x, 0).is_err());
    }

    #[test]
    fn dimacs_layout() {
        let mut model = SatModel::new();
        let a = model.create_variable("a");
        let b = model.create_variable("b");
        model.add_clause(vec![a.into(), -b]);
        model.add_clause(vec![b.into()]);

        let mut out = Vec::new();
        model.write_dimacs(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "p cnf 2 2\n1 -2 0\n2 0\n");
    }
}
