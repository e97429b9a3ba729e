//! Numeric mapping: upper bounds on algebraic degrees of ANF polynomials
//! over the circuit.
//!
//! The degree of an output bit is bounded monomial by monomial. A state
//! read contributes the bound of its update expression, computed once and
//! cached; grouped reads that were seen as whole monomials during state
//! expansion can contribute the tighter bound of the producing register
//! instead of the sum of their factors.

use anyhow::Result;
use fnv::{FnvHashMap, FnvHashSet};

use cryptamodel::anf::{expand_anf, AnfContext, Monomial, Polynomial};
use cryptamodel::expr::Expr;
use cryptamodel::target::{ReadBit, TargetKind};

type Poly = Polynomial<ReadBit>;
type Mono = Monomial<ReadBit>;

/// Monomials larger than this are bounded without partition refinement.
const PARTITION_LIMIT: usize = 6;

pub struct DegreeMapper {
    anf: AnfContext,
    input_degrees: FnvHashMap<String, i64>,
    default_input_degree: i64,
    expand: usize,
    read_degrees: FnvHashMap<ReadBit, i64>,
    monomial_better_bound: FnvHashMap<Mono, ReadBit>,
    suppressed_reads: FnvHashSet<ReadBit>,
    monomial_degrees: FnvHashMap<Mono, i64>,
    polynomial_degrees: FnvHashMap<Poly, i64>,
}

impl DegreeMapper {
    pub fn new(
        input_degrees: FnvHashMap<String, i64>,
        default_input_degree: i64,
        expand: usize,
    ) -> DegreeMapper {
        DegreeMapper {
            anf: AnfContext::new(),
            input_degrees,
            default_input_degree,
            expand,
            read_degrees: FnvHashMap::default(),
            monomial_better_bound: FnvHashMap::default(),
            suppressed_reads: FnvHashSet::default(),
            monomial_degrees: FnvHashMap::default(),
            polynomial_degrees: FnvHashMap::default(),
        }
    }

    /// Bounds the degree of one output expression. A result of `i64::MIN`
    /// denotes the zero polynomial; callers clamp it for presentation.
    pub fn output_bound(&mut self, expr: &Expr) -> Result<i64> {
        let poly = self.anf.bit_expr_to_anf(expr, 0)?;
        self.polynomial_degree(&poly)
    }

    /// The ANF of a state bit's update expression. Monomials of degree at
    /// least two are remembered as producing this read: a later occurrence
    /// of the whole monomial may be bounded by the read instead of its
    /// factors.
    fn read_state(&mut self, read: &ReadBit) -> Result<Poly> {
        let update = read.target.update_expression(read.offset)?;
        let poly = self.anf.bit_expr_to_anf(&update, 0)?;
        for monomial in poly.monomials() {
            if monomial.degree() > 1 {
                self.monomial_better_bound
                    .insert(monomial.clone(), read.clone());
            }
        }
        Ok(poly)
    }

    /// One substitution round: state reads inside monomials of degree at
    /// least two are replaced by their update ANF; reads standing alone
    /// stay symbolic so their cached bounds apply.
    fn substitute(&mut self, poly: &Poly) -> Result<Poly> {
        let mut substitutions: FnvHashMap<ReadBit, Poly> = FnvHashMap::default();
        for monomial in poly.monomials() {
            if monomial.degree() < 2 {
                continue;
            }
            for variable in monomial.variables() {
                if variable.target.kind() == TargetKind::State
                    && !substitutions.contains_key(variable)
                {
                    let expansion = self.read_state(variable)?;
                    substitutions.insert(variable.clone(), expansion);
                }
            }
        }

        let translated = poly.translate(|variable, monomial| {
            if monomial.degree() < 2 {
                return Polynomial::from_variable(variable.clone());
            }
            match substitutions.get(variable) {
                Some(expansion) => expansion.clone(),
                None => Polynomial::from_variable(variable.clone()),
            }
        });

        Ok(expand_anf(&translated))
    }

    fn variable_degree(&mut self, read: &ReadBit) -> Result<i64> {
        // Guard against cyclic state references while this read is being
        // bounded.
        let inserted = self.suppressed_reads.insert(read.clone());
        let result = self.variable_degree_inner(read);
        if inserted {
            self.suppressed_reads.remove(read);
        }
        result
    }

    fn variable_degree_inner(&mut self, read: &ReadBit) -> Result<i64> {
        if read.target.kind() == TargetKind::Input {
            return Ok(self
                .input_degrees
                .get(read.target.name())
                .copied()
                .unwrap_or(self.default_input_degree));
        }
        if let Some(&degree) = self.read_degrees.get(read) {
            return Ok(degree);
        }

        let mut poly = self.read_state(read)?;
        for _ in 0..self.expand {
            poly = self.substitute(&poly)?;
        }
        let result = self.polynomial_degree(&poly)?;
        self.read_degrees.insert(read.clone(), result);
        Ok(result)
    }

    fn monomial_degree(&mut self, monomial: &Mono) -> Result<i64> {
        if let Some(&degree) = self.monomial_degrees.get(monomial) {
            return Ok(degree);
        }

        let refine = monomial.degree() > 1 && monomial.degree() <= PARTITION_LIMIT;
        if refine {
            let mut best = i64::MAX;
            'partition: for partition in partitions(monomial) {
                let mut degree = 0;
                for part in &partition {
                    if part.degree() == 1 {
                        let variable = part.variables().next().expect("degree 1");
                        degree += self.variable_degree(&variable.clone())?;
                        continue;
                    }
                    let read = match self.monomial_better_bound.get(part) {
                        Some(read) => read.clone(),
                        None => continue 'partition,
                    };
                    if self.suppressed_reads.contains(&read) {
                        continue 'partition;
                    }
                    degree += self.variable_degree(&read)?;
                }
                best = best.min(degree);
            }
            // The all-singletons partition always qualifies, so a bound was
            // found.
            Ok(best)
        } else {
            let mut result = 0;
            let variables: Vec<ReadBit> = monomial.variables().cloned().collect();
            for variable in &variables {
                result += self.variable_degree(variable)?;
            }
            self.monomial_degrees.insert(monomial.clone(), result);
            Ok(result)
        }
    }

    fn polynomial_degree(&mut self, poly: &Poly) -> Result<i64> {
        if let Some(&degree) = self.polynomial_degrees.get(poly) {
            return Ok(degree);
        }

        let mut result = if poly.constant { 0 } else { i64::MIN };
        let monomials: Vec<Mono> = poly.monomials().cloned().collect();
        for monomial in &monomials {
            result = result.max(self.monomial_degree(monomial)?);
        }

        self.polynomial_degrees.insert(poly.clone(), result);
        Ok(result)
    }
}

/// All ways of grouping the variables of a monomial into non-empty parts.
fn partitions(monomial: &Mono) -> Vec<Vec<Mono>> {
    fn recurse(
        variables: &[ReadBit],
        index: usize,
        current: &mut Vec<Mono>,
        result: &mut Vec<Vec<Mono>>,
    ) {
        if index == variables.len() {
            result.push(current.clone());
            return;
        }
        let variable = &variables[index];

        // The variable forms a part of its own...
        current.push(Monomial::from_variable(variable.clone()));
        recurse(variables, index + 1, current, result);
        current.pop();

        // ...or joins an earlier part.
        for i in 0..current.len() {
            current[i].insert(variable.clone());
            recurse(variables, index + 1, current, result);
            current[i].remove(variable);
        }
    }

    let variables: Vec<ReadBit> = monomial.variables().cloned().collect();
    let mut result = Vec::new();
    recurse(&variables, 0, &mut Vec::new(), &mut result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptamodel::parser::ArtifactParser;
    use cryptamodel::target::{ReadTarget, TargetKind};

    const ARTIFACT: &str = r#"{
        "inputs": [{"name": "iv", "size": 1}, {"name": "key", "size": 1}],
        "components": {"sboxes": []},
        "iterations": [{
            "name": "reg", "size": 1,
            "update_expressions": [
                {"type": "binary", "operator": "and",
                 "left": {"type": "read", "target_name": "iv", "offset": 0},
                 "right": {"type": "read", "target_name": "iv", "offset": 1}},
                {"type": "read", "target_name": "reg", "offset": 0}
            ]
        }],
        "outputs": [{
            "name": "out", "size": 1,
            "expressions": [
                {"type": "binary", "operator": "xor",
                 "left": {"type": "read", "target_name": "iv", "offset": 0},
                 "right": {"type": "binary", "operator": "and",
                     "left": {"type": "read", "target_name": "reg", "offset": 0},
                     "right": {"type": "read", "target_name": "reg", "offset": 1}}},
                {"type": "constant", "value": 1},
                {"type": "binary", "operator": "xor",
                 "left": {"type": "read", "target_name": "iv", "offset": 0},
                 "right": {"type": "read", "target_name": "iv", "offset": 0}}
            ]
        }]
    }"#;

    fn mapper() -> DegreeMapper {
        DegreeMapper::new(FnvHashMap::default(), 1, 1)
    }

    #[test]
    fn bounds_products_of_state_bits() {
        let (_parser, artifact) = ArtifactParser::parse(ARTIFACT).unwrap();
        let mut mapper = mapper();

        // reg[1] chases through the plain read to reg[0], so the output
        // monomial reg[0]*reg[1] collapses to reg[0], whose update
        // iv[0] & iv[1] has degree 2; iv[0] alone contributes 1.
        let bound = mapper
            .output_bound(&artifact.outputs[0].expressions[0])
            .unwrap();
        assert_eq!(bound, 2);
    }

    #[test]
    fn constants_have_degree_zero() {
        let (_parser, artifact) = ArtifactParser::parse(ARTIFACT).unwrap();
        let mut mapper = mapper();
        let bound = mapper
            .output_bound(&artifact.outputs[0].expressions[1])
            .unwrap();
        assert_eq!(bound, 0);
    }

    #[test]
    fn cancelling_sums_have_no_degree() {
        let (_parser, artifact) = ArtifactParser::parse(ARTIFACT).unwrap();
        let mut mapper = mapper();
        let bound = mapper
            .output_bound(&artifact.outputs[0].expressions[2])
            .unwrap();
        assert_eq!(bound, i64::MIN);
    }

    #[test]
    fn input_degrees_are_configurable() {
        let (_parser, artifact) = ArtifactParser::parse(ARTIFACT).unwrap();
        let mut degrees = FnvHashMap::default();
        degrees.insert("iv".to_string(), 3i64);
        let mut mapper = DegreeMapper::new(degrees, 0, 1);

        // reg[0] expands to iv[0]*iv[1], two factors of degree 3 each.
        let bound = mapper
            .output_bound(&artifact.outputs[0].expressions[0])
            .unwrap();
        assert_eq!(bound, 6);
    }

    #[test]
    fn partitions_enumerate_set_partitions() {
        let target = ReadTarget::new(TargetKind::Input, "iv", 8);
        let monomial = Monomial::from_variables((0..3).map(|offset| ReadBit {
            target: target.clone(),
            offset,
        }));

        // The Bell number of 3 elements.
        assert_eq!(partitions(&monomial).len(), 5);
    }
}
