//! The division-property modeller: a memoised traversal of the circuit
//! that reduces propagation through every node to MILP constraints.

use fnv::{FnvHashMap, FnvHashSet};
use indexmap::IndexSet;
use tracing::debug;

use crate::block::SBoxInputBlock;
use crate::division::{division_property_trail, reduce_inequalities};
use crate::error::Result;
use crate::expr::{BinaryOp, BitExpr, Expr};
use crate::milp::{Comparator, Constraint, DeferredVar, LinearExpr, MilpModel, Sense};
use crate::polyhedron::vertices_to_inequalities;
use crate::target::TargetKind;

/// A traversal value that carries no model variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unmodelled {
    Unspecified,
    True,
    False,
}

/// The value a node models to.
///
/// `Pinned` marks deferred constants of the initial division property; they
/// are re-aliased on reuse instead of split, since the initial property is
/// not consumed by the propagation rules.
#[derive(Clone, Copy, Debug)]
pub enum TraverseResult {
    Unmodelled(Unmodelled),
    Modelled(DeferredVar),
    Pinned(DeferredVar),
}

impl TraverseResult {
    pub fn modelled(&self) -> bool {
        !matches!(self, TraverseResult::Unmodelled(_))
    }

    pub fn variable(&self) -> Option<DeferredVar> {
        match self {
            TraverseResult::Unmodelled(_) => None,
            TraverseResult::Modelled(var) | TraverseResult::Pinned(var) => Some(*var),
        }
    }
}

/// Builds a division-property MILP for the traversed output bits.
#[derive(Default)]
pub struct DivisionPropertyModeller {
    active_bits: FnvHashMap<String, FnvHashSet<usize>>,
    traversed: FnvHashMap<u64, TraverseResult>,
    traversed_sbox_inputs: FnvHashMap<SBoxInputBlock, Vec<TraverseResult>>,
    outputs: IndexSet<DeferredVar>,
    model: MilpModel,
}

impl DivisionPropertyModeller {
    pub fn new() -> DivisionPropertyModeller {
        DivisionPropertyModeller::default()
    }

    /// Sets the initial division property of an input register: listed bits
    /// are active (property 1), the rest of the register is inactive.
    /// Registers never mentioned stay unspecified and propagate no value.
    pub fn add_active_bits(&mut self, name: String, bits: FnvHashSet<usize>) {
        self.active_bits.insert(name, bits);
    }

    pub fn model(&self) -> &MilpModel {
        &self.model
    }

    /// Traverses an expression, reusing memoised results. A memo hit on a
    /// modelled value is a second consumption of that value, so it goes
    /// through the Copy rule; the cache keeps the fresh half of the split.
    pub fn traverse(&mut self, expr: &Expr) -> Result<TraverseResult> {
        if let Some(&cached) = self.traversed.get(&expr.id()) {
            let reused = self.reuse(cached);
            self.traversed.insert(expr.id(), reused);
            return Ok(reused);
        }
        let result = self.traverse_impl(expr)?;
        self.traversed.insert(expr.id(), result);
        Ok(result)
    }

    fn reuse(&mut self, result: TraverseResult) -> TraverseResult {
        match result {
            TraverseResult::Modelled(var) => TraverseResult::Modelled(self.model.copy(var)),
            TraverseResult::Pinned(var) => {
                let real = self.model.resolve(var);
                TraverseResult::Pinned(self.model.defer(real))
            }
            unmodelled => unmodelled,
        }
    }

    fn traverse_impl(&mut self, expr: &Expr) -> Result<TraverseResult> {
        match &expr.expr {
            BitExpr::Constant(value) => Ok(TraverseResult::Unmodelled(if *value {
                Unmodelled::True
            } else {
                Unmodelled::False
            })),
            BitExpr::Read { target, offset } => {
                if target.kind() == TargetKind::Input {
                    return Ok(match self.active_bits.get(target.name()) {
                        Some(bits) => {
                            let active = bits.contains(offset);
                            TraverseResult::Pinned(self.model.add_constant(active))
                        }
                        None => TraverseResult::Unmodelled(Unmodelled::Unspecified),
                    });
                }
                let update = target.update_expression(*offset)?;
                self.traverse(&update)
            }
            BitExpr::Lookup {
                table,
                inputs,
                output_offset,
            } => {
                let key = SBoxInputBlock {
                    inputs: inputs.clone(),
                    table: table.clone(),
                };
                let outputs = match self.traversed_sbox_inputs.get(&key) {
                    Some(outputs) => outputs.clone(),
                    None => {
                        let outputs = self.model_block(&key)?;
                        self.traversed_sbox_inputs.insert(key, outputs.clone());
                        outputs
                    }
                };
                if *output_offset >= outputs.len() {
                    // 8-bit aligned reads over narrower tables read as zero.
                    Ok(TraverseResult::Unmodelled(Unmodelled::False))
                } else {
                    Ok(outputs[*output_offset])
                }
            }
            // Complementation leaves the division property unchanged.
            BitExpr::Not(operand) => self.traverse(operand),
            BitExpr::Binary(BinaryOp::Xor, left, right) => {
                let left = self.traverse(left)?;
                let right = self.traverse(right)?;
                Ok(self.combine_xor(left, right))
            }
            BitExpr::Binary(op, left, right) => {
                let left = self.traverse(left)?;
                let right = self.traverse(right)?;
                Ok(self.combine_and_or(*op, left, right))
            }
        }
    }

    /// Models one S-box block: fresh output variables constrained together
    /// with the input variables by the reduced trail inequalities.
    fn model_block(&mut self, block: &SBoxInputBlock) -> Result<Vec<TraverseResult>> {
        let table = &block.table;
        let input_results = block
            .inputs
            .iter()
            .map(|input| self.traverse(input))
            .collect::<Result<Vec<_>>>()?;

        if input_results.iter().any(|result| !result.modelled()) {
            return Ok(vec![
                TraverseResult::Unmodelled(Unmodelled::Unspecified);
                table.output_width()
            ]);
        }

        let mut vars: Vec<DeferredVar> = input_results
            .iter()
            .map(|result| result.variable().expect("modelled"))
            .collect();
        let output_vars: Vec<DeferredVar> = (0..table.output_width())
            .map(|_| self.model.create_deferred())
            .collect();
        vars.extend(&output_vars);

        let vertices = division_property_trail(table)?;
        let inequalities = vertices_to_inequalities(&vertices)?;
        let reduced = reduce_inequalities(&inequalities, &vertices)?;
        debug!(
            table = table.name(),
            trails = vertices.len(),
            inequalities = reduced.len(),
            "modelled S-box block"
        );

        for inequality in reduced {
            let mut expr = LinearExpr::new();
            for (&var, &coefficient) in vars.iter().zip(inequality.coefficients.iter()) {
                expr = expr.plus(var, coefficient);
            }
            expr = expr.plus_constant(inequality.constant_term);
            self.model.add_deferred_constraint(Constraint {
                expr,
                comparator: Comparator::GreaterEqual,
                rhs: 0,
            });
        }

        Ok(output_vars
            .into_iter()
            .map(TraverseResult::Modelled)
            .collect())
    }

    fn combine_xor(&mut self, left: TraverseResult, right: TraverseResult) -> TraverseResult {
        use TraverseResult::Unmodelled as U;
        match (left, right) {
            (U(a), U(b)) => {
                if a == Unmodelled::Unspecified || b == Unmodelled::Unspecified {
                    U(Unmodelled::Unspecified)
                } else if a == b {
                    U(Unmodelled::False)
                } else {
                    U(Unmodelled::True)
                }
            }
            (U(_), modelled) | (modelled, U(_)) => modelled,
            (left, right) => {
                let var = self.model.xor(
                    left.variable().expect("modelled"),
                    right.variable().expect("modelled"),
                );
                TraverseResult::Modelled(var)
            }
        }
    }

    fn combine_and_or(
        &mut self,
        op: BinaryOp,
        left: TraverseResult,
        right: TraverseResult,
    ) -> TraverseResult {
        use TraverseResult::Unmodelled as U;
        match (left, right) {
            (U(a), U(b)) => {
                if a == Unmodelled::Unspecified || b == Unmodelled::Unspecified {
                    return U(Unmodelled::Unspecified);
                }
                let value = match op {
                    BinaryOp::And => a == Unmodelled::True && b == Unmodelled::True,
                    _ => a == Unmodelled::True || b == Unmodelled::True,
                };
                U(if value {
                    Unmodelled::True
                } else {
                    Unmodelled::False
                })
            }
            (U(constant), modelled) | (modelled, U(constant)) => match (op, constant) {
                (BinaryOp::And, Unmodelled::False) => U(Unmodelled::False),
                (BinaryOp::And, Unmodelled::True) => modelled,
                (BinaryOp::Or, Unmodelled::False) => modelled,
                (BinaryOp::Or, Unmodelled::True) => U(Unmodelled::True),
                _ => U(Unmodelled::Unspecified),
            },
            (left, right) => {
                let var = self.model.and(
                    left.variable().expect("modelled"),
                    right.variable().expect("modelled"),
                );
                TraverseResult::Modelled(var)
            }
        }
    }

    /// Records a traversed output bit for the objective.
    pub fn mark_output(&mut self, result: &TraverseResult) {
        if let Some(var) = result.variable() {
            self.outputs.insert(var);
        }
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Sets the objective to the sum of the marked output variables and
    /// serialises the model. Returns the LP text and the names of the
    /// objective variables.
    pub fn finalize(mut self) -> (String, Vec<String>) {
        let mut objective = LinearExpr::new();
        for &var in &self.outputs {
            objective = objective.plus(var, 1);
        }
        let outputs: Vec<DeferredVar> = self.outputs.iter().copied().collect();
        self.model.set_objective(objective, Sense::Minimize);

        let (lp, names) = self.model.lp_format();
        let output_names = outputs
            .iter()
            .map(|&var| names[self.model.resolve(var).index()].clone())
            .collect();
        (lp, output_names)
    }
}
