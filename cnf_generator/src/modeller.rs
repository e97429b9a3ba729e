//! Memoised traversal of the circuit emitting CNF clauses for differential
//! or linear trail propagation.

use std::rc::Rc;

use anyhow::Result;
use fnv::{FnvHashMap, FnvHashSet};
use tracing::debug;

use cryptamodel::block::SBoxInputBlock;
use cryptamodel::expr::{BinaryOp, BitExpr, Expr};
use cryptamodel::lookup_table::LookupTable;
use cryptamodel::target::TargetKind;
use sat_modeller::template::{build_table_template, ddt_weight, lat_weight, TableTemplate};
use sat_modeller::{SatModel, Variable};

use crate::property::PropertyType;

/// Builds a CNF trail model over the traversed output bits.
///
/// Differential and linear mode share the traversal; they differ in the
/// table each block is templated from (DDT or LAT, with the matching weight
/// function) and in the propagation rule for XOR.
pub struct TrailModeller {
    model: SatModel,
    property_type: PropertyType,
    false_var: Variable,
    active_bits: FnvHashMap<String, FnvHashSet<usize>>,
    and_table: Rc<LookupTable>,
    or_table: Rc<LookupTable>,
    known_templates: FnvHashMap<usize, Rc<TableTemplate>>,
    modelled_exprs: FnvHashMap<u64, Variable>,
    modelled_sbox_inputs: FnvHashMap<SBoxInputBlock, Vec<Variable>>,
    weight_vars: Vec<Variable>,
    input_vars: Vec<Variable>,
}

impl TrailModeller {
    pub fn new(property_type: PropertyType) -> Result<TrailModeller> {
        let mut model = SatModel::new();
        let false_var = model.create_variable("FALSE");
        model.add_clause(vec![-false_var]);

        Ok(TrailModeller {
            model,
            property_type,
            false_var,
            active_bits: FnvHashMap::default(),
            and_table: LookupTable::create("AND", 2, 1, vec![0, 0, 0, 1])?,
            or_table: LookupTable::create("OR", 2, 1, vec![0, 1, 1, 1])?,
            known_templates: FnvHashMap::default(),
            modelled_exprs: FnvHashMap::default(),
            modelled_sbox_inputs: FnvHashMap::default(),
            weight_vars: Vec::new(),
            input_vars: Vec::new(),
        })
    }

    /// Marks bits of an input register as free variables of the model. An
    /// empty set selects the whole register.
    pub fn add_active_bits(&mut self, name: String, bits: FnvHashSet<usize>) {
        self.active_bits.insert(name, bits);
    }

    pub fn model(&self) -> &SatModel {
        &self.model
    }

    pub fn into_model(self) -> SatModel {
        self.model
    }

    pub fn num_weight_vars(&self) -> usize {
        self.weight_vars.len()
    }

    pub fn num_input_vars(&self) -> usize {
        self.input_vars.len()
    }

    fn table_template(&mut self, table: &Rc<LookupTable>) -> Result<Rc<TableTemplate>> {
        let key = Rc::as_ptr(table) as usize;
        if let Some(template) = self.known_templates.get(&key) {
            return Ok(template.clone());
        }

        let n = table.input_width();
        let template = match self.property_type {
            PropertyType::Differential => {
                let ddt: Vec<Vec<i64>> = table
                    .ddt()
                    .iter()
                    .map(|row| row.iter().map(|&v| v as i64).collect())
                    .collect();
                build_table_template(&ddt, |v| ddt_weight(n, v))?
            }
            PropertyType::Linear => build_table_template(table.lat(), |v| lat_weight(n, v))?,
        };
        debug!(
            table = table.name(),
            clauses = template.clauses().len(),
            "built table template"
        );

        let template = Rc::new(template);
        self.known_templates.insert(key, template.clone());
        Ok(template)
    }

    /// Models one S-box block: one output variable per coordinate, the
    /// template instantiated over inputs, outputs and fresh weights.
    fn lookup_block(&mut self, block: SBoxInputBlock, output_offset: usize) -> Result<Variable> {
        let outputs = match self.modelled_sbox_inputs.get(&block) {
            Some(outputs) => outputs.clone(),
            None => {
                let input_vars = block
                    .inputs
                    .iter()
                    .map(|input| self.traverse(input))
                    .collect::<Result<Vec<_>>>()?;
                let outputs = self
                    .model
                    .create_variables(block.table.output_width(), &format!("{}_o", block.table.name()));

                let template = self.table_template(&block.table)?;
                let weights = self
                    .model
                    .add_weight_table_clauses(&template, &input_vars, &outputs)?;
                self.weight_vars.extend(weights);

                self.modelled_sbox_inputs.insert(block, outputs.clone());
                outputs
            }
        };

        if output_offset >= outputs.len() {
            // 8-bit aligned reads over narrower tables read as zero.
            Ok(self.false_var)
        } else {
            Ok(outputs[output_offset])
        }
    }

    pub fn traverse(&mut self, expr: &Expr) -> Result<Variable> {
        if let Some(&var) = self.modelled_exprs.get(&expr.id()) {
            return Ok(var);
        }
        let var = self.traverse_impl(expr)?;
        self.modelled_exprs.insert(expr.id(), var);
        Ok(var)
    }

    fn traverse_impl(&mut self, expr: &Expr) -> Result<Variable> {
        match &expr.expr {
            // Constants carry no difference or mask.
            BitExpr::Constant(_) => Ok(self.false_var),
            BitExpr::Read { target, offset } => {
                if target.kind() == TargetKind::Input {
                    let active = match self.active_bits.get(target.name()) {
                        Some(bits) => bits.is_empty() || bits.contains(offset),
                        None => false,
                    };
                    if active {
                        let var = self
                            .model
                            .create_variable(&format!("{}_{}", target.name(), offset));
                        self.input_vars.push(var);
                        return Ok(var);
                    }
                    return Ok(self.false_var);
                }
                let update = target.update_expression(*offset)?;
                self.traverse(&update)
            }
            BitExpr::Lookup {
                table,
                inputs,
                output_offset,
            } => self.lookup_block(
                SBoxInputBlock {
                    inputs: inputs.clone(),
                    table: table.clone(),
                },
                *output_offset,
            ),
            // Complementation changes neither differences nor masks.
            BitExpr::Not(operand) => self.traverse(operand),
            BitExpr::Binary(BinaryOp::And, left, right) => self.lookup_block(
                SBoxInputBlock {
                    inputs: vec![left.clone(), right.clone()],
                    table: self.and_table.clone(),
                },
                0,
            ),
            BitExpr::Binary(BinaryOp::Or, left, right) => self.lookup_block(
                SBoxInputBlock {
                    inputs: vec![left.clone(), right.clone()],
                    table: self.or_table.clone(),
                },
                0,
            ),
            BitExpr::Binary(BinaryOp::Xor, left, right) => {
                let left = self.traverse(left)?;
                let right = self.traverse(right)?;
                match self.property_type {
                    PropertyType::Differential => {
                        if left == self.false_var {
                            return Ok(right);
                        }
                        if right == self.false_var {
                            return Ok(left);
                        }
                        let result = self.model.create_variable("xor");
                        self.model.add_xor_clause(&[left, right], result);
                        Ok(result)
                    }
                    PropertyType::Linear => {
                        // A mask on the sum applies to both summands.
                        if left != right {
                            self.model.add_equivalent_clause(&[left, right]);
                        }
                        Ok(left)
                    }
                }
            }
        }
    }

    /// Forces a non-trivial input difference or mask.
    pub fn assure_input_active(&mut self) {
        if self.input_vars.is_empty() {
            return;
        }
        let clause = self.input_vars.iter().map(|&var| var.into()).collect();
        self.model.add_clause(clause);
    }

    /// Bounds the total trail weight with a sequential counter. Models with
    /// fewer than two weight variables cannot exceed any positive bound and
    /// are left unconstrained.
    pub fn bound_weight(&mut self, max_weight: usize) -> Result<()> {
        if self.weight_vars.len() < 2 {
            debug!(
                weights = self.weight_vars.len(),
                "skipping weight counter for trivial model"
            );
            return Ok(());
        }
        let weights = self.weight_vars.clone();
        self.model.add_sequential_counter_le(&weights, max_weight)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptamodel::parser::ArtifactParser;

    const ARTIFACT: &str = r#"{
        "inputs": [{"name": "pt", "size": 1}, {"name": "key", "size": 1}],
        "components": {
            "sboxes": [{
                "name": "s", "input_width": 2, "output_width": 2,
                "value": [0, 1, 3, 2]
            }]
        },
        "iterations": [],
        "outputs": [{
            "name": "ct", "size": 1,
            "expressions": [
                {"type": "binary", "operator": "xor",
                 "left": {"type": "read", "target_name": "pt", "offset": 0},
                 "right": {"type": "read", "target_name": "key", "offset": 0}},
                {"type": "lookup", "table_name": "s", "output_offset": 0,
                 "inputs": [
                    {"type": "read", "target_name": "pt", "offset": 0},
                    {"type": "read", "target_name": "pt", "offset": 1}
                 ]},
                {"type": "lookup", "table_name": "s", "output_offset": 1,
                 "inputs": [
                    {"type": "read", "target_name": "pt", "offset": 0},
                    {"type": "read", "target_name": "pt", "offset": 1}
                 ]},
                {"type": "binary", "operator": "and",
                 "left": {"type": "read", "target_name": "pt", "offset": 0},
                 "right": {"type": "read", "target_name": "pt", "offset": 1}}
            ]
        }]
    }"#;

    fn modeller(property_type: PropertyType) -> (TrailModeller, Vec<Expr>) {
        let (_parser, artifact) = ArtifactParser::parse(ARTIFACT).unwrap();
        let mut modeller = TrailModeller::new(property_type).unwrap();
        modeller.add_active_bits("pt".to_string(), FnvHashSet::default());
        (modeller, artifact.outputs[0].expressions.clone())
    }

    #[test]
    fn inactive_operands_short_circuit_xor() {
        let (mut modeller, exprs) = modeller(PropertyType::Differential);

        // key is not active, so pt[0] ^ key[0] propagates pt[0] directly.
        let var = modeller.traverse(&exprs[0]).unwrap();
        assert_eq!(modeller.num_input_vars(), 1);
        assert_ne!(var, modeller.false_var);
        // No xor gadget clause was added beyond the FALSE unit clause.
        assert_eq!(modeller.model().num_clauses(), 1);
    }

    #[test]
    fn sbox_blocks_share_outputs_and_weights() {
        let (mut modeller, exprs) = modeller(PropertyType::Differential);

        let first = modeller.traverse(&exprs[1]).unwrap();
        let weights = modeller.num_weight_vars();
        let clauses = modeller.model().num_clauses();
        let second = modeller.traverse(&exprs[2]).unwrap();

        assert_ne!(first, second);
        assert_eq!(modeller.num_weight_vars(), weights);
        assert_eq!(modeller.model().num_clauses(), clauses);
    }

    #[test]
    fn and_gates_go_through_the_two_bit_table() {
        let (mut modeller, exprs) = modeller(PropertyType::Differential);

        let var = modeller.traverse(&exprs[3]).unwrap();
        assert_ne!(var, modeller.false_var);
        // The AND block contributes one weight variable.
        assert_eq!(modeller.num_weight_vars(), 1);
    }

    #[test]
    fn linear_xor_requires_equal_masks() {
        let (mut modeller, exprs) = modeller(PropertyType::Linear);

        // In linear mode pt[0] ^ key[0] forces the key mask equal to the
        // pt mask; key is inactive, so pt[0] is forced to FALSE as well.
        let var = modeller.traverse(&exprs[0]).unwrap();
        assert_ne!(var, modeller.false_var);
        assert!(modeller.model().num_clauses() > 1);
    }

    #[test]
    fn weight_counter_and_input_clause() {
        let (mut modeller, exprs) = modeller(PropertyType::Differential);

        for expr in &exprs {
            modeller.traverse(expr).unwrap();
        }
        modeller.assure_input_active();

        let clauses = modeller.model().num_clauses();
        modeller.bound_weight(1).unwrap();
        assert!(modeller.model().num_clauses() > clauses);
    }
}
