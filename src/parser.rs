//! Ingestion of the frontend circuit artifact.
//!
//! The artifact is a JSON document declaring input registers, S-boxes,
//! iterated state registers with per-bit update expressions, and named
//! output expression lists. Expressions are a tagged union on `type`;
//! unknown tags are rejected. Every expression funnels through the interning
//! store, so identical subtrees of the document share DAG nodes.

use std::rc::Rc;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::expr::{BinaryOp, Expr, ExprStore};
use crate::lookup_table::LookupTable;
use crate::target::{ReadTarget, TargetKind};

#[derive(Deserialize)]
struct ArtifactJson {
    inputs: Vec<RegisterJson>,
    components: ComponentsJson,
    iterations: Vec<IterationJson>,
    outputs: Vec<OutputJson>,
}

#[derive(Deserialize)]
struct RegisterJson {
    name: String,
    size: usize,
}

#[derive(Deserialize)]
struct ComponentsJson {
    sboxes: Vec<SboxJson>,
}

#[derive(Deserialize)]
struct SboxJson {
    name: String,
    input_width: usize,
    output_width: usize,
    value: Vec<u64>,
}

#[derive(Deserialize)]
struct IterationJson {
    name: String,
    size: usize,
    #[serde(default)]
    update_expressions: Vec<ExprJson>,
}

#[derive(Deserialize)]
struct OutputJson {
    name: String,
    size: usize,
    expressions: Vec<ExprJson>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ExprJson {
    Constant {
        value: u8,
    },
    Read {
        target_name: String,
        offset: usize,
    },
    Lookup {
        table_name: String,
        inputs: Vec<ExprJson>,
        output_offset: usize,
    },
    Unary {
        operator: UnaryOpJson,
        operand: Box<ExprJson>,
    },
    Binary {
        operator: BinaryOpJson,
        left: Box<ExprJson>,
        right: Box<ExprJson>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum UnaryOpJson {
    Not,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum BinaryOpJson {
    And,
    Or,
    Xor,
}

/// A named output block and the expressions computing its bits.
pub struct OutputInfo {
    pub name: String,
    pub size: usize,
    pub expressions: Vec<Expr>,
}

/// The parsed artifact.
pub struct ParsedArtifact {
    pub inputs: Vec<Rc<ReadTarget>>,
    pub iterations: Vec<Rc<ReadTarget>>,
    pub outputs: Vec<OutputInfo>,
}

/// Parses the artifact and owns its read targets, lookup tables and the
/// interning store for the process lifetime.
pub struct ArtifactParser {
    read_targets: IndexMap<String, Rc<ReadTarget>>,
    lookup_tables: IndexMap<String, Rc<LookupTable>>,
    store: ExprStore,
}

impl ArtifactParser {
    /// Parses a JSON artifact. Declarations are processed in document
    /// order; read expressions may refer to any register declared up to and
    /// including their own.
    pub fn parse(json: &str) -> Result<(ArtifactParser, ParsedArtifact)> {
        let artifact: ArtifactJson = serde_json::from_str(json)?;

        let mut parser = ArtifactParser {
            read_targets: IndexMap::new(),
            lookup_tables: IndexMap::new(),
            store: ExprStore::new(),
        };

        let mut inputs = Vec::new();
        for register in &artifact.inputs {
            let target = ReadTarget::new(TargetKind::Input, &register.name, register.size);
            parser
                .read_targets
                .insert(format!("input:{}", register.name), target.clone());
            inputs.push(target);
        }

        for sbox in artifact.components.sboxes {
            let table =
                LookupTable::create(&sbox.name, sbox.input_width, sbox.output_width, sbox.value)?;
            parser.lookup_tables.insert(sbox.name, table);
        }

        let mut iterations = Vec::new();
        for iteration in &artifact.iterations {
            let target = ReadTarget::new(TargetKind::State, &iteration.name, iteration.size);
            parser
                .read_targets
                .insert(format!("state:{}", iteration.name), target.clone());

            for expr in &iteration.update_expressions {
                let expr = parser.build_expr(expr)?;
                target.push_update_expression(expr);
            }

            iterations.push(target);
        }

        let mut outputs = Vec::new();
        for output in &artifact.outputs {
            let mut expressions = Vec::new();
            for expr in &output.expressions {
                expressions.push(parser.build_expr(expr)?);
            }
            outputs.push(OutputInfo {
                name: output.name.clone(),
                size: output.size,
                expressions,
            });
        }

        Ok((
            parser,
            ParsedArtifact {
                inputs,
                iterations,
                outputs,
            },
        ))
    }

    /// Resolves a register by its bare name, trying declared inputs before
    /// iteration registers.
    pub fn read_target(&self, name: &str) -> Result<Rc<ReadTarget>> {
        self.read_targets
            .get(&format!("input:{}", name))
            .or_else(|| self.read_targets.get(&format!("state:{}", name)))
            .cloned()
            .ok_or_else(|| Error::UnknownReadTarget {
                name: name.to_string(),
            })
    }

    pub fn lookup_table(&self, name: &str) -> Result<Rc<LookupTable>> {
        self.lookup_tables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownLookupTable {
                name: name.to_string(),
            })
    }

    /// Returns the number of distinct expression nodes interned.
    pub fn num_exprs(&self) -> usize {
        self.store.len()
    }

    fn build_expr(&mut self, json: &ExprJson) -> Result<Expr> {
        match json {
            ExprJson::Constant { value } => Ok(self.store.constant(*value != 0)),
            ExprJson::Read {
                target_name,
                offset,
            } => {
                let target = self.read_target(target_name)?;
                Ok(self.store.read(target, *offset))
            }
            ExprJson::Lookup {
                table_name,
                inputs,
                output_offset,
            } => {
                let table = self.lookup_table(table_name)?;
                if inputs.len() != table.input_width() {
                    return Err(Error::LookupArity {
                        table: table_name.clone(),
                        expected: table.input_width(),
                        got: inputs.len(),
                    });
                }
                let inputs = inputs
                    .iter()
                    .map(|input| self.build_expr(input))
                    .collect::<Result<Vec<_>>>()?;
                Ok(self.store.lookup(table, inputs, *output_offset))
            }
            ExprJson::Unary {
                operator: UnaryOpJson::Not,
                operand,
            } => {
                let operand = self.build_expr(operand)?;
                Ok(self.store.not(operand))
            }
            ExprJson::Binary {
                operator,
                left,
                right,
            } => {
                let op = match operator {
                    BinaryOpJson::And => BinaryOp::And,
                    BinaryOpJson::Or => BinaryOp::Or,
                    BinaryOpJson::Xor => BinaryOp::Xor,
                };
                let left = self.build_expr(left)?;
                let right = self.build_expr(right)?;
                Ok(self.store.binary(op, left, right))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIFACT: &str = r#"{
        "inputs": [{"name": "iv", "size": 1}],
        "components": {
            "sboxes": [{
                "name": "s", "input_width": 2, "output_width": 2,
                "value": [0, 1, 2, 3]
            }]
        },
        "iterations": [{
            "name": "reg", "size": 1,
            "update_expressions": [
                {"type": "binary", "operator": "xor",
                 "left": {"type": "read", "target_name": "iv", "offset": 0},
                 "right": {"type": "read", "target_name": "reg", "offset": 0}}
            ]
        }],
        "outputs": [{
            "name": "out", "size": 1,
            "expressions": [
                {"type": "lookup", "table_name": "s", "output_offset": 0,
                 "inputs": [
                    {"type": "read", "target_name": "iv", "offset": 0},
                    {"type": "read", "target_name": "reg", "offset": 0}
                 ]},
                {"type": "lookup", "table_name": "s", "output_offset": 1,
                 "inputs": [
                    {"type": "read", "target_name": "iv", "offset": 0},
                    {"type": "read", "target_name": "reg", "offset": 0}
                 ]}
            ]
        }]
    }"#;

    #[test]
    fn parses_registers_tables_and_outputs() {
        let (parser, artifact) = ArtifactParser::parse(ARTIFACT).unwrap();

        assert_eq!(artifact.inputs.len(), 1);
        assert_eq!(artifact.iterations.len(), 1);
        assert_eq!(artifact.outputs.len(), 1);
        assert_eq!(artifact.outputs[0].expressions.len(), 2);
        assert_eq!(artifact.iterations[0].num_update_expressions(), 1);

        assert_eq!(parser.read_target("iv").unwrap().kind(), TargetKind::Input);
        assert_eq!(parser.read_target("reg").unwrap().kind(), TargetKind::State);
        assert!(parser.read_target("nope").is_err());
        assert!(parser.lookup_table("nope").is_err());
    }

    #[test]
    fn identical_subtrees_share_nodes() {
        let (parser, artifact) = ArtifactParser::parse(ARTIFACT).unwrap();

        // Both lookups read the same inputs, so they share those nodes.
        let first = &artifact.outputs[0].expressions[0];
        let second = &artifact.outputs[0].expressions[1];
        match (&first.expr, &second.expr) {
            (
                crate::expr::BitExpr::Lookup { inputs: a, .. },
                crate::expr::BitExpr::Lookup { inputs: b, .. },
            ) => {
                assert!(Rc::ptr_eq(&a[0], &b[0]));
                assert!(Rc::ptr_eq(&a[1], &b[1]));
            }
            _ => panic!("expected lookups"),
        }

        // Two parses of the same document intern the same number of nodes.
        let (parser2, _) = ArtifactParser::parse(ARTIFACT).unwrap();
        assert_eq!(parser.num_exprs(), parser2.num_exprs());
    }

    #[test]
    fn rejects_unknown_expression_types() {
        let bad = ARTIFACT.replace("\"type\": \"lookup\"", "\"type\": \"shift\"");
        assert!(ArtifactParser::parse(&bad).is_err());
    }

    #[test]
    fn rejects_wrong_lookup_arity() {
        let bad = r#"{
            "inputs": [{"name": "iv", "size": 1}],
            "components": {"sboxes": [{
                "name": "s", "input_width": 2, "output_width": 2,
                "value": [0, 1, 2, 3]}]},
            "iterations": [],
            "outputs": [{"name": "out", "size": 1, "expressions": [
                {"type": "lookup", "table_name": "s", "output_offset": 0,
                 "inputs": [{"type": "read", "target_name": "iv", "offset": 0}]}
            ]}]
        }"#;
        match ArtifactParser::parse(bad) {
            Err(Error::LookupArity { expected, got, .. }) => {
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
            }
            other => panic!("expected arity error, got {:?}", other.is_ok()),
        }
    }
}
