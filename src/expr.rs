//! The hash-consed bit expression DAG.
//!
//! Every output bit of a circuit is a tree of boolean operations over
//! constants, register reads and table lookups. Structurally equal subtrees
//! are collapsed by an interning store, so equality of nodes is identity of
//! nodes and per-node memoisation can key on a node id.

use std::fmt;
use std::rc::Rc;

use fnv::FnvHashMap;

use crate::lookup_table::LookupTable;
use crate::target::ReadTarget;

/// Binary boolean operators of the circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    And,
    Or,
    Xor,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BinaryOp::And => write!(f, "&"),
            BinaryOp::Or => write!(f, "|"),
            BinaryOp::Xor => write!(f, "^"),
        }
    }
}

/// A bit-valued expression.
pub enum BitExpr {
    Constant(bool),
    Read {
        target: Rc<ReadTarget>,
        offset: usize,
    },
    Lookup {
        table: Rc<LookupTable>,
        inputs: Vec<Expr>,
        output_offset: usize,
    },
    Not(Expr),
    Binary(BinaryOp, Expr, Expr),
}

/// An interned node of the DAG. The id numbers nodes in creation order and
/// stands in for the node address: it orders the children of commutative
/// operators and keys the per-node memoisation of the modellers.
pub struct ExprNode {
    id: u64,
    pub expr: BitExpr,
}

pub type Expr = Rc<ExprNode>;

impl ExprNode {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.expr {
            BitExpr::Constant(value) => write!(f, "{}", *value as u8),
            BitExpr::Read { target, offset } => write!(f, "{}[{}]", target.name(), offset),
            BitExpr::Lookup {
                table,
                inputs,
                output_offset,
            } => {
                write!(f, "{}(", table.name())?;
                for (i, input) in inputs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", input)?;
                }
                write!(f, ")[{}]", output_offset)
            }
            BitExpr::Not(expr) => write!(f, "!{}", expr),
            BitExpr::Binary(op, left, right) => write!(f, "({} {} {})", left, op, right),
        }
    }
}

/// Shallow structural identity of a node: the kind plus the identities of
/// its children. Children are compared by node id, targets and tables by
/// address, so structural equality of keys coincides with structural
/// equality of whole subtrees.
#[derive(PartialEq, Eq, Hash)]
enum ExprKey {
    Constant(bool),
    Read(usize, usize),
    Lookup(usize, Vec<u64>, usize),
    Not(u64),
    Binary(BinaryOp, u64, u64),
}

/// The interning store. All expression construction funnels through it;
/// interning an already known shape returns the existing node.
#[derive(Default)]
pub struct ExprStore {
    nodes: FnvHashMap<ExprKey, Expr>,
    next_id: u64,
}

impl ExprStore {
    pub fn new() -> ExprStore {
        ExprStore::default()
    }

    /// Returns the number of distinct nodes interned so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn constant(&mut self, value: bool) -> Expr {
        self.intern(ExprKey::Constant(value), || BitExpr::Constant(value))
    }

    pub fn read(&mut self, target: Rc<ReadTarget>, offset: usize) -> Expr {
        let key = ExprKey::Read(Rc::as_ptr(&target) as usize, offset);
        self.intern(key, || BitExpr::Read { target, offset })
    }

    pub fn lookup(
        &mut self,
        table: Rc<LookupTable>,
        inputs: Vec<Expr>,
        output_offset: usize,
    ) -> Expr {
        let key = ExprKey::Lookup(
            Rc::as_ptr(&table) as usize,
            inputs.iter().map(|input| input.id()).collect(),
            output_offset,
        );
        self.intern(key, || BitExpr::Lookup {
            table,
            inputs,
            output_offset,
        })
    }

    pub fn not(&mut self, expr: Expr) -> Expr {
        let key = ExprKey::Not(expr.id());
        self.intern(key, || BitExpr::Not(expr))
    }

    /// Interns a binary operation. All three operators are commutative, so
    /// the children are put into a canonical order first and `a op b`
    /// collapses with `b op a`.
    pub fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        let (left, right) = if left.id() > right.id() {
            (right, left)
        } else {
            (left, right)
        };
        let key = ExprKey::Binary(op, left.id(), right.id());
        self.intern(key, || BitExpr::Binary(op, left, right))
    }

    fn intern(&mut self, key: ExprKey, build: impl FnOnce() -> BitExpr) -> Expr {
        if let Some(node) = self.nodes.get(&key) {
            return node.clone();
        }
        let node = Rc::new(ExprNode {
            id: self.next_id,
            expr: build(),
        });
        self.next_id += 1;
        self.nodes.insert(key, node.clone());
        node
    }
}
