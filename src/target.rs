//! Named registers that bit reads refer to.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::expr::Expr;

/// The kind of a read target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    /// An external input register; its bits are free variables of the model.
    Input,
    /// An internal state register updated by one expression per bit.
    State,
}

/// A named register of the circuit.
///
/// State registers carry one update expression per bit, filled in by the
/// parser after the target has been registered so that the expressions may
/// read the register itself. The resulting reference cycles live for the
/// process lifetime.
pub struct ReadTarget {
    kind: TargetKind,
    name: String,
    size: usize,
    update_expressions: RefCell<Vec<Expr>>,
}

impl ReadTarget {
    pub fn new(kind: TargetKind, name: &str, size: usize) -> Rc<ReadTarget> {
        Rc::new(ReadTarget {
            kind,
            name: name.to_string(),
            size,
            update_expressions: RefCell::new(Vec::new()),
        })
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the size of the register in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn push_update_expression(&self, expr: Expr) {
        self.update_expressions.borrow_mut().push(expr);
    }

    pub fn num_update_expressions(&self) -> usize {
        self.update_expressions.borrow().len()
    }

    /// Returns the expression computing bit `offset` of the register.
    pub fn update_expression(&self, offset: usize) -> Result<Expr> {
        self.update_expressions
            .borrow()
            .get(offset)
            .cloned()
            .ok_or_else(|| Error::MissingUpdateExpression {
                target: self.name.clone(),
                offset,
            })
    }

    pub fn update_expressions(&self) -> Ref<Vec<Expr>> {
        self.update_expressions.borrow()
    }
}

impl fmt::Debug for ReadTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.name)
    }
}

/// A single bit of a read target; the free variable type of circuit ANF
/// polynomials. Equality and hashing are by target identity.
#[derive(Clone)]
pub struct ReadBit {
    pub target: Rc<ReadTarget>,
    pub offset: usize,
}

impl PartialEq for ReadBit {
    fn eq(&self, other: &ReadBit) -> bool {
        Rc::ptr_eq(&self.target, &other.target) && self.offset == other.offset
    }
}

impl Eq for ReadBit {}

impl Hash for ReadBit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.target) as usize).hash(state);
        self.offset.hash(state);
    }
}

impl fmt::Debug for ReadBit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}[{}]", self.target.name(), self.offset)
    }
}

impl fmt::Display for ReadBit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}[{}]", self.target.name(), self.offset)
    }
}
