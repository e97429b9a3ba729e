//! S-box invocation blocks, the block-level memoisation key of the
//! modeller traversals.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::expr::Expr;
use crate::lookup_table::LookupTable;

/// One application of a lookup table to a particular sequence of input
/// expressions. All output offsets of the same block share one modelled
/// output vector, so repeated reads of the same S-box instantiation reuse
/// its variables and constraints.
#[derive(Clone)]
pub struct SBoxInputBlock {
    pub inputs: Vec<Expr>,
    pub table: Rc<LookupTable>,
}

impl PartialEq for SBoxInputBlock {
    fn eq(&self, other: &SBoxInputBlock) -> bool {
        Rc::ptr_eq(&self.table, &other.table)
            && self.inputs.len() == other.inputs.len()
            && self
                .inputs
                .iter()
                .zip(other.inputs.iter())
                .all(|(a, b)| Rc::ptr_eq(a, b))
    }
}

impl Eq for SBoxInputBlock {}

impl Hash for SBoxInputBlock {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for input in &self.inputs {
            state.write_u64(input.id());
        }
        state.write_usize(Rc::as_ptr(&self.table) as usize);
    }
}

impl fmt::Debug for SBoxInputBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(", self.table.name())?;
        for (i, input) in self.inputs.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", input)?;
        }
        write!(f, ")")
    }
}
