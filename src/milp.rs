//! Mixed-integer linear models with deferred variables.
//!
//! Division-property encoding rewrites a value every time it is consumed
//! again: a variable used twice must be split into a sum of fresh variables
//! (the Copy rule). Deferred variables are handles into a slot arena; a slot
//! holds the current real variable, and `copy` redirects it so earlier
//! references transparently become the first half of the split without any
//! constraint rewriting.

use std::fmt::Write;

/// A real binary model variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Var(usize);

impl Var {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A handle to a deferred variable slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeferredVar(usize);

/// Comparison operators of linear constraints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparator {
    LessEqual,
    Equal,
    GreaterEqual,
}

impl Comparator {
    fn symbol(self) -> &'static str {
        match self {
            Comparator::LessEqual => "<=",
            Comparator::Equal => "=",
            Comparator::GreaterEqual => ">=",
        }
    }
}

/// `sum c_i * x_i + constant` over variables of type `T`.
#[derive(Clone, Debug)]
pub struct LinearExpr<T> {
    pub items: Vec<(T, i64)>,
    pub constant: i64,
}

impl<T> LinearExpr<T> {
    pub fn new() -> LinearExpr<T> {
        LinearExpr {
            items: Vec::new(),
            constant: 0,
        }
    }

    pub fn plus(mut self, var: T, coefficient: i64) -> LinearExpr<T> {
        self.items.push((var, coefficient));
        self
    }

    pub fn plus_constant(mut self, constant: i64) -> LinearExpr<T> {
        self.constant += constant;
        self
    }
}

impl<T> Default for LinearExpr<T> {
    fn default() -> LinearExpr<T> {
        LinearExpr::new()
    }
}

/// A linear constraint `expr cmp rhs`.
#[derive(Clone, Debug)]
pub struct Constraint<T> {
    pub expr: LinearExpr<T>,
    pub comparator: Comparator,
    pub rhs: i64,
}

/// Objective sense.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

/// A MILP over binary variables, with constraints over real variables and
/// over deferred slots. Deferred constraints are resolved against the slot
/// arena at serialisation time.
#[derive(Default)]
pub struct MilpModel {
    num_vars: usize,
    slots: Vec<Var>,
    constraints: Vec<Constraint<Var>>,
    deferred_constraints: Vec<Constraint<DeferredVar>>,
    objective: Option<(LinearExpr<DeferredVar>, Sense)>,
}

impl MilpModel {
    pub fn new() -> MilpModel {
        MilpModel::default()
    }

    pub fn num_variables(&self) -> usize {
        self.num_vars
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len() + self.deferred_constraints.len()
    }

    pub fn create_variable(&mut self) -> Var {
        let var = Var(self.num_vars);
        self.num_vars += 1;
        var
    }

    /// Wraps a real variable in a fresh deferred slot.
    pub fn defer(&mut self, var: Var) -> DeferredVar {
        self.slots.push(var);
        DeferredVar(self.slots.len() - 1)
    }

    pub fn create_deferred(&mut self) -> DeferredVar {
        let var = self.create_variable();
        self.defer(var)
    }

    /// The real variable a deferred slot currently points to.
    pub fn resolve(&self, deferred: DeferredVar) -> Var {
        self.slots[deferred.0]
    }

    pub fn add_constraint(&mut self, constraint: Constraint<Var>) {
        self.constraints.push(constraint);
    }

    pub fn add_deferred_constraint(&mut self, constraint: Constraint<DeferredVar>) {
        self.deferred_constraints.push(constraint);
    }

    /// The Copy rule: for a deferred slot pointing at `a`, allocates fresh
    /// `b0`, `b1`, emits `a - b0 - b1 = 0`, redirects the slot to `b0` and
    /// returns a new deferred variable for `b1`.
    pub fn copy(&mut self, from: DeferredVar) -> DeferredVar {
        let a = self.resolve(from);
        let b0 = self.create_variable();
        let b1 = self.create_variable();
        self.add_constraint(Constraint {
            expr: LinearExpr::new().plus(a, 1).plus(b0, -1).plus(b1, -1),
            comparator: Comparator::Equal,
            rhs: 0,
        });
        self.slots[from.0] = b0;
        self.defer(b1)
    }

    /// XOR propagation: `a + b - c = 0`.
    pub fn xor(&mut self, a: DeferredVar, b: DeferredVar) -> DeferredVar {
        let c = self.create_deferred();
        self.add_deferred_constraint(Constraint {
            expr: LinearExpr::new().plus(a, 1).plus(b, 1).plus(c, -1),
            comparator: Comparator::Equal,
            rhs: 0,
        });
        c
    }

    /// AND propagation: `c >= a`, `c >= b`, `c <= a + b`.
    pub fn and(&mut self, a: DeferredVar, b: DeferredVar) -> DeferredVar {
        let c = self.create_deferred();
        self.add_deferred_constraint(Constraint {
            expr: LinearExpr::new().plus(c, 1).plus(a, -1),
            comparator: Comparator::GreaterEqual,
            rhs: 0,
        });
        self.add_deferred_constraint(Constraint {
            expr: LinearExpr::new().plus(c, 1).plus(b, -1),
            comparator: Comparator::GreaterEqual,
            rhs: 0,
        });
        self.add_deferred_constraint(Constraint {
            expr: LinearExpr::new().plus(c, 1).plus(a, -1).plus(b, -1),
            comparator: Comparator::LessEqual,
            rhs: 0,
        });
        c
    }

    /// A deferred variable pinned to 0 or 1.
    pub fn add_constant(&mut self, value: bool) -> DeferredVar {
        let var = self.create_variable();
        self.add_constraint(Constraint {
            expr: LinearExpr::new().plus(var, 1),
            comparator: Comparator::Equal,
            rhs: value as i64,
        });
        self.defer(var)
    }

    pub fn set_objective(&mut self, expr: LinearExpr<DeferredVar>, sense: Sense) {
        self.objective = Some((expr, sense));
    }

    fn resolve_expr(&self, expr: &LinearExpr<DeferredVar>) -> LinearExpr<Var> {
        LinearExpr {
            items: expr
                .items
                .iter()
                .map(|&(deferred, coefficient)| (self.resolve(deferred), coefficient))
                .collect(),
            constant: expr.constant,
        }
    }

    fn write_expr(out: &mut String, expr: &LinearExpr<Var>) {
        for &(var, coefficient) in &expr.items {
            let sign = if coefficient < 0 { '-' } else { '+' };
            write!(out, " {} {:.6} x_{}", sign, coefficient.abs() as f64, var.0).unwrap();
        }
    }

    /// Serialises the model in LP textual form. Returns the rendered model
    /// and the name assigned to each real variable, indexed by variable.
    pub fn lp_format(&self) -> (String, Vec<String>) {
        let names: Vec<String> = (0..self.num_vars).map(|i| format!("x_{}", i)).collect();
        let mut out = String::new();

        let sense = match &self.objective {
            Some((_, Sense::Maximize)) => "Maximize",
            _ => "Minimize",
        };
        out.push_str(sense);
        out.push('\n');
        out.push_str(" obj:");
        if let Some((expr, _)) = &self.objective {
            Self::write_expr(&mut out, &self.resolve_expr(expr));
        }
        out.push('\n');

        out.push_str("Subject To\n");
        let resolved = self
            .constraints
            .iter()
            .cloned()
            .chain(self.deferred_constraints.iter().map(|constraint| Constraint {
                expr: self.resolve_expr(&constraint.expr),
                comparator: constraint.comparator,
                rhs: constraint.rhs,
            }));
        for (index, constraint) in resolved.enumerate() {
            write!(out, " c{}:", index).unwrap();
            Self::write_expr(&mut out, &constraint.expr);
            writeln!(
                out,
                " {} {:.6}",
                constraint.comparator.symbol(),
                (constraint.rhs - constraint.expr.constant) as f64
            )
            .unwrap();
        }

        out.push_str("Binary\n");
        for name in &names {
            writeln!(out, " {}", name).unwrap();
        }

        (out, names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_splits_and_redirects() {
        let mut model = MilpModel::new();
        let dv = model.create_deferred();
        let a = model.resolve(dv);

        let dv1 = model.copy(dv);
        let dv2 = model.copy(dv);

        // a = b0 + b1, then b0 = b2 + b3: the original handle now reads b2,
        // the copies read b1 and b3.
        assert_eq!(model.num_variables(), 5);
        assert_eq!(model.constraints.len(), 2);

        let b1 = model.resolve(dv1);
        let b2 = model.resolve(dv);
        let b3 = model.resolve(dv2);
        assert_eq!(b1.index(), 2);
        assert_eq!(b2.index(), 3);
        assert_eq!(b3.index(), 4);

        let first = &model.constraints[0];
        assert_eq!(first.expr.items[0], (a, 1));
        assert_eq!(first.comparator, Comparator::Equal);
        assert_eq!(first.rhs, 0);
        let second = &model.constraints[1];
        assert_eq!(second.expr.items[0].0.index(), 1);
    }

    #[test]
    fn deferred_constraints_resolve_at_emit_time() {
        let mut model = MilpModel::new();
        let a = model.create_deferred();
        let b = model.create_deferred();
        let c = model.xor(a, b);

        // Splitting `a` after the xor constraint was recorded: the emitted
        // constraint must reference the redirected variable.
        let _a1 = model.copy(a);
        let _ = c;

        let (lp, names) = model.lp_format();
        assert_eq!(names.len(), 5);
        // The xor row references x_3 (the first split half), not x_0.
        let xor_row = lp
            .lines()
            .find(|line| line.contains("c1:"))
            .expect("xor constraint");
        assert!(xor_row.contains("x_3"), "row was: {}", xor_row);
        assert!(xor_row.contains("x_1") && xor_row.contains("x_2"));
    }

    #[test]
    fn and_emits_three_rows() {
        let mut model = MilpModel::new();
        let a = model.create_deferred();
        let b = model.create_deferred();
        let _c = model.and(a, b);
        assert_eq!(model.deferred_constraints.len(), 3);
    }

    #[test]
    fn lp_format_layout() {
        let mut model = MilpModel::new();
        let a = model.add_constant(true);
        let b = model.create_deferred();
        let c = model.xor(a, b);
        model.set_objective(LinearExpr::new().plus(c, 1), Sense::Minimize);

        let (lp, _) = model.lp_format();
        let expected = "Minimize\n obj: + 1.000000 x_2\n\
                        Subject To\n \
                        c0: + 1.000000 x_0 = 1.000000\n \
                        c1: + 1.000000 x_0 + 1.000000 x_1 - 1.000000 x_2 = 0.000000\n\
                        Binary\n x_0\n x_1\n x_2\n";
        assert_eq!(lp, expected);
    }
}
