//! Constant Folding Optimization
//!
//! Evaluates constant expressions at compile time, bottom-up, with the same
//! semantics the VM applies at run time.

use crate::compiler::ir::{walk_stmts_mut, BinaryOp, IrExpr, IrProgram, LogicalOp, UnaryOp};
use crate::vm::value::number_to_string;

/// Constant folding optimizer
#[derive(Debug, Default)]
pub struct ConstantFolder;

impl ConstantFolder {
    /// Create a new constant folder
    pub fn new() -> Self {
        Self
    }

    /// Fold constants in every function, returning the number of folds
    pub fn fold(&self, program: &mut IrProgram) -> usize {
        let mut folded = 0;
        for function in &mut program.functions {
            walk_stmts_mut(&mut function.body, &mut |stmt| {
                for expr in stmt.kind.exprs_mut() {
                    folded += self.fold_expr(expr);
                }
            });
        }
        folded
    }

    /// Fold an expression tree in place
    pub fn fold_expr(&self, expr: &mut IrExpr) -> usize {
        let mut folded = 0;
        for child in expr.children_mut() {
            folded += self.fold_expr(child);
        }
        if let Some(result) = self.eval(expr) {
            *expr = result;
            folded += 1;
        }
        folded
    }

    fn eval(&self, expr: &IrExpr) -> Option<IrExpr> {
        match expr {
            IrExpr::Unary(op, operand) if operand.is_constant() => self.eval_unary(*op, operand),
            IrExpr::Binary(op, left, right) if left.is_constant() && right.is_constant() => {
                self.eval_binary(*op, left, right)
            }
            IrExpr::Logical(op, left, right) if left.is_constant() => {
                let take_right = match op {
                    LogicalOp::And => truthy(left),
                    LogicalOp::Or => !truthy(left),
                    LogicalOp::Nullish => matches!(**left, IrExpr::Undefined | IrExpr::Null),
                };
                Some(if take_right { (**right).clone() } else { (**left).clone() })
            }
            IrExpr::Conditional(condition, when_true, when_false) if condition.is_constant() => {
                Some(if truthy(condition) {
                    (**when_true).clone()
                } else {
                    (**when_false).clone()
                })
            }
            _ => None,
        }
    }

    /// Evaluate a unary operation on a constant
    fn eval_unary(&self, op: UnaryOp, operand: &IrExpr) -> Option<IrExpr> {
        match (op, operand) {
            (UnaryOp::Neg, IrExpr::Number(v)) => Some(IrExpr::Number(-v)),
            (UnaryOp::Plus, IrExpr::Number(v)) => Some(IrExpr::Number(*v)),
            (UnaryOp::Not, c) => Some(IrExpr::Bool(!truthy(c))),
            (UnaryOp::TypeOf, c) => Some(IrExpr::String(type_of(c).to_string())),
            _ => None,
        }
    }

    /// Evaluate a binary operation on constants
    fn eval_binary(&self, op: BinaryOp, left: &IrExpr, right: &IrExpr) -> Option<IrExpr> {
        use IrExpr::{Bool, Number, String as Str};
        Some(match (op, left, right) {
            // Arithmetic
            (BinaryOp::Add, Number(a), Number(b)) => Number(a + b),
            (BinaryOp::Sub, Number(a), Number(b)) => Number(a - b),
            (BinaryOp::Mul, Number(a), Number(b)) => Number(a * b),
            (BinaryOp::Div, Number(a), Number(b)) => Number(a / b),
            (BinaryOp::Mod, Number(a), Number(b)) => Number(a % b),

            // String concatenation
            (BinaryOp::Add, Str(_), _) | (BinaryOp::Add, _, Str(_)) => {
                Str(format!("{}{}", display(left), display(right)))
            }

            // Numeric comparisons
            (BinaryOp::Lt, Number(a), Number(b)) => Bool(a < b),
            (BinaryOp::Le, Number(a), Number(b)) => Bool(a <= b),
            (BinaryOp::Gt, Number(a), Number(b)) => Bool(a > b),
            (BinaryOp::Ge, Number(a), Number(b)) => Bool(a >= b),

            // Equality
            (BinaryOp::StrictEq, a, b) => Bool(strict_equals(a, b)),
            (BinaryOp::StrictNe, a, b) => Bool(!strict_equals(a, b)),
            (BinaryOp::LooseEq, a, b) => Bool(loose_equals(a, b)?),
            (BinaryOp::LooseNe, a, b) => Bool(!loose_equals(a, b)?),

            _ => return None,
        })
    }
}

fn truthy(c: &IrExpr) -> bool {
    match c {
        IrExpr::Undefined | IrExpr::Null => false,
        IrExpr::Bool(b) => *b,
        IrExpr::Number(n) => *n != 0.0 && !n.is_nan(),
        IrExpr::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn type_of(c: &IrExpr) -> &'static str {
    match c {
        IrExpr::Undefined => "undefined",
        IrExpr::Null => "object",
        IrExpr::Bool(_) => "boolean",
        IrExpr::Number(_) => "number",
        _ => "string",
    }
}

fn display(c: &IrExpr) -> String {
    match c {
        IrExpr::Undefined => "undefined".to_string(),
        IrExpr::Null => "null".to_string(),
        IrExpr::Bool(b) => b.to_string(),
        IrExpr::Number(n) => number_to_string(*n),
        IrExpr::String(s) => s.clone(),
        _ => String::new(),
    }
}

fn strict_equals(a: &IrExpr, b: &IrExpr) -> bool {
    match (a, b) {
        (IrExpr::Undefined, IrExpr::Undefined) | (IrExpr::Null, IrExpr::Null) => true,
        (IrExpr::Bool(x), IrExpr::Bool(y)) => x == y,
        (IrExpr::Number(x), IrExpr::Number(y)) => x == y,
        (IrExpr::String(x), IrExpr::String(y)) => x == y,
        _ => false,
    }
}

/// Loose equality, folded only when both sides share a type or are both
/// nullish
fn loose_equals(a: &IrExpr, b: &IrExpr) -> Option<bool> {
    let nullish = |c: &IrExpr| matches!(c, IrExpr::Undefined | IrExpr::Null);
    if nullish(a) || nullish(b) {
        return Some(nullish(a) && nullish(b));
    }
    if std::mem::discriminant(a) == std::mem::discriminant(b) {
        return Some(strict_equals(a, b));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(mut expr: IrExpr) -> IrExpr {
        ConstantFolder::new().fold_expr(&mut expr);
        expr
    }

    fn bin(op: BinaryOp, a: IrExpr, b: IrExpr) -> IrExpr {
        IrExpr::Binary(op, a.boxed(), b.boxed())
    }

    #[test]
    fn test_fold_arithmetic_and_concat() {
        let e = bin(
            BinaryOp::Add,
            IrExpr::String("total=".into()),
            bin(BinaryOp::Mul, IrExpr::Number(4.0), IrExpr::Number(5.0)),
        );
        assert_eq!(fold(e), IrExpr::String("total=20".into()));
        assert_eq!(
            fold(bin(BinaryOp::Add, IrExpr::String("x".into()), IrExpr::Number(0.5))),
            IrExpr::String("x0.5".into())
        );
        assert_eq!(
            fold(bin(BinaryOp::Mod, IrExpr::Number(-7.0), IrExpr::Number(3.0))),
            IrExpr::Number(-1.0)
        );
    }

    #[test]
    fn test_fold_equality() {
        assert_eq!(
            fold(bin(BinaryOp::LooseEq, IrExpr::Null, IrExpr::Undefined)),
            IrExpr::Bool(true)
        );
        assert_eq!(
            fold(bin(BinaryOp::StrictEq, IrExpr::Null, IrExpr::Undefined)),
            IrExpr::Bool(false)
        );
        assert_eq!(
            fold(bin(BinaryOp::StrictNe, IrExpr::Number(f64::NAN), IrExpr::Number(f64::NAN))),
            IrExpr::Bool(true)
        );
        // `1 == "1"` needs run-time coercion and is left alone
        let mixed = bin(BinaryOp::LooseEq, IrExpr::Number(1.0), IrExpr::String("1".into()));
        assert_eq!(fold(mixed.clone()), mixed);
    }

    #[test]
    fn test_fold_short_circuit_keeps_dynamic_side() {
        let dynamic = IrExpr::Builtin(crate::compiler::bytecode::Builtin::Console);
        let e = IrExpr::Logical(LogicalOp::And, IrExpr::Bool(true).boxed(), dynamic.clone().boxed());
        assert_eq!(fold(e), dynamic);
        let e = IrExpr::Logical(LogicalOp::Nullish, IrExpr::Number(0.0).boxed(), dynamic.boxed());
        assert_eq!(fold(e), IrExpr::Number(0.0));
        let e = IrExpr::Conditional(
            IrExpr::String(String::new()).boxed(),
            IrExpr::Number(1.0).boxed(),
            IrExpr::Number(2.0).boxed(),
        );
        assert_eq!(fold(e), IrExpr::Number(2.0));
    }

    #[test]
    fn test_fold_unary() {
        assert_eq!(
            fold(IrExpr::Unary(UnaryOp::TypeOf, IrExpr::Null.boxed())),
            IrExpr::String("object".into())
        );
        assert_eq!(
            fold(IrExpr::Unary(UnaryOp::Not, IrExpr::Number(0.0).boxed())),
            IrExpr::Bool(true)
        );
    }
}
