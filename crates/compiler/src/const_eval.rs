//! Compile-time constant evaluation.
//!
//! A pure fold to `i64`: literals, character constants, enumerator names,
//! the arithmetic/bitwise/comparison/logical operators (with short
//! circuits), the conditional operator, and trivial casts. Anything else,
//! and division or modulo by zero, fails the fold with `None` and the
//! caller reports. Arithmetic wraps two's-complement.
//!
//! Used for enumerator initializers, case labels, array bounds, and
//! global initializers.

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::symbols::{SymbolKind, SymbolTable};

pub fn evaluate_const(expr: &Expr, symbols: &SymbolTable) -> Option<i64> {
    match &expr.kind {
        ExprKind::IntLiteral { value, .. } => Some(*value),
        ExprKind::CharLiteral(c) => Some(*c as i64),
        ExprKind::Identifier(name) => {
            let symbol = symbols.lookup(name)?;
            if symbol.kind != SymbolKind::EnumConstant {
                return None;
            }
            symbol.constant_value
        }
        ExprKind::Unary { op, operand } => {
            let value = evaluate_const(operand, symbols)?;
            match op {
                UnaryOp::Plus => Some(value),
                UnaryOp::Neg => Some(value.wrapping_neg()),
                UnaryOp::BitNot => Some(!value),
                UnaryOp::LogicalNot => Some((value == 0) as i64),
                _ => None,
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            // Short circuits must not evaluate the dead side.
            match op {
                BinaryOp::LogicalAnd => {
                    let left = evaluate_const(lhs, symbols)?;
                    if left == 0 {
                        return Some(0);
                    }
                    let right = evaluate_const(rhs, symbols)?;
                    return Some((right != 0) as i64);
                }
                BinaryOp::LogicalOr => {
                    let left = evaluate_const(lhs, symbols)?;
                    if left != 0 {
                        return Some(1);
                    }
                    let right = evaluate_const(rhs, symbols)?;
                    return Some((right != 0) as i64);
                }
                _ => {}
            }
            let left = evaluate_const(lhs, symbols)?;
            let right = evaluate_const(rhs, symbols)?;
            match op {
                BinaryOp::Add => Some(left.wrapping_add(right)),
                BinaryOp::Sub => Some(left.wrapping_sub(right)),
                BinaryOp::Mul => Some(left.wrapping_mul(right)),
                BinaryOp::Div => {
                    if right == 0 {
                        None
                    } else {
                        Some(left.wrapping_div(right))
                    }
                }
                BinaryOp::Mod => {
                    if right == 0 {
                        None
                    } else {
                        Some(left.wrapping_rem(right))
                    }
                }
                BinaryOp::Shl => Some(left.wrapping_shl(right as u32)),
                BinaryOp::Shr => Some(left.wrapping_shr(right as u32)),
                BinaryOp::BitAnd => Some(left & right),
                BinaryOp::BitOr => Some(left | right),
                BinaryOp::BitXor => Some(left ^ right),
                BinaryOp::Lt => Some((left < right) as i64),
                BinaryOp::Gt => Some((left > right) as i64),
                BinaryOp::Le => Some((left <= right) as i64),
                BinaryOp::Ge => Some((left >= right) as i64),
                BinaryOp::Eq => Some((left == right) as i64),
                BinaryOp::Ne => Some((left != right) as i64),
                BinaryOp::Comma => Some(right),
                BinaryOp::LogicalAnd | BinaryOp::LogicalOr => None,
            }
        }
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            let chosen = if evaluate_const(cond, symbols)? != 0 {
                then_expr
            } else {
                else_expr
            };
            evaluate_const(chosen, symbols)
        }
        // Trivial cast: the value carries through unchanged.
        ExprKind::Cast { operand, .. } => evaluate_const(operand, symbols),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::SourceLocation;
    use crate::symbols::Symbol;
    use crate::types::CType;

    fn expr(kind: ExprKind) -> Expr {
        Expr::new(kind, SourceLocation::builtin())
    }

    fn int(value: i64) -> Expr {
        expr(ExprKind::IntLiteral {
            value,
            unsigned: false,
            long: false,
            long_long: false,
        })
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        expr(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    #[test]
    fn test_arithmetic_folds() {
        let symbols = SymbolTable::new();
        let e = binary(BinaryOp::Add, int(3), binary(BinaryOp::Mul, int(4), int(2)));
        assert_eq!(evaluate_const(&e, &symbols), Some(11));
    }

    #[test]
    fn test_division_by_zero_fails() {
        let symbols = SymbolTable::new();
        assert_eq!(
            evaluate_const(&binary(BinaryOp::Div, int(1), int(0)), &symbols),
            None
        );
        assert_eq!(
            evaluate_const(&binary(BinaryOp::Mod, int(1), int(0)), &symbols),
            None
        );
    }

    #[test]
    fn test_short_circuit_skips_dead_division() {
        let symbols = SymbolTable::new();
        // 0 && (1/0) folds to 0 because the right side is never touched.
        let dead = binary(BinaryOp::Div, int(1), int(0));
        let e = binary(BinaryOp::LogicalAnd, int(0), dead);
        assert_eq!(evaluate_const(&e, &symbols), Some(0));

        let dead = binary(BinaryOp::Div, int(1), int(0));
        let e = binary(BinaryOp::LogicalOr, int(5), dead);
        assert_eq!(evaluate_const(&e, &symbols), Some(1));
    }

    #[test]
    fn test_conditional_picks_arm() {
        let symbols = SymbolTable::new();
        let e = expr(ExprKind::Conditional {
            cond: Box::new(int(0)),
            then_expr: Box::new(int(10)),
            else_expr: Box::new(int(20)),
        });
        assert_eq!(evaluate_const(&e, &symbols), Some(20));
    }

    #[test]
    fn test_unary_operators() {
        let symbols = SymbolTable::new();
        let neg = expr(ExprKind::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(int(7)),
        });
        assert_eq!(evaluate_const(&neg, &symbols), Some(-7));
        let not = expr(ExprKind::Unary {
            op: UnaryOp::LogicalNot,
            operand: Box::new(int(7)),
        });
        assert_eq!(evaluate_const(&not, &symbols), Some(0));
        let bitnot = expr(ExprKind::Unary {
            op: UnaryOp::BitNot,
            operand: Box::new(int(0)),
        });
        assert_eq!(evaluate_const(&bitnot, &symbols), Some(-1));
    }

    #[test]
    fn test_char_literal_folds_to_byte() {
        let symbols = SymbolTable::new();
        assert_eq!(
            evaluate_const(&expr(ExprKind::CharLiteral(b'A')), &symbols),
            Some(65)
        );
    }

    #[test]
    fn test_enumerator_lookup() {
        let mut symbols = SymbolTable::new();
        symbols
            .insert(
                Symbol::new(
                    "BLUE",
                    SymbolKind::EnumConstant,
                    CType::enumeration("color"),
                    SourceLocation::builtin(),
                )
                .with_constant(5),
            )
            .unwrap();
        let e = expr(ExprKind::Identifier("BLUE".to_string()));
        assert_eq!(evaluate_const(&e, &symbols), Some(5));
    }

    #[test]
    fn test_plain_variable_does_not_fold() {
        let mut symbols = SymbolTable::new();
        symbols
            .insert(Symbol::new(
                "x",
                SymbolKind::Variable,
                CType::int(),
                SourceLocation::builtin(),
            ))
            .unwrap();
        let e = expr(ExprKind::Identifier("x".to_string()));
        assert_eq!(evaluate_const(&e, &symbols), None);
    }

    #[test]
    fn test_wrapping_overflow() {
        let symbols = SymbolTable::new();
        let e = binary(BinaryOp::Add, int(i64::MAX), int(1));
        assert_eq!(evaluate_const(&e, &symbols), Some(i64::MIN));
    }
}
