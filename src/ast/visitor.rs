use crate::ast::Expr;

/// Shared tree walk shape: a pass implements only the node kinds it cares
/// about and falls back to `walk_expr` for the rest. Kept as a trait
/// (rather than just three free functions) so future passes only have to
/// override what's new.
pub trait Visitor {
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, expr: &Expr) {
    match expr {
        Expr::Root(inner) | Expr::Paren(inner) => v.visit_expr(inner),
        Expr::Binary { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        Expr::Unary { operand, .. } => v.visit_expr(operand),
        Expr::Number(..) | Expr::QuotedString(..) | Expr::Identifier(..) => {}
        Expr::FunctionLookup { args, .. } => {
            for arg in args {
                v.visit_expr(arg);
            }
        }
    }
}
