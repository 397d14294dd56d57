use crate::ast::Expr;

/// Reverse of parse: writes the tree back to its canonical text form.
///
/// Every binary/unary operation is fully parenthesized so that textually
/// distinct but semantically identical source (`a+b*c` vs `a + (b*c)`)
/// normalizes to the same canonical string. This is what formula equality
/// and hashing are defined over, not the original source text.
pub fn reconstruct(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Root(inner) | Expr::Paren(inner) => write_expr(out, inner),
        Expr::Binary { op, left, right, .. } => {
            out.push('(');
            write_expr(out, left);
            out.push_str(&format!(" {op} "));
            write_expr(out, right);
            out.push(')');
        }
        Expr::Unary { op, operand, .. } => {
            out.push('(');
            out.push_str(&op.to_string());
            write_expr(out, operand);
            out.push(')');
        }
        Expr::Number(text, _) => out.push_str(text),
        Expr::QuotedString(text, _) => {
            out.push('"');
            out.push_str(text);
            out.push('"');
        }
        Expr::Identifier(name, _) => out.push_str(name),
        Expr::FunctionLookup { name, args, .. } => {
            out.push_str(name);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, arg);
            }
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parser;

    fn canon(source: &str) -> String {
        reconstruct(&parser::parse(source).unwrap())
    }

    #[test]
    fn idempotent_on_reparse() {
        let first = canon("a+b*c");
        let reparsed = reconstruct(&parser::parse(&first).unwrap());
        assert_eq!(first, reparsed);
    }

    #[test]
    fn normalizes_equivalent_parenthesization() {
        assert_eq!(canon("a+b*c"), canon("a + (b*c)"));
    }

    #[test]
    fn distinguishes_different_grouping() {
        assert_ne!(canon("a+b*c"), canon("(a+b)*c"));
    }
}
