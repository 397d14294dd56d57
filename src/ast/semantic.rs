use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::collaborators::FormulaManager;
use crate::error::Error;
use crate::format::Format;
use crate::scope::{LegalScopeId, ScopeManager, ScopeInstanceId};
use crate::variable::VariableLibrary;

/// Threaded through the semantic pass: everything it needs to resolve
/// identifiers and function/operator actions, plus the inherited
/// `asserted_format` attribute is passed as a parameter on each call
/// rather than stored here (it changes per recursive call, unlike the
/// rest of this context).
pub struct SemanticContext<'c> {
    pub scope_instance: ScopeInstanceId,
    pub variables: &'c VariableLibrary,
    pub scopes: &'c ScopeManager,
    pub formulas: &'c dyn FormulaManager,
}

impl<'c> SemanticContext<'c> {
    fn current_legal_scope(&self) -> Result<LegalScopeId, Error> {
        self.scopes.legal_scope_of(self.scope_instance)
    }
}

/// Walks `expr` with the inherited `asserted_format` attribute, returning
/// the node's result format or a semantic failure.
pub fn check_semantics(ctx: &mut SemanticContext, expr: &Expr, asserted: Option<&Format>) -> Result<Format, Error> {
    match expr {
        Expr::Root(inner) => {
            let result = check_semantics(ctx, inner, None)?;
            if let Some(expected) = asserted {
                if &result != expected {
                    return Err(Error::BadFormula {
                        message: format!("expression has format {result}, expected {expected}"),
                        span: Some(expr.span()),
                    });
                }
            }
            Ok(result)
        }
        Expr::Paren(inner) => check_semantics(ctx, inner, None),
        Expr::Binary { op, left, right, span } => {
            let left_fmt = check_semantics(ctx, left, None)?;
            let right_fmt = check_semantics(ctx, right, None)?;
            for action in ctx.formulas.operators().actions_for(*op) {
                if let Some(result) = action.abstract_evaluate(&left_fmt, &right_fmt) {
                    return Ok(result);
                }
            }
            Err(Error::BadOperand {
                message: format!("no action for {op} over ({left_fmt}, {right_fmt}) at {span:?}"),
            })
        }
        Expr::Unary { op, operand, span } => {
            let operand_fmt = check_semantics(ctx, operand, None)?;
            for action in ctx.formulas.operators().unary_actions_for(*op) {
                if let Some(result) = action.abstract_evaluate(&operand_fmt) {
                    return Ok(result);
                }
            }
            Err(Error::BadOperand { message: format!("no action for unary {op} over {operand_fmt} at {span:?}") })
        }
        Expr::Number(text, span) => {
            if text.parse::<i64>().is_ok() {
                Ok(Format::Integer)
            } else if text.parse::<f64>().is_ok() {
                Ok(Format::Real)
            } else {
                Err(Error::BadFormula { message: format!("{text:?} is not a number"), span: Some(*span) })
            }
        }
        Expr::QuotedString(..) => Ok(Format::String),
        Expr::Identifier(name, _) => {
            let ls = ctx.current_legal_scope()?;
            ctx.variables
                .format_of(ls, name)
                .ok_or_else(|| Error::UnknownVariable { name: name.clone() })
        }
        Expr::FunctionLookup { name, args, span } => {
            let function = ctx
                .formulas
                .functions()
                .lookup(name)
                .ok_or_else(|| Error::BadFormula { message: format!("unknown function {name:?}"), span: Some(*span) })?;
            function.check_semantics(ctx, args, asserted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Formula;
    use crate::collaborators::prelude::DefaultFormulaManager;
    use crate::scope::ScopeTree;

    fn ctx_for<'c>(
        variables: &'c VariableLibrary,
        scopes: &'c ScopeManager,
        formulas: &'c DefaultFormulaManager,
    ) -> SemanticContext<'c> {
        SemanticContext { scope_instance: scopes.global_instance(), variables, scopes, formulas }
    }

    #[test]
    fn integer_plus_integer_is_integer_but_widens_with_a_real() {
        let tree = ScopeTree::new();
        let scopes = ScopeManager::new(&tree);
        let variables = VariableLibrary::new();
        let formulas = DefaultFormulaManager::new();
        let mut ctx = ctx_for(&variables, &scopes, &formulas);

        let int_plus_int = Formula::parse("1 + 2").unwrap();
        assert_eq!(check_semantics(&mut ctx, int_plus_int.root(), None).unwrap(), Format::Integer);

        let int_plus_real = Formula::parse("1 + 2.5").unwrap();
        assert_eq!(check_semantics(&mut ctx, int_plus_real.root(), None).unwrap(), Format::Real);
    }

    #[test]
    fn unknown_identifier_is_a_semantic_error() {
        let tree = ScopeTree::new();
        let scopes = ScopeManager::new(&tree);
        let variables = VariableLibrary::new();
        let formulas = DefaultFormulaManager::new();
        let mut ctx = ctx_for(&variables, &scopes, &formulas);

        let formula = Formula::parse("missing").unwrap();
        assert!(matches!(check_semantics(&mut ctx, formula.root(), None), Err(Error::UnknownVariable { .. })));
    }

    #[test]
    fn comparing_a_string_to_a_number_has_no_matching_operator_action() {
        let tree = ScopeTree::new();
        let scopes = ScopeManager::new(&tree);
        let variables = VariableLibrary::new();
        let formulas = DefaultFormulaManager::new();
        let mut ctx = ctx_for(&variables, &scopes, &formulas);

        let formula = Formula::parse("\"a\" + 1").unwrap();
        assert!(matches!(check_semantics(&mut ctx, formula.root(), None), Err(Error::BadOperand { .. })));
    }
}
