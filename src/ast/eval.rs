use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::collaborators::FormulaManager;
use crate::error::Error;
use crate::format::Format;
use crate::scope::{ScopeInstanceId, ScopeManager};
use crate::store::VariableStore;
use crate::value::Value;
use crate::variable::VariableLibrary;

/// Resolved by `SolverManagerConfig` (§6), this decides what happens when
/// an `Identifier` node reads a VID the result store has no value for yet
/// — a transient state that shows up mid-propagation, before every
/// dependency has had its first solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingValuePolicy {
    /// Log a diagnostic and substitute the format's default value. This is
    /// the legacy behavior: the solver manager guarantees a subsequent
    /// recompute will make the value eventually correct.
    SubstituteDefault,
    /// Treat a missing dependency as an invariant violation instead of
    /// silently substituting.
    Strict,
}

impl Default for MissingValuePolicy {
    fn default() -> Self {
        MissingValuePolicy::SubstituteDefault
    }
}

/// Everything the evaluation walk needs. `input` is the stack-valued
/// "current INPUT" attribute: set by the modifier stack to the running
/// value before invoking a formula, and re-bound by the array-component
/// modifier to `input[k]` while it evaluates its inner modifier. `arguments`
/// backs the `arg(n)` built-in for macro-like reusable formulas.
pub struct EvalContext<'c> {
    pub scope_instance: ScopeInstanceId,
    pub owner: Option<u64>,
    pub input: Option<Value>,
    pub arguments: &'c [Value],
    pub variables: &'c VariableLibrary,
    pub scopes: &'c ScopeManager,
    pub store: &'c VariableStore,
    pub formulas: &'c dyn FormulaManager,
    pub missing_policy: MissingValuePolicy,
}

impl<'c> EvalContext<'c> {
    /// Runs `f` with `input` temporarily rebound, restoring the prior value
    /// on every exit path — the guarded-scope shape the design notes ask
    /// for in place of the source's manual stack push/pop.
    pub fn with_input<R>(&mut self, value: Value, f: impl FnOnce(&mut Self) -> R) -> R {
        let prev = self.input.replace(value);
        let result = f(self);
        self.input = prev;
        result
    }

    /// Runs `f` with the current scope instance (and its owner) temporarily
    /// rebound. Lets a modifier's operand formula resolve identifiers
    /// relative to whatever scope instance it was bound to at construction
    /// time (e.g. the equipment instance that granted the modifier) rather
    /// than the scope of the variable the modifier happens to be attached
    /// to — see `Operand::Formula`'s `scope` field.
    pub fn with_scope<R>(&mut self, scope: ScopeInstanceId, f: impl FnOnce(&mut Self) -> R) -> R {
        let prev_scope = self.scope_instance;
        let prev_owner = self.owner;
        self.scope_instance = scope;
        self.owner = self.scopes.owner_of(scope);
        let result = f(self);
        self.scope_instance = prev_scope;
        self.owner = prev_owner;
        result
    }
}

/// Walks `expr`, evaluating it to a `Value` under `ctx`.
pub fn evaluate(ctx: &mut EvalContext, expr: &Expr, asserted: Option<&Format>) -> Result<Value, Error> {
    match expr {
        Expr::Root(inner) => evaluate(ctx, inner, asserted),
        Expr::Paren(inner) => evaluate(ctx, inner, None),
        Expr::Binary { op, left, right, span } => {
            let left_val = evaluate(ctx, left, None)?;
            let right_val = evaluate(ctx, right, None)?;
            let left_fmt = Format::type_of(&left_val);
            let right_fmt = Format::type_of(&right_val);
            for action in ctx.formulas.operators().actions_for(*op) {
                if action.abstract_evaluate(&left_fmt, &right_fmt).is_some() {
                    return action.evaluate(&left_val, &right_val);
                }
            }
            Err(Error::BadOperand { message: format!("no action for {op} over ({left_fmt}, {right_fmt}) at {span:?}") })
        }
        Expr::Unary { op, operand, span } => {
            let val = evaluate(ctx, operand, None)?;
            match op {
                UnaryOp::Neg => match val {
                    Value::Integer(n) => Ok(Value::Integer(-n)),
                    Value::Real(r) => Ok(Value::Real(-r)),
                    other => Err(Error::InvariantViolation {
                        message: format!("unary - applied to non-numeric value {other:?} at {span:?}"),
                    }),
                },
                UnaryOp::Not => match val {
                    Value::Boolean(b) => Ok(Value::Boolean(!b)),
                    other => Err(Error::InvariantViolation {
                        message: format!("unary ! applied to non-boolean value {other:?} at {span:?}"),
                    }),
                },
            }
        }
        Expr::Number(text, span) => parse_number_literal(text, *span),
        Expr::QuotedString(text, _) => Ok(Value::String(text.clone())),
        Expr::Identifier(name, span) => evaluate_identifier(ctx, name, *span),
        Expr::FunctionLookup { name, args, span } => {
            let function = ctx
                .formulas
                .functions()
                .lookup(name)
                .ok_or_else(|| Error::BadFormula { message: format!("unknown function {name:?}"), span: Some(*span) })?;
            function.evaluate(ctx, args, asserted)
        }
    }
}

fn parse_number_literal(text: &str, span: crate::token::Span) -> Result<Value, Error> {
    if let Ok(n) = text.parse::<i64>() {
        Ok(Value::Integer(n))
    } else if let Ok(r) = text.parse::<f64>() {
        Ok(Value::Real(r))
    } else {
        Err(Error::BadFormula { message: format!("{text:?} is not a number"), span: Some(span) })
    }
}

fn evaluate_identifier(ctx: &mut EvalContext, name: &str, span: crate::token::Span) -> Result<Value, Error> {
    let legal_scope = ctx.scopes.legal_scope_of(ctx.scope_instance)?;
    let format = ctx
        .variables
        .format_of(legal_scope, name)
        .ok_or_else(|| Error::UnknownVariable { name: name.to_string() })?;
    let vid = crate::variable::VariableId::new(ctx.scope_instance, name, format.clone());
    match ctx.store.get(&vid) {
        Some(value) => Ok(value.clone()),
        None => match ctx.missing_policy {
            MissingValuePolicy::SubstituteDefault => {
                log::warn!("identifier {name:?} ({vid:?}) has no value yet at {span:?}; substituting default");
                Ok(format.default_value())
            }
            MissingValuePolicy::Strict => Err(Error::InvariantViolation {
                message: format!("identifier {name:?} ({vid:?}) has no value yet at {span:?}"),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Formula;
    use crate::collaborators::prelude::DefaultFormulaManager;
    use crate::scope::ScopeTree;
    use crate::store::VariableStore;
    use crate::variable::VariableId;

    fn eval(source: &str, variables: &VariableLibrary, scopes: &ScopeManager, store: &VariableStore, policy: MissingValuePolicy) -> Result<Value, Error> {
        let formulas = DefaultFormulaManager::new();
        let formula = Formula::parse(source).unwrap();
        let mut ctx = EvalContext {
            scope_instance: scopes.global_instance(),
            owner: None,
            input: None,
            arguments: &[],
            variables,
            scopes,
            store,
            formulas: &formulas,
            missing_policy: policy,
        };
        evaluate(&mut ctx, formula.root(), None)
    }

    #[test]
    fn evaluates_arithmetic_and_string_literals() {
        let tree = ScopeTree::new();
        let scopes = ScopeManager::new(&tree);
        let variables = VariableLibrary::new();
        let store = VariableStore::new();
        assert_eq!(
            eval("2 + 3 * 4", &variables, &scopes, &store, MissingValuePolicy::SubstituteDefault).unwrap(),
            Value::Integer(14)
        );
        assert_eq!(
            eval("\"hi\"", &variables, &scopes, &store, MissingValuePolicy::SubstituteDefault).unwrap(),
            Value::String("hi".into())
        );
    }

    #[test]
    fn missing_value_policy_controls_substitute_vs_strict() {
        let tree = ScopeTree::new();
        let scopes = ScopeManager::new(&tree);
        let mut variables = VariableLibrary::new();
        variables.assert(&tree, "hp", tree.global(), Format::Integer).unwrap();
        let store = VariableStore::new();

        assert_eq!(
            eval("hp", &variables, &scopes, &store, MissingValuePolicy::SubstituteDefault).unwrap(),
            Value::Integer(0)
        );
        assert!(matches!(
            eval("hp", &variables, &scopes, &store, MissingValuePolicy::Strict),
            Err(Error::InvariantViolation { .. })
        ));
    }

    #[test]
    fn identifier_reads_the_stored_value_when_present() {
        let tree = ScopeTree::new();
        let scopes = ScopeManager::new(&tree);
        let mut variables = VariableLibrary::new();
        variables.assert(&tree, "hp", tree.global(), Format::Integer).unwrap();
        let mut store = VariableStore::new();
        store.put(VariableId::new(scopes.global_instance(), "hp", Format::Integer), Value::Integer(42)).unwrap();

        assert_eq!(
            eval("hp * 2", &variables, &scopes, &store, MissingValuePolicy::SubstituteDefault).unwrap(),
            Value::Integer(84)
        );
    }
}
