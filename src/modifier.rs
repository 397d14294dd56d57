//! C6. The per-variable ordered list of priority-ranked modifiers that,
//! given a base value, produces that variable's current value.

use std::cmp::Ordering;

use crate::ast::eval::EvalContext;
use crate::ast::{self, Formula};
use crate::error::Error;
use crate::format::Format;
use crate::scope::ScopeInstanceId;
use crate::value::Value;

/// Opaque identity of whoever attached a modifier (an item id, an ability
/// id, a buff instance id — the core never interprets it). Paired with a
/// `Modifier`, it is the removal/DG-edge identity per the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Source(pub u64);

/// Either a constant value or a formula evaluated each time the modifier
/// runs. A formula operand is bound to the scope instance its identifiers
/// resolve in at construction time — ordinarily the scope instance of the
/// variable the modifier is being attached to, but a caller may bind it to
/// a different scope instance (e.g. the equipment instance that granted
/// the modifier) so a global variable's modifier can read a per-instance
/// variable that lives in a descendant scope.
#[derive(Debug, Clone)]
pub enum Operand {
    Constant(Value),
    Formula { formula: Formula, scope: ScopeInstanceId },
}

impl Operand {
    pub fn formula(formula: Formula, scope: ScopeInstanceId) -> Operand {
        Operand::Formula { formula, scope }
    }

    fn instruction(&self) -> String {
        match self {
            Operand::Constant(v) => v.to_string(),
            Operand::Formula { formula, .. } => formula.source().to_string(),
        }
    }

    fn evaluate(&self, ctx: &mut EvalContext) -> Result<Value, Error> {
        match self {
            Operand::Constant(v) => Ok(v.clone()),
            Operand::Formula { formula, scope } => {
                ctx.with_scope(*scope, |ctx| ast::eval::evaluate(ctx, formula.root(), None))
            }
        }
    }

    fn dependencies(&self, ctx: &mut ast::dependency::DependencyContext) -> Result<(), Error> {
        match self {
            Operand::Constant(_) => Ok(()),
            Operand::Formula { formula, scope } => {
                ctx.with_scope(*scope, |ctx| ast::dependency::collect_dependencies(ctx, formula.root()))
            }
        }
    }
}

impl PartialEq for Operand {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operand::Constant(a), Operand::Constant(b)) => a == b,
            (Operand::Formula { formula: a, scope: sa }, Operand::Formula { formula: b, scope: sb }) => a == b && sa == sb,
            _ => false,
        }
    }
}

/// A unit of computation attached to a variable: given an input value of
/// the variable's format, produces a new value of that format.
///
/// `ArrayComponent` wraps an inner modifier and targets one position of an
/// array-of-T value; if the array is too short it is a no-op.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    Set { format: Format, operand: Operand },
    Add { format: Format, operand: Operand },
    Multiply { format: Format, operand: Operand },
    Min { format: Format, operand: Operand },
    Max { format: Format, operand: Operand },
    ArrayComponent { index: usize, inner: Box<Modifier> },
}

impl Modifier {
    pub fn format(&self) -> Format {
        match self {
            Modifier::Set { format, .. }
            | Modifier::Add { format, .. }
            | Modifier::Multiply { format, .. }
            | Modifier::Min { format, .. }
            | Modifier::Max { format, .. } => format.clone(),
            Modifier::ArrayComponent { inner, .. } => Format::array_of(inner.format()),
        }
    }

    /// Default priority for this modifier's kind: lower applies first.
    /// Sets precede additive operations which precede multiplicative
    /// operations which precede min/max clamps. `ArrayComponent` takes on
    /// its inner modifier's priority class, since it is conceptually "that
    /// kind of modifier, scoped to one array slot."
    pub fn priority(&self) -> i64 {
        match self {
            Modifier::Set { .. } => 0,
            Modifier::Add { .. } => 100,
            Modifier::Multiply { .. } => 200,
            Modifier::Min { .. } => 300,
            Modifier::Max { .. } => 300,
            Modifier::ArrayComponent { inner, .. } => inner.priority(),
        }
    }

    /// Round-trips the originating source text of this modifier (the
    /// operand's instruction string; array-component prefixes its index).
    pub fn instruction(&self) -> String {
        match self {
            Modifier::Set { operand, .. } => format!("set({})", operand.instruction()),
            Modifier::Add { operand, .. } => format!("add({})", operand.instruction()),
            Modifier::Multiply { operand, .. } => format!("multiply({})", operand.instruction()),
            Modifier::Min { operand, .. } => format!("min({})", operand.instruction()),
            Modifier::Max { operand, .. } => format!("max({})", operand.instruction()),
            Modifier::ArrayComponent { index, inner } => format!("at[{index}]({})", inner.instruction()),
        }
    }

    /// The dependency set: VIDs read while computing this modifier's
    /// operand(s), resolved in `ctx`'s scope instance.
    pub fn dependencies(&self, ctx: &mut ast::dependency::DependencyContext) -> Result<(), Error> {
        match self {
            Modifier::Set { operand, .. }
            | Modifier::Add { operand, .. }
            | Modifier::Multiply { operand, .. }
            | Modifier::Min { operand, .. }
            | Modifier::Max { operand, .. } => operand.dependencies(ctx),
            Modifier::ArrayComponent { inner, .. } => inner.dependencies(ctx),
        }
    }

    /// Applies this modifier to `input`, threading `input` as the
    /// evaluation context's current `INPUT` attribute so the operand
    /// formula can read it back (the "chained modifiers" case in the
    /// design doc).
    pub fn apply(&self, input: Value, ctx: &mut EvalContext) -> Result<Value, Error> {
        match self {
            Modifier::Set { operand, .. } => ctx.with_input(input, |ctx| operand.evaluate(ctx)),
            Modifier::Add { operand, .. } => {
                let rhs = ctx.with_input(input.clone(), |ctx| operand.evaluate(ctx))?;
                combine_with_operator(ctx, crate::ast::BinaryOp::Add, input, rhs)
            }
            Modifier::Multiply { operand, .. } => {
                let rhs = ctx.with_input(input.clone(), |ctx| operand.evaluate(ctx))?;
                combine_with_operator(ctx, crate::ast::BinaryOp::Mul, input, rhs)
            }
            Modifier::Min { operand, .. } => {
                let rhs = ctx.with_input(input.clone(), |ctx| operand.evaluate(ctx))?;
                pick_extreme(input, rhs, true)
            }
            Modifier::Max { operand, .. } => {
                let rhs = ctx.with_input(input.clone(), |ctx| operand.evaluate(ctx))?;
                pick_extreme(input, rhs, false)
            }
            Modifier::ArrayComponent { index, inner } => {
                let mut items = match input {
                    Value::Array(items) => items,
                    other => {
                        return Err(Error::InvariantViolation {
                            message: format!("array-component modifier applied to non-array value {other:?}"),
                        })
                    }
                };
                if *index >= items.len() {
                    return Ok(Value::Array(items));
                }
                let component = items[*index].clone();
                let updated = ctx.with_input(component.clone(), |ctx| inner.apply(component, ctx))?;
                items[*index] = updated;
                Ok(Value::Array(items))
            }
        }
    }
}

fn combine_with_operator(ctx: &EvalContext, op: crate::ast::BinaryOp, left: Value, right: Value) -> Result<Value, Error> {
    let left_fmt = Format::type_of(&left);
    let right_fmt = Format::type_of(&right);
    for action in ctx.formulas.operators().actions_for(op) {
        if action.abstract_evaluate(&left_fmt, &right_fmt).is_some() {
            return action.evaluate(&left, &right);
        }
    }
    Err(Error::BadOperand { message: format!("no action for {op} over ({left_fmt}, {right_fmt})") })
}

fn pick_extreme(a: Value, b: Value, want_min: bool) -> Result<Value, Error> {
    let ordering = compare_values(&a, &b)?;
    let a_wins = if want_min { ordering != Ordering::Greater } else { ordering != Ordering::Less };
    Ok(if a_wins { a } else { b })
}

fn compare_values(a: &Value, b: &Value) -> Result<Ordering, Error> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => {
            let x = a.as_real().ok_or_else(|| Error::BadOperand { message: format!("{a:?} is not comparable") })?;
            let y = b.as_real().ok_or_else(|| Error::BadOperand { message: format!("{b:?} is not comparable") })?;
            x.partial_cmp(&y).ok_or_else(|| Error::BadOperand { message: "NaN is not ordered".to_string() })
        }
    }
}

/// One step of a `diagnose` trace: who attached the modifier, a label for
/// what it did, and the value after applying it.
#[derive(Debug, Clone)]
pub struct DiagnosticStep {
    pub source: Source,
    pub operator_name: String,
    pub intermediate_value: Value,
}

/// One per VID. Holds the variable's format, the default value, and an
/// ordered set of `(Modifier, Source)` pairs — strictly by priority, ties
/// broken by insertion order.
pub struct Solver {
    format: Format,
    default: Value,
    entries: Vec<(Modifier, Source, u64)>,
    next_seq: u64,
}

impl Solver {
    pub fn new(format: Format, default: Value) -> Self {
        Solver { format, default, entries: Vec::new(), next_seq: 0 }
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn modifiers(&self) -> impl Iterator<Item = &(Modifier, Source, u64)> {
        self.entries.iter()
    }

    /// Inserts `(m, source)` in priority order (ties broken by insertion
    /// order). No-op, returning `false`, if that exact pair is already
    /// present.
    pub fn add_modifier(&mut self, m: Modifier, source: Source) -> Result<bool, Error> {
        if !m.format().is_subformat_of(&self.format) {
            return Err(Error::InvariantViolation {
                message: format!("modifier format {} is not a subformat of solver format {}", m.format(), self.format),
            });
        }
        if self.entries.iter().any(|(existing, s, _)| *s == source && *existing == m) {
            return Ok(false);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let priority = m.priority();
        let pos = self
            .entries
            .iter()
            .position(|(existing, _, existing_seq)| (existing.priority(), *existing_seq) > (priority, seq))
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, (m, source, seq));
        Ok(true)
    }

    /// Removes the first `(m, source)` pair matching by equality. No-op if
    /// absent.
    pub fn remove_modifier(&mut self, m: &Modifier, source: Source) -> bool {
        if let Some(pos) = self.entries.iter().position(|(existing, s, _)| *s == source && existing == m) {
            self.entries.remove(pos);
            true
        } else {
            false
        }
    }

    /// Starts from the default value and applies each modifier in
    /// priority order, threading the running value as each step's input.
    pub fn process(&self, ctx: &mut EvalContext) -> Result<Value, Error> {
        let mut value = self.default.clone();
        for (modifier, _source, _seq) in &self.entries {
            value = modifier.apply(value, ctx)?;
        }
        Ok(value)
    }

    /// Same sequence as `process`, but returns a record per step for
    /// debugging.
    pub fn diagnose(&self, ctx: &mut EvalContext) -> Result<Vec<DiagnosticStep>, Error> {
        let mut value = self.default.clone();
        let mut steps = Vec::with_capacity(self.entries.len());
        for (modifier, source, _seq) in &self.entries {
            value = modifier.apply(value, ctx)?;
            steps.push(DiagnosticStep { source: *source, operator_name: modifier.instruction(), intermediate_value: value.clone() });
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::prelude::DefaultFormulaManager;
    use crate::scope::ScopeManager;
    use crate::scope::ScopeTree;
    use crate::store::VariableStore;
    use crate::variable::VariableLibrary;

    fn const_op(n: i64) -> Operand {
        Operand::Constant(Value::Integer(n))
    }

    fn with_ctx<R>(f: impl FnOnce(&mut EvalContext) -> R) -> R {
        let tree = ScopeTree::new();
        let scopes = ScopeManager::new(&tree);
        let variables = VariableLibrary::new();
        let store = VariableStore::new();
        let formulas = DefaultFormulaManager::new();
        let mut ctx = EvalContext {
            scope_instance: scopes.global_instance(),
            owner: None,
            input: None,
            arguments: &[],
            variables: &variables,
            scopes: &scopes,
            store: &store,
            formulas: &formulas,
            missing_policy: crate::ast::eval::MissingValuePolicy::SubstituteDefault,
        };
        f(&mut ctx)
    }

    #[test]
    fn add_modifier_orders_by_priority_not_insertion() {
        let mut solver = Solver::new(Format::Integer, Value::Integer(0));
        solver.add_modifier(Modifier::Multiply { format: Format::Integer, operand: const_op(4) }, Source(1)).unwrap();
        solver.add_modifier(Modifier::Set { format: Format::Integer, operand: const_op(3) }, Source(2)).unwrap();
        solver.add_modifier(Modifier::Add { format: Format::Integer, operand: const_op(2) }, Source(3)).unwrap();

        let priorities: Vec<i64> = solver.modifiers().map(|(m, _, _)| m.priority()).collect();
        assert_eq!(priorities, vec![0, 100, 200]);

        let result = with_ctx(|ctx| solver.process(ctx)).unwrap();
        // set(3) -> add(2) -> multiply(4) = (3+2)*4 = 20
        assert_eq!(result, Value::Integer(20));
    }

    #[test]
    fn duplicate_modifier_and_source_pair_is_a_no_op() {
        let mut solver = Solver::new(Format::Integer, Value::Integer(0));
        let modifier = Modifier::Add { format: Format::Integer, operand: const_op(1) };
        assert!(solver.add_modifier(modifier.clone(), Source(1)).unwrap());
        assert!(!solver.add_modifier(modifier, Source(1)).unwrap());
    }

    #[test]
    fn remove_modifier_restores_the_default() {
        let mut solver = Solver::new(Format::Integer, Value::Integer(0));
        let modifier = Modifier::Add { format: Format::Integer, operand: const_op(7) };
        solver.add_modifier(modifier.clone(), Source(1)).unwrap();
        assert_eq!(with_ctx(|ctx| solver.process(ctx)).unwrap(), Value::Integer(7));

        assert!(solver.remove_modifier(&modifier, Source(1)));
        assert!(solver.is_empty());
        assert_eq!(with_ctx(|ctx| solver.process(ctx)).unwrap(), Value::Integer(0));
    }

    #[test]
    fn array_component_is_a_no_op_past_the_end() {
        let modifier = Modifier::ArrayComponent {
            index: 5,
            inner: Box::new(Modifier::Add { format: Format::Integer, operand: const_op(100) }),
        };
        let result = with_ctx(|ctx| modifier.apply(Value::Array(vec![Value::Integer(10), Value::Integer(20)]), ctx)).unwrap();
        assert_eq!(result, Value::Array(vec![Value::Integer(10), Value::Integer(20)]));
    }

    #[test]
    fn min_and_max_pick_the_expected_extreme() {
        let min_modifier = Modifier::Min { format: Format::Integer, operand: const_op(3) };
        let max_modifier = Modifier::Max { format: Format::Integer, operand: const_op(3) };
        assert_eq!(with_ctx(|ctx| min_modifier.apply(Value::Integer(10), ctx)).unwrap(), Value::Integer(3));
        assert_eq!(with_ctx(|ctx| max_modifier.apply(Value::Integer(10), ctx)).unwrap(), Value::Integer(10));
    }
}
