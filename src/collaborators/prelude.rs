//! Default operator and function libraries. Ships a reasonable built-in
//! set (`+ - * / % ^ < > <= >= == != && ||` and `abs`, `min`, `max`, `if`,
//! `arg`, `length`) so the crate is usable without a caller supplying its
//! own collaborators, per the external interface contract in the design
//! doc. Callers needing a richer standard library implement
//! `OperatorLibrary`/`FunctionLibrary` themselves.

use crate::ast::dependency::DependencyContext;
use crate::ast::eval::EvalContext;
use crate::ast::semantic::SemanticContext;
use crate::ast::{self, BinaryOp, Expr, UnaryOp};
use crate::collaborators::{Function, FunctionLibrary, OperatorAction, OperatorLibrary, UnaryOperatorAction};
use crate::error::Error;
use crate::format::Format;
use crate::value::Value;

macro_rules! numeric_binary_action {
    ($struct_name:ident, $op:expr, $int_expr:expr, $real_expr:expr) => {
        struct $struct_name;
        impl OperatorAction for $struct_name {
            fn operator(&self) -> BinaryOp {
                $op
            }
            fn abstract_evaluate(&self, left: &Format, right: &Format) -> Option<Format> {
                match (left, right) {
                    (Format::Integer, Format::Integer) => Some(Format::Integer),
                    (Format::Integer, Format::Real) | (Format::Real, Format::Integer) | (Format::Real, Format::Real) => {
                        Some(Format::Real)
                    }
                    _ => None,
                }
            }
            fn evaluate(&self, left: &Value, right: &Value) -> Result<Value, Error> {
                match (left, right) {
                    (Value::Integer(a), Value::Integer(b)) => {
                        let f: fn(i64, i64) -> i64 = $int_expr;
                        Ok(Value::Integer(f(*a, *b)))
                    }
                    _ => {
                        let a = left.as_real().ok_or_else(|| Error::BadOperand {
                            message: format!("{left:?} is not numeric"),
                        })?;
                        let b = right.as_real().ok_or_else(|| Error::BadOperand {
                            message: format!("{right:?} is not numeric"),
                        })?;
                        let f: fn(f64, f64) -> f64 = $real_expr;
                        Ok(Value::Real(f(a, b)))
                    }
                }
            }
        }
    };
}

numeric_binary_action!(AddAction, BinaryOp::Add, |a, b| a + b, |a, b| a + b);
numeric_binary_action!(SubAction, BinaryOp::Sub, |a, b| a - b, |a, b| a - b);
numeric_binary_action!(MulAction, BinaryOp::Mul, |a, b| a * b, |a, b| a * b);

fn numeric_pair(left: &Value, right: &Value) -> Result<(f64, f64), Error> {
    let a = left.as_real().ok_or_else(|| Error::BadOperand { message: format!("{left:?} is not numeric") })?;
    let b = right.as_real().ok_or_else(|| Error::BadOperand { message: format!("{right:?} is not numeric") })?;
    Ok((a, b))
}

fn numeric_binary_format(left: &Format, right: &Format) -> Option<Format> {
    match (left, right) {
        (Format::Integer, Format::Integer) => Some(Format::Integer),
        (Format::Integer, Format::Real) | (Format::Real, Format::Integer) | (Format::Real, Format::Real) => Some(Format::Real),
        _ => None,
    }
}

struct DivAction;
impl OperatorAction for DivAction {
    fn operator(&self) -> BinaryOp {
        BinaryOp::Div
    }
    fn abstract_evaluate(&self, left: &Format, right: &Format) -> Option<Format> {
        numeric_binary_format(left, right)
    }
    fn evaluate(&self, left: &Value, right: &Value) -> Result<Value, Error> {
        match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => {
                if *b == 0 {
                    return Err(Error::BadOperand { message: "division by zero".to_string() });
                }
                Ok(Value::Integer(a / b))
            }
            _ => {
                let (a, b) = numeric_pair(left, right)?;
                if b == 0.0 {
                    return Err(Error::BadOperand { message: "division by zero".to_string() });
                }
                Ok(Value::Real(a / b))
            }
        }
    }
}

struct ModAction;
impl OperatorAction for ModAction {
    fn operator(&self) -> BinaryOp {
        BinaryOp::Mod
    }
    fn abstract_evaluate(&self, left: &Format, right: &Format) -> Option<Format> {
        numeric_binary_format(left, right)
    }
    fn evaluate(&self, left: &Value, right: &Value) -> Result<Value, Error> {
        match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => {
                if *b == 0 {
                    return Err(Error::BadOperand { message: "division by zero".to_string() });
                }
                Ok(Value::Integer(a % b))
            }
            _ => {
                let (a, b) = numeric_pair(left, right)?;
                if b == 0.0 {
                    return Err(Error::BadOperand { message: "division by zero".to_string() });
                }
                Ok(Value::Real(a % b))
            }
        }
    }
}

struct ConcatAction;
impl OperatorAction for ConcatAction {
    fn operator(&self) -> BinaryOp {
        BinaryOp::Add
    }
    fn abstract_evaluate(&self, left: &Format, right: &Format) -> Option<Format> {
        match (left, right) {
            (Format::String, Format::String) => Some(Format::String),
            _ => None,
        }
    }
    fn evaluate(&self, left: &Value, right: &Value) -> Result<Value, Error> {
        match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            _ => Err(Error::BadOperand { message: "+ requires two strings here".to_string() }),
        }
    }
}

struct PowAction;
impl OperatorAction for PowAction {
    fn operator(&self) -> BinaryOp {
        BinaryOp::Pow
    }
    fn abstract_evaluate(&self, left: &Format, right: &Format) -> Option<Format> {
        match (left, right) {
            (Format::Integer, Format::Integer) => Some(Format::Real),
            (Format::Integer, Format::Real) | (Format::Real, Format::Integer) | (Format::Real, Format::Real) => {
                Some(Format::Real)
            }
            _ => None,
        }
    }
    fn evaluate(&self, left: &Value, right: &Value) -> Result<Value, Error> {
        let a = left.as_real().ok_or_else(|| Error::BadOperand { message: format!("{left:?} is not numeric") })?;
        let b = right.as_real().ok_or_else(|| Error::BadOperand { message: format!("{right:?} is not numeric") })?;
        Ok(Value::Real(a.powf(b)))
    }
}

macro_rules! relational_action {
    ($struct_name:ident, $op:expr, $cmp:expr) => {
        struct $struct_name;
        impl OperatorAction for $struct_name {
            fn operator(&self) -> BinaryOp {
                $op
            }
            fn abstract_evaluate(&self, left: &Format, right: &Format) -> Option<Format> {
                match (left, right) {
                    (Format::Integer | Format::Real, Format::Integer | Format::Real) => Some(Format::Boolean),
                    (Format::String, Format::String) => Some(Format::Boolean),
                    _ => None,
                }
            }
            fn evaluate(&self, left: &Value, right: &Value) -> Result<Value, Error> {
                let cmp: fn(std::cmp::Ordering) -> bool = $cmp;
                let ordering = match (left, right) {
                    (Value::String(a), Value::String(b)) => a.cmp(b),
                    _ => {
                        let a = left.as_real().ok_or_else(|| Error::BadOperand { message: format!("{left:?} is not comparable") })?;
                        let b = right.as_real().ok_or_else(|| Error::BadOperand { message: format!("{right:?} is not comparable") })?;
                        a.partial_cmp(&b).ok_or_else(|| Error::BadOperand { message: "NaN is not ordered".to_string() })?
                    }
                };
                Ok(Value::Boolean(cmp(ordering)))
            }
        }
    };
}

relational_action!(LtAction, BinaryOp::Lt, |o| o.is_lt());
relational_action!(GtAction, BinaryOp::Gt, |o| o.is_gt());
relational_action!(LeAction, BinaryOp::Le, |o| o.is_le());
relational_action!(GeAction, BinaryOp::Ge, |o| o.is_ge());

struct EqAction;
impl OperatorAction for EqAction {
    fn operator(&self) -> BinaryOp {
        BinaryOp::EqEq
    }
    fn abstract_evaluate(&self, left: &Format, right: &Format) -> Option<Format> {
        if left == right || left.is_subformat_of(right) || right.is_subformat_of(left) {
            Some(Format::Boolean)
        } else {
            None
        }
    }
    fn evaluate(&self, left: &Value, right: &Value) -> Result<Value, Error> {
        Ok(Value::Boolean(values_equal(left, right)))
    }
}

struct NeAction;
impl OperatorAction for NeAction {
    fn operator(&self) -> BinaryOp {
        BinaryOp::Ne
    }
    fn abstract_evaluate(&self, left: &Format, right: &Format) -> Option<Format> {
        EqAction.abstract_evaluate(left, right)
    }
    fn evaluate(&self, left: &Value, right: &Value) -> Result<Value, Error> {
        Ok(Value::Boolean(!values_equal(left, right)))
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Integer(a), Value::Real(b)) | (Value::Real(b), Value::Integer(a)) => (*a as f64) == *b,
        _ => left == right,
    }
}

macro_rules! logical_action {
    ($struct_name:ident, $op:expr, $combine:expr) => {
        struct $struct_name;
        impl OperatorAction for $struct_name {
            fn operator(&self) -> BinaryOp {
                $op
            }
            fn abstract_evaluate(&self, left: &Format, right: &Format) -> Option<Format> {
                match (left, right) {
                    (Format::Boolean, Format::Boolean) => Some(Format::Boolean),
                    _ => None,
                }
            }
            fn evaluate(&self, left: &Value, right: &Value) -> Result<Value, Error> {
                let a = left.as_boolean().ok_or_else(|| Error::BadOperand { message: format!("{left:?} is not boolean") })?;
                let b = right.as_boolean().ok_or_else(|| Error::BadOperand { message: format!("{right:?} is not boolean") })?;
                let f: fn(bool, bool) -> bool = $combine;
                Ok(Value::Boolean(f(a, b)))
            }
        }
    };
}

logical_action!(AndAction, BinaryOp::And, |a, b| a && b);
logical_action!(OrAction, BinaryOp::Or, |a, b| a || b);

struct NegAction;
impl UnaryOperatorAction for NegAction {
    fn operator(&self) -> UnaryOp {
        UnaryOp::Neg
    }
    fn abstract_evaluate(&self, operand: &Format) -> Option<Format> {
        match operand {
            Format::Integer => Some(Format::Integer),
            Format::Real => Some(Format::Real),
            _ => None,
        }
    }
    fn evaluate(&self, operand: &Value) -> Result<Value, Error> {
        match operand {
            Value::Integer(n) => Ok(Value::Integer(-n)),
            Value::Real(r) => Ok(Value::Real(-r)),
            other => Err(Error::BadOperand { message: format!("{other:?} is not numeric") }),
        }
    }
}

struct NotAction;
impl UnaryOperatorAction for NotAction {
    fn operator(&self) -> UnaryOp {
        UnaryOp::Not
    }
    fn abstract_evaluate(&self, operand: &Format) -> Option<Format> {
        match operand {
            Format::Boolean => Some(Format::Boolean),
            _ => None,
        }
    }
    fn evaluate(&self, operand: &Value) -> Result<Value, Error> {
        match operand {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            other => Err(Error::BadOperand { message: format!("{other:?} is not boolean") }),
        }
    }
}

/// Default `OperatorLibrary`: one or two `OperatorAction`s per operator,
/// covering numeric widening, string concatenation/comparison, and
/// boolean logic. Holds its actions pre-built so `actions_for` can return
/// plain slices.
pub struct DefaultOperatorLibrary {
    add: Vec<Box<dyn OperatorAction>>,
    sub: Vec<Box<dyn OperatorAction>>,
    mul: Vec<Box<dyn OperatorAction>>,
    div: Vec<Box<dyn OperatorAction>>,
    modulo: Vec<Box<dyn OperatorAction>>,
    pow: Vec<Box<dyn OperatorAction>>,
    lt: Vec<Box<dyn OperatorAction>>,
    gt: Vec<Box<dyn OperatorAction>>,
    le: Vec<Box<dyn OperatorAction>>,
    ge: Vec<Box<dyn OperatorAction>>,
    eq: Vec<Box<dyn OperatorAction>>,
    ne: Vec<Box<dyn OperatorAction>>,
    and: Vec<Box<dyn OperatorAction>>,
    or: Vec<Box<dyn OperatorAction>>,
    neg: Vec<Box<dyn UnaryOperatorAction>>,
    not: Vec<Box<dyn UnaryOperatorAction>>,
}

impl DefaultOperatorLibrary {
    pub fn new() -> Self {
        DefaultOperatorLibrary {
            add: vec![Box::new(AddAction), Box::new(ConcatAction)],
            sub: vec![Box::new(SubAction)],
            mul: vec![Box::new(MulAction)],
            div: vec![Box::new(DivAction)],
            modulo: vec![Box::new(ModAction)],
            pow: vec![Box::new(PowAction)],
            lt: vec![Box::new(LtAction)],
            gt: vec![Box::new(GtAction)],
            le: vec![Box::new(LeAction)],
            ge: vec![Box::new(GeAction)],
            eq: vec![Box::new(EqAction)],
            ne: vec![Box::new(NeAction)],
            and: vec![Box::new(AndAction)],
            or: vec![Box::new(OrAction)],
            neg: vec![Box::new(NegAction)],
            not: vec![Box::new(NotAction)],
        }
    }
}

impl Default for DefaultOperatorLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorLibrary for DefaultOperatorLibrary {
    fn actions_for(&self, op: BinaryOp) -> &[Box<dyn OperatorAction>] {
        match op {
            BinaryOp::Add => &self.add,
            BinaryOp::Sub => &self.sub,
            BinaryOp::Mul => &self.mul,
            BinaryOp::Div => &self.div,
            BinaryOp::Mod => &self.modulo,
            BinaryOp::Pow => &self.pow,
            BinaryOp::Lt => &self.lt,
            BinaryOp::Gt => &self.gt,
            BinaryOp::Le => &self.le,
            BinaryOp::Ge => &self.ge,
            BinaryOp::EqEq => &self.eq,
            BinaryOp::Ne => &self.ne,
            BinaryOp::And => &self.and,
            BinaryOp::Or => &self.or,
        }
    }

    fn unary_actions_for(&self, op: UnaryOp) -> &[Box<dyn UnaryOperatorAction>] {
        match op {
            UnaryOp::Neg => &self.neg,
            UnaryOp::Not => &self.not,
        }
    }
}

// --- Built-in functions -----------------------------------------------

struct AbsFn;
impl Function for AbsFn {
    fn name(&self) -> &str {
        "abs"
    }

    fn check_semantics(&self, ctx: &mut SemanticContext, args: &[Expr], _asserted: Option<&Format>) -> Result<Format, Error> {
        require_arity("abs", args, 1)?;
        let fmt = ast::semantic::check_semantics(ctx, &args[0], None)?;
        match fmt {
            Format::Integer | Format::Real => Ok(fmt),
            other => Err(Error::BadOperand { message: format!("abs() requires a numeric argument, got {other}") }),
        }
    }

    fn get_dependencies(&self, ctx: &mut DependencyContext, args: &[Expr]) -> Result<(), Error> {
        ast::dependency::collect_dependencies(ctx, &args[0])
    }

    fn evaluate(&self, ctx: &mut EvalContext, args: &[Expr], _asserted: Option<&Format>) -> Result<Value, Error> {
        match ast::eval::evaluate(ctx, &args[0], None)? {
            Value::Integer(n) => Ok(Value::Integer(n.abs())),
            Value::Real(r) => Ok(Value::Real(r.abs())),
            other => Err(Error::BadOperand { message: format!("abs() requires a numeric argument, got {other:?}") }),
        }
    }
}

struct MinMaxFn {
    is_min: bool,
}
impl Function for MinMaxFn {
    fn name(&self) -> &str {
        if self.is_min {
            "min"
        } else {
            "max"
        }
    }

    fn check_semantics(&self, ctx: &mut SemanticContext, args: &[Expr], _asserted: Option<&Format>) -> Result<Format, Error> {
        if args.len() < 2 {
            return Err(Error::BadOperand { message: format!("{}() requires at least 2 arguments", self.name()) });
        }
        let mut widest = Format::Integer;
        for arg in args {
            let fmt = ast::semantic::check_semantics(ctx, arg, None)?;
            match fmt {
                Format::Real => widest = Format::Real,
                Format::Integer => {}
                other => return Err(Error::BadOperand { message: format!("{}() requires numeric arguments, got {other}", self.name()) }),
            }
        }
        Ok(widest)
    }

    fn get_dependencies(&self, ctx: &mut DependencyContext, args: &[Expr]) -> Result<(), Error> {
        for arg in args {
            ast::dependency::collect_dependencies(ctx, arg)?;
        }
        Ok(())
    }

    fn evaluate(&self, ctx: &mut EvalContext, args: &[Expr], _asserted: Option<&Format>) -> Result<Value, Error> {
        if args.len() < 2 {
            return Err(Error::BadOperand { message: format!("{}() requires at least 2 arguments", self.name()) });
        }
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(ast::eval::evaluate(ctx, arg, None)?);
        }
        let all_integer = values.iter().all(|v| matches!(v, Value::Integer(_)));
        let not_enough = || Error::InvariantViolation { message: format!("{}() called with no arguments", self.name()) };
        if all_integer {
            let ints: Result<Vec<i64>, Error> = values
                .iter()
                .map(|v| v.as_integer().ok_or_else(|| Error::BadOperand { message: format!("{v:?} is not an integer") }))
                .collect();
            let picked = if self.is_min { ints?.into_iter().reduce(i64::min) } else { ints?.into_iter().reduce(i64::max) };
            Ok(Value::Integer(picked.ok_or_else(not_enough)?))
        } else {
            let reals: Result<Vec<f64>, Error> = values
                .iter()
                .map(|v| v.as_real().ok_or_else(|| Error::BadOperand { message: format!("{v:?} is not numeric") }))
                .collect();
            let reals = reals?;
            let picked = if self.is_min { reals.into_iter().reduce(f64::min) } else { reals.into_iter().reduce(f64::max) };
            Ok(Value::Real(picked.ok_or_else(not_enough)?))
        }
    }
}

struct IfFn;
impl Function for IfFn {
    fn name(&self) -> &str {
        "if"
    }

    fn check_semantics(&self, ctx: &mut SemanticContext, args: &[Expr], asserted: Option<&Format>) -> Result<Format, Error> {
        require_arity("if", args, 3)?;
        let cond = ast::semantic::check_semantics(ctx, &args[0], None)?;
        if cond != Format::Boolean {
            return Err(Error::BadOperand { message: format!("if() condition must be boolean, got {cond}") });
        }
        let then_fmt = ast::semantic::check_semantics(ctx, &args[1], asserted)?;
        let else_fmt = ast::semantic::check_semantics(ctx, &args[2], asserted)?;
        if then_fmt != else_fmt {
            return Err(Error::BadOperand {
                message: format!("if() branches have different formats: {then_fmt} vs {else_fmt}"),
            });
        }
        Ok(then_fmt)
    }

    fn get_dependencies(&self, ctx: &mut DependencyContext, args: &[Expr]) -> Result<(), Error> {
        for arg in args {
            ast::dependency::collect_dependencies(ctx, arg)?;
        }
        Ok(())
    }

    fn evaluate(&self, ctx: &mut EvalContext, args: &[Expr], asserted: Option<&Format>) -> Result<Value, Error> {
        let cond = ast::eval::evaluate(ctx, &args[0], None)?;
        let cond = cond.as_boolean().ok_or_else(|| Error::BadOperand { message: format!("{cond:?} is not boolean") })?;
        if cond {
            ast::eval::evaluate(ctx, &args[1], asserted)
        } else {
            ast::eval::evaluate(ctx, &args[2], asserted)
        }
    }
}

/// `arg(n)`: reads the nth (0-based) macro argument from the current
/// evaluation context, for formulas reused across multiple call sites
/// with different argument lists (array-component style reuse).
struct ArgFn;
impl Function for ArgFn {
    fn name(&self) -> &str {
        "arg"
    }

    fn check_semantics(&self, ctx: &mut SemanticContext, args: &[Expr], _asserted: Option<&Format>) -> Result<Format, Error> {
        require_arity("arg", args, 1)?;
        let _ = ast::semantic::check_semantics(ctx, &args[0], Some(&Format::Integer))?;
        // The concrete format of arg(n) depends on what's bound at evaluation
        // time; without a richer type system this degrades to real so both
        // integer and real callers widen cleanly.
        Ok(Format::Real)
    }

    fn get_dependencies(&self, ctx: &mut DependencyContext, args: &[Expr]) -> Result<(), Error> {
        if let Expr::Number(text, _) = &args[0] {
            if let Ok(n) = text.parse::<usize>() {
                ctx.manager.note_argument_index(n);
            }
        }
        Ok(())
    }

    fn evaluate(&self, ctx: &mut EvalContext, args: &[Expr], _asserted: Option<&Format>) -> Result<Value, Error> {
        let index_val = ast::eval::evaluate(ctx, &args[0], None)?;
        let index = index_val.as_integer().ok_or_else(|| Error::BadOperand { message: format!("{index_val:?} is not an integer index") })?;
        let index = usize::try_from(index).map_err(|_| Error::BadOperand { message: "arg() index must be non-negative".to_string() })?;
        ctx.arguments.get(index).cloned().ok_or_else(|| Error::BadOperand {
            message: format!("arg({index}) out of range ({} arguments bound)", ctx.arguments.len()),
        })
    }
}

/// `input()`: reads the modifier stack's current running value — the
/// "chained modifiers" hook in the design doc, letting e.g. an `Add`
/// modifier's formula reference the value it is about to add to.
struct InputFn;
impl Function for InputFn {
    fn name(&self) -> &str {
        "input"
    }

    fn check_semantics(&self, _ctx: &mut SemanticContext, args: &[Expr], asserted: Option<&Format>) -> Result<Format, Error> {
        require_arity("input", args, 0)?;
        Ok(asserted.cloned().unwrap_or(Format::Real))
    }

    fn get_dependencies(&self, _ctx: &mut DependencyContext, _args: &[Expr]) -> Result<(), Error> {
        Ok(())
    }

    fn evaluate(&self, ctx: &mut EvalContext, args: &[Expr], asserted: Option<&Format>) -> Result<Value, Error> {
        require_arity("input", args, 0)?;
        Ok(ctx.input.clone().unwrap_or_else(|| asserted.cloned().unwrap_or(Format::Real).default_value()))
    }
}

struct LengthFn;
impl Function for LengthFn {
    fn name(&self) -> &str {
        "length"
    }

    fn check_semantics(&self, ctx: &mut SemanticContext, args: &[Expr], _asserted: Option<&Format>) -> Result<Format, Error> {
        require_arity("length", args, 1)?;
        match ast::semantic::check_semantics(ctx, &args[0], None)? {
            Format::Array(_) => Ok(Format::Integer),
            other => Err(Error::BadOperand { message: format!("length() requires an array argument, got {other}") }),
        }
    }

    fn get_dependencies(&self, ctx: &mut DependencyContext, args: &[Expr]) -> Result<(), Error> {
        ast::dependency::collect_dependencies(ctx, &args[0])
    }

    fn evaluate(&self, ctx: &mut EvalContext, args: &[Expr], _asserted: Option<&Format>) -> Result<Value, Error> {
        match ast::eval::evaluate(ctx, &args[0], None)? {
            Value::Array(items) => Ok(Value::Integer(items.len() as i64)),
            other => Err(Error::BadOperand { message: format!("length() requires an array argument, got {other:?}") }),
        }
    }
}

fn require_arity(name: &str, args: &[Expr], expected: usize) -> Result<(), Error> {
    if args.len() != expected {
        Err(Error::BadOperand { message: format!("{name}() requires exactly {expected} argument(s), got {}", args.len()) })
    } else {
        Ok(())
    }
}

/// Default `FunctionLibrary` carrying the built-ins named in the external
/// interface contract: `abs`, `min`, `max`, `if`, `arg(n)`, `length`.
pub struct DefaultFunctionLibrary {
    functions: Vec<Box<dyn Function>>,
}

impl DefaultFunctionLibrary {
    pub fn new() -> Self {
        DefaultFunctionLibrary {
            functions: vec![
                Box::new(AbsFn),
                Box::new(MinMaxFn { is_min: true }),
                Box::new(MinMaxFn { is_min: false }),
                Box::new(IfFn),
                Box::new(ArgFn),
                Box::new(LengthFn),
                Box::new(InputFn),
            ],
        }
    }
}

impl Default for DefaultFunctionLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionLibrary for DefaultFunctionLibrary {
    fn lookup(&self, name: &str) -> Option<&dyn Function> {
        self.functions.iter().find(|f| f.name() == name).map(|f| f.as_ref())
    }
}

/// Bundles the default operator and function libraries behind the single
/// `FormulaManager` collaborator the rest of the crate depends on.
pub struct DefaultFormulaManager {
    operators: DefaultOperatorLibrary,
    functions: DefaultFunctionLibrary,
}

impl DefaultFormulaManager {
    pub fn new() -> Self {
        DefaultFormulaManager { operators: DefaultOperatorLibrary::new(), functions: DefaultFunctionLibrary::new() }
    }
}

impl Default for DefaultFormulaManager {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::collaborators::FormulaManager for DefaultFormulaManager {
    fn operators(&self) -> &dyn OperatorLibrary {
        &self.operators
    }

    fn functions(&self) -> &dyn FunctionLibrary {
        &self.functions
    }
}

/// Default `SolverFactory`: builds empty solvers seeded with the format's
/// registry default, with an override table for callers who want a
/// different default for a particular format (e.g. "new characters start
/// with hp default 10" rather than integer-zero).
pub struct DefaultSolverFactory {
    registry: crate::format::FormatRegistry,
    overrides: std::collections::HashMap<Format, Value>,
}

impl DefaultSolverFactory {
    pub fn new() -> Self {
        DefaultSolverFactory { registry: crate::format::FormatRegistry::new(), overrides: std::collections::HashMap::new() }
    }
}

impl Default for DefaultSolverFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::collaborators::SolverFactory for DefaultSolverFactory {
    fn build_solver(&self, format: &Format) -> Result<crate::modifier::Solver, Error> {
        let default = self.get_default(format).ok_or_else(|| Error::InvariantViolation {
            message: format!("no default value available for format {format}"),
        })?;
        Ok(crate::modifier::Solver::new(format.clone(), default))
    }

    fn set_default(&mut self, format: Format, value: Value) {
        self.overrides.insert(format, value);
    }

    fn get_default(&self, format: &Format) -> Option<Value> {
        self.overrides.get(format).cloned().or_else(|| self.registry.default_for(format))
    }
}

#[cfg(test)]
mod tests {
    use crate::{default_manager, Format, Modifier, Operand, Source, Value};

    fn eval_as_modifier(source: &str) -> Value {
        let mut mgr = default_manager();
        let ls = mgr.global_legal_scope();
        let si = mgr.global_instance();
        mgr.assert_variable("result", ls, Format::Integer).unwrap();
        let result = mgr.identifier_for(si, "result").unwrap();
        mgr.add_modifier(
            result.clone(),
            Modifier::Set { format: Format::Integer, operand: Operand::formula(crate::ast::Formula::parse(source).unwrap(), si) },
            Source(1),
        )
        .unwrap();
        mgr.get(&result).cloned().unwrap()
    }

    #[test]
    fn default_library_covers_abs_min_max_and_if() {
        assert_eq!(eval_as_modifier("abs(-3)"), Value::Integer(3));
        assert_eq!(eval_as_modifier("min(4, 2, 9)"), Value::Integer(2));
        assert_eq!(eval_as_modifier("max(4, 2, 9)"), Value::Integer(9));
        assert_eq!(eval_as_modifier("if(1 > 0, 10, 20)"), Value::Integer(10));
    }

    #[test]
    fn length_reports_array_size() {
        let mut mgr = default_manager();
        let ls = mgr.global_legal_scope();
        let si = mgr.global_instance();
        mgr.assert_variable("items", ls, Format::array_of(Format::Integer)).unwrap();
        mgr.assert_variable("count", ls, Format::Integer).unwrap();
        let items = mgr.identifier_for(si, "items").unwrap();
        let count = mgr.identifier_for(si, "count").unwrap();

        mgr.add_modifier(
            items.clone(),
            Modifier::Set {
                format: Format::array_of(Format::Integer),
                operand: Operand::Constant(Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])),
            },
            Source(1),
        )
        .unwrap();
        mgr.add_modifier(
            count.clone(),
            Modifier::Set {
                format: Format::Integer,
                operand: Operand::formula(crate::ast::Formula::parse("length(items)").unwrap(), si),
            },
            Source(2),
        )
        .unwrap();

        assert_eq!(mgr.get(&count), Some(&Value::Integer(3)));
    }
}
