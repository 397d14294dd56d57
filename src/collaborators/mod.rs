//! Injected collaborator contracts (external interface, §6): the concrete
//! operator/function libraries, and the solver factory. The core only
//! depends on these traits; `prelude` ships a default implementation of
//! each so the crate is usable out of the box, but callers are free to
//! swap in their own.

pub mod prelude;

use crate::ast::eval::EvalContext;
use crate::ast::semantic::SemanticContext;
use crate::ast::Expr;
use crate::ast::{dependency::DependencyContext, BinaryOp, UnaryOp};
use crate::error::Error;
use crate::format::Format;
use crate::value::Value;

/// One candidate implementation of a binary operator. Multiple actions per
/// operator are allowed; the evaluator uses the first whose
/// `abstract_evaluate` returns a format.
pub trait OperatorAction {
    fn operator(&self) -> BinaryOp;
    fn abstract_evaluate(&self, left: &Format, right: &Format) -> Option<Format>;
    fn evaluate(&self, left: &Value, right: &Value) -> Result<Value, Error>;
}

pub trait UnaryOperatorAction {
    fn operator(&self) -> UnaryOp;
    fn abstract_evaluate(&self, operand: &Format) -> Option<Format>;
    fn evaluate(&self, operand: &Value) -> Result<Value, Error>;
}

pub trait OperatorLibrary {
    fn actions_for(&self, op: BinaryOp) -> &[Box<dyn OperatorAction>];
    fn unary_actions_for(&self, op: UnaryOp) -> &[Box<dyn UnaryOperatorAction>];
}

/// A built-in or user-supplied function such as `abs`, `min`, `if`.
pub trait Function {
    fn name(&self) -> &str;

    fn check_semantics(
        &self,
        ctx: &mut SemanticContext,
        args: &[Expr],
        asserted: Option<&Format>,
    ) -> Result<Format, Error>;

    fn get_dependencies(&self, ctx: &mut DependencyContext, args: &[Expr]) -> Result<(), Error>;

    fn evaluate(&self, ctx: &mut EvalContext, args: &[Expr], asserted: Option<&Format>) -> Result<Value, Error>;
}

pub trait FunctionLibrary {
    fn lookup(&self, name: &str) -> Option<&dyn Function>;
}

/// Bundles the two formula-facing collaborators so a `SolverManager` only
/// has to hold one trait object instead of two.
pub trait FormulaManager {
    fn operators(&self) -> &dyn OperatorLibrary;
    fn functions(&self) -> &dyn FunctionLibrary;
}

/// §6: `build_solver`/`set_default`/`get_default`. Lets callers override a
/// format's default independently of what the format registry would
/// otherwise hand back (e.g. "new characters start with hp default 10").
pub trait SolverFactory {
    fn build_solver(&self, format: &Format) -> Result<crate::modifier::Solver, Error>;
    fn set_default(&mut self, format: Format, value: Value);
    fn get_default(&self, format: &Format) -> Option<Value>;
}
