use std::collections::BTreeSet;

use crate::ast::{visitor::Visitor, Expr};
use crate::error::Error;
use crate::scope::ScopeInstanceId;
use crate::variable::{VariableId, VariableLibrary};

/// The keyed bag of analyses a dependency walk accumulates. Two keys are
/// first-class per the design doc: `variables` (every VID an `Identifier`
/// node resolves to) and `arguments` (the maximum 0-based index referenced
/// by an `arg(n)` built-in, used by macro-like functions). Functions that
/// don't care about `arguments` simply never touch it.
#[derive(Debug, Default)]
pub struct DependencyManager {
    variables: BTreeSet<VariableId>,
    max_argument_index: Option<usize>,
}

impl DependencyManager {
    pub fn add_variable(&mut self, vid: VariableId) {
        self.variables.insert(vid);
    }

    pub fn note_argument_index(&mut self, index: usize) {
        self.max_argument_index = Some(self.max_argument_index.map_or(index, |m| m.max(index)));
    }

    pub fn variables(&self) -> impl Iterator<Item = &VariableId> {
        self.variables.iter()
    }

    pub fn into_variables(self) -> BTreeSet<VariableId> {
        self.variables
    }

    pub fn max_argument_index(&self) -> Option<usize> {
        self.max_argument_index
    }
}

/// Everything the dependency walk needs to resolve an `Identifier` node
/// into a `VariableId` in the caller's current scope instance.
pub struct DependencyContext<'c> {
    pub scope_instance: ScopeInstanceId,
    pub variables: &'c VariableLibrary,
    pub scopes: &'c crate::scope::ScopeManager,
    pub formulas: &'c dyn crate::collaborators::FormulaManager,
    pub manager: DependencyManager,
    error: Option<Error>,
}

impl<'c> DependencyContext<'c> {
    pub fn new(
        scope_instance: ScopeInstanceId,
        variables: &'c VariableLibrary,
        scopes: &'c crate::scope::ScopeManager,
        formulas: &'c dyn crate::collaborators::FormulaManager,
    ) -> Self {
        DependencyContext { scope_instance, variables, scopes, formulas, manager: DependencyManager::default(), error: None }
    }

    fn fail(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Runs `f` with the current scope instance temporarily rebound, the
    /// dependency-pass counterpart to `EvalContext::with_scope`.
    pub fn with_scope<R>(&mut self, scope: ScopeInstanceId, f: impl FnOnce(&mut Self) -> R) -> R {
        let prev = self.scope_instance;
        self.scope_instance = scope;
        let result = f(self);
        self.scope_instance = prev;
        result
    }
}

impl<'c> Visitor for DependencyContext<'c> {
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Identifier(name, _) => {
                let legal_scope = match self.scopes.legal_scope_of(self.scope_instance) {
                    Ok(ls) => ls,
                    Err(e) => return self.fail(e),
                };
                match self.variables.format_of(legal_scope, name) {
                    Some(format) => {
                        self.manager.add_variable(VariableId::new(self.scope_instance, name.clone(), format));
                    }
                    None => self.fail(Error::UnknownVariable { name: name.clone() }),
                }
            }
            Expr::FunctionLookup { name, args, span } => {
                match self.formulas.functions().lookup(name) {
                    Some(function) => {
                        if let Err(e) = function.get_dependencies(self, args) {
                            self.fail(e);
                        }
                    }
                    None => self.fail(Error::BadFormula {
                        message: format!("unknown function {name:?}"),
                        span: Some(*span),
                    }),
                }
            }
            _ => crate::ast::visitor::walk_expr(self, expr),
        }
    }
}

/// Walks `expr` collecting the `DependencyManager`. Resolves every
/// `Identifier` node's VID in `ctx.scope_instance`, failing with
/// **UnknownVariable** if the name isn't declared there.
pub fn collect_dependencies(ctx: &mut DependencyContext, expr: &Expr) -> Result<(), Error> {
    ctx.visit_expr(expr);
    ctx.error.take().map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Formula;
    use crate::collaborators::prelude::DefaultFormulaManager;
    use crate::format::Format;
    use crate::scope::{ScopeManager, ScopeTree};

    #[test]
    fn collects_every_distinct_identifier_once() {
        let tree = ScopeTree::new();
        let scopes = ScopeManager::new(&tree);
        let mut variables = VariableLibrary::new();
        variables.assert(&tree, "a", tree.global(), Format::Integer).unwrap();
        variables.assert(&tree, "b", tree.global(), Format::Integer).unwrap();
        let formulas = DefaultFormulaManager::new();

        let formula = Formula::parse("a + a + b").unwrap();
        let mut ctx = DependencyContext::new(scopes.global_instance(), &variables, &scopes, &formulas);
        collect_dependencies(&mut ctx, formula.root()).unwrap();

        let names: BTreeSet<String> = ctx.manager.variables().map(|v| v.name.clone()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains("a") && names.contains("b"));
    }

    #[test]
    fn undeclared_identifier_fails_the_whole_walk() {
        let tree = ScopeTree::new();
        let scopes = ScopeManager::new(&tree);
        let variables = VariableLibrary::new();
        let formulas = DefaultFormulaManager::new();

        let formula = Formula::parse("ghost").unwrap();
        let mut ctx = DependencyContext::new(scopes.global_instance(), &variables, &scopes, &formulas);
        assert!(matches!(collect_dependencies(&mut ctx, formula.root()), Err(Error::UnknownVariable { .. })));
    }
}
