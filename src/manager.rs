//! C7. The dependency graph between variables, modifier bookkeeping, and
//! the propagation driver that keeps every variable's stored value
//! consistent with its current modifier stack.

use std::collections::HashMap;

use crate::ast::dependency::DependencyContext;
use crate::ast::eval::{EvalContext, MissingValuePolicy};
use crate::collaborators::{FormulaManager, SolverFactory};
use crate::error::Error;
use crate::format::{Format, FormatRegistry};
use crate::modifier::{DiagnosticStep, Modifier, Solver, Source};
use crate::scope::{LegalScopeId, ScopeInstanceId, ScopeManager, ScopeTree};
use crate::store::VariableStore;
use crate::value::Value;
use crate::variable::{VariableId, VariableLibrary};

/// Configures the one documented soft-fail policy in the engine: what to
/// do when an `Identifier` node reads a VID the result store has no value
/// for yet (see `MissingValuePolicy`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverManagerConfig {
    pub on_missing_value: MissingValuePolicy,
}

/// Directed multigraph on VIDs: `edges = (dep_VID -> dependent_VID)`, each
/// edge tagged with the originating `(Modifier, Source)` identity. At rest,
/// for every active `(modifier, source)` attached to `V` and every VID `d`
/// in that modifier's dependency set, there is exactly one edge `d -> V`
/// tagged with `(modifier, source)`.
#[derive(Default)]
struct DependencyGraph {
    nodes: std::collections::HashSet<VariableId>,
    outgoing: HashMap<VariableId, Vec<Edge>>,
}

struct Edge {
    dependent: VariableId,
    source: Source,
    modifier: Modifier,
}

impl DependencyGraph {
    fn add_node(&mut self, vid: VariableId) {
        self.nodes.insert(vid);
    }

    fn add_edge(&mut self, dependency: VariableId, dependent: VariableId, source: Source, modifier: Modifier) {
        self.outgoing.entry(dependency).or_default().push(Edge { dependent, source, modifier });
    }

    /// Removes the first edge `dependency -> dependent` tagged `(modifier,
    /// source)`. Returns whether one was found.
    fn remove_edge(&mut self, dependency: &VariableId, dependent: &VariableId, source: Source, modifier: &Modifier) -> bool {
        if let Some(edges) = self.outgoing.get_mut(dependency) {
            if let Some(pos) = edges.iter().position(|e| &e.dependent == dependent && e.source == source && &e.modifier == modifier) {
                edges.remove(pos);
                return true;
            }
        }
        false
    }

    fn dependents_of(&self, dependency: &VariableId) -> Vec<VariableId> {
        self.outgoing.get(dependency).map(|edges| edges.iter().map(|e| e.dependent.clone()).collect()).unwrap_or_default()
    }
}

/// C7. Owns every piece of mutable state: the scope tree/instances, the
/// variable library, the result store, the dependency graph, and the
/// per-VID solvers, plus the injected formula/solver-factory collaborators.
/// One instance per client; no process-global state.
pub struct SolverManager {
    scope_tree: ScopeTree,
    scopes: ScopeManager,
    variables: VariableLibrary,
    store: VariableStore,
    channels: HashMap<VariableId, Solver>,
    graph: DependencyGraph,
    formulas: Box<dyn FormulaManager>,
    solver_factory: Box<dyn SolverFactory>,
    registry: FormatRegistry,
    config: SolverManagerConfig,
    recursion_stack: Vec<VariableId>,
}

impl SolverManager {
    pub fn new(formulas: Box<dyn FormulaManager>, solver_factory: Box<dyn SolverFactory>, config: SolverManagerConfig) -> Self {
        let scope_tree = ScopeTree::new();
        let scopes = ScopeManager::new(&scope_tree);
        SolverManager {
            scope_tree,
            scopes,
            variables: VariableLibrary::new(),
            store: VariableStore::new(),
            channels: HashMap::new(),
            graph: DependencyGraph::default(),
            formulas,
            solver_factory,
            registry: FormatRegistry::new(),
            config,
            recursion_stack: Vec::new(),
        }
    }

    // --- Scope/variable declaration surface --------------------------

    pub fn global_legal_scope(&self) -> LegalScopeId {
        self.scope_tree.global()
    }

    pub fn global_instance(&self) -> ScopeInstanceId {
        self.scopes.global_instance()
    }

    pub fn declare_scope(&mut self, name: &str, parent: LegalScopeId) -> LegalScopeId {
        self.scope_tree.declare(name, parent)
    }

    pub fn open_instance(
        &mut self,
        legal_scope: LegalScopeId,
        parent: ScopeInstanceId,
        owner: Option<u64>,
    ) -> Result<ScopeInstanceId, Error> {
        self.scopes.open_instance(&self.scope_tree, legal_scope, parent, owner)
    }

    pub fn assert_variable(&mut self, name: &str, ls: LegalScopeId, format: Format) -> Result<(), Error> {
        self.variables.assert(&self.scope_tree, name, ls, format)
    }

    pub fn identifier_for(&self, si: ScopeInstanceId, name: &str) -> Result<VariableId, Error> {
        self.variables.identifier_for(&self.scopes, si, name)
    }

    pub fn formula_manager(&self) -> &dyn FormulaManager {
        self.formulas.as_ref()
    }

    pub fn format_registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn get(&self, vid: &VariableId) -> Option<&Value> {
        self.store.get(vid)
    }

    pub fn get_default(&self, format: &Format) -> Option<Value> {
        self.solver_factory.get_default(format)
    }

    // --- Channel / modifier lifecycle ---------------------------------

    /// Fails with **DuplicateChannel** if a solver already exists for
    /// `vid`; otherwise builds an empty solver and runs `solve_from` (which
    /// computes the default).
    pub fn create_channel(&mut self, vid: VariableId) -> Result<(), Error> {
        if self.channels.contains_key(&vid) {
            return Err(Error::DuplicateChannel { variable: vid });
        }
        self.ensure_channel(vid)
    }

    fn ensure_channel(&mut self, vid: VariableId) -> Result<(), Error> {
        if self.channels.contains_key(&vid) {
            return Ok(());
        }
        let solver = self.solver_factory.build_solver(&vid.format)?;
        self.channels.insert(vid.clone(), solver);
        self.graph.add_node(vid.clone());
        self.solve_from(vid)?;
        Ok(())
    }

    fn validate_legal(&self, vid: &VariableId) -> Result<(), Error> {
        let ls = self.scopes.legal_scope_of(vid.scope_instance)?;
        match self.variables.format_of(ls, &vid.name) {
            Some(format) if format == vid.format => Ok(()),
            Some(other) => Err(Error::ConflictingFormat {
                name: vid.name.clone(),
                existing: other.to_string(),
                attempted: vid.format.to_string(),
            }),
            None => Err(Error::UnknownVariable { name: vid.name.clone() }),
        }
    }

    fn modifier_dependencies(&self, vid: &VariableId, modifier: &Modifier) -> Result<std::collections::BTreeSet<VariableId>, Error> {
        let mut dep_ctx = DependencyContext::new(vid.scope_instance, &self.variables, &self.scopes, self.formulas.as_ref());
        modifier.dependencies(&mut dep_ctx)?;
        Ok(dep_ctx.manager.into_variables())
    }

    /// Validates legality, creates a solver for `vid` (and recursively for
    /// every dependency of `modifier`) if absent, wires one DG edge per
    /// dependency, appends `(modifier, source)` to the solver, then
    /// recomputes. Returns whether `vid`'s value changed.
    pub fn add_modifier(&mut self, vid: VariableId, modifier: Modifier, source: Source) -> Result<bool, Error> {
        self.validate_legal(&vid)?;
        self.ensure_channel(vid.clone())?;

        let deps = self.modifier_dependencies(&vid, &modifier)?;

        let already_present = self
            .channels
            .get(&vid)
            .expect("channel ensured above")
            .modifiers()
            .any(|(m, s, _)| *s == source && *m == modifier);
        if already_present {
            return Ok(false);
        }

        for dep in &deps {
            self.ensure_channel(dep.clone())?;
            self.graph.add_edge(dep.clone(), vid.clone(), source, modifier.clone());
        }

        self.channels.get_mut(&vid).expect("channel ensured above").add_modifier(modifier, source)?;
        self.solve_from(vid)
    }

    /// Fails with **UnknownChannel** if no solver exists for `vid`.
    /// Recomputes the modifier's dependency set, removes exactly those DG
    /// edges, removes the modifier from the solver, then recomputes.
    pub fn remove_modifier(&mut self, vid: VariableId, modifier: Modifier, source: Source) -> Result<bool, Error> {
        if !self.channels.contains_key(&vid) {
            return Err(Error::UnknownChannel { variable: vid });
        }
        let deps = self.modifier_dependencies(&vid, &modifier)?;

        for dep in &deps {
            if !self.graph.remove_edge(dep, &vid, source, &modifier) {
                return Err(Error::InvariantViolation {
                    message: format!(
                        "no dependency-graph edge {dep:?} -> {vid:?} tagged (source {source:?}) for modifier {modifier:?} during removal"
                    ),
                });
            }
        }

        let removed = self.channels.get_mut(&vid).expect("channel existence checked above").remove_modifier(&modifier, source);
        if !removed {
            return Err(Error::InvariantViolation {
                message: format!("modifier {modifier:?} was not attached to {vid:?} under source {source:?}"),
            });
        }

        self.solve_from(vid)
    }

    pub fn diagnose(&mut self, vid: &VariableId) -> Result<Vec<DiagnosticStep>, Error> {
        let solver = self.channels.get(vid).ok_or_else(|| Error::UnknownChannel { variable: vid.clone() })?;
        let mut ctx = EvalContext {
            scope_instance: vid.scope_instance,
            owner: self.scopes.owner_of(vid.scope_instance),
            input: None,
            arguments: &[],
            variables: &self.variables,
            scopes: &self.scopes,
            store: &self.store,
            formulas: self.formulas.as_ref(),
            missing_policy: self.config.on_missing_value,
        };
        solver.diagnose(&mut ctx)
    }

    /// Recomputes `v` and, if its value changed, every transitive
    /// dependent, to a fixed point. A self-reference that converges on
    /// the first lap is allowed; one that is still changing when `v` is
    /// revisited raises **CycleDetected**.
    fn solve_from(&mut self, v: VariableId) -> Result<bool, Error> {
        let already_on_stack = self.recursion_stack.contains(&v);
        self.recursion_stack.push(v.clone());
        let outcome = self.solve_from_inner(&v, already_on_stack);
        self.recursion_stack.pop();
        outcome
    }

    fn solve_from_inner(&mut self, v: &VariableId, already_on_stack: bool) -> Result<bool, Error> {
        let new_value = {
            let solver = self
                .channels
                .get(v)
                .ok_or_else(|| Error::InvariantViolation { message: format!("solve_from called for untracked VID {v:?}") })?;
            let mut ctx = EvalContext {
                scope_instance: v.scope_instance,
                owner: self.scopes.owner_of(v.scope_instance),
                input: None,
                arguments: &[],
                variables: &self.variables,
                scopes: &self.scopes,
                store: &self.store,
                formulas: self.formulas.as_ref(),
                missing_policy: self.config.on_missing_value,
            };
            solver.process(&mut ctx)?
        };

        let prior = self.store.get(v).cloned();
        let changed = prior.as_ref() != Some(&new_value);
        self.store.put(v.clone(), new_value)?;

        if changed {
            if already_on_stack {
                log::debug!("cycle at {v:?} did not reach a fixed point on its first lap");
                return Err(Error::CycleDetected { path: self.recursion_stack.clone() });
            }
            for dependent in self.graph.dependents_of(v) {
                self.solve_from(dependent)?;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use crate::{default_manager, Format, Formula, Modifier, Operand, Source, Value};

    fn set_const(value: Value) -> Modifier {
        Modifier::Set { format: Format::Integer, operand: Operand::Constant(value) }
    }

    #[test]
    fn create_channel_twice_fails_with_duplicate_channel() {
        let mut mgr = default_manager();
        let ls = mgr.global_legal_scope();
        let si = mgr.global_instance();
        mgr.assert_variable("hp", ls, Format::Integer).unwrap();
        let hp = mgr.identifier_for(si, "hp").unwrap();
        mgr.create_channel(hp.clone()).unwrap();
        assert!(matches!(mgr.create_channel(hp), Err(crate::Error::DuplicateChannel { .. })));
    }

    #[test]
    fn remove_modifier_on_untracked_variable_fails_with_unknown_channel() {
        let mut mgr = default_manager();
        let ls = mgr.global_legal_scope();
        let si = mgr.global_instance();
        mgr.assert_variable("hp", ls, Format::Integer).unwrap();
        let hp = mgr.identifier_for(si, "hp").unwrap();
        let modifier = set_const(Value::Integer(1));
        assert!(matches!(mgr.remove_modifier(hp, modifier, Source(1)), Err(crate::Error::UnknownChannel { .. })));
    }

    #[test]
    fn diagnose_reports_one_step_per_modifier_in_applied_order() {
        let mut mgr = default_manager();
        let ls = mgr.global_legal_scope();
        let si = mgr.global_instance();
        mgr.assert_variable("hp", ls, Format::Integer).unwrap();
        let hp = mgr.identifier_for(si, "hp").unwrap();

        mgr.add_modifier(hp.clone(), set_const(Value::Integer(10)), Source(1)).unwrap();
        mgr.add_modifier(
            hp.clone(),
            Modifier::Add { format: Format::Integer, operand: Operand::formula(Formula::parse("5").unwrap(), si) },
            Source(2),
        )
        .unwrap();

        let steps = mgr.diagnose(&hp).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].intermediate_value, Value::Integer(10));
        assert_eq!(steps[1].intermediate_value, Value::Integer(15));
    }

    #[test]
    fn adding_a_modifier_with_no_net_value_change_does_not_recurse_into_dependents() {
        let mut mgr = default_manager();
        let ls = mgr.global_legal_scope();
        let si = mgr.global_instance();
        mgr.assert_variable("a", ls, Format::Integer).unwrap();
        mgr.assert_variable("b", ls, Format::Integer).unwrap();
        let a = mgr.identifier_for(si, "a").unwrap();
        let b = mgr.identifier_for(si, "b").unwrap();

        mgr.add_modifier(
            b.clone(),
            Modifier::Add { format: Format::Integer, operand: Operand::formula(Formula::parse("a").unwrap(), si) },
            Source(1),
        )
        .unwrap();
        assert_eq!(mgr.get(&b), Some(&Value::Integer(0)));

        // a's value stays 0 (default + 0 == 0), so b should not need to change.
        let changed = mgr.add_modifier(a, Modifier::Add { format: Format::Integer, operand: Operand::Constant(Value::Integer(0)) }, Source(2)).unwrap();
        assert!(!changed);
        assert_eq!(mgr.get(&b), Some(&Value::Integer(0)));
    }
}
