//! Reactive formula engine: typed, scoped variables; a small arithmetic /
//! logical / string expression interpreter; and incremental recomputation
//! over a modifier dependency graph.
//!
//! The three load-bearing pieces are [`ast`] (the formula representation
//! and its visitor passes), [`modifier`] (the per-variable priority-ranked
//! modifier stack), and [`manager`] (the dependency graph and propagation
//! driver that ties the two together). Everything else — [`format`],
//! [`scope`], [`variable`], [`store`] — is the typed state those three
//! operate over.

pub mod ast;
pub mod collaborators;
pub mod error;
pub mod format;
pub mod lexer;
pub mod manager;
pub mod modifier;
pub mod scope;
pub mod store;
pub mod token;
pub mod value;
pub mod variable;

pub use ast::Formula;
pub use error::Error;
pub use format::{Format, FormatRegistry};
pub use manager::{SolverManager, SolverManagerConfig};
pub use modifier::{Modifier, Operand, Source};
pub use scope::{LegalScopeId, ScopeInstanceId};
pub use value::Value;
pub use variable::VariableId;

/// Builds a `SolverManager` wired to the default operator/function library
/// and the default solver factory — the quickest way to get a usable
/// engine instance without writing collaborators by hand.
pub fn default_manager() -> SolverManager {
    SolverManager::new(
        Box::new(collaborators::prelude::DefaultFormulaManager::new()),
        Box::new(collaborators::prelude::DefaultSolverFactory::new()),
        SolverManagerConfig::default(),
    )
}
