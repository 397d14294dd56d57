use std::fmt;

use crate::token::Span;
use crate::variable::VariableId;

/// Every fallible outcome the engine can surface, per the error taxonomy in
/// the design doc: propagation is always to the caller of the top-level
/// operation that triggered it, nothing is swallowed silently except the
/// one documented soft-fail path around missing identifiers.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// A variable name was empty or had leading/trailing whitespace.
    BadName { name: String },
    /// `(LegalScope, name)` was already asserted with a different format.
    ConflictingFormat { name: String, existing: String, attempted: String },
    /// `name` is already asserted in an ancestor or descendant scope.
    ShadowedName { name: String },
    /// A variable was referenced that is not declared in the current scope.
    UnknownVariable { name: String },
    /// `remove_modifier` or `diagnose` targeted a VID with no solver.
    UnknownChannel { variable: VariableId },
    /// `create_channel` targeted a VID that already has a solver.
    DuplicateChannel { variable: VariableId },
    /// The formula text failed to lex, parse, or pass semantic checking.
    BadFormula { message: String, span: Option<Span> },
    /// An operator or function rejected its operand(s).
    BadOperand { message: String },
    /// A dependency cycle failed to reach a fixed point on its first lap.
    CycleDetected { path: Vec<VariableId> },
    /// Something the implementation asserts can never happen did.
    InvariantViolation { message: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadName { name } => write!(f, "bad variable name: {name:?}"),
            Error::ConflictingFormat { name, existing, attempted } => write!(
                f,
                "variable {name:?} already asserted with format {existing}, cannot reassert as {attempted}"
            ),
            Error::ShadowedName { name } => {
                write!(f, "variable {name:?} is already asserted in a related scope")
            }
            Error::UnknownVariable { name } => write!(f, "unknown variable {name:?}"),
            Error::UnknownChannel { variable } => write!(f, "no solver for {variable:?}"),
            Error::DuplicateChannel { variable } => {
                write!(f, "a solver already exists for {variable:?}")
            }
            Error::BadFormula { message, span } => match span {
                Some(span) => write!(f, "bad formula at {}..{}: {message}", span.start, span.end),
                None => write!(f, "bad formula: {message}"),
            },
            Error::BadOperand { message } => write!(f, "bad operand: {message}"),
            Error::CycleDetected { path } => {
                write!(f, "divergent dependency cycle: {path:?}")
            }
            Error::InvariantViolation { message } => write!(f, "invariant violation: {message}"),
        }
    }
}

impl std::error::Error for Error {}
