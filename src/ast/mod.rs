//! Parsed expression trees and the passes that walk them.
//!
//! A `Formula` owns its source text and its parsed `Expr` tree so that the
//! `instruction` a modifier reports is always the text the caller wrote,
//! not a reprint of the tree. The tree itself is an owned sum type (`Box`
//! children rather than arena-borrowed ones) because formulas outlive any
//! single parse or evaluation pass — they sit inside a solver's modifier
//! list for as long as the modifier is attached.

pub mod dependency;
pub mod eval;
pub mod parser;
pub mod reconstruct;
pub mod semantic;
pub mod visitor;

use crate::error::Error;
use crate::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    Ne,
    And,
    Or,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::EqEq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        };
        write!(f, "{s}")
    }
}

/// Node kinds of the expression tree. `FunctionBracket`/`FunctionParen`
/// from the design doc — structural wrappers that only ever appear as
/// children of a function call — are collapsed into `FunctionLookup`'s
/// `args` field directly; they carried no information beyond "these are
/// the bracketed arguments," which the `Vec<Expr>` already says.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Root(Box<Expr>),
    Paren(Box<Expr>),
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr>, span: Span },
    Unary { op: UnaryOp, operand: Box<Expr>, span: Span },
    Number(String, Span),
    QuotedString(String, Span),
    Identifier(String, Span),
    FunctionLookup { name: String, args: Vec<Expr>, span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Root(inner) | Expr::Paren(inner) => inner.span(),
            Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Number(_, span)
            | Expr::QuotedString(_, span)
            | Expr::Identifier(_, span)
            | Expr::FunctionLookup { span, .. } => *span,
        }
    }
}

/// A parsed formula: source text plus its tree, with canonical-text
/// equality (two formulas are equal iff their reconstructed canonical
/// text and declared meaning are the same — see `reconstruct`).
#[derive(Debug, Clone)]
pub struct Formula {
    source: String,
    root: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Formula, Error> {
        let root = parser::parse(source)?;
        Ok(Formula { source: source.to_string(), root: Expr::Root(Box::new(root)) })
    }

    /// Round-trips the original source text, as stored at parse time.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// The canonical, fully-parenthesized reprint of the tree. Idempotent:
    /// reparsing and re-canonicalizing this text yields the same text again.
    pub fn canonical(&self) -> String {
        reconstruct::reconstruct(&self.root)
    }
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for Formula {}
