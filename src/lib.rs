//! Boa language compiler core
//!
//! A Boa program goes through three steps:
//!
//!   1) [`frontend`] lexes and parses it into an arena [`frontend::ast::Ast`].
//!   2) [`middle`] type checks it, reporting [`middle::diagnostic::Diagnostic`]s,
//!      and optionally folds its arithmetic.
//!   3) [`normal_form`] reduces arithmetic written in the language-neutral
//!      [`interchange`] schema to a canonical form.

use thiserror::Error;

pub use self::frontend::SourceFile;
use self::{
    frontend::{SyntaxError, ast::visit::InternalError},
    interchange::InterchangeError,
    middle::builtins::Builtins,
};

pub mod frontend;
pub mod index;
pub mod interchange;
pub mod middle;
pub mod normal_form;

/// Deepest nesting of statements and expressions a parser accepts. Every
/// level costs a full walk down the operator precedence ladder, so this stays
/// well inside a 2 MiB thread stack in unoptimized builds.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

/// How much of a program's arithmetic [`middle::fold::ConstantFolder`] rewrites
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum FoldMode {
    /// Only subtrees made of numeric literals
    Constants,
    /// Any numeric subtree, treating variables and calls as unknowns
    Algebraic,
}

#[derive(Debug)]
pub struct CompilerConfig {
    pub builtins: Builtins,
    pub max_nesting_depth: usize,
    /// Folding runs after a check without diagnostics, when set
    pub fold: Option<FoldMode>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            builtins: Builtins::standard(),
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            fold: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("internal compiler error: {0}")]
    Internal(#[from] InternalError),
    #[error(transparent)]
    Interchange(#[from] InterchangeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
