//! Semantic analysis. Types are computed and checked here, and numeric
//! arithmetic can be folded before the tree is handed on.

pub mod builtins;
pub mod diagnostic;
pub mod fold;
pub mod primitive;
pub mod ty;
pub mod type_checker;
