//! Structural errors raised while composing command trees.
//!
//! These indicate a wiring bug in the assembling code, never bad user input.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// A sibling with the same name is already attached.
    #[error("command `{parent}` already has a child named `{name}`")]
    DuplicateName { parent: String, name: String },

    /// The nodes store dispatch metadata under different keys.
    #[error(
        "cannot attach `{child}` under `{parent}`: meta key `{found}` does not match `{expected}`"
    )]
    MetaKeyMismatch {
        parent: String,
        child: String,
        expected: String,
        found: String,
    },

    /// The parent is the child itself or one of its descendants.
    #[error("cannot attach `{child}` under `{parent}`: it would create a cycle")]
    Cycle { parent: String, child: String },
}
