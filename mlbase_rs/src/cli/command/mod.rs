//! Command tree definitions.
//!
//! Independently authored modules each build a self-contained subtree of
//! [`CommandNode`]s and graft it onto a shared root in either direction.
//! The module is split for maintainability:
//!
//! - `node`: the shared node handle and its composition operators
//! - `error`: structural errors raised while composing
//! - `view`: text rendering of a composed tree

mod error;
mod node;
mod view;

pub use error::TreeError;
pub use mlbase_common::OptionSpec;
pub use node::{CommandNode, DEFAULT_META_KEY, Handler, WeakCommandNode};
pub use view::render_tree;
