//! CLI module: command trees, grammar compilation and dispatch.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │          Subtrees authored independently (CommandNode)          │
//! │   config ─ show/path/edit    plugin ─ list/types/update   tree  │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │ attach_child / attach_to_parent
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Application root                         │
//! │        ◄── plugins graft further subtrees while loading         │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │ parser::build (once)
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │   Grammar: clap::Command + dispatch records keyed by path       │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │ Grammar::dispatch(argv)
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │   exactly one handler runs ─► Outcome::Completed(Report)        │
//! │   or a branch was reached  ─► help printed, Outcome::HelpShown  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Structure
//!
//! - [`command`] - Command nodes and tree composition (source of truth)
//! - [`parser`] - Grammar builder
//! - [`dispatch`] - Dispatcher, invocation context and operator commands
//! - [`entrypoint`] - Shared `main()` body

pub mod command;
pub mod dispatch;
pub mod entrypoint;
pub mod parser;

// Re-export main types for convenience
pub use command::{CommandNode, DEFAULT_META_KEY, Handler, OptionSpec, TreeError, render_tree};
pub use dispatch::{DispatchError, DispatchMeta, Invocation, Outcome, Report};
pub use parser::{BuildError, Grammar, build};
