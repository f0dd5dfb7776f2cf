//! Grammar builder for composed command trees.
//!
//! The command tree only declares options; this module is where they become
//! a real argument grammar (`clap::Command`).
//!
//! # Module Structure
//!
//! - [`core`] - `build`, the `Grammar` and its dispatch records
//! - `helpers` - translation of option declarations into `clap` arguments
//!
//! # Usage
//!
//! ```
//! use mlbase::cli::command::CommandNode;
//! use mlbase::cli::dispatch::{Outcome, Report};
//! use mlbase::cli::parser::build;
//!
//! let root = CommandNode::new("mlbase", "machine learning helpers");
//! root.attach_child(CommandNode::new("hello", "say hello"))?
//!     .set_handler(|_| Ok(Report::ok()));
//!
//! let grammar = build(&root)?;
//! let outcome = grammar.dispatch(["hello"])?;
//! assert!(matches!(outcome, Outcome::Completed(_)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod core;
mod helpers;

pub(crate) use helpers::{ArgBinding, ArgKind};

// Re-export public API
pub use core::{BuildError, DispatchRecord, Grammar, build};
