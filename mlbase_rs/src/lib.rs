//! # mlbase
//!
//! **Composable command trees with runtime plugins** for machine-learning
//! tooling.
//!
//! Command modules build self-contained subtrees and graft them onto a
//! shared root. Plugins listed in a descriptor document are loaded into the
//! same root before the argument grammar is compiled, so the final CLI is
//! whatever the application and its plugins assembled together.
//!
//! ## Features
//!
//! - **Tree composition** - attach subtrees in either direction, look up
//!   children by name, reject duplicate names and mismatched meta keys
//! - **Single dispatch** - one parse, one handler; reaching a branch prints
//!   its help instead of failing
//! - **Self-extending plugin registry** - plugins may register new plugin
//!   types for descriptors that follow them
//! - **Pinned git plugins** - fetched into a deterministic cache directory
//!   at a tag or commit
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust
//! use mlbase::cli::{CommandNode, OptionSpec, Outcome, Report, build};
//!
//! let root = CommandNode::new("ml", "machine-learning tools");
//! let train = root
//!     .attach_child(CommandNode::new("train", "training tools"))
//!     .unwrap()
//!     .attach_child(CommandNode::new("run", "start a training run"))
//!     .unwrap();
//! train
//!     .declare_option(OptionSpec::new(["--epochs"]).default_value(10))
//!     .set_handler(|inv| {
//!         assert_eq!(inv.meta().parents(), ["ml", "train"]);
//!         Ok(Report::ok())
//!     });
//!
//! let grammar = build(&root).unwrap();
//! let outcome = grammar.dispatch(["train", "run", "--epochs", "3"]).unwrap();
//! assert_eq!(outcome, Outcome::Completed(Report::ok()));
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! mlbase tree                # Show the composed command tree
//! mlbase plugin list         # Configured plugins and whether they loaded
//! mlbase plugin update       # Fetch/refresh every plugin
//! mlbase config edit         # Open the config file in $EDITOR
//! ```

pub mod cli;
pub mod config;
pub mod git;
pub mod plugin;
pub mod process;

pub use cli::{CommandNode, Grammar, Invocation, OptionSpec, Outcome, Report, build};
pub use config::AppConfig;
pub use plugin::{
    LoadStatus, Plugin, PluginDescriptor, PluginError, PluginLoader, PluginTypeRegistry,
    RegistryWriter,
};
