//! Built-in operator commands split by domain
//!
//! Each submodule returns a self-contained subtree that the entry point
//! grafts onto the application root.

pub mod config;
pub mod plugin;
pub mod tree;
