//! Shared types for the mlbase host and out-of-process plugins.
//!
//! This crate provides the wire format spoken between `mlbase` and plugin
//! executables: the manifest a plugin prints for `describe`, the request it
//! receives on `invoke`, and the exit-code conventions of each operation.

mod option;
mod protocol;

pub use option::OptionSpec;
pub use protocol::{
    CommandSpec, EXIT_UNKNOWN_EXPORT, EXIT_UNSUPPORTED, InvokeRequest, LoaderTypeSpec,
    PROTOCOL_VERSION, PluginManifest, PluginOp,
};
