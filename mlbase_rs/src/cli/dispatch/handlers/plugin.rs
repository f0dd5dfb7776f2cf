//! Plugin-related command handlers
//!
//! Handles: plugin list, plugin types, plugin update

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use colored::Colorize;
use serde_json::Value;

use crate::cli::command::{CommandNode, TreeError};
use crate::cli::dispatch::Report;
use crate::plugin::{PluginDescriptor, PluginTypeRegistry, update_loaders};

/// Descriptors read at startup and which of them produced a live plugin.
#[derive(Debug, Default)]
pub struct PluginState {
    pub document: PathBuf,
    pub descriptors: Vec<PluginDescriptor>,
    /// Descriptor indices whose loader loaded.
    pub live: Vec<usize>,
}

/// Build the `plugin` branch.
pub fn plugin_commands(
    registry: Rc<RefCell<PluginTypeRegistry>>,
    state: Rc<RefCell<PluginState>>,
    meta_key: &str,
) -> Result<CommandNode, TreeError> {
    let branch = CommandNode::with_meta_key("plugin", "manage plugins", meta_key);

    let listed = state.clone();
    branch
        .attach_child(CommandNode::with_meta_key(
            "list",
            "list configured plugins",
            meta_key,
        ))?
        .set_handler(move |_| {
            print!("{}", render_list(&listed.borrow()));
            Ok(Report::ok())
        });

    let typed = registry.clone();
    branch
        .attach_child(CommandNode::with_meta_key(
            "types",
            "list registered plugin types",
            meta_key,
        ))?
        .set_handler(move |_| {
            for name in typed.borrow().names() {
                println!("{}", name);
            }
            Ok(Report::ok())
        });

    branch
        .attach_child(CommandNode::with_meta_key(
            "update",
            "fetch or refresh every configured plugin",
            meta_key,
        ))?
        .set_handler(move |_| {
            let state = state.borrow();
            let warnings = update_loaders(&registry.borrow(), &state.descriptors)?;
            let mut report = Report::ok();
            report.extend_warnings(warnings);
            println!(
                "{} {} plugin(s) from {}",
                "updated".green(),
                state.descriptors.len(),
                state.document.display()
            );
            Ok(report)
        });

    Ok(branch)
}

fn render_args(descriptor: &PluginDescriptor) -> String {
    let mut parts: Vec<String> = descriptor.args.iter().map(value_text).collect();
    parts.extend(
        descriptor
            .kwargs
            .iter()
            .map(|(key, value)| format!("{}={}", key, value_text(value))),
    );
    parts.join(" ")
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_list(state: &PluginState) -> String {
    if state.descriptors.is_empty() {
        return format!("no plugins configured in {}\n", state.document.display());
    }
    let mut out = String::new();
    for (index, descriptor) in state.descriptors.iter().enumerate() {
        let status = if state.live.contains(&index) {
            "loaded".green()
        } else {
            "skipped".yellow()
        };
        out.push_str(&format!(
            "#{} {} {} [{}]\n",
            index,
            descriptor.kind,
            render_args(descriptor),
            status
        ));
    }
    out
}
