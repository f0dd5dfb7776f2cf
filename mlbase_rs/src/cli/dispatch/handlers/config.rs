//! Config-related command handlers
//!
//! Handles: config show, config path, config edit

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use tracing::info;

use crate::cli::command::{CommandNode, TreeError};
use crate::cli::dispatch::Report;
use crate::config::AppConfig;
use crate::process;

/// Build the `config` branch.
pub fn config_commands(config: Rc<AppConfig>, meta_key: &str) -> Result<CommandNode, TreeError> {
    let branch = CommandNode::with_meta_key("config", "inspect or edit the configuration", meta_key);

    let shown = config.clone();
    branch
        .attach_child(CommandNode::with_meta_key(
            "show",
            "print the effective configuration",
            meta_key,
        ))?
        .set_handler(move |_| {
            print!("{}", shown.to_toml()?);
            Ok(Report::ok())
        });

    let located = config.clone();
    branch
        .attach_child(CommandNode::with_meta_key(
            "path",
            "print the configuration file path",
            meta_key,
        ))?
        .set_handler(move |_| {
            println!("{}", located.config_path.display());
            Ok(Report::ok())
        });

    branch
        .attach_child(CommandNode::with_meta_key(
            "edit",
            "open the configuration file in the editor",
            meta_key,
        ))?
        .set_handler(move |_| edit(&config));

    Ok(branch)
}

fn edit(config: &AppConfig) -> anyhow::Result<Report> {
    let path = &config.config_path;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }

    let mut argv = config.editor.argv();
    let program = PathBuf::from(argv.remove(0));
    argv.push(path.display().to_string());

    info!(editor = %program.display(), path = %path.display(), "launching editor");
    let status = process::run(&program, &argv, None)
        .with_context(|| format!("cannot launch editor {}", program.display()))?;

    let mut report = Report::with_code(status.exit_code());
    if let Some(warning) = status.warning() {
        report.warn(warning);
    }
    Ok(report)
}
