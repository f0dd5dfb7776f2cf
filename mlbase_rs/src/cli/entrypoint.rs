//! Shared CLI entry point.
//!
//! Assembles the application root, loads the configured plugins into it,
//! compiles the grammar and dispatches the process arguments once. Embedders
//! can use [`assemble`] directly to graft their own subtrees or register
//! plugin types before plugins load.

use std::cell::RefCell;
use std::rc::Rc;

use colored::Colorize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::command::{CommandNode, TreeError};
use crate::cli::dispatch::handlers::config::config_commands;
use crate::cli::dispatch::handlers::plugin::{PluginState, plugin_commands};
use crate::cli::dispatch::handlers::tree::tree_command;
use crate::cli::dispatch::{DispatchError, Outcome};
use crate::cli::parser::{BuildError, Grammar, build};
use crate::config::AppConfig;
use crate::plugin::{PluginError, PluginTypeRegistry, load_descriptors, read_descriptors};

/// Options controlling binary-specific behavior.
pub struct EntryOptions {
    /// Root command name, shown in usage and `--version` output.
    pub binary_name: &'static str,
    /// One-line description of the root command.
    pub about: &'static str,
}

/// Everything the CLI needs between assembly and dispatch.
pub struct App {
    pub root: CommandNode,
    pub config: Rc<AppConfig>,
    pub registry: Rc<RefCell<PluginTypeRegistry>>,
    pub plugins: Rc<RefCell<PluginState>>,
}

/// Build the root with the operator commands and a registry with the
/// built-in plugin types.
pub fn assemble(opts: &EntryOptions, config: AppConfig) -> Result<App, TreeError> {
    let config = Rc::new(config);
    let registry = Rc::new(RefCell::new(PluginTypeRegistry::with_builtins(
        config.plugin_cache.clone(),
    )));
    let plugins = Rc::new(RefCell::new(PluginState {
        document: config.plugin_config.clone(),
        ..PluginState::default()
    }));

    let mut app = App {
        root: CommandNode::new(opts.binary_name, opts.about),
        config,
        registry,
        plugins,
    };
    app.root = app.operator_root(opts)?;
    Ok(app)
}

impl App {
    /// A fresh root carrying only the built-in operator commands.
    fn operator_root(&self, opts: &EntryOptions) -> Result<CommandNode, TreeError> {
        let root = CommandNode::new(opts.binary_name, opts.about);
        let meta_key = root.meta_key();
        root.attach_child(config_commands(self.config.clone(), &meta_key)?)?;
        root.attach_child(plugin_commands(
            self.registry.clone(),
            self.plugins.clone(),
            &meta_key,
        )?)?;
        root.attach_child(tree_command(&root))?;
        Ok(root)
    }

    /// Drop whatever plugins grafted and keep only the operator commands,
    /// so a broken plugin setup can still be repaired with `plugin update`
    /// or `config edit`.
    pub fn fall_back_to_operator_commands(&mut self, opts: &EntryOptions) -> Result<(), TreeError> {
        self.root = self.operator_root(opts)?;
        self.plugins.borrow_mut().live.clear();
        Ok(())
    }

    /// Read the plugin document and load every descriptor into the root.
    ///
    /// The descriptors are kept for `plugin list` and `plugin update` even
    /// when a load fails part way.
    pub fn load_plugins(&self) -> Result<(), PluginError> {
        let descriptors = read_descriptors(&self.config.plugin_config)?;
        self.plugins.borrow_mut().descriptors = descriptors.clone();

        let live = load_descriptors(&mut self.registry.borrow_mut(), &self.root, &descriptors)?;
        info!(
            configured = descriptors.len(),
            loaded = live.len(),
            "plugins loaded"
        );
        self.plugins.borrow_mut().live = live.iter().map(|l| l.index).collect();
        Ok(())
    }

    /// Compile the finished tree.
    pub fn grammar(&self) -> Result<Grammar, BuildError> {
        Ok(build(&self.root)?.with_version(env!("CARGO_PKG_VERSION")))
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins; otherwise `warn`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber installed by an embedding application takes precedence.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("{} {}", "[mlbase][warn]".yellow(), warning);
    }
}

/// Run the CLI with the given options and return the process exit code.
pub fn run(opts: &EntryOptions) -> anyhow::Result<i32> {
    init_logging();

    let config = AppConfig::load();
    debug!(path = %config.config_path.display(), "config loaded");

    let mut app = assemble(opts, config)?;
    let grammar = match app.load_plugins() {
        Ok(()) => app.grammar().map_err(anyhow::Error::from),
        Err(err) => Err(anyhow::Error::from(err)),
    };
    let grammar = match grammar {
        Ok(grammar) => grammar,
        Err(err) => {
            eprintln!("{} {:#}", "[mlbase][error]".red(), err);
            eprintln!(
                "{} plugin commands are unavailable until this is fixed",
                "[mlbase][warn]".yellow()
            );
            app.fall_back_to_operator_commands(opts)?;
            app.grammar()?
        }
    };

    // nosemgrep: rust.lang.security.args.args
    // args() only selects commands and option values; argv[0] is skipped.
    let argv: Vec<String> = std::env::args().skip(1).collect();
    match grammar.dispatch(argv) {
        Ok(Outcome::Completed(report)) => {
            print_warnings(&report.warnings);
            Ok(report.code)
        }
        Ok(Outcome::HelpShown) => Ok(0),
        Err(DispatchError::Usage(err)) => {
            let _ = err.print();
            Ok(err.exit_code())
        }
        Err(err) => Err(err.into()),
    }
}
