//! Plugin registry and loading through the public library API.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use mlbase::cli::{CommandNode, Outcome, Report, build};
use mlbase::plugin::{
    LoadStatus, Plugin, PluginDescriptor, PluginError, PluginLoader, PluginTypeRegistry,
    RegistryWriter, load_descriptors, parse_descriptors,
};
use serde_json::{Map, Value, json};

/// In-process plugin that installs `notes add` and, on request, a new
/// plugin type for the descriptors that follow it.
struct NotesPlugin {
    added: Rc<RefCell<Vec<String>>>,
    contribute_type: bool,
}

impl Plugin for NotesPlugin {
    fn on_load(
        &mut self,
        registry: &mut RegistryWriter<'_>,
        root: &CommandNode,
    ) -> Result<(), PluginError> {
        let added = self.added.clone();
        root.attach_child(CommandNode::new("notes", "note management"))?
            .attach_child(CommandNode::new("add", "add a note"))?
            .set_handler(move |inv| {
                added.borrow_mut().push(inv.meta().parents().join("/"));
                Ok(Report::ok())
            });

        if self.contribute_type {
            registry.register("echo", |args: &[Value], _: &Map<String, Value>| {
                let name = args
                    .first()
                    .and_then(Value::as_str)
                    .unwrap_or("echo")
                    .to_string();
                Ok(Box::new(EchoLoader { name }) as Box<dyn PluginLoader>)
            })?;
        }
        Ok(())
    }
}

/// Loader for the plugin type contributed by [`NotesPlugin`].
struct EchoLoader {
    name: String,
}

impl PluginLoader for EchoLoader {
    fn load(
        &mut self,
        _registry: &mut RegistryWriter<'_>,
        root: &CommandNode,
    ) -> Result<LoadStatus, PluginError> {
        CommandNode::new(self.name.as_str(), "echo command")
            .attach_to_parent(root)?
            .set_handler(|_| Ok(Report::with_code(3)));
        Ok(LoadStatus::Loaded)
    }

    fn update(&mut self) -> Result<Vec<String>, PluginError> {
        Ok(Vec::new())
    }

    fn describe(&self) -> String {
        format!("echo {}", self.name)
    }
}

struct NotesLoader {
    plugin: NotesPlugin,
}

impl PluginLoader for NotesLoader {
    fn load(
        &mut self,
        registry: &mut RegistryWriter<'_>,
        root: &CommandNode,
    ) -> Result<LoadStatus, PluginError> {
        self.plugin.on_load(registry, root)?;
        Ok(LoadStatus::Loaded)
    }

    fn update(&mut self) -> Result<Vec<String>, PluginError> {
        self.plugin.update()
    }

    fn describe(&self) -> String {
        "notes".to_string()
    }
}

fn registry(added: Rc<RefCell<Vec<String>>>) -> PluginTypeRegistry {
    let mut registry = PluginTypeRegistry::with_builtins(PathBuf::from("/nonexistent/cache"));
    registry
        .register("notes", move |_: &[Value], kwargs: &Map<String, Value>| {
            let contribute_type = kwargs
                .get("contribute_type")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(Box::new(NotesLoader {
                plugin: NotesPlugin {
                    added: added.clone(),
                    contribute_type,
                },
            }) as Box<dyn PluginLoader>)
        })
        .expect("register notes");
    registry
}

fn descriptors(value: Value) -> Vec<PluginDescriptor> {
    serde_json::from_value(value).expect("descriptors")
}

#[test]
fn unresolvable_local_plugin_loads_nothing() {
    let mut registry = registry(Rc::new(RefCell::new(Vec::new())));
    let root = CommandNode::new("root", "r");

    let live = load_descriptors(
        &mut registry,
        &root,
        &descriptors(json!([{"type": "local", "args": ["/no/such/plugin", "PluginClass"]}])),
    )
    .expect("load");

    assert!(live.is_empty());
    assert!(root.children().is_empty());
}

#[test]
fn valid_descriptor_loads_next_to_invalid_one() {
    let added = Rc::new(RefCell::new(Vec::new()));
    let mut registry = registry(added.clone());
    let root = CommandNode::new("root", "r");

    let live = load_descriptors(
        &mut registry,
        &root,
        &descriptors(json!([
            {"type": "local", "args": ["/no/such/plugin", "PluginClass"]},
            {"type": "notes"},
        ])),
    )
    .expect("load");

    assert_eq!(live.len(), 1);
    assert_eq!(live[0].index, 1);
    assert_eq!(live[0].kind, "notes");

    let grammar = build(&root).expect("build");
    assert_eq!(
        grammar.dispatch(["notes", "add"]).expect("dispatch"),
        Outcome::Completed(Report::ok())
    );
    assert_eq!(*added.borrow(), vec!["root/notes"]);
}

#[test]
fn plugin_registered_type_serves_later_descriptors() {
    let mut registry = registry(Rc::new(RefCell::new(Vec::new())));
    let root = CommandNode::new("root", "r");

    let document = r#"
[[plugin]]
type = "notes"
kwargs = { contribute_type = true }

[[plugin]]
type = "echo"
args = ["shout"]
"#;
    let live = load_descriptors(
        &mut registry,
        &root,
        &parse_descriptors(document, false).expect("parse"),
    )
    .expect("load");

    assert_eq!(live.len(), 2);
    assert!(registry.contains("echo"));
    let grammar = build(&root).expect("build");
    assert_eq!(grammar.dispatch(["shout"]).expect("dispatch").exit_code(), 3);
}

#[test]
fn type_used_before_registration_is_unknown() {
    let mut registry = registry(Rc::new(RefCell::new(Vec::new())));
    let root = CommandNode::new("root", "r");

    let err = load_descriptors(
        &mut registry,
        &root,
        &descriptors(json!([
            {"type": "echo", "args": ["shout"]},
            {"type": "notes", "kwargs": {"contribute_type": true}},
        ])),
    )
    .expect_err("echo is not registered yet");

    match err {
        PluginError::Descriptor { index, kind, error } => {
            assert_eq!(index, 0);
            assert_eq!(kind, "echo");
            assert!(matches!(*error, PluginError::UnknownType { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn contributing_an_existing_type_fails() {
    let mut registry = registry(Rc::new(RefCell::new(Vec::new())));
    registry
        .register("echo", |_: &[Value], _: &Map<String, Value>| {
            Ok(Box::new(EchoLoader {
                name: "pre".into(),
            }) as Box<dyn PluginLoader>)
        })
        .expect("register echo");
    let root = CommandNode::new("root", "r");

    let err = load_descriptors(
        &mut registry,
        &root,
        &descriptors(json!([{"type": "notes", "kwargs": {"contribute_type": true}}])),
    )
    .expect_err("duplicate type");

    assert!(err.to_string().contains("already registered"), "{err}");
}

#[test]
fn git_descriptor_with_both_refs_fails_before_fetching() {
    let mut registry = registry(Rc::new(RefCell::new(Vec::new())));
    let root = CommandNode::new("root", "r");

    let err = load_descriptors(
        &mut registry,
        &root,
        &descriptors(json!([{
            "type": "git",
            "kwargs": {
                "path": ".",
                "exported_name": "Notes",
                "repository_url": "https://example.com/notes.git",
                "tag": "v1",
                "commit": "0123abcd",
            },
        }])),
    )
    .expect_err("config error");

    match err {
        PluginError::Descriptor { error, .. } => {
            assert!(matches!(*error, PluginError::Config { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!PathBuf::from("/nonexistent/cache").exists());
}
