//! The command node handle and its composition operators.
//!
//! A [`CommandNode`] is a cheap, clonable handle to shared node state, so the
//! node returned by [`CommandNode::attach_child`] can still be configured after
//! it has been grafted onto a parent:
//!
//! ```
//! use mlbase::cli::command::{CommandNode, OptionSpec};
//!
//! let root = CommandNode::new("mlbase", "machine learning helpers");
//! let dataset = CommandNode::new("dataset", "dataset tools").attach_to_parent(&root)?;
//! dataset.declare_option(OptionSpec::new(["--input"]).help("input data"));
//!
//! assert!(root.lookup_child("dataset").is_some_and(|n| n.ptr_eq(&dataset)));
//! # Ok::<(), mlbase::cli::command::TreeError>(())
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use mlbase_common::OptionSpec;

use super::error::TreeError;
use crate::cli::dispatch::{Invocation, Report};

/// Key under which dispatch metadata is recorded unless a tree picks its own.
pub const DEFAULT_META_KEY: &str = "__mlbase_meta__";

/// Leaf action invoked with the parsed invocation context.
pub type Handler = Rc<dyn Fn(&Invocation) -> anyhow::Result<Report>>;

struct NodeInner {
    name: String,
    description: String,
    meta_key: String,
    options: Vec<OptionSpec>,
    children: Vec<CommandNode>,
    handler: Option<Handler>,
}

/// A named, documented node in the command tree.
#[derive(Clone)]
pub struct CommandNode {
    inner: Rc<RefCell<NodeInner>>,
}

/// Non-owning reference to a [`CommandNode`], for handlers that need to look
/// back at the tree they are part of.
#[derive(Clone)]
pub struct WeakCommandNode {
    inner: Weak<RefCell<NodeInner>>,
}

impl WeakCommandNode {
    pub fn upgrade(&self) -> Option<CommandNode> {
        self.inner.upgrade().map(|inner| CommandNode { inner })
    }
}

impl CommandNode {
    /// Create a node using [`DEFAULT_META_KEY`].
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_meta_key(name, description, DEFAULT_META_KEY)
    }

    pub fn with_meta_key(
        name: impl Into<String>,
        description: impl Into<String>,
        meta_key: impl Into<String>,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(NodeInner {
                name: name.into(),
                description: description.into(),
                meta_key: meta_key.into(),
                options: Vec::new(),
                children: Vec::new(),
                handler: None,
            })),
        }
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    pub fn description(&self) -> String {
        self.inner.borrow().description.clone()
    }

    pub fn meta_key(&self) -> String {
        self.inner.borrow().meta_key.clone()
    }

    /// Option declarations in declaration order.
    pub fn options(&self) -> Vec<OptionSpec> {
        self.inner.borrow().options.clone()
    }

    /// Child handles in insertion order.
    pub fn children(&self) -> Vec<CommandNode> {
        self.inner.borrow().children.clone()
    }

    pub fn handler(&self) -> Option<Handler> {
        self.inner.borrow().handler.clone()
    }

    pub fn has_handler(&self) -> bool {
        self.inner.borrow().handler.is_some()
    }

    /// True when the node has no children. Only leaves can run a handler.
    pub fn is_leaf(&self) -> bool {
        self.inner.borrow().children.is_empty()
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &CommandNode) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakCommandNode {
        WeakCommandNode {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Attach `child` under `self` and return `child`.
    ///
    /// Returning the child means `a.attach_child(b)?.attach_child(c)?` grows
    /// the path `a > b > c`; re-bind to the parent to fan out instead.
    pub fn attach_child(&self, child: CommandNode) -> Result<CommandNode, TreeError> {
        let parent_name = self.name();
        let child_name = child.name();

        if self.lookup_child(&child_name).is_some() {
            return Err(TreeError::DuplicateName {
                parent: parent_name,
                name: child_name,
            });
        }

        let expected = self.meta_key();
        let found = child.meta_key();
        if expected != found {
            return Err(TreeError::MetaKeyMismatch {
                parent: parent_name,
                child: child_name,
                expected,
                found,
            });
        }

        if child.contains(self) {
            return Err(TreeError::Cycle {
                parent: parent_name,
                child: child_name,
            });
        }

        self.inner.borrow_mut().children.push(child.clone());
        Ok(child)
    }

    /// Attach `self` under `parent` and return `self`.
    ///
    /// Reads left to right: "this node, attached under that parent".
    pub fn attach_to_parent(self, parent: &CommandNode) -> Result<CommandNode, TreeError> {
        parent.attach_child(self)
    }

    /// The direct child named `name`, if any.
    pub fn lookup_child(&self, name: &str) -> Option<CommandNode> {
        self.inner
            .borrow()
            .children
            .iter()
            .find(|child| child.inner.borrow().name == name)
            .cloned()
    }

    /// Follow `path` from this node. An empty path yields `self`.
    pub fn lookup_path<S: AsRef<str>>(&self, path: &[S]) -> Option<CommandNode> {
        path.iter()
            .try_fold(self.clone(), |node, name| node.lookup_child(name.as_ref()))
    }

    /// Append an option declaration. Not validated until the grammar is built.
    pub fn declare_option(&self, spec: OptionSpec) -> &Self {
        self.inner.borrow_mut().options.push(spec);
        self
    }

    /// Install the leaf handler, replacing any previous one.
    pub fn set_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn(&Invocation) -> anyhow::Result<Report> + 'static,
    {
        self.inner.borrow_mut().handler = Some(Rc::new(handler));
        self
    }

    /// Whether `target` is this node or sits anywhere below it.
    fn contains(&self, target: &CommandNode) -> bool {
        if self.ptr_eq(target) {
            return true;
        }
        self.children().iter().any(|child| child.contains(target))
    }
}

impl fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("CommandNode")
            .field("name", &inner.name)
            .field("meta_key", &inner.meta_key)
            .field("options", &inner.options.len())
            .field(
                "children",
                &inner
                    .children
                    .iter()
                    .map(|c| c.inner.borrow().name.clone())
                    .collect::<Vec<_>>(),
            )
            .field("handler", &inner.handler.is_some())
            .finish()
    }
}
