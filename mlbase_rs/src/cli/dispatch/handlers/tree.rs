//! `tree`: print the composed command tree.

use anyhow::anyhow;

use crate::cli::command::{CommandNode, render_tree};
use crate::cli::dispatch::Report;

/// Build the `tree` leaf for `root`.
///
/// The handler keeps only a weak handle on `root`, so the tree does not own
/// itself through its own child.
pub fn tree_command(root: &CommandNode) -> CommandNode {
    let weak = root.downgrade();
    let node = CommandNode::with_meta_key("tree", "show the command tree", root.meta_key());
    node.set_handler(move |_| {
        let root = weak
            .upgrade()
            .ok_or_else(|| anyhow!("command tree is no longer available"))?;
        print!("{}", render_tree(&root));
        Ok(Report::ok())
    });
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::dispatch::Outcome;
    use crate::cli::parser::build;

    #[test]
    fn test_tree_command_runs() {
        let root = CommandNode::new("mlbase", "root");
        root.attach_child(tree_command(&root)).unwrap();
        let grammar = build(&root).unwrap();
        assert_eq!(
            grammar.dispatch(["tree"]).unwrap(),
            Outcome::Completed(Report::ok())
        );
    }

    #[test]
    fn test_dropped_root_is_an_error() {
        let grammar = {
            let root = CommandNode::new("mlbase", "root");
            root.attach_child(tree_command(&root)).unwrap();
            build(&root).unwrap()
        };
        assert!(grammar.dispatch(["tree"]).is_err());
    }
}
