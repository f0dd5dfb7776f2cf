//! Text view of a composed command tree.
//!
//! One line per node, `"{indent}{name}: {description}"`, indented with
//! `>   ` per level. A node reached a second time (a subtree grafted in
//! two places) prints `(see above)` and is not expanded again.

use std::fmt::Write;

use super::node::CommandNode;

const INDENT: &str = ">   ";
const SEE_ABOVE: &str = "(see above)";

/// Render the tree below `root`, including `root` itself.
pub fn render_tree(root: &CommandNode) -> String {
    let mut out = String::new();
    let mut seen: Vec<CommandNode> = Vec::new();
    walk(root, 0, &mut seen, &mut out);
    out
}

fn walk(node: &CommandNode, depth: usize, seen: &mut Vec<CommandNode>, out: &mut String) {
    let repeated = seen.iter().any(|s| s.ptr_eq(node));
    let description = if repeated {
        SEE_ABOVE.to_string()
    } else {
        node.description()
    };
    // Writing into a String cannot fail.
    let _ = writeln!(out, "{}{}: {}", INDENT.repeat(depth), node.name(), description);
    if repeated {
        return;
    }
    seen.push(node.clone());

    for child in node.children() {
        walk(&child, depth + 1, seen, out);
    }
}
