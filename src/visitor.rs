//! Document-order traversal over an `RcDom` tree.
//!
//! Rules:
//! 1. Order is pre-order depth-first, the order nodes appear in the markup.
//! 2. `<template>` contents are walked as if they were the template's children.
//! 3. Traversal uses an explicit stack; nesting depth never grows the call stack.
//! 4. Children are read when their parent is yielded, so callers that mutate
//!    the tree should collect first.

use markup5ever_rcdom::{Handle, NodeData};

pub struct DomWalk {
    stack: Vec<Handle>,
}

impl DomWalk {
    /// Walks every descendant of `root`, not `root` itself.
    pub fn descendants(root: &Handle) -> Self {
        let mut walk = DomWalk { stack: vec![] };
        walk.push_children(root);
        walk
    }

    fn push_children(&mut self, node: &Handle) {
        for child in walk_children(node).into_iter().rev() {
            self.stack.push(child);
        }
    }
}

impl Iterator for DomWalk {
    type Item = Handle;

    fn next(&mut self) -> Option<Handle> {
        let node = self.stack.pop()?;
        self.push_children(&node);
        Some(node)
    }
}

/// Children as seen by the walk: template contents first, then ordinary children.
pub fn walk_children(node: &Handle) -> Vec<Handle> {
    let mut out = vec![];
    if let NodeData::Element {
        template_contents, ..
    } = &node.data
    {
        if let Some(contents) = template_contents.borrow().as_ref() {
            out.extend(contents.children.borrow().iter().cloned());
        }
    }
    out.extend(node.children.borrow().iter().cloned());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document;

    #[test]
    fn test_document_order_through_nested_templates() {
        let dom = document::parse_html(
            "<div id=a><template id=b><span id=c></span><template id=d><i id=e></i></template></template><p id=f></p></div>",
        );
        let ids: Vec<String> = DomWalk::descendants(&dom.document)
            .filter_map(|h| document::get_attr(&h, "id"))
            .collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn test_deeply_nested_templates() {
        let depth = 500;
        let source = format!("{}{}", "<template>".repeat(depth), "</template>".repeat(depth));
        let dom = document::parse_html(&source);
        let templates = DomWalk::descendants(&dom.document)
            .filter(|h| document::tag_name(h).as_deref() == Some("template"))
            .count();
        assert_eq!(templates, depth);
    }
}
