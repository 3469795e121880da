//! Document adapter over html5ever's `RcDom`.
//!
//! Parsing, node queries and in-place mutation, plus a serializer that
//! writes `<template>` contents back inline (the stock rcdom serializer
//! drops them).

use tendril::{StrTendril, TendrilSink};
use html5ever::{parse_document, Attribute, LocalName, Namespace, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};
use std::cell::RefCell;
use std::rc::Rc;

use crate::visitor::DomWalk;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

pub fn parse_html(source: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(source)
}

// ═══════════════════════════════════════════════════════════════════════════════
// QUERIES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn tag_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

pub fn is_element(node: &Handle, tag: &str) -> bool {
    tag_name(node).as_deref() == Some(tag)
}

pub fn get_attr(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == name)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

pub fn has_attr(node: &Handle, name: &str) -> bool {
    get_attr(node, name).is_some()
}

/// Attributes in source order.
pub fn attrs(node: &Handle) -> Vec<(String, String)> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .map(|a| (a.name.local.to_string(), a.value.to_string()))
            .collect(),
        _ => vec![],
    }
}

pub fn text(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// Concatenated text of all descendant text nodes.
pub fn text_content(node: &Handle) -> String {
    DomWalk::descendants(node)
        .filter_map(|child| text(&child))
        .collect()
}

pub fn children(node: &Handle) -> Vec<Handle> {
    node.children.borrow().iter().cloned().collect()
}

pub fn template_contents(node: &Handle) -> Option<Handle> {
    match &node.data {
        NodeData::Element {
            template_contents, ..
        } => template_contents.borrow().clone(),
        _ => None,
    }
}

pub fn parent_of(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    node.parent.set(weak);
    parent
}

pub fn previous_sibling(node: &Handle) -> Option<Handle> {
    let parent = parent_of(node)?;
    let siblings = parent.children.borrow();
    let index = siblings.iter().position(|c| Rc::ptr_eq(c, node))?;
    if index == 0 {
        None
    } else {
        Some(siblings[index - 1].clone())
    }
}

/// Whether `node` hangs off `root` through parent links. Nodes inside template
/// contents do not.
pub fn is_attached(node: &Handle, root: &Handle) -> bool {
    let mut current = parent_of(node);
    while let Some(parent) = current {
        if Rc::ptr_eq(&parent, root) {
            return true;
        }
        current = parent_of(&parent);
    }
    false
}

/// Elements named `tag` below `root`, including inside template contents.
pub fn find_elements(root: &Handle, tag: &str) -> Vec<Handle> {
    DomWalk::descendants(root)
        .filter(|node| is_element(node, tag))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// MUTATION
// ═══════════════════════════════════════════════════════════════════════════════

fn attribute(name: &str, value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
        value: StrTendril::from_slice(value),
    }
}

pub fn set_attr(node: &Handle, name: &str, value: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs = attrs.borrow_mut();
        match attrs.iter_mut().find(|a| &*a.name.local == name) {
            Some(existing) => existing.value = StrTendril::from_slice(value),
            None => attrs.push(attribute(name, value)),
        }
    }
}

/// Sets `name` as the first attribute, removing any later occurrence.
pub fn prepend_attr(node: &Handle, name: &str, value: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs = attrs.borrow_mut();
        attrs.retain(|a| &*a.name.local != name);
        attrs.insert(0, attribute(name, value));
    }
}

pub fn remove_attr(node: &Handle, name: &str) -> Option<String> {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs = attrs.borrow_mut();
        let index = attrs.iter().position(|a| &*a.name.local == name)?;
        return Some(attrs.remove(index).value.to_string());
    }
    None
}

pub fn set_text(node: &Handle, value: &str) {
    if let NodeData::Text { contents } = &node.data {
        *contents.borrow_mut() = StrTendril::from_slice(value);
    }
}

/// Replaces all children of `node` with a single text node.
pub fn replace_children_with_text(node: &Handle, value: &str) {
    for child in children(node) {
        detach(&child);
    }
    append_child(node, &create_text(value));
}

pub fn create_element(tag: &str, attributes: &[(&str, &str)]) -> Handle {
    Node::new(NodeData::Element {
        name: QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(tag)),
        attrs: RefCell::new(
            attributes
                .iter()
                .map(|(name, value)| attribute(name, value))
                .collect(),
        ),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

pub fn create_text(value: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(value)),
    })
}

pub fn create_comment(value: &str) -> Handle {
    Node::new(NodeData::Comment {
        contents: StrTendril::from_slice(value),
    })
}

pub fn detach(node: &Handle) {
    if let Some(parent) = parent_of(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    node.parent.set(None);
}

pub fn append_child(parent: &Handle, child: &Handle) {
    detach(child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

pub fn prepend_child(parent: &Handle, child: &Handle) {
    detach(child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().insert(0, child.clone());
}

fn insert_at_offset(reference: &Handle, new_node: &Handle, offset: usize) {
    let Some(parent) = parent_of(reference) else {
        return;
    };
    detach(new_node);
    let mut siblings = parent.children.borrow_mut();
    let index = siblings
        .iter()
        .position(|c| Rc::ptr_eq(c, reference))
        .map(|i| i + offset)
        .unwrap_or(siblings.len());
    new_node.parent.set(Some(Rc::downgrade(&parent)));
    siblings.insert(index, new_node.clone());
}

pub fn insert_before(reference: &Handle, new_node: &Handle) {
    insert_at_offset(reference, new_node, 0);
}

pub fn insert_after(reference: &Handle, new_node: &Handle) {
    insert_at_offset(reference, new_node, 1);
}

/// Indentation of `node`, taken from the whitespace run in the text before it.
pub fn indentation_before(node: &Handle) -> String {
    previous_sibling(node)
        .and_then(|prev| text(&prev))
        .and_then(|prev| {
            let tail = prev.rsplit('\n').next().unwrap_or("");
            if !tail.is_empty() && tail.chars().all(|c| c == ' ' || c == '\t') {
                Some(tail.to_string())
            } else {
                None
            }
        })
        .unwrap_or_default()
}

/// Inserts a multi-line advisory comment before `node`, indented to match it.
pub fn insert_comment_before(node: &Handle, lines: &[&str]) {
    let indent = indentation_before(node);
    let mut body = String::from("\n");
    for line in lines {
        body.push_str(&indent);
        body.push_str("    ");
        body.push_str(line.trim_end());
        body.push('\n');
    }
    body.push_str(&indent);
    body.push(' ');
    insert_before(node, &create_comment(&body));
    insert_before(node, &create_text(&format!("\n{}", indent)));
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Serializes the whole document. Without `keep_wrappers` the implied
/// `<html>`, `<head>` and `<body>` tags are left out and only their contents
/// are written, for sources that never had them.
pub fn serialize_document(dom: &RcDom, keep_wrappers: bool) -> String {
    let mut out = String::new();
    for child in children(&dom.document) {
        if keep_wrappers || !is_element(&child, "html") {
            serialize_node(&mut out, &child, false);
            continue;
        }
        for part in children(&child) {
            if is_element(&part, "head") || is_element(&part, "body") {
                for inner in children(&part) {
                    serialize_node(&mut out, &inner, false);
                }
            } else {
                serialize_node(&mut out, &part, false);
            }
        }
    }
    out
}

pub fn outer_html(node: &Handle) -> String {
    let mut out = String::new();
    serialize_node(&mut out, node, false);
    out
}

fn serialize_node(out: &mut String, node: &Handle, raw_text: bool) {
    match &node.data {
        NodeData::Document => {
            for child in children(node) {
                serialize_node(out, &child, false);
            }
        }
        NodeData::Doctype { name, .. } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        NodeData::Text { contents } => {
            let contents = contents.borrow();
            if raw_text {
                out.push_str(&contents);
            } else {
                escape(out, &contents, false);
            }
        }
        NodeData::Comment { contents } => {
            out.push_str("<!--");
            out.push_str(contents);
            out.push_str("-->");
        }
        NodeData::ProcessingInstruction { target, contents } => {
            out.push_str("<?");
            out.push_str(target);
            out.push(' ');
            out.push_str(contents);
            out.push('>');
        }
        NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let tag = &*name.local;
            out.push('<');
            out.push_str(tag);
            for attr in attrs.borrow().iter() {
                out.push(' ');
                if let Some(prefix) = &attr.name.prefix {
                    out.push_str(prefix);
                    out.push(':');
                }
                out.push_str(&attr.name.local);
                out.push_str("=\"");
                escape(out, &attr.value, true);
                out.push('"');
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&tag) {
                return;
            }

            let raw = RAW_TEXT_ELEMENTS.contains(&tag);
            if let Some(contents) = template_contents.borrow().as_ref() {
                for child in children(contents) {
                    serialize_node(out, &child, raw);
                }
            }
            for child in children(node) {
                serialize_node(out, &child, raw);
            }

            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn escape(out: &mut String, text: &str, attribute_mode: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            '"' if attribute_mode => out.push_str("&quot;"),
            '<' if !attribute_mode => out.push_str("&lt;"),
            '>' if !attribute_mode => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}
