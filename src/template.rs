//! Template pass: rewrites the bindings inside one element's `<template>`.
//!
//! Runs before the element's script pass. Helpers produced here are parked in
//! the element's metadata under working names; the script pass gives them
//! their final names, and the call sites recorded here are patched then.
//!
//! With no host element (a `dom-bind` template) there is nowhere to put a
//! helper, so non-observable bindings are left alone with an advisory comment.

use crate::document;
use crate::expression::{self, Rewrite};
use crate::extract::{self, BindingExpression, BindingPiece};
use crate::metadata::ComponentMetadata;
use crate::renamer::{helper_name_for, CallSite};
use crate::declaration::js_string_literal;
use crate::visitor::DomWalk;
use lazy_static::lazy_static;
use markup5ever_rcdom::Handle;
use regex::Regex;

lazy_static! {
    static ref REPEAT_INDEXED: Regex =
        Regex::new(r"^\s*\{\{\s*(.*?)\s*,\s*(.*?)\s+in\s+(.*?)\s*\}\}\s*$").unwrap();
    static ref REPEAT_ALIASED: Regex =
        Regex::new(r"^\s*\{\{\s*(.*?)\s+in\s+(.*?)\s*\}\}\s*$").unwrap();
    static ref REPEAT_BARE: Regex = Regex::new(r"^\s*\{\{\s*(.*?)\s*\}\}\s*$").unwrap();
}

const TOKEN_LIST_FILTER: &str = "tokenList";

const DOM_BIND_ADVISORY: &[&str] = &[
    "TODO(polyup): This expression can't work in a dom-bind template, as it should",
    "be an anonymous computed property. If you convert it into a",
    "Polymer element then polyup should be able to upgrade it.",
];

const REPEAT_ALIAS_ADVISORY: &[&str] = &[
    "TODO(polyup): convert bindings inside this dom-repeat instance below",
    "from {{foo}} to {{item.foo}}",
];

const RAW_TEXT_PARENTS: &[&str] = &["script", "style"];

/// Upgrades `template` in place. `host` is the owning element's metadata, or
/// `None` for a `dom-bind` template.
pub fn upgrade_template(template: &Handle, mut host: Option<&mut ComponentMetadata>) {
    let elements: Vec<Handle> = DomWalk::descendants(template)
        .filter(|node| document::tag_name(node).is_some())
        .collect();

    for node in &elements {
        if document::is_element(node, "template") {
            if document::has_attr(node, "if") && !document::has_attr(node, "is") {
                document::prepend_attr(node, "is", "dom-if");
            }
            if document::has_attr(node, "repeat") {
                upgrade_template_repeat(node);
            }
        }
    }

    for node in &elements {
        for (name, value) in document::attrs(node) {
            upgrade_attribute(node, &name, &value, host.as_deref_mut());
        }
    }

    let text_nodes: Vec<Handle> = DomWalk::descendants(template)
        .filter(|node| document::text(node).is_some())
        .filter(|node| {
            document::parent_of(node)
                .and_then(|parent| document::tag_name(&parent))
                .map_or(true, |tag| !RAW_TEXT_PARENTS.contains(&tag.as_str()))
        })
        .collect();
    for node in text_nodes {
        upgrade_text(&node, host.as_deref_mut());
    }

    for node in &elements {
        if matches!(
            document::tag_name(node).as_deref(),
            Some("input" | "textarea" | "select")
        ) {
            upgrade_input_value(node);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRUCTURAL TEMPLATES
// ═══════════════════════════════════════════════════════════════════════════════

/// `<template repeat="{{item, i in items}}">` →
/// `<template is="dom-repeat" items="{{items}}" as="item" index-as="i">`.
pub fn upgrade_template_repeat(template: &Handle) {
    let Some(repeat) = document::get_attr(template, "repeat") else {
        return;
    };

    let (item_as, index_as, items) = if let Some(caps) = REPEAT_INDEXED.captures(&repeat) {
        (Some(caps[1].to_string()), Some(caps[2].to_string()), caps[3].to_string())
    } else if let Some(caps) = REPEAT_ALIASED.captures(&repeat) {
        (Some(caps[1].to_string()), None, caps[2].to_string())
    } else if let Some(caps) = REPEAT_BARE.captures(&repeat) {
        (None, None, caps[1].to_string())
    } else {
        tracing::warn!(expression = %repeat, "unable to parse template repeat expression");
        return;
    };

    document::remove_attr(template, "repeat");
    if let Some(index_as) = &index_as {
        document::prepend_attr(template, "index-as", index_as);
    }
    if let Some(item_as) = &item_as {
        document::prepend_attr(template, "as", item_as);
    }
    document::prepend_attr(template, "items", &format!("{{{{{}}}}}", items));
    document::prepend_attr(template, "is", "dom-repeat");

    if item_as.is_none() && index_as.is_none() {
        document::insert_comment_before(template, REPEAT_ALIAS_ADVISORY);
    }
}

/// `<input value="{{x}}">` → `<input value="{{x::input}}">`.
fn upgrade_input_value(node: &Handle) {
    let Some(value) = document::get_attr(node, "value") else {
        return;
    };
    let Some(binding) = extract::full_binding(&value) else {
        return;
    };
    if binding.one_time || binding.expression.contains('(') || binding.expression.contains("::") {
        return;
    }
    document::set_attr(node, "value", &format!("{{{{{}::input}}}}", binding.expression));
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTE BINDINGS
// ═══════════════════════════════════════════════════════════════════════════════

fn upgrade_attribute(node: &Handle, name: &str, value: &str, mut host: Option<&mut ComponentMetadata>) {
    if !extract::has_binding(value) {
        return;
    }

    let (source, one_time, filters) = match extract::full_binding(value) {
        Some(binding) => (binding.expression, binding.one_time, binding.filters),
        None => concatenation(value),
    };
    let (open, close) = delimiters(one_time);

    let rewritten = match expression::rewrite(&source) {
        Ok(rewritten) => rewritten,
        Err(err) => {
            tracing::warn!(attribute = name, error = %err, "leaving unparseable binding as written");
            return;
        }
    };

    note_token_list(&filters, host.as_deref_mut());
    match (rewritten, host) {
        (Rewrite::Observable(text), _) => {
            let updated = format!("{}{}{}", open, text, close);
            if updated != value {
                document::set_attr(node, name, &updated);
            }
        }
        (Rewrite::Hoisted(helper), Some(host)) => {
            host.hoist(
                helper,
                Some(helper_name_for(name)),
                CallSite::Attribute {
                    node: node.clone(),
                    attribute: name.to_string(),
                    prefix: open.to_string(),
                    suffix: close.to_string(),
                },
            );
        }
        (Rewrite::Hoisted(_), None) => {
            document::insert_comment_before(node, DOM_BIND_ADVISORY);
        }
    }
}

/// `a {{b}} c` → `'a ' + (b) + ' c'`. One-time only when every binding is.
fn concatenation(value: &str) -> (String, bool, Vec<String>) {
    let mut parts = vec![];
    let mut one_time = true;
    let mut filters = vec![];
    for piece in extract::extract(value) {
        match piece {
            BindingPiece::Literal(text) => parts.push(js_string_literal(&text)),
            BindingPiece::Expression(binding) => {
                one_time &= binding.one_time;
                filters.extend(binding.filters);
                parts.push(format!("({})", binding.expression));
            }
        }
    }
    (parts.join(" + "), one_time, filters)
}

/// The folded binding calls `tokenList`, so the element must define it.
fn note_token_list(filters: &[String], host: Option<&mut ComponentMetadata>) {
    if let Some(host) = host {
        if filters.iter().any(|f| f == TOKEN_LIST_FILTER) {
            host.needs_token_list = true;
        }
    }
}

fn delimiters(one_time: bool) -> (&'static str, &'static str) {
    if one_time {
        ("[[", "]]")
    } else {
        ("{{", "}}")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEXT BINDINGS
// ═══════════════════════════════════════════════════════════════════════════════

fn upgrade_text(node: &Handle, mut host: Option<&mut ComponentMetadata>) {
    let Some(content) = document::text(node) else {
        return;
    };
    if !extract::has_binding(&content) {
        return;
    }
    if let Some(binding) = extract::full_binding(&content) {
        upgrade_text_binding(node, &binding, host);
        return;
    }

    // Mixed text: each binding moves into its own <span> so it can be bound
    // as a whole node.
    for piece in extract::extract(&content) {
        match piece {
            BindingPiece::Literal(text) => document::insert_before(node, &document::create_text(&text)),
            BindingPiece::Expression(binding) => {
                let span = document::create_element("span", &[]);
                let inner = document::create_text(&binding.raw);
                document::append_child(&span, &inner);
                document::insert_before(node, &span);
                upgrade_text_binding(&inner, &binding, host.as_deref_mut());
            }
        }
    }
    document::detach(node);
}

fn upgrade_text_binding(node: &Handle, binding: &BindingExpression, mut host: Option<&mut ComponentMetadata>) {
    let rewritten = match expression::rewrite(&binding.expression) {
        Ok(rewritten) => rewritten,
        Err(err) => {
            tracing::warn!(error = %err, "leaving unparseable binding as written");
            return;
        }
    };

    note_token_list(&binding.filters, host.as_deref_mut());
    match (rewritten, host) {
        (Rewrite::Observable(text), _) => document::set_text(node, &binding.wrap(&text)),
        (Rewrite::Hoisted(helper), Some(host)) => {
            let (open, close) = delimiters(binding.one_time);
            host.hoist(
                helper,
                None,
                CallSite::Text {
                    node: node.clone(),
                    prefix: open.to_string(),
                    suffix: close.to_string(),
                },
            );
        }
        (Rewrite::Hoisted(_), None) => {
            document::insert_comment_before(node, DOM_BIND_ADVISORY);
            document::set_text(node, &binding.wrap(&binding.expression));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(source: &str, host: Option<&mut ComponentMetadata>) -> (markup5ever_rcdom::RcDom, Handle) {
        let dom = document::parse_html(source);
        let template = document::find_elements(&dom.document, "template").remove(0);
        upgrade_template(&template, host);
        (dom, template)
    }

    #[test]
    fn test_template_if_and_repeat() {
        let (_dom, template) = run(
            "<template><template if=\"{{ready}}\"></template><template repeat=\"{{user, i in users}}\" class=\"x\"></template></template>",
            None,
        );
        assert_eq!(
            document::outer_html(&template),
            "<template><template is=\"dom-if\" if=\"{{ready}}\"></template><template is=\"dom-repeat\" items=\"{{users}}\" as=\"user\" index-as=\"i\" class=\"x\"></template></template>"
        );
    }

    #[test]
    fn test_bare_repeat_gets_advisory() {
        let (_dom, template) = run("<template><template repeat=\"{{users}}\"></template></template>", None);
        let html = document::outer_html(&template);
        assert!(html.contains("<template is=\"dom-repeat\" items=\"{{users}}\"></template>"));
        assert!(html.contains("TODO(polyup): convert bindings inside this dom-repeat"));
    }

    #[test]
    fn test_observable_bindings_untouched() {
        let mut meta = ComponentMetadata::new("x-foo");
        let (_dom, template) = run(
            "<template><a href=\"{{link.url}}\">{{ label }}</a></template>",
            Some(&mut meta),
        );
        assert_eq!(
            document::outer_html(&template),
            "<template><a href=\"{{link.url}}\">{{label}}</a></template>"
        );
        assert!(meta.pending().is_empty());
    }

    #[test]
    fn test_text_expression_is_hoisted() {
        let mut meta = ComponentMetadata::new("x-foo");
        let (_dom, template) = run(
            "<template><p>Hello {{first + ' ' + last}}!</p></template>",
            Some(&mut meta),
        );
        assert_eq!(
            document::outer_html(&template),
            "<template><p>Hello <span>{{computeExpression1(first, last)}}</span>!</p></template>"
        );
        assert_eq!(meta.pending().len(), 1);
        assert_eq!(meta.pending()[0].body, "this.first + ' ' + this.last");
    }

    #[test]
    fn test_partial_attribute_becomes_helper() {
        let mut meta = ComponentMetadata::new("x-foo");
        let (_dom, template) = run(
            "<template><div class=\"item {{kind}}\"></div></template>",
            Some(&mut meta),
        );
        assert_eq!(
            document::outer_html(&template),
            "<template><div class=\"{{computeClass(kind)}}\"></div></template>"
        );
        assert_eq!(meta.pending()[0].body, "'item ' + (this.kind)");
    }

    #[test]
    fn test_one_time_binding_keeps_delimiters() {
        let mut meta = ComponentMetadata::new("x-foo");
        let (_dom, template) = run("<template><b>[[a * b]]</b></template>", Some(&mut meta));
        assert_eq!(
            document::outer_html(&template),
            "<template><b>[[computeExpression1(a, b)]]</b></template>"
        );
    }

    #[test]
    fn test_token_list_filter_sets_flag() {
        let mut meta = ComponentMetadata::new("x-foo");
        run(
            "<template><div class=\"{{ {active: on} | tokenList }}\"></div></template>",
            Some(&mut meta),
        );
        assert!(meta.needs_token_list);
    }

    #[test]
    fn test_token_list_on_observable_operand_sets_flag() {
        let mut meta = ComponentMetadata::new("x-foo");
        let (_dom, template) = run(
            "<template><div class=\"{{classes | tokenList}}\"></div><p>{{flags | tokenList}}</p></template>",
            Some(&mut meta),
        );
        assert_eq!(
            document::outer_html(&template),
            "<template><div class=\"{{tokenList(classes)}}\"></div><p>{{tokenList(flags)}}</p></template>"
        );
        assert!(meta.pending().is_empty());
        assert!(meta.needs_token_list);
    }

    #[test]
    fn test_input_value_gets_input_event() {
        let (_dom, template) = run(
            "<template><input value=\"{{name}}\"><input value=\"[[fixed]]\"></template>",
            None,
        );
        assert_eq!(
            document::outer_html(&template),
            "<template><input value=\"{{name::input}}\"><input value=\"[[fixed]]\"></template>"
        );
    }

    #[test]
    fn test_dom_bind_leaves_advisory() {
        let (_dom, template) = run("<template is=\"auto-binding\"><p>{{a + b}}</p></template>", None);
        let html = document::outer_html(&template);
        assert!(html.contains("can't work in a dom-bind template"));
        assert!(html.contains("{{a + b}}"));
    }
}
