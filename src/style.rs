//! Layout attribute upgrade.
//!
//! 0.5 laid elements out with bare attributes (`layout horizontal`, `flex`,
//! `fit`). 1.0 moved those rules into `iron-flex-layout` mixins, so every
//! attribute combination in use gets a stylesheet rule that applies the
//! mixin, and the document imports `iron-flex-layout`.

use crate::document;
use crate::visitor::DomWalk;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use markup5ever_rcdom::Handle;
use regex::Regex;

lazy_static! {
    static ref COMPONENTS_ROOT: Regex = Regex::new(
        r"^(.*)(polymer/polymer\.html|webcomponentsjs/webcomponents(-lite)?(\.min)?\.js)$"
    )
    .unwrap();
}

pub const FLEX_LAYOUT_IMPORT: &str = "iron-flex-layout/iron-flex-layout.html";

/// Attribute sets that map onto an `iron-flex-layout` mixin.
const LAYOUT_MIXINS: &[(&[&str], &str)] = &[
    (&["layout"], "--layout"),
    (&["layout", "horizontal"], "--layout-horizontal"),
    (&["layout", "inline"], "--layout-inline"),
    (&["layout", "horizontal", "reverse"], "--layout-horizontal-reverse"),
    (&["layout", "vertical"], "--layout-vertical"),
    (&["layout", "vertical", "reverse"], "--layout-vertical-reverse"),
    (&["layout", "wrap"], "--layout-wrap"),
    (&["layout", "wrap", "reverse"], "--layout-wrap-reverse"),
    (&["layout", "flex", "auto"], "--layout-flex-auto"),
    (&["layout", "flex", "none"], "--layout-flex-none"),
    (&["layout", "flex"], "--layout-flex"),
    (&["layout", "flex", "one"], "--layout-flex"),
    (&["layout", "flex", "two"], "--layout-flex-2"),
    (&["layout", "flex", "three"], "--layout-flex-3"),
    (&["layout", "flex", "four"], "--layout-flex-4"),
    (&["layout", "flex", "five"], "--layout-flex-5"),
    (&["layout", "flex", "six"], "--layout-flex-6"),
    (&["layout", "flex", "seven"], "--layout-flex-7"),
    (&["layout", "flex", "eight"], "--layout-flex-8"),
    (&["layout", "flex", "nine"], "--layout-flex-9"),
    (&["layout", "flex", "ten"], "--layout-flex-10"),
    (&["layout", "flex", "eleven"], "--layout-flex-11"),
    (&["layout", "flex", "twelve"], "--layout-flex-12"),
    (&["layout", "start"], "--layout-start"),
    (&["layout", "center"], "--layout-center"),
    (&["layout", "end"], "--layout-end"),
    (&["layout", "start-justified"], "--layout-start-justified"),
    (&["layout", "center-justified"], "--layout-center-justified"),
    (&["layout", "end-justified"], "--layout-end-justified"),
    (&["layout", "around-justified"], "--layout-around-justified"),
    (&["layout", "justified"], "--layout-justified"),
    (&["layout", "center-center"], "--layout-center-center"),
    (&["self-start"], "--layout-self-start"),
    (&["self-center"], "--layout-self-center"),
    (&["self-end"], "--layout-self-end"),
    (&["self-stretch"], "--layout-self-stretch"),
    (&["block"], "--layout-block"),
    (&["invisible"], "--layout-invisible"),
    (&["relative"], "--layout-relative"),
    (&["fit"], "--layout-fit"),
    (&["scroll"], "--layout-scroll"),
];

/// Attribute sets whose declarations are written out in full. These win over
/// a mixin for the same selector.
const PLAIN_RULES: &[(&[&str], &str)] = &[
    (&["hidden"], "display: none !important;"),
    (&["relative"], "position: relative;"),
    (&["fit"], "position: absolute;\ntop: 0;\nright: 0;\nbottom: 0;\nleft: 0;"),
    (&["fullbleed"], "margin: 0;\nheight:100vh;"),
];

const STYLE_ADVISORY: &str = "/* TODO(polyup): For speed, consider reworking these styles with .classes
                     and #ids rather than [attributes].
    */";

const IMPORT_ADVISORY: &[&str] = &[
    "TODO(polyup): unable to infer path to components",
    "directory. This import path is probably incomplete.",
];

/// Selector → declaration block, in first-seen order.
pub type CssRules = IndexMap<String, String>;

fn selector(attributes: &[&str]) -> String {
    attributes.iter().map(|a| format!("[{}]", a)).collect()
}

fn has_all(node: &Handle, attributes: &[&str]) -> bool {
    attributes.iter().all(|a| document::has_attr(node, a))
}

/// Rules needed for the layout attributes present on `node`.
pub fn rules_for(node: &Handle) -> CssRules {
    let mut rules = CssRules::new();
    for (attributes, mixin) in LAYOUT_MIXINS {
        if has_all(node, attributes) {
            rules.insert(
                selector(attributes),
                format!("{{\n      @apply({});\n    }}", mixin),
            );
        }
    }
    for (attributes, body) in PLAIN_RULES {
        if has_all(node, attributes) {
            rules.insert(
                selector(attributes),
                format!("{{\n      {}\n    }}", body.replace('\n', "\n      ")),
            );
        }
    }
    rules
}

pub fn stylesheet_text(rules: &CssRules) -> String {
    let mut out = format!("\n    {}", STYLE_ADVISORY);
    for (selector, body) in rules {
        out.push_str("\n    ");
        out.push_str(selector);
        out.push(' ');
        out.push_str(body);
    }
    out.push_str("\n  ");
    out
}

fn style_element(rules: &CssRules, attributes: &[(&str, &str)]) -> Handle {
    let style = document::create_element("style", attributes);
    document::append_child(&style, &document::create_text(&stylesheet_text(rules)));
    style
}

/// Document-level pass over elements outside any element template. Layout
/// attributes found there get a `<style is="custom-style">` in `<head>`.
///
/// `<polymer-element>` tags are skipped; their attributes become `:host`
/// rules in the element's own module.
pub fn upgrade_global_styles(root: &Handle) {
    let mut rules = CssRules::new();
    for node in DomWalk::descendants(root) {
        if document::tag_name(&node).is_none() || document::is_element(&node, "polymer-element") {
            continue;
        }
        if !document::is_attached(&node, root) {
            continue;
        }
        rules.extend(rules_for(&node));
    }
    if rules.is_empty() {
        return;
    }
    let Some(head) = find_head(root) else {
        tracing::warn!("document has no <head> for layout styles");
        return;
    };

    let style = style_element(&rules, &[("is", "custom-style")]);
    document::append_child(&head, &document::create_text("  "));
    document::append_child(&head, &style);
    document::append_child(&head, &document::create_text("\n"));
    add_html_import(root, FLEX_LAYOUT_IMPORT);
}

/// Element-level pass: the element's own layout attributes become `:host`
/// rules, followed by rules for everything inside its template. The style
/// goes first in `module`.
pub fn upgrade_element_styles(root: &Handle, element: &Handle, module: &Handle, template: &Handle) {
    let mut rules: CssRules = rules_for(element)
        .into_iter()
        .map(|(selector, body)| (format!(":host{}", selector), body))
        .collect();
    for node in DomWalk::descendants(template) {
        if document::tag_name(&node).is_some() {
            rules.extend(rules_for(&node));
        }
    }
    if rules.is_empty() {
        return;
    }

    document::prepend_child(module, &style_element(&rules, &[]));
    document::prepend_child(module, &document::create_text("\n  "));
    add_html_import(root, FLEX_LAYOUT_IMPORT);
}

fn find_head(root: &Handle) -> Option<Handle> {
    DomWalk::descendants(root).find(|node| document::is_element(node, "head"))
}

fn is_import_link(node: &Handle) -> bool {
    document::is_element(node, "link") && document::get_attr(node, "rel").as_deref() == Some("import")
}

/// Links `path_within_components` from `<head>` unless an import already
/// points at it. The components directory is taken from the last polymer or
/// webcomponentsjs reference in the document.
pub fn add_html_import(root: &Handle, path_within_components: &str) {
    let mut components_root = None;
    for node in DomWalk::descendants(root) {
        if !document::is_attached(&node, root) {
            continue;
        }
        let reference = if is_import_link(&node) {
            document::get_attr(&node, "href")
        } else if document::is_element(&node, "script") {
            document::get_attr(&node, "src")
        } else {
            None
        };
        let Some(reference) = reference else {
            continue;
        };
        if is_import_link(&node) && reference.ends_with(path_within_components) {
            return;
        }
        if let Some(caps) = COMPONENTS_ROOT.captures(&reference) {
            components_root = Some(caps[1].to_string());
        }
    }
    let Some(head) = find_head(root) else {
        return;
    };

    let href = match &components_root {
        Some(prefix) => format!("{}{}", prefix, path_within_components),
        None => path_within_components.to_string(),
    };
    let link = document::create_element("link", &[("rel", "import"), ("href", href.as_str())]);
    document::append_child(&head, &document::create_text("  "));
    document::append_child(&head, &link);
    document::append_child(&head, &document::create_text("\n"));
    if components_root.is_none() {
        tracing::warn!(import = path_within_components, "unable to infer path to components directory");
        document::insert_comment_before(&link, IMPORT_ADVISORY);
    }
}
