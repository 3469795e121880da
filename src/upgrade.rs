//! Per-document driver.
//!
//! Layout attributes outside element templates are upgraded first. Then, for
//! every `<polymer-element>` in document order: seed its metadata from the
//! element's attributes, build the `<dom-module>` with its layout styles, run
//! the template pass, then run the script pass over the element's scripts. Page scripts outside any
//! element run last without an implicit element. Documents are independent;
//! `upgrade_documents` converts many of them in parallel.

use crate::declaration::js_string_literal;
use crate::document::{self, parse_html, serialize_document};
use crate::error::{Result, UpgradeError};
use crate::extract;
use crate::metadata::{ComponentPhase, MetadataRegistry};
use crate::script::{upgrade_js, ScriptContext};
use crate::style;
use crate::template::upgrade_template;
use crate::visitor::DomWalk;
use lazy_static::lazy_static;
use markup5ever_rcdom::Handle;
use rayon::prelude::*;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

lazy_static! {
    static ref ABSOLUTE_URL: Regex = Regex::new(r"^(?i)(data:|https?:|//|/)").unwrap();
    static ref WEBCOMPONENTS_SRC: Regex =
        Regex::new(r"^(.*/)?webcomponents(\.min)?\.js$").unwrap();
    static ref ATTRIBUTE_LIST_SEPARATOR: Regex = Regex::new(r"[\s,]+").unwrap();
}

/// Attributes of `<polymer-element>` that are not host attributes.
const KNOWN_ELEMENT_ATTRIBUTES: &[&str] = &["name", "attributes", "noscript", "extends", "id"];

const LISTENER_PREFIX: &str = "on-";

const INHERITANCE_ADVISORY: &[&str] = &[
    "TODO(polyup): Inheriting from other custom elements is not yet supported.",
    "See: https://www.polymer-project.org/1.0/docs/migration.html#inheritance",
];

/// Output of one document: path → new contents, for every file that changed.
pub type UpgradedFiles = BTreeMap<PathBuf, String>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeOptions {
    /// Script files that are never rewritten.
    #[serde(default)]
    pub to_ignore: HashSet<PathBuf>,
    /// One indentation step inside generated declarations.
    #[serde(default = "default_indent")]
    pub indent: String,
}

fn default_indent() -> String {
    "  ".to_string()
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            to_ignore: HashSet::new(),
            indent: default_indent(),
        }
    }
}

/// Reads and upgrades the document at `path`.
pub fn upgrade_html(path: &Path, options: &UpgradeOptions) -> Result<UpgradedFiles> {
    let source = std::fs::read_to_string(path).map_err(|source| UpgradeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    upgrade_html_source(path, &source, options)
}

/// Upgrades `source` as if it were the document at `path`. External scripts
/// are still read relative to `path`.
pub fn upgrade_html_source(
    path: &Path,
    source: &str,
    options: &UpgradeOptions,
) -> Result<UpgradedFiles> {
    let document_path = resolve_path(path);
    let dom = parse_html(source);
    let keep_wrappers = source.to_ascii_lowercase().contains("<html");
    let before = serialize_document(&dom, keep_wrappers);

    style::upgrade_global_styles(&dom.document);

    let mut upgrade = DocumentUpgrade {
        root: dom.document.clone(),
        document_path: &document_path,
        options,
        registry: MetadataRegistry::new(),
        results: BTreeMap::new(),
        handled_scripts: vec![],
    };

    for element in document::find_elements(&dom.document, "polymer-element") {
        upgrade.upgrade_element(&element)?;
    }
    upgrade.upgrade_page_scripts()?;
    upgrade_auto_binding(&dom.document);
    rename_webcomponents_scripts(&dom.document);

    for metadata in upgrade.registry.unclaimed_with_pending() {
        tracing::warn!(
            element = %metadata.name,
            helpers = metadata.pending().len(),
            "element has template helpers but no Polymer() registration to hold them"
        );
    }

    let after = serialize_document(&dom, keep_wrappers);
    let mut results = upgrade.results;
    if after != before {
        results.insert(document_path, after);
    }
    Ok(results)
}

/// Upgrades each document independently, in parallel.
pub fn upgrade_documents(
    paths: &[PathBuf],
    options: &UpgradeOptions,
) -> Vec<(PathBuf, Result<UpgradedFiles>)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), upgrade_html(path, options)))
        .collect()
}

struct DocumentUpgrade<'a> {
    root: Handle,
    document_path: &'a Path,
    options: &'a UpgradeOptions,
    registry: MetadataRegistry,
    results: UpgradedFiles,
    handled_scripts: Vec<Handle>,
}

impl DocumentUpgrade<'_> {
    fn upgrade_element(&mut self, element: &Handle) -> Result<()> {
        let name = document::get_attr(element, "name")
            .filter(|n| !n.trim().is_empty())
            .ok_or(UpgradeError::MissingElementName)?;
        tracing::debug!(element = %name, "upgrading <polymer-element>");

        self.seed_metadata(element, &name);
        if let Some(extends) = document::get_attr(element, "extends") {
            if extends.contains('-') {
                document::insert_comment_before(element, INHERITANCE_ADVISORY);
            }
        }

        let templates: Vec<Handle> = document::children(element)
            .into_iter()
            .filter(|child| document::is_element(child, "template"))
            .collect();
        if templates.len() > 1 {
            return Err(UpgradeError::MultipleTemplates {
                element: name,
                count: templates.len(),
            });
        }

        let module = document::create_element("dom-module", &[("id", name.as_str())]);
        document::append_child(&module, &document::create_text("\n"));
        if let Some(template) = templates.first() {
            hoist_styles(&module, template);
            document::append_child(&module, &document::create_text("  "));
            document::append_child(&module, template);
            document::append_child(&module, &document::create_text("\n"));
            style::upgrade_element_styles(&self.root, element, &module, template);
            upgrade_template(template, Some(self.registry.get(&name)));
        }
        self.registry.finish_template(&name)?;

        if document::has_attr(element, "noscript") {
            let script = document::create_element("script", &[]);
            document::append_child(
                &script,
                &document::create_text(&format!("Polymer({});", js_string_literal(&name))),
            );
            document::append_child(element, &script);
        }

        // Scripts follow the module, in their original order.
        let mut anchor = element.clone();
        for script in document::find_elements(element, "script") {
            document::insert_after(&anchor, &script);
            anchor = script.clone();
            self.upgrade_script(&script, Some(&name))?;
        }

        let leftovers = document::children(element)
            .into_iter()
            .filter(|child| document::tag_name(child).is_some())
            .count();
        if leftovers > 0 {
            tracing::warn!(element = %name, leftovers, "dropping unexpected children of <polymer-element>");
        }

        document::insert_before(element, &module);
        document::insert_after(&module, &document::create_text("\n"));
        document::detach(element);

        if self.registry.peek(&name).map(|m| m.phase()) != Some(ComponentPhase::DeclarationConsolidated) {
            tracing::debug!(element = %name, "element scripts did not register it");
        }
        Ok(())
    }

    fn seed_metadata(&mut self, element: &Handle, name: &str) {
        let metadata = self.registry.get(name);
        let mut host_attributes = vec![];
        let mut listeners = vec![];
        for (attr, value) in document::attrs(element) {
            if attr == "attributes" {
                for field in ATTRIBUTE_LIST_SEPARATOR.split(&value).filter(|f| !f.is_empty()) {
                    metadata.publish_attribute(field);
                }
            } else if attr == "extends" {
                metadata.extends = Some(value);
            } else if let Some(event) = attr.strip_prefix(LISTENER_PREFIX) {
                let handler = extract::full_binding(&value)
                    .map(|binding| binding.expression)
                    .unwrap_or(value);
                listeners.push((event.to_string(), handler.trim().to_string()));
            } else if !KNOWN_ELEMENT_ATTRIBUTES.contains(&attr.as_str()) {
                host_attributes.push((attr, value));
            }
        }
        metadata.merge_host_attrs(host_attributes);
        metadata.merge_listeners(listeners);
    }

    fn upgrade_page_scripts(&mut self) -> Result<()> {
        let root = self.root.clone();
        for script in document::find_elements(&root, "script") {
            if self.handled_scripts.iter().any(|s| Rc::ptr_eq(s, &script)) {
                continue;
            }
            if !document::is_attached(&script, &root) {
                continue;
            }
            self.upgrade_script(&script, None)?;
        }
        Ok(())
    }

    fn upgrade_script(&mut self, script: &Handle, implicit: Option<&str>) -> Result<()> {
        self.handled_scripts.push(script.clone());
        if !is_javascript(script) {
            return Ok(());
        }

        let Some(src) = document::get_attr(script, "src") else {
            let origin = format!("inline script in {}", self.document_path.display());
            let context = ScriptContext {
                implicit_element: implicit,
                origin: &origin,
                indent_unit: &self.options.indent,
            };
            let source = document::text_content(script);
            if let Some(upgraded) = upgrade_js(&source, &mut self.registry, &context)? {
                document::replace_children_with_text(script, &upgraded);
            }
            return Ok(());
        };

        if ABSOLUTE_URL.is_match(&src) {
            tracing::warn!(src = %src, "ignoring script with an absolute url");
            return Ok(());
        }
        let base = self.document_path.parent().unwrap_or_else(|| Path::new(""));
        let script_path = normalize_path(&base.join(&src));
        if self.options.to_ignore.iter().any(|ignored| resolve_path(ignored) == script_path) {
            tracing::debug!(path = %script_path.display(), "script is in the ignore list");
            return Ok(());
        }
        let source = match std::fs::read_to_string(&script_path) {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(path = %script_path.display(), error = %err, "unable to read script source");
                return Ok(());
            }
        };

        let origin = script_path.display().to_string();
        let context = ScriptContext {
            implicit_element: implicit,
            origin: &origin,
            indent_unit: &self.options.indent,
        };
        if let Some(upgraded) = upgrade_js(&source, &mut self.registry, &context)? {
            self.results.insert(script_path, upgraded);
        }
        Ok(())
    }
}

/// Moves `<style>` elements out of `template` into `module`, ahead of it.
fn hoist_styles(module: &Handle, template: &Handle) {
    let styles: Vec<Handle> = DomWalk::descendants(template)
        .filter(|node| document::is_element(node, "style"))
        .collect();
    for style in styles {
        if let Some(before) = document::previous_sibling(&style) {
            if document::text(&before).is_some_and(|t| t.trim().is_empty()) {
                document::detach(&before);
            }
        }
        document::append_child(module, &document::create_text("  "));
        document::append_child(module, &style);
        document::append_child(module, &document::create_text("\n"));
    }
}

/// `<template is="auto-binding">` becomes `dom-bind`.
fn upgrade_auto_binding(root: &Handle) {
    for template in document::find_elements(root, "template") {
        if document::get_attr(&template, "is").as_deref() != Some("auto-binding") {
            continue;
        }
        if !document::is_attached(&template, root) {
            continue;
        }
        document::set_attr(&template, "is", "dom-bind");
        upgrade_template(&template, None);
    }
}

fn rename_webcomponents_scripts(root: &Handle) {
    for script in document::find_elements(root, "script") {
        let Some(src) = document::get_attr(&script, "src") else {
            continue;
        };
        if WEBCOMPONENTS_SRC.is_match(&src) {
            let renamed = WEBCOMPONENTS_SRC.replace(&src, "${1}webcomponents-lite${2}.js");
            document::set_attr(&script, "src", &renamed);
        }
    }
}

/// Absolute, with `.` and `..` resolved lexically.
fn resolve_path(path: &Path) -> PathBuf {
    normalize_path(&std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()))
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

fn is_javascript(script: &Handle) -> bool {
    match document::get_attr(script, "type") {
        None => true,
        Some(kind) => {
            let kind = kind.trim().to_ascii_lowercase();
            kind.is_empty() || kind == "text/javascript" || kind == "application/javascript"
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_json() {
        let options: UpgradeOptions =
            serde_json::from_str(r#"{"toIgnore": ["/a/b.js"], "indent": "    "}"#).unwrap();
        assert!(options.to_ignore.contains(Path::new("/a/b.js")));
        assert_eq!(options.indent, "    ");

        let defaults: UpgradeOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults.indent, "  ");
        assert!(defaults.to_ignore.is_empty());
    }

    #[test]
    fn test_absolute_urls() {
        for src in ["http://x/a.js", "https://x/a.js", "//cdn/a.js", "/abs/a.js", "data:text/js,1"] {
            assert!(ABSOLUTE_URL.is_match(src), "{}", src);
        }
        assert!(!ABSOLUTE_URL.is_match("a.js"));
        assert!(!ABSOLUTE_URL.is_match("../lib/a.js"));
    }

    #[test]
    fn test_webcomponents_rename() {
        let dom = parse_html(
            r#"<script src="../webcomponentsjs/webcomponents.min.js"></script><script src="webcomponents.js"></script>"#,
        );
        rename_webcomponents_scripts(&dom.document);
        let srcs: Vec<String> = document::find_elements(&dom.document, "script")
            .iter()
            .filter_map(|s| document::get_attr(s, "src"))
            .collect();
        assert_eq!(
            srcs,
            vec![
                "../webcomponentsjs/webcomponents-lite.min.js",
                "webcomponents-lite.js"
            ]
        );
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/sub/../b.js")), PathBuf::from("/a/b.js"));
        assert_eq!(normalize_path(Path::new("/a/./b/./c.js")), PathBuf::from("/a/b/c.js"));
        assert_eq!(normalize_path(Path::new("/../a.js")), PathBuf::from("/a.js"));
        assert_eq!(normalize_path(Path::new("../../a.js")), PathBuf::from("../../a.js"));
        assert_eq!(normalize_path(Path::new("x/../../a.js")), PathBuf::from("../a.js"));
    }

    #[test]
    fn test_script_type_filter() {
        let dom = parse_html(
            r#"<script></script><script type="text/javascript"></script><script type="text/template"></script>"#,
        );
        let kinds: Vec<bool> = document::find_elements(&dom.document, "script")
            .iter()
            .map(is_javascript)
            .collect();
        assert_eq!(kinds, vec![true, true, false]);
    }
}
