//! End-to-end document upgrades.

use crate::error::UpgradeError;
use crate::upgrade::{upgrade_documents, upgrade_html, upgrade_html_source, UpgradeOptions, UpgradedFiles};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn upgrade_one(source: &str) -> Result<String, UpgradeError> {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "element.html", source);
    let mut files = upgrade_html(&path, &UpgradeOptions::default())?;
    Ok(files.remove(&path).unwrap_or_default())
}

fn file<'a>(files: &'a UpgradedFiles, path: &Path) -> &'a str {
    files
        .get(path)
        .unwrap_or_else(|| panic!("{} missing from {:?}", path.display(), files.keys()))
}

#[test]
fn test_element_with_inline_script() {
    let source = r#"<polymer-element name="x-greeting" attributes="name">
  <template>
    <p>{{greeting(name)}}</p>
    <p>{{first + ' ' + last}}</p>
  </template>
  <script>
    Polymer({
      name: 'World'
    });
  </script>
</polymer-element>
"#;
    let expected = r#"<dom-module id="x-greeting">
  <template>
    <p>{{greeting(name)}}</p>
    <p>{{computeExpression1(first, last)}}</p>
  </template>
</dom-module>
<script>
    Polymer({
      is: 'x-greeting',
      properties: {
        name: {
          type: String,
          value: 'World',
          notify: true
        }
      },
      computeExpression1: function (first, last) {
        return this.first + ' ' + this.last;
      }
    });
  </script>
"#;
    assert_eq!(upgrade_one(source).unwrap(), expected);
}

#[test]
fn test_external_script_is_emitted_separately() {
    let dir = TempDir::new().unwrap();
    let doc = write(
        &dir,
        "x-ext.html",
        r#"<polymer-element name="x-ext"><template><p>{{a + b}}</p></template><script src="x-ext.js"></script></polymer-element>"#,
    );
    let script = write(&dir, "x-ext.js", "Polymer({\n  ready: function () {}\n});\n");

    let files = upgrade_html(&doc, &UpgradeOptions::default()).unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(
        file(&files, &script),
        "Polymer({\n  is: 'x-ext',\n  ready: function () {\n  },\n  computeExpression1: function (a, b) {\n    return this.a + this.b;\n  }\n});\n"
    );
    let html = file(&files, &doc);
    assert!(html.contains("<p>{{computeExpression1(a, b)}}</p>"));
    assert!(html.contains(r#"<script src="x-ext.js"></script>"#));
}

#[test]
fn test_helper_name_collision_updates_markup() {
    let source = r#"<polymer-element name="x-clash"><template><span title="{{a * b}}"></span><b>{{x + y}}</b></template><script>
Polymer({
  computeExpression1: function () {},
  computeTitle: function () {}
});
</script></polymer-element>"#;
    let html = upgrade_one(source).unwrap();
    assert!(html.contains(r#"<span title="{{computeTitle2(a, b)}}"></span>"#));
    assert!(html.contains("<b>{{computeExpression2(x, y)}}</b>"));
    assert!(html.contains("  computeTitle2: function (a, b) {\n    return this.a * this.b;\n  }"));
    assert!(html.contains("  computeExpression2: function (x, y) {\n    return this.x + this.y;\n  }"));
}

#[test]
fn test_registration_in_page_script() {
    let source = r#"<polymer-element name="x-late"><template>{{a + b}}</template></polymer-element>
<script>Polymer('x-late', {});</script>"#;
    let html = upgrade_one(source).unwrap();
    assert!(html.contains("<template>{{computeExpression1(a, b)}}</template>"));
    assert!(html.contains("Polymer({\n  is: 'x-late',\n  computeExpression1: function (a, b) {"));
}

#[test]
fn test_noscript_element() {
    let html = upgrade_one(r#"<polymer-element name="x-plain" attributes="label" noscript></polymer-element>"#)
        .unwrap();
    assert_eq!(
        html,
        "<dom-module id=\"x-plain\">\n</dom-module>\n<script>Polymer({\n  is: 'x-plain',\n  properties: {\n    label: {\n      notify: true\n    }\n  }\n});</script>"
    );
}

#[test]
fn test_extends_host_attributes_and_listeners() {
    let source = r#"<polymer-element name="x-button" extends="button" role="button" tabindex="0" on-tap="{{handleTap}}"><script>Polymer({handleTap: function () {}});</script></polymer-element>"#;
    let html = upgrade_one(source).unwrap();
    assert!(html.contains("  is: 'x-button',\n  extends: 'button',\n  handleTap: function () {\n  },"));
    assert!(html.contains("  hostAttributes: {\n    role: 'button',\n    tabindex: '0'\n  },"));
    assert!(html.contains("  listeners: {\n    tap: 'handleTap'\n  }\n});"));
    assert!(!html.contains("Inheriting from other custom elements"));
}

#[test]
fn test_extending_custom_element_gets_advisory() {
    let html = upgrade_one(r#"<polymer-element name="x-fancy" extends="x-base" noscript></polymer-element>"#).unwrap();
    assert!(html.contains("TODO(polyup): Inheriting from other custom elements is not yet supported."));
    assert!(html.contains("extends: 'x-base'"));
}

#[test]
fn test_styles_move_ahead_of_template() {
    let html = upgrade_one(
        r#"<polymer-element name="x-styled"><template><style>p { color: red; }</style><p>x</p></template><script>Polymer({});</script></polymer-element>"#,
    )
    .unwrap();
    assert!(html.starts_with(
        "<dom-module id=\"x-styled\">\n  <style>p { color: red; }</style>\n  <template><p>x</p></template>\n</dom-module>"
    ));
}

#[test]
fn test_element_layout_attributes_become_module_style() {
    let source = "<link rel=\"import\" href=\"../polymer/polymer.html\">\n<polymer-element name=\"x-row\" layout horizontal noscript><template><div fit>a</div></template></polymer-element>";
    let html = upgrade_one(source).unwrap();
    assert!(html.contains(
        "<dom-module id=\"x-row\">\n  <style>\n    /* TODO(polyup): For speed, consider reworking these styles with .classes\n                     and #ids rather than [attributes].\n    */\n    :host[layout] {\n      @apply(--layout);\n    }\n    :host[layout][horizontal] {\n      @apply(--layout-horizontal);\n    }\n    [fit] {\n      position: absolute;\n      top: 0;\n      right: 0;\n      bottom: 0;\n      left: 0;\n    }\n  </style>\n  <template><div fit=\"\">a</div></template>\n</dom-module>"
    ));
    assert_eq!(
        html.matches(r#"<link rel="import" href="../iron-flex-layout/iron-flex-layout.html">"#).count(),
        1
    );
    assert!(!html.contains("custom-style"));
}

#[test]
fn test_page_layout_attributes_become_custom_style() {
    let source = "<script src=\"../webcomponentsjs/webcomponents.js\"></script>\n<div layout vertical>x</div>";
    let html = upgrade_one(source).unwrap();
    let style = html.find("<style is=\"custom-style\">").unwrap();
    let div = html.find("<div layout=\"\" vertical=\"\">x</div>").unwrap();
    assert!(style < div);
    assert!(html.contains("    [layout][vertical] {\n      @apply(--layout-vertical);\n    }"));
    assert!(html.contains(r#"<link rel="import" href="../iron-flex-layout/iron-flex-layout.html">"#));
    assert!(html.contains(r#"<script src="../webcomponentsjs/webcomponents-lite.js"></script>"#));
    assert!(!html.contains("unable to infer"));
}

#[test]
fn test_auto_binding_becomes_dom_bind() {
    let html = upgrade_one(r#"<template is="auto-binding"><p>{{a + b}}</p><input value="{{query}}"></template>"#)
        .unwrap();
    assert!(html.contains(r#"<template is="dom-bind">"#));
    assert!(html.contains("TODO(polyup): This expression can't work in a dom-bind template"));
    assert!(html.contains("<p><!--"));
    assert!(html.contains("{{a + b}}</p>"));
    assert!(html.contains(r#"<input value="{{query::input}}">"#));
}

#[test]
fn test_wrapped_document_keeps_wrapper_and_renames_polyfill() {
    let source = r#"<html><head><script src="../webcomponentsjs/webcomponents.min.js"></script></head><body></body></html>"#;
    let html = upgrade_one(source).unwrap();
    assert_eq!(
        html,
        r#"<html><head><script src="../webcomponentsjs/webcomponents-lite.min.js"></script></head><body></body></html>"#
    );
}

#[test]
fn test_unchanged_document_is_omitted() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "plain.html", "<p>nothing to do</p>\n<script>console.log(1);</script>\n");
    let files = upgrade_html(&path, &UpgradeOptions::default()).unwrap();
    assert!(files.is_empty());
}

#[test]
fn test_unreadable_and_absolute_scripts_are_skipped() {
    let html = upgrade_one(
        r#"<polymer-element name="x-skip"><script src="missing.js"></script><script src="https://cdn.example.com/lib.js"></script></polymer-element>"#,
    )
    .unwrap();
    assert!(html.contains(r#"<script src="missing.js"></script><script src="https://cdn.example.com/lib.js"></script>"#));
}

#[test]
fn test_ignored_script_is_not_rewritten() {
    let dir = TempDir::new().unwrap();
    let doc = write(
        &dir,
        "x-ign.html",
        r#"<polymer-element name="x-ign"><script src="x-ign.js"></script></polymer-element>"#,
    );
    let script = write(&dir, "x-ign.js", "Polymer({});\n");
    let options = UpgradeOptions {
        to_ignore: [script.clone()].into_iter().collect(),
        ..UpgradeOptions::default()
    };
    let files = upgrade_html(&doc, &options).unwrap();
    assert!(!files.contains_key(&script));
    assert!(files.contains_key(&doc));
}

#[test]
fn test_relative_script_paths_are_normalized() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    let doc = write(
        &dir,
        "sub/x-rel.html",
        r#"<polymer-element name="x-rel"><script src="./../x-rel.js"></script></polymer-element>"#,
    );
    let script = write(&dir, "x-rel.js", "Polymer({});\n");

    let files = upgrade_html(&doc, &UpgradeOptions::default()).unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(file(&files, &script), "Polymer({\n  is: 'x-rel'\n});\n");

    let options = UpgradeOptions {
        to_ignore: [dir.path().join("sub/../x-rel.js")].into_iter().collect(),
        ..UpgradeOptions::default()
    };
    let files = upgrade_html(&doc, &options).unwrap();
    assert_eq!(files.keys().collect::<Vec<_>>(), vec![&doc]);
}

#[test]
fn test_token_list_filter_adds_shim() {
    let html = upgrade_one(
        r#"<polymer-element name="x-tok"><template><div class="{{classes | tokenList}}"></div></template><script>Polymer({});</script></polymer-element>"#,
    )
    .unwrap();
    assert!(html.contains(r#"<div class="{{tokenList(classes)}}"></div>"#));
    assert!(html.contains("  is: 'x-tok',\n  tokenList: function (obj) {"));
}

#[test]
fn test_custom_indent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("x-wide.html");
    let options = UpgradeOptions {
        indent: "    ".to_string(),
        ..UpgradeOptions::default()
    };
    let files = upgrade_html_source(
        &path,
        r#"<polymer-element name="x-wide" noscript></polymer-element>"#,
        &options,
    )
    .unwrap();
    assert!(file(&files, &path).contains("Polymer({\n    is: 'x-wide'\n});"));
}

#[test]
fn test_fatal_errors() {
    assert!(matches!(
        upgrade_one("<polymer-element></polymer-element>"),
        Err(UpgradeError::MissingElementName)
    ));
    assert!(matches!(
        upgrade_one(r#"<polymer-element name="x-two"><template></template><template></template></polymer-element>"#),
        Err(UpgradeError::MultipleTemplates { count: 2, .. })
    ));
    assert!(matches!(
        upgrade_one("<script>Polymer({});</script>"),
        Err(UpgradeError::AmbiguousElement { .. })
    ));
    assert!(matches!(
        upgrade_one(r#"<polymer-element name="x-dup"><script>Polymer({});</script><script>Polymer({});</script></polymer-element>"#),
        Err(UpgradeError::AmbiguousElement { .. })
    ));
    assert!(matches!(
        upgrade_one(r#"<polymer-element name="x-bad"><script>Polymer({</script></polymer-element>"#),
        Err(UpgradeError::ScriptSyntax { .. })
    ));
    assert!(matches!(
        upgrade_one(r#"<polymer-element name="x-shape"><script>Polymer({ publish: [] });</script></polymer-element>"#),
        Err(UpgradeError::Shape { .. })
    ));
}

#[test]
fn test_batch_keeps_documents_independent() {
    let dir = TempDir::new().unwrap();
    let good = write(&dir, "good.html", r#"<polymer-element name="x-good" noscript></polymer-element>"#);
    let bad = write(&dir, "bad.html", "<polymer-element></polymer-element>");
    let missing = dir.path().join("missing.html");

    let results = upgrade_documents(&[good.clone(), bad.clone(), missing.clone()], &UpgradeOptions::default());
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, good);
    assert!(results[0].1.as_ref().is_ok_and(|files| files.contains_key(&good)));
    assert!(matches!(results[1].1, Err(UpgradeError::MissingElementName)));
    assert!(matches!(results[2].1, Err(UpgradeError::Io { .. })));
}
