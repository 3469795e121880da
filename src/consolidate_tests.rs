//! Consolidation scenarios over whole declarations.

use crate::consolidate::{consolidate, NESTED_OBSERVER_ADVISORY};
use crate::declaration::{parse_object_literal, print_object, MemberValue, ObjectLiteral};
use crate::error::{Result, UpgradeError};
use crate::metadata::PropertyRecord;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

fn run(source: &str, published: &[&str]) -> Result<(ObjectLiteral, BTreeMap<String, PropertyRecord>)> {
    let mut declaration = parse_object_literal(source, "test declaration")?;
    let mut properties = BTreeMap::new();
    for field in published {
        properties
            .entry(field.to_string())
            .or_insert_with(PropertyRecord::default)
            .notify = true;
    }
    consolidate(&mut declaration, &mut properties, "x-test")?;
    Ok((declaration, properties))
}

fn printed(declaration: &ObjectLiteral) -> String {
    print_object(&declaration.members, &declaration.trailing_comments, "", "  ")
}

#[test]
fn test_merge_completeness() {
    let source = r#"{
  publish: {
    b: {value: 1, reflect: true}
  },
  c: 'x',
  cChanged: function (oldValue, newValue) {
    this.seen = newValue;
  },
  computed: {
    d: 'a + b'
  }
}"#;
    let (declaration, properties) = run(source, &["a"]).unwrap();

    assert_eq!(
        properties.keys().collect::<Vec<_>>(),
        vec!["a", "b", "c", "d"]
    );
    assert_eq!(
        printed(&declaration),
        r#"{
  properties: {
    a: {
      notify: true
    },
    b: {
      type: Number,
      value: 1,
      notify: true,
      reflectToAttribute: true
    },
    c: {
      type: String,
      value: 'x',
      observer: 'cChanged'
    },
    d: {
      computed: 'computeD(a, b)'
    }
  },
  cChanged: function (newValue, oldValue) {
    this.seen = newValue;
  },
  computeD: function (a, b) {
    return this.a + this.b;
  }
}"#
    );
}

#[test]
fn test_top_level_value_overrides_publish_value() {
    let (_, properties) = run("{ publish: { size: 1 }, size: 2 }", &[]).unwrap();
    assert_eq!(
        properties["size"].value,
        Some(MemberValue::Literal(crate::declaration::Literal::Number("2".into())))
    );
    assert!(properties["size"].notify);
}

#[test]
fn test_collision_bumps_helper_name() {
    let source = r#"{
  computeFoo: function () {
    return 1;
  },
  computed: {
    foo: 'a * b'
  }
}"#;
    let (declaration, properties) = run(source, &[]).unwrap();
    assert_eq!(properties["foo"].computed.as_deref(), Some("computeFoo2(a, b)"));
    let keys: Vec<&str> = declaration.keys().collect();
    assert_eq!(keys, vec!["properties", "computeFoo", "computeFoo2"]);
}

#[test]
fn test_collision_skips_taken_suffixes() {
    let source = "{ computeFoo: function () {}, computeFoo2: function () {}, computed: { foo: '-a' } }";
    let (_, properties) = run(source, &[]).unwrap();
    assert_eq!(properties["foo"].computed.as_deref(), Some("computeFoo3(a)"));
}

#[test]
fn test_observable_computed_is_kept_as_is() {
    let (declaration, properties) = run("{ computed: { total: 'sum(items)' } }", &[]).unwrap();
    assert_eq!(properties["total"].computed.as_deref(), Some("sum(items)"));
    assert_eq!(declaration.keys().collect::<Vec<_>>(), vec!["properties"]);
}

#[test]
fn test_type_inference_and_factories() {
    let source = "{ flag: true, items: [], config: {a: 1}, when: new Date(), nothing: null }";
    let (_, properties) = run(source, &["items", "config", "when", "nothing"]).unwrap();
    assert_eq!(properties["flag"].type_name.as_deref(), Some("Boolean"));
    assert_eq!(properties["items"].type_name.as_deref(), Some("Array"));
    assert_eq!(properties["config"].type_name.as_deref(), Some("Object"));
    assert_eq!(properties["when"].type_name.as_deref(), Some("Date"));
    assert_eq!(properties["nothing"].type_name, None);
    assert!(properties["items"].value.as_ref().is_some_and(MemberValue::is_function));
    assert!(properties["config"].value.as_ref().is_some_and(MemberValue::is_function));
}

#[test]
fn test_observe_block_fixes_argument_order() {
    let source = r#"{
  observe: {
    'first last': 'namesUpdated',
    count: 'onCount'
  },
  namesUpdated: function (oldValue, newValue) {},
  onCount: function (value) {}
}"#;
    let (declaration, properties) = run(source, &[]).unwrap();
    assert_eq!(properties["first"].observer.as_deref(), Some("namesUpdated"));
    assert_eq!(properties["last"].observer.as_deref(), Some("namesUpdated"));
    assert_eq!(properties["count"].observer.as_deref(), Some("onCount"));

    let params = |key: &str| match &declaration.get(key).unwrap().value {
        MemberValue::Function(f) => f.params.clone(),
        other => panic!("{} is {}", key, other.describe()),
    };
    assert_eq!(params("namesUpdated"), vec!["newValue", "oldValue"]);
    assert_eq!(params("onCount"), vec!["_", "value"]);
}

#[test]
fn test_changed_handler_and_observe_reorder_once() {
    let source = "{ observe: { size: 'sizeChanged' }, sizeChanged: function (a, b) {} }";
    let (declaration, _) = run(source, &[]).unwrap();
    match &declaration.get("sizeChanged").unwrap().value {
        MemberValue::Function(f) => assert_eq!(f.params, vec!["b", "a"]),
        other => panic!("unexpected {}", other.describe()),
    }
}

#[test]
fn test_nested_observer_gets_advisory() {
    let source = r#"{
  observe: {
    'user.name': 'onNameChange'
  },
  onNameChange: function () {}
}"#;
    let (declaration, properties) = run(source, &[]).unwrap();
    assert!(properties.is_empty());
    let member = declaration.get("onNameChange").unwrap();
    assert_eq!(
        member.leading_comments,
        vec![format!("{} 'user.name'.", NESTED_OBSERVER_ADVISORY)]
    );
}

#[test]
fn test_existing_properties_block_is_extended() {
    let source = r#"{
  properties: {
    x: {type: String}
  },
  publish: {
    y: 0
  }
}"#;
    let (declaration, _) = run(source, &[]).unwrap();
    assert_eq!(
        printed(&declaration),
        r#"{
  properties: {
    x: {type: String},
    y: {
      type: Number,
      value: 0,
      notify: true
    }
  }
}"#
    );
}

#[test]
fn test_publish_comments_are_kept() {
    let source = r#"{
  publish: {
    // Shown in the header.
    title: ''
  }
}"#;
    let (_, properties) = run(source, &[]).unwrap();
    assert_eq!(properties["title"].leading_comments, vec!["// Shown in the header."]);
}

#[test]
fn test_shape_errors() {
    let cases = [
        "{ publish: [] }",
        "{ observe: 'x' }",
        "{ observe: { a: 1 } }",
        "{ computed: { a: 1 } }",
        "{ observe: { a: 'notAFunction' }, notAFunction: [1] }",
    ];
    for source in cases {
        assert!(
            matches!(run(source, &[]), Err(UpgradeError::Shape { .. })),
            "{} should be a shape error",
            source
        );
    }
}

#[test]
fn test_reserved_members_are_not_fields() {
    let (declaration, properties) = run("{ is: 'x-test', extends: 'input' }", &[]).unwrap();
    assert!(properties.is_empty());
    assert_eq!(declaration.keys().collect::<Vec<_>>(), vec!["is", "extends"]);
}
