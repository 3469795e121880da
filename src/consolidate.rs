//! Merges every legacy way of publishing element state into one `properties`
//! member.
//!
//! Sources, in merge order (later steps win):
//!
//! 1. the element's `attributes` list (already in the records, `notify: true`)
//! 2. top-level scalar literal members, as default values
//! 3. the `publish` block (`notify: true`, optional `value` / `reflect`)
//! 4. top-level members named after a known field override its default
//! 5. type inference from default values
//! 6. object and array defaults become factory functions
//! 7. `<field>Changed` methods become observers
//! 8. the `observe` block
//! 9. the `computed` block, hoisting helpers where needed
//! 10. the `properties` member itself, fields sorted by name

use crate::declaration::{DeclarationMember, MemberValue, ObjectLiteral, ObjectValue};
use crate::error::{Result, UpgradeError};
use crate::expression::{self, Rewrite};
use crate::metadata::PropertyRecord;
use crate::renamer::{helper_name_for, unique_name, RenamableDeclaration};
use std::collections::{BTreeMap, HashSet};

/// Top-level members that are never field defaults.
const RESERVED_MEMBERS: &[&str] = &[
    "is",
    "extends",
    "publish",
    "observe",
    "computed",
    "properties",
    "hostAttributes",
    "listeners",
    "observers",
    "behaviors",
    "eventDelegates",
    "keyBindings",
];

const CHANGED_SUFFIX: &str = "Changed";

pub const NESTED_OBSERVER_ADVISORY: &str =
    "// TODO(polyup): observing nested paths is not supported, this observer was not migrated for";

pub fn consolidate(
    declaration: &mut ObjectLiteral,
    properties: &mut BTreeMap<String, PropertyRecord>,
    element: &str,
) -> Result<()> {
    // 2. Scalar literal members seed defaults; they are removed in step 4.
    for member in &declaration.members {
        if RESERVED_MEMBERS.contains(&member.key.as_str()) {
            continue;
        }
        if let MemberValue::Literal(_) = member.value {
            let record = properties.entry(member.key.clone()).or_default();
            record.value = Some(member.value.clone());
        }
    }

    // 3. publish
    for block in declaration.remove_all("publish") {
        for entry in block_entries(block, element)? {
            let record = properties.entry(entry.key.clone()).or_default();
            record.notify = true;
            record.adopt_comments(&entry.leading_comments);
            match entry.value {
                MemberValue::Object(ObjectValue {
                    members: Some(settings),
                    ..
                }) => {
                    for setting in settings {
                        match setting.key.as_str() {
                            "value" => record.value = Some(setting.value),
                            "reflect" => record.reflect = Some(setting.value),
                            _ => {}
                        }
                    }
                }
                value => record.value = Some(value),
            }
        }
    }

    // 4. Top-level defaults of known fields.
    let members = std::mem::take(&mut declaration.members);
    for member in members {
        let is_default = !RESERVED_MEMBERS.contains(&member.key.as_str())
            && !matches!(member.value, MemberValue::Function(_) | MemberValue::Accessor(_));
        match properties.get_mut(&member.key) {
            Some(record) if is_default => {
                record.adopt_comments(&member.leading_comments);
                record.value = Some(member.value);
            }
            _ => declaration.members.push(member),
        }
    }

    // 5 + 6. Types, then per-instance factories.
    for record in properties.values_mut() {
        if record.type_name.is_none() {
            if let Some(value) = &record.value {
                record.type_name = value.inferred_type().map(str::to_string);
            }
        }
        if let Some(value) = record.value.take() {
            record.value = Some(value.into_factory());
        }
    }

    // 7. fooChanged
    let mut reordered: HashSet<String> = HashSet::new();
    for member in declaration.members.iter_mut() {
        let Some(field) = member.key.strip_suffix(CHANGED_SUFFIX) else {
            continue;
        };
        if field.is_empty() {
            continue;
        }
        let MemberValue::Function(func) = &mut member.value else {
            continue;
        };
        properties.entry(field.to_string()).or_default().observer = Some(member.key.clone());
        func.fix_observer_argument_order();
        reordered.insert(member.key.clone());
    }

    // 8. observe
    let mut observer_names: HashSet<String> = HashSet::new();
    let mut advisories: Vec<(String, String)> = vec![];
    for block in declaration.remove_all("observe") {
        for entry in block_entries(block, element)? {
            let Some(observer) = entry.value.as_string_literal() else {
                return Err(UpgradeError::shape(
                    format!("observer of '{}' in '{}'", entry.key, element),
                    "a string naming a method",
                    entry.value.describe(),
                ));
            };
            observer_names.insert(observer.to_string());
            for field in entry.key.split_whitespace() {
                if field.contains('.') || field.contains('[') {
                    tracing::warn!(
                        element,
                        path = field,
                        "observing nested values is not supported; observer left unmigrated"
                    );
                    advisories.push((
                        observer.to_string(),
                        format!("{} '{}'.", NESTED_OBSERVER_ADVISORY, field),
                    ));
                    continue;
                }
                properties.entry(field.to_string()).or_default().observer =
                    Some(observer.to_string());
            }
        }
    }
    for member in declaration.members.iter_mut() {
        if !observer_names.contains(&member.key) || reordered.contains(&member.key) {
            continue;
        }
        if !member.value.is_function() {
            return Err(UpgradeError::shape(
                format!("registered observer '{}' of '{}'", member.key, element),
                "a function",
                member.value.describe(),
            ));
        }
        if let MemberValue::Function(func) = &mut member.value {
            func.fix_observer_argument_order();
        }
        reordered.insert(member.key.clone());
    }

    // 9. computed
    let mut helpers: Vec<(String, RenamableDeclaration)> = vec![];
    for block in declaration.remove_all("computed") {
        for entry in block_entries(block, element)? {
            let Some(source) = entry.value.as_string_literal() else {
                return Err(UpgradeError::shape(
                    format!("computed property '{}' of '{}'", entry.key, element),
                    "a string expression",
                    entry.value.describe(),
                ));
            };
            let record = properties.entry(entry.key.clone()).or_default();
            record.adopt_comments(&entry.leading_comments);
            match expression::rewrite(source)? {
                Rewrite::Observable(text) => record.computed = Some(text),
                Rewrite::Hoisted(helper) => {
                    let declaration = helper.named(helper_name_for(&entry.key));
                    helpers.push((entry.key.clone(), declaration));
                }
            }
        }
    }
    helpers.sort_by(|a, b| a.1.name().cmp(b.1.name()));
    let mut taken: HashSet<String> = declaration.keys().map(str::to_string).collect();
    for (field, mut helper) in helpers {
        let name = unique_name(helper.name(), &taken);
        helper.rename(name.clone());
        taken.insert(name);
        properties.entry(field).or_default().computed = Some(helper.call_text());
        declaration.push(helper.to_member());
    }

    // 10. properties
    if !properties.is_empty() {
        emit_properties(declaration, properties);
    }

    for (observer, line) in advisories {
        let target = match declaration.position(&observer) {
            Some(index) => index,
            None => declaration.position("properties").unwrap_or(0),
        };
        if let Some(member) = declaration.members.get_mut(target) {
            member.leading_comments.push(line);
        }
    }

    Ok(())
}

fn block_entries(block: DeclarationMember, element: &str) -> Result<Vec<DeclarationMember>> {
    let context = format!("'{}' block of '{}'", block.key, element);
    match block.value {
        MemberValue::Object(ObjectValue {
            members: Some(entries),
            ..
        }) => Ok(entries),
        MemberValue::Object(_) => Err(UpgradeError::shape(
            context,
            "an object literal",
            "an object with spread entries or computed keys",
        )),
        other => Err(UpgradeError::shape(context, "an object literal", other.describe())),
    }
}

fn field_member(name: &str, record: &PropertyRecord) -> DeclarationMember {
    let mut settings = vec![];
    if let Some(type_name) = &record.type_name {
        settings.push(DeclarationMember::new("type", MemberValue::identifier(type_name)));
    }
    if let Some(value) = &record.value {
        settings.push(DeclarationMember::new("value", value.clone()));
    }
    if record.notify {
        settings.push(DeclarationMember::new("notify", MemberValue::boolean(true)));
    }
    if let Some(observer) = &record.observer {
        settings.push(DeclarationMember::new("observer", MemberValue::string(observer)));
    }
    if let Some(computed) = &record.computed {
        settings.push(DeclarationMember::new("computed", MemberValue::string(computed)));
    }
    if let Some(reflect) = &record.reflect {
        settings.push(DeclarationMember::new("reflectToAttribute", reflect.clone()));
    }
    DeclarationMember::new(name, MemberValue::object(settings))
        .with_comments(record.leading_comments.clone())
}

/// Inserts `properties` right after `is` (or `extends`). A declaration that already has a
/// `properties` object keeps it; generated fields it lacks are appended.
fn emit_properties(declaration: &mut ObjectLiteral, properties: &BTreeMap<String, PropertyRecord>) {
    let fields: Vec<DeclarationMember> = properties
        .iter()
        .map(|(name, record)| field_member(name, record))
        .collect();

    if let Some(existing) = declaration.get_mut("properties") {
        if let MemberValue::Object(object) = &mut existing.value {
            if let Some(members) = &mut object.members {
                for field in fields {
                    if !members.iter().any(|m| m.key == field.key) {
                        members.push(field);
                    }
                }
                object.raw = None;
                return;
            }
        }
        tracing::warn!("existing `properties` member is not a plain object; leaving it alone");
        return;
    }

    let index = declaration
        .position("extends")
        .or_else(|| declaration.position("is"))
        .map(|i| i + 1)
        .unwrap_or(0);
    declaration.insert(index, DeclarationMember::new("properties", MemberValue::object(fields)));
}
