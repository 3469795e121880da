//! Script pass: upgrades the `Polymer()` registrations in one script body.
//!
//! Each call is tied to an element (explicit string name, or the enclosing
//! `<polymer-element>`), its declaration is consolidated against that
//! element's metadata, pending template helpers get their final names, and
//! the call is re-rendered in place. Code outside the calls is untouched.

use crate::consolidate::consolidate;
use crate::declaration::{
    lower_object, print_object, DeclarationMember, FunctionBody, FunctionKind, FunctionValue,
    MemberValue, ObjectLiteral, ObjectValue,
};
use crate::error::{Result, UpgradeError};
use crate::metadata::{ComponentMetadata, MetadataRegistry};
use crate::renamer::unique_name;
use crate::scope::apply_replacements;
use oxc_allocator::Allocator;
use oxc_ast::ast::{Argument, CallExpression, Expression};
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{SourceType, Span};
use std::collections::HashSet;

const REGISTRATION_CALLEE: &str = "Polymer";

/// Where a script came from and how generated members are indented.
#[derive(Debug, Clone, Copy)]
pub struct ScriptContext<'a> {
    /// Element the script belongs to, when it sits inside a `<polymer-element>`.
    pub implicit_element: Option<&'a str>,
    /// Used in error messages.
    pub origin: &'a str,
    pub indent_unit: &'a str,
}

enum DeclarationArg {
    Missing,
    Object(Result<ObjectLiteral>),
    Unsupported(&'static str),
}

struct RegistrationCall {
    span: Span,
    explicit_name: Option<String>,
    declaration: DeclarationArg,
}

struct RegistrationCollector<'s> {
    source: &'s str,
    origin: &'s str,
    calls: Vec<RegistrationCall>,
}

impl<'a, 's> Visit<'a> for RegistrationCollector<'s> {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        let is_registration = matches!(
            &call.callee,
            Expression::Identifier(ident) if ident.name == REGISTRATION_CALLEE
        );
        if !is_registration {
            oxc_ast_visit::walk::walk_call_expression(self, call);
            return;
        }

        let mut args = call.arguments.iter();
        let mut first = args.next();
        let explicit_name = match first.and_then(Argument::as_expression) {
            Some(Expression::StringLiteral(name)) => {
                first = args.next();
                Some(name.value.to_string())
            }
            _ => None,
        };

        let declaration = match first {
            None => DeclarationArg::Missing,
            Some(arg) => match arg.as_expression() {
                Some(Expression::ObjectExpression(object)) => {
                    let context = format!("Polymer() declaration in {}", self.origin);
                    DeclarationArg::Object(lower_object(object, self.source, &context))
                }
                Some(Expression::CallExpression(_)) => DeclarationArg::Unsupported("a call expression"),
                Some(Expression::Identifier(_)) => DeclarationArg::Unsupported("an identifier"),
                Some(_) => DeclarationArg::Unsupported("an expression"),
                None => DeclarationArg::Unsupported("a spread argument"),
            },
        };

        if call.arguments.is_empty() {
            tracing::warn!(origin = self.origin, "found a Polymer() call without arguments");
        }

        self.calls.push(RegistrationCall {
            span: call.span,
            explicit_name,
            declaration,
        });
    }
}

/// Upgrades every registration in `source`. Returns `None` when the script
/// has none, so the caller can leave it byte-for-byte unchanged.
pub fn upgrade_js(
    source: &str,
    registry: &mut MetadataRegistry,
    context: &ScriptContext,
) -> Result<Option<String>> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(false);
    let ret = Parser::new(&allocator, source, source_type).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return Err(UpgradeError::ScriptSyntax {
            origin: context.origin.to_string(),
            message: format!("{:?}", ret.errors),
        });
    }

    let mut collector = RegistrationCollector {
        source,
        origin: context.origin,
        calls: vec![],
    };
    collector.visit_program(&ret.program);
    if collector.calls.is_empty() {
        return Ok(None);
    }

    let mut implicit_used = false;
    let mut replacements = vec![];
    for call in collector.calls {
        let name = match (call.explicit_name, context.implicit_element) {
            (Some(name), implicit) => {
                if implicit == Some(name.as_str()) {
                    implicit_used = true;
                }
                name
            }
            (None, Some(_)) if implicit_used => {
                return Err(UpgradeError::ambiguous(format!(
                    "multiple Polymer() calls without an explicit element name in {}",
                    context.origin
                )))
            }
            (None, Some(implicit)) => {
                implicit_used = true;
                implicit.to_string()
            }
            (None, None) => {
                return Err(UpgradeError::ambiguous(format!(
                    "Polymer() call in {} has no element name and no enclosing <polymer-element>",
                    context.origin
                )))
            }
        };

        let mut declaration = match call.declaration {
            DeclarationArg::Missing => ObjectLiteral::default(),
            DeclarationArg::Object(lowered) => lowered?,
            DeclarationArg::Unsupported(found) => {
                return Err(UpgradeError::shape(
                    format!("Polymer() argument for '{}'", name),
                    "an object literal",
                    found,
                ))
            }
        };

        let metadata = registry.claim(&name)?;
        upgrade_declaration(&mut declaration, metadata)?;
        tracing::debug!(element = %name, members = declaration.members.len(), "declaration upgraded");

        let indent = leading_whitespace(source, call.span.start as usize);
        let rendered = format!(
            "{}({})",
            REGISTRATION_CALLEE,
            print_object(
                &declaration.members,
                &declaration.trailing_comments,
                indent,
                context.indent_unit
            )
        );
        replacements.push((call.span.start, call.span.end, rendered));
    }

    Ok(Some(apply_replacements(source, &replacements)))
}

/// Whitespace at the start of the line containing `offset`.
fn leading_whitespace(source: &str, offset: usize) -> &str {
    let line_start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line = &source[line_start..];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

/// Applies everything the element's metadata says to its declaration.
pub fn upgrade_declaration(
    declaration: &mut ObjectLiteral,
    metadata: &mut ComponentMetadata,
) -> Result<()> {
    let name = metadata.name.clone();

    declaration.remove_all("is");
    declaration.insert(0, DeclarationMember::new("is", MemberValue::string(&name)));
    if let Some(extends) = &metadata.extends {
        if !declaration.contains("extends") {
            declaration.insert(1, DeclarationMember::new("extends", MemberValue::string(extends)));
        }
    }

    consolidate(declaration, &mut metadata.properties, &name)?;

    let host_attributes: Vec<DeclarationMember> = metadata
        .host_attributes
        .iter()
        .map(|(key, value)| {
            let value = if value == "true" {
                MemberValue::boolean(true)
            } else {
                MemberValue::string(value)
            };
            DeclarationMember::new(key.clone(), value)
        })
        .collect();
    merge_block(declaration, "hostAttributes", host_attributes);

    let listeners: Vec<DeclarationMember> = metadata
        .listeners
        .iter()
        .map(|(event, handler)| DeclarationMember::new(event.clone(), MemberValue::string(handler)))
        .collect();
    merge_block(declaration, "listeners", listeners);

    merge_dom_ready(declaration, &name)?;

    let mut taken: HashSet<String> = declaration.keys().map(str::to_string).collect();
    for mut helper in metadata.take_pending() {
        let final_name = unique_name(helper.name(), &taken);
        helper.rename(final_name.clone());
        tracing::debug!(element = %name, helper = %final_name, "template helper named");
        taken.insert(final_name);
        declaration.push(helper.to_member());
    }

    if metadata.needs_token_list && !declaration.contains("tokenList") {
        declaration.push(token_list_member());
    }

    Ok(())
}

/// Adds generated entries to an object-valued member, creating it if needed.
fn merge_block(declaration: &mut ObjectLiteral, key: &str, entries: Vec<DeclarationMember>) {
    if entries.is_empty() {
        return;
    }
    if let Some(existing) = declaration.get_mut(key) {
        if let MemberValue::Object(ObjectValue {
            members: Some(members),
            raw,
        }) = &mut existing.value
        {
            for entry in entries {
                if !members.iter().any(|m| m.key == entry.key) {
                    members.push(entry);
                }
            }
            *raw = None;
            return;
        }
        tracing::warn!(member = key, "existing member is not a plain object; generated entries dropped");
        return;
    }
    declaration.push(DeclarationMember::new(key, MemberValue::object(entries)));
}

/// `domReady` bodies move to the end of `ready`.
fn merge_dom_ready(declaration: &mut ObjectLiteral, element: &str) -> Result<()> {
    let dom_ready = declaration.remove_all("domReady");
    if dom_ready.is_empty() {
        return Ok(());
    }

    let mut bodies = vec![];
    for member in dom_ready {
        match member.value {
            MemberValue::Function(func) => bodies.push(func.body),
            other => {
                return Err(UpgradeError::shape(
                    format!("domReady of '{}'", element),
                    "a function",
                    other.describe(),
                ))
            }
        }
    }

    if !declaration.contains("ready") {
        declaration.push(DeclarationMember::new(
            "ready",
            MemberValue::Function(FunctionValue {
                kind: FunctionKind::Expression,
                name: None,
                is_async: false,
                is_generator: false,
                params: vec![],
                body: FunctionBody::Block(vec![]),
            }),
        ));
    }
    let Some(ready) = declaration.get_mut("ready") else {
        return Ok(());
    };
    let MemberValue::Function(ready) = &mut ready.value else {
        return Err(UpgradeError::shape(
            format!("ready of '{}'", element),
            "a function",
            "another value",
        ));
    };
    for body in &bodies {
        ready.append_body(body);
    }
    Ok(())
}

fn token_list_member() -> DeclarationMember {
    let lines = [
        "var tokens = [];",
        "for (var key in obj) {",
        "  if (obj[key]) {",
        "    tokens.push(key);",
        "  }",
        "}",
        "return tokens.join(' ');",
    ];
    DeclarationMember::new(
        "tokenList",
        MemberValue::Function(FunctionValue {
            kind: FunctionKind::Expression,
            name: None,
            is_async: false,
            is_generator: false,
            params: vec!["obj".to_string()],
            body: FunctionBody::Block(lines.iter().map(|l| l.to_string()).collect()),
        }),
    )
}
