//! Deferred helper declarations and their call sites.
//!
//! A helper is created before its final name is known: the template pass
//! gives it a working name, and the script pass picks the final one once the
//! declaration's member set is complete. Every place that calls the helper is
//! recorded as a `CallSite` patch (target node plus the text around the call).
//! `rename` rewrites the declaration and re-applies every patch, so a name can
//! be bumped after a collision without losing earlier call sites.

use crate::declaration::{DeclarationMember, FunctionBody, FunctionKind, FunctionValue, MemberValue};
use crate::document;
use markup5ever_rcdom::Handle;
use std::collections::HashSet;

#[derive(Clone)]
pub enum CallSite {
    /// Attribute value becomes `prefix + call + suffix`.
    Attribute {
        node: Handle,
        attribute: String,
        prefix: String,
        suffix: String,
    },
    /// Text node content becomes `prefix + call + suffix`.
    Text {
        node: Handle,
        prefix: String,
        suffix: String,
    },
}

impl CallSite {
    fn apply(&self, call: &str) {
        match self {
            CallSite::Attribute {
                node,
                attribute,
                prefix,
                suffix,
            } => document::set_attr(node, attribute, &format!("{}{}{}", prefix, call, suffix)),
            CallSite::Text {
                node,
                prefix,
                suffix,
            } => document::set_text(node, &format!("{}{}{}", prefix, call, suffix)),
        }
    }
}

impl std::fmt::Debug for CallSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallSite::Attribute { attribute, .. } => write!(f, "CallSite::Attribute({})", attribute),
            CallSite::Text { .. } => write!(f, "CallSite::Text"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenamableDeclaration {
    name: String,
    /// Sorted dependency names; both the parameter list and the call arguments.
    pub params: Vec<String>,
    /// Expression returned by the helper, already instance-qualified.
    pub body: String,
    call_sites: Vec<CallSite>,
}

impl RenamableDeclaration {
    pub fn new(working_name: impl Into<String>, params: Vec<String>, body: impl Into<String>) -> Self {
        Self {
            name: working_name.into(),
            params,
            body: body.into(),
            call_sites: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call expression text for the current name.
    pub fn call_text(&self) -> String {
        format!("{}({})", self.name, self.params.join(", "))
    }

    /// Registers a call site and writes the current call text into it.
    pub fn add_call_site(&mut self, site: CallSite) {
        site.apply(&self.call_text());
        self.call_sites.push(site);
    }

    pub fn call_sites(&self) -> &[CallSite] {
        &self.call_sites
    }

    /// Moves another declaration's call sites onto this one.
    pub fn absorb(&mut self, other: RenamableDeclaration) {
        for site in other.call_sites {
            self.add_call_site(site);
        }
    }

    pub fn same_logic(&self, other: &RenamableDeclaration) -> bool {
        self.params == other.params && self.body == other.body
    }

    /// Fixes the final name and re-targets every call site recorded so far.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        let call = self.call_text();
        for site in &self.call_sites {
            site.apply(&call);
        }
    }

    /// Declaration member `name: function (params) { return body; }`.
    pub fn to_member(&self) -> DeclarationMember {
        DeclarationMember::new(
            self.name.clone(),
            MemberValue::Function(FunctionValue {
                kind: FunctionKind::Expression,
                name: None,
                is_async: false,
                is_generator: false,
                params: self.params.clone(),
                body: FunctionBody::Block(vec![format!("return {};", self.body)]),
            }),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAMING
// ═══════════════════════════════════════════════════════════════════════════════

/// `compute<Field>` for a field or attribute name. Dashes camel-case the
/// following letter and characters that cannot appear in an identifier drop.
pub fn helper_name_for(field: &str) -> String {
    let mut camel = String::new();
    let mut upper_next = true;
    for c in field.chars() {
        if c == '-' {
            upper_next = true;
            continue;
        }
        if !(c.is_alphanumeric() || c == '_') {
            continue;
        }
        if upper_next {
            camel.extend(c.to_uppercase());
            upper_next = false;
        } else {
            camel.push(c);
        }
    }
    format!("compute{}", camel)
}

pub fn anonymous_helper_name(counter: usize) -> String {
    format!("computeExpression{}", counter)
}

/// Increments a trailing integer, or appends `2` when there is none.
pub fn bump_suffix(name: &str) -> String {
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &name[stem.len()..];
    match digits.parse::<u64>() {
        Ok(n) => format!("{}{}", stem, n + 1),
        Err(_) => format!("{}2", name),
    }
}

pub fn unique_name(candidate: &str, taken: &HashSet<String>) -> String {
    let mut name = candidate.to_string();
    while taken.contains(&name) {
        name = bump_suffix(&name);
    }
    name
}
