//! # Polymer 0.5 → 1.0 upgrader
//!
//! Converts `<polymer-element>` documents and their `Polymer()` registrations
//! to the 1.0 `<dom-module>` / `properties` form.
//!
//! ## Passes
//!
//! 0. **Style pass** (`style`): layout attributes (`layout horizontal`, `fit`)
//!    become `iron-flex-layout` rules, document-wide and per element.
//! 1. **Template pass** (`template`): rewrites bindings inside each element's
//!    `<template>`. Expressions that cannot be bound directly are hoisted into
//!    helper functions parked in the element's metadata under working names.
//! 2. **Script pass** (`script`): claims the element's metadata, merges every
//!    legacy publication mechanism into one `properties` block, then gives the
//!    parked helpers their final, collision-free names. Renaming a helper
//!    patches every markup site that calls it.
//!
//! ## Ordering Invariants
//!
//! - An element's metadata is consumed only after its template pass finished
//!   (`ComponentPhase`), and exactly once.
//! - Helper parameters are the expression's free identifiers, sorted, so the
//!   signature and every call site agree.
//! - Generated names never collide with a member the author wrote.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod consolidate;
mod declaration;
mod document;
mod error;
mod expression;
mod extract;
mod metadata;
mod renamer;
mod scope;
mod script;
mod style;
mod template;
mod upgrade;
mod visitor;

#[cfg(test)]
mod consolidate_tests;
#[cfg(test)]
mod upgrade_tests;

pub use declaration::{
    parse_object_literal, DeclarationMember, FunctionBody, FunctionKind, FunctionValue, Literal,
    MemberValue, ObjectLiteral, ObjectValue,
};
pub use error::{Result, UpgradeError};
pub use expression::{classify, rewrite, HelperFunction, Rewrite};
pub use extract::{extract, full_binding, BindingExpression, BindingPiece};
pub use metadata::{ComponentMetadata, ComponentPhase, MetadataRegistry, PropertyRecord};
pub use consolidate::consolidate;
pub use renamer::{CallSite, RenamableDeclaration};
pub use script::{upgrade_declaration, upgrade_js, ScriptContext};
pub use upgrade::{upgrade_documents, upgrade_html, upgrade_html_source, UpgradeOptions, UpgradedFiles};

/// Node entry point: upgrades one document and returns the changed files as a
/// JSON object of path → contents.
#[cfg(feature = "napi")]
#[napi]
pub fn upgrade_html_native(filename: String, options_json: Option<String>) -> napi::Result<String> {
    let options: UpgradeOptions = match options_json {
        Some(json) => serde_json::from_str(&json).map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => UpgradeOptions::default(),
    };
    let files = upgrade_html(std::path::Path::new(&filename), &options)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let by_path: std::collections::BTreeMap<String, String> = files
        .into_iter()
        .map(|(path, contents)| (path.display().to_string(), contents))
        .collect();
    serde_json::to_string(&by_path).map_err(|e| napi::Error::from_reason(e.to_string()))
}
