//! Per-element state shared between the template pass and the script pass.
//!
//! The two passes run over different parts of the document but must agree on
//! the element's fields and on the final names of generated helpers. Each
//! element's record moves through three phases:
//!
//! ```text
//! Discovered ──finish_template──▶ TemplateProcessed ──claim──▶ DeclarationConsolidated
//! ```
//!
//! Only the template pass writes while an element is `Discovered`; only the
//! script pass writes once it has claimed the record. Claiming is allowed
//! exactly once per element.

use crate::declaration::MemberValue;
use crate::error::{Result, UpgradeError};
use crate::expression::HelperFunction;
use crate::renamer::{anonymous_helper_name, CallSite, RenamableDeclaration};
use indexmap::IndexMap;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentPhase {
    Discovered,
    TemplateProcessed,
    DeclarationConsolidated,
}

/// Everything known about one published field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyRecord {
    pub type_name: Option<String>,
    pub value: Option<MemberValue>,
    pub notify: bool,
    pub observer: Option<String>,
    pub computed: Option<String>,
    pub reflect: Option<MemberValue>,
    pub leading_comments: Vec<String>,
}

impl PropertyRecord {
    /// Keeps the first comments a field is given.
    pub fn adopt_comments(&mut self, comments: &[String]) {
        if self.leading_comments.is_empty() {
            self.leading_comments = comments.to_vec();
        }
    }
}

#[derive(Debug)]
pub struct ComponentMetadata {
    pub name: String,
    /// Field name → record. Ordered by name, the order `properties` is emitted in.
    pub properties: BTreeMap<String, PropertyRecord>,
    pub host_attributes: IndexMap<String, String>,
    pub listeners: IndexMap<String, String>,
    pub extends: Option<String>,
    /// Set when a template uses the legacy `tokenList` filter.
    pub needs_token_list: bool,
    pending: Vec<RenamableDeclaration>,
    phase: ComponentPhase,
    expression_counter: usize,
}

impl ComponentMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
            host_attributes: IndexMap::new(),
            listeners: IndexMap::new(),
            extends: None,
            needs_token_list: false,
            pending: vec![],
            phase: ComponentPhase::Discovered,
            expression_counter: 0,
        }
    }

    pub fn phase(&self) -> ComponentPhase {
        self.phase
    }

    pub fn property(&mut self, field: &str) -> &mut PropertyRecord {
        self.properties.entry(field.to_string()).or_default()
    }

    /// Seeds a field published through the element's `attributes` list.
    pub fn publish_attribute(&mut self, field: &str) {
        self.property(field).notify = true;
    }

    pub fn merge_listeners<I: IntoIterator<Item = (String, String)>>(&mut self, listeners: I) {
        for (event, handler) in listeners {
            self.listeners.insert(event, handler);
        }
    }

    pub fn merge_host_attrs<I: IntoIterator<Item = (String, String)>>(&mut self, attrs: I) {
        for (name, value) in attrs {
            self.host_attributes.insert(name, value);
        }
    }

    /// Adds a helper declaration. One with identical logic already pending
    /// takes over the new declaration's call sites instead.
    pub fn add_pending_declaration(&mut self, declaration: RenamableDeclaration) {
        match self.pending.iter_mut().find(|d| d.same_logic(&declaration)) {
            Some(existing) => existing.absorb(declaration),
            None => self.pending.push(declaration),
        }
    }

    /// Binds `site` to a helper for `helper`, creating the declaration when
    /// no pending one has the same logic. Unnamed helpers draw the next
    /// `computeExpression<n>` name.
    pub fn hoist(&mut self, helper: HelperFunction, base_name: Option<String>, site: CallSite) {
        if let Some(existing) = self
            .pending
            .iter_mut()
            .find(|d| d.params == helper.params && d.body == helper.body)
        {
            existing.add_call_site(site);
            return;
        }
        let name = base_name.unwrap_or_else(|| self.next_expression_name());
        let mut declaration = helper.named(name);
        declaration.add_call_site(site);
        self.add_pending_declaration(declaration);
    }

    pub fn next_expression_name(&mut self) -> String {
        self.expression_counter += 1;
        anonymous_helper_name(self.expression_counter)
    }

    pub fn pending(&self) -> &[RenamableDeclaration] {
        &self.pending
    }

    /// Hands the pending helpers to the script pass.
    pub fn take_pending(&mut self) -> Vec<RenamableDeclaration> {
        std::mem::take(&mut self.pending)
    }
}

/// All element records for one document, in discovery order.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    components: IndexMap<String, ComponentMetadata>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for `name`, creating it on first access.
    pub fn get(&mut self, name: &str) -> &mut ComponentMetadata {
        self.components
            .entry(name.to_string())
            .or_insert_with(|| ComponentMetadata::new(name))
    }

    pub fn peek(&self, name: &str) -> Option<&ComponentMetadata> {
        self.components.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn finish_template(&mut self, name: &str) -> Result<()> {
        let metadata = self.get(name);
        match metadata.phase {
            ComponentPhase::Discovered | ComponentPhase::TemplateProcessed => {
                metadata.phase = ComponentPhase::TemplateProcessed;
                Ok(())
            }
            ComponentPhase::DeclarationConsolidated => Err(UpgradeError::PhaseViolation {
                element: name.to_string(),
                phase: metadata.phase,
                operation: "process its template after consolidation",
            }),
        }
    }

    /// Claims `name` for the script pass. A name no markup declared gets a
    /// fresh record, since there is no template pass to wait for.
    pub fn claim(&mut self, name: &str) -> Result<&mut ComponentMetadata> {
        let metadata = self.components.entry(name.to_string()).or_insert_with(|| {
            let mut fresh = ComponentMetadata::new(name);
            fresh.phase = ComponentPhase::TemplateProcessed;
            fresh
        });
        match metadata.phase {
            ComponentPhase::Discovered => Err(UpgradeError::PhaseViolation {
                element: name.to_string(),
                phase: metadata.phase,
                operation: "consolidate before its template pass finished",
            }),
            ComponentPhase::TemplateProcessed => {
                metadata.phase = ComponentPhase::DeclarationConsolidated;
                Ok(metadata)
            }
            ComponentPhase::DeclarationConsolidated => Err(UpgradeError::ambiguous(format!(
                "element '{}' is registered more than once",
                name
            ))),
        }
    }

    /// Elements whose helpers were never placed in a declaration.
    pub fn unclaimed_with_pending(&self) -> impl Iterator<Item = &ComponentMetadata> {
        self.components
            .values()
            .filter(|m| m.phase != ComponentPhase::DeclarationConsolidated && !m.pending.is_empty())
    }
}
