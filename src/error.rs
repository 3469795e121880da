//! Error taxonomy for a single document conversion.
//!
//! Every variant here is fatal: it unwinds out of the per-document driver and
//! nothing is emitted for that document. Recoverable conditions (nested observer
//! paths, unreadable script sources, unparseable template bindings) never become
//! an `UpgradeError`; they are logged through `tracing` and left as inline
//! advisory comments in the output.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpgradeError {
    /// A legacy block exists but does not have the literal shape the merge needs.
    #[error("in {context}: expected {expected}, found {found}")]
    Shape {
        context: String,
        expected: String,
        found: String,
    },

    /// A registration call cannot be tied to exactly one element.
    #[error("ambiguous element registration: {reason}")]
    AmbiguousElement { reason: String },

    /// Metadata was consumed out of order.
    #[error("element '{element}' is in phase {phase:?}, cannot {operation}")]
    PhaseViolation {
        element: String,
        phase: crate::metadata::ComponentPhase,
        operation: &'static str,
    },

    #[error("failed to parse script {origin}: {message}")]
    ScriptSyntax { origin: String, message: String },

    #[error("failed to parse expression '{expression}': {message}")]
    ExpressionSyntax { expression: String, message: String },

    #[error("<polymer-element> without a name attribute")]
    MissingElementName,

    #[error("<polymer-element name=\"{element}\"> has {count} <template> children, expected at most one")]
    MultipleTemplates { element: String, count: usize },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UpgradeError {
    pub fn shape(context: impl Into<String>, expected: &str, found: impl Into<String>) -> Self {
        Self::Shape {
            context: context.into(),
            expected: expected.to_string(),
            found: found.into(),
        }
    }

    pub fn ambiguous(reason: impl Into<String>) -> Self {
        Self::AmbiguousElement {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UpgradeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_message() {
        let err = UpgradeError::shape("publish block of 'x-foo'", "an object literal", "an array");
        assert_eq!(
            err.to_string(),
            "in publish block of 'x-foo': expected an object literal, found an array"
        );
    }
}
