//! Error taxonomy for state resolution
//!
//! Resolution distinguishes three failure classes: invalid query parameters
//! (raised before any I/O), upstream provider failures, and state store
//! failures. Live-monitor registration failures are logged by the pipeline
//! and never surfaced through this taxonomy.

use thiserror::Error;

/// A single field-level validation issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field path, e.g. `resources` or `resources[2]`
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Aggregated validation failure
///
/// Validation runs every check to completion and collects all violations,
/// so a caller sees every problem with a query at once rather than the
/// first one encountered.
#[derive(Debug, Clone, Default, Error)]
#[error("received parameters are not valid ({})", summary(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

fn summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation for a field
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether any recorded violation is tagged with the given field path
    pub fn includes(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

/// Failure classes surfaced by [`StateLens::resolve`](crate::lens::state::StateLens::resolve)
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The query is malformed; carries every violated field
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transport failure, non-success response, or malformed payload from
    /// the upstream provider; not retried, not cached
    #[error("upstream provider request failed: {0:#}")]
    Upstream(anyhow::Error),

    /// State store unavailable or rejected an operation
    #[error("state store operation failed: {0:#}")]
    Persistence(anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_multiple_errors() {
        let mut err = ValidationError::new();
        err.push(
            "resources[0]",
            "Resource is not a valid IP address or CIDR block.",
        );
        err.push(
            "resources[2]",
            "Resource is not a valid IP address or CIDR block.",
        );

        assert_eq!(err.errors.len(), 2);
        assert!(err.includes("resources[0]"));
        assert!(err.includes("resources[2]"));
        assert!(!err.includes("resources[1]"));
    }

    #[test]
    fn test_display_lists_fields() {
        let mut err = ValidationError::new();
        err.push("resources", "At least one resource is required.");

        let msg = err.to_string();
        assert!(msg.contains("resources"));
        assert!(msg.contains("At least one resource is required."));
    }
}
