//! Error types for the cross-reference pass
//!
//! `InputError` is the only hard failure: it means the upstream records broke
//! their contract. Everything in `ResolveError` is recoverable and surfaces as
//! a diagnostic plus an Unknown-targeted reference.

use crate::diagnostic::DiagnosticKind;
use crate::input::Location;
use crate::semantic::declarations::DeclKind;
use crate::semantic::types::AccessOperator;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("invalid identifier '{name}' at {location}")]
    InvalidIdentifier { name: String, location: Location },
    #[error("struct '{owner}' declares field '{field}' more than once at {location}")]
    DuplicateField {
        owner: String,
        field: String,
        location: Location,
    },
    #[error("field access at {location} has an empty path")]
    EmptyFieldPath { location: Location },
    #[error("use site {location} appears more than once")]
    DuplicateUseSite { location: Location },
    #[error("source unit '{0}' appears more than once")]
    DuplicateUnit(String),
    #[error("invalid type reference '{text}': {reason}")]
    InvalidTypeRef { text: String, reason: &'static str },
    #[error("invalid field path '{text}'")]
    InvalidFieldPath { text: String },
    #[error("malformed input document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("'{name}' is not declared")]
    UnresolvedSymbol { name: String },
    #[error("'{owner}' has no field named '{field}'")]
    UnknownField { owner: String, field: String },
    #[error("'{operator}' applied to '{field}' on a base with indirection {indirection}")]
    IndirectionMismatch {
        field: String,
        operator: AccessOperator,
        indirection: u32,
    },
    #[error("typedef '{alias}' never reaches a base type: {}", .chain.join(" -> "))]
    CyclicTypedef { alias: String, chain: Vec<String> },
    #[error("conflicting redeclaration of {kind} '{name}'")]
    ConflictingDeclaration { name: String, kind: DeclKind },
}

impl ResolveError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            ResolveError::UnresolvedSymbol { .. } => DiagnosticKind::UnresolvedSymbol,
            ResolveError::UnknownField { .. } => DiagnosticKind::UnknownField,
            ResolveError::IndirectionMismatch { .. } => DiagnosticKind::IndirectionMismatch,
            ResolveError::CyclicTypedef { .. } => DiagnosticKind::CyclicTypedef,
            ResolveError::ConflictingDeclaration { .. } => DiagnosticKind::ConflictingDeclaration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_typedef_message_lists_chain() {
        let err = ResolveError::CyclicTypedef {
            alias: "a".to_string(),
            chain: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "typedef 'a' never reaches a base type: a -> b -> a"
        );
        assert_eq!(err.kind(), DiagnosticKind::CyclicTypedef);
    }

    #[test]
    fn indirection_mismatch_names_operator() {
        let err = ResolveError::IndirectionMismatch {
            field: "fd_true".to_string(),
            operator: AccessOperator::Dot,
            indirection: 1,
        };
        assert_eq!(
            err.to_string(),
            "'.' applied to 'fd_true' on a base with indirection 1"
        );
    }

    #[test]
    fn input_error_carries_location() {
        let err = InputError::EmptyFieldPath {
            location: Location::new("main.c", 3, 7),
        };
        assert_eq!(err.to_string(), "field access at main.c:3:7 has an empty path");
    }
}
