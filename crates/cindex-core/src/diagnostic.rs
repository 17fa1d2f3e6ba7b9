//! Diagnostic reporting for resolution results
//!
//! Every recoverable resolution failure becomes one `Diagnostic`. None of them
//! stop the pass.

use serde::Serialize;

use crate::error::ResolveError;
use crate::input::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DiagnosticKind {
    UnresolvedSymbol,
    UnknownField,
    IndirectionMismatch,
    CyclicTypedef,
    ConflictingDeclaration,
}

impl DiagnosticKind {
    pub const ALL: [DiagnosticKind; 5] = [
        DiagnosticKind::UnresolvedSymbol,
        DiagnosticKind::UnknownField,
        DiagnosticKind::IndirectionMismatch,
        DiagnosticKind::CyclicTypedef,
        DiagnosticKind::ConflictingDeclaration,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::UnresolvedSymbol => "X001",
            DiagnosticKind::UnknownField => "X002",
            DiagnosticKind::IndirectionMismatch => "X003",
            DiagnosticKind::CyclicTypedef => "X004",
            DiagnosticKind::ConflictingDeclaration => "X005",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DiagnosticKind::UnresolvedSymbol => "unresolved-symbol",
            DiagnosticKind::UnknownField => "unknown-field",
            DiagnosticKind::IndirectionMismatch => "indirection-mismatch",
            DiagnosticKind::CyclicTypedef => "cyclic-typedef",
            DiagnosticKind::ConflictingDeclaration => "conflicting-declaration",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticKind::UnresolvedSymbol
            | DiagnosticKind::UnknownField
            | DiagnosticKind::IndirectionMismatch => Severity::Warning,
            DiagnosticKind::CyclicTypedef | DiagnosticKind::ConflictingDeclaration => {
                Severity::Error
            }
        }
    }

    /// Accepts either the code (`X003`) or the name (`indirection-mismatch`).
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code().eq_ignore_ascii_case(key) || kind.name() == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub location: Location,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, location: Location) -> Self {
        Self {
            code: kind.code(),
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            location,
        }
    }

    pub fn from_error(error: &ResolveError, location: Location) -> Self {
        Self::new(error.kind(), error.to_string(), location)
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<_> = DiagnosticKind::ALL.iter().map(|k| k.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), DiagnosticKind::ALL.len());
    }

    #[test]
    fn from_key_accepts_code_and_name() {
        assert_eq!(
            DiagnosticKind::from_key("X003"),
            Some(DiagnosticKind::IndirectionMismatch)
        );
        assert_eq!(
            DiagnosticKind::from_key("x003"),
            Some(DiagnosticKind::IndirectionMismatch)
        );
        assert_eq!(
            DiagnosticKind::from_key("cyclic-typedef"),
            Some(DiagnosticKind::CyclicTypedef)
        );
        assert_eq!(DiagnosticKind::from_key("no-such-thing"), None);
    }

    #[test]
    fn from_error_uses_default_severity() {
        let error = ResolveError::UnresolvedSymbol {
            name: "unknown_f".to_string(),
        };
        let diagnostic = Diagnostic::from_error(&error, Location::new("a.c", 1, 1));

        assert_eq!(diagnostic.code, "X001");
        assert_eq!(diagnostic.severity, Severity::Warning);
        assert_eq!(diagnostic.message, "'unknown_f' is not declared");
    }

    #[test]
    fn severity_can_be_overridden() {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::UnknownField,
            "missing",
            Location::default(),
        )
        .with_severity(Severity::Hint);
        assert_eq!(diagnostic.severity, Severity::Hint);
    }
}
