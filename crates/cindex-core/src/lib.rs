//! Symbol and type cross-reference engine for C-like sources
//!
//! Takes already-parsed declaration and use records, and builds an index that
//! maps every use to the struct, field, typedef, function or global it names,
//! or to a per-name sentinel when nothing declares it.

pub mod analysis;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod input;
pub mod semantic;

pub use analysis::{CrossReferenceIndex, CrossReferencer, IndexSummary, ReferenceView};
pub use config::{Config, ConfigError, load_config, load_config_or_default};
pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
pub use error::{InputError, ResolveError};
pub use input::{
    AccessBase, DeclRecord, FieldRecord, Input, Location, PathSegment, Position, SourceUnit,
    UseRecord, parse_field_path,
};
pub use semantic::{
    AccessKind, DeclKind, DeclarationId, FieldRef, Reference, Target, TypeRef, UnknownSymbol,
};
