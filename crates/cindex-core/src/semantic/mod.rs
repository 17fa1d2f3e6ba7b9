//! Semantic layer: declarations, typedef resolution, field access and the
//! reference graph built from them.

pub mod declarations;
pub mod fields;
pub mod merger;
pub mod references;
pub mod typedefs;
pub mod types;

pub use declarations::{
    Conflict, DeclKind, DeclPayload, Declaration, DeclarationId, DeclarationStore, Field,
    FieldRef, FunctionSignature, StructBody,
};
pub use fields::{ChainResolution, FieldAccessResolver, FieldMiss};
pub use merger::{MergeOutcome, merge_into};
pub use references::{
    AccessKind, Reference, ReferenceGraph, SentinelTable, Target, TargetKey, UnknownSymbol,
};
pub use typedefs::{DEFAULT_MAX_TYPEDEF_DEPTH, TypeResolver};
pub use types::{AccessOperator, BuiltinTypes, CanonicalBase, CanonicalType, TypeName, TypeRef};
