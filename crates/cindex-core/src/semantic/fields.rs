//! Field access resolution
//!
//! Resolves `base.field` and `base->field` against the canonical type of the
//! base, and walks chains such as `p->fd_ptr->fd_true` left to right. The
//! first failing segment ends the walk; later segments are never looked at.

use super::declarations::{DeclarationStore, Field, FieldRef};
use super::typedefs::TypeResolver;
use super::types::{AccessOperator, CanonicalBase, TypeRef};
use crate::error::ResolveError;
use crate::input::PathSegment;

/// Why a field could not be resolved, plus the name of the sentinel the
/// failed use is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMiss {
    pub sentinel: String,
    pub error: ResolveError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainResolution {
    Resolved {
        field: FieldRef,
        /// Every segment in order, the last one equal to `field`.
        path: Vec<FieldRef>,
    },
    Failed {
        /// Index of the failing segment.
        at: usize,
        miss: FieldMiss,
        /// Segments resolved before the failure.
        reached: Vec<FieldRef>,
    },
}

pub struct FieldAccessResolver<'a> {
    types: &'a TypeResolver<'a>,
}

impl<'a> FieldAccessResolver<'a> {
    pub fn new(types: &'a TypeResolver<'a>) -> Self {
        Self { types }
    }

    fn store(&self) -> &'a DeclarationStore {
        self.types.store()
    }

    pub fn resolve_field(
        &self,
        base: &TypeRef,
        field_name: &str,
        via_pointer: bool,
    ) -> Result<FieldRef, FieldMiss> {
        self.resolve_member(base, field_name, via_pointer)
            .map(|(field, _)| field)
    }

    fn resolve_member(
        &self,
        base: &TypeRef,
        field_name: &str,
        via_pointer: bool,
    ) -> Result<(FieldRef, &'a Field), FieldMiss> {
        let canonical = self
            .types
            .resolve_canonical(base)
            .map_err(|error| FieldMiss {
                sentinel: base.base.to_string(),
                error,
            })?;

        let owner = match canonical.base {
            CanonicalBase::Struct(id) => id,
            CanonicalBase::Unknown(type_name) => {
                let name = type_name.to_string();
                return Err(FieldMiss {
                    sentinel: name.clone(),
                    error: ResolveError::UnresolvedSymbol { name },
                });
            }
            CanonicalBase::Builtin(name) => {
                return Err(FieldMiss {
                    sentinel: qualified(&name, field_name),
                    error: ResolveError::UnknownField {
                        owner: name,
                        field: field_name.to_string(),
                    },
                });
            }
        };

        let owner_name = &self.store().get(owner).name;
        let indirection_ok = if via_pointer {
            canonical.indirection >= 1
        } else {
            canonical.indirection == 0
        };
        if !indirection_ok {
            return Err(FieldMiss {
                sentinel: qualified(owner_name, field_name),
                error: ResolveError::IndirectionMismatch {
                    field: field_name.to_string(),
                    operator: AccessOperator::from_via_pointer(via_pointer),
                    indirection: canonical.indirection,
                },
            });
        }

        self.store()
            .get(owner)
            .fields()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .find(|(_, member)| member.name == field_name)
            .map(|(index, member)| (FieldRef { owner, index }, member))
            .ok_or_else(|| FieldMiss {
                sentinel: qualified(owner_name, field_name),
                error: ResolveError::UnknownField {
                    owner: owner_name.clone(),
                    field: field_name.to_string(),
                },
            })
    }

    pub fn resolve_chain(&self, base: &TypeRef, path: &[PathSegment]) -> ChainResolution {
        let mut current = base;
        let mut reached = Vec::with_capacity(path.len());

        for (at, segment) in path.iter().enumerate() {
            match self.resolve_member(current, &segment.field, segment.via_pointer) {
                Ok((field, member)) => {
                    reached.push(field);
                    current = &member.ty;
                }
                Err(miss) => return ChainResolution::Failed { at, miss, reached },
            }
        }

        match reached.last().copied() {
            Some(field) => ChainResolution::Resolved {
                field,
                path: reached,
            },
            None => ChainResolution::Failed {
                at: 0,
                miss: FieldMiss {
                    sentinel: base.base.to_string(),
                    error: ResolveError::UnresolvedSymbol {
                        name: base.base.to_string(),
                    },
                },
                reached,
            },
        }
    }
}

fn qualified(owner: &str, field: &str) -> String {
    format!("{}.{}", owner, field)
}
