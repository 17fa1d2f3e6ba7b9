//! Typedef chain resolution
//!
//! Collapses `typedef A B; typedef B C;` chains to the struct, builtin or
//! unknown base underneath. The walk is iterative with a visited list and a
//! depth bound, so self-referential chains end in `CyclicTypedef`.

use std::collections::HashSet;

use tracing::warn;

use super::declarations::{DeclKind, Declaration, DeclarationStore};
use super::types::{BuiltinTypes, CanonicalBase, CanonicalType, TypeName, TypeRef};
use crate::error::ResolveError;
use crate::input::Location;

pub const DEFAULT_MAX_TYPEDEF_DEPTH: usize = 64;

pub struct TypeResolver<'a> {
    store: &'a DeclarationStore,
    builtins: &'a BuiltinTypes,
    max_depth: usize,
}

impl<'a> TypeResolver<'a> {
    pub fn new(store: &'a DeclarationStore, builtins: &'a BuiltinTypes) -> Self {
        Self {
            store,
            builtins,
            max_depth: DEFAULT_MAX_TYPEDEF_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn store(&self) -> &'a DeclarationStore {
        self.store
    }

    /// Follows typedefs until a non-typedef base is reached. Pointer levels
    /// contributed by each typedef add up with the use-site indirection.
    ///
    /// A plain name is looked up as a typedef, then as a struct, then as a
    /// builtin; a tagged name only as a struct. A name matching none of these
    /// resolves to `CanonicalBase::Unknown`, which is not an error.
    pub fn resolve_canonical(&self, ty: &TypeRef) -> Result<CanonicalType, ResolveError> {
        let mut indirection = ty.indirection;
        let mut current = &ty.base;
        let mut chain: Vec<&str> = Vec::new();

        loop {
            let name = match current {
                TypeName::Tagged(tag) => {
                    let base = match self.store.lookup_id(tag, DeclKind::Struct) {
                        Some(id) => CanonicalBase::Struct(id),
                        None => CanonicalBase::Unknown(current.clone()),
                    };
                    return Ok(CanonicalType {
                        base,
                        indirection,
                    });
                }
                TypeName::Plain(name) => name.as_str(),
            };

            let Some(alias) = self.store.lookup(name, DeclKind::Typedef) else {
                let base = if let Some(id) = self.store.lookup_id(name, DeclKind::Struct) {
                    CanonicalBase::Struct(id)
                } else if self.builtins.contains(name) {
                    CanonicalBase::Builtin(name.to_string())
                } else {
                    CanonicalBase::Unknown(current.clone())
                };
                return Ok(CanonicalType { base, indirection });
            };

            if chain.contains(&name) || chain.len() >= self.max_depth {
                chain.push(name);
                return Err(ResolveError::CyclicTypedef {
                    alias: chain[0].to_string(),
                    chain: chain.into_iter().map(str::to_string).collect(),
                });
            }
            chain.push(name);

            // Typedef payloads always carry a target.
            let Some(target) = alias.value_type() else {
                return Ok(CanonicalType {
                    base: CanonicalBase::Unknown(current.clone()),
                    indirection,
                });
            };
            indirection += target.indirection;
            current = &target.base;
        }
    }

    /// Resolves every typedef once and reports each distinct cycle a single
    /// time, at the typedef that first reaches it in declaration order. A
    /// chain that only runs past the depth bound is reported once, at the
    /// alias nearest its base.
    pub fn check_typedefs(&self) -> Vec<(ResolveError, Location)> {
        let failures: Vec<(&Declaration, ResolveError)> = self
            .store
            .declarations_of_kind(DeclKind::Typedef)
            .filter_map(|declaration| {
                let alias = TypeRef::named(declaration.name.clone());
                self.resolve_canonical(&alias)
                    .err()
                    .map(|error| (declaration, error))
            })
            .collect();

        let too_deep: HashSet<&str> = failures
            .iter()
            .filter(|(_, error)| {
                matches!(error, ResolveError::CyclicTypedef { chain, .. } if !repeats(chain))
            })
            .map(|(declaration, _)| declaration.name.as_str())
            .collect();

        let mut reported: HashSet<Vec<String>> = HashSet::new();
        let mut errors = Vec::new();

        for (declaration, error) in &failures {
            if let ResolveError::CyclicTypedef { chain, .. } = error {
                let duplicate = if repeats(chain) {
                    !reported.insert(cycle_members(chain))
                } else {
                    chain
                        .get(1)
                        .is_some_and(|next| too_deep.contains(next.as_str()))
                };
                if duplicate {
                    continue;
                }
            }
            warn!(alias = %declaration.name, error = %error, "typedef does not resolve");
            errors.push((error.clone(), declaration.location.clone()));
        }

        errors
    }
}

fn repeats(chain: &[String]) -> bool {
    match chain.split_last() {
        Some((last, rest)) => rest.contains(last),
        None => false,
    }
}

/// Names on the repeating part of a chain, sorted so every rotation of the
/// same cycle compares equal.
fn cycle_members(chain: &[String]) -> Vec<String> {
    let start = chain
        .last()
        .and_then(|last| chain.iter().position(|name| name == last))
        .filter(|&pos| pos + 1 < chain.len())
        .unwrap_or(0);

    let mut members: Vec<String> = chain[start..].to_vec();
    members.sort();
    members.dedup();
    members
}
