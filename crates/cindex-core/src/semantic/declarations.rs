//! Declaration store
//!
//! Holds every declared struct, typedef, function and global in an arena,
//! keyed by `(name, kind)`. A second sighting of the same key is merged into
//! the existing entity instead of allocating a new one, so a forward
//! declaration and its completion share one `DeclarationId`.

use std::collections::HashMap;
use std::fmt;

use id_arena::{Arena, Id};
use serde::Serialize;
use tracing::{trace, warn};

use super::merger::{MergeOutcome, merge_into};
use super::types::TypeRef;
use crate::error::ResolveError;
use crate::input::Location;

pub type DeclarationId = Id<Declaration>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Struct,
    Typedef,
    Function,
    Global,
}

impl DeclKind {
    pub const ALL: [DeclKind; 4] = [
        DeclKind::Struct,
        DeclKind::Typedef,
        DeclKind::Function,
        DeclKind::Global,
    ];
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DeclKind::Struct => "struct",
            DeclKind::Typedef => "typedef",
            DeclKind::Function => "function",
            DeclKind::Global => "global",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    /// Initializer text, kept verbatim and never resolved.
    pub default: Option<String>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub enum StructBody {
    Incomplete,
    Complete(Vec<Field>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub returns: TypeRef,
    pub params: Vec<TypeRef>,
}

#[derive(Debug, Clone)]
pub enum DeclPayload {
    Struct(StructBody),
    Typedef(TypeRef),
    Function {
        signature: FunctionSignature,
        defined: bool,
    },
    Global {
        ty: TypeRef,
        defined: bool,
    },
}

impl DeclPayload {
    pub fn kind(&self) -> DeclKind {
        match self {
            DeclPayload::Struct(_) => DeclKind::Struct,
            DeclPayload::Typedef(_) => DeclKind::Typedef,
            DeclPayload::Function { .. } => DeclKind::Function,
            DeclPayload::Global { .. } => DeclKind::Global,
        }
    }

    pub fn is_definition(&self) -> bool {
        match self {
            DeclPayload::Struct(body) => matches!(body, StructBody::Complete(_)),
            DeclPayload::Typedef(_) => true,
            DeclPayload::Function { defined, .. } | DeclPayload::Global { defined, .. } => {
                *defined
            }
        }
    }
}

#[derive(Debug)]
pub struct Declaration {
    pub id: DeclarationId,
    pub name: String,
    pub kind: DeclKind,
    /// First sighting, forward or full.
    pub location: Location,
    /// Sighting that completed or defined the entity.
    pub definition: Option<Location>,
    pub payload: DeclPayload,
    pub sightings: usize,
}

impl Declaration {
    /// Field list of a completed struct; `None` for incomplete structs and
    /// every other kind.
    pub fn fields(&self) -> Option<&[Field]> {
        match &self.payload {
            DeclPayload::Struct(StructBody::Complete(fields)) => Some(fields),
            _ => None,
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields()?.iter().position(|f| f.name == name)
    }

    pub fn is_complete(&self) -> bool {
        self.payload.is_definition()
    }

    /// Declared type of a global, target of a typedef.
    pub fn value_type(&self) -> Option<&TypeRef> {
        match &self.payload {
            DeclPayload::Global { ty, .. } => Some(ty),
            DeclPayload::Typedef(target) => Some(target),
            _ => None,
        }
    }
}

/// A field, addressed through the struct that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub owner: DeclarationId,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct Conflict {
    pub error: ResolveError,
    pub location: Location,
}

pub struct DeclarationStore {
    arena: Arena<Declaration>,
    by_kind: HashMap<DeclKind, HashMap<String, DeclarationId>>,
    conflicts: Vec<Conflict>,
}

impl Default for DeclarationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeclarationStore {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            by_kind: HashMap::new(),
            conflicts: Vec::new(),
        }
    }

    /// Registers a sighting of `name`. Repeated `(name, kind)` sightings are
    /// merged into the existing entity; an incompatible one is recorded in
    /// the conflict list and the first sighting wins.
    pub fn declare(
        &mut self,
        name: &str,
        payload: DeclPayload,
        location: Location,
    ) -> DeclarationId {
        let kind = payload.kind();

        if let Some(&id) = self.by_kind.get(&kind).and_then(|names| names.get(name)) {
            let declaration = &mut self.arena[id];
            declaration.sightings += 1;

            match merge_into(&mut declaration.payload, payload) {
                MergeOutcome::Unchanged => {
                    trace!(name, %kind, "redeclaration merged");
                }
                MergeOutcome::Completed => {
                    trace!(name, %kind, at = %location, "declaration completed");
                    declaration.definition = Some(location);
                }
                MergeOutcome::Conflict => {
                    warn!(name, %kind, at = %location, "conflicting redeclaration ignored");
                    self.conflicts.push(Conflict {
                        error: ResolveError::ConflictingDeclaration {
                            name: name.to_string(),
                            kind,
                        },
                        location,
                    });
                }
            }
            return id;
        }

        let definition = payload.is_definition().then(|| location.clone());
        let id = self.arena.alloc_with_id(|id| Declaration {
            id,
            name: name.to_string(),
            kind,
            location,
            definition,
            payload,
            sightings: 1,
        });

        self.by_kind
            .entry(kind)
            .or_default()
            .insert(name.to_string(), id);

        id
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(&self, name: &str, kind: DeclKind) -> Option<&Declaration> {
        self.lookup_id(name, kind).map(|id| &self.arena[id])
    }

    pub fn lookup_id(&self, name: &str, kind: DeclKind) -> Option<DeclarationId> {
        self.by_kind.get(&kind)?.get(name).copied()
    }

    pub fn get(&self, id: DeclarationId) -> &Declaration {
        &self.arena[id]
    }

    /// `None` when `field` does not name a member of a complete struct.
    pub fn field(&self, field: FieldRef) -> Option<&Field> {
        self.arena.get(field.owner)?.fields()?.get(field.index)
    }

    /// `owner.field` spelling used for sentinels and name queries.
    pub fn qualified_field_name(&self, field: FieldRef) -> Option<String> {
        let owner = self.arena.get(field.owner)?;
        let member = self.field(field)?;
        Some(format!("{}.{}", owner.name, member.name))
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn all_declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.arena.iter().map(|(_, d)| d)
    }

    pub fn declarations_of_kind(&self, kind: DeclKind) -> impl Iterator<Item = &Declaration> {
        self.all_declarations().filter(move |d| d.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32) -> Location {
        Location::new("test.c", line, 1)
    }

    fn field(name: &str, ty: &str) -> Field {
        Field {
            name: name.to_string(),
            ty: ty.parse().unwrap(),
            default: None,
            location: Location::default(),
        }
    }

    fn complete(fields: Vec<Field>) -> DeclPayload {
        DeclPayload::Struct(StructBody::Complete(fields))
    }

    #[test]
    fn declare_and_lookup() {
        let mut store = DeclarationStore::new();
        let id = store.declare("s_true", complete(vec![field("fd_true", "int")]), loc(1));

        let declaration = store.lookup("s_true", DeclKind::Struct).unwrap();
        assert_eq!(declaration.id, id);
        assert_eq!(declaration.field_index("fd_true"), Some(0));
        assert!(declaration.is_complete());
        assert_eq!(declaration.definition, Some(loc(1)));
    }

    #[test]
    fn lookup_is_kind_and_case_sensitive() {
        let mut store = DeclarationStore::new();
        store.declare("s_parent", DeclPayload::Struct(StructBody::Incomplete), loc(1));

        assert!(store.lookup("s_parent", DeclKind::Typedef).is_none());
        assert!(store.lookup("S_PARENT", DeclKind::Struct).is_none());
        assert!(store.lookup("s_par", DeclKind::Struct).is_none());
    }

    #[test]
    fn struct_tag_and_typedef_coexist() {
        let mut store = DeclarationStore::new();
        let tag = store.declare("s_parent", DeclPayload::Struct(StructBody::Incomplete), loc(1));
        let alias = store.declare(
            "s_parent",
            DeclPayload::Typedef("struct s_parent".parse().unwrap()),
            loc(2),
        );

        assert_ne!(tag, alias);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn forward_declaration_upgrades_in_place() {
        let mut store = DeclarationStore::new();
        let forward =
            store.declare("s_parent", DeclPayload::Struct(StructBody::Incomplete), loc(1));
        assert!(store.get(forward).fields().is_none());

        let full = store.declare("s_parent", complete(vec![field("fd_ptr", "s_true*")]), loc(5));

        assert_eq!(forward, full);
        let declaration = store.get(forward);
        assert_eq!(declaration.sightings, 2);
        assert_eq!(declaration.location, loc(1));
        assert_eq!(declaration.definition, Some(loc(5)));
        assert_eq!(declaration.fields().map(|f| f.len()), Some(1));
        assert!(store.conflicts().is_empty());
    }

    #[test]
    fn conflicting_completion_keeps_first() {
        let mut store = DeclarationStore::new();
        let id = store.declare("s", complete(vec![field("a", "int")]), loc(1));
        store.declare("s", complete(vec![field("b", "int")]), loc(9));

        assert_eq!(store.get(id).field_index("a"), Some(0));
        assert_eq!(store.get(id).field_index("b"), None);
        assert_eq!(store.conflicts().len(), 1);
        assert_eq!(store.conflicts()[0].location, loc(9));
        assert_eq!(
            store.conflicts()[0].error,
            ResolveError::ConflictingDeclaration {
                name: "s".to_string(),
                kind: DeclKind::Struct
            }
        );
    }

    #[test]
    fn field_ref_resolves_to_owned_field() {
        let mut store = DeclarationStore::new();
        let owner = store.declare(
            "s_parent",
            complete(vec![field("fd_struct", "s_true"), field("fd_ptr", "s_true*")]),
            loc(1),
        );
        let fd_ptr = FieldRef { owner, index: 1 };

        assert_eq!(store.field(fd_ptr).map(|f| f.name.as_str()), Some("fd_ptr"));
        assert_eq!(
            store.qualified_field_name(fd_ptr).as_deref(),
            Some("s_parent.fd_ptr")
        );
    }

    #[test]
    fn out_of_range_field_ref_is_none() {
        let mut store = DeclarationStore::new();
        let owner = store.declare("s_true", complete(vec![field("fd_true", "int")]), loc(1));
        let forward = store.declare("s_fwd", DeclPayload::Struct(StructBody::Incomplete), loc(2));

        assert!(store.field(FieldRef { owner, index: 7 }).is_none());
        assert!(store.field(FieldRef { owner: forward, index: 0 }).is_none());
        assert!(store.qualified_field_name(FieldRef { owner, index: 7 }).is_none());
    }

    #[test]
    fn declarations_of_kind_filters() {
        let mut store = DeclarationStore::new();
        store.declare(
            "f",
            DeclPayload::Function {
                signature: FunctionSignature {
                    returns: TypeRef::named("int"),
                    params: vec![],
                },
                defined: true,
            },
            loc(1),
        );
        store.declare(
            "g",
            DeclPayload::Global {
                ty: TypeRef::named("int"),
                defined: false,
            },
            loc(2),
        );

        assert_eq!(store.declarations_of_kind(DeclKind::Function).count(), 1);
        assert_eq!(store.declarations_of_kind(DeclKind::Global).count(), 1);
        assert_eq!(store.declarations_of_kind(DeclKind::Struct).count(), 0);
        assert!(store.lookup("g", DeclKind::Global).unwrap().definition.is_none());
    }
}
