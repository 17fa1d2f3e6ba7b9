//! Cross-reference pass
//!
//! Runs the two phases over a set of source units. Phase 1 registers every
//! declaration of every unit and merges repeated sightings; nothing in phase 2
//! starts before it ends. Phase 2 resolves each unit's uses against the
//! frozen store, one unit per rayon task, appending into a shared graph.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::{Config, load_config_or_default};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::error::{InputError, ResolveError};
use crate::input::{AccessBase, Input, Location, SourceUnit, UseRecord};
use crate::semantic::declarations::{
    DeclKind, Declaration, DeclarationId, DeclarationStore, Field, FieldRef,
};
use crate::semantic::fields::{ChainResolution, FieldAccessResolver};
use crate::semantic::references::{
    AccessKind, Reference, ReferenceGraph, SentinelTable, Target, TargetKey, UnknownSymbol,
};
use crate::semantic::typedefs::TypeResolver;
use crate::semantic::types::{BuiltinTypes, TypeRef};

pub struct CrossReferencer {
    config: Config,
    builtins: BuiltinTypes,
}

impl CrossReferencer {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            config: config.clone(),
            builtins: config.builtins(),
        }
    }

    /// Uses the nearest `cindex.toml` above `start_dir`, or the defaults.
    pub fn discover(start_dir: &Path) -> Self {
        Self::with_config(&load_config_or_default(start_dir))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    #[instrument(skip_all, fields(units = input.units.len(), uses = input.use_count()))]
    pub fn analyze(&self, input: &Input) -> Result<CrossReferenceIndex, InputError> {
        input.validate()?;

        let store = self.ingest_declarations(&input.units);
        let types = TypeResolver::new(&store, &self.builtins)
            .with_max_depth(self.config.max_typedef_depth);

        let mut diagnostics: Vec<Diagnostic> = store
            .conflicts()
            .iter()
            .map(|conflict| self.diagnostic(&conflict.error, conflict.location.clone()))
            .collect();
        diagnostics.extend(
            types
                .check_typedefs()
                .into_iter()
                .map(|(error, location)| self.diagnostic(&error, location)),
        );

        let graph = ReferenceGraph::new();
        let sentinels = SentinelTable::new();
        let worker = UseResolver {
            store: &store,
            fields: FieldAccessResolver::new(&types),
            graph: &graph,
            sentinels: &sentinels,
            engine: self,
        };

        let per_unit: Vec<Vec<Diagnostic>> = if self.config.parallel {
            input.units.par_iter().map(|unit| worker.resolve_unit(unit)).collect()
        } else {
            input.units.iter().map(|unit| worker.resolve_unit(unit)).collect()
        };
        diagnostics.extend(per_unit.into_iter().flatten());

        info!(
            declarations = store.len(),
            references = graph.len(),
            unknown = graph.unknown_count(),
            diagnostics = diagnostics.len(),
            "cross-reference pass complete"
        );

        Ok(CrossReferenceIndex {
            store,
            graph,
            sentinels,
            diagnostics,
        })
    }

    /// Phase 1. Sightings of the same `(name, kind)` merge regardless of
    /// which unit or position they come from.
    #[instrument(skip_all)]
    fn ingest_declarations(&self, units: &[SourceUnit]) -> DeclarationStore {
        let mut store = DeclarationStore::new();
        for unit in units {
            for record in &unit.declarations {
                let location = Location::at(&unit.name, record.position());
                store.declare(record.name(), record.to_payload(&unit.name), location);
            }
        }
        debug!(
            declarations = store.len(),
            conflicts = store.conflicts().len(),
            "declarations ingested"
        );
        store
    }

    fn diagnostic(&self, error: &ResolveError, location: Location) -> Diagnostic {
        Diagnostic::from_error(error, location)
            .with_severity(self.config.severity_for(error.kind()))
    }
}

impl Default for CrossReferencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Phase 2 worker. Only reads the store; writes go to the graph and the
/// sentinel table, which are safe to share.
struct UseResolver<'a> {
    store: &'a DeclarationStore,
    fields: FieldAccessResolver<'a>,
    graph: &'a ReferenceGraph,
    sentinels: &'a SentinelTable,
    engine: &'a CrossReferencer,
}

impl UseResolver<'_> {
    #[instrument(skip_all, fields(unit = %unit.name))]
    fn resolve_unit(&self, unit: &SourceUnit) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for record in &unit.uses {
            let site = Location::at(&unit.name, record.position());
            let (target, access, error) = self.resolve_use(record);

            if let Some(error) = error {
                debug!(at = %site, error = %error, "use did not resolve");
                diagnostics.push(self.engine.diagnostic(&error, site.clone()));
            }
            self.graph.record(site, target, access);
        }
        debug!(uses = unit.uses.len(), "unit resolved");
        diagnostics
    }

    fn resolve_use(&self, record: &UseRecord) -> (Target, AccessKind, Option<ResolveError>) {
        match record {
            UseRecord::Call { callee, .. } => {
                let (target, error) =
                    self.resolve_name(callee, &[DeclKind::Function, DeclKind::Global]);
                (target, AccessKind::Call, error)
            }
            UseRecord::GlobalRead { name, .. } => {
                let (target, error) =
                    self.resolve_name(name, &[DeclKind::Global, DeclKind::Function]);
                (target, AccessKind::GlobalRead, error)
            }
            UseRecord::FieldAccess {
                base, path, write, ..
            } => {
                let last = path.len().saturating_sub(1);
                let access_at = |index: usize| {
                    if *write && index == last {
                        AccessKind::FieldWrite
                    } else {
                        AccessKind::FieldRead
                    }
                };

                let base_type: &TypeRef = match base {
                    AccessBase::Typed(ty) => ty,
                    AccessBase::Global(name) => {
                        let declared = self
                            .store
                            .lookup(name, DeclKind::Global)
                            .and_then(Declaration::value_type);
                        match declared {
                            Some(ty) => ty,
                            None => {
                                let (target, error) = self.resolve_name(name, &[]);
                                return (target, access_at(0), error);
                            }
                        }
                    }
                };

                match self.fields.resolve_chain(base_type, path) {
                    ChainResolution::Resolved { field, .. } => {
                        (Target::Field(field), access_at(last), None)
                    }
                    ChainResolution::Failed { at, miss, .. } => {
                        let target = Target::Unknown(self.sentinels.sentinel_for(&miss.sentinel));
                        // Cycles were already reported once against the typedef.
                        let error = match miss.error {
                            ResolveError::CyclicTypedef { .. } => None,
                            error => Some(error),
                        };
                        (target, access_at(at), error)
                    }
                }
            }
        }
    }

    /// Looks `name` up in each namespace of `kinds` in turn, falling back to
    /// its sentinel.
    fn resolve_name(&self, name: &str, kinds: &[DeclKind]) -> (Target, Option<ResolveError>) {
        match kinds.iter().find_map(|&kind| self.store.lookup_id(name, kind)) {
            Some(id) => (Target::Declaration(id), None),
            None => (
                Target::Unknown(self.sentinels.sentinel_for(name)),
                Some(ResolveError::UnresolvedSymbol {
                    name: name.to_string(),
                }),
            ),
        }
    }
}

/// Serializable view of one edge, with targets spelled by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceView {
    pub site: String,
    pub target: String,
    pub target_kind: &'static str,
    pub access: AccessKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexSummary {
    pub declarations: BTreeMap<DeclKind, usize>,
    pub references: usize,
    pub unknown_references: usize,
    pub sentinels: usize,
    pub diagnostics: BTreeMap<&'static str, usize>,
}

/// Result of a pass: the frozen store, the reference graph and diagnostics.
pub struct CrossReferenceIndex {
    store: DeclarationStore,
    graph: ReferenceGraph,
    sentinels: SentinelTable,
    diagnostics: Vec<Diagnostic>,
}

impl CrossReferenceIndex {
    pub fn declarations(&self) -> &DeclarationStore {
        &self.store
    }

    pub fn lookup(&self, name: &str, kind: DeclKind) -> Option<&Declaration> {
        self.store.lookup(name, kind)
    }

    pub fn field(&self, field: FieldRef) -> Option<&Field> {
        self.store.field(field)
    }

    /// Declaration-phase diagnostics first, then use-phase ones in input
    /// order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn diagnostics_of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    pub fn target_of(&self, site: &Location) -> Option<Target> {
        self.graph.target_of(site)
    }

    pub fn reference_at(&self, site: &Location) -> Option<Reference> {
        self.graph.reference_at(site)
    }

    pub fn references_to_declaration(&self, id: DeclarationId) -> Vec<Reference> {
        self.graph.references_to(&[TargetKey::Declaration(id)])
    }

    pub fn references_to_field(&self, field: FieldRef) -> Vec<Reference> {
        self.graph.references_to(&[TargetKey::Field(field)])
    }

    /// Every reference whose target is spelled `name`: declarations of any
    /// kind, `owner.field` fields, and the sentinel of that name.
    pub fn references_to(&self, name: &str) -> Vec<Reference> {
        let mut keys: Vec<TargetKey> = DeclKind::ALL
            .iter()
            .filter_map(|&kind| self.store.lookup_id(name, kind))
            .map(TargetKey::Declaration)
            .collect();

        if let Some((owner, field)) = name.split_once('.') {
            if let Some(owner) = self.store.lookup(owner, DeclKind::Struct) {
                if let Some(index) = owner.field_index(field) {
                    keys.push(TargetKey::Field(FieldRef {
                        owner: owner.id,
                        index,
                    }));
                }
            }
        }

        keys.push(TargetKey::Unknown(name.to_string()));
        self.graph.references_to(&keys)
    }

    pub fn all_references(&self) -> Vec<Reference> {
        self.graph.all_references()
    }

    /// Existing sentinel for `name`, if any use produced one.
    pub fn sentinel(&self, name: &str) -> Option<Arc<UnknownSymbol>> {
        self.sentinels.get(name)
    }

    pub fn sentinel_names(&self) -> Vec<String> {
        self.sentinels.names()
    }

    pub fn target_name(&self, target: &Target) -> String {
        match target {
            Target::Declaration(id) => self.store.get(*id).name.clone(),
            Target::Field(field) => self
                .store
                .qualified_field_name(*field)
                .unwrap_or_else(|| self.store.get(field.owner).name.clone()),
            Target::Unknown(symbol) => symbol.name.clone(),
        }
    }

    pub fn describe(&self, reference: &Reference) -> ReferenceView {
        let target_kind = match &reference.target {
            Target::Declaration(id) => match self.store.get(*id).kind {
                DeclKind::Struct => "struct",
                DeclKind::Typedef => "typedef",
                DeclKind::Function => "function",
                DeclKind::Global => "global",
            },
            Target::Field(_) => "field",
            Target::Unknown(_) => "unknown",
        };
        ReferenceView {
            site: reference.site.to_string(),
            target: self.target_name(&reference.target),
            target_kind,
            access: reference.access,
        }
    }

    pub fn summary(&self) -> IndexSummary {
        let mut declarations = BTreeMap::new();
        for declaration in self.store.all_declarations() {
            *declarations.entry(declaration.kind).or_insert(0) += 1;
        }

        let mut diagnostics = BTreeMap::new();
        for diagnostic in &self.diagnostics {
            *diagnostics.entry(diagnostic.code).or_insert(0) += 1;
        }

        IndexSummary {
            declarations,
            references: self.graph.len(),
            unknown_references: self.graph.unknown_count(),
            sentinels: self.sentinels.len(),
            diagnostics,
        }
    }
}
