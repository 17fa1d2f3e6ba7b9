//! Reference graph and unknown-symbol sentinels
//!
//! The graph is append-only: one edge per use site, to a declaration, a
//! field, or a sentinel. Both the graph and the sentinel table are shared by
//! the per-unit workers of the resolution phase.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;

use super::declarations::{DeclarationId, FieldRef};
use crate::input::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AccessKind {
    Call,
    FieldRead,
    FieldWrite,
    GlobalRead,
}

/// Placeholder for a name nothing declares.
#[derive(Debug, PartialEq, Eq, Hash, Serialize)]
pub struct UnknownSymbol {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Declaration(DeclarationId),
    Field(FieldRef),
    Unknown(Arc<UnknownSymbol>),
}

impl Target {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Target::Unknown(_))
    }

    pub fn as_unknown(&self) -> Option<&Arc<UnknownSymbol>> {
        match self {
            Target::Unknown(symbol) => Some(symbol),
            _ => None,
        }
    }

    fn key(&self) -> TargetKey {
        match self {
            Target::Declaration(id) => TargetKey::Declaration(*id),
            Target::Field(field) => TargetKey::Field(*field),
            Target::Unknown(symbol) => TargetKey::Unknown(symbol.name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetKey {
    Declaration(DeclarationId),
    Field(FieldRef),
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub site: Location,
    pub target: Target,
    pub access: AccessKind,
}

/// Memoized sentinels, one per unresolved name for the whole pass.
#[derive(Default)]
pub struct SentinelTable {
    table: DashMap<String, Arc<UnknownSymbol>>,
}

impl SentinelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sentinel for `name`, creating it on first request. Every
    /// later call, from any thread, returns the same allocation.
    pub fn sentinel_for(&self, name: &str) -> Arc<UnknownSymbol> {
        if let Some(existing) = self.table.get(name) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .table
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(UnknownSymbol {
                name: name.to_string(),
            }));
        Arc::clone(entry.value())
    }

    pub fn get(&self, name: &str) -> Option<Arc<UnknownSymbol>> {
        self.table.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[derive(Default)]
struct GraphInner {
    edges: Vec<Reference>,
    by_site: HashMap<Location, usize>,
    by_target: HashMap<TargetKey, Vec<usize>>,
}

#[derive(Default)]
pub struct ReferenceGraph {
    inner: RwLock<GraphInner>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the edge for `site`. A site already present keeps its first
    /// edge and `false` is returned.
    pub fn record(&self, site: Location, target: Target, access: AccessKind) -> bool {
        let mut inner = self.inner.write();
        if inner.by_site.contains_key(&site) {
            return false;
        }

        let index = inner.edges.len();
        inner.by_site.insert(site.clone(), index);
        inner.by_target.entry(target.key()).or_default().push(index);
        inner.edges.push(Reference {
            site,
            target,
            access,
        });
        true
    }

    pub fn target_of(&self, site: &Location) -> Option<Target> {
        let inner = self.inner.read();
        inner
            .by_site
            .get(site)
            .map(|&index| inner.edges[index].target.clone())
    }

    pub fn reference_at(&self, site: &Location) -> Option<Reference> {
        let inner = self.inner.read();
        inner.by_site.get(site).map(|&index| inner.edges[index].clone())
    }

    /// Edges pointing at any of `keys`, ordered by use site.
    pub fn references_to(&self, keys: &[TargetKey]) -> Vec<Reference> {
        let inner = self.inner.read();
        let mut references: Vec<Reference> = keys
            .iter()
            .filter_map(|key| inner.by_target.get(key))
            .flatten()
            .map(|&index| inner.edges[index].clone())
            .collect();
        references.sort_by(|a, b| a.site.cmp(&b.site));
        references
    }

    /// Every edge, ordered by use site.
    pub fn all_references(&self) -> Vec<Reference> {
        let mut references = self.inner.read().edges.clone();
        references.sort_by(|a, b| a.site.cmp(&b.site));
        references
    }

    pub fn unknown_count(&self) -> usize {
        self.inner
            .read()
            .edges
            .iter()
            .filter(|r| r.target.is_unknown())
            .count()
    }

    pub fn len(&self) -> usize {
        self.inner.read().edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn sentinel_identity_is_stable() {
        let table = SentinelTable::new();
        let first = table.sentinel_for("unknown_f");
        let second = table.sentinel_for("unknown_f");
        let other = table.sentinel_for("unknown_g");

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(table.len(), 2);
        assert_eq!(table.names(), vec!["unknown_f", "unknown_g"]);
    }

    #[test]
    fn sentinel_lookup_does_not_create() {
        let table = SentinelTable::new();
        assert!(table.get("nope").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn sentinels_are_shared_across_threads() {
        let table = SentinelTable::new();
        let symbols: Vec<Arc<UnknownSymbol>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| table.sentinel_for("shared")))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(symbols.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn record_keeps_one_edge_per_site() {
        let graph = ReferenceGraph::new();
        let table = SentinelTable::new();
        let site = Location::new("a.c", 3, 5);

        assert!(graph.record(
            site.clone(),
            Target::Unknown(table.sentinel_for("f")),
            AccessKind::Call
        ));
        assert!(!graph.record(
            site.clone(),
            Target::Unknown(table.sentinel_for("g")),
            AccessKind::Call
        ));

        assert_eq!(graph.len(), 1);
        let target = graph.target_of(&site).unwrap();
        assert_eq!(target.as_unknown().map(|s| s.name.as_str()), Some("f"));
    }

    #[test]
    fn reverse_index_groups_by_target() {
        let graph = ReferenceGraph::new();
        let table = SentinelTable::new();

        graph.record(
            Location::new("b.c", 1, 1),
            Target::Unknown(table.sentinel_for("f")),
            AccessKind::Call,
        );
        graph.record(
            Location::new("a.c", 9, 1),
            Target::Unknown(table.sentinel_for("f")),
            AccessKind::Call,
        );
        graph.record(
            Location::new("a.c", 2, 1),
            Target::Unknown(table.sentinel_for("g")),
            AccessKind::GlobalRead,
        );

        let to_f = graph.references_to(&[TargetKey::Unknown("f".to_string())]);
        let sites: Vec<String> = to_f.iter().map(|r| r.site.to_string()).collect();
        assert_eq!(sites, vec!["a.c:9:1", "b.c:1:1"]);
        assert_eq!(graph.unknown_count(), 3);
        assert!(graph.target_of(&Location::new("c.c", 1, 1)).is_none());
    }

    #[test]
    fn concurrent_record_is_complete() {
        let graph = ReferenceGraph::new();
        let table = SentinelTable::new();

        thread::scope(|scope| {
            for unit in 0..4 {
                let graph = &graph;
                let table = &table;
                scope.spawn(move || {
                    for line in 1..=50 {
                        graph.record(
                            Location::new(format!("unit{}.c", unit), line, 1),
                            Target::Unknown(table.sentinel_for("missing")),
                            AccessKind::GlobalRead,
                        );
                    }
                });
            }
        });

        assert_eq!(graph.len(), 200);
        assert_eq!(
            graph
                .references_to(&[TargetKey::Unknown("missing".to_string())])
                .len(),
            200
        );
    }
}
