//! Declaration merging
//!
//! Folds a new sighting of an already-declared `(name, kind)` into the stored
//! payload. Struct bodies move `Incomplete -> Complete` exactly once;
//! prototypes and `extern` globals pick up their definition. The fold is
//! commutative for compatible sightings, so declaration order never matters.

use super::declarations::{DeclPayload, Field, StructBody};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing new was learned.
    Unchanged,
    /// The entity moved from forward-declared to defined.
    Completed,
    /// The sighting disagrees with what is stored; the stored payload is kept.
    Conflict,
}

pub fn merge_into(existing: &mut DeclPayload, incoming: DeclPayload) -> MergeOutcome {
    match (existing, incoming) {
        (DeclPayload::Struct(body), DeclPayload::Struct(incoming)) => merge_struct(body, incoming),
        (DeclPayload::Typedef(target), DeclPayload::Typedef(incoming)) => {
            if *target == incoming {
                MergeOutcome::Unchanged
            } else {
                MergeOutcome::Conflict
            }
        }
        (
            DeclPayload::Function { signature, defined },
            DeclPayload::Function {
                signature: incoming,
                defined: incoming_defined,
            },
        ) => {
            if *signature != incoming {
                return MergeOutcome::Conflict;
            }
            upgrade_definition(defined, incoming_defined)
        }
        (
            DeclPayload::Global { ty, defined },
            DeclPayload::Global {
                ty: incoming,
                defined: incoming_defined,
            },
        ) => {
            if *ty != incoming {
                return MergeOutcome::Conflict;
            }
            upgrade_definition(defined, incoming_defined)
        }
        // The store keys entities by kind, so mixed kinds never reach here.
        _ => MergeOutcome::Conflict,
    }
}

fn merge_struct(body: &mut StructBody, incoming: StructBody) -> MergeOutcome {
    let StructBody::Complete(fields) = incoming else {
        return MergeOutcome::Unchanged;
    };

    if let StructBody::Complete(existing) = &*body {
        return if same_layout(existing, &fields) {
            MergeOutcome::Unchanged
        } else {
            MergeOutcome::Conflict
        };
    }

    *body = StructBody::Complete(fields);
    MergeOutcome::Completed
}

fn upgrade_definition(defined: &mut bool, incoming_defined: bool) -> MergeOutcome {
    if incoming_defined && !*defined {
        *defined = true;
        MergeOutcome::Completed
    } else {
        MergeOutcome::Unchanged
    }
}

/// Field sets match when names and types agree position by position.
/// Defaults and locations are ignored.
pub fn same_layout(left: &[Field], right: &[Field]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .all(|(l, r)| l.name == r.name && l.ty == r.ty)
}
