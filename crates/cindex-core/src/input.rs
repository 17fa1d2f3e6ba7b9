//! Structured input records
//!
//! Upstream parsers hand the engine one `SourceUnit` per file: the
//! declarations it introduces and the uses it contains. The records are
//! plain serde types so they can arrive as JSON.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::semantic::declarations::{DeclPayload, Field, FunctionSignature, StructBody};
use crate::semantic::types::{TypeRef, is_identifier};

/// Line and column inside a unit, both 1-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A position qualified by its unit. Use sites are identified by location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Location {
    pub unit: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(unit: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            unit: unit.into(),
            line,
            column,
        }
    }

    pub fn at(unit: &str, position: Position) -> Self {
        Self::new(unit, position.line, position.column)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.unit, self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclRecord {
    /// `fields: None` is a forward declaration.
    Struct {
        name: String,
        #[serde(default)]
        fields: Option<Vec<FieldRecord>>,
        #[serde(default)]
        position: Position,
    },
    Typedef {
        name: String,
        target: TypeRef,
        #[serde(default)]
        position: Position,
    },
    Function {
        name: String,
        returns: TypeRef,
        #[serde(default)]
        params: Vec<TypeRef>,
        #[serde(default)]
        defined: bool,
        #[serde(default)]
        position: Position,
    },
    Global {
        name: String,
        #[serde(rename = "type")]
        ty: TypeRef,
        #[serde(default)]
        defined: bool,
        #[serde(default)]
        position: Position,
    },
}

impl DeclRecord {
    pub fn name(&self) -> &str {
        match self {
            DeclRecord::Struct { name, .. }
            | DeclRecord::Typedef { name, .. }
            | DeclRecord::Function { name, .. }
            | DeclRecord::Global { name, .. } => name,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            DeclRecord::Struct { position, .. }
            | DeclRecord::Typedef { position, .. }
            | DeclRecord::Function { position, .. }
            | DeclRecord::Global { position, .. } => *position,
        }
    }

    pub fn to_payload(&self, unit: &str) -> DeclPayload {
        match self {
            DeclRecord::Struct { fields: None, .. } => DeclPayload::Struct(StructBody::Incomplete),
            DeclRecord::Struct {
                fields: Some(fields),
                ..
            } => DeclPayload::Struct(StructBody::Complete(
                fields
                    .iter()
                    .map(|f| Field {
                        name: f.name.clone(),
                        ty: f.ty.clone(),
                        default: f.default.clone(),
                        location: Location::at(unit, f.position),
                    })
                    .collect(),
            )),
            DeclRecord::Typedef { target, .. } => DeclPayload::Typedef(target.clone()),
            DeclRecord::Function {
                returns,
                params,
                defined,
                ..
            } => DeclPayload::Function {
                signature: FunctionSignature {
                    returns: returns.clone(),
                    params: params.clone(),
                },
                defined: *defined,
            },
            DeclRecord::Global { ty, defined, .. } => DeclPayload::Global {
                ty: ty.clone(),
                defined: *defined,
            },
        }
    }
}

/// One step of a field chain: `.field` or `->field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    pub field: String,
    #[serde(default)]
    pub via_pointer: bool,
}

impl PathSegment {
    pub fn dot(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            via_pointer: false,
        }
    }

    pub fn arrow(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            via_pointer: true,
        }
    }
}

/// Parses `.fd_struct.fd_true` or `->fd_ptr->fd_true` into segments.
pub fn parse_field_path(text: &str) -> Result<Vec<PathSegment>, InputError> {
    let invalid = || InputError::InvalidFieldPath {
        text: text.to_string(),
    };

    let mut segments = Vec::new();
    let mut rest = text.trim();
    while !rest.is_empty() {
        let (via_pointer, after) = if let Some(after) = rest.strip_prefix("->") {
            (true, after)
        } else if let Some(after) = rest.strip_prefix('.') {
            (false, after)
        } else {
            return Err(invalid());
        };

        let end = after.find(['.', '-']).unwrap_or(after.len());
        let field = after[..end].trim();
        if !is_identifier(field) {
            return Err(invalid());
        }
        segments.push(PathSegment {
            field: field.to_string(),
            via_pointer,
        });
        rest = after[end..].trim_start();
    }

    Ok(segments)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessBase {
    /// A global variable named at the use site.
    Global(String),
    /// A local, parameter or temporary whose type the parser already knows.
    Typed(TypeRef),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UseRecord {
    Call {
        callee: String,
        #[serde(default)]
        position: Position,
    },
    GlobalRead {
        name: String,
        #[serde(default)]
        position: Position,
    },
    FieldAccess {
        base: AccessBase,
        #[serde(deserialize_with = "deserialize_path")]
        path: Vec<PathSegment>,
        #[serde(default)]
        write: bool,
        #[serde(default)]
        position: Position,
    },
}

/// Accepts either a list of segments or the C spelling `->a.b`.
fn deserialize_path<'de, D>(deserializer: D) -> Result<Vec<PathSegment>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPath {
        Text(String),
        Segments(Vec<PathSegment>),
    }

    match RawPath::deserialize(deserializer)? {
        RawPath::Text(text) => parse_field_path(&text).map_err(serde::de::Error::custom),
        RawPath::Segments(segments) => Ok(segments),
    }
}

impl UseRecord {
    pub fn call(callee: impl Into<String>, position: Position) -> Self {
        UseRecord::Call {
            callee: callee.into(),
            position,
        }
    }

    pub fn global_read(name: impl Into<String>, position: Position) -> Self {
        UseRecord::GlobalRead {
            name: name.into(),
            position,
        }
    }

    pub fn field_access(
        base: AccessBase,
        path: &str,
        write: bool,
        position: Position,
    ) -> Result<Self, InputError> {
        Ok(UseRecord::FieldAccess {
            base,
            path: parse_field_path(path)?,
            write,
            position,
        })
    }

    pub fn position(&self) -> Position {
        match self {
            UseRecord::Call { position, .. }
            | UseRecord::GlobalRead { position, .. }
            | UseRecord::FieldAccess { position, .. } => *position,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SourceUnit {
    pub name: String,
    #[serde(default)]
    pub declarations: Vec<DeclRecord>,
    #[serde(default)]
    pub uses: Vec<UseRecord>,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn declare(mut self, record: DeclRecord) -> Self {
        self.declarations.push(record);
        self
    }

    pub fn with_use(mut self, record: UseRecord) -> Self {
        self.uses.push(record);
        self
    }

    pub fn use_count(&self) -> usize {
        self.uses.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Input {
    pub units: Vec<SourceUnit>,
}

impl Input {
    pub fn new(units: Vec<SourceUnit>) -> Self {
        Self { units }
    }

    pub fn from_json(text: &str) -> Result<Self, InputError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn use_count(&self) -> usize {
        self.units.iter().map(SourceUnit::use_count).sum()
    }

    /// Checks the record contract. A violation is the only hard failure of a
    /// pass; unresolved names are not violations.
    pub fn validate(&self) -> Result<(), InputError> {
        let mut units = HashSet::new();
        for unit in &self.units {
            if !units.insert(unit.name.as_str()) {
                return Err(InputError::DuplicateUnit(unit.name.clone()));
            }
            validate_declarations(unit)?;
            validate_uses(unit)?;
        }
        Ok(())
    }
}

fn check_identifier(name: &str, location: impl FnOnce() -> Location) -> Result<(), InputError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(InputError::InvalidIdentifier {
            name: name.to_string(),
            location: location(),
        })
    }
}

fn validate_declarations(unit: &SourceUnit) -> Result<(), InputError> {
    for record in &unit.declarations {
        let location = || Location::at(&unit.name, record.position());
        check_identifier(record.name(), location)?;

        if let DeclRecord::Struct {
            name,
            fields: Some(fields),
            ..
        } = record
        {
            let mut seen = HashSet::new();
            for field in fields {
                check_identifier(&field.name, || Location::at(&unit.name, field.position))?;
                if !seen.insert(field.name.as_str()) {
                    return Err(InputError::DuplicateField {
                        owner: name.clone(),
                        field: field.name.clone(),
                        location: Location::at(&unit.name, field.position),
                    });
                }
            }
        }
    }
    Ok(())
}

fn validate_uses(unit: &SourceUnit) -> Result<(), InputError> {
    let mut sites = HashSet::new();
    for record in &unit.uses {
        let location = Location::at(&unit.name, record.position());
        match record {
            UseRecord::Call { callee: name, .. } | UseRecord::GlobalRead { name, .. } => {
                check_identifier(name, || location.clone())?;
            }
            UseRecord::FieldAccess { base, path, .. } => {
                if let AccessBase::Global(name) = base {
                    check_identifier(name, || location.clone())?;
                }
                if path.is_empty() {
                    return Err(InputError::EmptyFieldPath { location });
                }
                for segment in path {
                    check_identifier(&segment.field, || location.clone())?;
                }
            }
        }
        if !sites.insert(record.position()) {
            return Err(InputError::DuplicateUseSite { location });
        }
    }
    Ok(())
}
