//! Type references and canonical types
//!
//! A `TypeRef` names a base type plus a pointer depth. It never owns the type
//! it names; the `TypeResolver` looks it up on demand. Indirection is a plain
//! counter so `struct X` and `struct X*` share one representation.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::declarations::DeclarationId;
use crate::error::InputError;

const DEFAULT_BUILTIN_TYPES: &[&str] = &[
    "void",
    "bool",
    "_Bool",
    "char",
    "signed char",
    "unsigned char",
    "short",
    "unsigned short",
    "int",
    "signed",
    "unsigned",
    "unsigned int",
    "long",
    "unsigned long",
    "long long",
    "unsigned long long",
    "float",
    "double",
    "long double",
    "size_t",
    "ssize_t",
    "ptrdiff_t",
    "intptr_t",
    "uintptr_t",
    "int8_t",
    "int16_t",
    "int32_t",
    "int64_t",
    "uint8_t",
    "uint16_t",
    "uint32_t",
    "uint64_t",
];

pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Base name of a type reference.
///
/// C keeps struct tags apart from ordinary identifiers: `struct s_parent`
/// only ever names a struct, while a bare `s_parent` may be a typedef.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeName {
    Plain(String),
    Tagged(String),
}

impl TypeName {
    pub fn as_str(&self) -> &str {
        match self {
            TypeName::Plain(name) | TypeName::Tagged(name) => name,
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeName::Plain(name) => f.write_str(name),
            TypeName::Tagged(name) => write!(f, "struct {}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeRef {
    pub base: TypeName,
    pub indirection: u32,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            base: TypeName::Plain(name.into()),
            indirection: 0,
        }
    }

    pub fn tagged(name: impl Into<String>) -> Self {
        Self {
            base: TypeName::Tagged(name.into()),
            indirection: 0,
        }
    }

    pub fn pointer(mut self) -> Self {
        self.indirection += 1;
        self
    }

    pub fn base_name(&self) -> &str {
        self.base.as_str()
    }

    pub fn is_pointer(&self) -> bool {
        self.indirection > 0
    }
}

impl FromStr for TypeRef {
    type Err = InputError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| InputError::InvalidTypeRef {
            text: text.to_string(),
            reason,
        };

        let mut rest = text.trim();
        let mut indirection = 0;
        while let Some(stripped) = rest.strip_suffix('*') {
            indirection += 1;
            rest = stripped.trim_end();
        }
        if rest.is_empty() {
            return Err(invalid("missing base type"));
        }

        let mut words = rest.split_whitespace();
        let base = match words.next() {
            Some("struct") => {
                let tag = words.next().ok_or_else(|| invalid("missing struct tag"))?;
                if words.next().is_some() || !is_identifier(tag) {
                    return Err(invalid("struct tag must be a single identifier"));
                }
                TypeName::Tagged(tag.to_string())
            }
            _ => {
                let words: Vec<&str> = rest.split_whitespace().collect();
                if !words.iter().all(|w| is_identifier(w)) {
                    return Err(invalid("base type must be made of identifiers"));
                }
                TypeName::Plain(words.join(" "))
            }
        };

        Ok(Self { base, indirection })
    }
}

impl TryFrom<String> for TypeRef {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        for _ in 0..self.indirection {
            f.write_str("*")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalBase {
    Struct(DeclarationId),
    Builtin(String),
    /// Keeps the spelling so `struct foo` and a plain `foo` stay apart.
    Unknown(TypeName),
}

/// A type reference with every typedef on its path collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalType {
    pub base: CanonicalBase,
    pub indirection: u32,
}

impl CanonicalType {
    pub fn struct_id(&self) -> Option<DeclarationId> {
        match self.base {
            CanonicalBase::Struct(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.base, CanonicalBase::Unknown(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AccessOperator {
    Dot,
    Arrow,
}

impl AccessOperator {
    pub fn from_via_pointer(via_pointer: bool) -> Self {
        if via_pointer {
            AccessOperator::Arrow
        } else {
            AccessOperator::Dot
        }
    }
}

impl fmt::Display for AccessOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessOperator::Dot => f.write_str("."),
            AccessOperator::Arrow => f.write_str("->"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuiltinTypes {
    names: HashSet<String>,
}

impl Default for BuiltinTypes {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BuiltinTypes {
    pub fn empty() -> Self {
        Self {
            names: HashSet::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut builtins = Self::empty();
        for name in DEFAULT_BUILTIN_TYPES {
            builtins.register(name);
        }
        builtins
    }

    pub fn register(&mut self, name: &str) {
        let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ");
        self.names.insert(normalized);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}
