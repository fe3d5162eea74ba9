//! Type references carried by expressions and variables.

use super::id_types::TypeElementId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveType {
    /// Whether compound assignment to this type implies a narrowing cast
    /// once the operation is spelled out as a binary expression.
    pub fn is_narrower_than_int(self) -> bool {
        matches!(self, PrimitiveType::Byte | PrimitiveType::Char | PrimitiveType::Short)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
        };
        write!(f, "{}", name)
    }
}

/// Reference to a bound type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    Void,
    Null,
    Primitive(PrimitiveType),
    Class(TypeElementId),
    Array(Box<TypeRef>),
}

impl TypeRef {
    pub const BOOLEAN: TypeRef = TypeRef::Primitive(PrimitiveType::Boolean);
    pub const INT: TypeRef = TypeRef::Primitive(PrimitiveType::Int);

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            TypeRef::Primitive(p) => Some(*p),
            _ => None,
        }
    }
}
