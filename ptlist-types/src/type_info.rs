//! Type information model for debuggee data
//!
//! Types are resolved from DWARF into this tree once, then used to locate
//! members, size reads and pick a rendering for raw bytes read from the
//! inspected process.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a type DIE that could not be expanded in place.
///
/// Produced when a type refers back to itself (`struct s_list *next`), so the
/// tree stays finite. Consumers hand it back to whoever resolved it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    /// `.debug_info` offset of the owning unit
    pub unit: u64,
    /// Offset of the type DIE inside that unit
    pub die: u64,
}

/// Type information with full fidelity from DWARF debugging data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeInfo {
    /// Base/primitive type (int, float, char, etc.)
    BaseType {
        name: String,
        size: u64,
        encoding: u16, // DwAte stored as u16
    },

    /// Pointer type
    PointerType {
        target_type: Box<TypeInfo>,
        size: u64,
    },

    /// Array type
    ArrayType {
        element_type: Box<TypeInfo>,
        element_count: Option<u64>,
        total_size: Option<u64>,
    },

    /// Struct/class type
    StructType {
        name: String,
        size: u64,
        members: Vec<StructMember>,
    },

    /// Union type
    UnionType {
        name: String,
        size: u64,
        members: Vec<StructMember>,
    },

    /// Enum type
    EnumType {
        name: String,
        size: u64,
        base_type: Box<TypeInfo>,
        variants: Vec<EnumVariant>,
    },

    /// Typedef (type alias)
    TypedefType {
        name: String,
        underlying_type: Box<TypeInfo>,
    },

    /// Qualified type (const, volatile, restrict)
    QualifiedType {
        qualifier: TypeQualifier,
        underlying_type: Box<TypeInfo>,
    },

    /// Function type
    FunctionType {
        return_type: Option<Box<TypeInfo>>,
        parameters: Vec<TypeInfo>,
    },

    /// Bitfield: a view over an underlying integer type with bit offset/size
    BitfieldType {
        underlying_type: Box<TypeInfo>,
        bit_offset: u8,
        bit_size: u8,
    },

    /// Type whose expansion was cut short to break a reference cycle
    DeferredType { name: String, type_ref: TypeRef },

    /// Unresolved or unknown type (also `void`)
    UnknownType { name: String },
}

/// Struct/union member information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructMember {
    pub name: String,
    pub member_type: TypeInfo,
    pub offset: u64,
    pub bit_offset: Option<u8>,
    pub bit_size: Option<u8>,
}

/// Enum variant information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: String,
    pub value: i64,
}

/// Type qualifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeQualifier {
    Const,
    Volatile,
    Restrict,
}

/// Pointer width assumed when DWARF leaves `DW_AT_byte_size` out
pub const DEFAULT_POINTER_SIZE: u64 = 8;

impl TypeInfo {
    /// Get the size in bytes of this type
    pub fn size(&self) -> u64 {
        match self {
            TypeInfo::BaseType { size, .. } => *size,
            TypeInfo::PointerType { size, .. } => *size,
            TypeInfo::ArrayType { total_size, .. } => total_size.unwrap_or(0),
            TypeInfo::StructType { size, .. } => *size,
            TypeInfo::UnionType { size, .. } => *size,
            TypeInfo::EnumType { size, .. } => *size,
            TypeInfo::TypedefType {
                underlying_type, ..
            } => underlying_type.size(),
            TypeInfo::QualifiedType {
                underlying_type, ..
            } => underlying_type.size(),
            TypeInfo::FunctionType { .. } => DEFAULT_POINTER_SIZE,
            TypeInfo::BitfieldType {
                underlying_type, ..
            } => underlying_type.size(),
            TypeInfo::DeferredType { .. } => 0,
            TypeInfo::UnknownType { .. } => 0,
        }
    }

    /// Pointer-to-`self`, the way a debugger builds `T *` from `T`
    pub fn pointer_to(&self) -> TypeInfo {
        TypeInfo::PointerType {
            target_type: Box::new(self.clone()),
            size: DEFAULT_POINTER_SIZE,
        }
    }

    /// Skip typedefs and qualifiers
    pub fn canonical(&self) -> &TypeInfo {
        match self {
            TypeInfo::TypedefType {
                underlying_type, ..
            }
            | TypeInfo::QualifiedType {
                underlying_type, ..
            } => underlying_type.canonical(),
            _ => self,
        }
    }

    /// Skip qualifiers only; typedefs stay visible
    pub fn unqualified(&self) -> &TypeInfo {
        match self {
            TypeInfo::QualifiedType {
                underlying_type, ..
            } => underlying_type.unqualified(),
            _ => self,
        }
    }

    /// Check if this is a pointer type (looking through typedefs)
    pub fn is_pointer(&self) -> bool {
        matches!(self.canonical(), TypeInfo::PointerType { .. })
    }

    /// Pointee of a pointer type (looking through typedefs)
    pub fn pointee(&self) -> Option<&TypeInfo> {
        match self.canonical() {
            TypeInfo::PointerType { target_type, .. } => Some(target_type),
            _ => None,
        }
    }

    /// Members of a struct or union (looking through typedefs)
    pub fn members(&self) -> Option<&[StructMember]> {
        match self.canonical() {
            TypeInfo::StructType { members, .. } | TypeInfo::UnionType { members, .. } => {
                Some(members)
            }
            _ => None,
        }
    }

    /// Find a direct member by name
    pub fn member(&self, name: &str) -> Option<&StructMember> {
        self.members()?.iter().find(|m| m.name == name)
    }

    /// Check if this is a signed integer type
    pub fn is_signed_int(&self) -> bool {
        match self.canonical() {
            TypeInfo::BaseType { encoding, .. } => {
                *encoding == gimli::constants::DW_ATE_signed.0 as u16
                    || *encoding == gimli::constants::DW_ATE_signed_char.0 as u16
            }
            TypeInfo::EnumType { base_type, .. } => base_type.is_signed_int(),
            TypeInfo::BitfieldType {
                underlying_type, ..
            } => underlying_type.is_signed_int(),
            _ => false,
        }
    }

    /// Get the type name for display
    pub fn type_name(&self) -> String {
        match self {
            TypeInfo::BaseType { name, .. } => name.clone(),
            TypeInfo::PointerType { target_type, .. } => {
                format!("{} *", target_type.type_name())
            }
            TypeInfo::ArrayType {
                element_type,
                element_count,
                ..
            } => match element_count {
                Some(count) => format!("{}[{}]", element_type.type_name(), count),
                None => format!("{}[]", element_type.type_name()),
            },
            TypeInfo::StructType { name, .. } => format!("struct {name}"),
            TypeInfo::UnionType { name, .. } => format!("union {name}"),
            TypeInfo::EnumType { name, .. } => format!("enum {name}"),
            TypeInfo::TypedefType { name, .. } => name.clone(),
            TypeInfo::QualifiedType {
                qualifier,
                underlying_type,
            } => format!("{} {}", qualifier, underlying_type.type_name()),
            TypeInfo::FunctionType {
                return_type,
                parameters,
            } => {
                let return_str = return_type
                    .as_ref()
                    .map(|t| t.type_name())
                    .unwrap_or_else(|| "void".to_string());
                let param_str = parameters
                    .iter()
                    .map(|p| p.type_name())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{return_str} ({param_str})")
            }
            TypeInfo::BitfieldType {
                underlying_type,
                bit_size,
                ..
            } => format!("{}:{}", underlying_type.type_name(), bit_size),
            TypeInfo::DeferredType { name, .. } => name.clone(),
            TypeInfo::UnknownType { name } => name.clone(),
        }
    }
}

impl fmt::Display for TypeQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeQualifier::Const => write!(f, "const"),
            TypeQualifier::Volatile => write!(f, "volatile"),
            TypeQualifier::Restrict => write!(f, "restrict"),
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}
