//! Basic type classification
//!
//! Mirrors the builtin-type enumeration debuggers expose for C base types. Only
//! base types (optionally const/volatile qualified) classify; typedefs, enums
//! and aggregates are `Invalid`, which is what a caller switching on builtin
//! kinds expects for `size_t`, `int32_t` and friends.

use crate::type_info::TypeInfo;
use gimli::constants as dw;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasicType {
    Invalid,
    Void,
    Bool,
    Char,
    SignedChar,
    UnsignedChar,
    Char16,
    Char32,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Int128,
    UnsignedInt128,
    Float,
    Double,
    LongDouble,
}

impl BasicType {
    /// Classify a base type from its DWARF name, byte size and encoding
    pub fn from_base(name: &str, size: u64, encoding: u16) -> Self {
        let name = name.trim();
        let enc = gimli::DwAte(encoding as u8);
        match enc {
            dw::DW_ATE_boolean => BasicType::Bool,
            dw::DW_ATE_float => match size {
                4 => BasicType::Float,
                8 => BasicType::Double,
                10 | 12 | 16 => BasicType::LongDouble,
                _ => BasicType::Invalid,
            },
            dw::DW_ATE_signed_char => {
                if name == "signed char" {
                    BasicType::SignedChar
                } else {
                    BasicType::Char
                }
            }
            dw::DW_ATE_unsigned_char => {
                if name == "char" {
                    BasicType::Char
                } else {
                    BasicType::UnsignedChar
                }
            }
            dw::DW_ATE_UTF => match size {
                1 => BasicType::Char,
                2 => BasicType::Char16,
                4 => BasicType::Char32,
                _ => BasicType::Invalid,
            },
            dw::DW_ATE_signed => Self::signed_from_name(name, size),
            dw::DW_ATE_unsigned => Self::unsigned_from_name(name, size),
            _ => BasicType::Invalid,
        }
    }

    /// Classify a type the way a builtin-kind query does: qualifiers are
    /// looked through, typedefs are not.
    pub fn of(ty: &TypeInfo) -> Self {
        match ty.unqualified() {
            TypeInfo::BaseType {
                name,
                size,
                encoding,
            } => Self::from_base(name, *size, *encoding),
            TypeInfo::UnknownType { name } if name == "void" => BasicType::Void,
            _ => BasicType::Invalid,
        }
    }

    fn signed_from_name(name: &str, size: u64) -> Self {
        if name.contains("__int128") {
            BasicType::Int128
        } else if name.contains("long long") {
            BasicType::LongLong
        } else if name.contains("long") {
            BasicType::Long
        } else if name.contains("short") {
            BasicType::Short
        } else if name.contains("char") {
            BasicType::SignedChar
        } else if name == "int" || name == "signed int" || name == "signed" {
            BasicType::Int
        } else {
            match size {
                1 => BasicType::SignedChar,
                2 => BasicType::Short,
                4 => BasicType::Int,
                8 => BasicType::Long,
                16 => BasicType::Int128,
                _ => BasicType::Invalid,
            }
        }
    }

    fn unsigned_from_name(name: &str, size: u64) -> Self {
        if name.contains("__int128") {
            BasicType::UnsignedInt128
        } else if name.contains("long long") {
            BasicType::UnsignedLongLong
        } else if name.contains("long") {
            BasicType::UnsignedLong
        } else if name.contains("short") {
            BasicType::UnsignedShort
        } else if name.contains("char") {
            BasicType::UnsignedChar
        } else if name.contains("int") || name == "unsigned" {
            BasicType::UnsignedInt
        } else {
            match size {
                1 => BasicType::UnsignedChar,
                2 => BasicType::UnsignedShort,
                4 => BasicType::UnsignedInt,
                8 => BasicType::UnsignedLong,
                16 => BasicType::UnsignedInt128,
                _ => BasicType::Invalid,
            }
        }
    }

    /// Character-like kinds, whose pointers read as C strings
    pub fn is_char_like(self) -> bool {
        matches!(
            self,
            BasicType::Char | BasicType::SignedChar | BasicType::UnsignedChar
        )
    }
}
