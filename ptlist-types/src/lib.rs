//! ptlist Types Library
//!
//! Type model shared by the DWARF reader and the list printer.

mod basic_type;

pub mod type_info;
pub mod value_format;

pub use basic_type::BasicType;

pub use type_info::{
    EnumVariant, StructMember, TypeInfo, TypeQualifier, TypeRef, DEFAULT_POINTER_SIZE,
};

pub use value_format::{Scalar, ValueFormatter};
