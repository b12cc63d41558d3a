//! Core types shared by the loader, index and resolver

mod errors;

pub use errors::{DwarfError, Result};

/// Reader type for all DWARF and CFI sections.
///
/// Section bytes are copied out of the mapped file once, so readers own their
/// data and can be stored without borrowing the mapping.
pub type DwarfReader = gimli::EndianArcSlice<gimli::RunTimeEndian>;
