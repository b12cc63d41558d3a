//! Indexed lookups over loaded DWARF

mod name_index;

pub use name_index::{DieLoc, FunctionEntry, NameIndex};
