//! ptlist DWARF library
//!
//! Loads the debug information of one module (following `.gnu_debuglink`
//! when the binary is stripped), indexes its type, variable and function
//! names, resolves types into `TypeInfo` and unwinds stacks through
//! `.eh_frame`.

// Core modules
pub mod core;

// Internal implementation modules
pub(crate) mod data;
pub(crate) mod debuglink;
pub(crate) mod module;
pub(crate) mod parser;

pub mod unwind;

// Main entry point
pub mod analyzer;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main public API only
pub use analyzer::{DwarfAnalyzer, FunctionInfo, VariableInfo};
pub use core::{DwarfError, DwarfReader, Result};
pub use module::{load_dwarf, map_file, DwarfSections, LoadOptions, LoadedDwarf};
pub use parser::{FrameBase, FrameState, VariableLocation};
pub use unwind::{CfiTable, StackFrame, UnwindStep, Unwinder};

// Re-export type definitions (avoiding a direct dependency for users)
pub use ptlist_types::{TypeInfo, TypeRef};
