//! Symbol and memory access for commands
//!
//! Commands see the debuggee only through `DebugContext`: name lookups for
//! variables of the selected frame and for types, expansion of deferred
//! types, and raw memory reads.

mod live;

pub use live::{LiveTarget, TargetOptions};

use ptlist_process::MemoryReader;
use ptlist_types::{TypeInfo, TypeRef};

/// Longest C string read for a `char *` summary
pub const DEFAULT_MAX_STRING_LENGTH: usize = 1024;

/// A variable visible in the selected frame, located in debuggee memory
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRecord {
    pub name: String,
    /// Runtime address of the variable's storage
    pub address: u64,
    pub type_info: TypeInfo,
}

pub trait DebugContext {
    /// Variable visible in the selected frame: locals and parameters first,
    /// then file-scope variables
    fn find_variable(&self, name: &str) -> Option<VariableRecord>;

    /// First type declared under `name`
    fn find_first_type(&self, name: &str) -> Option<TypeInfo>;

    /// Expand a type that was deferred during resolution
    fn complete_type(&self, type_ref: TypeRef) -> Option<TypeInfo>;

    fn memory(&self) -> &dyn MemoryReader;

    fn max_string_length(&self) -> usize {
        DEFAULT_MAX_STRING_LENGTH
    }
}
