//! ptlist Process Library
//!
//! Access to a live, stopped debuggee: ptrace attach/detach, `/proc/<pid>/mem`
//! reads, register snapshots, `/proc/<pid>/maps` parsing and per-module load
//! bias computation.

pub mod error;
pub mod maps;
pub mod memory;
pub mod offsets;
pub mod registers;

mod handle;

pub use error::{ProcessError, Result};
pub use handle::ProcessHandle;
pub use maps::{MemoryMapping, ModuleMapping, ProcMaps};
pub use memory::MemoryReader;
pub use offsets::{compute_load_bias, ModuleBias, SegmentInfo};
pub use registers::{
    dwarf_reg_name_x86_64, Registers, X86_64_FP_REGISTER, X86_64_RA_REGISTER, X86_64_SP_REGISTER,
};
