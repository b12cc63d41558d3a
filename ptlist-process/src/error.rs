//! Error types for live process access

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessError>;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Process not found: {pid}")]
    ProcessNotFound { pid: u32 },

    #[error("Failed to attach to process {pid}: {source}")]
    Attach { pid: u32, source: nix::Error },

    #[error("Process {pid} did not stop after attach: {status}")]
    NotStopped { pid: u32, status: String },

    #[error("Failed to read {len} bytes at 0x{addr:x}: {source}")]
    MemoryRead {
        addr: u64,
        len: usize,
        source: std::io::Error,
    },

    #[error("Failed to read registers of process {pid}: {source}")]
    Registers { pid: u32, source: nix::Error },

    #[error("Register access is not supported on this architecture")]
    UnsupportedArch,

    #[error("Module not mapped in process {pid}: {path}")]
    ModuleNotMapped { pid: u32, path: PathBuf },

    #[error("Object file error: {0}")]
    Object(#[from] object::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
