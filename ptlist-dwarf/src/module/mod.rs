//! Module loading: mapping the binary and picking where its DWARF lives

mod sections;

pub use sections::{attr_udata, is_declaration, DwarfSections, Entry, Unit};

use crate::core::{DwarfError, Result};
use crate::debuglink::DebugLinkResolver;
use memmap2::Mmap;
use object::{Object, ObjectSection};
use std::fs::File;
use std::path::{Path, PathBuf};

/// How to find the debug information of a binary
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit debug file; skips the binary and `.gnu_debuglink`
    pub debug_file: Option<PathBuf>,
    /// Extra directories searched for `.gnu_debuglink` targets
    pub search_paths: Vec<String>,
    /// Accept a linked debug file whose CRC or build ID does not match
    pub allow_loose_debug_match: bool,
}

/// DWARF sections together with the file they came from
#[derive(Debug)]
pub struct LoadedDwarf {
    pub binary_path: PathBuf,
    pub debug_path: PathBuf,
    pub sections: DwarfSections,
}

/// Map a file read-only
pub fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).map_err(|_| DwarfError::ModuleNotFound {
        path: path.to_path_buf(),
    })?;
    // SAFETY: the mapping is only read while loading and dropped before
    // returning; section data is copied out.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

fn has_debug_info(object: &object::File<'_>) -> bool {
    object
        .section_by_name(".debug_info")
        .map(|s| s.size() > 0)
        .unwrap_or(false)
}

/// Load the DWARF describing `binary_path`
pub fn load_dwarf(binary_path: &Path, options: &LoadOptions) -> Result<LoadedDwarf> {
    if let Some(debug_file) = &options.debug_file {
        tracing::info!("Loading debug info from {}", debug_file.display());
        return load_from(binary_path, debug_file);
    }

    let mmap = map_file(binary_path)?;
    let object = object::File::parse(&*mmap)?;
    if has_debug_info(&object) {
        tracing::info!("Loading debug info from {}", binary_path.display());
        let sections = DwarfSections::load(&object)?;
        return Ok(LoadedDwarf {
            binary_path: binary_path.to_path_buf(),
            debug_path: binary_path.to_path_buf(),
            sections,
        });
    }

    let resolver = DebugLinkResolver::new(
        options.search_paths.clone(),
        options.allow_loose_debug_match,
    );
    match resolver.find(binary_path, &object) {
        Some(debug_path) => load_from(binary_path, &debug_path),
        None => Err(DwarfError::NoDebugInfo {
            path: binary_path.to_path_buf(),
        }
        .into()),
    }
}

fn load_from(binary_path: &Path, debug_path: &Path) -> Result<LoadedDwarf> {
    let mmap = map_file(debug_path)?;
    let object = object::File::parse(&*mmap)?;
    if !has_debug_info(&object) {
        return Err(DwarfError::NoDebugInfo {
            path: debug_path.to_path_buf(),
        }
        .into());
    }
    let sections = DwarfSections::load(&object)?;
    Ok(LoadedDwarf {
        binary_path: binary_path.to_path_buf(),
        debug_path: debug_path.to_path_buf(),
        sections,
    })
}
