//! Runtime load bias of a module mapped into a process
//!
//! DWARF addresses are link-time virtual addresses. Adding the bias computed
//! here turns them into addresses in the running process (zero for non-PIE
//! executables loaded at their linked address).

use crate::error::{ProcessError, Result};
use crate::maps::ProcMaps;
use object::{Object, ObjectSection, ObjectSegment};
use std::path::{Path, PathBuf};

const PAGE_MASK: u64 = !0xfffu64;

/// Load bias and mapped range of one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleBias {
    pub path: PathBuf,
    pub bias: u64,
    pub base: u64,
    pub end: u64,
}

impl ModuleBias {
    /// Runtime address of a link-time address
    pub fn runtime(&self, link_addr: u64) -> u64 {
        link_addr.wrapping_add(self.bias)
    }

    /// Link-time address of a runtime address
    pub fn link(&self, runtime_addr: u64) -> u64 {
        runtime_addr.wrapping_sub(self.bias)
    }

    pub fn contains(&self, runtime_addr: u64) -> bool {
        runtime_addr >= self.base && runtime_addr < self.end
    }
}

/// Loadable segment of the module file: (file offset, virtual address, size)
#[derive(Debug, Clone, Copy)]
pub struct SegmentInfo {
    pub file_offset: u64,
    pub vaddr: u64,
    pub size: u64,
}

/// Compute the load bias of `module_path` (whose parsed image is `obj`) from
/// the mappings of the process.
///
/// Segments are matched to mappings by page-aligned file offset; the bias of
/// the segment holding `.text` wins, falling back to the first matched one.
pub fn compute_load_bias(
    pid: u32,
    maps: &ProcMaps,
    module_path: &Path,
    obj: &object::File<'_>,
) -> Result<ModuleBias> {
    let candidates: Vec<(u64, u64)> = maps
        .mappings_for(module_path)
        .map(|m| (m.offset, m.start_addr))
        .collect();
    if candidates.is_empty() {
        return Err(ProcessError::ModuleNotMapped {
            pid,
            path: module_path.to_path_buf(),
        });
    }
    let base = maps
        .mappings_for(module_path)
        .map(|m| m.start_addr)
        .min()
        .unwrap_or(0);
    let end = maps
        .mappings_for(module_path)
        .map(|m| m.end_addr)
        .max()
        .unwrap_or(base);

    let segments: Vec<SegmentInfo> = obj
        .segments()
        .map(|seg| SegmentInfo {
            file_offset: seg.file_range().0,
            vaddr: seg.address(),
            size: seg.size(),
        })
        .collect();
    let text_addr = obj
        .sections()
        .find(|s| s.name().map(|n| n == ".text").unwrap_or(false))
        .map(|s| s.address());

    let bias = bias_from_segments(&candidates, &segments, text_addr).ok_or_else(|| {
        tracing::warn!(
            "No segment of {} matches the mappings of pid {}",
            module_path.display(),
            pid
        );
        ProcessError::ModuleNotMapped {
            pid,
            path: module_path.to_path_buf(),
        }
    })?;

    tracing::debug!(
        "computed bias: pid={} module='{}' base=0x{:x} end=0x{:x} bias=0x{:x}",
        pid,
        module_path.display(),
        base,
        end,
        bias
    );
    Ok(ModuleBias {
        path: module_path.to_path_buf(),
        bias,
        base,
        end,
    })
}

/// Bias from mapping candidates `(file offset, start address)` and the
/// module's loadable segments
pub fn bias_from_segments(
    candidates: &[(u64, u64)],
    segments: &[SegmentInfo],
    text_addr: Option<u64>,
) -> Option<u64> {
    let mut matched: Vec<(SegmentInfo, u64)> = Vec::new();
    for seg in segments {
        let key = seg.file_offset & PAGE_MASK;
        if let Some((_, start)) = candidates.iter().find(|(fo, _)| (*fo & PAGE_MASK) == key) {
            let bias = start.wrapping_sub(seg.vaddr & PAGE_MASK);
            matched.push((*seg, bias));
        }
    }
    if let Some(text) = text_addr {
        if let Some((_, bias)) = matched
            .iter()
            .find(|(seg, _)| seg.size > 0 && text >= seg.vaddr && text < seg.vaddr + seg.size)
        {
            return Some(*bias);
        }
    }
    matched.first().map(|(_, bias)| *bias)
}
