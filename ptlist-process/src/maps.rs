//! Process memory mapping parser for module discovery

use crate::error::{ProcessError, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Memory mapping information from /proc/PID/maps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMapping {
    pub start_addr: u64,
    pub end_addr: u64,
    pub permissions: String, // r-xp, rw-p etc.
    pub offset: u64,
    pub device: String, // major:minor device
    pub inode: u64,
    pub pathname: Option<String>, // Binary file path
}

impl MemoryMapping {
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start_addr && addr < self.end_addr
    }

    pub fn is_executable(&self) -> bool {
        self.permissions.contains('x')
    }
}

/// A file-backed module and the address range its mappings cover
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMapping {
    pub path: PathBuf,
    pub base: u64,
    pub end: u64,
}

/// Parsed /proc/PID/maps
#[derive(Debug, Clone, Default)]
pub struct ProcMaps {
    pub mappings: Vec<MemoryMapping>,
}

impl ProcMaps {
    /// Read /proc/PID/maps
    pub fn for_pid(pid: u32) -> Result<Self> {
        let maps_path = format!("/proc/{pid}/maps");
        tracing::debug!("Reading memory mappings from: {}", maps_path);
        let content =
            fs::read_to_string(&maps_path).map_err(|_e| ProcessError::ProcessNotFound { pid })?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        Self {
            mappings: content.lines().filter_map(parse_maps_line).collect(),
        }
    }

    /// Mappings backed by `path`
    pub fn mappings_for<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a MemoryMapping> {
        self.mappings
            .iter()
            .filter(move |m| m.pathname.as_deref().map(Path::new) == Some(path))
    }

    /// Mapping containing `addr`
    pub fn find(&self, addr: u64) -> Option<&MemoryMapping> {
        self.mappings.iter().find(|m| m.contains(addr))
    }

    /// File-backed modules with at least one executable mapping, in map order
    pub fn modules(&self) -> Vec<ModuleMapping> {
        let mut seen = HashSet::new();
        let mut modules = Vec::new();
        for mapping in &self.mappings {
            let Some(path) = &mapping.pathname else {
                continue;
            };
            if !mapping.is_executable() || !seen.insert(path.clone()) {
                continue;
            }
            let path = Path::new(path);
            let (base, end) = self
                .mappings_for(path)
                .fold((u64::MAX, 0), |(lo, hi), m| {
                    (lo.min(m.start_addr), hi.max(m.end_addr))
                });
            modules.push(ModuleMapping {
                path: path.to_path_buf(),
                base,
                end,
            });
        }
        tracing::debug!("Discovered {} executable modules", modules.len());
        modules
    }
}

/// Parse single line from /proc/PID/maps
/// Format: address perms offset dev inode pathname
/// Example: 7f8b8c000000-7f8b8c028000 r--p 00000000 08:01 2097153 /lib64/ld-linux-x86-64.so.2
pub fn parse_maps_line(line: &str) -> Option<MemoryMapping> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return None;
    }

    let (start, end) = parts[0].split_once('-')?;
    let start_addr = u64::from_str_radix(start, 16).ok()?;
    let end_addr = u64::from_str_radix(end, 16).ok()?;

    let permissions = parts[1].to_string();
    let offset = u64::from_str_radix(parts[2], 16).ok()?;
    let device = parts[3].to_string();
    let inode = parts[4].parse().ok()?;

    // Pathname may contain spaces; [stack], [vdso] etc. are not files
    let pathname = if parts.len() > 5 {
        let path_str = parts[5..].join(" ");
        let path_str = path_str
            .strip_suffix(" (deleted)")
            .map(str::to_string)
            .unwrap_or(path_str);
        if path_str.starts_with('[') && path_str.ends_with(']') {
            None
        } else {
            Some(path_str)
        }
    } else {
        None
    };

    Some(MemoryMapping {
        start_addr,
        end_addr,
        permissions,
        offset,
        device,
        inode,
        pathname,
    })
}
