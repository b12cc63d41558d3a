//! Separate debug files referenced through `.gnu_debuglink`
//!
//! Search order, highest priority first:
//! 1. the link itself when it is an absolute path
//! 2. each configured search path, `<dir>/<name>` then `<dir>/.debug/<name>`
//! 3. the binary's directory, then its `.debug` subdirectory
//!
//! System-wide locations such as `/usr/lib/debug` are only searched when
//! configured. A candidate is accepted when its CRC-32 matches the link and,
//! if both files carry one, the build ID matches too.

use crate::core::Result;
use object::Object;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Locates separate debug files for binaries
#[derive(Debug, Clone, Default)]
pub struct DebugLinkResolver {
    search_paths: Vec<String>,
    allow_loose_match: bool,
}

impl DebugLinkResolver {
    pub fn new(search_paths: Vec<String>, allow_loose_match: bool) -> Self {
        Self {
            search_paths,
            allow_loose_match,
        }
    }

    /// Debug file for the binary parsed as `binary`, if it links one and a
    /// verified candidate exists
    pub fn find(&self, binary_path: &Path, binary: &object::File<'_>) -> Option<PathBuf> {
        let (link, expected_crc) = match binary.gnu_debuglink() {
            Ok(Some(link)) => link,
            Ok(None) => {
                tracing::debug!("No .gnu_debuglink section in {}", binary_path.display());
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to read .gnu_debuglink from {}: {}",
                    binary_path.display(),
                    e
                );
                return None;
            }
        };
        let link = {
            use std::os::unix::ffi::OsStrExt;
            PathBuf::from(std::ffi::OsStr::from_bytes(link))
        };
        let build_id = binary.build_id().ok().flatten();

        tracing::info!(
            "Looking for debug file '{}' for binary '{}'",
            link.display(),
            binary_path.display()
        );
        for candidate in self.candidates(binary_path, &link) {
            if !candidate.exists() {
                continue;
            }
            match verify_debug_file(&candidate, expected_crc, build_id) {
                Ok(true) => {
                    tracing::info!("Found matching debug file: {}", candidate.display());
                    return Some(candidate);
                }
                Ok(false) if self.allow_loose_match => {
                    tracing::warn!(
                        "Debug file {} failed verification; loose match enabled, using it",
                        candidate.display()
                    );
                    return Some(candidate);
                }
                Ok(false) => {
                    tracing::warn!(
                        "Debug file {} failed verification (CRC or build ID mismatch)",
                        candidate.display()
                    );
                }
                Err(e) => {
                    tracing::debug!("Failed to verify {}: {}", candidate.display(), e);
                }
            }
        }
        tracing::warn!("Debug file '{}' not found", link.display());
        None
    }

    /// Candidate locations in search order, deduplicated
    pub fn candidates(&self, binary_path: &Path, link: &Path) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        let mut push = |path: PathBuf| {
            if seen.insert(path.clone()) {
                paths.push(path);
            }
        };

        if link.is_absolute() {
            push(link.to_path_buf());
        }
        let basename = link.file_name().map(Path::new).unwrap_or(link);

        for dir in &self.search_paths {
            let dir = expand_home_dir(dir);
            push(dir.join(basename));
            push(dir.join(".debug").join(basename));
        }
        if let Some(dir) = binary_path.parent() {
            push(dir.join(basename));
            push(dir.join(".debug").join(basename));
        }
        paths
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home_dir(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn verify_debug_file(path: &Path, expected_crc: u32, build_id: Option<&[u8]>) -> Result<bool> {
    let data = std::fs::read(path)?;
    let actual_crc = crc32fast::hash(&data);
    if actual_crc != expected_crc {
        tracing::debug!(
            "CRC mismatch for {}: expected=0x{:08x}, actual=0x{:08x}",
            path.display(),
            expected_crc,
            actual_crc
        );
        return Ok(false);
    }
    let debug_obj = object::File::parse(&*data)?;
    match (build_id, debug_obj.build_id().ok().flatten()) {
        (Some(expected), Some(actual)) if expected != actual => {
            tracing::debug!(
                "Build ID mismatch for {}: binary={:02x?}, debug={:02x?}",
                path.display(),
                expected,
                actual
            );
            Ok(false)
        }
        _ => Ok(true),
    }
}
