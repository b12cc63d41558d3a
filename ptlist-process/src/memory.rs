//! Read-only access to debuggee memory

use crate::error::{ProcessError, Result};

const PAGE_SIZE: u64 = 4096;

/// Source of debuggee memory.
///
/// Implemented by the live process handle and by in-memory images in tests.
pub trait MemoryReader {
    /// Read exactly `len` bytes starting at `addr`
    fn read_memory(&self, addr: u64, len: usize) -> Result<Vec<u8>>;

    /// Read a little-endian u64 at `addr`
    fn read_u64(&self, addr: u64) -> Result<u64> {
        let bytes = self.read_memory(addr, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes);
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a NUL-terminated string of at most `max_len` bytes.
    ///
    /// Reads page by page so a string ending just before an unmapped page is
    /// still returned. A string without terminator inside `max_len` is
    /// truncated.
    fn read_c_string(&self, addr: u64, max_len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut cursor = addr;
        while out.len() < max_len {
            let to_page_end = (PAGE_SIZE - (cursor % PAGE_SIZE)) as usize;
            let chunk_len = to_page_end.min(max_len - out.len());
            let (chunk, fault) = match self.read_memory(cursor, chunk_len) {
                Ok(chunk) => (chunk, None),
                Err(e @ ProcessError::MemoryRead { .. }) => {
                    // Partially readable chunk: keep the bytes before the fault
                    let readable = (0..chunk_len as u64)
                        .map_while(|i| self.read_memory(cursor.wrapping_add(i), 1).ok())
                        .flatten()
                        .collect::<Vec<u8>>();
                    (readable, Some(e))
                }
                Err(e) => return Err(e),
            };
            if let Some(nul) = chunk.iter().position(|b| *b == 0) {
                out.extend_from_slice(&chunk[..nul]);
                return Ok(out);
            }
            out.extend_from_slice(&chunk);
            if let Some(e) = fault {
                if out.is_empty() {
                    return Err(e);
                }
                break;
            }
            cursor = cursor.wrapping_add(chunk_len as u64);
        }
        Ok(out)
    }
}

impl<T: MemoryReader + ?Sized> MemoryReader for &T {
    fn read_memory(&self, addr: u64, len: usize) -> Result<Vec<u8>> {
        (**self).read_memory(addr, len)
    }
}
