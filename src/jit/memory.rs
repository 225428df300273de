//! Executable memory regions
//!
//! Code is copied into a fresh anonymous mapping while it is writable, then
//! the mapping is flipped to read+execute. The mapping is released on drop.

use std::ops::Range;
use std::ptr::NonNull;

use crate::error::JitError;

pub struct ExecutableMemory {
    ptr: NonNull<u8>,
    /// Mapped length, a whole number of pages
    mapped: usize,
    /// Bytes of code
    len: usize,
}

impl ExecutableMemory {
    #[cfg(unix)]
    pub fn new(code: &[u8]) -> Result<Self, JitError> {
        if code.is_empty() {
            return Err(JitError::Map("cannot map an empty code buffer".to_string()));
        }
        let page = page_size();
        let mapped = code.len().div_ceil(page) * page;
        let raw = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                mapped,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_ANON | libc::MAP_PRIVATE,
                -1,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(JitError::Map(std::io::Error::last_os_error().to_string()));
        }
        let ptr = NonNull::new(raw.cast::<u8>()).ok_or_else(|| JitError::Map("mmap returned null".to_string()))?;
        let memory = ExecutableMemory { ptr, mapped, len: code.len() };
        unsafe {
            std::ptr::copy_nonoverlapping(code.as_ptr(), ptr.as_ptr(), code.len());
        }
        let rc = unsafe { libc::mprotect(raw, mapped, libc::PROT_READ | libc::PROT_EXEC) };
        if rc != 0 {
            // `memory` unmaps on drop
            return Err(JitError::Protect(std::io::Error::last_os_error().to_string()));
        }
        Ok(memory)
    }

    #[cfg(not(unix))]
    pub fn new(_code: &[u8]) -> Result<Self, JitError> {
        Err(JitError::Unsupported)
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Address range covered by the code
    pub fn range(&self) -> Range<usize> {
        let start = self.ptr.as_ptr() as usize;
        start..start + self.len
    }

    /// The code as bytes
    pub fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for ExecutableMemory {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast(), self.mapped);
        }
    }
}

impl std::fmt::Debug for ExecutableMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let range = self.range();
        write!(f, "ExecutableMemory({:#x}..{:#x})", range.start, range.end)
    }
}

#[cfg(unix)]
fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { 4096 }
}
