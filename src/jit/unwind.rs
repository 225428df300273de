//! Unwind metadata and code registration
//!
//! Each compiled body gets a DWARF `.eh_frame` fragment (one CIE, one FDE,
//! zero terminator) describing its prologue. A `JitCodeRegistry` publishes
//! code ranges with that metadata and a name; every `register` is undone by
//! exactly one `unregister`.

use std::collections::BTreeMap;
use std::ops::Range;

use tracing::debug;

use crate::error::JitError;
use crate::jit::assembler::Reg;

const DW_CFA_NOP: u8 = 0x00;
const DW_CFA_ADVANCE_LOC: u8 = 0x40;
const DW_CFA_OFFSET: u8 = 0x80;
const DW_CFA_DEF_CFA: u8 = 0x0c;
const DW_CFA_DEF_CFA_OFFSET: u8 = 0x0e;
const DW_EH_PE_ABSPTR: u8 = 0x00;

/// DWARF number of the return-address column on x86-64
const RETURN_ADDRESS_COLUMN: u8 = 16;
const DATA_ALIGNMENT: i8 = -8;

/// In-memory `.eh_frame` fragment for one code range
#[derive(Clone, PartialEq, Eq)]
pub struct UnwindInfo {
    bytes: Vec<u8>,
}

impl UnwindInfo {
    /// Describe a function at `range` whose prologue pushes `saved` in order
    pub fn new(range: &Range<usize>, saved: &[Reg]) -> Self {
        let mut bytes = Vec::with_capacity(96);

        // CIE
        let cie = begin_entry(&mut bytes);
        bytes.extend_from_slice(&0u32.to_le_bytes()); // CIE id
        bytes.push(1); // version
        bytes.extend_from_slice(b"zR\0");
        bytes.push(1); // code alignment
        bytes.push(DATA_ALIGNMENT as u8 & 0x7f); // sleb128(-8)
        bytes.push(RETURN_ADDRESS_COLUMN);
        bytes.push(1); // augmentation data length
        bytes.push(DW_EH_PE_ABSPTR);
        // on entry: cfa = rsp + 8, return address at cfa - 8
        bytes.extend_from_slice(&[DW_CFA_DEF_CFA, Reg::Rsp.dwarf(), 8]);
        bytes.extend_from_slice(&[DW_CFA_OFFSET | RETURN_ADDRESS_COLUMN, 1]);
        end_entry(&mut bytes, cie);

        // FDE
        let fde = begin_entry(&mut bytes);
        // distance from this field back to the start of the CIE
        let cie_pointer = (bytes.len() - (cie - 4)) as u32;
        bytes.extend_from_slice(&cie_pointer.to_le_bytes());
        bytes.extend_from_slice(&(range.start as u64).to_le_bytes());
        bytes.extend_from_slice(&((range.end - range.start) as u64).to_le_bytes());
        bytes.push(0); // augmentation data length
        let mut cfa_offset = 8u8;
        for reg in saved {
            let push_len = if reg.code() >= 8 { 2 } else { 1 };
            cfa_offset += 8;
            bytes.push(DW_CFA_ADVANCE_LOC | push_len);
            bytes.extend_from_slice(&[DW_CFA_DEF_CFA_OFFSET, cfa_offset]);
            bytes.extend_from_slice(&[DW_CFA_OFFSET | reg.dwarf(), cfa_offset / 8]);
        }
        end_entry(&mut bytes, fde);

        bytes.extend_from_slice(&0u32.to_le_bytes());
        UnwindInfo { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Start of the FDE within the blob
    pub fn fde_offset(&self) -> usize {
        let cie_len = u32::from_le_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]]);
        cie_len as usize + 4
    }
}

impl std::fmt::Debug for UnwindInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnwindInfo({} bytes)", self.bytes.len())
    }
}

/// Reserve the length field of an entry; returns the offset after it
fn begin_entry(bytes: &mut Vec<u8>) -> usize {
    bytes.extend_from_slice(&[0; 4]);
    bytes.len()
}

/// Pad the entry to pointer alignment and fill in its length
fn end_entry(bytes: &mut Vec<u8>, start: usize) {
    while (bytes.len() - start + 4) % 8 != 0 {
        bytes.push(DW_CFA_NOP);
    }
    let len = (bytes.len() - start) as u32;
    bytes[start - 4..start].copy_from_slice(&len.to_le_bytes());
}

/// Where compiled code ranges are published
///
/// A registry that does nothing is a valid implementation: it means no
/// unwinder or profiler will see generated frames, not that registration
/// failed.
pub trait JitCodeRegistry {
    fn register(&mut self, range: Range<usize>, name: &str, info: UnwindInfo) -> Result<(), JitError>;

    fn unregister(&mut self, range: Range<usize>) -> Result<(), JitError>;

    /// Name of the function containing `address`
    fn name(&self, address: usize) -> Option<&str>;
}

/// Registry for builds that publish nothing
#[derive(Debug, Default)]
pub struct NoopRegistry;

impl JitCodeRegistry for NoopRegistry {
    fn register(&mut self, _range: Range<usize>, _name: &str, _info: UnwindInfo) -> Result<(), JitError> {
        Ok(())
    }

    fn unregister(&mut self, _range: Range<usize>) -> Result<(), JitError> {
        Ok(())
    }

    fn name(&self, _address: usize) -> Option<&str> {
        None
    }
}

#[derive(Debug)]
struct TableEntry {
    end: usize,
    name: String,
    info: UnwindInfo,
    native: bool,
}

/// In-process function table
///
/// Keeps every registered range with its name and unwind info. With
/// `native_unwind` the info is also handed to the platform unwinder where
/// one is available.
#[derive(Debug, Default)]
pub struct FunctionTable {
    entries: BTreeMap<usize, TableEntry>,
    native_unwind: bool,
}

impl FunctionTable {
    pub fn new(native_unwind: bool) -> Self {
        FunctionTable {
            entries: BTreeMap::new(),
            native_unwind,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, address: usize) -> Option<&TableEntry> {
        let (_, entry) = self.entries.range(..=address).next_back()?;
        (address < entry.end).then_some(entry)
    }

    pub fn unwind_info(&self, address: usize) -> Option<&UnwindInfo> {
        self.lookup(address).map(|e| &e.info)
    }
}

impl JitCodeRegistry for FunctionTable {
    fn register(&mut self, range: Range<usize>, name: &str, info: UnwindInfo) -> Result<(), JitError> {
        if range.is_empty() {
            return Err(JitError::Registry(format!("empty range for `{name}`")));
        }
        let overlaps = self
            .entries
            .range(..range.end)
            .next_back()
            .is_some_and(|(_, e)| e.end > range.start);
        if overlaps {
            return Err(JitError::Registry(format!(
                "{:#x}..{:#x} overlaps registered code",
                range.start, range.end
            )));
        }
        let native = self.native_unwind && platform::register_frame(info.as_bytes());
        debug!(name, start = range.start, len = range.len(), native, "register jit code");
        self.entries.insert(
            range.start,
            TableEntry {
                end: range.end,
                name: name.to_string(),
                info,
                native,
            },
        );
        Ok(())
    }

    fn unregister(&mut self, range: Range<usize>) -> Result<(), JitError> {
        match self.entries.get(&range.start) {
            Some(entry) if entry.end == range.end => {}
            _ => {
                return Err(JitError::Registry(format!(
                    "{:#x}..{:#x} is not registered",
                    range.start, range.end
                )));
            }
        }
        if let Some(entry) = self.entries.remove(&range.start) {
            if entry.native {
                platform::deregister_frame(entry.info.as_bytes());
            }
            debug!(name = %entry.name, start = range.start, "unregister jit code");
        }
        Ok(())
    }

    fn name(&self, address: usize) -> Option<&str> {
        self.lookup(address).map(|e| e.name.as_str())
    }
}

impl Drop for FunctionTable {
    fn drop(&mut self) {
        for entry in self.entries.values() {
            if entry.native {
                platform::deregister_frame(entry.info.as_bytes());
            }
        }
    }
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
mod platform {
    unsafe extern "C" {
        fn __register_frame(begin: *const u8);
        fn __deregister_frame(begin: *const u8);
    }

    pub(super) fn register_frame(eh_frame: &[u8]) -> bool {
        unsafe { __register_frame(eh_frame.as_ptr()) };
        true
    }

    pub(super) fn deregister_frame(eh_frame: &[u8]) {
        unsafe { __deregister_frame(eh_frame.as_ptr()) };
    }
}

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
mod platform {
    pub(super) fn register_frame(_eh_frame: &[u8]) -> bool {
        false
    }

    pub(super) fn deregister_frame(_eh_frame: &[u8]) {}
}
