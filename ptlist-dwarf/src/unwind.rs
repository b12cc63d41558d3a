//! Stack unwinding with `.eh_frame` call frame information
//!
//! Each mapped module contributes a `CfiTable`. Walking starts from the
//! registers of the stopped thread and applies the CFI row of every frame to
//! recover its caller. Frames without CFI fall back to the frame-pointer
//! chain.

use crate::core::{DwarfError, DwarfReader, Result};
use gimli::{
    BaseAddresses, CfaRule, EhFrame, EhFrameHdr, ParsedEhFrameHdr, RegisterRule, RunTimeEndian,
    UnwindContext, UnwindSection,
};
use object::{Object, ObjectSection};
use ptlist_process::{
    MemoryReader, ModuleBias, Registers, X86_64_FP_REGISTER, X86_64_RA_REGISTER,
    X86_64_SP_REGISTER,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Registers recovered from CFI for callers; the rest are unknown after a step
const CALLEE_SAVED: &[u16] = &[3, 6, 12, 13, 14, 15];

/// CFI of one module
pub struct CfiTable {
    eh_frame: EhFrame<DwarfReader>,
    eh_frame_hdr: Option<ParsedEhFrameHdr<DwarfReader>>,
    bases: BaseAddresses,
}

impl std::fmt::Debug for CfiTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CfiTable")
            .field("has_eh_frame_hdr", &self.eh_frame_hdr.is_some())
            .finish()
    }
}

/// CFI row applied at one pc, in runtime terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwindStep {
    pub cfa: u64,
    pub caller: Registers,
}

impl CfiTable {
    /// Load `.eh_frame` (and `.eh_frame_hdr` when present) from a parsed module
    pub fn from_object(path: &Path, object: &object::File<'_>) -> Result<Self> {
        let endian = if object.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };
        let address_size = if object.is_64() { 8 } else { 4 };
        let section_reader = |section: &object::Section<'_, '_>| -> Option<DwarfReader> {
            let data = section.uncompressed_data().ok()?;
            Some(gimli::EndianArcSlice::new(Arc::from(data.as_ref()), endian))
        };

        let eh_frame_section =
            object
                .section_by_name(".eh_frame")
                .ok_or_else(|| DwarfError::NoUnwindInfo {
                    path: path.to_path_buf(),
                })?;
        let eh_frame_reader =
            section_reader(&eh_frame_section).ok_or_else(|| DwarfError::NoUnwindInfo {
                path: path.to_path_buf(),
            })?;
        let mut eh_frame = EhFrame::from(eh_frame_reader);
        eh_frame.set_address_size(address_size);

        let mut bases = BaseAddresses::default().set_eh_frame(eh_frame_section.address());
        if let Some(text) = object.section_by_name(".text") {
            bases = bases.set_text(text.address());
        }
        if let Some(got) = object.section_by_name(".got") {
            bases = bases.set_got(got.address());
        }

        let mut eh_frame_hdr = None;
        if let Some(hdr_section) = object.section_by_name(".eh_frame_hdr") {
            bases = bases.set_eh_frame_hdr(hdr_section.address());
            if let Some(reader) = section_reader(&hdr_section) {
                match EhFrameHdr::from(reader).parse(&bases, address_size) {
                    Ok(parsed) => eh_frame_hdr = Some(parsed),
                    Err(e) => debug!(
                        "Failed to parse .eh_frame_hdr of {}: {}, using linear FDE search",
                        path.display(),
                        e
                    ),
                }
            }
        }

        Ok(Self {
            eh_frame,
            eh_frame_hdr,
            bases,
        })
    }

    /// Apply the CFI row covering `pc` (link-time) to `regs` (runtime values)
    pub fn step(
        &self,
        pc: u64,
        regs: &Registers,
        memory: &dyn MemoryReader,
    ) -> Option<UnwindStep> {
        let get_cie = |section: &EhFrame<DwarfReader>,
                       bases: &BaseAddresses,
                       offset: gimli::EhFrameOffset<usize>| {
            section.cie_from_offset(bases, offset)
        };
        let fde = match self.eh_frame_hdr.as_ref().and_then(|hdr| hdr.table()) {
            Some(table) => table.fde_for_address(&self.eh_frame, &self.bases, pc, get_cie),
            None => self.eh_frame.fde_for_address(&self.bases, pc, get_cie),
        }
        .ok()?;

        let mut ctx = UnwindContext::new();
        let row = fde
            .unwind_info_for_address(&self.eh_frame, &self.bases, &mut ctx, pc)
            .ok()?;

        let cfa = match row.cfa() {
            CfaRule::RegisterAndOffset { register, offset } => {
                regs.get(register.0)?.wrapping_add(*offset as u64)
            }
            CfaRule::Expression(_) => {
                trace!("CFA expression at pc 0x{:x} not supported", pc);
                return None;
            }
        };

        let mut caller = Registers::default();
        for &reg in CALLEE_SAVED.iter().chain(std::iter::once(&X86_64_RA_REGISTER)) {
            let value = match row.register(gimli::Register(reg)) {
                RegisterRule::Offset(offset) => {
                    memory.read_u64(cfa.wrapping_add(offset as u64)).ok()
                }
                RegisterRule::ValOffset(offset) => Some(cfa.wrapping_add(offset as u64)),
                RegisterRule::Register(other) => regs.get(other.0),
                RegisterRule::SameValue => regs.get(reg),
                RegisterRule::Undefined if reg != X86_64_RA_REGISTER => regs.get(reg),
                _ => None,
            };
            if let Some(value) = value {
                caller.set(reg, value);
            }
        }
        caller.set(X86_64_SP_REGISTER, cfa);
        Some(UnwindStep { cfa, caller })
    }
}

/// One frame of a backtrace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub index: usize,
    pub pc: u64,
    /// Canonical frame address, when the frame's CFI was found
    pub cfa: Option<u64>,
    pub registers: Registers,
}

/// Stack walker over the CFI of all mapped modules
#[derive(Debug, Default)]
pub struct Unwinder {
    modules: Vec<(ModuleBias, CfiTable)>,
}

impl Unwinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, bias: ModuleBias, table: CfiTable) {
        self.modules.push((bias, table));
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    fn module_for(&self, pc: u64) -> Option<&(ModuleBias, CfiTable)> {
        self.modules.iter().find(|(bias, _)| bias.contains(pc))
    }

    /// Walk the stack starting at `registers`, at most `max_frames` deep
    pub fn backtrace(
        &self,
        registers: Registers,
        memory: &dyn MemoryReader,
        max_frames: usize,
    ) -> Vec<StackFrame> {
        let mut frames = Vec::new();
        let mut regs = registers;
        while frames.len() < max_frames {
            let Some(pc) = regs.pc().filter(|pc| *pc != 0) else {
                break;
            };
            let index = frames.len();
            // Return addresses point after the call; look up the call itself
            let lookup_pc = if index == 0 { pc } else { pc.wrapping_sub(1) };

            let step = self.module_for(lookup_pc).and_then(|(bias, table)| {
                table.step(bias.link(lookup_pc), &regs, memory)
            });
            let (cfa, caller) = match step {
                Some(step) => (Some(step.cfa), Some(step.caller)),
                None => (None, Self::frame_pointer_step(&regs, memory)),
            };
            trace!("frame #{} pc=0x{:x} cfa={:x?}", index, pc, cfa);
            frames.push(StackFrame {
                index,
                pc,
                cfa,
                registers: regs.clone(),
            });

            match caller {
                Some(next) if next.sp() > regs.sp() || regs.sp().is_none() => regs = next,
                _ => break,
            }
        }
        debug!("Unwound {} frames", frames.len());
        frames
    }

    /// Classic `rbp` chain: saved rbp at `[rbp]`, return address at `[rbp+8]`
    fn frame_pointer_step(regs: &Registers, memory: &dyn MemoryReader) -> Option<Registers> {
        let fp = regs.fp().filter(|fp| *fp != 0)?;
        let saved_fp = memory.read_u64(fp).ok()?;
        let return_address = memory.read_u64(fp.wrapping_add(8)).ok()?;
        let mut caller = Registers::from_pc_sp_fp(return_address, fp.wrapping_add(16), saved_fp);
        for &reg in CALLEE_SAVED {
            if reg != X86_64_FP_REGISTER {
                if let Some(value) = regs.get(reg) {
                    caller.set(reg, value);
                }
            }
        }
        Some(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptlist_process::ProcessError;
    use std::collections::HashMap;

    struct Stack(HashMap<u64, u64>);

    impl MemoryReader for Stack {
        fn read_memory(&self, addr: u64, len: usize) -> ptlist_process::Result<Vec<u8>> {
            match (len, self.0.get(&addr)) {
                (8, Some(v)) => Ok(v.to_le_bytes().to_vec()),
                _ => Err(ProcessError::MemoryRead {
                    addr,
                    len,
                    source: std::io::Error::from_raw_os_error(5),
                }),
            }
        }
    }

    #[test]
    fn frame_pointer_chain_without_cfi() {
        // frame 0: fp=0x7000 -> saved fp 0x7100, ra 0x401234
        // frame 1: fp=0x7100 -> saved fp 0, ra 0x401500
        let stack = Stack(HashMap::from([
            (0x7000, 0x7100),
            (0x7008, 0x401234),
            (0x7100, 0x0),
            (0x7108, 0x401500),
        ]));
        let unwinder = Unwinder::new();
        let regs = Registers::from_pc_sp_fp(0x401000, 0x6ff0, 0x7000);
        let frames = unwinder.backtrace(regs, &stack, 16);
        let pcs: Vec<u64> = frames.iter().map(|f| f.pc).collect();
        assert_eq!(pcs, vec![0x401000, 0x401234, 0x401500]);
        assert!(frames.iter().all(|f| f.cfa.is_none()));
        assert_eq!(frames[1].registers.sp(), Some(0x7010));
    }

    #[test]
    fn max_frames_bounds_the_walk() {
        let stack = Stack(HashMap::from([(0x7000, 0x7000), (0x7008, 0x401234)]));
        let frames = Unwinder::new().backtrace(
            Registers::from_pc_sp_fp(0x401000, 0x6ff0, 0x7000),
            &stack,
            4,
        );
        // second step does not move the stack pointer up, so the walk stops
        assert_eq!(frames.len(), 2);
    }
}
