//! Register snapshot indexed by DWARF register number

/// DWARF return-address column on x86_64 (RIP)
pub const X86_64_RA_REGISTER: u16 = 16;
/// DWARF register number of RBP on x86_64
pub const X86_64_FP_REGISTER: u16 = 6;
/// DWARF register number of RSP on x86_64
pub const X86_64_SP_REGISTER: u16 = 7;

const REGISTER_COUNT: usize = 17;

/// Register values of one frame. Unknown registers are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers {
    values: [Option<u64>; REGISTER_COUNT],
}

impl Registers {
    /// Registers of a frame where only pc, sp and fp are known
    pub fn from_pc_sp_fp(pc: u64, sp: u64, fp: u64) -> Self {
        let mut regs = Self::default();
        regs.set(X86_64_RA_REGISTER, pc);
        regs.set(X86_64_SP_REGISTER, sp);
        regs.set(X86_64_FP_REGISTER, fp);
        regs
    }

    pub fn get(&self, dwarf_reg: u16) -> Option<u64> {
        self.values.get(dwarf_reg as usize).copied().flatten()
    }

    pub fn set(&mut self, dwarf_reg: u16, value: u64) {
        if let Some(slot) = self.values.get_mut(dwarf_reg as usize) {
            *slot = Some(value);
        }
    }

    pub fn clear(&mut self, dwarf_reg: u16) {
        if let Some(slot) = self.values.get_mut(dwarf_reg as usize) {
            *slot = None;
        }
    }

    pub fn pc(&self) -> Option<u64> {
        self.get(X86_64_RA_REGISTER)
    }

    pub fn sp(&self) -> Option<u64> {
        self.get(X86_64_SP_REGISTER)
    }

    pub fn fp(&self) -> Option<u64> {
        self.get(X86_64_FP_REGISTER)
    }

    #[cfg(target_arch = "x86_64")]
    pub(crate) fn from_user_regs(regs: &nix::libc::user_regs_struct) -> Self {
        let mut out = Self::default();
        let ordered = [
            regs.rax, regs.rdx, regs.rcx, regs.rbx, regs.rsi, regs.rdi, regs.rbp, regs.rsp,
            regs.r8, regs.r9, regs.r10, regs.r11, regs.r12, regs.r13, regs.r14, regs.r15,
            regs.rip,
        ];
        for (reg, value) in ordered.into_iter().enumerate() {
            out.set(reg as u16, value);
        }
        out
    }
}

/// Convert DWARF register number to register name for x86_64
pub fn dwarf_reg_name_x86_64(dwarf_reg: u16) -> Option<&'static str> {
    match dwarf_reg {
        0 => Some("RAX"),
        1 => Some("RDX"),
        2 => Some("RCX"),
        3 => Some("RBX"),
        4 => Some("RSI"),
        5 => Some("RDI"),
        6 => Some("RBP"),
        7 => Some("RSP"),
        8 => Some("R8"),
        9 => Some("R9"),
        10 => Some("R10"),
        11 => Some("R11"),
        12 => Some("R12"),
        13 => Some("R13"),
        14 => Some("R14"),
        15 => Some("R15"),
        16 => Some("RIP"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_accessors_follow_dwarf_numbering() {
        let mut regs = Registers::from_pc_sp_fp(0x401000, 0x7ffc_0000, 0x7ffc_0040);
        assert_eq!(regs.pc(), Some(0x401000));
        assert_eq!(regs.get(7), Some(0x7ffc_0000));
        assert_eq!(regs.get(6), Some(0x7ffc_0040));
        assert_eq!(regs.get(3), None);
        regs.clear(6);
        assert_eq!(regs.fp(), None);
        // out of range registers are ignored
        regs.set(99, 1);
        assert_eq!(regs.get(99), None);
        assert_eq!(dwarf_reg_name_x86_64(16), Some("RIP"));
    }
}
