//! Variable locations and frame bases
//!
//! Only the shapes compilers emit for addressable variables are modelled:
//! static addresses, frame-base offsets and register-relative offsets. A
//! value living in a register has no address and cannot be inspected through
//! memory.

use crate::core::DwarfReader;
use crate::module::{DwarfSections, Unit};
use gimli::Operation;
use ptlist_process::Registers;

/// Where a variable lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableLocation {
    /// Link-time static address (`DW_OP_addr`, `DW_OP_addrx`)
    Address(u64),
    /// Offset from the function's frame base (`DW_OP_fbreg`)
    FrameBaseOffset(i64),
    /// Offset from a register (`DW_OP_breg<n>`)
    RegisterOffset { register: u16, offset: i64 },
    /// The value itself is in a register (`DW_OP_reg<n>`)
    Register(u16),
    /// No location at this pc
    OptimizedOut,
    Unsupported(String),
}

/// Frame base of a function (`DW_AT_frame_base`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameBase {
    /// `DW_OP_call_frame_cfa`
    CallFrameCfa,
    /// `DW_OP_reg<n>`: the register's value is the base
    Register(u16),
    /// `DW_OP_breg<n> <offset>`
    RegisterOffset { register: u16, offset: i64 },
    #[default]
    Unknown,
}

/// Runtime state of the frame a variable is read in
#[derive(Debug, Clone, Copy)]
pub struct FrameState<'a> {
    pub registers: &'a Registers,
    pub cfa: Option<u64>,
}

fn collect_ops(
    expr: gimli::Expression<DwarfReader>,
    unit: &Unit,
) -> Option<Vec<Operation<DwarfReader>>> {
    let mut ops = expr.operations(unit.encoding());
    let mut out = Vec::new();
    loop {
        match ops.next() {
            Ok(Some(op)) => out.push(op),
            Ok(None) => return Some(out),
            Err(_) => return None,
        }
    }
}

impl VariableLocation {
    /// Decode a location expression
    pub fn parse(
        sections: &DwarfSections,
        unit: &Unit,
        expr: gimli::Expression<DwarfReader>,
    ) -> Self {
        let Some(ops) = collect_ops(expr, unit) else {
            return VariableLocation::Unsupported("malformed expression".to_string());
        };
        let mut ops = ops.into_iter();
        let Some(first) = ops.next() else {
            return VariableLocation::OptimizedOut;
        };
        let mut location = match first {
            Operation::Address { address } => VariableLocation::Address(address),
            Operation::AddressIndex { index } => match sections.dwarf().address(unit, index) {
                Ok(address) => VariableLocation::Address(address),
                Err(e) => return VariableLocation::Unsupported(format!("DW_OP_addrx: {e}")),
            },
            Operation::FrameOffset { offset } => VariableLocation::FrameBaseOffset(offset),
            Operation::RegisterOffset {
                register, offset, ..
            } => VariableLocation::RegisterOffset {
                register: register.0,
                offset,
            },
            Operation::Register { register } => VariableLocation::Register(register.0),
            other => return VariableLocation::Unsupported(format!("{other:?}")),
        };
        for op in ops {
            match (&mut location, op) {
                (VariableLocation::Address(address), Operation::PlusConstant { value }) => {
                    *address = address.wrapping_add(value)
                }
                (VariableLocation::FrameBaseOffset(offset), Operation::PlusConstant { value })
                | (
                    VariableLocation::RegisterOffset { offset, .. },
                    Operation::PlusConstant { value },
                ) => *offset = offset.wrapping_add(value as i64),
                (_, Operation::TLS) => {
                    return VariableLocation::Unsupported("thread-local storage".to_string());
                }
                (_, other) => return VariableLocation::Unsupported(format!("{other:?}")),
            }
        }
        location
    }

    /// Runtime address of the variable.
    ///
    /// `bias` rebases static addresses; `frame` is needed for anything
    /// frame-relative.
    pub fn address(
        &self,
        bias: u64,
        frame_base: FrameBase,
        frame: Option<&FrameState<'_>>,
    ) -> Option<u64> {
        match self {
            VariableLocation::Address(address) => Some(address.wrapping_add(bias)),
            VariableLocation::FrameBaseOffset(offset) => {
                let base = frame_base.value(frame?)?;
                Some(base.wrapping_add(*offset as u64))
            }
            VariableLocation::RegisterOffset { register, offset } => {
                let value = frame?.registers.get(*register)?;
                Some(value.wrapping_add(*offset as u64))
            }
            VariableLocation::Register(_)
            | VariableLocation::OptimizedOut
            | VariableLocation::Unsupported(_) => None,
        }
    }
}

impl FrameBase {
    pub fn parse(unit: &Unit, expr: gimli::Expression<DwarfReader>) -> Self {
        match collect_ops(expr, unit).as_deref() {
            Some([Operation::CallFrameCFA]) => FrameBase::CallFrameCfa,
            Some([Operation::Register { register }]) => FrameBase::Register(register.0),
            Some([Operation::RegisterOffset {
                register, offset, ..
            }]) => FrameBase::RegisterOffset {
                register: register.0,
                offset: *offset,
            },
            _ => FrameBase::Unknown,
        }
    }

    pub fn value(&self, frame: &FrameState<'_>) -> Option<u64> {
        match self {
            FrameBase::CallFrameCfa => frame.cfa,
            FrameBase::Register(register) => frame.registers.get(*register),
            FrameBase::RegisterOffset { register, offset } => frame
                .registers
                .get(*register)
                .map(|v| v.wrapping_add(*offset as u64)),
            FrameBase::Unknown => None,
        }
    }
}
