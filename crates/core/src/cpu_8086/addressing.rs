//! Addressing mode resolution
//!
//! Maps MOD/REG/R-M fields to register operands or memory effective addresses.
//!
//! R/M (Register/Memory) Field Encoding
//!
//! ```text
//!  R/M | MOD = 11     | MOD = 00     | MOD = 01       | MOD = 10
//!      | w=0  | w=1   |              |                |
//!  000 | AL   | AX    | (BX)+(SI)    | (BX)+(SI)+d8   | (BX)+(SI)+d16
//!  001 | CL   | CX    | (BX)+(DI)    | (BX)+(DI)+d8   | (BX)+(DI)+d16
//!  010 | DL   | DX    | (BP)+(SI)    | (BP)+(SI)+d8   | (BP)+(SI)+d16
//!  011 | BL   | BX    | (BP)+(DI)    | (BP)+(DI)+d8   | (BP)+(DI)+d16
//!  100 | AH   | SP    | (SI)         | (SI)+d8        | (SI)+d16
//!  101 | CH   | BP    | (DI)         | (DI)+d8        | (DI)+d16
//!  110 | DH   | SI    | direct d16   | (BP)+d8        | (BP)+d16
//!  111 | BH   | DI    | (BX)         | (BX)+d8        | (BX)+d16
//! ```

use std::fmt;

use super::decoder::{Displacement, Instruction, Mode, Width};
use super::error::ExecError;
use super::memory::physical_address;
use super::opcodes::OperandForm;
use super::registers::{Reg16, Reg8, RegisterFile};

/// Base/index register combination of a memory operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseExpr {
    BxSi,
    BxDi,
    BpSi,
    BpDi,
    Si,
    Di,
    Bp,
    Bx,
}

impl BaseExpr {
    /// Generic table entry for an R/M value. Does not know about the
    /// MOD = 00 direct-address case.
    pub fn from_rm(rm: u8) -> Self {
        match rm & 0x07 {
            0b000 => BaseExpr::BxSi,
            0b001 => BaseExpr::BxDi,
            0b010 => BaseExpr::BpSi,
            0b011 => BaseExpr::BpDi,
            0b100 => BaseExpr::Si,
            0b101 => BaseExpr::Di,
            0b110 => BaseExpr::Bp,
            _ => BaseExpr::Bx,
        }
    }

    /// Sum of the base and index registers
    pub fn offset(self, regs: &RegisterFile) -> u16 {
        match self {
            BaseExpr::BxSi => regs.bx.wrapping_add(regs.si),
            BaseExpr::BxDi => regs.bx.wrapping_add(regs.di),
            BaseExpr::BpSi => regs.bp.wrapping_add(regs.si),
            BaseExpr::BpDi => regs.bp.wrapping_add(regs.di),
            BaseExpr::Si => regs.si,
            BaseExpr::Di => regs.di,
            BaseExpr::Bp => regs.bp,
            BaseExpr::Bx => regs.bx,
        }
    }

    /// BP-based addressing defaults to the stack segment
    pub fn default_segment(self) -> Reg16 {
        match self {
            BaseExpr::BpSi | BaseExpr::BpDi | BaseExpr::Bp => Reg16::SS,
            _ => Reg16::DS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BaseExpr::BxSi => "BX+SI",
            BaseExpr::BxDi => "BX+DI",
            BaseExpr::BpSi => "BP+SI",
            BaseExpr::BpDi => "BP+DI",
            BaseExpr::Si => "SI",
            BaseExpr::Di => "DI",
            BaseExpr::Bp => "BP",
            BaseExpr::Bx => "BX",
        }
    }
}

/// Where an operand lives, before register values are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveAddress {
    Reg8(Reg8),
    Reg16(Reg16),
    Memory {
        /// None for a direct address
        base: Option<BaseExpr>,
        /// Sign-extended displacement, or the absolute offset for a direct address
        displacement: u16,
        segment: Reg16,
        width: Width,
    },
}

/// Concrete operand location for the current register values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Reg8(Reg8),
    Reg16(Reg16),
    /// Physical address and operand width
    Memory(u32, Width),
}

impl EffectiveAddress {
    /// Apply the register file to get a concrete location
    pub fn locate(&self, regs: &RegisterFile) -> Location {
        match *self {
            EffectiveAddress::Reg8(r) => Location::Reg8(r),
            EffectiveAddress::Reg16(r) => Location::Reg16(r),
            EffectiveAddress::Memory {
                base,
                displacement,
                segment,
                width,
            } => {
                let offset = base
                    .map(|b| b.offset(regs))
                    .unwrap_or(0)
                    .wrapping_add(displacement);
                Location::Memory(physical_address(regs.get16(segment), offset), width)
            }
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, EffectiveAddress::Memory { .. })
    }
}

impl fmt::Display for EffectiveAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectiveAddress::Reg8(r) => write!(f, "{}", r.name()),
            EffectiveAddress::Reg16(r) => write!(f, "{}", r.name()),
            EffectiveAddress::Memory {
                base: None,
                displacement,
                ..
            } => write!(f, "[{:#06X}]", displacement),
            EffectiveAddress::Memory {
                base: Some(base),
                displacement,
                ..
            } => {
                let signed = *displacement as i16;
                if signed == 0 {
                    write!(f, "[{}]", base.name())
                } else if signed < 0 {
                    write!(f, "[{}-{:#X}]", base.name(), signed.unsigned_abs())
                } else {
                    write!(f, "[{}+{:#X}]", base.name(), signed)
                }
            }
        }
    }
}

/// Register-direct table (REG field, or R/M with MOD = 11)
pub fn resolve_reg(reg: u8, width: Width) -> EffectiveAddress {
    match width {
        Width::Byte => EffectiveAddress::Reg8(Reg8::from_encoding(reg)),
        Width::Word => EffectiveAddress::Reg16(Reg16::from_encoding(reg)),
    }
}

/// Resolve the R/M operand from MOD, R/M, W and the decoded displacement
pub fn resolve_rm(
    mode: Mode,
    rm: u8,
    width: Width,
    displacement: Option<Displacement>,
) -> Result<EffectiveAddress, ExecError> {
    let memory = |base: BaseExpr, displacement: u16| EffectiveAddress::Memory {
        base: Some(base),
        displacement,
        segment: base.default_segment(),
        width,
    };

    match (mode, displacement) {
        (Mode::Register, None) => Ok(resolve_reg(rm, width)),

        // MOD = 00, R/M = 110 is a direct address, not (BP)
        (Mode::Memory, Some(Displacement::Word(addr))) if rm == 0b110 => {
            Ok(EffectiveAddress::Memory {
                base: None,
                displacement: addr,
                segment: Reg16::DS,
                width,
            })
        }
        (Mode::Memory, None) if rm != 0b110 => Ok(memory(BaseExpr::from_rm(rm), 0)),

        (Mode::Memory8, Some(d @ Displacement::Byte(_))) => {
            Ok(memory(BaseExpr::from_rm(rm), d.value()))
        }
        (Mode::Memory16, Some(d @ Displacement::Word(_))) => {
            Ok(memory(BaseExpr::from_rm(rm), d.value()))
        }

        (mode, displacement) => Err(ExecError::MalformedOperand(format!(
            "mode {:?} with r/m {:03b} and displacement {:?}",
            mode, rm, displacement
        ))),
    }
}

/// Source operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Address(EffectiveAddress),
    Immediate(u16),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Address(ea) => write!(f, "{}", ea),
            Operand::Immediate(imm) => write!(f, "{:#X}", imm),
        }
    }
}

/// Destination and source of a two-operand instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operands {
    pub destination: EffectiveAddress,
    pub source: Operand,
}

/// Resolve destination and source for an instruction
///
/// Returns `None` for instructions without operands.
pub fn resolve_operands(inst: &Instruction) -> Result<Option<Operands>, ExecError> {
    let immediate = || {
        inst.immediate.map(Operand::Immediate).ok_or_else(|| {
            ExecError::MalformedOperand(format!("{} without immediate", inst.mnemonic.name()))
        })
    };
    let rm = || match inst.mode {
        Some(mode) => resolve_rm(mode, inst.rm, inst.width, inst.displacement),
        None => Err(ExecError::MalformedOperand(format!(
            "{} without mode byte",
            inst.mnemonic.name()
        ))),
    };

    let operands = match inst.form {
        OperandForm::None => return Ok(None),
        OperandForm::RegRm => {
            let reg = resolve_reg(inst.reg, inst.width);
            let rm = rm()?;
            // D = 1: REG is the destination
            if inst.direction {
                Operands {
                    destination: reg,
                    source: Operand::Address(rm),
                }
            } else {
                Operands {
                    destination: rm,
                    source: Operand::Address(reg),
                }
            }
        }
        OperandForm::ImmRm => Operands {
            destination: rm()?,
            source: immediate()?,
        },
        OperandForm::ImmReg => Operands {
            destination: resolve_reg(inst.reg, inst.width),
            source: immediate()?,
        },
        OperandForm::ImmAcc => Operands {
            destination: resolve_reg(0b000, inst.width),
            source: immediate()?,
        },
    };
    Ok(Some(operands))
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match resolve_operands(self) {
            Ok(None) => write!(f, "{}", self.mnemonic.name()),
            Ok(Some(ops)) => {
                let size = match (ops.destination.is_memory(), ops.source, self.width) {
                    (true, Operand::Immediate(_), Width::Byte) => "byte ",
                    (true, Operand::Immediate(_), Width::Word) => "word ",
                    _ => "",
                };
                write!(
                    f,
                    "{} {}{}, {}",
                    self.mnemonic.name(),
                    size,
                    ops.destination,
                    ops.source
                )
            }
            Err(_) => write!(f, "{} <malformed>", self.mnemonic.name()),
        }
    }
}
