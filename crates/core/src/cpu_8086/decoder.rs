//! Instruction decoder
//!
//! Turns the bytes at CS:IP into an `Instruction`. Decoding only reads memory;
//! the caller decides when to commit the new IP.

use super::error::ExecError;
use super::memory::{physical_address, Memory8086};
use super::opcodes::{self, Bit1, Mnemonic, MnemonicRule, OperandForm, WidthBit};

/// Operand size selected by the W bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
}

impl Width {
    #[inline]
    pub fn from_bit(w: u8) -> Self {
        if w & 1 == 0 {
            Width::Byte
        } else {
            Width::Word
        }
    }

    #[inline]
    pub fn is_word(self) -> bool {
        self == Width::Word
    }
}

/// MOD field of the mode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 00: memory, no displacement (except R/M = 110)
    Memory,
    /// 01: memory, 8-bit displacement
    Memory8,
    /// 10: memory, 16-bit displacement
    Memory16,
    /// 11: register
    Register,
}

impl Mode {
    #[inline]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0b00 => Mode::Memory,
            0b01 => Mode::Memory8,
            0b10 => Mode::Memory16,
            _ => Mode::Register,
        }
    }
}

/// Displacement bytes following the mode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Displacement {
    Byte(i8),
    Word(u16),
}

impl Displacement {
    /// Value as a 16-bit offset (8-bit displacements are sign-extended)
    #[inline]
    pub fn value(self) -> u16 {
        match self {
            Displacement::Byte(d) => d as i16 as u16,
            Displacement::Word(d) => d,
        }
    }
}

/// Decode ModR/M byte and return (mod, reg, r/m)
#[inline]
pub fn decode_modrm(modrm: u8) -> (u8, u8, u8) {
    let modbits = (modrm >> 6) & 0x03; // Bits 7-6
    let reg = (modrm >> 3) & 0x07; // Bits 5-3
    let rm = modrm & 0x07; // Bits 2-0
    (modbits, reg, rm)
}

/// A fully decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Physical address of the opcode byte
    pub address: u32,
    pub opcode: u8,
    pub mnemonic: Mnemonic,
    pub form: OperandForm,
    /// D bit: REG names the destination
    pub direction: bool,
    /// S bit: 8-bit immediate sign-extended to the operand width
    pub sign_extend: bool,
    pub width: Width,
    /// None for forms without a mode byte
    pub mode: Option<Mode>,
    pub reg: u8,
    pub rm: u8,
    pub displacement: Option<Displacement>,
    /// Already extended to the operand width
    pub immediate: Option<u16>,
    /// Encoded length in bytes
    pub length: u8,
}

/// Reads instruction bytes from a copy of IP
struct Fetcher<'a, M: Memory8086> {
    memory: &'a M,
    cs: u16,
    ip: u16,
    /// First physical address instruction bytes may not come from
    end: u32,
    consumed: u8,
}

impl<'a, M: Memory8086> Fetcher<'a, M> {
    fn fetch_u8(&mut self) -> Result<u8, ExecError> {
        let offset = self.ip.checked_add(self.consumed as u16).ok_or(
            ExecError::OutOfBounds {
                // First address past the code segment
                address: physical_address(self.cs, 0xFFFF) + 1,
            },
        )?;
        let address = physical_address(self.cs, offset);
        if address >= self.end {
            return Err(ExecError::OutOfBounds { address });
        }
        let val = self.memory.read_byte(address)?;
        self.consumed += 1;
        Ok(val)
    }

    fn fetch_u16(&mut self) -> Result<u16, ExecError> {
        // 8086 is little-endian: fetch low byte first, then high byte
        let low_byte = self.fetch_u8()? as u16;
        let high_byte = self.fetch_u8()? as u16;
        Ok((high_byte << 8) | low_byte)
    }
}

/// Decode the instruction at CS:IP without side effects
pub fn decode<M: Memory8086>(memory: &M, cs: u16, ip: u16) -> Result<Instruction, ExecError> {
    decode_within(memory, cs, ip, memory.size())
}

/// Like `decode`, but every instruction byte must lie below physical `end`
///
/// A fetch at or past `end` is `OutOfBounds`, so an instruction cut short by
/// the end of a program image never borrows the bytes that follow it.
pub fn decode_within<M: Memory8086>(
    memory: &M,
    cs: u16,
    ip: u16,
    end: u32,
) -> Result<Instruction, ExecError> {
    let address = physical_address(cs, ip);
    let mut fetcher = Fetcher {
        memory,
        cs,
        ip,
        end,
        consumed: 0,
    };

    // Phase 1: opcode byte
    let opcode = fetcher.fetch_u8()?;
    let d = (opcode >> 1) & 0x01; // destination or sign extend
    let w = opcode & 0x01; // word or byte

    let desc =
        opcodes::lookup(opcode).ok_or(ExecError::UnsupportedOpcode { opcode, address })?;

    let width = match desc.width {
        WidthBit::Bit0 => Width::from_bit(w),
        WidthBit::Bit3 => Width::from_bit(opcode >> 3),
        WidthBit::Unsized => Width::Byte,
    };
    let direction = desc.bit1 == Bit1::Direction && d == 1;
    let sign_extend = desc.bit1 == Bit1::SignExtend && d == 1;

    // Phase 2: mode byte
    let (mode, reg, rm) = if desc.form.has_mode_byte() {
        let (modbits, reg, rm) = decode_modrm(fetcher.fetch_u8()?);
        (Some(Mode::from_bits(modbits)), reg, rm)
    } else if desc.form == OperandForm::ImmReg {
        (None, opcode & 0x07, 0)
    } else {
        (None, 0, 0)
    };

    let mnemonic = match desc.mnemonic {
        MnemonicRule::Fixed(m) => m,
        MnemonicRule::RegExtension(table) => table[reg as usize],
    };

    let displacement = match mode {
        // Direct address: 16-bit displacement even though MOD = 00
        Some(Mode::Memory) if rm == 0b110 => Some(Displacement::Word(fetcher.fetch_u16()?)),
        Some(Mode::Memory8) => Some(Displacement::Byte(fetcher.fetch_u8()? as i8)),
        Some(Mode::Memory16) => Some(Displacement::Word(fetcher.fetch_u16()?)),
        _ => None,
    };

    let immediate = match desc.immediate_len(width.is_word(), sign_extend) {
        0 => None,
        1 => {
            let byte = fetcher.fetch_u8()?;
            if width.is_word() {
                Some(byte as i8 as i16 as u16)
            } else {
                Some(byte as u16)
            }
        }
        _ => Some(fetcher.fetch_u16()?),
    };

    Ok(Instruction {
        address,
        opcode,
        mnemonic,
        form: desc.form,
        direction,
        sign_extend,
        width,
        mode,
        reg,
        rm,
        displacement,
        immediate,
        length: fetcher.consumed,
    })
}
