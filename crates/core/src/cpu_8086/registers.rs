//! 8086 register file with 8-bit sub-register aliasing

use serde::{Deserialize, Serialize};

// Flag bit positions in FLAGS register
pub const FLAG_CF: u16 = 0x0001; // Carry Flag
pub const FLAG_PF: u16 = 0x0004; // Parity Flag
pub const FLAG_AF: u16 = 0x0010; // Auxiliary Carry Flag
pub const FLAG_ZF: u16 = 0x0040; // Zero Flag
pub const FLAG_SF: u16 = 0x0080; // Sign Flag
pub const FLAG_TF: u16 = 0x0100; // Trap Flag
pub const FLAG_IF: u16 = 0x0200; // Interrupt Enable Flag
pub const FLAG_DF: u16 = 0x0400; // Direction Flag
pub const FLAG_OF: u16 = 0x0800; // Overflow Flag

/// 8-bit registers, in REG/R-M encoding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg8 {
    AL,
    CL,
    DL,
    BL,
    AH,
    CH,
    DH,
    BH,
}

impl Reg8 {
    const ENCODING: [Reg8; 8] = [
        Reg8::AL,
        Reg8::CL,
        Reg8::DL,
        Reg8::BL,
        Reg8::AH,
        Reg8::CH,
        Reg8::DH,
        Reg8::BH,
    ];

    /// Decode a 3-bit register field (w = 0)
    #[inline]
    pub fn from_encoding(bits: u8) -> Self {
        Self::ENCODING[(bits & 0x07) as usize]
    }

    /// The 16-bit register this byte lives in
    pub fn parent(self) -> Reg16 {
        match self {
            Reg8::AL | Reg8::AH => Reg16::AX,
            Reg8::CL | Reg8::CH => Reg16::CX,
            Reg8::DL | Reg8::DH => Reg16::DX,
            Reg8::BL | Reg8::BH => Reg16::BX,
        }
    }

    /// True for AH/CH/DH/BH
    pub fn is_high(self) -> bool {
        matches!(self, Reg8::AH | Reg8::CH | Reg8::DH | Reg8::BH)
    }

    pub fn name(self) -> &'static str {
        match self {
            Reg8::AL => "AL",
            Reg8::CL => "CL",
            Reg8::DL => "DL",
            Reg8::BL => "BL",
            Reg8::AH => "AH",
            Reg8::CH => "CH",
            Reg8::DH => "DH",
            Reg8::BH => "BH",
        }
    }
}

/// 16-bit registers
///
/// The first eight variants follow the REG/R-M encoding order (w = 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg16 {
    AX,
    CX,
    DX,
    BX,
    SP,
    BP,
    SI,
    DI,
    CS,
    DS,
    ES,
    SS,
    IP,
    FLAGS,
}

impl Reg16 {
    const ENCODING: [Reg16; 8] = [
        Reg16::AX,
        Reg16::CX,
        Reg16::DX,
        Reg16::BX,
        Reg16::SP,
        Reg16::BP,
        Reg16::SI,
        Reg16::DI,
    ];

    /// Decode a 3-bit register field (w = 1)
    #[inline]
    pub fn from_encoding(bits: u8) -> Self {
        Self::ENCODING[(bits & 0x07) as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            Reg16::AX => "AX",
            Reg16::CX => "CX",
            Reg16::DX => "DX",
            Reg16::BX => "BX",
            Reg16::SP => "SP",
            Reg16::BP => "BP",
            Reg16::SI => "SI",
            Reg16::DI => "DI",
            Reg16::CS => "CS",
            Reg16::DS => "DS",
            Reg16::ES => "ES",
            Reg16::SS => "SS",
            Reg16::IP => "IP",
            Reg16::FLAGS => "FLAGS",
        }
    }
}

/// All architectural registers of the 8086
///
/// Zero-initialized on creation. The CPU owns exactly one of these and is
/// the only writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    pub ax: u16,
    pub bx: u16,
    pub cx: u16,
    pub dx: u16,
    pub si: u16,
    pub di: u16,
    pub bp: u16,
    pub sp: u16,
    pub cs: u16,
    pub ds: u16,
    pub es: u16,
    pub ss: u16,
    pub ip: u16,
    pub flags: u16,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an 8-bit sub-register
    #[inline]
    pub fn get8(&self, reg: Reg8) -> u8 {
        let parent = self.get16(reg.parent());
        if reg.is_high() {
            (parent >> 8) as u8
        } else {
            (parent & 0xFF) as u8
        }
    }

    /// Write an 8-bit sub-register, preserving the sibling byte
    #[inline]
    pub fn set8(&mut self, reg: Reg8, val: u8) {
        let parent = reg.parent();
        let old = self.get16(parent);
        let new = if reg.is_high() {
            (old & 0x00FF) | ((val as u16) << 8)
        } else {
            (old & 0xFF00) | (val as u16)
        };
        self.set16(parent, new);
    }

    #[inline]
    pub fn get16(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::AX => self.ax,
            Reg16::CX => self.cx,
            Reg16::DX => self.dx,
            Reg16::BX => self.bx,
            Reg16::SP => self.sp,
            Reg16::BP => self.bp,
            Reg16::SI => self.si,
            Reg16::DI => self.di,
            Reg16::CS => self.cs,
            Reg16::DS => self.ds,
            Reg16::ES => self.es,
            Reg16::SS => self.ss,
            Reg16::IP => self.ip,
            Reg16::FLAGS => self.flags,
        }
    }

    #[inline]
    pub fn set16(&mut self, reg: Reg16, val: u16) {
        match reg {
            Reg16::AX => self.ax = val,
            Reg16::CX => self.cx = val,
            Reg16::DX => self.dx = val,
            Reg16::BX => self.bx = val,
            Reg16::SP => self.sp = val,
            Reg16::BP => self.bp = val,
            Reg16::SI => self.si = val,
            Reg16::DI => self.di = val,
            Reg16::CS => self.cs = val,
            Reg16::DS => self.ds = val,
            Reg16::ES => self.es = val,
            Reg16::SS => self.ss = val,
            Reg16::IP => self.ip = val,
            Reg16::FLAGS => self.flags = val,
        }
    }

    /// Get flag
    #[inline]
    pub fn flag(&self, flag: u16) -> bool {
        (self.flags & flag) != 0
    }

    /// Set flag
    #[inline]
    pub fn set_flag(&mut self, flag: u16, value: bool) {
        if value {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_file_zero_initialized() {
        let regs = RegisterFile::new();
        assert_eq!(regs.ax, 0);
        assert_eq!(regs.ip, 0);
        assert_eq!(regs.flags, 0);
    }

    #[test]
    fn test_sub_register_aliasing_from_parent() {
        let mut regs = RegisterFile::new();
        for v in [0x0000u16, 0x1234, 0x00FF, 0xFF00, 0xABCD, 0xFFFF] {
            regs.set16(Reg16::AX, v);
            assert_eq!(regs.get8(Reg8::AL), (v & 0xFF) as u8);
            assert_eq!(regs.get8(Reg8::AH), ((v >> 8) & 0xFF) as u8);
        }
    }

    #[test]
    fn test_sub_register_write_preserves_sibling() {
        let mut regs = RegisterFile::new();
        regs.set16(Reg16::BX, 0x1234);

        regs.set8(Reg8::BL, 0xCD);
        assert_eq!(regs.bx, 0x12CD);

        regs.set8(Reg8::BH, 0xAB);
        assert_eq!(regs.bx, 0xABCD);
        assert_eq!(regs.ax, 0, "other registers untouched");
    }

    #[test]
    fn test_set_low_then_high_composes_word() {
        let mut regs = RegisterFile::new();
        regs.set8(Reg8::DL, 0x78);
        regs.set8(Reg8::DH, 0x56);
        assert_eq!(regs.get16(Reg16::DX), 0x5678);
    }

    #[test]
    fn test_encoding_tables() {
        assert_eq!(Reg8::from_encoding(0b000), Reg8::AL);
        assert_eq!(Reg8::from_encoding(0b011), Reg8::BL);
        assert_eq!(Reg8::from_encoding(0b100), Reg8::AH);
        assert_eq!(Reg8::from_encoding(0b111), Reg8::BH);

        assert_eq!(Reg16::from_encoding(0b000), Reg16::AX);
        assert_eq!(Reg16::from_encoding(0b100), Reg16::SP);
        assert_eq!(Reg16::from_encoding(0b101), Reg16::BP);
        assert_eq!(Reg16::from_encoding(0b111), Reg16::DI);
    }

    #[test]
    fn test_flags() {
        let mut regs = RegisterFile::new();
        regs.set_flag(FLAG_ZF, true);
        regs.set_flag(FLAG_OF, true);
        assert!(regs.flag(FLAG_ZF));
        assert!(regs.flag(FLAG_OF));
        assert_eq!(regs.flags, FLAG_ZF | FLAG_OF);

        regs.set_flag(FLAG_ZF, false);
        assert!(!regs.flag(FLAG_ZF));
        assert_eq!(regs.flags, FLAG_OF);
    }
}
