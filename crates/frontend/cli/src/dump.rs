//! Text dumps of CPU state for the terminal

use emu8086_core::cpu_8086::registers::{
    FLAG_AF, FLAG_CF, FLAG_DF, FLAG_IF, FLAG_OF, FLAG_PF, FLAG_SF, FLAG_TF, FLAG_ZF,
};
use emu8086_core::cpu_8086::{Reg16, Reg8, RegisterFile};

const GENERAL: [(Reg16, Reg8, Reg8); 4] = [
    (Reg16::AX, Reg8::AH, Reg8::AL),
    (Reg16::BX, Reg8::BH, Reg8::BL),
    (Reg16::CX, Reg8::CH, Reg8::CL),
    (Reg16::DX, Reg8::DH, Reg8::DL),
];

const OTHERS: [Reg16; 10] = [
    Reg16::SI,
    Reg16::DI,
    Reg16::BP,
    Reg16::SP,
    Reg16::CS,
    Reg16::DS,
    Reg16::ES,
    Reg16::SS,
    Reg16::IP,
    Reg16::FLAGS,
];

/// Display order, most significant first
const FLAG_LETTERS: [(u16, char); 9] = [
    (FLAG_OF, 'O'),
    (FLAG_DF, 'D'),
    (FLAG_IF, 'I'),
    (FLAG_TF, 'T'),
    (FLAG_SF, 'S'),
    (FLAG_ZF, 'Z'),
    (FLAG_AF, 'A'),
    (FLAG_PF, 'P'),
    (FLAG_CF, 'C'),
];

/// One line per register: hex, binary, and the 8-bit halves where they exist
pub fn format_registers(regs: &RegisterFile) -> String {
    let mut out = String::new();
    for (reg, high, low) in GENERAL {
        let val = regs.get16(reg);
        out.push_str(&format!(
            "{:<5} = {:#06X}  {:016b}  {}={:#04X} {}={:#04X}\n",
            reg.name(),
            val,
            val,
            high.name(),
            regs.get8(high),
            low.name(),
            regs.get8(low)
        ));
    }
    for reg in OTHERS {
        let val = regs.get16(reg);
        out.push_str(&format!("{:<5} = {:#06X}  {:016b}\n", reg.name(), val, val));
    }
    out
}

/// Set flags as letters, cleared flags as '-'
pub fn format_flags(flags: u16) -> String {
    FLAG_LETTERS
        .iter()
        .map(|&(mask, letter)| if flags & mask != 0 { letter } else { '-' })
        .collect()
}

/// Classic hex + ASCII dump, 16 bytes per line, addressed from `origin`
pub fn hex_dump(origin: u32, bytes: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let address = origin + (i * 16) as u32;
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| {
                if b.is_ascii_graphic() || b == b' ' {
                    b as char
                } else {
                    '.'
                }
            })
            .collect();
        out.push_str(&format!("{:05X}  {:<47}  |{}|\n", address, hex.join(" "), ascii));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_flags() {
        assert_eq!(format_flags(0), "---------");
        assert_eq!(format_flags(FLAG_ZF | FLAG_PF), "-----Z-P-");
        assert_eq!(format_flags(0xFFFF), "ODITSZAPC");
    }

    #[test]
    fn test_format_registers_shows_halves() {
        let mut regs = RegisterFile::new();
        regs.bx = 0xAB34;
        let dump = format_registers(&regs);
        assert!(dump.contains("BX    = 0xAB34  1010101100110100  BH=0xAB BL=0x34"));
        assert!(dump.contains("FLAGS = 0x0000"));
    }

    #[test]
    fn test_hex_dump() {
        let dump = hex_dump(0x100, b"\x88\xC3Hi\xF4");
        assert_eq!(
            dump,
            format!("00100  {:<47}  |..Hi.|\n", "88 C3 48 69 F4")
        );

        let lines = hex_dump(0, &[0u8; 20]);
        assert_eq!(lines.lines().count(), 2);
        assert!(lines.lines().nth(1).unwrap().starts_with("00010  00 00 00 00"));
    }
}
