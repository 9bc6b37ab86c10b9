//! ALU results and flag side effects
//!
//! Each operation's `FlagPolicy` decides which FLAGS bits it may change. Bits
//! outside the policy are carried over untouched.

use super::decoder::Width;
use super::opcodes::{FlagPolicy, Mnemonic};
use super::registers::{FLAG_AF, FLAG_CF, FLAG_OF, FLAG_PF, FLAG_SF, FLAG_ZF};

const ARITHMETIC_FLAGS: u16 = FLAG_CF | FLAG_PF | FLAG_AF | FLAG_ZF | FLAG_SF | FLAG_OF;

/// Value computed by an operation and the resulting FLAGS register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u16,
    pub flags: u16,
}

/// Calculate parity (true if even number of 1 bits in low byte)
#[inline]
pub fn calc_parity(val: u8) -> bool {
    val.count_ones() % 2 == 0
}

#[inline]
fn masks(width: Width) -> (u32, u16) {
    match width {
        Width::Byte => (0xFF, 0x80),
        Width::Word => (0xFFFF, 0x8000),
    }
}

/// Apply `op` to `dst` and `src` at the given width
///
/// `flags` is the FLAGS value before the operation; ADC/SBB read CF from it.
pub fn execute(op: Mnemonic, width: Width, dst: u16, src: u16, flags: u16) -> AluResult {
    let (mask, sign) = masks(width);
    let dst32 = dst as u32 & mask;
    let src32 = src as u32 & mask;
    let (d, s) = (dst32 as u16, src32 as u16);
    let carry_in = (flags & FLAG_CF != 0) as u32;

    let (value, carry, aux, overflow) = match op {
        Mnemonic::Add | Mnemonic::Adc => {
            let cin = if op == Mnemonic::Adc { carry_in } else { 0 };
            let sum = dst32 + src32 + cin;
            let result = (sum & mask) as u16;
            let aux = (d ^ s ^ result) & 0x10 != 0;
            let overflow = (d ^ result) & (s ^ result) & sign != 0;
            (result, sum > mask, aux, overflow)
        }
        Mnemonic::Sub | Mnemonic::Sbb | Mnemonic::Cmp => {
            let bin = if op == Mnemonic::Sbb { carry_in } else { 0 };
            let result = (dst32.wrapping_sub(src32 + bin) & mask) as u16;
            let aux = (d ^ s ^ result) & 0x10 != 0;
            let overflow = (d ^ s) & (d ^ result) & sign != 0;
            (result, dst32 < src32 + bin, aux, overflow)
        }
        Mnemonic::And => ((dst32 & src32) as u16, false, false, false),
        Mnemonic::Or => ((dst32 | src32) as u16, false, false, false),
        Mnemonic::Xor => ((dst32 ^ src32) as u16, false, false, false),
        Mnemonic::Mov => (s, false, false, false),
        Mnemonic::Nop | Mnemonic::Hlt => (d, false, false, false),
    };

    let flags = match op.flag_policy() {
        FlagPolicy::Unaffected => flags,
        FlagPolicy::Arithmetic | FlagPolicy::Logic => {
            let mut out = flags & !ARITHMETIC_FLAGS;
            let set = |out: &mut u16, flag: u16, on: bool| {
                if on {
                    *out |= flag;
                }
            };
            set(&mut out, FLAG_CF, carry);
            set(&mut out, FLAG_AF, aux);
            set(&mut out, FLAG_OF, overflow);
            set(&mut out, FLAG_ZF, value == 0);
            set(&mut out, FLAG_SF, value & sign != 0);
            set(&mut out, FLAG_PF, calc_parity((value & 0xFF) as u8));
            out
        }
    };

    AluResult { value, flags }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_8086::registers::{FLAG_DF, FLAG_IF};

    #[test]
    fn test_parity() {
        assert!(calc_parity(0x00));
        assert!(calc_parity(0x03));
        assert!(!calc_parity(0x01));
        assert!(!calc_parity(0x07));
        assert!(calc_parity(0xFF));
    }

    #[test]
    fn test_add_8bit_carry_and_zero() {
        let r = execute(Mnemonic::Add, Width::Byte, 0xFF, 0x01, 0);
        assert_eq!(r.value, 0x00);
        assert_ne!(r.flags & FLAG_CF, 0);
        assert_ne!(r.flags & FLAG_ZF, 0);
        assert_ne!(r.flags & FLAG_AF, 0);
        assert_ne!(r.flags & FLAG_PF, 0);
        assert_eq!(r.flags & FLAG_OF, 0);
        assert_eq!(r.flags & FLAG_SF, 0);
    }

    #[test]
    fn test_add_8bit_signed_overflow() {
        let r = execute(Mnemonic::Add, Width::Byte, 0x7F, 0x01, 0);
        assert_eq!(r.value, 0x80);
        assert_ne!(r.flags & FLAG_OF, 0);
        assert_ne!(r.flags & FLAG_SF, 0);
        assert_eq!(r.flags & FLAG_CF, 0);
    }

    #[test]
    fn test_add_16bit() {
        let r = execute(Mnemonic::Add, Width::Word, 0x1234, 0x1111, 0);
        assert_eq!(r.value, 0x2345);
        assert_eq!(r.flags & (FLAG_CF | FLAG_OF | FLAG_ZF | FLAG_SF), 0);

        let r = execute(Mnemonic::Add, Width::Word, 0xFFFF, 0x0002, 0);
        assert_eq!(r.value, 0x0001);
        assert_ne!(r.flags & FLAG_CF, 0);
    }

    #[test]
    fn test_adc_uses_carry_in() {
        let r = execute(Mnemonic::Adc, Width::Byte, 0x10, 0x20, FLAG_CF);
        assert_eq!(r.value, 0x31);
        assert_eq!(r.flags & FLAG_CF, 0);

        let r = execute(Mnemonic::Add, Width::Byte, 0x10, 0x20, FLAG_CF);
        assert_eq!(r.value, 0x30, "ADD ignores incoming carry");
    }

    #[test]
    fn test_sub_borrow() {
        let r = execute(Mnemonic::Sub, Width::Byte, 0x00, 0x01, 0);
        assert_eq!(r.value, 0xFF);
        assert_ne!(r.flags & FLAG_CF, 0);
        assert_ne!(r.flags & FLAG_SF, 0);
        assert_ne!(r.flags & FLAG_AF, 0);
        assert_eq!(r.flags & FLAG_OF, 0);
    }

    #[test]
    fn test_sub_16bit_signed_overflow() {
        let r = execute(Mnemonic::Sub, Width::Word, 0x8000, 0x0001, 0);
        assert_eq!(r.value, 0x7FFF);
        assert_ne!(r.flags & FLAG_OF, 0);
        assert_eq!(r.flags & FLAG_CF, 0);
    }

    #[test]
    fn test_sbb_borrow_in() {
        let r = execute(Mnemonic::Sbb, Width::Word, 0x0000, 0x0000, FLAG_CF);
        assert_eq!(r.value, 0xFFFF);
        assert_ne!(r.flags & FLAG_CF, 0);
    }

    #[test]
    fn test_cmp_equal_sets_zero() {
        let r = execute(Mnemonic::Cmp, Width::Byte, 0x42, 0x42, 0);
        assert_eq!(r.value, 0);
        assert_ne!(r.flags & FLAG_ZF, 0);
        assert_eq!(r.flags & FLAG_CF, 0);
    }

    #[test]
    fn test_logic_clears_carry_and_overflow() {
        let before = FLAG_CF | FLAG_OF | FLAG_AF;
        let r = execute(Mnemonic::And, Width::Byte, 0xF0, 0x0F, before);
        assert_eq!(r.value, 0);
        assert_eq!(r.flags & (FLAG_CF | FLAG_OF | FLAG_AF), 0);
        assert_ne!(r.flags & FLAG_ZF, 0);

        let r = execute(Mnemonic::Or, Width::Word, 0x8000, 0x0001, before);
        assert_eq!(r.value, 0x8001);
        assert_ne!(r.flags & FLAG_SF, 0);

        let r = execute(Mnemonic::Xor, Width::Byte, 0xAA, 0xAA, 0);
        assert_eq!(r.value, 0);
        assert_ne!(r.flags & FLAG_ZF, 0);
        assert_ne!(r.flags & FLAG_PF, 0);
    }

    #[test]
    fn test_control_flags_preserved() {
        let r = execute(Mnemonic::Add, Width::Byte, 1, 1, FLAG_DF | FLAG_IF);
        assert_eq!(r.flags & (FLAG_DF | FLAG_IF), FLAG_DF | FLAG_IF);
    }

    #[test]
    fn test_mov_leaves_flags_untouched() {
        let flags = 0xFFFF;
        let r = execute(Mnemonic::Mov, Width::Word, 0x1111, 0x2222, flags);
        assert_eq!(r.value, 0x2222);
        assert_eq!(r.flags, flags);
    }

    #[test]
    fn test_byte_operands_are_masked() {
        let r = execute(Mnemonic::Add, Width::Byte, 0x1280, 0x3480, 0);
        assert_eq!(r.value, 0x00);
        assert_ne!(r.flags & FLAG_CF, 0);
    }
}
