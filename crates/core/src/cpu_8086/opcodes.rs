//! Static opcode table
//!
//! Each row matches opcode bytes under a mask and describes how the rest of the
//! instruction is laid out. Adding an instruction family means adding rows here
//! (and, for a new operation, a `Mnemonic` variant with its ALU arm).

/// Operation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Mov,
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
    Nop,
    Hlt,
}

/// Which flags an operation touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagPolicy {
    /// FLAGS left bit-for-bit unchanged
    Unaffected,
    /// CF, PF, AF, ZF, SF, OF from the result
    Arithmetic,
    /// CF=OF=AF=0; PF, ZF, SF from the result
    Logic,
}

impl Mnemonic {
    pub fn name(self) -> &'static str {
        match self {
            Mnemonic::Mov => "MOV",
            Mnemonic::Add => "ADD",
            Mnemonic::Or => "OR",
            Mnemonic::Adc => "ADC",
            Mnemonic::Sbb => "SBB",
            Mnemonic::And => "AND",
            Mnemonic::Sub => "SUB",
            Mnemonic::Xor => "XOR",
            Mnemonic::Cmp => "CMP",
            Mnemonic::Nop => "NOP",
            Mnemonic::Hlt => "HLT",
        }
    }

    pub fn flag_policy(self) -> FlagPolicy {
        match self {
            Mnemonic::Add | Mnemonic::Adc | Mnemonic::Sub | Mnemonic::Sbb | Mnemonic::Cmp => {
                FlagPolicy::Arithmetic
            }
            Mnemonic::And | Mnemonic::Or | Mnemonic::Xor => FlagPolicy::Logic,
            Mnemonic::Mov | Mnemonic::Nop | Mnemonic::Hlt => FlagPolicy::Unaffected,
        }
    }

    /// False for operations that only compute flags (CMP)
    pub fn writes_result(self) -> bool {
        !matches!(self, Mnemonic::Cmp)
    }
}

/// How the mnemonic is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MnemonicRule {
    Fixed(Mnemonic),
    /// Selected by the REG field of the mode byte
    RegExtension(&'static [Mnemonic; 8]),
}

/// Operand layout following the opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandForm {
    /// No operands, no mode byte
    None,
    /// Mode byte; REG and R/M are both operands, ordered by the D bit
    RegRm,
    /// Mode byte; R/M is the destination, immediate is the source
    ImmRm,
    /// Register in the low 3 bits of the opcode, immediate is the source
    ImmReg,
    /// AL/AX is the destination, immediate is the source
    ImmAcc,
}

impl OperandForm {
    pub fn has_mode_byte(self) -> bool {
        matches!(self, OperandForm::RegRm | OperandForm::ImmRm)
    }
}

/// Number of immediate bytes following the operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmediateRule {
    None,
    /// 1 byte when w=0, 2 bytes when w=1
    ByWidth,
    /// As `ByWidth`, but a single byte when the S bit is set
    ByWidthUnlessSignExtended,
}

/// Meaning of bit 1 of the opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bit1 {
    Direction,
    SignExtend,
    Ignored,
}

/// Where the W bit lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthBit {
    Bit0,
    Bit3,
    /// Instruction has no sized operand
    Unsized,
}

/// One row of the opcode table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeDescriptor {
    pub pattern: u8,
    pub mask: u8,
    pub mnemonic: MnemonicRule,
    pub form: OperandForm,
    pub immediate: ImmediateRule,
    pub bit1: Bit1,
    pub width: WidthBit,
}

impl OpcodeDescriptor {
    #[inline]
    pub fn matches(&self, opcode: u8) -> bool {
        opcode & self.mask == self.pattern
    }

    /// Immediate size in bytes for the given W and S bits
    pub fn immediate_len(&self, wide: bool, sign_extend: bool) -> u8 {
        match self.immediate {
            ImmediateRule::None => 0,
            ImmediateRule::ByWidth => 1 + wide as u8,
            ImmediateRule::ByWidthUnlessSignExtended => {
                if sign_extend {
                    1
                } else {
                    1 + wide as u8
                }
            }
        }
    }
}

/// Group 1 (0x80-0x83) operation selected by REG
pub static GROUP1: [Mnemonic; 8] = [
    Mnemonic::Add,
    Mnemonic::Or,
    Mnemonic::Adc,
    Mnemonic::Sbb,
    Mnemonic::And,
    Mnemonic::Sub,
    Mnemonic::Xor,
    Mnemonic::Cmp,
];

/// `00ooo0dw`: ALU r/m, reg
const fn alu_rm(op: u8, mnemonic: Mnemonic) -> OpcodeDescriptor {
    OpcodeDescriptor {
        pattern: op << 3,
        mask: 0xFC,
        mnemonic: MnemonicRule::Fixed(mnemonic),
        form: OperandForm::RegRm,
        immediate: ImmediateRule::None,
        bit1: Bit1::Direction,
        width: WidthBit::Bit0,
    }
}

/// `00ooo10w`: ALU AL/AX, imm
const fn alu_acc(op: u8, mnemonic: Mnemonic) -> OpcodeDescriptor {
    OpcodeDescriptor {
        pattern: (op << 3) | 0b100,
        mask: 0xFE,
        mnemonic: MnemonicRule::Fixed(mnemonic),
        form: OperandForm::ImmAcc,
        immediate: ImmediateRule::ByWidth,
        bit1: Bit1::Ignored,
        width: WidthBit::Bit0,
    }
}

const fn no_operands(opcode: u8, mnemonic: Mnemonic) -> OpcodeDescriptor {
    OpcodeDescriptor {
        pattern: opcode,
        mask: 0xFF,
        mnemonic: MnemonicRule::Fixed(mnemonic),
        form: OperandForm::None,
        immediate: ImmediateRule::None,
        bit1: Bit1::Ignored,
        width: WidthBit::Unsized,
    }
}

pub static OPCODE_TABLE: &[OpcodeDescriptor] = &[
    alu_rm(0b000, Mnemonic::Add),
    alu_rm(0b001, Mnemonic::Or),
    alu_rm(0b010, Mnemonic::Adc),
    alu_rm(0b011, Mnemonic::Sbb),
    alu_rm(0b100, Mnemonic::And),
    alu_rm(0b101, Mnemonic::Sub),
    alu_rm(0b110, Mnemonic::Xor),
    alu_rm(0b111, Mnemonic::Cmp),
    alu_acc(0b000, Mnemonic::Add),
    alu_acc(0b001, Mnemonic::Or),
    alu_acc(0b010, Mnemonic::Adc),
    alu_acc(0b011, Mnemonic::Sbb),
    alu_acc(0b100, Mnemonic::And),
    alu_acc(0b101, Mnemonic::Sub),
    alu_acc(0b110, Mnemonic::Xor),
    alu_acc(0b111, Mnemonic::Cmp),
    // Group 1: 0x80-0x83
    OpcodeDescriptor {
        pattern: 0b1000_0000,
        mask: 0xFC,
        mnemonic: MnemonicRule::RegExtension(&GROUP1),
        form: OperandForm::ImmRm,
        immediate: ImmediateRule::ByWidthUnlessSignExtended,
        bit1: Bit1::SignExtend,
        width: WidthBit::Bit0,
    },
    // MOV r/m, reg: 0x88-0x8B
    OpcodeDescriptor {
        pattern: 0b1000_1000,
        mask: 0xFC,
        mnemonic: MnemonicRule::Fixed(Mnemonic::Mov),
        form: OperandForm::RegRm,
        immediate: ImmediateRule::None,
        bit1: Bit1::Direction,
        width: WidthBit::Bit0,
    },
    no_operands(0x90, Mnemonic::Nop),
    // MOV reg, imm: 0xB0-0xBF
    OpcodeDescriptor {
        pattern: 0b1011_0000,
        mask: 0xF0,
        mnemonic: MnemonicRule::Fixed(Mnemonic::Mov),
        form: OperandForm::ImmReg,
        immediate: ImmediateRule::ByWidth,
        bit1: Bit1::Ignored,
        width: WidthBit::Bit3,
    },
    // MOV r/m, imm: 0xC6-0xC7
    OpcodeDescriptor {
        pattern: 0b1100_0110,
        mask: 0xFE,
        mnemonic: MnemonicRule::Fixed(Mnemonic::Mov),
        form: OperandForm::ImmRm,
        immediate: ImmediateRule::ByWidth,
        bit1: Bit1::Ignored,
        width: WidthBit::Bit0,
    },
    no_operands(0xF4, Mnemonic::Hlt),
];

/// Find the descriptor for an opcode byte
pub fn lookup(opcode: u8) -> Option<&'static OpcodeDescriptor> {
    OPCODE_TABLE.iter().find(|desc| desc.matches(opcode))
}
