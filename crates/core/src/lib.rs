//! Intel 8086 instruction core.
//!
//! Loads a flat binary image into a 1 MiB memory and executes it one
//! instruction at a time: MOV and the ADD/OR/ADC/SBB/AND/SUB/XOR/CMP family
//! in their register, memory and immediate forms, plus NOP and HLT.

pub mod cpu_8086;
pub mod logging;

pub use cpu_8086::{
    Cpu8086, ExecError, HaltReason, Instruction, LoadError, RegisterFile, StepOutcome,
};
