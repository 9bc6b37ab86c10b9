//! Intel 8086 instruction core
//!
//! Fetches instructions from a flat memory image, decodes them through the
//! opcode table, resolves operands and applies their effect to the register
//! file, memory and flags.
//!
//! A step is atomic: it either completes (operands resolved, result written,
//! flags updated, IP advanced) or fails with every register and memory byte
//! left as it was.

pub mod addressing;
pub mod decoder;
pub mod error;
pub mod flags;
pub mod memory;
pub mod opcodes;
pub mod registers;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::logging::{log, LogCategory, LogLevel};

pub use addressing::{EffectiveAddress, Location, Operand, Operands};
pub use decoder::{decode, decode_within, Displacement, Instruction, Mode, Width};
pub use error::{ExecError, LoadError, MemoryError};
pub use memory::{physical_address, ArrayMemory, Memory8086, MEMORY_SIZE};
pub use opcodes::Mnemonic;
pub use registers::{
    Reg16, Reg8, RegisterFile, FLAG_AF, FLAG_CF, FLAG_DF, FLAG_IF, FLAG_OF, FLAG_PF, FLAG_SF,
    FLAG_TF, FLAG_ZF,
};

/// Why a run stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// HLT executed
    Halted,
    /// CS:IP reached the end of the loaded image without a HLT
    RanOffEnd,
}

/// Result of a single `step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Executed(Instruction),
    Halted(HaltReason),
}

#[derive(Serialize, Deserialize)]
struct SaveState {
    registers: RegisterFile,
    instructions: u64,
    halted: Option<HaltReason>,
}

/// Intel 8086 CPU state and execution engine
#[derive(Debug)]
pub struct Cpu8086<M: Memory8086> {
    regs: RegisterFile,
    memory: M,
    /// First physical address past the program image
    image_end: u32,
    /// CS:IP the image was loaded at
    entry: (u16, u16),
    halted: Option<HaltReason>,
    instructions: u64,
}

impl<M: Memory8086> Cpu8086<M> {
    /// Create a CPU over `memory`; the whole memory counts as program
    /// until an image is loaded
    pub fn new(memory: M) -> Self {
        let image_end = memory.size();
        Self {
            regs: RegisterFile::new(),
            memory,
            image_end,
            entry: (0, 0),
            halted: None,
            instructions: 0,
        }
    }

    /// Reset registers to zero and CS:IP to the entry point (preserves memory)
    pub fn reset(&mut self) {
        self.regs = RegisterFile::new();
        self.regs.cs = self.entry.0;
        self.regs.ip = self.entry.1;
        self.halted = None;
        self.instructions = 0;
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn flags(&self) -> u16 {
        self.regs.flags
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn instructions_executed(&self) -> u64 {
        self.instructions
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halted
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Decode and execute exactly one instruction
    pub fn step(&mut self) -> Result<StepOutcome, ExecError> {
        if let Some(reason) = self.halted {
            return Ok(StepOutcome::Halted(reason));
        }

        let pc = physical_address(self.regs.cs, self.regs.ip);
        if pc >= self.image_end {
            log(LogCategory::Cpu, LogLevel::Info, || {
                format!(
                    "ran off the end of the image at {:04X}:{:04X} ({:05X})",
                    self.regs.cs, self.regs.ip, pc
                )
            });
            self.halted = Some(HaltReason::RanOffEnd);
            return Ok(StepOutcome::Halted(HaltReason::RanOffEnd));
        }

        let inst = decode_within(&self.memory, self.regs.cs, self.regs.ip, self.image_end)
            .map_err(|err| {
                log(LogCategory::Decoder, LogLevel::Error, || {
                    format!("decode failed at {:05X}: {}", pc, err)
                });
                err
            })?;

        // IP may not wrap back to the start of the code segment
        let next_ip = self
            .regs
            .ip
            .checked_add(inst.length as u16)
            .ok_or(ExecError::OutOfBounds {
                address: physical_address(self.regs.cs, 0xFFFF) + 1,
            })?;

        log(LogCategory::Cpu, LogLevel::Trace, || {
            format!("{:04X}:{:04X}  {}", self.regs.cs, self.regs.ip, inst)
        });

        self.execute(&inst).map_err(|err| {
            log(LogCategory::Cpu, LogLevel::Error, || {
                format!("{:05X}: {} failed: {}", pc, inst, err)
            });
            err
        })?;

        self.regs.ip = next_ip;
        self.instructions += 1;

        if inst.mnemonic == Mnemonic::Hlt {
            self.halted = Some(HaltReason::Halted);
            return Ok(StepOutcome::Halted(HaltReason::Halted));
        }
        Ok(StepOutcome::Executed(inst))
    }

    /// Step until HLT, the end of the image, or an error
    pub fn run(&mut self) -> Result<HaltReason, ExecError> {
        loop {
            if let StepOutcome::Halted(reason) = self.step()? {
                return Ok(reason);
            }
        }
    }

    /// Like `run`, but stops after `max_steps` instructions
    ///
    /// Returns `None` if the budget ran out before a halt.
    pub fn run_for(&mut self, max_steps: u64) -> Result<Option<HaltReason>, ExecError> {
        for _ in 0..max_steps {
            if let StepOutcome::Halted(reason) = self.step()? {
                return Ok(Some(reason));
            }
        }
        Ok(None)
    }

    /// Apply an instruction's effect. IP is not touched here.
    fn execute(&mut self, inst: &Instruction) -> Result<(), ExecError> {
        let Some(ops) = addressing::resolve_operands(inst)? else {
            return Ok(());
        };

        let dst_loc = ops.destination.locate(&self.regs);
        let src = match ops.source {
            Operand::Immediate(imm) => imm,
            Operand::Address(ea) => self.read_location(ea.locate(&self.regs))?,
        };
        // MOV never reads its destination
        let dst = if inst.mnemonic == Mnemonic::Mov {
            0
        } else {
            self.read_location(dst_loc)?
        };

        let result = flags::execute(inst.mnemonic, inst.width, dst, src, self.regs.flags);

        // The write is the only fallible side effect; flags follow it
        if inst.mnemonic.writes_result() {
            self.write_location(dst_loc, result.value)?;
        }
        self.regs.flags = result.flags;
        Ok(())
    }

    fn read_location(&self, loc: Location) -> Result<u16, ExecError> {
        Ok(match loc {
            Location::Reg8(r) => self.regs.get8(r) as u16,
            Location::Reg16(r) => self.regs.get16(r),
            Location::Memory(addr, Width::Byte) => self.memory.read_byte(addr)? as u16,
            Location::Memory(addr, Width::Word) => self.memory.read_word(addr)?,
        })
    }

    fn write_location(&mut self, loc: Location, val: u16) -> Result<(), ExecError> {
        match loc {
            Location::Reg8(r) => self.regs.set8(r, val as u8),
            Location::Reg16(r) => self.regs.set16(r, val),
            Location::Memory(addr, Width::Byte) => self.memory.write_byte(addr, val as u8)?,
            Location::Memory(addr, Width::Word) => self.memory.write_word(addr, val)?,
        }
        Ok(())
    }

    /// JSON save state: registers, instruction count and halt state.
    /// Memory contents are not included.
    pub fn save_state(&self) -> Value {
        serde_json::json!({
            "registers": self.regs,
            "instructions": self.instructions,
            "halted": self.halted,
        })
    }

    /// Restore a state produced by `save_state`
    pub fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        let state: SaveState = serde_json::from_value(v.clone())?;
        self.regs = state.registers;
        self.instructions = state.instructions;
        self.halted = state.halted;
        Ok(())
    }
}

impl Cpu8086<ArrayMemory> {
    /// Load a program image from `path` at physical address 0
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        self.load_at(path, 0)
    }

    /// Load a program image from `path` at `origin`
    pub fn load_at(&mut self, path: impl AsRef<Path>, origin: u32) -> Result<(), LoadError> {
        let bytes = std::fs::read(path.as_ref())?;
        self.load_image(&bytes, origin)
    }

    /// Copy `bytes` into memory at `origin` and point CS:IP at it
    pub fn load_image(&mut self, bytes: &[u8], origin: u32) -> Result<(), LoadError> {
        self.memory.load(bytes, origin).map_err(|err| {
            log(LogCategory::Memory, LogLevel::Error, || err.to_string());
            err
        })?;
        self.image_end = self.memory.image_end();
        self.entry = ((origin >> 4) as u16, (origin & 0xF) as u16);
        self.reset();

        log(LogCategory::Memory, LogLevel::Info, || {
            format!(
                "loaded {} bytes at {:05X}, entry {:04X}:{:04X}",
                bytes.len(),
                origin,
                self.entry.0,
                self.entry.1
            )
        });
        Ok(())
    }

    /// The loaded image region, for diagnostic dumps
    pub fn loaded_image(&self) -> &[u8] {
        self.memory.image()
    }
}

impl Default for Cpu8086<ArrayMemory> {
    fn default() -> Self {
        Self::new(ArrayMemory::new())
    }
}
