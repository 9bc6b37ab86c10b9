use thiserror::Error;

/// Errors raised by the memory array
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("memory access out of bounds at {address:#07X}")]
    OutOfBounds { address: u32 },
    #[error("image of {len} bytes does not fit in memory at origin {origin:#07X}")]
    ImageTooLarge { origin: u32, len: usize },
}

/// Errors that terminate a `step` or `run`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("unsupported opcode {opcode:#04X} at {address:#07X}")]
    UnsupportedOpcode { opcode: u8, address: u32 },
    #[error("malformed operand: {0}")]
    MalformedOperand(String),
    #[error("out of bounds access at {address:#07X}")]
    OutOfBounds { address: u32 },
}

impl From<MemoryError> for ExecError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::OutOfBounds { address } => ExecError::OutOfBounds { address },
            MemoryError::ImageTooLarge { origin, .. } => ExecError::OutOfBounds { address: origin },
        }
    }
}

/// Errors raised while loading a program image
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read program image: {0}")]
    Io(#[from] std::io::Error),
    #[error("program image does not fit in memory: {0}")]
    DoesNotFit(#[from] MemoryError),
}
