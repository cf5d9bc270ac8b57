/// Result type for a single interpreter step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip8Result {
    /// Continue executing instructions in the current frame.
    Continue,
    /// The display changed; the host should present a frame before continuing.
    WaitForNextFrame,
}

/// Error types that can occur during CHIP-8 emulation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Chip8Error {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomLoadError { size: usize, max_size: usize },

    #[error("Memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: usize },

    #[error("Pixel access out of bounds at ({x}, {y})")]
    PixelOutOfBounds { x: usize, y: usize },

    #[error("Stack overflow: call depth exceeded {depth} levels")]
    StackOverflow { depth: usize },

    #[error("Stack underflow: attempted to return from a subroutine with empty call stack")]
    StackUnderflow,

    #[error("Unknown opcode: {opcode:#06X}")]
    UnknownOpcode { opcode: u16 },

    #[error("Key wait cancelled before a key was pressed")]
    KeyWaitCancelled,

    #[error("Register value {key:#04X} is not a valid key")]
    InvalidKey { key: u8 },
}

/// What to do when a fetched word does not decode to a known instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownOpcodePolicy {
    /// Surface `Chip8Error::UnknownOpcode` to the caller.
    #[default]
    Error,
    /// Log a warning and treat the word as a no-op.
    Ignore,
}

/// Construction-time options for a [`Chip8`](super::Chip8).
#[derive(Debug, Clone, Copy, Default)]
pub struct Chip8Config {
    pub unknown_opcode: UnknownOpcodePolicy,
    /// Seed for the `Cxkk` random source. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;

// Fixed by the CHIP-8 machine layout
pub const MEMORY_SIZE: usize = 4096;
pub const ROM_START_ADDRESS: usize = 0x200;
pub const STACK_DEPTH: usize = 16;
