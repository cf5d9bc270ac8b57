mod chip8;
mod display;
mod execute;
mod font;
mod keyboard;
mod memory;
mod opcode;
mod runner;
mod stack;
mod types;

pub use chip8::*;
pub use display::*;
pub use font::*;
pub use keyboard::*;
pub use memory::*;
pub use opcode::*;
pub use runner::*;
pub use stack::*;
pub use types::*;
