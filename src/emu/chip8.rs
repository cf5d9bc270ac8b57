use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{
    CallStack, Chip8Config, Chip8Error, Display, Memory, ROM_START_ADDRESS, UnknownOpcodePolicy,
};
use crate::u4;

/// CHIP-8 virtual machine state
pub struct Chip8 {
    /// 4KB memory array, font at 0x000
    pub(crate) memory: Memory,
    /// Display buffer: 64x32 monochrome pixels
    pub(crate) display: Display,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; 16],
    /// Call stack for subroutine returns
    pub(crate) stack: CallStack,

    /// Delay timer: decremented by the host at 60Hz until it reaches 0
    pub(crate) delay_timer: u8,
    /// Sound timer: decremented by the host at 60Hz, beeps while non-zero
    pub(crate) sound_timer: u8,

    pub(crate) rng: StdRng,
    pub(crate) unknown_opcode: UnknownOpcodePolicy,
}

impl Chip8 {
    pub fn new() -> Self {
        Self::with_config(Chip8Config::default())
    }

    pub fn with_config(config: Chip8Config) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Chip8 {
            memory: Memory::new(),
            display: Display::new(),
            pc: ROM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: CallStack::new(),
            delay_timer: 0,
            sound_timer: 0,
            rng,
            unknown_opcode: config.unknown_opcode,
        }
    }

    /// Loads a ROM into memory and points the program counter at it.
    pub fn load(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        self.memory.load_program(rom)?;
        self.pc = ROM_START_ADDRESS as u16;

        log::debug!(
            "loaded {} byte program at {:#05X}",
            rom.len(),
            ROM_START_ADDRESS
        );
        Ok(())
    }

    /// Fetches the opcode at PC and advances PC past it.
    pub fn fetch(&mut self) -> Result<u16, Chip8Error> {
        let opcode = self.memory.read_word(self.pc as usize)?;
        self.pc = self.pc.wrapping_add(2);

        Ok(opcode)
    }

    /// Updates the delay and sound timers. Should be called at 60Hz.
    pub fn timers_cycle(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Returns true if the sound timer is greater than zero, indicating a beep should be played.
    pub fn should_beep(&self) -> bool {
        self.sound_timer > 0
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn set_i(&mut self, i: u16) {
        self.i = i;
    }

    pub fn v(&self, reg: u4) -> u8 {
        self.v[reg]
    }

    pub fn set_v(&mut self, reg: u4, value: u8) {
        self.v[reg] = value;
    }

    pub fn registers(&self) -> &[u8; 16] {
        &self.v
    }

    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn display(&self) -> &Display {
        &self.display
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}
