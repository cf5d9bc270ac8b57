use chip8_core::emu::{Chip8, Chip8Config, Chip8Error, Chip8Result, Keypad};

pub fn machine() -> Chip8 {
    Chip8::with_config(Chip8Config {
        seed: Some(0x5EED),
        ..Default::default()
    })
}

/// Executes `opcode` the way the driver does: PC is advanced first.
pub fn exec(chip8: &mut Chip8, opcode: u16) -> Result<Chip8Result, Chip8Error> {
    chip8.set_pc(chip8.pc().wrapping_add(2));
    chip8.execute(opcode, &mut Keypad::new())
}
