use rand::Rng;

use super::{
    Chip8, Chip8Error, Chip8Result, FONT_GLYPH_HEIGHT, FONT_START_ADDRESS, Keyboard, Opcode,
    OpcodeALU, UnknownOpcodePolicy,
};
use crate::u4;

impl Chip8 {
    /// Executes one raw opcode.
    ///
    /// The caller must already have advanced PC past the opcode (see
    /// [`Chip8::fetch`]); calls push that address and returns jump straight
    /// back to it.
    pub fn execute<K: Keyboard + ?Sized>(
        &mut self,
        opcode: u16,
        keyboard: &mut K,
    ) -> Result<Chip8Result, Chip8Error> {
        let decoded = Opcode::decode(opcode);
        log::trace!(
            "{:#05X}: {:04X}  {}",
            self.pc.wrapping_sub(2),
            opcode,
            decoded
        );

        self.execute_opcode(decoded, keyboard)
    }

    /// Executes an already decoded instruction.
    pub fn execute_opcode<K: Keyboard + ?Sized>(
        &mut self,
        opcode: Opcode,
        keyboard: &mut K,
    ) -> Result<Chip8Result, Chip8Error> {
        match opcode {
            Opcode::ClearDisplay => {
                self.display.clear();
                return Ok(Chip8Result::WaitForNextFrame);
            }
            Opcode::Jump { nnn } => {
                self.pc = nnn;
            }
            Opcode::JumpWithOffset { nnn } => {
                self.pc = nnn.wrapping_add(self.v[0].into());
            }
            Opcode::Call { nnn } => {
                self.stack.push(self.pc)?;
                log::debug!("call {:#05X}, return to {:#05X}", nnn, self.pc);
                self.pc = nnn;
            }
            Opcode::Return => {
                self.pc = self.stack.pop()?;
                log::debug!("return to {:#05X}", self.pc);
            }
            Opcode::SkipRegEqualImm { x, kk } => {
                self.skip_if(self.v[x] == kk);
            }
            Opcode::SkipRegNotEqualImm { x, kk } => {
                self.skip_if(self.v[x] != kk);
            }
            Opcode::SkipRegEqualReg { x, y } => {
                self.skip_if(self.v[x] == self.v[y]);
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                self.skip_if(self.v[x] != self.v[y]);
            }
            Opcode::SetRegImm { x, kk } => {
                self.v[x] = kk;
            }
            Opcode::AddRegImm { x, kk } => {
                self.v[x] = self.v[x].wrapping_add(kk);
            }
            Opcode::ALU { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Random { x, kk } => {
                let rand_byte: u8 = self.rng.random();
                self.v[x] = rand_byte & kk;
            }
            Opcode::SetIndexImm { nnn } => {
                self.i = nnn;
            }
            Opcode::AddIndexReg { x } => {
                self.i = self.i.wrapping_add(self.v[x].into());
            }
            Opcode::Draw { x, y, n } => {
                return self.execute_draw(x, y, n);
            }
            Opcode::SkipIfPressed { x } => {
                let key = self.key_in(x)?;
                self.skip_if(keyboard.is_down(key));
            }
            Opcode::SkipIfNotPressed { x } => {
                let key = self.key_in(x)?;
                self.skip_if(!keyboard.is_down(key));
            }
            Opcode::WaitForKey { x } => {
                return self.execute_wait_for_key(x, keyboard);
            }
            Opcode::ReadDelayTimer { x } => {
                self.v[x] = self.delay_timer;
            }
            Opcode::SetDelayTimer { x } => {
                self.delay_timer = self.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                self.sound_timer = self.v[x];
            }
            Opcode::FontChar { x } => {
                let glyph = usize::from(self.v[x]) * FONT_GLYPH_HEIGHT;
                self.i = (FONT_START_ADDRESS + glyph) as u16;
            }
            Opcode::BCD { x } => {
                let value = self.v[x];
                self.memory
                    .slice_mut(self.i.into(), 3)?
                    .copy_from_slice(&[value / 100, (value / 10) % 10, value % 10]);
            }
            Opcode::StoreRegs { x } => {
                let count = usize::from(x) + 1;
                self.memory
                    .slice_mut(self.i.into(), count)?
                    .copy_from_slice(&self.v[..count]);
            }
            Opcode::LoadRegs { x } => {
                let count = usize::from(x) + 1;
                let bytes = self.memory.slice(self.i.into(), count)?;
                self.v[..count].copy_from_slice(bytes);
            }
            Opcode::Unknown(opcode) => match self.unknown_opcode {
                UnknownOpcodePolicy::Error => {
                    return Err(Chip8Error::UnknownOpcode { opcode });
                }
                UnknownOpcodePolicy::Ignore => {
                    log::warn!(
                        "ignoring unknown opcode {:#06X} at {:#05X}",
                        opcode,
                        self.pc.wrapping_sub(2)
                    );
                }
            },
        };

        Ok(Chip8Result::Continue)
    }

    fn execute_alu(&mut self, x: u4, y: u4, op: OpcodeALU) {
        // VF is written last so that it wins when x is F.
        match op {
            OpcodeALU::Set => self.v[x] = self.v[y],
            OpcodeALU::Or => self.v[x] |= self.v[y],
            OpcodeALU::And => self.v[x] &= self.v[y],
            OpcodeALU::Xor => self.v[x] ^= self.v[y],
            OpcodeALU::Add => {
                let (res, overflow) = self.v[x].overflowing_add(self.v[y]);
                self.v[x] = res;
                self.v[0xF] = overflow as u8;
            }
            OpcodeALU::Sub => {
                let no_borrow = self.v[x] > self.v[y];
                self.v[x] = self.v[x].wrapping_sub(self.v[y]);
                self.v[0xF] = no_borrow as u8;
            }
            OpcodeALU::SubReverse => {
                let no_borrow = self.v[y] > self.v[x];
                self.v[x] = self.v[y].wrapping_sub(self.v[x]);
                self.v[0xF] = no_borrow as u8;
            }
            OpcodeALU::ShiftRight => {
                let lsb = self.v[x] & 1;
                self.v[x] >>= 1;
                self.v[0xF] = lsb;
            }
            OpcodeALU::ShiftLeft => {
                let msb = (self.v[x] >> 7) & 1;
                self.v[x] <<= 1;
                self.v[0xF] = msb;
            }
        }
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> Result<Chip8Result, Chip8Error> {
        let rows = self.memory.slice(self.i.into(), n.into())?;
        let collision = self
            .display
            .draw_sprite(self.v[x].into(), self.v[y].into(), rows);

        self.v[0xF] = collision as u8;
        Ok(Chip8Result::WaitForNextFrame)
    }

    fn execute_wait_for_key<K: Keyboard + ?Sized>(
        &mut self,
        x: u4,
        keyboard: &mut K,
    ) -> Result<Chip8Result, Chip8Error> {
        match keyboard.wait_for_key_press() {
            Ok(key) => {
                self.v[x] = key.into();
                Ok(Chip8Result::Continue)
            }
            Err(e) => {
                // Point back at this instruction so the next step waits again
                self.pc = self.pc.wrapping_sub(2);
                Err(e)
            }
        }
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    fn key_in(&self, x: u4) -> Result<u4, Chip8Error> {
        u4::try_from(self.v[x]).map_err(|key| Chip8Error::InvalidKey { key })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::emu::{Chip8Config, MEMORY_SIZE};

    /// Scripted keyboard: fixed key states plus a queue of presses.
    #[derive(Default)]
    struct MockKeyboard {
        down: [bool; 16],
        presses: VecDeque<u4>,
    }

    impl Keyboard for MockKeyboard {
        fn is_down(&self, key: u4) -> bool {
            self.down[key]
        }

        fn wait_for_key_press(&mut self) -> Result<u4, Chip8Error> {
            self.presses
                .pop_front()
                .ok_or(Chip8Error::KeyWaitCancelled)
        }
    }

    fn chip8() -> Chip8 {
        Chip8::with_config(Chip8Config {
            seed: Some(0xC8),
            ..Default::default()
        })
    }

    /// Runs one opcode as the driver would: PC is advanced first.
    fn run(chip8: &mut Chip8, opcode: u16) -> Result<Chip8Result, Chip8Error> {
        run_with(chip8, opcode, &mut MockKeyboard::default())
    }

    fn run_with(
        chip8: &mut Chip8,
        opcode: u16,
        keyboard: &mut MockKeyboard,
    ) -> Result<Chip8Result, Chip8Error> {
        chip8.pc = chip8.pc.wrapping_add(2);
        chip8.execute(opcode, keyboard)
    }

    #[test]
    fn clear_display() {
        let mut chip8 = chip8();
        chip8.display.draw_sprite(0, 0, &[0xFF, 0xFF]);
        assert_eq!(run(&mut chip8, 0x00E0), Ok(Chip8Result::WaitForNextFrame));
        assert_eq!(chip8.display.lit_count(), 0);
    }

    #[test]
    fn jump_and_jump_with_offset() {
        let mut chip8 = chip8();
        run(&mut chip8, 0x1381).unwrap();
        assert_eq!(chip8.pc, 0x381);

        chip8.v[0] = 0x10;
        run(&mut chip8, 0xB300).unwrap();
        assert_eq!(chip8.pc, 0x310);
    }

    #[test]
    fn call_pushes_advanced_pc_and_return_pops_it() {
        let mut chip8 = chip8();
        run(&mut chip8, 0x2400).unwrap();
        assert_eq!(chip8.pc, 0x400);
        assert_eq!(chip8.stack.as_slice(), &[0x202]);

        run(&mut chip8, 0x00EE).unwrap();
        assert_eq!(chip8.pc, 0x202);
        assert!(chip8.stack.is_empty());
    }

    #[test]
    fn return_with_empty_stack_underflows() {
        let mut chip8 = chip8();
        assert_eq!(run(&mut chip8, 0x00EE), Err(Chip8Error::StackUnderflow));
    }

    #[test]
    fn seventeenth_nested_call_overflows() {
        let mut chip8 = chip8();
        for _ in 0..16 {
            run(&mut chip8, 0x2200).unwrap();
        }
        assert_eq!(
            run(&mut chip8, 0x2200),
            Err(Chip8Error::StackOverflow { depth: 16 })
        );
    }

    #[test]
    fn skip_on_immediate() {
        let mut chip8 = chip8();
        chip8.v[5] = 0xA2;

        run(&mut chip8, 0x35A2).unwrap();
        assert_eq!(chip8.pc, 0x204, "3xkk should skip when equal");
        run(&mut chip8, 0x35A3).unwrap();
        assert_eq!(chip8.pc, 0x206, "3xkk should not skip when different");
        run(&mut chip8, 0x45A3).unwrap();
        assert_eq!(chip8.pc, 0x20A, "4xkk should skip when different");
        run(&mut chip8, 0x45A2).unwrap();
        assert_eq!(chip8.pc, 0x20C, "4xkk should not skip when equal");
    }

    #[test]
    fn skip_on_registers() {
        let mut chip8 = chip8();
        chip8.v[1] = 4;
        chip8.v[2] = 4;

        run(&mut chip8, 0x5120).unwrap();
        assert_eq!(chip8.pc, 0x204);
        run(&mut chip8, 0x9120).unwrap();
        assert_eq!(chip8.pc, 0x206);

        chip8.v[2] = 5;
        run(&mut chip8, 0x9120).unwrap();
        assert_eq!(chip8.pc, 0x20A);
    }

    #[test]
    fn load_and_add_immediate_wraps_without_flag() {
        let mut chip8 = chip8();
        run(&mut chip8, 0x63F0).unwrap();
        assert_eq!(chip8.v[3], 0xF0);

        run(&mut chip8, 0x7320).unwrap();
        assert_eq!(chip8.v[3], 0x10);
        assert_eq!(chip8.v[0xF], 0, "7xkk must not touch VF");
    }

    #[test]
    fn bitwise_ops() {
        let mut chip8 = chip8();
        chip8.v[0xF] = 7;

        chip8.v[1] = 0b1100;
        chip8.v[2] = 0b1010;
        run(&mut chip8, 0x8121).unwrap();
        assert_eq!(chip8.v[1], 0b1110);

        chip8.v[1] = 0b1100;
        run(&mut chip8, 0x8122).unwrap();
        assert_eq!(chip8.v[1], 0b1000);

        chip8.v[1] = 0b1100;
        run(&mut chip8, 0x8123).unwrap();
        assert_eq!(chip8.v[1], 0b0110);

        run(&mut chip8, 0x8120).unwrap();
        assert_eq!(chip8.v[1], 0b1010);
        assert_eq!(chip8.v[0xF], 7);
    }

    #[test]
    fn add_sets_carry() {
        let mut chip8 = chip8();
        chip8.v[0] = 200;
        chip8.v[1] = 100;
        run(&mut chip8, 0x8014).unwrap();
        assert_eq!(chip8.v[0], 44);
        assert_eq!(chip8.v[0xF], 1);

        run(&mut chip8, 0x8014).unwrap();
        assert_eq!(chip8.v[0], 144);
        assert_eq!(chip8.v[0xF], 0);
    }

    #[test]
    fn sub_subtracts_and_flags_no_borrow() {
        let mut chip8 = chip8();
        chip8.v[0] = 10;
        chip8.v[1] = 3;
        run(&mut chip8, 0x8015).unwrap();
        assert_eq!(chip8.v[0], 7);
        assert_eq!(chip8.v[0xF], 1);

        chip8.v[0] = 3;
        chip8.v[1] = 10;
        run(&mut chip8, 0x8015).unwrap();
        assert_eq!(chip8.v[0], 249);
        assert_eq!(chip8.v[0xF], 0);

        chip8.v[0] = 5;
        chip8.v[1] = 5;
        run(&mut chip8, 0x8015).unwrap();
        assert_eq!(chip8.v[0], 0);
        assert_eq!(chip8.v[0xF], 0, "equal operands do not set VF");
    }

    #[test]
    fn reverse_sub() {
        let mut chip8 = chip8();
        chip8.v[0] = 3;
        chip8.v[1] = 10;
        run(&mut chip8, 0x8017).unwrap();
        assert_eq!(chip8.v[0], 7);
        assert_eq!(chip8.v[0xF], 1);

        chip8.v[0] = 10;
        chip8.v[1] = 3;
        run(&mut chip8, 0x8017).unwrap();
        assert_eq!(chip8.v[0], 249);
        assert_eq!(chip8.v[0xF], 0);
    }

    #[test]
    fn shifts_use_vx_and_report_shifted_out_bit() {
        let mut chip8 = chip8();
        chip8.v[2] = 0b1000_0011;
        chip8.v[3] = 0xFF;

        run(&mut chip8, 0x8236).unwrap();
        assert_eq!(chip8.v[2], 0b0100_0001);
        assert_eq!(chip8.v[0xF], 1);

        run(&mut chip8, 0x823E).unwrap();
        assert_eq!(chip8.v[2], 0b1000_0010);
        assert_eq!(chip8.v[0xF], 0);

        run(&mut chip8, 0x823E).unwrap();
        assert_eq!(chip8.v[2], 0b0000_0100);
        assert_eq!(chip8.v[0xF], 1, "VF holds 1, not the raw msb mask");
    }

    #[test]
    fn flag_wins_when_vf_is_destination() {
        let mut chip8 = chip8();
        chip8.v[0xF] = 0xFF;
        chip8.v[1] = 1;
        run(&mut chip8, 0x8F14).unwrap();
        assert_eq!(chip8.v[0xF], 1);
    }

    #[test]
    fn index_register_ops() {
        let mut chip8 = chip8();
        run(&mut chip8, 0xA123).unwrap();
        assert_eq!(chip8.i, 0x123);

        chip8.v[4] = 0x10;
        run(&mut chip8, 0xF41E).unwrap();
        assert_eq!(chip8.i, 0x133);
    }

    #[test]
    fn random_is_masked_and_reproducible() {
        let mut a = chip8();
        let mut b = chip8();
        for _ in 0..32 {
            run(&mut a, 0xC10F).unwrap();
            run(&mut b, 0xC10F).unwrap();
            assert_eq!(a.v[1], b.v[1]);
            assert_eq!(a.v[1] & 0xF0, 0);
        }

        run(&mut a, 0xC100).unwrap();
        assert_eq!(a.v[1], 0);
    }

    #[test]
    fn draw_reads_sprite_from_index_and_sets_collision() {
        let mut chip8 = chip8();
        chip8.v[0] = 10;
        chip8.v[1] = 20;
        chip8.i = 0x300;
        chip8.memory.set(0x300, 0b1000_0001).unwrap();
        chip8.memory.set(0x301, 0b0100_0010).unwrap();

        assert_eq!(run(&mut chip8, 0xD012), Ok(Chip8Result::WaitForNextFrame));
        assert_eq!(chip8.v[0xF], 0);
        assert_eq!(chip8.display.is_set(10, 20), Ok(true));
        assert_eq!(chip8.display.is_set(17, 20), Ok(true));
        assert_eq!(chip8.display.is_set(11, 21), Ok(true));
        assert_eq!(chip8.display.lit_count(), 4);

        run(&mut chip8, 0xD012).unwrap();
        assert_eq!(chip8.v[0xF], 1);
        assert_eq!(chip8.display.lit_count(), 0);
    }

    #[test]
    fn draw_font_glyph_zero() {
        let mut chip8 = chip8();
        run(&mut chip8, 0xF029).unwrap();
        assert_eq!(chip8.i, 0);
        run(&mut chip8, 0xD005).unwrap();
        // "0" glyph: 4 + 2 + 2 + 2 + 4 lit pixels
        assert_eq!(chip8.display.lit_count(), 14);
    }

    #[test]
    fn draw_past_end_of_memory_is_an_error() {
        let mut chip8 = chip8();
        chip8.i = (MEMORY_SIZE - 2) as u16;
        assert_eq!(
            run(&mut chip8, 0xD003),
            Err(Chip8Error::MemoryOutOfBounds {
                address: MEMORY_SIZE
            })
        );
        assert_eq!(chip8.display.lit_count(), 0);
    }

    #[test]
    fn key_skips() {
        let mut chip8 = chip8();
        let mut keyboard = MockKeyboard::default();
        keyboard.down[0xA] = true;
        chip8.v[3] = 0xA;

        run_with(&mut chip8, 0xE39E, &mut keyboard).unwrap();
        assert_eq!(chip8.pc, 0x204);
        run_with(&mut chip8, 0xE3A1, &mut keyboard).unwrap();
        assert_eq!(chip8.pc, 0x206);

        chip8.v[3] = 0xB;
        run_with(&mut chip8, 0xE39E, &mut keyboard).unwrap();
        assert_eq!(chip8.pc, 0x208);
        run_with(&mut chip8, 0xE3A1, &mut keyboard).unwrap();
        assert_eq!(chip8.pc, 0x20C);
    }

    #[test]
    fn key_skip_with_invalid_key_value() {
        let mut chip8 = chip8();
        chip8.v[3] = 0x10;
        assert_eq!(
            run(&mut chip8, 0xE39E),
            Err(Chip8Error::InvalidKey { key: 0x10 })
        );
    }

    #[test]
    fn wait_for_key_stores_pressed_key() {
        let mut chip8 = chip8();
        let mut keyboard = MockKeyboard::default();
        keyboard.presses.push_back(u4::new(0x7));

        run_with(&mut chip8, 0xF50A, &mut keyboard).unwrap();
        assert_eq!(chip8.v[5], 7);
        assert_eq!(chip8.pc, 0x202);
    }

    #[test]
    fn cancelled_wait_rewinds_to_the_wait_instruction() {
        let mut chip8 = chip8();
        chip8.v[5] = 0x33;
        assert_eq!(run(&mut chip8, 0xF50A), Err(Chip8Error::KeyWaitCancelled));
        assert_eq!(chip8.pc, 0x200);
        assert_eq!(chip8.v[5], 0x33);
    }

    #[test]
    fn timer_registers() {
        let mut chip8 = chip8();
        chip8.v[1] = 60;
        run(&mut chip8, 0xF115).unwrap();
        run(&mut chip8, 0xF118).unwrap();
        assert_eq!(chip8.delay_timer, 60);
        assert_eq!(chip8.sound_timer, 60);

        chip8.timers_cycle();
        run(&mut chip8, 0xF207).unwrap();
        assert_eq!(chip8.v[2], 59);
    }

    #[test]
    fn font_char_points_at_glyph() {
        let mut chip8 = chip8();
        chip8.v[0] = 0xA;
        run(&mut chip8, 0xF029).unwrap();
        assert_eq!(chip8.i, 50);
        assert_eq!(chip8.memory.slice(50, 5).unwrap(), &[0xF0, 0x90, 0xF0, 0x90, 0x90]);
    }

    #[test]
    fn bcd_stores_decimal_digits() {
        let mut chip8 = chip8();
        chip8.v[6] = 157;
        chip8.i = 0x300;
        run(&mut chip8, 0xF633).unwrap();
        assert_eq!(chip8.memory.slice(0x300, 3).unwrap(), &[1, 5, 7]);
        assert_eq!(chip8.i, 0x300);
    }

    #[test]
    fn bcd_near_end_of_memory_writes_nothing() {
        let mut chip8 = chip8();
        chip8.v[0] = 255;
        chip8.i = (MEMORY_SIZE - 2) as u16;
        assert!(run(&mut chip8, 0xF033).is_err());
        assert_eq!(chip8.memory.get(MEMORY_SIZE - 2), Ok(0));
    }

    #[test]
    fn store_and_load_registers_inclusive() {
        let mut chip8 = chip8();
        for reg in 0..16u8 {
            chip8.v[reg as usize] = reg * 3;
        }
        chip8.i = 0x400;
        run(&mut chip8, 0xF355).unwrap();
        assert_eq!(chip8.memory.slice(0x400, 5).unwrap(), &[0, 3, 6, 9, 0]);
        assert_eq!(chip8.i, 0x400);

        chip8.v = [0; 16];
        run(&mut chip8, 0xF265).unwrap();
        assert_eq!(&chip8.v[..4], &[0, 3, 6, 0]);
    }

    #[test]
    fn store_and_load_past_end_of_memory_move_nothing() {
        let mut chip8 = chip8();
        chip8.v = [0xAB; 16];
        chip8.i = (MEMORY_SIZE - 2) as u16;

        assert_eq!(
            run(&mut chip8, 0xF355),
            Err(Chip8Error::MemoryOutOfBounds {
                address: MEMORY_SIZE
            })
        );
        assert_eq!(chip8.memory.slice(MEMORY_SIZE - 2, 2).unwrap(), &[0, 0]);

        assert_eq!(
            run(&mut chip8, 0xF365),
            Err(Chip8Error::MemoryOutOfBounds {
                address: MEMORY_SIZE
            })
        );
        assert_eq!(chip8.v, [0xAB; 16]);
    }

    #[test]
    fn unknown_opcode_policy() {
        let mut chip8 = chip8();
        assert_eq!(
            run(&mut chip8, 0x8008),
            Err(Chip8Error::UnknownOpcode { opcode: 0x8008 })
        );

        let mut lenient = Chip8::with_config(Chip8Config {
            unknown_opcode: UnknownOpcodePolicy::Ignore,
            seed: Some(1),
        });
        lenient.v[0] = 9;
        assert_eq!(run(&mut lenient, 0x8008), Ok(Chip8Result::Continue));
        assert_eq!(lenient.v[0], 9);
        assert_eq!(lenient.pc, 0x202);
    }
}
