use super::{Chip8, Chip8Error, Chip8Result, Display, Keyboard};

pub const CPU_HZ: f32 = 700.0;
pub const TIMER_HZ: f32 = 60.0;

const CPU_TIME_STEP: f32 = 1.0 / CPU_HZ;
const TIMER_TIME_STEP: f32 = 1.0 / TIMER_HZ;

/// Fetch/execute driver that owns a machine and its keyboard and manages
/// timing internally.
pub struct Chip8Runner<K: Keyboard> {
    chip8: Chip8,
    keyboard: K,
    cpu_dt_accumulator: f32,
    timer_dt_accumulator: f32,
}

impl<K: Keyboard> Chip8Runner<K> {
    pub fn new(chip8: Chip8, keyboard: K) -> Self {
        Self {
            chip8,
            keyboard,
            cpu_dt_accumulator: 0.0,
            timer_dt_accumulator: 0.0,
        }
    }

    /// Executes a single CPU cycle (fetch, advance, decode, execute).
    pub fn step(&mut self) -> Result<Chip8Result, Chip8Error> {
        let opcode = self.chip8.fetch()?;
        self.chip8.execute(opcode, &mut self.keyboard)
    }

    /// Decrements the delay and sound timers once.
    pub fn tick_timers(&mut self) {
        self.chip8.timers_cycle();
    }

    /// Update emulator by delta time, handles both CPU and timer cycles.
    ///
    /// Runs as many CPU cycles and timer updates as needed based on the elapsed time `dt`.
    /// Returns early with `WaitForNextFrame` if a frame has to be rendered before the
    /// next CPU cycle, or if a key wait was cancelled and needs fresh input.
    pub fn update(&mut self, dt: f32) -> Result<Chip8Result, Chip8Error> {
        self.cpu_dt_accumulator += dt;
        self.timer_dt_accumulator += dt;

        while self.timer_dt_accumulator >= TIMER_TIME_STEP {
            self.timer_dt_accumulator -= TIMER_TIME_STEP;
            self.chip8.timers_cycle();
        }

        while self.cpu_dt_accumulator >= CPU_TIME_STEP {
            self.cpu_dt_accumulator -= CPU_TIME_STEP;

            let result = match self.step() {
                Err(Chip8Error::KeyWaitCancelled) => Chip8Result::WaitForNextFrame,
                other => other?,
            };

            if result == Chip8Result::WaitForNextFrame {
                // If we need to wait for the next frame we stop executing cycles.
                // We clear the accumulator to avoid "catching up" in the next frame.
                self.cpu_dt_accumulator = 0.0;
                return Ok(Chip8Result::WaitForNextFrame);
            }
        }

        Ok(Chip8Result::Continue)
    }

    /// Returns true if the sound timer is active, indicating a beep should be played.
    pub fn should_beep(&self) -> bool {
        self.chip8.should_beep()
    }

    pub fn display(&self) -> &Display {
        self.chip8.display()
    }

    pub fn chip8_ref(&self) -> &Chip8 {
        &self.chip8
    }

    pub fn chip8_mut(&mut self) -> &mut Chip8 {
        &mut self.chip8
    }

    pub fn keyboard(&self) -> &K {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut K {
        &mut self.keyboard
    }
}
