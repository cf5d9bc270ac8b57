use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::Chip8Error;
use crate::u4;

/// The input capability the interpreter needs from its host.
pub trait Keyboard {
    /// Whether the logical key is currently held down.
    fn is_down(&self, key: u4) -> bool;

    /// Blocks until a key-down event arrives and returns its key.
    ///
    /// Returns `Chip8Error::KeyWaitCancelled` when the wait is abandoned.
    fn wait_for_key_press(&mut self) -> Result<u4, Chip8Error>;
}

impl<K: Keyboard + ?Sized> Keyboard for &mut K {
    fn is_down(&self, key: u4) -> bool {
        (**self).is_down(key)
    }

    fn wait_for_key_press(&mut self) -> Result<u4, Chip8Error> {
        (**self).wait_for_key_press()
    }
}

/// Physical-to-logical key lookup.
///
/// The default layout maps the left-hand 4x4 block of a QWERTY keyboard
/// onto the hex keypad:
///
/// ```text
/// 1 2 3 4      1 2 3 C
/// Q W E R  ->  4 5 6 D
/// A S D F      7 8 9 E
/// Z X C V      A 0 B F
/// ```
#[derive(Debug, Clone)]
pub struct KeyMap {
    keys: [char; 16],
}

impl KeyMap {
    pub const fn new(keys: [char; 16]) -> Self {
        Self { keys }
    }

    pub fn map(&self, physical: char) -> Option<u4> {
        let physical = physical.to_ascii_lowercase();
        self.keys
            .iter()
            .position(|&k| k == physical)
            .map(|idx| u4::new(idx as u8))
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new([
            'x', // 0x0
            '1', // 0x1
            '2', // 0x2
            '3', // 0x3
            'q', // 0x4
            'w', // 0x5
            'e', // 0x6
            'a', // 0x7
            's', // 0x8
            'd', // 0x9
            'z', // 0xA
            'c', // 0xB
            '4', // 0xC
            'r', // 0xD
            'f', // 0xE
            'v', // 0xF
        ])
    }
}

/// Single-threaded keypad fed by the host between steps.
///
/// Only a key-down that arrives while `Fx0A` is parked satisfies it; presses
/// made before the wait began are ignored. Since nothing else can run while
/// the interpreter waits, a wait with no press yet is cancelled instead of
/// blocking, and the next call picks up the first press since then.
#[derive(Debug, Default, Clone)]
pub struct Keypad {
    down: [bool; 16],
    waiting: bool,
    press: Option<u4>,
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        if pressed && !self.down[key] && self.waiting && self.press.is_none() {
            self.press = Some(key);
        }
        self.down[key] = pressed;
    }

    /// Whether an `Fx0A` is parked waiting for a key-down.
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn state(&self) -> &[bool; 16] {
        &self.down
    }
}

impl Keyboard for Keypad {
    fn is_down(&self, key: u4) -> bool {
        self.down[key]
    }

    fn wait_for_key_press(&mut self) -> Result<u4, Chip8Error> {
        match self.press.take() {
            Some(key) => {
                self.waiting = false;
                Ok(key)
            }
            None => {
                self.waiting = true;
                Err(Chip8Error::KeyWaitCancelled)
            }
        }
    }
}

#[derive(Default)]
struct WaitState {
    waiting: bool,
    press: Option<u4>,
    cancelled: bool,
}

#[derive(Default)]
struct Shared {
    down: AtomicU16,
    wait: Mutex<WaitState>,
    pressed: Condvar,
}

/// Keypad handle that can be shared between an input thread and the
/// interpreter thread.
///
/// Key states live in an atomic bitmask. A blocked `wait_for_key_press`
/// wakes on the first key-down after the wait began, or on
/// [`SharedKeypad::cancel`].
#[derive(Clone, Default)]
pub struct SharedKeypad {
    shared: Arc<Shared>,
}

impl SharedKeypad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&self, key: u4, pressed: bool) {
        let bit = 1u16 << u8::from(key);

        if pressed {
            let previous = self.shared.down.fetch_or(bit, Ordering::AcqRel);
            if previous & bit == 0 {
                let mut state = self.lock();
                if state.waiting && state.press.is_none() {
                    state.press = Some(key);
                    self.shared.pressed.notify_all();
                }
            }
        } else {
            self.shared.down.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    /// Aborts a blocked key wait with `KeyWaitCancelled`.
    ///
    /// Does nothing when no wait is in progress.
    pub fn cancel(&self) {
        let mut state = self.lock();
        if state.waiting {
            state.cancelled = true;
            self.shared.pressed.notify_all();
        }
    }

    /// Whether a thread is blocked in a key wait.
    pub fn is_waiting(&self) -> bool {
        self.lock().waiting
    }

    /// Like `wait_for_key_press` but gives up after `timeout`.
    pub fn wait_for_key_press_timeout(&self, timeout: Duration) -> Result<u4, Chip8Error> {
        let guard = self.begin_wait();
        let (mut state, _) = self
            .shared
            .pressed
            .wait_timeout_while(guard, timeout, |s| s.press.is_none() && !s.cancelled)
            .unwrap_or_else(PoisonError::into_inner);

        Self::finish_wait(&mut state)
    }

    fn wait(&self) -> Result<u4, Chip8Error> {
        let guard = self.begin_wait();
        let mut state = self
            .shared
            .pressed
            .wait_while(guard, |s| s.press.is_none() && !s.cancelled)
            .unwrap_or_else(PoisonError::into_inner);

        Self::finish_wait(&mut state)
    }

    fn begin_wait(&self) -> MutexGuard<'_, WaitState> {
        let mut state = self.lock();
        state.waiting = true;
        state.press = None;
        state.cancelled = false;
        state
    }

    fn finish_wait(state: &mut WaitState) -> Result<u4, Chip8Error> {
        state.waiting = false;
        if std::mem::take(&mut state.cancelled) {
            log::debug!("key wait cancelled");
            return Err(Chip8Error::KeyWaitCancelled);
        }
        state.press.take().ok_or(Chip8Error::KeyWaitCancelled)
    }

    fn lock(&self) -> MutexGuard<'_, WaitState> {
        self.shared
            .wait
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Keyboard for SharedKeypad {
    fn is_down(&self, key: u4) -> bool {
        self.shared.down.load(Ordering::Acquire) & (1 << u8::from(key)) != 0
    }

    fn wait_for_key_press(&mut self) -> Result<u4, Chip8Error> {
        self.wait()
    }
}
