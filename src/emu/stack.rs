use super::{Chip8Error, STACK_DEPTH};

/// Fixed-depth stack of subroutine return addresses.
#[derive(Debug, Default, Clone)]
pub struct CallStack {
    frames: [u16; STACK_DEPTH],
    len: usize,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, addr: u16) -> Result<(), Chip8Error> {
        let slot = self
            .frames
            .get_mut(self.len)
            .ok_or(Chip8Error::StackOverflow { depth: STACK_DEPTH })?;
        *slot = addr;
        self.len += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16, Chip8Error> {
        if self.len == 0 {
            return Err(Chip8Error::StackUnderflow);
        }
        self.len -= 1;
        Ok(self.frames[self.len])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Return addresses from the bottom of the stack to the top.
    pub fn as_slice(&self) -> &[u16] {
        &self.frames[..self.len]
    }
}
