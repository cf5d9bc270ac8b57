use super::{Chip8Error, FONT, FONT_END_ADDRESS, FONT_START_ADDRESS, MEMORY_SIZE, ROM_START_ADDRESS};

/// 4KB of byte-addressable memory with checked access.
///
/// Every accessor resolves the address against `[0, MEMORY_SIZE)` and
/// reports `MemoryOutOfBounds` instead of wrapping.
pub struct Memory {
    bytes: [u8; MEMORY_SIZE],
}

impl Memory {
    /// Zeroed memory with the hex font loaded at [`FONT_START_ADDRESS`].
    pub fn new() -> Self {
        let mut bytes = [0; MEMORY_SIZE];
        bytes[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);
        Self { bytes }
    }

    pub fn get(&self, addr: usize) -> Result<u8, Chip8Error> {
        self.bytes
            .get(addr)
            .copied()
            .ok_or(Chip8Error::MemoryOutOfBounds { address: addr })
    }

    pub fn set(&mut self, addr: usize, value: u8) -> Result<(), Chip8Error> {
        let byte = self
            .bytes
            .get_mut(addr)
            .ok_or(Chip8Error::MemoryOutOfBounds { address: addr })?;
        *byte = value;
        Ok(())
    }

    /// Borrows `len` contiguous bytes starting at `addr`.
    ///
    /// The reported address on failure is the first one outside memory.
    pub fn slice(&self, addr: usize, len: usize) -> Result<&[u8], Chip8Error> {
        let end = addr.saturating_add(len);
        self.bytes
            .get(addr..end)
            .ok_or(Chip8Error::MemoryOutOfBounds {
                address: addr.max(MEMORY_SIZE),
            })
    }

    pub fn slice_mut(&mut self, addr: usize, len: usize) -> Result<&mut [u8], Chip8Error> {
        let end = addr.saturating_add(len);
        self.bytes
            .get_mut(addr..end)
            .ok_or(Chip8Error::MemoryOutOfBounds {
                address: addr.max(MEMORY_SIZE),
            })
    }

    /// Reads the big-endian word at `addr`.
    pub fn read_word(&self, addr: usize) -> Result<u16, Chip8Error> {
        let high = self.get(addr)?;
        let low = self.get(addr.wrapping_add(1))?;

        Ok(u16::from_be_bytes([high, low]))
    }

    /// Copies a program image to [`ROM_START_ADDRESS`].
    pub fn load_program(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        let rom_end = ROM_START_ADDRESS + rom.len();
        self.bytes
            .get_mut(ROM_START_ADDRESS..rom_end)
            .ok_or(Chip8Error::RomLoadError {
                size: rom.len(),
                max_size: MEMORY_SIZE - ROM_START_ADDRESS,
            })?
            .copy_from_slice(rom);

        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_is_loaded_at_zero() {
        let memory = Memory::new();
        assert_eq!(&memory.as_slice()[..80], &FONT[..]);
        assert_eq!(memory.get(0).unwrap(), 0xF0);
        assert_eq!(memory.get(79).unwrap(), 0x80);
        assert_eq!(memory.get(80).unwrap(), 0x00);
    }

    #[test]
    fn out_of_range_access_is_an_error() {
        let mut memory = Memory::new();
        assert_eq!(
            memory.get(MEMORY_SIZE),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1000 })
        );
        assert_eq!(
            memory.set(0x1234, 1),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1234 })
        );
        assert!(memory.set(MEMORY_SIZE - 1, 1).is_ok());
    }

    #[test]
    fn slice_rejects_ranges_crossing_the_end() {
        let memory = Memory::new();
        assert_eq!(memory.slice(MEMORY_SIZE - 2, 2).unwrap().len(), 2);
        assert_eq!(
            memory.slice(MEMORY_SIZE - 2, 3),
            Err(Chip8Error::MemoryOutOfBounds { address: MEMORY_SIZE })
        );
    }

    #[test]
    fn read_word_is_big_endian() {
        let mut memory = Memory::new();
        memory.set(0x300, 0x12).unwrap();
        memory.set(0x301, 0x34).unwrap();
        assert_eq!(memory.read_word(0x300).unwrap(), 0x1234);
        assert!(memory.read_word(MEMORY_SIZE - 1).is_err());
    }

    #[test]
    fn load_program_fills_from_load_offset() {
        let mut memory = Memory::new();
        memory.load_program(&[0xAA, 0xBB]).unwrap();
        assert_eq!(memory.get(ROM_START_ADDRESS).unwrap(), 0xAA);
        assert_eq!(memory.get(ROM_START_ADDRESS + 1).unwrap(), 0xBB);

        let max = MEMORY_SIZE - ROM_START_ADDRESS;
        assert!(memory.load_program(&vec![0; max]).is_ok());
        assert_eq!(
            memory.load_program(&vec![0; max + 1]),
            Err(Chip8Error::RomLoadError {
                size: max + 1,
                max_size: max
            })
        );
    }
}
