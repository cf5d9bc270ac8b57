use super::{Chip8Error, DISPLAY_X, DISPLAY_Y};

/// 64x32 monochrome framebuffer.
///
/// Pixels change only through [`Display::clear`], [`Display::set`] and
/// XOR sprite composition in [`Display::draw_sprite`].
#[derive(Clone, PartialEq, Eq)]
pub struct Display {
    pixels: [[bool; DISPLAY_X]; DISPLAY_Y],
}

impl Display {
    pub fn new() -> Self {
        Self {
            pixels: [[false; DISPLAY_X]; DISPLAY_Y],
        }
    }

    pub fn clear(&mut self) {
        self.pixels = [[false; DISPLAY_X]; DISPLAY_Y];
    }

    pub fn set(&mut self, x: usize, y: usize) -> Result<(), Chip8Error> {
        *self.pixel_mut(x, y)? = true;
        Ok(())
    }

    pub fn is_set(&self, x: usize, y: usize) -> Result<bool, Chip8Error> {
        self.pixels
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .ok_or(Chip8Error::PixelOutOfBounds { x, y })
    }

    /// XORs `rows` onto the framebuffer with its top-left corner at (x, y).
    ///
    /// Each byte is one 8-pixel row, most significant bit leftmost. Pixels
    /// falling past an edge wrap around to the opposite edge. Returns true
    /// if any pixel that was on got turned off.
    pub fn draw_sprite(&mut self, x: usize, y: usize, rows: &[u8]) -> bool {
        let (x, y) = (x % DISPLAY_X, y % DISPLAY_Y);
        let mut collision = false;

        for (row, sprite_byte) in rows.iter().enumerate() {
            let py = (y + row) % DISPLAY_Y;

            for col in 0..8 {
                if sprite_byte & (0x80 >> col) == 0 {
                    continue;
                }

                let pixel = &mut self.pixels[py][(x + col) % DISPLAY_X];
                collision |= *pixel;
                *pixel ^= true;
            }
        }

        collision
    }

    /// Rows of the framebuffer, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[bool; DISPLAY_X]> {
        self.pixels.iter()
    }

    pub fn lit_count(&self) -> usize {
        self.pixels.iter().flatten().filter(|&&p| p).count()
    }

    /// Renders the framebuffer as text, `#` for on and `.` for off.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity((DISPLAY_X + 1) * DISPLAY_Y);
        for row in self.rows() {
            out.extend(row.iter().map(|&p| if p { '#' } else { '.' }));
            out.push('\n');
        }
        out
    }

    fn pixel_mut(&mut self, x: usize, y: usize) -> Result<&mut bool, Chip8Error> {
        self.pixels
            .get_mut(y)
            .and_then(|row| row.get_mut(x))
            .ok_or(Chip8Error::PixelOutOfBounds { x, y })
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_text())
    }
}
