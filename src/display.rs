/*
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The CHIP-8 framebuffer.
//!
//! The interpreter never renders anything itself; it draws into a `Buffer`
//! and records that the buffer changed.  The front-end observes the dirty
//! flag, draws the pixel data to whatever user-facing surface it manages and
//! acknowledges the frame, which decouples the interpreter's cycle rate from
//! the display refresh rate.

use std::default::Default;

use failure::Fail;

/// The width of the display, in pixels.
pub const WIDTH: usize = 64;
/// The height of the display, in pixels.
pub const HEIGHT: usize = 32;

/// The height of a hex digit sprite.
pub const FONT_HEIGHT: usize = 5;

/// The hex digit sprites, one per digit `0`-`F`.
pub const FONT_SPRITES: [[u8; FONT_HEIGHT]; 16] = [
    [0xF0, 0x90, 0x90, 0x90, 0xF0],
    [0x20, 0x60, 0x20, 0x20, 0x70],
    [0xF0, 0x10, 0xF0, 0x80, 0xF0],
    [0xF0, 0x10, 0xF0, 0x10, 0xF0],
    [0x90, 0x90, 0xF0, 0x10, 0x10],
    [0xF0, 0x80, 0xF0, 0x10, 0xF0],
    [0xF0, 0x80, 0xF0, 0x90, 0xF0],
    [0xF0, 0x10, 0x20, 0x40, 0x40],
    [0xF0, 0x90, 0xF0, 0x90, 0xF0],
    [0xF0, 0x90, 0xF0, 0x10, 0xF0],
    [0xF0, 0x90, 0xF0, 0x90, 0x90],
    [0xE0, 0x90, 0xE0, 0x90, 0xE0],
    [0xF0, 0x80, 0x80, 0x80, 0xF0],
    [0xE0, 0x90, 0x90, 0x90, 0xE0],
    [0xF0, 0x80, 0xF0, 0x80, 0xF0],
    [0xF0, 0x80, 0xF0, 0x80, 0x80],
];

/// A CHIP-8 display buffer.
///
/// Pixels are stored row-major as bytes holding 0 or 1, matching the layout
/// front-ends want for blitting.  Sprite draws XOR eight-pixel-wide rows
/// into the buffer and report collisions; pixels that fall outside the
/// buffer are clipped, not wrapped.
pub struct Buffer {
    /// The underlying pixel data.
    data: [u8; WIDTH * HEIGHT],
    /// Whether the buffer has changed since the last acknowledgement.
    dirty: bool,
}

impl Buffer {
    /// Returns a new display buffer with all pixels clear.
    pub fn new() -> Self {
        Buffer {
            data: [0; WIDTH * HEIGHT],
            dirty: true,
        }
    }

    /// Clears the display.
    pub fn clear(&mut self) {
        for pixel in self.data.iter_mut() {
            *pixel = 0;
        }
        self.dirty = true;
    }

    /// Returns a reference to the underlying pixel data, row-major.
    pub fn data(&self) -> &[u8; WIDTH * HEIGHT] {
        &self.data
    }

    /// Returns the state of the given pixel (0 or 1).
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.data[y * WIDTH + x]
    }

    /// Draws the given sprite at the given position, one byte per
    /// eight-pixel row.
    ///
    /// Returns whether any pixel was flipped from set to clear.
    pub fn draw_sprite(&mut self, sprite: &[u8], x: usize, y: usize) -> bool {
        let mut collision = false;

        for (row, &bits) in sprite.iter().enumerate() {
            for col in 0..8 {
                if bits & (0x80 >> col) != 0 {
                    if self.toggle(x + col, y + row) {
                        collision = true;
                    }
                }
            }
        }
        self.dirty = true;

        collision
    }

    /// Returns whether the buffer has changed since the last
    /// acknowledgement.
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Acknowledges the current contents of the buffer, clearing the dirty
    /// flag.
    pub fn acknowledge(&mut self) {
        self.dirty = false;
    }

    /// Forces a refresh on the next call to `refresh`, even if no draw
    /// operation has been performed.
    pub fn force_refresh(&mut self) {
        self.dirty = true;
    }

    /// Refreshes the display using the given refresh function.
    ///
    /// If the buffer is not dirty, nothing is done.  The refresh function
    /// receives a snapshot of the buffer and should draw it to whatever
    /// user-facing surface is being used; the frame is acknowledged once it
    /// returns successfully.
    pub fn refresh<F, E>(&mut self, f: F) -> Result<(), E>
    where
        F: FnOnce(&Self) -> Result<(), E>,
        E: Fail,
    {
        if self.dirty {
            f(self)?;
            self.dirty = false;
        }
        Ok(())
    }

    /// Flips the on/off state of the given pixel, returning whether it was
    /// flipped off from the on state.  Out-of-bounds positions are ignored.
    fn toggle(&mut self, x: usize, y: usize) -> bool {
        if x < WIDTH && y < HEIGHT {
            let old = self.data[y * WIDTH + x];
            self.data[y * WIDTH + x] ^= 1;

            old == 1
        } else {
            false
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new()
    }
}
