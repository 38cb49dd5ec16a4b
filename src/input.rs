/*
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! Input handling for the CHIP-8 interpreter.
//!
//! The keypad has sixteen keys, `0`-`F`.  The host writes the key-down
//! state through `press`/`release` (or `set_key`); the interpreter reads it
//! when executing the key-test and key-wait instructions.

use std::default::Default;

use num::traits::FromPrimitive;

/// The number of keys on the CHIP-8 keypad.
const N_KEYS: usize = 16;

enum_from_primitive! {
/// The keys on the CHIP-8 keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    K0 = 0,
    K1,
    K2,
    K3,
    K4,
    K5,
    K6,
    K7,
    K8,
    K9,
    KA,
    KB,
    KC,
    KD,
    KE,
    KF,
}
}

impl Key {
    /// Returns the key corresponding to the lowest four bits of the given
    /// byte.
    pub fn from_byte(b: u8) -> Key {
        Key::from_u8(b % N_KEYS as u8).unwrap()
    }
}

/// Represents the state of the keypad.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    /// The key states (`true` means "pressed").
    keys: [bool; N_KEYS],
}

impl State {
    /// Returns a new input state with all keys unpressed.
    pub fn new() -> Self {
        State::default()
    }

    /// Marks the given key as pressed.
    pub fn press(&mut self, key: Key) {
        self.keys[key as usize] = true;
    }

    /// Marks the given key as released.
    pub fn release(&mut self, key: Key) {
        self.keys[key as usize] = false;
    }

    /// Sets the state of the key with the given index; indices outside
    /// `0..16` are ignored.
    pub fn set_key(&mut self, index: u8, down: bool) {
        if let Some(key) = Key::from_u8(index) {
            self.keys[key as usize] = down;
        }
    }

    /// Returns whether the given key is pressed.
    pub fn is_pressed(&self, key: Key) -> bool {
        self.keys[key as usize]
    }

    /// Returns the pressed key, scanning the keypad in index order so that
    /// the highest-indexed key wins when several are down.
    pub fn last_pressed(&self) -> Option<Key> {
        let mut pressed = None;
        for (i, &down) in self.keys.iter().enumerate() {
            if down {
                pressed = Some(Key::from_usize(i).unwrap());
            }
        }
        pressed
    }
}
