/*
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! A CHIP-8 virtual machine.
//!
//! The heart of the crate is the `Interpreter` struct in the `interpreter`
//! module, which owns the complete machine state (memory, registers, call
//! stack, timers, framebuffer and keypad) and exposes the entry points a
//! front-end needs: loading a ROM, stepping one instruction at a time,
//! ticking the timers and observing the display and sound state.  Opcodes
//! are decoded into the `Instruction` type before execution, so the decoder
//! can be tested on its own and the dispatcher only ever sees well-formed
//! instructions.

#[macro_use]
extern crate enum_primitive;
extern crate failure;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;
extern crate num;
extern crate rand;

/// The size of the CHIP-8's memory, in bytes.
pub const MEM_SIZE: usize = 0x1000;
/// The address where programs are loaded and where execution begins.
pub const PROG_START: usize = 0x200;
/// The maximum size of a CHIP-8 program, in bytes.
pub const PROG_SIZE: usize = MEM_SIZE - PROG_START;

pub mod display;
pub mod input;
pub mod instruction;
pub mod interpreter;

pub use input::Key;
pub use instruction::{Address, Instruction, InvalidOpcodeError, Opcode, Register};
pub use interpreter::{Interpreter, Options, SoundTrigger};
