/*
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The CHIP-8 interpreter.
//!
//! The main focus of this module is the `Interpreter` struct, which owns the
//! entire machine state and provides the interface used by the front-end:
//! `load_rom`/`load_program` and `reset` for the program lifecycle, `step`
//! for one fetch-decode-execute cycle, `tick_timers` for the 60 Hz countdown
//! timers and accessors for the display, keypad and registers.  The
//! interpreter never renders or makes sound itself; it marks the display
//! buffer dirty and reports the sound state for the host to act on.
//!
//! Timer cadence is decoupled from the instruction rate: the host is
//! expected to call `tick_timers` once every N executed instructions, with N
//! chosen so the timers decrement at 60 Hz for whatever instruction rate the
//! host runs at.

use std::default::Default;
use std::io::Read;
use std::num::Wrapping;
use std::u8;

use failure::{Error, ResultExt};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use MEM_SIZE;
use PROG_SIZE;
use PROG_START;
use display::{self, FONT_HEIGHT, FONT_SPRITES};
use input::{self, Key};
use instruction::{Address, Instruction, Opcode, Register};

/// The location of the hex digit sprites in memory.
const FONT_START: usize = 0x0;
/// The number of return addresses the call stack can hold.
const STACK_SIZE: usize = 16;

/// An error resulting from a bad `RET` instruction.
#[derive(Debug, Fail)]
#[fail(display = "no subroutine to return from")]
pub struct NotInSubroutineError;

/// An error resulting from a `CALL` instruction with no stack slot left.
#[derive(Debug, Fail)]
#[fail(display = "call stack overflowed")]
pub struct CallStackOverflowError;

/// An error resulting from an input program being too large.
#[derive(Debug, Fail)]
#[fail(display = "input program is too large")]
pub struct ProgramTooLargeError;

/// The sound state derived from the sound timer.
///
/// This is level-triggered: every timer tick re-derives the state from the
/// sound timer, so the host can apply it to its audio device without
/// tracking edges itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundTrigger {
    /// The buzzer should be sounding.
    Play,
    /// The buzzer should be silent.
    Stop,
    /// The timers have not ticked since power-on or reset.
    None,
}

/// Options for the interpreter.
pub struct Options {
    /// The seed for the random number generator, or `None` to seed from
    /// system entropy (default `None`).
    pub rng_seed: Option<u64>,
}

impl Options {
    /// Returns the default set of options.
    pub fn new() -> Self {
        Options { rng_seed: None }
    }

    /// Returns a set of options useful for testing (a fixed RNG seed).
    pub fn testing() -> Self {
        Options {
            rng_seed: Some(0xC8_1D),
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::new()
    }
}

/// A CHIP-8 interpreter.
///
/// This struct contains the entire state of a CHIP-8 machine and provides
/// all the expected methods for interacting with it, such as stepping
/// through execution and inspecting the internal state.  State is owned
/// exclusively by the interpreter; the host mutates it only through the
/// keypad and the load/reset entry points.
pub struct Interpreter {
    /// The internal memory.
    mem: [u8; MEM_SIZE],
    /// The display buffer.
    display: display::Buffer,
    /// The keypad state.
    input: input::State,
    /// The general-purpose registers `V0`-`VF`.
    regs: [Wrapping<u8>; 16],
    /// The special register `I`.
    reg_i: Address,
    /// The delay timer.
    reg_dt: u8,
    /// The sound timer.
    reg_st: u8,
    /// The program counter.
    pc: Address,
    /// The call stack (for returning from subroutines).
    stack: [Address; STACK_SIZE],
    /// The index of the next free stack slot.
    sp: usize,
    /// The sound state as of the last timer tick.
    sound: SoundTrigger,
    /// The random number generator backing the `RND` instruction.
    rng: SmallRng,
}

impl Interpreter {
    /// Returns a new interpreter with the default options.
    pub fn new() -> Self {
        Interpreter::with_options(Options::default())
    }

    /// Returns a new interpreter using the given options.
    pub fn with_options(options: Options) -> Self {
        let mut interpreter = Interpreter {
            mem: [0; MEM_SIZE],
            display: display::Buffer::new(),
            input: input::State::new(),
            regs: [Wrapping(0); 16],
            reg_i: Address::new(0),
            reg_dt: 0,
            reg_st: 0,
            pc: Address::new(PROG_START),
            stack: [Address::new(0); STACK_SIZE],
            sp: 0,
            sound: SoundTrigger::None,
            rng: match options.rng_seed {
                Some(seed) => SmallRng::seed_from_u64(seed),
                None => SmallRng::from_entropy(),
            },
        };
        interpreter.seed_font();

        interpreter
    }

    /// Reinitializes the machine to its power-on state.
    ///
    /// Program bytes beyond the reset vector are kept, so the loaded
    /// program can be restarted; everything else (registers, timers, call
    /// stack, display) is cleared and the font is re-seeded.
    pub fn reset(&mut self) {
        self.regs = [Wrapping(0); 16];
        self.reg_i = Address::new(0);
        self.reg_dt = 0;
        self.reg_st = 0;
        self.pc = Address::new(PROG_START);
        self.stack = [Address::new(0); STACK_SIZE];
        self.sp = 0;
        self.sound = SoundTrigger::None;
        self.display.clear();
        self.seed_font();
    }

    /// Loads the given ROM image into memory.
    ///
    /// Memory is fully reinitialized (font re-seeded, program region zeroed
    /// and overwritten) and the machine is reset, so no partial-load state
    /// is ever observable.  On failure the previous machine state is left
    /// untouched.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), Error> {
        if rom.len() > PROG_SIZE {
            return Err(ProgramTooLargeError.into());
        }

        for b in self.mem.iter_mut() {
            *b = 0;
        }
        self.seed_font();
        self.mem[PROG_START..PROG_START + rom.len()].copy_from_slice(rom);
        self.reset();

        Ok(())
    }

    /// Loads a ROM image from the specified source.
    ///
    /// Host-side read failures are surfaced with context; they do not
    /// affect the machine state.
    pub fn load_program<R: Read>(&mut self, input: &mut R) -> Result<(), Error> {
        let mut rom = Vec::new();
        input
            .read_to_end(&mut rom)
            .context("could not read program")?;
        self.load_rom(&rom)
    }

    /// Returns a reference to the display buffer.
    pub fn display(&self) -> &display::Buffer {
        &self.display
    }

    /// Returns a mutable reference to the display buffer.
    pub fn display_mut(&mut self) -> &mut display::Buffer {
        &mut self.display
    }

    /// Returns a reference to the keypad state.
    pub fn input(&self) -> &input::State {
        &self.input
    }

    /// Returns a mutable reference to the keypad state.
    pub fn input_mut(&mut self) -> &mut input::State {
        &mut self.input
    }

    /// Returns a reference to the internal memory.
    pub fn mem(&self) -> &[u8; MEM_SIZE] {
        &self.mem
    }

    /// Returns the value of register `I`.
    pub fn i(&self) -> Address {
        self.reg_i
    }

    /// Sets the value of register `I`.
    pub fn set_i(&mut self, val: Address) {
        self.reg_i = val;
    }

    /// Returns the value of the delay timer.
    pub fn dt(&self) -> u8 {
        self.reg_dt
    }

    /// Sets the value of the delay timer.
    pub fn set_dt(&mut self, val: u8) {
        self.reg_dt = val;
    }

    /// Returns the value of the sound timer.
    pub fn st(&self) -> u8 {
        self.reg_st
    }

    /// Sets the value of the sound timer.
    pub fn set_st(&mut self, val: u8) {
        self.reg_st = val;
    }

    /// Returns the value in the given register.
    pub fn register(&self, reg: Register) -> u8 {
        self.regs[reg as usize].0
    }

    /// Sets the given register to the given value.
    pub fn set_register(&mut self, reg: Register, val: u8) {
        self.regs[reg as usize].0 = val
    }

    /// Returns the value of the program counter.
    pub fn pc(&self) -> Address {
        self.pc
    }

    /// Returns the sound state as of the last timer tick.
    pub fn sound_trigger(&self) -> SoundTrigger {
        self.sound
    }

    /// Returns the instruction at the program counter.
    pub fn current_instruction(&self) -> Result<Instruction, Error> {
        Instruction::from_opcode(self.current_opcode())
    }

    /// Returns the opcode at the program counter.
    pub fn current_opcode(&self) -> Opcode {
        Opcode(self.read_word(self.pc.addr()))
    }

    /// Performs a single fetch-decode-execute cycle.
    ///
    /// The program counter advances past the fetched instruction before it
    /// executes, matching the hardware convention: jumps and calls simply
    /// overwrite the program counter, skips add another instruction's worth
    /// and the key-wait instruction steps it back to retry.  A decode
    /// failure leaves the machine state untouched.
    pub fn step(&mut self) -> Result<(), Error> {
        let ins = self.current_instruction()?;
        self.pc = self.pc + 2;
        self.execute(ins)
    }

    /// Decrements the delay and sound timers, flooring at zero, and returns
    /// the resulting sound state.
    ///
    /// The host should call this at 60 Hz relative to its chosen
    /// instruction rate and forward the returned trigger to its audio
    /// device; the trigger is re-derived on every tick.
    pub fn tick_timers(&mut self) -> SoundTrigger {
        self.reg_dt = self.reg_dt.saturating_sub(1);
        self.reg_st = self.reg_st.saturating_sub(1);
        self.sound = if self.reg_st > 0 {
            SoundTrigger::Play
        } else {
            SoundTrigger::Stop
        };

        self.sound
    }

    /// Executes the given instruction in the current interpreter context.
    ///
    /// The interpreter behaves as if the program counter had already
    /// advanced past the given instruction, which is the state `step`
    /// establishes before executing.
    pub fn execute(&mut self, ins: Instruction) -> Result<(), Error> {
        use self::Instruction::*;

        match ins {
            Sys(addr) => warn!("ignoring machine subroutine call to {}", addr),
            Cls => self.display.clear(),
            Ret => {
                self.pc = self.pop()
                    .with_context(|_| format!("error executing {}", ins))?;
            }
            Jp(addr) => self.pc = addr,
            Call(addr) => {
                self.push(self.pc)
                    .with_context(|_| format!("error executing {}", ins))?;
                self.pc = addr;
            }
            SeByte(reg, b) => if self.register(reg) == b {
                self.skip();
            },
            SneByte(reg, b) => if self.register(reg) != b {
                self.skip();
            },
            SeReg(reg1, reg2) => if self.register(reg1) == self.register(reg2) {
                self.skip();
            },
            LdByte(reg, b) => self.set_register(reg, b),
            AddByte(reg, b) => self.regs[reg as usize] += Wrapping(b),
            LdReg(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.set_register(reg1, r2);
            }
            Or(reg1, reg2) => {
                let r1 = self.register(reg1);
                let r2 = self.register(reg2);
                self.set_register(reg1, r1 | r2);
            }
            And(reg1, reg2) => {
                let r1 = self.register(reg1);
                let r2 = self.register(reg2);
                self.set_register(reg1, r1 & r2);
            }
            Xor(reg1, reg2) => {
                let r1 = self.register(reg1);
                let r2 = self.register(reg2);
                self.set_register(reg1, r1 ^ r2);
            }
            AddReg(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.add(reg1, r2);
            }
            Sub(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.sub(reg1, r2);
            }
            Shr(reg) => self.shr(reg),
            Subn(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.subn(reg1, r2);
            }
            Shl(reg) => self.shl(reg),
            SneReg(reg1, reg2) => if self.register(reg1) != self.register(reg2) {
                self.skip();
            },
            LdI(addr) => self.reg_i = addr,
            JpV0(addr) => self.pc = addr + self.register(Register::V0) as usize,
            Rnd(reg, b) => {
                let r: u8 = self.rng.gen();
                self.set_register(reg, r & b);
            }
            Drw(reg1, reg2, n) => self.drw(reg1, reg2, n),
            Skp(reg) => if self.input.is_pressed(Key::from_byte(self.register(reg))) {
                self.skip();
            },
            Sknp(reg) => if !self.input.is_pressed(Key::from_byte(self.register(reg))) {
                self.skip();
            },
            LdRegDt(reg) => {
                let dt = self.dt();
                self.set_register(reg, dt);
            }
            LdKey(reg) => match self.input.last_pressed() {
                Some(key) => self.set_register(reg, key as u8),
                // Step back so the same instruction is fetched again next
                // cycle; this is cooperative polling, not a blocking call.
                None => self.pc = Address::new(self.pc.addr().wrapping_sub(2)),
            },
            LdDtReg(reg) => {
                let r = self.register(reg);
                self.set_dt(r);
            }
            LdSt(reg) => {
                let r = self.register(reg);
                self.set_st(r);
            }
            AddI(reg) => {
                let sum = self.i().addr() + self.register(reg) as usize;
                self.set_register(Register::VF, (sum >= MEM_SIZE) as u8);
                self.set_i(Address::new(sum));
            }
            LdF(reg) => {
                let glyph = self.register(reg) as usize;
                self.set_i(Address::new(FONT_START + FONT_HEIGHT * glyph));
            }
            LdB(reg) => self.ld_b(reg),
            LdDerefIReg(reg) => self.ld_deref_i_reg(reg),
            LdRegDerefI(reg) => self.ld_reg_deref_i(reg),
        }

        Ok(())
    }

    /// Copies the hex digit sprites into the reserved region of memory.
    fn seed_font(&mut self) {
        for (i, sprite) in FONT_SPRITES.iter().enumerate() {
            let start = FONT_START + i * FONT_HEIGHT;
            self.mem[start..start + FONT_HEIGHT].copy_from_slice(sprite);
        }
    }

    /// Reads the byte at the given address, masked into the address space.
    fn read(&self, addr: usize) -> u8 {
        self.mem[addr & (MEM_SIZE - 1)]
    }

    /// Reads the big-endian word at the given address.
    fn read_word(&self, addr: usize) -> u16 {
        (self.read(addr) as u16) << 8 | self.read(addr + 1) as u16
    }

    /// Writes the byte at the given address, masked into the address space.
    fn write(&mut self, addr: usize, val: u8) {
        self.mem[addr & (MEM_SIZE - 1)] = val;
    }

    /// Advances the program counter past the next instruction.
    fn skip(&mut self) {
        self.pc = self.pc + 2;
    }

    /// Pushes a return address onto the call stack.
    fn push(&mut self, addr: Address) -> Result<(), CallStackOverflowError> {
        if self.sp == STACK_SIZE {
            Err(CallStackOverflowError)
        } else {
            self.stack[self.sp] = addr;
            self.sp += 1;
            Ok(())
        }
    }

    /// Pops a return address off the call stack.
    fn pop(&mut self) -> Result<Address, NotInSubroutineError> {
        if self.sp == 0 {
            Err(NotInSubroutineError)
        } else {
            self.sp -= 1;
            Ok(self.stack[self.sp])
        }
    }

    /// Adds the given byte to the given register, setting `VF` to 1 on
    /// carry or 0 otherwise.
    fn add(&mut self, reg: Register, val: u8) {
        let carry = val > u8::MAX - self.register(reg);
        self.regs[reg as usize] += Wrapping(val);
        self.set_register(Register::VF, carry as u8);
    }

    /// Subtracts the given byte from the given register, setting `VF` to 0
    /// on borrow or 1 otherwise.
    fn sub(&mut self, reg: Register, val: u8) {
        let borrow = val > self.register(reg);
        self.regs[reg as usize] -= Wrapping(val);
        self.set_register(Register::VF, !borrow as u8);
    }

    /// Sets `reg` to `val - reg`, setting `VF` to 0 on borrow or 1
    /// otherwise.
    fn subn(&mut self, reg: Register, val: u8) {
        let borrow = self.register(reg) > val;
        self.regs[reg as usize] = Wrapping(val) - self.regs[reg as usize];
        self.set_register(Register::VF, !borrow as u8);
    }

    /// Shifts the given register right by one, setting `VF` to the old
    /// lowest bit.
    fn shr(&mut self, reg: Register) {
        let old = self.register(reg) & 1;
        let r = self.register(reg);
        self.set_register(reg, r >> 1);
        self.set_register(Register::VF, old);
    }

    /// Shifts the given register left by one, setting `VF` to the old
    /// highest bit.
    fn shl(&mut self, reg: Register) {
        let old = self.register(reg) >> 7;
        let r = self.register(reg);
        self.set_register(reg, r << 1);
        self.set_register(Register::VF, old);
    }

    /// Implements the `DRW` operation.
    ///
    /// `VF` is set to 1 if any pixel was erased by the XOR blit, or 0
    /// otherwise.
    fn drw(&mut self, reg1: Register, reg2: Register, n: u8) {
        let start = self.reg_i.addr();
        let end = if start + n as usize > MEM_SIZE {
            MEM_SIZE
        } else {
            start + n as usize
        };
        let x = self.register(reg1) as usize;
        let y = self.register(reg2) as usize;

        let collision = self.display.draw_sprite(&self.mem[start..end], x, y);
        self.set_register(Register::VF, collision as u8);
    }

    /// Implements the `LD B, Vx` operation.
    fn ld_b(&mut self, reg: Register) {
        let val = self.register(reg);
        let addr = self.i().addr();

        self.write(addr, val / 100);
        self.write(addr + 1, val % 100 / 10);
        self.write(addr + 2, val % 10);
    }

    /// Implements the `LD [I], Vx` operation; `I` itself is left unchanged.
    fn ld_deref_i_reg(&mut self, reg: Register) {
        let start = self.i().addr();

        for offset in 0..reg as usize + 1 {
            let val = self.regs[offset].0;
            self.write(start + offset, val);
        }
    }

    /// Implements the `LD Vx, [I]` operation; `I` itself is left unchanged.
    fn ld_reg_deref_i(&mut self, reg: Register) {
        let start = self.i().addr();

        for offset in 0..reg as usize + 1 {
            self.regs[offset] = Wrapping(self.read(start + offset));
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

#[cfg(test)]
mod tests {
    use std::u8;

    use num::traits::FromPrimitive;

    use PROG_SIZE;
    use input::Key;
    use instruction::{Address, Instruction, Register};
    use interpreter::{Interpreter, Options, SoundTrigger};

    /// Tests the `ADD Vx, Vy` operation and its carry flag.
    #[test]
    fn instruction_add_reg() {
        use Register::*;

        // Test cases, in the format (Vx, Vy, b1, b2).
        let cases = [
            (V0, V1, 24u8, 67u8),
            (V5, VD, 54u8, 102u8),
            (V7, VE, 255u8, 255u8),
            (V2, V4, 1u8, 255u8),
            (V5, V6, 0u8, 78u8),
        ];
        let mut interpreter = Interpreter::with_options(Options::testing());

        for &(vx, vy, b1, b2) in cases.iter() {
            let case = (vx, vy, b1, b2);
            let sum = b1.wrapping_add(b2);
            let carry = b1 as u32 + b2 as u32 > u8::MAX as u32;

            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::AddReg(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), sum, "case {:?}", case);
            assert_eq!(interpreter.register(VF), carry as u8, "case {:?}", case);
        }
    }

    /// Tests that `ADD Vx, byte` wraps without touching `VF`.
    #[test]
    fn instruction_add_byte_no_flag() {
        use Register::*;

        let mut interpreter = Interpreter::with_options(Options::testing());

        interpreter.set_register(VF, 0xA5);
        interpreter.set_register(V3, 0xFF);
        interpreter.execute(Instruction::AddByte(V3, 0x02)).unwrap();
        assert_eq!(interpreter.register(V3), 0x01);
        assert_eq!(interpreter.register(VF), 0xA5);
    }

    /// Tests the `AND`, `OR` and `XOR` operations.
    #[test]
    fn instruction_bitwise() {
        use Register::*;

        // Test cases, in the format (Vx, Vy, b1, b2).
        let cases = [
            (V7, V2, 0x75, 0xF2),
            (V3, V8, 0x01, 0xFF),
            (VA, VE, 0x6A, 0x32),
            (V4, VC, 0x78, 0xFD),
            (V0, V1, 0xF0, 0x0F),
        ];
        let mut interpreter = Interpreter::with_options(Options::testing());

        for &(vx, vy, b1, b2) in cases.iter() {
            let case = (vx, vy, b1, b2);

            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::Or(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), b1 | b2, "case {:?}", case);

            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::And(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), b1 & b2, "case {:?}", case);

            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::Xor(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), b1 ^ b2, "case {:?}", case);
        }
    }

    /// Tests the `SUB` and `SUBN` operations and their borrow flags.
    #[test]
    fn instruction_sub() {
        use Register::*;

        // Test cases, in the format (Vx, Vy, b1, b2).
        let cases = [
            (V9, V8, 70u8, 35u8),
            (V6, V2, 56u8, 2u8),
            (V0, V1, 0u8, 0u8),
            (VE, VA, 255u8, 255u8),
            (V3, V7, 1u8, 255u8),
            (V4, V5, 5u8, 3u8),
        ];
        let mut interpreter = Interpreter::with_options(Options::testing());

        for &(vx, vy, b1, b2) in cases.iter() {
            let case = (vx, vy, b1, b2);
            let borrow = b2 > b1;
            let borrown = b1 > b2;

            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::Sub(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), b1.wrapping_sub(b2), "case {:?}", case);
            assert_eq!(interpreter.register(VF), !borrow as u8, "case {:?}", case);

            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::Subn(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), b2.wrapping_sub(b1), "case {:?}", case);
            assert_eq!(interpreter.register(VF), !borrown as u8, "case {:?}", case);
        }
    }

    /// Tests the `SHR` and `SHL` operations and their bit flags.
    #[test]
    fn instruction_shift() {
        use Register::*;

        let mut interpreter = Interpreter::with_options(Options::testing());

        interpreter.set_register(V1, 0b1000_0101);
        interpreter.execute(Instruction::Shr(V1)).unwrap();
        assert_eq!(interpreter.register(V1), 0b0100_0010);
        assert_eq!(interpreter.register(VF), 1);

        interpreter.execute(Instruction::Shr(V1)).unwrap();
        assert_eq!(interpreter.register(V1), 0b0010_0001);
        assert_eq!(interpreter.register(VF), 0);

        interpreter.set_register(V2, 0b1000_0101);
        interpreter.execute(Instruction::Shl(V2)).unwrap();
        assert_eq!(interpreter.register(V2), 0b0000_1010);
        assert_eq!(interpreter.register(VF), 1);

        interpreter.execute(Instruction::Shl(V2)).unwrap();
        assert_eq!(interpreter.register(V2), 0b0001_0100);
        assert_eq!(interpreter.register(VF), 0);
    }

    /// Tests the `LD B, Vx` operation.
    #[test]
    fn instruction_ld_b() {
        use Register::*;

        // Test cases, in the format (Vx, n1, n2, n3), where the three
        // digits to be stored are n1, n2 and n3 (in that order).
        let cases = [
            (V5, 1, 2, 3),
            (VD, 0, 0, 1),
            (VE, 1, 0, 0),
            (V2, 2, 5, 5),
            (V6, 0, 0, 0),
            (V8, 0, 6, 4),
        ];
        let mut interpreter = Interpreter::with_options(Options::testing());
        interpreter.set_i(Address::new(0x500));

        for &(vx, n1, n2, n3) in cases.iter() {
            let case = (vx, n1, n2, n3);
            let n = 100 * n1 + 10 * n2 + n3;

            interpreter.set_register(vx, n);
            interpreter.execute(Instruction::LdB(vx)).unwrap();
            let i = interpreter.i().addr();
            assert_eq!(interpreter.mem()[i], n1, "case {:?}", case);
            assert_eq!(interpreter.mem()[i + 1], n2, "case {:?}", case);
            assert_eq!(interpreter.mem()[i + 2], n3, "case {:?}", case);
        }
    }

    /// Tests the `LD [I], Vx` and `LD Vx, [I]` operations: the copy is
    /// inclusive of `Vx` and `I` is left unchanged.
    #[test]
    fn instruction_load_store_registers() {
        use Register::*;

        let mut interpreter = Interpreter::with_options(Options::testing());
        let values = [0x12u8, 0x34, 0x56, 0x78];

        for (i, &val) in values.iter().enumerate() {
            interpreter.set_register(Register::from_usize(i).unwrap(), val);
        }
        interpreter.set_i(Address::new(0x300));
        interpreter.execute(Instruction::LdDerefIReg(V3)).unwrap();

        assert_eq!(interpreter.i().addr(), 0x300);
        assert_eq!(&interpreter.mem()[0x300..0x304], &values);
        // V4 was not part of the copy.
        assert_eq!(interpreter.mem()[0x304], 0);

        for i in 0..4 {
            interpreter.set_register(Register::from_usize(i).unwrap(), 0);
        }
        interpreter.execute(Instruction::LdRegDerefI(V3)).unwrap();

        assert_eq!(interpreter.i().addr(), 0x300);
        for (i, &val) in values.iter().enumerate() {
            assert_eq!(interpreter.register(Register::from_usize(i).unwrap()), val);
        }
    }

    /// Tests the `ADD I, Vx` carry behavior at the edge of the address
    /// space.
    #[test]
    fn instruction_add_i() {
        use Register::*;

        let mut interpreter = Interpreter::with_options(Options::testing());

        interpreter.set_i(Address::new(0x100));
        interpreter.set_register(V0, 0x20);
        interpreter.execute(Instruction::AddI(V0)).unwrap();
        assert_eq!(interpreter.i().addr(), 0x120);
        assert_eq!(interpreter.register(VF), 0);

        interpreter.set_i(Address::new(0xFFF));
        interpreter.set_register(V0, 0x02);
        interpreter.execute(Instruction::AddI(V0)).unwrap();
        assert_eq!(interpreter.i().addr(), 0x001);
        assert_eq!(interpreter.register(VF), 1);
    }

    /// Tests that `LD F, Vx` points `I` at the glyph for the digit in `Vx`.
    #[test]
    fn instruction_ld_f() {
        use Register::*;

        let mut interpreter = Interpreter::with_options(Options::testing());

        interpreter.set_register(V7, 0xA);
        interpreter.execute(Instruction::LdF(V7)).unwrap();
        assert_eq!(interpreter.i().addr(), 0xA * 5);
        // First row of the "A" glyph.
        assert_eq!(interpreter.mem()[interpreter.i().addr()], 0xF0);
    }

    /// Tests that `RND` is reproducible for a fixed seed and respects its
    /// mask.
    #[test]
    fn instruction_rnd_seeded() {
        use Register::*;

        let mut a = Interpreter::with_options(Options::testing());
        let mut b = Interpreter::with_options(Options::testing());

        for _ in 0..16 {
            a.execute(Instruction::Rnd(V0, 0xFF)).unwrap();
            b.execute(Instruction::Rnd(V0, 0xFF)).unwrap();
            assert_eq!(a.register(V0), b.register(V0));
        }

        a.execute(Instruction::Rnd(V1, 0x00)).unwrap();
        assert_eq!(a.register(V1), 0);
        a.execute(Instruction::Rnd(V2, 0x0F)).unwrap();
        assert_eq!(a.register(V2) & 0xF0, 0);
    }

    /// Tests `CALL` and `RET`, including the defensive stack bounds checks.
    #[test]
    fn call_and_ret() {
        let mut interpreter = Interpreter::with_options(Options::testing());
        interpreter.load_rom(&[0x22, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0xEE]).unwrap();

        interpreter.step().unwrap();
        assert_eq!(interpreter.pc().addr(), 0x206);
        interpreter.step().unwrap();
        assert_eq!(interpreter.pc().addr(), 0x202);

        // Returning with an empty call stack fails without corrupting
        // state.
        let mut interpreter = Interpreter::with_options(Options::testing());
        assert!(interpreter.execute(Instruction::Ret).is_err());
        assert_eq!(interpreter.pc().addr(), 0x200);

        // The seventeenth nested call overflows the 16-slot stack.
        for _ in 0..16 {
            interpreter
                .execute(Instruction::Call(Address::new(0x300)))
                .unwrap();
        }
        assert!(
            interpreter
                .execute(Instruction::Call(Address::new(0x300)))
                .is_err()
        );
        assert_eq!(interpreter.pc().addr(), 0x300);
    }

    /// Tests the conditional skip instructions through full cycles.
    #[test]
    fn skips() {
        let mut interpreter = Interpreter::with_options(Options::testing());
        // LD V0, #07; SE V0, #07 (taken); <skipped>; SNE V0, #07 (not
        // taken).
        interpreter
            .load_rom(&[0x60, 0x07, 0x30, 0x07, 0x00, 0x00, 0x40, 0x07])
            .unwrap();

        interpreter.step().unwrap();
        assert_eq!(interpreter.pc().addr(), 0x202);
        interpreter.step().unwrap();
        assert_eq!(interpreter.pc().addr(), 0x206);
        interpreter.step().unwrap();
        assert_eq!(interpreter.pc().addr(), 0x208);
    }

    /// Tests ROM loading at the size limit and the failure path.
    #[test]
    fn load_rom_sizes() {
        let mut interpreter = Interpreter::with_options(Options::testing());

        interpreter.load_rom(&[]).unwrap();
        assert_eq!(interpreter.pc().addr(), 0x200);

        let max = vec![0xAA; PROG_SIZE];
        interpreter.load_rom(&max).unwrap();
        assert_eq!(interpreter.pc().addr(), 0x200);
        assert_eq!(interpreter.mem()[0xFFF], 0xAA);

        let too_big = vec![0xBB; PROG_SIZE + 1];
        assert!(interpreter.load_rom(&too_big).is_err());
        // The previously loaded program is untouched.
        assert_eq!(interpreter.mem()[0x200], 0xAA);
        assert_eq!(interpreter.mem()[0xFFF], 0xAA);
        assert_eq!(interpreter.pc().addr(), 0x200);
    }

    /// Tests that drawing the same sprite twice restores the framebuffer
    /// and reports a collision on the second draw.
    #[test]
    fn draw_double_xor() {
        use Register::*;

        let mut interpreter = Interpreter::with_options(Options::testing());
        // LD V0, #00; LD F, V0; DRW V0, V0, 5.
        interpreter
            .load_rom(&[0x60, 0x00, 0xF0, 0x29, 0xD0, 0x05])
            .unwrap();

        for _ in 0..3 {
            interpreter.step().unwrap();
        }
        // Top row of the "0" glyph (0xF0): four set pixels.
        assert_eq!(interpreter.display().pixel(0, 0), 1);
        assert_eq!(interpreter.display().pixel(3, 0), 1);
        assert_eq!(interpreter.display().pixel(4, 0), 0);
        assert_eq!(interpreter.display().pixel(1, 1), 0);
        assert_eq!(interpreter.register(VF), 0);
        assert!(interpreter.display().dirty());

        interpreter
            .execute(Instruction::Drw(V0, V0, 5))
            .unwrap();
        assert_eq!(interpreter.register(VF), 1);
        assert!(interpreter.display().data().iter().all(|&p| p == 0));
    }

    /// Tests that the timers floor at zero and that the sound trigger
    /// transitions from `Play` to `Stop` as the sound timer drains.
    #[test]
    fn timers() {
        let mut interpreter = Interpreter::with_options(Options::testing());
        assert_eq!(interpreter.sound_trigger(), SoundTrigger::None);

        interpreter.set_st(5);
        interpreter.set_dt(3);
        for tick in 1..5 {
            assert_eq!(interpreter.tick_timers(), SoundTrigger::Play, "tick {}", tick);
        }
        assert_eq!(interpreter.tick_timers(), SoundTrigger::Stop);
        assert_eq!(interpreter.st(), 0);
        assert_eq!(interpreter.dt(), 0);

        // Ticking past zero saturates.
        assert_eq!(interpreter.tick_timers(), SoundTrigger::Stop);
        assert_eq!(interpreter.st(), 0);
        assert_eq!(interpreter.sound_trigger(), SoundTrigger::Stop);
    }

    /// Tests that the key-wait instruction holds the program counter until
    /// a key is down and stores the highest-indexed down key.
    #[test]
    fn key_wait() {
        use Register::*;

        let mut interpreter = Interpreter::with_options(Options::testing());
        interpreter.load_rom(&[0xF5, 0x0A]).unwrap();

        for _ in 0..4 {
            interpreter.step().unwrap();
            assert_eq!(interpreter.pc().addr(), 0x200);
        }

        interpreter.input_mut().press(Key::K3);
        interpreter.input_mut().press(Key::KC);
        interpreter.step().unwrap();
        assert_eq!(interpreter.pc().addr(), 0x202);
        assert_eq!(interpreter.register(V5), 0xC);
    }

    /// Tests that `reset` restores the power-on state without discarding
    /// the loaded program.
    #[test]
    fn reset_round_trip() {
        use Register::*;

        let mut interpreter = Interpreter::with_options(Options::testing());
        // LD V0, #00; LD F, V0; DRW V0, V0, 5; CALL #208.
        interpreter
            .load_rom(&[0x60, 0x00, 0xF0, 0x29, 0xD0, 0x05, 0x22, 0x08])
            .unwrap();
        for _ in 0..4 {
            interpreter.step().unwrap();
        }
        interpreter.set_register(V7, 42);
        interpreter.set_dt(9);
        interpreter.set_st(9);
        interpreter.tick_timers();

        interpreter.reset();

        assert_eq!(interpreter.pc().addr(), 0x200);
        assert_eq!(interpreter.i().addr(), 0);
        for i in 0..16 {
            assert_eq!(interpreter.register(Register::from_usize(i).unwrap()), 0);
        }
        assert_eq!(interpreter.dt(), 0);
        assert_eq!(interpreter.st(), 0);
        assert_eq!(interpreter.sound_trigger(), SoundTrigger::None);
        assert!(interpreter.display().data().iter().all(|&p| p == 0));
        // The call stack is empty again.
        assert!(interpreter.execute(Instruction::Ret).is_err());
        // The program survived the reset and can be stepped again.
        interpreter.step().unwrap();
        assert_eq!(interpreter.pc().addr(), 0x202);
    }
}
