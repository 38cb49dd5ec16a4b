/*
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! CHIP-8 instructions and opcodes.
//!
//! This module provides the basic types for working with CHIP-8 opcodes,
//! most notably the translation of raw opcode words into the `Instruction`
//! type.  Decoding is a separate, side-effect-free step: the interpreter
//! only ever dispatches on an already-decoded `Instruction`, so invalid
//! opcodes are rejected before any machine state is touched and the decoder
//! can be tested on its own.

use std::fmt;
use std::ops::Add;

use failure::Error;
use num::FromPrimitive;

use MEM_SIZE;

/// An error resulting from an invalid opcode.
#[derive(Debug, Fail, PartialEq, Eq)]
#[fail(display = "invalid opcode: {}", _0)]
pub struct InvalidOpcodeError(pub Opcode);

enum_from_primitive! {
/// A CHIP-8 register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    V0 = 0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    VF,
}
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", *self)
    }
}

/// A CHIP-8 opcode.
///
/// Having this as a wrapper around an ordinary `u16` allows the field
/// extractors (`vx`, `vy`, `nibble`, `byte`, `addr`) to be implemented as
/// helper methods, which makes the decode step much easier to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u16);

impl Opcode {
    /// Returns the opcode assembled from the given pair of memory bytes
    /// (high byte first).
    pub fn from_bytes(high: u8, low: u8) -> Self {
        Opcode((high as u16) << 8 | low as u16)
    }

    /// Returns the `Vx` register field of this opcode (bits 11-8).
    fn vx(&self) -> Register {
        Register::from_u16((self.0 & 0x0F00) >> 8).unwrap()
    }

    /// Returns the `Vy` register field of this opcode (bits 7-4).
    fn vy(&self) -> Register {
        Register::from_u16((self.0 & 0x00F0) >> 4).unwrap()
    }

    /// Returns the `n` field of this opcode (bits 3-0).
    fn nibble(&self) -> u8 {
        self.0 as u8 & 0xF
    }

    /// Returns the `kk` field of this opcode (bits 7-0).
    fn byte(&self) -> u8 {
        self.0 as u8
    }

    /// Returns the `nnn` field of this opcode (bits 11-0).
    fn addr(&self) -> Address {
        Address::new(self.0 as usize & 0xFFF)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{:04X}", self.0)
    }
}

/// An address pointing to a CHIP-8 memory location.
///
/// The address space is 12 bits wide, and every instance of this type is
/// guaranteed to lie within it: construction masks the value, so arithmetic
/// that overflows the address space (which malformed programs can provoke
/// through `I` or the program counter) wraps deterministically instead of
/// ever producing an out-of-range address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address(usize);

impl Address {
    /// Returns the address corresponding to the given value, masked to the
    /// 12-bit address space.
    pub fn new(addr: usize) -> Self {
        Address(addr & (MEM_SIZE - 1))
    }

    /// Returns the value of the address.
    pub fn addr(&self) -> usize {
        self.0
    }
}

impl Add<usize> for Address {
    type Output = Address;

    fn add(self, rhs: usize) -> Address {
        Address::new(self.0.wrapping_add(rhs))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#03X}", self.0)
    }
}

/// A decoded CHIP-8 instruction.
///
/// This is the internal representation the interpreter dispatches on; if
/// this type were not present, opcode fields would have to be deciphered on
/// every use and the dispatcher would have to handle invalid opcodes in the
/// middle of execution.  Any instance of this type represents a valid
/// instruction.
///
/// # Examples
///
/// Instructions are created from opcodes:
///
/// ```
/// use chipper::{Instruction, Opcode, Register};
///
/// let instr = Instruction::from_opcode(Opcode(0x7510)).unwrap();
/// assert_eq!(instr, Instruction::AddByte(Register::V5, 0x10));
/// ```
///
/// Opcodes with no corresponding instruction are rejected:
///
/// ```
/// use chipper::{Instruction, Opcode};
///
/// assert!(Instruction::from_opcode(Opcode(0x800F)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `SYS addr` (`0nnn`): machine subroutine call, ignored.
    Sys(Address),
    /// `CLS` (`00E0`).
    Cls,
    /// `RET` (`00EE`).
    Ret,
    /// `JP addr` (`1nnn`).
    Jp(Address),
    /// `CALL addr` (`2nnn`).
    Call(Address),
    /// `SE Vx, byte` (`3xkk`).
    SeByte(Register, u8),
    /// `SNE Vx, byte` (`4xkk`).
    SneByte(Register, u8),
    /// `SE Vx, Vy` (`5xy0`).
    SeReg(Register, Register),
    /// `LD Vx, byte` (`6xkk`).
    LdByte(Register, u8),
    /// `ADD Vx, byte` (`7xkk`); does not touch `VF`.
    AddByte(Register, u8),
    /// `LD Vx, Vy` (`8xy0`).
    LdReg(Register, Register),
    /// `OR Vx, Vy` (`8xy1`).
    Or(Register, Register),
    /// `AND Vx, Vy` (`8xy2`).
    And(Register, Register),
    /// `XOR Vx, Vy` (`8xy3`).
    Xor(Register, Register),
    /// `ADD Vx, Vy` (`8xy4`).
    AddReg(Register, Register),
    /// `SUB Vx, Vy` (`8xy5`).
    Sub(Register, Register),
    /// `SHR Vx` (`8xy6`); the `y` field is ignored.
    Shr(Register),
    /// `SUBN Vx, Vy` (`8xy7`).
    Subn(Register, Register),
    /// `SHL Vx` (`8xyE`); the `y` field is ignored.
    Shl(Register),
    /// `SNE Vx, Vy` (`9xy0`).
    SneReg(Register, Register),
    /// `LD I, addr` (`Annn`).
    LdI(Address),
    /// `JP V0, addr` (`Bnnn`).
    JpV0(Address),
    /// `RND Vx, byte` (`Cxkk`).
    Rnd(Register, u8),
    /// `DRW Vx, Vy, nibble` (`Dxyn`).
    Drw(Register, Register, u8),
    /// `SKP Vx` (`Ex9E`).
    Skp(Register),
    /// `SKNP Vx` (`ExA1`).
    Sknp(Register),
    /// `LD Vx, DT` (`Fx07`).
    LdRegDt(Register),
    /// `LD Vx, K` (`Fx0A`).
    LdKey(Register),
    /// `LD DT, Vx` (`Fx15`).
    LdDtReg(Register),
    /// `LD ST, Vx` (`Fx18`).
    LdSt(Register),
    /// `ADD I, Vx` (`Fx1E`).
    AddI(Register),
    /// `LD F, Vx` (`Fx29`).
    LdF(Register),
    /// `LD B, Vx` (`Fx33`).
    LdB(Register),
    /// `LD [I], Vx` (`Fx55`).
    LdDerefIReg(Register),
    /// `LD Vx, [I]` (`Fx65`).
    LdRegDerefI(Register),
}

impl Instruction {
    /// Returns the instruction corresponding to the given opcode.
    pub fn from_opcode(opcode: Opcode) -> Result<Self, Error> {
        use self::Instruction::*;

        Ok(match (opcode.0 & 0xF000) >> 12 {
            0x0 => match opcode.0 & 0xFFF {
                0x0E0 => Cls,
                0x0EE => Ret,
                _ => Sys(opcode.addr()),
            },
            0x1 => Jp(opcode.addr()),
            0x2 => Call(opcode.addr()),
            0x3 => SeByte(opcode.vx(), opcode.byte()),
            0x4 => SneByte(opcode.vx(), opcode.byte()),
            0x5 => if opcode.0 & 0xF == 0 {
                SeReg(opcode.vx(), opcode.vy())
            } else {
                Err(InvalidOpcodeError(opcode))?
            },
            0x6 => LdByte(opcode.vx(), opcode.byte()),
            0x7 => AddByte(opcode.vx(), opcode.byte()),
            0x8 => match opcode.0 & 0xF {
                0x0 => LdReg(opcode.vx(), opcode.vy()),
                0x1 => Or(opcode.vx(), opcode.vy()),
                0x2 => And(opcode.vx(), opcode.vy()),
                0x3 => Xor(opcode.vx(), opcode.vy()),
                0x4 => AddReg(opcode.vx(), opcode.vy()),
                0x5 => Sub(opcode.vx(), opcode.vy()),
                0x6 => Shr(opcode.vx()),
                0x7 => Subn(opcode.vx(), opcode.vy()),
                0xE => Shl(opcode.vx()),
                _ => Err(InvalidOpcodeError(opcode))?,
            },
            0x9 => if opcode.0 & 0xF == 0 {
                SneReg(opcode.vx(), opcode.vy())
            } else {
                Err(InvalidOpcodeError(opcode))?
            },
            0xA => LdI(opcode.addr()),
            0xB => JpV0(opcode.addr()),
            0xC => Rnd(opcode.vx(), opcode.byte()),
            0xD => Drw(opcode.vx(), opcode.vy(), opcode.nibble()),
            0xE => match opcode.0 & 0xFF {
                0x9E => Skp(opcode.vx()),
                0xA1 => Sknp(opcode.vx()),
                _ => Err(InvalidOpcodeError(opcode))?,
            },
            0xF => match opcode.0 & 0xFF {
                0x07 => LdRegDt(opcode.vx()),
                0x0A => LdKey(opcode.vx()),
                0x15 => LdDtReg(opcode.vx()),
                0x18 => LdSt(opcode.vx()),
                0x1E => AddI(opcode.vx()),
                0x29 => LdF(opcode.vx()),
                0x33 => LdB(opcode.vx()),
                0x55 => LdDerefIReg(opcode.vx()),
                0x65 => LdRegDerefI(opcode.vx()),
                _ => Err(InvalidOpcodeError(opcode))?,
            },
            _ => unreachable!("4-bit quantity didn't match 0-15"),
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Instruction::*;

        match *self {
            Sys(addr) => write!(f, "SYS {}", addr),
            Cls => write!(f, "CLS"),
            Ret => write!(f, "RET"),
            Jp(addr) => write!(f, "JP {}", addr),
            Call(addr) => write!(f, "CALL {}", addr),
            SeByte(reg, b) => write!(f, "SE {}, #{:02X}", reg, b),
            SneByte(reg, b) => write!(f, "SNE {}, #{:02X}", reg, b),
            SeReg(reg1, reg2) => write!(f, "SE {}, {}", reg1, reg2),
            LdByte(reg, b) => write!(f, "LD {}, #{:02X}", reg, b),
            AddByte(reg, b) => write!(f, "ADD {}, #{:02X}", reg, b),
            LdReg(reg1, reg2) => write!(f, "LD {}, {}", reg1, reg2),
            Or(reg1, reg2) => write!(f, "OR {}, {}", reg1, reg2),
            And(reg1, reg2) => write!(f, "AND {}, {}", reg1, reg2),
            Xor(reg1, reg2) => write!(f, "XOR {}, {}", reg1, reg2),
            AddReg(reg1, reg2) => write!(f, "ADD {}, {}", reg1, reg2),
            Sub(reg1, reg2) => write!(f, "SUB {}, {}", reg1, reg2),
            Shr(reg) => write!(f, "SHR {}", reg),
            Subn(reg1, reg2) => write!(f, "SUBN {}, {}", reg1, reg2),
            Shl(reg) => write!(f, "SHL {}", reg),
            SneReg(reg1, reg2) => write!(f, "SNE {}, {}", reg1, reg2),
            LdI(addr) => write!(f, "LD I, {}", addr),
            JpV0(addr) => write!(f, "JP V0, {}", addr),
            Rnd(reg, b) => write!(f, "RND {}, #{:02X}", reg, b),
            Drw(reg1, reg2, n) => write!(f, "DRW {}, {}, {}", reg1, reg2, n),
            Skp(reg) => write!(f, "SKP {}", reg),
            Sknp(reg) => write!(f, "SKNP {}", reg),
            LdRegDt(reg) => write!(f, "LD {}, DT", reg),
            LdKey(reg) => write!(f, "LD {}, K", reg),
            LdDtReg(reg) => write!(f, "LD DT, {}", reg),
            LdSt(reg) => write!(f, "LD ST, {}", reg),
            AddI(reg) => write!(f, "ADD I, {}", reg),
            LdF(reg) => write!(f, "LD F, {}", reg),
            LdB(reg) => write!(f, "LD B, {}", reg),
            LdDerefIReg(reg) => write!(f, "LD [I], {}", reg),
            LdRegDerefI(reg) => write!(f, "LD {}, [I]", reg),
        }
    }
}

#[cfg(test)]
mod tests {
    use instruction::{Address, Instruction, Opcode};

    /// Tests that opcodes decode to the expected instructions.
    #[test]
    fn decode() {
        use Register::*;
        use self::Instruction::*;

        // Test cases, in the format (opcode, instruction).
        let cases = [
            (0x00E0, Cls),
            (0x00EE, Ret),
            (0x0123, Sys(Address::new(0x123))),
            (0x1404, Jp(Address::new(0x404))),
            (0x2ABC, Call(Address::new(0xABC))),
            (0x3277, SeByte(V2, 0x77)),
            (0x4E01, SneByte(VE, 0x01)),
            (0x5930, SeReg(V9, V3)),
            (0x6BFF, LdByte(VB, 0xFF)),
            (0x7C10, AddByte(VC, 0x10)),
            (0x8120, LdReg(V1, V2)),
            (0x8341, Or(V3, V4)),
            (0x8562, And(V5, V6)),
            (0x8783, Xor(V7, V8)),
            (0x89A4, AddReg(V9, VA)),
            (0x8BC5, Sub(VB, VC)),
            (0x8D06, Shr(VD)),
            (0x8EF7, Subn(VE, VF)),
            (0x801E, Shl(V0)),
            (0x9120, SneReg(V1, V2)),
            (0xA680, LdI(Address::new(0x680))),
            (0xB200, JpV0(Address::new(0x200))),
            (0xC4F0, Rnd(V4, 0xF0)),
            (0xD125, Drw(V1, V2, 5)),
            (0xE39E, Skp(V3)),
            (0xE5A1, Sknp(V5)),
            (0xF607, LdRegDt(V6)),
            (0xF70A, LdKey(V7)),
            (0xF815, LdDtReg(V8)),
            (0xF918, LdSt(V9)),
            (0xFA1E, AddI(VA)),
            (0xFB29, LdF(VB)),
            (0xFC33, LdB(VC)),
            (0xFD55, LdDerefIReg(VD)),
            (0xFE65, LdRegDerefI(VE)),
        ];

        for &(opcode, ref instruction) in cases.iter() {
            let decoded = Instruction::from_opcode(Opcode(opcode)).unwrap();
            assert_eq!(decoded, *instruction, "opcode {:#06X}", opcode);
        }
    }

    /// Tests that the `y` field of a shift opcode is ignored.
    #[test]
    fn decode_shift_ignores_y() {
        use Register::*;
        use self::Instruction::*;

        assert_eq!(
            Instruction::from_opcode(Opcode(0x8A76)).unwrap(),
            Shr(VA)
        );
        assert_eq!(
            Instruction::from_opcode(Opcode(0x8A7E)).unwrap(),
            Shl(VA)
        );
    }

    /// Tests that opcodes with no corresponding instruction are rejected.
    #[test]
    fn decode_invalid() {
        let cases = [0x5121u16, 0x8008, 0x800F, 0x9005, 0xE3FF, 0xE300, 0xF000, 0xF0FF, 0xF075];

        for &opcode in cases.iter() {
            assert!(
                Instruction::from_opcode(Opcode(opcode)).is_err(),
                "opcode {:#06X}",
                opcode
            );
        }
    }

    /// Tests that addresses are masked into the 12-bit address space.
    #[test]
    fn address_masking() {
        assert_eq!(Address::new(0x1234).addr(), 0x234);
        assert_eq!((Address::new(0xFFF) + 2).addr(), 0x001);
        assert_eq!(Address::new(usize::max_value()).addr(), 0xFFF);
    }
}
