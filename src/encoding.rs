//! Instruction byte layout: low nibble opcode, high nibble target.

use std::fmt;

/// One of the sixteen opcodes a block can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,
    Wait = 1,
    Add = 2,
    Sub = 3,
    Mlt = 4,
    Div = 5,
    Mod = 6,
    Get = 7,
    Put = 8,
    Push = 9,
    Pop = 10,
    Jmp = 11,
    Jez = 12,
    Jnz = 13,
    Jof = 14,
    Halt = 15,
}

impl Opcode {
    pub fn from_name(name: &str) -> Option<Opcode> {
        use Opcode::*;
        Some(match name {
            "nop" => Nop,
            "wait" => Wait,
            "add" => Add,
            "sub" => Sub,
            "mlt" => Mlt,
            "div" => Div,
            "mod" => Mod,
            "get" => Get,
            "put" => Put,
            "push" => Push,
            "pop" => Pop,
            "jmp" => Jmp,
            "jez" => Jez,
            "jnz" => Jnz,
            "jof" => Jof,
            "halt" => Halt,
            _ => return None,
        })
    }

    /// True for the four opcodes whose inline-operand form still takes a
    /// `TARGET` directly with no extra byte (jumps use their operand as an
    /// address, not a value, but share the same sizing rule as everything
    /// else per the assembler's pass-1 table).
    pub fn is_jump(self) -> bool {
        matches!(self, Opcode::Jmp | Opcode::Jez | Opcode::Jnz | Opcode::Jof)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ();

    fn try_from(v: u8) -> Result<Self, ()> {
        use Opcode::*;
        Ok(match v {
            0 => Nop,
            1 => Wait,
            2 => Add,
            3 => Sub,
            4 => Mlt,
            5 => Div,
            6 => Mod,
            7 => Get,
            8 => Put,
            9 => Push,
            10 => Pop,
            11 => Jmp,
            12 => Jez,
            13 => Jnz,
            14 => Jof,
            15 => Halt,
            _ => return Err(()),
        })
    }
}

/// One of the sixteen operand selectors an instruction's target nibble can
/// name. `Up..Any` are kept contiguous and in this order so that
/// `target as u8 - Target::Up as u8` yields a side index 0..=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Target {
    Stk = 0,
    Acc = 1,
    Rg0 = 2,
    Rg1 = 3,
    Rg2 = 4,
    Rg3 = 5,
    Adj = 6,
    Up = 7,
    Rig = 8,
    Dwn = 9,
    Lft = 10,
    Any = 11,
    Nil = 12,
    Sln = 13,
    Cur = 14,
    Ref = 15,
}

impl Target {
    pub fn from_name(name: &str) -> Option<Target> {
        use Target::*;
        Some(match name {
            "STK" => Stk,
            "ACC" => Acc,
            "RG0" => Rg0,
            "RG1" => Rg1,
            "RG2" => Rg2,
            "RG3" => Rg3,
            "UP" => Up,
            "RIG" => Rig,
            "DWN" => Dwn,
            "LFT" => Lft,
            "ANY" => Any,
            "NIL" => Nil,
            "SLN" => Sln,
            "CUR" => Cur,
            "REF" => Ref,
            _ => return None,
        })
    }

    /// True for the five direction/edge pseudo-targets handled by the
    /// transfer scheduler rather than resolved locally.
    pub fn is_directional(self) -> bool {
        matches!(
            self,
            Target::Up | Target::Rig | Target::Dwn | Target::Lft | Target::Any
        )
    }

    /// Side index 0..=4 (0=up,1=right,2=down,3=left,4=any). Only valid for
    /// directional targets.
    pub fn side_index(self) -> Option<u8> {
        if self.is_directional() {
            Some(self as u8 - Target::Up as u8)
        } else {
            None
        }
    }
}

impl TryFrom<u8> for Target {
    type Error = ();

    fn try_from(v: u8) -> Result<Self, ()> {
        use Target::*;
        Ok(match v {
            0 => Stk,
            1 => Acc,
            2 => Rg0,
            3 => Rg1,
            4 => Rg2,
            5 => Rg3,
            6 => Adj,
            7 => Up,
            8 => Rig,
            9 => Dwn,
            10 => Lft,
            11 => Any,
            12 => Nil,
            13 => Sln,
            14 => Cur,
            15 => Ref,
            _ => return Err(()),
        })
    }
}

/// A single encoded instruction byte: `target << 4 | opcode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction(pub u8);

impl Instruction {
    pub fn pack(opcode: Opcode, target: Target) -> Instruction {
        Instruction(((target as u8) << 4) | (opcode as u8))
    }

    pub fn opcode(self) -> Result<Opcode, ()> {
        Opcode::try_from(self.0 & 0x0F)
    }

    pub fn target(self) -> Result<Target, ()> {
        Target::try_from(self.0 >> 4)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}
