//! A spatial tick-driven virtual machine in the TIS-100 family, with a
//! companion two-pass assembler and a portable debug object format:
//! - `encoding` — instruction byte packing, opcode/target enumerations
//! - `assembler` — source text to bytecode + line table
//! - `objfile` — the tagged bytecode/debug container format
//! - `vm` — the grid model, per-block state machine, and transfer scheduler
//! - `logging` — diagnostic printing shared by the CLI front ends

pub mod assembler;
pub mod encoding;
pub mod logging;
pub mod objfile;
pub mod vm;
