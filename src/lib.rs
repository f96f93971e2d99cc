//! Forward-flow annotation of disassembled x86-64 code.
//!
//! asmflow consumes the textual output of a disassembler one line at a
//! time, parses each line into a typed instruction, and walks the
//! resulting stream with a partially-known model of registers and
//! condition flags. Whatever can be proven along the way is written back
//! onto the instructions as short annotations ("Jump taken, ZF[1] == 1")
//! or, optionally, longer explanations. Anything that cannot be proven is
//! left unknown rather than guessed.

#[macro_use]
extern crate lazy_static;

pub mod analysis;
pub mod arch;
pub mod asm;
pub mod reg;
