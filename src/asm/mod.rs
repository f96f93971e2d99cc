//! Parsing of disassembly text into typed instructions.

mod instr;
mod operand;
mod stream;

pub use instr::Instruction;
pub use operand::{DisplaySpec, MemoryRef, Operand, OperandKind};
pub use stream::{Stream, Walk};

#[cfg(test)]
mod tests;
