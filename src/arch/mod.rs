//! Architecture-specific vocabulary.
//!
//! Everything the parser and the flow pass need to know about a concrete
//! instruction set lives here: prefix and mnemonic sets, the ordered
//! class-pattern table, condition-code tables for the conditional forms,
//! and the calling-convention register sets.

pub mod x86;

#[cfg(test)]
mod tests;
