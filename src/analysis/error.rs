//! Error and diagnostic types for flow analysis.

use std::{fmt, result};
use thiserror::Error;

/// Error type for the fallible edges of an analysis: everything that
/// involves the live target behind the listing.
///
/// Parsing and simulation themselves never fail; insufficient information
/// degrades to unknown state and fewer annotations instead.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The live target could not service a memory read at this address.
    #[error("memory read failed at {addr:#x}")]
    MemoryRead { addr: u64 },

    /// No live target is attached at all.
    #[error("live target unavailable")]
    TargetUnavailable,
}

pub type Result<T> = result::Result<T, Error>;

/// A non-fatal finding raised while parsing or simulating.
///
/// Diagnostics accumulate on the stream for the embedding tool to log or
/// display; none of them stops the analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// A jump-like instruction finished parsing and resolution with no
    /// known targets. Downstream consumers should annotate conservatively.
    JumpWithoutTargets { address: u64 },

    /// More operands than the two-operand target convention supports; no
    /// write target was assigned.
    TooManyOperands { address: u64, count: usize },

    /// A trailing `<symbol>` target annotation on a line not detected as
    /// jump-like.
    TargetAnnotationWithoutJump { address: u64 },

    /// A trailing annotation in a shape this parser does not know.
    UnknownAnnotation { address: u64, text: String },

    /// A conditional mnemonic with no entry in the condition table.
    UnhandledCondition { address: u64, mnemonic: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Diagnostic::*;

        match self {
            JumpWithoutTargets { address } => {
                write!(f, "{:#x}: jump has no resolved targets", address)
            }
            TooManyOperands { address, count } => write!(
                f,
                "{:#x}: {} operands, no write-target rule applies",
                address, count
            ),
            TargetAnnotationWithoutJump { address } => write!(
                f,
                "{:#x}: target annotation on a non-jumping instruction",
                address
            ),
            UnknownAnnotation { address, text } => {
                write!(f, "{:#x}: unrecognized annotation `{}`", address, text)
            }
            UnhandledCondition { address, mnemonic } => {
                write!(f, "{:#x}: unhandled conditional {}", address, mnemonic)
            }
        }
    }
}
