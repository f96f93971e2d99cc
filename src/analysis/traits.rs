//! Capabilities the analysis borrows from the surrounding tool.

use crate::analysis::{Error, Result};
use crate::reg::RegisterState;

/// A view of the stopped frame behind the listing: live register and
/// memory access.
pub trait FrameView {
    /// The current concrete value of a register. Used only to seed an
    /// initial state for a live analysis, never inside transfer functions.
    fn read_register(&self, name: &str) -> Option<u64>;

    /// Read one pointer-sized value from live memory.
    ///
    /// Fallible and possibly slow: the target may be gone, stopped in a
    /// bad state, or the address unmapped. A failure terminates only the
    /// operation that needed the read, never the analysis pass.
    fn read_pointer(&self, addr: u64) -> Result<u64>;
}

/// One known system call, able to describe itself.
pub trait SyscallInfo {
    /// Render a call-with-arguments note from the registers known at the
    /// call site.
    fn render(&self, regs: &RegisterState) -> String;

    /// Names of the registers the call overwrites.
    fn clobbered(&self) -> Vec<String>;
}

/// Lookup of system calls by number.
pub trait SyscallTable {
    fn lookup(&self, number: u64) -> Option<&dyn SyscallInfo>;
}

/// Collaborator stub for analyzing a listing with no live target behind
/// it: every read fails, every lookup misses.
pub struct Offline;

impl FrameView for Offline {
    fn read_register(&self, _name: &str) -> Option<u64> {
        None
    }

    fn read_pointer(&self, _addr: u64) -> Result<u64> {
        Err(Error::TargetUnavailable)
    }
}

impl SyscallTable for Offline {
    fn lookup(&self, _number: u64) -> Option<&dyn SyscallInfo> {
        None
    }
}
