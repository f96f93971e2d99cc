//! A model of partially-known condition-code bits.

use std::collections::HashMap;
use std::{fmt, result, str};

/// Enumeration of the modeled condition flags.
///
/// `SfOf` is a composite meaning "SF equals OF"; signed comparisons branch
/// on it, and it is tracked as its own tri-state bit so that a conditional
/// jump can be decided even when only the relation between SF and OF is
/// known (as when seeded from a live EFLAGS value).
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Flag {
    Zf,
    Cf,
    Of,
    Sf,
    Pf,
    Af,
    SfOf,
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Flag::*;

        match self {
            Zf => write!(f, "ZF"),
            Cf => write!(f, "CF"),
            Of => write!(f, "OF"),
            Sf => write!(f, "SF"),
            Pf => write!(f, "PF"),
            Af => write!(f, "AF"),
            SfOf => write!(f, "SF_OF"),
        }
    }
}

impl str::FromStr for Flag {
    type Err = ();

    fn from_str(s: &str) -> result::Result<Self, Self::Err> {
        use Flag::*;

        match s {
            "ZF" => Ok(Zf),
            "CF" => Ok(Cf),
            "OF" => Ok(Of),
            "SF" => Ok(Sf),
            "PF" => Ok(Pf),
            "AF" => Ok(Af),
            "SF_OF" => Ok(SfOf),
            _ => Err(()),
        }
    }
}

/// Represents what is known about the condition flags at one point in an
/// instruction stream.
///
/// Each flag is either known to be a bit value or absent, meaning unknown.
/// Transfer functions that cannot model an instruction's effect on a flag
/// precisely must `unset` it rather than leave a stale bit asserted.
#[derive(Clone, Debug, Default)]
pub struct FlagState {
    bits: HashMap<Flag, bool>,
}

impl FlagState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The known bit of `flag`, or `None` when nothing can be said.
    pub fn get(&self, flag: Flag) -> Option<bool> {
        self.bits.get(&flag).copied()
    }

    /// Assert a flag bit.
    ///
    /// Writing SF or OF keeps the SF_OF composite coherent: it is
    /// recomputed when both halves are known and invalidated otherwise.
    pub fn set(&mut self, flag: Flag, bit: bool) {
        self.bits.insert(flag, bit);
        self.sync_sf_of(flag);
    }

    /// Force the named flags back to unknown.
    pub fn unset(&mut self, flags: &[Flag]) {
        for flag in flags {
            self.bits.remove(flag);
            self.sync_sf_of(*flag);
        }
    }

    /// Derive ZF from a computed result. The single path by which
    /// zero-flag inference happens after arithmetic and logic transfers.
    pub fn set_result(&mut self, value: u64) {
        self.set(Flag::Zf, value == 0);
    }

    /// Reset every flag to unknown. Used where flag state cannot be
    /// trusted to survive, such as a syscall boundary.
    pub fn clear(&mut self) {
        self.bits.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Decode a concrete EFLAGS value into a fully-known state, for
    /// seeding a live analysis from a stopped frame.
    pub fn from_eflags(eflags: u64) -> Self {
        let mut state = FlagState::new();

        for &(bit, flag) in EFLAGS_BITS {
            state.set(flag, eflags & (1 << bit) != 0);
        }

        state
    }

    fn sync_sf_of(&mut self, written: Flag) {
        if written != Flag::Sf && written != Flag::Of {
            return;
        }

        match (self.bits.get(&Flag::Sf), self.bits.get(&Flag::Of)) {
            (Some(sf), Some(of)) => {
                self.bits.insert(Flag::SfOf, sf == of);
            }
            _ => {
                self.bits.remove(&Flag::SfOf);
            }
        }
    }
}

/// Bit positions of the modeled flags within EFLAGS.
static EFLAGS_BITS: &[(u32, Flag)] = &[
    (0, Flag::Cf),
    (2, Flag::Pf),
    (4, Flag::Af),
    (6, Flag::Zf),
    (7, Flag::Sf),
    (11, Flag::Of),
];
