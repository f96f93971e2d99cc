//! Decides conditional outcomes from known flag bits and renders the
//! reasoning.

use crate::arch::x86;
use crate::reg::{Flag, FlagState};

/// Outcome of evaluating a conditional mnemonic against the current flag
/// state.
pub(crate) enum Verdict {
    /// Every required flag is known and the condition holds. The string
    /// names each contributing flag and its actual vs expected bit.
    Met(String),

    /// Every required flag is known and the condition fails.
    NotMet(String),

    /// The named required flag is unknown; nothing may be asserted.
    Unknown(Flag),

    /// The mnemonic has no entry in the condition table.
    Unhandled,
}

/// Evaluate a conditional mnemonic's flag condition.
///
/// The mnemonic is folded to its canonical spelling first. A disjunctive
/// condition ("below or equal") short-circuits to `Met` on the first
/// satisfied term; a conjunctive one needs every term to hold, but keeps
/// collecting notes past a failed term so the rendering names every flag
/// that contributed to the outcome.
pub(crate) fn evaluate(mnemonic: &str, flags: &FlagState) -> Verdict {
    let (any_of, terms) = match x86::jump_condition(x86::canonical_jump(mnemonic)) {
        Some(condition) => condition,
        None => return Verdict::Unhandled,
    };

    let mut notes = String::new();
    let mut met = true;

    for (flag, expected) in terms {
        let actual = match flags.get(*flag) {
            Some(actual) => actual,
            None => return Verdict::Unknown(*flag),
        };

        if actual == *expected {
            notes.push_str(&flag_note(*flag, "==", actual, *expected));

            if any_of {
                return Verdict::Met(notes);
            }
        } else {
            met = false;
            notes.push_str(&flag_note(*flag, "!=", actual, *expected));
        }
    }

    if met {
        Verdict::Met(notes)
    } else {
        Verdict::NotMet(notes)
    }
}

fn flag_note(flag: Flag, relation: &str, actual: bool, expected: bool) -> String {
    if flag == Flag::SfOf {
        if actual {
            ", SF == OF".to_string()
        } else {
            ", SF != OF".to_string()
        }
    } else {
        format!(
            ", {}[{}] {} {}",
            flag, actual as u8, relation, expected as u8
        )
    }
}
