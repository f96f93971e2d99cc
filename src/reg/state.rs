//! A model of partially-known register contents.

use std::collections::HashMap;

/// Represents what is known about the registers at one point in an
/// instruction stream.
///
/// Each entry maps a register name, exactly as written in the disassembly
/// (without the `%` sigil), to a known value and the origin tag of the
/// transfer function that last wrote it. A register absent from the map is
/// unknown; the state never invents a default value for an absent name.
#[derive(Clone, Debug, Default)]
pub struct RegisterState {
    values: HashMap<String, (u64, &'static str)>,
}

impl RegisterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The known value of `name`, or `None` when nothing can be said.
    pub fn get(&self, name: &str) -> Option<u64> {
        self.values.get(name).map(|(v, _)| *v)
    }

    /// The origin tag recorded alongside a known value, for diagnostics.
    pub fn get_origin(&self, name: &str) -> Option<&'static str> {
        self.values.get(name).map(|(_, origin)| *origin)
    }

    /// Record a known value. `origin` names the transfer function (or
    /// seeding step) responsible, and survives until the next write.
    pub fn set(&mut self, name: &str, value: u64, origin: &'static str) {
        self.values.insert(name.to_string(), (value, origin));
    }

    /// Forget whatever was known about `name`.
    pub fn remove(&mut self, name: &str) {
        self.values.remove(name);
    }

    /// A new state containing only the named registers, keeping their
    /// values and origins. Models what survives a scope change such as a
    /// call boundary.
    pub fn restricted(&self, names: &[&str]) -> RegisterState {
        let mut copy = RegisterState::new();

        for name in names {
            if let Some(entry) = self.values.get(*name) {
                copy.values.insert((*name).to_string(), *entry);
            }
        }

        copy
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate over all known registers.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.values.iter().map(|(name, (v, _))| (name.as_str(), *v))
    }
}
