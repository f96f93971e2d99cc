//! Operand model for AT&T-syntax disassembly text.

use crate::arch::x86;
use crate::reg::RegisterState;
use std::fmt;

/// What an operand refers to. At most one referent is ever populated; a
/// token that matches no grammar rule parses to `Empty` rather than
/// failing, so one malformed operand never blocks the rest of a line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperandKind {
    /// An architectural register, named without the `%` sigil.
    Register(String),

    /// A memory reference of the shape `offset(%base,%index,scale)`.
    Memory(MemoryRef),

    /// A `$`-prefixed literal. `hex` records whether the source wrote it
    /// in hexadecimal, for later rendering only.
    Immediate { value: i64, hex: bool },

    /// A bare `0x...` token: a jump or call target address.
    Target(u64),

    /// Nothing recognizable.
    Empty,
}

/// The components of a memory operand.
///
/// `offset` is `None` when the source wrote no literal offset at all;
/// the distinction matters to the jump-table resolver, which only walks
/// tables rooted at a written literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryRef {
    pub base: Option<String>,
    pub index: Option<String>,
    pub scale: u64,
    pub offset: Option<i64>,
}

impl MemoryRef {
    /// The effective address under `regs`: base + index×scale + offset.
    ///
    /// Components the source did not write contribute zero; a register
    /// that was written but has no known value makes the whole address
    /// unknown.
    pub fn address(&self, regs: &RegisterState) -> Option<u64> {
        let mut address = self.offset.unwrap_or(0) as u64;

        if let Some(base) = &self.base {
            address = address.wrapping_add(regs.get(base)?);
        }

        if let Some(index) = &self.index {
            address = address.wrapping_add(regs.get(index)?.wrapping_mul(self.scale));
        }

        Some(address)
    }

    /// Whether the base register is one of the program-counter names.
    pub fn is_pc_relative(&self) -> bool {
        self.base
            .as_deref()
            .map_or(false, |base| x86::PC_REGISTERS.contains(&base))
    }
}

/// Presentation-only toggles mutated by transfer functions to control what
/// later textual rendering shows for this operand. Never consulted by
/// value or address computation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplaySpec {
    pub show_value: bool,
    pub show_register: bool,
    pub suppress: bool,
}

/// One argument of one instruction.
#[derive(Clone, Debug)]
pub struct Operand {
    text: String,
    segment: Option<String>,
    indirect: bool,
    target: bool,
    kind: OperandKind,
    display: DisplaySpec,
}

impl Operand {
    /// Parse one operand token. Never fails: a token outside the grammar
    /// yields an `Empty` operand that retains the original text.
    ///
    /// Grammar, in priority order: optional `segment:` prefix, leading
    /// `*` for indirection, trailing `)` memory forms, leading `%`
    /// register, leading `$` immediate, bare `0x...` target literal.
    pub fn parse(token: &str, target: bool) -> Self {
        let text = token.trim().to_string();
        let mut rest = text.as_str();
        let mut segment = None;
        let mut indirect = false;

        if let Some(colon) = rest.find(':') {
            if !rest[..colon].contains('(') {
                segment = non_empty(rest[..colon].trim_start_matches('%'));
                rest = &rest[colon + 1..];
            }
        }

        if let Some(stripped) = rest.strip_prefix('*') {
            indirect = true;
            rest = stripped;
        }

        let kind = parse_kind(rest, &mut segment);

        Operand {
            text,
            segment,
            indirect,
            target,
            kind,
            display: DisplaySpec::default(),
        }
    }

    pub fn kind(&self) -> &OperandKind {
        &self.kind
    }

    /// The token exactly as written in the disassembly.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn segment(&self) -> Option<&str> {
        self.segment.as_deref()
    }

    /// Whether the token carried a leading `*`.
    pub fn is_indirect(&self) -> bool {
        self.indirect
    }

    /// Whether this operand is the instruction's write target under the
    /// two-operand convention.
    pub fn is_target(&self) -> bool {
        self.target
    }

    /// Whether this operand reads or writes through memory.
    pub fn is_deref(&self) -> bool {
        matches!(self.kind, OperandKind::Memory(_))
    }

    /// The register name, for register operands.
    pub fn register_name(&self) -> Option<&str> {
        match &self.kind {
            OperandKind::Register(name) => Some(name),
            _ => None,
        }
    }

    /// The literal value, for immediate operands.
    pub fn immediate(&self) -> Option<i64> {
        match self.kind {
            OperandKind::Immediate { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn display(&self) -> &DisplaySpec {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut DisplaySpec {
        &mut self.display
    }

    /// Compute `(value, effective address)` under `regs`. Never panics;
    /// any missing information yields `None` in the corresponding slot.
    ///
    /// Memory operands yield no value: their contents are never simulated,
    /// only their address is computable. Transfer functions that need
    /// contents must go through the live-memory collaborator.
    pub fn value(&self, regs: &RegisterState) -> (Option<u64>, Option<u64>) {
        match &self.kind {
            OperandKind::Register(name) => (regs.get(name), None),
            OperandKind::Memory(mem) => (None, mem.address(regs)),
            OperandKind::Immediate { value, .. } => (Some(*value as u64), None),
            OperandKind::Target(address) => (Some(*address), None),
            OperandKind::Empty => (None, None),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OperandKind::Register(name) => write!(f, "{}", name),
            OperandKind::Immediate { value, hex } => {
                if *hex && *value >= 0 {
                    write!(f, "{:#x}", value)
                } else {
                    write!(f, "{}", value)
                }
            }
            OperandKind::Target(address) => write!(f, "{:#x}", address),
            OperandKind::Memory(_) | OperandKind::Empty => write!(f, "{}", self.text),
        }
    }
}

fn parse_kind(rest: &str, segment: &mut Option<String>) -> OperandKind {
    if rest.ends_with(')') {
        return parse_memory(rest, segment);
    }

    if let Some(name) = rest.strip_prefix('%') {
        return match non_empty(name) {
            Some(name) => OperandKind::Register(name),
            None => OperandKind::Empty,
        };
    }

    if let Some(imm) = rest.strip_prefix('$') {
        let hex = imm.starts_with("0x") || imm.starts_with("-0x");
        return match parse_literal(imm) {
            Some(value) => OperandKind::Immediate { value, hex },
            None => OperandKind::Empty,
        };
    }

    if rest.starts_with("0x") {
        if let Some(value) = parse_literal(rest) {
            return OperandKind::Target(value as u64);
        }
    }

    OperandKind::Empty
}

fn parse_memory(rest: &str, segment: &mut Option<String>) -> OperandKind {
    let body = &rest[..rest.len() - 1];
    let (head, inner) = match body.find('(') {
        Some(open) => (body[..open].trim(), &body[open + 1..]),
        None => return OperandKind::Empty,
    };

    let mut offset = None;

    if !head.is_empty() {
        if head.starts_with('%') && head.ends_with(':') {
            *segment = non_empty(&head[1..head.len() - 1]);
        } else {
            match parse_literal(head) {
                Some(value) => offset = Some(value),
                None => return OperandKind::Empty,
            }
        }
    }

    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    let (base, index, scale) = match parts.as_slice() {
        [one] => (register_name(one), None, 1),
        [base, index] => (register_name(base), register_name(index), 1),
        [base, index, scale] => {
            let scale = parse_literal(scale).filter(|s| *s > 0).unwrap_or(1) as u64;
            (register_name(base), register_name(index), scale)
        }
        _ => return OperandKind::Empty,
    };

    OperandKind::Memory(MemoryRef {
        base,
        index,
        scale,
        offset,
    })
}

fn register_name(token: &str) -> Option<String> {
    non_empty(token.trim().strip_prefix('%')?)
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Parse a decimal or hexadecimal integer literal with optional sign,
/// wrapping to 64 bits.
pub(crate) fn parse_literal(token: &str) -> Option<i64> {
    let token = token.trim();
    let (negative, rest) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let magnitude = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()?
    } else if rest.is_empty() {
        return None;
    } else {
        rest.parse::<u64>().ok()?
    };

    let value = magnitude as i64;
    Some(if negative { value.wrapping_neg() } else { value })
}
