//! Instruction record and the line parser that produces it.

use crate::analysis::{Context, Diagnostic};
use crate::arch::x86::{self, FlowClass, InstrClass};
use crate::asm::operand::{parse_literal, Operand};
use std::collections::BTreeSet;

/// One decoded line of disassembly.
///
/// An instruction is immutable after parsing except for `targets` (which
/// only ever grows), the annotation lists, and the stream links, which the
/// owning `Stream` wires as later lines arrive.
#[derive(Clone, Debug)]
pub struct Instruction {
    address: u64,
    symbol: Option<String>,
    bytes: Vec<String>,
    prefix: Option<String>,
    mnemonic: String,
    operands: Vec<Operand>,
    class: InstrClass,
    flow: FlowClass,
    conditional_jump: bool,
    unconditional_jump: bool,
    call: bool,
    ret: bool,
    jump: bool,
    targets: BTreeSet<u64>,
    reference: Vec<String>,
    target_name: Option<String>,
    annotations: Vec<String>,
    explanations: Vec<String>,
    previous: Option<usize>,
    next: Option<usize>,
}

impl Instruction {
    fn empty() -> Self {
        Instruction {
            address: 0,
            symbol: None,
            bytes: Vec::new(),
            prefix: None,
            mnemonic: String::new(),
            operands: Vec::new(),
            class: InstrClass::Unknown,
            flow: FlowClass::Unmodeled,
            conditional_jump: false,
            unconditional_jump: false,
            call: false,
            ret: false,
            jump: false,
            targets: BTreeSet::new(),
            reference: Vec::new(),
            target_name: None,
            annotations: Vec::new(),
            explanations: Vec::new(),
            previous: None,
            next: None,
        }
    }

    /// Parse one disassembly line.
    ///
    /// Never fails: a line outside the expected shape yields a maximally
    /// empty instruction plus diagnostics, so one malformed line never
    /// blocks analysis of the rest of the stream.
    pub(crate) fn parse(line: &str, ctx: &mut Context) -> (Instruction, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let tokens = tokenize(line);
        let mut ins = Instruction::empty();
        let mut pos = 0;

        // address, with optional trailing ':'
        if let Some(tok) = tokens.get(pos) {
            let addr = tok.trim_end_matches(':');
            if addr.starts_with("0x") {
                if let Some(value) = parse_literal(addr) {
                    ins.address = value as u64;
                    pos += 1;
                }
            }
        }

        // optional <symbol+off>: location annotation after the address
        if let Some(tok) = tokens.get(pos) {
            if tok.starts_with('<') {
                ins.symbol = Some(tok.trim_end_matches(':').to_string());
                pos += 1;
            }
        }

        // raw byte tokens, as many as the source shows
        while let Some(tok) = tokens.get(pos) {
            if is_byte_token(tok) {
                ins.bytes.push(tok.clone());
                pos += 1;
            } else {
                break;
            }
        }

        // the instruction itself is a mnemonic or a prefix plus a mnemonic
        if let Some(tok) = tokens.get(pos) {
            if x86::is_prefix(tok) {
                ins.prefix = Some(tok.clone());
                pos += 1;
            }
        }

        match tokens.get(pos) {
            Some(tok) => {
                ins.mnemonic = tok.clone();
                pos += 1;
            }
            None => return (ins, diagnostics),
        }

        // operands, unless the remainder is already a trailing annotation
        if let Some(tok) = tokens.get(pos) {
            if !tok.starts_with('#') && !tok.starts_with('<') {
                let args = split_operands(tok);

                // `mov $0x18,%edi` loads 0x18 into edi: the second of two
                // operands is the write target. No such rule exists for
                // three or more.
                for (i, arg) in args.iter().enumerate() {
                    let target = args.len() == 2 && i == 1;
                    ins.operands.push(Operand::parse(arg, target));
                }

                if args.len() > 2 {
                    diagnostics.push(Diagnostic::TooManyOperands {
                        address: ins.address,
                        count: args.len(),
                    });
                }

                pos += 1;
            }
        }

        ins.ret = x86::is_return(&ins.mnemonic);

        if x86::is_conditional_jump(&ins.mnemonic) {
            ins.conditional_jump = true;
            ins.jump = true;
        } else if x86::is_call(&ins.mnemonic) {
            ins.call = true;
            ins.jump = true;
        } else if x86::is_unconditional_jump(&ins.mnemonic) {
            ins.unconditional_jump = true;
            ins.jump = true;
        }

        ins.class = x86::mnemonic_class(&ins.mnemonic);
        ins.flow = x86::flow_class(&ins.mnemonic);

        // trailing annotation emitted by the disassembly source:
        // `# 0x... <symbol>` for rip-relative operands, `<symbol+off>` for
        // jump and call targets
        if let Some(tok) = tokens.get(pos) {
            if tok == "#" {
                ins.reference.push(tokens[pos + 1..].join(" "));
            } else if tok.starts_with('<') {
                if !ins.jump {
                    diagnostics.push(Diagnostic::TargetAnnotationWithoutJump {
                        address: ins.address,
                    });
                }
                ins.target_name = Some(tokens[pos..].join(" "));
            } else {
                diagnostics.push(Diagnostic::UnknownAnnotation {
                    address: ins.address,
                    text: tokens[pos..].join(" "),
                });
            }
        }

        // a compare against an immediate usually bounds the computed jump
        // that follows it
        if ins.mnemonic.starts_with("cmp") {
            if let Some(value) = ins.operands.iter().find_map(Operand::immediate) {
                ctx.last_cmp_immediate = value;
            }
        }

        (ins, diagnostics)
    }

    /// Address of the instruction's first byte.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Instruction size in bytes, as witnessed by the byte tokens.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &[String] {
        &self.bytes
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn operand(&self, index: usize) -> Option<&Operand> {
        self.operands.get(index)
    }

    pub(crate) fn operands_mut(&mut self) -> &mut [Operand] {
        &mut self.operands
    }

    pub fn class(&self) -> InstrClass {
        self.class
    }

    pub fn flow(&self) -> FlowClass {
        self.flow
    }

    pub fn is_conditional_jump(&self) -> bool {
        self.conditional_jump
    }

    pub fn is_unconditional_jump(&self) -> bool {
        self.unconditional_jump
    }

    pub fn is_call(&self) -> bool {
        self.call
    }

    pub fn is_return(&self) -> bool {
        self.ret
    }

    /// Whether this instruction may transfer control anywhere besides the
    /// next line: any of the jump, call, or conditional-jump forms.
    pub fn is_jump(&self) -> bool {
        self.jump
    }

    /// Every address this instruction is known to possibly transfer
    /// control to. Grows monotonically; never cleared.
    pub fn targets(&self) -> &BTreeSet<u64> {
        &self.targets
    }

    pub fn add_target(&mut self, address: u64) {
        self.targets.insert(address);
    }

    /// Commentary the disassembly source attached after a `#`.
    pub fn reference(&self) -> &[String] {
        &self.reference
    }

    /// The `<symbol+off>` target annotation, when the source printed one.
    pub fn target_name(&self) -> Option<&str> {
        self.target_name.as_deref()
    }

    /// Short machine-inferred notes, e.g. branch-taken reasoning.
    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    pub fn add_note(&mut self, note: String) {
        self.annotations.push(note);
    }

    /// Longer descriptive text, populated only when verbose explanation
    /// is configured.
    pub fn explanations(&self) -> &[String] {
        &self.explanations
    }

    pub fn add_explanation(&mut self, explanation: String) {
        self.explanations.push(explanation);
    }

    /// Index of the previous instruction in the owning stream, unless the
    /// previous line was a return.
    pub fn previous(&self) -> Option<usize> {
        self.previous
    }

    /// Index of the next instruction in the owning stream, wired when the
    /// following line is appended.
    pub fn next(&self) -> Option<usize> {
        self.next
    }

    pub(crate) fn link_previous(&mut self, index: usize) {
        self.previous = Some(index);
    }

    pub(crate) fn link_next(&mut self, index: usize) {
        self.next = Some(index);
    }
}

/// Split on whitespace, then re-merge any token ending in `,` with its
/// successor: a memory operand written `0x0(%rax, %rbx, 8)` belongs
/// together however the source spaced it.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();

    for tok in line.split_whitespace() {
        match tokens.last_mut() {
            Some(prev) if prev.ends_with(',') => prev.push_str(tok),
            _ => tokens.push(tok.to_string()),
        }
    }

    tokens
}

fn is_byte_token(token: &str) -> bool {
    token.len() == 2 && token.chars().all(|c| c.is_ascii_hexdigit())
}

/// Split an operand list on top-level commas, leaving commas inside
/// parenthesized memory forms alone.
fn split_operands(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&args[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    parts.push(&args[start..]);
    parts
}
