//! The instruction stream for one procedure or disassembled view.

use crate::analysis::{resolve, Context, Diagnostic, FrameView};
use crate::asm::Instruction;

/// Owns the instructions of one disassembled region, in construction
/// order, and the non-fatal diagnostics raised while building and
/// analyzing them.
///
/// Instructions are stored arena-style and addressed by index; the
/// `previous`/`next` links on each instruction are indices into this
/// stream. Appending a line wires the previous instruction's forward link
/// to the new one, except across a return, where a textual successor is
/// not assumed to be control-flow-reachable.
#[derive(Debug, Default)]
pub struct Stream {
    instructions: Vec<Instruction>,
    diagnostics: Vec<Diagnostic>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one disassembly line, resolve its control-flow targets, and
    /// append it. Returns the new instruction's index.
    ///
    /// `frame` services the live memory reads a computed jump needs;
    /// `ctx` carries the comparison bound across lines.
    pub fn append_line<F>(&mut self, line: &str, ctx: &mut Context, frame: &F) -> usize
    where
        F: FrameView,
    {
        let (mut ins, mut diagnostics) = Instruction::parse(line, ctx);

        if ins.is_jump() {
            resolve::populate_targets(&mut ins, ctx, frame, &mut diagnostics);
        }

        let index = self.instructions.len();

        if let Some(prev) = index.checked_sub(1) {
            if !self.instructions[prev].is_return() {
                self.instructions[prev].link_next(index);
                ins.link_previous(prev);
            }
        }

        self.instructions.push(ins);
        self.diagnostics.append(&mut diagnostics);

        index
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Instruction> {
        self.instructions.get_mut(index)
    }

    /// Iterate in construction order.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }

    /// Follow the forward links from `index`, yielding `index` first.
    pub fn walk_from(&self, index: usize) -> Walk<'_> {
        Walk {
            stream: self,
            position: Some(index),
            backwards: false,
        }
    }

    /// Follow the backward links from `index`, yielding `index` first.
    pub fn walk_back(&self, index: usize) -> Walk<'_> {
        Walk {
            stream: self,
            position: Some(index),
            backwards: true,
        }
    }

    /// Every non-fatal finding raised so far, in the order encountered.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Linked traversal over a stream, in either direction.
pub struct Walk<'a> {
    stream: &'a Stream,
    position: Option<usize>,
    backwards: bool,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Instruction;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.position?;
        let ins = self.stream.get(index)?;

        self.position = if self.backwards {
            ins.previous()
        } else {
            ins.next()
        };

        Some(ins)
    }
}
