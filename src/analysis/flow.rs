//! The forward flow pass and its per-class transfer functions.
//!
//! The pass walks a parsed stream front to back exactly once, carrying a
//! `RegisterState` and a `FlagState`, and dispatches each instruction's
//! `FlowClass` tag to one transfer function. Transfer functions update the
//! states and write annotations back onto the instruction; whenever an
//! effect cannot be computed precisely, the affected state entries are
//! unset rather than guessed.

use crate::analysis::cond::{self, Verdict};
use crate::analysis::{Diagnostic, FrameView, SyscallTable};
use crate::arch::x86::{self, FlowClass};
use crate::asm::{Instruction, OperandKind, Stream};
use crate::reg::{Flag, FlagState, RegisterState};

const ARITH_FLAGS: &[Flag] = &[Flag::Cf, Flag::Of, Flag::Sf, Flag::Zf, Flag::Af, Flag::Pf];
const LOGIC_FLAGS: &[Flag] = &[Flag::Sf, Flag::Zf, Flag::Af, Flag::Pf];

/// Mutable context threaded across one analysis pass.
pub struct Context {
    /// Immediate operand of the most recent compare. Bounds jump-table
    /// walks: a compare against N usually guards a computed switch with
    /// N+1 cases.
    pub last_cmp_immediate: i64,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            last_cmp_immediate: 1,
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Toggles for what the pass writes back onto instructions.
#[derive(Copy, Clone, Debug)]
pub struct FlowConfig {
    pub annotate_jumps: bool,
    pub annotate_cmov: bool,
    /// Emit the longer explanation strings as well as the short notes.
    pub explain: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        FlowConfig {
            annotate_jumps: true,
            annotate_cmov: true,
            explain: false,
        }
    }
}

/// Seed a register state with concrete values read from the stopped
/// frame.
pub fn seed_registers<F>(frame: &F, names: &[&str]) -> RegisterState
where
    F: FrameView,
{
    let mut regs = RegisterState::new();

    for name in names {
        if let Some(value) = frame.read_register(name) {
            regs.set(name, value, "seed");
        }
    }

    regs
}

/// Seed a flag state from the frame's EFLAGS register, when available.
pub fn seed_flags<F>(frame: &F) -> FlagState
where
    F: FrameView,
{
    frame
        .read_register("eflags")
        .map(FlagState::from_eflags)
        .unwrap_or_default()
}

/// A single forward walk over an instruction stream.
///
/// The pass exclusively owns the states it is given for its duration; it
/// never revisits an instruction, and the only instruction fields it
/// touches are the monotonic target set and the annotation lists.
pub struct FlowPass<'a, F, S> {
    frame: &'a F,
    syscalls: &'a S,
    config: FlowConfig,
}

impl<'a, F, S> FlowPass<'a, F, S>
where
    F: FrameView,
    S: SyscallTable,
{
    pub fn new(frame: &'a F, syscalls: &'a S) -> Self {
        Self::with_config(frame, syscalls, FlowConfig::default())
    }

    pub fn with_config(frame: &'a F, syscalls: &'a S, config: FlowConfig) -> Self {
        FlowPass {
            frame,
            syscalls,
            config,
        }
    }

    /// Run the pass over `stream`, starting from the given states, and
    /// return the states as they stand after the last instruction.
    pub fn run(
        &self,
        stream: &mut Stream,
        mut regs: RegisterState,
        mut flags: FlagState,
        ctx: &mut Context,
    ) -> (RegisterState, FlagState) {
        for index in 0..stream.len() {
            let mut diagnostics = Vec::new();

            if let Some(ins) = stream.get_mut(index) {
                let (r, f) = self.step(ins, regs, flags, ctx, &mut diagnostics);
                regs = r;
                flags = f;
            }

            for diagnostic in diagnostics {
                stream.push_diagnostic(diagnostic);
            }
        }

        (regs, flags)
    }

    fn step(
        &self,
        ins: &mut Instruction,
        regs: RegisterState,
        flags: FlagState,
        ctx: &mut Context,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (RegisterState, FlagState) {
        use FlowClass::*;

        match ins.flow() {
            Mov => self.flow_mov(ins, regs, flags),
            Push => self.flow_push(ins, regs, flags),
            Pop => self.flow_pop(ins, regs, flags),
            Add => self.flow_arith(ins, regs, flags, false),
            Sub => self.flow_arith(ins, regs, flags, true),
            Shl => self.flow_shl(ins, regs, flags),
            Neg => self.flow_neg(ins, regs, flags),
            Xor => self.flow_xor(ins, regs, flags, false),
            Pxor => self.flow_xor(ins, regs, flags, true),
            And => self.flow_and(ins, regs, flags),
            Test => self.flow_test(ins, regs, flags),
            Cmp => self.flow_cmp(ins, regs, flags, ctx),
            Lea => self.flow_lea(ins, regs, flags),
            Leave => self.flow_leave(regs, flags),
            CondJump => self.flow_cond_jump(ins, regs, flags, diagnostics),
            Jump => self.flow_jump(ins, regs, flags),
            CondMove => self.flow_cond_move(ins, regs, flags, diagnostics),
            Call => self.flow_call(regs, flags),
            Ret => self.flow_ret(flags),
            Syscall => self.flow_syscall(ins, regs, flags),
            // acknowledged as unmodeled rather than silently mis-modeled
            MovZero | MovSign | Nop | Unmodeled => (regs, flags),
        }
    }

    fn flow_mov(
        &self,
        ins: &mut Instruction,
        mut regs: RegisterState,
        flags: FlagState,
    ) -> (RegisterState, FlagState) {
        if ins.operands().len() < 2 {
            return (regs, flags);
        }

        let (frm_val, _) = ins.operands()[0].value(&regs);
        let (_, to_addr) = ins.operands()[1].value(&regs);
        let frm_is_rsp = ins.operands()[0].register_name() == Some("rsp");
        let to_reg = ins.operands()[1].register_name().map(str::to_string);

        if let Some(to_reg) = &to_reg {
            // the frame-setup `mov %rsp,%rbp` is left alone so rbp keeps
            // meaning "frame base" rather than a stale stack snapshot
            if !(frm_is_rsp && to_reg == "rbp") {
                match frm_val {
                    Some(value) => regs.set(to_reg, value, "mov"),
                    None => regs.remove(to_reg),
                }
            }
        }

        {
            let display = ins.operands_mut()[1].display_mut();
            display.show_value = true;
            display.show_register = true;
        }

        if self.config.explain {
            let frm = &ins.operands()[0];
            let to = &ins.operands()[1];
            let frm_str = frm_val.map(|v| format!("({:#x})", v)).unwrap_or_default();

            let mut ex = if frm.immediate().is_some() {
                format!("Stores immediate value {} ", frm)
            } else if frm.is_deref() {
                format!("Stores memory value at {}{} ", frm, frm_str)
            } else {
                format!("Stores register value of {}{} ", frm, frm_str)
            };

            if to.is_deref() {
                let to_str = to_addr.map(|a| format!("({:#x})", a)).unwrap_or_default();
                ex.push_str(&format!("in memory location {}{}", to, to_str));
            } else {
                ex.push_str(&format!("in register {}", to));
            }

            ins.add_explanation(ex);
        }

        // no flags affected
        (regs, flags)
    }

    fn flow_push(
        &self,
        ins: &mut Instruction,
        mut regs: RegisterState,
        flags: FlagState,
    ) -> (RegisterState, FlagState) {
        let old_sp = regs.get("rsp");

        if let Some(sp) = old_sp {
            regs.set("rsp", sp.wrapping_sub(x86::POINTER_WIDTH), "push");
        }

        if self.config.explain {
            let ex = ins.operands().first().map(|arg| {
                let (value, _) = arg.value(&regs);
                let value_str = value.map(|v| format!("({:#x})", v)).unwrap_or_default();
                let mut ex = format!("Pushes value of {}{} to the stack", arg, value_str);

                if let Some(sp) = old_sp {
                    ex.push_str(&format!(" @{:#x}", sp));
                }

                ex
            });

            if let Some(ex) = ex {
                ins.add_explanation(ex);
            }
        }

        // no flags affected
        (regs, flags)
    }

    fn flow_pop(
        &self,
        ins: &mut Instruction,
        mut regs: RegisterState,
        flags: FlagState,
    ) -> (RegisterState, FlagState) {
        if let Some(sp) = regs.get("rsp") {
            regs.set("rsp", sp.wrapping_add(x86::POINTER_WIDTH), "pop");
        }

        // the popped value itself is not tracked, so whatever the
        // destination held before is no longer true
        if let Some(dst) = ins.operands().first().and_then(|op| op.register_name()) {
            regs.remove(dst);
        }

        // no flags affected
        (regs, flags)
    }

    fn flow_arith(
        &self,
        ins: &mut Instruction,
        mut regs: RegisterState,
        mut flags: FlagState,
        subtract: bool,
    ) -> (RegisterState, FlagState) {
        if ins.operands().len() < 2 {
            return (regs, flags);
        }

        let (src, _) = ins.operands()[0].value(&regs);
        let (dst_val, _) = ins.operands()[1].value(&regs);
        let dst_reg = ins.operands()[1].register_name().map(str::to_string);
        let origin = if subtract { "sub" } else { "add" };

        // a half-known computation must never leave a stale flag asserted
        flags.unset(ARITH_FLAGS);

        let mut result = None;

        match (src, dst_val) {
            (Some(src), Some(dst)) => {
                let value = if subtract {
                    dst.wrapping_sub(src)
                } else {
                    dst.wrapping_add(src)
                };

                if let Some(reg) = &dst_reg {
                    regs.set(reg, value, origin);
                    flags.set_result(value);
                    // unsigned-compare approximation; width and signedness
                    // are not modeled
                    flags.set(Flag::Cf, dst > src);
                    result = Some(value);
                }
            }
            _ => {
                if let Some(reg) = &dst_reg {
                    regs.remove(reg);
                }

                if let Some(op) = ins.operands_mut().first_mut() {
                    op.display_mut().suppress = true;
                }
            }
        }

        if subtract && self.config.explain {
            let new_str = result.map(|v| format!("({:#x})", v)).unwrap_or_default();
            let old_str = dst_val.map(|v| format!("({:#x})", v)).unwrap_or_default();
            let ex = format!(
                "Subtracts {} from {}{} and stores it in {}{}",
                ins.operands()[0],
                ins.operands()[1],
                old_str,
                ins.operands()[1],
                new_str
            );
            ins.add_explanation(ex);
        }

        (regs, flags)
    }

    fn flow_shl(
        &self,
        ins: &mut Instruction,
        mut regs: RegisterState,
        mut flags: FlagState,
    ) -> (RegisterState, FlagState) {
        if ins.operands().len() < 2 {
            return (regs, flags);
        }

        let (amount, _) = ins.operands()[0].value(&regs);
        let (dst_val, _) = ins.operands()[1].value(&regs);
        let dst_reg = ins.operands()[1].register_name();

        // CF after a shift depends on the operand width, which is not
        // modeled; nothing is asserted
        flags.unset(ARITH_FLAGS);

        match (amount, dst_val, dst_reg) {
            (Some(amount), Some(value), Some(reg)) => {
                regs.set(reg, value.wrapping_shl(amount as u32), "shl");
            }
            (_, _, Some(reg)) => {
                regs.remove(reg);
            }
            _ => {}
        }

        (regs, flags)
    }

    fn flow_neg(
        &self,
        ins: &mut Instruction,
        mut regs: RegisterState,
        mut flags: FlagState,
    ) -> (RegisterState, FlagState) {
        let value = ins
            .operands()
            .first()
            .and_then(|op| op.value(&regs).0);
        let dst_reg = ins
            .operands()
            .first()
            .and_then(|op| op.register_name())
            .map(str::to_string);

        flags.unset(ARITH_FLAGS);

        match (value, &dst_reg) {
            (Some(value), Some(reg)) => {
                let negated = (value as i64).wrapping_neg() as u64;
                regs.set(reg, negated, "neg");
                flags.set(Flag::Cf, negated != 0);
            }
            (None, Some(reg)) => {
                regs.remove(reg);
            }
            _ => {}
        }

        (regs, flags)
    }

    fn flow_xor(
        &self,
        ins: &mut Instruction,
        mut regs: RegisterState,
        mut flags: FlagState,
        vector: bool,
    ) -> (RegisterState, FlagState) {
        if ins.operands().len() < 2 {
            return (regs, flags);
        }

        if !vector {
            flags.unset(LOGIC_FLAGS);
        }

        let (v0, _) = ins.operands()[0].value(&regs);
        let (v1, _) = ins.operands()[1].value(&regs);
        let dst_is_mem = ins.operands()[1].is_deref();
        let dst_reg = ins.operands()[1].register_name().map(str::to_string);
        let self_xor = ins.operands().len() == 2
            && ins.operands()[0].register_name().is_some()
            && ins.operands()[0].register_name() == ins.operands()[1].register_name();
        let mut result = None;

        // only register destinations are tracked
        if !dst_is_mem {
            if let Some(reg) = &dst_reg {
                match (v0, v1) {
                    (Some(a), Some(b)) => {
                        result = Some(a ^ b);
                        regs.set(reg, a ^ b, if vector { "pxor" } else { "xor" });

                        if !vector {
                            flags.set_result(a ^ b);
                        }
                    }
                    _ => regs.remove(reg),
                }

                // xor of a register with itself zeroes it regardless of
                // what it held
                if self_xor {
                    result = Some(0);
                    regs.set(reg, 0, if vector { "pxor" } else { "xor" });

                    if !vector {
                        flags.set_result(0);
                    }

                    ins.operands_mut()[0].display_mut().suppress = true;
                }
            }
        }

        if !vector {
            flags.set(Flag::Of, false);
            flags.set(Flag::Cf, false);
        }

        if self.config.explain {
            self.explain_xor(ins, v0, v1, result, self_xor);
        }

        (regs, flags)
    }

    fn explain_xor(
        &self,
        ins: &mut Instruction,
        v0: Option<u64>,
        v1: Option<u64>,
        result: Option<u64>,
        self_xor: bool,
    ) {
        let ex = if self_xor {
            format!(
                "Performs xor on register {} with itself, setting it to 0",
                ins.operands()[0]
            )
        } else {
            let v0_str = v0.map(|v| format!("({:#x})", v)).unwrap_or_default();
            let v1_str = v1.map(|v| format!("({:#x})", v)).unwrap_or_default();
            let result_str = result.map(|v| format!("({:#x})", v)).unwrap_or_default();
            let loc0 = if ins.operands()[0].is_deref() {
                "memory location"
            } else {
                "register"
            };
            let loc1 = if ins.operands()[1].is_deref() {
                "memory location"
            } else {
                "register"
            };

            format!(
                "Performs xor on {} {}{} with {} {}{} and storing the result in {} {}{}",
                loc0,
                ins.operands()[0],
                v0_str,
                loc1,
                ins.operands()[1],
                v1_str,
                loc1,
                ins.operands()[1],
                result_str
            )
        };

        ins.add_explanation(ex);
    }

    fn flow_and(
        &self,
        ins: &mut Instruction,
        mut regs: RegisterState,
        mut flags: FlagState,
    ) -> (RegisterState, FlagState) {
        if ins.operands().len() < 2 {
            return (regs, flags);
        }

        flags.unset(LOGIC_FLAGS);

        let (v0, _) = ins.operands()[0].value(&regs);
        let (v1, _) = ins.operands()[1].value(&regs);
        let dst_is_mem = ins.operands()[1].is_deref();
        let dst_reg = ins.operands()[1].register_name().map(str::to_string);

        if !dst_is_mem {
            if let Some(reg) = &dst_reg {
                match (v0, v1) {
                    (Some(a), Some(b)) => {
                        regs.set(reg, a & b, "and");
                        flags.set_result(a & b);
                    }
                    _ => regs.remove(reg),
                }
            }
        }

        flags.set(Flag::Of, false);
        flags.set(Flag::Cf, false);

        (regs, flags)
    }

    fn flow_test(
        &self,
        ins: &mut Instruction,
        regs: RegisterState,
        mut flags: FlagState,
    ) -> (RegisterState, FlagState) {
        if ins.operands().len() < 2 {
            return (regs, flags);
        }

        let (v0, _) = ins.operands()[0].value(&regs);
        let (v1, _) = ins.operands()[1].value(&regs);

        if ins.operands()[0].text() != ins.operands()[1].text() {
            ins.operands_mut()[1].display_mut().show_register = true;
        }

        flags.unset(LOGIC_FLAGS);

        if let (Some(a), Some(b)) = (v0, v1) {
            flags.set_result(a & b);
        }

        flags.set(Flag::Of, false);
        flags.set(Flag::Cf, false);

        // no registers change
        (regs, flags)
    }

    fn flow_cmp(
        &self,
        ins: &mut Instruction,
        regs: RegisterState,
        mut flags: FlagState,
        ctx: &mut Context,
    ) -> (RegisterState, FlagState) {
        if ins.operands().len() < 2 {
            return (regs, flags);
        }

        // the compared values are worth seeing in the rendered line
        ins.operands_mut()[1].display_mut().show_value = true;

        let (v0, _) = ins.operands()[0].value(&regs);
        let (v1, _) = ins.operands()[1].value(&regs);

        flags.unset(ARITH_FLAGS);

        if let (Some(v0), Some(v1)) = (v0, v1) {
            flags.set(Flag::Zf, v0 == v1);
            // TODO: model operand width before trusting CF for 8/16-bit
            // compares
            flags.set(Flag::Cf, v0 > v1);
            flags.set_result(v1.wrapping_sub(v0));
        }

        if let Some(imm) = ins.operands().iter().find_map(|op| op.immediate()) {
            ctx.last_cmp_immediate = imm;
        }

        (regs, flags)
    }

    fn flow_lea(
        &self,
        ins: &mut Instruction,
        mut regs: RegisterState,
        flags: FlagState,
    ) -> (RegisterState, FlagState) {
        if ins.operands().len() < 2 {
            return (regs, flags);
        }

        // lea only computes the address; the value behind it is never read
        ins.operands_mut()[0].display_mut().show_value = true;

        let (_, addr) = ins.operands()[0].value(&regs);
        let dst_reg = ins.operands()[1].register_name().map(str::to_string);

        if let Some(reg) = &dst_reg {
            // whatever the destination held before is stale either way
            regs.remove(reg);

            if let Some(addr) = addr {
                regs.set(reg, addr, "lea");
            }
        }

        // no flags affected
        (regs, flags)
    }

    fn flow_leave(
        &self,
        mut regs: RegisterState,
        flags: FlagState,
    ) -> (RegisterState, FlagState) {
        // leave restores rsp from rbp and pops the saved frame base; the
        // popped value is not tracked
        if let Some(rbp) = regs.get("rbp") {
            regs.set("rsp", rbp.wrapping_add(x86::POINTER_WIDTH), "leave");
        }

        regs.remove("rbp");

        // no flags affected
        (regs, flags)
    }

    fn flow_cond_jump(
        &self,
        ins: &mut Instruction,
        regs: RegisterState,
        flags: FlagState,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (RegisterState, FlagState) {
        if !self.config.annotate_jumps {
            return (regs, flags);
        }

        match cond::evaluate(ins.mnemonic(), &flags) {
            Verdict::Met(notes) => ins.add_note(format!("Jump taken{}", notes)),
            Verdict::NotMet(notes) => ins.add_note(format!("Jump NOT taken{}", notes)),
            Verdict::Unknown(_) => {}
            Verdict::Unhandled => diagnostics.push(Diagnostic::UnhandledCondition {
                address: ins.address(),
                mnemonic: ins.mnemonic().to_string(),
            }),
        }

        (regs, flags)
    }

    fn flow_jump(
        &self,
        ins: &mut Instruction,
        regs: RegisterState,
        flags: FlagState,
    ) -> (RegisterState, FlagState) {
        // a dynamic target may have become computable by now: `jmp *%rax`
        // with rax known, or an indirect slot whose address the register
        // state can finally supply
        let (value, slot) = match ins.operands().first() {
            Some(op) => {
                let (value, _) = op.value(&regs);
                let slot = match op.kind() {
                    OperandKind::Memory(mem) if op.is_indirect() => mem.address(&regs),
                    _ => None,
                };

                (value, slot)
            }
            None => (None, None),
        };

        if let Some(target) = value {
            ins.add_target(target);
        } else if let Some(slot) = slot {
            if let Ok(target) = self.frame.read_pointer(slot) {
                ins.add_target(target);
            }
        }

        // no flags affected
        (regs, flags)
    }

    fn flow_cond_move(
        &self,
        ins: &mut Instruction,
        mut regs: RegisterState,
        flags: FlagState,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (RegisterState, FlagState) {
        if ins.operands().len() < 2 {
            return (regs, flags);
        }

        let (src_val, _) = ins.operands()[0].value(&regs);
        let dst_reg = ins.operands()[1].register_name().map(str::to_string);

        // cmovCC shares its condition with the matching jCC
        let equivalent = format!("j{}", &ins.mnemonic()[4..]);

        let message = match cond::evaluate(&equivalent, &flags) {
            Verdict::Met(notes) => match (&dst_reg, src_val) {
                (Some(reg), Some(value)) => {
                    regs.set(reg, value, "cmov");
                    format!("moved{}", notes)
                }
                (Some(reg), None) => {
                    regs.remove(reg);
                    format!("would move, srcval unknown{}", notes)
                }
                (None, _) => format!("moved{}", notes),
            },
            Verdict::NotMet(notes) => format!("not moved{}", notes),
            Verdict::Unknown(flag) => {
                if let Some(reg) = &dst_reg {
                    regs.remove(reg);
                }

                format!("{} is unknown", flag)
            }
            Verdict::Unhandled => {
                diagnostics.push(Diagnostic::UnhandledCondition {
                    address: ins.address(),
                    mnemonic: ins.mnemonic().to_string(),
                });

                return (regs, flags);
            }
        };

        if self.config.annotate_cmov {
            ins.add_note(message);
        }

        // no flags affected
        (regs, flags)
    }

    fn flow_call(&self, regs: RegisterState, flags: FlagState) -> (RegisterState, FlagState) {
        // only the callee-saved registers survive the call boundary
        (
            regs.restricted(x86::CALL_PRESERVED_REGISTERS),
            flags,
        )
    }

    fn flow_ret(&self, flags: FlagState) -> (RegisterState, FlagState) {
        // nothing can be assumed about registers past a return boundary
        (RegisterState::new(), flags)
    }

    fn flow_syscall(
        &self,
        ins: &mut Instruction,
        mut regs: RegisterState,
        mut flags: FlagState,
    ) -> (RegisterState, FlagState) {
        if let Some(number) = regs.get("rax") {
            match self.syscalls.lookup(number) {
                Some(info) => {
                    ins.add_note(info.render(&regs));

                    for name in info.clobbered() {
                        regs.remove(&name);
                    }
                }
                None => ins.add_note(format!("syscall[{}]()", number)),
            }
        }

        // a syscall can return with any flags
        flags.clear();

        (regs, flags)
    }
}
