//! Resolution of jump and call targets, including computed jump tables.

use crate::analysis::{Context, Diagnostic, FrameView};
use crate::arch::x86;
use crate::asm::{Instruction, MemoryRef, OperandKind};
use crate::reg::RegisterState;

/// Populate a jump-like instruction's target set from its first operand:
/// a literal address directly, an indirect memory form through the live
/// target. Raises a diagnostic when nothing could be resolved.
pub(crate) fn populate_targets<F>(
    ins: &mut Instruction,
    ctx: &Context,
    frame: &F,
    diagnostics: &mut Vec<Diagnostic>,
) where
    F: FrameView,
{
    let resolved = ins.operand(0).map(|op| match op.kind() {
        OperandKind::Target(address) => Resolution::Literal(*address),
        OperandKind::Memory(mem) if op.is_indirect() => Resolution::Indirect(mem.clone()),
        _ => Resolution::None,
    });

    match resolved {
        Some(Resolution::Literal(address)) => ins.add_target(address),
        Some(Resolution::Indirect(mem)) => resolve_indirect(ins, &mem, ctx, frame),
        _ => {}
    }

    if ins.targets().is_empty() {
        diagnostics.push(Diagnostic::JumpWithoutTargets {
            address: ins.address(),
        });
    }
}

enum Resolution {
    Literal(u64),
    Indirect(MemoryRef),
    None,
}

/// Resolve a `*offset(%reg)` operand.
///
/// The rip-relative case dereferences through the live target using a
/// synthetic register state in which only the program counter is known.
/// A written literal offset is additionally treated as the base of a
/// possible jump table: consecutive pointer-sized entries are read until
/// a zero entry, a failed read, or the comparison bound. A preceding
/// `cmp $N` usually governs the default case of the computed switch, so
/// the walk performs at most N+1 reads.
fn resolve_indirect<F>(ins: &mut Instruction, mem: &MemoryRef, ctx: &Context, frame: &F)
where
    F: FrameView,
{
    // on x86 the rip seen by the operand already points past this
    // instruction
    let next_ip = ins.address().wrapping_add(ins.size());
    let mut pc = RegisterState::new();

    for name in x86::PC_REGISTERS {
        pc.set(name, next_ip, "pc");
    }

    if let Some(addr) = mem.address(&pc) {
        if let Ok(value) = frame.read_pointer(addr) {
            ins.add_target(value);
        }
    }

    if let Some(table) = mem.offset.filter(|offset| *offset > 0) {
        let table = table as u64;
        let mut count: i64 = 0;

        loop {
            if count > ctx.last_cmp_immediate {
                break;
            }

            let entry_addr = table.wrapping_add(count as u64 * x86::POINTER_WIDTH);

            match frame.read_pointer(entry_addr) {
                Ok(0) | Err(_) => break,
                Ok(entry) => {
                    ins.add_target(entry);
                    count += 1;
                }
            }
        }

        ins.add_note(format!("{} computed jump targets", ins.targets().len()));
    }
}
