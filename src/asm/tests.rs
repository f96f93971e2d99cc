use crate::analysis::{Context, Diagnostic, Offline};
use crate::arch::x86::InstrClass;
use crate::asm::{Operand, OperandKind, Stream};
use crate::reg::RegisterState;

fn build(lines: &[&str]) -> (Stream, Context) {
    let mut ctx = Context::new();
    let mut stream = Stream::new();

    for line in lines {
        stream.append_line(line, &mut ctx, &Offline);
    }

    (stream, ctx)
}

#[test]
fn test_parse_register_operand() {
    let op = Operand::parse("%rax", false);

    assert_eq!(Some("rax"), op.register_name());
    assert!(!op.is_indirect());
    assert!(!op.is_target());
}

#[test]
fn test_parse_immediate_hex() {
    let op = Operand::parse("$0x18", false);

    assert_eq!(Some(0x18), op.immediate());
    assert_eq!("0x18", op.to_string());
}

#[test]
fn test_parse_immediate_decimal_and_negative() {
    assert_eq!(Some(42), Operand::parse("$42", false).immediate());
    assert_eq!(Some(-8), Operand::parse("$-0x8", false).immediate());
}

#[test]
fn test_parse_full_memory_form() {
    let op = Operand::parse("0x10(%rax,%rbx,8)", false);

    match op.kind() {
        OperandKind::Memory(mem) => {
            assert_eq!(Some("rax"), mem.base.as_deref());
            assert_eq!(Some("rbx"), mem.index.as_deref());
            assert_eq!(8, mem.scale);
            assert_eq!(Some(0x10), mem.offset);
        }
        other => panic!("expected memory operand, got {:?}", other),
    }
}

#[test]
fn test_parse_register_only_memory_form() {
    let op = Operand::parse("(%rax)", false);

    match op.kind() {
        OperandKind::Memory(mem) => {
            assert_eq!(Some("rax"), mem.base.as_deref());
            assert_eq!(None, mem.index);
            assert_eq!(None, mem.offset);
        }
        other => panic!("expected memory operand, got {:?}", other),
    }
}

#[test]
fn test_parse_negative_offset_memory_form() {
    let op = Operand::parse("-0x8(%rbp)", false);

    match op.kind() {
        OperandKind::Memory(mem) => {
            assert_eq!(Some("rbp"), mem.base.as_deref());
            assert_eq!(Some(-8), mem.offset);
        }
        other => panic!("expected memory operand, got {:?}", other),
    }
}

#[test]
fn test_parse_two_component_memory_form() {
    let op = Operand::parse("(%rax,%rbx)", false);

    match op.kind() {
        OperandKind::Memory(mem) => {
            assert_eq!(Some("rax"), mem.base.as_deref());
            assert_eq!(Some("rbx"), mem.index.as_deref());
            assert_eq!(1, mem.scale);
        }
        other => panic!("expected memory operand, got {:?}", other),
    }
}

#[test]
fn test_parse_rip_relative_form() {
    let op = Operand::parse("0x2e75(%rip)", false);

    match op.kind() {
        OperandKind::Memory(mem) => {
            assert!(mem.is_pc_relative());
            assert_eq!(Some(0x2e75), mem.offset);
        }
        other => panic!("expected memory operand, got {:?}", other),
    }
}

#[test]
fn test_parse_indirect_and_segment() {
    let op = Operand::parse("*0x10(%rax)", false);
    assert!(op.is_indirect());
    assert!(op.is_deref());

    let op = Operand::parse("%fs:0x28", false);
    assert_eq!(Some("fs"), op.segment());
}

#[test]
fn test_parse_bare_target_literal() {
    let op = Operand::parse("0x401234", false);

    assert_eq!(&OperandKind::Target(0x401234), op.kind());
}

#[test]
fn test_unparseable_operand_is_empty_not_an_error() {
    let op = Operand::parse("!!garbage!!", false);

    assert_eq!(&OperandKind::Empty, op.kind());
    assert_eq!("!!garbage!!", op.text());
    assert_eq!((None, None), op.value(&RegisterState::new()));
}

#[test]
fn test_effective_address_computation() {
    let mut regs = RegisterState::new();
    regs.set("rax", 0x1000, "seed");
    regs.set("rbx", 0x10, "seed");

    let op = Operand::parse("0x8(%rax,%rbx,4)", false);
    let (value, addr) = op.value(&regs);

    // contents are never simulated, only the address is known
    assert_eq!(None, value);
    assert_eq!(Some(0x1000 + 0x10 * 4 + 0x8), addr);
}

#[test]
fn test_effective_address_needs_written_registers() {
    let regs = RegisterState::new();
    let op = Operand::parse("0x8(%rax)", false);

    assert_eq!((None, None), op.value(&regs));
}

#[test]
fn test_mov_line_roundtrip() {
    let (stream, _) = build(&["0x401136 <main+4>: bf 18 00 00 00 mov $0x18,%edi"]);
    let ins = stream.get(0).unwrap();

    assert_eq!(0x401136, ins.address());
    assert_eq!(Some("<main+4>"), ins.symbol());
    assert_eq!(5, ins.size());
    assert_eq!("mov", ins.mnemonic());
    assert_eq!(InstrClass::Mem, ins.class());
    assert_eq!(2, ins.operands().len());
    assert_eq!(Some(0x18), ins.operands()[0].immediate());
    assert!(!ins.operands()[0].is_target());
    assert_eq!(Some("edi"), ins.operands()[1].register_name());
    assert!(ins.operands()[1].is_target());
}

#[test]
fn test_comma_spaced_memory_operand_stays_whole() {
    let (stream, _) = build(&["0x1000: mov 0x0(%rax, %rbx, 8),%rcx"]);
    let ins = stream.get(0).unwrap();

    assert_eq!(2, ins.operands().len());
    assert!(ins.operands()[0].is_deref());
    assert_eq!(Some("rcx"), ins.operands()[1].register_name());
}

#[test]
fn test_prefix_is_consumed() {
    let (stream, _) = build(&["0x1000: f3 90 rep nop"]);
    let ins = stream.get(0).unwrap();

    assert_eq!(Some("rep"), ins.prefix());
    assert_eq!("nop", ins.mnemonic());
    assert_eq!(2, ins.size());
}

#[test]
fn test_jump_literal_target_and_name() {
    let (stream, _) = build(&["0x401141: 74 0c je 0x40114f <main+29>"]);
    let ins = stream.get(0).unwrap();

    assert!(ins.is_conditional_jump());
    assert!(ins.is_jump());
    assert!(ins.targets().contains(&0x40114f));
    assert_eq!(Some("<main+29>"), ins.target_name());
}

#[test]
fn test_rip_reference_annotation() {
    let (stream, _) = build(&["0x401150: 48 8b 05 75 2e 00 00 mov 0x2e75(%rip),%rax # 0x403fcc <x>"]);
    let ins = stream.get(0).unwrap();

    assert_eq!(1, ins.reference().len());
    assert_eq!("0x403fcc <x>", ins.reference()[0]);
}

#[test]
fn test_linkage_is_wired_forward_and_back() {
    let (stream, _) = build(&["0x1000: mov $0x1,%eax", "0x1005: add $0x2,%eax"]);

    assert_eq!(Some(1), stream.get(0).unwrap().next());
    assert_eq!(Some(0), stream.get(1).unwrap().previous());
}

#[test]
fn test_linkage_breaks_across_return() {
    let (stream, _) = build(&["0x1000: ret", "0x1001: mov $0x1,%eax"]);

    // the line after a ret is not control-flow-reachable from it
    assert_eq!(None, stream.get(0).unwrap().next());
    assert_eq!(None, stream.get(1).unwrap().previous());
}

#[test]
fn test_walk_follows_links() {
    let (stream, _) = build(&[
        "0x1000: mov $0x1,%eax",
        "0x1005: add $0x2,%eax",
        "0x100a: ret",
    ]);

    let forward: Vec<&str> = stream.walk_from(0).map(|ins| ins.mnemonic()).collect();
    assert_eq!(vec!["mov", "add", "ret"], forward);

    let backward: Vec<&str> = stream.walk_back(2).map(|ins| ins.mnemonic()).collect();
    assert_eq!(vec!["ret", "add", "mov"], backward);
}

#[test]
fn test_cmp_updates_comparison_context() {
    let (_, ctx) = build(&["0x1000: cmp $0x5,%eax"]);

    assert_eq!(5, ctx.last_cmp_immediate);
}

#[test]
fn test_three_operands_raise_a_diagnostic_and_no_target() {
    let (stream, _) = build(&["0x1000: imul $0x2,%rax,%rbx"]);
    let ins = stream.get(0).unwrap();

    assert_eq!(3, ins.operands().len());
    assert!(ins.operands().iter().all(|op| !op.is_target()));
    assert!(stream
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::TooManyOperands { count: 3, .. })));
}

#[test]
fn test_unresolvable_jump_raises_a_diagnostic() {
    let (stream, _) = build(&["0x1000: ff e0 jmp *%rax"]);
    let ins = stream.get(0).unwrap();

    assert!(ins.targets().is_empty());
    assert!(stream
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::JumpWithoutTargets { address: 0x1000 })));
}

#[test]
fn test_malformed_line_degrades_to_empty_instruction() {
    let (stream, _) = build(&["0x1000:"]);
    let ins = stream.get(0).unwrap();

    assert_eq!(0x1000, ins.address());
    assert_eq!("", ins.mnemonic());
    assert_eq!(InstrClass::Unknown, ins.class());
    assert!(ins.operands().is_empty());
}
