use crate::arch::x86::{self, FlowClass, InstrClass};
use crate::reg::Flag;

#[test]
fn test_mnemonic_class_table() {
    assert_eq!(InstrClass::Jump, x86::mnemonic_class("jmp"));
    assert_eq!(InstrClass::Jump, x86::mnemonic_class("je"));
    assert_eq!(InstrClass::Mem, x86::mnemonic_class("mov"));
    assert_eq!(InstrClass::Mem, x86::mnemonic_class("movzbl"));
    assert_eq!(InstrClass::Cond, x86::mnemonic_class("cmp"));
    assert_eq!(InstrClass::Cond, x86::mnemonic_class("test"));
    assert_eq!(InstrClass::Cond, x86::mnemonic_class("cmove"));
    assert_eq!(InstrClass::Call, x86::mnemonic_class("callq"));
    assert_eq!(InstrClass::Ret, x86::mnemonic_class("retq"));
    assert_eq!(InstrClass::Nop, x86::mnemonic_class("endbr64"));
    assert_eq!(InstrClass::Math, x86::mnemonic_class("add"));
    assert_eq!(InstrClass::Math, x86::mnemonic_class("imul"));
    assert_eq!(InstrClass::Bit, x86::mnemonic_class("xor"));
    assert_eq!(InstrClass::Stack, x86::mnemonic_class("push"));
    assert_eq!(InstrClass::Stack, x86::mnemonic_class("lea"));
    assert_eq!(InstrClass::Sys, x86::mnemonic_class("syscall"));
    assert_eq!(InstrClass::Unknown, x86::mnemonic_class("frobnicate"));
}

#[test]
fn test_class_table_order_is_first_match() {
    // pxor sits in the vector row, which outranks the bit row that its
    // [vp]*xor.* pattern would also match
    assert_eq!(InstrClass::Vector, x86::mnemonic_class("pxor"));
}

#[test]
fn test_flow_class_selection() {
    assert_eq!(FlowClass::Mov, x86::flow_class("mov"));
    assert_eq!(FlowClass::Mov, x86::flow_class("movq"));
    assert_eq!(FlowClass::MovZero, x86::flow_class("movzbl"));
    assert_eq!(FlowClass::MovSign, x86::flow_class("movsbl"));
    assert_eq!(FlowClass::CondMove, x86::flow_class("cmove"));
    assert_eq!(FlowClass::CondJump, x86::flow_class("je"));
    assert_eq!(FlowClass::Jump, x86::flow_class("jmp"));
    assert_eq!(FlowClass::Call, x86::flow_class("call"));
    assert_eq!(FlowClass::Ret, x86::flow_class("retq"));
    assert_eq!(FlowClass::Lea, x86::flow_class("lea"));
    assert_eq!(FlowClass::Leave, x86::flow_class("leave"));
    assert_eq!(FlowClass::Pxor, x86::flow_class("pxor"));
    assert_eq!(FlowClass::Xor, x86::flow_class("xorl"));
    assert_eq!(FlowClass::Syscall, x86::flow_class("syscall"));
    assert_eq!(FlowClass::Nop, x86::flow_class("endbr64"));
    assert_eq!(FlowClass::Unmodeled, x86::flow_class("imul"));
}

#[test]
fn test_jump_aliases_fold_to_canonical() {
    assert_eq!("je", x86::canonical_jump("jz"));
    assert_eq!("jne", x86::canonical_jump("jnz"));
    assert_eq!("jnb", x86::canonical_jump("jae"));
    assert_eq!("jb", x86::canonical_jump("jc"));
    assert_eq!("jle", x86::canonical_jump("jng"));
    assert_eq!("je", x86::canonical_jump("je"));
}

#[test]
fn test_jump_conditions() {
    let (any_of, terms) = x86::jump_condition("je").unwrap();
    assert!(!any_of);
    assert_eq!(&[(Flag::Zf, true)], terms);

    let (any_of, terms) = x86::jump_condition("jna").unwrap();
    assert!(any_of);
    assert_eq!(&[(Flag::Cf, true), (Flag::Zf, true)], terms);

    // jcxz branches on a register, not on flags
    assert!(x86::jump_condition("jcxz").is_none());
}

#[test]
fn test_mnemonic_sets() {
    assert!(x86::is_prefix("rep"));
    assert!(x86::is_prefix("lock"));
    assert!(!x86::is_prefix("mov"));
    assert!(x86::is_return("ret"));
    assert!(x86::is_return("iret"));
    assert!(x86::is_call("callq"));
    assert!(x86::is_conditional_jump("jne"));
    assert!(x86::is_unconditional_jump("jmpq"));
    assert!(!x86::is_conditional_jump("jmp"));
}
