//! Tables and classifications for x86-64 in AT&T syntax.

use crate::reg::Flag;
use regex::Regex;
use std::fmt;

/// Registers assumed to retain their value across a call boundary, per the
/// System V calling convention.
pub static CALL_PRESERVED_REGISTERS: &[&str] = &["rbx", "rsp", "rbp", "r12", "r13", "r14", "r15"];

/// Names under which the program counter appears in operands.
pub static PC_REGISTERS: &[&str] = &["rip", "eip", "ip", "pc"];

/// Width of a pointer, in bytes.
pub const POINTER_WIDTH: u64 = 8;

static PREFIXES: &[&str] = &[
    "rep", "repe", "repz", "repne", "repnz", "lock", "bnd", "cs", "ss", "ds", "es", "fs", "gs",
];

static RETURN_MNEMONICS: &[&str] = &["ret", "retq", "iret"];

static CONDITIONAL_JUMP_MNEMONICS: &[&str] = &[
    "jo", "jno", "js", "jns", "je", "jz", "jne", "jnz", "jb", "jnae", "jc", "jnb", "jae", "jnc",
    "jbe", "jna", "ja", "jnbe", "jl", "jng", "jge", "jnl", "jle", "jg", "jnle", "jp", "jpe",
    "jnp", "jpo", "jcxz", "jecxz",
];

static UNCONDITIONAL_JUMP_MNEMONICS: &[&str] = &["jmp", "jmpq"];

static CALL_MNEMONICS: &[&str] = &["call", "callq", "int"];

pub fn is_prefix(token: &str) -> bool {
    PREFIXES.contains(&token)
}

pub fn is_return(mnemonic: &str) -> bool {
    RETURN_MNEMONICS.contains(&mnemonic)
}

pub fn is_conditional_jump(mnemonic: &str) -> bool {
    CONDITIONAL_JUMP_MNEMONICS.contains(&mnemonic)
}

pub fn is_unconditional_jump(mnemonic: &str) -> bool {
    UNCONDITIONAL_JUMP_MNEMONICS.contains(&mnemonic)
}

pub fn is_call(mnemonic: &str) -> bool {
    CALL_MNEMONICS.contains(&mnemonic)
}

/// Broad instruction category, assigned once at parse time by the first
/// matching entry of the ordered pattern table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InstrClass {
    Jump,
    Mem,
    Cond,
    Call,
    Ret,
    Nop,
    Vector,
    Math,
    Bit,
    Stack,
    Sys,
    Unknown,
}

impl fmt::Display for InstrClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use InstrClass::*;

        match self {
            Jump => write!(f, "jump"),
            Mem => write!(f, "mem"),
            Cond => write!(f, "cond"),
            Call => write!(f, "call"),
            Ret => write!(f, "ret"),
            Nop => write!(f, "nop"),
            Vector => write!(f, "vector"),
            Math => write!(f, "math"),
            Bit => write!(f, "bit"),
            Stack => write!(f, "stack"),
            Sys => write!(f, "sys"),
            Unknown => write!(f, "unknown"),
        }
    }
}

lazy_static! {
    /// The ordered mnemonic-pattern table. Patterns are anchored at the
    /// start of the mnemonic only; first match wins.
    static ref CLASS_PATTERNS: Vec<(Regex, InstrClass)> = [
        ("j.*|b.*|cb.*", InstrClass::Jump),
        ("[vp]*mov.*|xchg.*|stos", InstrClass::Mem),
        ("[vp]*cmp.*|test.*|cmov.*|[cp]*comisd", InstrClass::Cond),
        ("call.*", InstrClass::Call),
        ("ret.*", InstrClass::Ret),
        ("nop.*|endbr.*", InstrClass::Nop),
        (".*mxcsr|vld.*|vst.*|vcom.*|ucom.*|pxor.*|punpckl.*", InstrClass::Vector),
        (
            "[vp]*sub.*|[vp]*add.*|imul.*|[vp]*mul.*|[vp]*div.*|[vp]*dec.*|[vp]*inc.*|[vp]*neg.*",
            InstrClass::Math,
        ),
        ("[vp]*fmadd.*|[vp]*fmsub.*", InstrClass::Math),
        ("[vp]*fnmadd.*|[vp]*fnmsub.*", InstrClass::Math),
        ("sbb", InstrClass::Math),
        (
            "[vp]*xor.*|[vp]*shr.*|[vp]*and.*|[vp]*or.*|[vp]*shl.*|[vp]*sar.*|[vp]*ror.*|[vp]*not.*",
            InstrClass::Bit,
        ),
        ("psrldq|pslldq", InstrClass::Bit),
        ("push.*|pop.*|lea.*", InstrClass::Stack),
        ("hlt.*|syscall.*|int.*", InstrClass::Sys),
    ]
    .iter()
    .map(|(pattern, class)| {
        let re = Regex::new(&format!("^(?:{})", pattern)).expect("static class pattern");
        (re, *class)
    })
    .collect();
}

/// Classify a mnemonic through the ordered pattern table.
pub fn mnemonic_class(mnemonic: &str) -> InstrClass {
    for (pattern, class) in CLASS_PATTERNS.iter() {
        if pattern.is_match(mnemonic) {
            return *class;
        }
    }

    InstrClass::Unknown
}

/// Transfer-function selector, assigned once at parse time. The flow pass
/// dispatches on this tag through a single closed `match`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowClass {
    Mov,
    MovZero,
    MovSign,
    Push,
    Pop,
    Add,
    Sub,
    Shl,
    Neg,
    Xor,
    Pxor,
    And,
    Test,
    Cmp,
    Lea,
    Leave,
    CondJump,
    Jump,
    CondMove,
    Call,
    Ret,
    Syscall,
    Nop,
    Unmodeled,
}

/// Select the transfer function for a mnemonic. Longer prefixes are tested
/// before the shorter ones they contain.
pub fn flow_class(mnemonic: &str) -> FlowClass {
    use FlowClass::*;

    if is_conditional_jump(mnemonic) {
        return CondJump;
    }
    if is_call(mnemonic) {
        return Call;
    }
    if is_return(mnemonic) {
        return Ret;
    }
    if is_unconditional_jump(mnemonic) {
        return Jump;
    }
    if mnemonic == "leave" {
        return Leave;
    }

    static PREFIX_CLASSES: &[(&str, FlowClass)] = &[
        ("cmov", CondMove),
        ("movz", MovZero),
        ("movs", MovSign),
        ("mov", Mov),
        ("push", Push),
        ("pop", Pop),
        ("add", Add),
        ("sub", Sub),
        ("shl", Shl),
        ("neg", Neg),
        ("pxor", Pxor),
        ("xor", Xor),
        ("and", And),
        ("test", Test),
        ("cmp", Cmp),
        ("lea", Lea),
        ("syscall", Syscall),
        ("nop", Nop),
        ("endbr", Nop),
    ];

    for (prefix, class) in PREFIX_CLASSES {
        if mnemonic.starts_with(prefix) {
            return *class;
        }
    }

    Unmodeled
}

/// Fold the Jcc spelling variants down to the canonical mnemonics the
/// condition table is keyed by.
pub fn canonical_jump(mnemonic: &str) -> &str {
    match mnemonic {
        "jae" => "jnb",
        "jbe" => "jna",
        "jc" => "jb",
        "jnae" => "jb",
        "jnbe" => "ja",
        "jnc" => "jnb",
        "jnge" => "jl",
        "jng" => "jle",
        "jnle" => "jg",
        "jnl" => "jge",
        "jpe" => "jp",
        "jpo" => "jnp",
        "jz" => "je",
        "jnz" => "jne",
        other => other,
    }
}

/// The condition a canonical Jcc mnemonic branches on: whether the terms
/// combine as a disjunction, and the flag bits each term expects.
///
/// The remaining Jcc forms (jcxz and friends) branch on register contents
/// rather than flag bits and have no entry here.
pub fn jump_condition(mnemonic: &str) -> Option<(bool, &'static [(Flag, bool)])> {
    Some(match mnemonic {
        "je" => (false, &[(Flag::Zf, true)]),
        "jne" => (false, &[(Flag::Zf, false)]),
        "jb" => (false, &[(Flag::Cf, true)]),
        "jnb" => (false, &[(Flag::Cf, false)]),
        "ja" => (false, &[(Flag::Zf, false), (Flag::Cf, false)]),
        "jna" => (true, &[(Flag::Cf, true), (Flag::Zf, true)]),
        "jl" => (false, &[(Flag::SfOf, false)]),
        "jge" => (false, &[(Flag::SfOf, true)]),
        "jle" => (true, &[(Flag::Zf, true), (Flag::SfOf, false)]),
        "jg" => (false, &[(Flag::Zf, false), (Flag::SfOf, true)]),
        "jp" => (false, &[(Flag::Pf, true)]),
        "jnp" => (false, &[(Flag::Pf, false)]),
        "js" => (false, &[(Flag::Sf, true)]),
        "jns" => (false, &[(Flag::Sf, false)]),
        "jo" => (false, &[(Flag::Of, true)]),
        "jno" => (false, &[(Flag::Of, false)]),
        _ => return None,
    })
}
