use crate::reg::{Flag, FlagState, RegisterState};

#[test]
fn test_absent_register_is_unknown() {
    let regs = RegisterState::new();

    assert_eq!(None, regs.get("rax"));
    assert_eq!(None, regs.get_origin("rax"));
    assert!(regs.is_empty());
}

#[test]
fn test_set_get_roundtrip() {
    let mut regs = RegisterState::new();

    regs.set("rdi", 0x18, "mov");

    assert_eq!(Some(0x18), regs.get("rdi"));
    assert_eq!(Some("mov"), regs.get_origin("rdi"));
    assert_eq!(1, regs.len());
}

#[test]
fn test_remove_forgets_value() {
    let mut regs = RegisterState::new();

    regs.set("rax", 7, "mov");
    regs.remove("rax");

    assert_eq!(None, regs.get("rax"));
}

#[test]
fn test_restricted_copy_keeps_only_named() {
    let mut regs = RegisterState::new();

    regs.set("rax", 1, "mov");
    regs.set("rbx", 2, "mov");
    regs.set("rsp", 3, "push");

    let copy = regs.restricted(&["rbx", "rsp", "r12"]);

    assert_eq!(None, copy.get("rax"));
    assert_eq!(Some(2), copy.get("rbx"));
    assert_eq!(Some(3), copy.get("rsp"));
    assert_eq!(None, copy.get("r12"));
    assert_eq!(2, copy.len());
}

#[test]
fn test_flag_absent_is_unknown() {
    let flags = FlagState::new();

    assert_eq!(None, flags.get(Flag::Zf));
}

#[test]
fn test_flag_set_get() {
    let mut flags = FlagState::new();

    flags.set(Flag::Cf, true);

    assert_eq!(Some(true), flags.get(Flag::Cf));
    assert_eq!(None, flags.get(Flag::Zf));
}

#[test]
fn test_unset_is_indistinguishable_from_never_set() {
    let mut flags = FlagState::new();

    flags.set(Flag::Zf, true);
    flags.set(Flag::Cf, false);
    flags.unset(&[Flag::Zf, Flag::Cf]);

    assert_eq!(None, flags.get(Flag::Zf));
    assert_eq!(None, flags.get(Flag::Cf));
    assert!(flags.is_empty());
}

#[test]
fn test_set_result_derives_zf() {
    let mut flags = FlagState::new();

    flags.set_result(0);
    assert_eq!(Some(true), flags.get(Flag::Zf));

    flags.set_result(5);
    assert_eq!(Some(false), flags.get(Flag::Zf));
}

#[test]
fn test_clear_resets_everything() {
    let mut flags = FlagState::new();

    flags.set(Flag::Zf, true);
    flags.set(Flag::Cf, true);
    flags.clear();

    assert!(flags.is_empty());
    assert_eq!(None, flags.get(Flag::Zf));
}

#[test]
fn test_sf_of_composite_tracks_both_halves() {
    let mut flags = FlagState::new();

    flags.set(Flag::Sf, true);
    assert_eq!(None, flags.get(Flag::SfOf));

    flags.set(Flag::Of, true);
    assert_eq!(Some(true), flags.get(Flag::SfOf));

    flags.set(Flag::Of, false);
    assert_eq!(Some(false), flags.get(Flag::SfOf));
}

#[test]
fn test_unsetting_a_half_invalidates_sf_of() {
    let mut flags = FlagState::new();

    flags.set(Flag::Sf, true);
    flags.set(Flag::Of, true);
    assert_eq!(Some(true), flags.get(Flag::SfOf));

    flags.unset(&[Flag::Of]);
    assert_eq!(None, flags.get(Flag::SfOf));
}

#[test]
fn test_from_eflags_decodes_known_bits() {
    // ZF and CF set, everything else clear
    let flags = FlagState::from_eflags((1 << 6) | 1);

    assert_eq!(Some(true), flags.get(Flag::Zf));
    assert_eq!(Some(true), flags.get(Flag::Cf));
    assert_eq!(Some(false), flags.get(Flag::Sf));
    assert_eq!(Some(false), flags.get(Flag::Of));
    assert_eq!(Some(false), flags.get(Flag::Pf));
    assert_eq!(Some(false), flags.get(Flag::Af));
    assert_eq!(Some(true), flags.get(Flag::SfOf));
}

#[test]
fn test_flag_display_names() {
    assert_eq!("ZF", Flag::Zf.to_string());
    assert_eq!("SF_OF", Flag::SfOf.to_string());
    assert_eq!(Ok(Flag::Cf), "CF".parse::<Flag>());
}
