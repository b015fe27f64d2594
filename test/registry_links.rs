//! Integration Tests for the Object Registry
//!
//! Handle lifecycle, weak links and the host return convention, using the
//! built-in types.

use sysbind::config::BufferConfig;
use sysbind::{register_builtin_types, CoreError, HostReturn, HostValue, ObjectRegistry};

fn registry() -> ObjectRegistry {
    let mut reg = ObjectRegistry::new();
    register_builtin_types(&mut reg, &BufferConfig::default()).unwrap();
    reg
}

// =============================================================================
// Weak Links
// =============================================================================

#[test]
fn test_relinking_leaves_old_buffer_intact() {
    let mut reg = registry();
    let old = reg.new_handle("buffer", &HostValue::from("old contents")).unwrap();
    let new = reg.new_handle("buffer", &HostValue::from("new")).unwrap();
    let iov = reg.new_handle("iovec", &HostValue::Nil).unwrap();

    reg.invoke(iov, "attach", &[HostValue::Object(old)]).unwrap();
    reg.invoke(iov, "attach", &[HostValue::Object(new)]).unwrap();

    assert_eq!(reg.find(iov, "iov_base").unwrap(), new);
    assert!(reg.contains(old));
    assert_eq!(reg.buffer(old).unwrap().as_slice(), b"old contents");
    assert_eq!(reg.get_field(iov, "iov_len").unwrap(), HostValue::Integer(3));
}

#[test]
fn test_destroying_target_severs_every_link() {
    let mut reg = registry();
    let buf = reg.new_handle("buffer", &HostValue::Integer(4)).unwrap();
    let owners: Vec<_> = (0..3)
        .map(|_| reg.new_handle("iovec", &HostValue::Nil).unwrap())
        .collect();
    for &owner in &owners {
        reg.link(owner, "iov_base", buf).unwrap();
    }

    assert!(reg.destroy(buf).unwrap());
    for &owner in &owners {
        assert!(matches!(
            reg.find(owner, "iov_base"),
            Err(CoreError::NotFound(_))
        ));
    }
}

#[test]
fn test_destroying_owner_leaves_target() {
    let mut reg = registry();
    let buf = reg.new_handle("buffer", &HostValue::from("data")).unwrap();
    let iov = reg.new_handle("iovec", &HostValue::Nil).unwrap();
    reg.link(iov, "iov_base", buf).unwrap();

    reg.destroy(iov).unwrap();
    assert_eq!(reg.buffer(buf).unwrap().as_slice(), b"data");
}

// =============================================================================
// Lifecycle and Dispatch
// =============================================================================

#[test]
fn test_finalization_is_idempotent() {
    let mut reg = registry();
    let h = reg.new_handle("pollfd", &HostValue::Nil).unwrap();
    assert!(reg.destroy(h).unwrap());
    assert!(!reg.destroy(h).unwrap());
    assert!(reg.call(h, "__gc", &[]).is_ok());
}

#[test]
fn test_locked_buffer_survives_finalization() {
    let mut reg = registry();
    let h = reg.new_handle("buffer", &HostValue::from("held")).unwrap();
    reg.invoke(h, "lock", &[]).unwrap();

    let ret = reg.call(h, "__gc", &[]);
    assert_eq!(ret.code(), Some(libc::EBUSY));
    assert!(reg.contains(h));

    reg.invoke(h, "unlock", &[]).unwrap();
    assert!(reg.call(h, "__gc", &[]).is_ok());
    assert!(!reg.contains(h));
}

#[test]
fn test_failures_use_three_value_convention() {
    let mut reg = registry();
    let h = reg.new_handle("buffer", &HostValue::Integer(8)).unwrap();

    let ret = reg.call(h, "set_length", &[HostValue::Integer(1)]);
    let values = ret.clone().into_values();
    assert_eq!(values.len(), 3);
    assert_eq!(values[0], HostValue::Nil);
    assert_eq!(values[1], HostValue::Integer(i64::from(libc::ERANGE)));
    assert!(values[2].as_str().unwrap().starts_with("Range error"));

    match reg.call(h, "set_length", &[HostValue::from("two")]) {
        HostReturn::Failed { code, .. } => assert_eq!(code, libc::EINVAL),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_tostring_and_len() {
    let mut reg = registry();
    let h = reg.new_handle("buffer", &HostValue::from("hello")).unwrap();
    let text = reg.invoke(h, "__tostring", &[]).unwrap();
    assert!(text.as_str().unwrap().starts_with("buffer: "));
    assert!(text.as_str().unwrap().contains("owned buffer 5/5"));
    assert_eq!(reg.invoke(h, "__len", &[]).unwrap(), HostValue::Integer(5));

    let ts = reg.new_handle("timespec", &HostValue::Nil).unwrap();
    assert_eq!(reg.invoke(ts, "__len", &[]).unwrap(), HostValue::Integer(16));
}

#[test]
fn test_table_decode_round_trip() {
    let mut reg = registry();
    let pfd = reg.new_handle("pollfd", &HostValue::Nil).unwrap();
    reg.set_field(pfd, "fd", &HostValue::Integer(5)).unwrap();
    reg.set_field(pfd, "events", &HostValue::Integer(1)).unwrap();

    let table = reg.to_table(pfd).unwrap();
    let copy = reg.from_table("pollfd", &table).unwrap();
    assert_ne!(copy, pfd);
    assert_eq!(reg.to_table(copy).unwrap(), table);
}
