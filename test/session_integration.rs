//! Integration Tests for Sessions
//!
//! End-to-end use of a session the way a wrapper layer drives it:
//! configuration from disk, objects, vectors, helper events and teardown.

use std::thread;

use sysbind::config::CONFIG_FILE_NAME;
use sysbind::{HostEvent, HostTable, HostValue, PollFd, Session, SysbindConfig};

fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("sysbind-session-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_session_from_config_file() -> anyhow::Result<()> {
    let dir = scratch_dir("config");
    std::fs::write(
        dir.join(CONFIG_FILE_NAME),
        "[buffer]\nmax_allocation = 32\n\n[bridge]\nmax_cardinality = 2\n",
    )?;

    let config = SysbindConfig::find_and_load(&dir)?;
    let mut session = Session::open(config)?;
    assert!(session.new_object("buffer", &HostValue::Integer(64)).is_err());

    let handles: Vec<_> = (0..3)
        .map(|_| session.new_object("timespec", &HostValue::Nil))
        .collect::<Result<_, _>>()?;
    let table = HostTable::from_sequence(handles);
    assert!(session.import_vector(&table, "timespec").is_err());

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn test_wrapper_style_flow() -> anyhow::Result<()> {
    let mut session = Session::open(SysbindConfig::default())?;

    // Build pollfds, pack them for a native call, then unpack the results
    let mut entries = Vec::new();
    for fd in 0..3i64 {
        let mut init = HostTable::new();
        init.set_field("fd", fd);
        init.set_field("events", i64::from(libc::POLLIN));
        entries.push(session.new_object("pollfd", &HostValue::Table(init))?);
    }
    let request = HostTable::from_sequence(entries);
    let mut packed = session.import_vector(&request, "pollfd")?;

    let mut fired: PollFd = packed.read(1)?;
    fired.revents = libc::POLLIN;
    packed.write(1, &fired)?;

    let mut results = HostTable::new();
    session.export_vector(&mut packed, &mut results, true, true)?;

    let ready: Vec<bool> = results
        .sequence()
        .map(|v| {
            let h = v.as_handle().expect("handle");
            session.call(h, "ready", &[]).into_values()[0] == HostValue::Boolean(true)
        })
        .collect();
    assert_eq!(ready, vec![false, true, false]);
    Ok(())
}

#[test]
fn test_helper_events_reach_host_thread() {
    let session = Session::open(SysbindConfig::default()).unwrap();
    let helpers: Vec<_> = [2, 15]
        .into_iter()
        .map(|signo| {
            let tx = session.handoff().clone();
            thread::spawn(move || tx.push(HostEvent::Signal { signo }))
        })
        .collect();
    for h in helpers {
        h.join().unwrap().unwrap();
    }

    let mut signals: Vec<_> = session
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            HostEvent::Signal { signo } => Some(signo),
            _ => None,
        })
        .collect();
    signals.sort_unstable();
    assert_eq!(signals, vec![2, 15]);
    assert!(session.drain_events().is_empty());
}

#[test]
fn test_drop_releases_objects() {
    let tx;
    {
        let mut session = Session::open(SysbindConfig::default()).unwrap();
        session.new_object("buffer", &HostValue::from("scratch")).unwrap();
        tx = session.handoff().clone();
    }
    assert!(tx.is_closed());
    assert!(tx.push(HostEvent::Timer { id: 1, expirations: 1 }).is_err());
}
