// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use std::{
    env,
    ffi::{CString, c_char, c_int},
    ptr,
    sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc},
    thread,
    time::Duration,
};

use netforce_control::{
    BackendError, BackendStrategy, NetBackend, NetControl, NetControlOptions,
    NetHandle, SimulatedBackend,
};
use netforce_dpi::{
    force_net_by_name, force_net_by_name_dpi, get_net_value_by_name,
    get_net_value_by_name_checked, get_net_value_by_name_dpi, install,
    release_net_by_name, release_net_by_name_dpi, uninstall,
};

/// The session is process-wide, so tests take turns with it.
static SERIAL: Mutex<()> = Mutex::new(());

/// Lets the test inspect the simulation after handing it to the session.
#[derive(Clone)]
struct Shared(Arc<Mutex<SimulatedBackend>>);

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SimulatedBackend> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NetBackend for Shared {
    fn resolve(&mut self, name: &str) -> Option<NetHandle> {
        self.lock().resolve(name)
    }

    fn get_value(&mut self, handle: NetHandle) -> Result<i32, BackendError> {
        self.lock().get_value(handle)
    }

    fn force_value(
        &mut self,
        handle: NetHandle,
        value: i32,
    ) -> Result<(), BackendError> {
        self.lock().force_value(handle, value)
    }

    fn release_value(&mut self, handle: NetHandle) -> Result<(), BackendError> {
        self.lock().release_value(handle)
    }

    fn diagnostic(&mut self, message: &str) {
        self.lock().diagnostic(message)
    }

    fn discard(&mut self, handle: NetHandle) {
        self.lock().discard(handle)
    }

    fn strategy(&self) -> BackendStrategy {
        self.lock().strategy()
    }
}

/// What a simulator callback saw when it called back into the shim.
#[derive(PartialEq, Eq, Debug)]
struct CallBack {
    read: c_int,
    checked_status: c_int,
    checked_value: c_int,
    force_status: c_int,
}

/// Calls back into the shim from inside every force, as a value-change
/// callback run by the simulator would.
struct CallsBack {
    inner: Shared,
    seen: Arc<Mutex<Vec<CallBack>>>,
}

impl NetBackend for CallsBack {
    fn resolve(&mut self, name: &str) -> Option<NetHandle> {
        self.inner.resolve(name)
    }

    fn get_value(&mut self, handle: NetHandle) -> Result<i32, BackendError> {
        self.inner.get_value(handle)
    }

    fn force_value(
        &mut self,
        handle: NetHandle,
        value: i32,
    ) -> Result<(), BackendError> {
        let clk = c"top.clk";
        let mut checked_value = 42;
        let seen = unsafe {
            CallBack {
                read: get_net_value_by_name(clk.as_ptr()),
                checked_status: get_net_value_by_name_checked(
                    clk.as_ptr(),
                    &mut checked_value,
                ),
                checked_value,
                force_status: force_net_by_name_dpi(clk.as_ptr(), 7),
            }
        };
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(seen);
        self.inner.force_value(handle, value)
    }

    fn release_value(&mut self, handle: NetHandle) -> Result<(), BackendError> {
        self.inner.release_value(handle)
    }

    fn diagnostic(&mut self, message: &str) {
        self.inner.diagnostic(message)
    }

    fn discard(&mut self, handle: NetHandle) {
        self.inner.discard(handle)
    }

    fn strategy(&self) -> BackendStrategy {
        self.inner.strategy()
    }
}

fn setup(
    strategy: BackendStrategy,
    options: NetControlOptions,
) -> (MutexGuard<'static, ()>, Shared) {
    let serial = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    if env::var("RUST_LOG").is_ok() {
        let _ = env_logger::try_init();
    }

    let shared = Shared(Arc::new(Mutex::new(
        SimulatedBackend::new(strategy).with_net("top.clk", 0),
    )));
    let backend: Box<dyn NetBackend + Send> = Box::new(shared.clone());
    install(NetControl::new(backend, options));
    (serial, shared)
}

fn name(name: &str) -> CString {
    CString::new(name).expect("test names have no NUL bytes")
}

#[test]
fn native_surface_forces_and_releases() {
    let (_serial, shared) =
        setup(BackendStrategy::PutValue, NetControlOptions::default());
    let clk = name("top.clk");

    unsafe {
        force_net_by_name(clk.as_ptr(), 1);
        assert_eq!(get_net_value_by_name(clk.as_ptr()), 1);
        release_net_by_name(clk.as_ptr());
        assert_eq!(get_net_value_by_name(clk.as_ptr()), 0);
    }

    assert!(shared.lock().diagnostics().is_empty());
    uninstall();
}

#[test]
fn missing_net_reads_sentinel_and_reports_once() {
    let (_serial, shared) =
        setup(BackendStrategy::PutValue, NetControlOptions::default());
    let missing = name("top.nonexistent");

    assert_eq!(unsafe { get_net_value_by_name(missing.as_ptr()) }, -1);
    assert_eq!(unsafe { get_net_value_by_name_dpi(missing.as_ptr()) }, -1);

    let diagnostics = shared.lock().take_diagnostics();
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics.iter().all(|line| line.contains("not found")));
    uninstall();
}

#[test]
fn dpi_wrappers_report_success_regardless() {
    let (_serial, shared) =
        setup(BackendStrategy::ForcePrimitive, NetControlOptions::default());
    let missing = name("top.nonexistent");
    let clk = name("top.clk");

    unsafe {
        assert_eq!(force_net_by_name_dpi(missing.as_ptr(), 1), 0);
        assert_eq!(release_net_by_name_dpi(missing.as_ptr()), 0);
        assert_eq!(release_net_by_name_dpi(clk.as_ptr()), 0);
    }

    let backend = shared.lock();
    assert_eq!(backend.diagnostics().len(), 3);
    assert_eq!(backend.mutations(), 0);
    drop(backend);
    uninstall();
}

#[test]
fn strict_status_surfaces_failures() {
    let (_serial, shared) = setup(
        BackendStrategy::ForcePrimitive,
        NetControlOptions {
            strict_status: true,
            ..Default::default()
        },
    );
    let missing = name("top.nonexistent");
    let clk = name("top.clk");

    unsafe {
        assert_eq!(force_net_by_name_dpi(missing.as_ptr(), 1), 1);
        assert_eq!(force_net_by_name_dpi(clk.as_ptr(), 1), 0);
        assert_eq!(release_net_by_name_dpi(clk.as_ptr()), 0);
        assert_eq!(release_net_by_name_dpi(clk.as_ptr()), 1);
    }

    let diagnostics = shared.lock().take_diagnostics();
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics[1].contains("(release)"));
    uninstall();
}

#[test]
fn checked_read_separates_failure_from_minus_one() {
    let (_serial, shared) =
        setup(BackendStrategy::PutValue, NetControlOptions::default());
    let clk = name("top.clk");
    let missing = name("top.nonexistent");

    unsafe {
        force_net_by_name(clk.as_ptr(), -1);

        let mut value = 42;
        assert_eq!(get_net_value_by_name_checked(clk.as_ptr(), &mut value), 0);
        assert_eq!(value, -1);

        let mut value = 42;
        assert_eq!(
            get_net_value_by_name_checked(missing.as_ptr(), &mut value),
            1
        );
        assert_eq!(value, 42);

        assert_eq!(get_net_value_by_name_checked(clk.as_ptr(), ptr::null_mut()), 1);
    }

    assert_eq!(shared.lock().diagnostics().len(), 1);
    uninstall();
}

#[test]
fn null_and_non_utf8_names_are_not_found() {
    let (_serial, shared) =
        setup(BackendStrategy::PutValue, NetControlOptions::default());
    let invalid = CString::new(vec![b't', b'o', b'p', b'.', 0xff])
        .expect("no NUL bytes");

    unsafe {
        force_net_by_name(ptr::null::<c_char>(), 1);
        assert_eq!(get_net_value_by_name(invalid.as_ptr()), -1);
    }

    let backend = shared.lock();
    assert_eq!(backend.mutations(), 0);
    assert_eq!(
        backend.diagnostics()[0],
        "Error: (force) net '<null>' not found."
    );
    assert!(backend.diagnostics()[1].contains("not found"));
    drop(backend);
    uninstall();
}

#[test]
fn without_a_simulator_operations_have_no_effect() {
    let _serial = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    uninstall();
    let clk = name("top.clk");

    unsafe {
        force_net_by_name(clk.as_ptr(), 1);
        assert_eq!(force_net_by_name_dpi(clk.as_ptr(), 1), 0);
        assert_eq!(get_net_value_by_name(clk.as_ptr()), -1);
    }
}

#[test]
fn calls_back_from_inside_a_force_fail_without_blocking() {
    let (_serial, shared) =
        setup(BackendStrategy::PutValue, NetControlOptions::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let backend: Box<dyn NetBackend + Send> = Box::new(CallsBack {
        inner: shared.clone(),
        seen: seen.clone(),
    });
    install(NetControl::new(
        backend,
        NetControlOptions {
            strict_status: true,
            ..Default::default()
        },
    ));

    // On its own thread so that a hang fails the test instead of stalling it.
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let clk = c"top.clk";
        let status = unsafe { force_net_by_name_dpi(clk.as_ptr(), 1) };
        let read = unsafe { get_net_value_by_name(clk.as_ptr()) };
        let _ = sender.send((status, read));
    });
    let (status, read) = receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("force returned");

    assert_eq!(status, 0);
    assert_eq!(read, 1);
    assert_eq!(
        *seen.lock().unwrap_or_else(PoisonError::into_inner),
        [CallBack {
            read: -1,
            checked_status: 1,
            checked_value: 42,
            force_status: 1,
        }]
    );
    assert!(shared.lock().diagnostics().is_empty());
    uninstall();
}
