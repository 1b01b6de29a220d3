// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! C entry points for forcing, releasing, and reading nets from inside a
//! simulation, callable as `import "DPI-C"` functions (see
//! `sv/netforce_pkg.sv`) or from other PLI code.
//!
//! Failures never reach the caller as errors. They are written to the
//! simulator's message channel, and the read functions return `-1` in place of
//! a value. The `_dpi` wrappers of force and release return `0` regardless,
//! unless `strict-status` is enabled in `NetForce.toml`; use
//! [`get_net_value_by_name_checked`] to tell a failed read from a net holding
//! `-1`.
//!
//! Every call goes through one process-wide [`Session`]. It is connected to
//! the host simulator on first use, or can be supplied with [`install`].
//!
//! A force can make the simulator run callbacks before it returns. If such a
//! callback calls back into one of these functions, that inner call fails
//! (reported on stderr, status `1` under `strict-status`, `-1` for reads)
//! instead of waiting for the session the outer call still holds.

use std::{
    cell::Cell,
    ffi::CStr,
    sync::{
        LazyLock, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use libc::{c_char, c_int};
use netforce_control::{
    BackendError, NetBackend, NetControl, NetControlError, NetControlOptions, Operation,
    READ_SENTINEL,
};
use owo_colors::OwoColorize;
use snafu::{Report, ResultExt, Whatever};

/// A [`NetControl`] over whichever backend the session was connected to.
pub type Session = NetControl<Box<dyn NetBackend + Send>>;

static SESSION: LazyLock<Mutex<Option<Session>>> =
    LazyLock::new(|| Mutex::new(None));

/// Only the first failure to connect is printed.
static REPORTED_CONNECT_FAILURE: AtomicBool = AtomicBool::new(false);

thread_local! {
    /// The `strict-status` of the session this thread is in the middle of
    /// using, if any.
    static IN_SESSION: Cell<Option<bool>> = const { Cell::new(None) };
}

/// Marks this thread as inside the session until dropped.
struct SessionEntry;

impl SessionEntry {
    fn enter(strict_status: bool) -> Self {
        IN_SESSION.set(Some(strict_status));
        Self
    }
}

impl Drop for SessionEntry {
    fn drop(&mut self) {
        IN_SESSION.set(None);
    }
}

fn lock_session() -> MutexGuard<'static, Option<Session>> {
    SESSION.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Makes `session` the one used by every entry point, returning the session it
/// replaces. Must not be called from inside a backend operation.
pub fn install(session: Session) -> Option<Session> {
    lock_session().replace(session)
}

/// Removes the current session. The next call reconnects to the host.
pub fn uninstall() -> Option<Session> {
    lock_session().take()
}

fn connect() -> Result<Session, Whatever> {
    let options = NetControlOptions::discover()
        .whatever_context("Failed to load netforce configuration")?;
    let backend = netforce_vpi::connect_with(&options)?;
    Ok(NetControl::new(backend, options))
}

fn report_connect_failure(error: Whatever) {
    log::error!("{}", Report::from_error(&error));
    if !REPORTED_CONNECT_FAILURE.swap(true, Ordering::Relaxed) {
        eprintln!(
            "{} no simulator session, net operations will have no effect: {}",
            "netforce:".bold().red(),
            Report::from_error(error)
        );
    }
}

fn report_reentry(error: &NetControlError) {
    log::warn!("{}", error);
    eprintln!("{} Error: {}.", "netforce:".bold().red(), error);
}

struct Outcome<T> {
    value: Option<T>,
    strict_status: bool,
}

impl<T> Outcome<T> {
    fn status(&self) -> c_int {
        if self.value.is_none() && self.strict_status {
            1
        } else {
            0
        }
    }
}

/// # Safety
///
/// `netname` must be null or point to a NUL-terminated string that outlives
/// the call.
unsafe fn net_name<'a>(netname: *const c_char) -> Result<&'a str, String> {
    if netname.is_null() {
        return Err("<null>".into());
    }
    let netname = unsafe { CStr::from_ptr(netname) };
    netname
        .to_str()
        .map_err(|_| netname.to_string_lossy().into_owned())
}

/// Runs `action` on the session, reporting any failure to the simulator.
///
/// # Safety
///
/// See [`net_name`].
unsafe fn attempt<T>(
    operation: Operation,
    netname: *const c_char,
    action: impl FnOnce(&mut Session, &str) -> Result<T, NetControlError>,
) -> Outcome<T> {
    let name = unsafe { net_name(netname) };

    if let Some(strict_status) = IN_SESSION.get() {
        let name = name.map_or_else(|name| name, str::to_string);
        report_reentry(&NetControlError::BackendOperationFailed {
            operation,
            name,
            source: BackendError::new(
                "called back from inside another net operation",
            ),
        });
        return Outcome {
            value: None,
            strict_status,
        };
    }

    let mut guard = lock_session();
    if guard.is_none() {
        match connect() {
            Ok(connected) => *guard = Some(connected),
            Err(error) => {
                report_connect_failure(error);
                return Outcome {
                    value: None,
                    strict_status: false,
                };
            }
        }
    }
    let Some(session) = guard.as_mut() else {
        unreachable!("Connected above")
    };
    let _entry = SessionEntry::enter(session.options().strict_status);

    let result = match name {
        Ok(name) => action(session, name),
        Err(name) => Err(NetControlError::NetNotFound { operation, name }),
    };
    let value = match result {
        Ok(value) => Some(value),
        Err(error) => {
            session.report(&error);
            None
        }
    };

    Outcome {
        value,
        strict_status: session.options().strict_status,
    }
}

/// Forces the net `netname` to `value` until released.
///
/// # Safety
///
/// `netname` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn force_net_by_name(netname: *const c_char, value: c_int) {
    unsafe {
        attempt(Operation::Force, netname, |session, name| {
            session.force(name, value)
        })
    };
}

/// Releases any force on the net `netname`.
///
/// # Safety
///
/// `netname` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn release_net_by_name(netname: *const c_char) {
    unsafe {
        attempt(Operation::Release, netname, |session, name| {
            session.release(name)
        })
    };
}

/// The integer value of the net `netname`, or `-1` if it cannot be read.
///
/// # Safety
///
/// `netname` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_net_value_by_name(netname: *const c_char) -> c_int {
    let outcome = unsafe {
        attempt(Operation::Read, netname, |session, name| session.read(name))
    };
    outcome.value.unwrap_or(READ_SENTINEL)
}

/// [`force_net_by_name`] returning a status: always `0`, or `1` on failure
/// under `strict-status`.
///
/// # Safety
///
/// `netname` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn force_net_by_name_dpi(
    netname: *const c_char,
    value: c_int,
) -> c_int {
    let outcome = unsafe {
        attempt(Operation::Force, netname, |session, name| {
            session.force(name, value)
        })
    };
    outcome.status()
}

/// [`release_net_by_name`] returning a status: always `0`, or `1` on failure
/// under `strict-status`.
///
/// # Safety
///
/// `netname` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn release_net_by_name_dpi(
    netname: *const c_char,
) -> c_int {
    let outcome = unsafe {
        attempt(Operation::Release, netname, |session, name| {
            session.release(name)
        })
    };
    outcome.status()
}

/// Same as [`get_net_value_by_name`].
///
/// # Safety
///
/// `netname` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_net_value_by_name_dpi(
    netname: *const c_char,
) -> c_int {
    unsafe { get_net_value_by_name(netname) }
}

/// Reads the net `netname` into `*value`, returning `0` on success and `1` on
/// failure, in which case `*value` is left untouched.
///
/// # Safety
///
/// `netname` must be null or point to a NUL-terminated string, and `value`
/// must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_net_value_by_name_checked(
    netname: *const c_char,
    value: *mut c_int,
) -> c_int {
    if value.is_null() {
        return 1;
    }
    let outcome = unsafe {
        attempt(Operation::Read, netname, |session, name| session.read(name))
    };
    match outcome.value {
        Some(read) => {
            unsafe { value.write(read) };
            0
        }
        None => 1,
    }
}
