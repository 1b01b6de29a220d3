// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Force and release through the dedicated ACC primitive, `acc_set_value` with
//! `accForceFlag` and `accReleaseFlag`, which reports a status.
//!
//! Every operation is its own ACC application call: `acc_initialize` runs when
//! the net is resolved and `acc_close` when the handle is discarded (or right
//! away, if the net does not resolve).

use std::{ffi::CString, ptr};

use libc::c_int;
use libloading::Library;
use netforce_control::{BackendError, BackendStrategy, NetBackend, NetHandle};
use snafu::{ResultExt, Whatever};

use crate::{ffi, host_library, load_symbol, to_c_message};

/// The ACC routines this backend calls, bound from the host simulator.
#[derive(Clone, Copy)]
pub struct AccApi {
    pub initialize: ffi::acc_initialize_t,
    pub close: ffi::acc_close_t,
    pub handle_by_name: ffi::acc_handle_by_name_t,
    pub fetch_value: ffi::acc_fetch_value_t,
    pub set_value: ffi::acc_set_value_t,
    pub printf: ffi::io_printf_t,
    /// The simulator's `acc_error_flag`, set by the last ACC routine that
    /// failed.
    pub error_flag: *const c_int,
}

// SAFETY: `error_flag` points at a process global of the simulator, which is
// only ever read.
unsafe impl Send for AccApi {}

impl AccApi {
    pub fn load(library: &Library) -> Result<Self, Whatever> {
        Ok(Self {
            initialize: load_symbol(library, "acc_initialize")?,
            close: load_symbol(library, "acc_close")?,
            handle_by_name: load_symbol(library, "acc_handle_by_name")?,
            fetch_value: load_symbol(library, "acc_fetch_value")?,
            set_value: load_symbol(library, "acc_set_value")?,
            printf: load_symbol(library, "io_printf")?,
            error_flag: load_symbol::<*mut c_int>(library, "acc_error_flag")?
                .cast_const(),
        })
    }

    fn error_flag_set(&self) -> bool {
        unsafe { self.error_flag.read_volatile() != 0 }
    }
}

/// The [`BackendStrategy::ForcePrimitive`] backend.
pub struct AccBackend {
    api: AccApi,
    _library: Option<Library>,
}

impl AccBackend {
    /// Binds the ACC routines from `library`, which must be (or export the
    /// symbols of) a running simulator.
    pub fn new(library: Library) -> Result<Self, Whatever> {
        let api = AccApi::load(&library)
            .whatever_context("Failed to bind the ACC routines")?;
        Ok(Self {
            api,
            _library: Some(library),
        })
    }

    /// Binds the ACC routines of the simulator this process is running in.
    pub fn from_host() -> Result<Self, Whatever> {
        Self::new(host_library()?)
    }

    /// Uses routines that were bound some other way.
    ///
    /// # Safety
    ///
    /// Every routine in `api`, and `api.error_flag`, must stay valid for as
    /// long as the backend is used.
    pub unsafe fn from_api(api: AccApi) -> Self {
        Self {
            api,
            _library: None,
        }
    }

    fn set_value(
        &mut self,
        handle: NetHandle,
        value: i32,
        model: c_int,
    ) -> c_int {
        let mut value = ffi::s_acc_value::integer(value);
        let mut delay = ffi::s_setval_delay::immediate(model);
        unsafe { (self.api.set_value)(handle.as_ptr(), &mut value, &mut delay) }
    }
}

impl NetBackend for AccBackend {
    fn resolve(&mut self, name: &str) -> Option<NetHandle> {
        let name = CString::new(name).ok()?;
        if unsafe { (self.api.initialize)() } == 0 {
            self.diagnostic("Error: acc_initialize reported failure.");
            return None;
        }
        let net =
            unsafe { (self.api.handle_by_name)(name.as_ptr(), ptr::null_mut()) };
        let handle = NetHandle::from_ptr(net);
        if handle.is_none() {
            unsafe { (self.api.close)() };
        }
        handle
    }

    fn get_value(&mut self, handle: NetHandle) -> Result<i32, BackendError> {
        let mut value = ffi::s_acc_value::integer(0);
        // with "%%" the value is written into `value` and the returned string
        // carries nothing
        unsafe {
            (self.api.fetch_value)(handle.as_ptr(), c"%%".as_ptr(), &mut value)
        };
        if self.api.error_flag_set() {
            return Err(BackendError::new(
                "acc_fetch_value failed (acc_error_flag is set)",
            ));
        }
        Ok(unsafe { value.value.integer })
    }

    fn force_value(
        &mut self,
        handle: NetHandle,
        value: i32,
    ) -> Result<(), BackendError> {
        match self.set_value(handle, value, ffi::accForceFlag) {
            0 => Ok(()),
            status => Err(BackendError::new(format!(
                "force failed with acc_set_value status {status}"
            ))),
        }
    }

    fn release_value(&mut self, handle: NetHandle) -> Result<(), BackendError> {
        match self.set_value(handle, 0, ffi::accReleaseFlag) {
            0 => Ok(()),
            status => Err(BackendError::new(format!(
                "release failed with acc_set_value status {status} (was the net forced?)"
            ))),
        }
    }

    fn diagnostic(&mut self, message: &str) {
        let message = to_c_message(message);
        unsafe { (self.api.printf)(c"%s\n".as_ptr(), message.as_ptr()) };
    }

    fn discard(&mut self, handle: NetHandle) {
        let _ = handle;
        unsafe { (self.api.close)() };
    }

    fn strategy(&self) -> BackendStrategy {
        BackendStrategy::ForcePrimitive
    }
}
