// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Force and release through `vpi_put_value` with `vpiForceFlag` and
//! `vpiReleaseFlag`.

use std::{ffi::CString, ptr};

use libloading::Library;
use netforce_control::{BackendError, BackendStrategy, NetBackend, NetHandle};
use snafu::{ResultExt, Whatever};

use crate::{ffi, host_library, load_optional_symbol, load_symbol, to_c_message};

/// The VPI routines this backend calls, bound from the host simulator.
#[derive(Clone, Copy)]
pub struct VpiApi {
    pub handle_by_name: ffi::vpi_handle_by_name_t,
    pub get_value: ffi::vpi_get_value_t,
    pub put_value: ffi::vpi_put_value_t,
    pub printf: ffi::vpi_printf_t,
    /// `vpi_release_handle` (IEEE 1800) or `vpi_free_object` (IEEE 1364), if
    /// the host exports either.
    pub release_handle: Option<ffi::vpi_release_handle_t>,
}

impl VpiApi {
    pub fn load(library: &Library) -> Result<Self, Whatever> {
        Ok(Self {
            handle_by_name: load_symbol(library, "vpi_handle_by_name")?,
            get_value: load_symbol(library, "vpi_get_value")?,
            put_value: load_symbol(library, "vpi_put_value")?,
            printf: load_symbol(library, "vpi_printf")?,
            release_handle: load_optional_symbol(library, "vpi_release_handle")
                .or_else(|| load_optional_symbol(library, "vpi_free_object")),
        })
    }
}

/// The [`BackendStrategy::PutValue`] backend. Release carries an ignored zero
/// payload and never reports failure.
pub struct PutValueBackend {
    api: VpiApi,
    _library: Option<Library>,
}

impl PutValueBackend {
    /// Binds the VPI routines from `library`, which must be (or export the
    /// symbols of) a running simulator.
    pub fn new(library: Library) -> Result<Self, Whatever> {
        let api = VpiApi::load(&library)
            .whatever_context("Failed to bind the VPI routines")?;
        Ok(Self {
            api,
            _library: Some(library),
        })
    }

    /// Binds the VPI routines of the simulator this process is running in.
    pub fn from_host() -> Result<Self, Whatever> {
        Self::new(host_library()?)
    }

    /// Uses routines that were bound some other way.
    ///
    /// # Safety
    ///
    /// Every routine in `api` must stay valid for as long as the backend is
    /// used.
    pub unsafe fn from_api(api: VpiApi) -> Self {
        Self {
            api,
            _library: None,
        }
    }
}

impl NetBackend for PutValueBackend {
    fn resolve(&mut self, name: &str) -> Option<NetHandle> {
        let name = CString::new(name).ok()?;
        // vpi_handle_by_name takes a mutable pointer but does not write
        // through it
        let net = unsafe {
            (self.api.handle_by_name)(name.as_ptr().cast_mut(), ptr::null_mut())
        };
        NetHandle::from_ptr(net)
    }

    fn get_value(&mut self, handle: NetHandle) -> Result<i32, BackendError> {
        let mut value = ffi::s_vpi_value::integer(0);
        unsafe { (self.api.get_value)(handle.as_ptr(), &mut value) };
        if value.format != ffi::vpiIntVal {
            return Err(BackendError::new(format!(
                "vpi_get_value answered in format {} instead of vpiIntVal",
                value.format
            )));
        }
        Ok(unsafe { value.value.integer })
    }

    fn force_value(
        &mut self,
        handle: NetHandle,
        value: i32,
    ) -> Result<(), BackendError> {
        let mut value = ffi::s_vpi_value::integer(value);
        unsafe {
            (self.api.put_value)(
                handle.as_ptr(),
                &mut value,
                ptr::null_mut(),
                ffi::vpiForceFlag,
            )
        };
        Ok(())
    }

    fn release_value(&mut self, handle: NetHandle) -> Result<(), BackendError> {
        let mut value = ffi::s_vpi_value::integer(0);
        unsafe {
            (self.api.put_value)(
                handle.as_ptr(),
                &mut value,
                ptr::null_mut(),
                ffi::vpiReleaseFlag,
            )
        };
        Ok(())
    }

    fn diagnostic(&mut self, message: &str) {
        let message = to_c_message(message);
        unsafe { (self.api.printf)(c"%s\n".as_ptr(), message.as_ptr()) };
    }

    fn discard(&mut self, handle: NetHandle) {
        if let Some(release_handle) = self.api.release_handle {
            unsafe { release_handle(handle.as_ptr()) };
        }
    }

    fn strategy(&self) -> BackendStrategy {
        BackendStrategy::PutValue
    }
}
