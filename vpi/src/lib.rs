// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Backends over the PLI routines of the simulator hosting this process.
//!
//! Nothing here links against a simulator. The routines are looked up at
//! runtime in the host process, which is the simulator that loaded us, so the
//! same library works under any simulator exporting them.

use std::ffi::CString;

use libloading::Library;
use netforce_control::{BackendStrategy, NetBackend, NetControlOptions};
use snafu::{ResultExt, Whatever};

pub mod acc;
pub mod ffi;
pub mod put_value;

pub use acc::{AccApi, AccBackend};
pub use put_value::{PutValueBackend, VpiApi};

/// The symbols of the running process, i.e., the simulator plus everything it
/// has loaded.
pub fn host_library() -> Result<Library, Whatever> {
    #[cfg(unix)]
    {
        Ok(libloading::os::unix::Library::this().into())
    }
    #[cfg(windows)]
    {
        libloading::os::windows::Library::this()
            .map(Into::into)
            .whatever_context("Failed to open the host process as a library")
    }
}

pub(crate) fn load_symbol<T: Copy>(
    library: &Library,
    name: &str,
) -> Result<T, Whatever> {
    let symbol: libloading::Symbol<T> = unsafe { library.get(name.as_bytes()) }
        .whatever_context(format!(
            "Failed to load `{}` from the host simulator (is this library loaded by a PLI-capable simulator?)",
            name
        ))?;
    Ok(*symbol)
}

pub(crate) fn load_optional_symbol<T: Copy>(
    library: &Library,
    name: &str,
) -> Option<T> {
    let symbol: libloading::Symbol<T> =
        unsafe { library.get(name.as_bytes()) }.ok()?;
    Some(*symbol)
}

/// Interior NUL bytes cannot cross into C, so they are shown as `\0`.
pub(crate) fn to_c_message(message: &str) -> CString {
    CString::new(message.replace('\0', "\\0"))
        .unwrap_or_else(|_| CString::from(c"<unprintable diagnostic>"))
}

/// Binds the host simulator through the backend `strategy` names.
pub fn connect(
    strategy: BackendStrategy,
) -> Result<Box<dyn NetBackend + Send>, Whatever> {
    Ok(match strategy {
        BackendStrategy::PutValue => Box::new(
            PutValueBackend::from_host()
                .whatever_context("Failed to connect the put-value backend")?,
        ),
        BackendStrategy::ForcePrimitive => Box::new(
            AccBackend::from_host().whatever_context(
                "Failed to connect the force-primitive backend",
            )?,
        ),
    })
}

/// [`connect`] with the strategy from `options`, logging if asked to.
pub fn connect_with(
    options: &NetControlOptions,
) -> Result<Box<dyn NetBackend + Send>, Whatever> {
    if options.log {
        log::info!(
            "Binding the {} backend from the host simulator",
            options.strategy
        );
    }
    connect(options.strategy)
}
