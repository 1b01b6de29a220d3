// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! The capability interface every simulation backend implements.

use std::{ffi, fmt, str::FromStr};

use serde::Deserialize;
use snafu::{Snafu, Whatever, whatever};

/// An opaque reference to a net resolved by a [`NetBackend`]. It is only
/// meaningful to the backend that produced it, and only for the duration of
/// the single operation that resolved it.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct NetHandle(usize);

impl NetHandle {
    /// Wraps a backend-chosen token.
    pub fn new(token: usize) -> Self {
        Self(token)
    }

    /// Wraps a simulator object pointer, returning `None` for a null handle.
    pub fn from_ptr(pointer: *mut ffi::c_void) -> Option<Self> {
        if pointer.is_null() {
            None
        } else {
            Some(Self(pointer as usize))
        }
    }

    /// The token passed to [`NetHandle::new`].
    pub fn token(&self) -> usize {
        self.0
    }

    /// The pointer passed to [`NetHandle::from_ptr`].
    pub fn as_ptr(&self) -> *mut ffi::c_void {
        self.0 as *mut ffi::c_void
    }
}

/// How the backend applies and removes a force.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendStrategy {
    /// A generic value-put flagged as a force or release. Release never
    /// reports failure.
    #[default]
    PutValue,

    /// Dedicated force and release primitives that report a status. Releasing
    /// a net that is not forced is a failure.
    ForcePrimitive,
}

impl fmt::Display for BackendStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendStrategy::PutValue => "put-value",
            BackendStrategy::ForcePrimitive => "force-primitive",
        }
        .fmt(f)
    }
}

impl FromStr for BackendStrategy {
    type Err = Whatever;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "put-value" => Ok(Self::PutValue),
            "force-primitive" => Ok(Self::ForcePrimitive),
            other => whatever!(
                "Unknown backend strategy `{}` (expected `put-value` or `force-primitive`)",
                other
            ),
        }
    }
}

/// The backend refused a value access on an already-resolved net.
#[derive(Debug, Snafu)]
#[snafu(display("{reason}"))]
pub struct BackendError {
    reason: String,
}

impl BackendError {
    pub fn new(reason: impl Into<String>) -> Self {
        BackendSnafu {
            reason: reason.into(),
        }
        .build()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Handle resolution, value access, force/release, and a diagnostic channel
/// over some simulation engine.
///
/// Implementations must not cache anything across calls on behalf of the
/// caller: [`crate::NetControl`] resolves a fresh handle for every
/// operation.
pub trait NetBackend {
    /// Looks up `name` in the design hierarchy.
    fn resolve(&mut self, name: &str) -> Option<NetHandle>;

    /// The current value of the net in integer format.
    fn get_value(&mut self, handle: NetHandle) -> Result<i32, BackendError>;

    /// Overrides the net's drivers with `value` until released. Applies
    /// immediately.
    fn force_value(
        &mut self,
        handle: NetHandle,
        value: i32,
    ) -> Result<(), BackendError>;

    /// Removes any force on the net, restoring normal drive.
    fn release_value(&mut self, handle: NetHandle) -> Result<(), BackendError>;

    /// Writes one line to the host's message channel.
    fn diagnostic(&mut self, message: &str);

    /// Called once the operation that resolved `handle` is done with it.
    fn discard(&mut self, handle: NetHandle) {
        let _ = handle;
    }

    /// The force/release flavor this backend implements.
    fn strategy(&self) -> BackendStrategy;
}

impl<B: NetBackend + ?Sized> NetBackend for Box<B> {
    fn resolve(&mut self, name: &str) -> Option<NetHandle> {
        (**self).resolve(name)
    }

    fn get_value(&mut self, handle: NetHandle) -> Result<i32, BackendError> {
        (**self).get_value(handle)
    }

    fn force_value(
        &mut self,
        handle: NetHandle,
        value: i32,
    ) -> Result<(), BackendError> {
        (**self).force_value(handle, value)
    }

    fn release_value(&mut self, handle: NetHandle) -> Result<(), BackendError> {
        (**self).release_value(handle)
    }

    fn diagnostic(&mut self, message: &str) {
        (**self).diagnostic(message)
    }

    fn discard(&mut self, handle: NetHandle) {
        (**self).discard(handle)
    }

    fn strategy(&self) -> BackendStrategy {
        (**self).strategy()
    }
}
