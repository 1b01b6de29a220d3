// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! This module implements the façade for forcing, releasing, and reading nets
//! by name.
//!
//! [`NetControl`] resolves a name on every call and performs exactly one
//! backend action. It keeps no record of which nets are forced. The backend is
//! anything implementing [`NetBackend`]: the host simulator bindings in
//! `netforce-vpi`, or the in-memory [`SimulatedBackend`].

use std::fmt;

use serde::Deserialize;
use snafu::{ResultExt, Snafu};

pub mod backend;
pub mod config;
pub mod name;
pub mod simulated;

pub use backend::{BackendError, BackendStrategy, NetBackend, NetHandle};
pub use simulated::SimulatedBackend;

/// The value returned by the legacy read surface when the net cannot be read.
/// It is indistinguishable from a net that really holds `-1`.
pub const READ_SENTINEL: i32 = -1;

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum Operation {
    Force,
    Release,
    Read,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Force => "force",
            Operation::Release => "release",
            Operation::Read => "get_value",
        }
        .fmt(f)
    }
}

/// Why a net operation had no effect.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum NetControlError {
    #[snafu(display("({operation}) net '{name}' not found"))]
    NetNotFound { operation: Operation, name: String },

    #[snafu(display("({operation}) backend rejected net '{name}': {source}"))]
    BackendOperationFailed {
        operation: Operation,
        name: String,
        source: BackendError,
    },
}

impl NetControlError {
    pub fn operation(&self) -> Operation {
        match self {
            NetControlError::NetNotFound { operation, .. }
            | NetControlError::BackendOperationFailed { operation, .. } => {
                *operation
            }
        }
    }

    /// The fully qualified name the operation was attempted on.
    pub fn name(&self) -> &str {
        match self {
            NetControlError::NetNotFound { name, .. }
            | NetControlError::BackendOperationFailed { name, .. } => name,
        }
    }
}

/// Optional configuration for a [`NetControl`]. Usually, you can just use
/// [`NetControlOptions::default()`], or load a `NetForce.toml` with
/// [`NetControlOptions::discover()`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct NetControlOptions {
    /// Which host backend to bind. [`NetControl`] itself does not look at
    /// this; it is read by whoever constructs the backend.
    pub strategy: BackendStrategy,

    /// Hierarchy prefix prepended to every net name that is not already
    /// rooted in it, e.g. `"tb.dut"`.
    pub scope: Option<String>,

    /// Whether to use the log crate.
    pub log: bool,

    /// Whether the DPI wrappers for force and release return a nonzero status
    /// on failure. When `false` they always return `0`, as they always have.
    pub strict_status: bool,
}

impl Default for NetControlOptions {
    fn default() -> Self {
        Self {
            strategy: BackendStrategy::default(),
            scope: None,
            log: false,
            strict_status: false,
        }
    }
}

impl NetControlOptions {
    /// The same as the [`Default`] implementation except that the log crate is
    /// used.
    pub fn default_logging() -> Self {
        Self {
            log: true,
            ..Default::default()
        }
    }
}

/// Forces, releases, and reads nets of the simulation behind `B`.
pub struct NetControl<B> {
    backend: B,
    options: NetControlOptions,
}

impl<B: NetBackend> NetControl<B> {
    pub fn new(backend: B, options: NetControlOptions) -> Self {
        if options.log {
            log::info!(
                "Controlling nets through the {} backend strategy",
                backend.strategy()
            );
        }
        Self { backend, options }
    }

    pub fn options(&self) -> &NetControlOptions {
        &self.options
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Overrides the value of `name` with `value` until it is released. The
    /// backend is left untouched if the net does not resolve.
    pub fn force(
        &mut self,
        name: &str,
        value: i32,
    ) -> Result<(), NetControlError> {
        self.with_net(Operation::Force, name, |backend, handle| {
            backend.force_value(handle, value)
        })
    }

    /// Removes any force on `name`. The release is issued whether or not the
    /// net is currently forced.
    pub fn release(&mut self, name: &str) -> Result<(), NetControlError> {
        self.with_net(Operation::Release, name, |backend, handle| {
            backend.release_value(handle)
        })
    }

    /// The current integer value of `name`.
    pub fn read(&mut self, name: &str) -> Result<i32, NetControlError> {
        self.with_net(Operation::Read, name, |backend, handle| {
            backend.get_value(handle)
        })
    }

    /// Flips the bits of `mask` in the current value of `name` and holds the
    /// result with a force, modelling a single-event upset. Returns the value
    /// that was forced.
    pub fn upset(
        &mut self,
        name: &str,
        mask: i32,
    ) -> Result<i32, NetControlError> {
        let upset = self.read(name)? ^ mask;
        self.force(name, upset)?;
        if self.options.log {
            log::info!("Upset net {} to {} (mask {:#x})", name, upset, mask);
        }
        Ok(upset)
    }

    /// [`NetControl::force`], reporting any failure to the backend's message
    /// channel instead of returning it.
    pub fn force_or_report(&mut self, name: &str, value: i32) {
        if let Err(error) = self.force(name, value) {
            self.report(&error);
        }
    }

    /// [`NetControl::release`], reporting any failure to the backend's message
    /// channel instead of returning it.
    pub fn release_or_report(&mut self, name: &str) {
        if let Err(error) = self.release(name) {
            self.report(&error);
        }
    }

    /// [`NetControl::read`], reporting any failure to the backend's message
    /// channel and returning [`READ_SENTINEL`] in its place.
    pub fn read_or_sentinel(&mut self, name: &str) -> i32 {
        self.read(name).unwrap_or_else(|error| {
            self.report(&error);
            READ_SENTINEL
        })
    }

    /// Writes `error` as a diagnostic on the backend's message channel.
    pub fn report(&mut self, error: &NetControlError) {
        if self.options.log {
            log::warn!("{}", error);
        }
        self.backend.diagnostic(&format!("Error: {error}."));
    }

    fn with_net<T>(
        &mut self,
        operation: Operation,
        name: &str,
        access: impl FnOnce(&mut B, NetHandle) -> Result<T, BackendError>,
    ) -> Result<T, NetControlError> {
        let name = crate::name::qualify(self.options.scope.as_deref(), name);

        let Some(handle) = self.backend.resolve(&name) else {
            return NetNotFoundSnafu { operation, name }.fail();
        };

        if self.options.log {
            log::debug!("Resolved net {} for {}", name, operation);
        }
        let result = access(&mut self.backend, handle);
        self.backend.discard(handle);

        result.context(BackendOperationFailedSnafu { operation, name })
    }
}
