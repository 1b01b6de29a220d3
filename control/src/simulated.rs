// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! An in-memory simulation for exercising [`NetControl`](crate::NetControl)
//! without a simulator.

use std::collections::HashMap;

use crate::backend::{BackendError, BackendStrategy, NetBackend, NetHandle};

#[derive(Debug)]
struct SimulatedNet {
    name: String,
    driven: i32,
    forced: Option<i32>,
}

/// A table of nets, each with a driven value and an optional force that
/// overrides it.
///
/// Release follows the [`BackendStrategy`]: with
/// [`BackendStrategy::PutValue`] releasing an unforced net silently succeeds,
/// while with [`BackendStrategy::ForcePrimitive`] it is rejected.
#[derive(Debug)]
pub struct SimulatedBackend {
    strategy: BackendStrategy,
    nets: Vec<SimulatedNet>,
    by_name: HashMap<String, usize>,
    diagnostics: Vec<String>,
    mutations: usize,
    live_handles: usize,
}

impl SimulatedBackend {
    pub fn new(strategy: BackendStrategy) -> Self {
        Self {
            strategy,
            nets: vec![],
            by_name: HashMap::new(),
            diagnostics: vec![],
            mutations: 0,
            live_handles: 0,
        }
    }

    /// Adds a net driven at `value`, or redrives it if it already exists.
    pub fn with_net(mut self, name: impl Into<String>, value: i32) -> Self {
        self.drive(name, value);
        self
    }

    /// Changes the value the net's drivers produce. A force, if present,
    /// still wins.
    pub fn drive(&mut self, name: impl Into<String>, value: i32) {
        let name = name.into();
        match self.by_name.get(&name) {
            Some(&index) => self.nets[index].driven = value,
            None => {
                self.by_name.insert(name.clone(), self.nets.len());
                self.nets.push(SimulatedNet {
                    name,
                    driven: value,
                    forced: None,
                });
            }
        }
    }

    /// Whether `name` currently has a force applied.
    pub fn is_forced(&self, name: &str) -> bool {
        self.by_name
            .get(name)
            .is_some_and(|&index| self.nets[index].forced.is_some())
    }

    /// Every message written to the diagnostic channel so far.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<String> {
        std::mem::take(&mut self.diagnostics)
    }

    /// How many force or release requests reached a net.
    pub fn mutations(&self) -> usize {
        self.mutations
    }

    /// Handles resolved but not yet discarded.
    pub fn live_handles(&self) -> usize {
        self.live_handles
    }

    fn net_mut(
        &mut self,
        handle: NetHandle,
    ) -> Result<&mut SimulatedNet, BackendError> {
        self.nets
            .get_mut(handle.token())
            .ok_or_else(|| BackendError::new("stale net handle"))
    }
}

impl NetBackend for SimulatedBackend {
    fn resolve(&mut self, name: &str) -> Option<NetHandle> {
        let index = *self.by_name.get(name)?;
        self.live_handles += 1;
        Some(NetHandle::new(index))
    }

    fn get_value(&mut self, handle: NetHandle) -> Result<i32, BackendError> {
        let net = self.net_mut(handle)?;
        Ok(net.forced.unwrap_or(net.driven))
    }

    fn force_value(
        &mut self,
        handle: NetHandle,
        value: i32,
    ) -> Result<(), BackendError> {
        self.net_mut(handle)?.forced = Some(value);
        self.mutations += 1;
        Ok(())
    }

    fn release_value(&mut self, handle: NetHandle) -> Result<(), BackendError> {
        let strategy = self.strategy;
        let net = self.net_mut(handle)?;
        let was_forced = net.forced.take().is_some();
        if !was_forced && strategy == BackendStrategy::ForcePrimitive {
            return Err(BackendError::new(format!(
                "release of '{}' failed: net is not forced",
                net.name
            )));
        }
        self.mutations += 1;
        Ok(())
    }

    fn diagnostic(&mut self, message: &str) {
        self.diagnostics.push(message.to_string());
    }

    fn discard(&mut self, _handle: NetHandle) {
        self.live_handles = self.live_handles.saturating_sub(1);
    }

    fn strategy(&self) -> BackendStrategy {
        self.strategy
    }
}
