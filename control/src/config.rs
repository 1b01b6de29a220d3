// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Loading [`NetControlOptions`] from a `NetForce.toml` project file.
//!
//! ```toml
//! strategy = "force-primitive"
//! scope = "tb.dut"
//! log = true
//! strict-status = false
//! ```

use std::{env, fs};

use camino::{Utf8Path, Utf8PathBuf};
use snafu::{ResultExt, Whatever};

use crate::{BackendStrategy, NetControlOptions};

/// The project file searched for by [`NetControlOptions::discover`].
pub const CONFIG_FILE_NAME: &str = "NetForce.toml";

/// Names an explicit configuration file, skipping the search.
pub const CONFIG_PATH_VARIABLE: &str = "NETFORCE_CONFIG";

/// Overrides the backend strategy of whatever configuration was found.
pub const STRATEGY_VARIABLE: &str = "NETFORCE_STRATEGY";

/// Walks from `start` up to the filesystem root looking for
/// [`CONFIG_FILE_NAME`].
pub fn search_for_config(mut start: Utf8PathBuf) -> Option<Utf8PathBuf> {
    loop {
        let candidate = start.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !start.pop() {
            return None;
        }
    }
}

impl NetControlOptions {
    /// Parses the contents of a `NetForce.toml` file. Missing keys take their
    /// [`Default`] values.
    pub fn from_toml_str(contents: &str) -> Result<Self, Whatever> {
        toml::from_str(contents)
            .whatever_context("Failed to parse netforce configuration")
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load(path: &Utf8Path) -> Result<Self, Whatever> {
        let contents = fs::read_to_string(path).whatever_context(format!(
            "Failed to read netforce configuration file {}",
            path
        ))?;
        Self::from_toml_str(&contents).whatever_context(format!(
            "Invalid netforce configuration file {}",
            path
        ))
    }

    /// Finds the configuration for the current process:
    ///
    /// 1. the file named by `NETFORCE_CONFIG`, if set;
    /// 2. otherwise the nearest `NetForce.toml` at or above the current
    ///    directory;
    /// 3. otherwise [`NetControlOptions::default`].
    ///
    /// `NETFORCE_STRATEGY`, if set, then replaces the strategy.
    pub fn discover() -> Result<Self, Whatever> {
        let current_directory: Utf8PathBuf = env::current_dir()
            .whatever_context("Failed to get current directory")?
            .try_into()
            .whatever_context("Failed to convert current directory to UTF-8")?;

        Self::discover_from(
            current_directory,
            env::var(CONFIG_PATH_VARIABLE).ok().map(Utf8PathBuf::from),
            env::var(STRATEGY_VARIABLE).ok(),
        )
    }

    /// [`NetControlOptions::discover`] with its environment made explicit.
    pub fn discover_from(
        start: Utf8PathBuf,
        explicit_path: Option<Utf8PathBuf>,
        strategy_override: Option<String>,
    ) -> Result<Self, Whatever> {
        let mut options = match explicit_path.or_else(|| search_for_config(start))
        {
            Some(path) => {
                let options = Self::load(&path)?;
                if options.log {
                    log::info!("Loaded netforce configuration from {}", path);
                }
                options
            }
            None => Self::default(),
        };

        if let Some(strategy) = strategy_override {
            options.strategy = strategy
                .parse::<BackendStrategy>()
                .whatever_context(format!(
                    "Invalid value for {}",
                    STRATEGY_VARIABLE
                ))?;
        }

        Ok(options)
    }
}
