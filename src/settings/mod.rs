// Copyright (C) 2023-2025  Rafael Carvalho <contact@rafaelrc.com>

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License version 3 as published by
// the Free Software Foundation.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// SPDX-License-Identifier: GPL-3.0-only

//! Module responsible with the tool's configuration

use std::path::{Path, PathBuf};

use clap::Parser;
use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use log::LevelFilter;
use serde::Deserialize;

use crate::error::Error;

mod cli;
use cli::{Args, Overrides};

const PIDFILE_NAME: &str = concat!(env!("CARGO_PKG_NAME"), ".pid");

/// Struct that stores the settings that affect the tool behaviour
#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default = "default_verbosity")]
    verbosity: LevelFilter,

    #[serde(default)]
    daemon: bool,

    #[serde(default)]
    pidfile: Option<PathBuf>,

    #[serde(default = "default_wayland")]
    wayland: bool,
}

impl Settings {
    pub fn new() -> Result<Self, Error> {
        let cli = Args::parse();

        let config_path = match cli.config {
            Some(ref p) => p.clone(),
            None => xdg::BaseDirectories::with_prefix(env!("CARGO_PKG_NAME"))
                .map_err(Error::ConfigDir)?
                .get_config_file("config.toml"),
        };

        Self::from_sources(&config_path, cli.overrides())
    }

    /// Layers the command line over the config file. A missing config file is not an error.
    fn from_sources(config_path: &Path, overrides: Overrides) -> Result<Self, Error> {
        let settings = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Serialized::defaults(overrides))
            .extract()?;

        Ok(settings)
    }

    /// Returns the current log verbosity
    pub fn get_verbosity(&self) -> LevelFilter {
        self.verbosity
    }

    pub fn is_daemon(&self) -> bool {
        self.daemon
    }

    pub fn is_wayland_enabled(&self) -> bool {
        self.wayland
    }

    /// Pidfile location. An explicit path, from the command line or else the config file, always
    /// wins; the environment is only consulted without one.
    pub fn get_pidfile(&self) -> Option<PathBuf> {
        if let Some(pidfile) = &self.pidfile {
            return Some(pidfile.clone());
        }

        let runtime_dir = xdg::BaseDirectories::new()
            .ok()
            .and_then(|dirs| dirs.get_runtime_directory().ok().cloned());
        default_pidfile(nix::unistd::geteuid().is_root(), runtime_dir.as_deref())
    }
}

/// System wide path for root, the user's runtime directory otherwise. [None] when neither applies.
fn default_pidfile(is_root: bool, runtime_dir: Option<&Path>) -> Option<PathBuf> {
    if is_root {
        Some(Path::new("/var/run").join(PIDFILE_NAME))
    } else {
        runtime_dir.map(|dir| dir.join(PIDFILE_NAME))
    }
}

/// Default log verbosity, set to [LevelFilter::Warn]
fn default_verbosity() -> LevelFilter {
    LevelFilter::Warn
}

fn default_wayland() -> bool {
    true
}
