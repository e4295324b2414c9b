// Copyright (C) 2025  Rafael Carvalho <contact@rafaelrc.com>

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License version 3 as published by
// the Free Software Foundation.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

// SPDX-License-Identifier: GPL-3.0-only

//! Errors that stop the tool. Every one of them is fatal: the idle inhibitor either works
//! completely or exits with a status describing the subsystem that failed.

use std::{error::Error as StdError, io, path::PathBuf, process::ExitCode, sync::Arc};

use nix::errno::Errno;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to open D-Bus connection")]
    BusConnect(#[source] zbus::Error),

    #[error("Failed to send idle inhibit request")]
    BusCall(#[source] zbus::Error),

    #[error("Failed to parse D-Bus response for idle inhibit")]
    HandleParse(#[source] zbus::Error),

    #[cfg(feature = "wayland")]
    #[error("Failed to connect to the Wayland display")]
    DisplayConnect(#[source] Box<dyn StdError + Send + Sync>),

    #[cfg(feature = "wayland")]
    #[error("Compositor does not support {interface}")]
    CapabilityMissing {
        interface: &'static str,
        #[source]
        source: wayland_client::globals::BindError,
    },

    #[cfg(feature = "wayland")]
    #[error("Wayland dispatch failed")]
    DisplayDispatch(#[source] Box<dyn StdError + Send + Sync>),

    #[cfg(feature = "wayland")]
    #[error("Lost the connection to the Wayland display")]
    DisplayLost,

    #[error("Process is already running (pidfile {})", path.display())]
    PidfileConflict { path: PathBuf },

    #[error("Cannot write pidfile {}", path.display())]
    Pidfile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot daemonize")]
    Daemonize(#[source] Errno),

    #[error("Cannot register signal handlers")]
    Signals(#[source] io::Error),

    #[error("Message queue failure")]
    MessageQueue(#[source] Box<dyn StdError + Send + Sync>),

    #[error("Polling failed")]
    Poll(#[source] Errno),

    #[error("Invalid configuration")]
    Settings(#[source] Box<figment::Error>),

    #[error("Cannot locate the configuration directory")]
    ConfigDir(#[source] xdg::BaseDirectoriesError),

    #[error("Cannot initialise the logger")]
    Logger(#[source] log::SetLoggerError),
}

impl Error {
    /// Exit status for this error: the OS error code found along the source chain, or a generic
    /// failure when none is available.
    pub fn exit_code(&self) -> ExitCode {
        match self.errno() {
            Some(code) if (1..=255).contains(&code) => ExitCode::from(code as u8),
            _ => ExitCode::FAILURE,
        }
    }

    fn errno(&self) -> Option<i32> {
        let mut source: Option<&(dyn StdError + 'static)> = Some(self);
        while let Some(error) = source {
            if let Some(errno) = error.downcast_ref::<Errno>() {
                return Some(*errno as i32);
            }
            if let Some(code) = error.downcast_ref::<io::Error>().and_then(io::Error::raw_os_error) {
                return Some(code);
            }
            // zbus shares its I/O errors behind an Arc
            let shared = match error.downcast_ref::<zbus::Error>() {
                Some(zbus::Error::InputOutput(io_error)) => Some(io_error),
                _ => error.downcast_ref::<Arc<io::Error>>(),
            };
            if let Some(code) = shared.and_then(|io_error| io_error.raw_os_error()) {
                return Some(code);
            }
            source = error.source();
        }
        None
    }
}

impl From<figment::Error> for Error {
    fn from(value: figment::Error) -> Self {
        Error::Settings(Box::new(value))
    }
}
