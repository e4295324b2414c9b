// Copyright (C) 2024-2025  Rafael Carvalho <contact@rafaelrc.com>

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

use std::os::fd::OwnedFd;

#[cfg(feature = "wayland")]
use wayland_client::backend::ReadEventsGuard;

use crate::error::Error;

pub mod logind;
pub mod noop;
#[cfg(feature = "wayland")]
pub mod wayland;

/// Source of session manager inhibitor locks. The system stays awake for as long as a returned
/// descriptor is open.
pub trait SessionInhibitor {
    /// Request a new lock. Every call yields a new descriptor.
    fn request_lock(&mut self) -> Result<OwnedFd, Error>;
}

/// Display server idle inhibitor bound to a surface that lives as long as the implementation.
pub trait IdleInhibitor {
    /// Inhibit Idle, does nothing if idle is already inhibited
    fn inhibit(&mut self) -> Result<(), Error>;

    /// Uninhibit Idle, does nothing if idle is not inhibited
    fn uninhibit(&mut self) -> Result<(), Error>;

    /// Whether an inhibitor object currently exists
    fn is_inhibiting(&self) -> bool;

    /// Destroy the anchor surface. Called once, at final teardown.
    fn shutdown(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Get a read lock of the event queue, flushing necessary events.
    ///
    /// Only relevant for implementations dependent on Wayland
    #[cfg(feature = "wayland")]
    fn wayland_queue_read_guard(&mut self) -> Result<Option<ReadEventsGuard>, Error> {
        Ok(None)
    }

    /// Dispatch and process new events in queue.
    ///
    /// Only relevant for implementations dependent on Wayland
    #[cfg(feature = "wayland")]
    fn wayland_dispatch_pending(&mut self) -> Result<(), Error> {
        Ok(())
    }
}
