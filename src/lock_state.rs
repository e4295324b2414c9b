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

// SPDX-License-Identifier: GPL-3.0-only

//! Owner of the inhibition state. Drives the session manager lock and the display inhibitor
//! together so both always agree with [InhibitionState].

use std::os::fd::{AsFd, OwnedFd};

use log::{debug, info, trace, warn};

use crate::error::Error;
use crate::idle_inhibitor::{IdleInhibitor, SessionInhibitor};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InhibitionState {
    Inhibited,
    NotInhibited,
}

/// Manager of the idle inhibit state
pub struct LockState {
    session: Box<dyn SessionInhibitor>,
    display: Box<dyn IdleInhibitor>,
    /// Present if and only if `state` is [InhibitionState::Inhibited]
    lock: Option<OwnedFd>,
    state: InhibitionState,
}

impl LockState {
    pub fn new(session: Box<dyn SessionInhibitor>, display: Box<dyn IdleInhibitor>) -> Self {
        Self {
            session,
            display,
            lock: None,
            state: InhibitionState::NotInhibited,
        }
    }

    pub fn state(&self) -> InhibitionState {
        self.state
    }

    pub fn is_inhibited(&self) -> bool {
        self.state == InhibitionState::Inhibited
    }

    /// Takes a new session lock and attaches the display inhibitor. Errors leave the state
    /// [InhibitionState::NotInhibited] with neither backend holding anything.
    pub fn acquire(&mut self) -> Result<(), Error> {
        if self.is_inhibited() {
            trace!(target: "LockState::acquire", "Idle is already inhibited");
            return Ok(());
        }

        let lock = self.session.request_lock()?;

        // F_DUPFD_CLOEXEC onto a descriptor >= 3, keeping the lock out of child processes
        let lock = match lock.as_fd().try_clone_to_owned() {
            Ok(lock) => lock,
            Err(error) => {
                warn!(target: "LockState::acquire", "Failed to copy lock file descriptor: {error}");
                lock
            }
        };

        if let Err(error) = self.display.inhibit() {
            drop(lock);
            if let Err(error) = self.display.uninhibit() {
                warn!(target: "LockState::acquire", "Failed to roll back display inhibitor: {error}");
            }
            return Err(error);
        }

        debug!(target: "LockState::acquire", "Holding lock {lock:?}");
        self.lock = Some(lock);
        self.state = InhibitionState::Inhibited;
        info!(target: "LockState::acquire", "Idle Inhibitor was ENABLED");
        Ok(())
    }

    /// Closes the session lock and detaches the display inhibitor. Safe to call in any state; the
    /// state is [InhibitionState::NotInhibited] afterwards even if the display round trip fails.
    pub fn release(&mut self) -> Result<(), Error> {
        let was_inhibited = self.is_inhibited();

        self.lock = None;
        self.state = InhibitionState::NotInhibited;
        self.display.uninhibit()?;
        debug_assert!(!self.display.is_inhibiting());

        if was_inhibited {
            info!(target: "LockState::release", "Idle Inhibitor was DISABLED");
        } else {
            trace!(target: "LockState::release", "Idle was not inhibited");
        }
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<(), Error> {
        match self.state() {
            InhibitionState::Inhibited => self.release(),
            InhibitionState::NotInhibited => self.acquire(),
        }
    }

    /// Final teardown of the display backend
    pub fn destroy_surface(&mut self) -> Result<(), Error> {
        self.display.shutdown()
    }

    #[cfg(feature = "wayland")]
    pub fn display_mut(&mut self) -> &mut dyn IdleInhibitor {
        self.display.as_mut()
    }

    #[cfg(test)]
    pub fn lock_fd(&self) -> Option<std::os::fd::BorrowedFd<'_>> {
        self.lock.as_ref().map(AsFd::as_fd)
    }
}
