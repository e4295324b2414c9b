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

//! Process wide state, from the first acquisition until teardown. Teardown runs once, whether it
//! is triggered by a terminating signal, a fatal error or a plain return.

use log::{debug, error, info};
use nix::sys::signal::Signal;

use crate::{error::Error, lock_state::LockState, pidfile::Pidfile, signals::Intent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Cleanup is done, the process should die from this signal
    Exit(Signal),
}

pub struct Lifecycle {
    lock_state: LockState,
    pidfile: Option<Pidfile>,
    finished: bool,
}

impl Lifecycle {
    pub fn new(lock_state: LockState, pidfile: Option<Pidfile>) -> Self {
        Self {
            lock_state,
            pidfile,
            finished: false,
        }
    }

    /// Initial acquisition. Failing here is fatal.
    pub fn start(&mut self) -> Result<(), Error> {
        self.lock_state.acquire()
    }

    pub fn handle(&mut self, intent: Intent) -> Result<Flow, Error> {
        match intent {
            Intent::Toggle => {
                self.lock_state.toggle()?;
                Ok(Flow::Continue)
            }
            Intent::Terminate(signal) => {
                info!(target: "Lifecycle::handle", "Received {signal}, shutting down");
                self.shutdown();
                Ok(Flow::Exit(signal))
            }
        }
    }

    /// Releases the inhibition, removes the pidfile and destroys the display surface
    pub fn shutdown(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        if let Err(error) = self.lock_state.release() {
            error!(target: "Lifecycle::shutdown", "{error}");
        }
        if let Some(pidfile) = self.pidfile.take() {
            debug!(target: "Lifecycle::shutdown", "Removing {}", pidfile.path().display());
        }
        if let Err(error) = self.lock_state.destroy_surface() {
            error!(target: "Lifecycle::shutdown", "{error}");
        }
    }

    #[cfg(feature = "wayland")]
    pub fn lock_state_mut(&mut self) -> &mut LockState {
        &mut self.lock_state
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::lock_state::{tests::*, InhibitionState};

    fn pidfile() -> (TempDir, PathBuf, Pidfile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caffeinated.pid");
        let mut pidfile = Pidfile::open(&path).unwrap();
        pidfile.write_pid().unwrap();
        (dir, path, pidfile)
    }

    #[test]
    fn start_toggle_toggle_terminate() {
        let (_dir, path, pidfile) = pidfile();
        let (lock_state, session, display) = fake_lock_state();
        let mut lifecycle = Lifecycle::new(lock_state, Some(pidfile));

        lifecycle.start().unwrap();
        assert_eq!(lifecycle.lock_state.state(), InhibitionState::Inhibited);
        assert_eq!(session.borrow().requests, 1);

        assert_eq!(lifecycle.handle(Intent::Toggle).unwrap(), Flow::Continue);
        assert_eq!(lifecycle.lock_state.state(), InhibitionState::NotInhibited);
        assert!(lock_closed(&session.borrow().readers[0]));
        assert_eq!(display.borrow().destroyed, 1);

        assert_eq!(lifecycle.handle(Intent::Toggle).unwrap(), Flow::Continue);
        assert_eq!(lifecycle.lock_state.state(), InhibitionState::Inhibited);
        assert_eq!(session.borrow().requests, 2);
        assert_eq!(display.borrow().created, 2);

        let flow = lifecycle.handle(Intent::Terminate(Signal::SIGTERM)).unwrap();
        assert_eq!(flow, Flow::Exit(Signal::SIGTERM));
        assert_eq!(lifecycle.lock_state.state(), InhibitionState::NotInhibited);
        assert!(lock_closed(&session.borrow().readers[1]));
        assert!(!display.borrow().inhibitor);
        assert_eq!(display.borrow().surface_destroyed, 1);
        assert!(!path.exists());
    }

    #[test]
    fn terminate_while_not_inhibited_removes_pidfile() {
        let (_dir, path, pidfile) = pidfile();
        let (lock_state, _, display) = fake_lock_state();
        let mut lifecycle = Lifecycle::new(lock_state, Some(pidfile));

        lifecycle.start().unwrap();
        lifecycle.handle(Intent::Toggle).unwrap();
        let flow = lifecycle.handle(Intent::Terminate(Signal::SIGHUP)).unwrap();

        assert_eq!(flow, Flow::Exit(Signal::SIGHUP));
        assert!(!path.exists());
        assert_eq!(display.borrow().surface_destroyed, 1);
    }

    #[test]
    fn shutdown_runs_once() {
        let (_dir, _path, pidfile) = pidfile();
        let (lock_state, _, display) = fake_lock_state();
        let mut lifecycle = Lifecycle::new(lock_state, Some(pidfile));

        lifecycle.start().unwrap();
        lifecycle.handle(Intent::Terminate(Signal::SIGINT)).unwrap();
        lifecycle.shutdown();
        drop(lifecycle);

        assert_eq!(display.borrow().destroyed, 1);
        assert_eq!(display.borrow().surface_destroyed, 1);
    }

    #[test]
    fn failed_start_still_cleans_up() {
        let (_dir, path, pidfile) = pidfile();
        let (lock_state, session, display) = fake_lock_state();
        session.borrow_mut().fail = true;
        let mut lifecycle = Lifecycle::new(lock_state, Some(pidfile));

        assert!(matches!(lifecycle.start(), Err(Error::BusCall(_))));
        assert!(path.exists());

        drop(lifecycle);
        assert!(!path.exists());
        assert_eq!(display.borrow().surface_destroyed, 1);
    }

    #[test]
    fn drop_releases_inhibition() {
        let (lock_state, session, display) = fake_lock_state();
        let mut lifecycle = Lifecycle::new(lock_state, None);

        lifecycle.start().unwrap();
        drop(lifecycle);

        assert!(lock_closed(&session.borrow().readers[0]));
        assert!(!display.borrow().inhibitor);
    }
}
