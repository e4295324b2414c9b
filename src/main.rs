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

//! Prevents system idle for as long as it runs, through a systemd-logind inhibitor lock and,
//! when available, the Wayland idle inhibit protocol. SIGUSR1 toggles the inhibition.

use std::{error::Error as StdError, process::ExitCode};

mod error;
mod idle_inhibitor;
mod lifecycle;
mod lock_state;
mod message_queue;
mod pidfile;
mod settings;
mod signals;

use error::Error;
#[cfg(feature = "wayland")]
use idle_inhibitor::wayland::WaylandIdleInhibitor;
use idle_inhibitor::{logind::LogindInhibitor, noop::NoopIdleInhibitor, IdleInhibitor};
use lifecycle::{Flow, Lifecycle};
use lock_state::LockState;
use log::{debug, warn};
use message_queue::MessageQueueReceiver;
use nix::{
    errno::Errno,
    sys::{epoll::*, signal::Signal},
};
use pidfile::Pidfile;
use settings::Settings;
use signals::Intent;

#[repr(u64)]
enum MessageQueueType {
    Unknown,
    Wayland,
    Signals,
}

impl From<u64> for MessageQueueType {
    fn from(value: u64) -> Self {
        match value {
            value if value == Self::Wayland as u64 => Self::Wayland,
            value if value == Self::Signals as u64 => Self::Signals,
            _ => Self::Unknown,
        }
    }
}

/// `error` followed by its sources
fn describe(error: &Error) -> String {
    let mut description = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        description.push_str(&format!(": {cause}"));
        source = cause.source();
    }
    description
}

fn main() -> ExitCode {
    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("{}: {}", env!("CARGO_PKG_NAME"), describe(&error));
            return error.exit_code();
        }
    };

    if let Err(error) = simplelog::TermLogger::init(
        settings.get_verbosity(),
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    ) {
        let error = Error::Logger(error);
        eprintln!("{}: {}", env!("CARGO_PKG_NAME"), describe(&error));
        return error.exit_code();
    }

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{}", describe(&error));
            error.exit_code()
        }
    }
}

fn run(settings: &Settings) -> Result<(), Error> {
    let mut pidfile = match settings.get_pidfile() {
        Some(path) => match Pidfile::open(&path) {
            Ok(pidfile) => Some(pidfile),
            Err(error @ Error::PidfileConflict { .. }) => return Err(error),
            Err(error) => {
                warn!(target: "main", "Cannot open or create pidfile: {}", describe(&error));
                None
            }
        },
        None => None,
    };

    // Before any thread exists: only the calling thread survives the fork.
    if settings.is_daemon() {
        nix::unistd::daemon(true, false).map_err(Error::Daemonize)?;
    }

    if let Some(pidfile) = &mut pidfile {
        if let Err(error) = pidfile.write_pid() {
            warn!(target: "main", "{}", describe(&error));
        }
    }

    let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC).map_err(Error::Poll)?;
    let (mq, mq_receiver) =
        message_queue::message_queue::<Intent>(&epoll, MessageQueueType::Signals as u64)?;
    signals::spawn_dispatcher(mq)?;

    let session = Box::new(LogindInhibitor::new()?);
    let display = display_inhibitor(settings)?;
    let mut lifecycle = Lifecycle::new(LockState::new(session, display), pidfile);

    lifecycle.start()?;

    let signal = main_loop(&mut lifecycle, &epoll, &mq_receiver)?;
    drop(lifecycle);
    signals::reraise(signal)?;

    Ok(())
}

fn display_inhibitor(settings: &Settings) -> Result<Box<dyn IdleInhibitor>, Error> {
    if settings.is_wayland_enabled() {
        #[cfg(feature = "wayland")]
        return Ok(Box::new(WaylandIdleInhibitor::new()?));

        #[cfg(not(feature = "wayland"))]
        warn!(target: "main", "Built without Wayland support, relying on logind alone");
    }

    debug!(target: "main", "Wayland idle inhibitor disabled");
    Ok(Box::<NoopIdleInhibitor>::default())
}

/// Waits for signal intents, and Wayland traffic when connected, until a terminating signal has
/// been handled. Returns that signal.
fn main_loop(
    lifecycle: &mut Lifecycle,
    epoll: &Epoll,
    mq_receiver: &MessageQueueReceiver<Intent>,
) -> Result<Signal, Error> {
    loop {
        #[cfg(feature = "wayland")]
        let wayland_read_guard = lifecycle
            .lock_state_mut()
            .display_mut()
            .wayland_queue_read_guard()?;

        #[cfg(feature = "wayland")]
        if let Some(wayland_read_guard) = &wayland_read_guard {
            epoll
                .add(
                    wayland_read_guard.connection_fd(),
                    EpollEvent::new(EpollFlags::EPOLLIN, MessageQueueType::Wayland as u64),
                )
                .map_err(Error::Poll)?;
        }

        let mut events = [EpollEvent::empty()];
        let ret = epoll.wait(&mut events, EpollTimeout::NONE);

        #[cfg(feature = "wayland")]
        if let Some(wayland_read_guard) = &wayland_read_guard {
            epoll
                .delete(wayland_read_guard.connection_fd())
                .map_err(Error::Poll)?;
        }

        let event = match ret {
            Ok(0) | Err(Errno::EINTR) => continue,
            Ok(_) => events[0],
            Err(err) => return Err(Error::Poll(err)),
        };

        match event.data().into() {
            MessageQueueType::Signals => {
                #[cfg(feature = "wayland")]
                std::mem::drop(wayland_read_guard);

                if let Flow::Exit(signal) = lifecycle.handle(mq_receiver.recv()?)? {
                    return Ok(signal);
                }
            }

            #[cfg(feature = "wayland")]
            MessageQueueType::Wayland => {
                let Some(wayland_read_guard) = wayland_read_guard else {
                    continue;
                };
                read_wayland_events(wayland_read_guard)?;
                lifecycle
                    .lock_state_mut()
                    .display_mut()
                    .wayland_dispatch_pending()?;
            }

            _ => log::error!(target: "main", "Unknown event queue"),
        }
    }
}

#[cfg(feature = "wayland")]
fn read_wayland_events(
    wayland_read_guard: wayland_client::backend::ReadEventsGuard,
) -> Result<(), Error> {
    use wayland_client::backend::WaylandError;

    match wayland_read_guard.read() {
        Ok(_) => Ok(()),
        Err(WaylandError::Io(error)) if error.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
        Err(error) => {
            log::error!(target: "main", "Wayland connection failed: {error}");
            Err(Error::DisplayLost)
        }
    }
}
