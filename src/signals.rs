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

//! Turns process signals into [Intent]s on the main message queue. Nothing runs inside the
//! signal handlers themselves: signal-hook wakes a dispatcher thread, which only forwards.

use std::{os::raw::c_int, thread};

use log::{debug, error};
use nix::sys::signal::{self, SigHandler, Signal};
use signal_hook::iterator::Signals;

use crate::{error::Error, message_queue::MessageQueueSender};

pub const TOGGLE_SIGNAL: Signal = Signal::SIGUSR1;
pub const TERMINATE_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Toggle,
    Terminate(Signal),
}

impl Intent {
    pub fn from_signal(signal: c_int) -> Option<Self> {
        let signal = Signal::try_from(signal).ok()?;
        if signal == TOGGLE_SIGNAL {
            Some(Self::Toggle)
        } else if TERMINATE_SIGNALS.contains(&signal) {
            Some(Self::Terminate(signal))
        } else {
            None
        }
    }
}

/// Registers the handlers and starts the thread forwarding them to `mq`
pub fn spawn_dispatcher(mq: MessageQueueSender<Intent>) -> Result<(), Error> {
    let signals = Signals::new(
        std::iter::once(TOGGLE_SIGNAL)
            .chain(TERMINATE_SIGNALS)
            .map(|signal| signal as c_int),
    )
    .map_err(Error::Signals)?;

    spawn_dispatcher_for(signals, mq)
}

fn spawn_dispatcher_for(mut signals: Signals, mq: MessageQueueSender<Intent>) -> Result<(), Error> {
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                let Some(intent) = Intent::from_signal(signal) else {
                    continue;
                };

                debug!(target: "signals::dispatcher", "Received signal {signal}, queueing {intent:?}");
                if let Err(error) = mq.send(intent) {
                    error!(target: "signals::dispatcher", "{error}");
                    break;
                }
            }
        })
        .map_err(Error::Signals)?;

    Ok(())
}

/// Restores the default disposition of `signal` and raises it again, so the exit status is the
/// one the signal would have produced on its own.
pub fn reraise(signal: Signal) -> Result<(), Error> {
    debug!(target: "signals::reraise", "Re-raising {signal}");

    // SAFETY: SIG_DFL installs no handler code.
    unsafe { signal::signal(signal, SigHandler::SigDfl) }
        .map_err(|errno| Error::Signals(errno.into()))?;
    signal::raise(signal).map_err(|errno| Error::Signals(errno.into()))
}

#[cfg(test)]
mod tests {
    use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollTimeout};

    use super::*;
    use crate::message_queue::message_queue;

    #[test]
    fn maps_consumed_signals() {
        assert_eq!(Intent::from_signal(libc_signal(Signal::SIGUSR1)), Some(Intent::Toggle));
        for signal in TERMINATE_SIGNALS {
            assert_eq!(
                Intent::from_signal(libc_signal(signal)),
                Some(Intent::Terminate(signal))
            );
        }
    }

    #[test]
    fn ignores_other_signals() {
        assert_eq!(Intent::from_signal(libc_signal(Signal::SIGUSR2)), None);
        assert_eq!(Intent::from_signal(0), None);
    }

    #[test]
    fn toggle_signal_reaches_queue() {
        let epoll = Epoll::new(EpollCreateFlags::empty()).unwrap();
        let (mq, mq_receiver) = message_queue::<Intent>(&epoll, 3).unwrap();
        // Only SIGUSR1, so the test binary still dies on Ctrl-C
        let signals = Signals::new([TOGGLE_SIGNAL as c_int]).unwrap();
        spawn_dispatcher_for(signals, mq).unwrap();

        signal::raise(Signal::SIGUSR1).unwrap();

        let mut events = [EpollEvent::empty()];
        epoll.wait(&mut events, EpollTimeout::NONE).unwrap();
        assert_eq!(events[0].data(), 3);
        assert_eq!(mq_receiver.recv().unwrap(), Intent::Toggle);
    }

    fn libc_signal(signal: Signal) -> c_int {
        signal as c_int
    }
}
