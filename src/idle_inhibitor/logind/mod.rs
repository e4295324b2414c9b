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
//
// SPDX-License-Identifier: GPL-3.0-only

//! systemd-logind (or elogind) inhibitor locks over the system bus.

use std::os::fd::OwnedFd;

use log::debug;
use zbus::{blocking::Connection, zvariant};

use super::SessionInhibitor;
use crate::error::Error;

const LOGIND_SERVICE: &str = "org.freedesktop.login1";
const LOGIND_PATH: &str = "/org/freedesktop/login1";
const LOGIND_MANAGER_INTERFACE: &str = "org.freedesktop.login1.Manager";

/// Arguments of `org.freedesktop.login1.Manager.Inhibit`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InhibitRequest {
    pub what: &'static str,
    pub who: &'static str,
    pub why: &'static str,
    pub mode: &'static str,
}

impl InhibitRequest {
    pub const IDLE: Self = Self {
        what: "idle",
        who: "caffeinated",
        why: "Prevent system idle",
        mode: "block",
    };

    fn body(&self) -> (&str, &str, &str, &str) {
        (self.what, self.who, self.why, self.mode)
    }
}

pub struct LogindInhibitor {
    connection: Connection,
    request: InhibitRequest,
}

impl LogindInhibitor {
    pub fn new() -> Result<Self, Error> {
        let connection = Connection::system().map_err(Error::BusConnect)?;

        debug!(target: "LogindInhibitor::new", "Connected to the system bus");
        Ok(Self {
            connection,
            request: InhibitRequest::IDLE,
        })
    }
}

impl SessionInhibitor for LogindInhibitor {
    fn request_lock(&mut self) -> Result<OwnedFd, Error> {
        let reply = self
            .connection
            .call_method(
                Some(LOGIND_SERVICE),
                LOGIND_PATH,
                Some(LOGIND_MANAGER_INTERFACE),
                "Inhibit",
                &self.request.body(),
            )
            .map_err(Error::BusCall)?;

        let fd: zvariant::OwnedFd = reply.body().deserialize().map_err(Error::HandleParse)?;

        debug!(target: "LogindInhibitor::request_lock", "Received inhibitor lock {:?}", self.request);
        Ok(fd.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_request_blocks_idle_for_caffeinated() {
        assert_eq!(
            InhibitRequest::IDLE.body(),
            ("idle", "caffeinated", "Prevent system idle", "block")
        );
    }
}
