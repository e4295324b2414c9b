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

use log::trace;

use super::IdleInhibitor;
use crate::error::Error;

/// Stand-in used when the display inhibitor is compiled out or disabled. Inhibition then relies
/// on the session manager lock alone.
#[derive(Default)]
pub struct NoopIdleInhibitor;

impl IdleInhibitor for NoopIdleInhibitor {
    fn inhibit(&mut self) -> Result<(), Error> {
        trace!(target: "NoopIdleInhibitor::inhibit", "No display inhibitor in use");
        Ok(())
    }

    fn uninhibit(&mut self) -> Result<(), Error> {
        trace!(target: "NoopIdleInhibitor::uninhibit", "No display inhibitor in use");
        Ok(())
    }

    fn is_inhibiting(&self) -> bool {
        false
    }
}
