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

//! CLI Args parsing and processing

use std::{fmt::Display, path::PathBuf};

use clap::{builder::PossibleValue, ArgAction, Parser, ValueEnum};
use log::LevelFilter;
use serde::Serialize;

/// Prevents system idle. Send SIGUSR1 to toggle the inhibition, SIGINT, SIGTERM or SIGHUP to
/// release it and exit.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_version_flag = true)]
pub struct Args {
    #[arg(short = 'v', short_alias = 'V', long, action = ArgAction::Version, help = "Print version")]
    version: Option<bool>,

    #[arg(short, long, help = "Run as background daemon")]
    daemon: bool,

    #[arg(short, long, value_name = "PATH", help = "Create pidfile at PATH")]
    pidfile: Option<PathBuf>,

    #[arg(
        short = 'W',
        long = "no-wayland",
        help = "Disables the Wayland idle inhibitor"
    )]
    no_wayland: bool,

    #[arg(short = 'l', long, value_name = "LEVEL", help = "Log verbosity")]
    verbosity: Option<LogLevel>,

    #[arg(
        short,
        long,
        conflicts_with = "verbosity",
        help = "Disables logging completely"
    )]
    quiet: bool,

    #[arg(short, long, value_name = "PATH", help = "Path to config file")]
    pub config: Option<PathBuf>,
}

/// Values given on the command line. Unset flags are skipped so they do not shadow the config
/// file.
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    verbosity: Option<LevelFilter>,

    #[serde(skip_serializing_if = "Option::is_none")]
    daemon: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pidfile: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    wayland: Option<bool>,
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        let verbosity = if self.quiet {
            Some(LevelFilter::Off)
        } else {
            self.verbosity.as_ref().map(|LogLevel(level)| *level)
        };

        Overrides {
            verbosity,
            daemon: self.daemon.then_some(true),
            pidfile: self.pidfile.clone(),
            wayland: self.no_wayland.then_some(false),
        }
    }
}

/// Wrapper type around [LevelFilter] to implement the trait [ValueEnum] for better CLI args
/// integration
#[derive(Debug, Clone)]
struct LogLevel(LevelFilter);

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ValueEnum for LogLevel {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            Self(LevelFilter::Off),
            Self(LevelFilter::Error),
            Self(LevelFilter::Warn),
            Self(LevelFilter::Info),
            Self(LevelFilter::Debug),
            Self(LevelFilter::Trace),
        ]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(PossibleValue::new(self.0.to_string().to_lowercase()))
    }
}
