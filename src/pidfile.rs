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

//! Advisory pidfile. The file stays `flock`ed while the process runs, which is what tells a
//! second instance that this one is alive.

use std::{
    fs::{self, File, OpenOptions},
    io::{Seek, Write},
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
    process,
};

use log::{debug, error};
use nix::{
    errno::Errno,
    fcntl::{Flock, FlockArg},
};

use crate::error::Error;

pub struct Pidfile {
    path: PathBuf,
    file: Flock<File>,
}

impl Pidfile {
    /// Opens and locks the pidfile without touching its contents, so a running instance keeps its
    /// pid on record.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o644)
            .open(path)
            .map_err(|source| Error::Pidfile {
                path: path.to_path_buf(),
                source,
            })?;

        let file = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(file) => file,
            Err((_, Errno::EWOULDBLOCK)) => {
                return Err(Error::PidfileConflict {
                    path: path.to_path_buf(),
                })
            }
            Err((_, errno)) => {
                return Err(Error::Pidfile {
                    path: path.to_path_buf(),
                    source: errno.into(),
                })
            }
        };

        debug!(target: "Pidfile::open", "Locked {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Records the current pid. Must run after daemonizing, as forking changes it.
    pub fn write_pid(&mut self) -> Result<(), Error> {
        let pid = process::id();
        self.file
            .set_len(0)
            .and_then(|()| self.file.rewind())
            .and_then(|()| writeln!(self.file, "{pid}"))
            .and_then(|()| self.file.sync_data())
            .map_err(|source| Error::Pidfile {
                path: self.path.clone(),
                source,
            })?;

        debug!(target: "Pidfile::write_pid", "Wrote pid {pid} to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Pidfile {
    /// Unlinks before the lock is released, so a new instance never loses its own file.
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(target: "Pidfile::drop", "Removed {}", self.path.display()),
            Err(error) => error!(target: "Pidfile::drop", "Cannot remove {}: {error}", self.path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_current_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caffeinated.pid");

        let mut pidfile = Pidfile::open(&path).unwrap();
        pidfile.write_pid().unwrap();
        pidfile.write_pid().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, format!("{}\n", process::id()));
        assert_eq!(pidfile.path(), path);
    }

    #[test]
    fn second_instance_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caffeinated.pid");

        let mut first = Pidfile::open(&path).unwrap();
        first.write_pid().unwrap();

        let second = Pidfile::open(&path);
        assert!(matches!(second, Err(Error::PidfileConflict { .. })));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("{}\n", process::id())
        );
    }

    #[test]
    fn drop_removes_file_and_unlocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caffeinated.pid");

        drop(Pidfile::open(&path).unwrap());
        assert!(!path.exists());

        let _reopened = Pidfile::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn missing_directory_is_not_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("caffeinated.pid");

        assert!(matches!(Pidfile::open(&path), Err(Error::Pidfile { .. })));
    }
}
