/*
 * ybox-core
 *
 * Copyright (C) 2024-2026 ybox contributors
 * SPDX-License-Identifier: GPL-3.0-only
 *
 * This library is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, version 3.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Advisory exclusive file lock with polling acquisition, used to serialize
//! shared-root population across concurrent `create` invocations (spec.md
//! §4.2, §5).

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{File, OpenOptions},
    os::fd::AsRawFd,
    path::{Path, PathBuf},
    thread::sleep,
    time::{Duration, Instant},
};

use crate::{constants::DEFAULT_LOCK_POLL_INTERVAL_SECS, err, impl_error, Error, ErrorGeneric, ErrorTrait, Result};

#[derive(Debug)]
pub enum LockError {
    Timeout(PathBuf, i64),
}

impl Display for LockError {
    fn fmt(&self, fmter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Timeout(path, secs) => write!(fmter, "Timed out after {secs}s waiting for lock on '{}'", path.display()),
        }
    }
}

impl_error!(LockError);

/// An acquired advisory lock on `path`. Released on drop, including on
/// panic or early return from the holding scope.
pub struct FileLock {
    path: PathBuf,
    file: File,
}

impl FileLock {
    /// Acquire an exclusive lock on `path`, creating (or truncating) it if
    /// needed. `timeout_secs` negative means wait forever; `poll_interval`
    /// is the sleep between non-blocking attempts.
    pub fn acquire(path: impl AsRef<Path>, timeout_secs: i64, poll_interval: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .prepend_io(|| path.display().to_string())?;
        let start = Instant::now();

        loop {
            if try_lock_exclusive(&file) {
                return Ok(Self { path, file });
            }

            if timeout_secs >= 0 && start.elapsed() >= Duration::from_secs(timeout_secs as u64) {
                err!(LockError::Timeout(path, timeout_secs))?
            }

            sleep(poll_interval);
        }
    }

    /// Convenience wrapper using the default poll interval.
    pub fn acquire_default(path: impl AsRef<Path>, timeout_secs: i64) -> Result<Self> {
        Self::acquire(path, timeout_secs, Duration::from_secs(DEFAULT_LOCK_POLL_INTERVAL_SECS))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        unlock(&self.file);
    }
}

fn try_lock_exclusive(file: &File) -> bool {
    // SAFETY: `fd` is a valid, open file descriptor for the lifetime of this call.
    let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    ret == 0
}

fn unlock(file: &File) {
    // SAFETY: `fd` is a valid, open file descriptor for the lifetime of this call.
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_succeeds_when_free() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("test.lock");
        let lock = FileLock::acquire(&lock_path, 0, Duration::from_millis(10));
        assert!(lock.is_ok());
    }

    #[test]
    fn zero_timeout_fails_when_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("test.lock");
        let _held = FileLock::acquire(&lock_path, 0, Duration::from_millis(10)).unwrap();
        let second = FileLock::acquire(&lock_path, 0, Duration::from_millis(10));
        assert!(second.is_err());
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("test.lock");
        {
            let _held = FileLock::acquire(&lock_path, 0, Duration::from_millis(10)).unwrap();
        }
        let reacquired = FileLock::acquire(&lock_path, 0, Duration::from_millis(10));
        assert!(reacquired.is_ok());
    }
}
