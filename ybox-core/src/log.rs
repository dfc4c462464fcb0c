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

//! A small append-only file logger, separate from the colored interactive
//! output in [`crate::utils::ansi`]. Structured messages go to
//! `<data_dir>/ybox.log`; progress and prompts go straight to the terminal.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
};

use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};

use crate::{err, impl_error, Error, ErrorGeneric, ErrorTrait, Result};

const DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

#[derive(Debug)]
pub enum LoggerError {
    Uninitialized,
}

impl Display for LoggerError {
    fn fmt(&self, fmter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Uninitialized => write!(fmter, "Logger is uninitialized"),
        }
    }
}

impl_error!(LoggerError);

#[derive(PartialEq, Eq, Clone, Copy)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

pub struct Logger {
    file: File,
}

impl Logger {
    /// Open (creating if absent) the log file at `<data_dir>/ybox.log`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("ybox.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .prepend_io(|| path.display().to_string())?;

        Ok(Self { file })
    }

    pub fn log(&mut self, level: Level, message: impl Display) -> Result<()> {
        let now = OffsetDateTime::now_utc().format(DATE_FORMAT).unwrap_or_default();

        writeln!(self.file, "{now} [{}] {message}", level.as_str()).prepend(|| "Failed to write log entry".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = Logger::open(dir.path()).unwrap();
        logger.log(Level::Info, "hello").unwrap();
        logger.log(Level::Warn, "world").unwrap();

        let contents = std::fs::read_to_string(dir.path().join("ybox.log")).unwrap();
        assert!(contents.contains("[INFO] hello"));
        assert!(contents.contains("[WARN] world"));
    }
}
