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

//! Immutable per-process snapshot of the host environment: home directories,
//! XDG runtime directory, the captured "now", and the ordered configuration
//! search path. Constructed once at process start and threaded through every
//! other component as `RuntimeContext`'s foundation.

use std::{env::var, path::PathBuf};

use time::OffsetDateTime;

use crate::{constants::TESTING, err, impl_error, Error, ErrorTrait, Result};

#[derive(Debug)]
pub enum EnvError {
    NotFound(String, Vec<PathBuf>),
}

impl std::fmt::Display for EnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path, dirs) => write!(
                f,
                "Configuration file '{path}' not found in [{}]",
                dirs.iter().map(|d| d.display().to_string()).collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

impl_error!(EnvError);

/// Per-process immutable snapshot described in spec.md's data model.
#[derive(Debug, Clone)]
pub struct Environment {
    home: PathBuf,
    target_home: PathBuf,
    data_dir: PathBuf,
    target_data_dir: PathBuf,
    xdg_runtime_dir: String,
    now: OffsetDateTime,
    config_search_paths: Vec<PathBuf>,
    user_applications_dir: PathBuf,
    user_executables_dir: PathBuf,
    user_man_dir: PathBuf,
}

impl Environment {
    /// Build the environment from the current process's user and
    /// environment variables, mirroring `ybox.env.Environ.__init__`.
    pub fn capture() -> Result<Self> {
        let home = home_dir()?;
        let user = whoami();
        let target_home = PathBuf::from(format!("/home/{user}"));
        let user_base = home.join(".local");
        let data_dir = user_base.join("share/ybox");
        let target_data_dir = target_home.join(".local/share/ybox");
        let xdg_runtime_dir = var("XDG_RUNTIME_DIR").unwrap_or_default();
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());

        let config_search_paths = if *TESTING {
            vec![bundled_conf_dir()]
        } else {
            vec![home.join(".config/ybox"), bundled_conf_dir()]
        };

        Ok(Self {
            user_applications_dir: user_base.join("share/applications"),
            user_executables_dir: user_base.join("bin"),
            user_man_dir: user_base.join("share/man"),
            home,
            target_home,
            data_dir,
            target_data_dir,
            xdg_runtime_dir,
            now,
            config_search_paths,
        })
    }

    pub fn home(&self) -> &std::path::Path {
        &self.home
    }

    pub fn target_home(&self) -> &std::path::Path {
        &self.target_home
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    pub fn target_data_dir(&self) -> &std::path::Path {
        &self.target_data_dir
    }

    pub fn xdg_runtime_dir(&self) -> &str {
        &self.xdg_runtime_dir
    }

    pub fn now(&self) -> OffsetDateTime {
        self.now
    }

    pub fn config_search_paths(&self) -> &[PathBuf] {
        &self.config_search_paths
    }

    pub fn user_applications_dir(&self) -> &std::path::Path {
        &self.user_applications_dir
    }

    pub fn user_executables_dir(&self) -> &std::path::Path {
        &self.user_executables_dir
    }

    pub fn user_man_dir(&self) -> &std::path::Path {
        &self.user_man_dir
    }

    /// Search for `conf_path` in the user's configuration directory then the
    /// bundled system directory, in that order. Absolute paths are returned
    /// as-is without a filesystem search.
    pub fn search_config_path(&self, conf_path: &str, quiet: bool) -> Result<PathBuf> {
        let candidate = PathBuf::from(conf_path);

        if candidate.is_absolute() {
            return Ok(candidate);
        }

        for dir in &self.config_search_paths {
            let path = dir.join(conf_path);

            if path.exists() {
                return Ok(path);
            }
        }

        if !quiet {
            err!(EnvError::NotFound(conf_path.into(), self.config_search_paths.clone()))?
        } else {
            err!(EnvError::NotFound(conf_path.into(), vec![]))?
        }
    }
}

fn home_dir() -> Result<PathBuf> {
    match var("HOME") {
        Ok(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => err!(EnvError::NotFound("$HOME".into(), vec![]))?,
    }
}

fn whoami() -> String {
    var("USER").or_else(|_| var("LOGNAME")).unwrap_or_else(|_| "user".into())
}

fn bundled_conf_dir() -> PathBuf {
    var("YBOX_PKG_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/usr/share/ybox/conf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_config_path_returns_absolute_unchanged() {
        std::env::set_var("HOME", "/tmp/ybox-test-home");
        let env = Environment::capture().unwrap();
        let found = env.search_config_path("/etc/ybox/foo.ini", false).unwrap();
        assert_eq!(found, PathBuf::from("/etc/ybox/foo.ini"));
    }
}
