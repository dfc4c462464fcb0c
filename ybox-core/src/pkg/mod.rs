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

//! Package Coordinator (spec §4.6): install/uninstall/mark/update/repair of
//! packages inside an active ybox container, plus the read-only
//! list/info/search/list-files/clean operations and repository management
//! (§4.8), all driven by the distribution's `[pkgmgr]`/`[repo]` command
//! templates against the container's podman/docker process.

pub mod clean;
pub mod info;
pub mod install;
pub mod list;
pub mod mark;
pub mod repair;
pub mod repo;
pub mod search;
pub mod uninstall;
pub mod update;

use std::{
    io::Write,
    process::{Command, ExitStatus, Stdio},
};

use crate::{
    config::{distro::Distro, StaticConfiguration},
    env::Environment,
    runtime::Runtime,
    state::StateStore,
    ErrorGeneric, Result,
};

/// Everything a Package Coordinator operation needs about the target
/// container and distribution, threaded through rather than re-derived at
/// each call site.
pub struct PkgContext<'a> {
    pub runtime: &'a Runtime,
    pub env: &'a Environment,
    pub distro: &'a Distro,
    pub conf: &'a StaticConfiguration,
    pub state: &'a mut StateStore,
    pub shared_root: &'a str,
    pub quiet: u8,
}

/// `/bin/bash -c <cmd>`, the argv tail handed to `Runtime::exec_streamed`
/// or `Runtime::exec_output` for every templated pkgmgr/repo invocation.
pub(crate) fn bash_args(shell_cmd: &str) -> Vec<String> {
    vec!["/bin/bash".into(), "-c".into(), shell_cmd.into()]
}

/// Run `check_cmd` (a `[pkgmgr] check_install`-style template already
/// expanded for `package`) against `container`, returning its exit code.
/// Grounded on `ybox.util.check_installed_package`.
pub(crate) fn check_installed_package(runtime: &Runtime, check_cmd: &str, package: &str, container: &str) -> Result<i32> {
    let shell_cmd = format!("{check_cmd} {package}");
    let output = runtime.exec_output(container, &bash_args(&shell_cmd))?;
    Ok(output.status.code().unwrap_or(1))
}

/// Page `text` through `pager` (a shell-quoted command line split on
/// whitespace) one screenful at a time, or dump it straight to stdout when
/// `pager` is empty. Grounded on `ybox.cmd.page_output`.
pub(crate) fn page_output(text: &str, pager: &str) -> Result<ExitStatus> {
    if pager.is_empty() {
        print!("{text}");
        let _ = std::io::stdout().flush();
        return Ok(ExitStatus::default());
    }

    let mut parts = pager.split_whitespace();
    let Some(program) = parts.next() else {
        print!("{text}");
        return Ok(ExitStatus::default());
    };

    let mut child = match Command::new(program).args(parts).stdin(Stdio::piped()).spawn() {
        Ok(child) => child,
        Err(_) => {
            print!("{text}");
            let _ = std::io::stdout().flush();
            return Ok(ExitStatus::default());
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(text.as_bytes());
    }

    child.wait().generic()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_args_wraps_command_in_bash_dash_c() {
        assert_eq!(bash_args("echo hi"), vec!["/bin/bash".to_string(), "-c".to_string(), "echo hi".to_string()]);
    }

    #[test]
    fn page_output_without_pager_returns_default_status() {
        let status = page_output("hello\n", "").unwrap();
        assert!(status.success());
    }
}
