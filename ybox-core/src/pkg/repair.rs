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

//! `ybox-pkg repair`. Grounded on `ybox.pkg.repair`.

use std::{thread::sleep, time::Duration};

use crate::{
    config::distro::expand_template,
    pkg::{bash_args, PkgContext},
    utils::prompt::confirm,
    Result,
};

#[derive(Debug, Clone, Default)]
pub struct RepairOptions {
    pub extensive: bool,
    pub restart: bool,
    pub quiet: u8,
}

pub fn repair_package_state(ctx: &PkgContext, opts: &RepairOptions) -> Result<i32> {
    let pkgmgr = &ctx.distro.pkgmgr;

    if let Some(pattern) = &pkgmgr.processes_pattern {
        kill_processes(ctx, pattern, opts.quiet)?;
    }
    if let Some(pattern) = &pkgmgr.locks_pattern {
        remove_locks(ctx, pattern, opts.quiet)?;
    }

    let template = if opts.extensive { pkgmgr.repair_all.as_deref() } else { pkgmgr.repair.as_deref() };
    let code = if let Some(template) = template {
        let values = std::collections::HashMap::new();
        let repair_cmd = expand_template(template, &values);
        let (_, status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&repair_cmd), true)?;
        status.code().unwrap_or(1)
    } else {
        0
    };

    if opts.restart && code == 0 {
        ctx.runtime.container_stop(&ctx.conf.box_name)?;
        sleep(Duration::from_secs(2));
        ctx.runtime.container_start(&ctx.conf.box_name)?;
    }

    Ok(code)
}

fn kill_processes(ctx: &PkgContext, pattern: &str, quiet: u8) -> Result<()> {
    let shell_cmd = format!("pgrep -f '{pattern}'");
    let (captured, status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&shell_cmd), false)?;
    if !status.success() {
        return Ok(());
    }

    let pids: Vec<&str> = captured.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if pids.is_empty() {
        return Ok(());
    }

    if quiet == 0 && !confirm(format!("Kill processes matching '{pattern}': {}?", pids.join(", ")), false)? {
        return Ok(());
    }

    for signal in ["-INT", "-TERM", "-KILL"] {
        let kill_cmd = format!("sudo kill {signal} {}", pids.join(" "));
        let (_, status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&kill_cmd), false)?;
        if status.success() {
            break;
        }
        sleep(Duration::from_secs(1));
    }
    Ok(())
}

fn remove_locks(ctx: &PkgContext, pattern: &str, quiet: u8) -> Result<()> {
    let shell_cmd = format!("ls {pattern} 2>/dev/null");
    let (captured, status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&shell_cmd), false)?;
    if !status.success() {
        return Ok(());
    }

    let locks: Vec<&str> = captured.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if locks.is_empty() {
        return Ok(());
    }

    if quiet == 0 && !confirm(format!("Remove lock files: {}?", locks.join(", ")), false)? {
        return Ok(());
    }

    let rm_cmd = format!("sudo rm -f {}", locks.join(" "));
    ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&rm_cmd), false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_options_default_is_not_extensive() {
        let opts = RepairOptions::default();
        assert!(!opts.extensive);
        assert!(!opts.restart);
    }
}
