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

//! `ybox-pkg list` / `ybox-pkg list-files`. Grounded on `ybox.pkg.list`.

use std::collections::HashMap;

use crate::{
    config::distro::expand_template,
    pkg::{bash_args, page_output, PkgContext},
    Result,
};

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub os_pkgs: bool,
    pub long: bool,
    pub quiet: u8,
}

/// List packages: either the distribution's raw package listing
/// (`os_pkgs`), or the subset tracked in state expanded back through the
/// `list_all`/`list_all_long` templates.
pub fn list_packages(ctx: &PkgContext, opts: &ListOptions) -> Result<i32> {
    let pkgmgr = &ctx.distro.pkgmgr;
    let quiet_flag = if opts.quiet > 0 { pkgmgr.quiet_flag.as_deref().unwrap_or("") } else { "" };
    let mut values = HashMap::new();
    values.insert("quiet", quiet_flag);

    if opts.os_pkgs {
        let template = if opts.long { pkgmgr.list_long.as_deref() } else { pkgmgr.list.as_deref() };
        return run_list_template(ctx, template, &values);
    }

    let names = ctx.state.get_packages(Some(&ctx.conf.box_name), None, ".*", ".*")?;
    if names.is_empty() {
        return Ok(0);
    }

    let template = if opts.long { pkgmgr.list_all_long.as_deref() } else { pkgmgr.list_all.as_deref() };
    let Some(template) = template else { return Ok(1) };
    let joined = names.join(" ");
    values.insert("packages", &joined);
    let cmd = expand_template(template, &values);
    run_list_command(ctx, &cmd)
}

pub fn list_files(ctx: &PkgContext, package: &str) -> Result<i32> {
    let Some(template) = &ctx.distro.pkgmgr.list_files else { return Ok(1) };
    let values = HashMap::new();
    let cmd = expand_template(template, &values);
    run_list_command(ctx, &format!("{cmd} {package}"))
}

fn run_list_template(ctx: &PkgContext, template: Option<&str>, values: &HashMap<&str, &str>) -> Result<i32> {
    let Some(template) = template else { return Ok(1) };
    let cmd = expand_template(template, values);
    run_list_command(ctx, &cmd)
}

fn run_list_command(ctx: &PkgContext, cmd: &str) -> Result<i32> {
    let output = ctx.runtime.exec_output(&ctx.conf.box_name, &bash_args(cmd))?;
    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    page_output(&text, &ctx.conf.pager)?;
    Ok(output.status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_options_default_lists_tracked_packages_short_form() {
        let opts = ListOptions::default();
        assert!(!opts.os_pkgs);
        assert!(!opts.long);
    }
}
