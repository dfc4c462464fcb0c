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

//! `ybox-pkg info`. Grounded on `ybox.pkg.info`.

use std::collections::HashMap;

use crate::{
    config::distro::expand_template,
    pkg::{bash_args, page_output, PkgContext},
    Result,
};

pub fn info_packages(ctx: &PkgContext, packages: &[String], all: bool, quiet: u8) -> Result<i32> {
    let pkgmgr = &ctx.distro.pkgmgr;
    let template = if all { pkgmgr.info_all.as_deref() } else { pkgmgr.info.as_deref() };
    let Some(template) = template else { return Ok(1) };

    let quiet_flag = if quiet > 0 { pkgmgr.quiet_flag.as_deref().unwrap_or("") } else { "" };
    let mut values = HashMap::new();
    values.insert("quiet", quiet_flag);
    let cmd = expand_template(template, &values);
    let shell_cmd = format!("{cmd} {}", packages.join(" "));

    let output = ctx.runtime.exec_output(&ctx.conf.box_name, &bash_args(&shell_cmd))?;
    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    page_output(&text, &ctx.conf.pager)?;
    Ok(output.status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_packages_joins_names_with_spaces() {
        let packages = vec!["vim".to_string(), "git".to_string()];
        assert_eq!(packages.join(" "), "vim git");
    }
}
