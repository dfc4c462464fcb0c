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

//! `ybox-pkg uninstall`. Grounded on `ybox.pkg.uninst`.

use std::collections::HashMap;

use crate::{
    config::distro::expand_template,
    pkg::{bash_args, check_installed_package, PkgContext},
    state::types::DependencyType,
    Result,
};

#[derive(Debug, Clone, Default)]
pub struct UninstallOptions {
    pub skip_deps: bool,
    pub quiet: u8,
}

pub fn uninstall_package(ctx: &mut PkgContext, package: &str, opts: &UninstallOptions) -> Result<i32> {
    let pkgmgr = &ctx.distro.pkgmgr;
    let Some(uninstall_tpl) = &pkgmgr.uninstall else { return Ok(1) };

    let mut values = HashMap::new();
    let quiet_flag = if opts.quiet > 0 { pkgmgr.quiet_flag.as_deref().unwrap_or("") } else { "" };
    let purge_flag = pkgmgr.purge_flag.as_deref().unwrap_or("");
    let remove_deps_flag = if opts.skip_deps { "" } else { pkgmgr.remove_deps_flag.as_deref().unwrap_or("") };
    values.insert("quiet", quiet_flag);
    values.insert("purge", purge_flag);
    values.insert("remove_deps", remove_deps_flag);
    let uninstall_cmd = expand_template(uninstall_tpl, &values);
    let check_cmd = pkgmgr.check_install.clone().unwrap_or_default();

    let opt_deps = if !opts.skip_deps && !remove_deps_flag.is_empty() {
        if ctx.shared_root.is_empty() {
            ctx.state.get_packages(Some(&ctx.conf.box_name), None, ".*", DependencyType::Optional.as_str())?
        } else {
            ctx.state.get_packages(None, Some(ctx.shared_root), ".*", DependencyType::Optional.as_str())?
        }
    } else {
        Vec::new()
    };

    let code = uninstall_package_impl(ctx, package, &uninstall_cmd, &check_cmd, opts.quiet)?;
    if code != 0 {
        return Ok(code);
    }

    for dep in opt_deps {
        if dep == package {
            continue;
        }
        uninstall_package_impl(ctx, &dep, &uninstall_cmd, &check_cmd, opts.quiet)?;
    }

    Ok(0)
}

fn uninstall_package_impl(ctx: &mut PkgContext, package: &str, uninstall_cmd: &str, check_cmd: &str, quiet: u8) -> Result<i32> {
    if !check_cmd.is_empty() {
        let code = check_installed_package(ctx.runtime, check_cmd, package, &ctx.conf.box_name)?;
        if code != 0 {
            if quiet == 0 {
                crate::utils::print_status(&format!("'{package}' is not installed in '{}'", ctx.conf.box_name));
            }
            return Ok(0);
        }
    }

    if quiet == 0 {
        crate::utils::print_status(&format!("Uninstalling '{package}' from '{}'", ctx.conf.box_name));
    }

    let shell_cmd = format!("{uninstall_cmd} {package}");
    let (_, status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&shell_cmd), true)?;
    if !status.success() {
        return Ok(status.code().unwrap_or(1));
    }

    ctx.state.unregister_package(&ctx.conf.box_name, package, ctx.shared_root)?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninstall_options_default_keeps_deps() {
        let opts = UninstallOptions::default();
        assert!(!opts.skip_deps);
        assert_eq!(opts.quiet, 0);
    }
}
