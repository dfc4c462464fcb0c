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

//! `ybox-pkg install`. Grounded on `ybox.pkg.inst`.

use std::collections::HashMap;

use crate::{
    config::distro::expand_template,
    pkg::{bash_args, check_installed_package, PkgContext},
    state::types::{CopyType, DependencyType},
    utils::prompt::multi_select,
    wrapper::{self, WrapperInputs},
    Result,
};

/// User-facing knobs for an install, mirroring `install_package`'s
/// `argparse.Namespace` fields.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub skip_opt_deps: bool,
    pub with_opt_deps: Option<Vec<String>>,
    pub skip_desktop_files: bool,
    pub skip_executables: bool,
    pub app_flags: HashMap<String, String>,
    pub check_package: bool,
    pub add_dep_wrappers: bool,
    pub quiet: u8,
}

/// An optional dependency surfaced while installing `package`: name,
/// description, and depth in the dependency tree (1 = immediate).
#[derive(Debug, Clone)]
pub struct OptionalDependency {
    pub name: String,
    pub description: String,
    pub level: u32,
}

pub fn install_package(ctx: &mut PkgContext, package: &str, opts: &InstallOptions) -> Result<i32> {
    let pkgmgr = &ctx.distro.pkgmgr;
    let Some(install_tpl) = &pkgmgr.install else { return Ok(1) };
    let quiet_flag = if opts.quiet > 0 { pkgmgr.quiet_flag.as_deref().unwrap_or("") } else { "" };

    let mut values = HashMap::new();
    values.insert("quiet", quiet_flag);
    values.insert("opt_dep", "{opt_dep}");
    let install_cmd = expand_template(install_tpl, &values);

    let list_cmd = pkgmgr.list_files.clone().unwrap_or_default();
    let check_cmd = pkgmgr.check_install.clone().unwrap_or_default();
    let opt_deps_cmd = pkgmgr.opt_deps.clone().unwrap_or_default();
    let opt_dep_flag = pkgmgr.opt_dep_flag.clone().unwrap_or_default();

    install_package_impl(
        ctx,
        package,
        package,
        &install_cmd,
        &list_cmd,
        &opt_deps_cmd,
        &opt_dep_flag,
        false,
        opts.check_package,
        &check_cmd,
        opts.with_opt_deps.clone(),
        opts,
    )
}

/// Workhorse invoked recursively for optional dependencies. `install_cmd`
/// still carries an unresolved `{opt_dep}` placeholder.
#[allow(clippy::too_many_arguments)]
fn install_package_impl(
    ctx: &mut PkgContext, package: &str, requested_by: &str, install_cmd: &str, list_cmd: &str, opt_deps_cmd: &str, opt_dep_flag: &str,
    opt_dep_install: bool, check_pkg: bool, check_cmd: &str, mut selected_deps: Option<Vec<String>>, opts: &InstallOptions,
) -> Result<i32> {
    let (optional_deps, installed_optional_deps) = if opt_dep_install {
        (Vec::new(), Vec::new())
    } else {
        get_optional_deps(ctx, package, opt_deps_cmd)?
    };

    let mut values = HashMap::new();
    let flag_value = if opt_dep_install { opt_dep_flag } else { "" };
    values.insert("opt_dep", flag_value);
    let resolved_install_cmd = expand_template(install_cmd, &values);

    let mut code = -1;
    if check_pkg && !check_cmd.is_empty() {
        code = check_installed_package(ctx.runtime, check_cmd, package, &ctx.conf.box_name)?;
        if code == 0 && opts.quiet == 0 {
            crate::utils::print_status(&format!("'{package}' is already installed in '{}'", ctx.conf.box_name));
        }
    }

    if code != 0 {
        if opts.quiet == 0 {
            crate::utils::print_status(&format!("Installing '{package}' in '{}'", ctx.conf.box_name));
        }
        let shell_cmd = format!("{resolved_install_cmd} {package}");
        let (_, status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&shell_cmd), true)?;
        code = status.code().unwrap_or(1);

        if code == 0 && !check_cmd.is_empty() {
            code = check_installed_package(ctx.runtime, check_cmd, package, &ctx.conf.box_name)?;
        }
    }

    if code != 0 {
        return Ok(code);
    }

    let mut copy_type = CopyType::empty();
    if !opt_dep_install || opts.add_dep_wrappers {
        if !opts.skip_desktop_files {
            copy_type |= CopyType::DESKTOP;
        }
        if !opts.skip_executables {
            copy_type |= CopyType::EXECUTABLE;
        }
    }

    let local_copies = if copy_type.is_empty() || list_cmd.is_empty() {
        Vec::new()
    } else {
        let mut values = HashMap::new();
        values.insert("package", package);
        let list_expanded = expand_template(list_cmd, &values);
        let output = ctx.runtime.exec_output(&ctx.conf.box_name, &bash_args(&list_expanded))?;

        if output.status.success() {
            let files = wrapper::parse_file_list(&String::from_utf8_lossy(&output.stdout));
            let inputs = WrapperInputs {
                runtime: ctx.runtime,
                env: ctx.env,
                container: &ctx.conf.box_name,
                shared_root: if ctx.shared_root.is_empty() { None } else { Some(ctx.shared_root) },
                app_flags: &opts.app_flags,
                quiet: opts.quiet,
            };
            wrapper::create_wrappers(&inputs, &files, copy_type)?
        } else {
            Vec::new()
        }
    };

    let dep = if opt_dep_install { Some((DependencyType::Optional, requested_by)) } else { None };
    ctx.state.register_package(&ctx.conf.box_name, package, &local_copies, copy_type, &opts.app_flags, ctx.shared_root, dep, false)?;

    if !installed_optional_deps.is_empty() {
        let recorded = ctx.state.check_packages(&ctx.conf.box_name, &installed_optional_deps)?;
        for dep in recorded {
            ctx.state.register_dependency(&ctx.conf.box_name, package, &dep, DependencyType::Optional)?;
        }
    }

    if !optional_deps.is_empty() && selected_deps.is_none() && !opts.skip_opt_deps {
        selected_deps = Some(select_optional_deps(package, &optional_deps)?);
    }

    if let Some(deps) = selected_deps {
        for dep in deps {
            install_package_impl(ctx, &dep, package, install_cmd, list_cmd, "", opt_dep_flag, true, check_pkg, check_cmd, None, opts)?;
        }
    }

    Ok(0)
}

/// Run the distribution's `opt_deps` template, splitting its
/// `PKG:<name>::::<level>::::<installed>::::<description>`-formatted lines
/// into newly-discoverable optional dependencies and ones already installed
/// (and thus candidates for `register_dependency`). Non-`PKG:` lines are
/// streamed straight to stdout for progress visibility.
fn get_optional_deps(ctx: &mut PkgContext, package: &str, opt_deps_cmd: &str) -> Result<(Vec<OptionalDependency>, Vec<String>)> {
    if opt_deps_cmd.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    const PKG_PREFIX: &str = "PKG:";
    const SEPARATOR: &str = "::::";

    let shell_cmd = format!("{opt_deps_cmd} {package}");
    let (captured, _status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&shell_cmd), false)?;

    let mut optional_deps = Vec::new();
    let mut installed = Vec::new();

    for line in captured.lines() {
        let Some(rest) = line.strip_prefix(PKG_PREFIX) else { continue };
        let fields: Vec<&str> = rest.splitn(4, SEPARATOR).collect();
        let [name, level, is_installed, desc] = fields[..] else { continue };

        if is_installed.trim().eq_ignore_ascii_case("true") {
            installed.push(name.to_string());
        } else {
            optional_deps.push(OptionalDependency {
                name: name.to_string(),
                description: desc.to_string(),
                level: level.trim().parse().unwrap_or(1),
            });
        }
    }

    Ok((optional_deps, installed))
}

/// Present a starred multi-select of `deps` (immediate ones starred) and
/// return the names the user picked.
fn select_optional_deps(package: &str, deps: &[OptionalDependency]) -> Result<Vec<String>> {
    let items: Vec<(String, bool)> = deps
        .iter()
        .map(|d| (format!("{}{} ({})", if d.level <= 1 { "* " } else { "  " }, d.name, d.description), false))
        .collect();

    let selected = multi_select(format!("Select optional dependencies of {package} (starred ones are the immediate dependencies):"), &items)?;
    Ok(selected.into_iter().map(|i| deps[i].name.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_optional_deps_line_parsing_separates_installed_from_new() {
        let captured = "Found optional dependencies\nPKG:foo::::1::::false::::a helper\nPKG:bar::::2::::true::::already there\n";
        let mut optional_deps = Vec::new();
        let mut installed = Vec::new();

        for line in captured.lines() {
            let Some(rest) = line.strip_prefix("PKG:") else { continue };
            let fields: Vec<&str> = rest.splitn(4, "::::").collect();
            let [name, level, is_installed, desc] = fields[..] else { continue };
            if is_installed.eq_ignore_ascii_case("true") {
                installed.push(name.to_string());
            } else {
                optional_deps.push(OptionalDependency { name: name.to_string(), description: desc.to_string(), level: level.parse().unwrap() });
            }
        }

        assert_eq!(installed, vec!["bar".to_string()]);
        assert_eq!(optional_deps.len(), 1);
        assert_eq!(optional_deps[0].name, "foo");
    }
}
