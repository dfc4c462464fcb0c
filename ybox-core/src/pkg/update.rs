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

//! `ybox-pkg update`. Grounded on `ybox.pkg.update`.

use std::collections::HashMap;

use crate::{
    config::distro::expand_template,
    pkg::{bash_args, PkgContext},
    Result,
};

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub quiet: u8,
}

/// Update `package`, or every installed package when `package` is `None`
/// (the distribution's `update_all` template).
pub fn update_packages(ctx: &PkgContext, package: Option<&str>, opts: &UpdateOptions) -> Result<i32> {
    let pkgmgr = &ctx.distro.pkgmgr;
    let quiet_flag = if opts.quiet > 0 { pkgmgr.quiet_flag.as_deref().unwrap_or("") } else { "" };
    let mut values = HashMap::new();
    values.insert("quiet", quiet_flag);

    let (template, trailing) = match package {
        Some(p) => (pkgmgr.update.as_deref(), Some(p)),
        None => (pkgmgr.update_all.as_deref(), None),
    };
    let Some(template) = template else { return Ok(1) };
    let update_cmd = expand_template(template, &values);

    if !ctx.shared_root.is_empty() {
        let others = ctx.state.get_other_shared_containers(&ctx.conf.box_name, ctx.shared_root)?;
        if !others.is_empty() && opts.quiet == 0 {
            crate::utils::print_warning(&format!(
                "'{}' shares its root with {} -- updates will be visible there too",
                ctx.conf.box_name,
                others.join(", ")
            ));
        }
    }

    let shell_cmd = match trailing {
        Some(p) => format!("{update_cmd} {p}"),
        None => update_cmd,
    };

    let (_, status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&shell_cmd), true)?;
    Ok(status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_options_default_is_not_quiet() {
        assert_eq!(UpdateOptions::default().quiet, 0);
    }
}
