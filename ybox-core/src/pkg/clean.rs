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

//! `ybox-pkg clean`. Grounded on `ybox.pkg.clean`.

use std::collections::HashMap;

use crate::{
    config::distro::expand_template,
    pkg::{bash_args, PkgContext},
    Result,
};

pub fn clean_cache(ctx: &PkgContext, quiet: u8) -> Result<i32> {
    let pkgmgr = &ctx.distro.pkgmgr;
    let template = if quiet > 0 { pkgmgr.clean_quiet.as_deref().or(pkgmgr.clean.as_deref()) } else { pkgmgr.clean.as_deref() };
    let Some(template) = template else { return Ok(1) };

    let values = HashMap::new();
    let cmd = expand_template(template, &values);
    let (_, status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&cmd), true)?;
    Ok(status.code().unwrap_or(1))
}
