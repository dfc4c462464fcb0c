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

//! `ybox ls`. Grounded on `ybox.run.ls`.

use crate::{lifecycle::label, runtime::Runtime, Result};

#[derive(Debug, Clone, Default)]
pub struct LsOptions {
    /// List every ybox-managed container (base/copy/primary), not just the
    /// user-facing primary ones.
    pub all: bool,
}

/// List ybox-managed containers by name, including stopped ones (the
/// original always passes `--all`). With `opts.all` this includes the
/// transient `base`/`copy` containers a create run may have left behind;
/// otherwise only `primary` containers (the ones users actually interact
/// with) are returned. Mirrors `ls.main_argv`.
pub fn list_containers(runtime: &Runtime, opts: &LsOptions) -> Result<Vec<String>> {
    let filter = if opts.all { label::GROUP } else { label::PRIMARY };
    runtime.container_ls(Some(filter), true)
}
