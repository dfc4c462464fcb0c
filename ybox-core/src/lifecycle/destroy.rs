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

//! `ybox destroy`. Grounded on `ybox.run.destroy`.

use crate::{config::StaticConfiguration, err, runtime::{Runtime, RuntimeError}, state::StateStore, Result};

/// Stop (ignoring failure, the container may already be stopped), remove,
/// and unregister `conf.box_name`. Mirrors `destroy.main_argv`.
pub fn destroy_container(runtime: &Runtime, conf: &StaticConfiguration, state: &mut StateStore, force: bool) -> Result<()> {
    if !runtime.container_exists(&conf.box_name)? {
        return err!(RuntimeError::NonZeroExit(format!("no container named '{}' exists", conf.box_name), 1));
    }

    runtime.container_stop(&conf.box_name).ok();
    runtime.container_rm(&conf.box_name, force)?;

    if !state.unregister_container(&conf.box_name)? {
        return err!(RuntimeError::NonZeroExit(format!("'{}' was not a registered ybox container", conf.box_name), 1));
    }

    Ok(())
}
