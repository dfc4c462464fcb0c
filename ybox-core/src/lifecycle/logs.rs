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

//! `ybox logs`. Grounded on `ybox.run.logs`.

use std::process::ExitStatus;

use crate::{config::StaticConfiguration, err, runtime::{Runtime, RuntimeError}, Result};

/// `<runtime> container logs [-f] <box_name>`, erroring out up-front if the
/// container doesn't exist (the original's `check_ybox_exists`). Ctrl-C
/// during a `follow` tail is a normal exit for the caller, not an error.
pub fn show_logs(runtime: &Runtime, conf: &StaticConfiguration, follow: bool) -> Result<ExitStatus> {
    if !runtime.container_exists(&conf.box_name)? {
        return err!(RuntimeError::NonZeroExit(format!("no container named '{}' exists", conf.box_name), 1));
    }

    runtime.container_logs(&conf.box_name, follow)
}
