/*
 * ybox
 *
 * Copyright (C) 2024-2026 ybox contributors
 * SPDX-License-Identifier: GPL-3.0-only
 *
 * This program is free software: you can redistribute it and/or modify
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

use ybox_core::{lifecycle::ls::{list_containers, LsOptions}, runtime::Runtime, Result};

pub fn run(docker_path: Option<&str>, all: bool) -> Result<()> {
    let runtime = Runtime::resolve(docker_path)?;
    for name in list_containers(&runtime, &LsOptions { all })? {
        println!("{name}");
    }
    Ok(())
}
