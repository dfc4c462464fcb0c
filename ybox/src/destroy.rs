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

use ybox_core::{lifecycle::destroy, Result};

use crate::context;

pub fn run(docker_path: Option<&str>, container_name: &str, force: bool) -> Result<()> {
    let mut ctx = context::load(docker_path, container_name)?;
    destroy::destroy_container(&ctx.runtime, &ctx.conf, &mut ctx.state, force)
}
