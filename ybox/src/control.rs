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

use ybox_core::{lifecycle::control, Result};

use crate::context;

pub fn start(docker_path: Option<&str>, container_name: &str) -> Result<()> {
    let ctx = context::load(docker_path, container_name)?;
    control::start_container(&ctx.runtime, &ctx.conf)
}

pub fn stop(docker_path: Option<&str>, container_name: &str) -> Result<()> {
    let ctx = context::load(docker_path, container_name)?;
    control::stop_container(&ctx.runtime, &ctx.conf)
}

pub fn restart(docker_path: Option<&str>, container_name: &str) -> Result<()> {
    let ctx = context::load(docker_path, container_name)?;
    control::restart_container(&ctx.runtime, &ctx.conf)
}

pub fn status(docker_path: Option<&str>, container_name: &str) -> Result<()> {
    let ctx = context::load(docker_path, container_name)?;
    let running = control::status(&ctx.runtime, &ctx.conf)?;
    println!("{}", if running { "running" } else { "stopped" });
    Ok(())
}
