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

//! Shared setup used by every subcommand: resolving the runtime binary and
//! looking up an existing container's recorded distribution/shared-root.

use ybox_core::{config::StaticConfiguration, env::Environment, err, runtime::{Runtime, RuntimeError}, state::StateStore, Result};

pub struct BoxContext {
    pub env: Environment,
    pub runtime: Runtime,
    pub state: StateStore,
    pub conf: StaticConfiguration,
    pub shared_root: String,
}

/// Resolve the environment, runtime, state store, and `conf` for an
/// existing, already-registered container.
pub fn load(docker_path: Option<&str>, container_name: &str) -> Result<BoxContext> {
    let env = Environment::capture()?;
    let runtime = Runtime::resolve(docker_path)?;
    let state = StateStore::open(&env)?;

    let Some(row) = state.get_container_configuration(container_name)? else {
        return err!(RuntimeError::NonZeroExit(format!("'{container_name}' is not a registered ybox container"), 1));
    };

    let conf = StaticConfiguration::new(&env, &row.distribution, container_name);
    Ok(BoxContext { env, runtime, state, conf, shared_root: row.shared_root })
}
