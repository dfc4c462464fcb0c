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

use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use ybox_core::{
    config::{distro::Distro, profile::Profile},
    env::Environment,
    err,
    lifecycle::create::{create_container, CreateOptions},
    runtime::Runtime,
    state::StateStore,
    Result,
};

lazy_static! {
    static ref VALID_NAME: Regex = Regex::new(r"^[\w.\-]+$").unwrap();
}

#[derive(Debug)]
enum CreateError {
    InvalidName(String),
}

impl std::fmt::Display for CreateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(n) => write!(f, "'{n}' is not a valid container name (expected [\\w.-]+)"),
        }
    }
}

ybox_core::impl_error!(CreateError);

#[allow(clippy::too_many_arguments)]
pub fn run(docker_path: Option<&str>, distribution: &str, profile_path: &str, name: Option<&str>, distribution_config: Option<&str>, force_own_orphans: bool, quiet: u8) -> Result<()> {
    let env = Environment::capture()?;
    let runtime = Runtime::resolve(docker_path)?;
    let mut state = StateStore::open(&env)?;

    let profile = Profile::load(&env, Path::new(profile_path))?;
    let distro = Distro::load(&env, distribution, distribution_config)?;

    let box_name = match name {
        Some(n) => n.to_string(),
        None => Path::new(profile_path).file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| profile_path.to_string()),
    };

    if !VALID_NAME.is_match(&box_name) {
        return err!(CreateError::InvalidName(box_name));
    }

    let conf = ybox_core::config::StaticConfiguration::new(&env, distribution, &box_name);
    let opts = CreateOptions { box_name, force_own_orphans, quiet };

    create_container(&env, &conf, &runtime, &mut state, &distro, &profile, &opts)
}
