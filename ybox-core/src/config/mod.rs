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

pub mod distro;
pub mod ini;
pub mod profile;

use std::{fs, path::PathBuf};

use crate::env::Environment;

pub use distro::Distro;
pub use profile::Profile;

pub const IMAGE_PREFIX: &str = "ybox-local";
pub const SHARED_IMAGE_PREFIX: &str = "ybox-shared-local";
pub const DEFAULT_DIRECTORY_MODE: u32 = 0o750;
pub const NVIDIA_TARGET_BASE_DIR: &str = "/usr/local/nvidia";
pub const SHARED_ROOT_MOUNT_DIR: &str = "/ybox-root";
pub const STATUS_TARGET_FILE: &str = "/usr/local/ybox-status";
pub const ENTRYPOINT_BASE: &str = "entrypoint-base.sh";
pub const ENTRYPOINT_CP: &str = "entrypoint-cp.sh";
pub const ENTRYPOINT: &str = "entrypoint.sh";
pub const RUN_USER_BASH_CMD: &str = "run-user-bash-cmd";

pub const CONTAINER_DESKTOP_DIRS: &[&str] = &["/usr/share/applications"];
pub const SYS_BIN_DIRS: &[&str] = &["/usr/bin", "/bin", "/usr/sbin", "/sbin", "/usr/local/bin", "/usr/local/sbin"];
pub const CONTAINER_MAN_DIR_PATTERN: &str = r"^/usr(/local)?(/share)?/man(/[^/]*)?/man[0-9][a-zA-Z_]*$";

pub const RESOURCE_SCRIPTS: &[&str] = &[
    ENTRYPOINT_BASE,
    ENTRYPOINT_CP,
    ENTRYPOINT,
    "entrypoint-common.sh",
    "entrypoint-root.sh",
    "entrypoint-user.sh",
    "prime-run",
    "run-in-dir",
    RUN_USER_BASH_CMD,
];

/// Per-container derived configuration: a pure function of `Environment` +
/// `(distribution, box_name)`. Grounded on `ybox.config.StaticConfiguration`.
#[derive(Debug, Clone)]
pub struct StaticConfiguration {
    pub distribution: String,
    pub box_name: String,
    pub box_image: String,
    pub shared_box_image: String,
    pub local_time_link: Option<PathBuf>,
    pub timezone_text: Option<String>,
    pub pager: String,
    pub scripts_dir: PathBuf,
    pub configs_dir: PathBuf,
    pub target_scripts_dir: PathBuf,
    pub target_configs_dir: PathBuf,
    pub status_file: PathBuf,
    pub config_list: PathBuf,
    pub app_list: PathBuf,
    pub startup_list: PathBuf,
}

impl StaticConfiguration {
    pub fn new(env: &Environment, distribution: &str, box_name: &str) -> Self {
        let container_dir = env.data_dir().join(box_name);
        let target_container_dir = env.target_data_dir().join(box_name);
        let scripts_dir = container_dir.join("ybox-scripts");
        let target_scripts_dir = PathBuf::from("/usr/local/ybox");

        let local_time_link = fs::read_link("/etc/localtime").ok();
        let timezone_text = fs::read_to_string("/etc/timezone").ok().map(|s| s.trim_end_matches('\n').to_string());
        let pager = std::env::var("YBOX_PAGER").unwrap_or_else(|_| "/usr/bin/less -RLFXK".into());

        Self {
            distribution: distribution.to_string(),
            box_name: box_name.to_string(),
            box_image: format!("{IMAGE_PREFIX}/{distribution}/{box_name}"),
            shared_box_image: format!("{SHARED_IMAGE_PREFIX}/{distribution}"),
            local_time_link,
            timezone_text,
            pager,
            configs_dir: container_dir.join("configs"),
            target_configs_dir: target_container_dir.join("configs"),
            status_file: container_dir.join("status"),
            config_list: scripts_dir.join("config.list"),
            app_list: scripts_dir.join("app.list"),
            startup_list: scripts_dir.join("startup.list"),
            scripts_dir,
            target_scripts_dir,
        }
    }

    /// Relative path, under the configuration search path, of the
    /// distribution's descriptor file.
    pub fn distribution_config(distribution: &str, config_file: Option<&str>) -> String {
        format!("distros/{distribution}/{}", config_file.unwrap_or("distro.ini"))
    }

    pub fn box_image(&self, has_shared_root: bool) -> &str {
        if has_shared_root {
            &self.shared_box_image
        } else {
            &self.box_image
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_image_selects_shared_or_local_prefix() {
        std::env::set_var("HOME", "/tmp/ybox-config-test-home");
        let env = Environment::capture().unwrap();
        let cfg = StaticConfiguration::new(&env, "ubuntu", "dev");
        assert_eq!(cfg.box_image(false), "ybox-local/ubuntu/dev");
        assert_eq!(cfg.box_image(true), "ybox-shared-local/ubuntu");
    }
}
