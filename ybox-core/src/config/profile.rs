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

//! The user-authored container profile: recognized sections, `[base]` key
//! whitelist, and (de)serialization to/from the INI text persisted in the
//! `containers.configuration` column.

use std::{fmt::Display, path::Path};

use lazy_static::lazy_static;
use regex::Regex;

use crate::{config::ini, env::Environment, err, impl_error, Error, ErrorTrait, Result};

pub use crate::config::ini::{IniMap, Section};

const RECOGNIZED_SECTIONS: &[&str] = &["base", "security", "mounts", "env", "configs", "apps", "app_flags", "startup"];

const BASE_KEYS: &[&str] = &[
    "name",
    "includes",
    "home",
    "shared_root",
    "config_hardlinks",
    "config_locale",
    "x11",
    "wayland",
    "pulseaudio",
    "dbus",
    "dbus_sys",
    "dri",
    "nvidia",
    "shm_size",
    "pids_limit",
    "log_driver",
    "log_opts",
];

lazy_static! {
    static ref CONTAINER_NAME_RE: Regex = Regex::new(r"^[A-Za-z0-9._-]+$").unwrap();
}

#[derive(Debug)]
pub enum ProfileError {
    UnknownSection(String),
    UnknownBaseKey(String),
    InvalidContainerName(String),
    InvalidBooleanValue(String),
}

impl Display for ProfileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSection(s) => write!(f, "Unknown profile section '[{s}]'"),
            Self::UnknownBaseKey(k) => write!(f, "Unknown key '{k}' in [base] section"),
            Self::InvalidContainerName(n) => write!(f, "Container name '{n}' does not match [A-Za-z0-9._-]+"),
            Self::InvalidBooleanValue(v) => write!(f, "Not a boolean: '{v}'"),
        }
    }
}

impl_error!(ProfileError);

/// A parsed, validated container profile.
#[derive(Debug, Clone)]
pub struct Profile {
    sections: IniMap,
}

impl Profile {
    /// Load and validate a profile from `path`, chasing `base.includes`.
    pub fn load(env: &Environment, path: &Path) -> Result<Self> {
        let sections = ini::load(path, env, &[])?;
        validate(&sections)?;
        Ok(Self { sections })
    }

    /// Build a `Profile` from an already-parsed, already-validated map (used
    /// when re-reading a container's stored configuration text).
    pub fn from_map(sections: IniMap) -> Self {
        Self { sections }
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn base(&self) -> Section {
        self.sections.get("base").cloned().unwrap_or_default()
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(String::as_str)
    }

    pub fn shared_root(&self) -> Option<&str> {
        self.get("base", "shared_root").filter(|s| !s.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.get("base", "name")
    }

    pub fn sections(&self) -> &IniMap {
        &self.sections
    }

    /// Serialize back to INI text, as stored in `containers.configuration`.
    pub fn to_ini_string(&self) -> String {
        let mut out = String::new();

        for (section, props) in &self.sections {
            out.push_str(&format!("[{section}]\n"));

            for (k, v) in props {
                out.push_str(&format!("{k}={v}\n"));
            }

            out.push('\n');
        }

        out
    }
}

fn validate(sections: &IniMap) -> Result<()> {
    for section in sections.keys() {
        if section == "DEFAULT" {
            continue;
        }

        if !RECOGNIZED_SECTIONS.contains(&section.as_str()) {
            err!(ProfileError::UnknownSection(section.clone()))?
        }
    }

    if let Some(base) = sections.get("base") {
        for key in base.keys() {
            if !BASE_KEYS.contains(&key.as_str()) {
                err!(ProfileError::UnknownBaseKey(key.clone()))?
            }
        }
    }

    Ok(())
}

/// Validate a container name against `[A-Za-z0-9._-]+`.
pub fn validate_container_name(name: &str) -> Result<()> {
    if CONTAINER_NAME_RE.is_match(name) {
        Ok(())
    } else {
        err!(ProfileError::InvalidContainerName(name.to_string()))?
    }
}

/// Normalize a profile's INI text for shared-root tombstone equivalence
/// comparison (spec.md §4.3): drop sections `{mounts, configs, env, apps,
/// app_flags, startup}` and, from `[base]`, the listed volatile keys, then
/// compare remaining sections/keys for structural equality.
pub fn equiv_config(cfg1: &str, cfg2: &str) -> bool {
    normalize(cfg1) == normalize(cfg2)
}

const DROPPED_SECTIONS: &[&str] = &["mounts", "configs", "env", "apps", "app_flags", "startup"];
const DROPPED_BASE_KEYS: &[&str] =
    &["name", "includes", "home", "config_hardlinks", "nvidia", "nvidia_ctk", "shm_size", "pids_limit", "log_driver", "log_opts"];

fn normalize(cfg: &str) -> IniMap {
    let mut map = ini::parse_resolved(cfg).unwrap_or_default();

    for section in DROPPED_SECTIONS {
        map.shift_remove(*section);
    }

    if let Some(base) = map.get_mut("base") {
        for key in DROPPED_BASE_KEYS {
            base.shift_remove(*key);
        }
    }

    map.sort_keys();

    for section in map.values_mut() {
        section.sort_keys();
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_top_level_section() {
        let mut sections = IniMap::new();
        sections.insert("bogus".into(), Section::new());
        assert!(validate(&sections).is_err());
    }

    #[test]
    fn rejects_unknown_base_key() {
        let mut sections = IniMap::new();
        let mut base = Section::new();
        base.insert("frobnicate".into(), "1".into());
        sections.insert("base".into(), base);
        assert!(validate(&sections).is_err());
    }

    #[test]
    fn accepts_app_flags_with_arbitrary_keys() {
        let mut sections = IniMap::new();
        let mut flags = Section::new();
        flags.insert("firefox".into(), "!p --new-window !a".into());
        sections.insert("app_flags".into(), flags);
        assert!(validate(&sections).is_ok());
    }

    #[test]
    fn container_name_validation() {
        assert!(validate_container_name("ybox-ubuntu_dev").is_ok());
        assert!(validate_container_name("bad name!").is_err());
    }

    #[test]
    fn equiv_config_ignores_volatile_base_keys_and_dropped_sections() {
        let a = "[base]\nname=a\nshared_root=/srv/sr\nx11=true\n\n[apps]\nfirefox=firefox\n";
        let b = "[base]\nname=b\nshared_root=/srv/sr\nx11=true\nlog_opts=foo\n\n[apps]\nvlc=vlc\n";
        assert!(equiv_config(a, b));
    }

    #[test]
    fn equiv_config_detects_real_difference() {
        let a = "[base]\nname=a\nx11=true\n";
        let b = "[base]\nname=b\nx11=false\n";
        assert!(!equiv_config(a, b));
    }
}
