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

use std::{collections::HashMap, fmt::Display, str::FromStr};

use bitflags::bitflags;

bitflags! {
    /// Kinds of host-side wrapper artifacts a package's `local_copies` may
    /// contain. Backed by an `INTEGER` column; `0` means no wrappers were
    /// created (e.g. a bare `mark`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CopyType: i64 {
        const DESKTOP = 0b01;
        const EXECUTABLE = 0b10;
    }
}

/// Kind of a package dependency row, string-backed to match its SQL column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyType {
    Required,
    Optional,
    Suggestion,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Suggestion => "suggestion",
        }
    }
}

impl Display for DependencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "required" => Ok(Self::Required),
            "optional" => Ok(Self::Optional),
            "suggestion" => Ok(Self::Suggestion),
            other => Err(format!("unknown dependency type '{other}'")),
        }
    }
}

/// Resolved configuration of a container as read from the `containers` row.
#[derive(Debug, Clone)]
pub struct RuntimeConfiguration {
    pub name: String,
    pub distribution: String,
    pub shared_root: String,
    pub ini_config: String,
}

/// A package row reassigned from a tombstone during `register_container`,
/// returned so callers can recreate its wrappers.
#[derive(Debug, Clone)]
pub struct ReassignedPackage {
    pub copy_type: CopyType,
    pub app_flags: HashMap<String, String>,
}

/// `(name, urls, key, options, with_source_repo)` as returned by
/// `get_repositories`.
#[derive(Debug, Clone)]
pub struct Repository {
    pub name: String,
    pub urls: String,
    pub key: String,
    pub options: String,
    pub with_source_repo: bool,
}
