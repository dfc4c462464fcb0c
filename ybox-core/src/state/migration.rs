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

//! Discovery and ordering of `<from>:<to>.sql` (or `<from1>-<from2>:<to>.sql`)
//! migration scripts, and the `SOURCE '<path>';` splicing directive.

use std::{fs, path::{Path, PathBuf}};

use lazy_static::lazy_static;
use regex::Regex;
use semver::Version;

use crate::{ErrorGeneric, Result};

lazy_static! {
    static ref SOURCE_RE: Regex = Regex::new(r"(?mi)^\s*SOURCE\s*'([^']+)'\s*;\s*$").unwrap();
}

/// Scan `dir` for `<from>[-<from2>]:<to>.sql` files applicable to a migration
/// from `old_version` to `new_version`, sorted ascending by `from`.
pub fn filter_and_sort_migrations(dir: &Path, old_version: &Version, new_version: &Version) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }

    let mut matched: Vec<(Version, PathBuf)> = Vec::new();

    for entry in fs::read_dir(dir).prepend_io(|| dir.display().to_string())? {
        let entry = entry.prepend_io(|| dir.display().to_string())?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };

        if !name.ends_with(".sql") {
            continue;
        }

        let stem = &name[.. name.len() - 4];
        let Some((part1, to_str)) = stem.split_once(':') else { continue };
        let (from1_str, from2_str) = match part1.split_once('-') {
            Some((a, b)) => (a, Some(b)),
            None => (part1, None),
        };

        let Some(from1) = parse_version(from1_str) else { continue };
        let Some(to) = parse_version(to_str) else { continue };

        let applies = if let Some(from2_str) = from2_str {
            let Some(from2) = parse_version(from2_str) else { continue };
            from1 <= *old_version && *old_version <= from2 && from2 < to && to <= *new_version
        } else {
            *old_version <= from1 && from1 < to && to <= *new_version
        };

        if applies {
            matched.push((from1, path));
        }
    }

    matched.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(matched.into_iter().map(|(_, p)| p).collect())
}

fn parse_version(s: &str) -> Option<Version> {
    Version::parse(s).ok()
}

/// Read a SQL script, recursively splicing `SOURCE '<path>';` directives
/// (paths resolved relative to the including script, or absolute).
pub fn read_sql_script(path: &Path) -> Result<String> {
    let mut out = String::new();
    splice(path, &mut out)?;
    Ok(out)
}

fn splice(path: &Path, out: &mut String) -> Result<()> {
    let text = fs::read_to_string(path).prepend_io(|| path.display().to_string())?;

    for line in text.split_inclusive('\n') {
        if let Some(caps) = SOURCE_RE.captures(line.trim_end_matches('\n')) {
            let inc = &caps[1];
            let inc_path =
                if Path::new(inc).is_absolute() { PathBuf::from(inc) } else { path.parent().unwrap_or_else(|| Path::new(".")).join(inc) };
            splice(&inc_path, out)?;
        } else {
            out.push_str(line);

            if !line.ends_with('\n') {
                out.push('\n');
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_form_migration_applies_when_old_lt_from_lt_to_le_new() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("0.1.0:0.2.0.sql"), "SELECT 1;").unwrap();
        let old = Version::parse("0.1.0").unwrap();
        let new = Version::parse("0.2.0").unwrap();
        let found = filter_and_sort_migrations(dir.path(), &old, &new).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn same_version_runs_zero_migrations() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("0.1.0:0.2.0.sql"), "SELECT 1;").unwrap();
        let v = Version::parse("0.2.0").unwrap();
        let found = filter_and_sort_migrations(dir.path(), &v, &v).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn range_form_migration_matches() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("0.1.0-0.1.5:0.2.0.sql"), "SELECT 1;").unwrap();
        let old = Version::parse("0.1.3").unwrap();
        let new = Version::parse("0.3.0").unwrap();
        let found = filter_and_sort_migrations(dir.path(), &old, &new).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn source_directive_splices_included_file() {
        let dir = tempfile::tempdir().unwrap();
        let inc = dir.path().join("common.sql");
        fs::write(&inc, "CREATE TABLE t (a INT);\n").unwrap();
        let main = dir.path().join("main.sql");
        fs::write(&main, format!("SOURCE '{}';\nSELECT 1;\n", inc.display())).unwrap();
        let spliced = read_sql_script(&main).unwrap();
        assert!(spliced.contains("CREATE TABLE t"));
        assert!(spliced.contains("SELECT 1;"));
    }
}
