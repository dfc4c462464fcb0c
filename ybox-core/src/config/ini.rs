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

//! INI reader with `include` chaining and two interpolation passes:
//! pre-read environment/`${NOW:fmt}` substitution, then post-read
//! `%(key)s` chaining. Mirrors `ybox.util.EnvInterpolation` /
//! `config_reader` from the Python original, built on top of `rust-ini`'s
//! raw parser.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use ini::Ini;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;

use crate::{env::Environment, err, error, impl_error, Error, ErrorGeneric, ErrorTrait, Result};

pub type Section = IndexMap<String, String>;
pub type IniMap = IndexMap<String, Section>;

#[derive(Debug)]
pub enum IniError {
    IncludeCycle(PathBuf),
    Parse(PathBuf, String),
}

impl std::fmt::Display for IniError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IncludeCycle(path) => write!(f, "Include cycle detected at '{}'", path.display()),
            Self::Parse(path, msg) => write!(f, "Failed to parse '{}': {msg}", path.display()),
        }
    }
}

impl_error!(IniError);

lazy_static! {
    static ref NOW_RE: Regex = Regex::new(r"\$\{NOW:([^}]*)\}").unwrap();
    static ref REF_RE: Regex = Regex::new(r"%\(([A-Za-z_][A-Za-z0-9_]*)\)s").unwrap();
    static ref BRACE_VAR_RE: Regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    static ref BARE_VAR_RE: Regex = Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap();
}

/// Read `path`, recursively merging `base.includes`, applying pre-read
/// environment/`${NOW:fmt}` substitution (skipped for sections named in
/// `skip_expansion`) followed by post-read `%(key)s` chaining.
pub fn load(path: impl AsRef<Path>, env: &Environment, skip_expansion: &[&str]) -> Result<IniMap> {
    let path = path.as_ref();
    let mut visited = HashSet::new();
    let mut map = read_merged(path, env, skip_expansion, &mut visited)?;
    interpolate_post(&mut map);
    Ok(map)
}

/// Parse an already fully-resolved configuration string (e.g. a container's
/// stored `configuration` text) with no include chasing or interpolation,
/// for case-insensitive lookup of `[app_flags]` values.
pub fn parse_resolved(content: &str) -> Result<IniMap> {
    parse_raw_str(content, Path::new("<string>"))
}

/// Case-insensitive lookup of `key` within `section`.
pub fn get_ci<'a>(section: &'a Section, key: &str) -> Option<&'a String> {
    section.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v)
}

fn read_merged(path: &Path, env: &Environment, skip_expansion: &[&str], visited: &mut HashSet<PathBuf>) -> Result<IniMap> {
    let canon = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

    if !visited.insert(canon.clone()) {
        err!(IniError::IncludeCycle(path.to_path_buf()))?
    }

    let text = fs::read_to_string(path).prepend_io(|| path.display().to_string())?;
    let raw = parse_raw_str(&text, path)?;
    let mut map = interpolate_pre(raw, env, skip_expansion);

    let includes = map.get("base").and_then(|s| s.get("includes")).cloned().unwrap_or_default();

    if !includes.trim().is_empty() {
        for inc in includes.split(',') {
            let inc = inc.trim();

            if inc.is_empty() {
                continue;
            }

            let inc_path = if Path::new(inc).is_absolute() {
                PathBuf::from(inc)
            } else {
                path.parent().unwrap_or_else(|| Path::new(".")).join(inc)
            };
            let inc_map = read_merged(&inc_path, env, skip_expansion, visited)?;

            for (section, props) in inc_map {
                let entry = map.entry(section).or_default();

                for (k, v) in props {
                    entry.entry(k).or_insert(v);
                }
            }
        }
    }

    visited.remove(&canon);
    Ok(map)
}

/// Parse raw INI text (`=` delimiter only, valueless keys allowed, keys
/// case-preserved) into a section map with no interpolation applied.
fn parse_raw_str(text: &str, path: &Path) -> Result<IniMap> {
    let ini = Ini::load_from_str(text).map_err(|e| error!(IniError::Parse(path.to_path_buf(), e.to_string())))?;
    let mut map = IniMap::new();

    for (section, props) in ini.iter() {
        let name = section.unwrap_or("DEFAULT").to_string();
        let entry = map.entry(name).or_insert_with(Section::new);

        for (k, v) in props.iter() {
            entry.insert(k.to_string(), v.to_string());
        }
    }

    Ok(map)
}

fn interpolate_pre(map: IniMap, env: &Environment, skip_expansion: &[&str]) -> IniMap {
    let now = env.now();
    map.into_iter()
        .map(|(section, props)| {
            let skip = skip_expansion.contains(&section.as_str());
            let props = props
                .into_iter()
                .map(|(k, v)| {
                    let v = if skip { v } else { expand_env_vars(&v) };
                    let v = expand_now(&v, now);
                    (k, v)
                })
                .collect();
            (section, props)
        })
        .collect()
}

fn expand_env_vars(value: &str) -> String {
    let value = BRACE_VAR_RE.replace_all(value, |caps: &regex::Captures| std::env::var(&caps[1]).unwrap_or_default());
    BARE_VAR_RE.replace_all(&value, |caps: &regex::Captures| std::env::var(&caps[1]).unwrap_or_default()).into_owned()
}

fn expand_now(value: &str, now: OffsetDateTime) -> String {
    if !value.contains("${NOW:") {
        return value.to_string();
    }

    NOW_RE
        .replace_all(value, |caps: &regex::Captures| {
            let fmt = strftime_to_time_format(&caps[1]);

            match time::format_description::parse(&fmt) {
                Ok(desc) => now.format(&desc).unwrap_or_default(),
                Err(_) => String::new(),
            }
        })
        .into_owned()
}

/// Translate the handful of strftime directives used by ybox profiles
/// (`%Y%m%d_%H%M%S` and similar) into the `time` crate's format-description
/// syntax. Unrecognized specifiers are dropped; unescaped literal text
/// passes through.
fn strftime_to_time_format(fmt: &str) -> String {
    let mut out = String::new();
    let mut chars = fmt.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            if c == '[' || c == ']' {
                out.push(c);
                out.push(c);
            } else {
                out.push(c);
            }
            continue;
        }

        match chars.next() {
            Some('Y') => out.push_str("[year]"),
            Some('y') => out.push_str("[year repr:last_two]"),
            Some('m') => out.push_str("[month]"),
            Some('d') => out.push_str("[day]"),
            Some('H') => out.push_str("[hour]"),
            Some('I') => out.push_str("[hour repr:12]"),
            Some('M') => out.push_str("[minute]"),
            Some('S') => out.push_str("[second]"),
            Some('p') => out.push_str("[period]"),
            Some('j') => out.push_str("[ordinal]"),
            Some('z') => out.push_str("[offset_hour sign:mandatory][offset_minute]"),
            Some('%') => out.push('%'),
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_env() -> Environment {
        std::env::set_var("HOME", "/tmp/ybox-ini-test-home");
        Environment::capture().unwrap()
    }

    #[test]
    fn percent_percent_unescapes_to_single_percent() {
        let mut map = IniMap::new();
        let mut section = Section::new();
        section.insert("value".into(), "a%%b".into());
        map.insert("base".into(), section);
        interpolate_post(&mut map);
        assert_eq!(map["base"]["value"], "a%b");
    }

    #[test]
    fn ref_chaining_substitutes_same_section_key() {
        let mut map = IniMap::new();
        let mut section = Section::new();
        section.insert("name".into(), "firefox".into());
        section.insert("home".into(), "/home/%(name)s".into());
        map.insert("base".into(), section);
        interpolate_post(&mut map);
        assert_eq!(map["base"]["home"], "/home/firefox");
    }

    #[test]
    fn env_var_expansion_replaces_brace_and_bare_forms() {
        std::env::set_var("YBOX_TEST_VAR", "value123");
        assert_eq!(expand_env_vars("${YBOX_TEST_VAR}"), "value123");
        assert_eq!(expand_env_vars("$YBOX_TEST_VAR"), "value123");
    }

    #[test]
    fn load_merges_includes_with_including_file_winning() {
        let dir = tempfile::tempdir().unwrap();
        let base_path = dir.path().join("base.ini");
        let inc_path = dir.path().join("inc.ini");
        fs::write(&inc_path, "[base]\nname=included\nshared_root=/srv/inc\n").unwrap();
        fs::write(&base_path, "[base]\nincludes=inc.ini\nname=overridden\n").unwrap();

        let env = test_env();
        let map = load(&base_path, &env, &[]).unwrap();
        assert_eq!(map["base"]["name"], "overridden");
        assert_eq!(map["base"]["shared_root"], "/srv/inc");
    }
}

fn interpolate_post(map: &mut IniMap) {
    let general: Section = map.get("DEFAULT").cloned().unwrap_or_default();

    for section in map.values_mut() {
        for _ in 0 .. 10 {
            let mut changed = false;
            let keys: Vec<String> = section.keys().cloned().collect();

            for k in keys {
                let v = section.get(&k).cloned().unwrap_or_default();

                if !v.contains("%(") {
                    continue;
                }

                let new_v = REF_RE
                    .replace_all(&v, |caps: &regex::Captures| {
                        let name = &caps[1];
                        section.get(name).or_else(|| general.get(name)).cloned().unwrap_or_default()
                    })
                    .into_owned();

                if new_v != v {
                    section.insert(k, new_v);
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }
    }

    for section in map.values_mut() {
        for v in section.values_mut() {
            if v.contains("%%") {
                *v = v.replace("%%", "%");
            }
        }
    }
}
