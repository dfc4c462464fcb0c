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

//! Host-side wrapper generation (spec §4.7): `.desktop` file rewriting,
//! executable shims, and man-page symlinks for a package's files.

use std::{
    collections::HashMap,
    fs,
    os::unix::fs::{symlink, PermissionsExt},
    path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    config::{CONTAINER_DESKTOP_DIRS, CONTAINER_MAN_DIR_PATTERN, SYS_BIN_DIRS},
    env::Environment,
    runtime::Runtime,
    state::types::CopyType,
    utils::prompt::confirm,
    Result,
};

lazy_static! {
    static ref EXEC_LINE_RE: Regex = Regex::new(r"(?m)^(TryExec|Exec)=(.*)$").unwrap();
    static ref MAN_DIR_RE: Regex = Regex::new(CONTAINER_MAN_DIR_PATTERN).unwrap();
}

/// A file belonging to an installed package, as parsed from the
/// distribution's `list_files` template output.
#[derive(Debug, Clone)]
pub struct PackageFile {
    pub dir: String,
    pub filename: String,
    pub full_path: String,
}

/// Parse `list_files` output into `(dir, filename, full_path)` tuples; one
/// absolute path per non-empty line.
pub fn parse_file_list(output: &str) -> Vec<PackageFile> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let path = Path::new(line);
            let filename = path.file_name()?.to_str()?.to_string();
            let dir = path.parent()?.to_str()?.to_string();
            Some(PackageFile { dir, filename, full_path: line.to_string() })
        })
        .collect()
}

pub struct WrapperInputs<'a> {
    pub runtime: &'a Runtime,
    pub env: &'a Environment,
    pub container: &'a str,
    pub shared_root: Option<&'a str>,
    pub app_flags: &'a HashMap<String, String>,
    pub quiet: u8,
}

/// Run the package's `list_files` output through wrapper creation, honoring
/// `copy_type`. Returns every host path created, for persisting as
/// `local_copies`.
pub fn create_wrappers(inputs: &WrapperInputs, files: &[PackageFile], mut copy_type: CopyType) -> Result<Vec<String>> {
    let mut created = Vec::new();

    if copy_type.contains(CopyType::EXECUTABLE) {
        let refused = files.iter().any(|f| is_executable_candidate(f) && !confirm_overwrite(inputs, f).unwrap_or(false));
        if refused {
            copy_type.remove(CopyType::EXECUTABLE);
        }
    }

    for file in files {
        let is_desktop = CONTAINER_DESKTOP_DIRS.contains(&file.dir.as_str());
        let is_executable = is_executable_candidate(file);

        if copy_type.contains(CopyType::DESKTOP) && is_desktop {
            if let Some(path) = create_desktop_wrapper(inputs, file)? {
                created.push(path);
            }
            continue;
        }

        if copy_type.contains(CopyType::EXECUTABLE) && is_executable {
            if let Some(path) = create_executable_wrapper(inputs, file)? {
                created.push(path);
            }
        } else if let Some(shared_root) = inputs.shared_root {
            if MAN_DIR_RE.is_match(&file.dir) {
                if let Some(path) = create_man_link(inputs, shared_root, file)? {
                    created.push(path);
                }
            }
        }
    }

    Ok(created)
}

fn is_executable_candidate(file: &PackageFile) -> bool {
    SYS_BIN_DIRS.contains(&file.dir.as_str())
}

/// Two-tier, quiet-gated confirmation (spec §4.7 step 3): refuses to
/// overwrite an existing host wrapper (prompting below `--quiet`=1) and
/// refuses to shadow a system-installed executable of the same name
/// (prompting below `--quiet`=2). Grounded on `inst.py`'s
/// `_can_wrap_executable`.
fn confirm_overwrite(inputs: &WrapperInputs, file: &PackageFile) -> Result<bool> {
    let dest = inputs.env.user_executables_dir().join(&file.filename);

    if dest.exists() {
        if inputs.quiet >= 1 {
            return Ok(false);
        }
        if !confirm(format!("Overwrite existing wrapper '{}'?", dest.display()), false)? {
            return Ok(false);
        }
    }

    if let Some(sys_exec) = system_executable_path(&file.filename) {
        if inputs.quiet >= 2 {
            return Ok(false);
        }
        if !confirm(format!("'{}' will override system installed '{}'. Continue?", dest.display(), sys_exec.display()), false)? {
            return Ok(false);
        }
    }

    Ok(true)
}

/// First of [`SYS_BIN_DIRS`] that already has a file named `filename`, if any.
fn system_executable_path(filename: &str) -> Option<PathBuf> {
    SYS_BIN_DIRS.iter().map(|dir| Path::new(dir).join(filename)).find(|p| p.exists())
}

fn create_desktop_wrapper(inputs: &WrapperInputs, file: &PackageFile) -> Result<Option<String>> {
    let text = match inputs.runtime.exec_output(inputs.container, &["cat".to_string(), file.full_path.clone()]) {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).to_string(),
        _ => return Ok(None),
    };

    let rewritten = EXEC_LINE_RE.replace_all(&text, |caps: &regex::Captures| {
        let key = &caps[1];
        let expanded = expand_exec_line(inputs, &caps[2]);
        format!(
            "{key}={} exec -it -e=XAUTHORITY {} /usr/local/bin/run-in-dir \"\" {expanded}",
            inputs.runtime.binary(),
            inputs.container
        )
    });

    let dest = inputs.env.user_applications_dir().join(format!("ybox.{}.{}", inputs.container, file.filename));
    fs::create_dir_all(inputs.env.user_applications_dir()).ok();
    fs::write(&dest, rewritten.as_bytes()).ok();
    Ok(Some(dest.display().to_string()))
}

fn expand_exec_line(inputs: &WrapperInputs, cmdline: &str) -> String {
    let mut parts = cmdline.split_whitespace();
    let program = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();
    let args_joined = args.join(" ");

    let flag_value = get_ci_map(inputs.app_flags, program);

    match flag_value {
        Some(template) => expand_flag_template(template, program, &args_joined),
        None => format!("\"{program} {args_joined}\""),
    }
}

/// Expand `!p` (program), `!a` (args), `!!` (literal `!`) left to right so
/// that `!!p` yields a literal `!p` rather than re-triggering substitution.
fn expand_flag_template(template: &str, program: &str, args: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '!' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('!') => {
                out.push('!');
                chars.next();
            }
            Some('p') => {
                out.push_str(program);
                chars.next();
            }
            Some('a') => {
                out.push_str(args);
                chars.next();
            }
            _ => out.push('!'),
        }
    }

    out
}

fn get_ci_map<'a>(map: &'a HashMap<String, String>, key: &str) -> Option<&'a String> {
    map.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v)
}

fn create_executable_wrapper(inputs: &WrapperInputs, file: &PackageFile) -> Result<Option<String>> {
    let dest = inputs.env.user_executables_dir().join(&file.filename);
    let script = format!(
        "#!/bin/sh\nexec {} exec -it -e=XAUTHORITY {} /usr/local/bin/run-in-dir \"$(pwd)\" {} \"$@\"\n",
        inputs.runtime.binary(),
        inputs.container,
        file.full_path
    );

    fs::create_dir_all(inputs.env.user_executables_dir()).ok();
    fs::write(&dest, script.as_bytes()).ok();
    let _ = fs::set_permissions(&dest, fs::Permissions::from_mode(0o755));
    Ok(Some(dest.display().to_string()))
}

fn create_man_link(inputs: &WrapperInputs, shared_root: &str, file: &PackageFile) -> Result<Option<String>> {
    let rel = file.full_path.trim_start_matches('/');
    let dest = inputs.env.user_man_dir().join(rel);
    let Some(parent) = dest.parent() else { return Ok(None) };
    fs::create_dir_all(parent).ok();

    let target = PathBuf::from(shared_root).join(rel);
    if dest.exists() || dest.symlink_metadata().is_ok() {
        let _ = fs::remove_file(&dest);
    }
    symlink(&target, &dest).ok();
    Ok(Some(dest.display().to_string()))
}

/// Remove every path previously returned by [`create_wrappers`] (or read
/// back from `local_copies`).
pub fn remove_wrappers(paths: &[String]) {
    for p in paths {
        let _ = fs::remove_file(p);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_file_list_splits_dir_and_filename() {
        let files = parse_file_list("/usr/bin/vim\n/usr/share/applications/vim.desktop\n");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].dir, "/usr/bin");
        assert_eq!(files[0].filename, "vim");
    }

    #[test]
    fn is_executable_candidate_matches_bin_dirs_only() {
        let exe = PackageFile { dir: "/usr/bin".into(), filename: "vim".into(), full_path: "/usr/bin/vim".into() };
        let desktop = PackageFile {
            dir: "/usr/share/applications".into(),
            filename: "vim.desktop".into(),
            full_path: "/usr/share/applications/vim.desktop".into(),
        };
        assert!(is_executable_candidate(&exe));
        assert!(!is_executable_candidate(&desktop));
    }

    #[test]
    fn system_executable_path_finds_existing_sys_bin_match() {
        assert_eq!(system_executable_path("true"), Some(PathBuf::from("/usr/bin/true")));
        assert_eq!(system_executable_path("ybox-no-such-executable-xyz"), None);
    }

    #[test]
    fn expand_exec_line_falls_back_to_quoted_command_without_flags() {
        let inputs = WrapperInputs {
            runtime: &Runtime::resolve(Some("/usr/bin/true")).unwrap(),
            env: &test_env(),
            container: "box1",
            shared_root: None,
            app_flags: &HashMap::new(),
            quiet: 0,
        };
        assert_eq!(expand_exec_line(&inputs, "vim %F"), "\"vim %F\"");
    }

    fn test_env() -> Environment {
        std::env::set_var("HOME", "/tmp/ybox-wrapper-test-home");
        Environment::capture().unwrap()
    }
}
