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

//! Host graphics/audio/IPC passthrough (spec §4.5): a pure function from
//! host environment state and profile booleans to extra runtime args plus a
//! bash setup script for the entrypoint to run as root.

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;

use crate::config::NVIDIA_TARGET_BASE_DIR;

/// Which passthrough features a profile's `[base]` section requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRequest {
    pub x11: bool,
    pub wayland: bool,
    pub pulseaudio: bool,
    pub dbus: bool,
    pub dri: bool,
    pub nvidia: bool,
}

/// A single `--device` or bind-mount contribution to the final `run` argv.
#[derive(Debug, Clone)]
pub enum Arg {
    Env(String, String),
    Device(String),
    BindRo(String, String),
    BindRw(String, String),
}

/// The combined result of resolving a [`PassthroughRequest`] against the
/// current host.
#[derive(Debug, Clone, Default)]
pub struct PassthroughPlan {
    pub args: Vec<Arg>,
    /// Bash fragment appended to the generated NVIDIA setup script, run as
    /// root by the entrypoint once the container is up.
    pub setup_script: String,
}

lazy_static! {
    static ref PIPEWIRE_RE: Regex = Regex::new(r"^pipewire-[0-9]+$").unwrap();
    static ref NVIDIA_LIB_RE: Regex = Regex::new(
        r"(?i)(nvidia.*\.so|NVIDIA.*\.so|libcuda.*\.so|libnvcuvid.*\.so|libnvoptix.*\.so|gbm/.*nvidia.*\.so|vdpau/.*nvidia.*\.so|libXNVCtrl\.so)"
    )
    .unwrap();
    static ref NVIDIA_BIN_RE: Regex = Regex::new(r"^(nvidia-smi|nvidia-cuda.*|nvidia-debug.*|nvidia-bug.*)$").unwrap();
}

const NVIDIA_DATA_DIRS: &[&str] = &[
    "/usr/share/nvidia",
    "/usr/local/share/nvidia",
    "/lib/firmware/nvidia",
    "/usr/share/egl/*/*nvidia*",
    "/usr/share/glvnd/*/*nvidia*",
    "/usr/share/vulkan/*/*nvidia*",
];

/// Resolve `request` against the current process's environment and produce
/// the args + setup script to hand to the lifecycle engine.
pub fn resolve(request: PassthroughRequest, scripts_dir_target: &str) -> PassthroughPlan {
    let mut plan = PassthroughPlan::default();

    if request.x11 {
        resolve_x11(&mut plan);
    }
    if request.wayland {
        resolve_wayland(&mut plan);
    }
    if request.pulseaudio {
        resolve_pulseaudio(&mut plan);
    }
    if request.dbus {
        resolve_dbus(&mut plan);
    }
    if request.dri {
        resolve_dri(&mut plan);
    }
    if request.nvidia {
        resolve_nvidia(&mut plan, scripts_dir_target);
    }

    plan
}

fn resolve_x11(plan: &mut PassthroughPlan) {
    if let Ok(display) = std::env::var("DISPLAY") {
        plan.args.push(Arg::Env("DISPLAY".into(), display));
    }
    if Path::new("/tmp/.X11-unix").exists() {
        plan.args.push(Arg::BindRo("/tmp/.X11-unix".into(), "/tmp/.X11-unix".into()));
    }

    if let Ok(xauth) = std::env::var("XAUTHORITY") {
        let xauth_path = PathBuf::from(&xauth);
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_default();

        let mut candidates = vec![PathBuf::from("/tmp")];
        if !runtime_dir.is_empty() {
            candidates.push(PathBuf::from(&runtime_dir));
        }
        if let Some(parent) = xauth_path.parent() {
            candidates.push(parent.to_path_buf());
        }

        let base = candidates.into_iter().min_by_key(|p| p.components().count()).unwrap_or_else(|| PathBuf::from("/tmp"));
        let host_base = format!("{}-host", base.display());
        let rebased = host_base.clone() + xauth.strip_prefix(&base.display().to_string()).unwrap_or(&xauth);

        plan.args.push(Arg::BindRo(base.display().to_string(), host_base.clone()));
        plan.args.push(Arg::Env("XAUTHORITY".into(), rebased.clone()));
        plan.args.push(Arg::Env("XAUTHORITY_ORIG".into(), xauth));
        let _ = rebased;
    }
}

fn resolve_wayland(plan: &mut PassthroughPlan) {
    if let Ok(wayland_display) = std::env::var("WAYLAND_DISPLAY") {
        plan.args.push(Arg::Env("WAYLAND_DISPLAY".into(), wayland_display));
    }
    plan.args.push(Arg::Env("ENABLE_WAYLAND".into(), "true".into()));
}

fn resolve_pulseaudio(plan: &mut PassthroughPlan) {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_default();
    if runtime_dir.is_empty() {
        return;
    }

    let cookie = PathBuf::from(&runtime_dir).join("pulse/cookie");
    if cookie.exists() {
        plan.args.push(Arg::BindRo(cookie.display().to_string(), cookie.display().to_string()));
    }

    let native = PathBuf::from(&runtime_dir).join("pulse/native");
    if native.exists() {
        plan.args.push(Arg::BindRw(native.display().to_string(), native.display().to_string()));
    }

    if let Ok(entries) = std::fs::read_dir(&runtime_dir) {
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if PIPEWIRE_RE.is_match(name) {
                    let p = entry.path().display().to_string();
                    plan.args.push(Arg::BindRw(p.clone(), p));
                }
            }
        }
    }
}

fn resolve_dbus(plan: &mut PassthroughPlan) {
    if let Ok(addr) = std::env::var("DBUS_SESSION_BUS_ADDRESS") {
        if let Some(path) = addr.strip_prefix("unix:path=") {
            plan.args.push(Arg::BindRw(path.to_string(), path.to_string()));
        }
    }

    for candidate in ["/run/dbus/system_bus_socket", "/var/run/dbus/system_bus_socket"] {
        if Path::new(candidate).exists() {
            plan.args.push(Arg::BindRw(candidate.into(), candidate.into()));
            break;
        }
    }
}

fn resolve_dri(plan: &mut PassthroughPlan) {
    plan.args.push(Arg::Device("/dev/dri".into()));
    if Path::new("/dev/dri/by-path").exists() {
        plan.args.push(Arg::BindRo("/dev/dri/by-path".into(), "/dev/dri/by-path".into()));
    }
}

fn resolve_nvidia(plan: &mut PassthroughPlan, scripts_dir_target: &str) {
    for dev in discover_nvidia_devices() {
        plan.args.push(Arg::Device(dev));
    }

    let lib_dirs = discover_lib_dirs();
    let matched_libs: Vec<PathBuf> = lib_dirs.par_iter().filter(|d| dir_has_match(d, &NVIDIA_LIB_RE)).cloned().collect();

    let mut script = String::new();
    let mut ld_library_path = Vec::new();

    for (idx, dir) in matched_libs.iter().enumerate() {
        let mount_point = format!("{scripts_dir_target}/mnt_lib{idx}");
        plan.args.push(Arg::BindRo(dir.display().to_string(), mount_point.clone()));

        let target_dir = format!("{NVIDIA_TARGET_BASE_DIR}/lib{idx}");
        script.push_str(&format!("mkdir -p '{target_dir}'\n"));
        script.push_str(&format!("for f in '{mount_point}'/*; do ln -sf \"$f\" '{target_dir}/'; done\n"));
        ld_library_path.push(target_dir);
    }

    if !ld_library_path.is_empty() {
        plan.args.push(Arg::Env("LD_LIBRARY_PATH".into(), ld_library_path.join(":")));
    }

    let bin_dirs: Vec<PathBuf> = std_bin_dirs().into_iter().filter(|d| dir_has_match(d, &NVIDIA_BIN_RE)).collect();
    for dir in &bin_dirs {
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    if NVIDIA_BIN_RE.is_match(name) {
                        script.push_str(&format!("ln -sf '{}' '/usr/local/bin/{name}'\n", entry.path().display()));
                    }
                }
            }
        }
    }

    for pattern in NVIDIA_DATA_DIRS {
        for path in glob_paths(pattern) {
            script.push_str(&format!("mkdir -p '{}'\n", path.parent().map(|p| p.display().to_string()).unwrap_or_default()));
            script.push_str(&format!("ln -sfn '{}' '{}'\n", path.display(), path.display()));
        }
    }

    plan.setup_script.push_str(&script);
}

fn discover_nvidia_devices() -> Vec<String> {
    let mut found = Vec::new();
    if let Ok(entries) = std::fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with("nvidia") {
                    if let Ok(meta) = entry.metadata() {
                        if meta.is_file() || is_char_device(&meta) {
                            found.push(entry.path().display().to_string());
                        }
                    }
                }
            }
        }
    }
    found.sort();
    found
}

#[cfg(unix)]
fn is_char_device(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    meta.file_type().is_char_device()
}

#[cfg(not(unix))]
fn is_char_device(_meta: &std::fs::Metadata) -> bool {
    false
}

fn discover_lib_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    for var in ["LD_LIBRARY_PATH", "LD_LIBRARY_PATH_64", "LD_LIBRARY_PATH_32"] {
        if let Ok(val) = std::env::var(var) {
            dirs.extend(val.split(':').filter(|s| !s.is_empty()).map(PathBuf::from));
        }
    }

    dirs.extend(parse_ld_so_conf(Path::new("/etc/ld.so.conf")));

    for pattern in ["/usr/lib/x86_64-linux-gnu", "/usr/lib64", "/usr/lib", "/lib/x86_64-linux-gnu", "/lib64", "/lib"] {
        let p = PathBuf::from(pattern);
        if p.is_dir() {
            dirs.push(p);
        }
    }

    dirs.sort();
    dirs.dedup();
    dirs
}

fn parse_ld_so_conf(path: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let Ok(text) = std::fs::read_to_string(path) else { return dirs };

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pattern) = line.strip_prefix("include ") {
            for p in glob_paths(pattern.trim()) {
                dirs.extend(parse_ld_so_conf(&p));
            }
        } else {
            dirs.push(PathBuf::from(line));
        }
    }

    dirs
}

fn std_bin_dirs() -> Vec<PathBuf> {
    ["/usr/bin", "/usr/local/bin", "/bin"].into_iter().map(PathBuf::from).filter(|p| p.is_dir()).collect()
}

fn dir_has_match(dir: &Path, re: &Regex) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else { return false };
    entries.flatten().any(|e| e.file_name().to_str().is_some_and(|n| re.is_match(n)))
}

/// Minimal glob: splits on `*` and matches directory entries, good enough
/// for the fixed patterns in [`NVIDIA_DATA_DIRS`] and `ld.so.conf.d/*.conf`.
fn glob_paths(pattern: &str) -> Vec<PathBuf> {
    let path = Path::new(pattern);
    let mut components: Vec<&std::ffi::OsStr> = Vec::new();
    for c in path.components() {
        components.push(c.as_os_str());
    }

    let mut current = vec![PathBuf::from("/")];
    for comp in components {
        let comp_str = comp.to_string_lossy();
        if comp_str == "/" {
            continue;
        }

        let mut next = Vec::new();
        for base in &current {
            if comp_str.contains('*') {
                let re = glob_component_to_regex(&comp_str);
                if let Ok(entries) = std::fs::read_dir(base) {
                    for entry in entries.flatten() {
                        if let Some(name) = entry.file_name().to_str() {
                            if re.is_match(name) {
                                next.push(entry.path());
                            }
                        }
                    }
                }
            } else {
                let candidate = base.join(comp_str.as_ref());
                if candidate.exists() {
                    next.push(candidate);
                }
            }
        }
        current = next;
    }

    current
}

fn glob_component_to_regex(component: &str) -> Regex {
    let mut pattern = String::from("^");
    for ch in component.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '.' | '+' | '(' | ')' | '[' | ']' | '^' | '$' => {
                pattern.push('\\');
                pattern.push(ch);
            }
            c => pattern.push(c),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).unwrap_or_else(|_| Regex::new("$^").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_without_any_flags_produces_nothing() {
        let plan = resolve(PassthroughRequest::default(), "/usr/local/ybox");
        assert!(plan.args.is_empty());
        assert!(plan.setup_script.is_empty());
    }

    #[test]
    fn wayland_always_sets_enable_flag() {
        let plan = resolve(PassthroughRequest { wayland: true, ..Default::default() }, "/usr/local/ybox");
        assert!(plan.args.iter().any(|a| matches!(a, Arg::Env(k, v) if k == "ENABLE_WAYLAND" && v == "true")));
    }

    #[test]
    fn dri_adds_device_and_by_path_when_present() {
        let plan = resolve(PassthroughRequest { dri: true, ..Default::default() }, "/usr/local/ybox");
        assert!(plan.args.iter().any(|a| matches!(a, Arg::Device(d) if d == "/dev/dri")));
    }

    #[test]
    fn glob_component_regex_matches_wildcard() {
        let re = glob_component_to_regex("*nvidia*");
        assert!(re.is_match("libnvidia-foo.so"));
        assert!(!re.is_match("libmesa.so"));
    }
}
