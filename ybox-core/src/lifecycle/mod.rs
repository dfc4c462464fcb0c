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

//! Lifecycle Engine (spec §4.4): translates a validated [`Profile`] plus its
//! distribution descriptor into a `podman/docker run` argument vector, then
//! drives the multi-stage container creation/start/stop/restart/destroy
//! protocol. Grounded on `ybox.run.create`, `ybox.run.control`,
//! `ybox.run.destroy`, `ybox.run.ls` and `ybox.run.logs`.

pub mod control;
pub mod create;
pub mod destroy;
pub mod ls;
pub mod logs;

use std::collections::HashMap;

use crate::{
    config::{
        distro::{expand_template, Distro},
        profile::{ProfileError, Section},
        StaticConfiguration,
    },
    err,
    graphics::{self, Arg, PassthroughRequest},
    ErrorGeneric, Result,
};

/// Labels stamped on every container/image the lifecycle engine creates,
/// mirroring `ybox.cmd.YboxLabel`.
pub mod label {
    pub const GROUP: &str = "io.ybox.container";
    pub const TYPE: &str = "io.ybox.container.type";
    pub const DISTRIBUTION: &str = "io.ybox.container.distribution";
    pub const BASE: &str = "io.ybox.container.type=base";
    pub const COPY: &str = "io.ybox.container.type=copy";
    pub const PRIMARY: &str = "io.ybox.container.type=primary";
}

/// Accumulates `podman/docker run` arguments the way the Python original
/// builds up its plain `list[str]`.
#[derive(Debug, Clone, Default)]
pub struct RunArgs(pub Vec<String>);

impl RunArgs {
    pub fn push(&mut self, arg: impl Into<String>) {
        self.0.push(arg.into());
    }

    pub fn add_env(&mut self, var: &str, val: Option<&str>) {
        match val {
            Some(v) => self.push(format!("-e={var}={v}")),
            None => self.push(format!("-e={var}")),
        }
    }

    pub fn add_mount(&mut self, src: &str, dest: &str, flags: &str) {
        if flags.is_empty() {
            self.push(format!("-v={src}:{dest}"));
        } else {
            self.push(format!("-v={src}:{dest}:{flags}"));
        }
    }

    pub fn add_multi_opt(&mut self, val: &str, opt: &str) {
        if val.is_empty() {
            return;
        }
        for v in val.split(',') {
            self.push(format!("--{opt}={v}"));
        }
    }

    pub fn add_option_if_exists(&mut self, opt: &str, val: &str) {
        if !val.is_empty() {
            self.push(format!("--{opt}={val}"));
        }
    }

    pub fn add_sec_option_if_exists(&mut self, key: &str, val: &str) {
        if !val.is_empty() {
            self.push(format!("--security-opt={key}={val}"));
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// Translate a resolved [`graphics::PassthroughPlan`] into `RunArgs`
/// entries: `Env` becomes `-e=K=V`, `Device` becomes `--device=`, and the
/// two bind-mount kinds become `ro`/read-write `-v=` mounts.
fn apply_passthrough(args: &mut RunArgs, plan: &graphics::PassthroughPlan) {
    for arg in &plan.args {
        match arg {
            Arg::Env(k, v) => args.add_env(k, Some(v)),
            Arg::Device(d) => args.push(format!("--device={d}")),
            Arg::BindRo(src, dest) => args.add_mount(src, dest, "ro"),
            Arg::BindRw(src, dest) => args.add_mount(src, dest, ""),
        }
    }
}

fn get_boolean(val: &str) -> Result<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" | "" => Ok(false),
        other => err!(ProfileError::InvalidBooleanValue(other.to_string()))?,
    }
}

/// `[base]`: translates `home`/passthrough flags/resource limits into run
/// args, returning `(shared_root, config_hardlinks)`. `config_hardlinks` of
/// `None` means "skip `[configs]` entirely", matching the Python tri-state.
pub fn process_base_section(section: &Section, target_home: &str, conf: &StaticConfiguration, args: &mut RunArgs) -> Result<(String, Option<bool>)> {
    let mut shared_root = String::new();
    let mut config_hardlinks = Some(false);
    let mut config_locale = true;
    let mut request = PassthroughRequest::default();

    for (key, val) in section {
        match key.as_str() {
            "home" => {
                std::fs::create_dir_all(val).ok();
                args.add_mount(val, target_home, "");
            }
            "shared_root" => shared_root = val.clone(),
            "config_hardlinks" => config_hardlinks = if val.is_empty() { None } else { Some(get_boolean(val)?) },
            "config_locale" => config_locale = get_boolean(val)?,
            "x11" => request.x11 = get_boolean(val)?,
            "wayland" => request.wayland = get_boolean(val)?,
            "pulseaudio" => request.pulseaudio = get_boolean(val)?,
            "dbus" => request.dbus = get_boolean(val)?,
            "dri" => request.dri = get_boolean(val)?,
            "nvidia" => request.nvidia = get_boolean(val)?,
            "shm_size" if !val.is_empty() => args.push(format!("--shm-size={val}")),
            "pids_limit" if !val.is_empty() => args.push(format!("--pids-limit={val}")),
            "log_driver" if !val.is_empty() => args.push(format!("--log-driver={val}")),
            "log_opts" => args.add_multi_opt(val, "log-opt"),
            "name" | "includes" | "dbus_sys" | "shm_size" | "pids_limit" | "log_driver" | "nvidia_ctk" => {}
            _ => {}
        }
    }

    let plan = graphics::resolve(request, &conf.target_scripts_dir.display().to_string());
    apply_passthrough(args, &plan);
    if request.dbus {
        let sys_enable = section.get("dbus_sys").map(|v| get_boolean(v)).transpose()?.unwrap_or(false);
        if sys_enable {
            for candidate in ["/run/dbus/system_bus_socket", "/var/run/dbus/system_bus_socket"] {
                if std::path::Path::new(candidate).exists() {
                    args.add_mount(candidate, candidate, "");
                    break;
                }
            }
        }
    }

    if config_locale {
        for lang_var in ["LANG", "LANGUAGE"] {
            args.add_env(lang_var, std::env::var(lang_var).ok().as_deref());
        }
    }

    Ok((shared_root, config_hardlinks))
}

const SEC_FLAG_OPTIONS: &[&str] = &["label", "apparmor", "seccomp", "mask", "umask", "proc_opts"];
const SEC_SINGLE_OPTIONS: &[&str] = &["seccomp_policy", "ipc", "cgroup_parent", "cgroupns", "cgroups"];
const SEC_MULTI_OPTIONS: &[(&str, &str)] =
    &[("caps_add", "cap-add"), ("caps_drop", "cap-drop"), ("ulimits", "ulimit"), ("cgroup_confs", "cgroup-conf"), ("device_cgroup_rules", "device-cgroup-rule"), ("secrets", "secret")];

/// `[security]`: `--security-opt`/`--cap-add`/... translation.
pub fn process_security_section(section: &Section, args: &mut RunArgs) -> Result<()> {
    for (key, val) in section {
        let opt = key.replace('_', "-");
        if SEC_FLAG_OPTIONS.contains(&key.as_str()) {
            args.add_sec_option_if_exists(&opt, val);
        } else if let Some((_, opt_name)) = SEC_MULTI_OPTIONS.iter().find(|(k, _)| *k == key) {
            args.add_multi_opt(val, opt_name);
        } else if SEC_SINGLE_OPTIONS.contains(&key.as_str()) {
            args.add_option_if_exists(&opt, val);
        } else if key == "no_new_privileges" {
            if get_boolean(val)? {
                args.push("--security-opt=no-new-privileges");
            }
        }
    }
    Ok(())
}

/// `[mounts]`: values are either a bare `-v=SRC:DEST[:FLAGS]` form or, when
/// they contain `=`/`,`, an `--mount=` form. Keys are purely symbolic.
pub fn process_mounts_section(section: &Section, args: &mut RunArgs) {
    for val in section.values() {
        if val.is_empty() {
            continue;
        }
        if val.contains('=') || val.contains(',') {
            args.push(format!("--mount={val}"));
        } else {
            args.push(format!("-v={val}"));
        }
    }
}

/// `[env]`: every key-value pair becomes `-e=KEY=VALUE`.
pub fn process_env_section(section: &Section, args: &mut RunArgs) {
    for (key, val) in section {
        args.add_env(key, Some(val));
    }
}

/// `[configs]`: copies (or hard-links) each `{src} -> {dest}` entry under
/// `conf.configs_dir`, recording the raw entries in `conf.config_list` for
/// the container entrypoint, then mounts the whole directory read-only.
pub fn process_configs_section(section: &Section, hardlinks: bool, conf: &StaticConfiguration, args: &mut RunArgs) -> Result<()> {
    if conf.configs_dir.exists() {
        std::fs::remove_dir_all(&conf.configs_dir).ok();
    }
    std::fs::create_dir_all(&conf.configs_dir).generic()?;

    let mut list = String::new();
    for val in section.values() {
        let Some(split_idx) = val.find("->") else {
            continue;
        };
        let src_path = val[.. split_idx].trim();
        let dest_rel = val[split_idx + 2 ..].trim();
        let dest_path = conf.configs_dir.join(dest_rel);

        if std::fs::metadata(src_path).is_err() {
            crate::utils::print_warning(&format!("Skipping inaccessible configuration path '{src_path}'"));
            continue;
        }

        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        copy_config_entry(std::path::Path::new(src_path), &dest_path, hardlinks);
        list.push_str(val);
        list.push('\n');
    }

    std::fs::write(&conf.config_list, list).generic()?;
    args.add_mount(&conf.configs_dir.display().to_string(), &conf.target_configs_dir.display().to_string(), "ro");
    Ok(())
}

fn copy_config_entry(src: &std::path::Path, dest: &std::path::Path, hardlinks: bool) {
    if src.is_dir() {
        for entry in walkdir::WalkDir::new(src).follow_links(true).into_iter().flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(src) else { continue };
            let target = dest.join(rel);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            link_or_copy(entry.path(), &target, hardlinks);
        }
    } else {
        link_or_copy(src, dest, hardlinks);
    }
}

fn link_or_copy(src: &std::path::Path, dest: &std::path::Path, hardlinks: bool) {
    if hardlinks {
        if std::fs::hard_link(src, dest).is_ok() {
            return;
        }
    }
    let _ = std::fs::copy(src, dest);
}

/// `[apps]`: writes `pkgmgr.conf` (the install/cleanup command templates
/// the entrypoint uses) and `app.list` (apps to install, one line per
/// profile entry, with `name:dep(owner)` suffixes pulled out into a
/// dedicated optional-deps line), returning the app -> explicit-deps map
/// the caller needs once the container is up (spec §4.6 install calls).
pub fn process_apps_section(section: &Section, conf: &StaticConfiguration, distro: &Distro) -> Result<HashMap<String, Vec<String>>> {
    if section.is_empty() {
        return Ok(HashMap::new());
    }

    let pkgmgr = &distro.pkgmgr;
    let Some(install_tpl) = &pkgmgr.install else {
        crate::utils::print_warning("Skipping app installation since no 'pkgmgr.install' has been defined in distro.ini or is empty");
        return Ok(HashMap::new());
    };

    let quiet_flag = pkgmgr.quiet_flag.as_deref().unwrap_or("");
    let mut values = HashMap::new();
    values.insert("quiet", quiet_flag);
    values.insert("opt_dep", "");
    let install_cmd = expand_template(install_tpl, &values);
    let cleanup_cmd = pkgmgr.clean.clone().unwrap_or_default();
    let opt_dep_flag = pkgmgr.opt_dep_flag.clone().unwrap_or_default();

    std::fs::write(conf.scripts_dir.join("pkgmgr.conf"), format!("PKGMGR_INSTALL='{install_cmd}'\nPKGMGR_CLEANUP='{cleanup_cmd}'\n")).generic()?;

    let mut apps_with_deps: HashMap<String, Vec<String>> = HashMap::new();
    let mut app_list = String::new();

    for val in section.values() {
        let entries: Vec<&str> = val.split(',').map(str::trim).collect();
        let mut deps = Vec::new();
        let mut apps = Vec::new();

        for entry in entries {
            if let Some((owner, dep)) = parse_dep_suffix(entry) {
                deps.push(dep.to_string());
                apps_with_deps.entry(owner.to_string()).or_default().push(dep.to_string());
            } else {
                apps.push(entry.to_string());
                apps_with_deps.entry(entry.to_string()).or_default();
            }
        }

        if !deps.is_empty() {
            app_list.push_str(&format!("{opt_dep_flag} {}\n", deps.join(" ")));
        }
        if !apps.is_empty() {
            app_list.push_str(&format!("{}\n", apps.join(" ")));
        }
    }

    std::fs::write(&conf.app_list, app_list).generic()?;
    Ok(apps_with_deps)
}

/// Parses a `name:dep(owner)` entry, returning `(owner, name)`.
fn parse_dep_suffix(entry: &str) -> Option<(&str, &str)> {
    let rest = entry.strip_suffix(')')?;
    let idx = rest.find(":dep(")?;
    let name = &rest[.. idx];
    let owner = &rest[idx + 5 ..];
    Some((owner, name))
}

/// `[packages]`/`configure_fastest_mirrors` from `distro.ini`, surfaced to
/// the entrypoint as environment variables.
pub fn process_distribution_config(distro: &Distro, args: &mut RunArgs) {
    if distro.configure_fastest_mirrors {
        args.add_env("CONFIGURE_FASTEST_MIRRORS", Some("1"));
    }

    let packages = &distro.packages;
    for (list, env_var) in [
        (&packages.required, "REQUIRED_PKGS"),
        (&packages.recommended, "RECOMMENDED_PKGS"),
        (&packages.suggested, "SUGGESTED_PKGS"),
        (&packages.required_deps, "REQUIRED_DEPS"),
        (&packages.recommended_deps, "RECOMMENDED_DEPS"),
        (&packages.suggested_deps, "SUGGESTED_DEPS"),
        (&packages.extra, "EXTRA_PKGS"),
    ] {
        if !list.is_empty() {
            args.add_env(env_var, Some(&list.join(" ")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_args_mount_without_flags_omits_trailing_colon() {
        let mut args = RunArgs::default();
        args.add_mount("/src", "/dest", "");
        assert_eq!(args.0, vec!["-v=/src:/dest".to_string()]);
    }

    #[test]
    fn run_args_env_without_value_passes_through_name_only() {
        let mut args = RunArgs::default();
        args.add_env("DISPLAY", None);
        assert_eq!(args.0, vec!["-e=DISPLAY".to_string()]);
    }

    #[test]
    fn parse_dep_suffix_extracts_owner_and_dependency_name() {
        assert_eq!(parse_dep_suffix("libfoo:dep(firefox)"), Some(("firefox", "libfoo")));
        assert_eq!(parse_dep_suffix("firefox"), None);
    }

    #[test]
    fn process_mounts_section_distinguishes_mount_and_dash_v_forms() {
        let mut section = Section::new();
        section.insert("m1".into(), "/a:/b".into());
        section.insert("m2".into(), "type=bind,src=/a,dst=/b".into());
        let mut args = RunArgs::default();
        process_mounts_section(&section, &mut args);
        assert_eq!(args.0, vec!["-v=/a:/b".to_string(), "--mount=type=bind,src=/a,dst=/b".to_string()]);
    }
}
