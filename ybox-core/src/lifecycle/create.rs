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

//! `ybox create`: builds a fresh container from a [`Profile`] + [`Distro`]
//! pair, optionally sharing a root filesystem across several containers of
//! the same distribution. Grounded on `ybox.run.create.main_argv`.

use std::{collections::HashMap, thread, time::Duration};

use crate::{
    config::{distro::Distro, profile::Profile, StaticConfiguration},
    env::Environment,
    lifecycle::{label, process_apps_section, process_base_section, process_configs_section, process_distribution_config, process_env_section, process_mounts_section, process_security_section, RunArgs},
    lock::FileLock,
    pkg::{install::install_package, install::InstallOptions, PkgContext},
    runtime::Runtime,
    state::StateStore,
    utils, wrapper,
    wrapper::WrapperInputs,
    ErrorGeneric, Result,
};

/// Inputs the caller has already resolved: which distribution/profile to
/// build, what to name the container, and whether pre-existing orphaned
/// packages under the same shared root may be adopted unconditionally.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub box_name: String,
    pub force_own_orphans: bool,
    pub quiet: u8,
}

/// Orchestrates the full container build: base image bootstrap, optional
/// shared-root copy container, final container start, readiness wait, and
/// package/state registration. Mirrors `create.main_argv`'s sequence:
/// non-shared-root distributions go straight from base image to final
/// container; shared-root ones interpose a throwaway "copy" container that
/// seeds `shared_root` on the host the first time it is used, after which
/// later containers on the same root skip straight to the final run.
pub fn create_container(env: &Environment, conf: &StaticConfiguration, runtime: &Runtime, state: &mut StateStore, distro: &Distro, profile: &Profile, opts: &CreateOptions) -> Result<()> {
    std::fs::create_dir_all(&conf.scripts_dir).generic()?;
    std::fs::create_dir_all(&conf.configs_dir).generic()?;

    let mut args = RunArgs::default();
    process_distribution_config(distro, &mut args);

    let target_home = "/home/ybox";
    let base_section = profile.base();
    let (shared_root, config_hardlinks) = process_base_section(&base_section, target_home, conf, &mut args)?;

    if let Some(sec) = profile.section("security") {
        process_security_section(sec, &mut args)?;
    }
    if let Some(sec) = profile.section("mounts") {
        process_mounts_section(sec, &mut args);
    }
    if let Some(sec) = profile.section("env") {
        process_env_section(sec, &mut args);
    }

    let apps_with_deps = if let Some(hardlinks) = config_hardlinks {
        if let Some(configs) = profile.section("configs") {
            process_configs_section(configs, hardlinks, conf, &mut args)?;
        }
        if let Some(apps) = profile.section("apps") {
            process_apps_section(apps, conf, distro)?
        } else {
            HashMap::new()
        }
    } else {
        HashMap::new()
    };

    setup_ybox_scripts(env, conf, distro)?;

    let reassigned = if shared_root.is_empty() {
        run_base_container(runtime, conf, distro)?;
        commit_container(runtime, conf, distro, false)?;
        state.register_container(&opts.box_name, &conf.distribution, "", profile, opts.force_own_orphans)?
    } else {
        let lock_path = std::path::Path::new(&shared_root).join(".ybox-build.lock");
        let _lock = FileLock::acquire_default(&lock_path, 120)?;

        if !runtime.image_exists(&conf.shared_box_image)? {
            run_base_container(runtime, conf, distro)?;
            commit_container(runtime, conf, distro, true)?;
            run_shared_copy_container(runtime, conf, &shared_root)?;
        }
        state.register_container(&opts.box_name, &conf.distribution, &shared_root, profile, opts.force_own_orphans)?
    };

    start_container(runtime, conf, &shared_root, &args)?;
    if !wait_for_container(runtime, conf)? {
        return crate::err!(crate::runtime::RuntimeError::NonZeroExit(format!("'{}' stopped before it finished starting", conf.box_name), 1));
    }

    remove_distribution_scripts(conf, distro)?;
    runtime.container_restart(&conf.box_name)?;
    if !wait_for_container(runtime, conf)? {
        return crate::err!(crate::runtime::RuntimeError::NonZeroExit(format!("'{}' stopped before it finished restarting", conf.box_name), 1));
    }

    truncate_file(&conf.config_list)?;
    truncate_file(&conf.app_list)?;

    for (pkg, reassign) in &reassigned {
        let inputs = WrapperInputs { runtime, env, container: &opts.box_name, shared_root: if shared_root.is_empty() { None } else { Some(&shared_root) }, app_flags: &reassign.app_flags, quiet: opts.quiet };
        if let Some(list_tpl) = &distro.pkgmgr.list_files {
            let mut values = HashMap::new();
            values.insert("package", pkg.as_str());
            let list_cmd = crate::config::distro::expand_template(list_tpl, &values);
            if let Ok(output) = runtime.exec_output(&opts.box_name, &crate::pkg::bash_args(&list_cmd)) {
                if output.status.success() {
                    let files = wrapper::parse_file_list(&String::from_utf8_lossy(&output.stdout));
                    wrapper::create_wrappers(&inputs, &files, reassign.copy_type)?;
                }
            }
        }
    }

    if !apps_with_deps.is_empty() {
        let mut ctx = PkgContext { runtime, env, distro, conf, state, shared_root: &shared_root, quiet: opts.quiet };
        for (app, deps) in &apps_with_deps {
            let install_opts = InstallOptions { with_opt_deps: if deps.is_empty() { None } else { Some(deps.clone()) }, quiet: opts.quiet, ..Default::default() };
            install_package(&mut ctx, app, &install_opts)?;
        }
    }

    Ok(())
}

fn run_base_container(runtime: &Runtime, conf: &StaticConfiguration, distro: &Distro) -> Result<()> {
    let mut args = vec!["run".to_string(), "--rm".to_string(), format!("--name={}-base", conf.box_name)];
    args.push(format!("--label={}", label::BASE));
    args.push(format!("--label={}={}", label::DISTRIBUTION, conf.distribution));
    args.push(format!("--entrypoint={}/entrypoint-base.sh", conf.target_scripts_dir.display()));
    args.push(format!("-v={}:{}:ro", conf.scripts_dir.display(), conf.target_scripts_dir.display()));

    if let Some(link) = &conf.local_time_link {
        args.push(format!("-l={}", link.display()));
    }
    if let Some(tz) = &conf.timezone_text {
        args.push(format!("-z={tz}"));
    }

    args.push(distro.image.clone());
    let status = runtime.run(&args)?;
    if !status.success() {
        return crate::err!(crate::runtime::RuntimeError::NonZeroExit("run base container".into(), status.code().unwrap_or(1)));
    }
    Ok(())
}

fn commit_container(runtime: &Runtime, conf: &StaticConfiguration, _distro: &Distro, shared: bool) -> Result<()> {
    let target_image = if shared { conf.shared_box_image.clone() } else { conf.box_image.clone() };
    let name = format!("{}-base", conf.box_name);
    runtime.commit(&name, &target_image, &["USER=ybox", "WORKDIR=/home/ybox"])?;
    runtime.container_rm(&name, true).ok();
    Ok(())
}

/// Seeds `shared_root` on the host once per distribution by running a
/// throwaway container with the shared base image, matching the original's
/// `entrypoint-cp.sh` copy-out step.
fn run_shared_copy_container(runtime: &Runtime, conf: &StaticConfiguration, shared_root: &str) -> Result<()> {
    if std::path::Path::new(shared_root).exists() {
        let confirmed = utils::prompt::confirm(format!("Shared root directory '{shared_root}' already exists but its image is missing. Remove and rebuild it?"), false)?;
        if !confirmed {
            return crate::err!(crate::runtime::RuntimeError::NonZeroExit("shared root present without image".into(), 1));
        }
        std::fs::remove_dir_all(shared_root).generic()?;
    }
    std::fs::create_dir_all(shared_root).generic()?;

    let name = format!("{}-cp", conf.box_name);
    let args = vec![
        "run".to_string(),
        "--rm".to_string(),
        format!("--name={name}"),
        format!("--label={}", label::COPY),
        "--userns=keep-id".to_string(),
        "--user=0".to_string(),
        format!("-v={shared_root}:/mnt/shared-root"),
        format!("--entrypoint={}/entrypoint-cp.sh", conf.target_scripts_dir.display()),
        conf.shared_box_image.clone(),
    ];
    let status = runtime.run(&args)?;
    if !status.success() {
        return crate::err!(crate::runtime::RuntimeError::NonZeroExit("shared root copy".into(), status.code().unwrap_or(1)));
    }
    Ok(())
}

fn start_container(runtime: &Runtime, conf: &StaticConfiguration, shared_root: &str, run_args: &RunArgs) -> Result<()> {
    let image = if shared_root.is_empty() { conf.box_image.clone() } else { conf.shared_box_image.clone() };

    let mut args = vec!["run".to_string(), "-itd".to_string(), format!("--name={}", conf.box_name)];
    args.push(format!("--label={}", label::PRIMARY));
    args.push(format!("--label={}={}", label::DISTRIBUTION, conf.distribution));
    args.push(format!("-v={}:{}", conf.scripts_dir.display(), conf.target_scripts_dir.display()));
    args.push(format!("-v={}:{}/status", conf.status_file.display(), conf.target_scripts_dir.display()));
    if !shared_root.is_empty() {
        args.push(format!("-v={shared_root}:/"));
    }
    args.push(format!("--entrypoint={}/entrypoint.sh", conf.target_scripts_dir.display()));
    args.push("--userns=keep-id".to_string());
    args.push(format!("--user={}", unsafe { libc::getuid() }));
    args.extend(run_args.0.iter().cloned());
    args.push(image);

    if conf.config_list.is_file() {
        args.push("-c".to_string());
        args.push(format!("{}/config.list", conf.target_scripts_dir.display()));
        args.push("-d".to_string());
        args.push(conf.target_configs_dir.display().to_string());
    }
    if conf.app_list.is_file() {
        args.push("-a".to_string());
        args.push(format!("{}/app.list", conf.target_scripts_dir.display()));
    }
    args.push(conf.box_name.clone());

    let status = runtime.run(&args)?;
    if !status.success() {
        return crate::err!(crate::runtime::RuntimeError::NonZeroExit("start final container".into(), status.code().unwrap_or(1)));
    }
    Ok(())
}

/// Polls `conf.status_file` for a `started`/`stopped` line, up to 600
/// one-second iterations, bailing out early if the container dies.
/// Grounded on `create.py`'s `wait_for_container`, adopted here as well for
/// `control::start_container`'s readiness wait since the retrieved source
/// tree does not carry a definition for the `wait_for_ybox_container`
/// helper `control.py` imports (see DESIGN.md).
pub fn wait_for_container(runtime: &Runtime, conf: &StaticConfiguration) -> Result<bool> {
    for _ in 0 .. 600 {
        if let Ok(contents) = std::fs::read_to_string(&conf.status_file) {
            let trimmed = contents.trim();
            if trimmed == "started" {
                truncate_file(&conf.status_file)?;
                return Ok(true);
            }
            if trimmed == "stopped" {
                truncate_file(&conf.status_file)?;
                return Ok(false);
            }
        }

        if !runtime.container_running(&conf.box_name)? {
            return Ok(false);
        }

        thread::sleep(Duration::from_secs(1));
    }

    crate::err!(crate::runtime::RuntimeError::NonZeroExit(format!("timed out waiting for '{}' to start", conf.box_name), 1))
}

fn truncate_file(path: &std::path::Path) -> Result<()> {
    std::fs::write(path, "").generic()?;
    Ok(())
}

/// Copies the resource + distribution scripts into `conf.scripts_dir` with
/// `0o750` permissions, matching `create.py`'s `setup_ybox_scripts`.
fn setup_ybox_scripts(env: &Environment, conf: &StaticConfiguration, distro: &Distro) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for rel in ["resources/entrypoint-base.sh", "resources/entrypoint-cp.sh", "resources/entrypoint.sh"] {
        if let Ok(src) = env.search_config_path(rel, true) {
            let dest = conf.scripts_dir.join(std::path::Path::new(rel).file_name().unwrap());
            std::fs::copy(&src, &dest).generic()?;
            std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o750)).generic()?;
        }
    }

    for rel in &distro.scripts {
        let conf_path = format!("distros/{}/{rel}", conf.distribution);
        if let Ok(src) = env.search_config_path(&conf_path, true) {
            let dest = conf.scripts_dir.join(rel);
            std::fs::copy(&src, &dest).generic()?;
            std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o750)).generic()?;
        }
    }

    Ok(())
}

/// Removes the distribution-specific scripts copied into `conf.scripts_dir`
/// by [`setup_ybox_scripts`], leaving the common entrypoint scripts in
/// place. Run between the first readiness wait and the restart so the
/// restarted entrypoint doesn't re-run the one-time distribution setup
/// scripts. Mirrors `create.py`'s distribution-script cleanup step.
fn remove_distribution_scripts(conf: &StaticConfiguration, distro: &Distro) -> Result<()> {
    for rel in &distro.scripts {
        let path = conf.scripts_dir.join(rel);
        if path.is_file() {
            std::fs::remove_file(&path).generic()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_file_empties_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status");
        std::fs::write(&path, "started\n").unwrap();
        truncate_file(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
