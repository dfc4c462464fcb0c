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

//! `ybox-pkg`: install/uninstall/search/... packages inside an existing
//! ybox container. Grounded on `ybox.run.pkg`.

use clap::{Parser, Subcommand};
use ybox_core::{
    config::{distro::Distro, StaticConfiguration},
    env::Environment,
    err,
    pkg::{
        clean::clean_cache,
        info::info_packages,
        install::{install_package, InstallOptions},
        list::{list_files, list_packages, ListOptions},
        mark::{mark_package, MarkAction},
        repair::{repair_package_state, RepairOptions},
        repo::{repo_add, repo_list, repo_remove, RepoAddOptions},
        search::{search_packages, SearchOptions},
        uninstall::{uninstall_package, UninstallOptions},
        update::{update_packages, UpdateOptions},
        PkgContext,
    },
    runtime::{Runtime, RuntimeError},
    state::StateStore,
    Result,
};

#[derive(Parser)]
#[command(name = "ybox-pkg", version, about = "Manage packages inside a ybox container")]
struct Cli {
    container_name: String,

    #[arg(short = 'd', long, global = true)]
    docker_path: Option<String>,

    #[arg(short = 'q', long, global = true, action = clap::ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Install { package: String, #[arg(long)] skip_opt_deps: bool },
    Uninstall { package: String, #[arg(long)] skip_deps: bool },
    Update { package: Option<String> },
    List { #[arg(long)] os_pkgs: bool, #[arg(long)] long: bool },
    ListFiles { package: String },
    Search { terms: Vec<String>, #[arg(long)] official_only: bool },
    Info { packages: Vec<String>, #[arg(long)] all: bool },
    Clean,
    Mark { package: String, #[arg(long)] dependency_of: Option<String> },
    Repair { #[arg(long)] extensive: bool, #[arg(long)] restart: bool },
    RepoAdd { name: String, urls: String, #[arg(long)] key_url: Option<String>, #[arg(long)] key_id: Option<String> },
    RepoRemove { name: String, #[arg(long)] force: bool },
    RepoList,
}

fn main() {
    let cli = Cli::parse();
    let result = run(&cli);
    if let Err(error) = result {
        error.handle();
    }
}

fn run(cli: &Cli) -> Result<()> {
    let env = Environment::capture()?;
    let runtime = Runtime::resolve(cli.docker_path.as_deref())?;
    let mut state = StateStore::open(&env)?;

    let Some(row) = state.get_container_configuration(&cli.container_name)? else {
        return err!(RuntimeError::NonZeroExit(format!("'{}' is not a registered ybox container", cli.container_name), 1));
    };

    let distro = Distro::load(&env, &row.distribution, None)?;
    let conf = StaticConfiguration::new(&env, &row.distribution, &cli.container_name);
    let mut ctx = PkgContext { runtime: &runtime, env: &env, distro: &distro, conf: &conf, state: &mut state, shared_root: &row.shared_root, quiet: cli.quiet };

    match &cli.command {
        Command::Install { package, skip_opt_deps } => {
            let opts = InstallOptions { skip_opt_deps: *skip_opt_deps, quiet: cli.quiet, ..Default::default() };
            install_package(&mut ctx, package, &opts)?;
        }
        Command::Uninstall { package, skip_deps } => {
            let opts = UninstallOptions { skip_deps: *skip_deps, quiet: cli.quiet };
            uninstall_package(&mut ctx, package, &opts)?;
        }
        Command::Update { package } => {
            let opts = UpdateOptions { quiet: cli.quiet };
            update_packages(&ctx, package.as_deref(), &opts)?;
        }
        Command::List { os_pkgs, long } => {
            let opts = ListOptions { os_pkgs: *os_pkgs, long: *long, quiet: cli.quiet };
            list_packages(&ctx, &opts)?;
        }
        Command::ListFiles { package } => {
            list_files(&ctx, package)?;
        }
        Command::Search { terms, official_only } => {
            let opts = SearchOptions { official_only: *official_only, quiet: cli.quiet, ..Default::default() };
            search_packages(&ctx, terms, &opts)?;
        }
        Command::Info { packages, all } => {
            info_packages(&ctx, packages, *all, cli.quiet)?;
        }
        Command::Clean => {
            clean_cache(&ctx, cli.quiet)?;
        }
        Command::Mark { package, dependency_of } => {
            let action = match dependency_of {
                Some(owner) => MarkAction::DependencyOf(owner),
                None => MarkAction::Explicit,
            };
            mark_package(&mut ctx, package, action)?;
        }
        Command::Repair { extensive, restart } => {
            let opts = RepairOptions { extensive: *extensive, restart: *restart, quiet: cli.quiet };
            repair_package_state(&ctx, &opts)?;
        }
        Command::RepoAdd { name, urls, key_url, key_id } => {
            let opts = RepoAddOptions { key_url: key_url.clone(), key_id: key_id.clone(), quiet: cli.quiet, ..Default::default() };
            repo_add(&mut ctx, name, urls, &opts)?;
        }
        Command::RepoRemove { name, force } => {
            repo_remove(&mut ctx, name, *force, cli.quiet)?;
        }
        Command::RepoList => {
            repo_list(&ctx)?;
        }
    }

    Ok(())
}
