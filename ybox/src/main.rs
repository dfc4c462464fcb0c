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

use clap::{Parser, Subcommand};

mod context;
mod control;
mod create;
mod destroy;
mod ls;
mod logs;

#[derive(Parser)]
#[command(name = "ybox", version, about = "Create and manage per-application podman/docker containers")]
struct Cli {
    /// Path to the podman/docker binary, overriding auto-detection.
    #[arg(short = 'd', long, global = true)]
    docker_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new container from a distribution and profile.
    Create {
        distribution: String,
        profile: String,
        #[arg(short = 'n', long)]
        name: Option<String>,
        #[arg(short = 'F', long)]
        force_own_orphans: bool,
        #[arg(short = 'C', long)]
        distribution_config: Option<String>,
        #[arg(short = 'q', long, action = clap::ArgAction::Count)]
        quiet: u8,
    },
    /// Destroy a container and forget its registered state.
    Destroy {
        container_name: String,
        #[arg(short = 'f', long)]
        force: bool,
    },
    /// Start a stopped container.
    Start { container_name: String },
    /// Stop a running container.
    Stop { container_name: String },
    /// Restart a container.
    Restart { container_name: String },
    /// Print whether a container is running.
    Status { container_name: String },
    /// List ybox-managed containers.
    Ls {
        #[arg(short = 'a', long)]
        all: bool,
    },
    /// Show (optionally follow) a container's logs.
    Logs {
        container_name: String,
        #[arg(short = 'f', long)]
        follow: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Create { distribution, profile, name, force_own_orphans, distribution_config, quiet } => {
            create::run(cli.docker_path.as_deref(), &distribution, &profile, name.as_deref(), distribution_config.as_deref(), force_own_orphans, quiet)
        }
        Command::Destroy { container_name, force } => destroy::run(cli.docker_path.as_deref(), &container_name, force),
        Command::Start { container_name } => control::start(cli.docker_path.as_deref(), &container_name),
        Command::Stop { container_name } => control::stop(cli.docker_path.as_deref(), &container_name),
        Command::Restart { container_name } => control::restart(cli.docker_path.as_deref(), &container_name),
        Command::Status { container_name } => control::status(cli.docker_path.as_deref(), &container_name),
        Command::Ls { all } => ls::run(cli.docker_path.as_deref(), all),
        Command::Logs { container_name, follow } => logs::run(cli.docker_path.as_deref(), &container_name, follow),
    };

    if let Err(error) = result {
        error.handle();
    }
}
