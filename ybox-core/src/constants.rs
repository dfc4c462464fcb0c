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

use std::env::var;

use lazy_static::lazy_static;

pub const CONTAINER_LABEL_TYPE: &str = "io.ybox.container.type";
pub const CONTAINER_LABEL_DISTRIBUTION: &str = "io.ybox.container.distribution";
pub const STATUS_STARTED: &str = "started";
pub const STATUS_STOPPED: &str = "stopped";
pub const CREATE_READY_TIMEOUT_SECS: u64 = 600;
pub const STOP_READY_TIMEOUT_SECS: u64 = 60;
pub const READY_POLL_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_LOCK_POLL_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_LOCK_TIMEOUT_SECS: i64 = 300;

#[macro_export]
macro_rules! format_str {
    ( $( $x:expr ),+ ) => {
        format!($( $x, )+).leak()
    };
}

#[macro_export]
macro_rules! to_static_str {
    ( $x:expr ) => {
        $x.to_string().leak()
    };
}

lazy_static! {
    pub static ref VERBOSE: bool = var("YBOX_VERBOSE").is_ok_and(|v| v == "1");
    pub static ref TESTING: bool = var("YBOX_TESTING").is_ok();
    pub static ref PRODUCT_VERSION: &'static str = env!("CARGO_PKG_VERSION");
    pub static ref PAGER: &'static str = env_default("YBOX_PAGER", "less");
    pub static ref IS_COLOR_TERMINAL: bool = console::Term::stderr().features().colors_supported();
    pub static ref BOLD: &'static str = pick("\x1b[1m", "");
    pub static ref RESET: &'static str = pick("\x1b[0m", "");
    pub static ref DIM: &'static str = pick("\x1b[2m", "");
    pub static ref BOLD_RED: &'static str = pick("\x1b[1;31m", "");
    pub static ref BOLD_YELLOW: &'static str = pick("\x1b[1;33m", "");
    pub static ref BOLD_GREEN: &'static str = pick("\x1b[1;32m", "");
    pub static ref ARROW_GREEN: &'static str = pick("\x1b[1;32m=>\x1b[0m", "=>");
    pub static ref ARROW_CYAN: &'static str = pick("\x1b[1;36m=>\x1b[0m", "=>");
    pub static ref ARROW_RED: &'static str = pick("\x1b[1;31m=>\x1b[0m", "=>");
    pub static ref BAR_RED: &'static str = pick("\x1b[1;31m::\x1b[0m", "::");
    pub static ref BAR_CYAN: &'static str = pick("\x1b[1;36m::\x1b[0m", "::");
    pub static ref BAR_GREEN: &'static str = pick("\x1b[1;32m::\x1b[0m", "::");
}

fn env_default(env: &str, default: &'static str) -> &'static str {
    var(env).map_or_else(|_| default, |var| var.leak())
}

fn pick(colored: &'static str, plain: &'static str) -> &'static str {
    if *IS_COLOR_TERMINAL {
        colored
    } else {
        plain
    }
}
