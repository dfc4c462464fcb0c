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

//! `ybox-pkg mark`. Grounded on `ybox.pkg.mark`.
//!
//! The original marks a package "explicit" or "dependency-of" another;
//! resolving a bare name to its installed real package (`check_package`'s
//! second return value) has no surviving concrete definition anywhere in
//! the retrieved source, so this operates directly on the name given
//! rather than re-deriving that resolution step. See DESIGN.md.

use crate::{
    config::distro::expand_template,
    pkg::{bash_args, PkgContext},
    state::types::DependencyType,
    Result,
};

pub enum MarkAction<'a> {
    Explicit,
    DependencyOf(&'a str),
}

pub fn mark_package(ctx: &mut PkgContext, package: &str, action: MarkAction) -> Result<i32> {
    match action {
        MarkAction::DependencyOf(owner) => {
            ctx.state.register_dependency(&ctx.conf.box_name, owner, package, DependencyType::Optional)?;
            Ok(0)
        }
        MarkAction::Explicit => {
            ctx.state.unregister_dependency(&ctx.conf.box_name, ".*", package)?;

            let Some(mark_tpl) = &ctx.distro.pkgmgr.mark_explicit else { return Ok(0) };
            let values = std::collections::HashMap::new();
            let mark_cmd = expand_template(mark_tpl, &values);
            let shell_cmd = format!("{mark_cmd} {package}");
            let (_, status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&shell_cmd), true)?;
            Ok(status.code().unwrap_or(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_of_marks_with_named_owner() {
        match MarkAction::DependencyOf("vim") {
            MarkAction::DependencyOf(owner) => assert_eq!(owner, "vim"),
            MarkAction::Explicit => panic!("wrong variant"),
        }
    }
}
