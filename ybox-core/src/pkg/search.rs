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

//! `ybox-pkg search`. Grounded on `ybox.pkg.search`.

use std::collections::HashMap;

use crate::{
    config::distro::expand_template,
    pkg::{bash_args, page_output, PkgContext},
    Result,
};

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub official_only: bool,
    pub word_start: bool,
    pub word_end: bool,
    pub quiet: u8,
    pub pager: Option<String>,
}

pub fn search_packages(ctx: &PkgContext, terms: &[String], opts: &SearchOptions) -> Result<i32> {
    let pkgmgr = &ctx.distro.pkgmgr;
    let template = if opts.official_only { pkgmgr.search_official_flag.as_deref().or(pkgmgr.search.as_deref()) } else { pkgmgr.search.as_deref() };
    let Some(template) = template else { return Ok(1) };

    let quiet_flag = if opts.quiet > 0 { pkgmgr.quiet_flag.as_deref().unwrap_or("") } else { "" };
    let word_start = if opts.word_start { pkgmgr.search_word_start_flag.as_deref().unwrap_or("") } else { "" };
    let word_end = if opts.word_end { pkgmgr.search_word_end_flag.as_deref().unwrap_or("") } else { "" };

    let mut values = HashMap::new();
    values.insert("quiet", quiet_flag);
    values.insert("word_start", word_start);
    values.insert("word_end", word_end);
    let cmd = expand_template(template, &values);

    let quoted_terms: Vec<String> = terms.iter().map(|t| format!("'{}'", t.replace('\'', "'\\''"))).collect();
    let shell_cmd = format!("{cmd} {}", quoted_terms.join(" "));

    let output = ctx.runtime.exec_output(&ctx.conf.box_name, &bash_args(&shell_cmd))?;
    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    let pager = opts.pager.as_deref().unwrap_or(&ctx.conf.pager);
    page_output(&text, pager)?;
    Ok(output.status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_options_default_has_no_qualifiers() {
        let opts = SearchOptions::default();
        assert!(!opts.official_only);
        assert!(!opts.word_start);
        assert!(!opts.word_end);
    }
}
