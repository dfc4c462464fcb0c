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

//! `ybox-pkg repo-add` / `repo-remove` / `repo-list`. Grounded on
//! `ybox.pkg.repo`.

use std::collections::HashMap;

use comfy_table::{presets::UTF8_FULL, Table};
use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    config::distro::expand_template,
    pkg::{bash_args, page_output, PkgContext},
    state::types::Repository,
    Result,
};

lazy_static! {
    static ref KEYID_RE: Regex = Regex::new(r"(?i)\bKEYID[:=]\s*([0-9A-F]+)\b").unwrap();
}

#[derive(Debug, Clone, Default)]
pub struct RepoAddOptions {
    pub key_url: Option<String>,
    pub key_id: Option<String>,
    pub key_server: Option<String>,
    pub with_source_repo: bool,
    pub update: bool,
    pub quiet: u8,
}

/// Scope a repository registration/lookup: either a single container or a
/// shared root used as the coordinate across the containers built from it.
pub fn scope_of(ctx: &PkgContext) -> &str {
    if ctx.shared_root.is_empty() {
        &ctx.conf.box_name
    } else {
        ctx.shared_root
    }
}

pub fn repo_add(ctx: &mut PkgContext, name: &str, urls: &str, opts: &RepoAddOptions) -> Result<i32> {
    let scope = scope_of(ctx).to_string();
    let repo = &ctx.distro.repo;

    let key = resolve_key(ctx, opts)?;
    let options = String::new();

    let registered = ctx.state.register_repository(name, &scope, urls, &key, &options, opts.with_source_repo, opts.update)?;
    if !registered {
        crate::utils::print_warning(&format!("repository '{name}' is already registered"));
        return Ok(1);
    }

    let result = (|| -> Result<i32> {
        if let Some(add_key_tpl) = &key_template(repo, opts) {
            if !key.is_empty() {
                let mut values = HashMap::new();
                values.insert("key", key.as_str());
                let cmd = expand_template(add_key_tpl, &values);
                let (_, status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&cmd), false)?;
                if !status.success() {
                    return Ok(status.code().unwrap_or(1));
                }
            }
        }

        if let Some(add_tpl) = &repo.add {
            let mut values = HashMap::new();
            values.insert("name", name);
            values.insert("urls", urls);
            let cmd = expand_template(add_tpl, &values);
            let (_, status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&cmd), false)?;
            if !status.success() {
                return Ok(status.code().unwrap_or(1));
            }
        }

        if opts.with_source_repo {
            if let Some(add_source_tpl) = &repo.add_source {
                let mut values = HashMap::new();
                values.insert("name", name);
                values.insert("urls", urls);
                let cmd = expand_template(add_source_tpl, &values);
                ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&cmd), false)?;
            }
        }

        refresh_package_metadata(ctx, opts.quiet)
    })();

    match result {
        Ok(0) => Ok(0),
        Ok(code) => {
            ctx.state.unregister_repository(name, &scope)?;
            Ok(code)
        }
        Err(e) => {
            ctx.state.unregister_repository(name, &scope)?;
            Err(e)
        }
    }
}

fn key_template<'a>(repo: &'a crate::config::distro::RepoTemplates, opts: &RepoAddOptions) -> Option<&'a String> {
    if opts.key_id.is_some() {
        repo.add_key_id.as_ref()
    } else {
        repo.add_key.as_ref()
    }
}

/// Resolve the GPG key: either fetch by URL (scanning streamed output for a
/// `KEYID:` marker) or pass through a directly-given key ID.
fn resolve_key(ctx: &PkgContext, opts: &RepoAddOptions) -> Result<String> {
    if let Some(key_id) = &opts.key_id {
        return Ok(key_id.clone());
    }
    let Some(url) = &opts.key_url else { return Ok(String::new()) };

    let server = opts.key_server.as_deref().or(ctx.distro.repo.default_gpg_key_server.as_deref()).unwrap_or("");
    let shell_cmd = format!("gpg --fetch-keys '{url}' --keyserver '{server}' 2>&1");
    let (captured, _status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&shell_cmd), false)?;

    Ok(KEYID_RE.captures(&captured).map(|c| c[1].to_string()).unwrap_or_default())
}

pub fn repo_remove(ctx: &mut PkgContext, name: &str, force: bool, quiet: u8) -> Result<i32> {
    let scope = scope_of(ctx).to_string();
    let repo = &ctx.distro.repo;

    let removed = ctx.state.unregister_repository(name, &scope)?;
    let Some((key, _with_source)) = removed else {
        if force {
            return Ok(0);
        }
        crate::utils::print_warning(&format!("repository '{name}' is not registered"));
        return Ok(1);
    };

    if !key.is_empty() {
        if let Some(remove_key_tpl) = &repo.remove_key {
            let mut values = HashMap::new();
            values.insert("key", key.as_str());
            let cmd = expand_template(remove_key_tpl, &values);
            let (_, status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&cmd), false)?;
            if !status.success() && !force {
                return Ok(status.code().unwrap_or(1));
            }
        }
    }

    if let Some(remove_tpl) = &repo.remove {
        let mut values = HashMap::new();
        values.insert("name", name);
        let cmd = expand_template(remove_tpl, &values);
        let (_, status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&cmd), false)?;
        if !status.success() && !force {
            return Ok(status.code().unwrap_or(1));
        }
    }

    let code = refresh_package_metadata(ctx, quiet)?;
    if code != 0 && !force {
        return Ok(code);
    }
    Ok(0)
}

fn refresh_package_metadata(ctx: &PkgContext, quiet: u8) -> Result<i32> {
    let Some(template) = &ctx.distro.pkgmgr.update_meta else { return Ok(0) };
    let quiet_flag = if quiet > 0 { ctx.distro.pkgmgr.quiet_flag.as_deref().unwrap_or("") } else { "" };
    let mut values = HashMap::new();
    values.insert("quiet", quiet_flag);
    let cmd = expand_template(template, &values);
    let (_, status) = ctx.runtime.exec_streamed(&ctx.conf.box_name, &bash_args(&cmd), false)?;
    Ok(status.code().unwrap_or(1))
}

pub fn repo_list(ctx: &PkgContext) -> Result<i32> {
    let scope = scope_of(ctx).to_string();
    let repos = ctx.state.get_repositories(&scope)?;

    let text = format_repo_table(&repos);
    page_output(&text, &ctx.conf.pager)?;
    Ok(0)
}

fn format_repo_table(repos: &[Repository]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["name", "urls", "key", "source repo"]);
    for r in repos {
        table.add_row(vec![r.name.as_str(), r.urls.as_str(), r.key.as_str(), if r.with_source_repo { "yes" } else { "no" }]);
    }
    format!("{table}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyid_regex_extracts_hex_id_case_insensitively() {
        let text = "gpg: key imported\nKEYID: 0ABC123F\n";
        let caps = KEYID_RE.captures(text).unwrap();
        assert_eq!(&caps[1], "0ABC123F");
    }

    #[test]
    fn format_repo_table_includes_repo_name() {
        let repos = vec![Repository { name: "extra".into(), urls: "https://example.org".into(), key: String::new(), options: String::new(), with_source_repo: false }];
        let text = format_repo_table(&repos);
        assert!(text.contains("extra"));
    }
}
