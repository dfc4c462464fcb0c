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

//! The product-supplied distribution descriptor: base image, shared-root
//! directory list, and the package-manager/repo command templates (spec.md
//! §3, entity *Distribution Descriptor*).

use std::{collections::HashMap, path::Path};

use crate::{config::ini, env::Environment, Result};

/// `[pkgmgr]` command templates, one field per recognized placeholder-bearing
/// entry. Absent templates are `None`; callers treat a missing template as
/// "operation unsupported by this distribution".
#[derive(Debug, Clone, Default)]
pub struct PkgManager {
    pub install: Option<String>,
    pub check_avail: Option<String>,
    pub check_install: Option<String>,
    pub quiet_flag: Option<String>,
    pub quiet_details_flag: Option<String>,
    pub opt_deps: Option<String>,
    pub opt_dep_flag: Option<String>,
    pub uninstall: Option<String>,
    pub purge_flag: Option<String>,
    pub remove_deps_flag: Option<String>,
    pub orphans: Option<String>,
    pub update_meta: Option<String>,
    pub update: Option<String>,
    pub update_all: Option<String>,
    pub clean: Option<String>,
    pub clean_quiet: Option<String>,
    pub mark_explicit: Option<String>,
    pub info: Option<String>,
    pub info_all: Option<String>,
    pub list: Option<String>,
    pub list_all: Option<String>,
    pub list_long: Option<String>,
    pub list_all_long: Option<String>,
    pub list_files: Option<String>,
    pub search: Option<String>,
    pub search_all: Option<String>,
    pub search_official_flag: Option<String>,
    pub search_word_start_flag: Option<String>,
    pub search_word_end_flag: Option<String>,
    pub processes_pattern: Option<String>,
    pub locks_pattern: Option<String>,
    pub repair: Option<String>,
    pub repair_all: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RepoTemplates {
    pub exists: Option<String>,
    pub default_gpg_key_server: Option<String>,
    pub add_key: Option<String>,
    pub add_key_id: Option<String>,
    pub add: Option<String>,
    pub add_source: Option<String>,
    pub remove_key: Option<String>,
    pub remove: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Packages {
    pub required: Vec<String>,
    pub recommended: Vec<String>,
    pub suggested: Vec<String>,
    pub required_deps: Vec<String>,
    pub recommended_deps: Vec<String>,
    pub suggested_deps: Vec<String>,
    pub extra: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Distro {
    pub image: String,
    pub shared_root_dirs: Vec<String>,
    pub secondary_groups: Vec<String>,
    pub scripts: Vec<String>,
    pub configure_fastest_mirrors: bool,
    pub packages: Packages,
    pub pkgmgr: PkgManager,
    pub repo: RepoTemplates,
}

impl Distro {
    /// Load `distros/<name>/distro.ini` (or an overridden path) via the
    /// Environment's config search path.
    pub fn load(env: &Environment, distribution: &str, config_file: Option<&str>) -> Result<Self> {
        let rel = format!("distros/{distribution}/{}", config_file.unwrap_or("distro.ini"));
        let path = env.search_config_path(&rel, false)?;
        Self::load_from_path(env, &path)
    }

    pub fn load_from_path(env: &Environment, path: &Path) -> Result<Self> {
        let map = ini::load(path, env, &[])?;
        Ok(Self::from_map(&map))
    }

    fn from_map(map: &ini::IniMap) -> Self {
        let base = map.get("base").cloned().unwrap_or_default();
        let packages_sec = map.get("packages").cloned().unwrap_or_default();
        let pkgmgr_sec = map.get("pkgmgr").cloned().unwrap_or_default();
        let repo_sec = map.get("repo").cloned().unwrap_or_default();

        let csv = |s: Option<&String>| -> Vec<String> {
            s.map(|v| v.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()).unwrap_or_default()
        };

        Self {
            image: base.get("image").cloned().unwrap_or_default(),
            shared_root_dirs: csv(base.get("shared_root_dirs")),
            secondary_groups: csv(base.get("secondary_groups")),
            scripts: csv(base.get("scripts")),
            configure_fastest_mirrors: base.get("configure_fastest_mirrors").is_some_and(|v| v == "true"),
            packages: Packages {
                required: csv(packages_sec.get("required")),
                recommended: csv(packages_sec.get("recommended")),
                suggested: csv(packages_sec.get("suggested")),
                required_deps: csv(packages_sec.get("required_deps")),
                recommended_deps: csv(packages_sec.get("recommended_deps")),
                suggested_deps: csv(packages_sec.get("suggested_deps")),
                extra: csv(packages_sec.get("extra")),
            },
            pkgmgr: PkgManager {
                install: pkgmgr_sec.get("install").cloned(),
                check_avail: pkgmgr_sec.get("check_avail").cloned(),
                check_install: pkgmgr_sec.get("check_install").cloned(),
                quiet_flag: pkgmgr_sec.get("quiet_flag").cloned(),
                quiet_details_flag: pkgmgr_sec.get("quiet_details_flag").cloned(),
                opt_deps: pkgmgr_sec.get("opt_deps").cloned(),
                opt_dep_flag: pkgmgr_sec.get("opt_dep_flag").cloned(),
                uninstall: pkgmgr_sec.get("uninstall").cloned(),
                purge_flag: pkgmgr_sec.get("purge_flag").cloned(),
                remove_deps_flag: pkgmgr_sec.get("remove_deps_flag").cloned(),
                orphans: pkgmgr_sec.get("orphans").cloned(),
                update_meta: pkgmgr_sec.get("update_meta").cloned(),
                update: pkgmgr_sec.get("update").cloned(),
                update_all: pkgmgr_sec.get("update_all").cloned(),
                clean: pkgmgr_sec.get("clean").cloned(),
                clean_quiet: pkgmgr_sec.get("clean_quiet").cloned(),
                mark_explicit: pkgmgr_sec.get("mark_explicit").cloned(),
                info: pkgmgr_sec.get("info").cloned(),
                info_all: pkgmgr_sec.get("info_all").cloned(),
                list: pkgmgr_sec.get("list").cloned(),
                list_all: pkgmgr_sec.get("list_all").cloned(),
                list_long: pkgmgr_sec.get("list_long").cloned(),
                list_all_long: pkgmgr_sec.get("list_all_long").cloned(),
                list_files: pkgmgr_sec.get("list_files").cloned(),
                search: pkgmgr_sec.get("search").cloned(),
                search_all: pkgmgr_sec.get("search_all").cloned(),
                search_official_flag: pkgmgr_sec.get("search_official_flag").cloned(),
                search_word_start_flag: pkgmgr_sec.get("search_word_start_flag").cloned(),
                search_word_end_flag: pkgmgr_sec.get("search_word_end_flag").cloned(),
                processes_pattern: pkgmgr_sec.get("processes_pattern").cloned(),
                locks_pattern: pkgmgr_sec.get("locks_pattern").cloned(),
                repair: pkgmgr_sec.get("repair").cloned(),
                repair_all: pkgmgr_sec.get("repair_all").cloned(),
            },
            repo: RepoTemplates {
                exists: repo_sec.get("exists").cloned(),
                default_gpg_key_server: repo_sec.get("default_gpg_key_server").cloned(),
                add_key: repo_sec.get("add_key").cloned(),
                add_key_id: repo_sec.get("add_key_id").cloned(),
                add: repo_sec.get("add").cloned(),
                add_source: repo_sec.get("add_source").cloned(),
                remove_key: repo_sec.get("remove_key").cloned(),
                remove: repo_sec.get("remove").cloned(),
            },
        }
    }
}

/// The closed set of placeholder names a pkgmgr/repo command template may
/// reference (spec.md §3/§9). Anything else, even if identifier-shaped, is
/// left as literal text rather than blanked out.
pub const TEMPLATE_PLACEHOLDERS: &[&str] = &[
    "quiet",
    "packages",
    "opt_dep",
    "plain_separator",
    "name",
    "urls",
    "options",
    "key",
    "server",
    "remove_source",
    "search",
    "word_start",
    "word_end",
    "official",
    "package",
];

/// Substitute `{placeholder}` tokens in a pkgmgr/repo command template.
/// Only names in [`TEMPLATE_PLACEHOLDERS`] are recognized; everything else
/// -- including identifier-shaped but unenumerated names -- is left as
/// literal text (per spec.md §9). Recognized names absent from `values` are
/// substituted with an empty string.
pub fn expand_template(template: &str, values: &HashMap<&str, &str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }

        if let Some(end) = template[i ..].find('}') {
            let name = &template[i + 1 .. i + end];

            if TEMPLATE_PLACEHOLDERS.contains(&name) {
                out.push_str(values.get(name).copied().unwrap_or(""));

                for _ in 0 .. end {
                    chars.next();
                }

                continue;
            }
        }

        out.push(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_template_substitutes_known_placeholders() {
        let mut values = HashMap::new();
        values.insert("packages", "jq curl");
        values.insert("quiet", "-q");
        assert_eq!(expand_template("install {quiet} {packages}", &values), "install -q jq curl");
    }

    #[test]
    fn expand_template_leaves_unrecognized_braces_literal() {
        let values = HashMap::new();
        assert_eq!(expand_template("echo {not a placeholder}", &values), "echo {not a placeholder}");
    }

    #[test]
    fn expand_template_empties_unmapped_known_name() {
        let values = HashMap::new();
        assert_eq!(expand_template("{packages}", &values), "");
    }

    #[test]
    fn expand_template_leaves_unknown_identifier_shaped_name_literal() {
        let values = HashMap::new();
        assert_eq!(expand_template("echo {foo}", &values), "echo {foo}");
    }
}
