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

//! Transactional SQLite-backed store tracking which container owns which
//! package, shared-root "tombstone" reassignment on container destruction,
//! and registered repositories. Mirrors the original Python state manager's
//! semantics closely enough that the on-disk schema and SQL shapes are the
//! same; see `schema/init.sql`.

pub mod migration;
pub mod types;

use std::{collections::HashMap, fs, path::PathBuf};

use rusqlite::{functions::FunctionFlags, params, Connection, OptionalExtension};
use semver::Version;

pub use types::{CopyType, DependencyType, ReassignedPackage, RuntimeConfiguration, Repository};

use crate::{
    config::{profile, Profile},
    constants::PRODUCT_VERSION,
    env::Environment,
    err, error, impl_error,
    utils::print_warning,
    Error, ErrorGeneric, ErrorTrait, Result,
};

#[derive(Debug)]
pub enum StateError {
    Sql(String),
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sql(msg) => write!(f, "state store error: {msg}"),
        }
    }
}

impl_error!(StateError);

trait Sql<T> {
    fn sql(self) -> Result<T>;
}

impl<T> Sql<T> for rusqlite::Result<T> {
    fn sql(self) -> Result<T> {
        self.map_err(|e| error!(StateError::Sql(e.to_string())))
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(inner, _) if inner.code == rusqlite::ErrorCode::ConstraintViolation)
}

/// Handle on the per-user SQLite database at `<data_dir>/state.db`.
///
/// All mutating operations run inside an implicit `BEGIN EXCLUSIVE`/`COMMIT`
/// unless an explicit transaction (see [`StateStore::begin_transaction`]) is
/// already open, in which case they participate in it instead.
pub struct StateStore {
    conn: Connection,
    explicit_transaction: bool,
    product_version: Version,
    migrate_dir: PathBuf,
}

impl StateStore {
    pub fn open(env: &Environment) -> Result<Self> {
        fs::create_dir_all(env.data_dir()).prepend_io(|| env.data_dir().display().to_string())?;

        let db_path = env.data_dir().join("state.db");
        let conn = Connection::open(&db_path).map_err(|e| error!(StateError::Sql(e.to_string())))?;
        register_functions(&conn)?;

        let product_version = Version::parse(*PRODUCT_VERSION).unwrap_or_else(|_| Version::new(0, 1, 0));
        let migrate_dir =
            env.search_config_path("schema/migrate", true).unwrap_or_else(|_| PathBuf::from("/usr/share/ybox/schema/migrate"));

        let mut store = Self { conn, explicit_transaction: false, product_version, migrate_dir };
        store.init_schema()?;
        Ok(store)
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1", params![name], |r| r.get(0))
            .optional()
            .sql()?;
        Ok(found.is_some())
    }

    fn init_schema(&mut self) -> Result<()> {
        self.begin_internal()?;

        let result = (|| -> Result<()> {
            if !self.table_exists("containers")? {
                let init_sql = include_str!("../../schema/init.sql");
                self.conn.execute_batch(init_sql).sql()?;
                self.conn
                    .execute("INSERT INTO schema (version) VALUES (?1)", params![self.product_version.to_string()])
                    .sql()?;
                return Ok(());
            }

            let old_version = if self.table_exists("schema")? {
                let stored: Option<String> =
                    self.conn.query_row("SELECT version FROM schema", [], |r| r.get(0)).optional().sql()?;
                stored.and_then(|v| Version::parse(&v).ok()).unwrap_or_else(|| Version::new(0, 0, 0))
            } else {
                Version::new(0, 0, 0)
            };

            if old_version != self.product_version {
                let scripts = migration::filter_and_sort_migrations(&self.migrate_dir, &old_version, &self.product_version)?;
                for script in &scripts {
                    let sql = migration::read_sql_script(script)?;
                    self.conn.execute_batch(&sql).sql()?;
                }

                if self.table_exists("schema")? {
                    self.conn
                        .execute("UPDATE schema SET version = ?1", params![self.product_version.to_string()])
                        .sql()?;
                } else {
                    self.conn
                        .execute("CREATE TABLE schema (version TEXT NOT NULL)", [])
                        .sql()?;
                    self.conn
                        .execute("INSERT INTO schema (version) VALUES (?1)", params![self.product_version.to_string()])
                        .sql()?;
                }
            }

            Ok(())
        })();

        match result {
            Ok(()) => self.internal_commit(),
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    fn begin_internal(&mut self) -> Result<()> {
        if !self.explicit_transaction {
            self.conn.execute_batch("BEGIN EXCLUSIVE TRANSACTION").sql()?;
        }
        Ok(())
    }

    fn internal_commit(&mut self) -> Result<()> {
        if !self.explicit_transaction {
            self.conn.execute_batch("COMMIT").sql()?;
        }
        Ok(())
    }

    /// Run `f` inside a transaction, rolling back on error unless an explicit
    /// transaction (opened via [`StateStore::begin_transaction`]) is already
    /// in progress, in which case the caller owns the rollback decision.
    fn in_txn<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.begin_internal()?;
        match f(self) {
            Ok(v) => {
                self.internal_commit()?;
                Ok(v)
            }
            Err(e) => {
                if !self.explicit_transaction {
                    let _ = self.conn.execute_batch("ROLLBACK");
                }
                Err(e)
            }
        }
    }

    /// Open an explicit transaction spanning multiple calls. Until
    /// [`StateStore::commit`] or [`StateStore::rollback`], every other
    /// method call participates in it instead of its own implicit one.
    pub fn begin_transaction(&mut self) -> Result<()> {
        if !self.explicit_transaction {
            self.conn.execute_batch("BEGIN EXCLUSIVE TRANSACTION").sql()?;
            self.explicit_transaction = true;
        }
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT").sql()?;
        self.explicit_transaction = false;
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK").sql()?;
        self.explicit_transaction = false;
        Ok(())
    }

    fn clean_destroyed_containers(&mut self) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM containers AS dc WHERE destroyed AND NOT EXISTS (SELECT 1 FROM packages p WHERE dc.name = p.container)",
                [],
            )
            .sql()?;
        Ok(())
    }

    /// Remove `name`'s row. If it still owns packages, tombstone it (for a
    /// shared root) or drop its packages outright (standalone), returning
    /// whether a row existed at all.
    fn unregister_container_internal(&mut self, name: &str) -> Result<bool> {
        let row: Option<(String, String, String)> = {
            let mut stmt = self
                .conn
                .prepare("DELETE FROM containers WHERE name = ?1 RETURNING distribution, shared_root, configuration")
                .sql()?;
            stmt.query_row(params![name], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?))).optional().sql()?
        };

        let has_packages: bool = self
            .conn
            .query_row("SELECT 1 FROM packages WHERE container = ?1 LIMIT 1", params![name], |_| Ok(true))
            .optional()
            .sql()?
            .unwrap_or(false);

        if !has_packages {
            return Ok(row.is_some());
        }

        let (distribution, shared_root, configuration) = row.clone().unwrap_or_default();
        let local_copies;

        if !shared_root.is_empty() {
            let mut tombstone = uuid::Uuid::new_v4().to_string();

            loop {
                let res = self.conn.execute(
                    "INSERT INTO containers (name, distribution, shared_root, configuration, destroyed) VALUES (?1, ?2, ?3, ?4, true)",
                    params![tombstone, distribution, shared_root, configuration],
                );

                match res {
                    Ok(_) => break,
                    Err(e) if is_constraint_violation(&e) => {
                        tombstone = uuid::Uuid::new_v4().to_string();
                    }
                    Err(e) => return Err(e).sql(),
                }
            }

            let copies: Vec<String> = {
                let mut stmt = self.conn.prepare("SELECT local_copies FROM packages WHERE container = ?1").sql()?;
                let rows = stmt.query_map(params![name], |r| r.get::<_, String>(0)).sql()?;
                rows.collect::<rusqlite::Result<Vec<String>>>().sql()?
            };
            local_copies = extract_local_copies(&copies);

            // Packages also owned by some other live container under the
            // same name are duplicates; drop them rather than reassigning.
            let dup_names: Vec<String> = {
                let mut stmt = self
                    .conn
                    .prepare(
                        "DELETE FROM packages AS pkgs WHERE container = ?1 AND EXISTS \
                         (SELECT 1 FROM packages AS p WHERE p.name = pkgs.name GROUP BY p.name HAVING COUNT(*) > 1) \
                         RETURNING name",
                    )
                    .sql()?;
                let rows = stmt.query_map(params![name], |r| r.get::<_, String>(0)).sql()?;
                rows.collect::<rusqlite::Result<Vec<String>>>().sql()?
            };
            for dup in &dup_names {
                self.conn.execute("DELETE FROM package_deps WHERE name = ?1 AND container = ?2", params![dup, name]).sql()?;
            }

            let updated = self
                .conn
                .execute("UPDATE packages SET container = ?1, local_copies = '[]' WHERE container = ?2", params![tombstone, name])
                .sql()?;

            if updated > 0 {
                self.conn.execute("UPDATE package_deps SET container = ?1 WHERE container = ?2", params![tombstone, name]).sql()?;
            } else {
                self.conn.execute("DELETE FROM containers WHERE name = ?1", params![tombstone]).sql()?;
            }
        } else {
            let copies: Vec<String> = {
                let mut stmt = self.conn.prepare("DELETE FROM packages WHERE container = ?1 RETURNING local_copies").sql()?;
                let rows = stmt.query_map(params![name], |r| r.get::<_, String>(0)).sql()?;
                rows.collect::<rusqlite::Result<Vec<String>>>().sql()?
            };
            local_copies = extract_local_copies(&copies);
            self.conn.execute("DELETE FROM package_deps WHERE container = ?1", params![name]).sql()?;
        }

        remove_local_copies(&local_copies);
        Ok(row.is_some())
    }

    pub fn unregister_container(&mut self, name: &str) -> Result<bool> {
        self.in_txn(|me| me.unregister_container_internal(name))
    }

    /// Register a freshly-created container, first clearing out any stale
    /// row under the same name. If `shared_root` is set, destroyed
    /// containers with an equivalent (or, with `force_own_orphans`, any)
    /// configuration under the same shared root have their packages and
    /// dependencies reassigned to `name`; the reassigned packages are
    /// returned so the caller can recreate their wrappers.
    pub fn register_container(
        &mut self, name: &str, distribution: &str, shared_root: &str, profile: &Profile, force_own_orphans: bool,
    ) -> Result<HashMap<String, ReassignedPackage>> {
        let configuration = profile.to_ini_string();

        self.in_txn(|me| {
            me.unregister_container_internal(name)?;
            me.conn
                .execute(
                    "INSERT INTO containers (name, distribution, shared_root, configuration, destroyed) VALUES (?1, ?2, ?3, ?4, false)",
                    params![name, distribution, shared_root, configuration],
                )
                .sql()?;

            let mut reassigned = HashMap::new();

            if shared_root.is_empty() {
                return Ok(reassigned);
            }

            let equiv: Vec<String> = {
                let mut stmt = me
                    .conn
                    .prepare(
                        "SELECT name FROM containers WHERE destroyed AND shared_root = ?1 AND (?2 OR EQUIV_CONFIG(configuration, ?3))",
                    )
                    .sql()?;
                let rows = stmt.query_map(params![shared_root, force_own_orphans, configuration], |r| r.get::<_, String>(0)).sql()?;
                rows.collect::<rusqlite::Result<Vec<String>>>().sql()?
            };

            if equiv.is_empty() {
                return Ok(reassigned);
            }

            let placeholders = equiv.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let mut binds: Vec<String> = vec![name.to_string()];
            binds.extend(equiv.iter().cloned());
            let refs: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|s| s as &dyn rusqlite::ToSql).collect();

            {
                let sql = format!("UPDATE packages SET container = ? WHERE container IN ({placeholders}) RETURNING name, local_copy_type, flags");
                let mut stmt = me.conn.prepare(&sql).sql()?;
                let rows = stmt
                    .query_map(refs.as_slice(), |r| {
                        let pkg: String = r.get(0)?;
                        let copy_type: i64 = r.get(1)?;
                        let flags: String = r.get(2)?;
                        Ok((pkg, copy_type, flags))
                    })
                    .sql()?;

                for row in rows {
                    let (pkg, copy_type, flags) = row.sql()?;
                    let app_flags: HashMap<String, String> = serde_json::from_str(&flags).unwrap_or_default();
                    reassigned.insert(pkg, ReassignedPackage { copy_type: CopyType::from_bits_truncate(copy_type), app_flags });
                }
            }

            {
                let sql = format!("UPDATE package_deps SET container = ? WHERE container IN ({placeholders})");
                me.conn.execute(&sql, refs.as_slice()).sql()?;
            }

            {
                let del_placeholders = equiv.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
                let sql = format!("DELETE FROM containers WHERE name IN ({del_placeholders})");
                me.conn.execute(&sql, rusqlite::params_from_iter(equiv.iter())).sql()?;
            }

            Ok(reassigned)
        })
    }

    pub fn get_container_configuration(&self, name: &str) -> Result<Option<RuntimeConfiguration>> {
        let mut stmt = self.conn.prepare("SELECT distribution, shared_root, configuration FROM containers WHERE name = ?1").sql()?;
        stmt.query_row(params![name], |r| {
            Ok(RuntimeConfiguration { name: name.to_string(), distribution: r.get(0)?, shared_root: r.get(1)?, ini_config: r.get(2)? })
        })
        .optional()
        .sql()
    }

    pub fn get_containers(
        &self, name: Option<&str>, distribution: Option<&str>, shared_root: Option<&str>, include_destroyed: bool,
    ) -> Result<Vec<String>> {
        let mut predicates = vec![if include_destroyed { "1 = 1".to_string() } else { "NOT destroyed".to_string() }];
        let mut binds: Vec<String> = Vec::new();

        if let Some(n) = name {
            predicates.push("name = ?".into());
            binds.push(n.to_string());
        }
        if let Some(d) = distribution {
            predicates.push("distribution = ?".into());
            binds.push(d.to_string());
        }
        if let Some(s) = shared_root {
            predicates.push("shared_root = ?".into());
            binds.push(s.to_string());
        }

        let sql = format!("SELECT name FROM containers WHERE {} ORDER BY name ASC", predicates.join(" AND "));
        let refs: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        let mut stmt = self.conn.prepare(&sql).sql()?;
        let rows = stmt.query_map(refs.as_slice(), |r| r.get::<_, String>(0)).sql()?;
        rows.collect::<rusqlite::Result<Vec<String>>>().sql()
    }

    pub fn get_other_shared_containers(&self, container: &str, shared_root: &str) -> Result<Vec<String>> {
        if shared_root.is_empty() {
            return Ok(vec![]);
        }
        let mut containers = self.get_containers(None, None, Some(shared_root), false)?;
        containers.retain(|c| c != container);
        Ok(containers)
    }

    /// Group live containers by their coordinate (shared root, or own name
    /// when standalone), returning `(member names, shared_root, distribution)`
    /// per group.
    pub fn get_containers_grouped_by_shared_root(&self, names: &[String]) -> Result<Vec<(Vec<String>, String, String)>> {
        let (filter, binds): (String, Vec<String>) = if names.is_empty() {
            (String::new(), vec![])
        } else {
            let placeholders = names.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            (format!("name IN ({placeholders}) AND "), names.to_vec())
        };

        let sql = format!(
            "SELECT GROUP_CONCAT(name, ','), shared_root, MIN(distribution) FROM containers \
             WHERE {filter}NOT destroyed \
             GROUP BY CASE WHEN length(shared_root) = 0 THEN name ELSE shared_root END"
        );

        let refs: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        let mut stmt = self.conn.prepare(&sql).sql()?;
        let rows = stmt
            .query_map(refs.as_slice(), |r| {
                let names: String = r.get(0)?;
                let shared_root: String = r.get(1)?;
                let distribution: String = r.get(2)?;
                Ok((names, shared_root, distribution))
            })
            .sql()?;

        let mut out = Vec::new();
        for row in rows {
            let (names_csv, shared_root, distribution) = row.sql()?;
            out.push((names_csv.split(',').map(|s| s.to_string()).collect(), shared_root, distribution));
        }
        Ok(out)
    }

    fn register_dependency_internal(&mut self, container: &str, name: &str, dependency: &str, dep_type: DependencyType) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO package_deps (name, container, dependency, dep_type) VALUES (?1, ?2, ?3, ?4)",
                params![name, container, dependency, dep_type.as_str()],
            )
            .sql()?;
        Ok(())
    }

    pub fn register_dependency(&mut self, container: &str, name: &str, dependency: &str, dep_type: DependencyType) -> Result<()> {
        self.in_txn(|me| me.register_dependency_internal(container, name, dependency, dep_type))
    }

    /// Register (or overwrite) a package owned by `container`. If
    /// `dep_of` is set, also records that `dep_of` depends on `name`
    /// with kind `dep_type`. When `shared_root` is non-empty, any
    /// destroyed tombstones under it that owned `name` are swept away
    /// first (a freshly-installed package supersedes an orphaned one).
    #[allow(clippy::too_many_arguments)]
    pub fn register_package(
        &mut self, container: &str, name: &str, local_copies: &[String], copy_type: CopyType, app_flags: &HashMap<String, String>,
        shared_root: &str, dep: Option<(DependencyType, &str)>, skip_if_exists: bool,
    ) -> Result<()> {
        self.in_txn(|me| {
            if !shared_root.is_empty() {
                let removed: Vec<String> = {
                    let mut stmt = me
                        .conn
                        .prepare(
                            "DELETE FROM packages WHERE name = ?1 AND EXISTS \
                             (SELECT 1 FROM containers dc WHERE dc.destroyed AND dc.shared_root = ?2 AND packages.container = dc.name) \
                             RETURNING container",
                        )
                        .sql()?;
                    let rows = stmt.query_map(params![name, shared_root], |r| r.get::<_, String>(0)).sql()?;
                    rows.collect::<rusqlite::Result<Vec<String>>>().sql()?
                };

                for c in &removed {
                    me.conn.execute("DELETE FROM package_deps WHERE name = ?1 AND container = ?2", params![name, c]).sql()?;
                }
                if !removed.is_empty() {
                    me.clean_destroyed_containers()?;
                }
            }

            let local_copies_json = serde_json::to_string(local_copies).unwrap_or_else(|_| "[]".into());
            let flags_json = serde_json::to_string(app_flags).unwrap_or_else(|_| "{}".into());
            let verb = if skip_if_exists { "INSERT OR IGNORE INTO" } else { "INSERT OR REPLACE INTO" };
            me.conn
                .execute(
                    &format!("{verb} packages (name, container, local_copies, local_copy_type, flags) VALUES (?1, ?2, ?3, ?4, ?5)"),
                    params![name, container, local_copies_json, copy_type.bits(), flags_json],
                )
                .sql()?;

            if let Some((dep_type, dep_of)) = dep {
                me.register_dependency_internal(container, dep_of, name, dep_type)?;
            }

            Ok(())
        })
    }

    /// Unregister `package` from `container` (or, for a shared root, from
    /// every container sharing it), returning dependencies that are now
    /// orphaned — referenced by no remaining package — keyed by name.
    pub fn unregister_package(&mut self, container: &str, package: &str, shared_root: &str) -> Result<HashMap<String, DependencyType>> {
        self.in_txn(|me| {
            let mut orphans = HashMap::new();

            let dep_rows: Vec<(String, String)> = if !shared_root.is_empty() {
                let mut stmt = me
                    .conn
                    .prepare(
                        "SELECT dependency, dep_type FROM package_deps p \
                         WHERE name = ?1 AND EXISTS (SELECT 1 FROM containers c WHERE c.shared_root = ?2 AND p.container = c.name) \
                         AND NOT EXISTS ( \
                             SELECT 1 FROM package_deps d INNER JOIN containers c ON (d.container = c.name AND d.name <> ?3) \
                             WHERE c.shared_root = ?4 AND p.dependency = d.dependency \
                         )",
                    )
                    .sql()?;
                let rows = stmt
                    .query_map(params![package, shared_root, package, shared_root], |r| Ok((r.get(0)?, r.get(1)?)))
                    .sql()?;
                rows.collect::<rusqlite::Result<Vec<(String, String)>>>().sql()?
            } else {
                let mut stmt = me
                    .conn
                    .prepare(
                        "SELECT dependency, dep_type FROM package_deps p \
                         WHERE name = ?1 AND container = ?2 \
                         AND NOT EXISTS (SELECT 1 FROM package_deps d WHERE d.name <> ?3 AND d.container = ?4 AND p.dependency = d.dependency)",
                    )
                    .sql()?;
                let rows = stmt.query_map(params![package, container, package, container], |r| Ok((r.get(0)?, r.get(1)?))).sql()?;
                rows.collect::<rusqlite::Result<Vec<(String, String)>>>().sql()?
            };

            for (dep, dt) in dep_rows {
                if let Ok(dtype) = dt.parse::<DependencyType>() {
                    orphans.insert(dep, dtype);
                }
            }

            let local_copies = if !shared_root.is_empty() {
                let copies: Vec<String> = {
                    let mut stmt = me
                        .conn
                        .prepare(
                            "DELETE FROM packages AS p WHERE name = ?1 AND EXISTS \
                             (SELECT 1 FROM containers c WHERE c.shared_root = ?2 AND p.container = c.name) \
                             RETURNING local_copies",
                        )
                        .sql()?;
                    let rows = stmt.query_map(params![package, shared_root], |r| r.get::<_, String>(0)).sql()?;
                    rows.collect::<rusqlite::Result<Vec<String>>>().sql()?
                };

                me.conn
                    .execute(
                        "DELETE FROM package_deps AS p WHERE (name = ?1 OR dependency = ?2) AND EXISTS \
                         (SELECT 1 FROM containers c WHERE c.shared_root = ?3 AND p.container = c.name)",
                        params![package, package, shared_root],
                    )
                    .sql()?;
                me.clean_destroyed_containers()?;

                extract_local_copies(&copies)
            } else {
                let copies: Vec<String> = {
                    let mut stmt = me.conn.prepare("DELETE FROM packages WHERE name = ?1 AND container = ?2 RETURNING local_copies").sql()?;
                    let rows = stmt.query_map(params![package, container], |r| r.get::<_, String>(0)).sql()?;
                    rows.collect::<rusqlite::Result<Vec<String>>>().sql()?
                };

                me.conn
                    .execute("DELETE FROM package_deps WHERE (name = ?1 OR dependency = ?2) AND container = ?3", params![package, package, container])
                    .sql()?;

                extract_local_copies(&copies)
            };

            remove_local_copies(&local_copies);
            Ok(orphans)
        })
    }

    pub fn unregister_dependency(&mut self, container: &str, name_pattern: &str, dependency: &str) -> Result<bool> {
        self.in_txn(|me| {
            let n = me
                .conn
                .execute(
                    "DELETE FROM package_deps WHERE dependency = ?1 AND container = ?2 AND name LIKE ?3",
                    params![dependency, container, name_pattern],
                )
                .sql()?;
            Ok(n > 0)
        })
    }

    /// Package names matching `name_regex`, scoped either to `container` or,
    /// for packages possibly owned by another container on the same shared
    /// root, to `shared_root`; filtered by dependency status: `".*"` for all,
    /// `""` for packages that are not a dependency of anything, or a regex
    /// matched against the dependency kind of packages that are.
    pub fn get_packages(
        &self, container: Option<&str>, shared_root: Option<&str>, name_regex: &str, dep_type_regex: &str,
    ) -> Result<Vec<String>> {
        let mut predicate = String::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(c) = container {
            predicate.push_str("container = ? AND ");
            binds.push(c.to_string());
        } else if let Some(s) = shared_root {
            predicate.push_str("EXISTS (SELECT 1 FROM containers c WHERE c.shared_root = ? AND packages.container = c.name) AND ");
            binds.push(s.to_string());
        }
        if name_regex != ".*" {
            predicate.push_str("REGEXP(name, ?) AND ");
            binds.push(name_regex.to_string());
        }

        if dep_type_regex == ".*" {
            predicate.push_str("1 = 1");
        } else if dep_type_regex.is_empty() {
            predicate.push_str("NOT EXISTS (SELECT 1 FROM package_deps WHERE packages.container = container AND packages.name = dependency)");
        } else {
            predicate.push_str(
                "EXISTS (SELECT 1 FROM package_deps WHERE REGEXP(dep_type, ?) AND packages.container = container AND packages.name = dependency)",
            );
            binds.push(dep_type_regex.to_string());
        }

        let sql = format!("SELECT DISTINCT name FROM packages WHERE {predicate} ORDER BY name ASC");
        let refs: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        let mut stmt = self.conn.prepare(&sql).sql()?;
        let rows = stmt.query_map(refs.as_slice(), |r| r.get::<_, String>(0)).sql()?;
        rows.collect::<rusqlite::Result<Vec<String>>>().sql()
    }

    pub fn check_packages(&self, container: &str, names: &[String]) -> Result<Vec<String>> {
        if names.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = names.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("SELECT name FROM packages WHERE container = ? AND name IN ({placeholders})");
        let mut binds: Vec<String> = vec![container.to_string()];
        binds.extend(names.iter().cloned());
        let refs: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        let mut stmt = self.conn.prepare(&sql).sql()?;
        let rows = stmt.query_map(refs.as_slice(), |r| r.get::<_, String>(0)).sql()?;
        rows.collect::<rusqlite::Result<Vec<String>>>().sql()
    }

    pub fn register_repository(
        &mut self, name: &str, scope: &str, urls: &str, key: &str, options: &str, with_source_repo: bool, update: bool,
    ) -> Result<bool> {
        self.in_txn(|me| {
            let verb = if update { "INSERT OR REPLACE INTO" } else { "INSERT INTO" };
            let res = me.conn.execute(
                &format!("{verb} package_repos (name, container_or_shared_root, urls, key, options, with_source_repo) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![name, scope, urls, key, options, with_source_repo],
            );

            match res {
                Ok(_) => Ok(true),
                Err(e) if is_constraint_violation(&e) => Ok(false),
                Err(e) => Err(e).sql(),
            }
        })
    }

    pub fn unregister_repository(&mut self, name: &str, scope: &str) -> Result<Option<(String, bool)>> {
        self.in_txn(|me| {
            let mut stmt = me
                .conn
                .prepare("DELETE FROM package_repos WHERE name = ?1 AND container_or_shared_root = ?2 RETURNING key, with_source_repo")
                .sql()?;
            stmt.query_row(params![name, scope], |r| Ok((r.get(0)?, r.get(1)?))).optional().sql()
        })
    }

    pub fn get_repositories(&self, scope: &str) -> Result<Vec<Repository>> {
        if scope.is_empty() {
            return Ok(vec![]);
        }
        let mut stmt = self
            .conn
            .prepare("SELECT name, urls, key, options, with_source_repo FROM package_repos WHERE container_or_shared_root = ?1 ORDER BY name ASC")
            .sql()?;
        let rows = stmt
            .query_map(params![scope], |r| {
                Ok(Repository { name: r.get(0)?, urls: r.get(1)?, key: r.get(2)?, options: r.get(3)?, with_source_repo: r.get(4)? })
            })
            .sql()?;
        rows.collect::<rusqlite::Result<Vec<Repository>>>().sql()
    }
}

fn extract_local_copies(rows: &[String]) -> Vec<String> {
    rows.iter()
        .filter(|s| !s.is_empty())
        .flat_map(|s| serde_json::from_str::<Vec<String>>(s).unwrap_or_default())
        .filter(|s| !s.is_empty())
        .collect()
}

fn remove_local_copies(paths: &[String]) {
    for p in paths {
        if fs::remove_file(p).is_ok() {
            print_warning(&format!("removed dangling local copy {p}"));
        }
    }
}

fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function("REGEXP", 2, FunctionFlags::SQLITE_DETERMINISTIC | FunctionFlags::SQLITE_UTF8, |ctx| {
        let value: String = ctx.get(0)?;
        let pattern: String = ctx.get(1)?;
        let re = regex::Regex::new(&format!("^(?:{pattern})$")).map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
        Ok(re.is_match(&value) as i64)
    })
    .sql()?;

    conn.create_scalar_function("JSON_FROM_CSV", 1, FunctionFlags::SQLITE_DETERMINISTIC | FunctionFlags::SQLITE_UTF8, |ctx| {
        let csv: String = ctx.get(0)?;
        let parts: Vec<&str> = if csv.is_empty() { vec![] } else { csv.split(',').collect() };
        Ok(serde_json::to_string(&parts).unwrap_or_else(|_| "[]".into()))
    })
    .sql()?;

    conn.create_scalar_function("EQUIV_CONFIG", 2, FunctionFlags::SQLITE_DETERMINISTIC | FunctionFlags::SQLITE_UTF8, |ctx| {
        let c1: String = ctx.get(0)?;
        let c2: String = ctx.get(1)?;
        Ok(profile::equiv_config(&c1, &c2) as i64)
    })
    .sql()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;

    fn test_env(dir: &std::path::Path) -> Environment {
        std::env::set_var("HOME", dir);
        std::env::set_var("XDG_DATA_HOME", dir.join("data"));
        std::env::remove_var("YBOX_TARGET_HOME");
        Environment::capture().unwrap()
    }

    #[test]
    fn fresh_store_creates_schema_and_accepts_container() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let mut store = StateStore::open(&env).unwrap();
        let sections = indexmap::IndexMap::new();
        let profile = crate::config::Profile::from_map(sections);
        let reassigned = store.register_container("box1", "debian", "", &profile, false).unwrap();
        assert!(reassigned.is_empty());
        assert_eq!(store.get_containers(None, None, None, false).unwrap(), vec!["box1".to_string()]);
    }

    #[test]
    fn unregister_standalone_container_without_packages_removes_row() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let mut store = StateStore::open(&env).unwrap();
        let profile = crate::config::Profile::from_map(indexmap::IndexMap::new());
        store.register_container("box1", "debian", "", &profile, false).unwrap();
        assert!(store.unregister_container("box1").unwrap());
        assert!(store.get_containers(None, None, None, false).unwrap().is_empty());
    }

    #[test]
    fn register_and_unregister_package_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let mut store = StateStore::open(&env).unwrap();
        let profile = crate::config::Profile::from_map(indexmap::IndexMap::new());
        store.register_container("box1", "debian", "", &profile, false).unwrap();
        store
            .register_package("box1", "vim", &[], CopyType::empty(), &HashMap::new(), "", None, false)
            .unwrap();
        assert_eq!(store.get_packages(Some("box1"), None, ".*", ".*").unwrap(), vec!["vim".to_string()]);
        let orphans = store.unregister_package("box1", "vim", "").unwrap();
        assert!(orphans.is_empty());
        assert!(store.get_packages(Some("box1"), None, ".*", ".*").unwrap().is_empty());
    }

    #[test]
    fn shared_root_destroy_then_create_reassigns_packages() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let mut store = StateStore::open(&env).unwrap();
        let profile = crate::config::Profile::from_map(indexmap::IndexMap::new());
        store.register_container("box1", "debian", "shared1", &profile, false).unwrap();
        store
            .register_package("box1", "vim", &[], CopyType::empty(), &HashMap::new(), "shared1", None, false)
            .unwrap();
        store.unregister_container("box1").unwrap();

        let reassigned = store.register_container("box2", "debian", "shared1", &profile, false).unwrap();
        assert!(reassigned.contains_key("vim"));
        assert_eq!(store.get_packages(Some("box2"), None, ".*", ".*").unwrap(), vec!["vim".to_string()]);
    }

    #[test]
    fn register_repository_rejects_duplicate_unless_update() {
        let dir = tempfile::tempdir().unwrap();
        let env = test_env(dir.path());
        let mut store = StateStore::open(&env).unwrap();
        assert!(store.register_repository("extra", "box1", "https://example.com", "", "", false, false).unwrap());
        assert!(!store.register_repository("extra", "box1", "https://example.com/2", "", "", false, false).unwrap());
        assert!(store.register_repository("extra", "box1", "https://example.com/2", "", "", false, true).unwrap());
        let repos = store.get_repositories("box1").unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].urls, "https://example.com/2");
    }
}
