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

//! Thin wrapper over the podman/docker CLI. Exactly the verbs enumerated in
//! spec §6 are used: `inspect`, `run`, `exec`, `commit`, `cp`, `image rm`,
//! `image prune`, `container ls|stop|start|rm|logs`.

use std::{
    ffi::OsStr,
    io::{IsTerminal, Read, Write},
    process::{Child, Command, ExitStatus, Output, Stdio},
};

use crate::{err, impl_error, Error, ErrorTrait, Result};

#[derive(Debug, Clone)]
pub enum RuntimeError {
    NotFound,
    NonZeroExit(String, i32),
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "no container runtime found (tried /usr/bin/podman, /usr/bin/docker)"),
            Self::NonZeroExit(cmd, code) => write!(f, "'{cmd}' exited with status {code}"),
        }
    }
}

impl ErrorTrait for RuntimeError {
    fn code(&self) -> i32 {
        match self {
            Self::NotFound => 1,
            Self::NonZeroExit(_, code) => *code,
        }
    }
}

impl_error!(RuntimeError);

/// A resolved podman/docker binary, invoked as a collection of subprocesses.
#[derive(Debug, Clone)]
pub struct Runtime {
    binary: String,
}

impl Runtime {
    /// Resolve the runtime binary: `override_path` if given, else
    /// `/usr/bin/podman`, falling back to `/usr/bin/docker`.
    pub fn resolve(override_path: Option<&str>) -> Result<Self> {
        if let Some(p) = override_path {
            return Ok(Self { binary: p.to_string() });
        }

        for candidate in ["/usr/bin/podman", "/usr/bin/docker"] {
            if std::path::Path::new(candidate).exists() {
                return Ok(Self { binary: candidate.to_string() });
            }
        }

        err!(RuntimeError::NotFound)?
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        cmd
    }

    fn run_captured<I, S>(&self, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.command(args).output().prepend_runtime(&self.binary)?;
        Ok(output)
    }

    fn run_checked<I, S>(&self, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.run_captured(args)?;
        if !output.status.success() {
            return err!(RuntimeError::NonZeroExit(self.binary.clone(), output.status.code().unwrap_or(1)))?;
        }
        Ok(output)
    }

    /// `<runtime> inspect <name>`: stdout (empty on failure, matching
    /// podman/docker's own behaviour of a non-zero exit for missing objects).
    pub fn inspect(&self, name: &str, format: Option<&str>) -> Result<Option<String>> {
        let mut args = vec!["inspect".to_string(), name.to_string()];
        if let Some(f) = format {
            args.push("--format".into());
            args.push(f.to_string());
        }

        let output = self.run_captured(args)?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).trim_end().to_string()))
    }

    pub fn container_exists(&self, name: &str) -> Result<bool> {
        Ok(self.inspect(name, Some("{{.Id}}"))?.is_some())
    }

    pub fn container_running(&self, name: &str) -> Result<bool> {
        match self.inspect(name, Some("{{.State.Running}}"))? {
            Some(s) => Ok(s == "true"),
            None => Ok(false),
        }
    }

    /// `<runtime> run <args...>`, waiting for completion and returning the
    /// exit status; stdout/stderr inherited so interactive sessions work.
    pub fn run(&self, args: &[String]) -> Result<ExitStatus> {
        let mut cmd = self.command(args);
        let status = cmd.status().prepend_runtime(&self.binary)?;
        Ok(status)
    }

    /// `<runtime> exec [-it] <name> <args...>`, streaming stdout a few bytes
    /// at a time so progress output (e.g. package manager bars) renders
    /// live, per spec §4.6 step 2. Returns the captured stdout and the
    /// process exit status.
    pub fn exec_streamed(&self, name: &str, args: &[String], interactive: bool) -> Result<(String, ExitStatus)> {
        let mut full_args = vec!["exec".to_string()];
        if interactive && std::io::stdout().is_terminal() {
            full_args.push("-it".into());
        }
        full_args.push(name.to_string());
        full_args.extend(args.iter().cloned());

        let mut child: Child = self
            .command(&full_args)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .prepend_runtime(&self.binary)?;

        let mut stdout = child.stdout.take().expect("piped stdout");
        let mut captured = String::new();
        let mut buf = [0u8; 4];
        let mut out = std::io::stdout();

        loop {
            let n = stdout.read(&mut buf).unwrap_or(0);
            if n == 0 {
                break;
            }
            let chunk = String::from_utf8_lossy(&buf[.. n]);
            captured.push_str(&chunk);
            let _ = out.write_all(chunk.as_bytes());
            let _ = out.flush();
        }

        let status = child.wait().prepend_runtime(&self.binary)?;
        Ok((captured, status))
    }

    /// `<runtime> exec <name> <args...>` without streaming; convenience for
    /// commands whose output is parsed rather than displayed.
    pub fn exec_output(&self, name: &str, args: &[String]) -> Result<Output> {
        let mut full_args = vec!["exec".to_string(), name.to_string()];
        full_args.extend(args.iter().cloned());
        self.run_captured(full_args)
    }

    pub fn commit(&self, container: &str, image: &str, changes: &[&str]) -> Result<()> {
        let mut args = vec!["commit".to_string()];
        for change in changes {
            args.push("--change".into());
            args.push(change.to_string());
        }
        args.push(container.to_string());
        args.push(image.to_string());
        self.run_checked(args)?;
        Ok(())
    }

    pub fn cp(&self, src: &str, dest: &str) -> Result<()> {
        self.run_checked(["cp", src, dest])?;
        Ok(())
    }

    pub fn image_exists(&self, image: &str) -> Result<bool> {
        Ok(self.inspect(image, Some("{{.Id}}"))?.is_some())
    }

    pub fn image_rm(&self, image: &str, force: bool) -> Result<()> {
        let mut args = vec!["image".to_string(), "rm".to_string()];
        if force {
            args.push("--force".into());
        }
        args.push(image.to_string());
        self.run_checked(args)?;
        Ok(())
    }

    pub fn image_prune(&self) -> Result<()> {
        self.run_checked(["image", "prune", "--force"])?;
        Ok(())
    }

    pub fn container_ls(&self, label_filter: Option<&str>, all: bool) -> Result<Vec<String>> {
        let mut args = vec!["container".to_string(), "ls".to_string(), "--format".to_string(), "{{.Names}}".to_string()];
        if all {
            args.push("--all".into());
        }
        if let Some(label) = label_filter {
            args.push("--filter".into());
            args.push(format!("label={label}"));
        }

        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect())
    }

    pub fn container_stop(&self, name: &str) -> Result<()> {
        self.run_checked(["container", "stop", name])?;
        Ok(())
    }

    pub fn container_start(&self, name: &str) -> Result<()> {
        self.run_checked(["container", "start", name])?;
        Ok(())
    }

    pub fn container_restart(&self, name: &str) -> Result<()> {
        self.run_checked(["container", "restart", name])?;
        Ok(())
    }

    pub fn container_rm(&self, name: &str, force: bool) -> Result<()> {
        let mut args = vec!["container".to_string(), "rm".to_string()];
        if force {
            args.push("--force".into());
        }
        args.push(name.to_string());
        self.run_checked(args)?;
        Ok(())
    }

    pub fn container_logs(&self, name: &str, follow: bool) -> Result<ExitStatus> {
        let mut args = vec!["container".to_string(), "logs".to_string()];
        if follow {
            args.push("-f".into());
        }
        args.push(name.to_string());
        let mut cmd = self.command(args);
        cmd.status().prepend_runtime(&self.binary)
    }
}

trait PrependRuntime<T> {
    fn prepend_runtime(self, binary: &str) -> Result<T>;
}

impl<T> PrependRuntime<T> for std::io::Result<T> {
    fn prepend_runtime(self, binary: &str) -> Result<T> {
        self.map_err(|e| Error::new(Box::new(std::io::Error::new(e.kind(), format!("running '{binary}': {e}")))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_explicit_override() {
        let rt = Runtime::resolve(Some("/usr/bin/true")).unwrap();
        assert_eq!(rt.binary(), "/usr/bin/true");
    }

    #[test]
    fn resolve_errors_when_nothing_found() {
        // Neither candidate path exists inside the sandbox used for tests,
        // and no override is given.
        if std::path::Path::new("/usr/bin/podman").exists() || std::path::Path::new("/usr/bin/docker").exists() {
            return;
        }
        assert!(Runtime::resolve(None).is_err());
    }
}
