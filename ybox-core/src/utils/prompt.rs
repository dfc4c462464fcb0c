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

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::ErrorKind::{Interrupted, NotConnected},
};

use dialoguer::{theme::ColorfulTheme, Confirm, MultiSelect};

use crate::{err, impl_error, Error, ErrorGeneric, ErrorTrait, Result};

#[derive(Debug)]
pub enum PromptError {
    PromptInterrupted,
    PromptNotTerminal,
}

impl Display for PromptError {
    fn fmt(&self, fmter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::PromptInterrupted => write!(fmter, "Prompt was interrupted."),
            Self::PromptNotTerminal => write!(fmter, "Input is not a terminal."),
        }
    }
}

impl_error!(PromptError);

/// A yes/no confirmation, defaulting to `default` when the user hits enter.
pub fn confirm(message: impl Into<String>, default: bool) -> Result<bool> {
    match Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(message.into())
        .default(default)
        .interact()
    {
        Ok(value) => Ok(value),
        Err(err) => match err.kind() {
            Interrupted => crate::err!(PromptError::PromptInterrupted)?,
            NotConnected => crate::err!(PromptError::PromptNotTerminal)?,
            _ => Err(err).generic()?,
        },
    }
}

/// A starred multi-select used by the Package Coordinator's optional-dep
/// menu: `items` are `(label, default_checked)` pairs.
pub fn multi_select(message: impl Into<String>, items: &[(String, bool)]) -> Result<Vec<usize>> {
    let labels: Vec<&str> = items.iter().map(|(l, _)| l.as_str()).collect();
    let defaults: Vec<bool> = items.iter().map(|(_, d)| *d).collect();

    match MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt(message.into())
        .items(&labels)
        .defaults(&defaults)
        .interact()
    {
        Ok(selected) => Ok(selected),
        Err(err) => match err.kind() {
            Interrupted => err!(PromptError::PromptInterrupted)?,
            NotConnected => err!(PromptError::PromptNotTerminal)?,
            _ => Err(err).generic()?,
        },
    }
}
