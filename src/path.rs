// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where the repository to operate on lives, and which sync
//! definition file to load for it.

use std::path::{Path, PathBuf};

/// Name of repository-local sync definition file.
pub const REPO_CONFIG_FILE: &str = "branch-sync.toml";

/// Perform shell expansion on user supplied path.
///
/// Expands leading tilde and environment variables.
///
/// # Errors
///
/// - Return [`PathError::ShellExpansion`] if an environment variable is unset.
pub fn expand_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let raw = path.as_ref().to_string_lossy();
    Ok(PathBuf::from(shellexpand::full(raw.as_ref())?.into_owned()))
}

/// Determine default absolute path to user-wide sync definition.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/branch-sync/config.toml`.
/// Does not check if the path returned actually exists.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|path| path.join("branch-sync").join("config.toml"))
}

/// Select sync definition file to load.
///
/// An explicit path always wins and must exist. Otherwise the repository-local
/// file is tried, then the user-wide file. Returns `None` if no file was
/// found, meaning built-in defaults apply.
///
/// # Errors
///
/// - Return [`PathError::ShellExpansion`] if explicit path fails to expand.
/// - Return [`PathError::MissingConfig`] if explicit path does not exist.
pub fn resolve_config_path(
    explicit: Option<&Path>,
    repo_root: impl AsRef<Path>,
) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        let path = expand_path(path)?;
        if !path.is_file() {
            return Err(PathError::MissingConfig(path));
        }

        return Ok(Some(path));
    }

    let local = repo_root.as_ref().join(REPO_CONFIG_FILE);
    if local.is_file() {
        return Ok(Some(local));
    }

    Ok(default_config_path().filter(|path| path.is_file()))
}

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Shell expansion of user supplied path failed.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Explicitly requested sync definition does not exist.
    #[error("sync definition {0:?} does not exist")]
    MissingConfig(PathBuf),
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
