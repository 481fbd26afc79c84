// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the __sync definition__, the configuration file that
//! tells branch-sync which branch to read fixed files from, which branches to
//! write them to, and which files count as fixed. File I/O beyond a plain
//! read is left to the caller.
//!
//! # General Layout
//!
//! A sync definition is composed of three tables: settings, branches, and
//! files. Every field has a default, so an empty file is a valid definition
//! that reproduces the stock lesson repository layout.
//!
//! ```toml
//! [settings]
//! source = "main"
//! remote = "origin"
//! probe_timeout_secs = 15
//!
//! [branches]
//! targets = ["01-setup", "02-components-jsx"]
//!
//! [files]
//! include = [".gitignore", "package.json", "maintenance/*"]
//! ```

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Component, Path},
    str::FromStr,
    time::Duration,
};

/// Lesson branches that receive fixed files by default.
pub const DEFAULT_TARGET_BRANCHES: &[&str] = &[
    "01-setup",
    "02-components-jsx",
    "03-basic-hooks-state",
    "04-events",
    "05-controlled-form",
    "06-project-organization",
    "07-data-fetching",
    "08-optimization-hooks",
    "09-advanced-state",
    "10-react-router",
    "11-deployment-security",
    "deploy",
    "deploy-vercel",
    "local-dev-vite-proxy",
];

/// Tooling and configuration files kept identical across branches by default.
pub const DEFAULT_FIXED_FILES: &[&str] = &[
    ".gitignore",
    ".prettierignore",
    ".prettierrc",
    "eslint.config.js",
    "vite.config.js",
    "package.json",
    ".env.example",
    "README.md",
    "vercel.json",
    "maintenance/*",
];

const DEFAULT_COMMIT_BODY: &str = "Automated sync of tooling configuration, documentation, and \
                                   environment examples across lesson branches.";

/// Sync definition layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncDefinition {
    /// General settings for the sync run.
    pub settings: SyncSettings,

    /// Branches to write fixed files to.
    pub branches: BranchSettings,

    /// Files to treat as fixed.
    pub files: FileSettings,
}

impl SyncDefinition {
    /// Load sync definition from file at target path.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Io`] if file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file is not valid TOML.
    /// - Return any validation error from [`SyncDefinition::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_to_string(path.as_ref())
            .map_err(|source| ConfigError::Io {
                path: path.as_ref().display().to_string(),
                source,
            })?
            .parse()
    }

    /// Commit message to use for every synced branch.
    pub fn commit_message(&self) -> String {
        match &self.settings.commit_message {
            Some(message) => message.clone(),
            None => format!(
                "chore: sync fixed files from {}\n\n{DEFAULT_COMMIT_BODY}",
                self.settings.source
            ),
        }
    }

    /// Maximum amount of time to wait on the remote probe.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.probe_timeout_secs)
    }

    /// Split include listing into literal paths and glob patterns.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Pattern`] if a glob pattern is malformed.
    pub fn file_specs(&self) -> Result<Vec<FileSpec>> {
        self.files.include.iter().map(|entry| FileSpec::parse(entry)).collect()
    }

    /// Check definition for contradictions.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoTargets`] if target listing is empty.
    /// - Return [`ConfigError::DuplicateTarget`] if a target is listed twice.
    /// - Return [`ConfigError::SourceIsTarget`] if source is also a target.
    /// - Return [`ConfigError::NoFiles`] if include listing is empty.
    /// - Return [`ConfigError::UnsafePath`] if an include escapes the repository.
    /// - Return [`ConfigError::Pattern`] if a glob pattern is malformed.
    pub fn validate(&self) -> Result<()> {
        if self.branches.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        let mut seen = HashSet::new();
        for target in &self.branches.targets {
            if target == &self.settings.source {
                return Err(ConfigError::SourceIsTarget(target.clone()));
            }

            if !seen.insert(target.as_str()) {
                return Err(ConfigError::DuplicateTarget(target.clone()));
            }
        }

        if self.files.include.is_empty() {
            return Err(ConfigError::NoFiles);
        }

        for entry in &self.files.include {
            let path = Path::new(entry);
            if path.is_absolute()
                || path
                    .components()
                    .any(|component| matches!(component, Component::ParentDir))
            {
                return Err(ConfigError::UnsafePath(entry.clone()));
            }
        }

        self.file_specs()?;

        Ok(())
    }
}

impl FromStr for SyncDefinition {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let definition: SyncDefinition =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Never hand out a definition that fails validation.
        definition.validate()?;

        Ok(definition)
    }
}

impl Display for SyncDefinition {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// General sync settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Branch to read fixed files from.
    pub source: String,

    /// Remote to resolve missing branches against and push to.
    pub remote: String,

    /// Seconds to wait on the remote probe before giving up.
    pub probe_timeout_secs: u64,

    /// Override for the commit message of each synced branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            source: "main".into(),
            remote: "origin".into(),
            probe_timeout_secs: 15,
            commit_message: None,
        }
    }
}

/// Target branch listing.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BranchSettings {
    /// Branches to write fixed files to, in order.
    pub targets: Vec<String>,
}

impl Default for BranchSettings {
    fn default() -> Self {
        Self {
            targets: DEFAULT_TARGET_BRANCHES.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Fixed file listing.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileSettings {
    /// Paths or glob patterns relative to repository root.
    pub include: Vec<String>,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            include: DEFAULT_FIXED_FILES.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Single entry of the include listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSpec {
    /// Exact path relative to repository root.
    Literal(String),

    /// Glob pattern matched against tracked files of the source branch.
    Pattern(Pattern),
}

impl FileSpec {
    /// Classify include entry.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Pattern`] if entry looks like a malformed glob.
    pub fn parse(entry: &str) -> Result<Self> {
        if entry.contains(['*', '?', '[']) {
            let pattern = Pattern::new(entry).map_err(|source| ConfigError::Pattern {
                entry: entry.into(),
                source,
            })?;
            Ok(Self::Pattern(pattern))
        } else {
            Ok(Self::Literal(entry.into()))
        }
    }

    /// Check if tracked path is covered by this entry.
    ///
    /// Wildcards never cross directory separators, and hidden files only match
    /// when the pattern spells out the leading dot.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Literal(literal) => literal == path,
            Self::Pattern(pattern) => pattern.matches_with(
                path,
                glob::MatchOptions {
                    case_sensitive: true,
                    require_literal_separator: true,
                    require_literal_leading_dot: true,
                },
            ),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read sync definition {path:?}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Include entry is not a valid glob pattern.
    #[error("invalid include pattern {entry:?}")]
    Pattern {
        entry: String,
        #[source]
        source: glob::PatternError,
    },

    /// No target branches listed.
    #[error("no target branches listed")]
    NoTargets,

    /// Target branch listed more than once.
    #[error("target branch {0:?} listed more than once")]
    DuplicateTarget(String),

    /// Source branch listed as a target.
    #[error("source branch {0:?} cannot also be a target")]
    SourceIsTarget(String),

    /// No fixed files listed.
    #[error("no fixed files listed")]
    NoFiles,

    /// Include entry is absolute or climbs out of repository root.
    #[error("include entry {0:?} must be relative to repository root")]
    UnsafePath(String),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
