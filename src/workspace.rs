// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git workspace access.
//!
//! The sync engine never touches Git directly. Instead it goes through the
//! [`Workspace`] trait, which covers the handful of queries and mutations the
//! engine needs: resolve branches, read blobs out of branch trees, read and
//! write working tree files, check out, commit, and push.
//!
//! # Reads Versus Writes
//!
//! [`Git2Workspace`] answers every read-only question through libgit2, because
//! that avoids parsing porcelain output. Every mutation of the repository is
//! handed to the Git binary itself in the repository root. This keeps
//! checkout, commit, and push behavior identical to what the user gets from
//! their own shell, including hooks, credential helpers, and signing
//! configuration.

mod probe;

pub use probe::{github_owner, IndicatifPrompter};

use crate::config::SyncSettings;

use git2::{BranchType, ErrorCode, ObjectType, Repository, StatusOptions};
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    collections::VecDeque,
    ffi::OsStr,
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};
use tracing::{debug, instrument};

/// Branch resolved to something that actually exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchRef {
    /// Local branch, e.g., `main`.
    Local(String),

    /// Remote-tracking branch, e.g., `origin/main`.
    Remote { remote: String, branch: String },
}

impl BranchRef {
    /// Name of branch without any remote prefix.
    pub fn branch(&self) -> &str {
        match self {
            Self::Local(branch) => branch,
            Self::Remote { branch, .. } => branch,
        }
    }

    fn branch_type(&self) -> BranchType {
        match self {
            Self::Local(_) => BranchType::Local,
            Self::Remote { .. } => BranchType::Remote,
        }
    }
}

impl Display for BranchRef {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Local(branch) => fmt.write_str(branch),
            Self::Remote { remote, branch } => write!(fmt, "{remote}/{branch}"),
        }
    }
}

/// Result of writing a file into the working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// File content replaced or created.
    Written,

    /// Parent directory does not exist on this branch, nothing written.
    MissingParent,
}

/// Layer of indirection for repository access.
#[allow(async_fn_in_trait)]
pub trait Workspace {
    /// Version string of Git binary used for mutations.
    fn git_version(&self) -> Result<String>;

    /// Name of currently checked out branch.
    fn current_branch(&self) -> Result<String>;

    /// Check if working tree has no modified, staged, or untracked files.
    fn is_clean(&self) -> Result<bool>;

    /// Check if branch exists locally.
    fn has_local_branch(&self, branch: &str) -> bool;

    /// Resolve branch locally first, then against the remote.
    fn resolve_branch(&self, branch: &str) -> Option<BranchRef>;

    /// List paths of every file tracked by branch.
    fn list_files(&self, reference: &BranchRef) -> Result<Vec<String>>;

    /// Read file content from branch tree, `None` if path is untracked there.
    fn read_blob(&self, reference: &BranchRef, path: &str) -> Result<Option<Vec<u8>>>;

    /// Write file content into working tree.
    fn write_work_file(&self, path: &str, contents: &[u8]) -> Result<WriteOutcome>;

    /// Check out existing local branch.
    fn checkout(&self, branch: &str) -> Result<()>;

    /// Create local branch tracking its remote counterpart and check it out.
    fn checkout_tracking(&self, branch: &str) -> Result<()>;

    /// Stage target paths and commit them to current branch.
    ///
    /// Returns `false` if staging left nothing to commit, e.g., because Git
    /// normalized line endings back into what the branch already holds.
    fn stage_and_commit(&self, paths: &[String], message: &str) -> Result<bool>;

    /// Throw away every uncommitted change, untracked files included.
    fn discard_changes(&self) -> Result<()>;

    /// Push branch to remote.
    fn push(&self, branch: &str) -> Result<()>;

    /// Check that remote is reachable with current credentials.
    ///
    /// Returns the identity the user is known by, if one can be determined.
    ///
    /// # Timeouts
    ///
    /// The timeout only bounds how long the caller waits. A credential prompt
    /// already shown to the user is not taken down when it fires, so answer
    /// or cancel it before the next prompt appears.
    async fn probe_remote(&self) -> Result<Option<String>>;
}

/// Workspace access through libgit2 and the Git binary.
pub struct Git2Workspace {
    repository: Repository,
    root: PathBuf,
    remote: String,
    probe_timeout: Duration,
}

impl Git2Workspace {
    /// Open repository containing target path.
    ///
    /// Target path may point anywhere inside the working tree. The remote and
    /// probe timeout start out as the stock [`SyncSettings`] values until
    /// [`Git2Workspace::with_remote`] says otherwise.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Git2`] if no repository can be found.
    /// - Return [`WorkspaceError::NoWorkTree`] if repository is bare.
    #[instrument(skip(path), level = "debug")]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        debug!("open repository at {:?}", path.as_ref().display());
        let repository = Repository::discover(path.as_ref())?;
        let root = repository
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| WorkspaceError::NoWorkTree(repository.path().to_path_buf()))?;

        let settings = SyncSettings::default();
        Ok(Self {
            repository,
            root,
            remote: settings.remote,
            probe_timeout: Duration::from_secs(settings.probe_timeout_secs),
        })
    }

    /// Publish through target remote, giving up on probing it after timeout.
    pub fn with_remote(mut self, remote: impl Into<String>, probe_timeout: Duration) -> Self {
        self.remote = remote.into();
        self.probe_timeout = probe_timeout;
        self
    }

    /// Absolute path to top-level of working tree.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Identity of the user pushing changes.
    ///
    /// Prefers `user.name` from Git configuration, and falls back to the owner
    /// segment of a GitHub remote URL.
    pub fn user_identity(&self) -> Option<String> {
        let from_config = self
            .repository
            .config()
            .ok()
            .and_then(|config| config.get_string("user.name").ok())
            .filter(|name| !name.trim().is_empty());
        if from_config.is_some() {
            return from_config;
        }

        let remote = self.repository.find_remote(&self.remote).ok()?;
        remote.url().and_then(github_owner).map(ToString::to_string)
    }

    fn git<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        syscall_non_interactive("git", args, &self.root)
    }

    fn tree_of(&self, reference: &BranchRef) -> Result<git2::Tree<'_>> {
        let branch = self
            .repository
            .find_branch(&reference.to_string(), reference.branch_type())?;
        Ok(branch.get().peel_to_tree()?)
    }
}

impl Workspace for Git2Workspace {
    fn git_version(&self) -> Result<String> {
        self.git(["--version"])
    }

    fn current_branch(&self) -> Result<String> {
        if self.repository.head_detached()? {
            return Err(WorkspaceError::DetachedHead);
        }

        let head = self.repository.head()?;
        head.shorthand()
            .map(ToString::to_string)
            .ok_or(WorkspaceError::DetachedHead)
    }

    fn is_clean(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        Ok(self.repository.statuses(Some(&mut opts))?.is_empty())
    }

    fn has_local_branch(&self, branch: &str) -> bool {
        self.repository.find_branch(branch, BranchType::Local).is_ok()
    }

    fn resolve_branch(&self, branch: &str) -> Option<BranchRef> {
        if self.has_local_branch(branch) {
            return Some(BranchRef::Local(branch.into()));
        }

        let remote_name = format!("{}/{branch}", self.remote);
        self.repository
            .find_branch(&remote_name, BranchType::Remote)
            .ok()
            .map(|_| BranchRef::Remote {
                remote: self.remote.clone(),
                branch: branch.into(),
            })
    }

    fn list_files(&self, reference: &BranchRef) -> Result<Vec<String>> {
        let mut entries = Vec::new();
        let mut trees_and_paths = VecDeque::new();
        trees_and_paths.push_front((self.tree_of(reference)?, String::new()));

        // Use DFS to traverse branch tree.
        while let Some((tree, prefix)) = trees_and_paths.pop_front() {
            for tree_entry in &tree {
                let Some(name) = tree_entry.name() else {
                    continue;
                };
                let path = if prefix.is_empty() {
                    name.to_string()
                } else {
                    format!("{prefix}/{name}")
                };

                match tree_entry.kind() {
                    Some(ObjectType::Tree) => {
                        let next_tree = self.repository.find_tree(tree_entry.id())?;
                        trees_and_paths.push_front((next_tree, path));
                    }
                    Some(ObjectType::Blob) => entries.push(path),
                    _ => continue,
                }
            }
        }

        entries.sort();
        Ok(entries)
    }

    fn read_blob(&self, reference: &BranchRef, path: &str) -> Result<Option<Vec<u8>>> {
        let tree = self.tree_of(reference)?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(error) if error.code() == ErrorCode::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        if entry.kind() != Some(ObjectType::Blob) {
            return Ok(None);
        }

        let blob = self.repository.find_blob(entry.id())?;
        Ok(Some(blob.content().to_vec()))
    }

    fn write_work_file(&self, path: &str, contents: &[u8]) -> Result<WriteOutcome> {
        let full_path = self.root.join(path);
        let has_parent = full_path.parent().is_some_and(Path::is_dir);
        if !has_parent {
            return Ok(WriteOutcome::MissingParent);
        }

        fs::write(full_path, contents)?;
        Ok(WriteOutcome::Written)
    }

    #[instrument(skip(self), level = "debug")]
    fn checkout(&self, branch: &str) -> Result<()> {
        self.git(["checkout", branch])?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn checkout_tracking(&self, branch: &str) -> Result<()> {
        self.git(["checkout", "--track", &format!("{}/{branch}", self.remote)])?;
        Ok(())
    }

    #[instrument(skip(self, message), level = "debug")]
    fn stage_and_commit(&self, paths: &[String], message: &str) -> Result<bool> {
        let mut add_args = vec!["add", "--"];
        add_args.extend(paths.iter().map(String::as_str));
        self.git(add_args)?;

        // INVARIANT: Exit status is zero only when the index matches HEAD.
        if self.git(["diff", "--cached", "--quiet"]).is_ok() {
            debug!("nothing staged after filters ran, skipping commit");
            return Ok(false);
        }

        self.git(["commit", "-m", message])?;
        Ok(true)
    }

    #[instrument(skip(self), level = "debug")]
    fn discard_changes(&self) -> Result<()> {
        self.git(["clean", "-fd"])?;
        self.git(["checkout", "--", "."])?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn push(&self, branch: &str) -> Result<()> {
        self.git(["push", self.remote.as_str(), branch])?;
        Ok(())
    }

    async fn probe_remote(&self) -> Result<Option<String>> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template("{spinner:.yellow} {msg}")?);
        bar.set_message(format!("contacting remote {:?}", self.remote));
        bar.enable_steady_tick(Duration::from_millis(100));

        let root = self.root.clone();
        let remote = self.remote.clone();
        let prompter = IndicatifPrompter::new(bar.clone());
        let task = tokio::task::spawn_blocking(move || probe::connect(&root, &remote, prompter));
        let outcome = tokio::time::timeout(self.probe_timeout, task).await;
        bar.finish_and_clear();

        match outcome {
            Err(_) => return Err(WorkspaceError::ProbeTimeout(self.probe_timeout)),
            Ok(joined) => joined??,
        }

        Ok(self.user_identity())
    }
}

fn syscall_non_interactive<I, S>(
    cmd: impl AsRef<OsStr>,
    args: I,
    cwd: impl AsRef<Path>,
) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().map(|arg| arg.as_ref().to_os_string()).collect();
    let command_line = std::iter::once(cmd.as_ref())
        .chain(args.iter().map(|arg| arg.as_os_str()))
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");

    debug!("run {command_line:?}");
    let output = Command::new(cmd.as_ref())
        .args(&args)
        .current_dir(cwd.as_ref())
        .output()
        .map_err(|source| WorkspaceError::Spawn {
            command: command_line.clone(),
            source,
        })?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

    if !output.status.success() {
        let mut message = String::new();
        if !stdout.trim().is_empty() {
            message.push_str(format!("stdout: {}\n", stdout.trim_end()).as_str());
        }

        if !stderr.trim().is_empty() {
            message.push_str(format!("stderr: {}\n", stderr.trim_end()).as_str());
        }

        return Err(WorkspaceError::Syscall {
            command: command_line,
            message: message.trim_end().to_string(),
        });
    }

    // INVARIANT: Chomp trailing newlines.
    Ok(stdout.trim_end().to_string())
}

/// Workspace error types.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Working tree file I/O fails.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// External command could not be started.
    #[error("failed to run {command:?}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// External command exited unsuccessfully.
    #[error("command {command:?} failed:\n{message}")]
    Syscall { command: String, message: String },

    /// Repository has no working tree to sync files into.
    #[error("repository {0:?} is bare")]
    NoWorkTree(PathBuf),

    /// HEAD does not point to a branch that can be restored afterwards.
    #[error("HEAD is detached, check out a branch first")]
    DetachedHead,

    /// Remote did not answer in time.
    #[error("remote did not respond within {0:?}")]
    ProbeTimeout(Duration),

    /// Blocking task running remote probe died.
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = WorkspaceError> = std::result::Result<T, E>;
