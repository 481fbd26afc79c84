// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Fixed file synchronization.
//!
//! A lesson repository is made of one __source branch__ and a set of
//! __target branches__. Every target is its own lesson, so application code
//! differs wildly between them, but tooling and configuration files, the
//! __fixed files__, are meant to stay identical everywhere. The [`Syncer`]
//! copies the fixed files from the source branch into each target branch and
//! commits the result.
//!
//! # Sync Flow
//!
//! 1. __Preflight__: Git is available, the working tree is clean, HEAD is on
//!    a branch, and every configured branch actually exists.
//! 2. __Probe__: the remote is reachable with current credentials. Failing
//!    this only warns.
//! 3. __Collect__: read fixed files out of the source branch tree.
//! 4. __Apply__: one target at a time, check it out, rewrite files that
//!    differ, commit, and return to the original branch. A failure on one
//!    target never stops the others.
//! 5. __Publish__: push every target that received a commit, unless running
//!    in local mode.
//!
//! # Dry Runs
//!
//! A dry run never checks out, writes, commits, or pushes. Changes are
//! computed by comparing blobs of the target branch tree directly. The file
//! writer refuses to run at all in dry-run mode.

mod prompt;
mod report;

#[cfg(test)]
mod fake;

pub use prompt::{AssumeYes, Confirm, InquireConfirm};
pub use report::{BranchOutcome, BranchResult, PushReport, SyncReport};

use crate::{
    config::{FileSpec, SyncDefinition},
    workspace::{BranchRef, Workspace, WriteOutcome},
};

use indicatif::ProgressBar;
use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result as FmtResult},
};
use tracing::{debug, error, info, instrument, warn};

const UNPUBLISHED_WARNING: &str = "Local sync completed. GitHub is not updated until branches \
                                   are published.\nPush manually or re-run without --local flag.";

/// User selected behavior flags.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Compute changes without touching anything.
    pub dry_run: bool,

    /// Commit locally, but never contact the remote.
    pub local: bool,

    /// Proceed even if working tree is dirty.
    pub force: bool,

    /// Answer yes to confirmation prompts.
    pub assume_yes: bool,
}

impl SyncOptions {
    /// Effective mode of operation.
    ///
    /// Dry run takes precedence over local mode.
    pub fn mode(&self) -> Mode {
        if self.dry_run {
            Mode::DryRun
        } else if self.local {
            Mode::Local
        } else {
            Mode::Push
        }
    }
}

/// Mode of operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Report changes only.
    DryRun,

    /// Commit changes without pushing.
    Local,

    /// Commit and push changes.
    #[default]
    Push,
}

impl Display for Mode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::DryRun => fmt.write_str("dry-run"),
            Self::Local => fmt.write_str("local-only"),
            Self::Push => fmt.write_str("default (push enabled)"),
        }
    }
}

/// Fixed file read from source branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to repository root.
    pub path: String,

    /// Exact content in source branch.
    pub contents: Vec<u8>,
}

/// Fixed file synchronizer.
pub struct Syncer<W>
where
    W: Workspace,
{
    workspace: W,
    definition: SyncDefinition,
    options: SyncOptions,
    progress: ProgressBar,
}

impl<W> Syncer<W>
where
    W: Workspace,
{
    /// Construct new synchronizer.
    ///
    /// Progress is hidden until a visible bar is supplied through
    /// [`Syncer::with_progress`].
    pub fn new(workspace: W, definition: SyncDefinition, options: SyncOptions) -> Self {
        Self {
            workspace,
            definition,
            options,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report per-branch progress through target bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Access underlying workspace.
    pub fn workspace(&self) -> &W {
        &self.workspace
    }

    /// Run the whole sync flow.
    ///
    /// # Errors
    ///
    /// - Return any preflight error from [`Syncer::preflight`].
    /// - Return [`SyncError::Workspace`] if source files cannot be read.
    /// - Return [`SyncError::Cancelled`] if the user declines to continue
    ///   after push failures.
    pub async fn run(&self, confirm: &mut impl Confirm) -> Result<SyncReport> {
        let mode = self.options.mode();
        info!("Starting fixed-file sync");
        info!("Mode: {mode}");

        let original = self.preflight()?;

        let reachable = self.probe_auth().await;
        if !reachable && mode == Mode::Push {
            warn!("Auth probe failed. Consider using --local mode or fix authentication.");
        }

        let sources = self.collect_source_files()?;
        info!("Syncing {} fixed file(s)", sources.len());

        let results = self.sync_branches(&sources, &original);
        let mut report = SyncReport::new(mode, results);

        if mode == Mode::DryRun {
            info!("[DRY RUN] No changes applied.");
            report.log_summary();
            return Ok(report);
        }

        let changed = report.changed_branches();
        if changed.is_empty() {
            info!("No changes to commit.");
            return Ok(report);
        }

        if mode == Mode::Local {
            warn!("{UNPUBLISHED_WARNING}");
        } else {
            report.push = self.push_changes(&changed);
            if !report.push.failed.is_empty() {
                warn!(
                    "{} branch(es) failed to push. Local commits were made to {} branch(es).",
                    report.push.failed.len(),
                    changed.len()
                );

                let proceed = self.options.assume_yes
                    || confirm.confirm("Continue without pushing remaining branches?")?;
                if !proceed {
                    warn!("Sync cancelled.");
                    return Err(SyncError::Cancelled);
                }
                warn!("Continuing with local changes only.");
            }
        }

        report.log_summary();
        if report.is_unpublished() {
            warn!("{UNPUBLISHED_WARNING}");
        }
        info!("Sync complete");

        Ok(report)
    }

    /// Verify that the repository is in a state that can be synced.
    ///
    /// Returns name of currently checked out branch so it can be restored.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::GitUnavailable`] if Git binary cannot be run.
    /// - Return [`SyncError::DirtyWorkTree`] if working tree is dirty without
    ///   force flag.
    /// - Return [`SyncError::Workspace`] if HEAD is detached.
    /// - Return [`SyncError::MissingSource`] if source branch does not exist.
    /// - Return [`SyncError::MissingTargets`] if any target does not exist.
    #[instrument(skip(self), level = "debug")]
    pub fn preflight(&self) -> Result<String> {
        info!("Running preflight checks...");

        let version = self
            .workspace
            .git_version()
            .map_err(SyncError::GitUnavailable)?;
        info!("Found {version}");

        if !self.options.force && !self.workspace.is_clean()? {
            return Err(SyncError::DirtyWorkTree);
        }

        let original = self.workspace.current_branch()?;

        let source = &self.definition.settings.source;
        if self.workspace.resolve_branch(source).is_none() {
            return Err(SyncError::MissingSource(source.clone()));
        }

        let missing = self
            .definition
            .branches
            .targets
            .iter()
            .filter(|target| self.workspace.resolve_branch(target).is_none())
            .cloned()
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(SyncError::MissingTargets(missing));
        }

        info!("All preflight checks passed");
        Ok(original)
    }

    async fn probe_auth(&self) -> bool {
        if self.options.local {
            warn!("Skipping auth probe (--local mode)");
            return true;
        }

        info!("Probing remote push viability...");
        match self.workspace.probe_remote().await {
            Ok(Some(user)) => {
                info!("Remote access confirmed (authenticated as {user})");
                true
            }
            Ok(None) => {
                info!("Remote access confirmed");
                true
            }
            Err(error) => {
                warn!("Unable to reach remote or authenticate: {error}");
                false
            }
        }
    }

    /// Read every fixed file out of the source branch.
    ///
    /// Files follow include order, patterns expand in tree order, and each
    /// path appears once. Paths the source branch does not track are skipped.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::MissingSource`] if source branch does not exist.
    /// - Return [`SyncError::Config`] if an include pattern is malformed.
    /// - Return [`SyncError::Workspace`] if source tree cannot be read.
    #[instrument(skip(self), level = "debug")]
    pub fn collect_source_files(&self) -> Result<Vec<SourceFile>> {
        let source = &self.definition.settings.source;
        let reference = self
            .workspace
            .resolve_branch(source)
            .ok_or_else(|| SyncError::MissingSource(source.clone()))?;

        let specs = self.definition.file_specs()?;
        let tracked = if specs.iter().any(|spec| matches!(spec, FileSpec::Pattern(_))) {
            self.workspace.list_files(&reference)?
        } else {
            Vec::new()
        };

        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for spec in &specs {
            let paths = match spec {
                FileSpec::Literal(path) => vec![path.clone()],
                FileSpec::Pattern(_) => tracked
                    .iter()
                    .filter(|path| spec.matches(path))
                    .cloned()
                    .collect(),
            };

            for path in paths {
                if !seen.insert(path.clone()) {
                    continue;
                }

                match self.workspace.read_blob(&reference, &path)? {
                    Some(contents) => files.push(SourceFile { path, contents }),
                    None => debug!("{path} is not tracked by {reference}, skipping"),
                }
            }
        }

        Ok(files)
    }

    /// Apply source files to every target branch in order.
    pub fn sync_branches(&self, sources: &[SourceFile], original: &str) -> Vec<BranchResult> {
        let targets = &self.definition.branches.targets;
        info!("Syncing to {} target branches...", targets.len());
        self.progress.set_length(targets.len() as u64);

        let mut results = Vec::with_capacity(targets.len());
        for branch in targets {
            self.progress.set_message(branch.clone());
            let outcome = self.apply_to_branch(branch, sources, original);
            self.progress.suspend(|| match &outcome {
                BranchOutcome::Changed { files } => {
                    info!("{branch}: {} file(s) to sync", files.len())
                }
                BranchOutcome::Unchanged => info!("{branch}: no changes"),
                BranchOutcome::Failed { error } => error!("{branch}: sync failed - {error}"),
            });
            self.progress.inc(1);

            results.push(BranchResult {
                branch: branch.clone(),
                outcome,
            });
        }
        self.progress.finish_and_clear();

        results
    }

    /// Apply source files to a single target branch.
    ///
    /// Outside of dry-run mode the original branch is always restored
    /// afterwards, even if applying failed halfway through.
    pub fn apply_to_branch(
        &self,
        branch: &str,
        sources: &[SourceFile],
        original: &str,
    ) -> BranchOutcome {
        let result = if self.options.dry_run {
            self.preview_branch(branch, sources)
        } else {
            let result = self.rewrite_branch(branch, sources);
            self.restore(original);
            result
        };

        match result {
            Ok(files) if files.is_empty() => BranchOutcome::Unchanged,
            Ok(files) => BranchOutcome::Changed { files },
            Err(error) => BranchOutcome::Failed {
                error: error.to_string(),
            },
        }
    }

    fn preview_branch(&self, branch: &str, sources: &[SourceFile]) -> Result<Vec<String>> {
        let reference = self.resolve_target(branch)?;
        let mut changes = Vec::new();
        for source in sources {
            let current = self.workspace.read_blob(&reference, &source.path)?;
            if current.as_deref() != Some(source.contents.as_slice()) {
                changes.push(source.path.clone());
            }
        }

        Ok(changes)
    }

    #[instrument(skip(self, sources), level = "debug")]
    fn rewrite_branch(&self, branch: &str, sources: &[SourceFile]) -> Result<Vec<String>> {
        if self.workspace.has_local_branch(branch) {
            self.workspace.checkout(branch)?;
        } else {
            self.resolve_target(branch)?;
            self.workspace.checkout_tracking(branch)?;
        }

        // INVARIANT: Compare against committed blobs, never working tree bytes.
        //   - Checkout filters like `core.autocrlf` rewrite working tree files.
        let reference = BranchRef::Local(branch.into());
        let mut changes = Vec::new();
        for source in sources {
            let current = self.workspace.read_blob(&reference, &source.path)?;
            if current.as_deref() == Some(source.contents.as_slice()) {
                continue;
            }

            match self.write_file(&source.path, &source.contents)? {
                WriteOutcome::Written => changes.push(source.path.clone()),
                WriteOutcome::MissingParent => self.progress.suspend(|| {
                    debug!("{branch} lacks parent directory of {}, skipping", source.path)
                }),
            }
        }

        // INVARIANT: Commit right away so the next checkout starts clean.
        if !changes.is_empty() {
            let committed = self
                .workspace
                .stage_and_commit(&changes, &self.definition.commit_message())?;
            if !committed {
                changes.clear();
            }
        }

        Ok(changes)
    }

    fn write_file(&self, path: &str, contents: &[u8]) -> Result<WriteOutcome> {
        if self.options.dry_run {
            return Err(SyncError::DryRunGuard(path.into()));
        }

        Ok(self.workspace.write_work_file(path, contents)?)
    }

    fn restore(&self, original: &str) {
        if let Err(error) = self.workspace.discard_changes() {
            self.progress
                .suspend(|| warn!("failed to clean working tree: {error}"));
        }

        if let Err(error) = self.workspace.checkout(original) {
            self.progress
                .suspend(|| warn!("failed to return to {original}: {error}"));
        }
    }

    fn resolve_target(&self, branch: &str) -> Result<BranchRef> {
        self.workspace
            .resolve_branch(branch)
            .ok_or_else(|| SyncError::MissingBranch(branch.into()))
    }

    /// Push every changed branch to the remote.
    pub fn push_changes(&self, branches: &[String]) -> PushReport {
        info!("Pushing changes to {}...", self.definition.settings.remote);
        let mut report = PushReport::default();
        for branch in branches {
            match self.workspace.push(branch) {
                Ok(()) => {
                    info!("{branch}: pushed");
                    report.pushed.push(branch.clone());
                }
                Err(error) => {
                    error!("{branch}: push failed");
                    report.failed.push((branch.clone(), error.to_string()));
                }
            }
        }

        report
    }
}

/// Sync error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Git binary cannot be run.
    #[error("git is not installed or not in PATH")]
    GitUnavailable(#[source] crate::workspace::WorkspaceError),

    /// Working tree has uncommitted changes.
    #[error("working tree is dirty, use --force to override")]
    DirtyWorkTree,

    /// Source branch exists neither locally nor on the remote.
    #[error("source branch {0:?} does not exist")]
    MissingSource(String),

    /// Target branches exist neither locally nor on the remote.
    #[error("target branches not found: {}", .0.join(", "))]
    MissingTargets(Vec<String>),

    /// Target branch vanished after preflight.
    #[error("branch {0:?} does not exist")]
    MissingBranch(String),

    /// A file write was attempted during a dry run.
    #[error("[DRY RUN GUARD] attempted to write file: {0}")]
    DryRunGuard(String),

    /// User declined to continue after push failures.
    #[error("sync cancelled")]
    Cancelled,

    /// Confirmation prompt failed.
    #[error(transparent)]
    Prompt(#[from] inquire::InquireError),

    /// Sync definition is unusable.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Repository access fails.
    #[error(transparent)]
    Workspace(#[from] crate::workspace::WorkspaceError),
}

/// Friendly result alias :3
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
