// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Sync outcome reporting.

use crate::sync::Mode;

use tracing::{error, info, warn, Level};

/// What happened to a single target branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    /// Fixed files differed and were (or would be) rewritten.
    Changed { files: Vec<String> },

    /// Fixed files already match source branch.
    Unchanged,

    /// Branch could not be synced.
    Failed { error: String },
}

/// Outcome of a target branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchResult {
    pub branch: String,
    pub outcome: BranchOutcome,
}

/// Outcome of publishing changed branches.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PushReport {
    /// Branches pushed successfully.
    pub pushed: Vec<String>,

    /// Branches that failed to push, along with the reason.
    pub failed: Vec<(String, String)>,
}

/// Full account of a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: Mode,
    pub results: Vec<BranchResult>,
    pub push: PushReport,
}

impl SyncReport {
    /// Construct new report with nothing pushed yet.
    pub fn new(mode: Mode, results: Vec<BranchResult>) -> Self {
        Self {
            mode,
            results,
            push: PushReport::default(),
        }
    }

    /// Names of branches that received changes, in sync order.
    pub fn changed_branches(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|result| matches!(result.outcome, BranchOutcome::Changed { .. }))
            .map(|result| result.branch.clone())
            .collect()
    }

    /// Check if commits were made that never reached the remote.
    pub fn is_unpublished(&self) -> bool {
        self.mode == Mode::Push
            && self.push.pushed.is_empty()
            && !self.changed_branches().is_empty()
    }

    /// Render summary as leveled lines, skipping empty sections.
    pub fn summary(&self) -> Vec<(Level, String)> {
        let mut changed = Vec::new();
        let mut unchanged = Vec::new();
        let mut failed = Vec::new();
        for result in &self.results {
            match &result.outcome {
                BranchOutcome::Changed { files } => {
                    changed.push(format!("  {}: {}", result.branch, files.join(", ")))
                }
                BranchOutcome::Unchanged => unchanged.push(format!("  {}", result.branch)),
                BranchOutcome::Failed { error } => {
                    failed.push(format!("  {}: {error}", result.branch))
                }
            }
        }

        let push_failed = self
            .push
            .failed
            .iter()
            .map(|(branch, error)| format!("  {branch}: {error}"))
            .collect::<Vec<_>>();

        let mut lines = vec![(Level::INFO, "=== SYNC SUMMARY ===".to_string())];
        let sections = [
            (Level::INFO, "Changed", changed),
            (Level::INFO, "Unchanged", unchanged),
            (Level::ERROR, "Failed", failed),
            (Level::WARN, "Push failures", push_failed),
        ];
        for (level, title, entries) in sections {
            if entries.is_empty() {
                continue;
            }

            lines.push((level, format!("{title} ({}):", entries.len())));
            lines.extend(entries.into_iter().map(|entry| (Level::INFO, entry)));
        }

        lines
    }

    /// Log summary through tracing.
    pub fn log_summary(&self) {
        for (level, line) in self.summary() {
            if level == Level::ERROR {
                error!("{line}");
            } else if level == Level::WARN {
                warn!("{line}");
            } else {
                info!("{line}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn summary_skips_empty_sections() {
        let mut report = SyncReport::new(
            Mode::Push,
            vec![
                BranchResult {
                    branch: "01-setup".into(),
                    outcome: BranchOutcome::Changed {
                        files: vec![".gitignore".into(), "package.json".into()],
                    },
                },
                BranchResult {
                    branch: "02-events".into(),
                    outcome: BranchOutcome::Failed {
                        error: "checkout failed".into(),
                    },
                },
            ],
        );
        report.push.failed.push(("01-setup".into(), "rejected".into()));

        let result = report
            .summary()
            .into_iter()
            .map(|(_, line)| line)
            .collect::<Vec<_>>();
        let expect = vec![
            "=== SYNC SUMMARY ===",
            "Changed (1):",
            "  01-setup: .gitignore, package.json",
            "Failed (1):",
            "  02-events: checkout failed",
            "Push failures (1):",
            "  01-setup: rejected",
        ];
        assert_eq!(result, expect);
        assert!(report.is_unpublished());
    }

    #[test]
    fn local_mode_is_never_unpublished() {
        let report = SyncReport::new(
            Mode::Local,
            vec![BranchResult {
                branch: "01-setup".into(),
                outcome: BranchOutcome::Changed {
                    files: vec!["package.json".into()],
                },
            }],
        );
        assert!(!report.is_unpublished());
        assert_eq!(report.changed_branches(), vec!["01-setup"]);
    }
}
