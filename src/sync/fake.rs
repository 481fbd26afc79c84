// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! In-memory workspace for exercising the sync engine.

use crate::workspace::{BranchRef, Result, Workspace, WorkspaceError, WriteOutcome};

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap, HashSet},
};

type Tree = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Default)]
pub(crate) struct FakeWorkspace {
    local: RefCell<HashMap<String, Tree>>,
    remote: HashMap<String, Tree>,
    current: RefCell<String>,
    work: RefCell<Tree>,
    mutations: RefCell<Vec<String>>,
    dirty: bool,
    detached: bool,
    normalize_eol: bool,
    no_git: bool,
    unreachable: bool,
    failing_checkouts: HashSet<String>,
    failing_commits: HashSet<String>,
    failing_pushes: HashSet<String>,
}

impl FakeWorkspace {
    pub(crate) fn new(current: &str) -> Self {
        Self {
            current: RefCell::new(current.into()),
            ..Default::default()
        }
    }

    pub(crate) fn with_local<'a>(
        self,
        branch: &str,
        files: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let tree = to_tree(files);
        if *self.current.borrow() == branch {
            *self.work.borrow_mut() = tree.clone();
        }
        self.local.borrow_mut().insert(branch.into(), tree);
        self
    }

    pub(crate) fn with_remote<'a>(
        mut self,
        branch: &str,
        files: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        self.remote.insert(branch.into(), to_tree(files));
        self
    }

    pub(crate) fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }

    pub(crate) fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    /// Stage CRLF line endings as LF, like `core.autocrlf`.
    pub(crate) fn normalize_eol(mut self) -> Self {
        self.normalize_eol = true;
        self
    }

    pub(crate) fn without_git(mut self) -> Self {
        self.no_git = true;
        self
    }

    pub(crate) fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub(crate) fn fail_checkout(mut self, branch: &str) -> Self {
        self.failing_checkouts.insert(branch.into());
        self
    }

    pub(crate) fn fail_commit(mut self, branch: &str) -> Self {
        self.failing_commits.insert(branch.into());
        self
    }

    pub(crate) fn fail_push(mut self, branch: &str) -> Self {
        self.failing_pushes.insert(branch.into());
        self
    }

    pub(crate) fn current(&self) -> String {
        self.current.borrow().clone()
    }

    pub(crate) fn mutations(&self) -> Vec<String> {
        self.mutations.borrow().clone()
    }

    pub(crate) fn local_file(&self, branch: &str, path: &str) -> Option<String> {
        self.local
            .borrow()
            .get(branch)
            .and_then(|tree| tree.get(path))
            .map(|contents| String::from_utf8_lossy(contents).into_owned())
    }

    fn record(&self, mutation: impl Into<String>) {
        self.mutations.borrow_mut().push(mutation.into());
    }

    fn fail(&self, command: impl Into<String>) -> WorkspaceError {
        WorkspaceError::Syscall {
            command: command.into(),
            message: "stderr: fatal: simulated failure".into(),
        }
    }
}

impl Workspace for FakeWorkspace {
    fn git_version(&self) -> Result<String> {
        if self.no_git {
            return Err(self.fail("git --version"));
        }

        Ok("git version 2.47.0".into())
    }

    fn current_branch(&self) -> Result<String> {
        if self.detached {
            return Err(WorkspaceError::DetachedHead);
        }

        Ok(self.current())
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(!self.dirty)
    }

    fn has_local_branch(&self, branch: &str) -> bool {
        self.local.borrow().contains_key(branch)
    }

    fn resolve_branch(&self, branch: &str) -> Option<BranchRef> {
        if self.has_local_branch(branch) {
            Some(BranchRef::Local(branch.into()))
        } else if self.remote.contains_key(branch) {
            Some(BranchRef::Remote {
                remote: "origin".into(),
                branch: branch.into(),
            })
        } else {
            None
        }
    }

    fn list_files(&self, reference: &BranchRef) -> Result<Vec<String>> {
        Ok(self.tree(reference)?.into_keys().collect())
    }

    fn read_blob(&self, reference: &BranchRef, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.tree(reference)?.get(path).cloned())
    }

    fn write_work_file(&self, path: &str, contents: &[u8]) -> Result<WriteOutcome> {
        if let Some((parent, _)) = path.rsplit_once('/') {
            let prefix = format!("{parent}/");
            if !self.work.borrow().keys().any(|key| key.starts_with(&prefix)) {
                return Ok(WriteOutcome::MissingParent);
            }
        }

        self.work.borrow_mut().insert(path.into(), contents.to_vec());
        Ok(WriteOutcome::Written)
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        if self.failing_checkouts.contains(branch) {
            return Err(self.fail(format!("git checkout {branch}")));
        }

        let tree = self
            .local
            .borrow()
            .get(branch)
            .cloned()
            .ok_or_else(|| self.fail(format!("git checkout {branch}")))?;
        *self.work.borrow_mut() = tree;
        *self.current.borrow_mut() = branch.into();
        self.record(format!("checkout {branch}"));

        Ok(())
    }

    fn checkout_tracking(&self, branch: &str) -> Result<()> {
        let tree = self
            .remote
            .get(branch)
            .cloned()
            .ok_or_else(|| self.fail(format!("git checkout --track origin/{branch}")))?;
        self.local.borrow_mut().insert(branch.into(), tree.clone());
        *self.work.borrow_mut() = tree;
        *self.current.borrow_mut() = branch.into();
        self.record(format!("checkout --track {branch}"));

        Ok(())
    }

    fn stage_and_commit(&self, paths: &[String], _message: &str) -> Result<bool> {
        let current = self.current();
        if self.failing_commits.contains(&current) {
            return Err(self.fail("git commit -m sync"));
        }

        let work = self.work.borrow();
        let mut local = self.local.borrow_mut();
        let tree = local.entry(current.clone()).or_default();
        let mut staged = tree.clone();
        for path in paths {
            if let Some(contents) = work.get(path) {
                let contents = if self.normalize_eol {
                    String::from_utf8_lossy(contents)
                        .replace("\r\n", "\n")
                        .into_bytes()
                } else {
                    contents.clone()
                };
                staged.insert(path.clone(), contents);
            }
        }

        if staged == *tree {
            return Ok(false);
        }

        *tree = staged;
        self.record(format!("commit {current} {}", paths.join(",")));
        Ok(true)
    }

    fn discard_changes(&self) -> Result<()> {
        let tree = self
            .local
            .borrow()
            .get(&self.current())
            .cloned()
            .unwrap_or_default();
        *self.work.borrow_mut() = tree;
        self.record("discard");

        Ok(())
    }

    fn push(&self, branch: &str) -> Result<()> {
        if self.unreachable || self.failing_pushes.contains(branch) {
            return Err(self.fail(format!("git push origin {branch}")));
        }

        self.record(format!("push {branch}"));
        Ok(())
    }

    async fn probe_remote(&self) -> Result<Option<String>> {
        if self.unreachable {
            return Err(self.fail("git ls-remote origin HEAD"));
        }

        Ok(Some("John Doe".into()))
    }
}

impl FakeWorkspace {
    fn tree(&self, reference: &BranchRef) -> Result<Tree> {
        let tree = match reference {
            BranchRef::Local(branch) => self.local.borrow().get(branch).cloned(),
            BranchRef::Remote { branch, .. } => self.remote.get(branch).cloned(),
        };

        tree.ok_or_else(|| self.fail(format!("git rev-parse {reference}")))
    }
}

fn to_tree<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Tree {
    files
        .into_iter()
        .map(|(path, contents)| (path.to_string(), contents.as_bytes().to_vec()))
        .collect()
}
