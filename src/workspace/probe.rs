// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote reachability probe.
//!
//! Before pushing anything, branch-sync checks that the remote can actually be
//! reached with the credentials at hand. The probe lists the remote's heads
//! exactly like `git ls-remote` would, without fetching or modifying anything.
//! Credentials are resolved through `auth-git2`, so SSH agents, credential
//! helpers, and interactive prompts all work the way the user expects.

use crate::workspace::Result;

use auth_git2::{GitAuthenticator, Prompter};
use git2::{Direction, RemoteCallbacks, Repository};
use indicatif::ProgressBar;
use inquire::{Password, Text};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Connect to remote and list its heads.
#[instrument(skip(root, prompter), level = "debug")]
pub(crate) fn connect(root: &Path, remote: &str, prompter: IndicatifPrompter) -> Result<()> {
    let repository = Repository::open(root)?;
    let config = repository.config()?;
    let mut remote = repository.find_remote(remote)?;

    let authenticator = GitAuthenticator::default().set_prompter(prompter);
    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(&config));

    let connection = remote.connect_auth(Direction::Fetch, Some(rc), None)?;
    let heads = connection.list()?;
    debug!("remote advertised {} refs", heads.len());

    Ok(())
}

/// Extract repository owner from GitHub remote URL.
///
/// Understands both `https://github.com/<owner>/<repo>` and
/// `git@github.com:<owner>/<repo>` forms.
pub fn github_owner(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("git@github.com:"))?;
    let owner = rest.split('/').next()?;

    (!owner.is_empty()).then_some(owner)
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("https://github.com/lessons/todo.git", Some("lessons"); "https")]
    #[test_case("git@github.com:lessons/todo.git", Some("lessons"); "ssh")]
    #[test_case("https://gitlab.com/lessons/todo.git", None; "other host")]
    #[test_case("https://github.com//todo.git", None; "empty owner")]
    #[test]
    fn parse_github_owner(url: &str, expect: Option<&str>) {
        pretty_assertions::assert_eq!(github_owner(url), expect);
    }
}
