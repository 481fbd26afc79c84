// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! User confirmation.

/// Ask the user a yes or no question.
pub trait Confirm {
    /// Return `true` if the user agreed.
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

/// Confirm through interactive terminal prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct InquireConfirm;

impl Confirm for InquireConfirm {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        inquire::Confirm::new(question)
            .with_default(false)
            .with_help_message("y/n")
            .prompt()
    }
}

/// Agree to everything without asking.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _question: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Friendly result alias :3
pub type Result<T, E = inquire::InquireError> = std::result::Result<T, E>;
