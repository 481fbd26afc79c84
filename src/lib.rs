// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Keep fixed files identical across the branches of a lesson repository.
//!
//! A lesson repository carries one branch per lesson, and every lesson branch
//! carries its own copy of the same tooling and configuration files. Editing
//! `package.json` once on `main` should not mean editing it fourteen more
//! times. Branch-sync reads those __fixed files__ from the source branch,
//! writes them into each target branch, commits, and optionally pushes the
//! result, restoring whatever branch the user started on.
//!
//! # See Also
//!
//! 1. [`config`] for the sync definition layout.
//! 2. [`sync`] for the sync flow itself.
//! 3. [`workspace`] for how the repository is accessed.

pub mod config;
pub mod path;
pub mod sync;
pub mod workspace;
