// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use branch_sync::{
    config::SyncDefinition,
    path::{expand_path, resolve_config_path},
    sync::{InquireConfirm, SyncOptions, Syncer},
    workspace::Git2Workspace,
};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    path::{Path, PathBuf},
    process::exit,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  branch-sync [options] [--dry-run] [--local] [--force] [--yes]\n  branch-sync [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path inside repository to sync.
    #[arg(short, long, global = true, value_name = "path", default_value = ".")]
    pub repo: PathBuf,

    /// Sync definition to use instead of the discovered one.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub sync: SyncArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let repo = expand_path(&self.repo)?;
        match self.command {
            Some(Command::ShowConfig) => run_show_config(self.config, &repo),
            None => run_sync(self.sync, self.config, &repo).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Print effective sync definition.
    #[command(override_usage = "branch-sync show-config [options]")]
    ShowConfig,
}

#[derive(Args, Clone, Debug)]
struct SyncArgs {
    /// Show which branches would change without touching anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Commit locally, but do not contact or push to the remote.
    #[arg(long)]
    pub local: bool,

    /// Proceed even if the working tree is dirty.
    #[arg(long)]
    pub force: bool,

    /// Continue without asking if some branches fail to push.
    #[arg(short, long)]
    pub yes: bool,
}

impl From<SyncArgs> for SyncOptions {
    fn from(args: SyncArgs) -> Self {
        Self {
            dry_run: args.dry_run,
            local: args.local,
            force: args.force,
            assume_yes: args.yes,
        }
    }
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn load_definition(config: Option<PathBuf>, root: &Path) -> Result<SyncDefinition> {
    match resolve_config_path(config.as_deref(), root)? {
        Some(path) => {
            info!("using sync definition {:?}", path.display());
            Ok(SyncDefinition::load(path)?)
        }
        None => Ok(SyncDefinition::default()),
    }
}

fn run_show_config(config: Option<PathBuf>, repo: &Path) -> Result<()> {
    // Outside of a repository only explicit and user-wide definitions apply.
    let root = match Git2Workspace::open(repo) {
        Ok(workspace) => workspace.root().to_path_buf(),
        Err(_) => repo.to_path_buf(),
    };

    print!("{}", load_definition(config, &root)?);
    Ok(())
}

async fn run_sync(args: SyncArgs, config: Option<PathBuf>, repo: &Path) -> Result<()> {
    let workspace = Git2Workspace::open(repo)?;
    let definition = load_definition(config, workspace.root())?;
    let workspace = workspace.with_remote(
        definition.settings.remote.clone(),
        definition.probe_timeout(),
    );

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<30}  [{wide_bar:.yellow/blue}] {pos}/{len}",
        )?
        .progress_chars("-Cco."),
    );

    let syncer = Syncer::new(workspace, definition, args.into()).with_progress(bar);
    syncer.run(&mut InquireConfirm).await?;

    Ok(())
}
