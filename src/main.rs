//! msgsync-rs: incremental backup of group message timelines.
//!
//! Each run walks every subscribed group and member, fetches only the
//! messages newer than the stored checkpoint, merges them into a per-member
//! `messages.json`, and then downloads the referenced media with bounded
//! concurrency.

#![warn(clippy::all)]

mod api;
mod auth;
mod cli;
mod config;
mod download;
mod shutdown;
mod state;
mod sync;
mod types;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use api::responses::Group;
use api::ApiClient;
use auth::{CredentialProvider, Credentials, FileCredentialProvider};
use cli::Command;
use download::MediaDownloadQueue;
use state::{CheckpointStore, STATE_FILE};
use sync::SyncManager;

/// List syncable groups, refreshing the token once if it was rejected.
async fn list_groups(
    api: &ApiClient,
    provider: &dyn CredentialProvider,
    credentials: Credentials,
    include_inactive: bool,
) -> anyhow::Result<(Vec<Group>, Credentials)> {
    match api.groups(&credentials, include_inactive).await {
        Ok(groups) => Ok((groups, credentials)),
        Err(e) if e.is_auth_failure() => {
            tracing::warn!("Group listing rejected ({}), refreshing token", e);
            let fresh = provider.refresh(&credentials).await?;
            let groups = api.groups(&fresh, include_inactive).await?;
            Ok((groups, fresh))
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_sync(config: config::Config) -> anyhow::Result<()> {
    let started = Instant::now();
    tracing::info!(
        directory = %config.directory.display(),
        concurrency = config.concurrency,
        "Starting msgsync-rs"
    );

    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!(
            "Cannot create output directory {}",
            config.directory.display()
        )
    })?;

    let api = ApiClient::new(&config.api_base)?;
    let provider = Arc::new(FileCredentialProvider::new(
        config.credentials.clone(),
        api.clone(),
    ));
    let credentials = auth::acquire_with_timeout(provider.as_ref(), config.auth_timeout)
        .await
        .with_context(|| {
            format!(
                "Could not load credentials from {}",
                provider.path().display()
            )
        })?;

    let shutdown_token = shutdown::install_signal_handler();

    let (groups, credentials) =
        list_groups(&api, provider.as_ref(), credentials, config.include_inactive).await?;
    let groups: Vec<Group> = groups
        .into_iter()
        .filter(|g| config.wants_group(g.id))
        .collect();
    tracing::info!("Found {} group(s) to sync", groups.len());

    let mut manager = SyncManager::new(
        Arc::new(api.clone()),
        provider,
        credentials,
        &config.directory,
        config.sync_options(),
    );
    let mut queue = MediaDownloadQueue::new();
    let mut new_messages = 0usize;

    'groups: for group in &groups {
        let members = match api.members(manager.credentials(), group.id).await {
            Ok(members) => members,
            Err(e) => {
                tracing::error!(group_id = group.id, "Could not list members of {}: {}", group.name, e);
                continue;
            }
        };

        for member in members.iter().filter(|m| config.wants_member(m.id)) {
            if shutdown_token.is_cancelled() {
                tracing::info!("Shutdown requested, stopping before {}", member.name);
                break 'groups;
            }
            new_messages += manager.sync_member(group, member, &mut queue).await;
        }
    }

    tracing::info!("── Summary ──");
    tracing::info!("  {} new message(s)", new_messages);
    tracing::info!(
        "  {} checkpoint(s) in {}",
        manager.checkpoints().len(),
        manager.checkpoints().path().display()
    );

    if shutdown_token.is_cancelled() {
        if !queue.is_empty() {
            tracing::info!(
                "  {} media download(s) skipped by shutdown",
                queue.len()
            );
        }
        tracing::info!("  elapsed: {}", download::format_duration(started.elapsed()));
        return Ok(());
    }

    if !queue.is_empty() {
        let pb = download::create_progress_bar(config.no_progress_bar, queue.len() as u64);
        let summary = sync::process_media_queue(api.http(), queue, config.concurrency, |done, _| {
            pb.set_position(done as u64);
        })
        .await;
        pb.finish_and_clear();
        tracing::info!(
            "  {} media downloaded, {} already present, {} failed",
            summary.completed - summary.already_present,
            summary.already_present,
            summary.failed
        );
    }
    tracing::info!("  elapsed: {}", download::format_duration(started.elapsed()));

    Ok(())
}

fn run_status(args: cli::StatusArgs) -> anyhow::Result<()> {
    let path = config::expand_tilde(&args.directory).join(STATE_FILE);
    if !path.exists() {
        println!("No sync state found at {}", path.display());
        println!("Run a sync first to create it.");
        return Ok(());
    }

    let store = CheckpointStore::load(&path);
    println!("Sync state: {} ({} entries)", store.path().display(), store.len());
    println!();
    if store.is_empty() {
        println!("No checkpoints recorded.");
        return Ok(());
    }
    println!("{:<16} {:>16} {:>10}  last sync", "group_member", "last id", "messages");
    for (key, cp) in store.entries() {
        println!(
            "{:<16} {:>16} {:>10}  {}",
            key,
            cp.last_message_id,
            cp.total_messages,
            cp.last_sync.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

fn run_reset_state(args: cli::ResetStateArgs) -> anyhow::Result<()> {
    let path = config::expand_tilde(&args.directory).join(STATE_FILE);
    if !path.exists() {
        println!("No sync state found at {}", path.display());
        return Ok(());
    }

    if !args.yes {
        println!("This will delete the sync state at:");
        println!("  {}", path.display());
        println!("Exports and media are kept; the next sync refetches every timeline.");
        println!();
        print!("Are you sure? [y/N] ");
        use std::io::Write;
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    std::fs::remove_file(&path)?;
    println!("Sync state deleted.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    match cli.effective_command() {
        Command::Sync(args) => run_sync(config::Config::from_cli(args)?).await,
        Command::Status(args) => run_status(args),
        Command::ResetState(args) => run_reset_state(args),
    }
}
