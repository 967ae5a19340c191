//! Incremental sync engine: fetch, normalize, merge, checkpoint.
//!
//! One [`SyncManager`] drives every (group, member) cycle of a run. Media
//! references discovered along the way are queued and downloaded after the
//! sync pass by [`process_media_queue`].

pub mod error;
pub mod export;
pub mod fetch;
pub mod merge;
pub mod message;
pub mod normalize;

use std::path::PathBuf;
use std::sync::Arc;

use crate::api::responses::{Group, Member};
use crate::auth::{CredentialProvider, Credentials};
use crate::download::{paths, MediaDownloadQueue, MediaFetcher, QueueSummary};
use crate::state::{CheckpointKey, CheckpointStore, STATE_FILE};

use self::error::SyncError;
use self::export::{MemberExport, MemberInfo, EXPORT_FILE};
use self::fetch::{FetchOptions, TimelineSource};

/// Knobs for a sync run that the engine needs, decoupled from CLI parsing.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub fetch: FetchOptions,
    /// Record media paths but never queue downloads.
    pub skip_media: bool,
}

/// Drives sync cycles against one output directory.
pub struct SyncManager {
    source: Arc<dyn TimelineSource>,
    provider: Arc<dyn CredentialProvider>,
    credentials: Credentials,
    output_dir: PathBuf,
    checkpoints: CheckpointStore,
    options: SyncOptions,
}

impl SyncManager {
    pub fn new(
        source: Arc<dyn TimelineSource>,
        provider: Arc<dyn CredentialProvider>,
        credentials: Credentials,
        output_dir: impl Into<PathBuf>,
        options: SyncOptions,
    ) -> Self {
        let output_dir = output_dir.into();
        let checkpoints = CheckpointStore::load(output_dir.join(STATE_FILE));
        Self {
            source,
            provider,
            credentials,
            output_dir,
            checkpoints,
            options,
        }
    }

    /// Credentials currently in effect, including any refresh made during
    /// earlier cycles.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Sync one member and return how many new messages were merged.
    ///
    /// Failures are logged and reported as zero; they never affect other
    /// members.
    pub async fn sync_member(
        &mut self,
        group: &Group,
        member: &Member,
        queue: &mut MediaDownloadQueue,
    ) -> usize {
        match self.try_sync_member(group, member, queue).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(
                    group_id = group.id,
                    member_id = member.id,
                    "Sync of {} failed: {}",
                    member.name,
                    e
                );
                0
            }
        }
    }

    async fn try_sync_member(
        &mut self,
        group: &Group,
        member: &Member,
        queue: &mut MediaDownloadQueue,
    ) -> Result<usize, SyncError> {
        let member_dir =
            paths::member_dir(&self.output_dir, group.id, &group.name, member.id, &member.name);
        for sub in paths::MEDIA_DIRS {
            let dir = member_dir.join(sub);
            std::fs::create_dir_all(&dir).map_err(|e| SyncError::io(&dir, e))?;
        }

        let key = CheckpointKey::new(group.id, member.id);
        let since_id = self.checkpoints.get(key);
        tracing::debug!(group_id = group.id, member_id = member.id, ?since_id, "Fetching timeline");

        let outcome = fetch::fetch_new_messages(
            self.source.as_ref(),
            self.provider.as_ref(),
            self.credentials.clone(),
            group.id,
            since_id,
            None,
            &self.options.fetch,
            |oldest, count| {
                tracing::debug!(
                    group_id = group.id,
                    member_id = member.id,
                    oldest = oldest.unwrap_or("-"),
                    count,
                    "Fetched page"
                );
            },
        )
        .await;
        let pages = outcome.pages;
        self.credentials = outcome.credentials;

        let records: Vec<_> = outcome
            .messages
            .into_iter()
            .filter(|m| m.member_id == Some(member.id))
            .collect();
        if records.is_empty() {
            tracing::info!(
                group_id = group.id,
                member_id = member.id,
                pages,
                "{}: no new messages",
                member.name
            );
            return Ok(0);
        }

        let batch = normalize::prepare_batch(&records, &self.output_dir, &member_dir).await;
        for e in &batch.errors {
            tracing::warn!(group_id = group.id, member_id = member.id, "Skipping record: {}", e);
        }
        let new_count = batch.messages.len();
        if new_count == 0 {
            return Ok(0);
        }

        let export_path = member_dir.join(EXPORT_FILE);
        let existing = export::load_existing(&export_path)?;
        let merged = merge::merge(existing, batch.messages);
        let last_id = merged.last_message_id(since_id);
        let total = merged.messages.len();

        let export = MemberExport::new(MemberInfo::new(group, member), merged);
        export::write_export(&export_path, &export)?;

        if let Some(last_id) = last_id {
            self.checkpoints.update(key, last_id, total)?;
        }

        if !self.options.skip_media {
            for task in batch.tasks {
                queue.enqueue(task);
            }
        }

        tracing::info!(
            group_id = group.id,
            member_id = member.id,
            new = new_count,
            total,
            pages,
            "{}: synced",
            member.name
        );
        Ok(new_count)
    }
}

/// Download every queued media file with `concurrency` workers.
pub async fn process_media_queue<F>(
    fetcher: &dyn MediaFetcher,
    queue: MediaDownloadQueue,
    concurrency: usize,
    on_complete: F,
) -> QueueSummary
where
    F: Fn(usize, usize) + Sync,
{
    let total = queue.len();
    tracing::info!(total, concurrency, "Downloading media");
    let summary = queue.run(fetcher, concurrency, on_complete).await;
    if summary.failed > 0 {
        tracing::warn!(failed = summary.failed, "Some media downloads failed");
    }
    summary
}
