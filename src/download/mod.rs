//! Media download queue: a fixed-size worker pool draining a task channel.
//! Tasks whose destination already exists complete without network I/O.

pub mod error;
pub mod file;
pub mod paths;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Mutex};

pub use error::DownloadError;
pub use file::MediaFetcher;

/// A single media file to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub destination: PathBuf,
    /// RFC 3339 publication time applied as the file's mtime.
    pub source_timestamp: Option<String>,
}

/// How a finished task completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Downloaded,
    AlreadyPresent,
}

/// Totals for one drain of the queue.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueSummary {
    pub completed: usize,
    pub failed: usize,
    pub already_present: usize,
}

/// Pending downloads accumulated during a sync pass.
#[derive(Debug, Default)]
pub struct MediaDownloadQueue {
    tasks: Vec<DownloadTask>,
}

impl MediaDownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, task: DownloadTask) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drain every queued task with exactly `concurrency` workers.
    ///
    /// `on_complete(done, total)` runs after each successful task, where
    /// `total` is the queue length when the run started. Failures are
    /// logged and counted in the summary but never stop the other workers.
    pub async fn run<F>(
        self,
        fetcher: &dyn MediaFetcher,
        concurrency: usize,
        on_complete: F,
    ) -> QueueSummary
    where
        F: Fn(usize, usize) + Sync,
    {
        let total = self.tasks.len();
        if total == 0 {
            return QueueSummary::default();
        }
        let workers = concurrency.max(1);

        let (tx, rx) = mpsc::channel::<DownloadTask>(total);
        for task in self.tasks {
            // Capacity equals the task count, so this never waits.
            if tx.send(task).await.is_err() {
                break;
            }
        }
        drop(tx);

        let rx = Arc::new(Mutex::new(rx));
        let completed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let already_present = AtomicUsize::new(0);

        let worker = |worker_id: usize| {
            let rx = Arc::clone(&rx);
            let completed = &completed;
            let failed = &failed;
            let already_present = &already_present;
            let on_complete = &on_complete;
            async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(task) = next else { break };
                    match download_one(fetcher, &task).await {
                        Ok(outcome) => {
                            if outcome == TaskOutcome::AlreadyPresent {
                                already_present.fetch_add(1, Ordering::Relaxed);
                            }
                            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                            on_complete(done, total);
                        }
                        Err(e) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(
                                worker_id,
                                url = %task.url,
                                path = %task.destination.display(),
                                remote = e.is_remote(),
                                error = %e,
                                "Download failed"
                            );
                        }
                    }
                }
            }
        };

        futures_util::future::join_all((0..workers).map(worker)).await;

        QueueSummary {
            completed: completed.into_inner(),
            failed: failed.into_inner(),
            already_present: already_present.into_inner(),
        }
    }
}

/// Download one task unless its destination is already on disk.
pub async fn download_one(
    fetcher: &dyn MediaFetcher,
    task: &DownloadTask,
) -> Result<TaskOutcome, DownloadError> {
    if tokio::fs::try_exists(&task.destination).await? {
        return Ok(TaskOutcome::AlreadyPresent);
    }

    let bytes = file::download_file(fetcher, &task.url, &task.destination).await?;
    tracing::debug!(
        size_bytes = bytes,
        path = %task.destination.display(),
        "Downloaded"
    );

    if let Some(ts) = task
        .source_timestamp
        .as_deref()
        .and_then(file::parse_source_timestamp)
    {
        let path = task.destination.clone();
        match tokio::task::spawn_blocking(move || file::set_file_mtime(&path, ts)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(
                "Could not set mtime on {}: {}",
                task.destination.display(),
                e
            ),
            Err(e) => tracing::warn!("mtime task panicked: {}", e),
        }
    }

    Ok(TaskOutcome::Downloaded)
}

/// Create a progress bar for the download phase.
///
/// Hidden when `--no-progress-bar` was given or stdout is not a TTY.
pub fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    pb.set_style(style);
    pb
}

pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
