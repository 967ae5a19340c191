use std::path::PathBuf;
use std::time::Duration;

use crate::cli::SyncArgs;
use crate::sync::fetch::FetchOptions;
use crate::sync::SyncOptions;

/// Validated settings for a sync run.
pub struct Config {
    pub directory: PathBuf,
    pub credentials: PathBuf,
    pub api_base: String,
    pub groups: Vec<i64>,
    pub members: Vec<i64>,

    pub page_delay: Duration,
    pub auth_timeout: Duration,
    pub concurrency: usize,
    pub page_size: u32,

    pub include_inactive: bool,
    pub skip_media: bool,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("directory", &self.directory)
            .field("credentials", &self.credentials)
            .field("api_base", &self.api_base)
            .field("concurrency", &self.concurrency)
            .field("groups", &self.groups)
            .field("members", &self.members)
            .finish_non_exhaustive()
    }
}

pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn from_cli(args: SyncArgs) -> anyhow::Result<Self> {
        if args.concurrency == 0 {
            anyhow::bail!("--concurrency must be at least 1");
        }
        if args.page_size == 0 {
            anyhow::bail!("--page-size must be at least 1");
        }
        if args.auth_timeout == 0 {
            anyhow::bail!("--auth-timeout must be at least 1 second");
        }
        if url::Url::parse(&args.api_base).is_err() {
            anyhow::bail!("--api-base is not a valid URL: {}", args.api_base);
        }

        Ok(Self {
            directory: expand_tilde(&args.directory),
            credentials: expand_tilde(&args.credentials),
            api_base: args.api_base,
            groups: args.groups,
            members: args.members,
            page_delay: Duration::from_millis(args.page_delay_ms),
            auth_timeout: Duration::from_secs(args.auth_timeout),
            concurrency: args.concurrency,
            page_size: args.page_size,
            include_inactive: args.include_inactive,
            skip_media: args.skip_media,
            no_progress_bar: args.no_progress_bar,
        })
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            fetch: FetchOptions {
                page_size: self.page_size,
                page_delay: self.page_delay,
            },
            skip_media: self.skip_media,
        }
    }

    pub fn wants_group(&self, group_id: i64) -> bool {
        self.groups.is_empty() || self.groups.contains(&group_id)
    }

    pub fn wants_member(&self, member_id: i64) -> bool {
        self.members.is_empty() || self.members.contains(&member_id)
    }
}
