use clap::{Args, Parser, Subcommand};

use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "msgsync-rs",
    about = "Incrementally back up group message timelines and their media",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Arguments for the implicit `sync` command
    #[command(flatten)]
    pub sync: SyncArgs,
}

impl Cli {
    /// The command to run; a bare invocation means `sync`.
    pub fn effective_command(self) -> Command {
        self.command.unwrap_or(Command::Sync(self.sync))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch new messages, merge them into the local export and download media
    Sync(SyncArgs),
    /// Print every stored checkpoint
    Status(StatusArgs),
    /// Delete the sync state so the next run starts from scratch
    ResetState(ResetStateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Output directory for exports, media and sync state
    #[arg(short = 'd', long, default_value = "./output")]
    pub directory: String,

    /// Credential bundle written by the login flow
    #[arg(long, default_value = "~/.msgsync-rs/credentials.json")]
    pub credentials: String,

    /// Base URL of the message API
    #[arg(long, env = "MSGSYNC_API_BASE", default_value = crate::api::API_BASE)]
    pub api_base: String,

    /// Number of concurrent media downloads
    #[arg(long, default_value_t = 5)]
    pub concurrency: usize,

    /// Records requested per timeline page
    #[arg(long, default_value_t = 200)]
    pub page_size: u32,

    /// Pause between timeline pages, in milliseconds
    #[arg(long, default_value_t = 500)]
    pub page_delay_ms: u64,

    /// Seconds to wait for credentials before giving up
    #[arg(long, default_value_t = 45)]
    pub auth_timeout: u64,

    /// Only sync these group ids
    #[arg(long = "group")]
    pub groups: Vec<i64>,

    /// Only sync these member ids
    #[arg(long = "member")]
    pub members: Vec<i64>,

    /// Also sync groups whose subscription has lapsed
    #[arg(long)]
    pub include_inactive: bool,

    /// Record media paths but do not download files
    #[arg(long)]
    pub skip_media: bool,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Output directory holding sync_state.json
    #[arg(short = 'd', long, default_value = "./output")]
    pub directory: String,
}

#[derive(Args, Debug, Clone)]
pub struct ResetStateArgs {
    /// Output directory holding sync_state.json
    #[arg(short = 'd', long, default_value = "./output")]
    pub directory: String,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}
