use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What happens to a second reply to the same post during thread reconstruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BranchPolicy {
    /// The reply with the lowest input index extends the thread; its siblings stay orphans.
    #[default]
    FirstWins,
    /// Losing siblings are promoted to roots of their own threads once the chain settles.
    SplitBranches,
}

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct TetlOptions {
    pub archive_dir: PathBuf,         // unzipped archive data folder (holds tweets.js)
    pub output_dir: PathBuf,
    pub posts_path: PathBuf,
    pub threads_path: PathBuf,
    pub orphans_path: PathBuf,
    pub qa_path: PathBuf,
    pub qa_failed_path: PathBuf,
    pub delete_ids_path: PathBuf,

    pub entry_marker: String,         // key that opens each archive entry
    pub extract_batch: usize,         // posts per flush
    pub qa_batch: usize,              // QA pairs per flush
    pub pacing: Duration,             // delay before each remote call
    pub progress_every: usize,        // enrichment progress log cadence
    pub delete_progress_every: usize, // deletion progress log cadence
    pub thread_separator: String,
    pub branch_policy: BranchPolicy,
    pub qa_skip: usize,               // resume: skip this many orphan replies, append output
    pub record_failures: bool,        // write failed replies to qa_failed_path
    pub write_orphans: bool,          // write unmatched posts to orphans_path

    pub progress: bool,               // show progress bars
    pub progress_label: Option<String>,

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,
}

impl Default for TetlOptions {
    fn default() -> Self {
        let out = PathBuf::from("output");
        Self {
            archive_dir: PathBuf::from("twitter").join("data"),
            posts_path: out.join("posts.tsv"),
            threads_path: out.join("threads.tsv"),
            orphans_path: out.join("orphans.tsv"),
            qa_path: out.join("qa.tsv"),
            qa_failed_path: out.join("qa_failed.tsv"),
            delete_ids_path: out.join("posts_to_delete.tsv"),
            output_dir: out,

            entry_marker: "tweet".to_string(),
            extract_batch: 200,
            qa_batch: 100,
            pacing: Duration::from_millis(100),
            progress_every: 20,
            delete_progress_every: 100,
            thread_separator: " | ".to_string(),
            branch_policy: BranchPolicy::FirstWins,
            qa_skip: 0,
            record_failures: true,
            write_orphans: true,

            progress: true,
            progress_label: None,

            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,
        }
    }
}

impl TetlOptions {
    pub fn with_archive_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.archive_dir = dir.as_ref().to_path_buf();
        self
    }
    /// Re-roots every output table under `dir`.
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let out = dir.as_ref().to_path_buf();
        self.posts_path = out.join("posts.tsv");
        self.threads_path = out.join("threads.tsv");
        self.orphans_path = out.join("orphans.tsv");
        self.qa_path = out.join("qa.tsv");
        self.qa_failed_path = out.join("qa_failed.tsv");
        self.delete_ids_path = out.join("posts_to_delete.tsv");
        self.output_dir = out;
        self
    }
    pub fn with_posts_path(mut self, p: impl AsRef<Path>) -> Self {
        self.posts_path = p.as_ref().to_path_buf();
        self
    }
    pub fn with_threads_path(mut self, p: impl AsRef<Path>) -> Self {
        self.threads_path = p.as_ref().to_path_buf();
        self
    }
    pub fn with_qa_path(mut self, p: impl AsRef<Path>) -> Self {
        self.qa_path = p.as_ref().to_path_buf();
        self
    }
    pub fn with_orphans_path(mut self, p: impl AsRef<Path>) -> Self {
        self.orphans_path = p.as_ref().to_path_buf();
        self
    }
    pub fn with_qa_failed_path(mut self, p: impl AsRef<Path>) -> Self {
        self.qa_failed_path = p.as_ref().to_path_buf();
        self
    }
    pub fn with_delete_ids_path(mut self, p: impl AsRef<Path>) -> Self {
        self.delete_ids_path = p.as_ref().to_path_buf();
        self
    }
    pub fn with_entry_marker(mut self, key: impl Into<String>) -> Self {
        self.entry_marker = key.into();
        self
    }
    pub fn with_extract_batch(mut self, n: usize) -> Self {
        self.extract_batch = n.max(1);
        self
    }
    pub fn with_qa_batch(mut self, n: usize) -> Self {
        self.qa_batch = n.max(1);
        self
    }
    pub fn with_pacing(mut self, d: Duration) -> Self {
        self.pacing = d;
        self
    }
    pub fn with_progress_every(mut self, n: usize) -> Self {
        self.progress_every = n.max(1);
        self
    }
    pub fn with_delete_progress_every(mut self, n: usize) -> Self {
        self.delete_progress_every = n.max(1);
        self
    }
    pub fn with_thread_separator(mut self, sep: impl Into<String>) -> Self {
        self.thread_separator = sep.into();
        self
    }
    pub fn with_branch_policy(mut self, policy: BranchPolicy) -> Self {
        self.branch_policy = policy;
        self
    }
    pub fn with_qa_skip(mut self, n: usize) -> Self {
        self.qa_skip = n;
        self
    }
    pub fn with_record_failures(mut self, yes: bool) -> Self {
        self.record_failures = yes;
        self
    }
    pub fn with_write_orphans(mut self, yes: bool) -> Self {
        self.write_orphans = yes;
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }
}

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";

/// Remote API credentials, read from the environment (a `.env` file is honored).
/// - TWITTER_API_TOKEN: app bearer token used for lookups
/// - TWITTER_USER_TOKEN: user-context token used for deletions (optional)
/// - TWITTER_API_BASE: API root, defaults to `https://api.twitter.com`
#[derive(Clone)]
pub struct Credentials {
    pub api_token: String,
    pub user_token: Option<String>,
    pub api_base: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_token", &"<redacted>")
            .field("user_token", &self.user_token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let api_token = non_empty_env("TWITTER_API_TOKEN")
            .ok_or_else(|| anyhow!("missing required environment variable: TWITTER_API_TOKEN"))?;
        Ok(Self {
            api_token,
            user_token: non_empty_env("TWITTER_USER_TOKEN"),
            api_base: non_empty_env("TWITTER_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
