use crate::config::{BranchPolicy, TetlOptions};
use std::path::Path;
use std::time::Duration;

/// Entry point for every stage: `extract_archive`, `build_threads`, `build_qa_pairs` and
/// `delete_posts` are implemented next to their stage modules.
#[derive(Clone, Default)]
pub struct Tetl {
    pub(crate) opts: TetlOptions,
}

impl Tetl {
    pub fn new() -> Self {
        Self { opts: TetlOptions::default() }
    }

    pub fn with_options(opts: TetlOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &TetlOptions {
        &self.opts
    }

    // -------- Builder methods --------
    pub fn archive_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_archive_dir(dir); self }
    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_output_dir(dir); self }
    pub fn posts_path(mut self, p: impl AsRef<Path>) -> Self { self.opts = self.opts.with_posts_path(p); self }
    pub fn threads_path(mut self, p: impl AsRef<Path>) -> Self { self.opts = self.opts.with_threads_path(p); self }
    pub fn orphans_path(mut self, p: impl AsRef<Path>) -> Self { self.opts = self.opts.with_orphans_path(p); self }
    pub fn qa_path(mut self, p: impl AsRef<Path>) -> Self { self.opts = self.opts.with_qa_path(p); self }
    pub fn qa_failed_path(mut self, p: impl AsRef<Path>) -> Self { self.opts = self.opts.with_qa_failed_path(p); self }
    pub fn delete_ids_path(mut self, p: impl AsRef<Path>) -> Self { self.opts = self.opts.with_delete_ids_path(p); self }
    pub fn entry_marker(mut self, key: impl Into<String>) -> Self { self.opts = self.opts.with_entry_marker(key); self }
    pub fn extract_batch(mut self, n: usize) -> Self { self.opts = self.opts.with_extract_batch(n); self }
    pub fn qa_batch(mut self, n: usize) -> Self { self.opts = self.opts.with_qa_batch(n); self }
    pub fn pacing(mut self, d: Duration) -> Self { self.opts = self.opts.with_pacing(d); self }
    pub fn progress_every(mut self, n: usize) -> Self { self.opts = self.opts.with_progress_every(n); self }
    pub fn delete_progress_every(mut self, n: usize) -> Self { self.opts = self.opts.with_delete_progress_every(n); self }
    pub fn thread_separator(mut self, sep: impl Into<String>) -> Self { self.opts = self.opts.with_thread_separator(sep); self }
    pub fn branch_policy(mut self, policy: BranchPolicy) -> Self { self.opts = self.opts.with_branch_policy(policy); self }
    pub fn qa_skip(mut self, n: usize) -> Self { self.opts = self.opts.with_qa_skip(n); self }
    pub fn record_failures(mut self, yes: bool) -> Self { self.opts = self.opts.with_record_failures(yes); self }
    pub fn write_orphans(mut self, yes: bool) -> Self { self.opts = self.opts.with_write_orphans(yes); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self { self.opts = self.opts.with_io_buffers(read_bytes, write_bytes); self }
}
