//! Reply enrichment: pair every reply whose parent is not in the archive with the parent
//! fetched from the remote service.

use crate::cancel::CancelToken;
use crate::extract::ensure_parent_dir;
use crate::lookup::{LookupError, PostLookup};
use crate::pipeline::Tetl;
use crate::post::{Post, RemotePost};
use crate::progress::make_count_progress;
use crate::tsv::{read_records, TsvBatchWriter, TsvRecord};
use crate::util::{excerpt, init_tracing_once};
use ahash::AHashSet;
use anyhow::Result;
use std::borrow::Cow;

/// A remote parent ("op") and the local reply to it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QAPair {
    pub op_date: String,
    pub op_user: String,
    pub op_post: String,
    pub op_id: String,
    pub op_urls: String,
    pub op_likes: u64,
    pub op_shares: u64,
    pub reply_date: String,
    pub reply_post: String,
    pub reply_urls: String,
    pub reply_id: String,
    pub reply_likes: u64,
    pub reply_shares: u64,
}

impl QAPair {
    pub fn new(op: &RemotePost, reply: &Post) -> Self {
        Self {
            op_date: op.post.created_at.clone(),
            op_user: op.author.clone(),
            op_post: op.post.text.clone(),
            op_id: op.post.id.clone(),
            op_urls: op.post.urls.clone(),
            op_likes: op.post.likes,
            op_shares: op.post.shares,
            reply_date: reply.created_at.clone(),
            reply_post: reply.text.clone(),
            reply_urls: reply.urls.clone(),
            reply_id: reply.id.clone(),
            reply_likes: reply.likes,
            reply_shares: reply.shares,
        }
    }
}

impl TsvRecord for QAPair {
    const HEADER: &'static [&'static str] = &[
        "op_date", "op_user", "op_post", "op_id", "op_urls",
        "reply_date", "reply_post", "reply_urls", "reply_id",
        "op_likes", "op_shares", "reply_likes", "reply_shares",
    ];

    fn to_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.op_date.as_str()),
            Cow::Borrowed(self.op_user.as_str()),
            Cow::Borrowed(self.op_post.as_str()),
            Cow::Borrowed(self.op_id.as_str()),
            Cow::Borrowed(self.op_urls.as_str()),
            Cow::Borrowed(self.reply_date.as_str()),
            Cow::Borrowed(self.reply_post.as_str()),
            Cow::Borrowed(self.reply_urls.as_str()),
            Cow::Borrowed(self.reply_id.as_str()),
            Cow::Owned(self.op_likes.to_string()),
            Cow::Owned(self.op_shares.to_string()),
            Cow::Owned(self.reply_likes.to_string()),
            Cow::Owned(self.reply_shares.to_string()),
        ]
    }
}

/// Replies whose parent id does not appear among the local ids, in input order.
/// Repeated ids keep their first occurrence only.
pub fn select_orphan_replies(posts: &[Post]) -> Vec<&Post> {
    let ids: AHashSet<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    let mut seen: AHashSet<&str> = AHashSet::with_capacity(posts.len());
    posts
        .iter()
        .filter(|p| {
            if !seen.insert(p.id.as_str()) {
                tracing::warn!(id = %p.id, "duplicate post id; keeping the first occurrence");
                return false;
            }
            p.is_reply() && !ids.contains(p.parent_id.as_str())
        })
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    /// Orphan replies found in the posts table.
    pub candidates: usize,
    /// Candidates passed over because of the resume offset.
    pub skipped: usize,
    /// Lookups attempted.
    pub processed: usize,
    /// QA pairs written.
    pub written: u64,
    pub failed: usize,
    pub batches: u64,
    pub cancelled: bool,
}

impl Tetl {
    /// Read the posts table, resolve every orphan reply's parent through `lookup` and append
    /// the resulting pairs to the QA table.
    pub fn build_qa_pairs<L: PostLookup + ?Sized>(&self, lookup: &L, cancel: &CancelToken) -> Result<EnrichSummary> {
        init_tracing_once();
        let (posts, skipped_rows) = read_records::<Post>(&self.opts.posts_path, self.opts.read_buffer_bytes)?;
        tracing::info!("Loaded {} posts ({} unreadable rows skipped)", posts.len(), skipped_rows);
        self.enrich_posts(&posts, lookup, cancel)
    }

    /// Enrich an in-memory collection of posts.
    ///
    /// Each lookup is preceded by the pacing delay and a cancellation check. A failed lookup
    /// is logged with the parent id, reply id and a text excerpt, optionally recorded in the
    /// failures table, and skipped. Pairs are flushed every `qa_batch` rows. With a non-zero
    /// `qa_skip`, the first candidates are passed over and both tables are appended to.
    pub fn enrich_posts<L: PostLookup + ?Sized>(
        &self,
        posts: &[Post],
        lookup: &L,
        cancel: &CancelToken,
    ) -> Result<EnrichSummary> {
        let orphans = select_orphan_replies(posts);
        tracing::info!("Kept {} replies whose parent is not in the archive", orphans.len());

        let skip = self.opts.qa_skip;
        let resume = |p: &std::path::Path| skip > 0 && p.exists();

        ensure_parent_dir(&self.opts.qa_path)?;
        let mut qa: TsvBatchWriter<QAPair> = TsvBatchWriter::new(
            &self.opts.qa_path,
            self.opts.qa_batch,
            self.opts.write_buffer_bytes,
            resume(&self.opts.qa_path),
        );
        let mut failures: Option<TsvBatchWriter<Post>> = if self.opts.record_failures {
            ensure_parent_dir(&self.opts.qa_failed_path)?;
            Some(TsvBatchWriter::new(
                &self.opts.qa_failed_path,
                self.opts.qa_batch,
                self.opts.write_buffer_bytes,
                resume(&self.opts.qa_failed_path),
            ))
        } else {
            None
        };

        let mut summary = EnrichSummary { candidates: orphans.len(), ..Default::default() };
        let pb = if self.opts.progress {
            Some(make_count_progress(
                orphans.len().saturating_sub(skip) as u64,
                self.opts.progress_label.as_deref().unwrap_or("Resolving parents"),
            ))
        } else {
            None
        };

        for (n, reply) in orphans.iter().enumerate() {
            let line = n + 1;
            if line <= skip {
                summary.skipped += 1;
                continue;
            }
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            if !self.opts.pacing.is_zero() {
                std::thread::sleep(self.opts.pacing);
                if cancel.is_cancelled() {
                    summary.cancelled = true;
                    break;
                }
            }
            summary.processed += 1;
            if line % self.opts.progress_every.max(1) == 0 {
                tracing::info!("Last ID: {}, line: {} of {}", reply.id, line, orphans.len());
            }

            match lookup.resolve(&reply.parent_id) {
                Ok(op) => qa.push(QAPair::new(&op, reply))?,
                Err(LookupError::Cancelled) => {
                    summary.processed -= 1;
                    summary.cancelled = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        parent_id = %reply.parent_id,
                        reply_id = %reply.id,
                        text = %excerpt(&reply.text, 40),
                        error = %e,
                        "Couldn't fetch parent"
                    );
                    summary.failed += 1;
                    if let Some(f) = failures.as_mut() {
                        f.push((*reply).clone())?;
                    }
                }
            }
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }

        let stats = qa.finish()?;
        summary.written = stats.rows;
        summary.batches = stats.batches;
        if let Some(f) = failures {
            f.finish()?;
        }

        if let Some(pb) = pb {
            pb.finish_with_message(if summary.cancelled { "cancelled" } else { "done" });
        }
        tracing::info!(
            "QA: {} candidates, {} skipped, {} looked up, {} written, {} failed{}",
            summary.candidates,
            summary.skipped,
            summary.processed,
            summary.written,
            summary.failed,
            if summary.cancelled { " [cancelled]" } else { "" }
        );
        Ok(summary)
    }
}
