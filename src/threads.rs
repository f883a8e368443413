//! Thread reconstruction: fold reply chains of the flat posts table into threads.
//!
//! Roots are posts whose parent is not in the table. Every merge pass walks the remaining
//! posts in input order and lets each thread tail accept at most one child (the lowest input
//! index wins), then moves the tail. Passes repeat until one merges nothing.

use crate::cancel::CancelToken;
use crate::config::BranchPolicy;
use crate::extract::ensure_parent_dir;
use crate::pipeline::Tetl;
use crate::post::Post;
use crate::tsv::{read_records, write_table_atomic, TsvRecord};
use crate::util::init_tracing_once;
use ahash::{AHashMap, AHashSet};
use anyhow::Result;
use std::borrow::Cow;
use std::collections::hash_map::Entry;

/// A chain of posts, root first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Thread {
    pub root_id: String,
    /// Parent reference of the root (points outside the table, or empty).
    pub parent_id: String,
    pub created_at: String,
    pub last_id: String,
    pub text: String,
    pub urls: String,
    pub max_likes: u64,
    pub max_shares: u64,
    pub length: usize,
    /// Member ids in chain order.
    pub members: Vec<String>,
}

impl Thread {
    fn seed(post: &Post) -> Self {
        Self {
            root_id: post.id.clone(),
            parent_id: post.parent_id.clone(),
            created_at: post.created_at.clone(),
            last_id: post.id.clone(),
            text: post.text.clone(),
            urls: post.urls.clone(),
            max_likes: post.likes,
            max_shares: post.shares,
            length: 1,
            members: vec![post.id.clone()],
        }
    }

    fn append(&mut self, post: &Post, separator: &str) {
        self.text.push_str(separator);
        self.text.push_str(&post.text);
        if !post.urls.is_empty() {
            if !self.urls.is_empty() {
                self.urls.push(',');
            }
            self.urls.push_str(&post.urls);
        }
        self.max_likes = self.max_likes.max(post.likes);
        self.max_shares = self.max_shares.max(post.shares);
        self.last_id = post.id.clone();
        self.length += 1;
        self.members.push(post.id.clone());
    }
}

impl TsvRecord for Thread {
    const HEADER: &'static [&'static str] =
        &["root_id", "parent_id", "created_at", "last_id", "length", "max_likes", "max_shares", "urls", "text"];

    fn to_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.root_id.as_str()),
            Cow::Borrowed(self.parent_id.as_str()),
            Cow::Borrowed(self.created_at.as_str()),
            Cow::Borrowed(self.last_id.as_str()),
            Cow::Owned(self.length.to_string()),
            Cow::Owned(self.max_likes.to_string()),
            Cow::Owned(self.max_shares.to_string()),
            Cow::Borrowed(self.urls.as_str()),
            Cow::Borrowed(self.text.as_str()),
        ]
    }
}

/// Result of a reconstruction. Every distinct input post ends up in exactly one of
/// `threads` (as a member), `singletons` or `orphans`.
#[derive(Clone, Debug, Default)]
pub struct ThreadReport {
    /// Threads with at least two members, in root input order.
    pub threads: Vec<Thread>,
    /// Roots that never gained a child (pruned from `threads`).
    pub singletons: Vec<String>,
    /// Posts whose parent is in the table but that never joined a thread.
    pub orphans: Vec<Post>,
    pub passes: usize,
    /// Input rows dropped because their id was already seen.
    pub duplicates: usize,
    pub cancelled: bool,
}

struct Builder<'p> {
    posts: &'p [Post],
    separator: &'p str,
    threads: Vec<Thread>,
    /// Current `last_id` of every thread → thread index.
    tails: AHashMap<&'p str, usize>,
    /// Post indices not yet in a thread, ascending.
    queue: Vec<usize>,
    consumed: Vec<bool>,
    passes: usize,
}

impl<'p> Builder<'p> {
    fn seed(&mut self, i: usize) {
        let posts = self.posts;
        let post = &posts[i];
        self.tails.insert(post.id.as_str(), self.threads.len());
        self.threads.push(Thread::seed(post));
        self.consumed[i] = true;
    }

    /// One pass over the queue. Returns the number of merges.
    fn merge_pass(&mut self) -> usize {
        let posts = self.posts;
        let mut winners: AHashMap<usize, usize> = AHashMap::new();
        let mut rest = Vec::with_capacity(self.queue.len());
        for &i in &self.queue {
            if let Some(&t) = self.tails.get(posts[i].parent_id.as_str()) {
                // The queue is ascending, so the first claimant is the lowest index.
                if let Entry::Vacant(slot) = winners.entry(t) {
                    slot.insert(i);
                    continue;
                }
            }
            rest.push(i);
        }

        let mut merges: Vec<(usize, usize)> = winners.into_iter().collect();
        merges.sort_unstable_by_key(|&(_, i)| i);
        for &(t, i) in &merges {
            let thread = &mut self.threads[t];
            self.tails.remove(thread.last_id.as_str());
            thread.append(&posts[i], self.separator);
            self.tails.insert(posts[i].id.as_str(), t);
            self.consumed[i] = true;
        }
        self.queue = rest;
        self.passes += 1;
        merges.len()
    }

    /// Merge until a pass changes nothing. Returns false if cancelled first.
    fn merge_to_fixpoint(&mut self, cancel: Option<&CancelToken>) -> bool {
        loop {
            if cancel.map_or(false, |c| c.is_cancelled()) {
                return false;
            }
            let merged = self.merge_pass();
            tracing::debug!(
                pass = self.passes, merged,
                "Now {} threads, have {} posts remaining", self.threads.len(), self.queue.len()
            );
            if merged == 0 {
                return true;
            }
        }
    }
}

/// Rebuild threads from a complete collection of posts.
///
/// With `BranchPolicy::SplitBranches`, once the merge settles, remaining posts whose parent
/// already sits in a thread (losing siblings) become roots themselves and merging resumes.
pub fn reconstruct_threads(
    posts: &[Post],
    separator: &str,
    policy: BranchPolicy,
    cancel: Option<&CancelToken>,
) -> ThreadReport {
    let mut index_of: AHashMap<&str, usize> = AHashMap::with_capacity(posts.len());
    let mut unique: Vec<usize> = Vec::with_capacity(posts.len());
    let mut duplicates = 0usize;
    for (i, p) in posts.iter().enumerate() {
        if let Entry::Vacant(slot) = index_of.entry(p.id.as_str()) {
            slot.insert(i);
            unique.push(i);
        } else {
            tracing::warn!(id = %p.id, "duplicate post id; keeping the first occurrence");
            duplicates += 1;
        }
    }

    let mut b = Builder {
        posts,
        separator,
        threads: Vec::new(),
        tails: AHashMap::new(),
        queue: Vec::new(),
        consumed: vec![false; posts.len()],
        passes: 0,
    };

    for i in unique {
        if index_of.contains_key(posts[i].parent_id.as_str()) {
            b.queue.push(i);
        } else {
            b.seed(i);
        }
    }
    tracing::info!("Found {} thread starters, have {} posts remaining", b.threads.len(), b.queue.len());

    let mut cancelled = false;
    loop {
        if !b.merge_to_fixpoint(cancel) {
            cancelled = true;
            break;
        }
        if policy != BranchPolicy::SplitBranches || b.queue.is_empty() {
            break;
        }
        let (promote, keep): (Vec<usize>, Vec<usize>) = b.queue.iter().partition(|&&i| {
            index_of.get(posts[i].parent_id.as_str()).map_or(false, |&p| b.consumed[p])
        });
        if promote.is_empty() {
            break;
        }
        tracing::debug!(promoted = promote.len(), "promoting sibling replies to thread roots");
        b.queue = keep;
        for i in promote {
            b.seed(i);
        }
    }

    let Builder { threads, queue, passes, .. } = b;
    let mut singletons = Vec::new();
    let mut kept = Vec::with_capacity(threads.len());
    for t in threads {
        if t.length > 1 {
            kept.push(t);
        } else {
            singletons.push(t.root_id);
        }
    }

    ThreadReport {
        threads: kept,
        singletons,
        orphans: queue.into_iter().map(|i| posts[i].clone()).collect(),
        passes,
        duplicates,
        cancelled,
    }
}

impl Tetl {
    /// Read the posts table, rebuild threads and write the threads table (and the orphan
    /// report, when enabled). Both tables are written once, in full; a cancelled run writes
    /// nothing and returns the partial report.
    pub fn build_threads(&self, cancel: &CancelToken) -> Result<ThreadReport> {
        init_tracing_once();
        let (posts, skipped) = read_records::<Post>(&self.opts.posts_path, self.opts.read_buffer_bytes)?;
        tracing::info!("Loaded {} posts ({} unreadable rows skipped)", posts.len(), skipped);

        let report = reconstruct_threads(&posts, &self.opts.thread_separator, self.opts.branch_policy, Some(cancel));
        if report.cancelled {
            tracing::warn!("thread reconstruction cancelled after {} passes; nothing written", report.passes);
            return Ok(report);
        }

        ensure_parent_dir(&self.opts.threads_path)?;
        write_table_atomic(&self.opts.threads_path, &report.threads, self.opts.write_buffer_bytes)?;
        if self.opts.write_orphans {
            ensure_parent_dir(&self.opts.orphans_path)?;
            write_table_atomic(&self.opts.orphans_path, &report.orphans, self.opts.write_buffer_bytes)?;
        }

        tracing::info!(
            "Final: have {} threads, {} single posts, {} posts remaining ({} passes)",
            report.threads.len(),
            report.singletons.len(),
            report.orphans.len(),
            report.passes
        );
        for p in &report.orphans {
            tracing::debug!(id = %p.id, parent_id = %p.parent_id, "remaining post");
        }
        Ok(report)
    }
}

/// Ids present in more than one place of a report; empty when the partition holds.
pub fn overlapping_ids(report: &ThreadReport) -> Vec<String> {
    let mut seen: AHashSet<&str> = AHashSet::new();
    let mut dup = Vec::new();
    let all = report
        .threads
        .iter()
        .flat_map(|t| t.members.iter().map(String::as_str))
        .chain(report.singletons.iter().map(String::as_str))
        .chain(report.orphans.iter().map(|p| p.id.as_str()));
    for id in all {
        if !seen.insert(id) {
            dup.push(id.to_string());
        }
    }
    dup
}
