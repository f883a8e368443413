//! Record extraction from archive part files.
//!
//! An archive part is a JavaScript assignment wrapping a JSON array:
//!
//! ```text
//! window.YTD.tweets.part0 = [
//!   {
//!     "tweet" : {
//!       ...
//!     }
//!   },
//!   {
//!     "tweet" : {
//! ```
//!
//! The file is never parsed as a whole. `EntryRecords` reads it line by line through a small
//! state machine (`Preamble → Collecting → Done`). A line whose trimmed text starts with the
//! quoted entry marker opens a new entry; a lone `]` ends the collection; end of input is a
//! synthetic closing boundary. Each closed entry has the wrapper punctuation around it removed,
//! is re-wrapped as `{ ... }` and decoded as one JSON object.

use crate::cancel::CancelToken;
use crate::paths::{discover_archive_parts, stem_for_marker};
use crate::pipeline::Tetl;
use crate::post::Post;
use crate::progress::{make_progress_bar_labeled, total_size};
use crate::archive::open_archive;
use crate::status::RawStatus;
use crate::tsv::TsvBatchWriter;
use crate::util::init_tracing_once;
use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Boundary {
    EntryStart,
    CollectionEnd,
    EndOfInput,
}

enum State {
    /// Before the first entry marker (assignment line, opening brackets).
    Preamble,
    /// Lines of the currently open entry, starting with its marker line.
    Collecting(Vec<String>),
    Done,
}

/// Lazy sequence of posts decoded from one archive part.
pub struct EntryRecords<R: BufRead> {
    reader: R,
    key: String,
    marker: String,
    state: State,
    cancel: Option<CancelToken>,
    line: String,
    lines_read: u64,
    entries: u64,
    cancelled: bool,
}

impl<R: BufRead> EntryRecords<R> {
    /// `key` is the object key that opens every entry (`tweet` for tweet archives).
    pub fn new(reader: R, key: &str) -> Self {
        Self {
            reader,
            key: key.to_string(),
            marker: format!("\"{key}\""),
            state: State::Preamble,
            cancel: None,
            line: String::with_capacity(4 * 1024),
            lines_read: 0,
            entries: 0,
            cancelled: false,
        }
    }

    /// Poll `token` once per line; once set, the open entry is dropped and iteration ends.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    fn classify(&self) -> Option<Boundary> {
        let t = self.line.trim();
        if t.starts_with(&self.marker) {
            Some(Boundary::EntryStart)
        } else if t == "]" || t == "];" {
            Some(Boundary::CollectionEnd)
        } else {
            None
        }
    }

    /// Strip wrapper punctuation from a finished entry and decode it.
    fn close_entry(&mut self, mut lines: Vec<String>, boundary: Boundary) -> Result<Post> {
        self.entries += 1;
        let at = self.lines_read;
        let entry_no = self.entries;

        pop_blank(&mut lines);
        // Before an EntryStart, the buffer ends with the next entry's `{`.
        if boundary == Boundary::EntryStart && lines.last().map(|l| l.trim()) == Some("{") {
            lines.pop();
            pop_blank(&mut lines);
        }
        match lines.last().map(|l| l.trim()) {
            Some("}") | Some("},") => {
                lines.pop();
            }
            other => {
                return Err(anyhow!(
                    "entry {entry_no} ending near line {at}: expected closing brace, found {:?}",
                    other.unwrap_or("<nothing>")
                ));
            }
        }

        let mut json = String::with_capacity(lines.iter().map(|l| l.len()).sum::<usize>() + 2);
        json.push('{');
        for l in &lines {
            json.push_str(l);
        }
        json.push('}');

        let mut obj: Map<String, Value> = serde_json::from_str(&json)
            .with_context(|| format!("entry {entry_no} ending near line {at}: invalid JSON"))?;
        let inner = obj
            .remove(&self.key)
            .ok_or_else(|| anyhow!("entry {entry_no} ending near line {at}: missing {:?} object", self.key))?;
        let raw: RawStatus = serde_json::from_value(inner)
            .with_context(|| format!("entry {entry_no} ending near line {at}: unexpected shape"))?;
        raw.into_post().with_context(|| format!("entry {entry_no} ending near line {at}"))
    }
}

fn pop_blank(lines: &mut Vec<String>) {
    while lines.last().map_or(false, |l| l.trim().is_empty()) {
        lines.pop();
    }
}

impl<R: BufRead> Iterator for EntryRecords<R> {
    type Item = Result<Post>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if matches!(self.state, State::Done) {
                return None;
            }
            if self.cancel.as_ref().map_or(false, |c| c.is_cancelled()) {
                self.cancelled = true;
                self.state = State::Done;
                return None;
            }

            self.line.clear();
            let event = match self.reader.read_line(&mut self.line) {
                Ok(0) => Some(Boundary::EndOfInput),
                Ok(_) => {
                    self.lines_read += 1;
                    self.classify()
                }
                Err(e) => {
                    self.state = State::Done;
                    return Some(Err(anyhow!(e).context(format!("read error after line {}", self.lines_read))));
                }
            };

            match (std::mem::replace(&mut self.state, State::Done), event) {
                (State::Preamble, None) => self.state = State::Preamble,
                (State::Preamble, Some(Boundary::EntryStart)) => {
                    self.state = State::Collecting(vec![self.line.clone()]);
                }
                // Empty collection: nothing to emit.
                (State::Preamble, Some(_)) => return None,
                (State::Collecting(mut buf), None) => {
                    buf.push(self.line.clone());
                    self.state = State::Collecting(buf);
                }
                (State::Collecting(buf), Some(boundary)) => {
                    if boundary == Boundary::EntryStart {
                        self.state = State::Collecting(vec![self.line.clone()]);
                    }
                    let rec = self.close_entry(buf, boundary);
                    if rec.is_err() {
                        self.state = State::Done;
                    }
                    return Some(rec);
                }
                (State::Done, _) => return None,
            }
        }
    }
}

/// Outcome of an extraction run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub parts: usize,
    pub lines: u64,
    pub records: u64,
    pub batches: u64,
    pub cancelled: bool,
}

impl Tetl {
    /// Extract every archive part found in the configured archive directory into the
    /// posts table.
    pub fn extract_archive(&self, cancel: &CancelToken) -> Result<ExtractSummary> {
        let stem = stem_for_marker(&self.opts.entry_marker);
        let parts: Vec<PathBuf> = discover_archive_parts(&self.opts.archive_dir, &stem)
            .into_iter()
            .map(|p| p.path)
            .collect();
        if parts.is_empty() {
            return Err(anyhow!(
                "no {stem}.js archive files found in {}",
                self.opts.archive_dir.display()
            ));
        }
        tracing::info!("Planned {} archive file(s) for extraction.", parts.len());
        self.extract_files(&parts, &self.opts.posts_path, cancel)
    }

    /// Extract the given archive files, in order, into a fresh posts table at `out`.
    /// Records are flushed every `extract_batch` posts; on cancellation the records completed
    /// so far are flushed and the summary is marked `cancelled`.
    pub fn extract_files(&self, parts: &[PathBuf], out: &Path, cancel: &CancelToken) -> Result<ExtractSummary> {
        init_tracing_once();
        ensure_parent_dir(out)?;

        let mut writer: TsvBatchWriter<Post> =
            TsvBatchWriter::new(out, self.opts.extract_batch, self.opts.write_buffer_bytes, false);
        let mut summary = ExtractSummary::default();

        let pb = if self.opts.progress {
            Some(make_progress_bar_labeled(
                total_size(parts),
                Some(self.opts.progress_label.as_deref().unwrap_or("Extracting posts")),
            ))
        } else {
            None
        };

        let mut done_bytes = 0u64;
        for path in parts {
            let archive = open_archive(path, self.opts.read_buffer_bytes)?;
            let counter = archive.bytes_read.clone();
            let mut records = EntryRecords::new(archive.reader, &self.opts.entry_marker).with_cancel(cancel.clone());

            for rec in records.by_ref() {
                let post = rec.with_context(|| format!("extracting {}", path.display()))?;
                writer.push(post)?;
                summary.records += 1;
                if let Some(pb) = &pb {
                    pb.set_position(done_bytes + counter.load(Ordering::Relaxed));
                }
            }
            summary.parts += 1;
            summary.lines += records.lines_read();
            done_bytes += counter.load(Ordering::Relaxed);

            if records.was_cancelled() {
                summary.cancelled = true;
                break;
            }
        }

        let stats = writer.finish()?;
        summary.batches = stats.batches;

        if let Some(pb) = pb {
            pb.finish_with_message(if summary.cancelled { "cancelled" } else { "done" });
        }
        tracing::info!(
            "done, processed {} lines for {} posts ({} batches){}",
            summary.lines,
            summary.records,
            summary.batches,
            if summary.cancelled { " [cancelled]" } else { "" }
        );
        Ok(summary)
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
    }
    Ok(())
}
