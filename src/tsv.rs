//! Tab-separated tables: header-addressed reader, batch writer with append-after-first-flush
//! semantics, and an atomic whole-table writer.
//!
//! Fields never contain tabs or line breaks (they are replaced by spaces on write), so rows are
//! written unquoted and split on `\t` when read.

use crate::util::{append_with_backoff, create_with_backoff, open_with_backoff, replace_file_atomic_backoff};
use ahash::AHashMap;
use anyhow::{anyhow, Context, Result};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A row type that can be written as one TSV line, fields in `HEADER` order.
pub trait TsvRecord {
    const HEADER: &'static [&'static str];
    fn to_fields(&self) -> Vec<Cow<'_, str>>;
}

/// A row type that can be rebuilt from a header-addressed TSV line.
pub trait FromTsvRow: Sized {
    /// Columns that must be present in the header for the table to be usable.
    const REQUIRED: &'static [&'static str];
    fn from_row(row: &TsvRow<'_>) -> Result<Self>;
}

/// One data line, addressed by header name.
pub struct TsvRow<'a> {
    columns: &'a AHashMap<String, usize>,
    fields: Vec<&'a str>,
    pub line_no: u64,
}

impl<'a> TsvRow<'a> {
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.columns.get(name).and_then(|&i| self.fields.get(i).copied())
    }
}

/// Replace characters that would break a row.
pub fn sanitize_field(s: &str) -> Cow<'_, str> {
    if s.contains(['\t', '\n', '\r']) {
        Cow::Owned(s.replace(['\t', '\n', '\r'], " "))
    } else {
        Cow::Borrowed(s)
    }
}

fn render_line<R: TsvRecord>(out: &mut Vec<u8>, row: &R) {
    for (i, f) in row.to_fields().iter().enumerate() {
        if i > 0 {
            out.push(b'\t');
        }
        out.extend_from_slice(sanitize_field(f).as_bytes());
    }
    out.push(b'\n');
}

fn render_header<R: TsvRecord>(out: &mut Vec<u8>) {
    out.extend_from_slice(R::HEADER.join("\t").as_bytes());
    out.push(b'\n');
}

/// Render a batch fully in memory; the caller writes it with a single `write_all`.
pub fn render_rows<R: TsvRecord>(rows: &[R], include_header: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(rows.len() * 256 + 128);
    if include_header {
        render_header::<R>(&mut out);
    }
    for r in rows {
        render_line(&mut out, r);
    }
    out
}

// ----------------------------- Reading ------------------------------------

/// Header-addressed TSV reader with buffering.
pub struct TsvReader {
    rdr: BufReader<File>,
    path: PathBuf,
    header: Vec<String>,
    columns: AHashMap<String, usize>,
    line_no: u64,
}

impl TsvReader {
    pub fn open(path: &Path, buf_bytes: usize) -> Result<Self> {
        let f = open_with_backoff(path, 16, 50).with_context(|| format!("open {}", path.display()))?;
        let mut rdr = BufReader::with_capacity(buf_bytes.max(8 * 1024), f);
        let mut first = String::new();
        if rdr.read_line(&mut first)? == 0 {
            return Err(anyhow!("{}: empty table (no header row)", path.display()));
        }
        let first = first.trim_end_matches(['\n', '\r']);
        let header: Vec<String> = first.split('\t').map(|s| s.trim().to_string()).collect();
        let columns = header.iter().enumerate().map(|(i, h)| (h.clone(), i)).collect();
        Ok(Self { rdr, path: path.to_path_buf(), header, columns, line_no: 1 })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn require(&self, names: &[&str]) -> Result<()> {
        let missing: Vec<&str> = names.iter().copied().filter(|n| !self.columns.contains_key(*n)).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("{}: missing column(s): {}", self.path.display(), missing.join(", ")))
        }
    }

    /// Call `f` for every non-empty data row. Rows whose field count differs from the header
    /// are logged and skipped; the number of skipped rows is returned.
    pub fn for_each_row(&mut self, mut f: impl FnMut(&TsvRow<'_>) -> Result<()>) -> Result<u64> {
        let mut skipped = 0u64;
        let mut buf = String::with_capacity(4 * 1024);
        loop {
            buf.clear();
            let n = self.rdr.read_line(&mut buf).with_context(|| format!("read {}", self.path.display()))?;
            if n == 0 {
                break;
            }
            self.line_no += 1;
            let line = buf.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != self.header.len() {
                tracing::warn!(
                    path = %self.path.display(), line = self.line_no,
                    expected = self.header.len(), found = fields.len(),
                    "skipping malformed row"
                );
                skipped += 1;
                continue;
            }
            let row = TsvRow { columns: &self.columns, fields, line_no: self.line_no };
            f(&row)?;
        }
        Ok(skipped)
    }
}

/// Read a whole table into typed records. Rows that fail to convert are logged and skipped.
/// Returns `(records, skipped_rows)`.
pub fn read_records<R: FromTsvRow>(path: &Path, buf_bytes: usize) -> Result<(Vec<R>, u64)> {
    let mut rdr = TsvReader::open(path, buf_bytes)?;
    rdr.require(R::REQUIRED)?;
    let mut out = Vec::new();
    let mut bad = 0u64;
    let malformed = rdr.for_each_row(|row| {
        match R::from_row(row) {
            Ok(r) => out.push(r),
            Err(e) => {
                tracing::warn!(path = %path.display(), line = row.line_no, error = %e, "skipping unreadable row");
                bad += 1;
            }
        }
        Ok(())
    })?;
    Ok((out, malformed + bad))
}

// ----------------------------- Writing ------------------------------------

/// Batched table writer. Rows accumulate in memory and are flushed every `batch_size` rows.
/// The first flush creates (truncates) the file and writes the header; later flushes append.
/// A batch is rendered completely before the file is touched, so an interruption between
/// flushes never leaves a partial row behind.
pub struct TsvBatchWriter<R: TsvRecord> {
    path: PathBuf,
    pending: Vec<R>,
    batch_size: usize,
    write_buf: usize,
    needs_header: bool,
    rows_written: u64,
    batches: u64,
    _row: PhantomData<R>,
}

impl<R: TsvRecord> TsvBatchWriter<R> {
    /// `append == false` starts a fresh table; `append == true` continues an existing one
    /// without writing a header.
    pub fn new(path: &Path, batch_size: usize, write_buf: usize, append: bool) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            path: path.to_path_buf(),
            pending: Vec::with_capacity(batch_size),
            batch_size,
            write_buf: write_buf.max(8 * 1024),
            needs_header: !append,
            rows_written: 0,
            batches: 0,
            _row: PhantomData,
        }
    }

    pub fn push(&mut self, row: R) -> Result<()> {
        self.pending.push(row);
        if self.pending.len() >= self.batch_size {
            self.flush_pending()?;
        }
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let bytes = render_rows(&self.pending, self.needs_header);
        tracing::info!("Writing {} rows to {}", self.pending.len(), self.path.display());
        let file = if self.needs_header {
            create_with_backoff(&self.path, 16, 50)
        } else {
            append_with_backoff(&self.path, 16, 50)
        }
        .with_context(|| format!("open for write {}", self.path.display()))?;
        let mut w = BufWriter::with_capacity(self.write_buf, file);
        w.write_all(&bytes).with_context(|| format!("write {}", self.path.display()))?;
        w.flush().with_context(|| format!("flush {}", self.path.display()))?;
        self.needs_header = false;
        self.rows_written += self.pending.len() as u64;
        self.batches += 1;
        self.pending.clear();
        Ok(())
    }

    /// Flush the tail batch. A fresh table that never received a row still gets its header
    /// so downstream readers see an empty (not stale) table.
    pub fn finish(mut self) -> Result<BatchStats> {
        self.flush_pending()?;
        if self.rows_written == 0 {
            tracing::warn!("no rows for {}", self.path.display());
            if self.needs_header {
                let bytes = render_rows::<R>(&[], true);
                let mut f = create_with_backoff(&self.path, 16, 50)
                    .with_context(|| format!("create {}", self.path.display()))?;
                f.write_all(&bytes)?;
                f.flush()?;
            }
        }
        Ok(BatchStats { rows: self.rows_written, batches: self.batches })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub rows: u64,
    pub batches: u64,
}

/// Write a complete table to a staging file, then atomically promote it to `path`.
pub fn write_table_atomic<R: TsvRecord>(path: &Path, rows: &[R], write_buf: usize) -> Result<()> {
    if rows.is_empty() {
        tracing::warn!("no rows for {}", path.display());
    }
    let file_name = path.file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "table".into());
    let tmp = path.with_file_name(format!("{file_name}.inprogress"));
    tracing::info!("Writing {} rows to {}", rows.len(), path.display());
    {
        let f = create_with_backoff(&tmp, 16, 50).with_context(|| format!("create {}", tmp.display()))?;
        let mut w = BufWriter::with_capacity(write_buf.max(8 * 1024), f);
        w.write_all(&render_rows(rows, true))?;
        w.flush().with_context(|| format!("flush {}", tmp.display()))?;
    }
    replace_file_atomic_backoff(&tmp, path)
}
