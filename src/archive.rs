//! Archive file access: plain or zstd-compressed `.js` parts, read line by line with a
//! shared counter of on-disk bytes consumed (for progress bars).

use crate::util::open_with_backoff;
use anyhow::{Context, Result};
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use zstd::stream::read::Decoder;

/// A `Read` wrapper that counts bytes read from the underlying file.
struct CountingReader<R: Read> {
    inner: R,
    counter: Arc<AtomicU64>,
}
impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// An opened archive part plus a live count of file bytes consumed so far.
pub struct ArchiveReader {
    pub reader: Box<dyn BufRead>,
    pub bytes_read: Arc<AtomicU64>,
}

/// Open `path` for line reading; `.zst` files are decompressed on the fly.
pub fn open_archive(path: &Path, read_buf_bytes: usize) -> Result<ArchiveReader> {
    let file = open_with_backoff(path, 16, 50).with_context(|| format!("open archive {}", path.display()))?;
    let counter = Arc::new(AtomicU64::new(0));
    let counted = CountingReader { inner: file, counter: counter.clone() };
    let cap = read_buf_bytes.max(8 * 1024);

    let is_zst = path.extension().and_then(|e| e.to_str()).map_or(false, |e| e.eq_ignore_ascii_case("zst"));
    let reader: Box<dyn BufRead> = if is_zst {
        let mut decoder = Decoder::new(counted).with_context(|| format!("zstd init {}", path.display()))?;
        decoder.window_log_max(31)?;
        Box::new(BufReader::with_capacity(cap, decoder))
    } else {
        Box::new(BufReader::with_capacity(cap, counted))
    };
    Ok(ArchiveReader { reader, bytes_read: counter })
}
