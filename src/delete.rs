//! Bulk deletion of remote posts listed in a one-column id table.

use crate::cancel::CancelToken;
use crate::lookup::{LookupError, PostRemover};
use crate::pipeline::Tetl;
use crate::progress::make_count_progress;
use crate::tsv::TsvReader;
use crate::util::init_tracing_once;
use anyhow::{anyhow, Result};
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub deleted: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Read the ids from a table whose header is exactly `id`.
pub fn read_delete_ids(path: &Path, buf_bytes: usize) -> Result<Vec<String>> {
    let mut rdr = TsvReader::open(path, buf_bytes)?;
    if rdr.header().len() != 1 || rdr.header()[0] != "id" {
        return Err(anyhow!(
            "{}: expected a single column named \"id\", found {:?}",
            path.display(),
            rdr.header()
        ));
    }
    let mut ids = Vec::new();
    rdr.for_each_row(|row| {
        if let Some(id) = row.get("id").map(str::trim).filter(|s| !s.is_empty()) {
            ids.push(id.to_string());
        }
        Ok(())
    })?;
    Ok(ids)
}

impl Tetl {
    /// Delete every post listed in the configured id table through `remover`.
    ///
    /// Failures are logged and counted; they never stop the run.
    pub fn delete_posts<D: PostRemover + ?Sized>(&self, remover: &D, cancel: &CancelToken) -> Result<DeleteSummary> {
        init_tracing_once();
        let ids = read_delete_ids(&self.opts.delete_ids_path, self.opts.read_buffer_bytes)?;
        tracing::info!("Deleting {} posts listed in {}", ids.len(), self.opts.delete_ids_path.display());

        let pb = if self.opts.progress {
            Some(make_count_progress(
                ids.len() as u64,
                self.opts.progress_label.as_deref().unwrap_or("Deleting posts"),
            ))
        } else {
            None
        };

        let mut summary = DeleteSummary::default();
        for (n, id) in ids.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            if !self.opts.pacing.is_zero() {
                std::thread::sleep(self.opts.pacing);
            }
            match remover.remove(id) {
                Ok(()) => summary.deleted += 1,
                Err(LookupError::Cancelled) => {
                    summary.cancelled = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "could not delete post");
                    summary.failed += 1;
                }
            }
            if (n + 1) % self.opts.delete_progress_every.max(1) == 0 {
                tracing::info!("{} of {} processed", n + 1, ids.len());
            }
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }

        if let Some(pb) = pb {
            pb.finish_with_message(if summary.cancelled { "cancelled" } else { "done" });
        }
        tracing::info!(
            "Deleted {} posts, {} failed{}",
            summary.deleted,
            summary.failed,
            if summary.cancelled { " [cancelled]" } else { "" }
        );
        Ok(summary)
    }
}
