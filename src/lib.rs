mod config;
mod date;
mod paths;
mod archive;
mod progress;
mod util;
mod cancel;
mod pipeline;

mod text;
mod status;
mod post;
mod tsv;

mod extract;
mod threads;
mod lookup;
mod enrich;
mod delete;

pub use crate::config::{BranchPolicy, Credentials, TetlOptions, DEFAULT_API_BASE};
pub use crate::pipeline::Tetl;
pub use crate::cancel::{install_interrupt_handler, CancelToken};
pub use crate::post::{Post, RemotePost};

pub use crate::extract::{EntryRecords, ExtractSummary};
pub use crate::threads::{overlapping_ids, reconstruct_threads, Thread, ThreadReport};
pub use crate::enrich::{select_orphan_replies, EnrichSummary, QAPair};
pub use crate::delete::{read_delete_ids, DeleteSummary};
pub use crate::lookup::{LookupError, PostLookup, PostRemover, RemoveFn, TwitterClient};

// Field cleanup and timestamp helpers, shared by archive entries and remote lookups.
pub use crate::text::{clean_text, decode_entities};
pub use crate::date::{format_iso, normalize_timestamp, parse_post_timestamp};

pub use crate::paths::{discover_archive_parts, ArchivePart};
pub use crate::archive::{open_archive, ArchiveReader};
pub use crate::tsv::{read_records, write_table_atomic, BatchStats, FromTsvRow, TsvBatchWriter, TsvReader, TsvRecord, TsvRow};

// Expose progress helpers.
pub use crate::progress::{make_count_progress, make_progress_bar_labeled};

//export robust file ops from util so binaries can import from crate root.
pub use crate::util::{init_tracing_once, open_with_backoff, create_with_backoff, remove_with_backoff, replace_file_atomic_backoff};
