//! Timestamp normalization: archive/API dates in, sortable ISO-8601 out.

use anyhow::{anyhow, Result};
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::macros::format_description;
use time::OffsetDateTime;

/// Parse a post timestamp. Accepts, in order:
/// - the archive/API form `Wed Oct 10 20:19:24 +0000 2018`
/// - RFC 2822 (`Wed, 10 Oct 2018 20:19:24 +0000`)
/// - RFC 3339 (already normalized values)
pub fn parse_post_timestamp(s: &str) -> Result<OffsetDateTime> {
    let s = s.trim();
    let archive_fmt = format_description!(
        "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute] [year]"
    );
    if let Ok(dt) = OffsetDateTime::parse(s, archive_fmt) {
        return Ok(dt);
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return Ok(dt);
    }
    OffsetDateTime::parse(s, &Rfc3339).map_err(|e| anyhow!("unrecognized timestamp {s:?}: {e}"))
}

/// Render as `YYYY-MM-DDTHH:MM:SS+HH:MM`, keeping the source offset.
/// Lexicographic order equals chronological order for a fixed offset.
pub fn format_iso(dt: OffsetDateTime) -> Result<String> {
    let iso_fmt = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
    );
    Ok(dt.format(iso_fmt)?)
}

/// Normalize a raw timestamp string. Empty input stays empty.
pub fn normalize_timestamp(raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        return Ok(String::new());
    }
    format_iso(parse_post_timestamp(raw)?)
}
