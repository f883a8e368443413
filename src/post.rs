use crate::tsv::{FromTsvRow, TsvRecord, TsvRow};
use anyhow::{anyhow, Result};
use std::borrow::Cow;

/// One archived post, as written to the flat posts table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    /// Empty when the post is not a reply.
    pub parent_id: String,
    pub created_at: String,
    pub text: String,
    pub likes: u64,
    pub shares: u64,
    /// Expanded link targets, comma-joined.
    pub urls: String,
}

impl Post {
    #[inline]
    pub fn is_reply(&self) -> bool {
        !self.parent_id.is_empty()
    }
}

/// A post fetched from the remote service, with its author handle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemotePost {
    pub author: String,
    pub post: Post,
}

impl TsvRecord for Post {
    const HEADER: &'static [&'static str] = &["created_at", "id", "parent_id", "likes", "shares", "urls", "text"];

    fn to_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.created_at.as_str()),
            Cow::Borrowed(self.id.as_str()),
            Cow::Borrowed(self.parent_id.as_str()),
            Cow::Owned(self.likes.to_string()),
            Cow::Owned(self.shares.to_string()),
            Cow::Borrowed(self.urls.as_str()),
            Cow::Borrowed(self.text.as_str()),
        ]
    }
}

fn parse_count(row: &TsvRow<'_>, name: &str) -> Result<u64> {
    let raw = row.get(name).unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse().map_err(|e| anyhow!("column {name}: invalid count {raw:?}: {e}"))
}

impl FromTsvRow for Post {
    const REQUIRED: &'static [&'static str] = &["id", "parent_id"];

    fn from_row(row: &TsvRow<'_>) -> Result<Self> {
        let id = row.get("id").unwrap_or("").trim();
        if id.is_empty() {
            return Err(anyhow!("empty id"));
        }
        Ok(Post {
            id: id.to_string(),
            parent_id: row.get("parent_id").unwrap_or("").trim().to_string(),
            created_at: row.get("created_at").unwrap_or("").to_string(),
            text: row.get("text").unwrap_or("").to_string(),
            likes: parse_count(row, "likes")?,
            shares: parse_count(row, "shares")?,
            urls: row.get("urls").unwrap_or("").to_string(),
        })
    }
}
