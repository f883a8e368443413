//! Wire shape of a status object. Archive entries (`{"tweet": {...}}`) and the v1.1
//! `statuses/show` response carry the same fields, so both decode through `RawStatus`.
//! Extra fields are ignored by serde.

use crate::date::normalize_timestamp;
use crate::post::{Post, RemotePost};
use crate::text::clean_text;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// Engagement counter: archives store numbers as strings, the API as numbers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
pub enum Counter {
    Number(u64),
    Text(String),
    #[default]
    Null,
}

impl Counter {
    pub fn value(&self) -> Result<u64> {
        match self {
            Counter::Number(n) => Ok(*n),
            Counter::Text(s) if s.trim().is_empty() => Ok(0),
            Counter::Text(s) => s.trim().parse().map_err(|e| anyhow!("invalid counter {s:?}: {e}")),
            Counter::Null => Ok(0),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RawUrl {
    #[serde(default)]
    pub expanded_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawEntities {
    #[serde(default)]
    pub urls: Vec<RawUrl>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawUser {
    #[serde(default)]
    pub screen_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RawStatus {
    pub id_str: String,
    #[serde(default)]
    pub in_reply_to_status_id_str: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub favorite_count: Counter,
    #[serde(default)]
    pub retweet_count: Counter,
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub entities: RawEntities,
    #[serde(default)]
    pub user: Option<RawUser>,
}

impl RawStatus {
    /// Expanded link targets in order, comma-joined, empties skipped.
    pub fn joined_urls(&self) -> String {
        self.entities
            .urls
            .iter()
            .filter_map(|u| u.expanded_url.as_deref())
            .filter(|u| !u.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn into_post(self) -> Result<Post> {
        let created_at = normalize_timestamp(&self.created_at)
            .with_context(|| format!("post {}: created_at", self.id_str))?;
        let likes = self.favorite_count.value().with_context(|| format!("post {}: favorite_count", self.id_str))?;
        let shares = self.retweet_count.value().with_context(|| format!("post {}: retweet_count", self.id_str))?;
        let urls = self.joined_urls();
        Ok(Post {
            parent_id: self.in_reply_to_status_id_str.unwrap_or_default().trim().to_string(),
            text: clean_text(&self.full_text),
            id: self.id_str,
            created_at,
            likes,
            shares,
            urls,
        })
    }

    pub fn into_remote(self) -> Result<RemotePost> {
        let author = self.user.as_ref().map(|u| u.screen_name.clone()).unwrap_or_default();
        Ok(RemotePost { author, post: self.into_post()? })
    }
}
