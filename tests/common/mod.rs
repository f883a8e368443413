#![allow(dead_code)]

use serde_json::{json, Value};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tetl::{Post, Tetl};

pub const CREATED_AT: &str = "Wed Oct 10 20:19:24 +0000 2018";
pub const CREATED_ISO: &str = "2018-10-10T20:19:24+00:00";

/// An archive status object the way the export stores it (counts as strings).
pub fn tweet(id: &str, parent: Option<&str>, text: &str, likes: u64, urls: &[&str]) -> Value {
    let mut v = json!({
        "retweeted": false,
        "source": "<a href=\"https://mobile.twitter.com\" rel=\"nofollow\">Twitter Web App</a>",
        "entities": {
            "hashtags": [],
            "symbols": [],
            "user_mentions": [],
            "urls": urls.iter().map(|u| json!({"url": "https://t.co/x", "expanded_url": u})).collect::<Vec<_>>()
        },
        "display_text_range": ["0", "140"],
        "favorite_count": likes.to_string(),
        "id_str": id,
        "truncated": false,
        "retweet_count": "1",
        "id": id,
        "created_at": CREATED_AT,
        "favorited": false,
        "full_text": text,
        "lang": "en"
    });
    if let Some(p) = parent {
        v["in_reply_to_status_id_str"] = json!(p);
        v["in_reply_to_status_id"] = json!(p);
    }
    v
}

/// Render entries as an archive part: assignment line, one `{ "tweet" : {...} }` block per
/// entry, closing `]` only when `closed`.
pub fn render_archive(entries: &[Value], closed: bool) -> String {
    let mut out = String::from("window.YTD.tweets.part0 = [\n");
    for (i, e) in entries.iter().enumerate() {
        out.push_str("  {\n");
        let pretty = serde_json::to_string_pretty(e).unwrap();
        let mut lines = pretty.lines();
        lines.next(); // opening brace, merged into the marker line
        out.push_str("    \"tweet\" : {\n");
        for l in lines {
            out.push_str("    ");
            out.push_str(l);
            out.push('\n');
        }
        out.push_str(if i + 1 < entries.len() { "  },\n" } else { "  }\n" });
    }
    if closed {
        out.push_str("]");
    }
    out
}

pub fn write_archive(path: &Path, entries: &[Value]) {
    write_text(path, &render_archive(entries, true));
}

pub fn write_text(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

pub fn write_archive_zst(path: &Path, entries: &[Value]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    enc.write_all(render_archive(entries, true).as_bytes()).unwrap();
    enc.finish().unwrap();
}

/// Read a text file line-by-line into strings (skips empty lines).
pub fn read_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    let r = BufReader::new(f);
    r.lines().map(|l| l.unwrap()).filter(|s| !s.is_empty()).collect()
}

/// Data rows of a TSV table, split into fields (header dropped).
pub fn read_rows(path: &Path) -> Vec<Vec<String>> {
    read_lines(path).into_iter().skip(1).map(|l| l.split('\t').map(str::to_string).collect()).collect()
}

pub fn post(id: &str, parent: &str, text: &str, likes: u64) -> Post {
    Post {
        id: id.to_string(),
        parent_id: parent.to_string(),
        created_at: CREATED_ISO.to_string(),
        text: text.to_string(),
        likes,
        shares: 0,
        urls: String::new(),
    }
}

/// A temp workspace with `data/` (archive) and `out/` (tables) and a quiet pipeline rooted there.
pub fn workspace() -> (tempfile::TempDir, Tetl) {
    let dir = tempfile::tempdir().unwrap();
    let etl = Tetl::new()
        .archive_dir(dir.path().join("data"))
        .output_dir(dir.path().join("out"))
        .pacing(std::time::Duration::ZERO)
        .progress(false);
    (dir, etl)
}

pub fn data_dir(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("data")
}
