use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One file of a (possibly split) archive: `tweets.js`, `tweets-part1.js`, ...
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchivePart {
    /// 0 for the unsuffixed base file.
    pub part: u32,
    pub compressed: bool,
    pub path: PathBuf,
}

/// Find `<stem>.js`, `<stem>-partN.js` and their `.zst` variants directly under `dir`,
/// ordered base file first, then by part number. When both a plain and a compressed copy of
/// the same part exist, the plain one is used.
pub fn discover_archive_parts(dir: &Path, stem: &str) -> Vec<ArchivePart> {
    let pattern = format!(r"^{}(?:-part(\d+))?\.js(\.zst)?$", regex::escape(stem));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!(stem, error = %e, "invalid archive stem");
            return Vec::new();
        }
    };
    let mut parts: BTreeMap<u32, ArchivePart> = BTreeMap::new();
    if !dir.exists() {
        return Vec::new();
    }
    for ent in WalkDir::new(dir).min_depth(1).max_depth(1).into_iter().flatten() {
        let Some(name) = ent.file_name().to_str() else { continue };
        let Some(caps) = re.captures(name) else { continue };
        let part = match caps.get(1) {
            Some(m) => match m.as_str().parse::<u32>() {
                Ok(n) => n,
                Err(_) => continue,
            },
            None => 0,
        };
        let compressed = caps.get(2).is_some();
        let candidate = ArchivePart { part, compressed, path: ent.path().to_path_buf() };
        match parts.get(&part) {
            Some(existing) if !existing.compressed => {}
            _ => {
                parts.insert(part, candidate);
            }
        }
    }
    parts.into_values().collect()
}

/// Archive file stem for an entry marker (`tweet` → `tweets`).
pub fn stem_for_marker(marker: &str) -> String {
    if marker.ends_with('s') {
        marker.to_string()
    } else {
        format!("{marker}s")
    }
}
