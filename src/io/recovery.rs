use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use crate::io::lock::try_lock;

/// Past this size, appending first trims the log (1 MB).
const MAX_LOG_SIZE: u64 = 1_048_576;

/// Default number of days before entries are prunable.
pub const PRUNE_AGE_DAYS: i64 = 30;

/// Header written at the top of a new recovery log.
const FILE_HEADER: &str = "\
<!-- ticknote recovery log: blobs that could not be loaded, saved or kept.
     View with: tn recovery
     Prune old entries: tn recovery prune
     Safe to delete. -->

---
";

/// Why a blob ended up in the recovery log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    /// Stored blob failed to deserialize and was replaced by a default
    Malformed,
    /// Blob could not be written to storage
    Write,
    /// Blob was erased on purpose (clear all data)
    Delete,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryCategory::Malformed => write!(f, "malformed"),
            RecoveryCategory::Write => write!(f, "write"),
            RecoveryCategory::Delete => write!(f, "delete"),
        }
    }
}

impl RecoveryCategory {
    pub fn parse_category(s: &str) -> Option<Self> {
        match s {
            "malformed" => Some(RecoveryCategory::Malformed),
            "write" => Some(RecoveryCategory::Write),
            "delete" => Some(RecoveryCategory::Delete),
            _ => None,
        }
    }
}

/// A single entry in the recovery log.
#[derive(Debug, Clone)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

pub fn recovery_log_path(data_dir: &Path) -> PathBuf {
    data_dir.join(".recovery.log")
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl RecoveryEntry {
    fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {} [{}] {}\n\n",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.category,
            self.description,
        );

        for (key, value) in &self.fields {
            out.push_str(&format!("{}: {}\n", key, value));
        }

        if !self.body.is_empty() {
            out.push_str("\n```json\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }
        out.push_str("\n---\n");
        out
    }

    /// Serialize to JSON value for `tn recovery --json`.
    pub fn to_json(&self) -> serde_json::Value {
        let fields: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "category": self.category.to_string(),
            "description": self.description,
            "fields": fields,
            "body": self.body,
        })
    }

    pub fn to_display_markdown(&self) -> String {
        self.to_markdown()
    }
}

/// Append an entry to the log. Failures are logged and swallowed: the
/// recovery log must never be the reason an operation fails.
pub fn log_recovery(data_dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = log_recovery_inner(data_dir, entry) {
        tracing::warn!(error = %e, "could not write to recovery log");
    }
}

fn log_recovery_inner(data_dir: &Path, entry: RecoveryEntry) -> io::Result<()> {
    let path = recovery_log_path(data_dir);
    if let Ok(meta) = std::fs::metadata(&path)
        && meta.len() > MAX_LOG_SIZE
    {
        try_inline_trim(&path, MAX_LOG_SIZE);
    }
    let needs_header = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(entry.to_markdown().as_bytes())?;
    Ok(())
}

/// Shrink the log to at most `max_bytes`: entries past the prune age go
/// first, then the oldest of the rest. Skipped if another process has the
/// log locked.
fn try_inline_trim(path: &Path, max_bytes: u64) {
    let Ok(file) = OpenOptions::new().read(true).write(true).open(path) else {
        return;
    };
    if try_lock(&file).is_err() {
        return;
    }
    let Ok(content) = std::fs::read_to_string(path) else {
        return;
    };

    let cutoff = Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS);
    let kept: Vec<String> = parse_entries(&content)
        .into_iter()
        .filter(|e| e.timestamp >= cutoff)
        .map(|e| e.to_markdown())
        .collect();
    let mut size = FILE_HEADER.len() + kept.iter().map(String::len).sum::<usize>();
    let mut dropped = 0;
    while size as u64 > max_bytes && dropped < kept.len() {
        size -= kept[dropped].len();
        dropped += 1;
    }

    let rewritten = format!("{}{}", FILE_HEADER, kept[dropped..].concat());
    if rewritten.len() < content.len() {
        match atomic_write(path, rewritten.as_bytes()) {
            Ok(()) => tracing::debug!(bytes = rewritten.len(), "recovery log trimmed"),
            Err(e) => tracing::warn!(error = %e, "could not trim recovery log"),
        }
    }
}

/// Whether an entry with this category, `Key` field and body is already in
/// the log.
pub fn is_logged(data_dir: &Path, category: RecoveryCategory, key: &str, body: &str) -> bool {
    read_recovery_entries(data_dir, None).iter().any(|e| {
        e.category == category
            && e.body.trim_end() == body.trim_end()
            && e.fields.iter().any(|(k, v)| k == "Key" && v == key)
    })
}

/// Read entries, most recent first.
pub fn read_recovery_entries(data_dir: &Path, limit: Option<usize>) -> Vec<RecoveryEntry> {
    let content = match std::fs::read_to_string(recovery_log_path(data_dir)) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    let mut entries = parse_entries(&content);
    if let Some(n) = limit {
        let skip = entries.len().saturating_sub(n);
        entries.drain(..skip);
    }
    entries.reverse();
    entries
}

fn parse_entries(content: &str) -> Vec<RecoveryEntry> {
    let mut entries = Vec::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let Some((timestamp, category, description)) =
            line.strip_prefix("## ").and_then(parse_entry_header)
        else {
            continue;
        };

        let mut fields = Vec::new();
        let mut body = String::new();
        let mut in_code_block = false;

        for line in lines.by_ref() {
            if in_code_block {
                if line == "```" {
                    in_code_block = false;
                } else {
                    if !body.is_empty() {
                        body.push('\n');
                    }
                    body.push_str(line);
                }
                continue;
            }
            if line == "---" {
                break;
            }
            if line.starts_with("```") {
                in_code_block = true;
                continue;
            }
            if let Some((key, value)) = line.trim().split_once(": ") {
                fields.push((key.to_string(), value.to_string()));
            }
        }

        entries.push(RecoveryEntry {
            timestamp,
            category,
            description,
            fields,
            body,
        });
    }

    entries
}

/// Parse `<timestamp> [<category>] <description>`
fn parse_entry_header(header: &str) -> Option<(DateTime<Utc>, RecoveryCategory, String)> {
    let (timestamp_str, rest) = header.split_once(" [")?;
    let (category_str, description) = rest.split_once("] ")?;

    let timestamp = DateTime::parse_from_rfc3339(timestamp_str)
        .ok()?
        .with_timezone(&Utc);
    let category = RecoveryCategory::parse_category(category_str)?;

    Some((timestamp, category, description.to_string()))
}

/// Remove entries older than `before` (default: PRUNE_AGE_DAYS), or every
/// entry when `all` is set. Returns the number removed.
pub fn prune_recovery(
    data_dir: &Path,
    before: Option<DateTime<Utc>>,
    all: bool,
) -> io::Result<usize> {
    let path = recovery_log_path(data_dir);
    if !path.exists() {
        return Ok(0);
    }
    let content = std::fs::read_to_string(&path)?;
    let entries = parse_entries(&content);
    let original_count = entries.len();

    let cutoff = before.unwrap_or_else(|| Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS));
    let mut rewritten = FILE_HEADER.to_string();
    let mut kept = 0;
    for entry in entries {
        if !all && entry.timestamp >= cutoff {
            rewritten.push_str(&entry.to_markdown());
            kept += 1;
        }
    }

    atomic_write(&path, rewritten.as_bytes())?;
    Ok(original_count - kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use tempfile::TempDir;

    fn make_entry(category: RecoveryCategory, desc: &str, body: &str) -> RecoveryEntry {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: desc.to_string(),
            fields: vec![("Key".to_string(), "ticknote-tasks".to_string())],
            body: body.to_string(),
        }
    }

    #[test]
    fn test_entry_formatting() {
        let entry = make_entry(RecoveryCategory::Malformed, "discarded blob", "[{]");
        let md = entry.to_markdown();
        assert!(md.starts_with("## "));
        assert!(md.contains("[malformed] discarded blob"));
        assert!(md.contains("Key: ticknote-tasks"));
        assert!(md.contains("```json\n[{]\n```"));
        assert!(md.ends_with("---\n"));
    }

    #[test]
    fn test_log_and_read_most_recent_first() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), make_entry(RecoveryCategory::Malformed, "first", "a"));
        log_recovery(tmp.path(), make_entry(RecoveryCategory::Write, "second", "b"));

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "second");
        assert_eq!(entries[0].category, RecoveryCategory::Write);
        assert_eq!(entries[1].body, "a");
    }

    #[test]
    fn test_read_with_limit() {
        let tmp = TempDir::new().unwrap();
        for i in 0..5 {
            log_recovery(
                tmp.path(),
                make_entry(RecoveryCategory::Delete, &format!("entry{}", i), "x"),
            );
        }
        let entries = read_recovery_entries(tmp.path(), Some(2));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "entry4");
        assert_eq!(entries[1].description, "entry3");
    }

    #[test]
    fn test_multiline_body_and_fields_round_trip() {
        let tmp = TempDir::new().unwrap();
        let entry = RecoveryEntry {
            timestamp: Utc::now(),
            category: RecoveryCategory::Write,
            description: "write failed".to_string(),
            fields: vec![
                ("Key".to_string(), "ticknote-lists".to_string()),
                ("Error".to_string(), "Permission denied".to_string()),
            ],
            body: "[\n  {\"id\": \"all\"}\n]".to_string(),
        };
        log_recovery(tmp.path(), entry);

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].fields[1], ("Error".to_string(), "Permission denied".to_string()));
        assert_eq!(entries[0].body, "[\n  {\"id\": \"all\"}\n]");
    }

    #[test]
    fn test_prune_all_keeps_header() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), make_entry(RecoveryCategory::Malformed, "x", "y"));

        assert_eq!(prune_recovery(tmp.path(), None, true).unwrap(), 1);
        assert!(read_recovery_entries(tmp.path(), None).is_empty());
        let content = std::fs::read_to_string(recovery_log_path(tmp.path())).unwrap();
        assert!(content.starts_with("<!-- ticknote recovery log"));
    }

    #[test]
    fn test_prune_before_cutoff() {
        let tmp = TempDir::new().unwrap();
        let mut old = make_entry(RecoveryCategory::Malformed, "old", "1");
        old.timestamp = Utc::now() - chrono::Duration::days(60);
        log_recovery(tmp.path(), old);
        log_recovery(tmp.path(), make_entry(RecoveryCategory::Write, "new", "2"));

        let removed = prune_recovery(tmp.path(), None, false).unwrap();
        assert_eq!(removed, 1);
        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "new");
    }

    #[test]
    fn test_inline_trim_keeps_newest_under_cap() {
        let tmp = TempDir::new().unwrap();
        let mut stale = make_entry(RecoveryCategory::Malformed, "stale", "0");
        stale.timestamp = Utc::now() - chrono::Duration::days(60);
        log_recovery(tmp.path(), stale);
        for i in 0..20 {
            let body = format!("{}{}", i, "x".repeat(100));
            log_recovery(tmp.path(), make_entry(RecoveryCategory::Write, &format!("entry{}", i), &body));
        }
        let path = recovery_log_path(tmp.path());

        try_inline_trim(&path, 1200);

        assert!(std::fs::metadata(&path).unwrap().len() <= 1200);
        let entries = read_recovery_entries(tmp.path(), None);
        assert!(!entries.is_empty());
        assert!(entries.len() < 20);
        assert_eq!(entries[0].description, "entry19");
        assert!(entries.iter().all(|e| e.description != "stale"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<!-- ticknote recovery log"));
    }

    #[test]
    fn test_inline_trim_leaves_small_log_alone() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), make_entry(RecoveryCategory::Write, "only", "1"));
        let path = recovery_log_path(tmp.path());
        let before = std::fs::read_to_string(&path).unwrap();

        try_inline_trim(&path, MAX_LOG_SIZE);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_is_logged_matches_key_and_body() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), make_entry(RecoveryCategory::Malformed, "bad", "{"));

        assert!(is_logged(tmp.path(), RecoveryCategory::Malformed, "ticknote-tasks", "{"));
        assert!(!is_logged(tmp.path(), RecoveryCategory::Malformed, "ticknote-lists", "{"));
        assert!(!is_logged(tmp.path(), RecoveryCategory::Malformed, "ticknote-tasks", "["));
        assert!(!is_logged(tmp.path(), RecoveryCategory::Write, "ticknote-tasks", "{"));
    }

    #[test]
    fn test_prune_without_log() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(prune_recovery(tmp.path(), None, true).unwrap(), 0);
    }

    #[test]
    fn test_parse_entry_header() {
        let (ts, cat, desc) =
            parse_entry_header("2026-02-10T14:32:05Z [delete] cleared tasks").unwrap();
        assert_eq!(cat, RecoveryCategory::Delete);
        assert_eq!(desc, "cleared tasks");
        assert_eq!(ts.year(), 2026);
        assert!(parse_entry_header("2026-02-10T14:32:05Z [bogus] x").is_none());
        assert!(parse_entry_header("not a header").is_none());
    }

    #[test]
    fn test_atomic_write_overwrites() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blob.json");
        atomic_write(&path, b"[]").unwrap();
        atomic_write(&path, b"[1]").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[1]");
    }

    #[test]
    fn test_entry_to_json() {
        let json = make_entry(RecoveryCategory::Malformed, "discarded blob", "{").to_json();
        assert_eq!(json["category"], "malformed");
        assert_eq!(json["fields"]["Key"], "ticknote-tasks");
        assert_eq!(json["body"], "{");
    }
}
