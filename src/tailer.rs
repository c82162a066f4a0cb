//! Cursor tailers over append-only JSON-lines files.
//!
//! A tailer owns one byte offset per file and only ever reads bytes past it.
//! Several tailers may watch the same file; their cursors are independent.
//! Only complete, newline-terminated lines are consumed: a half-written
//! trailing line stays behind the cursor until its newline lands.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::domain::Domain;
use crate::logging::{log, obj, v_str, Category, Level};
use crate::record::Record;
use crate::store::EventLog;

#[derive(Debug, Clone)]
pub struct LogTailer {
    path: PathBuf,
    cursor: u64,
}

impl LogTailer {
    /// Start at offset 0 and replay whatever the file already holds.
    pub fn from_start(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cursor: 0 }
    }

    /// Fast-forward to the current end of file, skipping history.
    pub fn from_end(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cursor = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Self { path, cursor }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Return the complete lines appended since the last poll, in file order.
    pub fn poll_lines(&mut self) -> std::io::Result<Vec<String>> {
        let len = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(err),
        };
        if len < self.cursor {
            // Truncated underneath us (simulation restart): start over.
            self.cursor = 0;
        }
        if len == self.cursor {
            return Ok(vec![]);
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.cursor))?;
        let mut buf = Vec::with_capacity((len - self.cursor) as usize);
        file.read_to_end(&mut buf)?;

        let Some(last_newline) = buf.iter().rposition(|b| *b == b'\n') else {
            return Ok(vec![]);
        };
        let complete = &buf[..=last_newline];
        self.cursor += complete.len() as u64;

        Ok(complete
            .split(|b| *b == b'\n')
            .map(|raw| String::from_utf8_lossy(raw).trim_end_matches('\r').to_string())
            .filter(|line| !line.trim().is_empty())
            .collect())
    }

    /// Poll and parse each new line; malformed lines are skipped.
    pub fn poll<T: DeserializeOwned>(&mut self) -> std::io::Result<Vec<T>> {
        let lines = self.poll_lines()?;
        let mut out = Vec::with_capacity(lines.len());
        for line in lines {
            match serde_json::from_str::<T>(&line) {
                Ok(item) => out.push(item),
                Err(err) => log(
                    Level::Debug,
                    Category::Feed,
                    "malformed_line_skipped",
                    obj(&[
                        ("path", v_str(&self.path.to_string_lossy())),
                        ("msg", v_str(&err.to_string())),
                    ]),
                ),
            }
        }
        Ok(out)
    }
}

/// One cursor per domain log.
#[derive(Debug, Clone)]
pub struct DomainTailer {
    tailers: HashMap<Domain, LogTailer>,
}

impl DomainTailer {
    pub fn from_start(log: &EventLog) -> Self {
        Self::build(log, |p| LogTailer::from_start(p))
    }

    pub fn from_end(log: &EventLog) -> Self {
        Self::build(log, |p| LogTailer::from_end(p))
    }

    fn build(log: &EventLog, make: fn(PathBuf) -> LogTailer) -> Self {
        let tailers = Domain::ALL.iter().map(|d| (*d, make(log.path(*d)))).collect();
        Self { tailers }
    }

    pub fn cursor(&self, domain: Domain) -> u64 {
        self.tailers.get(&domain).map(|t| t.cursor()).unwrap_or(0)
    }

    /// New records for one domain, tagged with that domain.
    pub fn poll(&mut self, domain: Domain) -> std::io::Result<Vec<Record>> {
        let Some(tailer) = self.tailers.get_mut(&domain) else {
            return Ok(vec![]);
        };
        Ok(tailer
            .poll::<Record>()?
            .into_iter()
            .map(|r| r.tagged(domain))
            .collect())
    }

    /// Poll every domain. Per-domain read failures are logged and skipped.
    pub fn poll_all(&mut self) -> Vec<Record> {
        let mut out = Vec::new();
        for domain in Domain::ALL {
            match self.poll(domain) {
                Ok(records) => out.extend(records),
                Err(err) => log(
                    Level::Warn,
                    Category::Feed,
                    "tail_failed",
                    obj(&[("domain", v_str(domain.as_str())), ("msg", v_str(&err.to_string()))]),
                ),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::recovery;
    use crate::store::Durability;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn append_raw(path: &Path, bytes: &[u8]) {
        let mut f = OpenOptions::new().create(true).append(true).open(path).unwrap();
        f.write_all(bytes).unwrap();
    }

    #[test]
    fn test_second_poll_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jsonl");
        append_raw(&path, b"{\"n\":1}\n{\"n\":2}\n");

        let mut t = LogTailer::from_start(&path);
        assert_eq!(t.poll_lines().unwrap().len(), 2);
        let cursor = t.cursor();
        assert!(t.poll_lines().unwrap().is_empty());
        assert_eq!(t.cursor(), cursor);
    }

    #[test]
    fn test_partial_line_waits_for_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jsonl");
        append_raw(&path, b"{\"n\":1}\n{\"n\":");

        let mut t = LogTailer::from_start(&path);
        assert_eq!(t.poll_lines().unwrap(), vec!["{\"n\":1}".to_string()]);
        assert_eq!(t.cursor(), 8);

        append_raw(&path, b"2}\n");
        assert_eq!(t.poll_lines().unwrap(), vec!["{\"n\":2}".to_string()]);
    }

    #[test]
    fn test_independent_cursors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jsonl");
        append_raw(&path, b"{\"n\":1}\n");

        let mut early = LogTailer::from_start(&path);
        let mut late = LogTailer::from_end(&path);
        append_raw(&path, b"{\"n\":2}\n");

        assert_eq!(early.poll::<serde_json::Value>().unwrap().len(), 2);
        let seen: Vec<serde_json::Value> = late.poll().unwrap();
        assert_eq!(seen, vec![serde_json::json!({"n": 2})]);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jsonl");
        append_raw(&path, b"{\"n\":1}\nnot json\n\n{\"n\":3}\n");
        let mut t = LogTailer::from_start(&path);
        let items: Vec<serde_json::Value> = t.poll().unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_truncation_resets_cursor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jsonl");
        append_raw(&path, b"{\"n\":1}\n{\"n\":2}\n");
        let mut t = LogTailer::from_start(&path);
        t.poll_lines().unwrap();

        File::create(&path).unwrap();
        append_raw(&path, b"{\"n\":9}\n");
        assert_eq!(t.poll_lines().unwrap(), vec!["{\"n\":9}".to_string()]);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut t = LogTailer::from_end(dir.path().join("nope.jsonl"));
        assert_eq!(t.cursor(), 0);
        assert!(t.poll_lines().unwrap().is_empty());
    }

    #[test]
    fn test_domain_tailer_tags_records() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        let mut tailer = DomainTailer::from_start(&log);
        log.append(Domain::Healthcare, &recovery(Domain::Healthcare), Durability::Buffered).unwrap();

        let records = tailer.poll_all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].domain, Some(Domain::Healthcare));
        assert!(tailer.cursor(Domain::Healthcare) > 0);
        assert_eq!(tailer.cursor(Domain::Finance), 0);
    }
}
