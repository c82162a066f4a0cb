use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::domain::Domain;
use crate::error::SimResult;
use crate::record::Record;

/// How hard an append tries to reach stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Flush and fsync before returning. Used by the manual trigger path.
    Synced,
    /// Leave the bytes to the OS page cache. Loss on crash is acceptable.
    Buffered,
}

/// Append-only JSON-lines logs, one file per domain.
///
/// Each append is a single `write_all` of one complete line on an
/// `O_APPEND` handle; no locking is done beyond what the host file system
/// gives single-line appends.
#[derive(Debug, Clone)]
pub struct EventLog {
    dir: PathBuf,
}

impl EventLog {
    pub fn open(dir: impl Into<PathBuf>) -> SimResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, domain: Domain) -> PathBuf {
        self.dir.join(domain.file_name())
    }

    pub fn append(&self, domain: Domain, record: &Record, durability: Durability) -> SimResult<()> {
        let mut line = record.to_line()?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(domain))?;
        file.write_all(line.as_bytes())?;
        if durability == Durability::Synced {
            file.flush()?;
            file.sync_data()?;
        }
        Ok(())
    }

    /// Reset a domain log to empty. Only called at simulation start.
    pub fn truncate(&self, domain: Domain) -> SimResult<()> {
        File::create(self.path(domain))?;
        Ok(())
    }

    pub fn truncate_all(&self) -> SimResult<()> {
        for domain in Domain::ALL {
            self.truncate(domain)?;
        }
        Ok(())
    }

    /// Read every parseable record currently in a domain log.
    pub fn replay(&self, domain: Domain) -> SimResult<Vec<Record>> {
        let path = self.path(domain);
        if !path.exists() {
            return Ok(vec![]);
        }
        let reader = BufReader::new(File::open(path)?);
        Ok(reader
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| Record::from_line(&line).ok())
            .collect())
    }

    pub fn last(&self, domain: Domain) -> SimResult<Option<Record>> {
        Ok(self.replay(domain)?.pop())
    }
}
