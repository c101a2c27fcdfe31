// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed log store
//!
//! Layout of the store directory:
//!
//! ```text
//! events.jsonl    one PositionRecord per line, append-only
//! store.lock      exclusive lock held by whoever appends
//! sequences.json  id reservation high-water marks per collection
//! generation      rewrite counter, bumped after the log is replaced
//! ```
//!
//! Appenders in any process serialize on `store.lock`, catch up with the
//! tail, and fsync before reporting a position. Readers never lock: they
//! index complete, verified lines and stop at anything else.
//!
//! Erasing history and truncating replace the log in place. Every handle
//! compares `generation` with the one its index was built at and reindexes
//! from the start when they differ. A bad line followed by more data, or a
//! record out of sequence, also means the index is stale.

use crate::cursor::{EventSelector, FileCursor, LogCursor};
use crate::index::{allocate_ids, LogIndex};
use crate::record::PositionRecord;
use crate::store::{AppendOutcome, AppendRequest, LogStore, RejectReason, StoreError};
use chrono::Utc;
use ds_core::{Collection, Id, Position};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub const LOG_FILE: &str = "events.jsonl";
const LOCK_FILE: &str = "store.lock";
const SEQUENCES_FILE: &str = "sequences.json";
const GENERATION_FILE: &str = "generation";

/// State of the bytes after the last indexed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    Clean,
    /// Bytes past `valid_len` are not a complete verified record
    Torn { valid_len: u64 },
}

/// Outcome of scanning forward from the indexed end
enum Scan {
    Done(Tail),
    /// The bytes at the indexed end are not where a record starts
    Misaligned,
}

/// Exclusive lock on `store.lock`, released on drop
struct AppendLock(File);

impl Drop for AppendLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

/// A [`LogStore`] over a directory on a local or shared filesystem
pub struct FileLogStore {
    log_path: PathBuf,
    lock_path: PathBuf,
    sequences_path: PathBuf,
    generation_path: PathBuf,
    index: Mutex<LogIndex>,
}

impl FileLogStore {
    /// Open or create a store in `dir`
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        let store = Self {
            log_path: dir.join(LOG_FILE),
            lock_path: dir.join(LOCK_FILE),
            sequences_path: dir.join(SEQUENCES_FILE),
            generation_path: dir.join(GENERATION_FILE),
            index: Mutex::new(LogIndex::default()),
        };
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&store.log_path)?;

        let mut index = store.index();
        if let Tail::Torn { valid_len } = store.refresh(&mut index)? {
            warn!(
                path = %store.log_path.display(),
                valid_len,
                "log ends in an incomplete record, it will be repaired on next append"
            );
        }
        info!(
            path = %store.log_path.display(),
            position = index.head,
            "opened log store"
        );
        drop(index);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    fn index(&self) -> MutexGuard<'_, LogIndex> {
        self.index.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_append(&self) -> Result<AppendLock, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        file.lock_exclusive()?;
        Ok(AppendLock(file))
    }

    /// Index records appended since the last refresh
    fn refresh(&self, index: &mut LogIndex) -> Result<Tail, StoreError> {
        let generation = self.read_generation()?;
        if generation != index.generation {
            debug!(
                path = %self.log_path.display(),
                from = index.generation,
                to = generation,
                "log rewritten, reindexing"
            );
            *index = LogIndex::at_generation(generation);
        }
        match self.scan(index)? {
            Scan::Done(tail) => Ok(tail),
            Scan::Misaligned => {
                debug!(path = %self.log_path.display(), "index out of step with the log, reindexing");
                *index = LogIndex::at_generation(generation);
                match self.scan(index)? {
                    Scan::Done(tail) => Ok(tail),
                    Scan::Misaligned => Ok(Tail::Torn {
                        valid_len: index.end_offset,
                    }),
                }
            }
        }
    }

    fn scan(&self, index: &mut LogIndex) -> Result<Scan, StoreError> {
        let file = match File::open(&self.log_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                *index = LogIndex::at_generation(index.generation);
                return Ok(Scan::Done(Tail::Clean));
            }
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata()?.len();
        if len < index.end_offset {
            return Ok(Scan::Misaligned);
        }
        if len == index.end_offset {
            return Ok(Scan::Done(Tail::Clean));
        }

        let resumed = index.end_offset > 0;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(index.end_offset))?;
        let mut offset = index.end_offset;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf)? as u64;
            if read == 0 {
                return Ok(Scan::Done(Tail::Clean));
            }
            let torn = Scan::Done(Tail::Torn { valid_len: offset });
            if !buf.ends_with(b"\n") {
                return Ok(torn);
            }
            let record = std::str::from_utf8(&buf)
                .ok()
                .map(str::trim)
                .map(|line| (line.is_empty(), PositionRecord::from_line(line)));
            match record {
                Some((true, _)) => {
                    offset += read;
                    index.end_offset = offset;
                }
                Some((false, Ok(record))) if record.position == index.head + 1 => {
                    index.observe(&record, offset, offset + read);
                    offset += read;
                }
                Some((false, Ok(record))) => {
                    if resumed {
                        return Ok(Scan::Misaligned);
                    }
                    return Err(StoreError::Corrupted {
                        line: index.head + 1,
                        reason: format!(
                            "expected position {}, found {}",
                            index.head + 1,
                            record.position
                        ),
                    });
                }
                // A complete bad line with data after it was not left by a
                // crashed appender.
                _ if resumed && offset + read < len => return Ok(Scan::Misaligned),
                _ => return Ok(torn),
            }
        }
    }

    fn read_generation(&self) -> Result<u64, StoreError> {
        match fs::read(&self.generation_path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Publish a new generation once the log has been replaced
    fn bump_generation(&self, index: &mut LogIndex) -> Result<(), StoreError> {
        let generation = self.read_generation()?.max(index.generation) + 1;
        write_atomic(&self.generation_path, &serde_json::to_vec(&generation)?)?;
        *index = LogIndex::at_generation(generation);
        Ok(())
    }

    /// Catch up with the tail while holding the append lock, dropping any
    /// incomplete record a crashed writer left behind
    fn refresh_locked(&self, index: &mut LogIndex) -> Result<(), StoreError> {
        if let Tail::Torn { valid_len } = self.refresh(index)? {
            let file = OpenOptions::new().write(true).open(&self.log_path)?;
            let len = file.metadata()?.len();
            file.set_len(valid_len)?;
            file.sync_all()?;
            warn!(
                path = %self.log_path.display(),
                discarded_bytes = len.saturating_sub(valid_len),
                "truncated incomplete log tail"
            );
            index.end_offset = valid_len;
        }
        Ok(())
    }

    fn load_sequences(&self) -> Result<BTreeMap<Collection, Id>, StoreError> {
        match fs::read(&self.sequences_path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save_sequences(&self, sequences: &BTreeMap<Collection, Id>) -> Result<(), StoreError> {
        write_atomic(&self.sequences_path, &serde_json::to_vec(sequences)?)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let mut file = File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl LogStore for FileLogStore {
    fn append(&self, request: AppendRequest) -> Result<AppendOutcome, StoreError> {
        if request.events.is_empty() {
            return Ok(AppendOutcome::Rejected(RejectReason::Empty));
        }

        let _lock = self.lock_append()?;
        let mut index = self.index();
        self.refresh_locked(&mut index)?;

        if let Some(position) = index.transaction(&request.transaction_id) {
            debug!(
                transaction_id = %request.transaction_id,
                position,
                "duplicate transaction"
            );
            return Ok(AppendOutcome::Rejected(
                RejectReason::DuplicateTransaction { position },
            ));
        }

        let position = index.head + 1;
        let record = PositionRecord::new(
            position,
            request.transaction_id,
            Utc::now(),
            request.user_id,
            request.information,
            request.events,
        );
        let mut line = record.to_line()?;
        line.push('\n');

        let mut file = OpenOptions::new().append(true).open(&self.log_path)?;
        file.write_all(line.as_bytes())?;
        file.sync_all()?;

        let offset = index.end_offset;
        index.observe(&record, offset, offset + line.len() as u64);
        debug!(
            position,
            transaction_id = %record.transaction_id,
            events = record.events.len(),
            "appended"
        );
        Ok(AppendOutcome::Committed { position })
    }

    fn max_position(&self) -> Result<Position, StoreError> {
        let mut index = self.index();
        self.refresh(&mut index)?;
        Ok(index.head)
    }

    fn records(&self, after: Position, up_to: Position) -> Result<LogCursor, StoreError> {
        let mut index = self.index();
        self.refresh(&mut index)?;
        let up_to = up_to.min(index.head);
        if after >= up_to {
            return Ok(LogCursor::empty());
        }
        let file = File::open(&self.log_path)?;
        let cursor = FileCursor::new(file, index.offset_after(after), after, up_to)?;
        Ok(LogCursor::new(cursor))
    }

    fn last_change(&self, selector: &EventSelector) -> Result<Option<Position>, StoreError> {
        let mut index = self.index();
        self.refresh(&mut index)?;
        Ok(index.last_change(selector))
    }

    fn migration_index(&self, collection: &Collection) -> Result<Option<u32>, StoreError> {
        let mut index = self.index();
        self.refresh(&mut index)?;
        Ok(index.migration_index(collection))
    }

    fn reserve_ids(&self, collection: &Collection, amount: u32) -> Result<Vec<Id>, StoreError> {
        if amount == 0 {
            return Err(StoreError::InvalidRequest(
                "amount must be at least 1".to_string(),
            ));
        }
        let _lock = self.lock_append()?;
        let mut index = self.index();
        self.refresh_locked(&mut index)?;

        let mut sequences = self.load_sequences()?;
        let ids = allocate_ids(&mut sequences, &index, collection, amount)?;
        self.save_sequences(&sequences)?;
        debug!(%collection, amount, first = ?ids.first(), "reserved ids");
        Ok(ids)
    }

    fn delete_history_information(&self) -> Result<(), StoreError> {
        let _lock = self.lock_append()?;
        let mut index = self.index();
        self.refresh_locked(&mut index)?;

        let tmp = self.log_path.with_extension("jsonl.tmp");
        let mut out = File::create(&tmp)?;
        let source = File::open(&self.log_path)?;
        let mut erased = 0usize;
        for record in FileCursor::new(source, 0, 0, index.head)? {
            let mut record = record?;
            if record.information.take().is_some() {
                erased += 1;
            }
            out.write_all(record.to_line()?.as_bytes())?;
            out.write_all(b"\n")?;
        }
        out.sync_all()?;
        fs::rename(&tmp, &self.log_path)?;

        self.bump_generation(&mut index)?;
        self.refresh(&mut index)?;
        info!(erased, position = index.head, "deleted history information");
        Ok(())
    }

    fn truncate(&self) -> Result<(), StoreError> {
        let _lock = self.lock_append()?;
        let mut index = self.index();

        File::create(&self.log_path)?.sync_all()?;
        match fs::remove_file(&self.sequences_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        warn!(discarded = index.head, path = %self.log_path.display(), "truncated log");
        self.bump_generation(&mut index)?;
        Ok(())
    }

    fn generation(&self) -> Result<u64, StoreError> {
        let mut index = self.index();
        self.refresh(&mut index)?;
        Ok(index.generation)
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
