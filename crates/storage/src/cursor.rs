// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lazy iteration over records and events
//!
//! Cursors pull one record at a time so replaying a long log never holds it
//! in memory.

use crate::record::PositionRecord;
use crate::store::StoreError;
use ds_core::{Collection, CollectionField, Event, FqField, Fqid, Position};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};

/// Which events a cursor yields
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventSelector {
    All,
    Collection(Collection),
    CollectionField(CollectionField),
    Model(Fqid),
    Field(FqField),
}

impl EventSelector {
    pub fn matches(&self, event: &Event) -> bool {
        let fqfield = &event.fqfield;
        match self {
            EventSelector::All => true,
            EventSelector::Collection(collection) => fqfield.collection() == collection,
            EventSelector::CollectionField(cf) => {
                fqfield.collection() == &cf.collection && fqfield.field == cf.field
            }
            EventSelector::Model(fqid) => &fqfield.fqid == fqid,
            EventSelector::Field(target) => fqfield == target,
        }
    }
}

/// Records in ascending position order
pub struct LogCursor {
    inner: Box<dyn Iterator<Item = Result<PositionRecord, StoreError>> + Send>,
}

impl LogCursor {
    pub fn new(
        inner: impl Iterator<Item = Result<PositionRecord, StoreError>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }
}

impl Iterator for LogCursor {
    type Item = Result<PositionRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Events of a [`LogCursor`] narrowed by a selector
pub struct EventCursor {
    records: LogCursor,
    selector: EventSelector,
    pending: VecDeque<Event>,
}

impl EventCursor {
    pub fn new(records: LogCursor, selector: EventSelector) -> Self {
        Self {
            records,
            selector,
            pending: VecDeque::new(),
        }
    }
}

impl Iterator for EventCursor {
    type Item = Result<Event, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e)),
            };
            let selector = &self.selector;
            self.pending
                .extend(record.into_events().filter(|e| selector.matches(e)));
        }
    }
}

/// Reads records of the log file from a byte offset
///
/// Only positions up to `up_to`, which the store has already validated, are
/// read, so a line still being written by another process is never seen.
pub(crate) struct FileCursor {
    reader: BufReader<File>,
    after: Position,
    up_to: Position,
    line_number: u64,
    /// The starting offset may predate a rewrite of the file
    rescanned: bool,
    done: bool,
}

impl FileCursor {
    pub(crate) fn new(
        file: File,
        offset: u64,
        after: Position,
        up_to: Position,
    ) -> Result<Self, StoreError> {
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset))?;
        Ok(Self {
            reader,
            after,
            up_to,
            line_number: 0,
            rescanned: offset == 0,
            done: after >= up_to,
        })
    }

    fn read_record(&mut self) -> Result<Option<PositionRecord>, StoreError> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record =
                PositionRecord::from_line(trimmed).map_err(|e| StoreError::Corrupted {
                    line: self.line_number,
                    reason: e.to_string(),
                })?;
            if record.position <= self.after {
                continue;
            }
            if record.position != self.after + 1 && !self.rescanned {
                self.rescanned = true;
                self.line_number = 0;
                self.reader.seek(SeekFrom::Start(0))?;
                continue;
            }
            return Ok(Some(record));
        }
    }
}

impl Iterator for FileCursor {
    type Item = Result<PositionRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) if record.position <= self.up_to => {
                self.after = record.position;
                self.rescanned = true;
                self.done = record.position >= self.up_to;
                Some(Ok(record))
            }
            Ok(_) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
