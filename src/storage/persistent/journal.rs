//! Append-only journal of snapshot-store writes.
//!
//! Every `save_snapshot` / `set_active` appends one framed record. Replay is
//! last-write-wins per key, so the journal only needs to be read on open.
//! When it grows past its size limit it is compacted: the live state is
//! written to a temporary file which is fsynced and renamed over the journal.
//!
//! # File Format
//! ```text
//! [MAGIC: 4 bytes][VERSION: 1 byte]
//! [RECORD 1: codec-framed JournalRecord]
//! [RECORD 2: codec-framed JournalRecord]
//! ...
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Result as IoResult, Seek, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::snapshot::BufferSnapshot;

use super::codec;

/// A single journal record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Monotonically increasing within one journal file.
    pub sequence: u64,
    /// The write being recorded.
    pub kind: RecordKind,
}

/// The write a record captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordKind {
    /// An accepted buffer value.
    Snapshot {
        /// Accepted text.
        content: String,
        /// When it was accepted.
        observed_at: DateTime<Utc>,
    },
    /// The observer's attach state.
    Active {
        /// Whether the observer was attached.
        active: bool,
    },
}

/// State rebuilt from a journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayedState {
    /// Last snapshot written, `unknown` if none.
    pub snapshot: BufferSnapshot,
    /// Last active flag written.
    pub active: bool,
    /// Records successfully applied.
    pub records: u64,
    /// True if replay stopped at a damaged record.
    pub truncated_tail: bool,
}

impl ReplayedState {
    fn apply(&mut self, kind: RecordKind) {
        match kind {
            RecordKind::Snapshot { content, observed_at } => {
                self.snapshot = BufferSnapshot::accepted(content, observed_at);
            }
            RecordKind::Active { active } => self.active = active,
        }
        self.records += 1;
    }
}

/// Single-writer journal. The owning store serializes access.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    writer: BufWriter<File>,
    sequence: u64,
    sync_on_write: bool,
}

impl Journal {
    /// Open or create the journal at `path` and replay it.
    ///
    /// A damaged or torn tail ends replay at the last good record; the file is
    /// then compacted so new appends never land behind garbage.
    pub fn open(path: &Path, sync_on_write: bool) -> IoResult<(Self, ReplayedState)> {
        let has_header = path.exists() && fs::metadata(path)?.len() >= 5;
        if !has_header {
            write_fresh(path, &[], sync_on_write)?;
        }

        let state = replay(path)?;

        if state.truncated_tail {
            tracing::warn!(
                path = %path.display(),
                recovered = state.records,
                "snapshot journal has a damaged tail; compacting"
            );
            write_fresh(path, &live_records(&state), sync_on_write)?;
        }

        let writer = BufWriter::new(OpenOptions::new().append(true).open(path)?);
        let sequence = if state.truncated_tail {
            live_records(&state).len() as u64
        } else {
            state.records
        };

        Ok((
            Self {
                path: path.to_path_buf(),
                writer,
                sequence,
                sync_on_write,
            },
            state,
        ))
    }

    /// Append a record and flush it (fsync when configured).
    pub fn append(&mut self, kind: RecordKind) -> IoResult<u64> {
        let record = JournalRecord {
            sequence: self.sequence + 1,
            kind,
        };
        let encoded = codec::encode(&record)?;

        self.writer.write_all(&encoded)?;
        self.writer.flush()?;
        if self.sync_on_write {
            self.writer.get_ref().sync_all()?;
        }

        self.sequence = record.sequence;
        Ok(record.sequence)
    }

    /// Rewrite the journal so it holds only `state`.
    pub fn compact(&mut self, state: &ReplayedState) -> IoResult<()> {
        self.writer.flush()?;

        let records = live_records(state);
        write_fresh(&self.path, &records, self.sync_on_write)?;

        self.writer = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        self.sequence = records.len() as u64;
        Ok(())
    }

    /// Current file size in bytes.
    pub fn size_bytes(&self) -> IoResult<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    /// Sequence number of the last appended record.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }
}

fn live_records(state: &ReplayedState) -> Vec<RecordKind> {
    let mut out = Vec::with_capacity(2);
    if let Some(content) = &state.snapshot.content {
        out.push(RecordKind::Snapshot {
            content: content.clone(),
            observed_at: state.snapshot.observed_at,
        });
    }
    out.push(RecordKind::Active { active: state.active });
    out
}

/// Write header + records to a temp file, fsync, then rename over `path`.
fn write_fresh(path: &Path, records: &[RecordKind], sync: bool) -> IoResult<()> {
    let temp_path = path.with_extension(format!("tmp.{}", Uuid::new_v4()));

    let result = (|| {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        let mut writer = BufWriter::new(file);
        codec::write_header(&mut writer)?;

        for (idx, kind) in records.iter().enumerate() {
            let record = JournalRecord {
                sequence: idx as u64 + 1,
                kind: kind.clone(),
            };
            writer.write_all(&codec::encode(&record)?)?;
        }

        writer.flush()?;
        if sync {
            writer.get_ref().sync_all()?;
        }
        fs::rename(&temp_path, path)
    })();

    if result.is_err() && temp_path.exists() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn replay(path: &Path) -> IoResult<ReplayedState> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    codec::read_header(&mut reader)?;

    let mut state = ReplayedState::default();
    while reader.stream_position()? < file_size {
        match codec::decode::<JournalRecord>(&mut reader) {
            Ok(record) => state.apply(record.kind),
            Err(e) => {
                if e.kind() != ErrorKind::UnexpectedEof {
                    tracing::warn!(error = %e, after = state.records, "corrupt snapshot journal record");
                }
                state.truncated_tail = true;
                break;
            }
        }
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::from_millis;
    use tempfile::tempdir;

    fn snapshot(content: &str, ms: i64) -> RecordKind {
        RecordKind::Snapshot {
            content: content.to_string(),
            observed_at: from_millis(ms),
        }
    }

    #[test]
    fn test_replay_is_last_write_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.journal");

        {
            let (mut journal, state) = Journal::open(&path, false).unwrap();
            assert_eq!(state, ReplayedState::default());
            journal.append(snapshot("A", 100)).unwrap();
            journal.append(RecordKind::Active { active: true }).unwrap();
            journal.append(snapshot("B", 300)).unwrap();
            assert_eq!(journal.sequence(), 3);
        }

        let (journal, state) = Journal::open(&path, false).unwrap();
        assert_eq!(state.snapshot, BufferSnapshot::accepted("B", from_millis(300)));
        assert!(state.active);
        assert_eq!(state.records, 3);
        assert!(!state.truncated_tail);
        assert_eq!(journal.sequence(), 3);
    }

    #[test]
    fn test_torn_tail_recovers_prefix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.journal");

        {
            let (mut journal, _) = Journal::open(&path, true).unwrap();
            journal.append(snapshot("kept", 1)).unwrap();
            journal.append(snapshot("torn", 2)).unwrap();
        }

        let len = fs::metadata(&path).unwrap().len();
        OpenOptions::new().write(true).open(&path).unwrap().set_len(len - 4).unwrap();

        let (mut journal, state) = Journal::open(&path, true).unwrap();
        assert!(state.truncated_tail);
        assert_eq!(state.snapshot.content.as_deref(), Some("kept"));

        // Appends after recovery must be readable on the next open.
        journal.append(snapshot("after", 3)).unwrap();
        drop(journal);

        let (_, state) = Journal::open(&path, true).unwrap();
        assert!(!state.truncated_tail);
        assert_eq!(state.snapshot.content.as_deref(), Some("after"));
    }

    #[test]
    fn test_compact_shrinks_and_preserves() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.journal");

        let (mut journal, _) = Journal::open(&path, false).unwrap();
        let mut live = ReplayedState::default();
        for i in 0..50 {
            let kind = snapshot(&format!("clip {i}"), i);
            journal.append(kind.clone()).unwrap();
            live.apply(kind);
        }
        let before = journal.size_bytes().unwrap();

        journal.compact(&live).unwrap();
        assert!(journal.size_bytes().unwrap() < before);
        assert_eq!(journal.sequence(), 2);
        drop(journal);

        let (_, state) = Journal::open(&path, false).unwrap();
        assert_eq!(state.snapshot.content.as_deref(), Some("clip 49"));
        assert_eq!(state.records, 2);
    }
}
