use crate::commitlog;
use crate::commitlog::Index;
use crate::replica::write_ahead_log::LogEntry;
use crate::replica::Term;
use std::io;

/// ReplicatedLog is the raft-facing view of one topic's log.
///
/// Note: A log entry has 2 states in this module:
/// 1. Appended - written locally, possibly not yet replicated to majority. Can be reverted or
///    overwritten by a leader's conflicting entry.
/// 2. Committed - replicated to majority. Immutable from then on.
///
/// A log entry's state has no global truth. Each node has its own local view of what state the
/// log entry is in.
pub trait ReplicatedLog: Send {
    fn commit_index(&self) -> Index;

    /// Index 0 if the log is empty.
    fn last_index(&self) -> Index;

    fn last_entry(&self) -> Option<(Term, Index)>;

    /// Appends at the tail and returns the index used.
    fn append(&mut self, entry: LogEntry) -> Result<Index, LogError>;

    /// Appends `entry` at exactly `index`. Any uncommitted entries at `index` or later are
    /// discarded first, so afterwards `last_index() == index`.
    fn append_at(&mut self, index: Index, entry: LogEntry) -> Result<Index, LogError>;

    fn read(&self, index: Index) -> Result<Option<LogEntry>, LogError>;

    /// Entries in `[from, to]`, clamped to what the log holds.
    fn read_range(&self, from: Index, to: Index) -> Result<Vec<LogEntry>, LogError>;

    /// Like `read_range`, but packaged with the log's commit index as an owned copy so it can be
    /// shipped to a follower without holding the log.
    fn read_snapshot(&self, from: Index, to: Index) -> Result<LogSnapshot, LogError> {
        let first_index = if from.is_zero() { Index::start_index() } else { from };
        let entries = self.read_range(first_index, to)?;

        Ok(LogSnapshot {
            first_index,
            entries,
            commit_index: self.commit_index(),
        })
    }

    /// Ratchets the commit index forward to `index` and returns every newly committed entry in
    /// order. Committing at or below the current commit index is a no-op.
    fn commit(&mut self, index: Index) -> Result<CommitResult, LogError>;

    /// Discards `[index, last_index]`. Committed history can't be reverted.
    fn revert(&mut self, index: Index) -> Result<(), LogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Can't revert index {index}, it is at or below commit index {commit_index}")]
    IllegalRevert { index: Index, commit_index: Index },
    #[error("Can't overwrite index {index}, it is at or below commit index {commit_index}")]
    ImmutableEntry { index: Index, commit_index: Index },
    #[error("Can't append at index {index}, next index is {next_index}")]
    NonContiguousAppend { index: Index, next_index: Index },
    #[error("Can't commit index {index} beyond last index {last_index}")]
    CommitBeyondLog { index: Index, last_index: Index },
    #[error("Log IO failure: {0}")]
    Io(#[from] io::Error),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommitResult {
    pub commit_index: Index,
    /// Newly committed entries, ending at `commit_index`.
    pub committed: Vec<LogEntry>,
}

impl CommitResult {
    fn unchanged(commit_index: Index) -> Self {
        CommitResult {
            commit_index,
            committed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    pub fn indexed(&self) -> impl Iterator<Item = (Index, &LogEntry)> {
        let first = self.commit_index.as_u64() + 1 - self.committed.len() as u64;
        self.committed
            .iter()
            .enumerate()
            .map(move |(i, entry)| (Index::new(first + i as u64), entry))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogSnapshot {
    pub first_index: Index,
    pub entries: Vec<LogEntry>,
    pub commit_index: Index,
}

impl LogSnapshot {
    pub fn last_index(&self) -> Index {
        self.first_index.plus(self.entries.len() as u64).minus(1)
    }
}

/// WriteAheadLog implements the replicated log on top of a plain commitlog.
pub struct WriteAheadLog<L>
where
    L: commitlog::Log<LogEntry>,
{
    // This is the log that we're replicating.
    log: L,
    // Metadata about the highest log entry that we've locally written. It must be updated atomically.
    latest_entry_metadata: Option<(Term, Index)>,
    // Index of highest log entry known to be committed.
    commit_index: Index,
}

impl<L> WriteAheadLog<L>
where
    L: commitlog::Log<LogEntry>,
{
    pub fn new(log: L) -> Self {
        // Log recovery is out of scope. Always start from an empty log.
        assert_eq!(
            log.next_index(),
            Index::start_index(),
            "We only know how to handle initialization of an empty log."
        );

        WriteAheadLog {
            log,
            latest_entry_metadata: None,
            commit_index: Index::zero(),
        }
    }

    /// Remove anything starting at `index` and later.
    fn truncate(&mut self, index: Index) -> Result<(), LogError> {
        let new_latest_index = index.minus(1);
        let new_latest_entry_metadata = if new_latest_index.is_zero() {
            None
        } else {
            self.log
                .read(new_latest_index)?
                .map(|latest_entry| (latest_entry.term, new_latest_index))
        };

        // Only update log after we've successfully read what new state will be.
        self.log.truncate(index)?;

        self.latest_entry_metadata = new_latest_entry_metadata;
        Ok(())
    }
}

impl<L> ReplicatedLog for WriteAheadLog<L>
where
    L: commitlog::Log<LogEntry> + Send,
{
    fn commit_index(&self) -> Index {
        self.commit_index
    }

    fn last_index(&self) -> Index {
        self.latest_entry_metadata
            .map(|(_, index)| index)
            .unwrap_or_else(Index::zero)
    }

    fn last_entry(&self) -> Option<(Term, Index)> {
        self.latest_entry_metadata
    }

    fn append(&mut self, entry: LogEntry) -> Result<Index, LogError> {
        let appended_term = entry.term;
        let appended_index = self.log.append(entry)?;
        // Only update state after log action completes.
        self.latest_entry_metadata = Some((appended_term, appended_index));

        Ok(appended_index)
    }

    fn append_at(&mut self, index: Index, entry: LogEntry) -> Result<Index, LogError> {
        let next_index = self.log.next_index();
        if index.is_zero() || index > next_index {
            return Err(LogError::NonContiguousAppend { index, next_index });
        }
        if index <= self.commit_index {
            return Err(LogError::ImmutableEntry {
                index,
                commit_index: self.commit_index,
            });
        }

        if index < next_index {
            self.truncate(index)?;
        }

        let appended_index = self.append(entry)?;
        assert_eq!(appended_index, index, "Appended log entry to unexpected index.");

        Ok(appended_index)
    }

    fn read(&self, index: Index) -> Result<Option<LogEntry>, LogError> {
        if index.is_zero() {
            return Ok(None);
        }
        Ok(self.log.read(index)?)
    }

    fn read_range(&self, from: Index, to: Index) -> Result<Vec<LogEntry>, LogError> {
        let from = if from.is_zero() { Index::start_index() } else { from };
        let to = std::cmp::min(to, self.last_index());
        if from > to {
            return Ok(Vec::new());
        }

        let mut entries = Vec::with_capacity((to.as_u64() - from.as_u64() + 1) as usize);
        let mut next = from;
        while next <= to {
            match self.log.read(next)? {
                Some(entry) => entries.push(entry),
                None => break,
            }
            next = next.plus(1);
        }

        Ok(entries)
    }

    fn commit(&mut self, index: Index) -> Result<CommitResult, LogError> {
        if index <= self.commit_index {
            return Ok(CommitResult::unchanged(self.commit_index));
        }

        let last_index = self.last_index();
        if index > last_index {
            return Err(LogError::CommitBeyondLog { index, last_index });
        }

        let committed = self.read_range(self.commit_index.plus(1), index)?;
        self.commit_index = index;

        Ok(CommitResult {
            commit_index: index,
            committed,
        })
    }

    fn revert(&mut self, index: Index) -> Result<(), LogError> {
        if index <= self.commit_index {
            return Err(LogError::IllegalRevert {
                index,
                commit_index: self.commit_index,
            });
        }
        if index > self.last_index() {
            return Ok(());
        }

        self.truncate(index)
    }
}
