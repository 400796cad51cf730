use crate::commitlog::{Entry, Index, Log};
use std::io;
use std::marker::PhantomData;

// Durability is out of scope for the consensus core, so every topic is backed by this log.
pub struct InMemoryLog<E: Entry> {
    // We don't *need* to convert these to bytes. We could just hold the original entry in memory,
    // but we want to exercise the conversion logic.
    log: Vec<Vec<u8>>,
    _pd: PhantomData<E>,
}

impl<E: Entry> InMemoryLog<E> {
    pub fn new() -> Self {
        InMemoryLog {
            log: vec![],
            _pd: PhantomData::default(),
        }
    }

    fn vec_index(index: Index) -> Option<usize> {
        // Log API states that Index starts from 1.
        index.as_u64().checked_sub(1).map(|i| i as usize)
    }
}

impl<E: Entry> Default for InMemoryLog<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entry> Log<E> for InMemoryLog<E> {
    fn append(&mut self, entry: E) -> Result<Index, io::Error> {
        self.log.push(entry.into());

        Ok(Index::new_usize(self.log.len()))
    }

    fn read(&self, index: Index) -> Result<Option<E>, io::Error> {
        let opt_entry = Self::vec_index(index)
            .and_then(|i| self.log.get(i))
            .cloned()
            .map(E::from);

        Ok(opt_entry)
    }

    fn truncate(&mut self, index: Index) -> Result<(), io::Error> {
        match Self::vec_index(index) {
            Some(vec_index) => self.log.truncate(vec_index),
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "index 0 can't be truncated",
                ))
            }
        }

        Ok(())
    }

    fn next_index(&self) -> Index {
        Index::new_usize(self.log.len() + 1)
    }
}
