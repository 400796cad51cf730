use crate::commitlog;
use crate::replica::Term;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Byte representation:
///
/// ```text
/// |                                         1                           |
/// | 0 | 1 | 2 | 3 | 4 | 5 | 6 | 7 | 8 | 9 | 0 | 1 | 2 | 3 | 4 | 5 | ... |
/// +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+-...-+
/// |Vrs|       Term (8 bytes)          |   Data (variable size)      ... |
/// +---+-------------------------------+-----------------------------...-+
/// ```
///
/// * `Vrs` - version of the serialized payload
/// * `Term` - raft leadership term when this entry was created, little endian
/// * `Data` - opaque topic payload
///
/// The entry's index is not stored; it's the position in the underlying commitlog.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub term: Term,
    pub data: Bytes,
}

impl LogEntry {
    pub fn new(term: Term, data: Bytes) -> Self {
        LogEntry { term, data }
    }
}

const LOG_ENTRY_FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 9;

impl commitlog::Entry for LogEntry {}

impl From<Vec<u8>> for LogEntry {
    fn from(bytes: Vec<u8>) -> Self {
        // Only ever called on bytes produced by `Into<Vec<u8>>` below, so a malformed header
        // means local storage is corrupt.
        assert!(bytes.len() >= HEADER_LEN, "Log entry shorter than its header");
        assert_eq!(bytes[0], LOG_ENTRY_FORMAT_VERSION, "Unknown log entry format version");

        let mut bytes = Bytes::from(bytes);
        bytes.advance(1);
        let term = bytes.get_u64_le();

        LogEntry {
            term: Term::new(term),
            data: bytes,
        }
    }
}

impl Into<Vec<u8>> for LogEntry {
    fn into(self) -> Vec<u8> {
        let mut bytes = BytesMut::with_capacity(HEADER_LEN + self.data.len());
        bytes.put_u8(LOG_ENTRY_FORMAT_VERSION);
        bytes.put_u64_le(self.term.as_u64());
        bytes.put_slice(&self.data);

        bytes.to_vec()
    }
}
