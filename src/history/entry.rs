//! History entry blobs.
//!
//! Layout: 4-byte little-endian version, item sequence number (i64 LE), document sequence
//! number (i64 LE), then the bincode-encoded remainder of the snapshot. The navigation
//! core only ever reads the fixed header; the rest passes through untouched.

use crate::error::HistoryEntryError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const HISTORY_ENTRY_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 8 + 8;

/// Structured form of a single frame's restorable navigation state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistorySnapshot {
    pub url: String,
    /// Unique name of the frame the snapshot belongs to.
    pub target: String,
    pub item_sequence_number: i64,
    pub document_sequence_number: i64,
    pub scroll_offset: (i32, i32),
    pub form_state: Vec<String>,
    pub state_object: Option<Vec<u8>>,
    pub referrer: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotBody {
    url: String,
    target: String,
    scroll_offset: (i32, i32),
    form_state: Vec<String>,
    state_object: Option<Vec<u8>>,
    referrer: Option<String>,
}

/// Opaque, versioned history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    blob: Arc<[u8]>,
    item_sequence_number: i64,
    document_sequence_number: i64,
}

impl HistoryEntry {
    /// Wrap a blob, validating its header.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, HistoryEntryError> {
        if bytes.len() < HEADER_LEN {
            return Err(HistoryEntryError::TooShort(bytes.len()));
        }
        let version = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if version != HISTORY_ENTRY_VERSION {
            return Err(HistoryEntryError::UnsupportedVersion(version));
        }
        let item_sequence_number = read_i64(&bytes[4..12]);
        let document_sequence_number = read_i64(&bytes[12..20]);
        Ok(HistoryEntry {
            blob: Arc::from(bytes),
            item_sequence_number,
            document_sequence_number,
        })
    }

    /// Encode a snapshot into a new entry.
    pub fn from_snapshot(snapshot: &HistorySnapshot) -> Result<Self, HistoryEntryError> {
        let body = SnapshotBody {
            url: snapshot.url.clone(),
            target: snapshot.target.clone(),
            scroll_offset: snapshot.scroll_offset,
            form_state: snapshot.form_state.clone(),
            state_object: snapshot.state_object.clone(),
            referrer: snapshot.referrer.clone(),
        };
        let encoded =
            bincode::serialize(&body).map_err(|e| HistoryEntryError::Malformed(e.to_string()))?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + encoded.len());
        bytes.extend_from_slice(&HISTORY_ENTRY_VERSION.to_le_bytes());
        bytes.extend_from_slice(&snapshot.item_sequence_number.to_le_bytes());
        bytes.extend_from_slice(&snapshot.document_sequence_number.to_le_bytes());
        bytes.extend_from_slice(&encoded);

        Ok(HistoryEntry {
            blob: Arc::from(bytes),
            item_sequence_number: snapshot.item_sequence_number,
            document_sequence_number: snapshot.document_sequence_number,
        })
    }

    /// Decode the full snapshot. Only embedders restoring page state need this.
    pub fn snapshot(&self) -> Result<HistorySnapshot, HistoryEntryError> {
        let body: SnapshotBody = bincode::deserialize(&self.blob[HEADER_LEN..])
            .map_err(|e| HistoryEntryError::Malformed(e.to_string()))?;
        Ok(HistorySnapshot {
            url: body.url,
            target: body.target,
            item_sequence_number: self.item_sequence_number,
            document_sequence_number: self.document_sequence_number,
            scroll_offset: body.scroll_offset,
            form_state: body.form_state,
            state_object: body.state_object,
            referrer: body.referrer,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }

    pub fn item_sequence_number(&self) -> i64 {
        self.item_sequence_number
    }

    pub fn document_sequence_number(&self) -> i64 {
        self.document_sequence_number
    }

    /// Whether both entries belong to the same document.
    pub fn same_document_as(&self, other: &HistoryEntry) -> bool {
        self.document_sequence_number == other.document_sequence_number
    }
}

fn read_i64(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    i64::from_le_bytes(buf)
}
