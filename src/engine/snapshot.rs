//! LETHE - Snapshot Files
//! JSON encoding of the dataset for SAVE / LOAD.
//!
//! ## Format
//! ```text
//! {
//!   "<key>": { "value": "<string>", "expires_at": "<RFC 3339>", "has_ttl": <bool> },
//!   ...
//! }
//! ```
//! `expires_at` is only meaningful when `has_ttl` is true.
//!
//! Writes are not atomic: a failure halfway through leaves a truncated file.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LetheError, Result};
use crate::types::{Item, Key};

/// On-disk representation of a single item.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotRecord {
    value: String,
    expires_at: DateTime<Utc>,
    has_ttl: bool,
}

impl SnapshotRecord {
    fn encode(key: &str, item: &Item) -> Result<Self> {
        let expires_at = match item.expires_at {
            None => DateTime::<Utc>::default(),
            Some(ms) => i64::try_from(ms)
                .ok()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .ok_or_else(|| {
                    LetheError::Serialization(format!(
                        "expiry {ms}ms of key {key:?} is out of range"
                    ))
                })?,
        };
        Ok(Self {
            value: item.value.clone(),
            expires_at,
            has_ttl: item.has_ttl(),
        })
    }
}

impl From<SnapshotRecord> for Item {
    fn from(record: SnapshotRecord) -> Self {
        if record.has_ttl {
            // Instants before the epoch are long gone: clamp so they read as expired.
            let ms = record.expires_at.timestamp_millis().max(0) as u64;
            Item::expiring(record.value, ms)
        } else {
            Item::persistent(record.value)
        }
    }
}

/// Write `items` to `path` as pretty-printed JSON, keys in sorted order.
///
/// Every item is encoded before the file is created, so an unrepresentable
/// expiry leaves any existing file untouched.
pub fn write_snapshot(path: &Path, items: &HashMap<Key, Item>) -> Result<()> {
    let records = items
        .iter()
        .map(|(key, item)| Ok((key, SnapshotRecord::encode(key, item)?)))
        .collect::<Result<BTreeMap<&Key, SnapshotRecord>>>()?;

    let create_err = |source: std::io::Error| LetheError::CreateFile {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(create_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &records).map_err(|err| {
        if err.is_io() {
            create_err(err.into())
        } else {
            LetheError::Serialization(err.to_string())
        }
    })?;
    writer.write_all(b"\n").map_err(create_err)?;
    writer.flush().map_err(create_err)?;
    Ok(())
}

/// Read and fully decode the snapshot at `path`.
///
/// Nothing is returned unless the whole file decodes, so a caller can
/// validate before touching live state.
pub fn read_snapshot(path: &Path) -> Result<HashMap<Key, Item>> {
    let file = File::open(path).map_err(|source| LetheError::OpenFile {
        path: path.to_path_buf(),
        source,
    })?;

    let records: HashMap<Key, SnapshotRecord> = serde_json::from_reader(BufReader::new(file))
        .map_err(|err| LetheError::Decode {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

    Ok(records
        .into_iter()
        .map(|(key, record)| (key, Item::from(record)))
        .collect())
}
