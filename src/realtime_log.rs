//! Persistence of the realtime reading log.
//!
//! The log file is a JSON array of `{sensor_id, readings, timestamp}`
//! objects. It is rewritten in full after every accepted reading by writing
//! a sibling temporary file and renaming it over the log. Records restored
//! at startup are kept verbatim, so a rewrite never loses entries the
//! service itself could not interpret.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde_json::Value;

use crate::error::{ServiceError, ServiceResult};

/// Serialize log records as a pretty-printed JSON array.
pub fn encode_records(records: &[Value]) -> io::Result<Vec<u8>> {
    serde_json::to_vec_pretty(records).map_err(io::Error::other)
}

/// Decode log file content. Anything other than a JSON array is `None`.
pub fn decode_records(bytes: &[u8]) -> Option<Vec<Value>> {
    match serde_json::from_slice::<Value>(bytes).ok()? {
        Value::Array(records) => Some(records),
        _ => None,
    }
}

/// In-memory copy of the log plus the file it is mirrored to.
#[derive(Debug)]
pub struct RealtimeLog {
    // ---
    path: PathBuf,
    records: Vec<Value>,
}

impl RealtimeLog {
    /// Open the log at `path`.
    ///
    /// A missing file gives an empty log. A file that is present but not a
    /// JSON array is logged and also treated as empty. Other read errors are
    /// fatal.
    pub fn open(path: impl Into<PathBuf>) -> ServiceResult<Self> {
        // ---
        let path = path.into();
        let records = match fs::read(&path) {
            Ok(bytes) => decode_records(&bytes).unwrap_or_else(|| {
                tracing::warn!(
                    "Realtime storage file {} is corrupt, starting empty.",
                    path.display()
                );
                Vec::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!("No realtime storage at {}, starting empty", path.display());
                Vec::new()
            }
            Err(e) => return Err(ServiceError::io_failure(&path, e)),
        };

        tracing::info!("Restored {} realtime records from {}", records.len(), path.display());
        Ok(RealtimeLog { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record and rewrite the file.
    ///
    /// On failure the in-memory log is left exactly as it was.
    pub fn append(&mut self, record: Value) -> ServiceResult<()> {
        // ---
        self.records.push(record);
        if let Err(source) = self.persist() {
            self.records.pop();
            tracing::error!("Failed to write realtime log {}: {}", self.path.display(), source);
            return Err(ServiceError::StorageWriteFailure {
                path: self.path.clone(),
                source,
            });
        }
        Ok(())
    }

    fn persist(&self) -> io::Result<()> {
        // ---
        let bytes = encode_records(&self.records)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn record(id: &str, ts: &str) -> Value {
        json!({"sensor_id": id, "readings": {"pm25": 1.0}, "timestamp": ts})
    }

    #[test]
    fn test_decode_records() {
        // ---
        let bytes = br#"[{"sensor_id": "a", "readings": {}, "timestamp": "2024-01-01T00:00:00+00:00"}]"#;
        assert_eq!(decode_records(bytes).unwrap().len(), 1);
        assert_eq!(decode_records(b"[]").unwrap().len(), 0);
        assert!(decode_records(b"{not json").is_none());
        assert!(decode_records(br#"{"sensor_id": "a"}"#).is_none());
        assert!(decode_records(b"").is_none());
    }

    #[test]
    fn test_encode_is_indented_array() {
        // ---
        let text = String::from_utf8(encode_records(&[record("a", "t")]).unwrap()).unwrap();
        assert!(text.starts_with("[\n  {"));
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let log = RealtimeLog::open(dir.path().join("realtime.json")).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn test_open_corrupt_file_is_empty() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("realtime.json");
        fs::write(&path, "[{\"sensor_id\": ").unwrap();
        let log = RealtimeLog::open(&path).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn test_append_rewrites_whole_file() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("realtime.json");

        let mut log = RealtimeLog::open(&path).unwrap();
        log.append(record("a", "2024-01-01T00:00:00+00:00")).unwrap();
        log.append(record("b", "2024-01-01T01:00:00+00:00")).unwrap();

        let on_disk = decode_records(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk, log.records());

        let reopened = RealtimeLog::open(&path).unwrap();
        assert_eq!(reopened.records(), log.records());
        assert!(!dir.path().join("nested").join("realtime.json.tmp").exists());
    }

    #[test]
    fn test_append_keeps_uninterpretable_records() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("realtime.json");
        fs::write(&path, r#"[{"weird": true}]"#).unwrap();

        let mut log = RealtimeLog::open(&path).unwrap();
        log.append(record("a", "2024-01-01T00:00:00+00:00")).unwrap();

        let on_disk = decode_records(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 2);
        assert_eq!(on_disk[0], json!({"weird": true}));
    }

    #[test]
    fn test_append_failure_rolls_back() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        // A directory where the log file should be makes the rename fail.
        let path = dir.path().join("realtime.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        let mut log = RealtimeLog {
            path: path.clone(),
            records: Vec::new(),
        };
        let err = log.append(record("a", "t")).unwrap_err();
        assert!(matches!(err, ServiceError::StorageWriteFailure { .. }));
        assert!(log.is_empty());
    }
}
