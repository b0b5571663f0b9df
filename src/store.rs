//! Document sinks.
//!
//! The pipeline talks to its store through [`DocumentStore`]: batch inserts
//! plus an optional clear before a full rebuild. The handle is constructed
//! once by the caller and shared across workers, so implementations must
//! tolerate concurrent `insert_many` calls; nothing beyond per-batch
//! atomicity is required.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::document::StatDocument;

pub trait DocumentStore: Send + Sync {
    /// Drop all previously stored documents (full-rebuild runs).
    fn clear(&self) -> Result<()>;

    /// Append one batch. Insert order across concurrent callers is
    /// immaterial to correctness.
    fn insert_many(&self, documents: &[StatDocument]) -> Result<()>;
}

/// Store backed by a JSON-lines file, one document per line.
pub struct JsonlStore {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlStore {
    /// Open in append mode, creating the file if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening document store {}", path.display()))?;
        Ok(JsonlStore {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentStore for JsonlStore {
    fn clear(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        let file = File::create(&self.path)
            .with_context(|| format!("truncating document store {}", self.path.display()))?;
        *writer = BufWriter::new(file);
        Ok(())
    }

    fn insert_many(&self, documents: &[StatDocument]) -> Result<()> {
        let mut writer = self.writer.lock();
        for document in documents {
            serde_json::to_writer(&mut *writer, document)?;
            writer.write_all(b"\n")?;
        }
        // Batches are visible once the call returns.
        writer.flush()?;
        Ok(())
    }
}

/// In-memory store, mainly for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<Vec<StatDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> Vec<StatDocument> {
        self.documents.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }
}

impl DocumentStore for MemoryStore {
    fn clear(&self) -> Result<()> {
        self.documents.lock().clear();
        Ok(())
    }

    fn insert_many(&self, documents: &[StatDocument]) -> Result<()> {
        self.documents.lock().extend_from_slice(documents);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(first_year: i32) -> StatDocument {
        StatDocument::Full {
            series: vec![(1.0, 0.5), (0.0, 0.5)],
            first_year,
            last_year: first_year + 2,
        }
    }

    fn read_documents(path: &Path) -> Vec<StatDocument> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_jsonl_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.jsonl");

        let store = JsonlStore::open(&path).unwrap();
        store.insert_many(&[sample(2000), sample(2010)]).unwrap();
        store.insert_many(&[sample(2020)]).unwrap();

        let docs = read_documents(&path);
        assert_eq!(docs, vec![sample(2000), sample(2010), sample(2020)]);
    }

    #[test]
    fn test_jsonl_store_appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.jsonl");

        JsonlStore::open(&path).unwrap().insert_many(&[sample(2000)]).unwrap();
        JsonlStore::open(&path).unwrap().insert_many(&[sample(2010)]).unwrap();

        assert_eq!(read_documents(&path).len(), 2);
    }

    #[test]
    fn test_jsonl_store_clear_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.jsonl");

        let store = JsonlStore::open(&path).unwrap();
        store.insert_many(&[sample(2000)]).unwrap();
        store.clear().unwrap();
        store.insert_many(&[sample(2010)]).unwrap();

        assert_eq!(read_documents(&path), vec![sample(2010)]);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.insert_many(&[sample(2000), sample(2010)]).unwrap();
        assert_eq!(store.len(), 2);

        store.clear().unwrap();
        assert!(store.is_empty());
    }
}
