#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use teleput::error::{Error, Result};
use teleput::putio::{BundleStatus, Entry, FileId, FileService, RemoteStream, ZipId};

pub fn entry(id: FileId, name: &str, is_dir: bool, size: u64) -> Entry {
    Entry { id, name: name.into(), is_dir, size, content_type: String::new() }
}

/// In-memory account. Bundles become ready on the `zip_ready_at`-th status
/// poll (never if 0).
pub struct FakeDrive {
    pub tree: Mutex<HashMap<FileId, Vec<Entry>>>,
    pub blobs: HashMap<String, Vec<u8>>,
    pub zip_ready_at: u32,
    pub zip_polls: AtomicU32,
    pub fail_deletes: bool,
}

impl FakeDrive {
    pub fn new() -> Self {
        let mut tree = HashMap::new();
        tree.insert(
            0,
            vec![
                entry(10, "Movies", true, 0),
                entry(20, "notes.txt", false, 11),
                entry(21, "archive.tar", false, 6),
            ],
        );
        tree.insert(10, vec![entry(30, "clip.mkv", false, 300_000)]);

        let mut blobs = HashMap::new();
        blobs.insert("mem://20".to_string(), b"hello world".to_vec());
        blobs.insert("mem://21".to_string(), b"tarred".to_vec());
        blobs.insert("mem://30".to_string(), (0..300_000u32).map(|i| i as u8).collect());
        blobs.insert("mem://zip/7".to_string(), b"PK-bundle".to_vec());

        Self {
            tree: Mutex::new(tree),
            blobs,
            zip_ready_at: 1,
            zip_polls: AtomicU32::new(0),
            fail_deletes: false,
        }
    }

    pub fn polls(&self) -> u32 {
        self.zip_polls.load(Ordering::SeqCst)
    }

    fn find(&self, id: FileId) -> Option<Entry> {
        let tree = self.tree.lock().unwrap();
        tree.values().flatten().find(|e| e.id == id).cloned()
    }
}

#[async_trait]
impl FileService for FakeDrive {
    async fn list(&self, parent_id: FileId) -> Result<Vec<Entry>> {
        self.tree
            .lock()
            .unwrap()
            .get(&parent_id)
            .cloned()
            .ok_or_else(|| Error::Service(format!("unexpected status 404 Not Found: parent {}", parent_id)))
    }

    async fn delete(&self, ids: &[FileId]) -> Result<()> {
        if self.fail_deletes {
            return Err(Error::Transport("connection reset by peer".into()));
        }
        for entries in self.tree.lock().unwrap().values_mut() {
            entries.retain(|e| !ids.contains(&e.id));
        }
        Ok(())
    }

    async fn rename(&self, id: FileId, name: &str) -> Result<()> {
        for entries in self.tree.lock().unwrap().values_mut() {
            for e in entries.iter_mut().filter(|e| e.id == id) {
                e.name = name.to_string();
            }
        }
        Ok(())
    }

    async fn file_url(&self, id: FileId) -> Result<String> {
        Ok(format!("mem://{}", id))
    }

    async fn file_info(&self, id: FileId) -> Result<Entry> {
        self.find(id).ok_or_else(|| Error::Service("no such file".into()))
    }

    async fn create_zip(&self, _ids: &[FileId]) -> Result<ZipId> {
        Ok(7)
    }

    async fn zip_status(&self, zip_id: ZipId) -> Result<BundleStatus> {
        let n = self.zip_polls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.zip_ready_at != 0 && n >= self.zip_ready_at {
            Ok(BundleStatus::Ready { url: format!("mem://zip/{}", zip_id), size: 9 })
        } else {
            Ok(BundleStatus::Pending)
        }
    }

    async fn open(&self, url: &str) -> Result<RemoteStream> {
        let body = self
            .blobs
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Service("download failed: HTTP 404".into()))?;
        Ok(RemoteStream {
            content_length: Some(body.len() as u64),
            reader: Box::new(std::io::Cursor::new(body)),
        })
    }
}
