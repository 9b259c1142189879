//! Directory-backed KV store.
//!
//! Each key lives in its own file named by the SHA-256 digest of the key, so
//! file names stay short and portable whatever the key length. The first line
//! of a file holds the hex-encoded key; the value follows it verbatim.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::KvStore;
use crate::error::StorageError;

const FILE_EXTENSION: &str = "json";
const DIGEST_HEX_LEN: usize = 64;

/// `KvStore` persisting values as files under `dir`, bounded by a byte quota
/// over the sum of file sizes (key header included).
#[derive(Debug)]
pub struct FileKvStore {
    dir: PathBuf,
    quota_bytes: u64,
    used_bytes: Mutex<u64>,
}

impl FileKvStore {
    /// Opens (creating if needed) a store rooted at `dir` and measures the
    /// bytes already on disk.
    pub async fn open(dir: impl AsRef<Path>, quota_bytes: u64) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let mut used = 0u64;
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if is_store_file(&entry.path()) {
                used += entry.metadata().await?.len();
            }
        }
        debug!(dir = %dir.display(), used_bytes = used, "Opened file KV store");

        Ok(Self {
            dir,
            quota_bytes,
            used_bytes: Mutex::new(used),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn used_bytes(&self) -> u64 {
        *self.used_bytes.lock().await
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name_for(key))
    }

    async fn existing_len(path: &Path) -> Result<u64, StorageError> {
        match fs::metadata(path).await {
            Ok(meta) => Ok(meta.len()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    /// Reads the key stored in the header line of `path`.
    async fn read_key(path: &Path) -> Result<Option<String>, StorageError> {
        let file = fs::File::open(path).await?;
        let mut header = String::new();
        BufReader::new(file).read_line(&mut header).await?;
        Ok(decode_header(header.trim_end_matches('\n')))
    }
}

fn file_name_for(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{}.{}", hex::encode(digest), FILE_EXTENSION)
}

fn is_store_file(path: &Path) -> bool {
    let extension_matches = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == FILE_EXTENSION);
    let stem_matches = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| {
            stem.len() == DIGEST_HEX_LEN && stem.bytes().all(|b| b.is_ascii_hexdigit())
        });
    extension_matches && stem_matches
}

fn encode_contents(key: &str, value: &str) -> String {
    format!("{}\n{}", hex::encode(key.as_bytes()), value)
}

fn decode_header(header: &str) -> Option<String> {
    let bytes = hex::decode(header).ok()?;
    String::from_utf8(bytes).ok()
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let contents = match fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match contents.split_once('\n') {
            Some((header, value)) if decode_header(header).as_deref() == Some(key) => {
                Ok(Some(value.to_string()))
            }
            _ => {
                warn!(%key, "Stored file does not belong to key, ignoring");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let contents = encode_contents(key, &value);
        // Held across the write so concurrent writers see a consistent total.
        let mut used = self.used_bytes.lock().await;

        let released = Self::existing_len(&path).await?;
        let needed = contents.len() as u64;
        let available = self.quota_bytes.saturating_sub(used.saturating_sub(released));
        if needed > available {
            return Err(StorageError::QuotaExceeded { needed, available });
        }

        fs::write(&path, contents.as_bytes()).await?;
        *used = used.saturating_sub(released) + needed;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let mut used = self.used_bytes.lock().await;
        let released = Self::existing_len(&path).await?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                *used = used.saturating_sub(released);
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_store_file(&path) {
                warn!(path = %path.display(), "Ignoring unrecognised file");
                continue;
            }
            match Self::read_key(&path).await? {
                Some(key) => keys.push(key),
                None => warn!(path = %path.display(), "Ignoring file with unreadable key"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}
