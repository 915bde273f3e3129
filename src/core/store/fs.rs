use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use super::{ClipStore, StoreResult, validate_key};

const MAGIC: &[u8; 4] = b"LOFI";
const HEADER_LEN: usize = MAGIC.len() + 8;
const FILE_EXTENSION: &str = "clip";

/// Filesystem clip store.
///
/// Layout: `{root}/{key}.clip`, each file holding a 4-byte magic, the expiry
/// instant as big-endian unix milliseconds, then the raw clip bytes. Expired
/// and unreadable files are misses. Reads never unlink; the next `put` for the
/// key replaces the file.
pub struct FsClipStore {
    root: PathBuf,
}

impl FsClipStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{FILE_EXTENSION}"))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn encode(clip: &[u8], expires_at_ms: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + clip.len());
    buf.put_slice(MAGIC);
    buf.put_u64(expires_at_ms);
    buf.put_slice(clip);
    buf.freeze()
}

/// Returns `(expires_at_ms, payload)` or `None` when the header is malformed.
fn decode(raw: Bytes) -> Option<(u64, Bytes)> {
    if raw.len() < HEADER_LEN || &raw[..MAGIC.len()] != MAGIC {
        return None;
    }
    let mut header = &raw[MAGIC.len()..HEADER_LEN];
    let expires_at_ms = header.get_u64();
    Some((expires_at_ms, raw.slice(HEADER_LEN..)))
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove temporary clip file {}: {}", path.display(), e);
        }
    }
}

#[async_trait]
impl ClipStore for FsClipStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        validate_key(key)?;
        let path = self.path_for(key);

        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => Bytes::from(raw),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match decode(raw) {
            Some((expires_at_ms, payload)) if now_millis() < expires_at_ms => Ok(Some(payload)),
            Some(_) => {
                debug!(key, "Clip file expired");
                Ok(None)
            }
            None => {
                warn!(key, "Clip file has an invalid header, treating as miss");
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &str, clip: Bytes, ttl: Duration) -> StoreResult<()> {
        validate_key(key)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let expires_at_ms = now_millis().saturating_add(ttl.as_millis() as u64);
        let final_path = self.path_for(key);
        let tmp_path = self
            .root
            .join(format!("{key}.{}.tmp", uuid::Uuid::new_v4().simple()));

        tokio::fs::write(&tmp_path, encode(&clip, expires_at_ms)).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
            discard(&tmp_path).await;
            return Err(e.into());
        }

        debug!(key, bytes = clip.len(), "Clip written to disk");
        Ok(())
    }
}
