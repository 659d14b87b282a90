//! src/services/object_store.rs
//!
//! Binary payload storage for image records. `ObjectStore` is the seam the
//! image service talks to; `LocalObjectStore` keeps payloads on local disk,
//! sharded beneath `base_path/{bucket}/{shard}/{shard}/{key}`, and hands out
//! signed read URLs through a `UrlSigner`. Each payload's content type sits in
//! a hidden `.{name}.content-type` file next to it.

use crate::{
    errors::{StoreError, StoreResult},
    services::signer::UrlSigner,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    pin::Pin,
};
use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncWriteExt},
};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// An open payload ready to be streamed out.
pub struct ObjectReader {
    pub size_bytes: u64,
    pub content_type: String,
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
}

/// Blob storage keyed by object key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `data` under `key`, replacing any existing payload.
    async fn put_object(&self, key: &str, content_type: &str, data: Bytes) -> StoreResult<()>;

    /// Open the payload stored under `key`.
    async fn open_object(&self, key: &str) -> StoreResult<ObjectReader>;

    /// Remove the payload stored under `key`.
    async fn delete_object(&self, key: &str) -> StoreResult<()>;

    /// Credential-less read URL for `key`, valid until `expires_at`.
    async fn signed_url(&self, key: &str, expires_at: DateTime<Utc>) -> StoreResult<String>;

    /// Cheap round trip used by the readiness probe.
    async fn check(&self) -> StoreResult<()>;
}

/// Disk-backed object store for a single bucket.
#[derive(Clone)]
pub struct LocalObjectStore {
    base_path: PathBuf,
    bucket: String,
    signer: UrlSigner,
}

impl LocalObjectStore {
    pub fn new(
        base_path: impl Into<PathBuf>,
        bucket: impl Into<String>,
        signer: UrlSigner,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            bucket: bucket.into(),
            signer,
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Dot-prefixed segments are reserved for temp and content-type files.
    fn ensure_key_safe(key: &str) -> StoreResult<()> {
        let invalid = key.is_empty()
            || key.len() > MAX_OBJECT_KEY_LEN
            || key.starts_with('/')
            || key.contains("..")
            || key.split('/').any(|segment| segment.starts_with('.'))
            || key
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
        if invalid {
            return Err(StoreError::InvalidObjectKey(key.to_string()));
        }
        Ok(())
    }

    fn bucket_root(&self) -> PathBuf {
        self.base_path.join(&self.bucket)
    }

    /// Two-level shard directories from MD5(bucket/key), keeping directory
    /// fan-out bounded.
    fn object_shards(bucket: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path. Parent directories may not exist yet.
    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(&self.bucket, key);
        let mut path = self.bucket_root();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    fn content_type_path(file_path: &Path) -> PathBuf {
        let name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        file_path.with_file_name(format!(".{}.content-type", name))
    }

    /// Remove now-empty shard directories, stopping at the bucket root.
    async fn prune_empty_dirs(&self, start: &Path) {
        let stop = self.bucket_root();
        let mut current = start.to_path_buf();
        while current.starts_with(&stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    /// Writes to a temp file, fsyncs, then renames over the final path so a
    /// reader never sees a half-written payload.
    async fn put_object(&self, key: &str, content_type: &str, data: Bytes) -> StoreResult<()> {
        Self::ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &file_path).await?;
            fs::write(Self::content_type_path(&file_path), content_type).await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        debug!(
            key,
            content_type,
            size_bytes = data.len(),
            "stored object at {}",
            file_path.display()
        );
        Ok(())
    }

    async fn open_object(&self, key: &str) -> StoreResult<ObjectReader> {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::ObjectNotFound(key.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        let size_bytes = file.metadata().await?.len();
        let content_type = match fs::read_to_string(Self::content_type_path(&file_path)).await {
            Ok(stored) => stored,
            Err(err) if err.kind() == ErrorKind::NotFound => FALLBACK_CONTENT_TYPE.to_string(),
            Err(err) => return Err(StoreError::Io(err)),
        };
        Ok(ObjectReader {
            size_bytes,
            content_type,
            reader: Box::pin(file),
        })
    }

    /// A missing payload is an error, mirroring remote object stores.
    async fn delete_object(&self, key: &str) -> StoreResult<()> {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::ObjectNotFound(key.to_string()));
            }
            Err(err) => return Err(StoreError::Io(err)),
        }
        match fs::remove_file(Self::content_type_path(&file_path)).await {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(StoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    async fn signed_url(&self, key: &str, expires_at: DateTime<Utc>) -> StoreResult<String> {
        Self::ensure_key_safe(key)?;
        self.signer.sign_url(key, expires_at)
    }

    /// Write, read back and remove a probe file under the bucket root.
    async fn check(&self) -> StoreResult<()> {
        let root = self.bucket_root();
        fs::create_dir_all(&root).await?;
        let probe = root.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz").await?;
        let read_back = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;
        if read_back? != b"readyz" {
            return Err(StoreError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "probe file content mismatch",
            )));
        }
        Ok(())
    }
}
