use std::path::{Path, PathBuf};
use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tracing::{debug, info, instrument};

use super::error::StorageError;
use super::sqlite::SqliteStore;

/// Environment variable naming the bucket when none is configured.
pub const BUCKET_ENV: &str = "AWS_STORAGE_BUCKET_NAME";

const LOCAL_FILE: &str = "taxonomy.sqlite";

/// Builds an S3 client for `bucket`, falling back to [`BUCKET_ENV`].
///
/// Credentials and region come from the usual `AWS_*` environment variables.
pub fn s3_object_store(bucket: Option<&str>) -> Result<Arc<dyn ObjectStore>, StorageError> {
    let bucket = match bucket.filter(|b| !b.is_empty()) {
        Some(bucket) => bucket.to_string(),
        None => std::env::var(BUCKET_ENV)
            .ok()
            .filter(|b| !b.is_empty())
            .ok_or(StorageError::MissingBucket)?,
    };

    let s3 = AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .build()?;
    Ok(Arc::new(s3))
}

/// A database file that lives in an object store.
///
/// The object is copied to a private temporary directory and served from
/// there through a [`SqliteStore`]. Changes reach the object store only on
/// [`save`](Self::save) or [`close`](Self::close), and only when the local
/// file differs from what was last pulled or pushed.
pub struct RemoteDatabase {
    store: SqliteStore,
    objects: Arc<dyn ObjectStore>,
    key: ObjectPath,
    local: PathBuf,
    synced: Option<String>,
    _workdir: TempDir,
}

impl RemoteDatabase {
    /// Pulls `key` into a local copy and opens it.
    ///
    /// With `create` set nothing is downloaded and a new database is
    /// started; it is uploaded on the first save or close.
    #[instrument(skip(objects))]
    pub async fn open(
        objects: Arc<dyn ObjectStore>,
        key: &str,
        create: bool,
    ) -> Result<Self, StorageError> {
        let key = ObjectPath::from(key);
        let workdir = TempDir::new().map_err(|e| StorageError::io(std::env::temp_dir(), e))?;
        let local = workdir.path().join(LOCAL_FILE);

        let synced = if create {
            None
        } else {
            let body = objects.get(&key).await?.bytes().await?;
            tokio::fs::write(&local, &body)
                .await
                .map_err(|e| StorageError::io(&local, e))?;
            debug!("Pulled {} bytes from {}", body.len(), key);
            Some(digest(&body))
        };

        let store = SqliteStore::open(&local)?;
        Ok(Self {
            store,
            objects,
            key,
            local,
            synced,
            _workdir: workdir,
        })
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn key(&self) -> &str {
        self.key.as_ref()
    }

    /// Path of the local working copy.
    pub fn local_path(&self) -> &Path {
        &self.local
    }

    /// Pushes pending changes without closing. Returns whether anything was uploaded.
    pub async fn save(&mut self) -> Result<bool, StorageError> {
        self.store.checkpoint()?;
        self.push().await
    }

    /// Closes the database and pushes pending changes.
    pub async fn close(mut self) -> Result<bool, StorageError> {
        self.store.close()?;
        self.push().await
    }

    /// Closes the database and throws local changes away.
    pub fn terminate(self) -> Result<(), StorageError> {
        self.store.close()?;
        debug!("Discarded local copy of {}", self.key);
        Ok(())
    }

    /// Closes the database and removes the object from the store.
    pub async fn delete(self) -> Result<(), StorageError> {
        self.store.close()?;
        match self.objects.delete(&self.key).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        info!("Deleted {}", self.key);
        Ok(())
    }

    async fn push(&mut self) -> Result<bool, StorageError> {
        let body = tokio::fs::read(&self.local)
            .await
            .map_err(|e| StorageError::io(&self.local, e))?;
        let current = digest(&body);
        if self.synced.as_deref() == Some(current.as_str()) {
            debug!("{} unchanged, nothing to upload", self.key);
            return Ok(false);
        }

        let size = body.len();
        self.objects.put(&self.key, PutPayload::from(body)).await?;
        self.synced = Some(current);
        info!("Uploaded {} bytes to {}", size, self.key);
        Ok(true)
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
