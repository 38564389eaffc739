//! Local filesystem storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ObjectStore, PutOptions};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Local filesystem object store.
///
/// Keys map to paths under `root`. Writes go to a uniquely named sibling and
/// are renamed into place, so readers never observe a partial thumbnail and
/// concurrent writers of the same key resolve to whichever rename lands last.
#[derive(Debug)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend, creating the root if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Resolve a key to a path inside the root.
    ///
    /// Canonicalisation touches the filesystem, so it runs on the blocking pool.
    async fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || resolve_key(&root, &key))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }
}

/// Map `key` under `root`, refusing anything that lands outside it.
///
/// Lexical checks reject absolute keys and `.`/`..` segments. Symlinks are
/// then caught by canonicalising the target (or, for a key that does not exist
/// yet, its nearest existing ancestor) and checking it is still under the root.
fn resolve_key(root: &Path, key: &str) -> StorageResult<PathBuf> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(format!("unsafe key: {key:?}")));
    }
    if !Path::new(key)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(StorageError::InvalidKey(format!(
            "unsafe path component in key: {key:?}"
        )));
    }

    let root_canonical = root.canonicalize().map_err(|e| {
        StorageError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to canonicalize root: {e}"),
        ))
    })?;
    let path = root.join(key);

    let mut ancestor = path.as_path();
    loop {
        match std::fs::symlink_metadata(ancestor) {
            Ok(meta) => {
                let canonical = ancestor.canonicalize().map_err(|e| {
                    if meta.file_type().is_symlink() {
                        StorageError::InvalidKey(format!("dangling symlink in key: {key:?}"))
                    } else {
                        StorageError::Io(e)
                    }
                })?;
                if !canonical.starts_with(&root_canonical) {
                    return Err(StorageError::InvalidKey(format!(
                        "key escapes storage root: {key:?}"
                    )));
                }
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => match ancestor.parent() {
                Some(parent) => ancestor = parent,
                None => return Ok(path),
            },
            Err(e) => return Err(StorageError::Io(e)),
        }
    }
}

fn not_found_or_io(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |e| {
        if e.kind() == ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_path(key).await?;
        let data = fs::read(&path).await.map_err(not_found_or_io(key))?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self, data, _options), fields(backend = "filesystem", size = data.len()))]
    async fn put_with_options(
        &self,
        key: &str,
        data: Bytes,
        _options: &PutOptions,
    ) -> StorageResult<()> {
        let path = self.key_path(key).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = path.with_file_name(format!(".{file_name}.tmp.{}", Uuid::new_v4()));

        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Config(format!(
                "storage root is not a directory: {}",
                self.root.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        let key = "cache/photos/thumb/a.jpg";
        let data = Bytes::from_static(&[0xFF, 0xD8, 1, 2, 3]);

        backend.put(key, data.clone()).await.unwrap();
        assert_eq!(backend.get(key).await.unwrap(), data);
        assert!(dir.path().join(key).is_file());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        backend.put("k", Bytes::from("first")).await.unwrap();
        backend.put("k", Bytes::from("second")).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Bytes::from("second"));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        let err = backend.get("nope.jpg").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(
            backend.get("nested/nope.jpg").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        for key in ["../escape", "/absolute/path", "foo/../bar", "./x", "a\\b", ""] {
            assert!(
                matches!(backend.get(key).await, Err(StorageError::InvalidKey(_))),
                "{key:?} should be rejected"
            );
        }

        // dots inside a name are fine
        assert!(matches!(
            backend.get("valid/nested/file..jpg").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_symlink_traversal_rejected() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.jpg"), "secret").unwrap();

        let backend = FilesystemBackend::new(dir.path()).await.unwrap();
        symlink(outside.path().join("secret.jpg"), dir.path().join("link.jpg")).unwrap();
        symlink(outside.path(), dir.path().join("linkdir")).unwrap();

        assert!(matches!(
            backend.get("link.jpg").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(backend.get("linkdir/secret.jpg").await.is_err());

        let result = backend
            .put("linkdir/nested/thumb.jpg", Bytes::from("data"))
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
        assert!(!outside.path().join("nested").exists());
    }

    #[tokio::test]
    async fn test_put_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        backend.put("cache/thumb/x.jpg", Bytes::from("x")).await.unwrap();
        backend.put("cache/thumb/x.jpg", Bytes::from("xx")).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path().join("cache/thumb"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["x.jpg"]);
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path().join("store")).await.unwrap();
        backend.health_check().await.unwrap();

        std::fs::remove_dir(dir.path().join("store")).unwrap();
        assert!(backend.health_check().await.is_err());
    }
}
