use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use url_sentinel::{
    artifacts::{create_artifact_store, ArtifactStore, FsArtifactStore, InMemoryArtifactStore},
    config::{ArtifactBackend, ArtifactConfig},
    error::AppError,
};

/// Behaviour every artifact backend must share
async fn test_store_operations(store: Arc<dyn ArtifactStore>) {
    assert!(store.list("models").await.unwrap().is_empty());

    assert_ok!(store.put("models", "0b7e.bin", b"second".to_vec()).await);
    assert_ok!(store.put("models", "0a1f.bin", b"first".to_vec()).await);
    assert_ok!(store.put("archive", "old.bin", vec![0]).await);

    assert_eq!(store.get("models", "0a1f.bin").await.unwrap(), b"first");
    assert_eq!(
        store.list("models").await.unwrap(),
        vec!["0a1f.bin", "0b7e.bin"]
    );

    // Immutable once written
    let err = store
        .put("models", "0a1f.bin", b"replacement".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(store.get("models", "0a1f.bin").await.unwrap(), b"first");

    assert!(matches!(
        store.get("models", "missing.bin").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        store.get("missing", "0a1f.bin").await,
        Err(AppError::NotFound(_))
    ));

    // Keys must be a single plain path segment
    assert_err!(store.put("models", "../escape.bin", vec![0]).await);
    assert_err!(store.put("models", "", vec![0]).await);
}

#[tokio::test]
async fn test_in_memory_artifact_store() {
    test_store_operations(Arc::new(InMemoryArtifactStore::new())).await;
}

#[tokio::test]
async fn test_filesystem_artifact_store() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsArtifactStore::new(temp_dir.path()).await.unwrap();
    test_store_operations(Arc::new(store)).await;

    assert!(temp_dir.path().join("models").join("0a1f.bin").is_file());
}

#[tokio::test]
async fn test_filesystem_store_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = FsArtifactStore::new(temp_dir.path()).await.unwrap();
        store.put("models", "v1.bin", vec![7, 7]).await.unwrap();
    }

    let store = FsArtifactStore::new(temp_dir.path()).await.unwrap();
    assert_eq!(store.get("models", "v1.bin").await.unwrap(), vec![7, 7]);
}

#[tokio::test]
async fn test_factory_backends() {
    let temp_dir = TempDir::new().unwrap();

    let fs = create_artifact_store(&ArtifactConfig {
        backend: ArtifactBackend::Filesystem,
        path: Some(temp_dir.path().join("artifacts")),
        container: "models".to_string(),
    })
    .await
    .unwrap();
    fs.put("models", "a.bin", vec![1]).await.unwrap();
    assert!(temp_dir.path().join("artifacts/models/a.bin").exists());

    let memory = create_artifact_store(&ArtifactConfig {
        backend: ArtifactBackend::Memory,
        path: None,
        container: "models".to_string(),
    })
    .await
    .unwrap();
    assert!(memory.list("models").await.unwrap().is_empty());

    let missing_path = create_artifact_store(&ArtifactConfig {
        backend: ArtifactBackend::Filesystem,
        path: None,
        container: "models".to_string(),
    })
    .await;
    assert!(matches!(missing_path, Err(AppError::Configuration(_))));
}
