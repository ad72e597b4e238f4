//! Integration tests for archive handle caching.

mod common;

use std::num::NonZeroUsize;
use std::sync::Arc;

use arcbrowse::{ArchiveCache, BackendOptions, Error};
use common::*;

#[tokio::test]
async fn concurrent_requests_share_one_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.zip");
    sample_zip(&path);
    let cache = ArchiveCache::default();

    let (first, second) = tokio::join!(cache.get_or_open(&path), cache.get_or_open(&path));
    let (first, second) = (first.unwrap(), second.unwrap());

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.open_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tasks_share_one_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.zip");
    sample_zip(&path);
    let cache = Arc::new(ArchiveCache::default());

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let path = path.clone();
            tokio::spawn(async move { cache.get_or_open(&path).await })
        })
        .collect();

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap().unwrap());
    }

    assert_eq!(cache.open_count(), 1);
    assert!(handles.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[tokio::test]
async fn failed_open_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("later.zip");
    std::fs::write(&path, b"PK\x03\x04garbage").unwrap();
    let cache = ArchiveCache::default();

    let result = cache.get_or_open(&path).await;
    assert!(matches!(result, Err(Error::BackendOpen { .. })));
    assert!(!cache.contains(&path));
    assert!(cache.is_empty());

    sample_zip(&path);
    let handle = cache.get_or_open(&path).await.unwrap();
    assert_eq!(handle.list_directory("").files, vec!["c.png"]);
    assert_eq!(cache.open_count(), 2);
}

#[tokio::test]
async fn unsupported_format_is_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.zip");
    std::fs::write(&path, b"hello").unwrap();
    let cache = ArchiveCache::default();

    assert!(matches!(
        cache.get_or_open(&path).await,
        Err(Error::UnsupportedFormat(_))
    ));
    assert!(cache.is_empty());

    sample_zip(&path);
    assert!(cache.get_or_open(&path).await.is_ok());
    assert!(cache.contains(&path));
}

#[tokio::test]
async fn capacity_bounds_open_handles() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ArchiveCache::new(NonZeroUsize::new(3).unwrap(), BackendOptions::default());

    for i in 0..10 {
        let path = dir.path().join(format!("{i}.zip"));
        sample_zip(&path);
        cache.get_or_open(&path).await.unwrap();
        assert!(cache.len() <= 3);
    }
    assert_eq!(cache.len(), 3);
    assert!(cache.contains(&dir.path().join("9.zip")));
    assert!(!cache.contains(&dir.path().join("0.zip")));
}

#[tokio::test]
async fn directory_is_not_an_archive() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("folder.zip")).unwrap();
    let cache = ArchiveCache::default();

    assert!(matches!(
        cache.get_or_open(&dir.path().join("folder.zip")).await,
        Err(Error::NotFound(_))
    ));
}
