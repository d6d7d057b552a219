//! Streaming downloads against a local file server.

use std::collections::HashMap;

use pixel_streaming_launcher::install::download::Downloader;
use pixel_streaming_launcher::AppError;

use super::test_helpers::FileServer;

#[tokio::test]
async fn download_replaces_existing_file_and_reports_progress() {
    let body: Vec<u8> = (0..200_000u32)
        .map(|i| u8::try_from(i % 251).expect("byte"))
        .collect();
    let len = u64::try_from(body.len()).expect("length");
    let server = FileServer::start(HashMap::from([("big".to_owned(), body.clone())])).await;
    let work = tempfile::tempdir().expect("tempdir");
    let target = work.path().join("nested/big.bin");
    std::fs::create_dir_all(target.parent().expect("parent")).expect("mkdir");
    std::fs::write(&target, b"stale junk that must disappear").expect("seed target");
    let downloader = Downloader::new().expect("downloader");

    let mut reports: Vec<(u64, u64)> = Vec::new();
    let written = downloader
        .download(&server.url("big"), &target, None, |current, total| {
            reports.push((current, total));
        })
        .await
        .expect("download");

    assert_eq!(written, len);
    assert_eq!(std::fs::read(&target).expect("read target"), body);
    assert!(!reports.is_empty());
    assert!(reports.windows(2).all(|pair| pair[0].0 <= pair[1].0));
    assert!(reports.iter().all(|(_, total)| *total == len));
    assert_eq!(reports.last(), Some(&(len, len)));
}

#[tokio::test]
async fn small_download_ends_at_full_size() {
    let server = FileServer::start(HashMap::from([("small".to_owned(), b"abc".to_vec())])).await;
    let work = tempfile::tempdir().expect("tempdir");
    let target = work.path().join("small.bin");
    let downloader = Downloader::new().expect("downloader");

    let mut last = None;
    downloader
        .download(&server.url("small"), &target, Some(3), |current, total| {
            last = Some((current, total));
        })
        .await
        .expect("download");

    assert_eq!(last, Some((3, 3)));
}

#[tokio::test]
async fn missing_file_is_an_http_error() {
    let server = FileServer::start(HashMap::new()).await;
    let work = tempfile::tempdir().expect("tempdir");
    let target = work.path().join("absent.bin");
    let downloader = Downloader::new().expect("downloader");

    let result = downloader
        .download(&server.url("absent"), &target, None, |_, _| {})
        .await;

    assert!(matches!(result, Err(AppError::Http(_))));
    assert!(!target.exists());
}
