//! Archive-mode installation against a local file server.

use std::collections::HashMap;

use semver::Version;
use uuid::Uuid;

use pixel_streaming_launcher::install::download::Downloader;
use pixel_streaming_launcher::install::{ArtifactInstaller, InstallLayout};
use pixel_streaming_launcher::models::release::Release;
use pixel_streaming_launcher::version::read_version;
use pixel_streaming_launcher::AppError;

use super::test_helpers::{archive_file, release_file, zip_bytes, FileServer, ELF_STUB};

fn installer(work: &std::path::Path) -> ArtifactInstaller {
    let layout = InstallLayout::new(work.join(".tmp/downloads"), work.join("apps"));
    ArtifactInstaller::new(layout, Downloader::new().expect("downloader"))
}

#[tokio::test]
async fn extracts_archive_and_cleans_up() {
    let archive = zip_bytes(&[
        ("Game/", b""),
        ("Game/Binaries/Linux/GameShipping", ELF_STUB),
        ("Game/Content/Paks/Game.pak", b"pak data"),
    ]);
    let size = archive.len() as u64;
    let server = FileServer::start(HashMap::from([("build.zip".to_owned(), archive)])).await;

    let work = tempfile::tempdir().expect("tempdir");
    let installer = installer(work.path());
    let app_id = Uuid::new_v4();
    let release = Release {
        id: Uuid::new_v4(),
        version: "2.3.4".into(),
        archive: true,
        files: vec![archive_file(&server, "build.zip", size)],
    };

    let install_dir = installer.install(app_id, &release).await.expect("install");

    assert_eq!(install_dir, installer.layout().install_dir(app_id, &release));
    assert_eq!(
        std::fs::read(install_dir.join("Game/Content/Paks/Game.pak")).expect("pak"),
        b"pak data"
    );
    assert!(install_dir.join("Game/Binaries/Linux/GameShipping").is_file());
    assert_eq!(read_version(&install_dir).expect("version"), Version::new(2, 3, 4));
    assert!(!installer.layout().temp_dir(app_id, &release).exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(install_dir.join("Game/Binaries/Linux/GameShipping"))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}

#[tokio::test]
async fn rejects_traversal_entries_and_keeps_download() {
    let archive = zip_bytes(&[("Game/ok.txt", b"fine"), ("../../evil.txt", b"owned")]);
    let size = archive.len() as u64;
    let server = FileServer::start(HashMap::from([("bad.zip".to_owned(), archive)])).await;

    let work = tempfile::tempdir().expect("tempdir");
    let installer = installer(work.path());
    let app_id = Uuid::new_v4();
    let release = Release {
        id: Uuid::new_v4(),
        version: "1.0.0".into(),
        archive: true,
        files: vec![archive_file(&server, "bad.zip", size)],
    };

    let result = installer.install(app_id, &release).await;

    assert!(matches!(result, Err(AppError::PathViolation(_))));
    assert!(!work.path().join("evil.txt").exists());
    assert!(!work.path().join("apps/evil.txt").exists());
    assert!(installer.layout().temp_dir(app_id, &release).exists());
    let install_dir = installer.layout().install_dir(app_id, &release);
    assert!(!install_dir.join(".version").exists());
}

#[tokio::test]
async fn archive_release_without_archive_file_fails() {
    let server = FileServer::start(HashMap::new()).await;
    let work = tempfile::tempdir().expect("tempdir");
    let installer = installer(work.path());
    let release = Release {
        id: Uuid::new_v4(),
        version: "1.0.0".into(),
        archive: true,
        files: vec![release_file(&server, "a.bin", 1, Some("a.bin"))],
    };

    let result = installer.install(Uuid::new_v4(), &release).await;

    assert!(matches!(result, Err(AppError::Installation(ref msg)) if msg.contains("no archive")));
}

#[tokio::test]
async fn missing_archive_download_is_installation_error() {
    let server = FileServer::start(HashMap::new()).await;
    let work = tempfile::tempdir().expect("tempdir");
    let installer = installer(work.path());
    let release = Release {
        id: Uuid::new_v4(),
        version: "1.0.0".into(),
        archive: true,
        files: vec![archive_file(&server, "gone.zip", 10)],
    };

    let result = installer.install(Uuid::new_v4(), &release).await;

    assert!(matches!(result, Err(AppError::Installation(_))));
}

#[tokio::test]
async fn unparseable_version_fails_before_download() {
    let server = FileServer::start(HashMap::new()).await;
    let work = tempfile::tempdir().expect("tempdir");
    let installer = installer(work.path());
    let release = Release {
        id: Uuid::new_v4(),
        version: "latest".into(),
        archive: true,
        files: vec![archive_file(&server, "gone.zip", 10)],
    };

    let result = installer.install(Uuid::new_v4(), &release).await;

    assert!(matches!(result, Err(AppError::Installation(ref msg)) if msg.contains("version")));
}
