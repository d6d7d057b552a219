use pixel_streaming_launcher::models::release::{AppRecord, FileType};

const APP: &str = r#"{
    "id": "9b2f4a52-3b1c-4b7e-8f9d-0a1b2c3d4e5f",
    "releases": {
        "entities": [
            {
                "id": "0e1d2c3b-4a59-4687-9a0b-1c2d3e4f5a6b",
                "version": "1.2.3",
                "archive": false,
                "files": {
                    "entities": [
                        {
                            "id": "11111111-2222-4333-8444-555555555555",
                            "type": "release",
                            "url": "https://cdn.example.com/a",
                            "size": 10,
                            "originalPath": "Game/Binaries/Linux/Game"
                        },
                        {
                            "id": "66666666-7777-4888-9999-aaaaaaaaaaaa",
                            "type": "image-preview",
                            "url": "https://cdn.example.com/b"
                        },
                        {
                            "id": "bbbbbbbb-cccc-4ddd-8eee-ffffffffffff",
                            "type": "release-archive",
                            "url": "https://cdn.example.com/c.zip"
                        }
                    ]
                }
            },
            {
                "id": "1f2e3d4c-5b6a-4978-8a9b-0c1d2e3f4a5b",
                "version": "1.2.4",
                "archive": true
            }
        ]
    }
}"#;

#[test]
fn parses_entity_wrappers() {
    let app: AppRecord = serde_json::from_str(APP).expect("parse");

    assert_eq!(app.releases.len(), 2);
    assert_eq!(app.releases[0].files.len(), 3);
    assert!(app.releases[1].files.is_empty());
    assert!(app.releases[1].archive);
}

#[test]
fn unknown_file_types_are_other() {
    let app: AppRecord = serde_json::from_str(APP).expect("parse");
    let release = &app.releases[0];

    assert_eq!(release.files[1].file_type, FileType::Other);
    assert_eq!(release.files_of_type(FileType::Release).count(), 1);
    assert_eq!(release.files_of_type(FileType::ReleaseArchive).count(), 1);
}

#[test]
fn optional_file_fields_default_to_none() {
    let app: AppRecord = serde_json::from_str(APP).expect("parse");
    let preview = &app.releases[0].files[1];

    assert_eq!(preview.size, None);
    assert_eq!(preview.original_path, None);
    assert_eq!(
        app.releases[0].files[0].original_path.as_deref(),
        Some("Game/Binaries/Linux/Game")
    );
}

#[test]
fn dir_name_joins_id_and_version() {
    let app: AppRecord = serde_json::from_str(APP).expect("parse");

    assert_eq!(
        app.releases[0].dir_name(),
        "0e1d2c3b-4a59-4687-9a0b-1c2d3e4f5a6b-1.2.3"
    );
}

#[test]
fn null_releases_read_as_empty() {
    let app: AppRecord = serde_json::from_str(r#"{"releases":null}"#).expect("parse");

    assert!(app.releases.is_empty());
}
