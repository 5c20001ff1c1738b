use capsearch::cache::FileKey;
use capsearch::scanner::{collect_inputs, ScanConfig, ScanError};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_only_images_directly_in_folder() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("b.PNG"), b"x").unwrap();
    fs::write(dir.path().join("a.jpeg"), b"x").unwrap();
    fs::write(dir.path().join("notes.txt"), b"x").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub").join("c.jpg"), b"x").unwrap();

    let keys = collect_inputs(dir.path(), &ScanConfig::default()).unwrap();
    assert_eq!(
        keys,
        vec![
            FileKey::from(dir.path().join("a.jpeg")),
            FileKey::from(dir.path().join("b.PNG")),
        ]
    );
}

#[test]
fn test_recursive_includes_subfolders() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("x").join("y")).unwrap();
    fs::write(dir.path().join("x").join("y").join("deep.jpg"), b"x").unwrap();
    fs::write(dir.path().join("top.png"), b"x").unwrap();

    let config = ScanConfig {
        recursive: true,
        ..Default::default()
    };
    let keys = collect_inputs(dir.path(), &config).unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&FileKey::from(dir.path().join("x").join("y").join("deep.jpg"))));
}

#[test]
fn test_custom_extensions() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.webp"), b"x").unwrap();
    fs::write(dir.path().join("b.png"), b"x").unwrap();

    let config = ScanConfig {
        extensions: vec![".webp".to_string()],
        ..Default::default()
    };
    let keys = collect_inputs(dir.path(), &config).unwrap();
    assert_eq!(keys, vec![FileKey::from(dir.path().join("a.webp"))]);
}

#[test]
fn test_missing_folder_message() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("data");

    let err = collect_inputs(&missing, &ScanConfig::default()).unwrap_err();
    assert!(matches!(err, ScanError::NotFound(_)));
    assert!(err.to_string().starts_with("Folder not found"));
}
