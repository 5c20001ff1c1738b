use capsearch::cache::{Description, DescriptionStore, FileKey};
use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

#[test]
fn test_put_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("descriptions_cache.json");

    {
        let store = DescriptionStore::open(&path);
        store
            .put(FileKey::from("./data/a.png"), Description::new("A red dragon"))
            .unwrap();
    }

    let reopened = DescriptionStore::open(&path);
    assert_eq!(reopened.len(), 1);
    assert_eq!(
        reopened.get(&FileKey::from("./data/a.png")),
        Some(Description::new("A red dragon"))
    );
}

#[test]
fn test_file_is_flat_json_object() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let store = DescriptionStore::open(&path);
    store
        .put(FileKey::from("x.jpg"), Description::new("a cat"))
        .unwrap();

    let raw: BTreeMap<String, String> =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw.get("x.jpg").map(String::as_str), Some("a cat"));
}

#[test]
fn test_existing_legacy_file_is_loaded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("descriptions_cache.json");
    fs::write(
        &path,
        r#"{"./data/john_doe_1.jpg": "Tattoo of a rose", "./data/b.png": "A boat"}"#,
    )
    .unwrap();

    let store = DescriptionStore::open(&path);
    assert_eq!(store.len(), 2);
    assert!(store.contains(&FileKey::from("./data/b.png")));
}

#[test]
fn test_concurrent_puts_all_persist() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let store = Arc::new(DescriptionStore::open(&path));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store
                    .put(
                        FileKey::new(format!("file{i}.png")),
                        Description::new(format!("description {i}")),
                    )
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), 16);

    // Every flush wrote a complete mapping, so the final file holds all keys.
    let raw: BTreeMap<String, String> =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw.len(), 16);
    assert_eq!(DescriptionStore::open(&path).len(), 16);
}

#[test]
fn test_corrupt_file_recovers_on_next_put() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    fs::write(&path, "{ not json").unwrap();

    let store = DescriptionStore::open(&path);
    assert!(store.is_empty());

    store
        .put(FileKey::from("a.png"), Description::new("fresh"))
        .unwrap();
    assert_eq!(DescriptionStore::open(&path).len(), 1);
}

#[test]
fn test_missing_parent_directory_is_created() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("cache.json");

    let store = DescriptionStore::open(&path);
    store
        .put(FileKey::from("a.png"), Description::new("ok"))
        .unwrap();
    assert!(path.exists());
}

#[test]
fn test_clear_persists_empty_mapping() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let store = DescriptionStore::open(&path);
    store
        .put(FileKey::from("a.png"), Description::new("one"))
        .unwrap();

    store.clear().unwrap();
    assert!(store.is_empty());
    assert!(DescriptionStore::open(&path).is_empty());
}
