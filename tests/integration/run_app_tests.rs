use capsearch::cache::{Description, DescriptionStore, FileKey};
use capsearch::cli::Cli;
use capsearch::error::ExitCode;
use clap::Parser;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

/// Workspace with an empty config file, a data folder and a cache path.
struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let root = tempdir().unwrap();
        fs::write(root.path().join("config.toml"), "").unwrap();
        fs::create_dir(root.path().join("data")).unwrap();
        Self { root }
    }

    fn path(&self, name: &str) -> String {
        self.root.path().join(name).to_string_lossy().into_owned()
    }

    fn data_file(&self, name: &str) -> FileKey {
        let path = self.root.path().join("data").join(name);
        fs::write(&path, b"not really an image").unwrap();
        FileKey::from(path)
    }

    fn run(&self, args: &[&str]) -> anyhow::Result<ExitCode> {
        let config = self.path("config.toml");
        let mut argv = vec!["capsearch", "-q", "--no-color", "--config", config.as_str()];
        argv.extend_from_slice(args);
        capsearch::run_app(Cli::try_parse_from(argv).unwrap())
    }
}

#[test]
fn test_search_missing_folder_is_error() {
    let ws = Workspace::new();
    let missing = ws.path("nope");

    let err = ws.run(&["search", "red", "--dir", &missing]).unwrap_err();
    assert!(format!("{:#}", err).contains("Folder not found"));
}

#[test]
fn test_missing_config_file_is_error() {
    let args = Cli::try_parse_from([
        "capsearch",
        "-q",
        "--config",
        "/definitely/not/here/config.toml",
        "cache",
        "stats",
    ])
    .unwrap();
    assert!(capsearch::run_app(args).is_err());
}

#[test]
fn test_search_fully_cached_folder() {
    let ws = Workspace::new();
    let cache = ws.path("cache.json");
    let data = ws.path("data");

    let store = DescriptionStore::open(&cache);
    let rose = ws.data_file("jane_roe_1.png");
    let boat = ws.data_file("boat.jpg");
    store.put(rose, Description::new("A red rose")).unwrap();
    store.put(boat, Description::new("A blue boat")).unwrap();

    let code = ws
        .run(&["search", "RED", "--dir", &data, "--cache", &cache])
        .unwrap();
    assert_eq!(code, ExitCode::Success);

    let code = ws
        .run(&["search", "zebra", "--dir", &data, "--cache", &cache, "-o", "json"])
        .unwrap();
    assert_eq!(code, ExitCode::NoMatches);
}

#[test]
fn test_describe_empty_folder() {
    let ws = Workspace::new();
    let data = ws.path("data");
    let cache = ws.path("cache.json");

    let code = ws
        .run(&["describe", "--dir", &data, "--cache", &cache])
        .unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(!Path::new(&cache).exists());
}

#[test]
fn test_cache_stats_and_clear() {
    let ws = Workspace::new();
    let cache = ws.path("cache.json");
    DescriptionStore::open(&cache)
        .put(FileKey::from("a.png"), Description::new("x"))
        .unwrap();

    assert_eq!(
        ws.run(&["cache", "stats", "--cache", &cache]).unwrap(),
        ExitCode::Success
    );
    assert_eq!(
        ws.run(&["cache", "clear", "--cache", &cache]).unwrap(),
        ExitCode::Success
    );
    assert!(DescriptionStore::open(&cache).is_empty());
}
