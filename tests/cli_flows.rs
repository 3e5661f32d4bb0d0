//! Whole-command flows driven through the CLI runner

use clap::Parser;
use glopm::cli::{Args, Runner};
use glopm::config::{AppConfig, ConfigPaths, Credentials};
use glopm::error::RegistryError;
use httpmock::prelude::*;
use serde_json::json;
use std::path::Path;

fn runner(server: &MockServer, home: &Path, argv: &[&str]) -> Runner {
    let api_url = server.url("/api");
    let mut full = vec!["glopm", "--quiet", "--api-url", api_url.as_str()];
    full.extend_from_slice(argv);
    let args = Args::try_parse_from(full).unwrap();
    Runner::new(args).with_paths(ConfigPaths::new(home))
}

fn logged_in(home: &Path) {
    let mut config = AppConfig::default();
    config.set_credentials(Credentials::new("1", "key-1", "alice"));
    config.save(&ConfigPaths::new(home).config_file()).unwrap();
}

#[tokio::test]
async fn login_persists_credentials_but_not_the_url_override() {
    let server = MockServer::start_async().await;
    let login = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/auth/login")
                .json_body(json!({"username": "alice", "password": "pw"}));
            then.status(200).json_body(json!({"userId": 12, "apiKey": "abcdef123"}));
        })
        .await;
    let home = tempfile::tempdir().unwrap();

    let ok = runner(&server, home.path(), &["login", "-u", "alice", "-p", "pw"])
        .run()
        .await
        .unwrap();
    assert!(ok);
    login.assert_hits_async(1).await;

    let stored = AppConfig::load(&ConfigPaths::new(home.path()).config_file()).unwrap();
    let creds = stored.credentials.unwrap();
    assert_eq!(creds.user_id, "12");
    assert_eq!(creds.api_key, "abcdef123");
    assert_eq!(creds.username, "alice");
    assert_eq!(stored.api_url, glopm::config::DEFAULT_API_URL);
}

#[tokio::test]
async fn rejected_login_leaves_config_untouched() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/auth/login");
            then.status(401).json_body(json!({"error": "Invalid credentials"}));
        })
        .await;
    let home = tempfile::tempdir().unwrap();

    let err = runner(&server, home.path(), &["login", "-u", "alice", "-p", "wrong"])
        .run()
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");
    assert!(!ConfigPaths::new(home.path()).config_file().exists());
}

#[tokio::test]
async fn batch_download_writes_one_archive_per_package() {
    let server = MockServer::start_async().await;
    let latest = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/packages/a/latestVersion");
            then.status(200).json_body(json!({"version": "2.0.0"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/packages/a/download/2.0.0");
            then.status(200).body("archive a");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/packages/b/download/1.0");
            then.status(200).body("archive b");
        })
        .await;
    let home = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let out_dir = out.path().to_string_lossy().to_string();

    let ok = runner(
        &server,
        home.path(),
        &["batch-download", "a", "b@1.0", "--parallel", "-d", out_dir.as_str()],
    )
    .run()
    .await
    .unwrap();

    assert!(ok);
    assert_eq!(std::fs::read_to_string(out.path().join("a-2.0.0.pkg")).unwrap(), "archive a");
    assert_eq!(std::fs::read_to_string(out.path().join("b-1.0.pkg")).unwrap(), "archive b");
    latest.assert_hits_async(1).await;
}

#[tokio::test]
async fn batch_delete_with_one_missing_package_reports_failure() {
    let server = MockServer::start_async().await;
    let a = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/api/packages/a").header("x-api-key", "key-1");
            then.status(200).json_body(json!({"message": "ok"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/api/packages/b");
            then.status(404).json_body(json!({"error": "Package not found"}));
        })
        .await;
    let c = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/api/packages/c");
            then.status(200).json_body(json!({"message": "ok"}));
        })
        .await;
    let home = tempfile::tempdir().unwrap();
    logged_in(home.path());

    let ok = runner(&server, home.path(), &["batch-delete", "a", "b", "c", "--force"])
        .run()
        .await
        .unwrap();

    assert!(!ok);
    a.assert_hits_async(1).await;
    c.assert_hits_async(1).await;
}

#[tokio::test]
async fn batch_delete_requires_login_before_any_request() {
    let server = MockServer::start_async().await;
    let any = server
        .mock_async(|when, then| {
            when.method(DELETE);
            then.status(200);
        })
        .await;
    let home = tempfile::tempdir().unwrap();

    let err = runner(&server, home.path(), &["batch-delete", "a", "b", "--force"])
        .run()
        .await
        .unwrap_err();
    assert_eq!(err, RegistryError::NotLoggedIn);
    any.assert_hits_async(0).await;
}

#[tokio::test]
async fn publish_invalidates_cached_versions() {
    let server = MockServer::start_async().await;
    let publish = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/api/packages/publish")
                .body_contains("name=\"version\"")
                .body_contains("1.1.0");
            then.status(200).json_body(json!({"message": "published"}));
        })
        .await;
    let home = tempfile::tempdir().unwrap();
    logged_in(home.path());
    let archive = home.path().join("foo.tgz");
    std::fs::write(&archive, b"tarball").unwrap();

    let cache = glopm::ResponseCache::new(
        ConfigPaths::new(home.path()).cache_dir(),
        glopm::Logger::new_quiet(),
    );
    cache.put("foo", &json!({"latest_version": {"version": "1.0.0"}})).await.unwrap();

    let archive_arg = archive.to_string_lossy().to_string();
    let ok = runner(
        &server,
        home.path(),
        &["publish", "foo", "1.1.0", "A test package", archive_arg.as_str()],
    )
    .run()
    .await
    .unwrap();

    assert!(ok);
    publish.assert_hits_async(1).await;
    assert!(!cache.entry_path("foo").exists());
}

#[tokio::test]
async fn logout_forgets_credentials() {
    let server = MockServer::start_async().await;
    let home = tempfile::tempdir().unwrap();
    logged_in(home.path());

    assert!(runner(&server, home.path(), &["logout"]).run().await.unwrap());
    let stored = AppConfig::load(&ConfigPaths::new(home.path()).config_file()).unwrap();
    assert!(!stored.is_logged_in());
}
