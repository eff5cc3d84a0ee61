use tempfile::TempDir;

use crate::config::Config;
use crate::server::setup_app;

fn config(directory: &TempDir, session_key: Option<&str>) -> Config {
    let database = directory.path().join("hej.sqlite");

    Config::from_vars(|name| match name {
        "HEJ_DB_PATH" => Some(database.to_string_lossy().to_string()),
        "HEJ_SESSION_KEY" => session_key.map(ToString::to_string),
        _ => None,
    })
    .unwrap()
}

#[tokio::test]
async fn test_setup_requires_session_key() {
    let directory = TempDir::new().unwrap();

    let result = setup_app(&config(&directory, None)).await;

    assert!(result.is_err());
    // failed before touching the database
    assert!(!directory.path().join("hej.sqlite").exists());
}

#[tokio::test]
async fn test_setup_migrates_database() {
    let directory = TempDir::new().unwrap();
    let config = config(&directory, Some("verysecret"));

    let _router = setup_app(&config).await.unwrap();
    assert!(directory.path().join("hej.sqlite").exists());

    // a second start finds an up to date database
    let _router = setup_app(&config).await.unwrap();
}
