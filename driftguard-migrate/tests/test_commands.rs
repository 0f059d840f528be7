//! Tests for command handlers

use driftguard::migration::{
    DirectorySource, LocalMigration, MemoryHistoryStore, MigrationSource, Reconciler, StaticSource,
};
use driftguard::MigrationConfig;
use driftguard_migrate::commands;
use std::fs;
use tempfile::TempDir;

fn reconciler(store: &MemoryHistoryStore) -> Reconciler<StaticSource, MemoryHistoryStore> {
    Reconciler::new(
        StaticSource::new(vec![
            LocalMigration::new(1, "create users", "create table users (id int);"),
            LocalMigration::new(2, "add email", "alter table users add column email text;"),
        ]),
        store.clone(),
    )
}

#[test]
fn test_migrate_then_status() {
    colored::control::set_override(false);
    let store = MemoryHistoryStore::new();
    let reconciler = reconciler(&store);

    let output = commands::migrate(&reconciler).unwrap();
    assert!(output.contains("Applied 2 migration(s)"));
    assert!(output.contains("V1, V2"));

    let output = commands::migrate(&reconciler).unwrap();
    assert!(output.contains("up to date (2 applied)"));

    let output = commands::status(&reconciler, false).unwrap();
    assert!(output.contains("V1: create users"));
    assert!(output.contains("Pending: none"));
    assert!(output.contains("Summary: 2 applied, 0 pending"));
}

#[test]
fn test_status_json_lists_pending() {
    let store = MemoryHistoryStore::new();
    let output = commands::status(&reconciler(&store), true).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    let pending: Vec<u64> = value["pending"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["version"].as_u64().unwrap())
        .collect();
    assert_eq!(pending, vec![1, 2]);
    assert_eq!(value["applied"].as_array().unwrap().len(), 0);
    assert!(store.records().is_empty());
}

#[test]
fn test_validate_reports_drift_verbatim() {
    let store = MemoryHistoryStore::new();
    commands::migrate(&reconciler(&store)).unwrap();

    let tampered = Reconciler::new(
        StaticSource::new(vec![
            LocalMigration::new(1, "create users", "create table users (id bigint);"),
            LocalMigration::new(2, "add email", "alter table users add column email text;"),
        ]),
        store.clone(),
    );
    let err = commands::validate(&tampered).unwrap_err();
    assert!(err
        .to_string()
        .starts_with("local checksum does not match applied checksum for version 1"));
}

#[test]
fn test_unconfirmed_clean_is_refused_without_a_database() {
    // the URL points nowhere; refusing must not need a connection
    let config = MigrationConfig {
        database_url: Some("postgresql://nobody@127.0.0.1:1/none".to_string()),
        schema: "app".to_string(),
        history_table: "history".to_string(),
        ..MigrationConfig::default()
    };
    let err = commands::confirm_clean(&config.target(), false).unwrap_err();
    assert_eq!(err.to_string(), "refusing to clean app.history without --yes");
    assert!(commands::confirm_clean(&config.target(), true).is_ok());
}

#[test]
fn test_clean_requires_confirmation() {
    let store = MemoryHistoryStore::new();
    let reconciler = reconciler(&store);
    commands::migrate(&reconciler).unwrap();

    let err = commands::clean(&reconciler, false).unwrap_err();
    assert!(err.to_string().contains("without --yes"));
    assert_eq!(store.records().len(), 2);

    commands::clean(&reconciler, true).unwrap();
    assert!(store.records().is_empty());
}

#[test]
fn test_new_migration_uses_next_version() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("V1__create_users.sql"), "create table users (id int);").unwrap();
    fs::write(dir.path().join("V7__add_email.sql"), "alter table users add column email text;").unwrap();

    let source = DirectorySource::new(dir.path());
    let output = commands::new_migration(&source, "add index").unwrap();
    assert!(output.contains("V8__add index.sql"));

    let versions: Vec<u64> = source.load().unwrap().iter().map(|m| m.version).collect();
    assert_eq!(versions, vec![1, 7, 8]);
}
