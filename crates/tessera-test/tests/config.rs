//! Configuration loading.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tessera_common::{ErrorCode, TesseraConfig};
use tessera_core::clause::{PredicateWhere, Where};
use tessera_core::table::ValueTable;
use tessera_core::view::View;
use tessera_test::fixtures::{participant, participants};

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[entities]\nlocal_cache = false\n\n[where_cache]\nenabled = true\ncapacity = 64\n"
    )
    .unwrap();

    let config = TesseraConfig::from_file(file.path()).unwrap();
    assert!(!config.entities.local_cache);
    assert!(config.where_cache.enabled);
    assert_eq!(config.where_cache.capacity, 64);
    assert!(config.join.validate_entity_type);
}

#[test]
fn test_empty_file_uses_defaults() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let config = TesseraConfig::from_file(file.path()).unwrap();
    assert_eq!(config, TesseraConfig::default());
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = TesseraConfig::from_file(dir.path().join("tessera.toml")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Io);
}

#[test]
fn test_rejects_invalid() {
    let zero = TesseraConfig::from_toml_str("[where_cache]\ncapacity = 0\n").unwrap_err();
    assert_eq!(zero.code(), ErrorCode::InvalidConfig);

    let malformed = TesseraConfig::from_toml_str("[join]\nvalidate_entity_type = \"yes\"\n");
    assert_eq!(malformed.unwrap_err().code(), ErrorCode::InvalidConfig);
}

#[test]
fn test_toml_round_trip() {
    let mut config = TesseraConfig::default();
    config.where_cache.enabled = true;
    config.join.validate_entity_type = false;

    let text = config.to_toml_string().unwrap();
    assert_eq!(TesseraConfig::from_toml_str(&text).unwrap(), config);
}

#[test]
fn test_loaded_config_drives_views() {
    let config = TesseraConfig::from_toml_str("[where_cache]\nenabled = true\n").unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let table = participants();
    let view = View::builder("Adults")
        .from(table.clone())
        .where_clause(Where::predicate(PredicateWhere::new(move |table, row| {
            counted.fetch_add(1, Ordering::SeqCst);
            let age = table.variable("AGE")?;
            Ok(table.value(&age, row)?.as_integer().unwrap_or(0) >= 21)
        })))
        .config(&config)
        .build()
        .unwrap();

    assert_eq!(view.variable_entity_count().unwrap(), 3);
    let row = table.value_set(&participant("2")).unwrap();
    view.where_clause().accepts(&*table, &row).unwrap();
    view.where_clause().accepts(&*table, &row).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}
