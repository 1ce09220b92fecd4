use super::{AppConfig, ConfigStore};
use crate::styles::DEFAULT_STYLES;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use std::{env, fs};

fn temp_store(tag: &str) -> ConfigStore {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    let path = env::temp_dir().join(format!("speakterm_test_{tag}_{nanos}/config.json"));
    ConfigStore::new(path)
}

fn cleanup(store: &ConfigStore) {
    if let Some(parent) = store.path().parent() {
        let _ = fs::remove_dir_all(parent);
    }
}

#[test]
fn load_missing_file_returns_defaults_without_warning() {
    let store = temp_store("missing");
    let (cfg, warning) = store.load();
    assert_eq!(cfg, AppConfig::default());
    assert!(warning.is_none());
}

#[test]
fn load_corrupt_file_degrades_to_defaults_with_warning() {
    let store = temp_store("corrupt");
    fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    fs::write(store.path(), "{not json").unwrap();

    let (cfg, warning) = store.load();
    assert_eq!(cfg, AppConfig::default());
    assert!(warning.is_some());
    cleanup(&store);
}

#[test]
fn save_then_load_round_trips() {
    let store = temp_store("roundtrip");
    let mut cfg = AppConfig::default();
    cfg.voice = "onyx".to_string();
    cfg.streaming = true;
    cfg.api_key = Some("sk-test".to_string());
    cfg.styles.insert("Teaching".to_string(), true);

    store.save(&cfg).expect("save");
    let (loaded, warning) = store.load();
    assert!(warning.is_none());
    assert_eq!(loaded, cfg);
    cleanup(&store);
}

#[test]
fn save_of_loaded_config_is_a_noop_on_disk() {
    let store = temp_store("idempotent");
    let mut cfg = AppConfig::default();
    cfg.styles.insert("Calm".to_string(), false);
    store.save(&cfg).expect("save");
    let first = fs::read_to_string(store.path()).unwrap();

    let (loaded, _) = store.load();
    store.save(&loaded).expect("second save");
    let second = fs::read_to_string(store.path()).unwrap();
    assert_eq!(first, second);
    cleanup(&store);
}

#[test]
fn save_does_not_leave_temp_file_behind() {
    let store = temp_store("tmpfile");
    store.save(&AppConfig::default()).expect("save");
    let tmp = store.path().with_extension("json.tmp");
    assert!(!tmp.exists());
    assert!(store.path().exists());
    cleanup(&store);
}

#[test]
fn absent_api_key_is_omitted_from_the_document() {
    let store = temp_store("nokey");
    store.save(&AppConfig::default()).expect("save");
    let raw = fs::read_to_string(store.path()).unwrap();
    assert!(!raw.contains("api_key"));
    cleanup(&store);
}

#[test]
fn merge_defaults_adds_missing_styles_disabled() {
    let mut cfg = AppConfig::default();
    cfg.styles.insert("Excited".to_string(), true);
    cfg.merge_defaults(DEFAULT_STYLES);

    assert_eq!(cfg.styles.len(), DEFAULT_STYLES.len());
    assert_eq!(cfg.styles.get("Excited"), Some(&true));
    assert_eq!(cfg.styles.get("Teaching"), Some(&false));
}

#[test]
fn merge_defaults_drops_styles_unknown_to_the_registry() {
    let mut cfg = AppConfig::default();
    cfg.styles.insert("Retired".to_string(), true);
    cfg.merge_defaults(DEFAULT_STYLES);
    assert!(!cfg.styles.contains_key("Retired"));
}

#[test]
fn merge_defaults_is_idempotent() {
    let mut cfg = AppConfig::default();
    cfg.styles.insert("Whisper".to_string(), true);
    cfg.styles.insert("Retired".to_string(), true);
    cfg.merge_defaults(DEFAULT_STYLES);
    let once = cfg.styles.clone();
    cfg.merge_defaults(DEFAULT_STYLES);
    assert_eq!(cfg.styles, once);
}

#[test]
fn old_document_without_styles_field_still_loads() {
    let store = temp_store("legacy");
    fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    fs::write(store.path(), r#"{"voice": "nova", "streaming": true}"#).unwrap();

    let (cfg, warning) = store.load();
    assert!(warning.is_none());
    assert_eq!(cfg.voice, "nova");
    assert!(cfg.streaming);
    assert_eq!(cfg.styles, BTreeMap::new());
    cleanup(&store);
}
