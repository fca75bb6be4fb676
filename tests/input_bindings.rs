use std::io::Write;
use tempfile::NamedTempFile;
use vireo_engine::config::AppConfig;
use vireo_engine::events::{Event, KeyCode, MouseCode};
use vireo_engine::renderer::light_clusters::{ClusterDims, DepthSlicing};
use vireo_engine::triggers::TriggerMap;

#[test]
fn remapped_triggers_override_defaults() {
    let mut temp = NamedTempFile::new().expect("temp input config");
    write!(temp, r#"{{"bindings":{{"move_forward":["i"],"look":["mouse_left"]}}}}"#).expect("write remap config");

    let mut triggers = TriggerMap::load_or_default(temp.path());
    assert!(!triggers.is_active("move_forward"), "no events yet");

    triggers.apply(&Event::KeyPressed { key: KeyCode::I });
    assert!(triggers.is_active("move_forward"), "custom key drives the trigger");

    triggers.apply(&Event::KeyReleased { key: KeyCode::I });
    triggers.apply(&Event::KeyPressed { key: KeyCode::W });
    assert!(!triggers.is_active("move_forward"), "default key no longer fires once remapped");

    triggers.apply(&Event::MousePressed { button: MouseCode::Left });
    assert!(triggers.is_active("look"));
    assert!(!triggers.contains("quit"), "file bindings replace the default set");
}

#[test]
fn unreadable_binding_file_falls_back_to_defaults() {
    let mut temp = NamedTempFile::new().expect("temp input config");
    write!(temp, "{{ not json").expect("write broken config");
    let triggers = TriggerMap::load_or_default(temp.path());
    assert!(triggers.contains("quit"));
    assert!(triggers.contains("move_forward"));

    let missing = TriggerMap::load_or_default(temp.path().with_extension("missing"));
    assert!(missing.contains("look"));
}

#[test]
fn app_config_fills_missing_sections_with_defaults() {
    let mut temp = NamedTempFile::new().expect("temp app config");
    write!(temp, r#"{{"window":{{"width":640}},"clusters":{{"z":0,"slicing":"linear"}}}}"#).expect("write config");

    let config = AppConfig::load(temp.path()).expect("config parses");
    assert_eq!(config.window.width, 640);
    assert_eq!(config.window.height, 720);
    assert!(config.window.vsync);
    assert_eq!(config.clusters.slicing, DepthSlicing::Linear);
    assert_eq!(config.clusters.dims(), ClusterDims::new(16, 9, 1));
    assert!(!config.input.key_repeat);
    assert!(config.input.bindings.contains_key("quit"));
    assert_eq!(config.logging.filter, "info");
}

#[test]
fn broken_app_config_reports_an_error_and_defaults_are_available() {
    let mut temp = NamedTempFile::new().expect("temp app config");
    write!(temp, r#"{{"window":{{"width":"wide"}}}}"#).expect("write config");

    let err = AppConfig::load(temp.path()).expect_err("width must be numeric");
    assert!(format!("{err:#}").contains("Failed to parse config file"));

    let config = AppConfig::load_or_default(temp.path());
    assert_eq!(config.window.width, 1280);
    assert_eq!(config.clusters.slicing, DepthSlicing::Exponential);
}

#[test]
fn bundled_config_parses() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/app.json");
    let config = AppConfig::load(&path).expect("bundled config parses");
    let triggers = TriggerMap::from_bindings(&config.input.bindings, "bundled");
    for name in ["move_forward", "look", "quit"] {
        assert!(triggers.contains(name), "missing trigger {name}");
    }
}
