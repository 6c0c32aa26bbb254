use aliq_kernel::config::{ConfigError, load_config};
use aliq_kernel::domain::DeckSlotName;
use aliq_kernel::domain::config::SimConfig;
use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[test]
#[serial]
fn defaults_without_a_file() {
    let cfg: SimConfig = load_config(None::<&Path>).expect("defaults should load");
    assert_eq!(cfg.logging.level, "info");
    assert_eq!(cfg.robot.trash_slot, DeckSlotName::A3);
}

#[test]
#[serial]
fn reads_toml_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("aliquot.toml");
    fs::write(
        &path,
        r#"
[logging]
level = "debug"

[robot]
air_gap_safe_offset_mm = 4.0
trash_slot = "D3"
"#,
    )?;

    let cfg: SimConfig = load_config(Some(&path))?;
    assert_eq!(cfg.logging.level, "debug");
    assert!((cfg.robot.air_gap_safe_offset_mm - 4.0).abs() < f64::EPSILON);
    assert_eq!(cfg.robot.trash_slot, DeckSlotName::D3);
    Ok(())
}

#[test]
#[serial]
fn reads_json_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("aliquot.json");
    fs::write(&path, r#"{ "robot": { "touch_tip_radius": 0.8 }, "logging": { "json": true } }"#)?;

    let cfg: SimConfig = load_config(Some(&path))?;
    assert!((cfg.robot.touch_tip_radius - 0.8).abs() < f64::EPSILON);
    assert!(cfg.logging.json);
    assert!((cfg.robot.air_gap_safe_offset_mm - 2.0).abs() < f64::EPSILON);
    Ok(())
}

#[test]
#[serial]
fn missing_file_is_an_error() {
    let err = load_config::<SimConfig>(Some("does/not/exist.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Config { .. }));
    assert_eq!(err.attached_context(), Some("Failed to build config"));
}
