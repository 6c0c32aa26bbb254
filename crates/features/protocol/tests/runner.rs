use aliq_domain::Mount;
use aliq_protocol::*;
use std::fs;
use tempfile::tempdir;

const PLATE_FILL: &str = r#"{
  "metadata": { "protocolName": "Plate fill", "author": "lab" },
  "labware": [
    { "id": "tips", "loadName": "opentrons_flex_96_tiprack_50ul", "slot": "C1" },
    { "id": "reservoir", "loadName": "nest_12_reservoir_15ml", "slot": "D1" },
    { "id": "plate", "loadName": "nest_96_wellplate_200ul_flat", "slot": "D2" }
  ],
  "trash": "A3",
  "pipettes": [{ "id": "p50", "name": "flex_1channel_50", "mount": "left", "tipRacks": ["tips"] }],
  "liquids": [{ "labware": "reservoir", "wells": ["A1", "A2"], "volume": 5000 }],
  "steps": [
    { "step": "comment", "message": "fill row A" },
    { "step": "transfer", "pipette": "p50", "liquidClass": "water", "volume": 20,
      "sources": [{ "labware": "reservoir", "well": "A1" }, { "labware": "reservoir", "well": "A2" }],
      "destinations": [{ "labware": "plate", "well": "A1" }, { "labware": "plate", "well": "A2" }],
      "newTip": "per-source" },
    { "step": "pickUpTip", "pipette": "p50" },
    { "step": "aspirate", "pipette": "p50", "well": { "labware": "plate", "well": "A1" }, "volume": 5 },
    { "step": "dispense", "pipette": "p50", "target": "trash" },
    { "step": "dropTip", "pipette": "p50" },
    { "step": "delay", "seconds": 2 }
  ]
}"#;

fn engine() -> ProtocolEngine {
    ProtocolEngine::new(EngineConfig::default()).unwrap()
}

fn alias_to_id(engine: &ProtocolEngine, load_name: &str) -> String {
    engine.deck().all_labware().into_iter().find(|lw| lw.load_name() == load_name).unwrap().id.clone()
}

#[test]
fn runs_a_protocol_file() {
    let protocol = ProtocolFile::from_json(PLATE_FILL).unwrap();
    assert_eq!(protocol.metadata.protocol_name.as_deref(), Some("Plate fill"));
    assert_eq!(protocol.steps.len(), 7);

    let mut engine = engine();
    run_protocol(&mut engine, &protocol).unwrap();

    let reservoir = alias_to_id(&engine, "nest_12_reservoir_15ml");
    let plate = alias_to_id(&engine, "nest_96_wellplate_200ul_flat");
    assert_eq!(engine.well_volume(&reservoir, "A1"), 4_980.0);
    assert_eq!(engine.well_volume(&reservoir, "A2"), 4_980.0);
    assert_eq!(engine.well_volume(&plate, "A1"), 15.0);
    assert_eq!(engine.well_volume(&plate, "A2"), 20.0);

    // two tips for the per-source transfer, one for the manual steps
    assert_eq!(engine.tips_used(), 3);
    assert!(!engine.pipette(Mount::Left).unwrap().has_tip());
    assert!(matches!(engine.commands().last(), Some(Command::WaitForDuration { seconds, .. }) if *seconds == 2.0));
    assert!(engine.commands().iter().any(|c| matches!(c, Command::Comment { message } if message == "fill row A")));
}

#[test]
fn failing_steps_are_identified() {
    let json = r#"{
      "labware": [{ "id": "plate", "loadName": "nest_96_wellplate_200ul_flat", "slot": "D2" }],
      "pipettes": [{ "id": "p50", "name": "flex_1channel_50", "mount": "right" }],
      "steps": [
        { "step": "comment", "message": "start" },
        { "step": "transfer", "pipette": "p50", "liquidClass": "water", "volume": 10,
          "sources": [{ "labware": "reservoir", "well": "A1" }],
          "destinations": [{ "labware": "plate", "well": "A1" }] }
      ]
    }"#;
    let protocol = ProtocolFile::from_json(json).unwrap();
    let err = run_protocol(&mut engine(), &protocol).unwrap_err();
    assert_eq!(err.to_string(), "Unknown labware 'reservoir' in protocol file (step 2 (transfer))");
}

#[test]
fn setup_errors_name_the_entry() {
    let json = r#"{
      "labware": [
        { "id": "a", "loadName": "nest_96_wellplate_200ul_flat", "slot": "D2" },
        { "id": "b", "loadName": "nest_96_wellplate_200ul_flat", "slot": "D2" }
      ]
    }"#;
    let protocol = ProtocolFile::from_json(json).unwrap();
    let err = run_protocol(&mut engine(), &protocol).unwrap_err();
    assert!(matches!(err, ProtocolError::Labware { .. }));
    assert_eq!(err.attached_context(), Some("labware 'b'"));

    let json = r#"{ "pipettes": [{ "id": "p", "name": "flex_1channel_50", "mount": "left", "tipRacks": ["tips"] }] }"#;
    let err = run_protocol(&mut engine(), &ProtocolFile::from_json(json).unwrap()).unwrap_err();
    assert!(matches!(err, ProtocolError::UnknownReference { kind: "labware", .. }));
}

#[test]
fn protocol_files_load_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plate_fill.json");
    fs::write(&path, PLATE_FILL).unwrap();
    let protocol = ProtocolFile::from_path(&path).unwrap();
    assert_eq!(protocol.labware.len(), 3);
    assert_eq!(protocol.pipettes[0].mount, Mount::Left);

    let err = ProtocolFile::from_path(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, ProtocolError::Io { .. }));
    assert!(err.to_string().contains("missing.json"));

    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(ProtocolFile::from_path(&path), Err(ProtocolError::Parse { .. })));
}

#[test]
fn negative_delays_stop_the_run() {
    let json = r#"{ "steps": [{ "step": "comment", "message": "wait" }, { "step": "delay", "seconds": -5 }] }"#;
    let mut engine = engine();
    let err = run_protocol(&mut engine, &ProtocolFile::from_json(json).unwrap()).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidDelay { .. }));
    assert_eq!(err.to_string(), "Invalid delay of -5 seconds (step 2 (delay)): must be zero or more");
    assert!(!engine.commands().iter().any(|c| matches!(c, Command::WaitForDuration { .. })));
}

#[test]
fn pressure_dispense_steps_and_detection_overrides() {
    let json = r#"{
      "labware": [
        { "id": "tips", "loadName": "opentrons_flex_96_tiprack_50ul", "slot": "C1" },
        { "id": "plate", "loadName": "nest_96_wellplate_200ul_flat", "slot": "D2" }
      ],
      "pipettes": [{ "id": "p50", "name": "flex_1channel_50", "mount": "left", "tipRacks": ["tips"],
                     "liquidPresenceDetection": true }],
      "liquids": [{ "labware": "plate", "wells": ["A1"], "volume": 100 }],
      "steps": [
        { "step": "pickUpTip", "pipette": "p50" },
        { "step": "aspirate", "pipette": "p50", "well": { "labware": "plate", "well": "A1" }, "volume": 40 },
        { "step": "pressureDispense", "pipette": "p50", "well": { "labware": "plate", "well": "A2" } }
      ]
    }"#;
    let mut engine = engine();
    run_protocol(&mut engine, &ProtocolFile::from_json(json).unwrap()).unwrap();

    let plate = alias_to_id(&engine, "nest_96_wellplate_200ul_flat");
    assert_eq!(engine.well_volume(&plate, "A1"), 60.0);
    assert_eq!(engine.well_volume(&plate, "A2"), 40.0);
    let pipette = engine.pipette(Mount::Left).unwrap();
    assert!(pipette.liquid_presence_detection);
    assert!(!pipette.ready_to_aspirate);
    assert!(matches!(engine.commands().last(), Some(Command::PressureDispense { volume, .. }) if *volume == 40.0));
}
