use aliq_domain::config::RobotConfig;
use aliq_domain::pipette::{PipetteDefinition, Sensors};
use aliq_domain::{DeckSlotName, Mount};
use aliq_labware::LabwareError;
use std::sync::Arc;
use aliq_protocol::*;
use aliq_transfer::{TipPolicy, TransferRequest, TransferTarget, WellRef};

const P50: &str = "flex_1channel_50";

struct Setup {
    engine: ProtocolEngine,
    tips: String,
    reservoir: String,
    plate: String,
}

fn setup_with(robot: RobotConfig) -> Setup {
    let mut engine = ProtocolEngine::new(EngineConfig::builder().robot(robot).build()).unwrap();
    let tips = engine.load_labware("opentrons_flex_96_tiprack_50ul", DeckSlotName::C1).unwrap();
    let reservoir = engine.load_labware("nest_12_reservoir_15ml", DeckSlotName::D1).unwrap();
    let plate = engine.load_labware("nest_96_wellplate_200ul_flat", DeckSlotName::D2).unwrap();
    engine.load_instrument(P50, Mount::Left, &[tips.clone()]).unwrap();
    engine.load_liquid(&reservoir, "A1", 10_000.0).unwrap();
    Setup { engine, tips, reservoir, plate }
}

fn setup() -> Setup {
    setup_with(RobotConfig::default())
}

fn count(engine: &ProtocolEngine, command_type: &str) -> usize {
    engine.commands().iter().filter(|command| AsRef::<str>::as_ref(*command) == command_type).count()
}

fn plate_wells(plate: &str, names: &[&str]) -> Vec<TransferTarget> {
    names.iter().map(|name| TransferTarget::Well(WellRef::new(plate, *name))).collect()
}

#[test]
fn setup_is_recorded() {
    let Setup { engine, .. } = setup();
    let types: Vec<&str> = engine.commands().iter().map(AsRef::<str>::as_ref).collect();
    assert_eq!(types, vec!["loadLabware", "loadLabware", "loadLabware", "loadPipette", "loadLiquid"]);

    let pipette = engine.pipette(Mount::Left).unwrap();
    assert!(pipette.id.starts_with("pipette-"));
    assert!(!pipette.has_tip());
    assert!(engine.pipette(Mount::Right).is_none());
}

#[test]
fn mounts_and_tip_racks_are_validated() {
    let Setup { mut engine, tips, plate, .. } = setup();

    let err = engine.load_instrument(P50, Mount::Left, &[]).unwrap_err();
    assert_eq!(err.to_string(), "The left mount already holds flex_1channel_50");

    let err = engine.load_instrument(P50, Mount::Right, &[plate]).unwrap_err();
    assert!(matches!(err, ProtocolError::NotATipRack { .. }));

    let big_tips = engine.load_labware("opentrons_flex_96_tiprack_1000ul", DeckSlotName::C2).unwrap();
    let err = engine.load_instrument(P50, Mount::Right, &[big_tips.clone()]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Tip rack opentrons_flex_96_tiprack_1000ul is not compatible with flex_1channel_50"
    );

    engine.load_instrument("flex_1channel_1000", Mount::Right, &[big_tips, tips]).unwrap();
    assert!(matches!(
        engine.load_instrument("p20_single", Mount::Right, &[]),
        Err(ProtocolError::MountOccupied { .. })
    ));
}

#[test]
fn manual_pipetting_moves_liquid() {
    let Setup { mut engine, reservoir, plate, .. } = setup();
    let source = WellRef::new(&reservoir, "A1");
    let destination = TransferTarget::Well(WellRef::new(&plate, "A1"));

    engine.pick_up_tip(Mount::Left, None).unwrap();
    engine.aspirate(Mount::Left, &source, 20.0, None).unwrap();
    engine.dispense(Mount::Left, &destination, None, None, None).unwrap();

    assert_eq!(engine.well_volume(&reservoir, "A1"), 9_980.0);
    assert_eq!(engine.well_volume(&plate, "A1"), 20.0);
    assert_eq!(engine.pipette(Mount::Left).unwrap().current_volume, 0.0);

    let types: Vec<&str> = engine.commands().iter().skip(5).map(AsRef::<str>::as_ref).collect();
    assert_eq!(types, vec!["pickUpTip", "moveTo", "prepareToAspirate", "moveTo", "aspirate", "moveTo", "dispense"]);
    let Some(Command::Aspirate { flow_rate, .. }) = engine.commands().get(9) else { panic!("expected aspirate") };
    assert_eq!(*flow_rate, 35.0);
}

#[test]
fn pipetting_needs_a_tip_and_room_in_it() {
    let Setup { mut engine, reservoir, .. } = setup();
    let source = WellRef::new(&reservoir, "A1");

    let err = engine.aspirate(Mount::Left, &source, 10.0, None).unwrap_err();
    assert_eq!(err.to_string(), "Pipette flex_1channel_50 has no tip attached");
    assert!(matches!(engine.drop_tip(Mount::Left), Err(ProtocolError::TipNotAttached { .. })));
    assert!(matches!(engine.drop_tip(Mount::Right), Err(ProtocolError::PipetteNotAttached { .. })));

    engine.pick_up_tip(Mount::Left, None).unwrap();
    assert!(matches!(engine.pick_up_tip(Mount::Left, None), Err(ProtocolError::TipAlreadyAttached { .. })));

    let err = engine.aspirate(Mount::Left, &source, 60.0, None).unwrap_err();
    assert!(matches!(err, ProtocolError::VolumeExceedsCapacity { max_volume, .. } if max_volume == 50.0));
    assert!(matches!(engine.aspirate(Mount::Left, &source, -1.0, None), Err(ProtocolError::InvalidVolume { .. })));

    engine.aspirate(Mount::Left, &source, 45.0, None).unwrap();
    assert!(matches!(engine.air_gap(Mount::Left, 10.0), Err(ProtocolError::VolumeExceedsCapacity { .. })));
    engine.air_gap(Mount::Left, 5.0).unwrap();
    assert_eq!(engine.pipette(Mount::Left).unwrap().current_volume, 50.0);
}

#[test]
fn aspirating_more_than_a_well_holds() {
    let Setup { mut engine, plate, .. } = setup();
    engine.load_liquid(&plate, "A1", 10.0).unwrap();
    engine.pick_up_tip(Mount::Left, None).unwrap();
    engine.aspirate(Mount::Left, &WellRef::new(&plate, "A1"), 20.0, None).unwrap();
    assert_eq!(engine.well_volume(&plate, "A1"), 0.0);

    let robot = RobotConfig { liquid_presence_detection: true, ..RobotConfig::default() };
    let Setup { mut engine, plate, .. } = setup_with(robot);
    engine.load_liquid(&plate, "A1", 10.0).unwrap();
    engine.pick_up_tip(Mount::Left, None).unwrap();
    let err = engine.aspirate(Mount::Left, &WellRef::new(&plate, "A1"), 20.0, None).unwrap_err();
    assert!(matches!(err, ProtocolError::Labware { source: LabwareError::NotEnoughLiquid { .. }, .. }));
    assert_eq!(engine.well_volume(&plate, "A1"), 10.0);
}

#[test]
fn tips_are_taken_in_order_until_the_rack_is_empty() {
    let Setup { mut engine, tips, .. } = setup();
    for _ in 0..96 {
        engine.pick_up_tip(Mount::Left, None).unwrap();
        engine.drop_tip(Mount::Left).unwrap();
    }
    assert_eq!(engine.tips_used(), 96);
    let err = engine.pick_up_tip(Mount::Left, None).unwrap_err();
    assert_eq!(err.to_string(), "No clean tips left for flex_1channel_50");

    // the first drop loaded the default trash bin
    assert_eq!(count(&engine, "loadTrashBin"), 1);
    assert!(engine.deck().occupant(DeckSlotName::A3).is_some());

    engine.reset_tips(&tips).unwrap();
    engine.pick_up_tip(Mount::Left, None).unwrap();
    assert_eq!(engine.tips_used(), 1);
}

#[test]
fn returned_tips_stay_used() {
    let Setup { mut engine, tips, .. } = setup();
    engine.pick_up_tip(Mount::Left, None).unwrap();
    engine.return_tip(Mount::Left).unwrap();
    engine.pick_up_tip(Mount::Left, None).unwrap();

    let picked: Vec<&str> = engine
        .commands()
        .iter()
        .filter_map(|command| match command {
            Command::PickUpTip { well_name, .. } => Some(well_name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(picked, vec!["A1", "B1"]);
    assert!(matches!(engine.commands()[6], Command::ReturnTip { ref well_name, .. } if well_name == "A1"));
    assert_eq!(engine.pipette(Mount::Left).unwrap().tip.as_ref().unwrap().rack_id, tips);
}

#[test]
fn picking_up_at_a_specific_well() {
    let Setup { mut engine, tips, plate, .. } = setup();
    engine.pick_up_tip(Mount::Left, Some(&WellRef::new(&tips, "H12"))).unwrap();
    let tip = engine.pipette(Mount::Left).unwrap().tip.clone().unwrap();
    assert_eq!(tip.well_name, "H12");
    assert_eq!(tip.max_volume, 50.0);
    assert_eq!(tip.rack_uri, "opentrons/opentrons_flex_96_tiprack_50ul/1");
    engine.drop_tip(Mount::Left).unwrap();

    let err = engine.pick_up_tip(Mount::Left, Some(&WellRef::new(&plate, "A1"))).unwrap_err();
    assert!(matches!(err, ProtocolError::NotATipRack { .. }));
}

#[test]
fn transfer_with_a_new_tip_every_time() {
    let Setup { mut engine, reservoir, plate, .. } = setup();
    let water = engine.get_liquid_class("water").unwrap();
    let wells: Vec<String> = (1..=12).map(|column| format!("A{column}")).collect();
    let names: Vec<&str> = wells.iter().map(String::as_str).collect();

    let request = TransferRequest::builder()
        .volume(60.0)
        .sources(vec![WellRef::new(&reservoir, "A1"); 12])
        .destinations(plate_wells(&plate, &names))
        .new_tip(TipPolicy::Always)
        .build();
    engine.transfer_with_liquid_class(Mount::Left, &water, &request).unwrap();

    // each 60 uL is split in two halves, each with a fresh tip
    assert_eq!(count(&engine, "pickUpTip"), 24);
    assert_eq!(count(&engine, "dropTip"), 24);
    assert_eq!(count(&engine, "aspirate"), 24);
    assert_eq!(engine.tips_used(), 24);
    for well in &names {
        assert!((engine.well_volume(&plate, well) - 60.0).abs() < 1e-9);
    }
    assert!((engine.well_volume(&reservoir, "A1") - 9_280.0).abs() < 1e-9);
    assert!(!engine.pipette(Mount::Left).unwrap().has_tip());
    // liquid classes only override the blowout flow rate for their own transfer
    assert_eq!(engine.pipette(Mount::Left).unwrap().flow_rates.blow_out, 57.0);
}

#[test]
fn distribute_returns_conditioning_and_discards_disposal() {
    let Setup { mut engine, reservoir, plate, .. } = setup();
    let water = engine.get_liquid_class("water").unwrap();
    let request = TransferRequest::builder()
        .volume(12.0)
        .sources(vec![WellRef::new(&reservoir, "A1")])
        .destinations(plate_wells(&plate, &["B1", "B2", "B3", "B4", "B5"]))
        .build();
    engine.distribute_with_liquid_class(Mount::Left, &water, &request).unwrap();

    for well in ["B1", "B2", "B3", "B4", "B5"] {
        assert!((engine.well_volume(&plate, well) - 12.0).abs() < 1e-9);
    }
    // 46 + 34 aspirated, 5 + 5 conditioning returned, 5 + 5 disposal blown out
    assert!((engine.well_volume(&reservoir, "A1") - 9_930.0).abs() < 1e-9);
    assert_eq!(count(&engine, "pickUpTip"), 1);
    assert_eq!(count(&engine, "blowOut"), 2);
}

#[test]
fn consolidate_collects_into_one_well() {
    let Setup { mut engine, plate, .. } = setup();
    for well in ["A1", "A2", "A3"] {
        engine.load_liquid(&plate, well, 20.0).unwrap();
    }
    let water = engine.get_liquid_class("water").unwrap();
    let request = TransferRequest::builder()
        .volume(20.0)
        .sources(vec![WellRef::new(&plate, "A1"), WellRef::new(&plate, "A2"), WellRef::new(&plate, "A3")])
        .destinations(plate_wells(&plate, &["H12"]))
        .build();
    engine.consolidate_with_liquid_class(Mount::Left, &water, &request).unwrap();

    assert!((engine.well_volume(&plate, "H12") - 60.0).abs() < 1e-9);
    for well in ["A1", "A2", "A3"] {
        assert!(engine.well_volume(&plate, well).abs() < 1e-9);
    }
    let remaining = engine.liquid_remaining();
    assert!(remaining.iter().any(|w| w.well_name == "H12" && w.labware_id == plate));
}

#[test]
fn transfers_need_tip_racks() {
    let mut engine = ProtocolEngine::new(EngineConfig::default()).unwrap();
    let plate = engine.load_labware("nest_96_wellplate_200ul_flat", DeckSlotName::D2).unwrap();
    engine.load_instrument(P50, Mount::Right, &[]).unwrap();
    let water = engine.get_liquid_class("water").unwrap();

    let request = TransferRequest::builder()
        .volume(10.0)
        .sources(vec![WellRef::new(&plate, "A1")])
        .destinations(plate_wells(&plate, &["A2"]))
        .build();
    let err = engine.transfer_with_liquid_class(Mount::Right, &water, &request).unwrap_err();
    assert!(matches!(err, ProtocolError::NoTipRacks { .. }));
    let err = engine.transfer_with_liquid_class(Mount::Left, &water, &request).unwrap_err();
    assert!(matches!(err, ProtocolError::PipetteNotAttached { mount: Mount::Left, .. }));
}

#[test]
fn incompatible_liquid_class_is_reported_as_a_transfer_error() {
    let mut engine = ProtocolEngine::new(EngineConfig::default()).unwrap();
    let tips = engine.load_labware("opentrons_flex_96_tiprack_1000ul", DeckSlotName::C1).unwrap();
    let plate = engine.load_labware("nest_96_wellplate_200ul_flat", DeckSlotName::D2).unwrap();
    engine.load_instrument("flex_96channel_1000", Mount::Left, &[tips]).unwrap();
    let water = engine.get_liquid_class("water").unwrap();

    let request = TransferRequest::builder()
        .volume(10.0)
        .sources(vec![WellRef::new(&plate, "A1")])
        .destinations(plate_wells(&plate, &["A2"]))
        .build();
    let err = engine.transfer_with_liquid_class(Mount::Left, &water, &request).unwrap_err();
    assert!(matches!(err, ProtocolError::Transfer { .. }));
    assert_eq!(count(&engine, "pickUpTip"), 0);
}

#[test]
fn custom_liquid_classes() {
    let Setup { mut engine, .. } = setup();
    let water = engine.get_liquid_class("water").unwrap();
    let mut by_pipette = fxhash::FxHashMap::default();
    for pipette in water.pipettes() {
        let mut by_rack = aliq_liquid_classes::ByTipRack::default();
        for rack in water.tip_racks_for(pipette) {
            by_rack.insert(rack.to_owned(), water.get_for(pipette, rack).unwrap().clone());
        }
        by_pipette.insert(pipette.to_owned(), by_rack);
    }

    let buffer = engine.define_liquid_class("buffer", "Buffer", by_pipette.clone()).unwrap();
    assert_eq!(buffer.display_name(), "Buffer");
    assert_eq!(engine.get_liquid_class("buffer").unwrap().name(), "buffer");
    assert!(matches!(
        engine.define_liquid_class("buffer", "Buffer", by_pipette),
        Err(ProtocolError::LiquidClass { .. })
    ));
    assert!(matches!(engine.get_liquid_class("honey"), Err(ProtocolError::LiquidClass { .. })));
}

#[test]
fn command_log_serializes() {
    let Setup { mut engine, .. } = setup();
    engine.comment("hello");
    engine.delay(1.5, Some("settle".into())).unwrap();

    let json = serde_json::to_value(engine.commands()).unwrap();
    assert_eq!(json[0]["commandType"], "loadLabware");
    assert_eq!(json[0]["params"]["loadName"], "opentrons_flex_96_tiprack_50ul");
    assert_eq!(json[0]["params"]["slot"], "C1");
    assert_eq!(json[5]["params"]["message"], "hello");
    assert_eq!(json[6]["commandType"], "waitForDuration");
    assert_eq!(engine.commands()[6].to_string(), "Delaying for 1.5 seconds: settle");
}

#[test]
fn eight_channels_move_liquid_in_every_row() {
    let mut engine = ProtocolEngine::new(EngineConfig::default()).unwrap();
    let tips = engine.load_labware("opentrons_flex_96_tiprack_50ul", DeckSlotName::C1).unwrap();
    let source = engine.load_labware("nest_96_wellplate_200ul_flat", DeckSlotName::D1).unwrap();
    let dest = engine.load_labware("nest_96_wellplate_200ul_flat", DeckSlotName::D2).unwrap();
    engine.load_instrument("flex_8channel_50", Mount::Left, &[tips]).unwrap();
    let rows = ["A1", "B1", "C1", "D1", "E1", "F1", "G1", "H1"];
    for well in rows {
        engine.load_liquid(&source, well, 100.0).unwrap();
    }

    engine.pick_up_tip(Mount::Left, None).unwrap();
    engine.aspirate(Mount::Left, &WellRef::new(&source, "A1"), 20.0, None).unwrap();
    engine.dispense(Mount::Left, &TransferTarget::Well(WellRef::new(&dest, "A1")), None, None, None).unwrap();

    for well in rows {
        assert_eq!(engine.well_volume(&source, well), 80.0, "source {well}");
        assert_eq!(engine.well_volume(&dest, well), 20.0, "destination {well}");
    }
    assert_eq!(engine.well_volume(&dest, "A2"), 0.0);
    assert_eq!(engine.tips_used(), 8);
    // the tip holds one channel's worth
    assert_eq!(engine.pipette(Mount::Left).unwrap().current_volume, 0.0);
}

#[test]
fn eight_channels_share_a_reservoir_well() {
    let Setup { mut engine, reservoir, plate, .. } = setup();
    let tips = engine.load_labware("opentrons_flex_96_tiprack_50ul", DeckSlotName::C2).unwrap();
    engine.load_instrument("flex_8channel_50", Mount::Right, &[tips]).unwrap();

    engine.pick_up_tip(Mount::Right, None).unwrap();
    engine.aspirate(Mount::Right, &WellRef::new(&reservoir, "A1"), 10.0, None).unwrap();
    engine.dispense(Mount::Right, &TransferTarget::Well(WellRef::new(&plate, "A3")), None, None, None).unwrap();

    assert_eq!(engine.well_volume(&reservoir, "A1"), 9_920.0);
    assert_eq!(engine.well_volume(&plate, "H3"), 10.0);
}

#[test]
fn ninety_six_channels_fill_the_whole_plate() {
    let mut engine = ProtocolEngine::new(EngineConfig::default()).unwrap();
    let tips = engine.load_labware("opentrons_flex_96_tiprack_200ul", DeckSlotName::C1).unwrap();
    let source = engine.load_labware("nest_96_wellplate_200ul_flat", DeckSlotName::D1).unwrap();
    let dest = engine.load_labware("nest_96_wellplate_200ul_flat", DeckSlotName::D2).unwrap();
    engine.load_instrument("flex_96channel_1000", Mount::Left, &[tips]).unwrap();
    let wells: Vec<String> =
        engine.deck().labware(&source).unwrap().definition.wells_in_order().map(str::to_owned).collect();
    for well in &wells {
        engine.load_liquid(&source, well, 150.0).unwrap();
    }

    engine.pick_up_tip(Mount::Left, None).unwrap();
    engine.aspirate(Mount::Left, &WellRef::new(&source, "A1"), 50.0, None).unwrap();
    engine.dispense(Mount::Left, &TransferTarget::Well(WellRef::new(&dest, "A1")), None, None, None).unwrap();

    for well in &wells {
        assert_eq!(engine.well_volume(&source, well), 100.0, "source {well}");
        assert_eq!(engine.well_volume(&dest, well), 50.0, "destination {well}");
    }
    assert_eq!(engine.tips_used(), 96);
}

#[test]
fn delays_must_not_be_negative() {
    let Setup { mut engine, .. } = setup();
    let before = engine.commands().len();
    assert!(matches!(engine.delay(-5.0, None), Err(ProtocolError::InvalidDelay { seconds, .. }) if seconds == -5.0));
    assert!(matches!(engine.delay(f64::NAN, None), Err(ProtocolError::InvalidDelay { .. })));
    assert!(matches!(engine.delay(f64::INFINITY, None), Err(ProtocolError::InvalidDelay { .. })));
    assert_eq!(engine.commands().len(), before);

    engine.delay(0.0, None).unwrap();
    assert_eq!(count(&engine, "waitForDuration"), 1);
}

#[test]
fn pressure_dispense_leaves_the_plunger_at_the_bottom() {
    let Setup { mut engine, reservoir, plate, .. } = setup();
    engine.pick_up_tip(Mount::Left, None).unwrap();
    engine.aspirate(Mount::Left, &WellRef::new(&reservoir, "A1"), 30.0, None).unwrap();
    engine.pressure_dispense(Mount::Left, &WellRef::new(&plate, "B1"), Some(10.0), None).unwrap();

    assert_eq!(engine.well_volume(&plate, "B1"), 10.0);
    let pipette = engine.pipette(Mount::Left).unwrap();
    assert_eq!(pipette.current_volume, 20.0);
    assert!(!pipette.ready_to_aspirate);
    let Some(Command::PressureDispense { volume, flow_rate, location, .. }) = engine.commands().last() else {
        panic!("expected a pressure dispense")
    };
    assert_eq!((*volume, *flow_rate), (10.0, 57.0));
    let top = engine.deck().labware(&plate).unwrap().well_top("B1", 0.0).unwrap();
    assert_eq!(location.point, top);

    let err = engine.pressure_dispense(Mount::Left, &WellRef::new(&plate, "B1"), Some(25.0), None).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidVolume { .. }));
}

fn sensorless_p50() -> Arc<PipetteDefinition> {
    let mut definition = (*pipettes::definition(P50).unwrap()).clone();
    definition.name = "custom_1channel_50".into();
    definition.sensors = Sensors::empty();
    Arc::new(definition)
}

#[test]
fn liquid_presence_detection_needs_a_pressure_sensor() {
    let robot = RobotConfig { liquid_presence_detection: true, ..RobotConfig::default() };
    let Setup { mut engine, tips, plate, .. } = setup_with(robot);
    assert!(engine.pipette(Mount::Left).unwrap().liquid_presence_detection);

    engine.load_instrument_definition(sensorless_p50(), Mount::Right, &[tips]).unwrap();
    assert!(!engine.pipette(Mount::Right).unwrap().liquid_presence_detection);
    let err = engine.set_liquid_presence_detection(Mount::Right, true).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Pressure sensor not available for custom_1channel_50; liquid presence detection is unsupported"
    );

    // without detection the sensorless pipette only warns about a short well
    engine.load_liquid(&plate, "A1", 10.0).unwrap();
    engine.pick_up_tip(Mount::Right, None).unwrap();
    engine.aspirate(Mount::Right, &WellRef::new(&plate, "A1"), 20.0, None).unwrap();
    assert_eq!(engine.well_volume(&plate, "A1"), 0.0);

    engine.set_liquid_presence_detection(Mount::Left, false).unwrap();
    assert!(!engine.pipette(Mount::Left).unwrap().liquid_presence_detection);
}

#[test]
fn meniscus_relative_aspirates_follow_the_liquid_down() {
    let Setup { mut engine, reservoir, plate, .. } = setup();
    let water = engine.get_liquid_class("water").unwrap();
    let rack = "opentrons/opentrons_flex_96_tiprack_50ul/1";
    let mut props = water.get_for(P50, rack).unwrap().clone();
    props.aspirate.aspirate_position = aliq_liquid_classes::properties::TipPosition::new(
        aliq_domain::liquid::PositionReference::LiquidMeniscus,
        aliq_domain::Point::new(0.0, 0.0, -2.0),
    );
    let mut by_rack = aliq_liquid_classes::ByTipRack::default();
    by_rack.insert(rack.to_owned(), props);
    let mut by_pipette = fxhash::FxHashMap::default();
    by_pipette.insert(P50.to_owned(), by_rack);
    let class = engine.define_liquid_class("surface_water", "Surface water", by_pipette).unwrap();

    let request = TransferRequest::builder()
        .volume(20.0)
        .sources(vec![WellRef::new(&reservoir, "A1")])
        .destinations(plate_wells(&plate, &["A1"]))
        .build();
    engine.transfer_with_liquid_class(Mount::Left, &class, &request).unwrap();

    assert_eq!(count(&engine, "aspirate"), 0);
    let Some(Command::AspirateWhileTracking { location, end_location, volume, .. }) =
        engine.commands().iter().find(|c| matches!(c, Command::AspirateWhileTracking { .. }))
    else {
        panic!("expected a tracking aspirate")
    };
    assert_eq!(*volume, 20.0);
    assert!(end_location.point.z < location.point.z);
    assert!((engine.well_volume(&reservoir, "A1") - 9_980.0).abs() < 1e-9);
    assert!((engine.well_volume(&plate, "A1") - 20.0).abs() < 1e-9);
}
