use aliq_domain::constants::PLATE_ROWS;
use aliq_domain::pipette::NozzleLayout;
use aliq_tips::*;
use proptest::prelude::*;

const RACK: &str = "tiprack-1";

fn ordering() -> Vec<Vec<String>> {
    (1..=12).map(|col| PLATE_ROWS.iter().map(|row| format!("{row}{col}")).collect()).collect()
}

fn tracker() -> TipTracker {
    let mut tracker = TipTracker::new();
    tracker.register(RACK, ordering());
    tracker
}

const SINGLE: NozzleLayout = NozzleLayout::Single;
const COLUMN: NozzleLayout = NozzleLayout::Column { tips: 8 };

fn pick_up(tracker: &mut TipTracker, well: &str, layout: NozzleLayout) {
    let wells = tracker.tips_to_mark_used(RACK, well, layout).unwrap();
    tracker.mark_used(RACK, wells).unwrap();
}

#[test]
fn first_tip_of_a_fresh_rack() {
    let tracker = tracker();
    assert_eq!(tracker.next_tip(RACK, SINGLE, None).as_deref(), Some("A1"));
    assert_eq!(tracker.next_tip(RACK, COLUMN, None).as_deref(), Some("A1"));
    assert_eq!(tracker.next_tip(RACK, NozzleLayout::Full, None).as_deref(), Some("A1"));
    assert_eq!(tracker.next_tip("plate-1", SINGLE, None), None);
}

#[test]
fn starting_tip_is_honoured() {
    let tracker = tracker();
    assert_eq!(tracker.next_tip(RACK, SINGLE, Some("B1")).as_deref(), Some("B1"));
    assert_eq!(tracker.next_tip(RACK, COLUMN, Some("B1")).as_deref(), Some("A2"));
    assert_eq!(tracker.next_tip(RACK, COLUMN, Some("D1")).as_deref(), Some("A2"));
}

#[test]
fn used_tips_are_skipped() {
    for (picked, layout, start, expected) in [
        (SINGLE, COLUMN, Some("A2"), Some("A2")),
        (SINGLE, SINGLE, Some("A2"), Some("A2")),
        (COLUMN, COLUMN, Some("B2"), Some("A3")),
        (SINGLE, COLUMN, Some("A1"), Some("A2")),
        (SINGLE, COLUMN, None, Some("A2")),
        (COLUMN, SINGLE, Some("D1"), Some("A2")),
        (SINGLE, NozzleLayout::Full, Some("A1"), None),
        (SINGLE, NozzleLayout::Full, None, None),
    ] {
        let mut tracker = tracker();
        pick_up(&mut tracker, "A1", picked);
        assert_eq!(tracker.next_tip(RACK, layout, start).as_deref(), expected, "{picked:?} then {layout:?} from {start:?}");
    }
}

#[test]
fn single_pick_ups_walk_down_the_column() {
    let mut tracker = tracker();
    assert_eq!(tracker.next_tip(RACK, SINGLE, Some("B2")).as_deref(), Some("B2"));
    pick_up(&mut tracker, "B2", SINGLE);
    assert_eq!(tracker.next_tip(RACK, SINGLE, Some("B2")).as_deref(), Some("C2"));
}

#[test]
fn last_tip_then_none() {
    let mut tracker = tracker();
    assert_eq!(tracker.next_tip(RACK, SINGLE, Some("H12")).as_deref(), Some("H12"));
    pick_up(&mut tracker, "H12", SINGLE);
    assert_eq!(tracker.next_tip(RACK, SINGLE, Some("H12")), None);
}

#[test]
fn partial_column_finds_a_contiguous_run() {
    let mut tracker = tracker();
    let partial = NozzleLayout::Column { tips: 4 };
    pick_up(&mut tracker, "B1", SINGLE);

    // rows C..F are the first four clean wells in a row
    assert_eq!(tracker.next_tip(RACK, partial, None).as_deref(), Some("C1"));
    pick_up(&mut tracker, "C1", partial);
    assert_eq!(tracker.tips_to_mark_used(RACK, "C1", partial).unwrap(), vec!["C1", "D1", "E1", "F1"]);
    assert_eq!(tracker.next_tip(RACK, partial, None).as_deref(), Some("A2"));

    let err = tracker.tips_to_mark_used(RACK, "F3", partial).unwrap_err();
    assert!(matches!(err, TipError::InvalidPickUp { .. }));
}

#[test]
fn reset_makes_tips_available_again() {
    let mut tracker = tracker();
    pick_up(&mut tracker, "A1", NozzleLayout::Full);
    assert_eq!(tracker.used_count(RACK), 96);
    assert_eq!(tracker.next_tip(RACK, SINGLE, None), None);

    tracker.reset(RACK).unwrap();
    assert_eq!(tracker.next_tip(RACK, SINGLE, None).as_deref(), Some("A1"));
    assert!(matches!(tracker.reset("plate-1"), Err(TipError::NotATipRack { .. })));
}

#[test]
fn has_clean_tip_only_for_tip_racks() {
    let mut tracker = tracker();
    assert!(tracker.has_clean_tip(RACK, "A1"));
    pick_up(&mut tracker, "A1", SINGLE);
    assert!(!tracker.has_clean_tip(RACK, "A1"));
    assert!(!tracker.has_clean_tip(RACK, "Z9"));
    assert!(!tracker.has_clean_tip("plate-1", "A1"));
}

proptest! {
    #[test]
    fn a_rack_yields_every_tip_exactly_once(column_first in any::<bool>()) {
        let mut tracker = tracker();
        let mut picked = 0;
        if column_first {
            let well = tracker.next_tip(RACK, COLUMN, None).unwrap();
            pick_up(&mut tracker, &well, COLUMN);
            picked += 8;
        }
        while let Some(well) = tracker.next_tip(RACK, SINGLE, None) {
            prop_assert!(tracker.has_clean_tip(RACK, &well));
            pick_up(&mut tracker, &well, SINGLE);
            picked += 1;
        }
        prop_assert_eq!(picked, 96);
        prop_assert_eq!(tracker.used_count(RACK), 96);
    }
}
