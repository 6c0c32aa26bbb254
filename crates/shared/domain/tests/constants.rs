use aliq_domain::constants::{DEFAULT_LABWARE_VERSION, DEFAULT_NAMESPACE, PLATE_ROWS, TIPS_PER_RACK};

#[test]
fn constants_match_standard_labware() {
    assert_eq!(DEFAULT_NAMESPACE, "opentrons");
    assert_eq!(DEFAULT_LABWARE_VERSION, 1);
    assert_eq!(PLATE_ROWS.len() * 12, TIPS_PER_RACK);
    assert_eq!(PLATE_ROWS.first(), Some(&'A'));
}
