use aliq_kernel::SAFE_ALPHABET;
use aliq_kernel::{prefixed_id, safe_nanoid};

#[test]
fn generates_expected_length_and_charset() {
    let id = safe_nanoid!();
    assert_eq!(id.len(), 12);

    for ch in id.chars() {
        assert!(SAFE_ALPHABET.contains(&ch), "unexpected character in nanoid: {ch}");
    }
}

#[test]
fn custom_length() {
    let id = safe_nanoid!(20);
    assert_eq!(id.len(), 20);
}

#[test]
fn prefixed_ids_are_distinct() {
    let first = prefixed_id!("labware");
    let second = prefixed_id!("labware");
    assert!(first.starts_with("labware-"));
    assert_eq!(first.len(), "labware-".len() + 12);
    assert_ne!(first, second);
}
