/// Namespace of the built-in labware definitions.
pub const DEFAULT_NAMESPACE: &str = "opentrons";

/// Schema version assumed when a labware lookup does not specify one.
pub const DEFAULT_LABWARE_VERSION: u32 = 1;

/// Row letters of a standard SBS plate, front to back is `H` to `A`.
pub const PLATE_ROWS: [char; 8] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H'];

/// Number of tips in a full Flex tip rack.
pub const TIPS_PER_RACK: usize = 96;
