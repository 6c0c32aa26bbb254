pub mod labware;
pub mod liquid_classes;
pub mod simulate;
