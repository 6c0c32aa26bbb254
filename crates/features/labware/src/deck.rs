use crate::definition::{LabwareDefinition, WellDefinition};
use crate::error::{LabwareError, Result};
use aliq_domain::constants::PLATE_ROWS;
use aliq_domain::pipette::NozzleLayout;
use aliq_domain::{DeckSlotName, Location, LocationTarget, Point};
use fxhash::FxHashMap;
use std::sync::Arc;
use tracing::info;

const SLOT_PITCH_X: f64 = 164.0;
const SLOT_PITCH_Y: f64 = 107.0;
/// Nozzle columns of a full 96-channel head.
const HEAD_COLUMNS: usize = 12;
/// Point above a trash bin where tips are dropped and liquid blown out, relative to
/// its slot origin.
const TRASH_BIN_TOP: Point = Point { x: 63.88, y: 42.74, z: 40.0 };

/// Front-left-bottom corner of a deck slot.
#[must_use]
pub fn slot_origin(slot: DeckSlotName) -> Point {
    let row_index = match slot.row() {
        'D' => 0.0,
        'C' => 1.0,
        'B' => 2.0,
        _ => 3.0,
    };
    Point::new(f64::from(slot.column() - 1) * SLOT_PITCH_X, row_index * SLOT_PITCH_Y, 0.0)
}

/// A definition placed on the deck.
#[derive(Debug, Clone)]
pub struct Labware {
    pub id: String,
    pub definition: Arc<LabwareDefinition>,
    pub slot: DeckSlotName,
    /// Deck coordinates of the labware's front-left-bottom corner.
    pub origin: Point,
}

impl Labware {
    #[must_use]
    pub fn uri(&self) -> String {
        self.definition.uri()
    }

    #[must_use]
    pub fn load_name(&self) -> &str {
        self.definition.load_name()
    }

    /// # Errors
    /// Returns [`LabwareError::WellNotFound`] for an unknown well.
    pub fn well(&self, name: &str) -> Result<&WellDefinition> {
        self.definition.well(name)
    }

    /// Top centre of a well, raised by `z`.
    ///
    /// # Errors
    /// Returns [`LabwareError::WellNotFound`] for an unknown well.
    pub fn well_top(&self, name: &str, z: f64) -> Result<Point> {
        let well = self.well(name)?;
        Ok(self.origin + Point::new(well.x, well.y, well.z + well.depth + z))
    }

    /// Bottom centre of a well, raised by `z`.
    ///
    /// # Errors
    /// Returns [`LabwareError::WellNotFound`] for an unknown well.
    pub fn well_bottom(&self, name: &str, z: f64) -> Result<Point> {
        let well = self.well(name)?;
        Ok(self.origin + Point::new(well.x, well.y, well.z + z))
    }

    /// Centre of a well at half its depth.
    ///
    /// # Errors
    /// Returns [`LabwareError::WellNotFound`] for an unknown well.
    pub fn well_center(&self, name: &str) -> Result<Point> {
        let well = self.well(name)?;
        Ok(self.origin + Point::new(well.x, well.y, well.z + well.depth / 2.0))
    }

    /// Wells entered by each nozzle when the primary nozzle is over `well`, one entry per
    /// nozzle that lands in the labware.
    ///
    /// Nozzles sit on the 96-well pitch. Labware with fewer rows or columns than the head
    /// shares one well between neighbouring nozzles (a reservoir well takes a whole column),
    /// denser labware skips rows between nozzles. Nozzles past the edge enter no well.
    ///
    /// # Errors
    /// Returns [`LabwareError::WellNotFound`] for an unknown well.
    pub fn wells_under_nozzles(&self, well: &str, layout: NozzleLayout) -> Result<Vec<&str>> {
        let ordering = &self.definition.ordering;
        let (col, row) = ordering
            .iter()
            .enumerate()
            .find_map(|(c, column)| column.iter().position(|name| name == well).map(|r| (c, r)))
            .ok_or_else(|| LabwareError::WellNotFound {
                well_name: well.to_owned(),
                labware: self.load_name().to_owned(),
                context: None,
            })?;

        let (head_columns, head_rows) = match layout {
            NozzleLayout::Single => return Ok(vec![ordering[col][row].as_str()]),
            NozzleLayout::Column { tips } => (1, usize::from(tips)),
            NozzleLayout::Full => (HEAD_COLUMNS, layout.tip_count() / HEAD_COLUMNS),
        };

        let mut wells = Vec::with_capacity(layout.tip_count());
        for nozzle_col in 0..head_columns {
            let Some(column) = ordering.get(col + nozzle_col * ordering.len() / HEAD_COLUMNS) else {
                continue;
            };
            for nozzle_row in 0..head_rows {
                if let Some(name) = column.get(row + nozzle_row * column.len() / PLATE_ROWS.len()) {
                    wells.push(name.as_str());
                }
            }
        }
        Ok(wells)
    }

    /// [`Labware::well_top`] wrapped in a well [`Location`].
    ///
    /// # Errors
    /// Returns [`LabwareError::WellNotFound`] for an unknown well.
    pub fn well_location(&self, name: &str, point: Point) -> Result<Location> {
        self.well(name)?;
        Ok(Location::in_well(point, self.id.clone(), name))
    }
}

#[derive(Debug, Clone)]
pub struct TrashBin {
    pub id: String,
    pub slot: DeckSlotName,
}

impl TrashBin {
    #[must_use]
    pub fn top(&self) -> Location {
        Location::new(
            slot_origin(self.slot) + TRASH_BIN_TOP,
            LocationTarget::TrashBin { trash_id: self.id.clone() },
        )
    }
}

#[derive(Debug, Clone)]
enum Occupant {
    Labware(String),
    TrashBin(String),
}

impl Occupant {
    fn id(&self) -> &str {
        match self {
            Self::Labware(id) | Self::TrashBin(id) => id,
        }
    }
}

/// Slot occupancy of the simulated deck.
#[derive(Debug, Clone, Default)]
pub struct Deck {
    slots: FxHashMap<DeckSlotName, Occupant>,
    labware: FxHashMap<String, Labware>,
    trash_bins: FxHashMap<String, TrashBin>,
}

impl Deck {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a labware in `slot` and returns its generated id.
    ///
    /// # Errors
    /// Returns [`LabwareError::SlotOccupied`] if something already sits in `slot`.
    pub fn load(&mut self, definition: Arc<LabwareDefinition>, slot: DeckSlotName) -> Result<String> {
        self.check_free(slot)?;
        let id = aliq_kernel::prefixed_id!("labware");
        let origin = slot_origin(slot) + definition.corner_offset_from_slot;
        info!(%id, load_name = definition.load_name(), %slot, "Labware loaded");

        self.slots.insert(slot, Occupant::Labware(id.clone()));
        self.labware.insert(id.clone(), Labware { id: id.clone(), definition, slot, origin });
        Ok(id)
    }

    /// # Errors
    /// Returns [`LabwareError::SlotOccupied`] if something already sits in `slot`.
    pub fn load_trash_bin(&mut self, slot: DeckSlotName) -> Result<String> {
        self.check_free(slot)?;
        let id = aliq_kernel::prefixed_id!("trash");
        info!(%id, %slot, "Trash bin loaded");

        self.slots.insert(slot, Occupant::TrashBin(id.clone()));
        self.trash_bins.insert(id.clone(), TrashBin { id: id.clone(), slot });
        Ok(id)
    }

    /// # Errors
    /// Returns [`LabwareError::LabwareNotFound`] for an unknown id.
    pub fn labware(&self, id: &str) -> Result<&Labware> {
        self.labware
            .get(id)
            .ok_or_else(|| LabwareError::LabwareNotFound { labware_id: id.to_owned(), context: None })
    }

    /// # Errors
    /// Returns [`LabwareError::LabwareNotFound`] for an unknown id.
    pub fn trash_bin(&self, id: &str) -> Result<&TrashBin> {
        self.trash_bins
            .get(id)
            .ok_or_else(|| LabwareError::LabwareNotFound { labware_id: id.to_owned(), context: None })
    }

    /// The first trash bin loaded, ordered by slot.
    #[must_use]
    pub fn default_trash(&self) -> Option<&TrashBin> {
        self.trash_bins.values().min_by_key(|bin| bin.slot)
    }

    /// Id of whatever occupies `slot`.
    #[must_use]
    pub fn occupant(&self, slot: DeckSlotName) -> Option<&str> {
        self.slots.get(&slot).map(Occupant::id)
    }

    /// Loaded labware ordered by slot.
    #[must_use]
    pub fn all_labware(&self) -> Vec<&Labware> {
        let mut all: Vec<&Labware> = self.labware.values().collect();
        all.sort_by_key(|lw| lw.slot);
        all
    }

    fn check_free(&self, slot: DeckSlotName) -> Result<()> {
        match self.slots.get(&slot) {
            Some(occupant) => {
                Err(LabwareError::SlotOccupied { slot, occupant: occupant.id().to_owned(), context: None })
            },
            None => Ok(()),
        }
    }
}
