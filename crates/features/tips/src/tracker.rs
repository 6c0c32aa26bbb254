use crate::error::{Result, TipError};
use aliq_domain::pipette::NozzleLayout;
use fxhash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

/// Per-rack layout and usage.
#[derive(Debug, Clone)]
struct RackState {
    /// Well names by column, back (row A) to front.
    columns: Vec<Vec<String>>,
    used: FxHashSet<String>,
}

impl RackState {
    fn rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    fn position(&self, well: &str) -> Option<(usize, usize)> {
        self.columns
            .iter()
            .enumerate()
            .find_map(|(col, wells)| wells.iter().position(|w| w == well).map(|row| (col, row)))
    }

    fn is_clean(&self, well: &str) -> bool {
        !self.used.contains(well)
    }

    fn total(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }
}

/// Tracks which tips have been used in every loaded tip rack.
#[derive(Debug, Clone, Default)]
pub struct TipTracker {
    racks: FxHashMap<String, RackState>,
}

impl TipTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a tip rack with all tips clean.
    ///
    /// `ordering` lists well names column by column, as in the labware definition.
    pub fn register(&mut self, labware_id: impl Into<String>, ordering: Vec<Vec<String>>) {
        let labware_id = labware_id.into();
        debug!(%labware_id, columns = ordering.len(), "Tip rack registered");
        self.racks.insert(labware_id, RackState { columns: ordering, used: FxHashSet::default() });
    }

    #[must_use]
    pub fn is_tip_rack(&self, labware_id: &str) -> bool {
        self.racks.contains_key(labware_id)
    }

    /// Finds the well at which a pipette with `layout` should pick up next.
    ///
    /// The search runs in column-major order and starts at `starting_tip` when given.
    /// Returns `None` when no pick-up fits, including for untracked labware.
    #[must_use]
    pub fn next_tip(&self, labware_id: &str, layout: NozzleLayout, starting_tip: Option<&str>) -> Option<String> {
        let rack = self.racks.get(labware_id)?;
        let (start_col, start_row) = match starting_tip {
            Some(tip) => rack.position(tip)?,
            None => (0, 0),
        };
        let rows = rack.rows();

        let found = match layout {
            NozzleLayout::Single => rack
                .columns
                .iter()
                .enumerate()
                .skip(start_col)
                .flat_map(|(col, wells)| {
                    let from = if col == start_col { start_row } else { 0 };
                    wells.iter().skip(from)
                })
                .find(|well| rack.is_clean(well)),

            NozzleLayout::Column { tips } if usize::from(tips) >= rows => {
                let first_col = if start_row == 0 { start_col } else { start_col + 1 };
                rack.columns
                    .iter()
                    .skip(first_col)
                    .find(|wells| wells.iter().all(|w| rack.is_clean(w)))
                    .and_then(|wells| wells.first())
            },

            NozzleLayout::Column { tips } => {
                let tips = usize::from(tips).max(1);
                rack.columns.iter().enumerate().skip(start_col).find_map(|(col, wells)| {
                    let from = if col == start_col { start_row } else { 0 };
                    (from..wells.len().saturating_sub(tips - 1))
                        .find(|&row| wells[row..row + tips].iter().all(|w| rack.is_clean(w)))
                        .map(|row| &wells[row])
                })
            },

            NozzleLayout::Full => {
                if start_col == 0 && start_row == 0 && rack.used.is_empty() {
                    rack.columns.first().and_then(|c| c.first())
                } else {
                    None
                }
            },
        };

        trace!(labware_id, ?layout, ?starting_tip, ?found, "Next tip lookup");
        found.cloned()
    }

    /// Wells consumed by a pick-up at `well` with `layout`.
    ///
    /// # Errors
    /// [`TipError::NotATipRack`], [`TipError::UnknownTip`], or
    /// [`TipError::InvalidPickUp`] when the nozzles would hang off the rack.
    pub fn tips_to_mark_used(&self, labware_id: &str, well: &str, layout: NozzleLayout) -> Result<Vec<String>> {
        let rack = self.rack(labware_id)?;
        let (col, row) = rack.position(well).ok_or_else(|| TipError::UnknownTip {
            well_name: well.to_owned(),
            labware_id: labware_id.to_owned(),
            context: None,
        })?;

        match layout {
            NozzleLayout::Single => Ok(vec![well.to_owned()]),
            NozzleLayout::Column { tips } => {
                let tips = usize::from(tips);
                let column = &rack.columns[col];
                if row + tips > column.len() {
                    return Err(TipError::InvalidPickUp {
                        tips,
                        well_name: well.to_owned(),
                        reason: "not enough rows below the pick-up well".into(),
                        context: None,
                    });
                }
                Ok(column[row..row + tips].to_vec())
            },
            NozzleLayout::Full => {
                if col != 0 || row != 0 {
                    return Err(TipError::InvalidPickUp {
                        tips: rack.total(),
                        well_name: well.to_owned(),
                        reason: "a full rack pick-up must start at the first well".into(),
                        context: None,
                    });
                }
                Ok(rack.columns.iter().flatten().cloned().collect())
            },
        }
    }

    /// # Errors
    /// Returns [`TipError::NotATipRack`] for an untracked labware.
    pub fn mark_used<I, S>(&mut self, labware_id: &str, wells: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rack = self.rack_mut(labware_id)?;
        rack.used.extend(wells.into_iter().map(Into::into));
        debug!(labware_id, used = rack.used.len(), "Tips marked used");
        Ok(())
    }

    /// Marks every tip of a rack clean again.
    ///
    /// # Errors
    /// Returns [`TipError::NotATipRack`] for an untracked labware.
    pub fn reset(&mut self, labware_id: &str) -> Result<()> {
        self.rack_mut(labware_id)?.used.clear();
        debug!(labware_id, "Tip rack reset");
        Ok(())
    }

    /// `false` for used tips, unknown wells, and labware that is not a tracked rack.
    #[must_use]
    pub fn has_clean_tip(&self, labware_id: &str, well: &str) -> bool {
        self.racks
            .get(labware_id)
            .is_some_and(|rack| rack.position(well).is_some() && rack.is_clean(well))
    }

    /// Number of tips used so far in a rack; zero for untracked labware.
    #[must_use]
    pub fn used_count(&self, labware_id: &str) -> usize {
        self.racks.get(labware_id).map_or(0, |rack| rack.used.len())
    }

    fn rack(&self, labware_id: &str) -> Result<&RackState> {
        self.racks
            .get(labware_id)
            .ok_or_else(|| TipError::NotATipRack { labware_id: labware_id.to_owned(), context: None })
    }

    fn rack_mut(&mut self, labware_id: &str) -> Result<&mut RackState> {
        self.racks
            .get_mut(labware_id)
            .ok_or_else(|| TipError::NotATipRack { labware_id: labware_id.to_owned(), context: None })
    }
}
