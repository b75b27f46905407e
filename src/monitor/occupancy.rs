//! Per-frame slot occupancy

use serde::Serialize;

use crate::slots::SlotCollection;
use crate::vision::Detection;

/// Occupancy of a single slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotStatus {
    Occupied,
    Vacant,
}

impl SlotStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SlotStatus::Occupied => "Occupied",
            SlotStatus::Vacant => "Vacant",
        }
    }

    pub fn is_occupied(&self) -> bool {
        matches!(self, SlotStatus::Occupied)
    }
}

/// Slot statuses for one frame plus aggregate counts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OccupancyReport {
    /// One status per slot, in collection order
    pub statuses: Vec<SlotStatus>,
    pub occupied: usize,
    pub vacant: usize,
}

impl OccupancyReport {
    /// Number of slots evaluated
    pub fn total(&self) -> usize {
        self.statuses.len()
    }
}

/// Classify every slot against the frame's vehicle detections
///
/// A slot is occupied when any detection center lies inside it or on its
/// boundary.
pub fn evaluate(slots: &SlotCollection, detections: &[Detection]) -> OccupancyReport {
    let statuses: Vec<SlotStatus> = slots
        .iter()
        .map(|slot| {
            if detections.iter().any(|d| slot.contains(d.center)) {
                SlotStatus::Occupied
            } else {
                SlotStatus::Vacant
            }
        })
        .collect();

    let occupied = statuses.iter().filter(|s| s.is_occupied()).count();
    let vacant = statuses.len() - occupied;

    OccupancyReport {
        statuses,
        occupied,
        vacant,
    }
}
