use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::content::{ElementBehavior, ElementDef, ElementId};

use super::grid::{natural_ground_variation, CellCoord, GroundKind, OccupantVisual};
use super::placement::{Payer, PlacementOutcome, PlacementRequest, RejectReason};
use super::registry::{EntityRecord, Footprint, StructureId};
use super::FarmWorld;

/// One entity record as persisted outside the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedStructure {
    pub kind: String,
    /// Element `defName`; ids are not stable across catalog edits.
    pub element: String,
    pub footprint: Footprint,
    /// Top-left cell of the footprint.
    pub origin: CellCoord,
    #[serde(default)]
    pub metadata: Value,
    /// Area cells already harvested out of the record.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cleared: Vec<CellCoord>,
}

/// An occupant that belongs to no record: loose crops, scattered trees,
/// natural growth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedOccupant {
    pub element: String,
    pub cell: CellCoord,
    pub visual: OccupantVisual,
}

/// Interior ground that differs from what natural generation gives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedGround {
    pub cell: CellCoord,
    pub ground: GroundKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub structures: Vec<SavedStructure>,
    #[serde(default)]
    pub occupants: Vec<SavedOccupant>,
    #[serde(default)]
    pub ground: Vec<SavedGround>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("structure #{index} references unknown element `{element}`")]
    UnknownElement { index: usize, element: String },
    #[error("occupant #{index} references unknown element `{element}`")]
    UnknownOccupant { index: usize, element: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotReport {
    pub restored: Vec<StructureId>,
    /// Entries that failed placement, by position in the snapshot.
    pub rejected: Vec<(usize, RejectReason)>,
    pub occupants_restored: usize,
    pub occupants_rejected: Vec<(usize, RejectReason)>,
}

impl SnapshotReport {
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty() && self.occupants_rejected.is_empty()
    }
}

struct ReplayPlan {
    structures: Vec<(PlacementRequest, Vec<CellCoord>)>,
    occupants: Vec<(ElementId, CellCoord, OccupantVisual)>,
}

impl FarmWorld {
    /// Records in id order, every unlinked occupant, and the interior
    /// ground that differs from natural generation.
    pub fn snapshot(&self) -> WorldSnapshot {
        let structures = self
            .registry
            .iter()
            .filter_map(|record| {
                let def = self.catalog.get(record.element)?;
                Some(SavedStructure {
                    kind: record.kind.clone(),
                    element: def.def_name.clone(),
                    footprint: record.footprint,
                    origin: record.origin,
                    metadata: record.metadata.clone(),
                    cleared: cleared_area_cells(def, record),
                })
            })
            .collect();

        let mut occupants = Vec::new();
        let mut ground = Vec::new();
        for (cell, data) in self.grid.iter() {
            if let (Some(occupant), None) = (data.occupant(), data.structure()) {
                if let Some(def) = self.catalog.get(occupant.element) {
                    occupants.push(SavedOccupant {
                        element: def.def_name.clone(),
                        cell,
                        visual: occupant.visual,
                    });
                }
            }
            let kind = data.ground();
            if !kind.is_border() && kind != natural_ground_variation(cell) {
                ground.push(SavedGround { cell, ground: kind });
            }
        }

        WorldSnapshot {
            structures,
            occupants,
            ground,
        }
    }

    /// Applies `snapshot` on top of the current world: ground on free cells,
    /// then structures through the normal placement path, then loose
    /// occupants. Nothing is charged and hooks stay silent. Element names are
    /// all resolved before anything changes.
    pub fn load_snapshot(&mut self, snapshot: &WorldSnapshot) -> Result<SnapshotReport, SnapshotError> {
        let plan = self.replay_plan(snapshot)?;
        let mut report = SnapshotReport::default();

        for saved in &snapshot.ground {
            if self.grid.is_occupied(saved.cell) || !self.grid.set_ground(saved.cell, saved.ground) {
                debug!(cell = %saved.cell, ground = saved.ground.name(), "snapshot_ground_skipped");
            }
        }

        for (index, (request, cleared)) in plan.structures.iter().enumerate() {
            let placed = self.placement().place(request, Payer::Free);
            match placed {
                Ok(PlacementOutcome::Placed {
                    entity: Some(entity),
                    ..
                }) => {
                    let mut engine = self.placement();
                    for &cell in cleared {
                        engine.release_cell(cell);
                    }
                    report.restored.push(entity);
                }
                Ok(other) => warn!(index, outcome = ?other, "snapshot_entry_without_record"),
                Err(reason) => {
                    warn!(index, reason = %reason, "snapshot_entry_rejected");
                    report.rejected.push((index, reason));
                }
            }
        }

        for (index, &(element, cell, visual)) in plan.occupants.iter().enumerate() {
            let restored = self.placement().restore_occupant(element, cell, visual);
            match restored {
                Ok(()) => report.occupants_restored += 1,
                Err(reason) => {
                    debug!(index, reason = %reason, "snapshot_occupant_rejected");
                    report.occupants_rejected.push((index, reason));
                }
            }
        }

        info!(
            restored = report.restored.len(),
            rejected = report.rejected.len(),
            occupants = report.occupants_restored,
            occupants_rejected = report.occupants_rejected.len(),
            "snapshot_loaded"
        );
        Ok(report)
    }

    /// Fresh terrain, then the whole snapshot.
    pub fn restore_snapshot(&mut self, snapshot: &WorldSnapshot) -> Result<SnapshotReport, SnapshotError> {
        self.replay_plan(snapshot)?;
        self.reset_terrain();
        self.load_snapshot(snapshot)
    }

    fn replay_plan(&self, snapshot: &WorldSnapshot) -> Result<ReplayPlan, SnapshotError> {
        let structures = snapshot
            .structures
            .iter()
            .enumerate()
            .map(|(index, saved)| {
                let def = self.catalog.by_name(&saved.element).ok_or_else(|| {
                    SnapshotError::UnknownElement {
                        index,
                        element: saved.element.clone(),
                    }
                })?;
                Ok((replay_request(def, saved), saved.cleared.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let occupants = snapshot
            .occupants
            .iter()
            .enumerate()
            .map(|(index, saved)| {
                let def = self.catalog.by_name(&saved.element).ok_or_else(|| {
                    SnapshotError::UnknownOccupant {
                        index,
                        element: saved.element.clone(),
                    }
                })?;
                Ok((def.id, saved.cell, saved.visual))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ReplayPlan {
            structures,
            occupants,
        })
    }
}

fn cleared_area_cells(def: &ElementDef, record: &EntityRecord) -> Vec<CellCoord> {
    if !matches!(def.behavior, ElementBehavior::AreaPrompted) {
        return Vec::new();
    }
    let origin = record.origin;
    let mut footprint = BTreeSet::new();
    for d_row in 0..record.footprint.height {
        for d_col in 0..record.footprint.width {
            footprint.insert(CellCoord::new(
                origin.row.saturating_add(d_row),
                origin.col.saturating_add(d_col),
            ));
        }
    }
    footprint
        .difference(&record.occupied_cells)
        .copied()
        .collect()
}

fn replay_request(def: &ElementDef, saved: &SavedStructure) -> PlacementRequest {
    let request = match &def.behavior {
        ElementBehavior::Pattern(pattern) => {
            let anchor = CellCoord::new(
                saved.origin.row.saturating_add(pattern.inner_offset.row),
                saved.origin.col.saturating_add(pattern.inner_offset.col),
            );
            PlacementRequest::new(def.id, anchor)
        }
        ElementBehavior::AreaPrompted => PlacementRequest::new(def.id, saved.origin)
            .with_area(saved.footprint.width, saved.footprint.height),
        _ => PlacementRequest::new(def.id, saved.origin),
    };
    let metadata = match &saved.metadata {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other.clone(),
    };
    request.with_metadata(metadata)
}
