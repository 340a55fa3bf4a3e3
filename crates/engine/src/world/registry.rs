use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::content::ElementId;

use super::grid::{CellCoord, Grid};

static REGISTRY_INCONSISTENCY_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_registry_inconsistency_once(cell: CellCoord, stale: StructureId) {
    if REGISTRY_INCONSISTENCY_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(
            cell = %cell,
            structure = %stale,
            "registry_back_reference_stale; falling back to scan"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureId(pub u64);

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: StructureId,
    pub kind: String,
    pub element: ElementId,
    pub footprint: Footprint,
    /// Top-left cell of the footprint.
    pub origin: CellCoord,
    pub occupied_cells: BTreeSet<CellCoord>,
    pub metadata: Value,
    pub created_at: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub kind: String,
    pub element: ElementId,
    pub footprint: Footprint,
    pub origin: CellCoord,
    pub occupied_cells: BTreeSet<CellCoord>,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryInconsistency {
    #[error("record {id} lists no cells")]
    EmptyRecord { id: StructureId },
    #[error("record {id} lists cell {cell} outside the grid")]
    CellOutOfBounds { id: StructureId, cell: CellCoord },
    #[error("record {id} lists cell {cell} but the cell points at {found:?}")]
    MissingBackReference {
        id: StructureId,
        cell: CellCoord,
        found: Option<StructureId>,
    },
    #[error("cell {cell} points at {id} which does not list it")]
    DanglingBackReference { cell: CellCoord, id: StructureId },
}

/// Id -> record table for placed structures.
#[derive(Debug, Default, Clone)]
pub struct EntityRegistry {
    records: BTreeMap<StructureId, EntityRecord>,
    last_id: u64,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids start at 1 and are never reused within a registry.
    pub fn create(&mut self, record: NewRecord, now: Duration) -> StructureId {
        self.last_id = self.last_id.saturating_add(1);
        let id = StructureId(self.last_id);
        self.records.insert(
            id,
            EntityRecord {
                id,
                kind: record.kind,
                element: record.element,
                footprint: record.footprint,
                origin: record.origin,
                occupied_cells: record.occupied_cells,
                metadata: record.metadata,
                created_at: now,
            },
        );
        id
    }

    pub fn get(&self, id: StructureId) -> Option<&EntityRecord> {
        self.records.get(&id)
    }

    pub fn metadata_mut(&mut self, id: StructureId) -> Option<&mut Value> {
        self.records.get_mut(&id).map(|record| &mut record.metadata)
    }

    pub fn remove(&mut self, id: StructureId) -> Option<EntityRecord> {
        self.records.remove(&id)
    }

    /// Drops `cell` from the record. Returns the record once its last cell
    /// is gone and it has been deleted.
    pub fn release_cell(&mut self, id: StructureId, cell: CellCoord) -> Option<EntityRecord> {
        let record = self.records.get_mut(&id)?;
        record.occupied_cells.remove(&cell);
        if record.occupied_cells.is_empty() {
            self.records.remove(&id)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> + '_ {
        self.records.values()
    }

    /// Back-reference first; a missing or stale back-reference degrades to a
    /// scan over every record.
    pub fn find_by_cell(&self, grid: &Grid, cell: CellCoord) -> Option<&EntityRecord> {
        if let Some(id) = grid.structure_at(cell) {
            match self.records.get(&id) {
                Some(record) if record.occupied_cells.contains(&cell) => return Some(record),
                _ => warn_registry_inconsistency_once(cell, id),
            }
        }
        self.find_by_scan(cell)
    }

    pub fn find_by_scan(&self, cell: CellCoord) -> Option<&EntityRecord> {
        self.records
            .values()
            .find(|record| record.occupied_cells.contains(&cell))
    }

    pub fn verify_consistency(&self, grid: &Grid) -> Result<(), RegistryInconsistency> {
        for record in self.records.values() {
            if record.occupied_cells.is_empty() {
                return Err(RegistryInconsistency::EmptyRecord { id: record.id });
            }
            for &cell in &record.occupied_cells {
                if !grid.contains(cell) {
                    return Err(RegistryInconsistency::CellOutOfBounds {
                        id: record.id,
                        cell,
                    });
                }
                let found = grid.structure_at(cell);
                if found != Some(record.id) {
                    return Err(RegistryInconsistency::MissingBackReference {
                        id: record.id,
                        cell,
                        found,
                    });
                }
            }
        }

        for (cell, data) in grid.iter() {
            let Some(id) = data.structure() else {
                continue;
            };
            let listed = self
                .records
                .get(&id)
                .is_some_and(|record| record.occupied_cells.contains(&cell));
            if !listed {
                return Err(RegistryInconsistency::DanglingBackReference { cell, id });
            }
        }
        Ok(())
    }
}
