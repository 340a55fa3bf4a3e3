use std::collections::BTreeSet;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::content::{
    ElementBehavior, ElementCatalog, ElementDef, ElementId, PatternCode, ScatterSpec, ToolAction,
};

use super::grid::{
    CellCoord, Grid, GroundKind, Occupant, OccupantIdAllocator, OccupantVisual,
};
use super::growth::GrowthScheduler;
use super::inventory::Inventory;
use super::registry::{EntityRecord, EntityRegistry, Footprint, NewRecord, StructureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementShape {
    /// Rectangle whose top-left is the anchor.
    Area { width: u32, height: u32 },
    Scatter { radius: u32, count: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRequest {
    pub element: ElementId,
    pub anchor: CellCoord,
    pub shape: Option<PlacementShape>,
    pub metadata: Option<Value>,
}

impl PlacementRequest {
    pub fn new(element: ElementId, anchor: CellCoord) -> Self {
        Self {
            element,
            anchor,
            shape: None,
            metadata: None,
        }
    }

    pub fn with_area(mut self, width: u32, height: u32) -> Self {
        self.shape = Some(PlacementShape::Area { width, height });
        self
    }

    pub fn with_scatter(mut self, radius: u32, count: u32) -> Self {
        self.shape = Some(PlacementShape::Scatter { radius, count });
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("insufficient space: cell ({row}, {col}) is outside the grid")]
    OutOfBounds { row: i64, col: i64 },
    #[error("cell {cell} is already occupied")]
    CellOccupied { cell: CellCoord },
    #[error("cell {cell} has {} ground which this element cannot use", .found.name())]
    GroundMismatch { cell: CellCoord, found: GroundKind },
    #[error("no {element} left to place")]
    InventoryExhausted { element: String },
    #[error("unknown element {element:?}")]
    UnknownElement { element: ElementId },
    #[error("nothing to remove at {cell}")]
    NothingToRemove { cell: CellCoord },
    #[error("nothing ready to harvest at {cell}")]
    NotHarvestable { cell: CellCoord },
}

impl RejectReason {
    /// Few-word form for status lines.
    pub fn short_message(&self) -> &'static str {
        match self {
            RejectReason::OutOfBounds { .. } => "insufficient space",
            RejectReason::CellOccupied { .. } => "cell occupied",
            RejectReason::GroundMismatch { .. } => "wrong ground",
            RejectReason::InventoryExhausted { .. } => "none left",
            RejectReason::UnknownElement { .. } => "unknown element",
            RejectReason::NothingToRemove { .. } => "nothing here",
            RejectReason::NotHarvestable { .. } => "not ready",
        }
    }

    fn out_of_bounds(row: i64, col: i64) -> Self {
        RejectReason::OutOfBounds { row, col }
    }

    fn out_of_bounds_at(cell: CellCoord) -> Self {
        Self::out_of_bounds(i64::from(cell.row), i64::from(cell.col))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub entity: Option<StructureId>,
    pub element: ElementId,
    pub cells: Vec<CellCoord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlacementOutcome {
    Placed {
        entity: Option<StructureId>,
        cells: Vec<CellCoord>,
    },
    /// Best-effort placement; `cells` may be empty.
    Scattered { cells: Vec<CellCoord> },
    GroundChanged { cell: CellCoord, ground: GroundKind },
    Removed(Removal),
    Harvested {
        cell: CellCoord,
        resource: String,
        amount: u32,
    },
    Inspected {
        cell: CellCoord,
        record: Option<EntityRecord>,
    },
}

pub type PlacementResult = Result<PlacementOutcome, RejectReason>;

/// Who pays for a placement. Replays and world generation are free.
#[derive(Debug)]
pub enum Payer<'a> {
    Actor(&'a mut Inventory),
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementSettings {
    pub infinite_resources: bool,
    /// Real time per growth duration unit.
    pub growth_unit: Duration,
}

#[derive(Debug, Clone)]
struct PlannedCell {
    coord: CellCoord,
    visual: OccupantVisual,
    prepare: Option<GroundKind>,
}

#[derive(Debug, Clone)]
struct PlannedRecord {
    kind: String,
    footprint: Footprint,
    origin: CellCoord,
    metadata: Value,
}

/// Fully validated placement; committing it cannot fail.
#[derive(Debug, Clone)]
struct PlacementPlan {
    cells: Vec<PlannedCell>,
    record: Option<PlannedRecord>,
    cost: u32,
}

/// Validate-then-commit placement over borrowed world state.
pub(crate) struct PlacementEngine<'w> {
    pub(crate) catalog: &'w ElementCatalog,
    pub(crate) grid: &'w mut Grid,
    pub(crate) registry: &'w mut EntityRegistry,
    pub(crate) growth: &'w mut GrowthScheduler,
    pub(crate) occupant_ids: &'w mut OccupantIdAllocator,
    pub(crate) scatter_rng: &'w mut ChaCha8Rng,
    pub(crate) growth_rng: &'w mut ChaCha8Rng,
    pub(crate) now: Duration,
    pub(crate) settings: PlacementSettings,
}

impl<'w> PlacementEngine<'w> {
    pub(crate) fn place(&mut self, request: &PlacementRequest, payer: Payer<'_>) -> PlacementResult {
        let catalog = self.catalog;
        let def = catalog
            .get(request.element)
            .ok_or(RejectReason::UnknownElement {
                element: request.element,
            })?;

        match &def.behavior {
            ElementBehavior::SingleCell => {
                let plan = self.plan_single(def, request)?;
                self.commit(def, plan, payer)
            }
            ElementBehavior::AreaPrompted => {
                let plan = self.plan_area(def, request)?;
                self.commit(def, plan, payer)
            }
            ElementBehavior::Pattern(pattern) => {
                let origin = (
                    i64::from(request.anchor.row) - i64::from(pattern.inner_offset.row),
                    i64::from(request.anchor.col) - i64::from(pattern.inner_offset.col),
                );
                let targets = pattern
                    .filled_cells()
                    .map(|(row, col, code)| {
                        let visual = match code {
                            PatternCode::Piece(index) => OccupantVisual::Piece(index),
                            _ => initial_visual(def),
                        };
                        (origin.0 + i64::from(row), origin.1 + i64::from(col), visual)
                    })
                    .collect::<Vec<_>>();
                let cells = self.plan_cells(def, &targets)?;
                let top_left = self
                    .grid
                    .coord(origin.0, origin.1)
                    .ok_or_else(|| RejectReason::out_of_bounds(origin.0, origin.1))?;
                let plan = PlacementPlan {
                    cells,
                    record: Some(PlannedRecord {
                        kind: record_kind(def),
                        footprint: Footprint {
                            width: pattern.width(),
                            height: pattern.height(),
                        },
                        origin: top_left,
                        metadata: request_metadata(request),
                    }),
                    cost: unit_cost(def),
                };
                self.commit(def, plan, payer)
            }
            ElementBehavior::Scatter(scatter) => self.scatter(def, scatter, request, payer),
            ElementBehavior::Tool(action) => self.apply_tool(*action, request.anchor, payer),
        }
    }

    fn plan_single(&self, def: &ElementDef, request: &PlacementRequest) -> Result<PlacementPlan, RejectReason> {
        let anchor = request.anchor;
        let cells = self.plan_cells(
            def,
            &[(
                i64::from(anchor.row),
                i64::from(anchor.col),
                initial_visual(def),
            )],
        )?;
        let record = (request.metadata.is_some() || def.record_kind.is_some()).then(|| {
            PlannedRecord {
                kind: record_kind(def),
                footprint: Footprint {
                    width: 1,
                    height: 1,
                },
                origin: anchor,
                metadata: request_metadata(request),
            }
        });
        Ok(PlacementPlan {
            cells,
            record,
            cost: unit_cost(def),
        })
    }

    fn plan_area(&self, def: &ElementDef, request: &PlacementRequest) -> Result<PlacementPlan, RejectReason> {
        let (width, height) = match request.shape {
            Some(PlacementShape::Area { width, height }) => (width.max(1), height.max(1)),
            _ => (1, 1),
        };
        let anchor = request.anchor;
        let mut targets = Vec::with_capacity(width as usize * height as usize);
        for d_row in 0..height {
            for d_col in 0..width {
                targets.push((
                    i64::from(anchor.row) + i64::from(d_row),
                    i64::from(anchor.col) + i64::from(d_col),
                    initial_visual(def),
                ));
            }
        }
        let cells = self.plan_cells(def, &targets)?;
        let cost = if def.rule.consumes_quantity {
            cells.len() as u32
        } else {
            0
        };
        let record = (cells.len() > 1 || request.metadata.is_some() || def.record_kind.is_some())
            .then(|| PlannedRecord {
                kind: def
                    .record_kind
                    .clone()
                    .unwrap_or_else(|| format!("{}-area", def.def_name)),
                footprint: Footprint { width, height },
                origin: anchor,
                metadata: request_metadata(request),
            });
        Ok(PlacementPlan {
            cells,
            record,
            cost,
        })
    }

    /// Every target is bounds-checked before any cell is inspected, so a
    /// partly off-grid request always reports `OutOfBounds`.
    fn plan_cells(
        &self,
        def: &ElementDef,
        targets: &[(i64, i64, OccupantVisual)],
    ) -> Result<Vec<PlannedCell>, RejectReason> {
        let mut coords = Vec::with_capacity(targets.len());
        for &(row, col, visual) in targets {
            let coord = self
                .grid
                .coord(row, col)
                .ok_or_else(|| RejectReason::out_of_bounds(row, col))?;
            coords.push((coord, visual));
        }

        coords
            .into_iter()
            .map(|(coord, visual)| {
                let prepare = self.check_cell(def, coord)?;
                Ok(PlannedCell {
                    coord,
                    visual,
                    prepare,
                })
            })
            .collect()
    }

    /// Occupancy, then ground. `Ok(Some(ground))` means the cell is usable
    /// once its ground is rewritten.
    fn check_cell(&self, def: &ElementDef, coord: CellCoord) -> Result<Option<GroundKind>, RejectReason> {
        let cell = self
            .grid
            .cell(coord)
            .ok_or_else(|| RejectReason::out_of_bounds_at(coord))?;
        if cell.is_occupied() {
            return Err(RejectReason::CellOccupied { cell: coord });
        }
        let ground = cell.ground();
        if def.rule.ground.accepts(ground) {
            return Ok(None);
        }
        if def.rule.auto_prepare && !ground.is_border() {
            if let Some(prepared) = def.rule.ground.prepared_ground() {
                return Ok(Some(prepared));
            }
        }
        Err(RejectReason::GroundMismatch {
            cell: coord,
            found: ground,
        })
    }

    fn ensure_affordable(&self, def: &ElementDef, cost: u32, payer: &Payer<'_>) -> Result<(), RejectReason> {
        if cost == 0 || self.settings.infinite_resources {
            return Ok(());
        }
        match payer {
            Payer::Actor(inventory) if !inventory.can_afford(def.id, cost) => {
                Err(RejectReason::InventoryExhausted {
                    element: def.def_name.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn charge(&self, def: &ElementDef, cost: u32, payer: Payer<'_>) {
        if cost == 0 || self.settings.infinite_resources {
            return;
        }
        if let Payer::Actor(inventory) = payer {
            if !inventory.consume(def.id, cost) {
                warn!(element = %def.def_name, cost, "placement_charge_short");
            }
        }
    }

    fn commit(&mut self, def: &ElementDef, plan: PlacementPlan, payer: Payer<'_>) -> PlacementResult {
        self.ensure_affordable(def, plan.cost, &payer)?;

        let mut cells = Vec::with_capacity(plan.cells.len());
        for planned in &plan.cells {
            self.put_occupant(def, planned.coord, planned.visual, planned.prepare);
            cells.push(planned.coord);
        }

        let entity = plan.record.map(|record| {
            let id = self.registry.create(
                NewRecord {
                    kind: record.kind,
                    element: def.id,
                    footprint: record.footprint,
                    origin: record.origin,
                    occupied_cells: cells.iter().copied().collect::<BTreeSet<_>>(),
                    metadata: record.metadata,
                },
                self.now,
            );
            for &cell in &cells {
                self.grid.set_structure(cell, Some(id));
            }
            id
        });

        self.charge(def, plan.cost, payer);
        self.debug_verify("place");
        debug!(
            element = %def.def_name,
            cells = cells.len(),
            entity = ?entity,
            "placement_committed"
        );
        Ok(PlacementOutcome::Placed { entity, cells })
    }

    fn put_occupant(
        &mut self,
        def: &ElementDef,
        coord: CellCoord,
        visual: OccupantVisual,
        prepare: Option<GroundKind>,
    ) {
        if let Some(ground) = prepare {
            self.grid.set_ground(coord, ground);
        }
        let id = self.occupant_ids.allocate();
        self.grid.set_occupant(
            coord,
            Occupant {
                id,
                element: def.id,
                visual,
            },
        );
        if let (Some(growth), OccupantVisual::Stage(_)) = (&def.growth, visual) {
            let stage_duration = self
                .settings
                .growth_unit
                .saturating_mul(growth.stage_duration_units);
            self.growth.schedule_crop(
                self.now,
                coord,
                id,
                growth.stage_count(),
                stage_duration,
                &mut *self.growth_rng,
            );
        }
    }

    /// Best effort: cells within the Chebyshev radius (center excluded) are
    /// tried in shuffled order until `count` land.
    fn scatter(
        &mut self,
        def: &ElementDef,
        spec: &ScatterSpec,
        request: &PlacementRequest,
        payer: Payer<'_>,
    ) -> PlacementResult {
        let (radius, count) = match request.shape {
            Some(PlacementShape::Scatter { radius, count }) => (radius, count),
            _ => (spec.radius, spec.count),
        };
        let center = request.anchor;
        if !self.grid.contains(center) {
            return Err(RejectReason::out_of_bounds_at(center));
        }
        let cost = unit_cost(def);
        self.ensure_affordable(def, cost, &payer)?;

        let radius = i64::from(radius);
        let mut candidates = Vec::new();
        for d_row in -radius..=radius {
            for d_col in -radius..=radius {
                if d_row == 0 && d_col == 0 {
                    continue;
                }
                if let Some(coord) = self
                    .grid
                    .coord(i64::from(center.row) + d_row, i64::from(center.col) + d_col)
                {
                    candidates.push(coord);
                }
            }
        }
        candidates.shuffle(&mut *self.scatter_rng);

        let mut placed = Vec::new();
        for coord in candidates {
            if placed.len() >= count as usize {
                break;
            }
            let Ok(prepare) = self.check_cell(def, coord) else {
                continue;
            };
            let visual = if spec.variants.is_empty() {
                OccupantVisual::Primary
            } else {
                let index = self.scatter_rng.gen_range(0..spec.variants.len());
                OccupantVisual::Piece(index.min(usize::from(u8::MAX)) as u8)
            };
            self.put_occupant(def, coord, visual, prepare);
            placed.push(coord);
        }

        if !placed.is_empty() {
            self.charge(def, cost, payer);
        }
        debug!(
            element = %def.def_name,
            requested = count,
            placed = placed.len(),
            "scatter_committed"
        );
        Ok(PlacementOutcome::Scattered { cells: placed })
    }

    fn apply_tool(&mut self, action: ToolAction, cell: CellCoord, payer: Payer<'_>) -> PlacementResult {
        if !self.grid.contains(cell) {
            return Err(RejectReason::out_of_bounds_at(cell));
        }
        match action {
            ToolAction::Clear => self.remove(cell).map(PlacementOutcome::Removed),
            ToolAction::Pave(ground) => self.change_ground(cell, |_| true, ground),
            ToolAction::Plow => {
                self.change_ground(cell, GroundKind::is_natural, GroundKind::FarmPlowed)
            }
            ToolAction::Unplow => self.change_ground(
                cell,
                |ground| ground == GroundKind::FarmPlowed,
                GroundKind::Plain,
            ),
            ToolAction::Harvest => self.harvest(cell, payer),
            ToolAction::Inspect => Ok(PlacementOutcome::Inspected {
                cell,
                record: self.registry.find_by_cell(&*self.grid, cell).cloned(),
            }),
        }
    }

    fn change_ground(
        &mut self,
        cell: CellCoord,
        accepts: impl Fn(GroundKind) -> bool,
        ground: GroundKind,
    ) -> PlacementResult {
        let current = self
            .grid
            .cell(cell)
            .ok_or_else(|| RejectReason::out_of_bounds_at(cell))?;
        if current.is_occupied() {
            return Err(RejectReason::CellOccupied { cell });
        }
        let found = current.ground();
        if found.is_border() || !accepts(found) {
            return Err(RejectReason::GroundMismatch { cell, found });
        }
        self.grid.set_ground(cell, ground);
        Ok(PlacementOutcome::GroundChanged { cell, ground })
    }

    fn harvest(&mut self, cell: CellCoord, payer: Payer<'_>) -> PlacementResult {
        let not_harvestable = RejectReason::NotHarvestable { cell };
        let occupant = self
            .grid
            .occupant(cell)
            .copied()
            .ok_or_else(|| not_harvestable.clone())?;
        let catalog = self.catalog;
        let def = catalog
            .get(occupant.element)
            .ok_or(RejectReason::UnknownElement {
                element: occupant.element,
            })?;
        // Linked cells only come apart one at a time for crop fields.
        if self.grid.structure_at(cell).is_some() && !def.is_crop() {
            return Err(not_harvestable);
        }
        let Some(yields) = def.rule.yields.as_ref() else {
            return Err(not_harvestable);
        };
        if def.is_crop() && !def.is_grown(occupant.visual) {
            return Err(not_harvestable);
        }

        self.release_cell(cell);
        if let Payer::Actor(inventory) = payer {
            inventory.credit(&yields.resource, yields.amount);
        }
        debug!(
            element = %def.def_name,
            cell = %cell,
            resource = %yields.resource,
            amount = yields.amount,
            "harvested"
        );
        Ok(PlacementOutcome::Harvested {
            cell,
            resource: yields.resource.clone(),
            amount: yields.amount,
        })
    }

    /// Puts back an occupant that belongs to no record. Crops restart at
    /// stage 0.
    pub(crate) fn restore_occupant(
        &mut self,
        element: ElementId,
        cell: CellCoord,
        visual: OccupantVisual,
    ) -> Result<(), RejectReason> {
        let catalog = self.catalog;
        let def = catalog
            .get(element)
            .ok_or(RejectReason::UnknownElement { element })?;
        let prepare = self.check_cell(def, cell)?;
        let visual = if def.is_crop() {
            initial_visual(def)
        } else {
            visual
        };
        self.put_occupant(def, cell, visual, prepare);
        Ok(())
    }

    /// Clears one cell's occupant and unlinks it from its record, deleting
    /// the record with its last cell.
    pub(crate) fn release_cell(&mut self, cell: CellCoord) -> Option<Occupant> {
        let occupant = self.grid.clear_occupant(cell);
        if let Some(id) = self.grid.structure_at(cell) {
            self.grid.set_structure(cell, None);
            if let Some(record) = self.registry.release_cell(id, cell) {
                debug!(entity = %record.id, kind = %record.kind, "record_emptied");
            }
        }
        self.debug_verify("release");
        occupant
    }

    /// Clears the whole structure covering `cell`, or its lone occupant.
    pub(crate) fn remove(&mut self, cell: CellCoord) -> Result<Removal, RejectReason> {
        if !self.grid.contains(cell) {
            return Err(RejectReason::out_of_bounds_at(cell));
        }

        let structure = self
            .registry
            .find_by_cell(&*self.grid, cell)
            .map(|record| record.id);
        if let Some(record) = structure.and_then(|id| self.registry.remove(id)) {
            for &covered in &record.occupied_cells {
                self.grid.clear_occupant(covered);
                self.grid.set_structure(covered, None);
            }
            self.debug_verify("remove");
            return Ok(Removal {
                entity: Some(record.id),
                element: record.element,
                cells: record.occupied_cells.into_iter().collect(),
            });
        }

        self.grid.set_structure(cell, None);
        match self.grid.clear_occupant(cell) {
            Some(occupant) => Ok(Removal {
                entity: None,
                element: occupant.element,
                cells: vec![cell],
            }),
            None => Err(RejectReason::NothingToRemove { cell }),
        }
    }

    fn debug_verify(&self, operation: &'static str) {
        if cfg!(debug_assertions) {
            let result = self.registry.verify_consistency(&*self.grid);
            if let Err(error) = &result {
                warn!(operation, error = %error, "registry_inconsistent");
            }
            debug_assert!(result.is_ok(), "registry inconsistent after {operation}");
        }
    }
}

fn initial_visual(def: &ElementDef) -> OccupantVisual {
    if def.is_crop() {
        OccupantVisual::Stage(0)
    } else {
        OccupantVisual::Primary
    }
}

fn unit_cost(def: &ElementDef) -> u32 {
    u32::from(def.rule.consumes_quantity)
}

fn record_kind(def: &ElementDef) -> String {
    def.record_kind
        .clone()
        .unwrap_or_else(|| def.def_name.clone())
}

fn request_metadata(request: &PlacementRequest) -> Value {
    request
        .metadata
        .clone()
        .unwrap_or_else(|| Value::Object(Map::new()))
}
