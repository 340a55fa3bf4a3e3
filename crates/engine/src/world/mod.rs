mod avatar;
mod camera;
mod grid;
mod growth;
mod inventory;
mod placement;
mod registry;
mod rng;
mod snapshot;
#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::content::{ElementCatalog, ElementId};

pub use avatar::{AvatarConfig, AvatarController, Facing, MoveIntent};
pub use camera::{CameraController, TileSpan, Viewport, MAX_TILES_IN_VIEW, MIN_TILES_IN_VIEW};
pub use grid::{
    natural_ground_variation, Cell, CellCoord, Grid, GridError, GroundKind, Occupant,
    OccupantId, OccupantVisual,
};
pub use growth::{GrowthScheduler, StageAdvanced};
pub use inventory::Inventory;
pub use placement::{
    PlacementOutcome, PlacementRequest, PlacementResult, PlacementShape, RejectReason, Removal,
};
pub use registry::{EntityRecord, EntityRegistry, Footprint, RegistryInconsistency, StructureId};
pub use snapshot::{
    SavedGround, SavedOccupant, SavedStructure, SnapshotError, SnapshotReport, WorldSnapshot,
};

use grid::OccupantIdAllocator;
use placement::{Payer, PlacementEngine, PlacementSettings};
use rng::WorldRng;

const NATURAL_SPAWN_CELL_FACTOR: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    pub rows: u32,
    pub cols: u32,
    pub cell_size_px: f32,
    pub seed: u64,
    /// Percent of interior cells considered by the natural spawn pass, before
    /// the per-cell factor.
    pub natural_generation_percent: f32,
    pub infinite_resources: bool,
    /// Milliseconds per catalog growth unit.
    pub growth_time_scale_ms: u64,
    pub tiles_in_view: TileSpan,
    pub avatar: AvatarConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            rows: 50,
            cols: 100,
            cell_size_px: 32.0,
            seed: 0x5EED_F00D,
            natural_generation_percent: 5.0,
            infinite_resources: true,
            growth_time_scale_ms: 10,
            tiles_in_view: TileSpan::new(11, 11),
            avatar: AvatarConfig::default(),
        }
    }
}

impl WorldConfig {
    pub fn growth_unit(&self) -> Duration {
        Duration::from_millis(self.growth_time_scale_ms)
    }
}

/// Sent to hooks after every successful placement.
#[derive(Debug, Clone, PartialEq)]
pub struct StructurePlaced {
    pub entity: Option<StructureId>,
    pub element: ElementId,
    pub cells: Vec<CellCoord>,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructureRemoved {
    pub entity: Option<StructureId>,
    pub element: ElementId,
    pub cells: Vec<CellCoord>,
}

/// Fire-and-forget listener for world changes; the world never waits on it.
pub trait StructureHook {
    fn structure_placed(&mut self, event: &StructurePlaced);

    fn structure_removed(&mut self, _event: &StructureRemoved) {}
}

/// The farm world: grid, registry, growth, camera and avatar behind one owner.
pub struct FarmWorld {
    config: WorldConfig,
    catalog: Arc<ElementCatalog>,
    grid: Grid,
    registry: EntityRegistry,
    growth: GrowthScheduler,
    camera: CameraController,
    avatar: AvatarController,
    rng: WorldRng,
    occupant_ids: OccupantIdAllocator,
    now: Duration,
    hooks: Vec<Box<dyn StructureHook>>,
}

impl FarmWorld {
    /// Natural ground plus a natural spawn pass.
    pub fn generate(
        config: WorldConfig,
        catalog: Arc<ElementCatalog>,
        viewport: Viewport,
    ) -> Result<Self, GridError> {
        let grid = Grid::new(config.rows, config.cols, natural_ground_variation)?;
        let mut world = Self::with_grid(config, catalog, grid, viewport);
        let spawned = world.spawn_natural_elements();
        info!(
            rows = world.config.rows,
            cols = world.config.cols,
            seed = world.config.seed,
            spawned,
            "world_generated"
        );
        Ok(world)
    }

    /// Uses `grid` as-is; the camera starts following the avatar.
    pub fn with_grid(
        config: WorldConfig,
        catalog: Arc<ElementCatalog>,
        grid: Grid,
        viewport: Viewport,
    ) -> Self {
        let extent = grid.extent_px(config.cell_size_px);
        let avatar = AvatarController::new(config.avatar, extent);
        let mut camera =
            CameraController::new(viewport, extent, config.cell_size_px, config.tiles_in_view);
        camera.follow_camera(avatar.center());
        Self {
            rng: WorldRng::new(config.seed),
            config,
            catalog,
            grid,
            registry: EntityRegistry::new(),
            growth: GrowthScheduler::new(),
            camera,
            avatar,
            occupant_ids: OccupantIdAllocator::default(),
            now: Duration::ZERO,
            hooks: Vec::new(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ElementCatalog {
        &self.catalog
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn growth(&self) -> &GrowthScheduler {
        &self.growth
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraController {
        &mut self.camera
    }

    pub fn avatar(&self) -> &AvatarController {
        &self.avatar
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn add_hook(&mut self, hook: Box<dyn StructureHook>) {
        self.hooks.push(hook);
    }

    fn placement(&mut self) -> PlacementEngine<'_> {
        PlacementEngine {
            catalog: &self.catalog,
            grid: &mut self.grid,
            registry: &mut self.registry,
            growth: &mut self.growth,
            occupant_ids: &mut self.occupant_ids,
            scatter_rng: &mut self.rng.scatter,
            growth_rng: &mut self.rng.growth,
            now: self.now,
            settings: PlacementSettings {
                infinite_resources: self.config.infinite_resources,
                growth_unit: self.config.growth_unit(),
            },
        }
    }

    /// Places on behalf of `actor`, charging its inventory.
    pub fn place(&mut self, request: &PlacementRequest, actor: &mut Inventory) -> PlacementResult {
        let result = self.placement().place(request, Payer::Actor(actor));
        self.after_placement(request, &result);
        result
    }

    /// Places without charging anyone.
    pub fn place_free(&mut self, request: &PlacementRequest) -> PlacementResult {
        let result = self.placement().place(request, Payer::Free);
        self.after_placement(request, &result);
        result
    }

    pub fn remove(&mut self, cell: CellCoord) -> Result<Removal, RejectReason> {
        let result = self.placement().remove(cell);
        match &result {
            Ok(removal) => {
                info!(
                    cell = %cell,
                    entity = ?removal.entity,
                    cells = removal.cells.len(),
                    "structure_removed"
                );
                self.notify_removed(removal);
            }
            Err(reason) => debug!(cell = %cell, reason = %reason, "removal_rejected"),
        }
        result
    }

    pub fn find_structure(&self, cell: CellCoord) -> Option<&EntityRecord> {
        self.registry.find_by_cell(&self.grid, cell)
    }

    fn after_placement(&mut self, request: &PlacementRequest, result: &PlacementResult) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(reason) => {
                debug!(
                    element = ?request.element,
                    anchor = %request.anchor,
                    reason = %reason,
                    "placement_rejected"
                );
                return;
            }
        };

        let (entity, cells) = match outcome {
            PlacementOutcome::Placed { entity, cells } => (*entity, cells),
            PlacementOutcome::Scattered { cells } if !cells.is_empty() => (None, cells),
            PlacementOutcome::Removed(removal) => {
                self.notify_removed(removal);
                return;
            }
            _ => return,
        };
        info!(
            element = ?request.element,
            anchor = %request.anchor,
            entity = ?entity,
            cells = cells.len(),
            "structure_placed"
        );
        if self.hooks.is_empty() {
            return;
        }
        let metadata = entity
            .and_then(|id| self.registry.get(id))
            .map(|record| record.metadata.clone())
            .or_else(|| request.metadata.clone())
            .unwrap_or(Value::Null);
        let event = StructurePlaced {
            entity,
            element: request.element,
            cells: cells.clone(),
            metadata,
        };
        for hook in &mut self.hooks {
            hook.structure_placed(&event);
        }
    }

    fn notify_removed(&mut self, removal: &Removal) {
        let event = StructureRemoved {
            entity: removal.entity,
            element: removal.element,
            cells: removal.cells.clone(),
        };
        for hook in &mut self.hooks {
            hook.structure_removed(&event);
        }
    }

    /// Moves the virtual clock forward and applies every growth trigger due.
    pub fn advance(&mut self, dt: Duration) -> Vec<StageAdvanced> {
        self.now = self.now.saturating_add(dt);
        self.growth.advance(self.now, &mut self.grid, &self.catalog)
    }

    /// One avatar movement tick; a following camera re-centers on the avatar.
    pub fn tick_avatar(&mut self, intent: MoveIntent, dt: Duration) -> bool {
        let moved = self.avatar.tick(intent, dt);
        if self.camera.follow_enabled() {
            self.camera.follow_camera(self.avatar.center());
        }
        moved
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.camera.set_viewport(viewport);
    }

    pub fn cell_at_screen(&self, screen: Vec2) -> Option<CellCoord> {
        self.camera.screen_to_cell(screen, &self.grid)
    }

    pub fn avatar_cell(&self) -> Option<CellCoord> {
        self.avatar.cell(&self.grid, self.config.cell_size_px)
    }

    /// Free placement on the free cell nearest the avatar; `None` when the
    /// grid has no free cell left.
    pub fn place_near_avatar(&mut self, element: ElementId) -> Option<PlacementResult> {
        let from = self.avatar_cell()?;
        let target = self.grid.nearest_free_cell(from)?;
        Some(self.place_free(&PlacementRequest::new(element, target)))
    }

    /// Rolls every interior cell against the natural spawners. Returns how
    /// many occupants landed.
    pub fn spawn_natural_elements(&mut self) -> usize {
        let spawners = self.catalog.natural_spawners();
        if spawners.is_empty() {
            return 0;
        }
        let cell_chance = self.config.natural_generation_percent * NATURAL_SPAWN_CELL_FACTOR;
        let candidates = self
            .grid
            .iter()
            .filter(|(_, cell)| !cell.ground().is_border() && !cell.is_occupied())
            .map(|(coord, _)| coord)
            .collect::<Vec<_>>();

        let mut spawned = 0;
        for coord in candidates {
            let rng = &mut self.rng.generation;
            if rng.gen_range(0.0..100.0) >= cell_chance {
                continue;
            }
            let element = spawners[rng.gen_range(0..spawners.len())];
            let chance = self
                .catalog
                .get(element)
                .and_then(|def| def.natural_spawn_chance)
                .unwrap_or(0.0);
            if rng.gen_range(0.0..100.0) >= chance {
                continue;
            }
            let request = PlacementRequest::new(element, coord);
            if self.placement().place(&request, Payer::Free).is_ok() {
                spawned += 1;
            }
        }
        spawned
    }

    /// Clears every occupant, record and pending trigger, restores natural
    /// ground and re-seeds the random streams. Hooks, camera and avatar stay.
    pub fn reset_terrain(&mut self) {
        let coords = self.grid.iter().map(|(coord, _)| coord).collect::<Vec<_>>();
        for coord in coords {
            self.grid.clear_occupant(coord);
            self.grid.set_structure(coord, None);
            let is_border = self.grid.ground(coord).is_some_and(GroundKind::is_border);
            if !is_border {
                self.grid.set_ground(coord, natural_ground_variation(coord));
            }
        }
        self.registry = EntityRegistry::new();
        self.growth.clear();
        self.rng = WorldRng::new(self.config.seed);
        info!(seed = self.config.seed, "world_terrain_reset");
    }
}
