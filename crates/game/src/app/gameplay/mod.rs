use std::path::PathBuf;
use std::time::Duration;

use farm_engine::world::{EntityRecord, StructureId};
use farm_engine::{
    CellCoord, ElementBehavior, ElementId, FarmWorld, HudLine, InputAction, InputSnapshot,
    Inventory, PlacementOutcome, PlacementRequest, RejectReason, Scene, SceneCommand,
    StructureHook, StructurePlaced, StructureRemoved,
};
use tracing::{debug, info, warn};

mod palette;
mod save;

use palette::Palette;
use save::{read_save, write_save, SaveGame};

pub(crate) use save::SAVE_FILE_NAME;

const STATUS_DURATION_SECONDS: f32 = 2.5;
const STARTING_STOCK: u32 = 25;
const STARTING_HOUSE_DEF: &str = "house";

#[derive(Debug, Clone, PartialEq)]
struct StatusMessage {
    text: String,
    alert: bool,
    remaining_seconds: f32,
}

/// Logs every structure change; stands in for an external persistence layer.
struct StructureLog;

impl StructureHook for StructureLog {
    fn structure_placed(&mut self, event: &StructurePlaced) {
        info!(
            entity = ?event.entity.map(|id| id.0),
            element = event.element.0,
            cells = event.cells.len(),
            metadata = %event.metadata,
            "structure_placed"
        );
    }

    fn structure_removed(&mut self, event: &StructureRemoved) {
        info!(
            entity = ?event.entity.map(|id| id.0),
            element = event.element.0,
            cells = event.cells.len(),
            "structure_removed"
        );
    }
}

/// The player's side of the farm: avatar and camera control, the element
/// palette, placement by click, and save/load.
pub(crate) struct FarmScene {
    save_path: Option<PathBuf>,
    inventory: Inventory,
    palette: Palette,
    hover_cell: Option<CellCoord>,
    status: Option<StatusMessage>,
}

impl FarmScene {
    pub(crate) fn new(save_path: Option<PathBuf>) -> Self {
        Self {
            save_path,
            inventory: Inventory::new(),
            palette: Palette::new(Vec::new()),
            hover_cell: None,
            status: None,
        }
    }

    fn set_status(&mut self, text: impl Into<String>, alert: bool) {
        self.status = Some(StatusMessage {
            text: text.into(),
            alert,
            remaining_seconds: STATUS_DURATION_SECONDS,
        });
    }

    fn reject(&mut self, reason: &RejectReason) {
        debug!(reason = %reason, "placement_rejected_by_engine");
        self.set_status(reason.short_message(), true);
    }

    fn tick_status(&mut self, dt: f32) {
        if let Some(status) = &mut self.status {
            status.remaining_seconds -= dt;
            if status.remaining_seconds <= 0.0 {
                self.status = None;
            }
        }
    }

    fn stock_inventory(&mut self, world: &FarmWorld) {
        if world.config().infinite_resources {
            return;
        }
        for def in world.catalog().defs() {
            let is_tool = matches!(def.behavior, ElementBehavior::Tool(_));
            if def.natural_spawn_chance.is_none() && !is_tool {
                self.inventory.set_quantity(def.id, STARTING_STOCK);
            }
        }
    }

    fn place_starting_house(&mut self, world: &mut FarmWorld) {
        let Some(house) = world.catalog().id_by_name(STARTING_HOUSE_DEF) else {
            warn!(def_name = STARTING_HOUSE_DEF, "starting_house_missing_from_catalog");
            return;
        };
        match world.place_near_avatar(house) {
            Some(Ok(outcome)) => debug!(outcome = ?outcome, "starting_house_placed"),
            Some(Err(reason)) => warn!(reason = %reason, "starting_house_rejected"),
            None => warn!("starting_house_no_free_cell"),
        }
    }

    fn update_camera(&mut self, input: &InputSnapshot, world: &mut FarmWorld) {
        if input.toggle_follow_pressed() {
            let following = world.camera_mut().toggle_follow();
            info!(following, "camera_follow_toggled");
            self.set_status(if following { "camera follows" } else { "camera free" }, false);
        }
        let zoom_steps = input.zoom_delta_steps();
        if zoom_steps != 0 {
            world.camera_mut().adjust_tile_count(zoom_steps);
        }
        if world.camera().follow_enabled() {
            return;
        }

        let (pan_x, pan_y) = input.pan_steps();
        if pan_x != 0 || pan_y != 0 {
            world.camera_mut().pan_steps(pan_x, pan_y);
        }
        let camera = world.camera_mut();
        match (input.right_button_down(), input.cursor_position_px()) {
            (true, Some(cursor)) if input.right_click_pressed() || !camera.is_dragging() => {
                camera.begin_drag(cursor);
            }
            (true, Some(cursor)) => {
                camera.drag_to(cursor);
            }
            _ => {
                if camera.is_dragging() {
                    camera.end_drag();
                }
            }
        }
    }

    fn update_palette(&mut self, input: &InputSnapshot, world: &FarmWorld) {
        if input.next_page_pressed() {
            let page = self.palette.next_page();
            self.set_status(format!("page {}/{}", page + 1, self.palette.page_count()), false);
        }
        if let Some(slot) = input.slot_pressed() {
            match self.palette.select_slot(slot) {
                Some(element) => {
                    let label = element_label(world, element);
                    self.set_status(format!("selected {label}"), false);
                }
                None => self.set_status("empty slot", true),
            }
        }
        if input.cycle_area_pressed() {
            let size = self.palette.cycle_area();
            self.set_status(format!("area {size}x{size}"), false);
        }
    }

    fn click(&mut self, cell: CellCoord, removing: bool, world: &mut FarmWorld) {
        if removing {
            match world.remove(cell) {
                Ok(removal) => self.set_status(format!("removed {} cells", removal.cells.len()), false),
                Err(reason) => self.reject(&reason),
            }
            return;
        }

        let Some(element) = self.palette.selected() else {
            self.set_status("pick an element with 1-0", true);
            return;
        };
        let Some(def) = world.catalog().get(element) else {
            return;
        };
        let label = def.label.clone();
        let request = match def.behavior {
            ElementBehavior::AreaPrompted => {
                let size = self.palette.area_size();
                PlacementRequest::new(element, cell).with_area(size, size)
            }
            _ => PlacementRequest::new(element, cell),
        };
        match world.place(&request, &mut self.inventory) {
            Ok(outcome) => {
                let (text, alert) = describe_outcome(&label, &outcome);
                self.set_status(text, alert);
            }
            Err(reason) => self.reject(&reason),
        }
    }

    fn save_game(&mut self, world: &FarmWorld) {
        let Some(path) = self.save_path.clone() else {
            self.set_status("saving unavailable", true);
            return;
        };
        let save = SaveGame::capture(world);
        match write_save(&path, &save) {
            Ok(()) => {
                info!(
                    path = %path.display(),
                    structures = save.world.structures.len(),
                    "save_written"
                );
                self.set_status("saved", false);
            }
            Err(error) => {
                warn!(error = error.as_str(), "save_failed");
                self.set_status("save failed", true);
            }
        }
    }

    fn load_game(&mut self, world: &mut FarmWorld) {
        let Some(path) = self.save_path.clone() else {
            self.set_status("loading unavailable", true);
            return;
        };
        let save = match read_save(&path).and_then(|save| {
            save.validate_for(world.config())?;
            Ok(save)
        }) {
            Ok(save) => save,
            Err(error) => {
                warn!(error = error.as_str(), "save_load_failed");
                self.set_status("load failed", true);
                return;
            }
        };
        match world.restore_snapshot(&save.world) {
            Ok(report) => {
                info!(
                    path = %path.display(),
                    restored = report.restored.len(),
                    rejected = report.rejected.len(),
                    occupants = report.occupants_restored,
                    occupants_rejected = report.occupants_rejected.len(),
                    "save_loaded"
                );
                if report.is_complete() {
                    self.set_status(format!("loaded {} structures", report.restored.len()), false);
                } else {
                    let skipped = report.rejected.len() + report.occupants_rejected.len();
                    self.set_status(
                        format!("loaded {}, skipped {skipped}", report.restored.len()),
                        true,
                    );
                }
            }
            Err(error) => {
                warn!(error = %error, "save_apply_failed");
                self.set_status("load failed", true);
            }
        }
    }

    fn selection_line(&self, world: &FarmWorld) -> String {
        let Some(element) = self.palette.selected() else {
            return "SEL NONE".to_string();
        };
        let Some(def) = world.catalog().get(element) else {
            return "SEL NONE".to_string();
        };
        let quantity = if matches!(def.behavior, ElementBehavior::Tool(_))
            || world.config().infinite_resources
        {
            "INF".to_string()
        } else {
            self.inventory.quantity(element).to_string()
        };
        match def.behavior {
            ElementBehavior::AreaPrompted => {
                let size = self.palette.area_size();
                format!("SEL {} X{quantity} AREA {size}X{size}", def.label)
            }
            _ => format!("SEL {} X{quantity}", def.label),
        }
    }

    fn hover_line(&self, world: &FarmWorld) -> Option<String> {
        let cell = self.hover_cell?;
        let ground = world.grid().ground(cell)?;
        let occupant = world
            .grid()
            .occupant(cell)
            .map(|occupant| element_label(world, occupant.element));
        Some(match occupant {
            Some(label) => format!("CELL {cell} {} {label}", ground.name()),
            None => format!("CELL {cell} {}", ground.name()),
        })
    }
}

impl Scene for FarmScene {
    fn load(&mut self, world: &mut FarmWorld) {
        self.palette = Palette::new(world.catalog().selectable());
        self.inventory = Inventory::new();
        self.stock_inventory(world);
        self.status = None;
        world.add_hook(Box::new(StructureLog));
        self.place_starting_house(world);
        info!(
            palette_entries = world.catalog().selectable().len(),
            pages = self.palette.page_count(),
            "farm_scene_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut FarmWorld,
    ) -> SceneCommand {
        if input.quit_requested() {
            return SceneCommand::Quit;
        }
        self.tick_status(fixed_dt_seconds);

        world.tick_avatar(
            input.move_intent(),
            Duration::from_secs_f32(fixed_dt_seconds.max(0.0)),
        );
        self.update_camera(input, world);
        self.update_palette(input, world);

        self.hover_cell = input
            .cursor_position_px()
            .and_then(|cursor| world.cell_at_screen(cursor));
        if input.left_click_pressed() {
            if let Some(cell) = self.hover_cell {
                self.click(cell, input.is_down(InputAction::RemoveModifier), world);
            }
        }

        if input.save_pressed() {
            self.save_game(world);
        }
        if input.load_pressed() {
            self.load_game(world);
        }
        SceneCommand::None
    }

    fn hud_lines(&self, world: &FarmWorld) -> Vec<HudLine> {
        let camera = world.camera();
        let tiles = camera.tiles_in_view();
        let mut lines = vec![
            HudLine::plain(self.selection_line(world)),
            HudLine::plain(format!(
                "PAGE {}/{}  STRUCTURES {}  VIEW {}X{}  FOLLOW {}",
                self.palette.page() + 1,
                self.palette.page_count(),
                world.registry().len(),
                tiles.x,
                tiles.y,
                if camera.follow_enabled() { "ON" } else { "OFF" },
            )),
        ];
        let resources = self
            .inventory
            .resources()
            .map(|(name, amount)| format!("{name} {amount}"))
            .collect::<Vec<_>>();
        if !resources.is_empty() {
            lines.push(HudLine::plain(resources.join("  ")));
        }
        if let Some(hover) = self.hover_line(world) {
            lines.push(HudLine::plain(hover));
        }
        if let Some(status) = &self.status {
            lines.push(if status.alert {
                HudLine::alert(status.text.clone())
            } else {
                HudLine::plain(status.text.clone())
            });
        }
        lines
    }

    fn debug_title(&self, world: &FarmWorld) -> Option<String> {
        Some(format!(
            "Farm | {}x{} | seed {}",
            world.config().rows,
            world.config().cols,
            world.config().seed
        ))
    }
}

fn element_label(world: &FarmWorld, element: ElementId) -> String {
    world
        .catalog()
        .get(element)
        .map_or_else(|| format!("#{}", element.0), |def| def.label.clone())
}

/// Status text for a successful placement; `true` marks a no-op worth flagging.
fn describe_outcome(label: &str, outcome: &PlacementOutcome) -> (String, bool) {
    match outcome {
        PlacementOutcome::Placed { cells, .. } if cells.len() > 1 => {
            (format!("placed {label} on {} cells", cells.len()), false)
        }
        PlacementOutcome::Placed { .. } => (format!("placed {label}"), false),
        PlacementOutcome::Scattered { cells } if cells.is_empty() => {
            (format!("no room for {label}"), true)
        }
        PlacementOutcome::Scattered { cells } => (format!("planted {} {label}", cells.len()), false),
        PlacementOutcome::GroundChanged { cell, ground } => {
            (format!("{cell} is now {}", ground.name()), false)
        }
        PlacementOutcome::Removed(removal) => {
            (format!("cleared {} cells", removal.cells.len()), false)
        }
        PlacementOutcome::Harvested {
            resource, amount, ..
        } => (format!("+{amount} {resource}"), false),
        PlacementOutcome::Inspected { cell, record } => (describe_record(*cell, record.as_ref()), false),
    }
}

fn describe_record(cell: CellCoord, record: Option<&EntityRecord>) -> String {
    match record {
        Some(record) => {
            let StructureId(id) = record.id;
            format!(
                "{} #{id} {}x{} at {}",
                record.kind, record.footprint.width, record.footprint.height, record.origin
            )
        }
        None => format!("nothing recorded at {cell}"),
    }
}
