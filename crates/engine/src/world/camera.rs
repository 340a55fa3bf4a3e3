use super::grid::{CellCoord, Grid};
use super::Vec2;

pub const MIN_TILES_IN_VIEW: u32 = 3;
pub const MAX_TILES_IN_VIEW: u32 = 41;
pub const TILES_PER_ZOOM_STEP: u32 = 2;
const MIN_PAN_STEP_PX: f32 = 32.0;
const PAN_STEP_VIEWPORT_FRACTION: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// How many cells should fit across and down the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSpan {
    pub x: u32,
    pub y: u32,
}

impl TileSpan {
    pub fn new(x: u32, y: u32) -> Self {
        Self {
            x: x.clamp(MIN_TILES_IN_VIEW, MAX_TILES_IN_VIEW),
            y: y.clamp(MIN_TILES_IN_VIEW, MAX_TILES_IN_VIEW),
        }
    }
}

/// Scroll and zoom over the world, optionally locked onto a follow target.
///
/// Scroll is measured in scaled pixels: the screen pixel at `(0, 0)` shows
/// world point `scroll / zoom`.
#[derive(Debug, Clone)]
pub struct CameraController {
    viewport: Viewport,
    world_extent: Vec2,
    cell_size_px: f32,
    tiles_in_view: TileSpan,
    zoom: f32,
    scroll: Vec2,
    follow_enabled: bool,
    last_target: Option<Vec2>,
    drag_anchor: Option<Vec2>,
}

impl CameraController {
    /// Starts zoomed to `tiles_in_view`, centered on the world, following.
    pub fn new(
        viewport: Viewport,
        world_extent: Vec2,
        cell_size_px: f32,
        tiles_in_view: TileSpan,
    ) -> Self {
        let mut camera = Self {
            viewport,
            world_extent,
            cell_size_px,
            tiles_in_view,
            zoom: 1.0,
            scroll: Vec2::default(),
            follow_enabled: true,
            last_target: None,
            drag_anchor: None,
        };
        camera.set_zoom_for_tile_count(tiles_in_view);
        let max = camera.max_scroll();
        camera.scroll = Vec2 {
            x: (max.x / 2.0).floor(),
            y: (max.y / 2.0).floor(),
        };
        camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn scroll(&self) -> Vec2 {
        self.scroll
    }

    pub fn tiles_in_view(&self) -> TileSpan {
        self.tiles_in_view
    }

    pub fn cell_size_px(&self) -> f32 {
        self.cell_size_px
    }

    pub fn follow_enabled(&self) -> bool {
        self.follow_enabled
    }

    pub fn last_target(&self) -> Option<Vec2> {
        self.last_target
    }

    /// Picks the largest zoom at which `tiles` cells fit on both axes. An
    /// empty viewport keeps the previous zoom.
    pub fn set_zoom_for_tile_count(&mut self, tiles: TileSpan) {
        self.tiles_in_view = TileSpan::new(tiles.x, tiles.y);
        if !self.viewport.is_empty() && self.cell_size_px > 0.0 {
            let zoom_x = self.viewport.width as f32 / (self.tiles_in_view.x as f32 * self.cell_size_px);
            let zoom_y =
                self.viewport.height as f32 / (self.tiles_in_view.y as f32 * self.cell_size_px);
            self.zoom = zoom_x.min(zoom_y);
        }
        self.reapply();
    }

    /// Positive steps zoom in (fewer tiles), negative zoom out.
    pub fn adjust_tile_count(&mut self, steps: i32) {
        let delta = i64::from(steps) * i64::from(TILES_PER_ZOOM_STEP);
        let shift = |tiles: u32| {
            (i64::from(tiles) - delta).clamp(
                i64::from(MIN_TILES_IN_VIEW),
                i64::from(MAX_TILES_IN_VIEW),
            ) as u32
        };
        let next = TileSpan::new(shift(self.tiles_in_view.x), shift(self.tiles_in_view.y));
        self.set_zoom_for_tile_count(next);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.set_zoom_for_tile_count(self.tiles_in_view);
    }

    fn reapply(&mut self) {
        match self.last_target {
            Some(target) if self.follow_enabled => {
                self.follow_camera(target);
            }
            _ => self.clamp_scroll(),
        }
    }

    /// Largest scroll that still keeps the world under the whole viewport;
    /// zero on an axis where the world is smaller than the viewport.
    pub fn max_scroll(&self) -> Vec2 {
        Vec2 {
            x: (self.world_extent.x * self.zoom - self.viewport.width as f32)
                .floor()
                .max(0.0),
            y: (self.world_extent.y * self.zoom - self.viewport.height as f32)
                .floor()
                .max(0.0),
        }
    }

    fn clamp_scroll(&mut self) {
        let max = self.max_scroll();
        self.scroll.x = self.scroll.x.clamp(0.0, max.x);
        self.scroll.y = self.scroll.y.clamp(0.0, max.y);
    }

    /// Centers `target` (world pixels) on screen, clamped to the world. The
    /// result depends only on the target, viewport, zoom and extent.
    pub fn follow_camera(&mut self, target: Vec2) -> Vec2 {
        let max = self.max_scroll();
        self.scroll = Vec2 {
            x: follow_axis(target.x, self.viewport.width as f32, self.zoom, max.x),
            y: follow_axis(target.y, self.viewport.height as f32, self.zoom, max.y),
        };
        self.last_target = Some(target);
        self.scroll
    }

    pub fn set_follow_enabled(&mut self, enabled: bool) {
        self.follow_enabled = enabled;
        if enabled {
            self.drag_anchor = None;
            if let Some(target) = self.last_target {
                self.follow_camera(target);
            }
        }
    }

    pub fn toggle_follow(&mut self) -> bool {
        self.set_follow_enabled(!self.follow_enabled);
        self.follow_enabled
    }

    pub fn pan_step(&self) -> f32 {
        let short_side = self.viewport.width.min(self.viewport.height) as f32;
        (short_side * PAN_STEP_VIEWPORT_FRACTION)
            .floor()
            .max(MIN_PAN_STEP_PX)
    }

    /// Moves the scroll by a screen-pixel delta. Ignored while following.
    pub fn pan_by(&mut self, delta: Vec2) -> bool {
        if self.follow_enabled {
            return false;
        }
        self.scroll.x += delta.x;
        self.scroll.y += delta.y;
        self.clamp_scroll();
        true
    }

    /// Keyboard pan: each axis moves by whole pan steps.
    pub fn pan_steps(&mut self, steps_x: i32, steps_y: i32) -> bool {
        let step = self.pan_step();
        self.pan_by(Vec2 {
            x: steps_x as f32 * step,
            y: steps_y as f32 * step,
        })
    }

    pub fn begin_drag(&mut self, screen: Vec2) -> bool {
        if self.follow_enabled {
            return false;
        }
        self.drag_anchor = Some(screen);
        true
    }

    /// Dragging moves the world with the pointer.
    pub fn drag_to(&mut self, screen: Vec2) -> bool {
        let Some(anchor) = self.drag_anchor else {
            return false;
        };
        let moved = self.pan_by(Vec2 {
            x: anchor.x - screen.x,
            y: anchor.y - screen.y,
        });
        if moved {
            self.drag_anchor = Some(screen);
        }
        moved
    }

    pub fn end_drag(&mut self) {
        self.drag_anchor = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        Vec2 {
            x: (screen.x + self.scroll.x) / self.zoom,
            y: (screen.y + self.scroll.y) / self.zoom,
        }
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        Vec2 {
            x: world.x * self.zoom - self.scroll.x,
            y: world.y * self.zoom - self.scroll.y,
        }
    }

    pub fn screen_to_cell(&self, screen: Vec2, grid: &Grid) -> Option<CellCoord> {
        if self.cell_size_px <= 0.0 {
            return None;
        }
        let world = self.screen_to_world(screen);
        let col = (world.x / self.cell_size_px).floor();
        let row = (world.y / self.cell_size_px).floor();
        if !col.is_finite() || !row.is_finite() {
            return None;
        }
        grid.coord(row as i64, col as i64)
    }

    /// Half-open row and column ranges of cells touching the viewport.
    pub fn visible_cells(&self, grid: &Grid) -> (std::ops::Range<u32>, std::ops::Range<u32>) {
        let top_left = self.screen_to_world(Vec2::default());
        let bottom_right = self.screen_to_world(Vec2 {
            x: self.viewport.width as f32,
            y: self.viewport.height as f32,
        });
        let to_index = |value: f32, limit: u32| {
            ((value / self.cell_size_px).floor().max(0.0) as u32).min(limit)
        };
        let rows = to_index(top_left.y, grid.rows())
            ..to_index(bottom_right.y + self.cell_size_px, grid.rows());
        let cols = to_index(top_left.x, grid.cols())
            ..to_index(bottom_right.x + self.cell_size_px, grid.cols());
        (rows, cols)
    }
}

fn follow_axis(target: f32, viewport: f32, zoom: f32, max_scroll: f32) -> f32 {
    let target_left = (target - (viewport / zoom) / 2.0).floor();
    (target_left * zoom).floor().clamp(0.0, max_scroll)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::grid::GroundKind;

    const CELL: f32 = 32.0;

    fn extent() -> Vec2 {
        Vec2 {
            x: 100.0 * CELL,
            y: 50.0 * CELL,
        }
    }

    fn camera() -> CameraController {
        CameraController::new(
            Viewport::new(352, 352),
            extent(),
            CELL,
            TileSpan::new(11, 11),
        )
    }

    #[test]
    fn zoom_fits_requested_tiles() {
        let mut camera = camera();
        assert_eq!(camera.zoom(), 1.0);

        camera.set_viewport(Viewport::new(704, 352));
        assert_eq!(camera.zoom(), 1.0);

        camera.set_viewport(Viewport::new(704, 704));
        assert_eq!(camera.zoom(), 2.0);
    }

    #[test]
    fn starts_centered_on_world() {
        let camera = camera();
        assert_eq!(camera.scroll(), Vec2 { x: 1424.0, y: 624.0 });
    }

    #[test]
    fn follow_centers_target() {
        let mut camera = camera();
        let scroll = camera.follow_camera(Vec2 { x: 1600.0, y: 800.0 });
        assert_eq!(scroll, Vec2 { x: 1424.0, y: 624.0 });
        assert_eq!(camera.last_target(), Some(Vec2 { x: 1600.0, y: 800.0 }));
    }

    #[test]
    fn follow_clamps_at_world_edges() {
        let mut camera = camera();
        assert_eq!(
            camera.follow_camera(Vec2 { x: 10.0, y: 10.0 }),
            Vec2 { x: 0.0, y: 0.0 }
        );
        assert_eq!(
            camera.follow_camera(Vec2 { x: 3190.0, y: 1590.0 }),
            Vec2 { x: 2848.0, y: 1248.0 }
        );
    }

    #[test]
    fn follow_is_idempotent() {
        let mut camera = camera();
        let target = Vec2 { x: 917.5, y: 333.25 };
        let first = camera.follow_camera(target);
        let second = camera.follow_camera(target);
        assert_eq!(first, second);
    }

    #[test]
    fn world_smaller_than_viewport_pins_scroll_to_zero() {
        let mut camera = CameraController::new(
            Viewport::new(800, 600),
            Vec2 { x: 2.0 * CELL, y: 2.0 * CELL },
            CELL,
            TileSpan::new(3, 3),
        );
        assert_eq!(camera.max_scroll(), Vec2 { x: 0.0, y: 0.0 });
        let scroll = camera.follow_camera(Vec2 { x: 80.0, y: 80.0 });
        assert_eq!(scroll, Vec2 { x: 0.0, y: 0.0 });
    }

    #[test]
    fn manual_pan_is_ignored_while_following() {
        let mut camera = camera();
        let before = camera.scroll();
        assert!(!camera.pan_steps(1, 0));
        assert!(!camera.begin_drag(Vec2 { x: 5.0, y: 5.0 }));
        assert_eq!(camera.scroll(), before);
    }

    #[test]
    fn manual_pan_moves_and_clamps() {
        let mut camera = camera();
        camera.set_follow_enabled(false);
        let before = camera.scroll();

        assert_eq!(camera.pan_step(), 35.0);
        assert!(camera.pan_steps(1, -1));
        assert_eq!(
            camera.scroll(),
            Vec2 {
                x: before.x + 35.0,
                y: before.y - 35.0
            }
        );

        camera.pan_by(Vec2 { x: -1.0e6, y: 1.0e6 });
        assert_eq!(camera.scroll(), Vec2 { x: 0.0, y: 1248.0 });
    }

    #[test]
    fn pan_step_has_a_floor() {
        let mut camera = camera();
        camera.set_viewport(Viewport::new(100, 100));
        assert_eq!(camera.pan_step(), 32.0);
    }

    #[test]
    fn drag_moves_world_with_pointer() {
        let mut camera = camera();
        camera.set_follow_enabled(false);
        let before = camera.scroll();

        assert!(camera.begin_drag(Vec2 { x: 100.0, y: 100.0 }));
        assert!(camera.drag_to(Vec2 { x: 80.0, y: 110.0 }));
        camera.end_drag();

        assert_eq!(
            camera.scroll(),
            Vec2 {
                x: before.x + 20.0,
                y: before.y - 10.0
            }
        );
        assert!(!camera.drag_to(Vec2 { x: 0.0, y: 0.0 }));
    }

    #[test]
    fn enabling_follow_snaps_back_to_target() {
        let mut camera = camera();
        let target = Vec2 { x: 1600.0, y: 800.0 };
        let followed = camera.follow_camera(target);

        camera.set_follow_enabled(false);
        camera.pan_by(Vec2 { x: 300.0, y: 0.0 });
        assert_ne!(camera.scroll(), followed);

        assert!(camera.toggle_follow());
        assert_eq!(camera.scroll(), followed);
    }

    #[test]
    fn zoom_steps_change_tile_count_within_limits() {
        let mut camera = camera();
        camera.adjust_tile_count(1);
        assert_eq!(camera.tiles_in_view(), TileSpan::new(9, 9));

        camera.adjust_tile_count(100);
        assert_eq!(camera.tiles_in_view(), TileSpan::new(3, 3));

        camera.adjust_tile_count(-100);
        assert_eq!(camera.tiles_in_view(), TileSpan::new(41, 41));
    }

    #[test]
    fn rezoom_keeps_follow_target_centered() {
        let target = Vec2 { x: 1600.0, y: 800.0 };
        for steps in [1, -2] {
            let mut camera = camera();
            let before = camera.follow_camera(target);
            camera.adjust_tile_count(steps);

            let mut fresh = self::camera();
            fresh.set_zoom_for_tile_count(camera.tiles_in_view());
            let expected = fresh.follow_camera(target);

            assert_eq!(camera.scroll(), expected, "steps {steps}");
            assert_ne!(camera.scroll(), before, "steps {steps}");
            assert_ne!(camera.scroll(), Vec2::default(), "steps {steps}");
            assert_eq!(camera.last_target(), Some(target));
        }
    }

    #[test]
    fn rezoom_only_clamps_a_free_camera() {
        let mut camera = camera();
        camera.follow_camera(Vec2 { x: 1600.0, y: 800.0 });
        camera.set_follow_enabled(false);
        camera.pan_by(Vec2 { x: 300.0, y: 0.0 });
        let panned = camera.scroll();

        camera.adjust_tile_count(-1);
        assert_eq!(camera.scroll(), panned);

        camera.pan_by(Vec2 { x: 1.0e6, y: 1.0e6 });
        let edge = camera.scroll();
        camera.adjust_tile_count(-3);
        assert_eq!(camera.scroll(), camera.max_scroll());
        assert!(camera.scroll().x < edge.x);
        assert!(!camera.follow_enabled());
    }

    #[test]
    fn screen_and_world_points_round_trip() {
        let mut camera = camera();
        camera.set_viewport(Viewport::new(704, 704));
        let world = Vec2 { x: 640.0, y: 320.0 };
        let screen = camera.world_to_screen(world);
        assert_eq!(camera.screen_to_world(screen), world);
    }

    #[test]
    fn screen_to_cell_uses_scroll_and_zoom() {
        let grid = Grid::new(50, 100, |_| GroundKind::Plain).expect("grid");
        let mut camera = camera();
        camera.follow_camera(Vec2 { x: 10.0, y: 10.0 });

        assert_eq!(
            camera.screen_to_cell(Vec2 { x: 70.0, y: 33.0 }, &grid),
            Some(CellCoord::new(1, 2))
        );

        camera.set_follow_enabled(false);
        camera.pan_by(Vec2 { x: 64.0, y: 0.0 });
        assert_eq!(
            camera.screen_to_cell(Vec2 { x: 70.0, y: 33.0 }, &grid),
            Some(CellCoord::new(1, 4))
        );
        assert_eq!(
            camera.screen_to_cell(Vec2 { x: -500.0, y: 0.0 }, &grid),
            None
        );
    }

    #[test]
    fn visible_cells_cover_viewport() {
        let grid = Grid::new(50, 100, |_| GroundKind::Plain).expect("grid");
        let mut camera = camera();
        camera.follow_camera(Vec2 { x: 0.0, y: 0.0 });

        let (rows, cols) = camera.visible_cells(&grid);
        assert_eq!(rows, 0..12);
        assert_eq!(cols, 0..12);
    }
}
