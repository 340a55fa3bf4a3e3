use std::path::PathBuf;
use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::app::HudLine;
use crate::content::{ElementBehavior, ElementDef};
use crate::world::{CellCoord, FarmWorld, GroundKind, OccupantVisual, Vec2};

use super::canvas::{Canvas, ScreenRect};
use super::hud::draw_hud;
use super::sprites::{draw_sprite_stretched, SpriteCache};

const CLEAR_COLOR: [u8; 4] = [20, 22, 28, 255];
const AVATAR_FALLBACK_COLOR: [u8; 4] = [236, 200, 150, 255];
const AVATAR_OUTLINE_COLOR: [u8; 4] = [60, 40, 30, 255];
const OCCUPANT_INSET_DIVISOR: i32 = 6;

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    width: u32,
    height: u32,
    sprites: SpriteCache,
}

impl Renderer {
    pub fn new(window: Arc<Window>, sprite_dir: PathBuf) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            width: size.width,
            height: size.height,
            sprites: SpriteCache::new(sprite_dir),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub(crate) fn render(&mut self, world: &FarmWorld, hud: Option<&[HudLine]>) -> Result<(), Error> {
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }
        let mut canvas = Canvas::new(self.pixels.frame_mut(), self.width, self.height);
        draw_world(&mut canvas, world, &mut self.sprites);
        if let Some(lines) = hud {
            draw_hud(&mut canvas, lines);
        }
        self.pixels.render()
    }
}

/// Ground, then occupants, then the avatar. Only cells touching the viewport
/// are visited.
pub(crate) fn draw_world(canvas: &mut Canvas<'_>, world: &FarmWorld, sprites: &mut SpriteCache) {
    canvas.clear(CLEAR_COLOR);
    let camera = world.camera();
    let grid = world.grid();
    let cell_size = camera.cell_size_px();
    let (rows, cols) = camera.visible_cells(grid);

    for row in rows {
        for col in cols.clone() {
            let coord = CellCoord { row, col };
            let Some(cell) = grid.cell(coord) else {
                continue;
            };
            let rect = cell_rect(world, coord, cell_size);
            let ground = cell.ground();
            draw_keyed(canvas, sprites, ground.sprite_key(), rect, ground_color(ground));

            let Some(occupant) = cell.occupant() else {
                continue;
            };
            let Some(def) = world.catalog().get(occupant.element) else {
                continue;
            };
            let key = def.sprite_for(occupant.visual);
            if let Some(sprite) = sprites.get(key) {
                draw_sprite_stretched(canvas, sprite, rect, false);
            } else {
                let inset = rect.inset(rect.width / OCCUPANT_INSET_DIVISOR);
                canvas.fill_rect(inset, occupant_color(def, occupant.visual));
            }
        }
    }

    draw_avatar(canvas, world, sprites);
}

fn draw_avatar(canvas: &mut Canvas<'_>, world: &FarmWorld, sprites: &mut SpriteCache) {
    let camera = world.camera();
    let avatar = world.avatar();
    let size = avatar.size_px();
    let top_left = camera.world_to_screen(avatar.position());
    let bottom_right = camera.world_to_screen(Vec2 {
        x: avatar.position().x + size,
        y: avatar.position().y + size,
    });
    let rect = snapped_rect(top_left, bottom_right);
    let key = avatar.sprite_key();
    match sprites.get(&key) {
        Some(sprite) => draw_sprite_stretched(canvas, sprite, rect, avatar.is_mirrored()),
        None => {
            canvas.fill_rect(rect, AVATAR_FALLBACK_COLOR);
            canvas.outline_rect(rect, AVATAR_OUTLINE_COLOR);
        }
    }
}

fn draw_keyed(
    canvas: &mut Canvas<'_>,
    sprites: &mut SpriteCache,
    key: &str,
    rect: ScreenRect,
    fallback: [u8; 4],
) {
    match sprites.get(key) {
        Some(sprite) => draw_sprite_stretched(canvas, sprite, rect, false),
        None => canvas.fill_rect(rect, fallback),
    }
}

/// Screen rect of a cell. Edges are floored per edge so neighbors share a
/// border with no gap at fractional zoom.
fn cell_rect(world: &FarmWorld, coord: CellCoord, cell_size: f32) -> ScreenRect {
    let camera = world.camera();
    let top_left = camera.world_to_screen(Vec2 {
        x: coord.col as f32 * cell_size,
        y: coord.row as f32 * cell_size,
    });
    let bottom_right = camera.world_to_screen(Vec2 {
        x: (coord.col + 1) as f32 * cell_size,
        y: (coord.row + 1) as f32 * cell_size,
    });
    snapped_rect(top_left, bottom_right)
}

fn snapped_rect(top_left: Vec2, bottom_right: Vec2) -> ScreenRect {
    let x = top_left.x.floor() as i32;
    let y = top_left.y.floor() as i32;
    ScreenRect {
        x,
        y,
        width: bottom_right.x.floor() as i32 - x,
        height: bottom_right.y.floor() as i32 - y,
    }
}

fn ground_color(ground: GroundKind) -> [u8; 4] {
    match ground {
        GroundKind::Plain => [86, 140, 64, 255],
        GroundKind::PlainVariant1 => [80, 132, 60, 255],
        GroundKind::PlainVariant2 => [92, 146, 70, 255],
        GroundKind::PlainVariant3 => [76, 126, 58, 255],
        GroundKind::Corner => [46, 70, 40, 255],
        GroundKind::Side => [54, 82, 46, 255],
        GroundKind::FarmPlowed => [112, 83, 58, 255],
        GroundKind::PathDirt => [160, 130, 90, 255],
        GroundKind::PathStone => [140, 140, 146, 255],
    }
}

fn occupant_color(def: &ElementDef, visual: OccupantVisual) -> [u8; 4] {
    match (visual, &def.behavior) {
        (OccupantVisual::Stage(stage), _) => {
            let final_stage = def.growth.as_ref().map_or(1, |growth| growth.final_stage().max(1));
            let ripeness = u32::from(stage.min(final_stage)) * 255 / u32::from(final_stage);
            [60 + (ripeness * 180 / 255) as u8, 170, 50, 255]
        }
        (OccupantVisual::Piece(_), _) => [120, 88, 52, 255],
        (_, ElementBehavior::Pattern(_)) => [222, 170, 180, 255],
        (_, ElementBehavior::Scatter(_)) => [34, 92, 40, 255],
        _ if def.natural_spawn_chance.is_some() => [230, 220, 90, 255],
        _ => [176, 96, 72, 255],
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::world::test_support::{plain_world, test_config};
    use crate::world::PlacementRequest;

    fn render_to_buffer(world: &FarmWorld) -> Vec<u8> {
        let temp = TempDir::new().expect("temp");
        let mut sprites = SpriteCache::new(temp.path().to_path_buf());
        let mut frame = vec![0u8; 352 * 352 * 4];
        let mut canvas = Canvas::new(&mut frame, 352, 352);
        draw_world(&mut canvas, world, &mut sprites);
        frame
    }

    fn pixel_at(frame: &[u8], x: usize, y: usize) -> [u8; 4] {
        let offset = (y * 352 + x) * 4;
        [frame[offset], frame[offset + 1], frame[offset + 2], frame[offset + 3]]
    }

    #[test]
    fn fallback_frame_shows_ground_and_centered_avatar() {
        let world = plain_world(test_config());
        let frame = render_to_buffer(&world);
        assert_eq!(pixel_at(&frame, 176, 176), AVATAR_FALLBACK_COLOR);
        assert_eq!(pixel_at(&frame, 5, 5), ground_color(GroundKind::Plain));
    }

    #[test]
    fn placed_structure_is_drawn_in_its_cell() {
        let mut world = plain_world(test_config());
        let house = world.catalog().id_by_name("house").expect("house");
        let cell = CellCoord { row: 8, col: 12 };
        world
            .place_free(&PlacementRequest::new(house, cell))
            .expect("placed");

        let def = world.catalog().get(house).expect("def").clone();
        let rect = cell_rect(&world, cell, world.camera().cell_size_px());
        assert_eq!((rect.x, rect.y, rect.width), (80, 112, 32));
        let frame = render_to_buffer(&world);
        assert_eq!(
            pixel_at(&frame, 96, 128),
            occupant_color(&def, OccupantVisual::Primary)
        );
        assert_eq!(pixel_at(&frame, 81, 113), ground_color(GroundKind::Plain));
    }

    #[test]
    fn adjacent_cells_share_edges() {
        let world = plain_world(test_config());
        let size = world.camera().cell_size_px();
        let left = cell_rect(&world, CellCoord { row: 4, col: 9 }, size);
        let right = cell_rect(&world, CellCoord { row: 4, col: 10 }, size);
        assert_eq!(left.x + left.width, right.x);
    }

    #[test]
    fn crop_color_ripens_with_stage() {
        let world = plain_world(test_config());
        let crop = world
            .catalog()
            .defs()
            .iter()
            .find(|def| def.is_crop())
            .expect("crop")
            .clone();
        let young = occupant_color(&crop, OccupantVisual::Stage(0));
        let final_stage = crop.growth.as_ref().expect("growth").final_stage();
        let ripe = occupant_color(&crop, OccupantVisual::Stage(final_stage));
        assert!(ripe[0] > young[0]);
    }
}
