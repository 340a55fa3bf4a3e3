use std::f32::consts::FRAC_1_SQRT_2;
use std::time::Duration;

use super::grid::{CellCoord, Grid};
use super::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvatarConfig {
    pub speed_px_per_tick: f32,
    pub size_px: f32,
    pub frame_count: u8,
    pub frame_duration: Duration,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            speed_px_per_tick: 3.0,
            size_px: 32.0,
            frame_count: 6,
            frame_duration: Duration::from_millis(90),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Up,
    Down,
    Left,
    Right,
}

/// Held movement keys for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveIntent {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl MoveIntent {
    pub fn direction(self) -> (f32, f32) {
        let axis = |negative: bool, positive: bool| match (negative, positive) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        (axis(self.left, self.right), axis(self.up, self.down))
    }
}

/// Player-controlled walker with a position in world pixels (top-left of its
/// sprite box).
#[derive(Debug, Clone)]
pub struct AvatarController {
    config: AvatarConfig,
    world_extent: Vec2,
    position: Vec2,
    facing: Facing,
    moving: bool,
    frame: u8,
    frame_elapsed: Duration,
}

impl AvatarController {
    /// Spawns at the middle of the map.
    pub fn new(config: AvatarConfig, world_extent: Vec2) -> Self {
        let position = Vec2 {
            x: (world_extent.x / 2.0 - config.size_px / 2.0).floor(),
            y: (world_extent.y / 2.0 - config.size_px / 2.0).floor(),
        };
        let mut avatar = Self {
            config,
            world_extent,
            position,
            facing: Facing::Down,
            moving: false,
            frame: 0,
            frame_elapsed: Duration::ZERO,
        };
        avatar.position = avatar.clamped(position);
        avatar
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn center(&self) -> Vec2 {
        Vec2 {
            x: self.position.x + self.config.size_px / 2.0,
            y: self.position.y + self.config.size_px / 2.0,
        }
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn frame(&self) -> u8 {
        self.frame
    }

    pub fn size_px(&self) -> f32 {
        self.config.size_px
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = self.clamped(position);
    }

    fn clamped(&self, position: Vec2) -> Vec2 {
        let max_x = (self.world_extent.x - self.config.size_px).max(0.0);
        let max_y = (self.world_extent.y - self.config.size_px).max(0.0);
        Vec2 {
            x: position.x.clamp(0.0, max_x),
            y: position.y.clamp(0.0, max_y),
        }
    }

    /// Applies one movement tick. Returns whether the position changed.
    pub fn tick(&mut self, intent: MoveIntent, dt: Duration) -> bool {
        let (dx, dy) = intent.direction();
        if dx == 0.0 && dy == 0.0 {
            self.moving = false;
            self.frame = 0;
            self.frame_elapsed = Duration::ZERO;
            return false;
        }

        let scale = if dx != 0.0 && dy != 0.0 {
            FRAC_1_SQRT_2
        } else {
            1.0
        };
        let step = self.config.speed_px_per_tick * scale;
        let before = self.position;
        self.position = self.clamped(Vec2 {
            x: before.x + dx * step,
            y: before.y + dy * step,
        });

        self.facing = if dx < 0.0 {
            Facing::Left
        } else if dx > 0.0 {
            Facing::Right
        } else if dy < 0.0 {
            Facing::Up
        } else {
            Facing::Down
        };
        self.moving = true;
        self.advance_frame(dt);
        self.position != before
    }

    fn advance_frame(&mut self, dt: Duration) {
        if self.config.frame_duration.is_zero() || self.config.frame_count == 0 {
            return;
        }
        self.frame_elapsed += dt;
        while self.frame_elapsed >= self.config.frame_duration {
            self.frame_elapsed -= self.config.frame_duration;
            self.frame = (self.frame + 1) % self.config.frame_count;
        }
    }

    pub fn cell(&self, grid: &Grid, cell_size_px: f32) -> Option<CellCoord> {
        if cell_size_px <= 0.0 {
            return None;
        }
        let center = self.center();
        grid.coord(
            (center.y / cell_size_px).floor() as i64,
            (center.x / cell_size_px).floor() as i64,
        )
    }

    /// Left-facing frames reuse the right-facing art, mirrored.
    pub fn sprite_key(&self) -> String {
        let direction = match self.facing {
            Facing::Up => "up",
            Facing::Down => "down",
            Facing::Left | Facing::Right => "side",
        };
        let state = if self.moving { "walk" } else { "idle" };
        format!("avatar/{state}_{direction}_{}", self.frame)
    }

    pub fn is_mirrored(&self) -> bool {
        self.facing == Facing::Left
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::grid::GroundKind;

    const TICK: Duration = Duration::from_millis(16);

    fn extent() -> Vec2 {
        Vec2 {
            x: 100.0 * 32.0,
            y: 50.0 * 32.0,
        }
    }

    fn held(up: bool, down: bool, left: bool, right: bool) -> MoveIntent {
        MoveIntent {
            up,
            down,
            left,
            right,
        }
    }

    #[test]
    fn spawns_centered() {
        let avatar = AvatarController::new(AvatarConfig::default(), extent());
        assert_eq!(avatar.position(), Vec2 { x: 1584.0, y: 784.0 });
        assert_eq!(avatar.center(), Vec2 { x: 1600.0, y: 800.0 });
    }

    #[test]
    fn straight_move_uses_full_speed() {
        let mut avatar = AvatarController::new(AvatarConfig::default(), extent());
        assert!(avatar.tick(held(false, false, false, true), TICK));
        assert_eq!(avatar.position(), Vec2 { x: 1587.0, y: 784.0 });
        assert_eq!(avatar.facing(), Facing::Right);
    }

    #[test]
    fn diagonal_move_is_normalized() {
        let mut avatar = AvatarController::new(AvatarConfig::default(), extent());
        let start = avatar.position();
        avatar.tick(held(true, false, true, false), TICK);

        let moved = avatar.position();
        let dx = start.x - moved.x;
        let dy = start.y - moved.y;
        assert!((dx - 3.0 * FRAC_1_SQRT_2).abs() < 1e-3);
        assert!((dy - 3.0 * FRAC_1_SQRT_2).abs() < 1e-3);
        assert!(avatar.is_mirrored());
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut avatar = AvatarController::new(AvatarConfig::default(), extent());
        assert!(!avatar.tick(held(true, true, true, true), TICK));
        assert!(!avatar.is_moving());
    }

    #[test]
    fn position_stays_inside_world() {
        let mut avatar = AvatarController::new(AvatarConfig::default(), extent());
        avatar.set_position(Vec2 { x: 1.0, y: 1.0 });
        avatar.tick(held(true, false, true, false), TICK);
        assert_eq!(avatar.position(), Vec2 { x: 0.0, y: 0.0 });

        avatar.set_position(Vec2 {
            x: 1.0e6,
            y: 1.0e6,
        });
        assert_eq!(avatar.position(), Vec2 { x: 3168.0, y: 1568.0 });
        assert!(!avatar.tick(held(false, true, false, true), TICK));
    }

    #[test]
    fn walk_cycle_advances_and_idle_resets() {
        let mut avatar = AvatarController::new(AvatarConfig::default(), extent());
        let right = held(false, false, false, true);

        for _ in 0..6 {
            avatar.tick(right, TICK);
        }
        assert_eq!(avatar.frame(), 1);
        assert_eq!(avatar.sprite_key(), "avatar/walk_side_1");

        for _ in 0..34 {
            avatar.tick(right, TICK);
        }
        assert!(avatar.frame() < 6);

        avatar.tick(MoveIntent::default(), TICK);
        assert_eq!(avatar.frame(), 0);
        assert_eq!(avatar.sprite_key(), "avatar/idle_side_0");
    }

    #[test]
    fn cell_is_taken_from_center() {
        let grid = Grid::new(50, 100, |_| GroundKind::Plain).expect("grid");
        let avatar = AvatarController::new(AvatarConfig::default(), extent());
        assert_eq!(avatar.cell(&grid, 32.0), Some(CellCoord::new(25, 50)));
    }
}
