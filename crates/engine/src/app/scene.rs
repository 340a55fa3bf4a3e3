use tracing::info;

use crate::world::FarmWorld;

use super::InputSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

/// One row of HUD text. `emphasis` rows are drawn in the alert color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HudLine {
    pub text: String,
    pub emphasis: bool,
}

impl HudLine {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasis: false,
        }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasis: true,
        }
    }
}

/// Game-side behavior driven by the loop. The world is owned by the loop and
/// lent to the scene for each call.
pub trait Scene {
    fn load(&mut self, world: &mut FarmWorld);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut FarmWorld,
    ) -> SceneCommand;
    fn unload(&mut self, _world: &mut FarmWorld) {}
    fn hud_lines(&self, _world: &FarmWorld) -> Vec<HudLine> {
        Vec::new()
    }
    fn debug_title(&self, _world: &FarmWorld) -> Option<String> {
        None
    }
}

pub(crate) struct SceneRuntime {
    scene: Box<dyn Scene>,
    world: FarmWorld,
    is_loaded: bool,
}

impl SceneRuntime {
    pub(crate) fn new(scene: Box<dyn Scene>, world: FarmWorld) -> Self {
        Self {
            scene,
            world,
            is_loaded: false,
        }
    }

    pub(crate) fn world(&self) -> &FarmWorld {
        &self.world
    }

    pub(crate) fn world_mut(&mut self) -> &mut FarmWorld {
        &mut self.world
    }

    pub(crate) fn load(&mut self) {
        if self.is_loaded {
            return;
        }
        self.scene.load(&mut self.world);
        self.is_loaded = true;
        info!(
            structures = self.world.registry().len(),
            occupied_cells = self.world.grid().occupied_count(),
            "scene_loaded"
        );
    }

    pub(crate) fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand {
        if !self.is_loaded {
            return SceneCommand::None;
        }
        self.scene.update(fixed_dt_seconds, input, &mut self.world)
    }

    pub(crate) fn hud_lines(&self) -> Vec<HudLine> {
        self.scene.hud_lines(&self.world)
    }

    pub(crate) fn debug_title(&self) -> Option<String> {
        self.scene.debug_title(&self.world)
    }

    pub(crate) fn shutdown(&mut self) {
        if self.is_loaded {
            self.scene.unload(&mut self.world);
            self.is_loaded = false;
        }
    }
}
