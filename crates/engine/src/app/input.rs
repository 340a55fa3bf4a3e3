use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::world::{MoveIntent, Vec2};

/// Held-key actions. One-shot keys are tracked as press edges instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    PanUp,
    PanDown,
    PanLeft,
    PanRight,
    RemoveModifier,
    Quit,
}

const ACTION_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::PanUp => 4,
            InputAction::PanDown => 5,
            InputAction::PanLeft => 6,
            InputAction::PanRight => 7,
            InputAction::RemoveModifier => 8,
            InputAction::Quit => 9,
        }
    }
}

/// Input as seen by one fixed simulation tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    actions: ActionStates,
    cursor_position_px: Option<Vec2>,
    left_click_pressed: bool,
    right_button_down: bool,
    right_click_pressed: bool,
    toggle_follow_pressed: bool,
    cycle_area_pressed: bool,
    next_page_pressed: bool,
    save_pressed: bool,
    load_pressed: bool,
    zoom_delta_steps: i32,
    slot_pressed: Option<u8>,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn move_intent(&self) -> MoveIntent {
        MoveIntent {
            up: self.is_down(InputAction::MoveUp),
            down: self.is_down(InputAction::MoveDown),
            left: self.is_down(InputAction::MoveLeft),
            right: self.is_down(InputAction::MoveRight),
        }
    }

    /// Pan steps requested by the held pan keys, as `(x, y)`.
    pub fn pan_steps(&self) -> (i32, i32) {
        let axis = |negative: InputAction, positive: InputAction| {
            i32::from(self.is_down(positive)) - i32::from(self.is_down(negative))
        };
        (
            axis(InputAction::PanLeft, InputAction::PanRight),
            axis(InputAction::PanUp, InputAction::PanDown),
        )
    }

    pub fn cursor_position_px(&self) -> Option<Vec2> {
        self.cursor_position_px
    }

    pub fn left_click_pressed(&self) -> bool {
        self.left_click_pressed
    }

    pub fn right_button_down(&self) -> bool {
        self.right_button_down
    }

    pub fn right_click_pressed(&self) -> bool {
        self.right_click_pressed
    }

    pub fn toggle_follow_pressed(&self) -> bool {
        self.toggle_follow_pressed
    }

    pub fn cycle_area_pressed(&self) -> bool {
        self.cycle_area_pressed
    }

    pub fn next_page_pressed(&self) -> bool {
        self.next_page_pressed
    }

    pub fn save_pressed(&self) -> bool {
        self.save_pressed
    }

    pub fn load_pressed(&self) -> bool {
        self.load_pressed
    }

    pub fn zoom_delta_steps(&self) -> i32 {
        self.zoom_delta_steps
    }

    /// Zero-based palette slot from the number row (`1` is slot 0, `0` is slot 9).
    pub fn slot_pressed(&self) -> Option<u8> {
        self.slot_pressed
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_cursor_position_px(mut self, cursor_position_px: Option<Vec2>) -> Self {
        self.cursor_position_px = cursor_position_px;
        self
    }

    pub fn with_left_click_pressed(mut self, pressed: bool) -> Self {
        self.left_click_pressed = pressed;
        self
    }

    pub fn with_right_button(mut self, down: bool, pressed: bool) -> Self {
        self.right_button_down = down;
        self.right_click_pressed = pressed;
        self
    }

    pub fn with_toggle_follow_pressed(mut self, pressed: bool) -> Self {
        self.toggle_follow_pressed = pressed;
        self
    }

    pub fn with_cycle_area_pressed(mut self, pressed: bool) -> Self {
        self.cycle_area_pressed = pressed;
        self
    }

    pub fn with_next_page_pressed(mut self, pressed: bool) -> Self {
        self.next_page_pressed = pressed;
        self
    }

    pub fn with_save_pressed(mut self, pressed: bool) -> Self {
        self.save_pressed = pressed;
        self
    }

    pub fn with_load_pressed(mut self, pressed: bool) -> Self {
        self.load_pressed = pressed;
        self
    }

    pub fn with_zoom_delta_steps(mut self, steps: i32) -> Self {
        self.zoom_delta_steps = steps;
        self
    }

    pub fn with_slot_pressed(mut self, slot: Option<u8>) -> Self {
        self.slot_pressed = slot;
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }
}

/// Press-edge tracking for a key that must fire once per physical press.
#[derive(Debug, Clone, Copy, Default)]
struct EdgeKey {
    is_down: bool,
    pressed: bool,
}

impl EdgeKey {
    fn handle(&mut self, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if !self.is_down {
                    self.pressed = true;
                }
                self.is_down = true;
            }
            ElementState::Released => self.is_down = false,
        }
    }

    fn take(&mut self) -> bool {
        std::mem::take(&mut self.pressed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeKind {
    ToggleFollow,
    CycleArea,
    NextPage,
    ToggleHud,
    Save,
    Load,
    ZoomIn,
    ZoomOut,
}

#[derive(Debug, Default)]
pub(crate) struct InputCollector {
    pub(crate) quit_requested: bool,
    action_states: ActionStates,
    toggle_follow: EdgeKey,
    cycle_area: EdgeKey,
    next_page: EdgeKey,
    toggle_hud: EdgeKey,
    save: EdgeKey,
    load: EdgeKey,
    zoom_in: EdgeKey,
    zoom_out: EdgeKey,
    pending_zoom_steps: i32,
    slot_keys: [EdgeKey; 10],
    pending_slot: Option<u8>,
    cursor_position_px: Option<Vec2>,
    left_mouse: EdgeKey,
    right_mouse: EdgeKey,
    window_width: u32,
    window_height: u32,
}

impl InputCollector {
    pub(crate) fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            window_width,
            window_height,
            ..Self::default()
        }
    }

    pub(crate) fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    pub(crate) fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        self.handle_physical_key(key_event.physical_key, key_event.state);
    }

    fn handle_physical_key(&mut self, key: PhysicalKey, state: ElementState) {
        let PhysicalKey::Code(code) = key else {
            return;
        };
        let is_pressed = state == ElementState::Pressed;
        if let Some(action) = held_action_for(code) {
            self.action_states.set(action, is_pressed);
            if action == InputAction::Quit && is_pressed {
                self.mark_quit_requested();
            }
            return;
        }
        if let Some(slot) = slot_for(code) {
            let key = &mut self.slot_keys[usize::from(slot)];
            key.handle(state);
            if key.take() {
                self.pending_slot = Some(slot);
            }
            return;
        }
        if let Some(kind) = edge_for(code) {
            self.edge_key(kind).handle(state);
            if kind == EdgeKind::ZoomIn && self.zoom_in.take() {
                self.pending_zoom_steps = self.pending_zoom_steps.saturating_add(1);
            }
            if kind == EdgeKind::ZoomOut && self.zoom_out.take() {
                self.pending_zoom_steps = self.pending_zoom_steps.saturating_sub(1);
            }
        }
    }

    fn edge_key(&mut self, kind: EdgeKind) -> &mut EdgeKey {
        match kind {
            EdgeKind::ToggleFollow => &mut self.toggle_follow,
            EdgeKind::CycleArea => &mut self.cycle_area,
            EdgeKind::NextPage => &mut self.next_page,
            EdgeKind::ToggleHud => &mut self.toggle_hud,
            EdgeKind::Save => &mut self.save,
            EdgeKind::Load => &mut self.load,
            EdgeKind::ZoomIn => &mut self.zoom_in,
            EdgeKind::ZoomOut => &mut self.zoom_out,
        }
    }

    pub(crate) fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState) {
        match button {
            MouseButton::Left => self.left_mouse.handle(state),
            MouseButton::Right => self.right_mouse.handle(state),
            _ => {}
        }
    }

    pub(crate) fn handle_mouse_wheel(&mut self, delta: MouseScrollDelta) {
        let steps = zoom_steps_from_scroll_delta(delta);
        self.pending_zoom_steps = self.pending_zoom_steps.saturating_add(steps);
    }

    pub(crate) fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
    }

    pub(crate) fn set_cursor_position_px(&mut self, x: f32, y: f32) {
        self.cursor_position_px = Some(Vec2 { x, y });
    }

    pub(crate) fn clear_cursor_position(&mut self) {
        self.cursor_position_px = None;
    }

    pub(crate) fn take_hud_toggle_pressed(&mut self) -> bool {
        self.toggle_hud.take()
    }

    pub(crate) fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot {
            quit_requested: self.quit_requested,
            actions: self.action_states,
            cursor_position_px: self.cursor_position_px,
            left_click_pressed: self.left_mouse.take(),
            right_button_down: self.right_mouse.is_down,
            right_click_pressed: self.right_mouse.take(),
            toggle_follow_pressed: self.toggle_follow.take(),
            cycle_area_pressed: self.cycle_area.take(),
            next_page_pressed: self.next_page.take(),
            save_pressed: self.save.take(),
            load_pressed: self.load.take(),
            zoom_delta_steps: self.pending_zoom_steps,
            slot_pressed: self.pending_slot.take(),
            window_width: self.window_width,
            window_height: self.window_height,
        };
        self.pending_zoom_steps = 0;
        snapshot
    }
}

fn held_action_for(code: KeyCode) -> Option<InputAction> {
    let action = match code {
        KeyCode::KeyW | KeyCode::ArrowUp => InputAction::MoveUp,
        KeyCode::KeyS | KeyCode::ArrowDown => InputAction::MoveDown,
        KeyCode::KeyA | KeyCode::ArrowLeft => InputAction::MoveLeft,
        KeyCode::KeyD | KeyCode::ArrowRight => InputAction::MoveRight,
        KeyCode::KeyI => InputAction::PanUp,
        KeyCode::KeyK => InputAction::PanDown,
        KeyCode::KeyJ => InputAction::PanLeft,
        KeyCode::KeyL => InputAction::PanRight,
        KeyCode::Delete | KeyCode::KeyX => InputAction::RemoveModifier,
        KeyCode::Escape => InputAction::Quit,
        _ => return None,
    };
    Some(action)
}

fn edge_for(code: KeyCode) -> Option<EdgeKind> {
    let kind = match code {
        KeyCode::KeyF => EdgeKind::ToggleFollow,
        KeyCode::KeyR => EdgeKind::CycleArea,
        KeyCode::Tab => EdgeKind::NextPage,
        KeyCode::F3 => EdgeKind::ToggleHud,
        KeyCode::F5 => EdgeKind::Save,
        KeyCode::F9 => EdgeKind::Load,
        KeyCode::Equal | KeyCode::NumpadAdd => EdgeKind::ZoomIn,
        KeyCode::Minus | KeyCode::NumpadSubtract => EdgeKind::ZoomOut,
        _ => return None,
    };
    Some(kind)
}

fn slot_for(code: KeyCode) -> Option<u8> {
    let slot = match code {
        KeyCode::Digit1 => 0,
        KeyCode::Digit2 => 1,
        KeyCode::Digit3 => 2,
        KeyCode::Digit4 => 3,
        KeyCode::Digit5 => 4,
        KeyCode::Digit6 => 5,
        KeyCode::Digit7 => 6,
        KeyCode::Digit8 => 7,
        KeyCode::Digit9 => 8,
        KeyCode::Digit0 => 9,
        _ => return None,
    };
    Some(slot)
}

fn zoom_steps_from_scroll_delta(delta: MouseScrollDelta) -> i32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y.round() as i32,
        MouseScrollDelta::PixelDelta(position) => {
            if position.y > 0.0 {
                1
            } else if position.y < 0.0 {
                -1
            } else {
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(input: &mut InputCollector, code: KeyCode) {
        input.handle_physical_key(PhysicalKey::Code(code), ElementState::Pressed);
    }

    fn release(input: &mut InputCollector, code: KeyCode) {
        input.handle_physical_key(PhysicalKey::Code(code), ElementState::Released);
    }

    #[test]
    fn wasd_and_arrows_build_move_intent() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::KeyW);
        press(&mut input, KeyCode::ArrowLeft);

        let intent = input.snapshot_for_tick().move_intent();
        assert!(intent.up && intent.left);
        assert!(!intent.down && !intent.right);

        release(&mut input, KeyCode::KeyW);
        assert!(!input.snapshot_for_tick().move_intent().up);
    }

    #[test]
    fn pan_keys_map_to_axis_steps() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::KeyJ);
        press(&mut input, KeyCode::KeyK);
        assert_eq!(input.snapshot_for_tick().pan_steps(), (-1, 1));

        press(&mut input, KeyCode::KeyL);
        assert_eq!(input.snapshot_for_tick().pan_steps(), (0, 1));
    }

    #[test]
    fn one_shot_keys_fire_once_per_press() {
        let mut input = InputCollector::new(800, 600);
        press(&mut input, KeyCode::KeyF);
        press(&mut input, KeyCode::F5);
        let first = input.snapshot_for_tick();
        assert!(first.toggle_follow_pressed());
        assert!(first.save_pressed());

        press(&mut input, KeyCode::KeyF);
        assert!(!input.snapshot_for_tick().toggle_follow_pressed());

        release(&mut input, KeyCode::KeyF);
        press(&mut input, KeyCode::KeyF);
        assert!(input.snapshot_for_tick().toggle_follow_pressed());
    }

    #[test]
    fn zoom_keys_and_wheel_accumulate_until_snapshot() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::Equal);
        press(&mut input, KeyCode::Equal);
        input.handle_mouse_wheel(MouseScrollDelta::LineDelta(0.0, 2.0));
        assert_eq!(input.snapshot_for_tick().zoom_delta_steps(), 3);
        assert_eq!(input.snapshot_for_tick().zoom_delta_steps(), 0);

        press(&mut input, KeyCode::Minus);
        assert_eq!(input.snapshot_for_tick().zoom_delta_steps(), -1);
    }

    #[test]
    fn pixel_wheel_delta_maps_to_one_step() {
        let step = |y: f64| {
            zoom_steps_from_scroll_delta(MouseScrollDelta::PixelDelta(
                winit::dpi::PhysicalPosition::new(0.0, y),
            ))
        };
        assert_eq!(step(3.0), 1);
        assert_eq!(step(-5.0), -1);
        assert_eq!(step(0.0), 0);
    }

    #[test]
    fn number_row_selects_slots() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::Digit3);
        assert_eq!(input.snapshot_for_tick().slot_pressed(), Some(2));
        assert_eq!(input.snapshot_for_tick().slot_pressed(), None);

        press(&mut input, KeyCode::Digit0);
        assert_eq!(input.snapshot_for_tick().slot_pressed(), Some(9));
    }

    #[test]
    fn right_button_reports_hold_and_press_edge() {
        let mut input = InputCollector::default();
        input.handle_mouse_input(MouseButton::Right, ElementState::Pressed);
        let first = input.snapshot_for_tick();
        let second = input.snapshot_for_tick();
        assert!(first.right_click_pressed() && first.right_button_down());
        assert!(!second.right_click_pressed() && second.right_button_down());

        input.handle_mouse_input(MouseButton::Right, ElementState::Released);
        assert!(!input.snapshot_for_tick().right_button_down());
    }

    #[test]
    fn left_click_is_edge_triggered() {
        let mut input = InputCollector::new(1280, 720);
        input.set_cursor_position_px(100.0, 200.0);
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);
        let first = input.snapshot_for_tick();
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);
        let second = input.snapshot_for_tick();

        assert!(first.left_click_pressed());
        assert!(!second.left_click_pressed());
        assert_eq!(first.window_size(), (1280, 720));
        assert_eq!(first.cursor_position_px(), Some(Vec2 { x: 100.0, y: 200.0 }));
    }

    #[test]
    fn escape_requests_quit_and_remove_modifier_is_held() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::Delete);
        assert!(input.snapshot_for_tick().is_down(InputAction::RemoveModifier));

        press(&mut input, KeyCode::Escape);
        assert!(input.quit_requested);
        assert!(input.snapshot_for_tick().quit_requested());
    }

    #[test]
    fn hud_toggle_is_taken_by_the_loop() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::F3);
        assert!(input.take_hud_toggle_pressed());
        assert!(!input.take_hud_toggle_pressed());
    }
}
