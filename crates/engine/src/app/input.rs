use super::scene::InputSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveLeft,
    MoveRight,
    Jump,
    Fire,
    CycleShot,
    PauseToggle,
    Quit,
}

const ACTION_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
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
    pub const ALL: [InputAction; ACTION_COUNT] = [
        InputAction::MoveLeft,
        InputAction::MoveRight,
        InputAction::Jump,
        InputAction::Fire,
        InputAction::CycleShot,
        InputAction::PauseToggle,
        InputAction::Quit,
    ];

    const fn index(self) -> usize {
        match self {
            InputAction::MoveLeft => 0,
            InputAction::MoveRight => 1,
            InputAction::Jump => 2,
            InputAction::Fire => 3,
            InputAction::CycleShot => 4,
            InputAction::PauseToggle => 5,
            InputAction::Quit => 6,
        }
    }
}

/// Turns press/release notifications into per-frame snapshots. Press edges are
/// reported once, on the first snapshot after the press.
#[derive(Debug, Default)]
pub struct InputCollector {
    held: ActionStates,
    pressed_edges: ActionStates,
    analog_axis: Option<f32>,
    quit_requested: bool,
}

impl InputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_action(&mut self, action: InputAction, is_pressed: bool) {
        if is_pressed && !self.held.is_down(action) {
            self.pressed_edges.set(action, true);
            if action == InputAction::Quit {
                self.quit_requested = true;
            }
        }
        self.held.set(action, is_pressed);
    }

    /// Overrides the digital left/right axis, e.g. from a stick. `None` restores the
    /// digital axis.
    pub fn set_analog_axis(&mut self, axis: Option<f32>) {
        self.analog_axis = axis.filter(|value| value.is_finite());
    }

    pub fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.held.is_down(action)
    }

    pub fn snapshot_for_frame(&mut self) -> InputSnapshot {
        let digital_axis = match (
            self.held.is_down(InputAction::MoveLeft),
            self.held.is_down(InputAction::MoveRight),
        ) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        let move_axis = self.analog_axis.unwrap_or(digital_axis);

        let snapshot = InputSnapshot::new(self.held, self.pressed_edges, move_axis)
            .with_quit_requested(self.quit_requested);
        self.pressed_edges = ActionStates::default();
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_press_is_edge_triggered_for_single_frame() {
        let mut input = InputCollector::new();
        input.handle_action(InputAction::Jump, true);

        let first = input.snapshot_for_frame();
        let second = input.snapshot_for_frame();

        assert!(first.jump_pressed());
        assert!(first.jump_held());
        assert!(!second.jump_pressed());
        assert!(second.jump_held());
    }

    #[test]
    fn held_key_does_not_retrigger_without_release() {
        let mut input = InputCollector::new();
        input.handle_action(InputAction::Fire, true);
        let _ = input.snapshot_for_frame();
        input.handle_action(InputAction::Fire, true);
        assert!(!input.snapshot_for_frame().fire_pressed());

        input.handle_action(InputAction::Fire, false);
        input.handle_action(InputAction::Fire, true);
        assert!(input.snapshot_for_frame().fire_pressed());
    }

    #[test]
    fn press_and_release_within_one_frame_still_reports_press() {
        let mut input = InputCollector::new();
        input.handle_action(InputAction::PauseToggle, true);
        input.handle_action(InputAction::PauseToggle, false);

        let snapshot = input.snapshot_for_frame();
        assert!(snapshot.pause_toggle_pressed());
        assert!(!snapshot.is_down(InputAction::PauseToggle));
    }

    #[test]
    fn digital_axis_cancels_and_analog_override_is_clamped() {
        let mut input = InputCollector::new();
        input.handle_action(InputAction::MoveLeft, true);
        assert_eq!(input.snapshot_for_frame().move_axis(), -1.0);

        input.handle_action(InputAction::MoveRight, true);
        assert_eq!(input.snapshot_for_frame().move_axis(), 0.0);

        input.set_analog_axis(Some(3.0));
        assert_eq!(input.snapshot_for_frame().move_axis(), 1.0);
    }

    #[test]
    fn quit_is_sticky_once_requested() {
        let mut input = InputCollector::new();
        input.handle_action(InputAction::Quit, true);
        input.handle_action(InputAction::Quit, false);
        let _ = input.snapshot_for_frame();
        assert!(input.snapshot_for_frame().quit_requested());
    }
}
