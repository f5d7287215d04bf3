use engine::{InputAction, InputCollector, InputSnapshot, InputSource};

/// `(frame, action, pressed)`, sorted by frame. The first level fades in for about
/// a second at 60 fps, so the script starts after that.
const SCRIPT: &[(u64, InputAction, bool)] = &[
    (70, InputAction::MoveRight, true),
    (100, InputAction::Jump, true),
    (104, InputAction::Jump, false),
    (112, InputAction::Jump, true),
    (116, InputAction::Jump, false),
    (160, InputAction::Fire, true),
    (161, InputAction::Fire, false),
    (180, InputAction::CycleShot, true),
    (181, InputAction::CycleShot, false),
    (200, InputAction::Fire, true),
    (201, InputAction::Fire, false),
    (240, InputAction::PauseToggle, true),
    (241, InputAction::PauseToggle, false),
    (300, InputAction::PauseToggle, true),
    (301, InputAction::PauseToggle, false),
];

const HOP_START_FRAME: u64 = 360;
const HOP_PERIOD_FRAMES: u64 = 45;
const HOP_HOLD_FRAMES: u64 = 4;

/// Scripted stand-in for a keyboard: walks right through the level, exercises
/// each action once, then keeps hopping.
#[derive(Debug, Default)]
pub(crate) struct DemoInput {
    collector: InputCollector,
    cursor: usize,
}

impl DemoInput {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl InputSource for DemoInput {
    fn poll(&mut self, frame_index: u64) -> InputSnapshot {
        while let Some(&(frame, action, pressed)) = SCRIPT.get(self.cursor) {
            if frame > frame_index {
                break;
            }
            self.collector.handle_action(action, pressed);
            self.cursor += 1;
        }

        if frame_index >= HOP_START_FRAME {
            let phase = (frame_index - HOP_START_FRAME) % HOP_PERIOD_FRAMES;
            if phase == 0 {
                self.collector.handle_action(InputAction::Jump, true);
            } else if phase == HOP_HOLD_FRAMES {
                self.collector.handle_action(InputAction::Jump, false);
            }
        }

        self.collector.snapshot_for_frame()
    }
}
