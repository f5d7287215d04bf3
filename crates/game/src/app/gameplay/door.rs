use engine::{Effect, EffectQueue, EntityId, Vec2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::collector::PlayerCollector;
use super::session::SessionStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct DoorTuning {
    pub(crate) prompt_linger_seconds: f32,
    pub(crate) talk_sound: String,
    pub(crate) open_sound: String,
}

impl Default for DoorTuning {
    fn default() -> Self {
        Self {
            prompt_linger_seconds: 1.0,
            talk_sound: "door_talk".to_string(),
            open_sound: "door_open".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DoorRegistration {
    Closed,
    /// The session already records this door open; the scene drops the door.
    AlreadyOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DoorInteraction {
    Ignored,
    /// Prompt is up but the player cannot pay yet.
    Waiting,
    Opened,
}

/// A door that opens once the player pays its slime price while in slime mode.
#[derive(Debug)]
pub(crate) struct DoorGate {
    name: String,
    required_slimes: u32,
    prompt_visible: bool,
    open: bool,
}

impl DoorGate {
    pub(crate) fn register(
        name: &str,
        required_slimes: u32,
        session: &mut SessionStore,
    ) -> (Self, DoorRegistration) {
        session.record_closed_door(name);
        let open = session.is_door_open(name);
        let gate = Self {
            name: name.to_string(),
            required_slimes,
            prompt_visible: false,
            open,
        };
        let registration = if open {
            DoorRegistration::AlreadyOpen
        } else {
            DoorRegistration::Closed
        };
        (gate, registration)
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    #[cfg(test)]
    pub(crate) fn is_prompt_visible(&self) -> bool {
        self.prompt_visible
    }

    /// Runs on every tick the player stays in range.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn interact(
        &mut self,
        door: EntityId,
        position: Vec2,
        special_mode: bool,
        collector: &mut PlayerCollector,
        session: &mut SessionStore,
        tuning: &DoorTuning,
        effects: &mut EffectQueue,
    ) -> DoorInteraction {
        if self.open || !special_mode {
            return DoorInteraction::Ignored;
        }

        if !self.prompt_visible {
            self.prompt_visible = true;
            effects.push(Effect::ShowPrompt {
                entity: door,
                text: self.required_slimes.to_string(),
            });
            effects.play_sound(&tuning.talk_sound, position);
        }

        if !collector.spend_slimes(self.required_slimes) {
            return DoorInteraction::Waiting;
        }
        self.open = true;
        session.mark_door_open(&self.name);
        effects.play_sound(&tuning.open_sound, position);
        info!(door = %self.name, spent = self.required_slimes, "door_opened");
        DoorInteraction::Opened
    }

    /// Delay before the prompt hides, or `None` when there is nothing to hide.
    pub(crate) fn player_left(&self, tuning: &DoorTuning) -> Option<f32> {
        (self.prompt_visible && !self.open).then_some(tuning.prompt_linger_seconds)
    }

    pub(crate) fn hide_prompt(&mut self, door: EntityId, effects: &mut EffectQueue) {
        if !self.prompt_visible {
            return;
        }
        self.prompt_visible = false;
        effects.push(Effect::HidePrompt { entity: door });
        debug!(door = %self.name, "door_prompt_hidden");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::gameplay::events::EventBus;

    const DOOR: EntityId = EntityId(7);

    fn collector_with(session: &mut SessionStore, slimes: u32) -> PlayerCollector {
        session.record_slime_count(slimes);
        PlayerCollector::from_session(session, 3, "slime_collect", "food_eat")
    }

    #[test]
    fn short_payment_keeps_door_closed_until_enough_slimes() {
        let mut session = SessionStore::default();
        let tuning = DoorTuning::default();
        let mut effects = EffectQueue::default();
        let mut bus = EventBus::default();
        let mut collector = collector_with(&mut session, 2);
        let (mut door, registration) = DoorGate::register("meadow_gate", 3, &mut session);
        assert_eq!(registration, DoorRegistration::Closed);

        let first = door.interact(
            DOOR,
            Vec2::ZERO,
            true,
            &mut collector,
            &mut session,
            &tuning,
            &mut effects,
        );
        assert_eq!(first, DoorInteraction::Waiting);
        assert_eq!(collector.slime_count(), 2);
        assert!(!session.is_door_open("meadow_gate"));

        collector.collect_slime(Vec2::ZERO, &mut effects, &mut bus);
        let second = door.interact(
            DOOR,
            Vec2::ZERO,
            true,
            &mut collector,
            &mut session,
            &tuning,
            &mut effects,
        );
        assert_eq!(second, DoorInteraction::Opened);
        assert_eq!(collector.slime_count(), 0);
        assert!(session.is_door_open("meadow_gate"));

        collector.collect_slime(Vec2::ZERO, &mut effects, &mut bus);
        collector.collect_slime(Vec2::ZERO, &mut effects, &mut bus);
        collector.collect_slime(Vec2::ZERO, &mut effects, &mut bus);
        let third = door.interact(
            DOOR,
            Vec2::ZERO,
            true,
            &mut collector,
            &mut session,
            &tuning,
            &mut effects,
        );
        assert_eq!(third, DoorInteraction::Ignored);
        assert_eq!(collector.slime_count(), 3);
    }

    #[test]
    fn prompt_needs_slime_mode_and_shows_once() {
        let mut session = SessionStore::default();
        let tuning = DoorTuning::default();
        let mut effects = EffectQueue::default();
        let mut collector = collector_with(&mut session, 0);
        let (mut door, _) = DoorGate::register("gate", 3, &mut session);

        let ignored = door.interact(
            DOOR,
            Vec2::ZERO,
            false,
            &mut collector,
            &mut session,
            &tuning,
            &mut effects,
        );
        assert_eq!(ignored, DoorInteraction::Ignored);
        assert!(effects.is_empty());

        for _ in 0..3 {
            door.interact(
                DOOR,
                Vec2::ZERO,
                true,
                &mut collector,
                &mut session,
                &tuning,
                &mut effects,
            );
        }
        let prompts = effects
            .pending()
            .iter()
            .filter(|effect| matches!(effect, Effect::ShowPrompt { text, .. } if text == "3"))
            .count();
        assert_eq!(prompts, 1);
        assert_eq!(door.player_left(&tuning), Some(1.0));

        door.hide_prompt(DOOR, &mut effects);
        door.hide_prompt(DOOR, &mut effects);
        assert!(!door.is_prompt_visible());
        assert_eq!(door.player_left(&tuning), None);
    }

    #[test]
    fn reloading_an_opened_door_reports_it_open() {
        let mut session = SessionStore::default();
        session.mark_door_open("gate");

        let (door, registration) = DoorGate::register("gate", 3, &mut session);
        assert_eq!(registration, DoorRegistration::AlreadyOpen);
        assert!(door.is_open());
        assert_eq!(session.known_door_count(), 1);
    }
}
