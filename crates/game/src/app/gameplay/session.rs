use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Record a fresh game starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct StartingSession {
    pub(crate) max_hp: u32,
    pub(crate) hp: u32,
    pub(crate) slime_count: u32,
    pub(crate) entrance_index: Option<u32>,
}

impl Default for StartingSession {
    fn default() -> Self {
        Self {
            max_hp: 15,
            hp: 12,
            slime_count: 0,
            entrance_index: None,
        }
    }
}

/// Player progress that outlives scene loads. Scenes read it on load and write back
/// only at scene exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionStore {
    max_hp: u32,
    hp: u32,
    slime_count: u32,
    entrance_index: Option<u32>,
    tutorial_played: bool,
    open_doors: BTreeMap<String, bool>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::from_starting(StartingSession::default())
    }
}

impl SessionStore {
    pub(crate) fn from_starting(starting: StartingSession) -> Self {
        let max_hp = starting.max_hp;
        Self {
            max_hp,
            hp: starting.hp.min(max_hp),
            slime_count: starting.slime_count,
            entrance_index: starting.entrance_index,
            tutorial_played: false,
            open_doors: BTreeMap::new(),
        }
    }

    pub(crate) fn max_hp(&self) -> u32 {
        self.max_hp
    }

    pub(crate) fn hp(&self) -> u32 {
        self.hp
    }

    pub(crate) fn slime_count(&self) -> u32 {
        self.slime_count
    }

    pub(crate) fn entrance_index(&self) -> Option<u32> {
        self.entrance_index
    }

    pub(crate) fn tutorial_played(&self) -> bool {
        self.tutorial_played
    }

    pub(crate) fn record_player_health(&mut self, hp: u32, max_hp: u32) {
        self.max_hp = max_hp;
        self.hp = hp.min(max_hp);
    }

    pub(crate) fn record_slime_count(&mut self, slime_count: u32) {
        self.slime_count = slime_count;
    }

    pub(crate) fn set_entrance_index(&mut self, entrance_index: Option<u32>) {
        self.entrance_index = entrance_index;
    }

    pub(crate) fn mark_tutorial_played(&mut self) {
        self.tutorial_played = true;
    }

    /// Registers a door as closed unless it is already known. Returns `true` for a
    /// newly registered door.
    pub(crate) fn record_closed_door(&mut self, door: &str) -> bool {
        if self.open_doors.contains_key(door) {
            return false;
        }
        self.open_doors.insert(door.to_string(), false);
        debug!(door, "door_registered");
        true
    }

    /// Returns `true` only on the closed-to-open transition.
    pub(crate) fn mark_door_open(&mut self, door: &str) -> bool {
        match self.open_doors.get_mut(door) {
            Some(open) if *open => false,
            Some(open) => {
                *open = true;
                true
            }
            None => {
                self.open_doors.insert(door.to_string(), true);
                true
            }
        }
    }

    pub(crate) fn is_door_open(&self, door: &str) -> bool {
        self.open_doors.get(door).copied().unwrap_or(false)
    }

    #[cfg(test)]
    pub(crate) fn known_door_count(&self) -> usize {
        self.open_doors.len()
    }
}
