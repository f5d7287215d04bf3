use engine::{ClockKind, Effect, EffectQueue, ScheduledId, Scheduler, SimClock};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::context::Continuation;
use super::events::{EventBus, GameEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum GameMode {
    Starting,
    Playing,
    Paused,
    FailScreen,
    VictoryDance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct GameModeTuning {
    /// Real-time length of the fade-in; unaffected by the frozen clock.
    pub(crate) fade_in_seconds: f32,
}

impl Default for GameModeTuning {
    fn default() -> Self {
        Self {
            fade_in_seconds: 1.0,
        }
    }
}

/// Borrowed collaborators a mode change touches.
pub(crate) struct ModeServices<'a> {
    pub(crate) bus: &'a mut EventBus,
    pub(crate) clock: &'a mut SimClock,
    pub(crate) effects: &'a mut EffectQueue,
    pub(crate) scheduler: &'a mut Scheduler<Continuation>,
}

#[derive(Debug)]
pub(crate) struct GameModeController {
    state: GameMode,
    previous: GameMode,
    fade_in_seconds: f32,
    startup: Option<ScheduledId>,
}

impl GameModeController {
    pub(crate) fn new(tuning: &GameModeTuning) -> Self {
        Self {
            state: GameMode::Starting,
            previous: GameMode::Starting,
            fade_in_seconds: tuning.fade_in_seconds,
            startup: None,
        }
    }

    pub(crate) fn state(&self) -> GameMode {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn previous(&self) -> GameMode {
        self.previous
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.state == GameMode::Playing
    }

    pub(crate) fn change_state(&mut self, next: GameMode, services: &mut ModeServices<'_>) {
        services.bus.publish(GameEvent::ModeChanging(next));

        self.previous = self.state;
        self.state = next;

        if self.previous == GameMode::Paused {
            services.clock.set_timescale(1.0);
            services.effects.push(Effect::SetAudioPaused(false));
        }

        match next {
            GameMode::Starting => {
                services.clock.set_timescale(0.0);
                services.effects.push(Effect::FadeIn);
                if let Some(stale) = self.startup.take() {
                    services.scheduler.cancel(stale);
                }
                self.startup = Some(services.scheduler.schedule(
                    None,
                    ClockKind::Real,
                    self.fade_in_seconds,
                    Continuation::FinishStartup,
                ));
            }
            GameMode::Paused => {
                services.clock.set_timescale(0.0);
                services.effects.push(Effect::SetAudioPaused(true));
            }
            GameMode::Playing | GameMode::FailScreen | GameMode::VictoryDance => {}
        }

        info!(from = ?self.previous, to = ?next, "mode_changed");
        services.bus.publish(GameEvent::ModeChanged(next));
    }

    /// Ends the fade-in. Ignored when something else changed the mode first.
    pub(crate) fn finish_startup(&mut self, services: &mut ModeServices<'_>) -> bool {
        self.startup = None;
        if self.state != GameMode::Starting {
            return false;
        }
        services.clock.set_timescale(1.0);
        self.change_state(GameMode::Playing, services);
        true
    }

    pub(crate) fn toggle_pause(&mut self, services: &mut ModeServices<'_>) {
        if self.state == GameMode::Paused {
            self.change_state(self.previous, services);
        } else {
            self.change_state(GameMode::Paused, services);
        }
    }
}
