use engine::{EntityId, Scheduler};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use super::config::GameConfig;
use super::events::{EventBus, GameEventKind};
use super::game_mode::GameModeController;
use super::session::SessionStore;

/// Deferred work resumed on a later frame by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Continuation {
    ReturnControl { player: EntityId },
    ReloadScene,
    HidePrompt { door: EntityId },
    FinishStartup,
    FinishTutorial,
}

/// Session-wide collaborators shared by every level scene. Built once, in field
/// order, and torn down only through `shutdown`.
#[derive(Debug)]
pub(crate) struct GameContext {
    pub(crate) session: SessionStore,
    pub(crate) events: EventBus,
    pub(crate) mode: GameModeController,
    pub(crate) scheduler: Scheduler<Continuation>,
    pub(crate) rng: StdRng,
}

impl GameContext {
    pub(crate) fn new(config: &GameConfig) -> Self {
        let session = SessionStore::from_starting(config.starting.clone());
        let events = EventBus::default();
        let mode = GameModeController::new(&config.game_mode);
        let scheduler = Scheduler::default();
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            session,
            events,
            mode,
            scheduler,
            rng,
        }
    }

    /// Drops pending continuations and subscriptions and hands back the final
    /// session record.
    pub(crate) fn shutdown(self) -> SessionStore {
        let Self {
            session,
            events,
            scheduler,
            ..
        } = self;
        info!(
            pending_continuations = scheduler.len(),
            subscribers = events.total_subscribers(),
            hp = session.hp(),
            slimes = session.slime_count(),
            enemies_defeated = events.published_count(GameEventKind::EnemyDefeated),
            "game_context_shutdown"
        );
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::gameplay::game_mode::GameMode;
    use rand::Rng;

    #[test]
    fn seeded_contexts_draw_the_same_numbers() {
        let config = GameConfig {
            rng_seed: Some(42),
            ..GameConfig::default()
        };
        let mut first = GameContext::new(&config);
        let mut second = GameContext::new(&config);

        let a: u32 = first.rng.random();
        let b: u32 = second.rng.random();
        assert_eq!(a, b);
        assert_eq!(first.mode.state(), GameMode::Starting);
    }

    #[test]
    fn shutdown_returns_session() {
        let mut context = GameContext::new(&GameConfig::default());
        context.session.record_slime_count(4);
        let session = context.shutdown();
        assert_eq!(session.slime_count(), 4);
        assert_eq!(session.hp(), 12);
    }
}
