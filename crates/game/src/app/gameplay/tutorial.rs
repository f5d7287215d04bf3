use engine::{Effect, EffectQueue};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::session::SessionStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct TutorialTuning {
    pub(crate) cutscene: String,
    pub(crate) duration_seconds: f32,
}

impl Default for TutorialTuning {
    fn default() -> Self {
        Self {
            cutscene: "intro".to_string(),
            duration_seconds: 4.0,
        }
    }
}

/// Plays the intro cutscene once per session.
#[derive(Debug)]
pub(crate) struct TutorialDirector {
    cutscene: String,
    duration_seconds: f32,
}

impl TutorialDirector {
    pub(crate) fn new(tuning: &TutorialTuning) -> Self {
        Self {
            cutscene: tuning.cutscene.clone(),
            duration_seconds: tuning.duration_seconds,
        }
    }

    /// Returns the delay after which `finish` should run, or `None` when the
    /// session already saw the tutorial.
    pub(crate) fn start(&self, session: &SessionStore, effects: &mut EffectQueue) -> Option<f32> {
        if session.tutorial_played() {
            return None;
        }
        effects.push(Effect::PlayCutscene {
            name: self.cutscene.clone(),
        });
        Some(self.duration_seconds)
    }

    pub(crate) fn finish(&self, session: &mut SessionStore) {
        session.mark_tutorial_played();
        info!(cutscene = %self.cutscene, "tutorial_finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plays_until_finished_then_skips() {
        let director = TutorialDirector::new(&TutorialTuning::default());
        let mut session = SessionStore::default();
        let mut effects = EffectQueue::default();

        assert_eq!(director.start(&session, &mut effects), Some(4.0));
        assert_eq!(
            effects.drain(),
            vec![Effect::PlayCutscene {
                name: "intro".to_string()
            }]
        );
        assert_eq!(director.start(&session, &mut effects), Some(4.0));

        director.finish(&mut session);
        effects.clear();
        assert_eq!(director.start(&session, &mut effects), None);
        assert!(effects.is_empty());
    }
}
