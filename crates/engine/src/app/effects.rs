use tracing::debug;

use super::geometry::Vec2;
use super::scene::EntityId;

/// Presentation side effects requested by gameplay. The host decides how (or whether)
/// to realise them.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PlayAnimation {
        entity: EntityId,
        clip: &'static str,
    },
    PlaySound {
        clip: String,
        position: Vec2,
        pitch_variance: Option<f32>,
    },
    SetAudioPaused(bool),
    FadeIn,
    ShowPrompt {
        entity: EntityId,
        text: String,
    },
    HidePrompt {
        entity: EntityId,
    },
    PlayCutscene {
        name: String,
    },
}

#[derive(Debug, Default)]
pub struct EffectQueue {
    pending: Vec<Effect>,
}

impl EffectQueue {
    pub fn push(&mut self, effect: Effect) {
        self.pending.push(effect);
    }

    pub fn play_sound(&mut self, clip: &str, position: Vec2) {
        if clip.is_empty() {
            return;
        }
        self.push(Effect::PlaySound {
            clip: clip.to_string(),
            position,
            pitch_variance: None,
        });
    }

    pub fn pending(&self) -> &[Effect] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.pending)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

pub trait EffectSink {
    fn apply(&mut self, effect: Effect);
}

/// Logs every effect; used by the headless host.
#[derive(Debug, Default)]
pub struct TracingEffectSink {
    applied: u64,
}

impl TracingEffectSink {
    pub fn applied(&self) -> u64 {
        self.applied
    }
}

impl EffectSink for TracingEffectSink {
    fn apply(&mut self, effect: Effect) {
        self.applied = self.applied.saturating_add(1);
        match effect {
            Effect::PlayAnimation { entity, clip } => {
                debug!(entity = entity.0, clip, "animation_played");
            }
            Effect::PlaySound {
                clip,
                position,
                pitch_variance,
            } => {
                debug!(
                    clip = clip.as_str(),
                    x = position.x,
                    y = position.y,
                    pitch_variance = ?pitch_variance,
                    "sound_played"
                );
            }
            Effect::SetAudioPaused(paused) => debug!(paused, "audio_paused_set"),
            Effect::FadeIn => debug!("fade_in"),
            Effect::ShowPrompt { entity, text } => {
                debug!(entity = entity.0, text = text.as_str(), "prompt_shown");
            }
            Effect::HidePrompt { entity } => debug!(entity = entity.0, "prompt_hidden"),
            Effect::PlayCutscene { name } => debug!(name = name.as_str(), "cutscene_played"),
        }
    }
}

/// Collects effects in order; handy for tests and replays.
#[derive(Debug, Default)]
pub struct RecordingEffectSink {
    pub effects: Vec<Effect>,
}

impl EffectSink for RecordingEffectSink {
    fn apply(&mut self, effect: Effect) {
        self.effects.push(effect);
    }
}
