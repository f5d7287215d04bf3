use engine::{EffectQueue, Vec2};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ProjectileKind {
    Damage,
    /// Turns a struck enemy into a slime pickup.
    Slime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ProjectileTuning {
    pub(crate) speed: f32,
    pub(crate) ttl_seconds: f32,
    pub(crate) offset: Vec2,
    pub(crate) roster: Vec<ProjectileKind>,
    pub(crate) damage: u32,
    pub(crate) shoot_sound: String,
    pub(crate) damage_sound: String,
    pub(crate) slimed_sound: String,
    pub(crate) no_effect_sound: String,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            speed: 12.0,
            ttl_seconds: 3.0,
            offset: Vec2::new(0.6, 0.1),
            roster: vec![ProjectileKind::Damage, ProjectileKind::Slime],
            damage: 5,
            shoot_sound: "shot_fire".to_string(),
            damage_sound: "shot_hit".to_string(),
            slimed_sound: "shot_slimed".to_string(),
            no_effect_sound: "shot_no_effect".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ProjectileLaunch {
    pub(crate) kind: ProjectileKind,
    pub(crate) position: Vec2,
    pub(crate) velocity: Vec2,
}

/// Cycles through the configured projectile kinds and launches the selected one.
#[derive(Debug)]
pub(crate) struct ProjectileShooter {
    roster: Vec<ProjectileKind>,
    current: usize,
    special_mode: bool,
    speed: f32,
    offset: Vec2,
    shoot_sound: String,
}

impl ProjectileShooter {
    pub(crate) fn new(tuning: &ProjectileTuning) -> Self {
        Self {
            roster: tuning.roster.clone(),
            current: 0,
            special_mode: false,
            speed: tuning.speed,
            offset: tuning.offset,
            shoot_sound: tuning.shoot_sound.clone(),
        }
    }

    pub(crate) fn current_kind(&self) -> Option<ProjectileKind> {
        self.roster.get(self.current).copied()
    }

    /// `true` while the transform-on-hit kind is selected.
    pub(crate) fn is_special_mode(&self) -> bool {
        self.special_mode
    }

    pub(crate) fn ready_next(&mut self) {
        if self.roster.is_empty() {
            return;
        }
        self.current += 1;
        if self.current >= self.roster.len() {
            self.current = 0;
        }
        self.special_mode = self.roster[self.current] == ProjectileKind::Slime;
        debug!(
            kind = ?self.roster[self.current],
            special_mode = self.special_mode,
            "shot_cycled"
        );
    }

    /// `None` when the roster is empty. The offset is mirrored with the facing.
    pub(crate) fn fire(
        &self,
        origin: Vec2,
        facing_sign: f32,
        direction: Vec2,
        effects: &mut EffectQueue,
    ) -> Option<ProjectileLaunch> {
        let kind = self.current_kind()?;
        let position = origin + Vec2::new(self.offset.x * facing_sign, self.offset.y);
        effects.play_sound(&self.shoot_sound, position);
        Some(ProjectileLaunch {
            kind,
            position,
            velocity: direction.normalized_or_zero() * self.speed,
        })
    }
}

/// What a projectile touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContactTarget {
    Enemy { immune: bool },
    /// Level geometry or any entity the projectile does not affect.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProjectileOutcome {
    Damage(u32),
    Transform,
    NoEffect,
    Vanish,
}

/// A live projectile. It resolves at most once, by contact or by expiry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Projectile {
    kind: ProjectileKind,
    ttl_left: f32,
    resolved: bool,
}

impl Projectile {
    pub(crate) fn new(kind: ProjectileKind, ttl_seconds: f32) -> Self {
        Self {
            kind,
            ttl_left: ttl_seconds,
            resolved: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Returns `true` on the tick the time-to-live runs out.
    pub(crate) fn tick(&mut self, dt: f32) -> bool {
        if self.resolved {
            return false;
        }
        self.ttl_left -= dt;
        if self.ttl_left > 0.0 {
            return false;
        }
        self.resolved = true;
        true
    }

    /// Every outcome destroys the projectile; later contacts return `None`.
    pub(crate) fn resolve_contact(
        &mut self,
        target: ContactTarget,
        tuning: &ProjectileTuning,
        position: Vec2,
        effects: &mut EffectQueue,
    ) -> Option<ProjectileOutcome> {
        if self.resolved {
            return None;
        }
        self.resolved = true;

        let outcome = match (self.kind, target) {
            (_, ContactTarget::Other) => ProjectileOutcome::Vanish,
            (ProjectileKind::Damage, ContactTarget::Enemy { .. }) => {
                effects.play_sound(&tuning.damage_sound, position);
                ProjectileOutcome::Damage(tuning.damage)
            }
            (ProjectileKind::Slime, ContactTarget::Enemy { immune: true }) => {
                effects.play_sound(&tuning.no_effect_sound, position);
                ProjectileOutcome::NoEffect
            }
            (ProjectileKind::Slime, ContactTarget::Enemy { immune: false }) => {
                effects.play_sound(&tuning.slimed_sound, position);
                ProjectileOutcome::Transform
            }
        };
        Some(outcome)
    }
}
