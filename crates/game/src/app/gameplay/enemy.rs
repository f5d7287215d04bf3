use engine::{Effect, EffectQueue, Entity, EntityId, PhysicsQuery, Vec2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::GameplayError;
use super::events::{EventBus, GameEvent};
use super::locomotion::{is_against_wall, is_on_ground};
use super::prefabs::PickupKind;

const CLIP_SHARED_DAMAGE: &str = "shared_damage";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct EnemyTuning {
    pub(crate) contact_damage: u32,
    pub(crate) walk_speed: f32,
    pub(crate) jump_force: f32,
    pub(crate) state_delay_min: f32,
    pub(crate) state_delay_max: f32,
    pub(crate) knockback_scale: f32,
    pub(crate) max_hp: u32,
    pub(crate) gravity_scale: f32,
    pub(crate) half_extents: Vec2,
    pub(crate) ground_check_distance: f32,
    pub(crate) wall_probe_lift: f32,
    pub(crate) replacement: Option<PickupKind>,
    pub(crate) walk_sound: String,
    pub(crate) walk_pitch_variance: f32,
    pub(crate) jump_sound: String,
    pub(crate) jump_pitch_variance: f32,
    pub(crate) defeat_sound: String,
}

impl Default for EnemyTuning {
    fn default() -> Self {
        Self {
            contact_damage: 3,
            walk_speed: 3.0,
            jump_force: 22.0,
            state_delay_min: 0.1,
            state_delay_max: 1.5,
            knockback_scale: 3.0,
            max_hp: 5,
            gravity_scale: 6.0,
            half_extents: Vec2::new(0.45, 0.3),
            ground_check_distance: 0.0625,
            wall_probe_lift: 0.1,
            replacement: Some(PickupKind::Food),
            walk_sound: "spider_walk".to_string(),
            walk_pitch_variance: 0.2,
            jump_sound: "spider_jump".to_string(),
            jump_pitch_variance: 0.3,
            defeat_sound: "spider_defeat".to_string(),
        }
    }
}

impl EnemyTuning {
    pub(crate) fn boss() -> Self {
        Self {
            contact_damage: 5,
            walk_speed: 2.0,
            jump_force: 14.0,
            state_delay_min: 0.5,
            state_delay_max: 2.5,
            max_hp: 30,
            half_extents: Vec2::new(0.9, 0.8),
            replacement: None,
            walk_sound: "boss_walk".to_string(),
            jump_sound: "boss_jump".to_string(),
            defeat_sound: "boss_defeat".to_string(),
            ..Self::default()
        }
    }
}

/// An immune enemy: no state machine and no contact damage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct EggTuning {
    pub(crate) max_hp: u32,
    pub(crate) gravity_scale: f32,
    pub(crate) half_extents: Vec2,
    pub(crate) defeat_sound: String,
}

impl Default for EggTuning {
    fn default() -> Self {
        Self {
            max_hp: 10,
            gravity_scale: 6.0,
            half_extents: Vec2::new(0.4, 0.5),
            defeat_sound: "egg_crack".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnemyVariant {
    Spider,
    Boss,
}

impl EnemyVariant {
    pub(crate) fn entity_name(self) -> &'static str {
        match self {
            Self::Spider => "spider",
            Self::Boss => "boss",
        }
    }

    fn idle_clip(self) -> &'static str {
        match self {
            Self::Spider => "spider_idle",
            Self::Boss => "boss_idle",
        }
    }

    fn walk_clip(self) -> &'static str {
        match self {
            Self::Spider => "spider_walk",
            Self::Boss => "boss_walk",
        }
    }
}

/// Numbered from 1 so a uniform draw over `1..=3` selects a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum EnemyMode {
    Idle = 1,
    Walk = 2,
    Jump = 3,
}

impl EnemyMode {
    const FIRST: u8 = 1;
    const LAST: u8 = 3;
}

impl TryFrom<u8> for EnemyMode {
    type Error = GameplayError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Idle),
            2 => Ok(Self::Walk),
            3 => Ok(Self::Jump),
            other => Err(GameplayError::UnmappedEnemyState(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EnemyFsmState {
    pub(crate) mode: EnemyMode,
    pub(crate) time_left_in_mode: f32,
    pub(crate) facing_right: bool,
}

/// Damage and knockback an enemy inflicts on the player it touches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ContactHit {
    pub(crate) damage: u32,
    pub(crate) impulse: Vec2,
}

/// Collectible to spawn where a defeated enemy stood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Replacement {
    pub(crate) kind: PickupKind,
    pub(crate) position: Vec2,
    pub(crate) velocity: Vec2,
    pub(crate) gravity_scale: f32,
}

impl Replacement {
    /// The pickup inherits the entity's momentum and gravity scale.
    pub(crate) fn from_entity(kind: PickupKind, entity: &Entity) -> Self {
        let (velocity, gravity_scale) = entity
            .body
            .map(|body| (body.velocity, body.gravity_scale))
            .unwrap_or((Vec2::ZERO, 1.0));
        Self {
            kind,
            position: entity.transform.position,
            velocity,
            gravity_scale,
        }
    }
}

/// Randomized Idle/Walk/Jump cycling shared by spiders and the boss.
#[derive(Debug)]
pub(crate) struct EnemyStateMachine {
    variant: EnemyVariant,
    tuning: EnemyTuning,
    state: EnemyFsmState,
}

impl EnemyStateMachine {
    pub(crate) fn new(variant: EnemyVariant, tuning: EnemyTuning) -> Self {
        Self {
            variant,
            tuning,
            state: EnemyFsmState {
                mode: EnemyMode::Walk,
                time_left_in_mode: 0.01,
                facing_right: true,
            },
        }
    }

    pub(crate) fn variant(&self) -> EnemyVariant {
        self.variant
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &EnemyFsmState {
        &self.state
    }

    /// Counts down the current mode and re-rolls when it runs out. Returns the newly
    /// entered mode, which may equal the previous one.
    pub(crate) fn frame_update<R: Rng>(
        &mut self,
        dt: f32,
        playing: bool,
        rng: &mut R,
        entity: &Entity,
        effects: &mut EffectQueue,
    ) -> Result<Option<EnemyMode>, GameplayError> {
        if !playing {
            return Ok(None);
        }
        self.state.time_left_in_mode -= dt;
        if self.state.time_left_in_mode > 0.0 {
            return Ok(None);
        }

        let dwell = rng.random_range(self.tuning.state_delay_min..=self.tuning.state_delay_max);
        self.state.time_left_in_mode = dwell;

        let mode = EnemyMode::try_from(rng.random_range(EnemyMode::FIRST..=EnemyMode::LAST))?;
        self.enter(mode, entity, effects);
        Ok(Some(mode))
    }

    fn enter(&mut self, mode: EnemyMode, entity: &Entity, effects: &mut EffectQueue) {
        self.state.mode = mode;
        let position = entity.transform.position;
        let clip = match mode {
            EnemyMode::Idle => self.variant.idle_clip(),
            EnemyMode::Walk => {
                play_pitched(
                    effects,
                    &self.tuning.walk_sound,
                    position,
                    self.tuning.walk_pitch_variance,
                );
                self.variant.walk_clip()
            }
            EnemyMode::Jump => {
                play_pitched(
                    effects,
                    &self.tuning.jump_sound,
                    position,
                    self.tuning.jump_pitch_variance,
                );
                self.variant.idle_clip()
            }
        };
        effects.push(Effect::PlayAnimation {
            entity: entity.id,
            clip,
        });
        debug!(
            enemy = entity.id.0,
            ?mode,
            dwell = self.state.time_left_in_mode,
            "enemy_mode_rolled"
        );
    }

    /// Per-mode movement. Returns `true` on the tick a jump fires.
    pub(crate) fn fixed_update(&mut self, entity: &mut Entity, probe: &dyn PhysicsQuery) -> bool {
        let position = entity.transform.position;
        let Some(body) = entity.body.as_mut() else {
            return false;
        };
        let aabb = body.aabb_at(position);
        let mut jumped = false;
        match self.state.mode {
            EnemyMode::Idle => {
                if is_on_ground(&aabb, self.tuning.ground_check_distance, probe) {
                    body.velocity.x = 0.0;
                }
            }
            EnemyMode::Jump => {
                if is_on_ground(&aabb, self.tuning.ground_check_distance, probe) {
                    body.velocity.y = self.tuning.jump_force;
                    self.state.mode = EnemyMode::Walk;
                    jumped = true;
                }
            }
            EnemyMode::Walk => {
                if is_against_wall(
                    &aabb,
                    self.state.facing_right,
                    self.tuning.wall_probe_lift,
                    self.tuning.ground_check_distance,
                    probe,
                ) {
                    self.state.facing_right = !self.state.facing_right;
                }
                let sign = if self.state.facing_right { 1.0 } else { -1.0 };
                body.velocity.x = self.tuning.walk_speed * sign;
            }
        }
        entity.transform.flip_x = !self.state.facing_right;
        jumped
    }

    /// Contact damage is unconditional; the knockback pushes the player away along
    /// the separation vector.
    pub(crate) fn contact_with_player(
        &self,
        enemy_position: Vec2,
        player_position: Vec2,
    ) -> ContactHit {
        ContactHit {
            damage: self.tuning.contact_damage,
            impulse: (player_position - enemy_position) * self.tuning.knockback_scale,
        }
    }

    pub(crate) fn take_damage(&self, entity: EntityId, effects: &mut EffectQueue) {
        effects.push(Effect::PlayAnimation {
            entity,
            clip: CLIP_SHARED_DAMAGE,
        });
    }
}

/// Publishes the defeat, plays its sound and returns the collectible to spawn in
/// the enemy's place, if any. The caller removes the entity.
pub(crate) fn accept_defeat(
    entity: &Entity,
    defeat_sound: &str,
    replacement: Option<PickupKind>,
    bus: &mut EventBus,
    effects: &mut EffectQueue,
) -> Option<Replacement> {
    bus.publish(GameEvent::EnemyDefeated { enemy: entity.id });
    effects.play_sound(defeat_sound, entity.transform.position);
    replacement.map(|kind| Replacement::from_entity(kind, entity))
}

fn play_pitched(effects: &mut EffectQueue, clip: &str, position: Vec2, variance: f32) {
    if clip.is_empty() {
        return;
    }
    effects.push(Effect::PlaySound {
        clip: clip.to_string(),
        position,
        pitch_variance: Some(variance),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::gameplay::events::GameEventKind;
    use engine::{Body, SceneWorld, SpawnDesc, SurfaceLayer};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Probe {
        ground: bool,
        wall: bool,
    }

    impl PhysicsQuery for Probe {
        fn raycast(&self, _: Vec2, direction: Vec2, _: f32, layer: SurfaceLayer) -> bool {
            layer == SurfaceLayer::Ground
                && if direction.y < 0.0 {
                    self.ground
                } else {
                    self.wall
                }
        }
    }

    fn spider_world() -> (SceneWorld, EntityId) {
        let mut world = SceneWorld::default();
        let id = world.spawn(
            SpawnDesc::new("spider", Vec2::new(4.0, 1.3))
                .with_body(Body::dynamic(Vec2::new(0.45, 0.3), 6.0)),
        );
        world.apply_pending();
        (world, id)
    }

    #[test]
    fn starts_walking_and_rolls_almost_immediately() {
        let (world, id) = spider_world();
        let entity = world.find_entity(id).expect("spider");
        let mut fsm = EnemyStateMachine::new(EnemyVariant::Spider, EnemyTuning::default());
        let mut rng = StdRng::seed_from_u64(3);
        let mut effects = EffectQueue::default();
        assert_eq!(fsm.state().mode, EnemyMode::Walk);

        let rolled = fsm
            .frame_update(0.02, true, &mut rng, entity, &mut effects)
            .expect("mapped mode");
        assert!(rolled.is_some());
        assert!(!effects.is_empty());
    }

    #[test]
    fn dwell_times_stay_within_configured_range() {
        let (world, id) = spider_world();
        let entity = world.find_entity(id).expect("spider");
        let mut fsm = EnemyStateMachine::new(EnemyVariant::Spider, EnemyTuning::default());
        let mut rng = StdRng::seed_from_u64(11);
        let mut effects = EffectQueue::default();
        let mut modes_seen = [false; 3];

        for _ in 0..20_000 {
            if let Some(mode) = fsm
                .frame_update(0.05, true, &mut rng, entity, &mut effects)
                .expect("mapped mode")
            {
                modes_seen[mode as usize - 1] = true;
                let dwell = fsm.state().time_left_in_mode;
                assert!((0.1..=1.5).contains(&dwell), "dwell {dwell} out of range");
            }
            effects.clear();
        }
        assert_eq!(modes_seen, [true; 3]);
    }

    #[test]
    fn frozen_outside_play() {
        let (world, id) = spider_world();
        let entity = world.find_entity(id).expect("spider");
        let mut fsm = EnemyStateMachine::new(EnemyVariant::Spider, EnemyTuning::default());
        let mut rng = StdRng::seed_from_u64(1);
        let mut effects = EffectQueue::default();

        let rolled = fsm
            .frame_update(5.0, false, &mut rng, entity, &mut effects)
            .expect("mapped mode");
        assert_eq!(rolled, None);
        assert_eq!(fsm.state().time_left_in_mode, 0.01);
    }

    #[test]
    fn jump_lasts_one_grounded_tick_then_walks() {
        let (mut world, id) = spider_world();
        let mut fsm = EnemyStateMachine::new(EnemyVariant::Spider, EnemyTuning::default());
        fsm.state.mode = EnemyMode::Jump;
        let airborne = Probe {
            ground: false,
            wall: false,
        };
        let grounded = Probe {
            ground: true,
            wall: false,
        };

        let entity = world.find_entity_mut(id).expect("spider");
        assert!(!fsm.fixed_update(entity, &airborne));
        assert_eq!(fsm.state().mode, EnemyMode::Jump);

        assert!(fsm.fixed_update(entity, &grounded));
        assert_eq!(fsm.state().mode, EnemyMode::Walk);
        assert_eq!(entity.body.map(|body| body.velocity.y), Some(22.0));
    }

    #[test]
    fn walking_turns_around_at_walls_before_moving() {
        let (mut world, id) = spider_world();
        let mut fsm = EnemyStateMachine::new(EnemyVariant::Spider, EnemyTuning::default());
        let wall = Probe {
            ground: true,
            wall: true,
        };

        let entity = world.find_entity_mut(id).expect("spider");
        fsm.fixed_update(entity, &wall);
        assert!(!fsm.state().facing_right);
        assert_eq!(entity.body.map(|body| body.velocity.x), Some(-3.0));
        assert!(entity.transform.flip_x);
    }

    #[test]
    fn idle_stops_only_on_the_ground() {
        let (mut world, id) = spider_world();
        let mut fsm = EnemyStateMachine::new(EnemyVariant::Spider, EnemyTuning::default());
        fsm.state.mode = EnemyMode::Idle;
        let entity = world.find_entity_mut(id).expect("spider");
        if let Some(body) = entity.body.as_mut() {
            body.velocity.x = 3.0;
        }

        fsm.fixed_update(
            entity,
            &Probe {
                ground: false,
                wall: false,
            },
        );
        assert_eq!(entity.body.map(|body| body.velocity.x), Some(3.0));

        fsm.fixed_update(
            entity,
            &Probe {
                ground: true,
                wall: false,
            },
        );
        assert_eq!(entity.body.map(|body| body.velocity.x), Some(0.0));
    }

    #[test]
    fn contact_knockback_follows_separation() {
        let fsm = EnemyStateMachine::new(EnemyVariant::Spider, EnemyTuning::default());
        let hit = fsm.contact_with_player(Vec2::new(4.0, 1.0), Vec2::new(5.0, 1.5));
        assert_eq!(hit.damage, 3);
        assert_eq!(hit.impulse, Vec2::new(3.0, 1.5));
    }

    #[test]
    fn unmapped_mode_values_are_errors() {
        assert_eq!(EnemyMode::try_from(2), Ok(EnemyMode::Walk));
        assert_eq!(
            EnemyMode::try_from(0),
            Err(GameplayError::UnmappedEnemyState(0))
        );
        assert_eq!(
            EnemyMode::try_from(4),
            Err(GameplayError::UnmappedEnemyState(4))
        );
    }

    #[test]
    fn defeat_publishes_and_hands_over_momentum() {
        let (mut world, id) = spider_world();
        if let Some(body) = world.find_entity_mut(id).and_then(|entity| entity.body.as_mut()) {
            body.velocity = Vec2::new(-3.0, 4.0);
        }
        let entity = world.find_entity(id).expect("spider");
        let mut bus = EventBus::default();
        let mut effects = EffectQueue::default();

        let replacement = accept_defeat(
            entity,
            "spider_defeat",
            Some(PickupKind::Food),
            &mut bus,
            &mut effects,
        )
        .expect("replacement");

        assert_eq!(replacement.kind, PickupKind::Food);
        assert_eq!(replacement.velocity, Vec2::new(-3.0, 4.0));
        assert_eq!(replacement.gravity_scale, 6.0);
        assert_eq!(bus.published_count(GameEventKind::EnemyDefeated), 1);
        assert_eq!(accept_defeat(entity, "", None, &mut bus, &mut effects), None);
    }
}
