use engine::{
    Aabb, Effect, EffectQueue, Entity, InputSnapshot, PhysicsQuery, SurfaceLayer, Vec2,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

const CLIP_IDLE: &str = "player_idle";
const CLIP_WALK: &str = "player_walk";
const CLIP_DAMAGE: &str = "player_damage";
const CLIP_FAINT: &str = "player_faint";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PlayerTuning {
    pub(crate) speed: f32,
    pub(crate) jump_force: f32,
    pub(crate) gravity_fall: f32,
    pub(crate) gravity_float: f32,
    pub(crate) coyote_time: f32,
    pub(crate) early_jump_time: f32,
    pub(crate) max_jumps: u32,
    pub(crate) ground_check_distance: f32,
    pub(crate) knockback_seconds: f32,
    pub(crate) faint_seconds: f32,
    pub(crate) half_extents: Vec2,
    pub(crate) shot_hp_cost: u32,
    pub(crate) food_hp_boost: u32,
    pub(crate) jump_sound: String,
    pub(crate) fail_sound: String,
    pub(crate) hurt_sound: String,
    pub(crate) collect_sound: String,
    pub(crate) eat_sound: String,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            speed: 10.0,
            jump_force: 20.0,
            gravity_fall: 12.0,
            gravity_float: 5.0,
            coyote_time: 0.05,
            early_jump_time: 0.05,
            max_jumps: 2,
            ground_check_distance: 0.0625,
            knockback_seconds: 0.2,
            faint_seconds: 3.0,
            half_extents: Vec2::new(0.4, 0.45),
            shot_hp_cost: 1,
            food_hp_boost: 3,
            jump_sound: "player_jump".to_string(),
            fail_sound: "player_fail".to_string(),
            hurt_sound: "player_hurt".to_string(),
            collect_sound: "slime_collect".to_string(),
            eat_sound: "food_eat".to_string(),
        }
    }
}

/// Two downward probes from the bottom corners; either hit counts.
pub(crate) fn is_on_ground(aabb: &Aabb, distance: f32, probe: &dyn PhysicsQuery) -> bool {
    let down = Vec2::new(0.0, -1.0);
    probe.raycast(aabb.bottom_left(), down, distance, SurfaceLayer::Ground)
        || probe.raycast(aabb.bottom_right(), down, distance, SurfaceLayer::Ground)
}

/// One forward probe from the leading edge, `lift` above the bottom.
pub(crate) fn is_against_wall(
    aabb: &Aabb,
    facing_right: bool,
    lift: f32,
    distance: f32,
    probe: &dyn PhysicsQuery,
) -> bool {
    let (x, direction) = if facing_right {
        (aabb.max().x, Vec2::new(1.0, 0.0))
    } else {
        (aabb.min().x, Vec2::new(-1.0, 0.0))
    };
    let origin = Vec2::new(x, aabb.min().y + lift);
    probe.raycast(origin, direction, distance, SurfaceLayer::Ground)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocomotionPhase {
    Grounded,
    Airborne,
    Knockback,
    /// Terminal. The scene reloads after the faint delay.
    Fainting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LocomotionState {
    pub(crate) facing_right: bool,
    pub(crate) horizontal_input: f32,
    pub(crate) jump_requested: bool,
    pub(crate) jump_held: bool,
    pub(crate) coyote_time_left: f32,
    pub(crate) early_jump_time_left: f32,
    pub(crate) jumps_remaining: u32,
    pub(crate) grounded: bool,
    pub(crate) has_left_ground: bool,
    pub(crate) in_knockback: bool,
    pub(crate) fainting: bool,
}

impl LocomotionState {
    fn new(max_jumps: u32) -> Self {
        Self {
            facing_right: true,
            horizontal_input: 0.0,
            jump_requested: false,
            jump_held: false,
            coyote_time_left: 0.0,
            early_jump_time_left: 0.0,
            jumps_remaining: max_jumps,
            grounded: false,
            has_left_ground: false,
            in_knockback: false,
            fainting: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JumpSource {
    Ground,
    Coyote,
    AirJump,
}

/// Button edges the scene acts on after a frame update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FrameIntent {
    pub(crate) fire: bool,
    pub(crate) cycle_shot: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FixedReport {
    pub(crate) grounded: bool,
    pub(crate) landed: bool,
    pub(crate) jump: Option<JumpSource>,
}

/// Player movement: coyote time, buffered early jump, multi-jump budget,
/// floaty ascent and knockback lockout.
#[derive(Debug)]
pub(crate) struct LocomotionController {
    tuning: PlayerTuning,
    state: LocomotionState,
    current_clip: Option<&'static str>,
}

impl LocomotionController {
    pub(crate) fn new(tuning: PlayerTuning) -> Self {
        let state = LocomotionState::new(tuning.max_jumps);
        Self {
            tuning,
            state,
            current_clip: None,
        }
    }

    pub(crate) fn state(&self) -> &LocomotionState {
        &self.state
    }

    pub(crate) fn facing_sign(&self) -> f32 {
        if self.state.facing_right {
            1.0
        } else {
            -1.0
        }
    }

    pub(crate) fn phase(&self) -> LocomotionPhase {
        if self.state.fainting {
            LocomotionPhase::Fainting
        } else if self.state.in_knockback {
            LocomotionPhase::Knockback
        } else if self.state.grounded {
            LocomotionPhase::Grounded
        } else {
            LocomotionPhase::Airborne
        }
    }

    /// Variable-step sampling of input and visuals.
    pub(crate) fn frame_update(
        &mut self,
        dt: f32,
        input: &InputSnapshot,
        playing: bool,
        entity: &mut Entity,
        effects: &mut EffectQueue,
    ) -> FrameIntent {
        if !playing || self.state.fainting {
            return FrameIntent::default();
        }

        self.state.coyote_time_left = (self.state.coyote_time_left - dt).max(0.0);
        self.state.early_jump_time_left = (self.state.early_jump_time_left - dt).max(0.0);

        if input.jump_pressed() {
            self.state.jump_requested = true;
            self.state.early_jump_time_left = self.tuning.early_jump_time;
        }
        self.state.jump_held = input.jump_held();
        self.state.horizontal_input = input.move_axis();

        let axis = self.state.horizontal_input;
        if (axis > 0.0 && !self.state.facing_right) || (axis < 0.0 && self.state.facing_right) {
            self.state.facing_right = !self.state.facing_right;
        }
        entity.transform.flip_x = !self.state.facing_right;

        let clip = if axis == 0.0 { CLIP_IDLE } else { CLIP_WALK };
        self.play_clip(entity, clip, effects);

        FrameIntent {
            fire: input.fire_pressed(),
            cycle_shot: input.cycle_shot_pressed(),
        }
    }

    /// Physics-coupled movement and jump resolution.
    pub(crate) fn fixed_update(
        &mut self,
        entity: &mut Entity,
        probe: &dyn PhysicsQuery,
        effects: &mut EffectQueue,
    ) -> FixedReport {
        if self.state.fainting || self.state.in_knockback {
            return FixedReport::default();
        }
        let position = entity.transform.position;
        let Some(body) = entity.body.as_mut() else {
            return FixedReport::default();
        };

        body.velocity.x = self.state.horizontal_input * self.tuning.speed;

        let grounded = is_on_ground(
            &body.aabb_at(position),
            self.tuning.ground_check_distance,
            probe,
        );
        self.state.grounded = grounded;
        let buffered = self.state.jump_requested || self.state.early_jump_time_left > 0.0;

        if !self.state.has_left_ground && !grounded {
            self.state.coyote_time_left = self.tuning.coyote_time;
            self.state.has_left_ground = true;
        }

        let mut report = FixedReport {
            grounded,
            ..FixedReport::default()
        };
        if (self.state.coyote_time_left > 0.0 || self.state.has_left_ground) && grounded {
            self.state.coyote_time_left = 0.0;
            self.state.early_jump_time_left = 0.0;
            self.state.has_left_ground = false;
            self.state.jumps_remaining = self.tuning.max_jumps;
            report.landed = true;
        }

        if buffered {
            self.state.jump_requested = false;
            let source = if grounded {
                Some(JumpSource::Ground)
            } else if self.state.coyote_time_left > 0.0 {
                Some(JumpSource::Coyote)
            } else if self.state.jumps_remaining > 0 {
                Some(JumpSource::AirJump)
            } else {
                None
            };
            if let Some(source) = source {
                body.velocity.y = self.tuning.jump_force;
                self.state.coyote_time_left = 0.0;
                self.state.early_jump_time_left = 0.0;
                self.state.has_left_ground = true;
                self.state.grounded = false;
                self.state.jumps_remaining = self.state.jumps_remaining.saturating_sub(1);
                effects.play_sound(&self.tuning.jump_sound, position);
                debug!(
                    ?source,
                    jumps_remaining = self.state.jumps_remaining,
                    "player_jumped"
                );
                report.jump = Some(source);
            }
        }

        body.gravity_scale = if self.state.jump_held && body.velocity.y > 0.0 {
            self.tuning.gravity_float
        } else {
            self.tuning.gravity_fall
        };
        report
    }

    /// Applies an external impulse and suspends control. Returns how long control
    /// stays suspended, or `None` when the player is fainting.
    pub(crate) fn knock_back(&mut self, impulse: Vec2, entity: &mut Entity) -> Option<f32> {
        if self.state.fainting {
            return None;
        }
        let body = entity.body.as_mut()?;
        body.apply_impulse(impulse);
        self.state.in_knockback = true;
        Some(self.tuning.knockback_seconds)
    }

    pub(crate) fn return_control(&mut self) {
        self.state.in_knockback = false;
    }

    pub(crate) fn take_damage(&mut self, entity: &Entity, effects: &mut EffectQueue) {
        if self.state.fainting {
            return;
        }
        self.play_clip(entity, CLIP_DAMAGE, effects);
    }

    /// Enters `Fainting`. Returns `true` the first time only; the caller schedules
    /// the reload.
    pub(crate) fn accept_defeat(&mut self, entity: &Entity, effects: &mut EffectQueue) -> bool {
        if self.state.fainting {
            return false;
        }
        self.state.fainting = true;
        self.state.jump_requested = false;
        self.play_clip(entity, CLIP_FAINT, effects);
        effects.play_sound(&self.tuning.fail_sound, entity.transform.position);
        true
    }

    fn play_clip(&mut self, entity: &Entity, clip: &'static str, effects: &mut EffectQueue) {
        if self.current_clip == Some(clip) {
            return;
        }
        self.current_clip = Some(clip);
        effects.push(Effect::PlayAnimation {
            entity: entity.id,
            clip,
        });
    }
}
