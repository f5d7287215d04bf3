use engine::{Body, SpawnDesc, Vec2};
use serde::{Deserialize, Serialize};

pub(crate) const TAG_PLAYER: &str = "Player";
pub(crate) const TAG_ENEMY: &str = "Enemy";
pub(crate) const TAG_IMMUNE: &str = "immune";
pub(crate) const TAG_PROJECTILE: &str = "Projectile";
pub(crate) const TAG_SLIME: &str = "Slime";
pub(crate) const TAG_FOOD: &str = "Food";
pub(crate) const TAG_DOOR: &str = "Door";
pub(crate) const TAG_GATED: &str = "Gated";
pub(crate) const TAG_EXIT: &str = "Exit";

const PICKUP_HALF_EXTENTS: Vec2 = Vec2::new(0.3, 0.3);
const PROJECTILE_HALF_EXTENTS: Vec2 = Vec2::new(0.15, 0.15);
const DOOR_TRIGGER_HALF_EXTENTS: Vec2 = Vec2::new(1.0, 1.0);
const MARKER_HALF_EXTENTS: Vec2 = Vec2::new(0.5, 0.5);
const PICKUP_GRAVITY_SCALE: f32 = 3.0;

/// Collectible left behind by a defeated or slimed enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum PickupKind {
    Slime,
    Food,
}

impl PickupKind {
    pub(crate) fn tag(self) -> &'static str {
        match self {
            Self::Slime => TAG_SLIME,
            Self::Food => TAG_FOOD,
        }
    }

    fn entity_name(self) -> &'static str {
        match self {
            Self::Slime => "slime",
            Self::Food => "food",
        }
    }
}

/// Places a body of `half_height` so it rests on the floor of the cell whose
/// bottom-centre is `floor`.
pub(crate) fn standing_on(floor: Vec2, half_height: f32) -> Vec2 {
    Vec2::new(floor.x, floor.y + half_height + 0.01)
}

pub(crate) fn player(position: Vec2, half_extents: Vec2, gravity_scale: f32) -> SpawnDesc {
    SpawnDesc::new("player", position)
        .with_body(Body::dynamic(half_extents, gravity_scale))
        .with_tag(TAG_PLAYER)
}

pub(crate) fn enemy(
    name: &'static str,
    position: Vec2,
    half_extents: Vec2,
    gravity_scale: f32,
    immune: bool,
) -> SpawnDesc {
    let desc = SpawnDesc::new(name, position)
        .with_body(Body::dynamic(half_extents, gravity_scale))
        .with_tag(TAG_ENEMY);
    if immune {
        desc.with_tag(TAG_IMMUNE)
    } else {
        desc
    }
}

/// Pickup placed by the level layout, at rest.
pub(crate) fn pickup(kind: PickupKind, position: Vec2) -> SpawnDesc {
    dropped_pickup(kind, position, Vec2::ZERO, PICKUP_GRAVITY_SCALE)
}

pub(crate) fn dropped_pickup(
    kind: PickupKind,
    position: Vec2,
    velocity: Vec2,
    gravity_scale: f32,
) -> SpawnDesc {
    let mut body = Body::dynamic(PICKUP_HALF_EXTENTS, gravity_scale);
    body.velocity = velocity;
    SpawnDesc::new(kind.entity_name(), position)
        .with_body(body)
        .with_tag(kind.tag())
}

pub(crate) fn pickup_half_height() -> f32 {
    PICKUP_HALF_EXTENTS.y
}

pub(crate) fn projectile(position: Vec2, velocity: Vec2) -> SpawnDesc {
    let mut body = Body::dynamic(PROJECTILE_HALF_EXTENTS, 0.0);
    body.velocity = velocity;
    SpawnDesc::new("projectile", position)
        .with_body(body)
        .with_tag(TAG_PROJECTILE)
}

pub(crate) fn door(position: Vec2) -> SpawnDesc {
    SpawnDesc::new("door", position)
        .with_body(Body::sensor(DOOR_TRIGGER_HALF_EXTENTS))
        .with_tag(TAG_DOOR)
}

pub(crate) fn gated_marker(position: Vec2) -> SpawnDesc {
    SpawnDesc::new("gated", position)
        .with_body(Body::sensor(MARKER_HALF_EXTENTS))
        .with_tag(TAG_GATED)
        .inactive()
}

/// Exit trigger. A gated exit stays inactive until its door opens.
pub(crate) fn exit(position: Vec2, gated: bool) -> SpawnDesc {
    let desc = SpawnDesc::new("exit", position)
        .with_body(Body::sensor(MARKER_HALF_EXTENTS))
        .with_tag(TAG_EXIT);
    if gated {
        desc.with_tag(TAG_GATED).inactive()
    } else {
        desc
    }
}
