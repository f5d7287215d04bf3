use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::geometry::{Aabb, Vec2};
use super::scene::EntityId;
use super::tilemap::{SurfaceLayer, Tilemap};

const SKIN: f32 = 0.001;
pub const CONTACT_TOLERANCE: f32 = 0.01;

/// Read-only ray queries against level geometry.
pub trait PhysicsQuery {
    fn raycast(&self, origin: Vec2, direction: Vec2, max_distance: f32, layer: SurfaceLayer)
        -> bool;
}

impl PhysicsQuery for Tilemap {
    fn raycast(
        &self,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        layer: SurfaceLayer,
    ) -> bool {
        self.raycast_layer(origin, direction, max_distance, layer)
    }
}

/// Query used when a world has no level geometry loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeometry;

impl PhysicsQuery for NoGeometry {
    fn raycast(&self, _: Vec2, _: Vec2, _: f32, _: SurfaceLayer) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    pub gravity: f32,
    pub terminal_velocity: f32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            terminal_velocity: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Dynamic,
    Static,
    /// Overlaps are reported but nothing collides with it.
    Sensor,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blocked {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl Blocked {
    pub fn any(&self) -> bool {
        self.left || self.right || self.up || self.down
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub kind: BodyKind,
    pub velocity: Vec2,
    pub gravity_scale: f32,
    pub half_extents: Vec2,
    pub blocked: Blocked,
}

impl Body {
    pub fn dynamic(half_extents: Vec2, gravity_scale: f32) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            velocity: Vec2::ZERO,
            gravity_scale,
            half_extents,
            blocked: Blocked::default(),
        }
    }

    pub fn fixed(half_extents: Vec2) -> Self {
        Self {
            kind: BodyKind::Static,
            ..Self::dynamic(half_extents, 0.0)
        }
    }

    pub fn sensor(half_extents: Vec2) -> Self {
        Self {
            kind: BodyKind::Sensor,
            ..Self::dynamic(half_extents, 0.0)
        }
    }

    /// Unit mass, so an impulse is a velocity change.
    pub fn apply_impulse(&mut self, impulse: Vec2) {
        self.velocity += impulse;
    }

    pub fn aabb_at(&self, position: Vec2) -> Aabb {
        Aabb::new(position, self.half_extents)
    }
}

/// Advances one dynamic body by `dt`, resolving against ground tiles one axis at a time.
pub(crate) fn integrate_body(
    position: &mut Vec2,
    body: &mut Body,
    settings: &PhysicsSettings,
    dt: f32,
    map: Option<&Tilemap>,
) {
    body.blocked = Blocked::default();
    if body.kind != BodyKind::Dynamic || dt <= 0.0 {
        return;
    }

    body.velocity.y -= settings.gravity * body.gravity_scale * dt;
    let terminal = settings.terminal_velocity.abs();
    body.velocity.y = body.velocity.y.clamp(-terminal, terminal);

    let Some(map) = map else {
        *position += body.velocity * dt;
        return;
    };

    resolve_horizontal(position, body, dt, map);
    resolve_vertical(position, body, dt, map);
}

fn cell_index(value: f32, origin: f32) -> i32 {
    (value - origin).floor() as i32
}

fn is_solid(map: &Tilemap, x: i32, y: i32) -> bool {
    if x < 0 || y < 0 {
        return false;
    }
    map.tile_at(x as u32, y as u32)
        .and_then(SurfaceLayer::from_tile)
        == Some(SurfaceLayer::Ground)
}

fn resolve_horizontal(position: &mut Vec2, body: &mut Body, dt: f32, map: &Tilemap) {
    let velocity = body.velocity.x;
    if velocity.abs() < f32::EPSILON {
        return;
    }

    let half = body.half_extents;
    let origin = map.origin();
    let new_x = position.x + velocity * dt;
    let min_tile_y = cell_index(position.y - half.y + SKIN, origin.y);
    let max_tile_y = cell_index(position.y + half.y - SKIN, origin.y);

    if velocity > 0.0 {
        let tile_x = cell_index(new_x + half.x, origin.x);
        if (min_tile_y..=max_tile_y).any(|ty| is_solid(map, tile_x, ty)) {
            position.x = origin.x + tile_x as f32 - half.x - SKIN;
            body.velocity.x = 0.0;
            body.blocked.right = true;
            return;
        }
    } else {
        let tile_x = cell_index(new_x - half.x, origin.x);
        if (min_tile_y..=max_tile_y).any(|ty| is_solid(map, tile_x, ty)) {
            position.x = origin.x + (tile_x + 1) as f32 + half.x + SKIN;
            body.velocity.x = 0.0;
            body.blocked.left = true;
            return;
        }
    }

    position.x = new_x;
}

fn resolve_vertical(position: &mut Vec2, body: &mut Body, dt: f32, map: &Tilemap) {
    let velocity = body.velocity.y;
    if velocity.abs() < f32::EPSILON {
        return;
    }

    let half = body.half_extents;
    let origin = map.origin();
    let new_y = position.y + velocity * dt;
    let min_tile_x = cell_index(position.x - half.x + SKIN, origin.x);
    let max_tile_x = cell_index(position.x + half.x - SKIN, origin.x);

    if velocity < 0.0 {
        let tile_y = cell_index(new_y - half.y, origin.y);
        if (min_tile_x..=max_tile_x).any(|tx| is_solid(map, tx, tile_y)) {
            position.y = origin.y + (tile_y + 1) as f32 + half.y + SKIN;
            body.velocity.y = 0.0;
            body.blocked.down = true;
            return;
        }
    } else {
        let tile_y = cell_index(new_y + half.y, origin.y);
        if (min_tile_x..=max_tile_x).any(|tx| is_solid(map, tx, tile_y)) {
            position.y = origin.y + tile_y as f32 - half.y - SKIN;
            body.velocity.y = 0.0;
            body.blocked.up = true;
            return;
        }
    }

    position.y = new_y;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPhase {
    Enter,
    Stay,
    Exit,
}

/// Contact between two entities; `a` always has the lower id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEvent {
    pub a: EntityId,
    pub b: EntityId,
    pub phase: ContactPhase,
}

impl ContactEvent {
    pub fn involves(&self, id: EntityId) -> bool {
        self.a == id || self.b == id
    }

    pub fn other(&self, id: EntityId) -> Option<EntityId> {
        if self.a == id {
            Some(self.b)
        } else if self.b == id {
            Some(self.a)
        } else {
            None
        }
    }
}

pub(crate) fn ordered_pair(first: EntityId, second: EntityId) -> (EntityId, EntityId) {
    if first <= second {
        (first, second)
    } else {
        (second, first)
    }
}

#[derive(Debug, Default)]
pub(crate) struct ContactTracker {
    active: BTreeSet<(EntityId, EntityId)>,
}

impl ContactTracker {
    /// Diffs this step's overlaps against the previous step. Exits come first, then
    /// enters and stays in pair order.
    pub(crate) fn update(
        &mut self,
        overlapping: BTreeSet<(EntityId, EntityId)>,
    ) -> Vec<ContactEvent> {
        let mut events = Vec::new();
        for &(a, b) in self.active.difference(&overlapping) {
            events.push(ContactEvent {
                a,
                b,
                phase: ContactPhase::Exit,
            });
        }
        for &(a, b) in &overlapping {
            let phase = if self.active.contains(&(a, b)) {
                ContactPhase::Stay
            } else {
                ContactPhase::Enter
            };
            events.push(ContactEvent { a, b, phase });
        }
        self.active = overlapping;
        events
    }

    pub(crate) fn forget(&mut self, id: EntityId) {
        self.active.retain(|(a, b)| *a != id && *b != id);
    }

    pub(crate) fn clear(&mut self) {
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tilemap::{TILE_EMPTY, TILE_GROUND};

    fn ground_row_map() -> Tilemap {
        // 6 wide, 4 tall; bottom row is ground, plus a wall column at x = 5.
        let mut tiles = vec![TILE_EMPTY; 24];
        for x in 0..6 {
            tiles[x] = TILE_GROUND;
        }
        for y in 1..4 {
            tiles[y * 6 + 5] = TILE_GROUND;
        }
        Tilemap::new(6, 4, Vec2::ZERO, tiles).expect("tilemap")
    }

    #[test]
    fn falling_body_lands_on_ground_and_reports_down() {
        let map = ground_row_map();
        let settings = PhysicsSettings::default();
        let mut body = Body::dynamic(Vec2::new(0.4, 0.4), 1.0);
        let mut position = Vec2::new(1.5, 3.0);

        for _ in 0..200 {
            integrate_body(&mut position, &mut body, &settings, 0.02, Some(&map));
        }

        assert!(body.blocked.down);
        assert!((position.y - 1.401).abs() < 0.001);
        assert_eq!(body.velocity.y, 0.0);
    }

    #[test]
    fn horizontal_motion_stops_at_wall() {
        let map = ground_row_map();
        let settings = PhysicsSettings::default();
        let mut body = Body::dynamic(Vec2::new(0.4, 0.4), 0.0);
        let mut position = Vec2::new(3.5, 1.5);
        body.velocity.x = 10.0;

        let mut saw_block = false;
        for _ in 0..20 {
            body.velocity.x = 10.0;
            integrate_body(&mut position, &mut body, &settings, 0.02, Some(&map));
            saw_block |= body.blocked.right;
        }

        assert!(saw_block);
        assert!(position.x <= 5.0 - 0.4);
    }

    #[test]
    fn static_bodies_do_not_move() {
        let settings = PhysicsSettings::default();
        let mut body = Body::fixed(Vec2::new(0.5, 0.5));
        let mut position = Vec2::new(1.0, 1.0);
        integrate_body(&mut position, &mut body, &settings, 0.5, None);
        assert_eq!(position, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn contact_tracker_reports_enter_stay_exit() {
        let mut tracker = ContactTracker::default();
        let pair = ordered_pair(EntityId(4), EntityId(2));
        assert_eq!(pair, (EntityId(2), EntityId(4)));

        let first = tracker.update(BTreeSet::from([pair]));
        let second = tracker.update(BTreeSet::from([pair]));
        let third = tracker.update(BTreeSet::new());

        assert_eq!(first[0].phase, ContactPhase::Enter);
        assert_eq!(second[0].phase, ContactPhase::Stay);
        assert_eq!(third[0].phase, ContactPhase::Exit);
        assert_eq!(third[0].other(EntityId(2)), Some(EntityId(4)));
    }

    #[test]
    fn forgotten_entities_never_report_exit() {
        let mut tracker = ContactTracker::default();
        tracker.update(BTreeSet::from([(EntityId(1), EntityId(2))]));
        tracker.forget(EntityId(2));
        assert!(tracker.update(BTreeSet::new()).is_empty());
    }
}
