use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use super::clock::{FrameTime, SimClock};
use super::effects::EffectQueue;
use super::geometry::{Aabb, Vec2};
use super::input::{ActionStates, InputAction};
use super::physics::{
    integrate_body, ordered_pair, Body, BodyKind, ContactEvent, ContactTracker, NoGeometry,
    PhysicsQuery, PhysicsSettings, CONTACT_TOLERANCE,
};
use super::tilemap::{SurfaceLayer, Tilemap};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneKey(String);

impl SceneKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Load(SceneKey),
    Reload,
    Quit,
}

impl SceneCommand {
    pub fn is_none(&self) -> bool {
        matches!(self, SceneCommand::None)
    }

    /// Keeps the first non-`None` command.
    pub fn or(self, other: SceneCommand) -> SceneCommand {
        if self.is_none() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSnapshot {
    held: ActionStates,
    pressed: ActionStates,
    move_axis: f32,
    quit_requested: bool,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(held: ActionStates, pressed: ActionStates, move_axis: f32) -> Self {
        Self {
            held,
            pressed,
            move_axis: clamp_axis(move_axis),
            quit_requested: false,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.held.is_down(action)
    }

    pub fn was_pressed(&self, action: InputAction) -> bool {
        self.pressed.is_down(action)
    }

    pub fn move_axis(&self) -> f32 {
        self.move_axis
    }

    pub fn jump_pressed(&self) -> bool {
        self.was_pressed(InputAction::Jump)
    }

    pub fn jump_held(&self) -> bool {
        self.is_down(InputAction::Jump)
    }

    pub fn fire_pressed(&self) -> bool {
        self.was_pressed(InputAction::Fire)
    }

    pub fn cycle_shot_pressed(&self) -> bool {
        self.was_pressed(InputAction::CycleShot)
    }

    pub fn pause_toggle_pressed(&self) -> bool {
        self.was_pressed(InputAction::PauseToggle)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.held.set(action, is_down);
        self
    }

    /// Marks a press edge; the action also counts as held for this frame.
    pub fn with_action_pressed(mut self, action: InputAction) -> Self {
        self.pressed.set(action, true);
        self.held.set(action, true);
        self
    }

    pub fn with_move_axis(mut self, move_axis: f32) -> Self {
        self.move_axis = clamp_axis(move_axis);
        self
    }

    pub fn with_quit_requested(mut self, quit_requested: bool) -> Self {
        self.quit_requested = quit_requested;
        self
    }
}

fn clamp_axis(axis: f32) -> f32 {
    if axis.is_finite() {
        axis.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub rotation_radians: Option<f32>,
    /// Horizontal facing; `true` mirrors the visual to face left.
    pub flip_x: bool,
}

impl Transform {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpawnDesc {
    pub name: &'static str,
    pub transform: Transform,
    pub body: Option<Body>,
    pub tags: Vec<&'static str>,
    pub active: bool,
}

impl SpawnDesc {
    pub fn new(name: &'static str, position: Vec2) -> Self {
        Self {
            name,
            transform: Transform::at(position),
            body: None,
            tags: Vec::new(),
            active: true,
        }
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_tag(mut self, tag: &'static str) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub name: &'static str,
    pub transform: Transform,
    pub body: Option<Body>,
    pub tags: Vec<&'static str>,
    pub active: bool,
    applied_spawn_order: u64,
}

impl Entity {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| *candidate == tag)
    }

    pub fn aabb(&self) -> Option<Aabb> {
        self.body
            .map(|body| body.aabb_at(self.transform.position))
    }

    pub fn applied_spawn_order(&self) -> u64 {
        self.applied_spawn_order
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    next_applied_spawn_order: u64,
    tilemap: Option<Tilemap>,
    clock: SimClock,
    effects: EffectQueue,
    physics_settings: PhysicsSettings,
    contacts: ContactTracker,
    contact_events: Vec<ContactEvent>,
}

impl SceneWorld {
    pub fn spawn(&mut self, desc: SpawnDesc) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            name: desc.name,
            transform: desc.transform,
            body: desc.body,
            tags: desc.tags,
            active: desc.active,
            applied_spawn_order: 0,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.entities.iter().any(|entity| entity.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|entity| entity.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort();
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.entities
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            self.pending_spawns
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            self.contact_events.retain(|event| {
                pending.binary_search(&event.a).is_err() && pending.binary_search(&event.b).is_err()
            });
            for id in self.pending_despawns.drain(..) {
                self.contacts.forget(id);
            }
        }

        if !self.pending_spawns.is_empty() {
            for mut entity in self.pending_spawns.drain(..) {
                entity.applied_spawn_order = self.next_applied_spawn_order;
                self.next_applied_spawn_order = self.next_applied_spawn_order.saturating_add(1);
                self.entities.push(entity);
            }
        }
    }

    /// Drops every entity and contact. Tilemap, clock, physics settings and queued
    /// effects survive.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.next_applied_spawn_order = 0;
        self.contacts.clear();
        self.contact_events.clear();
    }

    pub fn set_tilemap(&mut self, tilemap: Tilemap) {
        self.tilemap = Some(tilemap);
    }

    pub fn clear_tilemap(&mut self) {
        self.tilemap = None;
    }

    pub fn tilemap(&self) -> Option<&Tilemap> {
        self.tilemap.as_ref()
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut SimClock {
        &mut self.clock
    }

    pub fn effects(&self) -> &EffectQueue {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectQueue {
        &mut self.effects
    }

    pub fn clock_and_effects_mut(&mut self) -> (&mut SimClock, &mut EffectQueue) {
        (&mut self.clock, &mut self.effects)
    }

    pub fn physics_settings(&self) -> &PhysicsSettings {
        &self.physics_settings
    }

    pub fn set_physics_settings(&mut self, settings: PhysicsSettings) {
        self.physics_settings = settings;
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    /// Applied and not queued for despawn.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.find_entity(id).is_some() && !self.pending_despawns.contains(&id)
    }

    pub fn ids_with_tag(&self, tag: &str) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|entity| entity.has_tag(tag))
            .map(|entity| entity.id)
            .collect()
    }

    /// Mutable entity together with a read-only view of level geometry and the
    /// effect queue.
    pub fn entity_parts_mut(
        &mut self,
        id: EntityId,
    ) -> Option<(&mut Entity, &dyn PhysicsQuery, &mut EffectQueue)> {
        let query: &dyn PhysicsQuery = match &self.tilemap {
            Some(tilemap) => tilemap,
            None => &NoGeometry,
        };
        let entity = self.entities.iter_mut().find(|entity| entity.id == id)?;
        Some((entity, query, &mut self.effects))
    }

    /// Integrates dynamic bodies and records contacts for the scene's next fixed tick.
    pub fn step_physics(&mut self, dt: f32) {
        let map = self.tilemap.as_ref();
        for entity in self.entities.iter_mut().filter(|entity| entity.active) {
            if let Some(body) = entity.body.as_mut() {
                integrate_body(
                    &mut entity.transform.position,
                    body,
                    &self.physics_settings,
                    dt,
                    map,
                );
            }
        }

        let mut overlapping = BTreeSet::new();
        let candidates: Vec<(EntityId, BodyKind, Aabb)> = self
            .entities
            .iter()
            .filter(|entity| entity.active)
            .filter_map(|entity| {
                let body = entity.body?;
                Some((entity.id, body.kind, body.aabb_at(entity.transform.position)))
            })
            .collect();
        for (index, (first_id, first_kind, first_box)) in candidates.iter().enumerate() {
            for (second_id, second_kind, second_box) in &candidates[index + 1..] {
                let either_dynamic =
                    *first_kind == BodyKind::Dynamic || *second_kind == BodyKind::Dynamic;
                if either_dynamic && first_box.overlaps(second_box, CONTACT_TOLERANCE) {
                    overlapping.insert(ordered_pair(*first_id, *second_id));
                }
            }
        }

        let events = self.contacts.update(overlapping);
        self.contact_events.extend(events);
    }

    pub fn take_contact_events(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.contact_events)
    }
}

impl PhysicsQuery for SceneWorld {
    fn raycast(
        &self,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        layer: SurfaceLayer,
    ) -> bool {
        self.tilemap
            .as_ref()
            .is_some_and(|tilemap| tilemap.raycast_layer(origin, direction, max_distance, layer))
    }
}

/// A loadable level or screen. `C` is the caller-owned context shared by every scene.
pub trait Scene<C> {
    fn load(&mut self, world: &mut SceneWorld, ctx: &mut C);
    fn update(
        &mut self,
        time: FrameTime,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        ctx: &mut C,
    ) -> SceneCommand;
    fn fixed_update(
        &mut self,
        fixed_dt_seconds: f32,
        world: &mut SceneWorld,
        ctx: &mut C,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld, ctx: &mut C);
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("unknown scene: {0}")]
    UnknownScene(SceneKey),
    #[error("no scene is loaded")]
    NoActiveScene,
}

struct SceneEntry<C> {
    key: SceneKey,
    scene: Box<dyn Scene<C>>,
}

/// Registry of keyed scenes sharing a single world. Loading a scene always unloads
/// the current one and starts the target from a cleared world.
pub struct SceneMachine<C> {
    scenes: Vec<SceneEntry<C>>,
    world: SceneWorld,
    active: Option<usize>,
}

impl<C> Default for SceneMachine<C> {
    fn default() -> Self {
        Self {
            scenes: Vec::new(),
            world: SceneWorld::default(),
            active: None,
        }
    }
}

impl<C> SceneMachine<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: SceneKey, scene: Box<dyn Scene<C>>) {
        match self.scenes.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.scene = scene,
            None => self.scenes.push(SceneEntry { key, scene }),
        }
    }

    pub fn scene_keys(&self) -> impl Iterator<Item = &SceneKey> {
        self.scenes.iter().map(|entry| &entry.key)
    }

    pub fn active_scene(&self) -> Option<&SceneKey> {
        self.active.map(|index| &self.scenes[index].key)
    }

    pub fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut SceneWorld {
        &mut self.world
    }

    pub fn load(&mut self, key: &SceneKey, ctx: &mut C) -> Result<(), SceneError> {
        let target = self
            .scenes
            .iter()
            .position(|entry| &entry.key == key)
            .ok_or_else(|| SceneError::UnknownScene(key.clone()))?;

        self.unload_active(ctx);
        self.world.clear();
        self.scenes[target].scene.load(&mut self.world, ctx);
        self.world.apply_pending();
        self.active = Some(target);
        Ok(())
    }

    pub fn reload(&mut self, ctx: &mut C) -> Result<(), SceneError> {
        let key = self
            .active_scene()
            .cloned()
            .ok_or(SceneError::NoActiveScene)?;
        self.load(&key, ctx)
    }

    pub fn update_active(
        &mut self,
        time: FrameTime,
        input: &InputSnapshot,
        ctx: &mut C,
    ) -> SceneCommand {
        let Some(index) = self.active else {
            return SceneCommand::None;
        };
        self.scenes[index]
            .scene
            .update(time, input, &mut self.world, ctx)
    }

    pub fn fixed_update_active(&mut self, fixed_dt_seconds: f32, ctx: &mut C) -> SceneCommand {
        let Some(index) = self.active else {
            return SceneCommand::None;
        };
        self.scenes[index]
            .scene
            .fixed_update(fixed_dt_seconds, &mut self.world, ctx)
    }

    pub fn apply_pending_active(&mut self) {
        self.world.apply_pending();
    }

    pub fn debug_title_active(&self) -> Option<String> {
        let index = self.active?;
        self.scenes[index].scene.debug_title(&self.world)
    }

    pub fn shutdown(&mut self, ctx: &mut C) {
        self.unload_active(ctx);
        self.world.clear();
    }

    fn unload_active(&mut self, ctx: &mut C) {
        if let Some(index) = self.active.take() {
            self.scenes[index].scene.unload(&mut self.world, ctx);
            self.world.apply_pending();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::physics::ContactPhase;
    use crate::app::tilemap::TILE_GROUND;

    fn make_tilemap(width: u32, height: u32, origin: Vec2, fill: u16) -> Tilemap {
        Tilemap::new(
            width,
            height,
            origin,
            vec![fill; width as usize * height as usize],
        )
        .expect("tilemap")
    }

    #[derive(Default)]
    struct Journal {
        lines: Vec<String>,
    }

    struct TestScene {
        name: &'static str,
        spawn_count: usize,
    }

    impl Scene<Journal> for TestScene {
        fn load(&mut self, world: &mut SceneWorld, ctx: &mut Journal) {
            for _ in 0..self.spawn_count {
                world.spawn(SpawnDesc::new("test", Vec2::ZERO));
            }
            ctx.lines.push(format!("load {}", self.name));
        }

        fn update(
            &mut self,
            _time: FrameTime,
            _input: &InputSnapshot,
            world: &mut SceneWorld,
            _ctx: &mut Journal,
        ) -> SceneCommand {
            if let Some(entity) = world.entities_mut().first_mut() {
                entity.transform.position.x += 1.0;
            }
            SceneCommand::None
        }

        fn fixed_update(
            &mut self,
            _fixed_dt_seconds: f32,
            _world: &mut SceneWorld,
            _ctx: &mut Journal,
        ) -> SceneCommand {
            SceneCommand::None
        }

        fn unload(&mut self, _world: &mut SceneWorld, ctx: &mut Journal) {
            ctx.lines.push(format!("unload {}", self.name));
        }
    }

    fn machine_with_two_scenes() -> SceneMachine<Journal> {
        let mut machine = SceneMachine::new();
        machine.register(
            SceneKey::new("a"),
            Box::new(TestScene {
                name: "a",
                spawn_count: 2,
            }),
        );
        machine.register(
            SceneKey::new("b"),
            Box::new(TestScene {
                name: "b",
                spawn_count: 1,
            }),
        );
        machine
    }

    #[test]
    fn allocator_never_reuses_ids() {
        let mut allocator = EntityIdAllocator::default();
        let first = allocator.allocate();
        let second = allocator.allocate();
        let third = allocator.allocate();

        assert_eq!(first.0, 0);
        assert_eq!(second.0, 1);
        assert_eq!(third.0, 2);
    }

    #[test]
    fn scene_world_spawn_and_despawn_updates_count() {
        let mut world = SceneWorld::default();
        let id = world.spawn(SpawnDesc::new("spawned", Vec2::ZERO));
        assert!(!world.is_alive(id));
        world.apply_pending();
        assert_eq!(world.entity_count(), 1);
        assert!(world.is_alive(id));

        world.despawn(id);
        assert!(!world.is_alive(id));
        world.apply_pending();
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn scene_world_duplicate_pending_despawns_are_safe_and_idempotent() {
        let mut world = SceneWorld::default();
        let doomed = world.spawn(SpawnDesc::new("doomed", Vec2::ZERO));
        let survivor = world.spawn(SpawnDesc::new("survivor", Vec2::new(3.0, 1.0)));
        world.apply_pending();
        assert_eq!(world.entity_count(), 2);

        assert!(world.despawn(doomed));
        assert!(world.despawn(doomed));
        assert!(world.despawn(doomed));
        world.apply_pending();

        assert_eq!(world.entity_count(), 1);
        assert!(world.find_entity(doomed).is_none());
        assert!(world.find_entity(survivor).is_some());
        assert!(!world.despawn(doomed));
    }

    #[test]
    fn despawn_before_apply_cancels_the_spawn() {
        let mut world = SceneWorld::default();
        let id = world.spawn(SpawnDesc::new("short_lived", Vec2::ZERO));
        assert!(world.despawn(id));
        world.apply_pending();
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn ids_with_tag_filters_entities() {
        let mut world = SceneWorld::default();
        let enemy = world.spawn(SpawnDesc::new("spider", Vec2::ZERO).with_tag("Enemy"));
        world.spawn(SpawnDesc::new("food", Vec2::ZERO).with_tag("Food"));
        world.apply_pending();
        assert_eq!(world.ids_with_tag("Enemy"), vec![enemy]);
    }

    #[test]
    fn load_unloads_previous_scene_and_starts_fresh() {
        let mut machine = machine_with_two_scenes();
        let mut journal = Journal::default();

        machine
            .load(&SceneKey::new("a"), &mut journal)
            .expect("load a");
        assert_eq!(machine.world().entity_count(), 2);

        machine
            .load(&SceneKey::new("b"), &mut journal)
            .expect("load b");
        assert_eq!(machine.world().entity_count(), 1);
        assert_eq!(machine.active_scene(), Some(&SceneKey::new("b")));
        assert_eq!(journal.lines, vec!["load a", "unload a", "load b"]);
    }

    #[test]
    fn reload_recreates_scene_state() {
        let mut machine = machine_with_two_scenes();
        let mut journal = Journal::default();
        machine
            .load(&SceneKey::new("a"), &mut journal)
            .expect("load a");

        let _ = machine.update_active(
            FrameTime::unscaled(0.1),
            &InputSnapshot::empty(),
            &mut journal,
        );
        assert_eq!(machine.world().entities()[0].transform.position.x, 1.0);

        machine.reload(&mut journal).expect("reload");
        assert_eq!(machine.world().entity_count(), 2);
        assert_eq!(machine.world().entities()[0].transform.position, Vec2::ZERO);
    }

    #[test]
    fn unknown_scene_is_an_error_and_keeps_current_scene() {
        let mut machine = machine_with_two_scenes();
        let mut journal = Journal::default();
        machine
            .load(&SceneKey::new("a"), &mut journal)
            .expect("load a");

        let result = machine.load(&SceneKey::new("missing"), &mut journal);
        assert_eq!(
            result,
            Err(SceneError::UnknownScene(SceneKey::new("missing")))
        );
        assert_eq!(machine.active_scene(), Some(&SceneKey::new("a")));
    }

    #[test]
    fn reload_without_active_scene_fails() {
        let mut machine = machine_with_two_scenes();
        let mut journal = Journal::default();
        assert_eq!(machine.reload(&mut journal), Err(SceneError::NoActiveScene));
    }

    #[test]
    fn shutdown_unloads_active_scene() {
        let mut machine = machine_with_two_scenes();
        let mut journal = Journal::default();
        machine
            .load(&SceneKey::new("b"), &mut journal)
            .expect("load b");
        machine.shutdown(&mut journal);
        assert_eq!(journal.lines.last().map(String::as_str), Some("unload b"));
        assert_eq!(machine.active_scene(), None);
        assert_eq!(machine.world().entity_count(), 0);
    }

    #[test]
    fn scene_world_clear_preserves_tilemap_and_clock() {
        let mut world = SceneWorld::default();
        world.set_tilemap(make_tilemap(2, 2, Vec2::ZERO, 0));
        world.clock_mut().set_timescale(0.0);
        world.spawn(SpawnDesc::new("temp", Vec2::ZERO));
        world.apply_pending();

        world.clear();

        assert_eq!(world.entity_count(), 0);
        assert!(world.tilemap().is_some());
        assert!(world.clock().is_frozen());
    }

    #[test]
    fn clear_tilemap_explicitly_removes_tilemap() {
        let mut world = SceneWorld::default();
        world.set_tilemap(make_tilemap(1, 1, Vec2::ZERO, 0));
        world.clear_tilemap();
        assert!(world.tilemap().is_none());
    }

    #[test]
    fn world_raycast_without_tilemap_never_hits() {
        let mut world = SceneWorld::default();
        assert!(!world.raycast(Vec2::ZERO, Vec2::new(0.0, -1.0), 10.0, SurfaceLayer::Ground));

        world.set_tilemap(make_tilemap(2, 2, Vec2::new(-1.0, -2.0), TILE_GROUND));
        assert!(world.raycast(Vec2::ZERO, Vec2::new(0.0, -1.0), 0.1, SurfaceLayer::Ground));
    }

    #[test]
    fn entity_parts_share_the_world_geometry_and_effects() {
        let mut world = SceneWorld::default();
        world.set_tilemap(make_tilemap(2, 1, Vec2::ZERO, TILE_GROUND));
        let id = world.spawn(SpawnDesc::new("probe", Vec2::new(0.5, 1.2)));
        assert!(world.entity_parts_mut(id).is_none());
        world.apply_pending();

        let (entity, query, effects) = world.entity_parts_mut(id).expect("applied entity");
        entity.transform.flip_x = true;
        assert!(query.raycast(
            entity.transform.position,
            Vec2::new(0.0, -1.0),
            0.5,
            SurfaceLayer::Ground
        ));
        effects.push(crate::app::effects::Effect::FadeIn);

        assert_eq!(world.effects().len(), 1);
        assert!(world.find_entity(id).is_some_and(|entity| entity.transform.flip_x));
    }

    #[test]
    fn step_physics_reports_overlap_between_dynamic_and_sensor() {
        let mut world = SceneWorld::default();
        let mover = world.spawn(
            SpawnDesc::new("mover", Vec2::new(0.0, 0.0))
                .with_body(Body::dynamic(Vec2::new(0.5, 0.5), 0.0)),
        );
        let sensor = world.spawn(
            SpawnDesc::new("sensor", Vec2::new(0.9, 0.0))
                .with_body(Body::sensor(Vec2::new(0.5, 0.5))),
        );
        let inert = world.spawn(
            SpawnDesc::new("inert", Vec2::new(0.9, 0.0))
                .with_body(Body::sensor(Vec2::new(0.5, 0.5)))
                .inactive(),
        );
        world.apply_pending();

        world.step_physics(0.02);
        let events = world.take_contact_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].phase, ContactPhase::Enter);
        assert_eq!(events[0].other(mover), Some(sensor));
        assert!(!events[0].involves(inert));

        world.despawn(sensor);
        world.apply_pending();
        world.step_physics(0.02);
        assert!(world.take_contact_events().is_empty());
    }
}
