use std::collections::BTreeMap;
use std::rc::Rc;

use engine::{
    BodyKind, ClockKind, ContactEvent, ContactPhase, EntityId, FrameTime, InputSnapshot, Scene,
    SceneCommand, SceneKey, SceneWorld, Vec2,
};
use tracing::{debug, error, info, warn};

use super::collector::PlayerCollector;
use super::config::GameConfig;
use super::context::{Continuation, GameContext};
use super::door::{DoorGate, DoorInteraction, DoorRegistration};
use super::enemy::{accept_defeat, EnemyStateMachine, EnemyVariant, Replacement};
use super::events::{GameEvent, GameEventKind, SubscriptionId};
use super::game_mode::{GameMode, GameModeController, ModeServices};
use super::health::{DamageOutcome, Health, PlayerHealth};
use super::level::{LevelDef, LevelLayout, Placement};
use super::locomotion::LocomotionController;
use super::prefabs::{
    self, PickupKind, TAG_DOOR, TAG_ENEMY, TAG_EXIT, TAG_FOOD, TAG_IMMUNE, TAG_PLAYER,
    TAG_PROJECTILE, TAG_SLIME,
};
use super::projectile::{ContactTarget, Projectile, ProjectileOutcome, ProjectileShooter};
use super::tutorial::TutorialDirector;

const EGG_ENTITY_NAME: &str = "egg";
const GATED_HALF_HEIGHT: f32 = 0.5;
const DOOR_HALF_HEIGHT: f32 = 1.0;

/// One authored level. All per-load state is rebuilt by `load` and dropped by
/// `unload`.
pub(crate) struct LevelScene {
    config: Rc<GameConfig>,
    level: LevelDef,
    state: Option<LevelState>,
}

impl LevelScene {
    pub(crate) fn new(config: Rc<GameConfig>, level: LevelDef) -> Self {
        Self {
            config,
            level,
            state: None,
        }
    }

    pub(crate) fn key(&self) -> SceneKey {
        SceneKey::new(self.level.name.clone())
    }
}

struct PlayerRig {
    id: EntityId,
    locomotion: LocomotionController,
    health: PlayerHealth,
    collector: PlayerCollector,
    shooter: ProjectileShooter,
}

struct EnemyRig {
    /// `None` for eggs, and for walkers whose state machine was dropped after an
    /// unmapped state.
    fsm: Option<EnemyStateMachine>,
    health: Health,
    defeat_sound: String,
    replacement: Option<PickupKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Touch {
    Enemy,
    Slime,
    Food,
    Door,
    Exit,
    Other,
}

struct LevelState {
    config: Rc<GameConfig>,
    level_name: String,
    exit_to: Option<String>,
    exit_entrance: Option<u32>,
    victory_on_clear: bool,
    player: PlayerRig,
    enemies: BTreeMap<EntityId, EnemyRig>,
    projectiles: BTreeMap<EntityId, Projectile>,
    doors: BTreeMap<EntityId, DoorGate>,
    /// Objects each closed door wakes when it opens.
    gated: BTreeMap<EntityId, Vec<EntityId>>,
    tutorial: Option<TutorialDirector>,
    player_defeated: SubscriptionId,
    enemy_defeated: SubscriptionId,
    all_clear_announced: bool,
    fainted: bool,
    leaving: bool,
}

impl Scene<GameContext> for LevelScene {
    fn load(&mut self, world: &mut SceneWorld, ctx: &mut GameContext) {
        let layout = match LevelLayout::parse(&self.level) {
            Ok(layout) => layout,
            Err(err) => {
                error!(level = %self.level.name, error = %err, "level_load_failed");
                return;
            }
        };
        let Some(spawn) = layout.spawn_point(ctx.session.entrance_index()) else {
            error!(level = %self.level.name, "level_has_no_spawn");
            return;
        };

        world.set_tilemap(layout.tilemap().clone());
        world.set_physics_settings(self.config.physics);
        ctx.scheduler.clear();

        let config = &self.config;
        let tuning = &config.player;
        let player_id = world.spawn(prefabs::player(
            prefabs::standing_on(spawn, tuning.half_extents.y),
            tuning.half_extents,
            tuning.gravity_fall,
        ));
        let mut player = PlayerRig {
            id: player_id,
            locomotion: LocomotionController::new(tuning.clone()),
            health: PlayerHealth::from_session(&ctx.session, &tuning.hurt_sound),
            collector: PlayerCollector::from_session(
                &ctx.session,
                tuning.food_hp_boost,
                &tuning.collect_sound,
                &tuning.eat_sound,
            ),
            shooter: ProjectileShooter::new(&config.projectiles),
        };
        player.health.enable(&mut ctx.events);
        player.collector.enable(&mut ctx.events);

        let mut gates: Vec<Option<(DoorGate, DoorRegistration)>> = self
            .level
            .doors
            .iter()
            .map(|door| {
                Some(DoorGate::register(
                    &door.name,
                    door.required_slimes,
                    &mut ctx.session,
                ))
            })
            .collect();
        let mut door_ids: Vec<Option<EntityId>> = vec![None; gates.len()];
        let mut gated_by_door: Vec<Vec<EntityId>> = vec![Vec::new(); gates.len()];

        let mut enemies = BTreeMap::new();
        let mut doors = BTreeMap::new();
        for &(placement, floor) in layout.placements() {
            match placement {
                Placement::Spider | Placement::Boss => {
                    let (variant, enemy_tuning) = if placement == Placement::Spider {
                        (EnemyVariant::Spider, &config.spider)
                    } else {
                        (EnemyVariant::Boss, &config.boss)
                    };
                    let id = world.spawn(prefabs::enemy(
                        variant.entity_name(),
                        prefabs::standing_on(floor, enemy_tuning.half_extents.y),
                        enemy_tuning.half_extents,
                        enemy_tuning.gravity_scale,
                        false,
                    ));
                    enemies.insert(
                        id,
                        EnemyRig {
                            fsm: Some(EnemyStateMachine::new(variant, enemy_tuning.clone())),
                            health: Health::full(enemy_tuning.max_hp),
                            defeat_sound: enemy_tuning.defeat_sound.clone(),
                            replacement: enemy_tuning.replacement,
                        },
                    );
                }
                Placement::Egg => {
                    let egg = &config.egg;
                    let id = world.spawn(prefabs::enemy(
                        EGG_ENTITY_NAME,
                        prefabs::standing_on(floor, egg.half_extents.y),
                        egg.half_extents,
                        egg.gravity_scale,
                        true,
                    ));
                    enemies.insert(
                        id,
                        EnemyRig {
                            fsm: None,
                            health: Health::full(egg.max_hp),
                            defeat_sound: egg.defeat_sound.clone(),
                            replacement: None,
                        },
                    );
                }
                Placement::Slime | Placement::Food => {
                    let kind = if placement == Placement::Slime {
                        PickupKind::Slime
                    } else {
                        PickupKind::Food
                    };
                    let position = prefabs::standing_on(floor, prefabs::pickup_half_height());
                    world.spawn(prefabs::pickup(kind, position));
                }
                Placement::Door(index) => {
                    let Some((gate, registration)) = gates.get_mut(index).and_then(Option::take)
                    else {
                        continue;
                    };
                    if registration == DoorRegistration::AlreadyOpen {
                        debug!(door = gate.name(), "door_already_open");
                        continue;
                    }
                    let id = world.spawn(prefabs::door(prefabs::standing_on(
                        floor,
                        DOOR_HALF_HEIGHT,
                    )));
                    doors.insert(id, gate);
                    door_ids[index] = Some(id);
                }
                Placement::Gated { door } => {
                    let id = world.spawn(prefabs::gated_marker(prefabs::standing_on(
                        floor,
                        GATED_HALF_HEIGHT,
                    )));
                    if let Some(owned) = gated_by_door.get_mut(door) {
                        owned.push(id);
                    }
                }
                Placement::Exit { door } => {
                    let id = world.spawn(prefabs::exit(
                        prefabs::standing_on(floor, GATED_HALF_HEIGHT),
                        door.is_some(),
                    ));
                    if let Some(owned) = door.and_then(|index| gated_by_door.get_mut(index)) {
                        owned.push(id);
                    }
                }
            }
        }

        world.apply_pending();
        let mut gated = BTreeMap::new();
        for (door, owned) in door_ids.into_iter().zip(gated_by_door) {
            match door {
                Some(id) => {
                    gated.insert(id, owned);
                }
                None => {
                    activate_gated(world, &owned);
                }
            }
        }

        let player_defeated = ctx.events.subscribe(GameEventKind::PlayerDefeated);
        let enemy_defeated = ctx.events.subscribe(GameEventKind::EnemyDefeated);

        with_mode(world, ctx, |mode, services| {
            mode.change_state(GameMode::Starting, services)
        });

        let tutorial = self
            .level
            .tutorial
            .then(|| TutorialDirector::new(&config.tutorial));
        if let Some(director) = &tutorial {
            if let Some(delay) = director.start(&ctx.session, world.effects_mut()) {
                ctx.scheduler.schedule(
                    None,
                    ClockKind::Simulation,
                    delay,
                    Continuation::FinishTutorial,
                );
            }
        }

        info!(
            level = %self.level.name,
            entities = world.entity_count(),
            enemies = enemies.len(),
            doors = doors.len(),
            hp = player.health.health().hp(),
            slimes = player.collector.slime_count(),
            exit_listeners = ctx.events.subscriber_count(GameEventKind::SceneExited),
            "level_loaded"
        );

        self.state = Some(LevelState {
            config: Rc::clone(&self.config),
            level_name: self.level.name.clone(),
            exit_to: self.level.exit_to.clone(),
            exit_entrance: self.level.exit_entrance,
            victory_on_clear: self.level.victory_on_clear,
            player,
            enemies,
            projectiles: BTreeMap::new(),
            doors,
            gated,
            tutorial,
            player_defeated,
            enemy_defeated,
            all_clear_announced: false,
            fainted: false,
            leaving: false,
        });
    }

    fn update(
        &mut self,
        time: FrameTime,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        ctx: &mut GameContext,
    ) -> SceneCommand {
        let quit = if input.quit_requested() {
            SceneCommand::Quit
        } else {
            SceneCommand::None
        };
        let Some(state) = self.state.as_mut() else {
            return quit;
        };

        if input.pause_toggle_pressed() {
            with_mode(world, ctx, |mode, services| mode.toggle_pause(services));
        }

        let mut command = SceneCommand::None;
        for continuation in ctx.scheduler.advance(time) {
            command = command.or(state.resume(continuation, world, ctx));
        }

        state.frame_player(time, input, world, ctx);
        state.frame_enemies(time, world, ctx);
        state.expire_projectiles(time.sim_dt, world);
        state.dispatch_events(world, ctx);

        quit.or(command)
    }

    fn fixed_update(
        &mut self,
        _fixed_dt_seconds: f32,
        world: &mut SceneWorld,
        ctx: &mut GameContext,
    ) -> SceneCommand {
        let Some(state) = self.state.as_mut() else {
            return SceneCommand::None;
        };

        let mut command = SceneCommand::None;
        for contact in world.take_contact_events() {
            command = command.or(state.handle_contact(contact, world, ctx));
        }
        state.resolve_blocked_projectiles(world);
        state.fixed_player(world);
        state.fixed_enemies(world);
        state.dispatch_events(world, ctx);
        command
    }

    fn unload(&mut self, world: &mut SceneWorld, ctx: &mut GameContext) {
        let Some(mut state) = self.state.take() else {
            return;
        };

        if !state.fainted {
            ctx.events.publish(GameEvent::SceneExited);
        }
        for delivery in ctx.events.dispatch() {
            state.player.health.on_delivery(&delivery, &mut ctx.session);
            state.player.collector.on_delivery(&delivery, &mut ctx.session);
        }

        state.player.health.disable(&mut ctx.events);
        state.player.collector.disable(&mut ctx.events);
        ctx.events.unsubscribe(state.player_defeated);
        ctx.events.unsubscribe(state.enemy_defeated);
        ctx.scheduler.clear();

        info!(
            level = %state.level_name,
            fainted = state.fainted,
            entities = world.entity_count(),
            hp = ctx.session.hp(),
            slimes = ctx.session.slime_count(),
            "scene_unloaded"
        );
    }

    fn debug_title(&self, world: &SceneWorld) -> Option<String> {
        let state = self.state.as_ref()?;
        Some(format!(
            "{} | hp {} | {:?} | slimes {} | enemies {} | entities {}",
            state.level_name,
            state.player.health.health().hp(),
            state.player.locomotion.phase(),
            state.player.collector.slime_count(),
            state.enemies.len(),
            world.entity_count()
        ))
    }
}

impl LevelState {
    fn resume(
        &mut self,
        continuation: Continuation,
        world: &mut SceneWorld,
        ctx: &mut GameContext,
    ) -> SceneCommand {
        match continuation {
            Continuation::ReturnControl { player } => {
                if player == self.player.id && world.is_alive(player) {
                    self.player.locomotion.return_control();
                }
            }
            Continuation::ReloadScene => {
                info!(level = %self.level_name, "faint_reload");
                return SceneCommand::Reload;
            }
            Continuation::HidePrompt { door } => {
                if world.is_alive(door) {
                    if let Some(gate) = self.doors.get_mut(&door) {
                        gate.hide_prompt(door, world.effects_mut());
                    }
                }
            }
            Continuation::FinishStartup => {
                with_mode(world, ctx, |mode, services| mode.finish_startup(services));
            }
            Continuation::FinishTutorial => {
                if let Some(director) = &self.tutorial {
                    director.finish(&mut ctx.session);
                }
            }
        }
        SceneCommand::None
    }

    fn frame_player(
        &mut self,
        time: FrameTime,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        ctx: &mut GameContext,
    ) {
        let playing = ctx.mode.is_playing();
        let player = &mut self.player;
        let Some((entity, _, effects)) = world.entity_parts_mut(player.id) else {
            return;
        };

        let intent = player
            .locomotion
            .frame_update(time.sim_dt, input, playing, entity, effects);
        if intent.cycle_shot {
            player.shooter.ready_next();
        }
        if !intent.fire {
            return;
        }

        let facing = player.locomotion.facing_sign();
        let Some(launch) = player.shooter.fire(
            entity.transform.position,
            facing,
            Vec2::new(facing, 0.0),
            effects,
        ) else {
            return;
        };
        let id = world.spawn(prefabs::projectile(launch.position, launch.velocity));
        self.projectiles.insert(
            id,
            Projectile::new(launch.kind, self.config.projectiles.ttl_seconds),
        );
        let outcome = player
            .health
            .self_damage(self.config.player.shot_hp_cost, &mut ctx.events);
        debug!(projectile = id.0, kind = ?launch.kind, ?outcome, "projectile_fired");
    }

    fn frame_enemies(&mut self, time: FrameTime, world: &mut SceneWorld, ctx: &mut GameContext) {
        let playing = ctx.mode.is_playing();
        for (id, rig) in &mut self.enemies {
            let Some(fsm) = rig.fsm.as_mut() else {
                continue;
            };
            let Some((entity, _, effects)) = world.entity_parts_mut(*id) else {
                continue;
            };
            if let Err(err) = fsm.frame_update(time.sim_dt, playing, &mut ctx.rng, entity, effects)
            {
                error!(
                    enemy = id.0,
                    variant = fsm.variant().entity_name(),
                    error = %err,
                    "enemy_update_aborted"
                );
                rig.fsm = None;
            }
        }
    }

    fn expire_projectiles(&mut self, dt: f32, world: &mut SceneWorld) {
        self.projectiles.retain(|id, projectile| {
            if !projectile.tick(dt) {
                return true;
            }
            world.despawn(*id);
            debug!(projectile = id.0, "projectile_expired");
            false
        });
    }

    fn handle_contact(
        &mut self,
        contact: ContactEvent,
        world: &mut SceneWorld,
        ctx: &mut GameContext,
    ) -> SceneCommand {
        let projectile = [contact.a, contact.b]
            .into_iter()
            .find(|id| self.projectiles.contains_key(id));
        if let Some(projectile) = projectile {
            if contact.phase == ContactPhase::Enter {
                if let Some(other) = contact.other(projectile) {
                    self.projectile_hit(projectile, other, world, ctx);
                }
            }
            return SceneCommand::None;
        }

        let Some(other) = contact.other(self.player.id) else {
            return SceneCommand::None;
        };
        if !world.is_alive(other) || !world.is_alive(self.player.id) {
            return SceneCommand::None;
        }

        match (classify(world, other), contact.phase) {
            (Touch::Enemy, ContactPhase::Enter) => self.enemy_touched_player(other, world, ctx),
            (Touch::Slime, ContactPhase::Enter) => {
                let position = position_of(world, other).unwrap_or(Vec2::ZERO);
                world.despawn(other);
                let total = self.player.collector.collect_slime(
                    position,
                    world.effects_mut(),
                    &mut ctx.events,
                );
                debug!(total, "slime_collected");
            }
            (Touch::Food, ContactPhase::Enter) => {
                let position = position_of(world, other).unwrap_or(Vec2::ZERO);
                world.despawn(other);
                let hp = self.player.collector.eat_food(
                    &mut self.player.health,
                    position,
                    world.effects_mut(),
                );
                debug!(hp, "food_eaten");
            }
            (Touch::Door, ContactPhase::Enter | ContactPhase::Stay) => {
                self.door_in_range(other, world, ctx)
            }
            (Touch::Door, ContactPhase::Exit) => self.door_out_of_range(other, ctx),
            (Touch::Exit, ContactPhase::Enter) => return self.leave_level(ctx),
            _ => {}
        }
        SceneCommand::None
    }

    fn projectile_hit(
        &mut self,
        projectile: EntityId,
        other: EntityId,
        world: &mut SceneWorld,
        ctx: &mut GameContext,
    ) {
        if !world.is_alive(projectile) || !world.is_alive(other) {
            return;
        }
        let Some(target) = projectile_target(world, other) else {
            return;
        };
        let Some(mut shot) = self.projectiles.remove(&projectile) else {
            return;
        };
        let position = position_of(world, projectile).unwrap_or(Vec2::ZERO);
        world.despawn(projectile);
        let Some(outcome) = shot.resolve_contact(
            target,
            &self.config.projectiles,
            position,
            world.effects_mut(),
        ) else {
            return;
        };
        debug!(
            projectile = projectile.0,
            target = other.0,
            ?outcome,
            "projectile_resolved"
        );

        match outcome {
            ProjectileOutcome::Damage(amount) => self.damage_enemy(other, amount, world, ctx),
            ProjectileOutcome::Transform => self.transform_enemy(other, world, ctx),
            ProjectileOutcome::NoEffect | ProjectileOutcome::Vanish => {}
        }
    }

    fn resolve_blocked_projectiles(&mut self, world: &mut SceneWorld) {
        let blocked: Vec<EntityId> = self
            .projectiles
            .keys()
            .copied()
            .filter(|id| {
                world
                    .find_entity(*id)
                    .and_then(|entity| entity.body)
                    .is_some_and(|body| body.blocked.any())
            })
            .collect();
        for id in blocked {
            let Some(mut shot) = self.projectiles.remove(&id) else {
                continue;
            };
            let position = position_of(world, id).unwrap_or(Vec2::ZERO);
            shot.resolve_contact(
                ContactTarget::Other,
                &self.config.projectiles,
                position,
                world.effects_mut(),
            );
            world.despawn(id);
            debug!(projectile = id.0, "projectile_blocked");
        }
    }

    fn enemy_touched_player(
        &mut self,
        enemy: EntityId,
        world: &mut SceneWorld,
        ctx: &mut GameContext,
    ) {
        let (Some(enemy_position), Some(player_position)) =
            (position_of(world, enemy), position_of(world, self.player.id))
        else {
            return;
        };
        let Some(hit) = self
            .enemies
            .get(&enemy)
            .and_then(|rig| rig.fsm.as_ref())
            .map(|fsm| fsm.contact_with_player(enemy_position, player_position))
        else {
            return;
        };

        let player = &mut self.player;
        let Some((entity, _, effects)) = world.entity_parts_mut(player.id) else {
            return;
        };
        let outcome = player
            .health
            .damage(hit.damage, player_position, effects, &mut ctx.events);
        player.locomotion.take_damage(entity, effects);
        if let Some(delay) = player.locomotion.knock_back(hit.impulse, entity) {
            ctx.scheduler.schedule(
                Some(player.id),
                ClockKind::Simulation,
                delay,
                Continuation::ReturnControl { player: player.id },
            );
        }
        debug!(enemy = enemy.0, damage = hit.damage, ?outcome, "player_hit");
    }

    fn damage_enemy(
        &mut self,
        enemy: EntityId,
        amount: u32,
        world: &mut SceneWorld,
        ctx: &mut GameContext,
    ) {
        let Some(rig) = self.enemies.get_mut(&enemy) else {
            return;
        };
        match rig.health.damage(amount) {
            DamageOutcome::CrossedZero => self.defeat_enemy(enemy, world, ctx),
            DamageOutcome::Hurt { remaining } => {
                if let Some(fsm) = &rig.fsm {
                    fsm.take_damage(enemy, world.effects_mut());
                }
                debug!(enemy = enemy.0, remaining, "enemy_hurt");
            }
            DamageOutcome::AlreadyDown => {}
        }
    }

    fn defeat_enemy(&mut self, enemy: EntityId, world: &mut SceneWorld, ctx: &mut GameContext) {
        let Some(rig) = self.enemies.remove(&enemy) else {
            return;
        };
        let replacement = world
            .entity_parts_mut(enemy)
            .and_then(|(entity, _, effects)| {
                accept_defeat(
                    entity,
                    &rig.defeat_sound,
                    rig.replacement,
                    &mut ctx.events,
                    effects,
                )
            });
        remove_enemy(enemy, replacement, world, ctx);
        info!(enemy = enemy.0, remaining = self.enemies.len(), "enemy_defeated");
    }

    fn transform_enemy(&mut self, enemy: EntityId, world: &mut SceneWorld, ctx: &mut GameContext) {
        if self.enemies.remove(&enemy).is_none() {
            return;
        }
        let replacement = world
            .find_entity(enemy)
            .map(|entity| Replacement::from_entity(PickupKind::Slime, entity));
        remove_enemy(enemy, replacement, world, ctx);
        info!(enemy = enemy.0, remaining = self.enemies.len(), "enemy_slimed");
        self.check_all_clear(world, ctx);
    }

    fn door_in_range(&mut self, door: EntityId, world: &mut SceneWorld, ctx: &mut GameContext) {
        let Some(position) = position_of(world, door) else {
            return;
        };
        let Some(gate) = self.doors.get_mut(&door) else {
            return;
        };
        ctx.scheduler.cancel_owner(door);
        let interaction = gate.interact(
            door,
            position,
            self.player.shooter.is_special_mode(),
            &mut self.player.collector,
            &mut ctx.session,
            &self.config.door,
            world.effects_mut(),
        );
        if interaction != DoorInteraction::Opened {
            return;
        }
        gate.hide_prompt(door, world.effects_mut());
        self.doors.remove(&door);
        world.despawn(door);
        let owned = self.gated.remove(&door).unwrap_or_default();
        let activated = activate_gated(world, &owned);
        debug!(door = door.0, activated, "gated_objects_activated");
    }

    fn door_out_of_range(&mut self, door: EntityId, ctx: &mut GameContext) {
        let Some(delay) = self
            .doors
            .get(&door)
            .and_then(|gate| gate.player_left(&self.config.door))
        else {
            return;
        };
        ctx.scheduler.cancel_owner(door);
        ctx.scheduler.schedule(
            Some(door),
            ClockKind::Simulation,
            delay,
            Continuation::HidePrompt { door },
        );
    }

    fn leave_level(&mut self, ctx: &mut GameContext) -> SceneCommand {
        if self.leaving || self.fainted {
            return SceneCommand::None;
        }
        let Some(target) = self.exit_to.clone() else {
            warn!(level = %self.level_name, "exit_without_target");
            return SceneCommand::None;
        };
        self.leaving = true;
        ctx.session.set_entrance_index(self.exit_entrance);
        info!(
            from = %self.level_name,
            to = %target,
            entrance = ?self.exit_entrance,
            "level_exit"
        );
        SceneCommand::Load(SceneKey::new(target))
    }

    fn fixed_player(&mut self, world: &mut SceneWorld) {
        let Some((entity, query, effects)) = world.entity_parts_mut(self.player.id) else {
            return;
        };
        let report = self.player.locomotion.fixed_update(entity, query, effects);
        if report.landed {
            debug!(
                jumps_remaining = self.player.locomotion.state().jumps_remaining,
                "player_landed"
            );
        }
    }

    fn fixed_enemies(&mut self, world: &mut SceneWorld) {
        for (id, rig) in &mut self.enemies {
            let Some(fsm) = rig.fsm.as_mut() else {
                continue;
            };
            let Some((entity, query, _)) = world.entity_parts_mut(*id) else {
                continue;
            };
            if fsm.fixed_update(entity, query) {
                debug!(enemy = id.0, "enemy_jumped");
            }
        }
    }

    fn dispatch_events(&mut self, world: &mut SceneWorld, ctx: &mut GameContext) {
        if !ctx.events.has_queued() {
            return;
        }
        for delivery in ctx.events.dispatch() {
            if delivery.subscription == self.player_defeated {
                self.player_fainted(world, ctx);
            } else if delivery.subscription == self.enemy_defeated {
                self.check_all_clear(world, ctx);
            }
        }
    }

    fn player_fainted(&mut self, world: &mut SceneWorld, ctx: &mut GameContext) {
        let Some((entity, _, effects)) = world.entity_parts_mut(self.player.id) else {
            return;
        };
        if !self.player.locomotion.accept_defeat(entity, effects) {
            return;
        }
        if let Some(body) = entity.body.as_mut() {
            body.velocity.x = 0.0;
        }
        self.fainted = true;
        ctx.scheduler.cancel_owner(self.player.id);
        with_mode(world, ctx, |mode, services| {
            mode.change_state(GameMode::FailScreen, services)
        });
        let delay = self.config.player.faint_seconds;
        ctx.scheduler
            .schedule(None, ClockKind::Simulation, delay, Continuation::ReloadScene);
        info!(level = %self.level_name, delay, "player_fainted");
    }

    fn check_all_clear(&mut self, world: &mut SceneWorld, ctx: &mut GameContext) {
        if self.all_clear_announced || !self.enemies.is_empty() {
            return;
        }
        self.all_clear_announced = true;
        ctx.events.publish(GameEvent::EnemiesAllDefeated);
        info!(level = %self.level_name, "enemies_all_defeated");
        if self.victory_on_clear && !self.fainted {
            with_mode(world, ctx, |mode, services| {
                mode.change_state(GameMode::VictoryDance, services)
            });
        }
    }
}

fn with_mode<R>(
    world: &mut SceneWorld,
    ctx: &mut GameContext,
    action: impl FnOnce(&mut GameModeController, &mut ModeServices<'_>) -> R,
) -> R {
    let (clock, effects) = world.clock_and_effects_mut();
    let mut services = ModeServices {
        bus: &mut ctx.events,
        clock,
        effects,
        scheduler: &mut ctx.scheduler,
    };
    action(&mut ctx.mode, &mut services)
}

fn position_of(world: &SceneWorld, id: EntityId) -> Option<Vec2> {
    world.find_entity(id).map(|entity| entity.transform.position)
}

fn classify(world: &SceneWorld, id: EntityId) -> Touch {
    let Some(entity) = world.find_entity(id) else {
        return Touch::Other;
    };
    if entity.has_tag(TAG_ENEMY) {
        Touch::Enemy
    } else if entity.has_tag(TAG_SLIME) {
        Touch::Slime
    } else if entity.has_tag(TAG_FOOD) {
        Touch::Food
    } else if entity.has_tag(TAG_DOOR) {
        Touch::Door
    } else if entity.has_tag(TAG_EXIT) {
        Touch::Exit
    } else {
        Touch::Other
    }
}

/// Projectiles pass through the player, sensors and each other.
fn projectile_target(world: &SceneWorld, id: EntityId) -> Option<ContactTarget> {
    let entity = world.find_entity(id)?;
    if entity.has_tag(TAG_PLAYER) || entity.has_tag(TAG_PROJECTILE) {
        return None;
    }
    if entity.has_tag(TAG_ENEMY) {
        return Some(ContactTarget::Enemy {
            immune: entity.has_tag(TAG_IMMUNE),
        });
    }
    if entity
        .body
        .is_some_and(|body| body.kind == BodyKind::Sensor)
    {
        return None;
    }
    Some(ContactTarget::Other)
}

fn remove_enemy(
    enemy: EntityId,
    replacement: Option<Replacement>,
    world: &mut SceneWorld,
    ctx: &mut GameContext,
) {
    world.despawn(enemy);
    ctx.scheduler.cancel_owner(enemy);
    if let Some(drop) = replacement {
        world.spawn(prefabs::dropped_pickup(
            drop.kind,
            drop.position,
            drop.velocity,
            drop.gravity_scale,
        ));
    }
}

/// Wakes the given gated objects. Returns how many changed.
fn activate_gated(world: &mut SceneWorld, owned: &[EntityId]) -> usize {
    let mut activated = 0;
    for id in owned {
        if let Some(entity) = world.find_entity_mut(*id) {
            if !entity.active {
                entity.active = true;
                activated += 1;
            }
        }
    }
    activated
}
