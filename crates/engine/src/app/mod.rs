mod clock;
mod effects;
mod geometry;
mod input;
mod loop_runner;
mod physics;
mod scene;
mod tilemap;

pub use clock::{ClockKind, FrameTime, ScheduledId, Scheduler, SimClock};
pub use effects::{Effect, EffectQueue, EffectSink, RecordingEffectSink, TracingEffectSink};
pub use geometry::{Aabb, Vec2};
pub use input::{InputAction, InputCollector};
pub use loop_runner::{AppError, FrameReport, InputSource, LoopConfig, LoopRunner, LoopSummary};
pub use physics::{
    Blocked, Body, BodyKind, ContactEvent, ContactPhase, NoGeometry, PhysicsQuery,
    PhysicsSettings, CONTACT_TOLERANCE,
};
pub use scene::{
    Entity, EntityId, EntityIdAllocator, InputSnapshot, Scene, SceneCommand, SceneError, SceneKey,
    SceneMachine, SceneWorld, SpawnDesc, Transform,
};
pub use tilemap::{
    SurfaceLayer, Tilemap, TilemapError, TILE_DECORATION, TILE_EMPTY, TILE_GROUND,
};
