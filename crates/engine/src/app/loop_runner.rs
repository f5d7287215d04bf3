use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::StartupError;

use super::effects::EffectSink;
use super::scene::{SceneError, SceneMachine, SceneWorld};
use super::{InputSnapshot, SceneCommand, SceneKey};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub max_render_fps: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 50,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            max_render_fps: Some(60),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("scene transition failed: {0}")]
    Scene(#[from] SceneError),
}

/// Supplies one input snapshot per frame.
pub trait InputSource {
    fn poll(&mut self, frame_index: u64) -> InputSnapshot;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub ticks_run: u32,
    pub dropped_backlog: Duration,
    pub command: SceneCommand,
    pub effects_applied: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopSummary {
    pub frames: u64,
    pub fixed_ticks: u64,
    pub dropped_backlog: Duration,
    pub quit_requested: bool,
    pub final_scene: Option<SceneKey>,
}

/// Variable-rate frame updates with a fixed-rate simulation tick, driven by the
/// world's clock so a zero timescale stops fixed ticks entirely.
pub struct LoopRunner<C> {
    scenes: SceneMachine<C>,
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    render_frame_target: Option<Duration>,
    accumulator: Duration,
    frame_index: u64,
    fixed_ticks: u64,
    dropped_backlog_total: Duration,
    quit_requested: bool,
}

impl<C> LoopRunner<C> {
    pub fn new(config: LoopConfig, scenes: SceneMachine<C>) -> Self {
        let target_tps = config.target_tps.max(1);
        let max_frame_delta =
            normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
        let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
        let render_cap = normalize_render_fps_cap(config.max_render_fps);
        info!(
            target_tps,
            max_frame_delta_ms = max_frame_delta.as_millis() as u64,
            max_ticks_per_frame,
            render_fps_cap = %format_render_cap(render_cap),
            "loop_config"
        );

        Self {
            scenes,
            fixed_dt: Duration::from_secs_f64(1.0 / target_tps as f64),
            max_frame_delta,
            max_ticks_per_frame,
            render_frame_target: target_frame_duration(render_cap),
            accumulator: Duration::ZERO,
            frame_index: 0,
            fixed_ticks: 0,
            dropped_backlog_total: Duration::ZERO,
            quit_requested: false,
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn scenes(&self) -> &SceneMachine<C> {
        &self.scenes
    }

    pub fn scenes_mut(&mut self) -> &mut SceneMachine<C> {
        &mut self.scenes
    }

    pub fn world(&self) -> &SceneWorld {
        self.scenes.world()
    }

    pub fn is_quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn start(&mut self, initial_scene: &SceneKey, ctx: &mut C) -> Result<(), AppError> {
        self.scenes.load(initial_scene, ctx)?;
        info!(
            scene = %initial_scene,
            entity_count = self.scenes.world().entity_count(),
            "scene_loaded"
        );
        Ok(())
    }

    /// One frame: variable update, fixed ticks for the simulated time that elapsed,
    /// effect flush, then the first scene command raised during the frame.
    pub fn advance_frame(
        &mut self,
        raw_frame_dt: Duration,
        input: &InputSnapshot,
        ctx: &mut C,
        sink: &mut dyn EffectSink,
    ) -> Result<FrameReport, AppError> {
        let frame_dt = clamp_frame_delta(raw_frame_dt, self.max_frame_delta);
        let clock = self.scenes.world_mut().clock_mut();
        let sim_frame_dt = Duration::try_from_secs_f64(
            frame_dt.as_secs_f64() * f64::from(clock.timescale()),
        )
        .unwrap_or(Duration::ZERO);
        let time = clock.advance(frame_dt.as_secs_f32());

        let mut command = self.scenes.update_active(time, input, ctx);
        self.scenes.apply_pending_active();

        self.accumulator = self.accumulator.saturating_add(sim_frame_dt);
        let step_plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        let fixed_dt_seconds = self.fixed_dt.as_secs_f32();
        let mut ticks_run = 0u32;
        for _ in 0..step_plan.ticks_to_run {
            if !command.is_none() {
                break;
            }
            command = self.scenes.fixed_update_active(fixed_dt_seconds, ctx);
            let world = self.scenes.world_mut();
            world.step_physics(fixed_dt_seconds);
            world.apply_pending();
            ticks_run += 1;
        }
        self.fixed_ticks = self.fixed_ticks.saturating_add(ticks_run as u64);
        self.accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            self.dropped_backlog_total = self
                .dropped_backlog_total
                .saturating_add(step_plan.dropped_backlog);
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }

        let effects = self.scenes.world_mut().effects_mut().drain();
        let effects_applied = effects.len();
        for effect in effects {
            sink.apply(effect);
        }

        self.execute_command(&command, ctx)?;
        let report = FrameReport {
            frame_index: self.frame_index,
            ticks_run,
            dropped_backlog: step_plan.dropped_backlog,
            command,
            effects_applied,
        };
        self.frame_index = self.frame_index.saturating_add(1);
        Ok(report)
    }

    /// Unpaced run with a constant frame delta. Stops early on quit, then shuts the
    /// active scene down.
    pub fn run_frames(
        &mut self,
        frames: u64,
        frame_dt: Duration,
        input: &mut dyn InputSource,
        ctx: &mut C,
        sink: &mut dyn EffectSink,
    ) -> Result<LoopSummary, AppError> {
        for _ in 0..frames {
            let snapshot = input.poll(self.frame_index);
            self.advance_frame(frame_dt, &snapshot, ctx, sink)?;
            if self.quit_requested {
                break;
            }
        }
        Ok(self.finish(ctx, sink))
    }

    /// Real-time run paced to the render cap.
    pub fn run_paced(
        &mut self,
        max_frames: Option<u64>,
        input: &mut dyn InputSource,
        ctx: &mut C,
        sink: &mut dyn EffectSink,
    ) -> Result<LoopSummary, AppError> {
        let mut last_frame_instant = Instant::now();
        while max_frames.map_or(true, |limit| self.frame_index < limit) && !self.quit_requested {
            let frame_start = Instant::now();
            let raw_frame_dt = frame_start.saturating_duration_since(last_frame_instant);
            last_frame_instant = frame_start;

            let snapshot = input.poll(self.frame_index);
            self.advance_frame(raw_frame_dt, &snapshot, ctx, sink)?;

            let elapsed = Instant::now().saturating_duration_since(frame_start);
            let cap_sleep = compute_cap_sleep(elapsed, self.render_frame_target);
            if cap_sleep > Duration::ZERO {
                thread::sleep(cap_sleep);
            }
        }
        Ok(self.finish(ctx, sink))
    }

    fn finish(&mut self, ctx: &mut C, sink: &mut dyn EffectSink) -> LoopSummary {
        let summary = LoopSummary {
            frames: self.frame_index,
            fixed_ticks: self.fixed_ticks,
            dropped_backlog: self.dropped_backlog_total,
            quit_requested: self.quit_requested,
            final_scene: self.scenes.active_scene().cloned(),
        };
        self.shutdown(ctx, sink);
        summary
    }

    pub fn shutdown(&mut self, ctx: &mut C, sink: &mut dyn EffectSink) {
        self.scenes.shutdown(ctx);
        for effect in self.scenes.world_mut().effects_mut().drain() {
            sink.apply(effect);
        }
        info!(
            frames = self.frame_index,
            fixed_ticks = self.fixed_ticks,
            "shutdown"
        );
    }

    fn execute_command(&mut self, command: &SceneCommand, ctx: &mut C) -> Result<(), AppError> {
        match command {
            SceneCommand::None => {}
            SceneCommand::Quit => {
                info!(reason = "scene_command", "shutdown_requested");
                self.quit_requested = true;
            }
            SceneCommand::Load(next_scene) => {
                self.scenes.load(next_scene, ctx)?;
                self.accumulator = Duration::ZERO;
                info!(
                    scene = %next_scene,
                    entity_count = self.scenes.world().entity_count(),
                    "scene_switched"
                );
            }
            SceneCommand::Reload => {
                self.scenes.reload(ctx)?;
                self.accumulator = Duration::ZERO;
                debug!(
                    entity_count = self.scenes.world().entity_count(),
                    "scene_reloaded"
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        let dropped_backlog = accumulator;
        accumulator = Duration::ZERO;
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::clock::FrameTime;
    use crate::app::effects::{Effect, RecordingEffectSink};
    use crate::app::geometry::Vec2;
    use crate::app::scene::{Scene, SpawnDesc};

    #[derive(Default)]
    struct Counters {
        updates: u32,
        fixed_ticks: u32,
        loads: u32,
        unloads: u32,
        pending_command: Option<SceneCommand>,
    }

    struct CountingScene;

    impl Scene<Counters> for CountingScene {
        fn load(&mut self, world: &mut SceneWorld, ctx: &mut Counters) {
            world.spawn(SpawnDesc::new("marker", Vec2::ZERO));
            ctx.loads += 1;
        }

        fn update(
            &mut self,
            _time: FrameTime,
            _input: &InputSnapshot,
            world: &mut SceneWorld,
            ctx: &mut Counters,
        ) -> SceneCommand {
            ctx.updates += 1;
            world.effects_mut().push(Effect::FadeIn);
            ctx.pending_command.take().unwrap_or(SceneCommand::None)
        }

        fn fixed_update(
            &mut self,
            _fixed_dt_seconds: f32,
            _world: &mut SceneWorld,
            ctx: &mut Counters,
        ) -> SceneCommand {
            ctx.fixed_ticks += 1;
            SceneCommand::None
        }

        fn unload(&mut self, _world: &mut SceneWorld, ctx: &mut Counters) {
            ctx.unloads += 1;
        }
    }

    struct IdleInput;

    impl InputSource for IdleInput {
        fn poll(&mut self, _frame_index: u64) -> InputSnapshot {
            InputSnapshot::empty()
        }
    }

    fn started_runner(ctx: &mut Counters) -> LoopRunner<Counters> {
        let mut scenes = SceneMachine::new();
        scenes.register(SceneKey::new("counting"), Box::new(CountingScene));
        let mut runner = LoopRunner::new(LoopConfig::default(), scenes);
        runner
            .start(&SceneKey::new("counting"), ctx)
            .expect("start");
        runner
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        let raw_frame_dt = Duration::from_millis(600);

        assert_eq!(
            clamp_frame_delta(raw_frame_dt, max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(48), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn target_frame_duration_none_when_cap_off() {
        assert_eq!(target_frame_duration(None), None);
    }

    #[test]
    fn compute_cap_sleep_zero_when_over_budget() {
        let sleep = compute_cap_sleep(Duration::from_millis(20), target_frame_duration(Some(60)));
        assert_eq!(sleep, Duration::ZERO);
    }

    #[test]
    fn compute_cap_sleep_positive_when_under_budget() {
        let sleep = compute_cap_sleep(Duration::from_millis(5), target_frame_duration(Some(60)));
        assert!(sleep > Duration::ZERO);
    }

    #[test]
    fn normalize_render_fps_cap_disables_zero() {
        assert_eq!(normalize_render_fps_cap(Some(0)), None);
        assert_eq!(normalize_render_fps_cap(Some(60)), Some(60));
    }

    #[test]
    fn fixed_ticks_follow_simulated_time() {
        let mut ctx = Counters::default();
        let mut runner = started_runner(&mut ctx);
        let mut sink = RecordingEffectSink::default();

        let report = runner
            .advance_frame(
                Duration::from_millis(40),
                &InputSnapshot::empty(),
                &mut ctx,
                &mut sink,
            )
            .expect("frame");

        assert_eq!(report.ticks_run, 2);
        assert_eq!(ctx.updates, 1);
        assert_eq!(ctx.fixed_ticks, 2);
        assert_eq!(sink.effects, vec![Effect::FadeIn]);
    }

    #[test]
    fn zero_timescale_runs_updates_but_no_fixed_ticks() {
        let mut ctx = Counters::default();
        let mut runner = started_runner(&mut ctx);
        let mut sink = RecordingEffectSink::default();
        runner.scenes_mut().world_mut().clock_mut().set_timescale(0.0);

        for _ in 0..10 {
            runner
                .advance_frame(
                Duration::from_millis(40),
                &InputSnapshot::empty(),
                &mut ctx,
                &mut sink,
            )
                .expect("frame");
        }

        assert_eq!(ctx.updates, 10);
        assert_eq!(ctx.fixed_ticks, 0);
    }

    #[test]
    fn reload_command_reloads_scene_at_end_of_frame() {
        let mut ctx = Counters::default();
        let mut runner = started_runner(&mut ctx);
        let mut sink = RecordingEffectSink::default();
        ctx.pending_command = Some(SceneCommand::Reload);

        let report = runner
            .advance_frame(
                Duration::from_millis(40),
                &InputSnapshot::empty(),
                &mut ctx,
                &mut sink,
            )
            .expect("frame");

        assert_eq!(report.command, SceneCommand::Reload);
        assert_eq!(report.ticks_run, 0);
        assert_eq!(ctx.loads, 2);
        assert_eq!(ctx.unloads, 1);
        assert_eq!(runner.world().entity_count(), 1);
    }

    #[test]
    fn unknown_scene_command_surfaces_error() {
        let mut ctx = Counters::default();
        let mut runner = started_runner(&mut ctx);
        let mut sink = RecordingEffectSink::default();
        ctx.pending_command = Some(SceneCommand::Load(SceneKey::new("nowhere")));

        let result = runner.advance_frame(
            Duration::from_millis(20),
            &InputSnapshot::empty(),
            &mut ctx,
            &mut sink,
        );
        assert!(matches!(
            result,
            Err(AppError::Scene(SceneError::UnknownScene(_)))
        ));
    }

    #[test]
    fn run_frames_stops_on_quit_and_shuts_down() {
        let mut ctx = Counters::default();
        let mut runner = started_runner(&mut ctx);
        let mut sink = RecordingEffectSink::default();
        ctx.pending_command = Some(SceneCommand::Quit);

        let summary = runner
            .run_frames(
                100,
                Duration::from_millis(20),
                &mut IdleInput,
                &mut ctx,
                &mut sink,
            )
            .expect("run");

        assert_eq!(summary.frames, 1);
        assert!(summary.quit_requested);
        assert_eq!(summary.final_scene, Some(SceneKey::new("counting")));
        assert_eq!(ctx.unloads, 1);
    }
}
