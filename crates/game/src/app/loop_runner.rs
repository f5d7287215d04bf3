use std::process::ExitCode;
use std::time::Duration;

use engine::{AppError, LoopRunner, LoopSummary, SceneKey, TracingEffectSink};
use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::demo_input::DemoInput;
use super::gameplay::{build_scenes, GameContext};

const UNPACED_FRAME_DT: Duration = Duration::from_micros(16_667);

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let mut ctx = GameContext::new(&app.game);
    let mut runner = LoopRunner::new(app.loop_config.clone(), build_scenes(&app.game));
    let mut sink = TracingEffectSink::default();

    let first_level = SceneKey::new(app.game.first_level.clone());
    if let Err(err) = runner.start(&first_level, &mut ctx) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    let outcome = drive(&app, &mut runner, &mut ctx, &mut sink);
    let final_mode = ctx.mode.state();
    let session = ctx.shutdown();
    match outcome {
        Ok(summary) => {
            info!(
                frames = summary.frames,
                fixed_ticks = summary.fixed_ticks,
                dropped_backlog_ms = summary.dropped_backlog.as_millis() as u64,
                quit_requested = summary.quit_requested,
                final_scene = summary.final_scene.as_ref().map_or("none", SceneKey::as_str),
                effects_applied = sink.applied(),
                mode = ?final_mode,
                hp = session.hp(),
                max_hp = session.max_hp(),
                slimes = session.slime_count(),
                tutorial_played = session.tutorial_played(),
                "demo_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "loop_failed");
            ExitCode::FAILURE
        }
    }
}

fn drive(
    app: &AppWiring,
    runner: &mut LoopRunner<GameContext>,
    ctx: &mut GameContext,
    sink: &mut TracingEffectSink,
) -> Result<LoopSummary, AppError> {
    let mut input = DemoInput::new();
    if app.paced {
        runner.run_paced(Some(app.frames), &mut input, ctx, sink)
    } else {
        runner.run_frames(app.frames, UNPACED_FRAME_DT, &mut input, ctx, sink)
    }
}
