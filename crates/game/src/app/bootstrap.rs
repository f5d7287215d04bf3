use std::env;
use std::path::PathBuf;
use std::rc::Rc;

use engine::{resolve_app_paths, LoopConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::gameplay::{load_config, ConfigError, GameConfig};

const CONFIG_ENV_VAR: &str = "SLIMEBOUND_CONFIG";
const DEMO_FRAMES_ENV_VAR: &str = "SLIMEBOUND_DEMO_FRAMES";
const PACED_ENV_VAR: &str = "SLIMEBOUND_PACED";
const CONFIG_FILE_NAME: &str = "game.json";
const DEFAULT_DEMO_FRAMES: u64 = 1800;

pub(crate) struct AppWiring {
    pub(crate) loop_config: LoopConfig,
    pub(crate) game: Rc<GameConfig>,
    pub(crate) frames: u64,
    pub(crate) paced: bool,
}

pub(crate) fn build_app() -> Result<AppWiring, ConfigError> {
    init_tracing();
    info!("=== Slimebound Startup ===");

    let game = Rc::new(load_game_config()?);
    let frames = parse_demo_frames(env::var(DEMO_FRAMES_ENV_VAR).ok().as_deref());
    let paced = parse_paced_flag(env::var(PACED_ENV_VAR).ok().as_deref());
    info!(
        levels = game.levels.len(),
        first_level = %game.first_level,
        frames,
        paced,
        "app_configured"
    );

    Ok(AppWiring {
        loop_config: LoopConfig::default(),
        game,
        frames,
        paced,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn load_game_config() -> Result<GameConfig, ConfigError> {
    match config_path() {
        Some(path) => {
            info!(path = %path.display(), "config_loading");
            load_config(&path)
        }
        None => {
            warn!("config_file_missing_using_defaults");
            let config = GameConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// An explicit `SLIMEBOUND_CONFIG` wins even when the file is missing.
fn config_path() -> Option<PathBuf> {
    if let Ok(explicit) = env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(explicit));
    }
    match resolve_app_paths() {
        Ok(paths) => {
            let candidate = paths.config_dir.join(CONFIG_FILE_NAME);
            candidate.is_file().then_some(candidate)
        }
        Err(err) => {
            warn!(error = %err, "app_root_unresolved");
            None
        }
    }
}

fn parse_demo_frames(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else {
        return DEFAULT_DEMO_FRAMES;
    };
    match raw.trim().parse::<u64>() {
        Ok(frames) => frames,
        Err(_) => {
            warn!(
                var = DEMO_FRAMES_ENV_VAR,
                value = raw,
                default = DEFAULT_DEMO_FRAMES,
                "invalid_frame_count_using_default"
            );
            DEFAULT_DEMO_FRAMES
        }
    }
}

fn parse_paced_flag(raw: Option<&str>) -> bool {
    raw.map(str::trim)
        .is_some_and(|value| value == "1" || value.eq_ignore_ascii_case("true"))
}
