use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::PhysicsSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::door::DoorTuning;
use super::enemy::{EggTuning, EnemyTuning};
use super::error::GameplayError;
use super::game_mode::GameModeTuning;
use super::level::{DoorDef, LevelDef, LevelLayout};
use super::locomotion::PlayerTuning;
use super::projectile::ProjectileTuning;
use super::session::StartingSession;
use super::tutorial::TutorialTuning;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse config json: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
    #[error("parse config json at {path}: {source}")]
    ParseAt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: {message}")]
    Invalid { path: String, message: String },
    #[error(transparent)]
    Level(#[from] GameplayError),
}

/// Everything tunable about a session. Missing fields take built-in defaults; a
/// partial `boss` table fills its gaps from the spider defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct GameConfig {
    pub(crate) starting: StartingSession,
    pub(crate) physics: PhysicsSettings,
    pub(crate) player: PlayerTuning,
    pub(crate) spider: EnemyTuning,
    pub(crate) boss: EnemyTuning,
    pub(crate) egg: EggTuning,
    pub(crate) projectiles: ProjectileTuning,
    pub(crate) door: DoorTuning,
    pub(crate) game_mode: GameModeTuning,
    pub(crate) tutorial: TutorialTuning,
    pub(crate) levels: Vec<LevelDef>,
    pub(crate) first_level: String,
    pub(crate) rng_seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting: StartingSession::default(),
            physics: PhysicsSettings::default(),
            player: PlayerTuning::default(),
            spider: EnemyTuning::default(),
            boss: EnemyTuning::boss(),
            egg: EggTuning::default(),
            projectiles: ProjectileTuning::default(),
            door: DoorTuning::default(),
            game_mode: GameModeTuning::default(),
            tutorial: TutorialTuning::default(),
            levels: default_levels(),
            first_level: "meadow".to_string(),
            rng_seed: None,
        }
    }
}

impl GameConfig {
    pub(crate) fn level(&self, name: &str) -> Option<&LevelDef> {
        self.levels.iter().find(|level| level.name == name)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.starting.max_hp == 0 {
            return Err(invalid("starting.max_hp", "must be at least 1"));
        }
        if self.player.max_jumps == 0 {
            return Err(invalid("player.max_jumps", "must be at least 1"));
        }
        validate_enemy("spider", &self.spider)?;
        validate_enemy("boss", &self.boss)?;
        if !(self.projectiles.speed.is_finite() && self.projectiles.speed > 0.0) {
            return Err(invalid("projectiles.speed", "must be a positive number"));
        }
        if !(self.projectiles.ttl_seconds.is_finite() && self.projectiles.ttl_seconds > 0.0) {
            return Err(invalid("projectiles.ttl_seconds", "must be a positive number"));
        }
        if self.levels.is_empty() {
            return Err(invalid("levels", "at least one level is required"));
        }

        let mut names = BTreeSet::new();
        for (index, level) in self.levels.iter().enumerate() {
            if !names.insert(level.name.as_str()) {
                return Err(invalid(
                    &format!("levels[{index}].name"),
                    format!("duplicate level name '{}'", level.name),
                ));
            }
            LevelLayout::parse(level)?;
        }
        for (index, level) in self.levels.iter().enumerate() {
            if let Some(target) = &level.exit_to {
                if !names.contains(target.as_str()) {
                    return Err(invalid(
                        &format!("levels[{index}].exit_to"),
                        format!("unknown level '{target}'"),
                    ));
                }
            }
        }
        if self.level(&self.first_level).is_none() {
            return Err(invalid(
                "first_level",
                format!("unknown level '{}'", self.first_level),
            ));
        }
        Ok(())
    }
}

pub(crate) fn load_config(path: &Path) -> Result<GameConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config_json(&raw)?;
    config.validate()?;
    Ok(config)
}

pub(crate) fn parse_config_json(raw: &str) -> Result<GameConfig, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, GameConfig>(&mut deserializer) {
        Ok(config) => Ok(config),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(ConfigError::Parse { source })
            } else {
                Err(ConfigError::ParseAt { path, source })
            }
        }
    }
}

fn invalid(path: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        path: path.to_string(),
        message: message.into(),
    }
}

fn validate_enemy(table: &str, tuning: &EnemyTuning) -> Result<(), ConfigError> {
    let (min, max) = (tuning.state_delay_min, tuning.state_delay_max);
    if !(min.is_finite() && min >= 0.0) {
        return Err(invalid(
            &format!("{table}.state_delay_min"),
            "must be a non-negative number",
        ));
    }
    if !(max.is_finite() && max >= min) {
        return Err(invalid(
            &format!("{table}.state_delay_max"),
            format!("expected at least {min}, got {max}"),
        ));
    }
    Ok(())
}

fn rows(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| line.to_string()).collect()
}

fn default_levels() -> Vec<LevelDef> {
    vec![
        LevelDef {
            name: "meadow".to_string(),
            rows: rows(&[
                "#......................................#",
                "#......................................#",
                "#..........o..o........................#",
                "#........########...............g......#",
                "#......................................#",
                "#..............................~~~.....#",
                "#P.....S.....o......f....S.....D....x..#",
                "########################################",
            ]),
            doors: vec![DoorDef {
                name: "meadow_gate".to_string(),
                required_slimes: 3,
            }],
            exit_to: Some("lair".to_string()),
            exit_entrance: Some(0),
            tutorial: true,
            victory_on_clear: false,
        },
        LevelDef {
            name: "lair".to_string(),
            rows: rows(&[
                "#..............................#",
                "#..............................#",
                "#.........######...............#",
                "#..............................#",
                "#..............................#",
                "#0.......E..........B..........#",
                "################################",
            ]),
            doors: Vec::new(),
            exit_to: None,
            exit_entrance: None,
            tutorial: false,
            victory_on_clear: true,
        },
    ]
}
