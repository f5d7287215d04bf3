use std::rc::Rc;

use engine::SceneMachine;

mod collector;
mod config;
mod context;
mod door;
mod enemy;
mod error;
mod events;
mod game_mode;
mod health;
mod level;
mod level_scene;
mod locomotion;
mod prefabs;
mod projectile;
mod session;
mod tutorial;

pub(crate) use config::{load_config, ConfigError, GameConfig};
pub(crate) use context::GameContext;

use level_scene::LevelScene;

/// One scene per configured level, keyed by level name.
pub(crate) fn build_scenes(config: &Rc<GameConfig>) -> SceneMachine<GameContext> {
    let mut scenes = SceneMachine::new();
    for level in &config.levels {
        let scene = LevelScene::new(Rc::clone(config), level.clone());
        scenes.register(scene.key(), Box::new(scene));
    }
    scenes
}
