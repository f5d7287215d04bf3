use std::collections::BTreeMap;

use engine::{Tilemap, Vec2, TILE_DECORATION, TILE_EMPTY, TILE_GROUND};
use serde::{Deserialize, Serialize};

use super::error::{GameplayError, LevelError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct DoorDef {
    pub(crate) name: String,
    pub(crate) required_slimes: u32,
}

impl Default for DoorDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            required_slimes: 3,
        }
    }
}

/// One level as authored in configuration. `rows[0]` is the top row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LevelDef {
    pub(crate) name: String,
    pub(crate) rows: Vec<String>,
    pub(crate) doors: Vec<DoorDef>,
    pub(crate) exit_to: Option<String>,
    pub(crate) exit_entrance: Option<u32>,
    pub(crate) tutorial: bool,
    pub(crate) victory_on_clear: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Spider,
    Boss,
    Egg,
    Slime,
    Food,
    /// Index into the level's door list.
    Door(usize),
    /// Woken when door `door` opens.
    Gated { door: usize },
    /// `door` is `Some` for an exit that waits on that door.
    Exit { door: Option<usize> },
}

/// Parsed layout. Placement points are the bottom-centre of their cell.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LevelLayout {
    tilemap: Tilemap,
    player_spawn: Option<Vec2>,
    entrances: BTreeMap<u32, Vec2>,
    placements: Vec<(Placement, Vec2)>,
}

impl LevelLayout {
    pub(crate) fn parse(def: &LevelDef) -> Result<Self, GameplayError> {
        parse_rows(def).map_err(|source| GameplayError::Level {
            level: def.name.clone(),
            source,
        })
    }

    pub(crate) fn tilemap(&self) -> &Tilemap {
        &self.tilemap
    }

    pub(crate) fn placements(&self) -> &[(Placement, Vec2)] {
        &self.placements
    }

    pub(crate) fn entrance(&self, index: u32) -> Option<Vec2> {
        self.entrances.get(&index).copied()
    }

    /// The requested entrance if the level has it, else the `P` marker, else the
    /// lowest-numbered entrance.
    pub(crate) fn spawn_point(&self, entrance: Option<u32>) -> Option<Vec2> {
        entrance
            .and_then(|index| self.entrance(index))
            .or(self.player_spawn)
            .or_else(|| self.entrances.values().next().copied())
    }
}

fn parse_rows(def: &LevelDef) -> Result<LevelLayout, LevelError> {
    let height = def.rows.len();
    let width = def
        .rows
        .iter()
        .map(|row| row.chars().count())
        .max()
        .unwrap_or(0);
    if height == 0 || width == 0 {
        return Err(LevelError::EmptyLayout);
    }

    let mut tiles = vec![TILE_EMPTY; width * height];
    let mut player_spawn = None;
    let mut entrances = BTreeMap::new();
    let mut placements = Vec::new();
    let doors = door_floors(def, height);
    let mut door_glyphs = 0usize;

    for (row, line) in def.rows.iter().enumerate() {
        let y = height - 1 - row;
        for (column, glyph) in line.chars().enumerate() {
            let floor = Vec2::new(column as f32 + 0.5, y as f32);
            let index = y * width + column;
            match glyph {
                '.' | ' ' => {}
                '#' => tiles[index] = TILE_GROUND,
                '~' => tiles[index] = TILE_DECORATION,
                'P' => {
                    if player_spawn.replace(floor).is_some() {
                        return Err(LevelError::DuplicatePlayerSpawn);
                    }
                }
                '0'..='9' => {
                    let number = glyph.to_digit(10).unwrap_or_default();
                    entrances.entry(number).or_insert(floor);
                }
                'S' => placements.push((Placement::Spider, floor)),
                'B' => placements.push((Placement::Boss, floor)),
                'E' => placements.push((Placement::Egg, floor)),
                'o' => placements.push((Placement::Slime, floor)),
                'f' => placements.push((Placement::Food, floor)),
                'D' => {
                    placements.push((Placement::Door(door_glyphs), floor));
                    door_glyphs += 1;
                }
                'g' => {
                    let door = owning_door(&doors, floor, row, column)?;
                    placements.push((Placement::Gated { door }, floor));
                }
                'X' => placements.push((Placement::Exit { door: None }, floor)),
                'x' => {
                    let door = owning_door(&doors, floor, row, column)?;
                    placements.push((Placement::Exit { door: Some(door) }, floor));
                }
                other => {
                    return Err(LevelError::UnknownGlyph {
                        glyph: other,
                        row,
                        column,
                    })
                }
            }
        }
    }

    if door_glyphs != def.doors.len() {
        return Err(LevelError::DoorCountMismatch {
            glyphs: door_glyphs,
            defined: def.doors.len(),
        });
    }
    if player_spawn.is_none() && entrances.is_empty() {
        return Err(LevelError::MissingPlayerSpawn);
    }

    let tilemap = Tilemap::new(width as u32, height as u32, Vec2::ZERO, tiles)?;
    Ok(LevelLayout {
        tilemap,
        player_spawn,
        entrances,
        placements,
    })
}

fn door_floors(def: &LevelDef, height: usize) -> Vec<Vec2> {
    let mut floors = Vec::new();
    for (row, line) in def.rows.iter().enumerate() {
        let y = height - 1 - row;
        for (column, glyph) in line.chars().enumerate() {
            if glyph == 'D' {
                floors.push(Vec2::new(column as f32 + 0.5, y as f32));
            }
        }
    }
    floors
}

/// A gated glyph belongs to the nearest door; ties go to the earlier door.
fn owning_door(
    doors: &[Vec2],
    floor: Vec2,
    row: usize,
    column: usize,
) -> Result<usize, LevelError> {
    doors
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (**a - floor).length().total_cmp(&(**b - floor).length()))
        .map(|(index, _)| index)
        .ok_or(LevelError::GatedWithoutDoor { row, column })
}
