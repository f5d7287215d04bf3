use engine::TilemapError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum GameplayError {
    #[error("enemy state value {0} has no mapped behaviour")]
    UnmappedEnemyState(u8),
    #[error("level '{level}': {source}")]
    Level {
        level: String,
        #[source]
        source: LevelError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum LevelError {
    #[error("layout has no rows")]
    EmptyLayout,
    #[error("unknown glyph '{glyph}' at row {row}, column {column}")]
    UnknownGlyph {
        glyph: char,
        row: usize,
        column: usize,
    },
    #[error("more than one player spawn marker")]
    DuplicatePlayerSpawn,
    #[error("no player spawn marker or entrance")]
    MissingPlayerSpawn,
    #[error("layout has {glyphs} door glyphs but {defined} door definitions")]
    DoorCountMismatch { glyphs: usize, defined: usize },
    #[error("gated glyph at row {row}, column {column} has no door to open it")]
    GatedWithoutDoor { row: usize, column: usize },
    #[error(transparent)]
    Tilemap(#[from] TilemapError),
}
