use thiserror::Error;

use super::geometry::Vec2;

pub const TILE_EMPTY: u16 = 0;
pub const TILE_GROUND: u16 = 1;
pub const TILE_DECORATION: u16 = 2;

const RAY_SAMPLES_PER_UNIT: f32 = 32.0;

/// Collision layer a tile belongs to. Ground checks only ever ask for `Ground`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceLayer {
    Ground,
    Decoration,
}

impl SurfaceLayer {
    pub fn from_tile(tile: u16) -> Option<Self> {
        match tile {
            TILE_GROUND => Some(Self::Ground),
            TILE_DECORATION => Some(Self::Decoration),
            _ => None,
        }
    }
}

/// Tilemap origin convention:
/// - `origin` is the world position of tile (0,0) bottom-left corner.
/// - The center of tile (x,y) is `origin + (x + 0.5, y + 0.5)`.
/// - Row `y = 0` is the bottom row.
#[derive(Debug, Clone, PartialEq)]
pub struct Tilemap {
    width: u32,
    height: u32,
    origin: Vec2,
    tiles: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TilemapError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
}

impl Tilemap {
    pub fn new(
        width: u32,
        height: u32,
        origin: Vec2,
        tiles: Vec<u16>,
    ) -> Result<Self, TilemapError> {
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(TilemapError::TileCountMismatch { expected, actual });
        }
        Ok(Self {
            width,
            height,
            origin,
            tiles,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile_at(&self, x: u32, y: u32) -> Option<u16> {
        self.index_of(x, y)
            .and_then(|index| self.tiles.get(index).copied())
    }

    pub fn tile_center_world(&self, x: u32, y: u32) -> Option<Vec2> {
        self.index_of(x, y)?;
        Some(Vec2 {
            x: self.origin.x + x as f32 + 0.5,
            y: self.origin.y + y as f32 + 0.5,
        })
    }

    pub fn cell_of(&self, point: Vec2) -> Option<(u32, u32)> {
        let local = point - self.origin;
        if !local.x.is_finite() || !local.y.is_finite() || local.x < 0.0 || local.y < 0.0 {
            return None;
        }
        let x = local.x.floor() as u32;
        let y = local.y.floor() as u32;
        self.index_of(x, y).map(|_| (x, y))
    }

    pub fn layer_at(&self, point: Vec2) -> Option<SurfaceLayer> {
        let (x, y) = self.cell_of(point)?;
        self.tile_at(x, y).and_then(SurfaceLayer::from_tile)
    }

    pub fn is_ground_at(&self, point: Vec2) -> bool {
        self.layer_at(point) == Some(SurfaceLayer::Ground)
    }

    /// Marches along the ray in 1/32 unit steps and reports whether any sample lands
    /// inside a tile of `layer`.
    pub fn raycast_layer(
        &self,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        layer: SurfaceLayer,
    ) -> bool {
        let direction = direction.normalized_or_zero();
        if direction == Vec2::ZERO || !max_distance.is_finite() || max_distance < 0.0 {
            return false;
        }

        let steps = (max_distance * RAY_SAMPLES_PER_UNIT).ceil() as u32;
        (0..=steps).any(|step| {
            let distance = (step as f32 / RAY_SAMPLES_PER_UNIT).min(max_distance);
            self.layer_at(origin + direction * distance) == Some(layer)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_map() -> Tilemap {
        // 4x3, ground along the bottom row, decoration at (2,1).
        let mut tiles = vec![TILE_EMPTY; 12];
        tiles[0..4].copy_from_slice(&[TILE_GROUND; 4]);
        tiles[4 + 2] = TILE_DECORATION;
        Tilemap::new(4, 3, Vec2::ZERO, tiles).expect("tilemap")
    }

    #[test]
    fn tilemap_new_rejects_invalid_tile_count() {
        let result = Tilemap::new(2, 2, Vec2::ZERO, vec![0, 1, 2]);
        assert_eq!(
            result,
            Err(TilemapError::TileCountMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn tilemap_indexing_and_bounds() {
        let map = floor_map();
        assert_eq!(map.index_of(0, 0), Some(0));
        assert_eq!(map.index_of(3, 2), Some(11));
        assert_eq!(map.index_of(4, 0), None);
        assert_eq!(map.tile_at(2, 1), Some(TILE_DECORATION));
        assert_eq!(map.cell_of(Vec2::new(-0.1, 0.5)), None);
        assert_eq!(map.cell_of(Vec2::new(3.9, 2.9)), Some((3, 2)));
    }

    #[test]
    fn tilemap_origin_center_formula_is_enforced() {
        let map = Tilemap::new(2, 2, Vec2::new(-3.0, 5.0), vec![0; 4]).expect("tilemap");
        assert_eq!(map.tile_center_world(1, 0), Some(Vec2::new(-1.5, 5.5)));
    }

    #[test]
    fn downward_ray_hits_ground_within_distance() {
        let map = floor_map();
        let origin = Vec2::new(0.5, 1.02);
        assert!(map.raycast_layer(origin, Vec2::new(0.0, -1.0), 0.0625, SurfaceLayer::Ground));
        assert!(!map.raycast_layer(
            Vec2::new(0.5, 1.2),
            Vec2::new(0.0, -1.0),
            0.0625,
            SurfaceLayer::Ground
        ));
    }

    #[test]
    fn ray_ignores_other_layers_and_zero_direction() {
        let map = floor_map();
        let origin = Vec2::new(1.5, 1.5);
        assert!(!map.raycast_layer(origin, Vec2::new(1.0, 0.0), 0.6, SurfaceLayer::Ground));
        assert!(map.raycast_layer(origin, Vec2::new(1.0, 0.0), 0.6, SurfaceLayer::Decoration));
        assert!(!map.raycast_layer(origin, Vec2::ZERO, 5.0, SurfaceLayer::Decoration));
    }
}
