//! Level data model
//!
//! A level is an immutable tile grid plus a side table of per-tile-type
//! parameters. Tile id 0 is an empty cell. Level files are decoded elsewhere;
//! this module only sees the resulting grid, which may also come from JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entity::EntityKind;
use crate::consts::{DEFAULT_BLOCK_ENERGY, DEFAULT_GRAVITY};

/// Empty grid cell
pub const EMPTY_TILE: u32 = 0;

/// Errors raised while validating or decoding level data
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level has no tile rows")]
    EmptyGrid,
    #[error("row {row} has {found} tiles, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("tile id {tile_id} at row {row}, column {col} has no tile parameters")]
    MissingTileParam { tile_id: u32, row: usize, col: usize },
    #[error("level {0} has no blocks")]
    NoBlocks(String),
    #[error("malformed level data: {0}")]
    Json(#[from] serde_json::Error),
}

/// Physical material of a body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
}

impl Material {
    /// Fallback material for each entity kind
    pub fn default_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Ball => Self {
                density: 1.0,
                friction: 0.1,
                restitution: 0.9,
            },
            EntityKind::Block => Self {
                density: 4.0,
                friction: 0.6,
                restitution: 0.1,
            },
            EntityKind::Wall => Self {
                density: 0.0,
                friction: 0.2,
                restitution: 0.5,
            },
            EntityKind::Paddle => Self {
                density: 10.0,
                friction: 0.3,
                restitution: 0.6,
            },
            EntityKind::Particle => Self {
                density: 0.5,
                friction: 0.1,
                restitution: 0.3,
            },
            EntityKind::Ground | EntityKind::Text => Self {
                density: 0.0,
                friction: 0.0,
                restitution: 0.0,
            },
        }
    }
}

/// Partial material; unset fields fall back to the kind's defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialOverride {
    pub density: Option<f32>,
    pub friction: Option<f32>,
    pub restitution: Option<f32>,
}

impl MaterialOverride {
    pub fn resolve(&self, kind: EntityKind) -> Material {
        let base = Material::default_for(kind);
        Material {
            density: self.density.unwrap_or(base.density),
            friction: self.friction.unwrap_or(base.friction),
            restitution: self.restitution.unwrap_or(base.restitution),
        }
    }
}

/// Per tile-type gameplay and physical parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileParam {
    /// Texture name handed to the renderer
    #[serde(default)]
    pub texture: String,
    /// Points awarded when a block of this type is destroyed
    pub score: i64,
    #[serde(default)]
    pub energy: Option<u32>,
    #[serde(default, flatten)]
    pub material: MaterialOverride,
    /// Gravity scale applied once the block is dislodged
    #[serde(default)]
    pub gravity_scale: Option<f32>,
    /// Fixed blocks never move
    #[serde(default)]
    pub fixed: bool,
    /// Ball impulse needed to damage the block at all
    #[serde(default)]
    pub min_impulse_for_damage: f32,
    /// Ball impulse that destroys the block outright; `None` never does
    #[serde(default)]
    pub min_impulse_for_kill: Option<f32>,
}

impl TileParam {
    /// A movable block worth `score` points with default physics
    pub fn with_score(score: i64) -> Self {
        Self {
            texture: String::new(),
            score,
            energy: None,
            material: MaterialOverride::default(),
            gravity_scale: None,
            fixed: false,
            min_impulse_for_damage: 0.0,
            min_impulse_for_kill: None,
        }
    }

    pub fn material(&self) -> Material {
        self.material.resolve(EntityKind::Block)
    }

    pub fn energy(&self) -> u32 {
        self.energy.unwrap_or(DEFAULT_BLOCK_ENERGY)
    }

    pub fn falling_gravity_scale(&self) -> f32 {
        self.gravity_scale.unwrap_or(1.0)
    }

    pub fn kill_impulse(&self) -> f32 {
        self.min_impulse_for_kill.unwrap_or(f32::INFINITY)
    }
}

/// Read-only view of a level, as the simulation consumes it
pub trait LevelSource {
    fn name(&self) -> &str;
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    /// Tile ids of one grid row, top row first
    fn map_data_scan_line(&self, row: usize) -> Option<&[u32]>;
    fn tile_param(&self, tile_id: u32) -> Option<&TileParam>;
    /// Downward gravity magnitude
    fn gravity(&self) -> f32;
    /// Maximum seconds spanned by a killing spree
    fn killing_spree_interval(&self) -> f64;
    fn killings_per_killing_spree(&self) -> usize;
    fn killing_spree_bonus(&self) -> i64;
    fn ball_material(&self) -> Material;
    fn wall_material(&self) -> Material;
    fn particles_collide_with_ball(&self) -> bool;
}

/// Decoded level description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelData {
    pub name: String,
    /// Tile rows, top row first
    pub tiles: Vec<Vec<u32>>,
    pub tile_params: BTreeMap<u32, TileParam>,
    #[serde(default = "LevelData::default_gravity")]
    pub gravity: f32,
    #[serde(default = "LevelData::default_spree_interval")]
    pub killing_spree_interval: f64,
    #[serde(default = "LevelData::default_spree_kills")]
    pub killings_per_killing_spree: usize,
    #[serde(default)]
    pub killing_spree_bonus: i64,
    #[serde(default)]
    pub ball: MaterialOverride,
    #[serde(default)]
    pub wall: MaterialOverride,
    #[serde(default)]
    pub particles_collide_with_ball: bool,
}

impl LevelData {
    fn default_gravity() -> f32 {
        DEFAULT_GRAVITY
    }

    fn default_spree_interval() -> f64 {
        1.0
    }

    fn default_spree_kills() -> usize {
        5
    }

    /// Build a level from a grid and tile table with default settings
    pub fn new(name: &str, tiles: Vec<Vec<u32>>, tile_params: BTreeMap<u32, TileParam>) -> Self {
        Self {
            name: name.to_string(),
            tiles,
            tile_params,
            gravity: Self::default_gravity(),
            killing_spree_interval: Self::default_spree_interval(),
            killings_per_killing_spree: Self::default_spree_kills(),
            killing_spree_bonus: 0,
            ball: MaterialOverride::default(),
            wall: MaterialOverride::default(),
            particles_collide_with_ball: false,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        let level: Self = serde_json::from_str(json)?;
        Ok(level)
    }
}

impl LevelSource for LevelData {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> usize {
        self.tiles.first().map_or(0, Vec::len)
    }

    fn height(&self) -> usize {
        self.tiles.len()
    }

    fn map_data_scan_line(&self, row: usize) -> Option<&[u32]> {
        self.tiles.get(row).map(Vec::as_slice)
    }

    fn tile_param(&self, tile_id: u32) -> Option<&TileParam> {
        self.tile_params.get(&tile_id)
    }

    fn gravity(&self) -> f32 {
        self.gravity
    }

    fn killing_spree_interval(&self) -> f64 {
        self.killing_spree_interval
    }

    fn killings_per_killing_spree(&self) -> usize {
        self.killings_per_killing_spree
    }

    fn killing_spree_bonus(&self) -> i64 {
        self.killing_spree_bonus
    }

    fn ball_material(&self) -> Material {
        self.ball.resolve(EntityKind::Ball)
    }

    fn wall_material(&self) -> Material {
        self.wall.resolve(EntityKind::Wall)
    }

    fn particles_collide_with_ball(&self) -> bool {
        self.particles_collide_with_ball
    }
}

/// A non-empty grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCell {
    pub row: usize,
    pub col: usize,
    pub tile_id: u32,
}

/// Check the grid shape and that every used tile id has parameters.
///
/// Returns the non-empty cells in row-major order. Nothing is built when
/// this fails.
pub fn validate(level: &dyn LevelSource) -> Result<Vec<TileCell>, LevelError> {
    let height = level.height();
    let width = level.width();
    if height == 0 || width == 0 {
        return Err(LevelError::EmptyGrid);
    }

    let mut cells = Vec::new();
    for row in 0..height {
        let line = level.map_data_scan_line(row).ok_or(LevelError::EmptyGrid)?;
        if line.len() != width {
            return Err(LevelError::RaggedRow {
                row,
                found: line.len(),
                expected: width,
            });
        }
        for (col, &tile_id) in line.iter().enumerate() {
            if tile_id == EMPTY_TILE {
                continue;
            }
            if level.tile_param(tile_id).is_none() {
                return Err(LevelError::MissingTileParam { tile_id, row, col });
            }
            cells.push(TileCell { row, col, tile_id });
        }
    }

    if cells.is_empty() {
        return Err(LevelError::NoBlocks(level.name().to_string()));
    }
    Ok(cells)
}

/// Ordered collection of levels, numbered from 1
pub trait LevelCatalog {
    /// `None` when no level with this number exists
    fn level(&self, number: u32) -> Option<Result<LevelData, LevelError>>;
}

impl LevelCatalog for Vec<LevelData> {
    fn level(&self, number: u32) -> Option<Result<LevelData, LevelError>> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.get(index).cloned().map(Ok)
    }
}

/// Levels kept as JSON text, decoded on demand
#[derive(Debug, Clone, Default)]
pub struct JsonLevels {
    pub sources: Vec<String>,
}

impl JsonLevels {
    /// The levels shipped with the game
    pub fn bundled() -> Self {
        Self {
            sources: vec![
                include_str!("../../levels/01.json").to_string(),
                include_str!("../../levels/02.json").to_string(),
            ],
        }
    }
}

impl LevelCatalog for JsonLevels {
    fn level(&self, number: u32) -> Option<Result<LevelData, LevelError>> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.sources.get(index).map(|json| LevelData::from_json(json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BTreeMap<u32, TileParam> {
        let mut params = BTreeMap::new();
        params.insert(1, TileParam::with_score(10));
        params
    }

    #[test]
    fn test_validate_collects_cells() {
        let level = LevelData::new("t", vec![vec![1, 0, 1], vec![0, 1, 0]], params());
        let cells = validate(&level).unwrap();
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[2], TileCell { row: 1, col: 1, tile_id: 1 });
    }

    #[test]
    fn test_validate_missing_param() {
        let level = LevelData::new("t", vec![vec![1, 2]], params());
        match validate(&level) {
            Err(LevelError::MissingTileParam { tile_id, row, col }) => {
                assert_eq!((tile_id, row, col), (2, 0, 1));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_validate_ragged() {
        let level = LevelData::new("t", vec![vec![1, 1], vec![1]], params());
        assert!(matches!(validate(&level), Err(LevelError::RaggedRow { row: 1, .. })));
    }

    #[test]
    fn test_validate_empty() {
        let level = LevelData::new("t", Vec::new(), params());
        assert!(matches!(validate(&level), Err(LevelError::EmptyGrid)));
        let level = LevelData::new("t", vec![vec![0, 0]], params());
        assert!(matches!(validate(&level), Err(LevelError::NoBlocks(_))));
    }

    #[test]
    fn test_material_fallback() {
        let partial = MaterialOverride {
            friction: Some(0.9),
            ..Default::default()
        };
        let ball = partial.resolve(EntityKind::Ball);
        assert_eq!(ball.friction, 0.9);
        assert_eq!(ball.restitution, Material::default_for(EntityKind::Ball).restitution);
        assert_ne!(
            Material::default_for(EntityKind::Ball),
            Material::default_for(EntityKind::Block)
        );
        assert_ne!(
            Material::default_for(EntityKind::Wall),
            Material::default_for(EntityKind::Block)
        );
    }

    #[test]
    fn test_from_json_defaults() {
        let json = r#"{
            "name": "json",
            "tiles": [[1, 1], [0, 0]],
            "tile_params": { "1": { "score": 25, "friction": 0.4, "fixed": true } }
        }"#;
        let level = LevelData::from_json(json).unwrap();
        assert_eq!(level.width(), 2);
        assert_eq!(level.height(), 2);
        assert_eq!(level.gravity(), DEFAULT_GRAVITY);
        assert_eq!(level.killings_per_killing_spree(), 5);
        let param = level.tile_param(1).unwrap();
        assert_eq!(param.score, 25);
        assert!(param.fixed);
        assert_eq!(param.material().friction, 0.4);
        assert_eq!(param.energy(), DEFAULT_BLOCK_ENERGY);
        assert!(param.kill_impulse().is_infinite());
    }

    #[test]
    fn test_json_round_trip_keeps_unkillable() {
        let level = LevelData::new("saved", vec![vec![1]], params());
        let json = serde_json::to_string(&level).unwrap();
        let back = LevelData::from_json(&json).unwrap();
        assert_eq!(back.tile_param(1).unwrap().min_impulse_for_kill, None);
        assert!(back.tile_param(1).unwrap().kill_impulse().is_infinite());
    }

    #[test]
    fn test_from_json_malformed() {
        assert!(matches!(LevelData::from_json("{"), Err(LevelError::Json(_))));
    }

    #[test]
    fn test_catalog_numbering() {
        let levels = vec![LevelData::new("one", vec![vec![1]], params())];
        assert!(levels.level(0).is_none());
        assert_eq!(levels.level(1).unwrap().unwrap().name, "one");
        assert!(levels.level(2).is_none());
    }

    #[test]
    fn test_bundled_levels_validate() {
        let catalog = JsonLevels::bundled();
        let mut number = 1;
        while let Some(level) = catalog.level(number) {
            let level = level.unwrap();
            assert!(!validate(&level).unwrap().is_empty(), "{}", level.name);
            number += 1;
        }
        assert_eq!(number, 3);
    }
}
