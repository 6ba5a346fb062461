//! Block Impact - a physics-driven Breakout game
//!
//! Core modules:
//! - `sim`: Simulation (entities, physics world, collision resolution, game state)
//! - `renderer`: Drawable/renderer contract consumed by the frame loop
//! - `audio`: Sound cue contract
//! - `platform`: Input source contract
//! - `persistence`: JSON save/load helpers
//! - `settings`: Data-driven tuning

pub mod audio;
pub mod highscores;
pub mod persistence;
pub mod platform;
pub mod renderer;
pub mod settings;
pub mod sim;

pub use audio::{AudioCue, SoundEffect};
pub use highscores::HighScores;
pub use platform::InputSource;
pub use renderer::{Drawable, Renderer, Sprite};
pub use settings::Settings;

use glam::Vec2;
use rapier2d::prelude::{Real, Vector, vector};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz for stable contacts)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Tile dimensions in world units (meters)
    pub const TILE_WIDTH: f32 = 2.0;
    pub const TILE_HEIGHT: f32 = 1.0;
    /// Gap left between neighbouring block colliders
    pub const BLOCK_GAP: f32 = 0.02;

    /// Default downward gravity magnitude
    pub const DEFAULT_GRAVITY: f32 = 9.81;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 0.3;
    /// Height above the paddle where a new ball appears
    pub const BALL_SPAWN_HEIGHT: f32 = 2.5;
    /// Hard cap on ball speed
    pub const BALL_MAX_SPEED: f32 = 25.0;
    pub const BALL_ENERGY: u32 = 100;

    /// Paddle defaults
    pub const PADDLE_HALF_WIDTH: f32 = 1.6;
    pub const PADDLE_HALF_HEIGHT: f32 = 0.2;
    /// Height of the paddle hinge above the bottom of the field
    pub const PADDLE_Y: f32 = 1.0;
    /// Maximum paddle tilt (radians) either way
    pub const PADDLE_MAX_TILT: f32 = 0.6;

    /// Block energy when the tile doesn't specify one
    pub const DEFAULT_BLOCK_ENERGY: u32 = 100;

    /// Thickness of the boundary walls
    pub const WALL_THICKNESS: f32 = 0.5;
    /// Distance below the field where the ground sensor sits
    pub const GROUND_DEPTH: f32 = 1.5;

    /// Particle radius for explosion debris
    pub const PARTICLE_RADIUS: f32 = 0.08;
    /// Rise speed of floating score text (units/s)
    pub const TEXT_RISE_SPEED: f32 = 1.5;
}

/// Convert a glam vector into a rapier vector
#[inline]
pub fn to_rapier(v: Vec2) -> Vector<Real> {
    vector![v.x, v.y]
}

/// Convert a rapier vector into a glam vector
#[inline]
pub fn from_rapier(v: &Vector<Real>) -> Vec2 {
    Vec2::new(v.x, v.y)
}
