//! Game settings and tuning
//!
//! Every field has a default so partial JSON files are accepted.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::persistence::{self, PersistenceError};
use crate::sim::level::LevelSource;
use crate::sim::physics::WorldConfig;

/// Game settings/tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Physics ===
    /// Velocity solver iterations per step
    pub velocity_iterations: usize,
    /// Position stabilization iterations per step
    pub position_iterations: usize,
    /// Upper bound on physics steps per frame
    pub max_substeps: u32,
    /// Frame times above this are clamped (seconds)
    pub max_frame_time: f32,
    /// Contacts kept per physics step
    pub contact_capacity: usize,

    // === Lives & scoring ===
    pub initial_lives: u32,
    /// Scores granting an extra life, ascending
    pub extra_life_thresholds: Vec<i64>,
    /// After the last threshold, another life every this many points
    pub extra_life_step: i64,
    /// Flat killing-spree bonus, added to the level's own bonus
    pub killing_spree_bonus: i64,
    /// Score multiplier for catching a falling block with the paddle
    pub catch_multiplier: i64,

    // === Collisions ===
    /// Impulse above which a ball/paddle contact is audible
    pub paddle_hit_audible_impulse: f32,
    /// Block damage per unit of impulse
    pub damage_per_impulse: f32,

    // === Paddle ===
    /// Carriage speed (units/s)
    pub paddle_speed: f32,
    /// Hinge motor speed while kicking (rad/s)
    pub kick_speed: f32,
    /// Speed given to a newly served ball
    pub serve_speed: f32,

    // === Effects ===
    pub explosion_particles: usize,
    /// Seconds
    pub particle_lifetime: f64,
    pub particle_speed: f32,
    /// Seconds
    pub score_text_lifetime: f64,
    /// Glare decay per second (fraction)
    pub glare_decay: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            velocity_iterations: 8,
            position_iterations: 3,
            max_substeps: crate::consts::MAX_SUBSTEPS,
            max_frame_time: 0.1,
            contact_capacity: 512,

            initial_lives: 3,
            extra_life_thresholds: vec![1_000, 2_500, 5_000, 10_000],
            extra_life_step: 10_000,
            killing_spree_bonus: 500,
            catch_multiplier: 2,

            paddle_hit_audible_impulse: 0.5,
            damage_per_impulse: 25.0,

            paddle_speed: 14.0,
            kick_speed: 12.0,
            serve_speed: 8.0,

            explosion_particles: 12,
            particle_lifetime: 0.8,
            particle_speed: 6.0,
            score_text_lifetime: 1.0,
            glare_decay: 3.0,
        }
    }
}

impl Settings {
    /// Physics world configuration for a level
    pub fn world_config(&self, level: &dyn LevelSource) -> WorldConfig {
        WorldConfig {
            gravity: level.gravity(),
            velocity_iterations: self.velocity_iterations,
            position_iterations: self.position_iterations,
            contact_capacity: self.contact_capacity,
            particles_hit_ball: level.particles_collide_with_ball(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        persistence::load_json(path)
    }

    /// Load settings, falling back to defaults when the file is missing or bad
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(PersistenceError::NotFound(_)) => {
                log::info!("Using default settings");
                Self::default()
            }
            Err(err) => {
                log::warn!("Ignoring settings file: {err}");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        persistence::save_json(path, self)
    }
}
