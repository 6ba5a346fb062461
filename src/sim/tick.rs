//! Frame loop and top-level state machine
//!
//! [`Game`] owns the physics world, the entities and the session state, and
//! advances them once per rendered frame. Within a frame the order is fixed:
//! input, physics sub-steps (each followed by contact resolution and kill
//! processing), entity update, staged-entity merge. Nothing runs
//! concurrently.

use std::time::{SystemTime, UNIX_EPOCH};

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::collision::{CollisionResolver, Effect, ResolverConfig};
use super::combo::ComboTracker;
use super::entity::{EntityId, EntityKind, EntityStore, KillEvent};
use super::level::{self, LevelCatalog, LevelData, LevelError, LevelSource};
use super::physics::{PhysicsWorld, WorldConfig};
use super::spawn;
use super::state::{GameMode, GameState};
use crate::audio::{AudioCue, SoundEffect};
use crate::consts::*;
use crate::highscores::HighScores;
use crate::platform::InputSource;
use crate::renderer::{self, Renderer};
use crate::settings::Settings;

/// Input commands for a single frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickInput {
    pub left: bool,
    pub right: bool,
    pub kick_left: bool,
    pub kick_right: bool,
    /// Primary action: start, next level, new ball, restart
    pub action: bool,
    /// Pause toggle
    pub pause: bool,
}

impl TickInput {
    /// Sample an input source for this frame
    pub fn poll(source: &mut dyn InputSource) -> Self {
        Self {
            left: source.move_left(),
            right: source.move_right(),
            kick_left: source.kick_left(),
            kick_right: source.kick_right(),
            action: source.action_pressed(),
            pause: source.pause_pressed(),
        }
    }
}

/// A game session
pub struct Game {
    settings: Settings,
    catalog: Box<dyn LevelCatalog>,
    level: Option<LevelData>,
    physics: PhysicsWorld,
    entities: EntityStore,
    resolver: CollisionResolver,
    combo: ComboTracker,
    state: GameState,
    high_scores: HighScores,
    seed: u64,
    rng: Pcg32,
    /// Unsimulated time carried to the next frame (seconds)
    accumulator: f32,
    paddle: Option<EntityId>,
    ball: Option<EntityId>,
    field: Vec2,
}

impl Game {
    /// Create the world and land on the welcome screen
    pub fn new(settings: Settings, catalog: impl LevelCatalog + 'static, seed: u64) -> Self {
        let physics = PhysicsWorld::new(&idle_world_config(&settings));
        let resolver = CollisionResolver::new(ResolverConfig::from(&settings));
        let state = GameState::new(&settings);
        let mut game = Self {
            settings,
            catalog: Box::new(catalog),
            level: None,
            physics,
            entities: EntityStore::new(),
            resolver,
            combo: ComboTracker::new(5, 1.0),
            state,
            high_scores: HighScores::new(),
            seed,
            rng: Pcg32::seed_from_u64(seed),
            accumulator: 0.0,
            paddle: None,
            ball: None,
            field: Vec2::ZERO,
        };
        game.enter_welcome();
        game
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn mode(&self) -> GameMode {
        self.state.mode
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    /// Direct entity access for tools and scripted scenarios
    pub fn entities_mut(&mut self) -> &mut EntityStore {
        &mut self.entities
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn level(&self) -> Option<&LevelData> {
        self.level.as_ref()
    }

    /// Playfield size of the current level
    pub fn field(&self) -> Vec2 {
        self.field
    }

    pub fn ball(&self) -> Option<EntityId> {
        self.ball
    }

    pub fn paddle(&self) -> Option<EntityId> {
        self.paddle
    }

    pub fn high_scores(&self) -> &HighScores {
        &self.high_scores
    }

    pub fn set_high_scores(&mut self, high_scores: HighScores) {
        self.high_scores = high_scores;
    }

    /// Throw the whole world away and go back to the welcome screen
    pub fn restart(&mut self) {
        self.physics = PhysicsWorld::new(&idle_world_config(&self.settings));
        self.entities.reset();
        self.state = GameState::new(&self.settings);
        self.combo.reset();
        self.rng = Pcg32::seed_from_u64(self.seed);
        self.accumulator = 0.0;
        self.level = None;
        self.paddle = None;
        self.ball = None;
        self.field = Vec2::ZERO;
        log::info!("Game restarted");
        self.enter_welcome();
    }

    fn enter_welcome(&mut self) {
        self.state.mode = GameMode::WelcomeScreen;
        log::info!("Welcome screen");
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    pub fn pause(&mut self) {
        if self.state.mode == GameMode::Playing && !self.state.paused {
            self.state.paused = true;
            log::info!("Paused");
        }
    }

    pub fn resume(&mut self) {
        if self.state.paused {
            self.state.paused = false;
            log::info!("Resumed");
        }
    }

    pub fn focus_lost(&mut self) {
        self.pause();
    }

    pub fn focus_gained(&mut self) {
        self.resume();
    }

    /// Advance the game by one rendered frame of `elapsed` seconds
    pub fn update(&mut self, input: &TickInput, elapsed: f32, audio: &mut dyn AudioCue) {
        // A negative or NaN cap stops the clock
        let elapsed = elapsed.max(0.0).min(self.settings.max_frame_time.max(0.0));
        self.state.glare = (self.state.glare - self.settings.glare_decay * elapsed).max(0.0);

        match self.state.mode {
            GameMode::Initialization => self.enter_welcome(),
            GameMode::WelcomeScreen => {
                if input.action {
                    self.load_level(1, audio);
                }
            }
            GameMode::LevelCompleted => {
                if input.action {
                    self.load_level(self.state.level + 1, audio);
                }
            }
            GameMode::GameOver | GameMode::PlayerWon => {
                if input.action {
                    self.restart();
                }
            }
            GameMode::Playing => {
                if input.pause {
                    if self.state.paused {
                        self.resume();
                    } else {
                        self.pause();
                    }
                }
                if !self.state.paused {
                    self.play_frame(input, elapsed, audio);
                }
            }
        }
    }

    fn play_frame(&mut self, input: &TickInput, elapsed: f32, audio: &mut dyn AudioCue) {
        self.entities.purge_dead(&mut self.physics);

        if input.action && self.ball.is_none() {
            self.serve_ball(audio);
        }

        self.accumulator += elapsed;
        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < self.settings.max_substeps {
            self.drive_paddle(input);
            self.physics.step(SIM_DT);
            self.accumulator -= SIM_DT;
            self.state.sim_time += f64::from(SIM_DT);
            substeps += 1;

            let contacts = self.physics.drain_contacts();
            let effects = self
                .resolver
                .resolve(&contacts, &mut self.entities, &mut self.physics);
            self.apply_effects(effects, audio);
            self.process_kills(audio);

            if !self.state.is_playing() {
                self.accumulator = 0.0;
                break;
            }
        }
        if substeps == self.settings.max_substeps {
            // Too far behind; don't try to catch up next frame
            self.accumulator = self.accumulator.min(SIM_DT);
        }

        self.entities
            .update(elapsed, self.state.sim_time, &mut self.physics);
        self.process_kills(audio);
        self.entities.merge_pending();

        if self.state.is_playing() {
            self.state.level_time += f64::from(elapsed);
        }
    }

    fn drive_paddle(&mut self, input: &TickInput) {
        let Some(paddle) = self
            .paddle
            .and_then(|id| self.entities.alive(id))
            .and_then(|e| e.paddle())
        else {
            return;
        };

        let x = self
            .physics
            .placement(paddle.carriage)
            .map_or(0.0, |(position, _)| position.x);
        let speed = self.settings.paddle_speed;
        let mut vx = match (input.left, input.right) {
            (true, false) => -speed,
            (false, true) => speed,
            _ => 0.0,
        };
        if (x <= PADDLE_HALF_WIDTH && vx < 0.0) || (x >= self.field.x - PADDLE_HALF_WIDTH && vx > 0.0) {
            vx = 0.0;
        }
        self.physics.set_velocity(paddle.carriage, Vec2::new(vx, 0.0));

        let kick = self.settings.kick_speed;
        let motor = match (input.kick_left, input.kick_right) {
            (true, false) => Some(-kick),
            (false, true) => Some(kick),
            _ => None,
        };
        self.physics.drive_hinge(paddle.hinge, motor);
    }

    fn serve_ball(&mut self, audio: &mut dyn AudioCue) {
        let Some(level) = &self.level else {
            return;
        };
        let paddle_x = self
            .paddle
            .and_then(|id| self.entities.alive(id))
            .map_or(self.field.x * 0.5, |paddle| paddle.position().x);
        let ball = spawn::spawn_ball(
            &mut self.entities,
            &mut self.physics,
            spawn::ball_spawn_point(paddle_x),
            Vec2::new(0.0, self.settings.serve_speed),
            level.ball_material(),
            self.state.sim_time,
        );
        self.ball = Some(ball);
        audio.play(SoundEffect::NewBall);
        log::debug!("New ball {ball}");
    }

    fn apply_effects(&mut self, effects: Vec<Effect>, audio: &mut dyn AudioCue) {
        for effect in effects {
            match effect {
                Effect::Score { delta, at } => self.award(delta, at, audio),
                Effect::Sound(sound) => audio.play(sound),
                Effect::Explosion { at } => {
                    spawn::spawn_explosion(
                        &mut self.entities,
                        &mut self.physics,
                        at,
                        &self.settings,
                        &mut self.rng,
                        self.state.sim_time,
                    );
                }
                Effect::BlockShattered { at } => {
                    if self.combo.record_kill(self.state.sim_time) {
                        let level_bonus = self.level.as_ref().map_or(0, |l| l.killing_spree_bonus());
                        let bonus = self.settings.killing_spree_bonus + level_bonus;
                        log::info!("Killing spree! +{bonus}");
                        audio.play(SoundEffect::KillingSpree);
                        self.award(bonus, at, audio);
                    }
                }
                Effect::Glare => self.state.glare = 1.0,
            }
        }
    }

    fn award(&mut self, delta: i64, at: Vec2, audio: &mut dyn AudioCue) {
        let lives = self.state.add_score(delta);
        spawn::spawn_score_text(
            &mut self.entities,
            at,
            delta,
            self.settings.score_text_lifetime,
            self.state.sim_time,
        );
        if lives > 0 {
            log::info!("Extra life at {} points ({} left)", self.state.score, self.state.lives);
            audio.play(SoundEffect::NewLife);
        }
    }

    fn process_kills(&mut self, audio: &mut dyn AudioCue) {
        for kill in self.entities.drain_kills() {
            self.on_kill(kill, audio);
        }
    }

    fn on_kill(&mut self, kill: KillEvent, audio: &mut dyn AudioCue) {
        match kill.kind {
            EntityKind::Block => {
                self.state.blocks_remaining = self.state.blocks_remaining.saturating_sub(1);
                if self.state.blocks_remaining == 0 && self.state.mode == GameMode::Playing {
                    self.complete_level(audio);
                }
            }
            EntityKind::Ball => {
                if self.ball == Some(kill.id) {
                    self.ball = None;
                }
                if self.state.mode != GameMode::Playing {
                    return;
                }
                if self.state.lose_ball() {
                    self.finish(GameMode::GameOver, audio);
                } else {
                    log::info!("Ball lost, {} lives left", self.state.lives);
                }
            }
            EntityKind::Paddle
            | EntityKind::Wall
            | EntityKind::Ground
            | EntityKind::Particle
            | EntityKind::Text => {}
        }
    }

    fn complete_level(&mut self, audio: &mut dyn AudioCue) {
        self.state.bank_time_penalty();
        self.state.mode = GameMode::LevelCompleted;
        audio.play(SoundEffect::LevelComplete);
        log::info!(
            "Level {} completed, score {}",
            self.state.level,
            self.state.score
        );
    }

    fn finish(&mut self, mode: GameMode, audio: &mut dyn AudioCue) {
        self.state.mode = mode;
        let score = self.state.displayed_score();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        if let Some(rank) = self.high_scores.add_score(score, self.state.level, timestamp) {
            log::info!("High score #{rank}: {score}");
        }
        audio.play(match mode {
            GameMode::PlayerWon => SoundEffect::PlayerWon,
            _ => SoundEffect::GameOver,
        });
        log::info!("{mode:?} with {score} points on level {}", self.state.level);
    }

    /// Build and enter a level, reporting whether it exists
    fn start_level(&mut self, number: u32) -> Result<bool, LevelError> {
        let Some(level) = self.catalog.level(number) else {
            return Ok(false);
        };
        let level = level?;
        let cells = level::validate(&level)?;

        self.physics = PhysicsWorld::new(&self.settings.world_config(&level));
        self.entities.reset();
        self.state.sim_time = 0.0;
        let layout = spawn::populate_level(&level, &cells, &mut self.entities, &mut self.physics, 0.0)?;
        self.entities.merge_pending();

        self.combo = ComboTracker::new(
            level.killings_per_killing_spree(),
            level.killing_spree_interval(),
        );
        self.state.level = number;
        self.state.blocks_remaining = layout.blocks;
        self.state.level_time = 0.0;
        self.state.paused = false;
        self.state.last_error = None;
        self.state.mode = GameMode::Playing;
        self.accumulator = 0.0;
        self.paddle = Some(layout.paddle);
        self.ball = Some(layout.ball);
        self.field = layout.field;
        log::info!(
            "Level {number} '{}' started, gravity {}",
            level.name(),
            self.physics.gravity()
        );
        self.level = Some(level);
        Ok(true)
    }

    fn load_level(&mut self, number: u32, audio: &mut dyn AudioCue) {
        match self.start_level(number) {
            Ok(true) => {}
            Ok(false) if number > 1 => self.finish(GameMode::PlayerWon, audio),
            Ok(false) => {
                log::error!("No levels to play");
                self.state.last_error = Some("no levels available".to_string());
            }
            Err(err) => {
                log::error!("Level {number} failed to load: {err}");
                self.state.last_error = Some(err.to_string());
            }
        }
    }

    /// Submit every visible entity, then the glare overlay
    pub fn draw(&self, renderer: &mut dyn Renderer) {
        renderer::draw_sorted(
            renderer,
            self.entities.iter().filter(|e| e.is_alive() && e.is_visible()),
        );
        if self.state.glare > 0.0 {
            renderer.glare(self.state.glare);
        }
    }

    /// Input for an unattended demo: follow the ball, kick when it's close
    pub fn autopilot_input(&self) -> TickInput {
        let action = TickInput {
            action: true,
            ..Default::default()
        };
        match self.state.mode {
            GameMode::WelcomeScreen | GameMode::LevelCompleted => action,
            GameMode::Playing if self.state.paused => TickInput::default(),
            GameMode::Playing => {
                let Some(ball) = self.ball.and_then(|id| self.entities.alive(id)) else {
                    return action;
                };
                let Some(paddle) = self.paddle.and_then(|id| self.entities.alive(id)) else {
                    return TickInput::default();
                };
                let offset = ball.position().x - paddle.position().x;
                // Swing at every ball near the paddle
                let close = ball.position().y < PADDLE_Y + 1.5;
                TickInput {
                    left: offset < -0.3,
                    right: offset > 0.3,
                    kick_left: close && offset <= 0.0,
                    kick_right: close && offset > 0.0,
                    ..Default::default()
                }
            }
            GameMode::Initialization | GameMode::GameOver | GameMode::PlayerWon => {
                TickInput::default()
            }
        }
    }
}

/// World used before any level is loaded
fn idle_world_config(settings: &Settings) -> WorldConfig {
    WorldConfig {
        gravity: DEFAULT_GRAVITY,
        velocity_iterations: settings.velocity_iterations,
        position_iterations: settings.position_iterations,
        contact_capacity: settings.contact_capacity,
        particles_hit_ball: false,
    }
}
