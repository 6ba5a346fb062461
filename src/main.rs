//! Block Impact entry point
//!
//! Headless runner: plays the bundled levels on autopilot at a fixed frame
//! rate and logs what happens. Usage: `block-impact [seed] [frames]`.

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::collections::BTreeMap;
    use std::path::Path;

    use block_impact::audio::LoggedAudio;
    use block_impact::sim::{EntityKind, Game, GameMode, JsonLevels};
    use block_impact::{Drawable, HighScores, Renderer, Settings};

    const SETTINGS_PATH: &str = "settings.json";
    const HIGH_SCORES_PATH: &str = "highscores.json";
    const FRAME_DT: f32 = 1.0 / 60.0;
    const DEFAULT_FRAMES: u64 = 60 * 180;

    /// Renderer that only counts what it is asked to draw
    #[derive(Default)]
    struct FrameStats {
        draws: BTreeMap<EntityKind, u64>,
        glare_frames: u64,
    }

    impl Renderer for FrameStats {
        fn draw(&mut self, drawable: &dyn Drawable) {
            *self.draws.entry(drawable.sprite().kind).or_default() += 1;
        }

        fn glare(&mut self, _intensity: f32) {
            self.glare_frames += 1;
        }
    }

    pub fn run() {
        env_logger::init();
        log::info!("Block Impact (headless) starting...");

        let mut args = std::env::args().skip(1);
        let seed = args.next().and_then(|a| a.parse().ok()).unwrap_or(0x5EED);
        let frames = args
            .next()
            .and_then(|a| a.parse().ok())
            .unwrap_or(DEFAULT_FRAMES);

        let settings = Settings::load_or_default(Path::new(SETTINGS_PATH));
        let mut game = Game::new(settings, JsonLevels::bundled(), seed);
        game.set_high_scores(HighScores::load(Path::new(HIGH_SCORES_PATH)));
        log::info!("Game initialized with seed: {seed}");

        let mut audio = LoggedAudio::default();
        let mut stats = FrameStats::default();
        let mut frame = 0;
        while frame < frames {
            let input = game.autopilot_input();
            game.update(&input, FRAME_DT, &mut audio);
            game.draw(&mut stats);
            frame += 1;
            if matches!(game.mode(), GameMode::GameOver | GameMode::PlayerWon) {
                break;
            }
        }

        let state = game.state();
        log::info!(
            "Stopped after {frame} frames: {:?}, level {}, score {}, lives {}",
            state.mode,
            state.level,
            state.displayed_score(),
            state.lives
        );
        log::info!(
            "{} sounds, {} glare frames, {} contacts dropped",
            audio.played,
            stats.glare_frames,
            game.physics().dropped_contacts()
        );
        for (kind, count) in &stats.draws {
            log::debug!("drew {kind:?} x{count}");
        }

        if let Err(err) = game.high_scores().save(Path::new(HIGH_SCORES_PATH)) {
            log::error!("Failed to save high scores: {err}");
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    headless::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // No web front end; the library is driven by the host page
}
