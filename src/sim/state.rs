//! Game state and progression bookkeeping
//!
//! Score, lives, level progress and the top-level mode. Everything here is
//! plain data that the frame loop in `tick` mutates.

use serde::{Deserialize, Serialize};

use crate::settings::Settings;

/// Top-level mode of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    /// World being created; left immediately for the welcome screen
    Initialization,
    /// Waiting for the first action to build level 1
    WelcomeScreen,
    /// Active gameplay (pausing is a flag on top of this mode)
    Playing,
    /// All blocks gone, waiting for an action to load the next level
    LevelCompleted,
    /// Out of lives
    GameOver,
    /// Every level cleared
    PlayerWon,
}

/// Score thresholds that award extra lives.
///
/// Explicit thresholds come first; after the last one a new life is granted
/// at every multiple of `step`. A single "next score" cursor means each
/// threshold can only ever pay out once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraLifeSchedule {
    thresholds: Vec<i64>,
    step: i64,
    next_index: usize,
    next_score: Option<i64>,
}

impl ExtraLifeSchedule {
    pub fn new(thresholds: &[i64], step: i64) -> Self {
        let mut thresholds: Vec<i64> = thresholds.iter().copied().filter(|&t| t > 0).collect();
        thresholds.sort_unstable();
        thresholds.dedup();
        let next_score = thresholds.first().copied().or((step > 0).then_some(step));
        Self {
            thresholds,
            step,
            next_index: 0,
            next_score,
        }
    }

    /// Score at which the next life is granted
    pub fn next_score(&self) -> Option<i64> {
        self.next_score
    }

    /// Number of lives earned now that the score reached `score`
    pub fn claim(&mut self, score: i64) -> u32 {
        let mut lives = 0;
        while let Some(next) = self.next_score {
            if score < next {
                break;
            }
            lives += 1;
            self.advance(next);
        }
        lives
    }

    fn advance(&mut self, reached: i64) {
        self.next_index += 1;
        self.next_score = match self.thresholds.get(self.next_index) {
            Some(&threshold) => Some(threshold),
            None if self.step > 0 => Some((reached / self.step + 1) * self.step),
            None => None,
        };
    }
}

/// Session state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub mode: GameMode,
    /// Pause overlay on top of `Playing`
    pub paused: bool,
    /// Raw score, never negative
    pub score: i64,
    pub lives: u32,
    /// Current level number, from 1
    pub level: u32,
    /// Seconds spent playing this level, pauses excluded
    pub level_time: f64,
    /// Physics time since the level was built (seconds)
    pub sim_time: f64,
    /// Countdown to level completion
    pub blocks_remaining: usize,
    /// Screen flash intensity (0-1)
    pub glare: f32,
    pub extra_lives: ExtraLifeSchedule,
    /// Why the last level failed to load
    pub last_error: Option<String>,
}

impl GameState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            mode: GameMode::Initialization,
            paused: false,
            score: 0,
            lives: settings.initial_lives,
            level: 0,
            level_time: 0.0,
            sim_time: 0.0,
            blocks_remaining: 0,
            glare: 0.0,
            extra_lives: ExtraLifeSchedule::new(
                &settings.extra_life_thresholds,
                settings.extra_life_step,
            ),
            last_error: None,
        }
    }

    /// Apply a score delta, clamping at zero. Returns extra lives granted.
    pub fn add_score(&mut self, delta: i64) -> u32 {
        self.score = self.score.saturating_add(delta).max(0);
        if delta <= 0 {
            return 0;
        }
        let lives = self.extra_lives.claim(self.score);
        self.lives += lives;
        lives
    }

    /// Score shown on end screens: raw score minus whole seconds in the level
    pub fn displayed_score(&self) -> i64 {
        let penalty = self.level_time.max(0.0).floor() as i64;
        (self.score - penalty).max(0)
    }

    /// Fold the time penalty into the raw score and restart the level clock
    pub fn bank_time_penalty(&mut self) {
        self.score = self.displayed_score();
        self.level_time = 0.0;
    }

    /// Take away a life for a lost ball. Returns true when none are left.
    pub fn lose_ball(&mut self) -> bool {
        self.lives = self.lives.saturating_sub(1);
        self.lives == 0
    }

    pub fn is_playing(&self) -> bool {
        self.mode == GameMode::Playing && !self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_extra_life_thresholds_then_step() {
        let mut schedule = ExtraLifeSchedule::new(&[1_000, 2_500], 10_000);
        assert_eq!(schedule.claim(999), 0);
        assert_eq!(schedule.claim(1_000), 1);
        assert_eq!(schedule.claim(1_500), 0);
        assert_eq!(schedule.next_score(), Some(2_500));
        assert_eq!(schedule.claim(2_600), 1);
        assert_eq!(schedule.next_score(), Some(10_000));
        // Jumping past several thresholds pays each one once
        assert_eq!(schedule.claim(30_000), 3);
        assert_eq!(schedule.next_score(), Some(40_000));
    }

    #[test]
    fn test_extra_life_without_thresholds() {
        let mut schedule = ExtraLifeSchedule::new(&[], 500);
        assert_eq!(schedule.claim(1_200), 2);
        assert_eq!(ExtraLifeSchedule::new(&[], 0).next_score(), None);
    }

    #[test]
    fn test_add_score_grants_lives() {
        let settings = Settings {
            extra_life_thresholds: vec![100],
            extra_life_step: 0,
            ..Settings::default()
        };
        let mut state = GameState::new(&settings);
        let lives = state.lives;
        assert_eq!(state.add_score(150), 1);
        assert_eq!(state.lives, lives + 1);
        // Dropping below and climbing back doesn't pay again
        state.add_score(-100);
        assert_eq!(state.add_score(100), 0);
    }

    #[test]
    fn test_displayed_score_subtracts_time() {
        let mut state = GameState::new(&Settings::default());
        state.add_score(100);
        state.level_time = 12.7;
        assert_eq!(state.displayed_score(), 88);
        state.bank_time_penalty();
        assert_eq!(state.score, 88);
        assert_eq!(state.level_time, 0.0);

        state.level_time = 500.0;
        assert_eq!(state.displayed_score(), 0);
    }

    #[test]
    fn test_lose_ball() {
        let mut state = GameState::new(&Settings::default());
        state.lives = 2;
        assert!(!state.lose_ball());
        assert_eq!(state.lives, 1);
        assert!(state.lose_ball());
    }

    proptest! {
        #[test]
        fn prop_score_never_negative(deltas in proptest::collection::vec(-5_000i64..5_000, 0..50), time in 0.0f64..1_000.0) {
            let mut state = GameState::new(&Settings::default());
            for delta in deltas {
                state.add_score(delta);
                prop_assert!(state.score >= 0);
                state.level_time = time;
                prop_assert!(state.displayed_score() >= 0);
            }
        }
    }
}
