//! Sound cue contract
//!
//! The simulation only names the cue; playback is fire-and-forget and
//! belongs to the platform layer.

use serde::{Deserialize, Serialize};

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundEffect {
    /// Ball hits paddle hard enough to hear
    PaddleHit,
    /// Ball hits block without destroying it
    BlockHit,
    /// Block destroyed by the ball
    BlockDestroyed,
    /// Falling block caught by the paddle
    BlockCaught,
    /// Paddle knocked an anchored block
    Penalty,
    /// Killing spree bonus
    KillingSpree,
    /// Extra life earned
    NewLife,
    /// Ball fell out of the field
    BallLost,
    /// New ball put into play
    NewBall,
    LevelComplete,
    GameOver,
    PlayerWon,
}

impl SoundEffect {
    /// Cue name as used by asset packs
    pub fn name(self) -> &'static str {
        match self {
            SoundEffect::PaddleHit => "racket-hit",
            SoundEffect::BlockHit => "block-hit",
            SoundEffect::BlockDestroyed => "explosion",
            SoundEffect::BlockCaught => "block-caught",
            SoundEffect::Penalty => "penalty",
            SoundEffect::KillingSpree => "killing-spree",
            SoundEffect::NewLife => "new-life",
            SoundEffect::BallLost => "ball-out",
            SoundEffect::NewBall => "new-ball",
            SoundEffect::LevelComplete => "level-complete",
            SoundEffect::GameOver => "game-over",
            SoundEffect::PlayerWon => "player-won",
        }
    }
}

/// Sink for sound cues
pub trait AudioCue {
    fn play(&mut self, effect: SoundEffect);
}

/// Plays nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct Silence;

impl AudioCue for Silence {
    fn play(&mut self, _effect: SoundEffect) {}
}

/// Writes cues to the log instead of a speaker (headless runs)
#[derive(Debug, Clone, Default)]
pub struct LoggedAudio {
    pub played: usize,
    muted: bool,
}

impl LoggedAudio {
    /// Mute/unmute all audio
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }
}

impl AudioCue for LoggedAudio {
    fn play(&mut self, effect: SoundEffect) {
        if self.muted {
            return;
        }
        self.played += 1;
        log::debug!("sound: {}", effect.name());
    }
}
