//! Platform abstraction layer
//!
//! Input devices are polled by the platform; the simulation only asks
//! abstract questions about the current frame.

/// Per-frame input queries
pub trait InputSource {
    fn move_left(&self) -> bool;
    fn move_right(&self) -> bool;
    fn kick_left(&self) -> bool;
    fn kick_right(&self) -> bool;
    /// Primary action (click/space), edge-triggered: true once per press
    fn action_pressed(&mut self) -> bool;
    /// Pause toggle, edge-triggered
    fn pause_pressed(&mut self) -> bool {
        false
    }
}

/// Fixed input state, handy for scripted runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldKeys {
    pub left: bool,
    pub right: bool,
    pub kick_left: bool,
    pub kick_right: bool,
    /// Pending action press, consumed by the next poll
    pub action: bool,
    pub pause: bool,
}

impl InputSource for HeldKeys {
    fn move_left(&self) -> bool {
        self.left
    }

    fn move_right(&self) -> bool {
        self.right
    }

    fn kick_left(&self) -> bool {
        self.kick_left
    }

    fn kick_right(&self) -> bool {
        self.kick_right
    }

    fn action_pressed(&mut self) -> bool {
        std::mem::take(&mut self.action)
    }

    fn pause_pressed(&mut self) -> bool {
        std::mem::take(&mut self.pause)
    }
}
