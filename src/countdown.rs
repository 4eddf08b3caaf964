use std::time::Duration;

/// How long "GO!" stays on screen before play begins.
pub const GO_HOLD: Duration = Duration::from_secs(1);

/// Pre-round countdown: shows N, N-1, ..., 1, then "GO!", one step per second.
///
/// Time spent here is not part of the round's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    start_secs: u32,
    elapsed: Duration,
}

impl Countdown {
    pub fn new(start_secs: u32) -> Self {
        Self {
            start_secs,
            elapsed: Duration::ZERO,
        }
    }

    /// Advances the countdown. Returns true once it has run out.
    pub fn tick(&mut self, delta: Duration) -> bool {
        self.elapsed = self.elapsed.saturating_add(delta);
        self.is_finished()
    }

    /// Whole seconds left before "GO!"; 0 while "GO!" is shown.
    pub fn remaining(&self) -> u32 {
        let whole_secs = u32::try_from(self.elapsed.as_secs()).unwrap_or(u32::MAX);
        self.start_secs.saturating_sub(whole_secs)
    }

    pub fn label(&self) -> String {
        match self.remaining() {
            0 => "GO!".to_string(),
            n => n.to_string(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= Duration::from_secs(u64::from(self.start_secs)) + GO_HOLD
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(3)
    }
}
