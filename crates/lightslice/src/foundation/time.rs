//! Time management utilities
//!
//! The timer is stepped by the host's frame delta.

/// Frame timer feeding the elapsed-time shader constant
///
/// `total_time` only ever grows, which time-driven shader effects rely on.
pub struct Timer {
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Advance the timer by a fixed step
    ///
    /// Negative or non-finite steps are ignored so the total never goes back.
    pub fn advance(&mut self, delta_time: f32) {
        let delta_time = if delta_time.is_finite() { delta_time.max(0.0) } else { 0.0 };
        self.delta_time = delta_time;
        self.total_time += delta_time;
        self.frame_count += 1;
    }

    /// Get the time since the last frame in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Get the total elapsed time since timer creation
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Get the current frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
