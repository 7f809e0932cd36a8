//! Per-frame simulation context
//!
//! The renderer never reads a global clock. Every per-frame call receives a
//! [`FrameContext`] describing the frame being produced.

/// Simulation clock passed explicitly into per-frame operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    frame: u64,
    delta_time: f32,
    total_time: f64,
}

impl Default for FrameContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameContext {
    /// Create a context for the first frame
    pub fn new() -> Self {
        Self {
            frame: 0,
            delta_time: 0.0,
            total_time: 0.0,
        }
    }

    /// Advance to the next frame
    pub fn advance(&mut self, delta_time: f32) {
        self.frame += 1;
        self.delta_time = delta_time;
        self.total_time += f64::from(delta_time);
    }

    /// Index of the current frame
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Seconds elapsed since the previous frame
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Seconds elapsed since the first frame
    pub fn total_time(&self) -> f64 {
        self.total_time
    }
}
