//! Frame timing

use std::time::{Duration, Instant};

/// Wall-clock frame timer
///
/// Measures the time between consecutive [`Timer::update`] calls. The
/// first update after [`Timer::new`] or [`Timer::reset`] measures from that
/// call, so a runner created long before its first frame can reset instead
/// of feeding the whole setup time into the first tick.
#[derive(Debug)]
pub struct Timer {
    last_frame: Instant,
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
    /// Start timing from now
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Mark a frame boundary and return the seconds since the previous one
    pub fn update(&mut self) -> f32 {
        let now = Instant::now();
        self.delta_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.total_time += self.delta_time;
        self.frame_count += 1;
        self.delta_time
    }

    /// Restart the measurement window without touching the totals
    pub fn reset(&mut self) {
        self.last_frame = Instant::now();
        self.delta_time = 0.0;
    }

    /// Seconds measured by the last update
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Seconds accumulated over every update
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Number of updates
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Measures how long a section of a frame took
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    /// Start measuring now
    pub fn start_new() -> Self {
        Self { started: Instant::now() }
    }

    /// Time since start (or the last lap)
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time since start (or the last lap) in milliseconds
    pub fn elapsed_millis(&self) -> f32 {
        self.elapsed().as_secs_f32() * 1000.0
    }

    /// Return the elapsed milliseconds and start a new measurement
    pub fn lap_millis(&mut self) -> f32 {
        let millis = self.elapsed_millis();
        self.started = Instant::now();
        millis
    }
}
