//! Interpolation.
//!
//! The server sends position updates at the replication interval, not every
//! frame. The client renders slightly in the past and interpolates between
//! the two samples around the render time. Past the newest sample it
//! extrapolates along the last segment, but only a little.

use std::collections::VecDeque;

use rtype_shared::math::Vec2;

/// How far behind the newest sample remote objects are drawn, in seconds.
pub const INTERP_DELAY: f64 = 0.05;

/// Extrapolation cap, as a fraction of the last sample interval.
pub const MAX_EXTRAPOLATION: f32 = 1.15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub position: Vec2,
}

/// Buffered position history for one remote object.
#[derive(Debug, Clone, Default)]
pub struct PositionHistory {
    samples: VecDeque<Sample>,
    max: usize,
}

impl PositionHistory {
    pub fn new(max: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            max: max.max(2),
        }
    }

    /// Records a sample. Samples older than the newest one are dropped;
    /// a sample at the same time replaces it.
    pub fn push(&mut self, time: f64, position: Vec2) {
        if let Some(last) = self.samples.back_mut() {
            if time < last.time {
                return;
            }
            if time == last.time {
                last.position = position;
                return;
            }
        }
        self.samples.push_back(Sample { time, position });
        while self.samples.len() > self.max {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Position at `time`.
    pub fn sample_at(&self, time: f64) -> Option<Vec2> {
        let first = self.samples.front()?;
        if self.samples.len() == 1 || time <= first.time {
            return Some(first.position);
        }

        for pair in self.samples.iter().zip(self.samples.iter().skip(1)) {
            let (a, b) = pair;
            if time < b.time {
                let alpha = ((time - a.time) / (b.time - a.time)) as f32;
                return Some(a.position.lerp(b.position, alpha));
            }
        }

        let n = self.samples.len();
        let (a, b) = (&self.samples[n - 2], &self.samples[n - 1]);
        let alpha = (((time - a.time) / (b.time - a.time)) as f32).min(MAX_EXTRAPOLATION);
        let delta = Vec2::new(b.position.x - a.position.x, b.position.y - a.position.y);
        Some(a.position.add(delta.scale(alpha)))
    }

    /// Position at `now - INTERP_DELAY`.
    pub fn render_position(&self, now: f64) -> Option<Vec2> {
        self.sample_at(now - INTERP_DELAY)
    }
}
