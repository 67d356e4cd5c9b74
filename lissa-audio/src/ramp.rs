//! Linear parameter ramp
//!
//! A ramp moves a scalar from its current value toward a target over a fixed
//! duration, one sample at a time. The audio thread calls [`Ramp::advance`]
//! once per frame; targets are only changed between buffers.

/// Linearly smoothed scalar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    current: f32,
    target: f32,
    /// Per-sample increment (0.0 when idle)
    step: f32,
    /// Advances left before the ramp snaps to its target
    remaining: u32,
    /// Ramp duration in seconds
    duration: f32,
    sample_rate: f32,
}

impl Ramp {
    /// Create an idle ramp resting at `initial`
    pub fn new(initial: f32, duration: f32, sample_rate: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            remaining: 0,
            duration: duration.max(0.0),
            sample_rate,
        }
    }

    /// Number of samples a full ramp takes (at least one)
    #[inline]
    fn total_samples(&self) -> f32 {
        (self.duration * self.sample_rate).max(1.0)
    }

    #[inline]
    fn recompute_step(&mut self) {
        if self.current == self.target {
            self.step = 0.0;
            self.remaining = 0;
        } else {
            let total = self.total_samples();
            self.step = (self.target - self.current) / total;
            self.remaining = total.ceil() as u32;
        }
    }

    /// Start ramping toward `target`.
    ///
    /// Reasserting the target already held is a no-op, so a control that
    /// keeps sending the same value never restarts a ramp mid-flight.
    pub fn set_target(&mut self, target: f32) {
        if target != self.target {
            self.target = target;
            self.recompute_step();
        }
    }

    /// Advance by one sample and return the new value.
    ///
    /// Steps while more than one step away; otherwise snaps to the target.
    /// The last of the `ceil(duration * sample_rate)` advances always snaps,
    /// so f32 rounding in the accumulated steps cannot add an extra sample.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if self.remaining > 1 && (self.current - self.target).abs() > self.step.abs() {
            self.current += self.step;
            self.remaining -= 1;
        } else {
            self.current = self.target;
            self.step = 0.0;
            self.remaining = 0;
        }
        self.current
    }

    /// Change the ramp duration. The in-flight value and pending target are
    /// kept; only the speed of the remaining travel changes.
    pub fn set_duration(&mut self, duration: f32) {
        self.duration = duration.max(0.0);
        self.recompute_step();
    }

    /// Current (smoothed) value
    #[inline]
    pub fn value(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// True while the value is still travelling toward the target
    #[inline]
    pub fn is_ramping(&self) -> bool {
        self.step != 0.0
    }
}
