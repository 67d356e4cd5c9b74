//! Sine pair generator - the body of the real-time audio callback
//!
//! Per frame:
//! 1. advance every ramp by one sample
//! 2. `left = A sin(2π a t + δ)`, `right = B sin(2π b t)` with `t = clock / sr`
//! 3. write `left * mute`, `right * mute` to the output
//! 4. push the unmuted `(left, right)` to the point writer
//! 5. tick the sample clock
//!
//! Parameter commands are drained once at the start of each buffer.
//! Nothing in here allocates, locks or logs.

use std::f64::consts::TAU;

use crate::params::{ParamReceiver, ParamSnapshot, RampTimes};
use crate::points::{PointWriter, SamplePoint};
use crate::ramp::Ramp;

/// One generated frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoFrame {
    /// Left output sample, after mute
    pub left: f32,
    /// Right output sample, after mute
    pub right: f32,
    /// Unmuted geometry sent to the point buffer
    pub point: SamplePoint,
}

/// Real-time generator state, owned by the audio callback
pub struct SampleGenerator {
    sample_rate: f32,
    /// Frames generated since construction
    clock: u64,
    /// Latest targets folded in from the command queue
    targets: ParamSnapshot,
    amplitude_left: Ramp,
    amplitude_right: Ramp,
    frequency_left: Ramp,
    frequency_right: Ramp,
    phase: Ramp,
    mute: Ramp,
    commands: ParamReceiver,
    points: PointWriter,
}

impl SampleGenerator {
    /// Build a generator resting at `initial` (no ramps in flight)
    pub fn new(
        sample_rate: f32,
        initial: ParamSnapshot,
        commands: ParamReceiver,
        points: PointWriter,
    ) -> Self {
        let times = initial.ramp_times;
        let p = initial.params;
        Self {
            sample_rate,
            clock: 0,
            targets: initial,
            amplitude_left: Ramp::new(p.amplitude_left, times.amplitude, sample_rate),
            amplitude_right: Ramp::new(p.amplitude_right, times.amplitude, sample_rate),
            frequency_left: Ramp::new(p.frequency_left, times.frequency, sample_rate),
            frequency_right: Ramp::new(p.frequency_right, times.frequency, sample_rate),
            phase: Ramp::new(p.phase, times.phase, sample_rate),
            mute: Ramp::new(initial.mute, times.amplitude, sample_rate),
            commands,
            points,
        }
    }

    /// Fill an interleaved output buffer.
    ///
    /// Channel 0 gets the left signal, channel 1 the right, any further
    /// channels silence. An empty buffer is a no-op (queued commands stay
    /// queued).
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 || output.len() < channels {
            output.fill(0.0);
            return;
        }

        self.apply_commands();

        let mut frames = output.chunks_exact_mut(channels);
        for frame in &mut frames {
            let StereoFrame { left, right, .. } = self.next_frame();
            frame[0] = left;
            if channels > 1 {
                frame[1] = right;
                frame[2..].fill(0.0);
            }
        }
        frames.into_remainder().fill(0.0);
    }

    /// Generate a single frame (ramps, sines, point, clock)
    #[inline]
    pub fn next_frame(&mut self) -> StereoFrame {
        let amplitude_left = self.amplitude_left.advance() as f64;
        let amplitude_right = self.amplitude_right.advance() as f64;
        let frequency_left = self.frequency_left.advance() as f64;
        let frequency_right = self.frequency_right.advance() as f64;
        let phase = self.phase.advance() as f64;
        let gain = self.mute.advance();

        // f64 keeps the phase argument usable for very long sessions
        let t = self.clock as f64 / self.sample_rate as f64;
        let left = (amplitude_left * (TAU * frequency_left * t + phase).sin()) as f32;
        let right = (amplitude_right * (TAU * frequency_right * t).sin()) as f32;

        let point = SamplePoint::new(left, right);
        self.points.push(point);
        self.clock = self.clock.wrapping_add(1);

        StereoFrame {
            left: left * gain,
            right: right * gain,
            point,
        }
    }

    /// Drain the command queue and retarget the ramps once
    fn apply_commands(&mut self) {
        let previous_times = self.targets.ramp_times;
        if self.commands.drain_into(&mut self.targets) == 0 {
            return;
        }
        if self.targets.ramp_times != previous_times {
            self.set_ramp_times(self.targets.ramp_times);
        }
        self.retarget();
    }

    /// Push the full target set into every ramp. Unchanged targets are
    /// no-ops inside [`Ramp::set_target`].
    fn retarget(&mut self) {
        let p = self.targets.params;
        self.amplitude_left.set_target(p.amplitude_left);
        self.amplitude_right.set_target(p.amplitude_right);
        self.frequency_left.set_target(p.frequency_left);
        self.frequency_right.set_target(p.frequency_right);
        self.phase.set_target(p.phase);
        self.mute.set_target(self.targets.mute);
    }

    fn set_ramp_times(&mut self, times: RampTimes) {
        self.amplitude_left.set_duration(times.amplitude);
        self.amplitude_right.set_duration(times.amplitude);
        self.mute.set_duration(times.amplitude);
        self.frequency_left.set_duration(times.frequency);
        self.frequency_right.set_duration(times.frequency);
        self.phase.set_duration(times.phase);
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Frames generated so far
    pub fn sample_clock(&self) -> u64 {
        self.clock
    }

    /// Targets the ramps are heading toward
    pub fn targets(&self) -> ParamSnapshot {
        self.targets
    }

    /// Current smoothed values
    #[cfg(test)]
    fn current(&self) -> ParamSnapshot {
        let mut snapshot = self.targets;
        snapshot.params.amplitude_left = self.amplitude_left.value();
        snapshot.params.amplitude_right = self.amplitude_right.value();
        snapshot.params.frequency_left = self.frequency_left.value();
        snapshot.params.frequency_right = self.frequency_right.value();
        snapshot.params.phase = self.phase.value();
        snapshot.mute = self.mute.value();
        snapshot
    }

    pub fn is_ramping(&self) -> bool {
        self.amplitude_left.is_ramping()
            || self.amplitude_right.is_ramping()
            || self.frequency_left.is_ramping()
            || self.frequency_right.is_ramping()
            || self.phase.is_ramping()
            || self.mute.is_ramping()
    }
}
