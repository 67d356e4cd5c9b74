//! Audio engine - lifecycle around the sine pair generator
//!
//! [`AudioEngine`] owns the control-side parameter store, the display-side
//! point reader and the output stream. The generator itself lives inside the
//! stream callback; the engine only talks to it through lock-free queues.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::device::CpalBackend;
use crate::generator::SampleGenerator;
use crate::params::{
    Channel, OscillatorParams, ParamHandle, ParamSnapshot, ParameterStore, RampTimes,
    DEFAULT_COMMAND_CAPACITY,
};
use crate::points::{point_channel, PointReader, PointWriter, SamplePoint, DEFAULT_POINT_CAPACITY};

/// Errors from starting or stopping the output stream
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No audio output device found")]
    NoDevice,
    #[error("Audio output device '{0}' not found")]
    DeviceNotFound(String),
    #[error("Failed to enumerate devices: {0}")]
    Devices(String),
    #[error("Failed to get audio config: {0}")]
    Config(String),
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to create audio stream: {0}")]
    BuildStream(String),
    #[error("Failed to start audio: {0}")]
    Play(String),
    #[error("Failed to pause audio: {0}")]
    Pause(String),
}

/// Events reported asynchronously by the output stream
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// The device reported an error while running
    StreamError(String),
}

/// Negotiated output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// A running (or paused) output stream
pub trait OutputStream {
    fn play(&self) -> Result<(), EngineError>;
    fn pause(&self) -> Result<(), EngineError>;
}

/// Something that can drive a [`SampleGenerator`] from an audio clock
pub trait OutputBackend {
    type Stream: OutputStream;

    /// Pick the output format, preferring `sample_rate`
    fn negotiate(&mut self, sample_rate: u32) -> Result<OutputFormat, EngineError>;

    /// Build a stream that calls `generator.render` for every buffer.
    /// Stream errors are reported through `events`.
    fn build_stream(
        &mut self,
        format: OutputFormat,
        generator: SampleGenerator,
        events: Sender<AudioEvent>,
    ) -> Result<Self::Stream, EngineError>;
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Preferred sample rate; the device may pick another
    pub sample_rate: u32,
    /// Points kept for display
    pub point_capacity: usize,
    /// Depth of the parameter command queue
    pub command_capacity: usize,
    /// Starting parameters, mute gain and ramp times
    pub initial: ParamSnapshot,
    /// Output device name (`None` = system default)
    pub device: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            point_capacity: DEFAULT_POINT_CAPACITY,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            initial: ParamSnapshot::default(),
            device: None,
        }
    }
}

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineStatus {
    #[default]
    Stopped,
    Playing,
}

/// Shared, cloneable access to the most recent sample points
#[derive(Clone)]
pub struct PointsHandle {
    inner: Arc<Mutex<PointReader>>,
}

impl PointsHandle {
    /// Most recent points, oldest first
    pub fn recent_points(&self) -> Vec<SamplePoint> {
        self.inner.lock().snapshot()
    }

    /// Like [`recent_points`](Self::recent_points) but reuses `out`
    pub fn recent_points_into(&self, out: &mut Vec<SamplePoint>) {
        self.inner.lock().snapshot_into(out);
    }

    fn replace(&self, reader: PointReader) {
        *self.inner.lock() = reader;
    }
}

/// Handle to the Lissajous audio engine
pub struct AudioEngine<B: OutputBackend = CpalBackend> {
    backend: B,
    config: EngineConfig,
    params: ParamHandle,
    points: PointsHandle,
    /// Writer for the next generator, paired with the current reader
    next_writer: Option<PointWriter>,
    stream: Option<B::Stream>,
    format: Option<OutputFormat>,
    status: EngineStatus,
    event_tx: Sender<AudioEvent>,
    event_rx: Receiver<AudioEvent>,
}

impl AudioEngine<CpalBackend> {
    /// Create an engine on the system audio host
    pub fn new(config: EngineConfig) -> Self {
        let backend = CpalBackend::new(config.device.clone());
        Self::with_backend(config, backend)
    }
}

impl<B: OutputBackend> AudioEngine<B> {
    /// Create an engine driving the given backend
    pub fn with_backend(config: EngineConfig, backend: B) -> Self {
        let store = ParameterStore::new(config.initial, config.command_capacity);
        let (writer, reader) = point_channel(config.point_capacity);
        let (event_tx, event_rx) = bounded(64);

        Self {
            backend,
            params: ParamHandle::new(store),
            points: PointsHandle {
                inner: Arc::new(Mutex::new(reader)),
            },
            next_writer: Some(writer),
            config,
            stream: None,
            format: None,
            status: EngineStatus::Stopped,
            event_tx,
            event_rx,
        }
    }

    /// Start (or resume) audio output.
    ///
    /// On failure the engine stays stopped and `start` may be retried.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.status == EngineStatus::Playing {
            return Ok(());
        }

        if self.stream.is_none() {
            self.stream = Some(self.open_stream()?);
        }

        let played = match &self.stream {
            Some(stream) => stream.play(),
            None => Ok(()),
        };
        if let Err(e) = played {
            // Rebuild from scratch on the next attempt
            self.stream = None;
            return Err(e);
        }

        self.status = EngineStatus::Playing;
        info!(format = ?self.format, "Audio engine started");
        Ok(())
    }

    /// Stop audio output. Stopping a stopped engine does nothing.
    pub fn stop(&mut self) {
        if self.status == EngineStatus::Stopped {
            return;
        }

        let paused = match &self.stream {
            Some(stream) => stream.pause(),
            None => Ok(()),
        };
        if let Err(e) = paused {
            warn!(error = %e, "Pause unsupported, closing stream");
            self.stream = None;
        }

        self.status = EngineStatus::Stopped;
        info!("Audio engine stopped");
    }

    pub fn is_playing(&self) -> bool {
        self.status == EngineStatus::Playing
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    /// Format of the open stream, once one has been built
    pub fn format(&self) -> Option<OutputFormat> {
        self.format
    }

    fn open_stream(&mut self) -> Result<B::Stream, EngineError> {
        let format = self.backend.negotiate(self.config.sample_rate)?;
        debug!(?format, "Output format negotiated");

        // A fresh point channel per generator; reuse the unused one if present
        let writer = match self.next_writer.take() {
            Some(writer) => writer,
            None => {
                let (writer, reader) = point_channel(self.config.point_capacity);
                self.points.replace(reader);
                writer
            }
        };

        let (commands, snapshot) = self.params.attach();
        let generator = SampleGenerator::new(format.sample_rate as f32, snapshot, commands, writer);
        let stream = self
            .backend
            .build_stream(format, generator, self.event_tx.clone())?;

        self.format = Some(format);
        Ok(stream)
    }

    /// Set the amplitude of one channel (ramped)
    pub fn set_amplitude(&self, channel: Channel, value: f32) {
        self.params.set_amplitude(channel, value);
    }

    /// Set the frequency of one channel in Hz (ramped)
    pub fn set_frequency(&self, channel: Channel, value: f32) {
        self.params.set_frequency(channel, value);
    }

    /// Set the left channel phase offset in radians (ramped)
    pub fn set_phase(&self, value: f32) {
        self.params.set_phase(value);
    }

    /// Set the audio output gain; 0.0 mutes. Points are unaffected.
    pub fn set_mute(&self, gain: f32) {
        self.params.set_mute(gain);
    }

    pub fn set_params(&self, params: OscillatorParams) {
        self.params.set_params(params);
    }

    /// Change ramp durations (seconds) for amplitude, frequency and phase.
    /// Values already in flight continue from where they are.
    pub fn set_ramp_times(&self, amplitude: f32, frequency: f32, phase: f32) {
        self.params.set_ramp_times(RampTimes {
            amplitude,
            frequency,
            phase,
        });
    }

    /// Current parameter values as last set
    pub fn params(&self) -> ParamSnapshot {
        self.params.snapshot()
    }

    /// Cloneable parameter handle for other control threads
    pub fn params_handle(&self) -> ParamHandle {
        self.params.clone()
    }

    /// Most recent generated points, oldest first
    pub fn recent_points(&self) -> Vec<SamplePoint> {
        self.points.recent_points()
    }

    /// Cloneable point handle for a display thread
    pub fn points_handle(&self) -> PointsHandle {
        self.points.clone()
    }

    /// Next pending stream event, if any
    pub fn poll_event(&self) -> Option<AudioEvent> {
        self.event_rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// In-memory backend; tests render by hand through `state.generator`
    #[derive(Default)]
    struct FakeState {
        fail_negotiate: AtomicBool,
        fail_build: AtomicBool,
        fail_play: AtomicBool,
        fail_pause: AtomicBool,
        builds: AtomicUsize,
        playing: AtomicBool,
        generator: Mutex<Option<SampleGenerator>>,
        events: Mutex<Option<Sender<AudioEvent>>>,
    }

    struct FakeBackend {
        state: Arc<FakeState>,
    }

    struct FakeStream {
        state: Arc<FakeState>,
    }

    impl OutputStream for FakeStream {
        fn play(&self) -> Result<(), EngineError> {
            if self.state.fail_play.load(Ordering::SeqCst) {
                return Err(EngineError::Play("device busy".into()));
            }
            self.state.playing.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn pause(&self) -> Result<(), EngineError> {
            if self.state.fail_pause.load(Ordering::SeqCst) {
                return Err(EngineError::Pause("not supported".into()));
            }
            self.state.playing.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    impl OutputBackend for FakeBackend {
        type Stream = FakeStream;

        fn negotiate(&mut self, sample_rate: u32) -> Result<OutputFormat, EngineError> {
            if self.state.fail_negotiate.load(Ordering::SeqCst) {
                return Err(EngineError::NoDevice);
            }
            Ok(OutputFormat { sample_rate, channels: 2 })
        }

        fn build_stream(
            &mut self,
            _format: OutputFormat,
            generator: SampleGenerator,
            events: Sender<AudioEvent>,
        ) -> Result<FakeStream, EngineError> {
            if self.state.fail_build.load(Ordering::SeqCst) {
                return Err(EngineError::BuildStream("no such format".into()));
            }
            self.state.builds.fetch_add(1, Ordering::SeqCst);
            *self.state.generator.lock() = Some(generator);
            *self.state.events.lock() = Some(events);
            Ok(FakeStream { state: self.state.clone() })
        }
    }

    fn engine() -> (AudioEngine<FakeBackend>, Arc<FakeState>) {
        let state = Arc::new(FakeState::default());
        let backend = FakeBackend { state: state.clone() };
        (AudioEngine::with_backend(EngineConfig::default(), backend), state)
    }

    fn render(state: &FakeState, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * 2];
        if let Some(generator) = state.generator.lock().as_mut() {
            generator.render(&mut out, 2);
        }
        out
    }

    #[test]
    fn test_initially_stopped() {
        let (engine, _) = engine();
        assert!(!engine.is_playing());
        assert_eq!(engine.status(), EngineStatus::Stopped);
        assert!(engine.recent_points().is_empty());
        assert!(engine.format().is_none());
    }

    #[test]
    fn test_start_and_stop() {
        let (mut engine, state) = engine();
        engine.start().unwrap();
        assert!(engine.is_playing());
        assert!(state.playing.load(Ordering::SeqCst));
        assert_eq!(engine.format(), Some(OutputFormat { sample_rate: 44100, channels: 2 }));

        engine.stop();
        assert!(!engine.is_playing());
        assert!(!state.playing.load(Ordering::SeqCst));

        // Idempotent
        engine.stop();
        assert_eq!(engine.status(), EngineStatus::Stopped);

        // Resume reuses the paused stream
        engine.start().unwrap();
        engine.start().unwrap();
        assert!(engine.is_playing());
        assert_eq!(state.builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_failure_is_retryable() {
        let (mut engine, state) = engine();

        state.fail_negotiate.store(true, Ordering::SeqCst);
        assert!(matches!(engine.start(), Err(EngineError::NoDevice)));
        assert!(!engine.is_playing());

        state.fail_negotiate.store(false, Ordering::SeqCst);
        state.fail_build.store(true, Ordering::SeqCst);
        assert!(matches!(engine.start(), Err(EngineError::BuildStream(_))));
        assert!(!engine.is_playing());

        state.fail_build.store(false, Ordering::SeqCst);
        state.fail_play.store(true, Ordering::SeqCst);
        assert!(matches!(engine.start(), Err(EngineError::Play(_))));
        assert!(!engine.is_playing());

        state.fail_play.store(false, Ordering::SeqCst);
        engine.start().unwrap();
        assert!(engine.is_playing());

        // Points flow from the generator built by the successful attempt
        render(&state, 10);
        assert_eq!(engine.recent_points().len(), 10);
    }

    #[test]
    fn test_points_and_params_flow_through_engine() {
        let (mut engine, state) = engine();
        engine.set_amplitude(Channel::Left, 0.0);
        engine.start().unwrap();

        // Set before start: the generator starts from the stored value
        let out = render(&state, 4);
        assert!(out.iter().step_by(2).all(|&s| s == 0.0));

        engine.set_amplitude(Channel::Right, 0.0);
        engine.set_mute(0.0);
        render(&state, 256);

        let points = engine.recent_points();
        assert_eq!(points.len(), 260);
        assert!(points.iter().all(|p| p.x == 0.0));
        assert_eq!(points.last().map(|p| p.y), Some(0.0));

        let params = engine.params();
        assert_eq!(params.params.amplitude_right, 0.0);
        assert_eq!(params.mute, 0.0);
    }

    #[test]
    fn test_recent_points_is_bounded() {
        let (mut engine, state) = engine();
        engine.start().unwrap();
        // Nobody reads while far more than the ring holds is rendered
        for _ in 0..9 {
            render(&state, 512);
        }
        let out = render(&state, 512);
        let handle = engine.points_handle();
        let points = handle.recent_points();
        assert_eq!(points.len(), DEFAULT_POINT_CAPACITY);
        let last = points[DEFAULT_POINT_CAPACITY - 1];
        assert_eq!((last.x, last.y), (out[2 * 511], out[2 * 511 + 1]));
        // Both handles read the same buffer
        assert_eq!(engine.recent_points(), points);
    }

    #[test]
    fn test_changes_while_stopped_reach_generator() {
        let state = Arc::new(FakeState::default());
        let backend = FakeBackend { state: state.clone() };
        let config = EngineConfig {
            command_capacity: 4,
            ..EngineConfig::default()
        };
        let mut engine = AudioEngine::with_backend(config, backend);

        engine.start().unwrap();
        engine.stop();
        // More changes than the queue holds, with nothing rendering
        for i in 1..=6 {
            engine.set_phase(i as f32 * 0.1);
        }
        engine.start().unwrap();

        for _ in 0..50 {
            render(&state, 512);
        }
        let expected = engine.params().params.phase;
        let guard = state.generator.lock();
        let generator = guard.as_ref().unwrap();
        assert_eq!(generator.targets().params.phase, expected);
        assert!(!generator.is_ramping());
    }

    #[test]
    fn test_ramp_times_forwarded() {
        let (engine, _) = engine();
        engine.set_ramp_times(0.01, 0.02, 0.03);
        let times = engine.params().ramp_times;
        assert_eq!(times, RampTimes { amplitude: 0.01, frequency: 0.02, phase: 0.03 });
    }

    #[test]
    fn test_pause_failure_rebuilds_on_next_start() {
        let (mut engine, state) = engine();
        engine.start().unwrap();
        render(&state, 8);

        state.fail_pause.store(true, Ordering::SeqCst);
        engine.stop();
        assert!(!engine.is_playing());

        engine.set_phase(1.0);
        engine.start().unwrap();
        assert_eq!(state.builds.load(Ordering::SeqCst), 2);

        // The rebuilt generator starts from the stored snapshot with a new clock
        {
            let guard = state.generator.lock();
            let generator = guard.as_ref().unwrap();
            assert_eq!(generator.sample_clock(), 0);
            assert_eq!(generator.targets().params.phase, 1.0);
        }

        // Old points were discarded with the old channel
        assert!(engine.recent_points().is_empty());
    }

    #[test]
    fn test_stream_errors_are_reported() {
        let (mut engine, state) = engine();
        assert!(engine.poll_event().is_none());
        engine.start().unwrap();

        if let Some(events) = state.events.lock().as_ref() {
            events.try_send(AudioEvent::StreamError("device unplugged".into())).unwrap();
        }
        assert_eq!(
            engine.poll_event(),
            Some(AudioEvent::StreamError("device unplugged".into()))
        );
    }
}
