//! Oscillator parameters and the control-side parameter store
//!
//! The store is the non-real-time source of truth. Every mutation is recorded
//! in the store and sent to the audio thread as an explicit [`ParamCommand`]
//! over a lock-free single-producer/single-consumer ring. The audio thread
//! drains that ring once per buffer (see [`ParamReceiver::drain_into`]).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use tracing::{debug, warn};

/// Default command queue depth. Drained every buffer, so bursts from a
/// dragged control fit comfortably.
pub const DEFAULT_COMMAND_CAPACITY: usize = 1024;

/// Output channel of the sine pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// x / left: `A * sin(2π a t + δ)`
    Left,
    /// y / right: `B * sin(2π b t)`
    Right,
}

/// The five smoothable oscillator parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillatorParams {
    /// Left amplitude (A)
    pub amplitude_left: f32,
    /// Right amplitude (B)
    pub amplitude_right: f32,
    /// Left frequency in Hz (a)
    pub frequency_left: f32,
    /// Right frequency in Hz (b)
    pub frequency_right: f32,
    /// Phase offset of the left channel in radians (δ)
    pub phase: f32,
}

impl Default for OscillatorParams {
    fn default() -> Self {
        Self {
            amplitude_left: 0.3,
            amplitude_right: 0.3,
            frequency_left: 225.0,
            frequency_right: 195.0,
            phase: 0.0,
        }
    }
}

impl OscillatorParams {
    pub fn amplitude(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Left => self.amplitude_left,
            Channel::Right => self.amplitude_right,
        }
    }

    pub fn frequency(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Left => self.frequency_left,
            Channel::Right => self.frequency_right,
        }
    }

    fn amplitude_mut(&mut self, channel: Channel) -> &mut f32 {
        match channel {
            Channel::Left => &mut self.amplitude_left,
            Channel::Right => &mut self.amplitude_right,
        }
    }

    fn frequency_mut(&mut self, channel: Channel) -> &mut f32 {
        match channel {
            Channel::Left => &mut self.frequency_left,
            Channel::Right => &mut self.frequency_right,
        }
    }
}

/// Ramp durations in seconds, per parameter group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampTimes {
    /// Both amplitudes and the mute gain
    pub amplitude: f32,
    /// Both frequencies
    pub frequency: f32,
    /// Phase offset
    pub phase: f32,
}

impl Default for RampTimes {
    fn default() -> Self {
        Self {
            amplitude: 0.001,
            frequency: 0.003,
            phase: 0.002,
        }
    }
}

/// Everything the generator needs to know to retarget its ramps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    pub params: OscillatorParams,
    /// Audio-only output gain (1.0 = audible, 0.0 = muted)
    pub mute: f32,
    pub ramp_times: RampTimes,
}

impl Default for ParamSnapshot {
    fn default() -> Self {
        Self {
            params: OscillatorParams::default(),
            mute: 1.0,
            ramp_times: RampTimes::default(),
        }
    }
}

impl ParamSnapshot {
    /// Fold a command into the snapshot
    pub fn apply(&mut self, cmd: ParamCommand) {
        match cmd {
            ParamCommand::SetAmplitude { channel, value } => *self.params.amplitude_mut(channel) = value,
            ParamCommand::SetFrequency { channel, value } => *self.params.frequency_mut(channel) = value,
            ParamCommand::SetPhase(value) => self.params.phase = value,
            ParamCommand::SetMute(gain) => self.mute = gain,
            ParamCommand::SetRampTimes(times) => self.ramp_times = times,
            ParamCommand::Resync(snapshot) => *self = snapshot,
        }
    }
}

/// Commands sent from the control side to the audio thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamCommand {
    SetAmplitude { channel: Channel, value: f32 },
    SetFrequency { channel: Channel, value: f32 },
    SetPhase(f32),
    SetMute(f32),
    SetRampTimes(RampTimes),
    /// Replace the whole target set
    Resync(ParamSnapshot),
}

/// Full state published when the command ring overflows.
///
/// While a snapshot sits here the store stops pushing commands and keeps
/// refreshing the snapshot instead, so nothing newer can be applied ahead of
/// it. The audio thread only ever `try_lock`s the slot.
struct ResyncSlot {
    pending: AtomicBool,
    snapshot: Mutex<Option<ParamSnapshot>>,
}

impl ResyncSlot {
    fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            snapshot: Mutex::new(None),
        }
    }

    fn publish(&self, snapshot: ParamSnapshot) {
        let mut slot = self.snapshot.lock();
        *slot = Some(snapshot);
        self.pending.store(true, Ordering::Release);
    }

    /// Replace an unclaimed snapshot; false once the audio thread took it
    fn refresh(&self, snapshot: ParamSnapshot) -> bool {
        let mut slot = self.snapshot.lock();
        match slot.as_mut() {
            Some(pending) => {
                *pending = snapshot;
                true
            }
            None => false,
        }
    }

    /// Audio-thread side. Never blocks: on contention the snapshot is picked
    /// up on the next buffer.
    #[inline]
    fn take(&self) -> Option<ParamSnapshot> {
        if !self.pending.load(Ordering::Acquire) {
            return None;
        }
        let mut slot = self.snapshot.try_lock()?;
        let snapshot = slot.take();
        self.pending.store(false, Ordering::Release);
        snapshot
    }
}

/// Producer side of an attached generator
struct CommandLink {
    queue: HeapProd<ParamCommand>,
    resync: Arc<ResyncSlot>,
}

/// Control-side parameter store
pub struct ParameterStore {
    snapshot: ParamSnapshot,
    capacity: usize,
    /// `None` until a generator is attached
    link: Option<CommandLink>,
    dropped: u64,
}

impl ParameterStore {
    pub fn new(snapshot: ParamSnapshot, capacity: usize) -> Self {
        Self {
            snapshot,
            capacity: capacity.max(1),
            link: None,
            dropped: 0,
        }
    }

    /// Open a fresh command queue for a newly built generator.
    ///
    /// Any previous receiver is orphaned. The new generator starts from
    /// [`ParameterStore::snapshot`], so nothing pending is lost.
    pub fn attach(&mut self) -> ParamReceiver {
        let (producer, consumer) = HeapRb::new(self.capacity).split();
        let resync = Arc::new(ResyncSlot::new());
        self.link = Some(CommandLink {
            queue: producer,
            resync: resync.clone(),
        });
        debug!(capacity = self.capacity, "Parameter queue attached");
        ParamReceiver {
            inner: consumer,
            resync,
        }
    }

    /// Current authoritative values
    pub fn snapshot(&self) -> ParamSnapshot {
        self.snapshot
    }

    pub fn params(&self) -> OscillatorParams {
        self.snapshot.params
    }

    pub fn mute(&self) -> f32 {
        self.snapshot.mute
    }

    pub fn ramp_times(&self) -> RampTimes {
        self.snapshot.ramp_times
    }

    /// Number of commands that could not be queued and went out as part of
    /// a full snapshot instead
    pub fn dropped_commands(&self) -> u64 {
        self.dropped
    }

    pub fn set_amplitude(&mut self, channel: Channel, value: f32) {
        self.submit(ParamCommand::SetAmplitude { channel, value });
    }

    /// Set a channel frequency in Hz. No unit conversion happens here; map UI
    /// control values to Hz before calling.
    pub fn set_frequency(&mut self, channel: Channel, value: f32) {
        self.submit(ParamCommand::SetFrequency { channel, value });
    }

    pub fn set_phase(&mut self, value: f32) {
        self.submit(ParamCommand::SetPhase(value));
    }

    pub fn set_mute(&mut self, gain: f32) {
        self.submit(ParamCommand::SetMute(gain));
    }

    pub fn set_ramp_times(&mut self, times: RampTimes) {
        self.submit(ParamCommand::SetRampTimes(times));
    }

    /// Replace all five oscillator parameters at once
    pub fn set_params(&mut self, params: OscillatorParams) {
        let mut snapshot = self.snapshot;
        snapshot.params = params;
        self.submit(ParamCommand::Resync(snapshot));
    }

    fn submit(&mut self, cmd: ParamCommand) {
        self.snapshot.apply(cmd);

        let Some(link) = self.link.as_mut() else {
            return;
        };

        // An unclaimed resync already stands in for the queue
        if link.resync.refresh(self.snapshot) {
            self.dropped += 1;
            return;
        }

        if link.queue.try_push(cmd).is_err() {
            self.dropped += 1;
            warn!(dropped = self.dropped, "Parameter queue full, publishing full snapshot");
            link.resync.publish(self.snapshot);
        }
    }
}

/// Audio-thread end of the command queue
pub struct ParamReceiver {
    inner: HeapCons<ParamCommand>,
    resync: Arc<ResyncSlot>,
}

impl ParamReceiver {
    /// Fold every queued command into `snapshot`, then any published full
    /// snapshot (which supersedes everything queued before it).
    ///
    /// Returns the number of updates applied. Lock-free and allocation-free.
    #[inline]
    pub fn drain_into(&mut self, snapshot: &mut ParamSnapshot) -> usize {
        let mut applied = 0;
        while let Some(cmd) = self.inner.try_pop() {
            snapshot.apply(cmd);
            applied += 1;
        }
        if let Some(latest) = self.resync.take() {
            *snapshot = latest;
            applied += 1;
        }
        applied
    }
}

/// Cloneable handle for control threads
///
/// Control threads serialize on this mutex. The audio thread never takes it.
#[derive(Clone)]
pub struct ParamHandle {
    inner: Arc<Mutex<ParameterStore>>,
}

impl ParamHandle {
    pub fn new(store: ParameterStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn set_amplitude(&self, channel: Channel, value: f32) {
        self.inner.lock().set_amplitude(channel, value);
    }

    pub fn set_frequency(&self, channel: Channel, value: f32) {
        self.inner.lock().set_frequency(channel, value);
    }

    pub fn set_phase(&self, value: f32) {
        self.inner.lock().set_phase(value);
    }

    pub fn set_mute(&self, gain: f32) {
        self.inner.lock().set_mute(gain);
    }

    pub fn set_ramp_times(&self, times: RampTimes) {
        self.inner.lock().set_ramp_times(times);
    }

    pub fn set_params(&self, params: OscillatorParams) {
        self.inner.lock().set_params(params);
    }

    pub fn snapshot(&self) -> ParamSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn dropped_commands(&self) -> u64 {
        self.inner.lock().dropped_commands()
    }

    /// Attach a new generator; returns its receiver and starting values
    pub(crate) fn attach(&self) -> (ParamReceiver, ParamSnapshot) {
        let mut store = self.inner.lock();
        let receiver = store.attach();
        (receiver, store.snapshot())
    }
}
