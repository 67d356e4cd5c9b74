//! Audio engine for Lissa - a stereo sine pair drawn as a Lissajous figure
//!
//! This crate provides the real-time pipeline:
//! - Ramp: click-free linear smoothing of a single parameter
//! - Params: control-side parameter store and the command queue to the audio thread
//! - Generator: the per-sample sine pair inside the audio callback
//! - Points: bounded buffer of recent (x, y) points for a display
//! - Engine: start/stop lifecycle over an output device

mod device;
mod engine;
mod generator;
mod params;
mod points;
mod ramp;

pub use device::{list_output_devices, output_device, CpalBackend, CpalStream};
pub use engine::{
    AudioEngine, AudioEvent, EngineConfig, EngineError, EngineStatus, OutputBackend, OutputFormat,
    OutputStream, PointsHandle,
};
pub use generator::{SampleGenerator, StereoFrame};
pub use params::{
    Channel, OscillatorParams, ParamCommand, ParamHandle, ParamReceiver, ParamSnapshot,
    ParameterStore, RampTimes, DEFAULT_COMMAND_CAPACITY,
};
pub use points::{
    point_channel, BoundedPointBuffer, PointReader, PointWriter, SamplePoint,
    DEFAULT_POINT_CAPACITY,
};
pub use ramp::Ramp;
