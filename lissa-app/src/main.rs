//! Lissa - real-time Lissajous synthesizer
//!
//! Plays a stereo sine pair and reads control lines from stdin. The recent
//! (left, right) points are polled at display rate and logged as a scope
//! summary.

mod commands;
mod config;
mod scope;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use lissa_audio::{list_output_devices, AudioEngine, AudioEvent, ParamHandle, SamplePoint};

use crate::commands::{Command, HELP};
use crate::config::Config;
use crate::scope::ScopeStats;

/// Log filter used when RUST_LOG is unset
const DEFAULT_FILTER: &str = "lissa=info,lissa_audio=info";

/// Interval between scope summary lines
const SUMMARY_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    device: Option<String>,
    list_devices: bool,
    duration_sec: Option<f32>,
    paused: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    for arg in std::env::args().skip(1) {
        if let Some(path) = arg.strip_prefix("--config=") {
            args.config = Some(PathBuf::from(path));
        } else if let Some(name) = arg.strip_prefix("--device=") {
            args.device = Some(name.to_string());
        } else if let Some(secs) = arg.strip_prefix("--duration=") {
            args.duration_sec = secs.parse().ok();
        } else if arg == "--list-devices" {
            args.list_devices = true;
        } else if arg == "--paused" {
            args.paused = true;
        } else {
            warn!(%arg, "Ignoring unknown argument");
        }
    }
    args
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_writer(io::stderr)
        .init();

    let args = parse_args();

    if args.list_devices {
        for name in list_output_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    let config_path = args.config.clone().unwrap_or_else(Config::config_path);
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => Config::load(),
    };
    if args.device.is_some() {
        config.device = args.device.clone();
    }

    let mut engine = AudioEngine::new(config.engine_config());
    if !args.paused {
        // Stay up on failure; `start` can be retried from the prompt
        if let Err(e) = engine.start() {
            error!(error = %e, "Failed to start audio");
        }
    }

    let (cmd_tx, cmd_rx) = unbounded();
    spawn_control_thread(engine.params_handle(), cmd_tx, args.duration_sec.is_none());

    run(&mut engine, &cmd_rx, &mut config, &config_path, args.duration_sec);

    engine.stop();
    Ok(())
}

/// Read control lines from stdin. Parameter changes go straight to the
/// store; everything else is forwarded to the main loop.
fn spawn_control_thread(params: ParamHandle, tx: Sender<Command>, quit_on_eof: bool) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            match Command::parse(&line) {
                Ok(cmd) => {
                    if cmd.apply(&params) {
                        debug!(?cmd, "Parameter updated");
                    } else if tx.send(cmd).is_err() {
                        return;
                    }
                }
                Err(e) => warn!(error = %e, "Bad command"),
            }
        }

        if quit_on_eof {
            let _ = tx.send(Command::Quit);
        }
    });
}

fn run(
    engine: &mut AudioEngine,
    commands: &Receiver<Command>,
    config: &mut Config,
    config_path: &Path,
    duration_sec: Option<f32>,
) {
    let frame_duration = Duration::from_secs(1) / config.fps.max(1);
    let started = Instant::now();
    let mut last_summary = Instant::now();

    let points_handle = engine.points_handle();
    let mut points: Vec<SamplePoint> = Vec::with_capacity(config.point_capacity);

    loop {
        let frame_start = Instant::now();

        while let Ok(cmd) = commands.try_recv() {
            match cmd {
                Command::Start => {
                    if let Err(e) = engine.start() {
                        error!(error = %e, "Failed to start audio");
                    }
                }
                Command::Stop => engine.stop(),
                Command::Status => print_status(engine),
                Command::Save => {
                    let snapshot = engine.params();
                    config.params = snapshot.params;
                    config.mute = snapshot.mute;
                    config.ramp_times = snapshot.ramp_times;
                    match config.save_to(config_path) {
                        Ok(()) => info!(path = %config_path.display(), "Config saved"),
                        Err(e) => error!(error = %e, "Failed to save config"),
                    }
                }
                Command::Help => println!("{HELP}"),
                Command::Quit => return,
                // Parameter commands are applied by the control thread
                _ => {}
            }
        }

        while let Some(event) = engine.poll_event() {
            match event {
                AudioEvent::StreamError(msg) => {
                    warn!(error = %msg, "Output stream reported an error")
                }
            }
        }

        if duration_sec.is_some_and(|d| started.elapsed().as_secs_f32() >= d) {
            info!("Duration reached");
            return;
        }

        // Visualization consumer
        points_handle.recent_points_into(&mut points);
        let stats = ScopeStats::from_points(&points);
        debug!(%stats, "Scope frame");
        if engine.is_playing() && last_summary.elapsed() >= SUMMARY_INTERVAL {
            info!(
                points = stats.count,
                width = stats.width(),
                height = stats.height(),
                "Scope"
            );
            last_summary = Instant::now();
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame_duration {
            thread::sleep(frame_duration - elapsed);
        }
    }
}

fn print_status(engine: &AudioEngine) {
    let snapshot = engine.params();
    let p = snapshot.params;
    println!(
        "{:?}  A={:.3} B={:.3} a={:.1}Hz b={:.1}Hz delta={:.3} mute={:.2}",
        engine.status(),
        p.amplitude_left,
        p.amplitude_right,
        p.frequency_left,
        p.frequency_right,
        p.phase,
        snapshot.mute,
    );

    let r = snapshot.ramp_times;
    println!(
        "ramps  amplitude={}s frequency={}s phase={}s",
        r.amplitude, r.frequency, r.phase
    );

    if let Some(format) = engine.format() {
        println!("output {} Hz, {} ch", format.sample_rate, format.channels);
    }

    let dropped = engine.params_handle().dropped_commands();
    if dropped > 0 {
        println!("dropped commands {dropped}");
    }
}
