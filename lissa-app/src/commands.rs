//! Control commands read from the terminal
//!
//! One command per line:
//!
//! ```text
//! A 0.5          left amplitude
//! B 0.5          right amplitude
//! a 22.5         left frequency in control units (x10 = Hz)
//! b 19.5         right frequency in control units
//! delta 1.57     phase offset in radians
//! mute on|off|<gain>
//! ramp 0.003 0.008 0.005
//! start | stop | status | save | help | quit
//! ```

use lissa_audio::{Channel, ParamHandle, RampTimes};
use thiserror::Error;

/// Control units to Hz; a 5..50 slider covers 50..500 Hz
pub const FREQUENCY_SCALE: f32 = 10.0;

/// Errors from parsing a control line
#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{0}' needs a value")]
    MissingValue(&'static str),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

/// A parsed control command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetAmplitude(Channel, f32),
    /// Frequency already converted to Hz
    SetFrequency(Channel, f32),
    SetPhase(f32),
    SetMute(f32),
    SetRampTimes(RampTimes),
    Start,
    Stop,
    Status,
    /// Write the current parameters to the config file
    Save,
    Help,
    Quit,
}

impl Command {
    /// Parse a single control line
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(ParseError::Empty)?;

        // Single-letter parameter names are case sensitive (A vs a)
        let command = match name {
            "A" => Command::SetAmplitude(Channel::Left, number(words.next(), "A")?),
            "B" => Command::SetAmplitude(Channel::Right, number(words.next(), "B")?),
            "a" => Command::SetFrequency(Channel::Left, number(words.next(), "a")? * FREQUENCY_SCALE),
            "b" => Command::SetFrequency(Channel::Right, number(words.next(), "b")? * FREQUENCY_SCALE),
            "delta" | "phase" => Command::SetPhase(number(words.next(), "delta")?),
            "mute" => match words.next() {
                None | Some("on") => Command::SetMute(0.0),
                Some("off") => Command::SetMute(1.0),
                Some(gain) => Command::SetMute(number(Some(gain), "mute")?.clamp(0.0, 1.0)),
            },
            "unmute" => Command::SetMute(1.0),
            "ramp" => Command::SetRampTimes(RampTimes {
                amplitude: number(words.next(), "ramp")?.max(0.0),
                frequency: number(words.next(), "ramp")?.max(0.0),
                phase: number(words.next(), "ramp")?.max(0.0),
            }),
            _ => match name.to_ascii_lowercase().as_str() {
                "start" | "play" => Command::Start,
                "stop" | "pause" => Command::Stop,
                "status" => Command::Status,
                "save" => Command::Save,
                "help" | "?" => Command::Help,
                "quit" | "exit" | "q" => Command::Quit,
                _ => return Err(ParseError::Unknown(name.to_string())),
            },
        };

        Ok(command)
    }

    /// Apply a parameter command through `params`.
    ///
    /// Returns `false` for lifecycle commands, which the caller handles.
    pub fn apply(&self, params: &ParamHandle) -> bool {
        match *self {
            Command::SetAmplitude(channel, value) => params.set_amplitude(channel, value),
            Command::SetFrequency(channel, hz) => params.set_frequency(channel, hz),
            Command::SetPhase(value) => params.set_phase(value),
            Command::SetMute(gain) => params.set_mute(gain),
            Command::SetRampTimes(times) => params.set_ramp_times(times),
            _ => return false,
        }
        true
    }
}

fn number(word: Option<&str>, name: &'static str) -> Result<f32, ParseError> {
    let word = word.ok_or(ParseError::MissingValue(name))?;
    word.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber(word.to_string()))
}

/// Help text shown for the `help` command
pub const HELP: &str = "\
A <v> / B <v>        amplitude left / right
a <v> / b <v>        frequency left / right (x10 Hz)
delta <rad>          phase offset
mute [on|off|gain]   audio gain (display unaffected)
ramp <amp> <freq> <phase>   ramp times in seconds
start | stop | status | save | quit";

#[cfg(test)]
mod tests {
    use super::*;
    use lissa_audio::{ParamSnapshot, ParameterStore};

    #[test]
    fn test_parse_parameters() {
        assert_eq!(Command::parse("A 0.5"), Ok(Command::SetAmplitude(Channel::Left, 0.5)));
        assert_eq!(Command::parse("B 0.25"), Ok(Command::SetAmplitude(Channel::Right, 0.25)));
        assert_eq!(Command::parse("  delta   1.5 "), Ok(Command::SetPhase(1.5)));
    }

    #[test]
    fn test_frequency_is_scaled_to_hz() {
        assert_eq!(Command::parse("a 22.5"), Ok(Command::SetFrequency(Channel::Left, 225.0)));
        assert_eq!(Command::parse("b 19.5"), Ok(Command::SetFrequency(Channel::Right, 195.0)));
    }

    #[test]
    fn test_parse_mute() {
        assert_eq!(Command::parse("mute"), Ok(Command::SetMute(0.0)));
        assert_eq!(Command::parse("mute on"), Ok(Command::SetMute(0.0)));
        assert_eq!(Command::parse("mute off"), Ok(Command::SetMute(1.0)));
        assert_eq!(Command::parse("mute 0.5"), Ok(Command::SetMute(0.5)));
        assert_eq!(Command::parse("mute 7"), Ok(Command::SetMute(1.0)));
        assert_eq!(Command::parse("unmute"), Ok(Command::SetMute(1.0)));
    }

    #[test]
    fn test_parse_ramp() {
        assert_eq!(
            Command::parse("ramp 0.003 0.008 0.005"),
            Ok(Command::SetRampTimes(RampTimes { amplitude: 0.003, frequency: 0.008, phase: 0.005 }))
        );
        assert_eq!(Command::parse("ramp 0.003 0.008"), Err(ParseError::MissingValue("ramp")));
    }

    #[test]
    fn test_parse_lifecycle() {
        assert_eq!(Command::parse("start"), Ok(Command::Start));
        assert_eq!(Command::parse("STOP"), Ok(Command::Stop));
        assert_eq!(Command::parse("status"), Ok(Command::Status));
        assert_eq!(Command::parse("save"), Ok(Command::Save));
        assert_eq!(Command::parse("q"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse("   "), Err(ParseError::Empty));
        assert_eq!(Command::parse("A"), Err(ParseError::MissingValue("A")));
        assert_eq!(Command::parse("a fast"), Err(ParseError::InvalidNumber("fast".into())));
        assert_eq!(Command::parse("A NaN"), Err(ParseError::InvalidNumber("NaN".into())));
        assert!(matches!(Command::parse("wobble 3"), Err(ParseError::Unknown(_))));
    }

    #[test]
    fn test_apply_updates_params() {
        let params = ParamHandle::new(ParameterStore::new(ParamSnapshot::default(), 16));

        assert!(Command::parse("a 30").unwrap().apply(&params));
        assert!(Command::parse("mute").unwrap().apply(&params));
        assert!(!Command::Start.apply(&params));

        let snapshot = params.snapshot();
        assert_eq!(snapshot.params.frequency_left, 300.0);
        assert_eq!(snapshot.mute, 0.0);
    }
}
