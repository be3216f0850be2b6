//! # Drive Equipment Commands and Telemetry
//!
//! The remote actuator reports two drive channels, left and right. Depending on the transport the
//! report is either a labelled pair of duty levels:
//!
//! ```text
//! left: 120<br>right: 80
//! ```
//!
//! or a single comma separated line of encoder counts:
//!
//! ```text
//! 1024,998
//! ```
//!
//! Anything else is rejected with a [`ParseError`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Label of the left channel in a labelled payload.
pub const LEFT_LABEL: &str = "left";

/// Label of the right channel in a labelled payload.
pub const RIGHT_LABEL: &str = "right";

/// Separator between fields of a labelled payload, in addition to newlines.
pub const LABELLED_FIELD_SEP: &str = "<br>";

/// Minimum drive duty reported in a labelled payload.
pub const DUTY_MIN: i32 = 0;

/// Maximum drive duty reported in a labelled payload.
pub const DUTY_MAX: i32 = 255;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One reading of both drive channels.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySample {
    pub left: i32,
    pub right: i32,
}

/// A telemetry payload as received from a transport, before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTelemetryPayload {
    /// The grammar the payload is expected to follow.
    pub format: PayloadFormat,

    /// Raw payload text.
    pub text: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Grammar of a telemetry payload, fixed by the transport that produced it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// `left: N` and `right: N` fields separated by `<br>` or newlines, duty in `[0, 255]`.
    Labelled,

    /// `N,M` on one line, any 32 bit signed counts.
    CommaPair,
}

/// Identifies one of the two drive channels.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

/// A command sent to the remote actuator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveCmd {
    /// Drive to the given target in the logical frame.
    SetTarget { x: i32, y: i32 },

    /// Stop all drive actuators.
    Stop,
}

/// Possible telemetry parsing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("The payload is empty")]
    Empty,

    #[error("The {0:?} channel is missing from the payload")]
    MissingChannel(Channel),

    #[error("The {0:?} channel appears more than once in the payload")]
    DuplicateChannel(Channel),

    #[error("Unexpected field in payload: {0:?}")]
    UnexpectedField(String),

    #[error("The {channel:?} channel has a non-numeric value: {value:?}")]
    InvalidValue { channel: Channel, value: String },

    #[error("The {channel:?} channel value {value} is outside the duty range [0, 255]")]
    OutOfRange { channel: Channel, value: i32 },

    #[error("Expected two comma separated values, found {0:?}")]
    BadCommaPair(String),

    #[error("The transport reported a malformed payload: {0}")]
    Malformed(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TelemetrySample {
    /// Get the value of the given channel.
    pub fn get(&self, channel: Channel) -> i32 {
        match channel {
            Channel::Left => self.left,
            Channel::Right => self.right,
        }
    }
}

impl RawTelemetryPayload {
    pub fn new(format: PayloadFormat, text: impl Into<String>) -> Self {
        Self {
            format,
            text: text.into(),
        }
    }

    /// Parse the payload according to its format.
    pub fn parse(&self) -> Result<TelemetrySample, ParseError> {
        match self.format {
            PayloadFormat::Labelled => parse_labelled(&self.text),
            PayloadFormat::CommaPair => parse_comma_pair(&self.text),
        }
    }
}

impl Channel {
    pub fn label(&self) -> &'static str {
        match self {
            Channel::Left => LEFT_LABEL,
            Channel::Right => RIGHT_LABEL,
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            LEFT_LABEL => Some(Channel::Left),
            RIGHT_LABEL => Some(Channel::Right),
            _ => None,
        }
    }
}

impl DriveCmd {
    /// Encode the command as a line for the serial transport, including the trailing newline.
    pub fn to_serial_line(&self) -> String {
        match self {
            DriveCmd::SetTarget { x, y } => format!("{},{}\n", x, y),
            DriveCmd::Stop => String::from("stop\n"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse a labelled payload (`left: N<br>right: N`).
///
/// Fields may be separated by `<br>` or newlines and are trimmed of surrounding whitespace. Both
/// channels must appear exactly once and no other field is allowed.
pub fn parse_labelled(text: &str) -> Result<TelemetrySample, ParseError> {
    let mut left = None;
    let mut right = None;
    let mut num_fields = 0;

    let fields = text
        .split(LABELLED_FIELD_SEP)
        .flat_map(|s| s.lines())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    for field in fields {
        num_fields += 1;

        let (label, value) = match field.split_once(':') {
            Some((l, v)) => (l.trim(), v.trim()),
            None => return Err(ParseError::UnexpectedField(field.to_string())),
        };

        let channel = Channel::from_label(label)
            .ok_or_else(|| ParseError::UnexpectedField(field.to_string()))?;

        let value = parse_value(channel, value)?;
        if !(DUTY_MIN..=DUTY_MAX).contains(&value) {
            return Err(ParseError::OutOfRange { channel, value });
        }

        let slot = match channel {
            Channel::Left => &mut left,
            Channel::Right => &mut right,
        };
        if slot.replace(value).is_some() {
            return Err(ParseError::DuplicateChannel(channel));
        }
    }

    if num_fields == 0 {
        return Err(ParseError::Empty);
    }

    Ok(TelemetrySample {
        left: left.ok_or(ParseError::MissingChannel(Channel::Left))?,
        right: right.ok_or(ParseError::MissingChannel(Channel::Right))?,
    })
}

/// Parse a comma pair payload (`N,M`).
pub fn parse_comma_pair(text: &str) -> Result<TelemetrySample, ParseError> {
    let line = text.trim();

    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parts = line.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(l), Some(r), None) => Ok(TelemetrySample {
            left: parse_value(Channel::Left, l.trim())?,
            right: parse_value(Channel::Right, r.trim())?,
        }),
        _ => Err(ParseError::BadCommaPair(line.to_string())),
    }
}

fn parse_value(channel: Channel, value: &str) -> Result<i32, ParseError> {
    value.parse::<i32>().map_err(|_| ParseError::InvalidValue {
        channel,
        value: value.to_string(),
    })
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_labelled() {
        assert_eq!(
            parse_labelled("left: 120<br>right: 80"),
            Ok(TelemetrySample { left: 120, right: 80 })
        );

        // Newlines, extra whitespace and a trailing separator are all fine
        assert_eq!(
            parse_labelled("  left:0\r\n right :  255 <br>\n"),
            Ok(TelemetrySample { left: 0, right: 255 })
        );

        // Order doesn't matter
        assert_eq!(
            parse_labelled("right: 3<br>left: 4"),
            Ok(TelemetrySample { left: 4, right: 3 })
        );
    }

    #[test]
    fn test_parse_labelled_rejects() {
        assert_eq!(
            parse_labelled("left: abc"),
            Err(ParseError::InvalidValue { channel: Channel::Left, value: "abc".into() })
        );
        assert_eq!(
            parse_labelled("left: 12"),
            Err(ParseError::MissingChannel(Channel::Right))
        );
        assert_eq!(parse_labelled("  \n<br> "), Err(ParseError::Empty));
        assert_eq!(
            parse_labelled("left: 1<br>left: 2<br>right: 3"),
            Err(ParseError::DuplicateChannel(Channel::Left))
        );
        assert_eq!(
            parse_labelled("left: 1<br>middle: 2"),
            Err(ParseError::UnexpectedField("middle: 2".into()))
        );
        assert_eq!(
            parse_labelled("left: 256<br>right: 0"),
            Err(ParseError::OutOfRange { channel: Channel::Left, value: 256 })
        );
        assert_eq!(
            parse_labelled("left 1<br>right 2"),
            Err(ParseError::UnexpectedField("left 1".into()))
        );
    }

    #[test]
    fn test_parse_comma_pair() {
        assert_eq!(
            parse_comma_pair("1024,998\n"),
            Ok(TelemetrySample { left: 1024, right: 998 })
        );
        assert_eq!(
            parse_comma_pair(" -5 , 7 "),
            Ok(TelemetrySample { left: -5, right: 7 })
        );

        assert_eq!(parse_comma_pair(""), Err(ParseError::Empty));
        assert_eq!(parse_comma_pair("1,2,3"), Err(ParseError::BadCommaPair("1,2,3".into())));
        assert_eq!(parse_comma_pair("12"), Err(ParseError::BadCommaPair("12".into())));
        assert_eq!(
            parse_comma_pair("1,x"),
            Err(ParseError::InvalidValue { channel: Channel::Right, value: "x".into() })
        );
    }

    #[test]
    fn test_raw_payload_dispatch() {
        let labelled = RawTelemetryPayload::new(PayloadFormat::Labelled, "1,2");
        assert!(labelled.parse().is_err());

        let comma = RawTelemetryPayload::new(PayloadFormat::CommaPair, "1,2");
        assert_eq!(comma.parse(), Ok(TelemetrySample { left: 1, right: 2 }));
    }

    #[test]
    fn test_serial_line() {
        assert_eq!(DriveCmd::SetTarget { x: -20, y: 15 }.to_serial_line(), "-20,15\n");
        assert_eq!(DriveCmd::Stop.to_serial_line(), "stop\n");
    }
}
