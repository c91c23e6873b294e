//! Wire vocabulary shared by the match server and the equipment simulator.
//!
//! Laser-tag equipment speaks a tiny ASCII protocol over UDP. Every inbound
//! datagram carries one of two line shapes:
//!
//! - `"A:B"`: player `A` tagged `B`, or, when `B` is a reserved base code,
//!   player `A` captured a base.
//! - `"C"`: a bare code. Only the two base codes mean anything here.
//!
//! Outbound payloads are plain decimal integers: player/equipment ids echoed
//! back to the network, plus the match start and match end codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

/// Integer identity of a player, identical to the equipment id on the wire.
pub type PlayerId = i32;

/// Red base captured, so green scores.
pub const RED_BASE_CODE: i32 = 53;
/// Green base captured, so red scores.
pub const GREEN_BASE_CODE: i32 = 43;
/// Broadcast once when the countdown finishes and play begins.
pub const MATCH_START_CODE: i32 = 202;
/// Broadcast three times when the match clock runs out.
pub const MATCH_END_CODE: i32 = 221;

pub const HIT_POINTS: i32 = 10;
pub const FRIENDLY_FIRE_PENALTY: i32 = 10;
pub const BASE_CAPTURE_POINTS: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Green,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::Red, Team::Green];

    pub fn as_str(&self) -> &'static str {
        match self {
            Team::Red => "red",
            Team::Green => "green",
        }
    }

    pub fn opponent(&self) -> Team {
        match self {
            Team::Red => Team::Green,
            Team::Green => Team::Red,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown team {0:?} (expected red or green)")]
pub struct ParseTeamError(pub String);

impl FromStr for Team {
    type Err = ParseTeamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" | "r" => Ok(Team::Red),
            "green" | "g" => Ok(Team::Green),
            _ => Err(ParseTeamError(s.to_string())),
        }
    }
}

/// A player as known by the player directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub codename: String,
}

impl Player {
    pub fn new(id: PlayerId, codename: impl Into<String>) -> Self {
        Self {
            id,
            codename: codename.into(),
        }
    }
}

/// Team that earns the reward when `code` is received, if it is a base code.
pub fn scoring_team(code: i32) -> Option<Team> {
    match code {
        RED_BASE_CODE => Some(Team::Green),
        GREEN_BASE_CODE => Some(Team::Red),
        _ => None,
    }
}

/// Base code that a player of `team` transmits when capturing the enemy base.
pub fn capture_code_for(team: Team) -> i32 {
    match team {
        Team::Green => RED_BASE_CODE,
        Team::Red => GREEN_BASE_CODE,
    }
}

pub fn is_base_code(code: i32) -> bool {
    scoring_team(code).is_some()
}

/// A decoded inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Hit {
        attacker: PlayerId,
        target: PlayerId,
    },
    BaseCapture {
        code: i32,
        scorer: Option<PlayerId>,
    },
    /// A bare integer that is not a reserved code.
    Unrecognized { code: i32 },
    Malformed { raw: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,

    #[error("payload is not ASCII text")]
    NotAscii,

    #[error("invalid {field} {value:?}: {source}")]
    InvalidInteger {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

fn parse_field(field: &'static str, value: &str) -> Result<i32, DecodeError> {
    let value = value.trim();
    value
        .parse::<i32>()
        .map_err(|source| DecodeError::InvalidInteger {
            field,
            value: value.to_string(),
            source,
        })
}

/// Parses one text line into an event, reporting why a line is unusable.
pub fn parse_line(line: &str) -> Result<InboundEvent, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(DecodeError::Empty);
    }

    if let Some((left, right)) = line.split_once(':') {
        let a = parse_field("sender", left)?;
        let b = parse_field("target", right)?;

        if is_base_code(b) {
            Ok(InboundEvent::BaseCapture {
                code: b,
                scorer: Some(a),
            })
        } else {
            Ok(InboundEvent::Hit {
                attacker: a,
                target: b,
            })
        }
    } else {
        let code = parse_field("code", line)?;
        if is_base_code(code) {
            Ok(InboundEvent::BaseCapture { code, scorer: None })
        } else {
            Ok(InboundEvent::Unrecognized { code })
        }
    }
}

/// Decodes a line. Never fails: unusable input becomes [`InboundEvent::Malformed`].
pub fn decode_line(line: &str) -> InboundEvent {
    match parse_line(line) {
        Ok(event) => event,
        Err(e) => InboundEvent::Malformed {
            raw: line.to_string(),
            reason: e.to_string(),
        },
    }
}

/// Decodes a raw datagram payload.
pub fn decode_datagram(payload: &[u8]) -> InboundEvent {
    match std::str::from_utf8(payload) {
        Ok(line) if line.is_ascii() => decode_line(line),
        _ => InboundEvent::Malformed {
            raw: String::from_utf8_lossy(payload).into_owned(),
            reason: DecodeError::NotAscii.to_string(),
        },
    }
}

/// Encodes an outbound integer as its decimal text.
pub fn encode_code(code: i32) -> String {
    code.to_string()
}
