use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Opaque id of the channel (forum topic, Discord channel, ...) backing a thread.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Id of a ticket in the host ticket system.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat / guild an inbound message arrived in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(pub i64);

/// Position of an entry in the warn/close progression.
///
/// Ordering matters: the sweep only ever moves an entry forward
/// (`Active < WarnLong < WarnShort`), and `Stopped` sorts last so that
/// "stage < WarnShort" style checks never match a stopped entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Active,
    WarnLong,
    WarnShort,
    Stopped,
}

/// Things that can happen to an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageEvent {
    /// New user activity in the thread.
    Reset,
    /// Deadline entered the long warning window.
    WarnLongDue,
    /// Deadline entered the short warning window.
    WarnShortDue,
    /// Operator `stop`.
    Stop,
    /// Operator `start`.
    Start,
}

impl Stage {
    /// Numeric code used by the state file ("0".."3").
    pub fn code(self) -> u8 {
        match self {
            Stage::Active => 0,
            Stage::WarnLong => 1,
            Stage::WarnShort => 2,
            Stage::Stopped => 3,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Stage::Active),
            1 => Some(Stage::WarnLong),
            2 => Some(Stage::WarnShort),
            3 => Some(Stage::Stopped),
            _ => None,
        }
    }

    /// Stage after `event`, or `None` if the event does not apply.
    ///
    /// A stopped entry only reacts to `Start`.
    pub fn transition(self, event: StageEvent) -> Option<Stage> {
        use Stage::*;
        use StageEvent::*;

        match (self, event) {
            (Stopped, Start) => Some(Active),
            (Stopped, Reset | WarnLongDue | WarnShortDue | Stop) => None,
            (Active | WarnLong | WarnShort, Reset | Start) => Some(Active),
            (Active | WarnLong | WarnShort, Stop) => Some(Stopped),
            (Active, WarnLongDue) => Some(WarnLong),
            (Active | WarnLong, WarnShortDue) => Some(WarnShort),
            (WarnLong | WarnShort, WarnLongDue) | (WarnShort, WarnShortDue) => None,
        }
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.code().to_string())
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        let code = match Raw::deserialize(d)? {
            Raw::Number(n) => n,
            Raw::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| de::Error::custom(format!("invalid stage {s:?}")))?,
        };
        Stage::from_code(code).ok_or_else(|| de::Error::custom(format!("invalid stage {code}")))
    }
}

/// Close-tracking record for one thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub channel_id: ChannelId,
    #[serde(rename = "warnStatus")]
    pub stage: Stage,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub close_at: DateTime<Utc>,
}
