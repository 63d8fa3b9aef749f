//! Core data types shared by the decoders, the record store and the CLI.
use crate::error::{AppResult, DaqError};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single message as delivered by the bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMessage {
    /// `<device>/<group>/<kind>` topic.
    pub topic: String,
    /// Raw message bytes.
    pub payload: Vec<u8>,
    /// Local arrival time in Unix milliseconds.
    pub arrival_millis: i64,
}

impl BusMessage {
    /// A message that arrived at `arrival_millis`.
    pub fn new(topic: impl Into<String>, payload: Vec<u8>, arrival_millis: i64) -> Self {
        Self {
            topic: topic.into(),
            payload,
            arrival_millis,
        }
    }

    /// Stamp a message with the current wall-clock time.
    pub fn received_now(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self::new(topic, payload, Utc::now().timestamp_millis())
    }

    /// Parse the topic of this message.
    pub fn parsed_topic(&self) -> AppResult<Topic> {
        Topic::parse(&self.topic)
    }
}

/// Sensor family, taken from the last topic segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    /// Triaxial accelerometer (`acc02`).
    Acceleration,
    /// Strain gauge (`str01`).
    Strain,
    /// Clock (`clk01`).
    Clock,
    /// Illuminance (`ill01`).
    Illuminance,
    /// Infrared presence (`ir01`).
    Infrared,
    /// Ultrasonic anemometer (`gill01`).
    Wind,
    /// Temperature and humidity (`sht01`).
    Climate,
    /// 8x8 thermal array (`amg01`).
    Thermal,
    /// Any other suffix, kept verbatim.
    Other(String),
}

impl SensorKind {
    /// Classify a topic's last segment.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Self {
        match suffix {
            "acc02" => Self::Acceleration,
            "str01" => Self::Strain,
            "clk01" => Self::Clock,
            "ill01" => Self::Illuminance,
            "ir01" => Self::Infrared,
            "gill01" => Self::Wind,
            "sht01" => Self::Climate,
            "amg01" => Self::Thermal,
            other => Self::Other(other.to_string()),
        }
    }

    /// The topic segment naming this kind.
    #[must_use]
    pub fn suffix(&self) -> &str {
        match self {
            Self::Acceleration => "acc02",
            Self::Strain => "str01",
            Self::Clock => "clk01",
            Self::Illuminance => "ill01",
            Self::Infrared => "ir01",
            Self::Wind => "gill01",
            Self::Climate => "sht01",
            Self::Thermal => "amg01",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A parsed `<device>/<group>/<kind>` topic.
///
/// Extra segments between the group and the kind are ignored; the kind is always the
/// last segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Device identifier, usually the sensor MAC address.
    pub device: String,
    /// Deployment group.
    pub group: String,
    /// Sensor kind from the last segment.
    pub kind: SensorKind,
}

impl Topic {
    /// Split a topic into its parts; fewer than three segments or an empty one is `InvalidTopic`.
    pub fn parse(topic: &str) -> AppResult<Self> {
        let parts: Vec<&str> = topic.split('/').collect();
        if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(DaqError::InvalidTopic(topic.to_string()));
        }
        Ok(Self {
            device: parts[0].to_string(),
            group: parts[1].to_string(),
            kind: SensorKind::from_suffix(parts[parts.len() - 1]),
        })
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.device, self.group, self.kind)
    }
}

/// Convert a sender timestamp in Unix milliseconds to a UTC time.
///
/// Returns `None` for values outside chrono's representable range.
#[must_use]
pub fn unix_millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
