use serde::{Deserialize, Serialize};
use std::fmt;

/// How available a channel is for a new task, least to most impaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Availability {
    #[serde(rename = "Available")]
    Available,
    #[serde(rename = "Slightly Affected")]
    SlightlyAffected,
    #[serde(rename = "Affected")]
    Affected,
    #[serde(rename = "Unavailable")]
    Unavailable,
}

impl Availability {
    pub fn label(&self) -> &'static str {
        match self {
            Availability::Available => "Available",
            Availability::SlightlyAffected => "Slightly Affected",
            Availability::Affected => "Affected",
            Availability::Unavailable => "Unavailable",
        }
    }

    /// Case-insensitive match on the scale labels. "Not Available", which the
    /// few-shot examples use, reads as `Unavailable`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "available" => Some(Availability::Available),
            "slightly affected" => Some(Availability::SlightlyAffected),
            "affected" => Some(Availability::Affected),
            "unavailable" | "not available" => Some(Availability::Unavailable),
            _ => None,
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Eye,
    Hearing,
    Vocal,
    Hand,
}

impl Channel {
    /// Parse order.
    pub const ALL: [Channel; 4] = [Channel::Eye, Channel::Hearing, Channel::Vocal, Channel::Hand];

    pub fn label(&self) -> &'static str {
        match self {
            Channel::Eye => "Eye",
            Channel::Hearing => "Hearing",
            Channel::Vocal => "Vocal",
            Channel::Hand => "Hand",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SituationalAssessment {
    pub eye: Availability,
    pub hearing: Availability,
    pub vocal: Availability,
    pub hand: Availability,
}

impl SituationalAssessment {
    pub fn get(&self, channel: Channel) -> Availability {
        match channel {
            Channel::Eye => self.eye,
            Channel::Hearing => self.hearing,
            Channel::Vocal => self.vocal,
            Channel::Hand => self.hand,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no \"{channel}: \" label in assessment")]
    MissingLabel { channel: Channel },
    #[error("no ';' after the {channel} value")]
    MissingDelimiter { channel: Channel },
    #[error("unrecognized {channel} value {value:?}")]
    UnknownValue { channel: Channel, value: String },
}

impl ParseError {
    pub fn channel(&self) -> Channel {
        match self {
            ParseError::MissingLabel { channel }
            | ParseError::MissingDelimiter { channel }
            | ParseError::UnknownValue { channel, .. } => *channel,
        }
    }
}

/// Reads the four channel values out of a model answer.
///
/// Each value is the text between the first `"<Label>: "` and the next `;`.
/// Labels are looked up independently, so reasoning lines such as
/// `"Eye Reasoning: ..."` do not interfere.
pub fn parse_assessment(raw: &str) -> Result<SituationalAssessment, ParseError> {
    let eye = parse_channel(raw, Channel::Eye)?;
    let hearing = parse_channel(raw, Channel::Hearing)?;
    let vocal = parse_channel(raw, Channel::Vocal)?;
    let hand = parse_channel(raw, Channel::Hand)?;

    Ok(SituationalAssessment {
        eye,
        hearing,
        vocal,
        hand,
    })
}

fn parse_channel(raw: &str, channel: Channel) -> Result<Availability, ParseError> {
    let marker = format!("{}: ", channel.label());
    let start = raw
        .find(&marker)
        .map(|i| i + marker.len())
        .ok_or(ParseError::MissingLabel { channel })?;
    let rest = &raw[start..];
    let end = rest
        .find(';')
        .ok_or(ParseError::MissingDelimiter { channel })?;

    let value = rest[..end].trim().trim_end_matches(['.', '*']).trim();
    Availability::from_label(value).ok_or_else(|| ParseError::UnknownValue {
        channel,
        value: value.to_string(),
    })
}
