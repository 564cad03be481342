use std::fmt;
use std::str::FromStr;

use crate::error::CommandParseError;

/// Length of every encoded command: a 3 letter tag, a colon and the state digit.
pub const COMMAND_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Rhythmic auditory stimulation (audio cueing)
    Ras,
    Haptic,
    Laser,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::Ras, Feature::Haptic, Feature::Laser];

    pub fn tag(&self) -> &'static str {
        match self {
            Feature::Ras => "RAS",
            Feature::Haptic => "HAP",
            Feature::Laser => "LAS",
        }
    }

    fn from_tag(tag: &str) -> Option<Feature> {
        Feature::ALL.into_iter().find(|feature| feature.tag() == tag)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            Feature::Ras => "RAS",
            Feature::Haptic => "Haptic",
            Feature::Laser => "Laser",
        };

        f.pad(result)
    }
}

impl FromStr for Feature {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ras" | "audio" => Ok(Feature::Ras),
            "haptic" | "hap" => Ok(Feature::Haptic),
            "laser" | "las" => Ok(Feature::Laser),
            _ => Err(CommandParseError::UnknownFeature(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub feature: Feature,
    pub enabled: bool,
}

impl Command {
    pub fn new(feature: Feature, enabled: bool) -> Self {
        Command { feature, enabled }
    }

    /// The literal sent to the device, e.g. `"HAP:1"`.
    pub fn as_str(&self) -> &'static str {
        match (self.feature, self.enabled) {
            (Feature::Ras, true) => "RAS:1",
            (Feature::Ras, false) => "RAS:0",
            (Feature::Haptic, true) => "HAP:1",
            (Feature::Haptic, false) => "HAP:0",
            (Feature::Laser, true) => "LAS:1",
            (Feature::Laser, false) => "LAS:0",
        }
    }

    /// One byte per character, no terminator.
    pub fn encode(&self) -> [u8; COMMAND_LEN] {
        let mut bytes = [0u8; COMMAND_LEN];
        bytes.copy_from_slice(self.as_str().as_bytes());
        bytes
    }

    pub fn parse(s: &str) -> Result<Command, CommandParseError> {
        let malformed = || CommandParseError::Malformed(s.to_string());

        let (tag, state) = s.split_once(':').ok_or_else(malformed)?;
        let feature = Feature::from_tag(tag).ok_or_else(malformed)?;
        let enabled = match state {
            "1" => true,
            "0" => false,
            _ => return Err(malformed()),
        };

        Ok(Command { feature, enabled })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
