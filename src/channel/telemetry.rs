use crate::device::constants::GAIT_WINDOW;
use crate::error::DecodeError;

/// The most recent gait samples, oldest first. Always exactly [`GAIT_WINDOW`] long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaitSeries {
    samples: [u8; GAIT_WINDOW],
}

impl Default for GaitSeries {
    fn default() -> Self {
        GaitSeries { samples: [0; GAIT_WINDOW] }
    }
}

impl GaitSeries {
    pub fn new() -> Self {
        GaitSeries::default()
    }

    pub fn samples(&self) -> &[u8; GAIT_WINDOW] {
        &self.samples
    }

    pub fn latest(&self) -> u8 {
        self.samples[GAIT_WINDOW - 1]
    }

    /// Drop the oldest sample and append `sample`.
    pub fn push(&self, sample: u8) -> GaitSeries {
        let mut samples = [0; GAIT_WINDOW];
        samples[..GAIT_WINDOW - 1].copy_from_slice(&self.samples[1..]);
        samples[GAIT_WINDOW - 1] = sample;
        GaitSeries { samples }
    }

    /// Fold a notification payload into the window. Only the first byte is a sample; the rest
    /// of the payload is ignored.
    pub fn on_notification(&self, raw: &[u8]) -> Result<GaitSeries, DecodeError> {
        let sample = raw.first().ok_or(DecodeError::EmptyPayload)?;
        Ok(self.push(*sample))
    }
}
