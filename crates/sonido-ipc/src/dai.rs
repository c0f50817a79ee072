//! Digital audio interface (DAI) configuration requests.
//!
//! A DAI component is the graph endpoint that feeds a physical interface. The
//! host configures interfaces independently of topology: a [`DaiConfig`] names
//! an interface by `(dai_type, dai_index)` and every DAI component bound to
//! that interface receives it.

use core::fmt;

/// Physical interface family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DaiType {
    /// Synchronous serial port (I2S/TDM).
    Ssp,
    /// Digital microphone (PDM).
    Dmic,
    /// HD-Audio link.
    Hda,
    /// SoundWire audio link hub.
    Alh,
    /// Serial audio interface.
    Sai,
}

impl fmt::Display for DaiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ssp => "SSP",
            Self::Dmic => "DMIC",
            Self::Hda => "HDA",
            Self::Alh => "ALH",
            Self::Sai => "SAI",
        })
    }
}

/// Interface a DAI component is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DaiBinding {
    /// Interface family.
    pub dai_type: DaiType,
    /// Interface instance.
    pub dai_index: u32,
}

impl DaiBinding {
    /// Returns true if `config` targets this interface.
    pub fn matches(&self, config: &DaiConfig) -> bool {
        self.dai_type == config.dai_type && self.dai_index == config.dai_index
    }
}

/// Frame format on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DaiFormat {
    /// Standard I2S.
    #[default]
    I2s,
    /// Left-justified.
    LeftJustified,
    /// DSP mode A (TDM).
    DspA,
    /// Pulse-density modulation.
    Pdm,
}

/// Interface configuration sent by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaiConfig {
    /// Target interface family.
    pub dai_type: DaiType,
    /// Target interface instance.
    pub dai_index: u32,
    /// Frame format.
    pub format: DaiFormat,
    /// Frame rate in Hz.
    pub rate: u32,
    /// Channels per frame.
    pub channels: u16,
    /// Valid bits per sample.
    pub sample_bits: u16,
}

impl DaiConfig {
    /// Creates a 48 kHz stereo 32-bit I2S configuration for an interface.
    pub fn new(dai_type: DaiType, dai_index: u32) -> Self {
        Self {
            dai_type,
            dai_index,
            format: DaiFormat::I2s,
            rate: 48000,
            channels: 2,
            sample_bits: 32,
        }
    }

    /// Sets the frame rate.
    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    /// Sets the channel count.
    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// Sets the frame format.
    pub fn with_format(mut self, format: DaiFormat) -> Self {
        self.format = format;
        self
    }

    /// Returns the interface this configuration targets.
    pub fn binding(&self) -> DaiBinding {
        DaiBinding {
            dai_type: self.dai_type,
            dai_index: self.dai_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_matches_type_and_index() {
        let binding = DaiBinding {
            dai_type: DaiType::Ssp,
            dai_index: 1,
        };
        assert!(binding.matches(&DaiConfig::new(DaiType::Ssp, 1)));
        assert!(!binding.matches(&DaiConfig::new(DaiType::Ssp, 2)));
        assert!(!binding.matches(&DaiConfig::new(DaiType::Dmic, 1)));
    }

    #[test]
    fn config_binding_round_trip() {
        let config = DaiConfig::new(DaiType::Hda, 4).with_rate(96000).with_channels(8);
        assert_eq!(config.binding().dai_index, 4);
        assert_eq!(config.rate, 96000);
        assert_eq!(config.channels, 8);
    }
}
