// Output channel layouts and sample encodings

use tempo_core::{AudioError, Result};

/// Speaker positions as a bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelLayout(u32);

impl ChannelLayout {
    pub const FRONT_LEFT: u32 = 1 << 0;
    pub const FRONT_RIGHT: u32 = 1 << 1;
    pub const FRONT_CENTER: u32 = 1 << 2;
    pub const LOW_FREQUENCY: u32 = 1 << 3;
    pub const BACK_LEFT: u32 = 1 << 4;
    pub const BACK_RIGHT: u32 = 1 << 5;
    pub const BACK_CENTER: u32 = 1 << 6;
    pub const SIDE_LEFT: u32 = 1 << 7;
    pub const SIDE_RIGHT: u32 = 1 << 8;

    pub const MONO: ChannelLayout = ChannelLayout(Self::FRONT_LEFT);
    pub const STEREO: ChannelLayout = ChannelLayout(Self::FRONT_LEFT | Self::FRONT_RIGHT);
    pub const QUAD: ChannelLayout = ChannelLayout(
        Self::FRONT_LEFT | Self::FRONT_RIGHT | Self::BACK_LEFT | Self::BACK_RIGHT,
    );
    pub const SURROUND_5_1: ChannelLayout = ChannelLayout(Self::QUAD.0 | Self::FRONT_CENTER | Self::LOW_FREQUENCY);
    pub const SURROUND_7_1: ChannelLayout =
        ChannelLayout(Self::SURROUND_5_1.0 | Self::SIDE_LEFT | Self::SIDE_RIGHT);

    /// Layout for an interleaved stream of `channels` channels (1 to 8).
    pub fn for_channel_count(channels: u16) -> Result<Self> {
        let layout = match channels {
            1 => Self::MONO,
            2 => Self::STEREO,
            3 => ChannelLayout(Self::STEREO.0 | Self::FRONT_CENTER),
            4 => Self::QUAD,
            5 => ChannelLayout(Self::QUAD.0 | Self::FRONT_CENTER),
            6 => Self::SURROUND_5_1,
            7 => ChannelLayout(Self::SURROUND_5_1.0 | Self::BACK_CENTER),
            8 => Self::SURROUND_7_1,
            n => {
                return Err(AudioError::UnsupportedFormat(format!(
                    "unsupported channel count {}",
                    n
                )))
            }
        };
        Ok(layout)
    }

    pub fn mask(self) -> u32 {
        self.0
    }

    pub fn channel_count(self) -> u16 {
        self.0.count_ones() as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PcmEncoding {
    /// Signed 16-bit little-endian
    Pcm16,
}

impl PcmEncoding {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            PcmEncoding::Pcm16 => 2,
        }
    }
}
