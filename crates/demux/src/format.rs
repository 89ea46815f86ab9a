// Track format description shared by demuxer, decoder and sink setup

use symphonia::core::codecs::{self, CodecParameters, CodecType};

pub const MIME_RAW: &str = "audio/raw";

/// What the demuxer knows about one track.
#[derive(Debug, Clone)]
pub struct TrackFormat {
    pub mime: String,
    pub sample_rate: u32,
    pub channel_count: u16,
    pub duration_us: Option<u64>,
    /// Decoder configuration carried through opaquely. `None` for synthetic tracks.
    pub codec_params: Option<CodecParameters>,
}

impl TrackFormat {
    pub fn audio(mime: &str, sample_rate: u32, channel_count: u16, duration_us: Option<u64>) -> Self {
        Self {
            mime: mime.to_string(),
            sample_rate,
            channel_count,
            duration_us,
            codec_params: None,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.mime.starts_with("audio/") && self.sample_rate > 0
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_us.map(|us| us / 1000)
    }
}

/// MIME type for a symphonia codec, `None` for codecs nothing can decode.
pub fn codec_mime(codec: CodecType) -> Option<String> {
    let known = match codec {
        codecs::CODEC_TYPE_MP3 | codecs::CODEC_TYPE_MP2 | codecs::CODEC_TYPE_MP1 => "audio/mpeg",
        codecs::CODEC_TYPE_AAC => "audio/mp4a-latm",
        codecs::CODEC_TYPE_FLAC => "audio/flac",
        codecs::CODEC_TYPE_VORBIS => "audio/vorbis",
        codecs::CODEC_TYPE_OPUS => "audio/opus",
        codecs::CODEC_TYPE_ALAC => "audio/alac",
        _ => "",
    };
    if !known.is_empty() {
        return Some(known.to_string());
    }

    let descriptor = symphonia::default::get_codecs().get_codec(codec)?;
    if descriptor.short_name.starts_with("pcm") {
        Some(MIME_RAW.to_string())
    } else {
        Some(format!("audio/x-{}", descriptor.short_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_mime_mapping() {
        assert_eq!(codec_mime(codecs::CODEC_TYPE_MP3).as_deref(), Some("audio/mpeg"));
        assert_eq!(codec_mime(codecs::CODEC_TYPE_AAC).as_deref(), Some("audio/mp4a-latm"));
        assert_eq!(codec_mime(codecs::CODEC_TYPE_PCM_S16LE).as_deref(), Some(MIME_RAW));
        assert_eq!(codec_mime(codecs::CODEC_TYPE_NULL), None);
    }

    #[test]
    fn test_is_audio() {
        assert!(TrackFormat::audio("audio/mpeg", 44100, 2, None).is_audio());
        assert!(!TrackFormat::audio("video/avc", 0, 0, None).is_audio());
        assert!(!TrackFormat::audio("audio/mpeg", 0, 2, None).is_audio());
        assert_eq!(
            TrackFormat::audio(MIME_RAW, 8000, 1, Some(2_500_000)).duration_ms(),
            Some(2500)
        );
    }
}
