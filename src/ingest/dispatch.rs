use webrtc::api::media_engine::{MIME_TYPE_H264, MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp::codecs::h264::H264Packet;
use webrtc::rtp::codecs::opus::OpusPacket;
use webrtc::rtp::codecs::vp8::Vp8Packet;
use webrtc::rtp::packetizer::Depacketizer;

/// Codecs a track can be dumped for. Adding a variant here is all it takes
/// to ingest a new codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    Vp8,
    H264,
    Opus,
}

impl Codec {
    pub const ALL: [Codec; 3] = [Codec::Vp8, Codec::H264, Codec::Opus];

    pub fn mime_type(&self) -> &'static str {
        match self {
            Codec::Vp8 => MIME_TYPE_VP8,
            Codec::H264 => MIME_TYPE_H264,
            Codec::Opus => MIME_TYPE_OPUS,
        }
    }

    /// Case-insensitive, as SDP encoding names are.
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|codec| codec.mime_type().eq_ignore_ascii_case(mime_type))
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Codec::Vp8 => "vp8",
            Codec::H264 => "h264",
            Codec::Opus => "opus",
        }
    }

    pub fn depacketizer(&self) -> Box<dyn Depacketizer + Send> {
        match self {
            Codec::Vp8 => Box::<Vp8Packet>::default(),
            Codec::H264 => Box::<H264Packet>::default(),
            Codec::Opus => Box::<OpusPacket>::default(),
        }
    }
}

/// Codec-specific handling chosen for one track.
pub struct Dispatch {
    pub codec: Codec,
    pub depacketizer: Box<dyn Depacketizer + Send>,
    pub extension: &'static str,
}

/// `None` means the codec is unsupported and the track must not be ingested.
pub fn dispatch(mime_type: &str) -> Option<Dispatch> {
    Codec::from_mime_type(mime_type).map(|codec| Dispatch {
        codec,
        depacketizer: codec.depacketizer(),
        extension: codec.extension(),
    })
}
