//! What the ingest server needs from a WebRTC engine.
//!
//! The HTTP layer and the negotiator only talk to these traits; [`rtc`]
//! implements them on top of webrtc-rs.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub mod rtc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => f.write_str("audio"),
            TrackKind::Video => f.write_str("video"),
        }
    }
}

/// Identity of a remote track, fixed once the track has arrived.
#[derive(Clone, Debug)]
pub struct TrackInfo {
    pub id: String,
    pub kind: TrackKind,
    pub mime_type: String,
    pub payload_type: u8,
}

/// Readable source of raw RTP packets for one track.
#[async_trait]
pub trait PacketSource: Send {
    /// Reads one packet into `buf` and returns its length.
    ///
    /// Any error, end of stream included, is final for the source.
    async fn read(&mut self, buf: &mut [u8]) -> anyhow::Result<usize>;
}

pub struct RemoteTrack {
    pub info: TrackInfo,
    pub source: Box<dyn PacketSource>,
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Called by the engine for every track the publisher sends.
///
/// Implementations must return quickly; long running work is spawned.
pub trait TrackHandler: Send + Sync {
    fn on_track(&self, track: RemoteTrack);
}

/// One peer connection, as seen by the negotiator.
#[async_trait]
pub trait PeerSession: Send + Sync {
    fn on_track(&self, handler: Arc<dyn TrackHandler>);

    async fn set_remote_description(&self, offer: String) -> anyhow::Result<()>;

    async fn create_answer(&self) -> anyhow::Result<String>;

    /// Fires once ICE gathering completes. Must be requested before the
    /// local description is set, otherwise the completion can be missed.
    async fn gathering_complete_promise(&self) -> mpsc::Receiver<()>;

    async fn set_local_description(&self, answer: String) -> anyhow::Result<()>;

    async fn local_description(&self) -> Option<String>;

    /// Resolves once the connection has failed, disconnected or closed.
    async fn disconnected(&self);

    async fn close(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create_session(&self) -> anyhow::Result<Arc<dyn PeerSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_kind_display() {
        assert_eq!("audio", TrackKind::Audio.to_string());
        assert_eq!("video", TrackKind::Video.to_string());
    }
}
