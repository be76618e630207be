use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice::mdns::MulticastDnsMode;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_remote::TrackRemote;
use webrtc::util::Marshal;

use super::{
    PacketSource, PeerSession, RemoteTrack, SessionFactory, TrackHandler, TrackInfo, TrackKind,
};

/// Builds receive-only peer connections with the default codecs and interceptors.
pub struct RtcEngine {
    api: API,
    config: RTCConfiguration,
}

impl RtcEngine {
    pub fn new(ice_servers: Vec<RTCIceServer>, include_loopback: bool) -> anyhow::Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut m)?;
        let mut s = SettingEngine::default();

        // NOTE: Disabled mDNS send
        s.set_ice_multicast_dns_mode(MulticastDnsMode::Disabled);
        s.set_include_loopback_candidate(include_loopback);

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .with_setting_engine(s)
            .build();
        Ok(Self {
            api,
            config: RTCConfiguration {
                ice_servers,
                ..Default::default()
            },
        })
    }
}

#[async_trait]
impl SessionFactory for RtcEngine {
    async fn create_session(&self) -> anyhow::Result<Arc<dyn PeerSession>> {
        let peer = Arc::new(self.api.new_peer_connection(self.config.clone()).await?);
        Ok(Arc::new(RtcSession::new(peer)))
    }
}

pub struct RtcSession {
    peer: Arc<RTCPeerConnection>,
    state: watch::Receiver<RTCPeerConnectionState>,
}

impl RtcSession {
    fn new(peer: Arc<RTCPeerConnection>) -> Self {
        let (tx, rx) = watch::channel(RTCPeerConnectionState::New);
        peer.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            info!("peer connection state changed: {}", s);
            tx.send_replace(s);
            Box::pin(async {})
        }));
        Self { peer, state: rx }
    }
}

#[async_trait]
impl PeerSession for RtcSession {
    fn on_track(&self, handler: Arc<dyn TrackHandler>) {
        self.peer.on_track(Box::new(move |track, _, _| {
            if let Some(track) = remote_track(track) {
                handler.on_track(track);
            }
            Box::pin(async {})
        }));
    }

    async fn set_remote_description(&self, offer: String) -> anyhow::Result<()> {
        let offer = RTCSessionDescription::offer(offer)?;
        self.peer.set_remote_description(offer).await?;
        Ok(())
    }

    async fn create_answer(&self) -> anyhow::Result<String> {
        Ok(self.peer.create_answer(None).await?.sdp)
    }

    async fn gathering_complete_promise(&self) -> mpsc::Receiver<()> {
        self.peer.gathering_complete_promise().await
    }

    async fn set_local_description(&self, answer: String) -> anyhow::Result<()> {
        let answer = RTCSessionDescription::answer(answer)?;
        self.peer.set_local_description(answer).await?;
        Ok(())
    }

    async fn local_description(&self) -> Option<String> {
        self.peer.local_description().await.map(|d| d.sdp)
    }

    async fn disconnected(&self) {
        let mut state = self.state.clone();
        let _ = state
            .wait_for(|s| {
                matches!(
                    s,
                    RTCPeerConnectionState::Failed
                        | RTCPeerConnectionState::Disconnected
                        | RTCPeerConnectionState::Closed
                )
            })
            .await;
    }

    async fn close(&self) -> anyhow::Result<()> {
        debug!("closing peer connection {}", self.peer.get_stats_id());
        self.peer.close().await?;
        Ok(())
    }
}

fn remote_track(track: Arc<TrackRemote>) -> Option<RemoteTrack> {
    let codec = track.codec();
    let kind = match track.kind() {
        RTPCodecType::Audio => TrackKind::Audio,
        RTPCodecType::Video => TrackKind::Video,
        RTPCodecType::Unspecified => {
            warn!(
                "track {} has no kind, codec: {}",
                track.id(),
                codec.capability.mime_type
            );
            return None;
        }
    };
    let info = TrackInfo {
        id: track.id().to_string(),
        kind,
        mime_type: codec.capability.mime_type,
        payload_type: track.payload_type(),
    };
    Some(RemoteTrack {
        info,
        source: Box::new(RtcTrackSource { track }),
    })
}

struct RtcTrackSource {
    track: Arc<TrackRemote>,
}

#[async_trait]
impl PacketSource for RtcTrackSource {
    async fn read(&mut self, buf: &mut [u8]) -> anyhow::Result<usize> {
        let (packet, _) = self.track.read_rtp().await?;
        Ok(packet.marshal_to(buf)?)
    }
}
