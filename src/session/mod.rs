use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::engine::{PeerSession, SessionFactory, TrackHandler};

pub use self::registry::Registry;

mod registry;

/// Negotiation progress of one WHIP session. Only ever advances by [`SessionState::next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Created,
    RemoteDescriptionSet,
    AnswerCreated,
    LocalDescriptionSet,
    GatheringComplete,
    Established,
}

impl SessionState {
    pub fn next(self) -> Option<Self> {
        match self {
            SessionState::Created => Some(SessionState::RemoteDescriptionSet),
            SessionState::RemoteDescriptionSet => Some(SessionState::AnswerCreated),
            SessionState::AnswerCreated => Some(SessionState::LocalDescriptionSet),
            SessionState::LocalDescriptionSet => Some(SessionState::GatheringComplete),
            SessionState::GatheringComplete => Some(SessionState::Established),
            SessionState::Established => None,
        }
    }
}

/// The negotiation operation that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    CreateSession,
    SetRemoteDescription,
    CreateAnswer,
    SetLocalDescription,
    GatherCandidates,
    LocalDescription,
}

impl Step {
    pub fn describe(&self) -> &'static str {
        match self {
            Step::CreateSession => "failed to create peer connection",
            Step::SetRemoteDescription => "failed to set remote description",
            Step::CreateAnswer => "failed to create answer",
            Step::SetLocalDescription => "failed to set local description",
            Step::GatherCandidates => "ice gathering did not complete",
            Step::LocalDescription => "failed to get local description",
        }
    }
}

#[derive(Debug)]
pub struct NegotiationError {
    step: Step,
    source: anyhow::Error,
}

impl NegotiationError {
    pub(crate) fn new(step: Step, source: anyhow::Error) -> Self {
        Self { step, source }
    }

    pub fn step(&self) -> Step {
        self.step
    }
}

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step.describe(), self.source)
    }
}

/// A negotiated session. Keeps the peer alive until it disconnects.
pub struct Session {
    id: String,
    state: SessionState,
    peer: Arc<dyn PeerSession>,
    answer: String,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Always [`SessionState::Established`] for a session handed out by the negotiator.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Local description with the gathered candidates, returned to the publisher.
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Hands the peer to the registry and releases it once the connection drops.
    pub async fn detach(self, registry: Registry) -> String {
        let Session {
            id, peer, answer, ..
        } = self;
        registry.insert(id.clone(), peer.clone()).await;
        tokio::spawn(async move {
            peer.disconnected().await;
            info!("[{}] session disconnected", id);
            if let Err(err) = peer.close().await {
                debug!("[{}] close error: {}", id, err);
            }
            registry.remove(&id).await;
        });
        answer
    }
}

/// Drives one SDP offer through the session state machine.
pub struct Negotiator {
    factory: Arc<dyn SessionFactory>,
    gather_timeout: Duration,
}

impl Negotiator {
    pub fn new(factory: Arc<dyn SessionFactory>, gather_timeout: Duration) -> Self {
        Self {
            factory,
            gather_timeout,
        }
    }

    pub async fn negotiate(
        &self,
        offer: String,
        on_track: Arc<dyn TrackHandler>,
    ) -> Result<Session, NegotiationError> {
        let peer = self
            .factory
            .create_session()
            .await
            .map_err(|e| NegotiationError::new(Step::CreateSession, e))?;
        let id = uuid::Uuid::new_v4().to_string();
        debug!("[{}] session {:?}", id, SessionState::Created);

        // Before the remote description, so no track can arrive unobserved
        peer.on_track(on_track);

        let mut pending = Pending {
            id,
            state: SessionState::Created,
            peer,
            released: false,
        };
        match pending.advance(offer, self.gather_timeout).await {
            Ok(answer) => {
                info!("[{}] session established", pending.id);
                pending.released = true;
                Ok(Session {
                    id: pending.id.clone(),
                    state: pending.state,
                    peer: pending.peer.clone(),
                    answer,
                })
            }
            Err(err) => {
                error!("[{}] negotiation failed at {:?}: {}", pending.id, pending.state, err);
                pending.released = true;
                if let Err(e) = pending.peer.close().await {
                    debug!("[{}] close error: {}", pending.id, e);
                }
                Err(err)
            }
        }
    }
}

/// A session still being negotiated. Dropping it before it is released,
/// as happens when the request is abandoned, closes the peer in the background.
struct Pending {
    id: String,
    state: SessionState,
    peer: Arc<dyn PeerSession>,
    released: bool,
}

impl Drop for Pending {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!("[{}] negotiation abandoned at {:?}", self.id, self.state);
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let (id, peer) = (self.id.clone(), self.peer.clone());
        handle.spawn(async move {
            if let Err(e) = peer.close().await {
                debug!("[{}] close error: {}", id, e);
            }
        });
    }
}

impl Pending {
    fn transition(&mut self, to: SessionState) {
        debug_assert_eq!(self.state.next(), Some(to));
        debug!("[{}] session {:?} -> {:?}", self.id, self.state, to);
        self.state = to;
    }

    async fn advance(
        &mut self,
        offer: String,
        gather_timeout: Duration,
    ) -> Result<String, NegotiationError> {
        self.peer
            .set_remote_description(offer)
            .await
            .map_err(|e| NegotiationError::new(Step::SetRemoteDescription, e))?;
        self.transition(SessionState::RemoteDescriptionSet);

        let answer = self
            .peer
            .create_answer()
            .await
            .map_err(|e| NegotiationError::new(Step::CreateAnswer, e))?;
        self.transition(SessionState::AnswerCreated);

        let mut gather_complete = self.peer.gathering_complete_promise().await;
        self.peer
            .set_local_description(answer)
            .await
            .map_err(|e| NegotiationError::new(Step::SetLocalDescription, e))?;
        self.transition(SessionState::LocalDescriptionSet);

        match tokio::time::timeout(gather_timeout, gather_complete.recv()).await {
            Ok(_) => self.transition(SessionState::GatheringComplete),
            Err(_) => {
                return Err(NegotiationError::new(
                    Step::GatherCandidates,
                    anyhow::anyhow!("no completion within {:?}", gather_timeout),
                ))
            }
        }

        let description = self.peer.local_description().await.ok_or_else(|| {
            NegotiationError::new(
                Step::LocalDescription,
                anyhow::anyhow!("local description is missing"),
            )
        })?;
        self.transition(SessionState::Established);
        Ok(description)
    }
}
