use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::engine::PeerSession;

/// Established sessions, kept so they can be torn down on shutdown.
#[derive(Clone, Default)]
pub struct Registry {
    sessions: Arc<RwLock<HashMap<String, Arc<dyn PeerSession>>>>,
}

impl Registry {
    pub async fn insert(&self, id: String, peer: Arc<dyn PeerSession>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, peer);
        debug!("active sessions: {}", sessions.len());
    }

    /// Returns whether the session was still registered.
    pub async fn remove(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(id).is_some();
        debug!("active sessions: {}", sessions.len());
        removed
    }

    /// Whether the session is still connected, or at least not yet noticed as gone.
    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Number of sessions currently held open.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn close_all(&self) {
        let sessions: Vec<_> = self.sessions.write().await.drain().collect();
        info!("closing {} sessions", sessions.len());
        for (id, peer) in sessions {
            if let Err(err) = peer.close().await {
                debug!("[{}] close error: {}", id, err);
            }
        }
    }
}
