//! Process-wide mapping from stream id to session.
//!
//! Plain in-memory storage, lost on restart; sessions are tied to one live
//! socket so nothing here is worth persisting. Constructed explicitly and
//! injected into the dispatcher — no global.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{StreamId, StreamSession};

#[derive(Default)]
pub struct StreamRegistry {
    streams: RwLock<HashMap<StreamId, Arc<StreamSession>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Arc<StreamSession>) {
        self.streams
            .write()
            .await
            .insert(session.id.clone(), session);
    }

    pub async fn get(&self, id: &str) -> Option<Arc<StreamSession>> {
        self.streams.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<StreamSession>> {
        self.streams.write().await.remove(id)
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.streams.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.streams.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.streams.read().await.is_empty()
    }
}
