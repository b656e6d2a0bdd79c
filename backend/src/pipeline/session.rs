use chrono::{DateTime, Duration, Utc};
use log::info;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

use super::classification::{ClassificationPipeline, PipelineComponents};
use crate::model::ModelProvider;

struct SessionEntry {
    pipeline: Arc<ClassificationPipeline>,
    last_access: DateTime<Utc>,
}

/// Per-session pipelines, all sharing one model and enrichment client.
#[derive(Clone)]
pub struct SessionRegistry {
    components: PipelineComponents,
    idle_timeout: Duration,
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new(components: PipelineComponents, idle_timeout: Duration) -> Self {
        Self {
            components,
            idle_timeout,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn model(&self) -> &Arc<ModelProvider> {
        &self.components.model
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.components.max_upload_bytes
    }

    pub fn create(&self) -> (Uuid, Arc<ClassificationPipeline>) {
        let now = Utc::now();
        self.evict_idle(now);

        let id = Uuid::new_v4();
        let pipeline = Arc::new(ClassificationPipeline::new(self.components.clone()));
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                SessionEntry {
                    pipeline: Arc::clone(&pipeline),
                    last_access: now,
                },
            );
        info!("Created session {}", id);
        (id, pipeline)
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<ClassificationPipeline>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.get_mut(&id).map(|entry| {
            entry.last_access = Utc::now();
            Arc::clone(&entry.pipeline)
        })
    }

    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            info!("Removed session {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops sessions idle for longer than the timeout. Sessions with a
    /// prediction in flight are kept.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, entry| {
            now - entry.last_access <= self.idle_timeout || entry.pipeline.state().is_loading()
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    #[cfg(test)]
    fn backdate(&self, id: Uuid, by: Duration) {
        let mut sessions = self.sessions.write().unwrap();
        if let Some(entry) = sessions.get_mut(&id) {
            entry.last_access -= by;
        }
    }
}
