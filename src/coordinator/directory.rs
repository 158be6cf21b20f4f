//! Lookup table that hands out exactly one [`Coordinator`] per interview id.

use super::{Adapters, Coordinator, CoordinatorSettings};
use crate::store::{InterviewStore, StoreError};

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct CoordinatorDirectory {
    store: InterviewStore,
    adapters: Adapters,
    settings: CoordinatorSettings,
    coordinators: RwLock<HashMap<String, Arc<Coordinator>>>,
    shutdown: CancellationToken,
}

impl CoordinatorDirectory {
    pub fn new(store: InterviewStore, adapters: Adapters, settings: CoordinatorSettings) -> Self {
        Self {
            store,
            adapters,
            settings,
            coordinators: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// The coordinator for `interview_id`, starting it on first use.
    ///
    /// Startup runs outside the table lock. When two callers race, both may
    /// start one but only the first insert is kept and handed out.
    pub async fn get_or_create(&self, interview_id: &str) -> Result<Arc<Coordinator>, StoreError> {
        if let Some(existing) = self.get(interview_id).await {
            return Ok(existing);
        }

        let started = Arc::new(
            Coordinator::start(
                interview_id,
                self.store.clone(),
                self.adapters.clone(),
                self.settings.clone(),
            )
            .await?,
        );

        let mut coordinators = self.coordinators.write().await;
        match coordinators.entry(interview_id.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&started));
                info!(
                    interview_id,
                    coordinators = coordinators.len(),
                    "Coordinator registered"
                );
                Ok(started)
            }
        }
    }

    /// Drop the coordinator for `interview_id` once nothing outside the table
    /// holds it. Sockets and in-flight pipelines keep their own handle, so a
    /// coordinator is only removed when it has no connections and no work.
    pub async fn release(&self, interview_id: &str) -> bool {
        let mut coordinators = self.coordinators.write().await;
        match coordinators.get(interview_id) {
            Some(coordinator) if Arc::strong_count(coordinator) == 1 => {
                coordinators.remove(interview_id);
                debug!(
                    interview_id,
                    coordinators = coordinators.len(),
                    "Idle coordinator released"
                );
                true
            }
            _ => false,
        }
    }

    /// The coordinator for `interview_id` if one is already running.
    pub async fn get(&self, interview_id: &str) -> Option<Arc<Coordinator>> {
        self.coordinators.read().await.get(interview_id).cloned()
    }

    /// Token for one pipeline run; cancelled when the service shuts down.
    pub fn pipeline_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Cancel every in-flight pipeline.
    pub fn shutdown(&self) {
        info!("Cancelling in-flight interview pipelines");
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub async fn coordinator_count(&self) -> usize {
        self.coordinators.read().await.len()
    }

    /// Live connections across every coordinator.
    pub async fn connection_count(&self) -> usize {
        self.coordinators
            .read()
            .await
            .values()
            .map(|coordinator| coordinator.connection_count())
            .sum()
    }
}
