//! Deletion of idle sessions
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    Error,
    config::CleanupConfig,
    repositories::{SessionCache, SessionRepository, SessionRepositoryProvider},
};

/// Deletes sessions whose last activity is older than the retention window.
pub struct CleanupJob<R: SessionRepositoryProvider> {
    repositories: Arc<R>,
    config: CleanupConfig,
    cache: Option<SessionCache>,
}

impl<R: SessionRepositoryProvider> CleanupJob<R> {
    pub fn new(repositories: Arc<R>, config: CleanupConfig) -> Self {
        Self {
            repositories,
            config,
            cache: None,
        }
    }

    /// Clear this lookup cache after each deletion
    pub fn with_cache(mut self, cache: Option<SessionCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }

    /// Run once against the current time
    pub async fn run(&self) -> Result<u64, Error> {
        self.run_at(Utc::now()).await
    }

    /// Run once, deleting every session idle since before `now - retention`.
    ///
    /// A failed delete fails the run; nothing is retried.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let cutoff = now - self.config.retention_window()?;
        let count = self
            .repositories
            .session()
            .delete_inactive_since(cutoff)
            .await?;

        if count > 0 {
            if let Some(cache) = &self.cache {
                cache.clear();
            }
            tracing::info!(count, cutoff = %cutoff, "Deleted idle sessions");
        } else {
            tracing::debug!(cutoff = %cutoff, "No idle sessions to delete");
        }
        Ok(count)
    }

    /// Run on every tick of the configured interval until `shutdown` changes.
    pub fn spawn(self, mut shutdown: tokio::sync::watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(self.config.interval);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        if let Err(e) = self.run().await {
                            tracing::warn!(error = %e, "Session cleanup run failed");
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down session cleanup task");
                        break;
                    }
                }
            }
        })
    }
}
