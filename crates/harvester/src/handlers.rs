//! Drives the pull side of the harvester (§4.G). A `PullHarvestLoop` owns one
//! advisory lock and the providers that share it: the generic OS audit
//! sources run under [`AdvisoryLockId::EventHarvest`], while the M365
//! content API gets its own [`AdvisoryLockId::M365Harvest`] since it has an
//! independent rate limit and failure mode and shouldn't back off the OS
//! providers when it's struggling.
//!
//! The whole cycle — cursor read, provider fetch, persist, scan-trigger
//! check, cursor advance — runs inside one transaction holding the advisory
//! lock, so a crash mid-cycle rolls back cleanly and the next instance to
//! acquire the lock repeats the same window rather than skipping it.

use crate::checkpoint::CheckpointRepository;
use crate::providers::PullProvider;
use crate::repository::EventRepository;
use crate::scan_trigger::ScanTriggerHook;
use openlabels_core::error::Result;
use openlabels_queue::advisory_lock::{try_advisory_lock, AdvisoryLockId};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

const DEFAULT_HARVEST_INTERVAL: Duration = Duration::from_secs(60);

pub struct PullHarvestLoop {
    pool: PgPool,
    lock_id: AdvisoryLockId,
    tenant_id: Uuid,
    providers: Vec<Arc<dyn PullProvider>>,
    scan_trigger: Option<Arc<ScanTriggerHook>>,
    harvest_interval: Duration,
}

impl PullHarvestLoop {
    pub fn new(pool: PgPool, lock_id: AdvisoryLockId, tenant_id: Uuid, providers: Vec<Arc<dyn PullProvider>>) -> Self {
        Self {
            pool,
            lock_id,
            tenant_id,
            providers,
            scan_trigger: None,
            harvest_interval: DEFAULT_HARVEST_INTERVAL,
        }
    }

    pub fn with_scan_trigger(mut self, hook: Arc<ScanTriggerHook>) -> Self {
        self.scan_trigger = Some(hook);
        self
    }

    pub fn with_harvest_interval(mut self, harvest_interval: Duration) -> Self {
        self.harvest_interval = harvest_interval;
        self
    }

    /// Runs one harvest cycle across every configured provider. Returns the
    /// total number of events persisted, or `0` without doing any work if
    /// another replica already holds the lock this cycle.
    pub async fn run_once(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        if !try_advisory_lock(&mut tx, self.lock_id).await? {
            return Ok(0);
        }

        let mut total = 0u64;
        for provider in &self.providers {
            let since = CheckpointRepository::load_cursor(&mut tx, self.tenant_id, provider.name()).await?;

            let events = match provider.harvest(since).await {
                Ok(events) => events,
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "pull provider harvest failed, will retry next cycle");
                    continue;
                }
            };
            if events.is_empty() {
                continue;
            }

            EventRepository::persist_batch_tx(&mut tx, self.tenant_id, &events).await?;

            if let Some(hook) = &self.scan_trigger {
                let triggered = hook.maybe_trigger(&mut tx, self.tenant_id, &events).await?;
                if triggered > 0 {
                    info!(provider = provider.name(), triggered, "scan-trigger hook enqueued rescans");
                }
            }

            let max_event_time = events
                .iter()
                .map(|e| e.event_time)
                .max()
                .expect("events is non-empty");
            CheckpointRepository::advance_cursor(&mut tx, self.tenant_id, provider.name(), max_event_time).await?;

            total += events.len() as u64;
        }

        tx.commit().await?;
        Ok(total)
    }

    /// Runs `run_once` on the configured interval until `shutdown` signals
    /// true.
    pub async fn run_forever(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.harvest_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(count) if count > 0 => info!(lock_id = ?self.lock_id, count, "harvest cycle persisted events"),
                        Ok(_) => {}
                        Err(err) => error!(lock_id = ?self.lock_id, error = %err, "harvest cycle failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
