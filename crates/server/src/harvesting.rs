//! Wires the event harvester's pull and stream providers into running loops
//! (§4.G). The harvester has no per-tenant fan-out of its own: one process
//! instance harvests `harvester.tenant_id`'s watched paths and mailbox/
//! SharePoint audit feed, the same way `harvester::handlers::PullHarvestLoop`
//! is constructed with one fixed tenant.

use openlabels_core::config::HarvesterConfig;
use openlabels_core::jobs::JobQueue;
#[allow(unused_imports)]
use openlabels_harvester::providers::{AuditdProvider, FanotifyProvider, M365AuditProvider, WindowsSaclProvider};
use openlabels_harvester::providers::{PullProvider, StreamProvider};
use openlabels_harvester::{EventRepository, PullHarvestLoop, ScanTriggerHook, StreamManager};
use openlabels_queue::AdvisoryLockId;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

/// Spawns every configured harvester loop into `tasks` so the caller can
/// join or abort them on shutdown alongside every other background loop. A
/// no-op (nothing added to `tasks`) means the harvester did nothing this
/// run (disabled, or no `tenant_id` configured to attribute events to).
pub fn spawn(pool: PgPool, config: &HarvesterConfig, queue: Arc<dyn JobQueue>, shutdown: watch::Receiver<bool>, tasks: &mut JoinSet<()>) {
    if !config.enabled {
        return;
    }

    let Some(tenant_id) = config.tenant_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()) else {
        warn!("harvester.enabled is true but harvester.tenant_id is missing or invalid, skipping harvester startup");
        return;
    };

    let mut os_providers: Vec<Arc<dyn PullProvider>> = Vec::new();
    #[cfg(target_os = "linux")]
    os_providers.push(Arc::new(AuditdProvider::new(config.watched_paths.clone())));
    #[cfg(target_os = "windows")]
    os_providers.push(Arc::new(WindowsSaclProvider::new(config.watched_paths.clone())));

    let scan_trigger = if config.scan_trigger_enabled {
        Some(Arc::new(ScanTriggerHook::new(Arc::clone(&queue))))
    } else {
        None
    };

    if !os_providers.is_empty() {
        let mut loop_ = PullHarvestLoop::new(pool.clone(), AdvisoryLockId::EventHarvest, tenant_id, os_providers)
            .with_harvest_interval(Duration::from_secs(config.harvest_interval_seconds));
        if let Some(hook) = &scan_trigger {
            loop_ = loop_.with_scan_trigger(Arc::clone(hook));
        }
        let shutdown_rx = shutdown.clone();
        tasks.spawn(async move {
            info!("OS audit harvest loop starting");
            loop_.run_forever(shutdown_rx).await;
        });
    }

    if let (Some(m365_tenant), Some(client_id), Some(client_secret)) =
        (&config.m365_tenant_id, &config.m365_client_id, &config.m365_client_secret)
    {
        let m365_provider: Vec<Arc<dyn PullProvider>> =
            vec![Arc::new(M365AuditProvider::new(m365_tenant.clone(), client_id.clone(), client_secret.clone()))];
        let mut loop_ = PullHarvestLoop::new(pool.clone(), AdvisoryLockId::M365Harvest, tenant_id, m365_provider)
            .with_harvest_interval(Duration::from_secs(config.harvest_interval_seconds));
        if let Some(hook) = &scan_trigger {
            loop_ = loop_.with_scan_trigger(Arc::clone(hook));
        }
        let shutdown_rx = shutdown.clone();
        tasks.spawn(async move {
            info!("M365 audit harvest loop starting");
            loop_.run_forever(shutdown_rx).await;
        });
    }

    if let Some(fanotify) = FanotifyProvider::new() {
        let stream_providers: Vec<Arc<dyn StreamProvider>> = vec![Arc::new(fanotify)];
        let repo = Arc::new(EventRepository::new(pool.clone()));
        let manager = StreamManager::new(
            tenant_id,
            stream_providers,
            repo,
            config.max_buffer_size,
            config.batch_size,
            Duration::from_secs(config.flush_interval_seconds),
            Duration::from_secs(config.poll_interval_seconds),
        );
        let shutdown_rx = shutdown.clone();
        tasks.spawn(async move {
            info!("fanotify stream harvest loop starting");
            manager.run(shutdown_rx).await;
        });
    }
}
