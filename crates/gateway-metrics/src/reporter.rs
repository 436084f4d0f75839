//! `MetricsReporter`: per-service background publisher of health, latency,
//! and (optionally) datasource snapshots, on a fixed interval.
//!
//! Every downstream service embeds one of these (as does the gateway
//! itself, reporting under `identityService.name`/a configured gateway
//! name) so the dashboard's `services`/`database`/`latency` handlers have
//! something to read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use deadpool_redis::{redis::AsyncCommands, Pool};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::warn;

use gateway_types::metrics::{service_db_key, service_health_key, service_latency_key};

use crate::dto::{ServiceDbSnapshot, ServiceHealthSnapshot};

const REPORT_INTERVAL: Duration = Duration::from_secs(5);
const SNAPSHOT_TTL_SECS: i64 = 30;

/// Optional hook for a service to report its own datasource pool stats.
/// Implemented per-service; the gateway itself has no datasource and never
/// registers one.
pub trait DatasourceProbe: Send + Sync {
    fn snapshot(&self) -> ServiceDbSnapshot;
}

/// Tallies requests/errors for one service between reporter ticks. Cheap
/// atomics, updated inline on the request path (unlike `MetricsCollector`,
/// which is the gateway-only fire-and-forget writer).
#[derive(Default)]
pub struct RequestTally {
    requests: AtomicU64,
    errors: AtomicU64,
}

impl RequestTally {
    pub fn record(&self, is_error: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Publishes `dashboard:service:{name}:health` (and optionally `:db`) every
/// [`REPORT_INTERVAL`] until dropped/cancelled.
pub struct MetricsReporter {
    pool: Arc<Pool>,
    service_name: String,
    tally: Arc<RequestTally>,
    datasource: Option<Arc<dyn DatasourceProbe>>,
    started_at: Instant,
}

impl MetricsReporter {
    pub fn new(pool: Arc<Pool>, service_name: impl Into<String>, tally: Arc<RequestTally>) -> Self {
        Self {
            pool,
            service_name: service_name.into(),
            tally,
            datasource: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_datasource(mut self, probe: Arc<dyn DatasourceProbe>) -> Self {
        self.datasource = Some(probe);
        self
    }

    /// Spawn the background reporting loop. The returned `JoinHandle` is
    /// usually discarded; the task runs for the process lifetime.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REPORT_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(e) = self.report_once().await {
                    warn!(service = %self.service_name, error = %e, "metrics report tick failed");
                }
            }
        })
    }

    async fn report_once(&self) -> anyhow::Result<()> {
        let mut conn = self.pool.get().await?;

        let health = self.health_snapshot();
        let health_json = serde_json::to_string(&health)?;
        let _: () = conn
            .set_ex(service_health_key(&self.service_name), health_json, SNAPSHOT_TTL_SECS as u64)
            .await?;

        let latency_avg = 0.0_f64; // services without their own collector report no local latency signal.
        let _: () = conn
            .set_ex(
                service_latency_key(&self.service_name),
                latency_avg.to_string(),
                SNAPSHOT_TTL_SECS as u64,
            )
            .await?;

        if let Some(probe) = &self.datasource {
            let snapshot = probe.snapshot();
            let json = serde_json::to_string(&snapshot)?;
            let _: () = conn
                .set_ex(service_db_key(&self.service_name), json, SNAPSHOT_TTL_SECS as u64)
                .await?;
        }

        Ok(())
    }

    fn health_snapshot(&self) -> ServiceHealthSnapshot {
        let (cpu_percent, mem_percent) = self.process_utilization();
        ServiceHealthSnapshot {
            name: self.service_name.clone(),
            status: "healthy".to_string(),
            cpu_percent,
            mem_percent,
            uptime_secs: self.started_at.elapsed().as_secs(),
            requests: self.tally.requests.load(Ordering::Relaxed),
            errors: self.tally.errors.load(Ordering::Relaxed),
        }
    }

    fn process_utilization(&self) -> (f32, f32) {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        system.refresh_memory();
        let pid = Pid::from(std::process::id() as usize);

        let Some(process) = system.process(pid) else {
            return (0.0, 0.0);
        };

        let cpu_percent = process.cpu_usage() / num_cpus::get() as f32;
        let mem_percent = if system.total_memory() == 0 {
            0.0
        } else {
            (process.memory() as f32 / system.total_memory() as f32) * 100.0
        };
        (cpu_percent, mem_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_requests_and_errors_independently() {
        let tally = RequestTally::default();
        tally.record(false);
        tally.record(true);
        tally.record(false);
        assert_eq!(tally.requests.load(Ordering::Relaxed), 3);
        assert_eq!(tally.errors.load(Ordering::Relaxed), 1);
    }
}
