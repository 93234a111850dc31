use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info};

use common::{Error, JobKind, Result, RunReport};

use crate::{RecalcJob, SnapshotJob};

/// Owns both daily jobs and serializes runs per job kind: two overlapping
/// runs of the same job (a manual trigger racing the scheduled tick)
/// cannot double-apply snapshots or price changes.
pub struct JobRunner {
    snapshot: SnapshotJob,
    recalc: RecalcJob,
    snapshot_lock: Mutex<()>,
    recalc_lock: Mutex<()>,
}

impl JobRunner {
    pub fn new(snapshot: SnapshotJob, recalc: RecalcJob) -> Self {
        Self {
            snapshot,
            recalc,
            snapshot_lock: Mutex::new(()),
            recalc_lock: Mutex::new(()),
        }
    }

    /// Run the snapshot batch unless one is already in flight.
    pub async fn run_snapshot(&self, today: NaiveDate) -> Result<RunReport> {
        let _guard = self
            .snapshot_lock
            .try_lock()
            .map_err(|_| Error::JobAlreadyRunning(JobKind::Snapshot))?;
        self.snapshot.run(today).await
    }

    /// Run the recalculation batch unless one is already in flight.
    pub async fn run_recalculation(&self, today: NaiveDate) -> Result<RunReport> {
        let _guard = self
            .recalc_lock
            .try_lock()
            .map_err(|_| Error::JobAlreadyRunning(JobKind::Recalculation))?;
        self.recalc.run(today).await
    }

    /// Snapshot first, then recalculation — the recalculation reads the
    /// rows the snapshot just wrote.
    pub async fn run_once(&self, today: NaiveDate) -> (Result<RunReport>, Result<RunReport>) {
        let snapshot = self.run_snapshot(today).await;
        let recalc = self.run_recalculation(today).await;
        (snapshot, recalc)
    }

    /// Daily loop: sleep until the next UTC midnight, run both jobs,
    /// repeat. Call from `tokio::spawn`.
    pub async fn run_daily(self: Arc<Self>) {
        loop {
            let now = Utc::now();
            let next = next_midnight(now);
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next_run = %next, "scheduler sleeping until next daily run");
            tokio::time::sleep(wait).await;

            let today = Utc::now().date_naive();
            if let Err(e) = self.run_snapshot(today).await {
                error!(error = %e, "snapshot run failed");
            }
            if let Err(e) = self.run_recalculation(today).await {
                error!(error = %e, "recalculation run failed");
            }
        }
    }
}

fn next_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    (now.date_naive() + Duration::days(1))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use memstore::MemStore;

    use common::{NewRule, PricingRule, ProductId, RuleId, RuleStore, SalesResult, SnapshotOutcome};

    #[test]
    fn next_midnight_is_tomorrow_at_zero_hours() {
        let now = Utc::now();
        let next = next_midnight(now);
        assert!(next > now);
        assert!(next - now <= Duration::days(1));
        assert_eq!(next.time(), NaiveTime::MIN);
    }

    /// Store wrapper that stalls the rule listing so a second trigger can
    /// race the first.
    struct SlowStore(Arc<MemStore>);

    #[async_trait]
    impl RuleStore for SlowStore {
        async fn active_rules(&self) -> common::Result<Vec<PricingRule>> {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            self.0.active_rules().await
        }
        async fn rule_for_product(
            &self,
            product_id: ProductId,
        ) -> common::Result<Option<PricingRule>> {
            self.0.rule_for_product(product_id).await
        }
        async fn insert_rule(&self, rule: NewRule) -> common::Result<PricingRule> {
            self.0.insert_rule(rule).await
        }
        async fn delete_rule(&self, rule_id: RuleId) -> common::Result<()> {
            self.0.delete_rule(rule_id).await
        }
        async fn append_result(
            &self,
            rule_id: RuleId,
            date: NaiveDate,
            price: f64,
            sales: i64,
        ) -> common::Result<bool> {
            self.0.append_result(rule_id, date, price, sales).await
        }
        async fn update_baseline(&self, rule_id: RuleId, new_cumulative: i64) -> common::Result<()> {
            self.0.update_baseline(rule_id, new_cumulative).await
        }
        async fn record_snapshot(
            &self,
            rule_id: RuleId,
            date: NaiveDate,
            price: f64,
            sales: i64,
            new_cumulative: i64,
        ) -> common::Result<SnapshotOutcome> {
            self.0
                .record_snapshot(rule_id, date, price, sales, new_cumulative)
                .await
        }
        async fn result_history(&self, rule_id: RuleId) -> common::Result<Vec<SalesResult>> {
            self.0.result_history(rule_id).await
        }
        async fn result_count(&self, rule_id: RuleId) -> common::Result<i64> {
            self.0.result_count(rule_id).await
        }
    }

    #[tokio::test]
    async fn overlapping_snapshot_runs_are_rejected() {
        let mem = Arc::new(MemStore::new());
        let slow: Arc<dyn RuleStore> = Arc::new(SlowStore(mem.clone()));

        let runner = Arc::new(JobRunner::new(
            SnapshotJob::new(slow.clone(), mem.clone()),
            RecalcJob::new(slow, mem.clone()),
        ));

        let today = Utc::now().date_naive();
        let first = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run_snapshot(today).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let second = runner.run_snapshot(today).await;
        assert!(matches!(
            second,
            Err(Error::JobAlreadyRunning(JobKind::Snapshot))
        ));

        let first = first.await.unwrap();
        assert!(first.is_ok(), "the in-flight run must complete normally");
    }
}
