use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use common::{
    Error, JobKind, PricingRule, ProductCatalog, Result, RuleStore, RunReport, SnapshotOutcome,
};

/// Daily sales-snapshot job: diffs every eligible rule's lifetime sales
/// counter against its recorded baseline and appends the period's sales to
/// the result history.
///
/// Rules are processed independently; one failing rule never blocks the
/// rest of the batch.
pub struct SnapshotJob {
    store: Arc<dyn RuleStore>,
    catalog: Arc<dyn ProductCatalog>,
}

impl SnapshotJob {
    pub fn new(store: Arc<dyn RuleStore>, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Run one batch for `today`. Fails only when the rule listing itself
    /// cannot be loaded.
    pub async fn run(&self, today: NaiveDate) -> Result<RunReport> {
        let rules = self.store.active_rules().await?;
        let mut report = RunReport::new(JobKind::Snapshot, today);

        for rule in &rules {
            match self.snapshot_rule(rule, today).await {
                Ok(SnapshotOutcome::Recorded) => report.processed += 1,
                Ok(SnapshotOutcome::AlreadyRecorded) => {
                    info!(
                        product_id = rule.product_id,
                        %today,
                        "snapshot already recorded for this date"
                    );
                    report.skipped += 1;
                }
                Err(Error::InsufficientHistory) => report.skipped += 1,
                Err(e) => {
                    warn!(product_id = rule.product_id, error = %e, "snapshot failed for rule");
                    report.record_failure(rule.product_id, e);
                }
            }
        }

        info!(%report, "snapshot batch finished");
        Ok(report)
    }

    /// One rule's snapshot — the atomic unit of work. Gated on the rule
    /// having collected `period_days * 2` result rows, one period ahead of
    /// the recalculation gate.
    async fn snapshot_rule(
        &self,
        rule: &PricingRule,
        today: NaiveDate,
    ) -> Result<SnapshotOutcome> {
        let existing = self.store.result_count(rule.rule_id).await?;
        if i64::from(rule.period_days) * 2 > existing {
            return Err(Error::InsufficientHistory);
        }

        let cumulative = self.catalog.cumulative_sales(rule.product_id).await?;
        let price = self.catalog.current_price(rule.product_id).await?;

        // A counter that moved backwards (refunds) still advances the
        // baseline, but recorded sales never go negative.
        let period_sales = (cumulative - rule.last_cumulative_sales).max(0);

        self.store
            .record_snapshot(rule.rule_id, today, price, period_sales, cumulative)
            .await
    }
}
