use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::{info, warn};

use common::{Error, JobKind, PricingRule, ProductCatalog, Result, RuleStore, RunReport};

/// Daily price-recalculation job: estimates the sales trend over two
/// adjacent windows and steps each eligible product's price within its
/// rule's bounds.
///
/// Runs after the snapshot job; a rule needs three full periods of result
/// rows before it qualifies.
pub struct RecalcJob {
    store: Arc<dyn RuleStore>,
    catalog: Arc<dyn ProductCatalog>,
}

impl RecalcJob {
    pub fn new(store: Arc<dyn RuleStore>, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Run one batch for `today`. Fails only when the rule listing itself
    /// cannot be loaded.
    pub async fn run(&self, today: NaiveDate) -> Result<RunReport> {
        let rules = self.store.active_rules().await?;
        let mut report = RunReport::new(JobKind::Recalculation, today);

        for rule in &rules {
            match self.recalc_rule(rule, today).await {
                Ok(_) => report.processed += 1,
                Err(Error::InsufficientHistory) => report.skipped += 1,
                Err(e) => {
                    warn!(product_id = rule.product_id, error = %e, "recalculation failed for rule");
                    report.record_failure(rule.product_id, e);
                }
            }
        }

        info!(%report, "recalculation batch finished");
        Ok(report)
    }

    /// Recalculate one rule's price and write it back. The trend estimate
    /// anchored one period back is compared against the one anchored today.
    async fn recalc_rule(&self, rule: &PricingRule, today: NaiveDate) -> Result<f64> {
        let count = self.store.result_count(rule.rule_id).await?;
        if i64::from(rule.period_days) * 3 > count {
            return Err(Error::InsufficientHistory);
        }

        let history = self.store.result_history(rule.rule_id).await?;
        let period = Duration::days(i64::from(rule.period_days));

        let trend_prev = trend::estimate_trend(&history, today - period, rule.period_days, today)?;
        let trend_curr = trend::estimate_trend(&history, today, rule.period_days, today)?;

        let current = self.catalog.current_price(rule.product_id).await?;
        let new_price = pricing::next_price(
            current,
            rule.change_amount,
            rule.min_price,
            rule.max_price,
            trend_prev,
            trend_curr,
        );

        self.catalog
            .set_current_price(rule.product_id, new_price)
            .await?;
        info!(
            product_id = rule.product_id,
            old = current,
            new = new_price,
            trend_prev,
            trend_curr,
            "price recalculated"
        );
        Ok(new_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstore::MemStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    /// Seed a rule with one result row per day ending today (the state
    /// right after a snapshot run), with sales from `sales_for(days_back)`.
    async fn seeded_rule(
        store: &Arc<MemStore>,
        product_id: i64,
        period_days: u32,
        history_days: u32,
        today: NaiveDate,
        sales_for: impl Fn(u32) -> i64,
    ) -> PricingRule {
        let rule = store
            .insert_rule(common::NewRule {
                product_id,
                base_price: 30.0,
                start_date: today - Duration::days(60),
                min_price: 5.0,
                max_price: 70.0,
                change_amount: 5.0,
                period_days,
                last_cumulative_sales: 0,
            })
            .await
            .unwrap();
        for back in (0..history_days).rev() {
            store
                .append_result(
                    rule.rule_id,
                    today - Duration::days(i64::from(back)),
                    30.0,
                    sales_for(back),
                )
                .await
                .unwrap();
        }
        rule
    }

    #[tokio::test]
    async fn rising_sales_step_the_price_up() {
        let store = Arc::new(MemStore::new());
        store.add_product(1, 30.0, 0).await;
        let today = day(20);
        // 9 rows, period 3: eligible. Sales grow towards today.
        seeded_rule(&store, 1, 3, 9, today, |back| 20 - i64::from(back)).await;

        let job = RecalcJob::new(store.clone(), store.clone());
        let report = job.run(today).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(store.current_price(1).await.unwrap(), 35.0);
        assert_eq!(store.sale_price(1).await, Some(35.0));
    }

    #[tokio::test]
    async fn falling_sales_step_the_price_down() {
        let store = Arc::new(MemStore::new());
        store.add_product(1, 30.0, 0).await;
        let today = day(20);
        seeded_rule(&store, 1, 3, 9, today, |back| 10 + i64::from(back)).await;

        let job = RecalcJob::new(store.clone(), store.clone());
        let report = job.run(today).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(store.current_price(1).await.unwrap(), 25.0);
    }

    #[tokio::test]
    async fn falling_sales_near_min_clamp_to_min() {
        let store = Arc::new(MemStore::new());
        store.add_product(1, 8.0, 0).await;
        let today = day(20);
        seeded_rule(&store, 1, 3, 9, today, |back| 10 + i64::from(back)).await;

        let job = RecalcJob::new(store.clone(), store.clone());
        job.run(today).await.unwrap();
        // Raw decrease would be 3, below min 5.
        assert_eq!(store.current_price(1).await.unwrap(), 5.0);
    }

    #[tokio::test]
    async fn flat_sales_count_as_non_decreasing() {
        let store = Arc::new(MemStore::new());
        store.add_product(1, 30.0, 0).await;
        let today = day(20);
        seeded_rule(&store, 1, 3, 9, today, |_| 7).await;

        let job = RecalcJob::new(store.clone(), store.clone());
        job.run(today).await.unwrap();
        assert_eq!(store.current_price(1).await.unwrap(), 35.0);
    }

    #[tokio::test]
    async fn eight_rows_with_period_three_are_not_eligible() {
        let store = Arc::new(MemStore::new());
        store.add_product(1, 30.0, 0).await;
        let today = day(20);
        seeded_rule(&store, 1, 3, 8, today, |back| 20 - i64::from(back)).await;

        let job = RecalcJob::new(store.clone(), store.clone());
        let report = job.run(today).await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.current_price(1).await.unwrap(), 30.0, "price untouched");
    }

    #[tokio::test]
    async fn missing_price_fails_one_rule_not_the_batch() {
        let store = Arc::new(MemStore::new());
        store.add_product(1, 30.0, 0).await;
        store.add_product(2, 30.0, 0).await;
        let today = day(20);
        seeded_rule(&store, 1, 3, 9, today, |back| 20 - i64::from(back)).await;
        seeded_rule(&store, 2, 3, 9, today, |back| 20 - i64::from(back)).await;
        store.remove_product(2).await;

        let job = RecalcJob::new(store.clone(), store.clone());
        let report = job.run(today).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].product_id, 2);
        assert_eq!(store.current_price(1).await.unwrap(), 35.0);
    }
}
