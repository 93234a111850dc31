use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::info;

use common::{
    Error, NewRule, PricingRule, ProductCatalog, ProductId, Result, RuleId, RuleStore,
    SalesResult, SnapshotOutcome,
};

#[derive(Debug, Clone)]
struct ProductRecord {
    price: f64,
    sale_price: f64,
    lifetime_sales: i64,
}

#[derive(Default)]
struct Inner {
    products: HashMap<ProductId, ProductRecord>,
    rules: Vec<PricingRule>,
    results: Vec<SalesResult>,
    next_rule_id: RuleId,
}

/// In-memory rule store and product catalog for tests and simulations.
///
/// All state sits behind a single lock, so the multi-write operations
/// (`record_snapshot`, `delete_rule`) are naturally atomic.
pub struct MemStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                next_rule_id: 1,
                ..Inner::default()
            })),
        }
    }

    /// Seed a product with a price and a lifetime sales counter.
    pub async fn add_product(&self, product_id: ProductId, price: f64, lifetime_sales: i64) {
        self.inner.write().await.products.insert(
            product_id,
            ProductRecord {
                price,
                sale_price: price,
                lifetime_sales,
            },
        );
    }

    /// Advance a product's lifetime sales counter (simulated purchases).
    pub async fn add_sales(&self, product_id: ProductId, units: i64) {
        if let Some(product) = self.inner.write().await.products.get_mut(&product_id) {
            product.lifetime_sales += units;
        }
    }

    pub async fn remove_product(&self, product_id: ProductId) {
        self.inner.write().await.products.remove(&product_id);
    }

    /// The sale-price mirror, for asserting `set_current_price` semantics.
    pub async fn sale_price(&self, product_id: ProductId) -> Option<f64> {
        self.inner
            .read()
            .await
            .products
            .get(&product_id)
            .map(|p| p.sale_price)
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductCatalog for MemStore {
    async fn cumulative_sales(&self, product_id: ProductId) -> Result<i64> {
        self.inner
            .read()
            .await
            .products
            .get(&product_id)
            .map(|p| p.lifetime_sales)
            .ok_or_else(|| Error::missing(product_id, "no lifetime sales counter"))
    }

    async fn current_price(&self, product_id: ProductId) -> Result<f64> {
        self.inner
            .read()
            .await
            .products
            .get(&product_id)
            .map(|p| p.price)
            .ok_or_else(|| Error::missing(product_id, "no current price"))
    }

    async fn set_current_price(&self, product_id: ProductId, price: f64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let product = inner
            .products
            .get_mut(&product_id)
            .ok_or_else(|| Error::missing(product_id, "no current price"))?;
        product.price = price;
        product.sale_price = price;
        Ok(())
    }
}

#[async_trait]
impl RuleStore for MemStore {
    async fn active_rules(&self) -> Result<Vec<PricingRule>> {
        Ok(self.inner.read().await.rules.clone())
    }

    async fn rule_for_product(&self, product_id: ProductId) -> Result<Option<PricingRule>> {
        Ok(self
            .inner
            .read()
            .await
            .rules
            .iter()
            .find(|r| r.product_id == product_id)
            .cloned())
    }

    async fn insert_rule(&self, rule: NewRule) -> Result<PricingRule> {
        let mut inner = self.inner.write().await;
        if inner.rules.iter().any(|r| r.product_id == rule.product_id) {
            return Err(Error::InvalidRuleConfig(format!(
                "product {} already has an active rule",
                rule.product_id
            )));
        }
        let stored = PricingRule {
            rule_id: inner.next_rule_id,
            product_id: rule.product_id,
            base_price: rule.base_price,
            start_date: rule.start_date,
            min_price: rule.min_price,
            max_price: rule.max_price,
            change_amount: rule.change_amount,
            period_days: rule.period_days,
            last_cumulative_sales: rule.last_cumulative_sales,
        };
        inner.next_rule_id += 1;
        inner.rules.push(stored.clone());
        Ok(stored)
    }

    async fn delete_rule(&self, rule_id: RuleId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let before = inner.rules.len();
        inner.rules.retain(|r| r.rule_id != rule_id);
        if inner.rules.len() == before {
            return Err(Error::WriteFailure(format!("rule {rule_id} not found")));
        }
        inner.results.retain(|r| r.rule_id != rule_id);
        Ok(())
    }

    async fn append_result(
        &self,
        rule_id: RuleId,
        date: NaiveDate,
        price: f64,
        sales: i64,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        if inner
            .results
            .iter()
            .any(|r| r.rule_id == rule_id && r.date == date)
        {
            return Ok(false);
        }
        inner.results.push(SalesResult {
            rule_id,
            date,
            price,
            sales,
        });
        Ok(true)
    }

    async fn update_baseline(&self, rule_id: RuleId, new_cumulative: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let rule = inner
            .rules
            .iter_mut()
            .find(|r| r.rule_id == rule_id)
            .ok_or_else(|| Error::WriteFailure(format!("rule {rule_id} not found")))?;
        rule.last_cumulative_sales = new_cumulative;
        Ok(())
    }

    async fn record_snapshot(
        &self,
        rule_id: RuleId,
        date: NaiveDate,
        price: f64,
        sales: i64,
        new_cumulative: i64,
    ) -> Result<SnapshotOutcome> {
        // One lock scope: row insert and baseline advance land together.
        let mut inner = self.inner.write().await;
        if inner
            .results
            .iter()
            .any(|r| r.rule_id == rule_id && r.date == date)
        {
            return Ok(SnapshotOutcome::AlreadyRecorded);
        }
        let rule = inner
            .rules
            .iter_mut()
            .find(|r| r.rule_id == rule_id)
            .ok_or_else(|| Error::WriteFailure(format!("rule {rule_id} not found")))?;
        rule.last_cumulative_sales = new_cumulative;
        inner.results.push(SalesResult {
            rule_id,
            date,
            price,
            sales,
        });
        Ok(SnapshotOutcome::Recorded)
    }

    async fn result_history(&self, rule_id: RuleId) -> Result<Vec<SalesResult>> {
        let mut history: Vec<SalesResult> = self
            .inner
            .read()
            .await
            .results
            .iter()
            .filter(|r| r.rule_id == rule_id)
            .cloned()
            .collect();
        history.sort_by_key(|r| r.date);
        Ok(history)
    }

    async fn result_count(&self, rule_id: RuleId) -> Result<i64> {
        Ok(self
            .inner
            .read()
            .await
            .results
            .iter()
            .filter(|r| r.rule_id == rule_id)
            .count() as i64)
    }
}

/// Dry-run wrapper around a real catalog.
///
/// Reads pass through, except that a shadowed price wins once one has been
/// computed — a multi-day dry run keeps evolving from its own writes.
/// Writes are logged and kept in memory; the wrapped catalog is never
/// mutated.
pub struct ShadowCatalog {
    inner: Arc<dyn ProductCatalog>,
    shadow_prices: Arc<RwLock<HashMap<ProductId, f64>>>,
}

impl ShadowCatalog {
    pub fn new(inner: Arc<dyn ProductCatalog>) -> Self {
        Self {
            inner,
            shadow_prices: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Prices the engine would have written in a live run.
    pub async fn pending(&self) -> HashMap<ProductId, f64> {
        self.shadow_prices.read().await.clone()
    }
}

#[async_trait]
impl ProductCatalog for ShadowCatalog {
    async fn cumulative_sales(&self, product_id: ProductId) -> Result<i64> {
        self.inner.cumulative_sales(product_id).await
    }

    async fn current_price(&self, product_id: ProductId) -> Result<f64> {
        if let Some(price) = self.shadow_prices.read().await.get(&product_id) {
            return Ok(*price);
        }
        self.inner.current_price(product_id).await
    }

    async fn set_current_price(&self, product_id: ProductId, price: f64) -> Result<()> {
        info!(product_id, price, "dry run: price write shadowed");
        self.shadow_prices.write().await.insert(product_id, price);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn new_rule(product_id: ProductId) -> NewRule {
        NewRule {
            product_id,
            base_price: 30.0,
            start_date: day(1),
            min_price: 5.0,
            max_price: 70.0,
            change_amount: 5.0,
            period_days: 3,
            last_cumulative_sales: 100,
        }
    }

    #[tokio::test]
    async fn record_snapshot_is_keyed_by_rule_and_date() {
        let store = MemStore::new();
        let rule = store.insert_rule(new_rule(1)).await.unwrap();

        let first = store
            .record_snapshot(rule.rule_id, day(2), 30.0, 45, 145)
            .await
            .unwrap();
        assert_eq!(first, SnapshotOutcome::Recorded);

        let second = store
            .record_snapshot(rule.rule_id, day(2), 30.0, 10, 155)
            .await
            .unwrap();
        assert_eq!(second, SnapshotOutcome::AlreadyRecorded);

        // The duplicate must not advance the baseline either.
        let rules = store.active_rules().await.unwrap();
        assert_eq!(rules[0].last_cumulative_sales, 145);
        assert_eq!(store.result_count(rule.rule_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn baseline_update_round_trip() {
        let store = MemStore::new();
        let rule = store.insert_rule(new_rule(1)).await.unwrap();

        store.update_baseline(rule.rule_id, 177).await.unwrap();
        let rules = store.active_rules().await.unwrap();
        assert_eq!(rules[0].last_cumulative_sales, 177);

        assert!(matches!(
            store.update_baseline(999, 1).await,
            Err(Error::WriteFailure(_))
        ));
    }

    #[tokio::test]
    async fn history_comes_back_ordered_by_date() {
        let store = MemStore::new();
        let rule = store.insert_rule(new_rule(1)).await.unwrap();
        store.append_result(rule.rule_id, day(3), 30.0, 2).await.unwrap();
        store.append_result(rule.rule_id, day(1), 30.0, 1).await.unwrap();
        store.append_result(rule.rule_id, day(2), 30.0, 3).await.unwrap();

        let history = store.result_history(rule.rule_id).await.unwrap();
        let dates: Vec<NaiveDate> = history.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(3)]);
    }

    #[tokio::test]
    async fn set_price_mirrors_sale_price() {
        let store = MemStore::new();
        store.add_product(1, 30.0, 0).await;
        store.set_current_price(1, 27.5).await.unwrap();
        assert_eq!(store.current_price(1).await.unwrap(), 27.5);
        assert_eq!(store.sale_price(1).await, Some(27.5));
    }

    #[tokio::test]
    async fn shadow_catalog_never_touches_the_wrapped_catalog() {
        let real = Arc::new(MemStore::new());
        real.add_product(1, 30.0, 0).await;

        let shadow = ShadowCatalog::new(real.clone());
        shadow.set_current_price(1, 35.0).await.unwrap();

        assert_eq!(real.current_price(1).await.unwrap(), 30.0);
        assert_eq!(shadow.current_price(1).await.unwrap(), 35.0);
        assert_eq!(shadow.pending().await.get(&1), Some(&35.0));
    }

    #[tokio::test]
    async fn shadow_catalog_passes_reads_through_until_written() {
        let real = Arc::new(MemStore::new());
        real.add_product(1, 30.0, 12).await;

        let shadow = ShadowCatalog::new(real.clone());
        assert_eq!(shadow.current_price(1).await.unwrap(), 30.0);
        assert_eq!(shadow.cumulative_sales(1).await.unwrap(), 12);
    }
}
