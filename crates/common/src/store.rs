use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{NewRule, PricingRule, ProductId, Result, RuleId, SalesResult, SnapshotOutcome};

/// Abstraction over the product catalog that owns prices and lifetime
/// sales counters.
///
/// `SqliteStore` implements this against the local database.
/// `ShadowCatalog` wraps another catalog for dry runs.
///
/// Both jobs receive a `dyn ProductCatalog` — nothing in the engine reaches
/// for a concrete backend.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Lifetime units-sold counter for a product.
    async fn cumulative_sales(&self, product_id: ProductId) -> Result<i64>;

    /// Current selling price of a product.
    async fn current_price(&self, product_id: ProductId) -> Result<f64>;

    /// Write a new price back. Implementations mirror the value to the
    /// sale-price field as well.
    async fn set_current_price(&self, product_id: ProductId, price: f64) -> Result<()>;
}

/// Storage for pricing rules and their sales-result history.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All currently active rules.
    async fn active_rules(&self) -> Result<Vec<PricingRule>>;

    /// The active rule for a product, if any.
    async fn rule_for_product(&self, product_id: ProductId) -> Result<Option<PricingRule>>;

    /// Insert a freshly activated rule. Fails when the product already has
    /// one — a product carries at most one active rule.
    async fn insert_rule(&self, rule: NewRule) -> Result<PricingRule>;

    /// Deactivate a rule: delete it together with all of its result rows,
    /// as one unit.
    async fn delete_rule(&self, rule_id: RuleId) -> Result<()>;

    /// Append one result row. Returns `false` when a row for this
    /// `(rule_id, date)` already exists, in which case nothing is written.
    async fn append_result(
        &self,
        rule_id: RuleId,
        date: NaiveDate,
        price: f64,
        sales: i64,
    ) -> Result<bool>;

    /// Overwrite the rule's cumulative-sales baseline.
    async fn update_baseline(&self, rule_id: RuleId, new_cumulative: i64) -> Result<()>;

    /// Atomic daily snapshot: append the result row and advance the
    /// baseline together, or do neither. A duplicate date leaves the
    /// baseline untouched — that is what makes a same-day retry safe.
    async fn record_snapshot(
        &self,
        rule_id: RuleId,
        date: NaiveDate,
        price: f64,
        sales: i64,
        new_cumulative: i64,
    ) -> Result<SnapshotOutcome>;

    /// Full result history for a rule, ordered by date ascending.
    async fn result_history(&self, rule_id: RuleId) -> Result<Vec<SalesResult>>;

    /// Number of result rows recorded for a rule.
    async fn result_count(&self, rule_id: RuleId) -> Result<i64>;
}
