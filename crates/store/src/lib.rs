use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::debug;

use common::{
    Error, NewRule, PricingRule, ProductCatalog, ProductId, Result, RuleId, RuleStore,
    SalesResult, SnapshotOutcome,
};

/// SQLite-backed rule store and product catalog.
///
/// Every statement binds its parameters; nothing is ever interpolated into
/// the SQL text.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create or refresh a product row. The catalog is an external system
    /// in a real deployment; this keeps local setups and tests honest.
    pub async fn upsert_product(
        &self,
        product_id: ProductId,
        name: &str,
        price: f64,
        lifetime_sales: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (product_id, name, price, sale_price, lifetime_sales)
             VALUES (?1, ?2, ?3, ?3, ?4)
             ON CONFLICT(product_id) DO UPDATE SET
                 name = excluded.name,
                 price = excluded.price,
                 sale_price = excluded.sale_price,
                 lifetime_sales = excluded.lifetime_sales",
        )
        .bind(product_id)
        .bind(name)
        .bind(price)
        .bind(lifetime_sales)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::WriteFailure(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for SqliteStore {
    async fn cumulative_sales(&self, product_id: ProductId) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT lifetime_sales FROM products WHERE product_id = ?1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::missing(product_id, "no lifetime sales counter"))
    }

    async fn current_price(&self, product_id: ProductId) -> Result<f64> {
        sqlx::query_scalar::<_, f64>("SELECT price FROM products WHERE product_id = ?1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::missing(product_id, "no current price"))
    }

    async fn set_current_price(&self, product_id: ProductId, price: f64) -> Result<()> {
        let updated =
            sqlx::query("UPDATE products SET price = ?1, sale_price = ?1 WHERE product_id = ?2")
                .bind(price)
                .bind(product_id)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::WriteFailure(e.to_string()))?
                .rows_affected();
        if updated == 0 {
            return Err(Error::missing(product_id, "no product row to price"));
        }
        Ok(())
    }
}

const RULE_COLUMNS: &str = "rule_id, product_id, base_price, start_date, min_price, max_price, \
                            change_amount, period_days, last_cumulative_sales";

#[async_trait]
impl RuleStore for SqliteStore {
    async fn active_rules(&self) -> Result<Vec<PricingRule>> {
        let rules = sqlx::query_as::<_, PricingRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM pricing_rules ORDER BY rule_id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rules)
    }

    async fn rule_for_product(&self, product_id: ProductId) -> Result<Option<PricingRule>> {
        let rule = sqlx::query_as::<_, PricingRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM pricing_rules WHERE product_id = ?1"
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rule)
    }

    async fn insert_rule(&self, rule: NewRule) -> Result<PricingRule> {
        let result = sqlx::query(
            "INSERT INTO pricing_rules
                 (product_id, base_price, start_date, min_price, max_price,
                  change_amount, period_days, last_cumulative_sales)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(rule.product_id)
        .bind(rule.base_price)
        .bind(rule.start_date)
        .bind(rule.min_price)
        .bind(rule.max_price)
        .bind(rule.change_amount)
        .bind(rule.period_days)
        .bind(rule.last_cumulative_sales)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(e) if e.as_database_error().is_some_and(|d| d.is_unique_violation()) => {
                return Err(Error::InvalidRuleConfig(format!(
                    "product {} already has an active rule",
                    rule.product_id
                )));
            }
            Err(e) => return Err(Error::WriteFailure(e.to_string())),
        };

        Ok(PricingRule {
            rule_id: result.last_insert_rowid(),
            product_id: rule.product_id,
            base_price: rule.base_price,
            start_date: rule.start_date,
            min_price: rule.min_price,
            max_price: rule.max_price,
            change_amount: rule.change_amount,
            period_days: rule.period_days,
            last_cumulative_sales: rule.last_cumulative_sales,
        })
    }

    async fn delete_rule(&self, rule_id: RuleId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM sales_results WHERE rule_id = ?1")
            .bind(rule_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::WriteFailure(e.to_string()))?;
        let deleted = sqlx::query("DELETE FROM pricing_rules WHERE rule_id = ?1")
            .bind(rule_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::WriteFailure(e.to_string()))?
            .rows_affected();
        if deleted == 0 {
            return Err(Error::WriteFailure(format!("rule {rule_id} not found")));
        }
        tx.commit()
            .await
            .map_err(|e| Error::WriteFailure(e.to_string()))?;
        Ok(())
    }

    async fn append_result(
        &self,
        rule_id: RuleId,
        date: NaiveDate,
        price: f64,
        sales: i64,
    ) -> Result<bool> {
        let inserted = sqlx::query(
            "INSERT INTO sales_results (rule_id, date, price, sales)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(rule_id, date) DO NOTHING",
        )
        .bind(rule_id)
        .bind(date)
        .bind(price)
        .bind(sales)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::WriteFailure(e.to_string()))?
        .rows_affected();
        Ok(inserted == 1)
    }

    async fn update_baseline(&self, rule_id: RuleId, new_cumulative: i64) -> Result<()> {
        let updated =
            sqlx::query("UPDATE pricing_rules SET last_cumulative_sales = ?1 WHERE rule_id = ?2")
                .bind(new_cumulative)
                .bind(rule_id)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::WriteFailure(e.to_string()))?
                .rows_affected();
        if updated == 0 {
            return Err(Error::WriteFailure(format!("rule {rule_id} not found")));
        }
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
        // Row insert and baseline advance commit together or not at all; a
        // duplicate date leaves the baseline untouched.
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO sales_results (rule_id, date, price, sales)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(rule_id, date) DO NOTHING",
        )
        .bind(rule_id)
        .bind(date)
        .bind(price)
        .bind(sales)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::WriteFailure(e.to_string()))?
        .rows_affected();

        if inserted == 0 {
            return Ok(SnapshotOutcome::AlreadyRecorded);
        }

        let updated =
            sqlx::query("UPDATE pricing_rules SET last_cumulative_sales = ?1 WHERE rule_id = ?2")
                .bind(new_cumulative)
                .bind(rule_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::WriteFailure(e.to_string()))?
                .rows_affected();
        if updated == 0 {
            return Err(Error::WriteFailure(format!("rule {rule_id} not found")));
        }

        tx.commit()
            .await
            .map_err(|e| Error::WriteFailure(e.to_string()))?;
        debug!(rule_id, %date, sales, "snapshot recorded");
        Ok(SnapshotOutcome::Recorded)
    }

    async fn result_history(&self, rule_id: RuleId) -> Result<Vec<SalesResult>> {
        let history = sqlx::query_as::<_, SalesResult>(
            "SELECT rule_id, date, price, sales FROM sales_results
             WHERE rule_id = ?1 ORDER BY date ASC",
        )
        .bind(rule_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(history)
    }

    async fn result_count(&self, rule_id: RuleId) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sales_results WHERE rule_id = ?1")
                .bind(rule_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
