use chrono::NaiveDate;
use tracing::info;

use common::{Error, NewRule, PricingRule, ProductCatalog, ProductId, Result, RuleId, RuleSpec, RuleStore};

/// Activate a pricing rule for a product.
///
/// Validates the spec, snapshots the product's current price as the rule's
/// base price and seeds the cumulative-sales baseline from the catalog's
/// lifetime counter. A product can hold at most one active rule.
pub async fn activate_rule(
    store: &dyn RuleStore,
    catalog: &dyn ProductCatalog,
    product_id: ProductId,
    spec: &RuleSpec,
    today: NaiveDate,
) -> Result<PricingRule> {
    pricing::validate(spec)?;

    if store.rule_for_product(product_id).await?.is_some() {
        return Err(Error::InvalidRuleConfig(format!(
            "product {product_id} already has an active rule"
        )));
    }

    let base_price = catalog.current_price(product_id).await?;
    let initial_sales = catalog.cumulative_sales(product_id).await?;

    let rule = store
        .insert_rule(NewRule {
            product_id,
            base_price,
            start_date: today,
            min_price: spec.min_price,
            max_price: spec.max_price,
            change_amount: spec.change_amount,
            period_days: spec.period_days,
            last_cumulative_sales: initial_sales,
        })
        .await?;

    info!(
        product_id,
        rule_id = rule.rule_id,
        base_price,
        period_days = rule.period_days,
        "pricing rule activated"
    );
    Ok(rule)
}

/// Deactivate a rule: the rule and its entire result history are removed
/// together.
pub async fn deactivate_rule(store: &dyn RuleStore, rule_id: RuleId) -> Result<()> {
    store.delete_rule(rule_id).await?;
    info!(rule_id, "pricing rule deactivated, history cleared");
    Ok(())
}
