use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::warn;

use common::ProductId;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/products/:id/history", get(get_history))
}

/// Ordered (date, sales, price) triples for one product, shaped for the
/// external charting layer.
async fn get_history(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Value>, StatusCode> {
    let rule = state
        .store
        .rule_for_product(product_id)
        .await
        .map_err(|e| {
            warn!(product_id, error = %e, "history lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let history = state
        .store
        .result_history(rule.rule_id)
        .await
        .map_err(|e| {
            warn!(product_id, error = %e, "history lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let dates: Vec<String> = history.iter().map(|r| r.date.to_string()).collect();
    let sales: Vec<i64> = history.iter().map(|r| r.sales).collect();
    let prices: Vec<f64> = history.iter().map(|r| r.price).collect();

    Ok(Json(json!({
        "dates": dates,
        "sales": sales,
        "prices": prices,
    })))
}
