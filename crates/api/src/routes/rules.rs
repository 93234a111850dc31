use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use common::{Error, ProductId, RuleSpec};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/products/:id/rule", post(activate).delete(deactivate))
}

async fn activate(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Json(spec): Json<RuleSpec>,
) -> (StatusCode, Json<Value>) {
    let today = Utc::now().date_naive();
    match engine::activate_rule(
        state.store.as_ref(),
        state.catalog.as_ref(),
        product_id,
        &spec,
        today,
    )
    .await
    {
        Ok(rule) => (StatusCode::CREATED, Json(json!({ "rule": rule }))),
        Err(e @ Error::InvalidRuleConfig(_)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.to_string() })),
        ),
        Err(e @ Error::MissingExternalData { .. }) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() })))
        }
        Err(e) => {
            warn!(product_id, error = %e, "rule activation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

async fn deactivate(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> (StatusCode, Json<Value>) {
    let rule = match state.store.rule_for_product(product_id).await {
        Ok(Some(rule)) => rule,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "no active rule for product" })),
            )
        }
        Err(e) => {
            warn!(product_id, error = %e, "rule lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    match engine::deactivate_rule(state.store.as_ref(), rule.rule_id).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "deactivated" }))),
        Err(e) => {
            warn!(product_id, error = %e, "rule deactivation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}
