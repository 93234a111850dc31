use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use common::{Error, Result, RunReport};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/jobs/run", post(run_jobs))
}

/// Manual trigger for both daily jobs. The per-job locks make a concurrent
/// trigger fail fast instead of double-applying a day's run.
async fn run_jobs(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let today = Utc::now().date_naive();
    let (snapshot, recalc) = state.runner.run_once(today).await;

    let status = match (&snapshot, &recalc) {
        (Err(Error::JobAlreadyRunning(_)), _) | (_, Err(Error::JobAlreadyRunning(_))) => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::OK,
    };

    (
        status,
        Json(json!({
            "snapshot": report_json(snapshot),
            "recalculation": report_json(recalc),
        })),
    )
}

fn report_json(result: Result<RunReport>) -> Value {
    match result {
        Ok(report) => json!({ "report": report }),
        Err(e) => json!({ "error": e.to_string() }),
    }
}
