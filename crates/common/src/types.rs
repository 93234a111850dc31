use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Product identifier in the external catalog. Rules reference products by
/// id only; the catalog owns the product itself.
pub type ProductId = i64;

/// Identifier of a pricing rule row in the store.
pub type RuleId = i64;

/// Per-product repricing configuration. At most one rule exists per product.
///
/// `last_cumulative_sales` is the baseline the snapshot job diffs the
/// catalog's lifetime counter against; it advances once per recorded day.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PricingRule {
    pub rule_id: RuleId,
    pub product_id: ProductId,
    /// Product price at the moment the rule was activated.
    pub base_price: f64,
    pub start_date: NaiveDate,
    pub min_price: f64,
    pub max_price: f64,
    /// Magnitude of a single price step. Always positive.
    pub change_amount: f64,
    /// Length of one observation period, in days.
    pub period_days: u32,
    pub last_cumulative_sales: i64,
}

/// A rule as submitted for activation, before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewRule {
    pub product_id: ProductId,
    pub base_price: f64,
    pub start_date: NaiveDate,
    pub min_price: f64,
    pub max_price: f64,
    pub change_amount: f64,
    pub period_days: u32,
    pub last_cumulative_sales: i64,
}

/// User-supplied rule parameters (API request body).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub min_price: f64,
    pub max_price: f64,
    pub change_amount: f64,
    pub period_days: u32,
}

/// One day's recorded sales for a rule. Append-only; unique per
/// `(rule_id, date)` — that key is what makes a same-day retry a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SalesResult {
    pub rule_id: RuleId,
    pub date: NaiveDate,
    /// Price in effect on `date`.
    pub price: f64,
    /// Units sold during the period ending on `date`. Never negative.
    pub sales: i64,
}

/// Outcome of an atomic snapshot write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Result row inserted and baseline advanced.
    Recorded,
    /// A row for this `(rule_id, date)` already existed; nothing changed.
    AlreadyRecorded,
}

/// Which of the two daily batch jobs a report or lock refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Snapshot,
    Recalculation,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Snapshot => write!(f, "snapshot"),
            JobKind::Recalculation => write!(f, "recalculation"),
        }
    }
}

/// Whether price write-backs hit the real catalog or are only shadowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Live,
    DryRun,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Live => write!(f, "live"),
            RunMode::DryRun => write!(f, "dryrun"),
        }
    }
}

/// A rule that could not be processed during a run.
#[derive(Debug, Clone, Serialize)]
pub struct RuleFailure {
    pub product_id: ProductId,
    pub error: String,
}

/// Summary of one batch run, for operator visibility. A rule lands in
/// exactly one bucket: processed, skipped (expected steady-state, e.g. not
/// enough history yet) or failed.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub job: JobKind,
    pub date: NaiveDate,
    pub processed: u32,
    pub skipped: u32,
    pub failures: Vec<RuleFailure>,
}

impl RunReport {
    pub fn new(job: JobKind, date: NaiveDate) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job,
            date,
            processed: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, product_id: ProductId, error: impl std::fmt::Display) {
        self.failures.push(RuleFailure {
            product_id,
            error: error.to_string(),
        });
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} run {}: {} processed, {} skipped, {} failed",
            self.job,
            self.date,
            self.processed,
            self.skipped,
            self.failures.len()
        )
    }
}
