use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_order::report::{build_report, SettlementTotals};
use bazaar_order::settlement::SettlementRecord;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusFilter {
    All,
    Pending,
    Settled,
}

impl StatusFilter {
    fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.unwrap_or("all") {
            "all" => Ok(Self::All),
            "pending" => Ok(Self::Pending),
            "settled" => Ok(Self::Settled),
            other => Err(AppError::ValidationError(format!(
                "unknown settlement status filter: {other}"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SettlementQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SettlementsResponse {
    pub records: Vec<SettlementRecord>,
    pub summary: SettlementTotals,
    pub next_payout_date: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
}

/// GET /v1/settlements?status=all|pending|settled
pub async fn get_settlements(
    State(state): State<AppState>,
    Query(query): Query<SettlementQuery>,
) -> Result<Json<SettlementsResponse>, AppError> {
    let filter = StatusFilter::parse(query.status.as_deref())?;
    let now = Utc::now();

    let orders = state
        .order_repo
        .list_orders()
        .await
        .map_err(AppError::from_repo)?;
    let report = build_report(&orders, &state.fees, now);

    let records = match filter {
        StatusFilter::Pending => report.pending,
        StatusFilter::Settled => report.settled,
        StatusFilter::All => {
            let mut all = report.pending;
            all.extend(report.settled);
            all
        }
    };

    Ok(Json(SettlementsResponse {
        records,
        summary: report.totals,
        next_payout_date: report.next_payout_date,
        generated_at: now,
    }))
}

/// GET /v1/settlements/export
/// CSV download with the fixed column set the finance team reconciles
/// against
pub async fn export_settlements_csv(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let orders = state
        .order_repo
        .list_orders()
        .await
        .map_err(AppError::from_repo)?;
    let report = build_report(&orders, &state.fees, Utc::now());

    let mut csv = String::from(
        "Order ID,Customer,Sale Amount,Processor Fee,Commission,Net Payout,Status,Payout Date\n",
    );
    for record in report.pending.iter().chain(report.settled.iter()) {
        csv.push_str(&csv_row(record));
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"settlements.csv\"",
            ),
        ],
        csv,
    ))
}

fn csv_row(record: &SettlementRecord) -> String {
    let payout_date = record
        .payout_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    format!(
        "{},{},{},{},{},{},{},{}\n",
        record.order_id,
        csv_field(&record.customer_name),
        record.sale_amount,
        record.processor_fee,
        record.commission,
        record.net_payout,
        if record.settled { "SETTLED" } else { "PENDING" },
        payout_date,
    )
}

/// Quote a field only when it needs it
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("Asha Verma"), "Asha Verma");
        assert_eq!(csv_field("Verma, Asha"), "\"Verma, Asha\"");
        assert_eq!(csv_field("the \"big\" one"), "\"the \"\"big\"\" one\"");
    }
}
