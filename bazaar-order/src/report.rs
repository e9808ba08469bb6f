use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{FeeSchedule, Order, OrderStatus};
use crate::settlement::{settle, SettlementRecord};

/// Running totals across a settlement report
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettlementTotals {
    pub gross_sales: i64,
    pub total_processor_fees: i64,
    pub total_commission: i64,
    pub total_net_payout: i64,
    pub pending_payout: i64,
    pub settled_payout: i64,
}

#[derive(Debug, Serialize)]
pub struct SettlementReport {
    pub pending: Vec<SettlementRecord>,
    pub settled: Vec<SettlementRecord>,
    pub totals: SettlementTotals,
    /// Nearest future payout date among pending delivered orders
    pub next_payout_date: Option<DateTime<Utc>>,
}

/// Build the seller settlement report over a set of orders.
///
/// Cancelled and pre-payment orders never enter settlement reporting; the
/// caller usually filters them already, but they are skipped here too so a
/// raw order list produces a correct report.
pub fn build_report<'a, I>(orders: I, live: &FeeSchedule, now: DateTime<Utc>) -> SettlementReport
where
    I: IntoIterator<Item = &'a Order>,
{
    let mut pending = Vec::new();
    let mut settled = Vec::new();
    let mut totals = SettlementTotals::default();
    let mut next_payout_date: Option<DateTime<Utc>> = None;

    for order in orders {
        if matches!(
            order.status,
            OrderStatus::Cancelled | OrderStatus::PendingPayment
        ) {
            continue;
        }

        let record = settle(order, live, now);

        totals.gross_sales += record.sale_amount;
        totals.total_processor_fees += record.processor_fee;
        totals.total_commission += record.commission;
        totals.total_net_payout += record.net_payout;

        if record.settled {
            totals.settled_payout += record.net_payout;
            settled.push(record);
        } else {
            totals.pending_payout += record.net_payout;
            if let Some(date) = record.payout_date.filter(|d| *d > now) {
                next_payout_date = Some(match next_payout_date {
                    Some(current) if current <= date => current,
                    _ => date,
                });
            }
            pending.push(record);
        }
    }

    SettlementReport {
        pending,
        settled,
        totals,
        next_payout_date,
    }
}
