//! Read-side payment aggregation.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use domain::{Money, PaymentInfo, PaymentMethod, PaymentStatus};
use serde::Serialize;

/// Aggregate over the payments in a date range.
///
/// Revenue counts captured payments (completed, refunded, partially
/// refunded) by their charged amount; refunds are reported separately
/// rather than netted out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaymentStatistics {
    /// Sum of captured payment amounts.
    pub total_revenue: Money,

    /// Sum of refunded amounts.
    pub total_refunds: Money,

    /// Payment counts per status.
    pub count_by_status: HashMap<PaymentStatus, u64>,

    /// Payment counts per method.
    pub count_by_method: HashMap<PaymentMethod, u64>,

    /// Captured revenue per calendar day of capture.
    pub daily_revenue: BTreeMap<NaiveDate, Money>,
}

/// Computes statistics over a set of payments. Pure.
pub fn compute(payments: &[PaymentInfo]) -> PaymentStatistics {
    let mut stats = PaymentStatistics::default();

    for payment in payments {
        *stats.count_by_status.entry(payment.status()).or_default() += 1;
        *stats.count_by_method.entry(payment.method()).or_default() += 1;

        if payment.status().is_settled() {
            stats.total_revenue += payment.amount();
            let day = payment.effective_at().date_naive();
            *stats
                .daily_revenue
                .entry(day)
                .or_insert_with(Money::zero) += payment.amount();
        }

        if let Some(refund) = payment.refund() {
            stats.total_refunds += refund.amount;
        }
    }

    stats
}
