use serde::Serialize;

use super::orders::{Order, OrderStatus};

/// Orders that named a user as their referrer, counted by status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralSummary {
    pub referral_name: String,
    pub total: usize,
    pub pending: usize,
    pub paid: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl ReferralSummary {
    pub fn tally(referral_name: &str, orders: &[Order]) -> Self {
        let mut summary = ReferralSummary {
            referral_name: referral_name.to_string(),
            ..Default::default()
        };

        let referred = orders.iter().filter(|order| {
            order
                .fields
                .referral_name
                .as_deref()
                .is_some_and(|name| name.trim().eq_ignore_ascii_case(referral_name))
        });

        for order in referred {
            summary.total += 1;
            match order.fields.status {
                OrderStatus::Pending => summary.pending += 1,
                OrderStatus::Paid => summary.paid += 1,
                OrderStatus::Completed => summary.completed += 1,
                OrderStatus::Cancelled => summary.cancelled += 1,
            }
        }

        summary
    }
}
