use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::rates::RateType;

const MAX_INITIALS: usize = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Paid => "Paid",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

/// Direction the customer typed the amount in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Currency {
    #[default]
    Ghs,
    Rmb,
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GHS" => Ok(Currency::Ghs),
            "RMB" | "CNY" => Ok(Currency::Rmb),
            other => Err(format!("unsupported currency {}", other)),
        }
    }
}

/// A row of the orders table.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OrderFields {
    #[serde(rename = "Customer_Name", default)]
    pub customer_name: String,
    #[serde(rename = "Mobile_Number", default)]
    pub mobile_number: String,
    #[serde(rename = "Email", default)]
    pub email: String,
    #[serde(
        rename = "Referral_Name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub referral_name: Option<String>,
    #[serde(rename = "GHS_Amount", default, with = "rust_decimal::serde::float")]
    pub ghs_amount: Decimal,
    #[serde(rename = "RMB_Amount", default, with = "rust_decimal::serde::float")]
    pub rmb_amount: Decimal,
    #[serde(rename = "Reference_Code", default)]
    pub reference_code: String,
    #[serde(rename = "Status", default)]
    pub status: OrderStatus,
    #[serde(
        rename = "Submitted_At",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(rename = "Rate", default, with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    #[serde(rename = "Rate_Tier", default, skip_serializing_if = "Option::is_none")]
    pub rate_tier: Option<RateType>,
    #[serde(rename = "QR_Code_URL", default, skip_serializing_if = "Option::is_none")]
    pub qr_code_url: Option<String>,
    #[serde(rename = "User_ID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Order {
    pub id: String,
    pub fields: OrderFields,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: String,
    pub customer_name: String,
    pub mobile_number: String,
    pub email: String,
    pub referral_name: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub ghs_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub rmb_amount: Decimal,
    pub reference_code: String,
    pub status: OrderStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    pub rate_tier: Option<RateType>,
    pub qr_code_url: Option<String>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        let fields = &order.fields;

        Self {
            id: order.id.clone(),
            customer_name: fields.customer_name.clone(),
            mobile_number: fields.mobile_number.clone(),
            email: fields.email.clone(),
            referral_name: fields.referral_name.clone(),
            ghs_amount: fields.ghs_amount,
            rmb_amount: fields.rmb_amount,
            reference_code: fields.reference_code.clone(),
            status: fields.status,
            submitted_at: fields.submitted_at,
            rate: fields.rate,
            rate_tier: fields.rate_tier,
            qr_code_url: fields.qr_code_url.clone(),
        }
    }
}

/// Newest submission first; records without a timestamp go last.
pub fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.fields.submitted_at.cmp(&a.fields.submitted_at));
}

/// Initials of up to the first five name parts followed by three digits in 100..=999.
///
/// A part whose first character is not a letter contributes no initial.
pub fn generate_reference_code<R: Rng>(full_name: &str, rng: &mut R) -> String {
    let mut code: String = full_name
        .split_whitespace()
        .take(MAX_INITIALS)
        .filter_map(|part| part.chars().next())
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .collect();

    code.push_str(&rng.gen_range(100u16..=999).to_string());
    code
}

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
