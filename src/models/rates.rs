use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Orders below this many RMB fall in the low-volume tier.
pub const LOW_VOLUME_THRESHOLD: Decimal = Decimal::ONE_THOUSAND;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    Standard,
    LowVolume,
}

impl RateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateType::Standard => "standard",
            RateType::LowVolume => "low_volume",
        }
    }
}

/// A row of the rates table.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RateFields {
    #[serde(rename = "Type")]
    pub rate_type: RateType,
    #[serde(rename = "Value", with = "rust_decimal::serde::float")]
    pub value: Decimal,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RateRecord {
    pub id: String,
    pub fields: RateFields,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateView {
    pub id: String,
    #[serde(rename = "type")]
    pub rate_type: RateType,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
}

impl From<&RateRecord> for RateView {
    fn from(record: &RateRecord) -> Self {
        Self {
            id: record.id.clone(),
            rate_type: record.fields.rate_type,
            value: record.fields.value,
        }
    }
}

/// The currently configured value of each tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rates {
    pub standard: Option<Decimal>,
    pub low_volume: Option<Decimal>,
}

impl Rates {
    pub fn from_records(records: &[RateRecord]) -> Self {
        let mut rates = Rates::default();

        for record in records {
            match record.fields.rate_type {
                RateType::Standard => rates.standard = Some(record.fields.value),
                RateType::LowVolume => rates.low_volume = Some(record.fields.value),
            }
        }

        rates
    }

    /// Picks the rate for `rmb_amount`. `None` means no standard rate is configured.
    pub fn resolve(&self, rmb_amount: Option<Decimal>) -> Option<RateQuote> {
        let standard = self.standard?;

        let (rate, tier) = match (rmb_amount, self.low_volume) {
            (Some(amount), Some(low_volume)) if amount < LOW_VOLUME_THRESHOLD => {
                (low_volume, RateType::LowVolume)
            }
            _ => (standard, RateType::Standard),
        };

        Some(RateQuote {
            rate,
            tier,
            standard_rate: standard,
            low_volume_rate: self.low_volume,
            threshold: LOW_VOLUME_THRESHOLD,
            different_rate_notice: tier == RateType::LowVolume && rate != standard,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuote {
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    pub tier: RateType,
    #[serde(with = "rust_decimal::serde::float")]
    pub standard_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub low_volume_rate: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub threshold: Decimal,
    pub different_rate_notice: bool,
}
