use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{
    airtable::{field_equals, AirtableClient},
    RateRepository,
};
use crate::models::rates::{RateFields, RateRecord, RateType, Rates};

#[derive(Clone)]
pub struct AirtableRateRepository {
    client: Arc<AirtableClient>,
    table: String,
}

impl AirtableRateRepository {
    pub fn new(client: Arc<AirtableClient>, table: String) -> Self {
        Self { client, table }
    }
}

#[async_trait]
impl RateRepository for AirtableRateRepository {
    async fn get_rates(&self) -> Result<Rates, anyhow::Error> {
        let records: Vec<RateRecord> = self.client.list(&self.table, None).await?;

        Ok(Rates::from_records(&records))
    }

    async fn set_rate(
        &self,
        rate_type: RateType,
        value: Decimal,
    ) -> Result<RateRecord, anyhow::Error> {
        let fields = RateFields { rate_type, value };
        let formula = field_equals("Type", rate_type.as_str());
        let existing: Vec<RateRecord> = self.client.list(&self.table, Some(formula.as_str())).await?;

        match existing.first() {
            Some(record) => self.client.update(&self.table, &record.id, &fields).await,
            None => self.client.create(&self.table, &fields).await,
        }
    }
}
