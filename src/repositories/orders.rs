use std::sync::Arc;

use async_trait::async_trait;

use super::{
    airtable::{field_equals, field_equals_ignore_case, AirtableClient},
    OrderRepository,
};
use crate::models::orders::{Order, OrderFields, OrderStatus};

#[derive(Clone)]
pub struct AirtableOrderRepository {
    client: Arc<AirtableClient>,
    table: String,
}

impl AirtableOrderRepository {
    pub fn new(client: Arc<AirtableClient>, table: String) -> Self {
        Self { client, table }
    }

    async fn list_where(&self, formula: &str) -> Result<Vec<Order>, anyhow::Error> {
        self.client.list(&self.table, Some(formula)).await
    }
}

#[async_trait]
impl OrderRepository for AirtableOrderRepository {
    async fn create_order(&self, fields: &OrderFields) -> Result<Order, anyhow::Error> {
        self.client.create(&self.table, fields).await
    }

    async fn list_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>, anyhow::Error> {
        self.list_where(&field_equals("User_ID", user_id)).await
    }

    async fn list_orders_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<Order>, anyhow::Error> {
        self.list_where(&field_equals("Status", status.as_str()))
            .await
    }

    async fn list_orders_by_reference(
        &self,
        reference: &str,
    ) -> Result<Vec<Order>, anyhow::Error> {
        self.list_where(&field_equals_ignore_case("Reference_Code", reference))
            .await
    }

    async fn list_orders_by_referral(
        &self,
        referral_name: &str,
    ) -> Result<Vec<Order>, anyhow::Error> {
        self.list_where(&field_equals_ignore_case("Referral_Name", referral_name))
            .await
    }

    async fn update_order_status(
        &self,
        id: &str,
        status: OrderStatus,
    ) -> Result<Order, anyhow::Error> {
        self.client
            .update(
                &self.table,
                id,
                &serde_json::json!({ "Status": status.as_str() }),
            )
            .await
    }
}
