use std::sync::Arc;

use async_trait::async_trait;

use super::{
    airtable::{field_equals, field_equals_ignore_case, formula_string, AirtableClient},
    UserRepository,
};
use crate::models::users::{User, UserFields, UserPatch};

#[derive(Clone)]
pub struct AirtableUserRepository {
    client: Arc<AirtableClient>,
    table: String,
}

impl AirtableUserRepository {
    pub fn new(client: Arc<AirtableClient>, table: String) -> Self {
        Self { client, table }
    }

    async fn find_one(&self, formula: &str) -> Result<Option<User>, anyhow::Error> {
        let users: Vec<User> = self.client.list(&self.table, Some(formula)).await?;

        if users.len() > 1 {
            log::warn!(
                "{} users match {}; using the first one.",
                users.len(),
                formula
            );
        }

        Ok(users.into_iter().next())
    }
}

#[async_trait]
impl UserRepository for AirtableUserRepository {
    async fn create_user(&self, fields: &UserFields) -> Result<User, anyhow::Error> {
        self.client.create(&self.table, fields).await
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, anyhow::Error> {
        self.find_one(&format!("RECORD_ID() = {}", formula_string(id)))
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        self.find_one(&field_equals_ignore_case("Email", email))
            .await
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, anyhow::Error> {
        self.find_one(&field_equals("Username", username)).await
    }

    async fn find_user_by_reset_token(&self, token: &str) -> Result<Option<User>, anyhow::Error> {
        self.find_one(&field_equals("Reset_Token", token)).await
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User, anyhow::Error> {
        self.client.update(&self.table, id, patch).await
    }
}
