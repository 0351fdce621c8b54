use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{
    images::{ImageFolder, Upload},
    orders::{Order, OrderFields, OrderStatus},
    rates::{RateRecord, RateType, Rates},
    users::{User, UserFields, UserPatch},
};

pub mod airtable;
pub mod cloudinary;
pub mod mail;
pub mod orders;
pub mod rates;
pub mod sms;
pub mod users;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(&self, fields: &OrderFields) -> Result<Order, anyhow::Error>;

    async fn list_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>, anyhow::Error>;

    async fn list_orders_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<Order>, anyhow::Error>;

    async fn list_orders_by_reference(&self, reference: &str)
        -> Result<Vec<Order>, anyhow::Error>;

    async fn list_orders_by_referral(
        &self,
        referral_name: &str,
    ) -> Result<Vec<Order>, anyhow::Error>;

    async fn update_order_status(
        &self,
        id: &str,
        status: OrderStatus,
    ) -> Result<Order, anyhow::Error>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, fields: &UserFields) -> Result<User, anyhow::Error>;

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, anyhow::Error>;

    /// `email` is compared case-insensitively.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error>;

    async fn find_user_by_username(&self, username: &str)
        -> Result<Option<User>, anyhow::Error>;

    async fn find_user_by_reset_token(&self, token: &str) -> Result<Option<User>, anyhow::Error>;

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User, anyhow::Error>;
}

#[async_trait]
pub trait RateRepository: Send + Sync {
    async fn get_rates(&self) -> Result<Rates, anyhow::Error>;

    async fn set_rate(&self, rate_type: RateType, value: Decimal)
        -> Result<RateRecord, anyhow::Error>;
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Stores the file and returns its permanent URL.
    async fn upload_image(
        &self,
        folder: ImageFolder,
        upload: Upload,
    ) -> Result<String, anyhow::Error>;
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), anyhow::Error>;
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_password_reset(
        &self,
        to: &str,
        full_name: &str,
        link: &str,
    ) -> Result<(), anyhow::Error>;
}
