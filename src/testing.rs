//! In-memory collaborators for service and HTTP tests.

use std::sync::Mutex;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{
    images::{ImageFolder, Upload},
    orders::{Order, OrderFields, OrderStatus},
    rates::{RateFields, RateRecord, RateType, Rates},
    users::{User, UserFields, UserPatch},
};
use crate::repositories::{
    ImageHost, MailTransport, OrderRepository, RateRepository, SmsGateway, UserRepository,
};

#[derive(Default)]
pub struct InMemoryRates {
    records: Mutex<Vec<RateRecord>>,
}

impl InMemoryRates {
    pub fn with_rates(standard: Option<Decimal>, low_volume: Option<Decimal>) -> Self {
        let records = [(RateType::Standard, standard), (RateType::LowVolume, low_volume)]
            .into_iter()
            .filter_map(|(rate_type, value)| {
                value.map(|value| RateRecord {
                    id: format!("rec{}", rate_type.as_str()),
                    fields: RateFields { rate_type, value },
                })
            })
            .collect();

        Self {
            records: Mutex::new(records),
        }
    }
}

#[async_trait]
impl RateRepository for InMemoryRates {
    async fn get_rates(&self) -> Result<Rates, anyhow::Error> {
        Ok(Rates::from_records(&self.records.lock().unwrap()))
    }

    async fn set_rate(
        &self,
        rate_type: RateType,
        value: Decimal,
    ) -> Result<RateRecord, anyhow::Error> {
        let mut records = self.records.lock().unwrap();

        if let Some(record) = records
            .iter_mut()
            .find(|record| record.fields.rate_type == rate_type)
        {
            record.fields.value = value;
            return Ok(record.clone());
        }

        let record = RateRecord {
            id: format!("rec{}", rate_type.as_str()),
            fields: RateFields { rate_type, value },
        };
        records.push(record.clone());
        Ok(record)
    }
}

#[derive(Default)]
pub struct InMemoryOrders {
    orders: Mutex<Vec<Order>>,
}

impl InMemoryOrders {
    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().unwrap().clone()
    }

    pub fn insert(&self, fields: OrderFields) -> Order {
        let mut orders = self.orders.lock().unwrap();
        let order = Order {
            id: format!("recOrder{}", orders.len() + 1),
            fields,
        };
        orders.push(order.clone());
        order
    }

    fn filtered(&self, predicate: impl Fn(&Order) -> bool) -> Vec<Order> {
        self.orders
            .lock()
            .unwrap()
            .iter()
            .filter(|order| predicate(order))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn create_order(&self, fields: &OrderFields) -> Result<Order, anyhow::Error> {
        Ok(self.insert(fields.clone()))
    }

    async fn list_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>, anyhow::Error> {
        Ok(self.filtered(|order| order.fields.user_id.as_deref() == Some(user_id)))
    }

    async fn list_orders_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<Order>, anyhow::Error> {
        Ok(self.filtered(|order| order.fields.status == status))
    }

    async fn list_orders_by_reference(
        &self,
        reference: &str,
    ) -> Result<Vec<Order>, anyhow::Error> {
        Ok(self.filtered(|order| {
            order
                .fields
                .reference_code
                .eq_ignore_ascii_case(reference.trim())
        }))
    }

    async fn list_orders_by_referral(
        &self,
        referral_name: &str,
    ) -> Result<Vec<Order>, anyhow::Error> {
        Ok(self.filtered(|order| {
            order
                .fields
                .referral_name
                .as_deref()
                .is_some_and(|name| name.trim().eq_ignore_ascii_case(referral_name.trim()))
        }))
    }

    async fn update_order_status(
        &self,
        id: &str,
        status: OrderStatus,
    ) -> Result<Order, anyhow::Error> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|order| order.id == id)
            .ok_or_else(|| anyhow!("no order {}", id))?;

        order.fields.status = status;
        Ok(order.clone())
    }
}

#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<Vec<User>>,
}

impl InMemoryUsers {
    pub fn users(&self) -> Vec<User> {
        self.users.lock().unwrap().clone()
    }

    fn find(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|user| predicate(user))
            .cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn create_user(&self, fields: &UserFields) -> Result<User, anyhow::Error> {
        let mut users = self.users.lock().unwrap();
        let user = User {
            id: format!("recUser{}", users.len() + 1),
            fields: fields.clone(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self.find(|user| user.id == id))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self.find(|user| user.fields.email.eq_ignore_ascii_case(email.trim())))
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, anyhow::Error> {
        Ok(self.find(|user| user.fields.username == username))
    }

    async fn find_user_by_reset_token(&self, token: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self.find(|user| user.fields.reset_token.as_deref() == Some(token)))
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User, anyhow::Error> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or_else(|| anyhow!("no user {}", id))?;
        let fields = &mut user.fields;

        if let Some(full_name) = &patch.full_name {
            fields.full_name = full_name.clone();
        }
        if let Some(phone) = &patch.phone {
            fields.phone = phone.clone();
        }
        if let Some(address) = &patch.address {
            fields.address = Some(address.clone());
        }
        if let Some(profile_image) = &patch.profile_image {
            fields.profile_image = Some(profile_image.clone());
        }
        if let Some(password_hash) = &patch.password_hash {
            fields.password_hash = password_hash.clone();
        }
        if let Some(reset_token) = &patch.reset_token {
            fields.reset_token = reset_token.clone();
        }
        if let Some(reset_token_expiry) = &patch.reset_token_expiry {
            fields.reset_token_expiry = reset_token_expiry.clone();
        }

        Ok(user.clone())
    }
}

/// Image host that records uploads, or refuses every one of them.
#[derive(Default)]
pub struct FakeImageHost {
    failing: bool,
    uploads: Mutex<Vec<(ImageFolder, String)>>,
}

impl FakeImageHost {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn uploads(&self) -> Vec<(ImageFolder, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageHost for FakeImageHost {
    async fn upload_image(
        &self,
        folder: ImageFolder,
        upload: Upload,
    ) -> Result<String, anyhow::Error> {
        if self.failing {
            bail!("image host rejected {}", upload.file_name);
        }

        let url = format!(
            "https://images.test/{}/{}",
            folder.as_str(),
            upload.file_name
        );
        self.uploads
            .lock()
            .unwrap()
            .push((folder, upload.file_name));
        Ok(url)
    }
}

/// SMS gateway that refuses the listed numbers.
#[derive(Default)]
pub struct FakeSms {
    unreachable: Vec<String>,
    sent: Mutex<Vec<(String, String)>>,
}

impl FakeSms {
    pub fn unreachable(numbers: &[&str]) -> Self {
        Self {
            unreachable: numbers.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsGateway for FakeSms {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), anyhow::Error> {
        if self.unreachable.iter().any(|number| number == to) {
            bail!("undeliverable number {}", to);
        }

        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

/// Mail transport that records reset links, or fails every delivery.
#[derive(Default)]
pub struct FakeMailer {
    failing: bool,
    sent: Mutex<Vec<(String, String)>>,
}

impl FakeMailer {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for FakeMailer {
    async fn send_password_reset(
        &self,
        to: &str,
        _full_name: &str,
        link: &str,
    ) -> Result<(), anyhow::Error> {
        if self.failing {
            bail!("relay unavailable");
        }

        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), link.to_string()));
        Ok(())
    }
}

pub fn png(file_name: &str) -> Upload {
    Upload {
        file_name: file_name.to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0x89, b'P', b'N', b'G'],
    }
}
