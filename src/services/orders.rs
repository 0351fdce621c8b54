use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use super::{call, rates::RateRequest, Reply, RequestHandler, Service, ServiceError};
use crate::models::{
    images::{ImageFolder, Upload},
    orders::{
        generate_reference_code, round_money, sort_newest_first, Currency, Order, OrderFields,
        OrderStatus,
    },
    rates::{RateQuote, Rates},
    referrals::ReferralSummary,
};
use crate::repositories::{ImageHost, OrderRepository};
use crate::utils;

/// Raw order form as received. Parsing and validation happen in the service.
#[derive(Clone, Debug, Default)]
pub struct OrderSubmission {
    pub full_name: String,
    pub mobile_number: String,
    pub email: String,
    pub currency: Option<String>,
    pub ghs_amount: Option<String>,
    pub rmb_amount: Option<String>,
    pub referral_name: Option<String>,
    pub qr_code: Option<Upload>,
}

pub enum OrderRequest {
    Submit {
        submission: OrderSubmission,
        user_id: Option<String>,
        response: Reply<Order>,
    },
    ListForUser {
        user_id: String,
        response: Reply<Vec<Order>>,
    },
    Track {
        reference: String,
        response: Reply<Order>,
    },
    ReferralSummary {
        username: String,
        response: Reply<ReferralSummary>,
    },
}

struct Amounts {
    ghs: Decimal,
    rmb: Decimal,
    quote: RateQuote,
}

#[derive(Clone)]
pub struct OrderRequestHandler {
    repository: Arc<dyn OrderRepository>,
    image_host: Option<Arc<dyn ImageHost>>,
    rate_channel: mpsc::Sender<RateRequest>,
}

impl OrderRequestHandler {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        image_host: Option<Arc<dyn ImageHost>>,
        rate_channel: mpsc::Sender<RateRequest>,
    ) -> Self {
        Self {
            repository,
            image_host,
            rate_channel,
        }
    }

    pub(crate) async fn submit(
        &self,
        submission: OrderSubmission,
        user_id: Option<String>,
    ) -> Result<Order, ServiceError> {
        let full_name = submission.full_name.trim().to_string();
        let mobile_number = submission.mobile_number.trim().to_string();
        let email = submission.email.trim().to_string();

        if full_name.is_empty() {
            return Err(ServiceError::validation("fullName", "is required"));
        }
        if !utils::validate_phone(&mobile_number) {
            return Err(ServiceError::validation(
                "mobileNumber",
                "must be 9 to 15 digits with an optional leading +",
            ));
        }
        if !utils::validate_email(&email) {
            return Err(ServiceError::validation("email", "is not a valid address"));
        }

        let currency = match submission.currency.as_deref().map(str::trim) {
            None | Some("") => Currency::default(),
            Some(currency) => Currency::from_str(currency)
                .map_err(|e| ServiceError::validation("currency", &e))?,
        };
        let amounts = match currency {
            Currency::Ghs => {
                let ghs = parse_amount("ghsAmount", submission.ghs_amount.as_deref())?;
                self.amounts_from_ghs(ghs).await?
            }
            Currency::Rmb => {
                let rmb = parse_amount("rmbAmount", submission.rmb_amount.as_deref())?;
                self.amounts_from_rmb(rmb).await?
            }
        };

        let qr_code_url = match submission.qr_code {
            Some(upload) => Some(self.upload_qr_code(upload).await?),
            None => None,
        };

        let referral_name = submission
            .referral_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let reference_code = generate_reference_code(&full_name, &mut rand::thread_rng());

        let fields = OrderFields {
            customer_name: full_name,
            mobile_number,
            email,
            referral_name,
            ghs_amount: amounts.ghs,
            rmb_amount: amounts.rmb,
            reference_code,
            status: OrderStatus::Pending,
            submitted_at: Some(Utc::now()),
            rate: amounts.quote.rate,
            rate_tier: Some(amounts.quote.tier),
            qr_code_url,
            user_id,
        };

        let order = self
            .repository
            .create_order(&fields)
            .await
            .map_err(|e| ServiceError::repository("Orders", e))?;

        log::info!(
            "Order {} created: {} GHS -> {} RMB at {}",
            order.fields.reference_code,
            order.fields.ghs_amount,
            order.fields.rmb_amount,
            order.fields.rate
        );

        Ok(order)
    }

    /// Tier is resolved on a provisional RMB amount at the standard rate.
    async fn amounts_from_ghs(&self, ghs: Decimal) -> Result<Amounts, ServiceError> {
        let ghs = round_money(ghs);
        let display = self.quote(None).await?;
        let rates = Rates {
            standard: Some(display.standard_rate),
            low_volume: display.low_volume_rate,
        };
        let provisional = ghs
            .checked_mul(display.standard_rate)
            .ok_or_else(|| ServiceError::validation("ghsAmount", "is too large"))?;
        let quote = rates
            .resolve(Some(provisional))
            .ok_or_else(|| ServiceError::NotFound("No exchange rate configured".to_string()))?;
        let rmb = ghs
            .checked_mul(quote.rate)
            .ok_or_else(|| ServiceError::validation("ghsAmount", "is too large"))?;

        Ok(Amounts {
            ghs,
            rmb: round_money(rmb),
            quote,
        })
    }

    async fn amounts_from_rmb(&self, rmb: Decimal) -> Result<Amounts, ServiceError> {
        let rmb = round_money(rmb);
        let quote = self.quote(Some(rmb)).await?;
        let ghs = rmb.checked_div(quote.rate).ok_or_else(|| {
            ServiceError::Internal(format!("configured rate {} is not usable", quote.rate))
        })?;

        Ok(Amounts {
            ghs: round_money(ghs),
            rmb,
            quote,
        })
    }

    async fn quote(&self, rmb_amount: Option<Decimal>) -> Result<RateQuote, ServiceError> {
        call(&self.rate_channel, "Rates", |response| RateRequest::GetRate {
            rmb_amount,
            response,
        })
        .await
    }

    async fn upload_qr_code(&self, upload: Upload) -> Result<String, ServiceError> {
        let image_host = self
            .image_host
            .as_ref()
            .ok_or_else(|| ServiceError::Unavailable("Image uploads are unavailable".to_string()))?;

        image_host
            .upload_image(ImageFolder::QrCodes, upload)
            .await
            .map_err(|e| {
                log::error!("QR code upload failed: {}", e);
                ServiceError::UploadFailed(e.to_string())
            })
    }

    pub(crate) async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>, ServiceError> {
        let mut orders = self
            .repository
            .list_orders_by_user(user_id)
            .await
            .map_err(|e| ServiceError::repository("Orders", e))?;

        sort_newest_first(&mut orders);
        Ok(orders)
    }

    pub(crate) async fn track(&self, reference: &str) -> Result<Order, ServiceError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ServiceError::validation("reference", "is required"));
        }

        let mut orders = self
            .repository
            .list_orders_by_reference(reference)
            .await
            .map_err(|e| ServiceError::repository("Orders", e))?;

        sort_newest_first(&mut orders);
        orders
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }

    pub(crate) async fn referral_summary(
        &self,
        username: &str,
    ) -> Result<ReferralSummary, ServiceError> {
        let orders = self
            .repository
            .list_orders_by_referral(username)
            .await
            .map_err(|e| ServiceError::repository("Orders", e))?;

        Ok(ReferralSummary::tally(username, &orders))
    }
}

fn parse_amount(field: &str, value: Option<&str>) -> Result<Decimal, ServiceError> {
    let value = value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ServiceError::validation(field, "is required"))?;

    let amount = Decimal::from_str(value)
        .map_err(|_| ServiceError::validation(field, "must be a number"))?;
    if amount <= Decimal::ZERO {
        return Err(ServiceError::validation(field, "must be greater than zero"));
    }
    if round_money(amount).is_zero() {
        return Err(ServiceError::validation(field, "must be at least 0.01"));
    }

    Ok(amount)
}

#[async_trait]
impl RequestHandler<OrderRequest> for OrderRequestHandler {
    async fn handle_request(&self, request: OrderRequest) {
        match request {
            OrderRequest::Submit {
                submission,
                user_id,
                response,
            } => {
                let order = self.submit(submission, user_id).await;
                let _ = response.send(order);
            }
            OrderRequest::ListForUser { user_id, response } => {
                let orders = self.list_for_user(&user_id).await;
                let _ = response.send(orders);
            }
            OrderRequest::Track {
                reference,
                response,
            } => {
                let order = self.track(&reference).await;
                let _ = response.send(order);
            }
            OrderRequest::ReferralSummary { username, response } => {
                let summary = self.referral_summary(&username).await;
                let _ = response.send(summary);
            }
        }
    }
}

pub struct OrderService;

impl OrderService {
    pub fn new() -> Self {
        OrderService {}
    }
}

#[async_trait]
impl Service<OrderRequest, OrderRequestHandler> for OrderService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rates::RateType;
    use crate::services::rates::{RateRequestHandler, RateService};
    use crate::testing::{png, FakeImageHost, InMemoryOrders, InMemoryRates};
    use chrono::TimeZone;
    use regex::Regex;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn rate_channel(standard: &str, low_volume: Option<&str>) -> mpsc::Sender<RateRequest> {
        let (rate_tx, mut rate_rx) = mpsc::channel(8);
        let handler = RateRequestHandler::new(Arc::new(InMemoryRates::with_rates(
            Some(dec(standard)),
            low_volume.map(dec),
        )));
        tokio::spawn(async move {
            RateService::new().run(handler, &mut rate_rx).await;
        });
        rate_tx
    }

    fn john_doe(ghs_amount: &str) -> OrderSubmission {
        OrderSubmission {
            full_name: "John Doe".to_string(),
            mobile_number: "0241234567".to_string(),
            email: "john@example.com".to_string(),
            ghs_amount: Some(ghs_amount.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn ghs_submission_creates_pending_order() {
        let orders = Arc::new(InMemoryOrders::default());
        let handler = OrderRequestHandler::new(orders.clone(), None, rate_channel("1.85", None));

        let order = handler.submit(john_doe("100"), None).await.unwrap();

        assert_eq!(order.fields.rmb_amount, dec("185.00"));
        assert_eq!(order.fields.status, OrderStatus::Pending);
        assert!(Regex::new(r"^JD\d{3}$")
            .unwrap()
            .is_match(&order.fields.reference_code));
        assert!(order.fields.submitted_at.is_some());
        assert_eq!(orders.orders().len(), 1);
    }

    #[tokio::test]
    async fn ghs_tier_follows_the_provisional_rmb_amount() {
        let handler = OrderRequestHandler::new(
            Arc::new(InMemoryOrders::default()),
            None,
            rate_channel("1.85", Some("1.80")),
        );

        let small = handler.submit(john_doe("100"), None).await.unwrap();
        let large = handler.submit(john_doe("1000"), None).await.unwrap();

        assert_eq!(small.fields.rate_tier, Some(RateType::LowVolume));
        assert_eq!(small.fields.rmb_amount, dec("180.00"));
        assert_eq!(large.fields.rate_tier, Some(RateType::Standard));
        assert_eq!(large.fields.rmb_amount, dec("1850.00"));
    }

    #[tokio::test]
    async fn rmb_submission_converts_back_to_ghs() {
        let handler = OrderRequestHandler::new(
            Arc::new(InMemoryOrders::default()),
            None,
            rate_channel("1.85", Some("1.80")),
        );
        let submission = OrderSubmission {
            currency: Some("RMB".to_string()),
            ghs_amount: None,
            rmb_amount: Some("500".to_string()),
            ..john_doe("0")
        };

        let order = handler.submit(submission, Some("recUser1".to_string())).await.unwrap();

        assert_eq!(order.fields.rate, dec("1.80"));
        assert_eq!(order.fields.ghs_amount, dec("277.78"));
        assert_eq!(order.fields.user_id.as_deref(), Some("recUser1"));
    }

    #[tokio::test]
    async fn failed_upload_creates_no_order() {
        let orders = Arc::new(InMemoryOrders::default());
        let handler = OrderRequestHandler::new(
            orders.clone(),
            Some(Arc::new(FakeImageHost::failing())),
            rate_channel("1.85", None),
        );
        let submission = OrderSubmission {
            qr_code: Some(png("qr.png")),
            ..john_doe("100")
        };

        let error = handler.submit(submission, None).await.unwrap_err();

        assert!(matches!(error, ServiceError::UploadFailed(_)));
        assert!(orders.orders().is_empty());
    }

    #[tokio::test]
    async fn image_without_host_is_unavailable() {
        let orders = Arc::new(InMemoryOrders::default());
        let handler = OrderRequestHandler::new(orders.clone(), None, rate_channel("1.85", None));
        let submission = OrderSubmission {
            qr_code: Some(png("qr.png")),
            ..john_doe("100")
        };

        let error = handler.submit(submission, None).await.unwrap_err();

        assert!(matches!(error, ServiceError::Unavailable(_)));
        assert!(orders.orders().is_empty());
    }

    #[tokio::test]
    async fn uploaded_qr_code_is_attached() {
        let images = Arc::new(FakeImageHost::default());
        let handler = OrderRequestHandler::new(
            Arc::new(InMemoryOrders::default()),
            Some(images.clone()),
            rate_channel("1.85", None),
        );
        let submission = OrderSubmission {
            qr_code: Some(png("qr.png")),
            ..john_doe("100")
        };

        let order = handler.submit(submission, None).await.unwrap();

        assert_eq!(
            order.fields.qr_code_url.as_deref(),
            Some("https://images.test/qr-codes/qr.png")
        );
        assert_eq!(images.uploads()[0].0, ImageFolder::QrCodes);
    }

    #[tokio::test]
    async fn invalid_fields_are_named() {
        let handler = OrderRequestHandler::new(
            Arc::new(InMemoryOrders::default()),
            None,
            rate_channel("1.85", None),
        );
        let cases = [
            (OrderSubmission { full_name: " ".to_string(), ..john_doe("100") }, "fullName"),
            (OrderSubmission { mobile_number: "123".to_string(), ..john_doe("100") }, "mobileNumber"),
            (OrderSubmission { email: "john@".to_string(), ..john_doe("100") }, "email"),
            (john_doe("-5"), "ghsAmount"),
            (john_doe("lots"), "ghsAmount"),
            (OrderSubmission { currency: Some("USD".to_string()), ..john_doe("100") }, "currency"),
        ];

        for (submission, expected) in cases {
            match handler.submit(submission, None).await {
                Err(ServiceError::Validation { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected validation error for {}, got {:?}", expected, other.map(|o| o.id)),
            }
        }
    }

    #[tokio::test]
    async fn tracking_returns_the_newest_match() {
        let orders = Arc::new(InMemoryOrders::default());
        for (day, status) in [(1, OrderStatus::Completed), (3, OrderStatus::Pending)] {
            orders.insert(OrderFields {
                reference_code: "JD123".to_string(),
                status,
                submitted_at: Some(Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap()),
                ..empty_fields()
            });
        }
        let handler = OrderRequestHandler::new(orders, None, rate_channel("1.85", None));

        let order = handler.track("jd123").await.unwrap();
        let missing = handler.track("ZZ999").await.unwrap_err();

        assert_eq!(order.fields.status, OrderStatus::Pending);
        assert!(matches!(missing, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn amounts_are_derived_from_the_rounded_entry() {
        let handler = OrderRequestHandler::new(
            Arc::new(InMemoryOrders::default()),
            None,
            rate_channel("1.85", None),
        );
        let from_rmb = OrderSubmission {
            currency: Some("RMB".to_string()),
            ghs_amount: None,
            rmb_amount: Some("500.005".to_string()),
            ..john_doe("0")
        };

        let ghs = handler.submit(john_doe("100.005"), None).await.unwrap();
        let rmb = handler.submit(from_rmb, None).await.unwrap();

        assert_eq!(ghs.fields.ghs_amount, dec("100.01"));
        assert_eq!(ghs.fields.rmb_amount, dec("185.02"));
        assert_eq!(
            ghs.fields.rmb_amount,
            round_money(ghs.fields.ghs_amount * ghs.fields.rate)
        );
        assert_eq!(rmb.fields.rmb_amount, dec("500.01"));
        assert_eq!(rmb.fields.ghs_amount, round_money(dec("500.01") / dec("1.85")));
    }

    #[tokio::test]
    async fn oversized_amount_is_rejected() {
        let orders = Arc::new(InMemoryOrders::default());
        let handler = OrderRequestHandler::new(orders.clone(), None, rate_channel("1.85", None));

        let error = handler
            .submit(john_doe("79228162514264337593543950335"), None)
            .await
            .unwrap_err();

        match error {
            ServiceError::Validation { field, message } => {
                assert_eq!(field, "ghsAmount");
                assert_eq!(message, "is too large");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(orders.orders().is_empty());
    }

    #[tokio::test]
    async fn amount_rounding_to_zero_is_rejected() {
        let orders = Arc::new(InMemoryOrders::default());
        let handler = OrderRequestHandler::new(orders.clone(), None, rate_channel("1.85", None));

        let error = handler.submit(john_doe("0.001"), None).await.unwrap_err();

        assert!(matches!(
            error,
            ServiceError::Validation { ref field, .. } if field == "ghsAmount"
        ));
        assert!(orders.orders().is_empty());
    }

    #[tokio::test]
    async fn referral_summary_counts_orders_naming_the_user() {
        let orders = Arc::new(InMemoryOrders::default());
        for (referral, status) in [
            (Some("ama"), OrderStatus::Pending),
            (Some("AMA "), OrderStatus::Completed),
            (Some("kofi"), OrderStatus::Paid),
            (None, OrderStatus::Pending),
        ] {
            orders.insert(OrderFields {
                referral_name: referral.map(str::to_string),
                status,
                ..empty_fields()
            });
        }
        let handler = OrderRequestHandler::new(orders, None, rate_channel("1.85", None));

        let summary = handler.referral_summary("ama").await.unwrap();

        assert_eq!(summary.referral_name, "ama");
        assert_eq!(summary.total, 2);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.paid, 0);
    }

    fn empty_fields() -> OrderFields {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}
