use std::sync::Arc;
use std::time::Duration;

use handlebars::Handlebars;
use serde_json::json;
use tokio::task::JoinHandle;

use crate::models::orders::{round_money, Order, OrderStatus};
use crate::repositories::{OrderRepository, SmsGateway};
use crate::utils;

const PAYMENT_RECEIVED_TEMPLATE: &str = "payment_received_sms";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NotifierReport {
    pub sent: usize,
    pub failed: usize,
}

/// Texts customers whose orders were marked paid, then completes those orders.
pub struct PaymentNotifier {
    orders: Arc<dyn OrderRepository>,
    sms: Arc<dyn SmsGateway>,
    country_code: String,
    interval: Duration,
    templates: Handlebars<'static>,
}

impl PaymentNotifier {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        sms: Arc<dyn SmsGateway>,
        country_code: String,
        interval: Duration,
    ) -> Result<Self, anyhow::Error> {
        let mut templates = Handlebars::new();
        templates.register_escape_fn(handlebars::no_escape);
        templates.register_template_string(
            PAYMENT_RECEIVED_TEMPLATE,
            include_str!("../../templates/payment_received_sms.hbs"),
        )?;

        Ok(Self {
            orders,
            sms,
            country_code,
            interval,
            templates,
        })
    }

    /// Runs forever. An iteration always finishes before the next sleep starts.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.run_once().await {
                    Ok(report) if report.sent + report.failed > 0 => log::info!(
                        "Payment notifier: {} sent, {} failed",
                        report.sent,
                        report.failed
                    ),
                    Ok(_) => log::debug!("Payment notifier: nothing to send"),
                    Err(e) => log::error!("Payment notifier could not list paid orders: {}", e),
                }

                tokio::time::sleep(self.interval).await;
            }
        })
    }

    pub async fn run_once(&self) -> Result<NotifierReport, anyhow::Error> {
        let paid = self.orders.list_orders_by_status(OrderStatus::Paid).await?;
        let mut report = NotifierReport::default();

        for order in &paid {
            match self.notify(order).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    log::error!(
                        "Payment notification for order {} failed: {}",
                        order.fields.reference_code,
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn notify(&self, order: &Order) -> Result<(), anyhow::Error> {
        let to = utils::normalize_phone(&order.fields.mobile_number, &self.country_code);
        let body = self.render(order)?;

        self.sms.send_sms(&to, &body).await?;
        self.orders
            .update_order_status(&order.id, OrderStatus::Completed)
            .await?;

        log::info!("Order {} completed", order.fields.reference_code);
        Ok(())
    }

    fn render(&self, order: &Order) -> Result<String, anyhow::Error> {
        let body = self.templates.render(
            PAYMENT_RECEIVED_TEMPLATE,
            &json!({
                "customer_name": order.fields.customer_name,
                "reference_code": order.fields.reference_code,
                "rmb_amount": format!("{:.2}", round_money(order.fields.rmb_amount)),
            }),
        )?;

        Ok(body.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::orders::OrderFields;
    use crate::testing::{FakeSms, InMemoryOrders};
    use rust_decimal::Decimal;

    fn paid(name: &str, mobile: &str, reference: &str) -> OrderFields {
        OrderFields {
            customer_name: name.to_string(),
            mobile_number: mobile.to_string(),
            email: "customer@example.com".to_string(),
            referral_name: None,
            ghs_amount: Decimal::new(100, 0),
            rmb_amount: Decimal::new(185, 0),
            reference_code: reference.to_string(),
            status: OrderStatus::Paid,
            submitted_at: None,
            rate: Decimal::new(185, 2),
            rate_tier: None,
            qr_code_url: None,
            user_id: None,
        }
    }

    fn status_of(orders: &InMemoryOrders, reference: &str) -> OrderStatus {
        orders
            .orders()
            .into_iter()
            .find(|order| order.fields.reference_code == reference)
            .map(|order| order.fields.status)
            .unwrap()
    }

    #[tokio::test]
    async fn failed_send_leaves_order_paid() {
        let orders = Arc::new(InMemoryOrders::default());
        orders.insert(paid("John Doe", "0241234567", "JD123"));
        orders.insert(paid("Ama Mensah", "0207654321", "AM456"));
        orders.insert(OrderFields {
            status: OrderStatus::Pending,
            ..paid("Kofi Annan", "0551112222", "KA789")
        });
        let sms = Arc::new(FakeSms::unreachable(&["+233241234567"]));
        let notifier = PaymentNotifier::new(
            orders.clone(),
            sms.clone(),
            "233".to_string(),
            Duration::from_secs(60),
        )
        .unwrap();

        let report = notifier.run_once().await.unwrap();

        assert_eq!(report, NotifierReport { sent: 1, failed: 1 });
        assert_eq!(status_of(&orders, "JD123"), OrderStatus::Paid);
        assert_eq!(status_of(&orders, "AM456"), OrderStatus::Completed);
        assert_eq!(status_of(&orders, "KA789"), OrderStatus::Pending);

        let sent = sms.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+233207654321");
        assert!(sent[0].1.starts_with("Hello Ama Mensah,"));
        assert!(sent[0].1.contains("AM456"));
        assert!(sent[0].1.contains("185.00 RMB"));
    }

    #[tokio::test]
    async fn completed_orders_are_not_texted_twice() {
        let orders = Arc::new(InMemoryOrders::default());
        orders.insert(paid("Ama Mensah", "0207654321", "AM456"));
        let sms = Arc::new(FakeSms::default());
        let notifier = PaymentNotifier::new(
            orders,
            sms.clone(),
            "233".to_string(),
            Duration::from_secs(60),
        )
        .unwrap();

        notifier.run_once().await.unwrap();
        let second = notifier.run_once().await.unwrap();

        assert_eq!(second, NotifierReport::default());
        assert_eq!(sms.sent().len(), 1);
    }
}
