use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{Reply, RequestHandler, Service, ServiceError};
use crate::models::rates::{RateQuote, RateRecord, RateType};
use crate::repositories::RateRepository;

pub enum RateRequest {
    GetRate {
        rmb_amount: Option<Decimal>,
        response: Reply<RateQuote>,
    },
    SetRate {
        rate_type: RateType,
        value: Decimal,
        response: Reply<RateRecord>,
    },
}

#[derive(Clone)]
pub struct RateRequestHandler {
    repository: Arc<dyn RateRepository>,
}

impl RateRequestHandler {
    pub fn new(repository: Arc<dyn RateRepository>) -> Self {
        Self { repository }
    }

    pub(crate) async fn get_rate(
        &self,
        rmb_amount: Option<Decimal>,
    ) -> Result<RateQuote, ServiceError> {
        if rmb_amount.is_some_and(|amount| amount.is_sign_negative()) {
            return Err(ServiceError::validation(
                "rmbAmount",
                "must not be negative",
            ));
        }

        let rates = self
            .repository
            .get_rates()
            .await
            .map_err(|e| ServiceError::repository("Rates", e))?;

        rates
            .resolve(rmb_amount)
            .ok_or_else(|| ServiceError::NotFound("No exchange rate configured".to_string()))
    }

    pub(crate) async fn set_rate(
        &self,
        rate_type: RateType,
        value: Decimal,
    ) -> Result<RateRecord, ServiceError> {
        if value <= Decimal::ZERO {
            return Err(ServiceError::validation("value", "must be a positive number"));
        }

        let record = self
            .repository
            .set_rate(rate_type, value)
            .await
            .map_err(|e| ServiceError::repository("Rates", e))?;

        log::info!("{} rate set to {}", rate_type.as_str(), value);
        Ok(record)
    }
}

#[async_trait]
impl RequestHandler<RateRequest> for RateRequestHandler {
    async fn handle_request(&self, request: RateRequest) {
        match request {
            RateRequest::GetRate {
                rmb_amount,
                response,
            } => {
                let quote = self.get_rate(rmb_amount).await;
                let _ = response.send(quote);
            }
            RateRequest::SetRate {
                rate_type,
                value,
                response,
            } => {
                let record = self.set_rate(rate_type, value).await;
                let _ = response.send(record);
            }
        }
    }
}

pub struct RateService;

impl RateService {
    pub fn new() -> Self {
        RateService {}
    }
}

#[async_trait]
impl Service<RateRequest, RateRequestHandler> for RateService {}
