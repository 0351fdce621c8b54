use std::str::FromStr;

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{
    extract::{ApiJson, ApiQuery},
    AppState,
};
use crate::models::rates::{RateQuote, RateType, RateView};
use crate::services::{call, rates::RateRequest, ServiceError};

const ADMIN_KEY_HEADER: &str = "x-admin-key";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuery {
    rmb_amount: Option<String>,
}

#[derive(Deserialize)]
pub struct SetRateRequest {
    #[serde(rename = "type")]
    rate_type: RateType,
    #[serde(with = "rust_decimal::serde::float")]
    value: Decimal,
}

pub async fn get_rate(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RateQuery>,
) -> Result<Json<RateQuote>, ServiceError> {
    let rmb_amount = match query.rmb_amount.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(amount) => Some(
            Decimal::from_str(amount)
                .map_err(|_| ServiceError::validation("rmbAmount", "must be a number"))?,
        ),
    };
    let backend = state.backend()?;

    let quote = call(&backend.rates, "Rates", |response| RateRequest::GetRate {
        rmb_amount,
        response,
    })
    .await?;

    Ok(Json(quote))
}

pub async fn set_rate(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<SetRateRequest>,
) -> Result<Json<RateView>, ServiceError> {
    let admin_key = state
        .admin_key
        .as_deref()
        .ok_or_else(|| ServiceError::Unavailable("Rate setting is unavailable".to_string()))?;
    let presented = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if presented != Some(admin_key) {
        return Err(ServiceError::Unauthorized);
    }
    let backend = state.backend()?;

    let record = call(&backend.rates, "Rates", |response| RateRequest::SetRate {
        rate_type: request.rate_type,
        value: request.value,
        response,
    })
    .await?;

    Ok(Json(RateView::from(&record)))
}
