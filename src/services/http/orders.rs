use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};

use super::{
    extract::ApiMultipart,
    multipart_error, read_text, read_upload,
    session::{MaybeSession, Session},
    AppState,
};
use crate::models::{orders::OrderView, referrals::ReferralSummary};
use crate::services::{
    call,
    orders::{OrderRequest, OrderSubmission},
    users::UserRequest,
    ServiceError,
};

async fn read_order_form(mut multipart: Multipart) -> Result<OrderSubmission, ServiceError> {
    let mut submission = OrderSubmission::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "fullName" => submission.full_name = read_text(field).await?,
            "mobileNumber" => submission.mobile_number = read_text(field).await?,
            "email" => submission.email = read_text(field).await?,
            "currency" => submission.currency = Some(read_text(field).await?),
            "ghsAmount" => submission.ghs_amount = Some(read_text(field).await?),
            "rmbAmount" => submission.rmb_amount = Some(read_text(field).await?),
            "referralName" => submission.referral_name = Some(read_text(field).await?),
            "qrCode" => submission.qr_code = read_upload(field, "qr-code").await?,
            other => log::debug!("Ignoring order form field {}", other),
        }
    }

    Ok(submission)
}

pub async fn submit_order(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<(StatusCode, Json<OrderView>), ServiceError> {
    let backend = state.backend()?;
    let submission = read_order_form(multipart).await?;

    let order = call(&backend.orders, "Orders", |response| OrderRequest::Submit {
        submission,
        user_id: session.map(|session| session.user_id),
        response,
    })
    .await?;

    Ok((StatusCode::CREATED, Json(OrderView::from(&order))))
}

pub async fn list_orders(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<OrderView>>, ServiceError> {
    let backend = state.backend()?;

    let orders = call(&backend.orders, "Orders", |response| OrderRequest::ListForUser {
        user_id: session.user_id,
        response,
    })
    .await?;

    Ok(Json(orders.iter().map(OrderView::from).collect()))
}

pub async fn track_order(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<OrderView>, ServiceError> {
    let backend = state.backend()?;

    let order = call(&backend.orders, "Orders", |response| OrderRequest::Track {
        reference,
        response,
    })
    .await?;

    Ok(Json(OrderView::from(&order)))
}

pub async fn referral_summary(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ReferralSummary>, ServiceError> {
    let backend = state.backend()?;

    let user = call(&backend.users, "Users", |response| UserRequest::GetProfile {
        user_id: session.user_id,
        response,
    })
    .await?;
    let summary = call(&backend.orders, "Orders", |response| {
        OrderRequest::ReferralSummary {
            username: user.fields.username,
            response,
        }
    })
    .await?;

    Ok(Json(summary))
}
