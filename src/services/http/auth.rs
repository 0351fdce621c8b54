use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{
    extract::ApiJson,
    session::{expired_session_cookie, session_cookie},
    AppState,
};
use crate::models::users::UserView;
use crate::services::{
    call,
    users::{Registration, UserRequest},
    ServiceError,
};

#[derive(Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    identifier: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    token: String,
    #[serde(default)]
    password: String,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(registration): ApiJson<Registration>,
) -> Result<impl IntoResponse, ServiceError> {
    let backend = state.backend()?;

    let user = call(&backend.users, "Users", |response| UserRequest::Register {
        registration,
        response,
    })
    .await?;

    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

pub async fn sign_in(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SignInRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let backend = state.backend()?;
    let keys = state.session_keys()?;

    let identity = backend
        .authenticator
        .authenticate(&request.identifier, &request.password)
        .await?;
    let token = keys.issue(&identity.id)?;

    log::info!("User {} signed in", identity.id);
    Ok((
        [(
            header::SET_COOKIE,
            session_cookie(&token, keys.ttl_secs(), state.production),
        )],
        Json(json!({
            "token": token,
            "user": {
                "id": identity.id,
                "username": identity.username,
                "email": identity.email,
                "fullName": identity.full_name,
            }
        })),
    ))
}

pub async fn sign_out(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, expired_session_cookie(state.production))],
        Json(json!({ "message": "Signed out" })),
    )
}

pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let backend = state.backend()?;

    let outcome = call(&backend.users, "Users", |response| {
        UserRequest::ForgotPassword {
            email: request.email,
            response,
        }
    })
    .await?;

    Ok(Json(outcome))
}

pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let backend = state.backend()?;

    call(&backend.users, "Users", |response| UserRequest::ResetPassword {
        token: request.token,
        password: request.password,
        response,
    })
    .await?;

    Ok(Json(json!({ "message": "Password has been reset" })))
}
