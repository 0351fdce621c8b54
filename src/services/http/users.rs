use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    extract::{ApiJson, ApiMultipart},
    multipart_error, read_text, read_upload,
    session::Session,
    AppState,
};
use crate::models::users::UserView;
use crate::services::{
    call,
    users::{ProfileUpdate, UserRequest},
    ServiceError,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_password: String,
}

pub async fn get_profile(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<UserView>, ServiceError> {
    let backend = state.backend()?;

    let user = call(&backend.users, "Users", |response| UserRequest::GetProfile {
        user_id: session.user_id,
        response,
    })
    .await?;

    Ok(Json(UserView::from(&user)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    ApiMultipart(mut multipart): ApiMultipart,
) -> Result<Json<UserView>, ServiceError> {
    let backend = state.backend()?;
    let mut update = ProfileUpdate::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "fullName" => update.full_name = Some(read_text(field).await?),
            "phone" => update.phone = Some(read_text(field).await?),
            "address" => update.address = Some(read_text(field).await?),
            "profileImage" => update.profile_image = read_upload(field, "profile").await?,
            other => log::debug!("Ignoring profile form field {}", other),
        }
    }

    let user = call(&backend.users, "Users", |response| UserRequest::UpdateProfile {
        user_id: session.user_id,
        update,
        response,
    })
    .await?;

    Ok(Json(UserView::from(&user)))
}

pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Json<Value>, ServiceError> {
    let backend = state.backend()?;

    call(&backend.users, "Users", |response| UserRequest::ChangePassword {
        user_id: session.user_id,
        current_password: request.current_password,
        new_password: request.new_password,
        response,
    })
    .await?;

    Ok(Json(json!({ "message": "Password updated" })))
}
