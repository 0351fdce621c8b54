use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{
    auth::{hash_password, verify_password},
    Reply, RequestHandler, Service, ServiceError,
};
use crate::models::{
    images::{ImageFolder, Upload},
    users::{User, UserFields, UserPatch},
};
use crate::repositories::{ImageHost, MailTransport, UserRepository};
use crate::utils;

pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent.";
const FALLBACK_NOTICE: &str = "Email service unavailable — use the printed link";
const RESET_TOKEN_BYTES: usize = 32;
const RESET_TOKEN_LIFETIME_HOURS: i64 = 1;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Registration {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub profile_image: Option<Upload>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordOutcome {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl ForgotPasswordOutcome {
    fn generic() -> Self {
        Self {
            message: FORGOT_PASSWORD_MESSAGE.to_string(),
            reset_link: None,
            notice: None,
        }
    }
}

pub enum UserRequest {
    Register {
        registration: Registration,
        response: Reply<User>,
    },
    GetProfile {
        user_id: String,
        response: Reply<User>,
    },
    UpdateProfile {
        user_id: String,
        update: ProfileUpdate,
        response: Reply<User>,
    },
    ChangePassword {
        user_id: String,
        current_password: String,
        new_password: String,
        response: Reply<()>,
    },
    ForgotPassword {
        email: String,
        response: Reply<ForgotPasswordOutcome>,
    },
    ResetPassword {
        token: String,
        password: String,
        response: Reply<()>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: Arc<dyn UserRepository>,
    image_host: Option<Arc<dyn ImageHost>>,
    mailer: Option<Arc<dyn MailTransport>>,
    public_url: String,
    production: bool,
}

impl UserRequestHandler {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        image_host: Option<Arc<dyn ImageHost>>,
        mailer: Option<Arc<dyn MailTransport>>,
        public_url: String,
        production: bool,
    ) -> Self {
        UserRequestHandler {
            repository,
            image_host,
            mailer,
            public_url: public_url.trim_end_matches('/').to_string(),
            production,
        }
    }

    pub(crate) async fn register(&self, registration: Registration) -> Result<User, ServiceError> {
        let full_name = registration.full_name.trim().to_string();
        let username = registration.username.trim().to_string();
        let email = registration.email.trim().to_lowercase();
        let phone = registration.phone.trim().to_string();

        if full_name.is_empty() {
            return Err(ServiceError::validation("fullName", "is required"));
        }
        if !utils::validate_username(&username) {
            return Err(ServiceError::validation(
                "username",
                "must be 3 to 30 letters, digits, underscores or dots",
            ));
        }
        if !utils::validate_email(&email) {
            return Err(ServiceError::validation("email", "is not a valid address"));
        }
        if !utils::validate_phone(&phone) {
            return Err(ServiceError::validation(
                "phone",
                "must be 9 to 15 digits with an optional leading +",
            ));
        }
        validate_new_password("password", &registration.password)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(
                "An account with that email already exists".to_string(),
            ));
        }
        let existing = self
            .repository
            .find_user_by_username(&username)
            .await
            .map_err(|e| ServiceError::repository("Users", e))?;
        if existing.is_some() {
            return Err(ServiceError::Conflict("That username is already taken".to_string()));
        }

        let password_hash =
            hash_password(&registration.password).map_err(|e| ServiceError::Internal(e.to_string()))?;
        let fields = UserFields {
            full_name,
            username,
            email,
            phone,
            password_hash,
            reset_token: None,
            reset_token_expiry: None,
            profile_image: None,
            address: None,
            created_at: Some(Utc::now()),
        };

        let user = self
            .repository
            .create_user(&fields)
            .await
            .map_err(|e| ServiceError::repository("Users", e))?;

        log::info!("Registered user {} ({})", user.fields.username, user.id);
        Ok(user)
    }

    pub(crate) async fn get_profile(&self, user_id: &str) -> Result<User, ServiceError> {
        self.repository
            .find_user_by_id(user_id)
            .await
            .map_err(|e| ServiceError::repository("Users", e))?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    pub(crate) async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<User, ServiceError> {
        let mut patch = UserPatch::default();

        if let Some(full_name) = non_empty(update.full_name) {
            patch.full_name = Some(full_name);
        }
        if let Some(phone) = non_empty(update.phone) {
            if !utils::validate_phone(&phone) {
                return Err(ServiceError::validation(
                    "phone",
                    "must be 9 to 15 digits with an optional leading +",
                ));
            }
            patch.phone = Some(phone);
        }
        if let Some(address) = update.address {
            patch.address = Some(address.trim().to_string());
        }

        // Make sure the user exists before anything is uploaded.
        let user = self.get_profile(user_id).await?;

        if let Some(upload) = update.profile_image {
            patch.profile_image = Some(self.upload_profile_image(upload).await?);
        }
        if patch.is_empty() {
            return Ok(user);
        }

        self.repository
            .update_user(&user.id, &patch)
            .await
            .map_err(|e| ServiceError::repository("Users", e))
    }

    async fn upload_profile_image(&self, upload: Upload) -> Result<String, ServiceError> {
        let image_host = self
            .image_host
            .as_ref()
            .ok_or_else(|| ServiceError::Unavailable("Image uploads are unavailable".to_string()))?;

        image_host
            .upload_image(ImageFolder::Profiles, upload)
            .await
            .map_err(|e| {
                log::error!("Profile image upload failed: {}", e);
                ServiceError::UploadFailed(e.to_string())
            })
    }

    pub(crate) async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let user = self.get_profile(user_id).await?;

        if !verify_password(current_password, &user.fields.password_hash) {
            return Err(ServiceError::InvalidCredentials);
        }
        validate_new_password("newPassword", new_password)?;

        let patch = UserPatch {
            password_hash: Some(
                hash_password(new_password).map_err(|e| ServiceError::Internal(e.to_string()))?,
            ),
            ..Default::default()
        };
        self.repository
            .update_user(&user.id, &patch)
            .await
            .map_err(|e| ServiceError::repository("Users", e))?;

        log::info!("Password changed for user {}", user.id);
        Ok(())
    }

    pub(crate) async fn forgot_password(
        &self,
        email: &str,
    ) -> Result<ForgotPasswordOutcome, ServiceError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ServiceError::validation("email", "is required"));
        }

        let Some(user) = self.find_by_email(email).await? else {
            log::info!("Password reset requested for unknown email");
            return Ok(ForgotPasswordOutcome::generic());
        };

        let token = generate_reset_token();
        let expiry = (Utc::now() + Duration::hours(RESET_TOKEN_LIFETIME_HOURS)).timestamp_millis();
        let patch = UserPatch {
            reset_token: Some(Some(token.clone())),
            reset_token_expiry: Some(Some(expiry.to_string())),
            ..Default::default()
        };
        self.repository
            .update_user(&user.id, &patch)
            .await
            .map_err(|e| ServiceError::repository("Users", e))?;

        let link = format!("{}/reset-password?token={}", self.public_url, token);

        let delivery = match &self.mailer {
            Some(mailer) => mailer
                .send_password_reset(&user.fields.email, &user.fields.full_name, &link)
                .await
                .map_err(|e| e.to_string()),
            None => Err("no mail transport configured".to_string()),
        };

        match delivery {
            Ok(()) => Ok(ForgotPasswordOutcome::generic()),
            Err(reason) if self.production => {
                log::error!("Password reset email for {} not sent: {}", user.id, reason);
                Ok(ForgotPasswordOutcome::generic())
            }
            Err(reason) => {
                log::warn!("Password reset email not sent ({}). Reset link: {}", reason, link);
                Ok(ForgotPasswordOutcome {
                    reset_link: Some(link),
                    notice: Some(FALLBACK_NOTICE.to_string()),
                    ..ForgotPasswordOutcome::generic()
                })
            }
        }
    }

    pub(crate) async fn reset_password(
        &self,
        token: &str,
        password: &str,
    ) -> Result<(), ServiceError> {
        let token = token.trim();
        let invalid = || ServiceError::InvalidToken("Invalid or expired reset token".to_string());
        if token.is_empty() {
            return Err(invalid());
        }

        let user = self
            .repository
            .find_user_by_reset_token(token)
            .await
            .map_err(|e| ServiceError::repository("Users", e))?
            .ok_or_else(invalid)?;

        let expires_at = user
            .fields
            .reset_token_expiry
            .as_deref()
            .and_then(|expiry| expiry.trim().parse::<i64>().ok());
        if !expires_at.is_some_and(|expires_at| expires_at > Utc::now().timestamp_millis()) {
            return Err(ServiceError::InvalidToken("Reset token has expired".to_string()));
        }

        validate_new_password("password", password)?;

        let patch = UserPatch {
            password_hash: Some(
                hash_password(password).map_err(|e| ServiceError::Internal(e.to_string()))?,
            ),
            reset_token: Some(None),
            reset_token_expiry: Some(None),
            ..Default::default()
        };
        self.repository
            .update_user(&user.id, &patch)
            .await
            .map_err(|e| ServiceError::repository("Users", e))?;

        log::info!("Password reset for user {}", user.id);
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        self.repository
            .find_user_by_email(email)
            .await
            .map_err(|e| ServiceError::repository("Users", e))
    }
}

fn validate_new_password(field: &str, password: &str) -> Result<(), ServiceError> {
    if utils::validate_password(password) {
        Ok(())
    } else {
        Err(ServiceError::validation(
            field,
            &format!("must be at least {} characters", utils::MIN_PASSWORD_LENGTH),
        ))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn generate_reset_token() -> String {
    let bytes: [u8; RESET_TOKEN_BYTES] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::Register {
                registration,
                response,
            } => {
                let user = self.register(registration).await;
                let _ = response.send(user);
            }
            UserRequest::GetProfile { user_id, response } => {
                let user = self.get_profile(&user_id).await;
                let _ = response.send(user);
            }
            UserRequest::UpdateProfile {
                user_id,
                update,
                response,
            } => {
                let user = self.update_profile(&user_id, update).await;
                let _ = response.send(user);
            }
            UserRequest::ChangePassword {
                user_id,
                current_password,
                new_password,
                response,
            } => {
                let result = self
                    .change_password(&user_id, &current_password, &new_password)
                    .await;
                let _ = response.send(result);
            }
            UserRequest::ForgotPassword { email, response } => {
                let outcome = self.forgot_password(&email).await;
                let _ = response.send(outcome);
            }
            UserRequest::ResetPassword {
                token,
                password,
                response,
            } => {
                let result = self.reset_password(&token, &password).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
