use std::sync::Arc;

use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use rand::rngs::OsRng;

use super::ServiceError;
use crate::models::users::User;
use crate::repositories::UserRepository;

/// Who a set of credentials belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
}

impl From<&User> for UserIdentity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.fields.username.clone(),
            email: user.fields.email.clone(),
            full_name: user.fields.full_name.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthFailure {
    /// Unknown identifier and wrong secret are indistinguishable.
    #[error("CredentialsSignin")]
    InvalidCredentials,
    #[error("Authentication backend unavailable: {0}")]
    Unavailable(String),
}

impl From<AuthFailure> for ServiceError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::InvalidCredentials => ServiceError::InvalidCredentials,
            AuthFailure::Unavailable(detail) => ServiceError::Repository("Users".to_string(), detail),
        }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<UserIdentity, AuthFailure>;
}

/// Checks an identifier and password against the stored Argon2 hash.
pub struct CredentialsAuthenticator {
    users: Arc<dyn UserRepository>,
}

impl CredentialsAuthenticator {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl Authenticator for CredentialsAuthenticator {
    async fn authenticate(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<UserIdentity, AuthFailure> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.is_empty() {
            return Err(AuthFailure::InvalidCredentials);
        }

        let user = find_by_identifier(self.users.as_ref(), identifier)
            .await
            .map_err(|e| AuthFailure::Unavailable(e.to_string()))?
            .ok_or(AuthFailure::InvalidCredentials)?;

        if !verify_password(secret, &user.fields.password_hash) {
            log::debug!("Rejected password for user {}", user.id);
            return Err(AuthFailure::InvalidCredentials);
        }

        Ok(UserIdentity::from(&user))
    }
}

/// An identifier containing `@` is an email, anything else a username.
pub async fn find_by_identifier(
    users: &dyn UserRepository,
    identifier: &str,
) -> Result<Option<User>, anyhow::Error> {
    if identifier.contains('@') {
        users.find_user_by_email(identifier).await
    } else {
        users.find_user_by_username(identifier).await
    }
}

/// Argon2id PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {}", e))?;

    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::UserFields;
    use crate::testing::InMemoryUsers;

    async fn authenticator_with_ama() -> CredentialsAuthenticator {
        let users = Arc::new(InMemoryUsers::default());
        users
            .create_user(&UserFields {
                full_name: "Ama Mensah".to_string(),
                username: "ama".to_string(),
                email: "Ama@Example.com".to_string(),
                phone: "0241234567".to_string(),
                password_hash: hash_password("correct horse").unwrap(),
                reset_token: None,
                reset_token_expiry: None,
                profile_image: None,
                address: None,
                created_at: None,
            })
            .await
            .unwrap();

        CredentialsAuthenticator::new(users)
    }

    #[test]
    fn hashes_verify_only_the_original_password() {
        let hash = hash_password("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not a hash"));
    }

    #[tokio::test]
    async fn signs_in_by_username_or_email() {
        let authenticator = authenticator_with_ama().await;

        let by_username = authenticator.authenticate("ama", "correct horse").await.unwrap();
        let by_email = authenticator
            .authenticate("ama@example.com", "correct horse")
            .await
            .unwrap();

        assert_eq!(by_username, by_email);
        assert_eq!(by_username.full_name, "Ama Mensah");
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_fail_alike() {
        let authenticator = authenticator_with_ama().await;

        let unknown = authenticator.authenticate("kofi", "correct horse").await;
        let wrong = authenticator.authenticate("ama", "wrong horse").await;

        assert!(matches!(unknown, Err(AuthFailure::InvalidCredentials)));
        assert!(matches!(wrong, Err(AuthFailure::InvalidCredentials)));
    }
}
