use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of the users table.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UserFields {
    #[serde(rename = "Full_Name", default)]
    pub full_name: String,
    #[serde(rename = "Username", default)]
    pub username: String,
    #[serde(rename = "Email", default)]
    pub email: String,
    #[serde(rename = "Phone", default)]
    pub phone: String,
    #[serde(rename = "Password_Hash", default)]
    pub password_hash: String,
    #[serde(rename = "Reset_Token", default, skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
    /// Epoch milliseconds, stored as text.
    #[serde(
        rename = "Reset_Token_Expiry",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reset_token_expiry: Option<String>,
    #[serde(
        rename = "Profile_Image",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub profile_image: Option<String>,
    #[serde(rename = "Address", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "Created_At", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: String,
    pub fields: UserFields,
}

/// Partial update of a user record. `Some(None)` on the reset fields clears them.
#[derive(Clone, Debug, Default, Serialize)]
pub struct UserPatch {
    #[serde(rename = "Full_Name", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(rename = "Phone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "Address", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "Profile_Image", skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(rename = "Password_Hash", skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(rename = "Reset_Token", skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<Option<String>>,
    #[serde(rename = "Reset_Token_Expiry", skip_serializing_if = "Option::is_none")]
    pub reset_token_expiry: Option<Option<String>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.profile_image.is_none()
            && self.password_hash.is_none()
            && self.reset_token.is_none()
            && self.reset_token_expiry.is_none()
    }
}

/// What the API shows about a user. Never carries the hash or reset fields.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub profile_image: Option<String>,
    pub address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        let fields = &user.fields;

        Self {
            id: user.id.clone(),
            full_name: fields.full_name.clone(),
            username: fields.username.clone(),
            email: fields.email.clone(),
            phone: fields.phone.clone(),
            profile_image: fields.profile_image.clone(),
            address: fields.address.clone(),
            created_at: fields.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_clears_reset_fields_with_nulls() {
        let patch = UserPatch {
            password_hash: Some("$argon2id$v=19$...".to_string()),
            reset_token: Some(None),
            reset_token_expiry: Some(None),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({
                "Password_Hash": "$argon2id$v=19$...",
                "Reset_Token": null,
                "Reset_Token_Expiry": null
            })
        );
        assert!(!patch.is_empty());
        assert!(UserPatch::default().is_empty());
    }

    #[test]
    fn view_hides_credentials() {
        let user: User = serde_json::from_value(json!({
            "id": "recUser1",
            "fields": {
                "Full_Name": "Ama Mensah",
                "Username": "ama",
                "Email": "ama@example.com",
                "Phone": "0241234567",
                "Password_Hash": "secret-hash",
                "Reset_Token": "abc",
                "Reset_Token_Expiry": "1700000000000"
            }
        }))
        .unwrap();

        let view = serde_json::to_value(UserView::from(&user)).unwrap();
        let text = view.to_string();

        assert_eq!(view["username"], "ama");
        assert!(!text.contains("secret-hash"));
        assert!(!text.contains("1700000000000"));
    }
}
