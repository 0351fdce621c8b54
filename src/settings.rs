use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Server {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default)]
    pub production: bool,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            public_url: default_public_url(),
            production: false,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Airtable {
    pub api_key: String,
    pub base_id: String,
    #[serde(default = "default_orders_table")]
    pub orders_table: String,
    #[serde(default = "default_users_table")]
    pub users_table: String,
    #[serde(default = "default_rates_table")]
    pub rates_table: String,
    #[serde(default = "default_airtable_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Cloudinary {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_cloudinary_url")]
    pub url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Smtp {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Sms {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    #[serde(default = "default_sms_url")]
    pub url: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Session {
    pub secret: String,
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Admin {
    pub api_key: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Notifier {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for Notifier {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

/// Every collaborator section is optional. A missing section switches off the
/// feature that needs it instead of failing startup.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: Server,
    pub airtable: Option<Airtable>,
    pub cloudinary: Option<Cloudinary>,
    pub smtp: Option<Smtp>,
    pub sms: Option<Sms>,
    pub session: Option<Session>,
    pub admin: Option<Admin>,
    #[serde(default)]
    pub notifier: Notifier,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("TRADE_RMB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_orders_table() -> String {
    "Orders".to_string()
}

fn default_users_table() -> String {
    "Users".to_string()
}

fn default_rates_table() -> String {
    "Rates".to_string()
}

fn default_airtable_url() -> String {
    "https://api.airtable.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_folder() -> String {
    "trade-rmb".to_string()
}

fn default_cloudinary_url() -> String {
    "https://api.cloudinary.com".to_string()
}

fn default_sms_url() -> String {
    "https://api.twilio.com".to_string()
}

fn default_country_code() -> String {
    "233".to_string()
}

fn default_ttl_hours() -> i64 {
    24
}

fn default_interval_secs() -> u64 {
    60
}
