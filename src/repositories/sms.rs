use anyhow::bail;
use async_trait::async_trait;

use super::SmsGateway;
use crate::settings;

/// Twilio-compatible messaging API.
pub struct TwilioSmsGateway {
    url: String,
    account_sid: String,
    auth_token: String,
    from: String,
    client: reqwest::Client,
}

impl TwilioSmsGateway {
    pub fn new(settings: &settings::Sms) -> Self {
        Self {
            url: settings.url.trim_end_matches('/').to_string(),
            account_sid: settings.account_sid.clone(),
            auth_token: settings.auth_token.clone(),
            from: settings.from.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SmsGateway for TwilioSmsGateway {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), anyhow::Error> {
        let response = self
            .client
            .post(format!(
                "{}/2010-04-01/Accounts/{}/Messages.json",
                self.url, self.account_sid
            ))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("SMS: sending to {} failed with {}: {}", to, status, body);
        }

        Ok(())
    }
}
