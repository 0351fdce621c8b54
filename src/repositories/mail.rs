use anyhow::bail;
use async_trait::async_trait;
use handlebars::Handlebars;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;

use super::MailTransport;
use crate::settings;

const PASSWORD_RESET_TEMPLATE: &str = "password_reset";

/// SMTP mailer. Built once at startup and shared; construction verifies the relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    templates: Handlebars<'static>,
}

impl SmtpMailer {
    /// Connects to the relay and checks the credentials. The caller decides what to
    /// do without a mailer when this fails.
    pub async fn connect(settings: &settings::Smtp) -> Result<Self, anyhow::Error> {
        let from = format!("TRADE RMB <{}>", settings.from).parse::<Mailbox>()?;
        let credentials = Credentials::new(settings.username.clone(), settings.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?
            .credentials(credentials)
            .build();

        if !transport.test_connection().await? {
            bail!("SMTP: relay {} refused the connection", settings.host);
        }

        Ok(Self {
            transport,
            from,
            templates: templates()?,
        })
    }
}

fn templates() -> Result<Handlebars<'static>, anyhow::Error> {
    let mut handlebars = Handlebars::new();
    handlebars.register_template_string(
        PASSWORD_RESET_TEMPLATE,
        include_str!("../../templates/password_reset.hbs"),
    )?;

    Ok(handlebars)
}

fn render_password_reset(
    templates: &Handlebars<'static>,
    full_name: &str,
    link: &str,
) -> Result<String, anyhow::Error> {
    let body = templates.render(
        PASSWORD_RESET_TEMPLATE,
        &json!({ "full_name": full_name, "link": link }),
    )?;

    Ok(body)
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send_password_reset(
        &self,
        to: &str,
        full_name: &str,
        link: &str,
    ) -> Result<(), anyhow::Error> {
        let html_body = render_password_reset(&self.templates, full_name, link)?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>()?)
            .subject("Reset your TRADE RMB password")
            .header(ContentType::TEXT_HTML)
            .body(html_body)?;

        self.transport.send(email).await?;
        log::info!("Password reset email sent to {}", to);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_email_contains_the_link_and_escapes_the_name() {
        let templates = templates().unwrap();
        let body = render_password_reset(
            &templates,
            "Ama <Mensah>",
            "http://localhost:3000/reset-password?token=abc",
        )
        .unwrap();

        assert!(body.contains("http://localhost:3000/reset-password?token=abc"));
        assert!(body.contains("Ama &lt;Mensah&gt;"));
    }
}
