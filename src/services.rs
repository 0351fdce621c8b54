use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::repositories::{
    airtable::AirtableClient, cloudinary::CloudinaryClient, mail::SmtpMailer,
    orders::AirtableOrderRepository, rates::AirtableRateRepository, sms::TwilioSmsGateway,
    users::AirtableUserRepository, ImageHost, MailTransport, OrderRepository, RateRepository,
    UserRepository,
};
use crate::settings::Settings;

pub mod auth;
pub mod http;
pub mod notifier;
pub mod orders;
pub mod rates;
pub mod users;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
    #[error("Image upload failed: {0}")]
    UploadFailed(String),
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidToken(String),
    #[error("CredentialsSignin")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    Unavailable(String),
}

impl ServiceError {
    pub fn validation(field: &str, message: &str) -> Self {
        ServiceError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn repository(service: &str, error: anyhow::Error) -> Self {
        ServiceError::Repository(service.to_string(), error.to_string())
    }
}

/// Reply half handed to a service along with each request.
pub type Reply<T> = oneshot::Sender<Result<T, ServiceError>>;

/// Sends a request built around a fresh reply channel and waits for the answer.
pub async fn call<R, T>(
    channel: &mpsc::Sender<R>,
    service: &str,
    request: impl FnOnce(Reply<T>) -> R,
) -> Result<T, ServiceError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(request(response_tx))
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(settings: Settings) -> Result<(), anyhow::Error> {
    let image_host: Option<Arc<dyn ImageHost>> = match &settings.cloudinary {
        Some(cloudinary) => {
            Some(Arc::new(CloudinaryClient::new(cloudinary)) as Arc<dyn ImageHost>)
        }
        None => {
            log::warn!("Cloudinary is not configured; image uploads are disabled.");
            None
        }
    };

    let mailer: Option<Arc<dyn MailTransport>> = match &settings.smtp {
        Some(smtp) => match SmtpMailer::connect(smtp).await {
            Ok(mailer) => {
                log::info!("Mail transport ready.");
                Some(Arc::new(mailer) as Arc<dyn MailTransport>)
            }
            Err(e) => {
                log::error!("Mail transport unavailable, reset links will be logged: {}", e);
                None
            }
        },
        None => {
            log::warn!("SMTP is not configured; reset links will be logged.");
            None
        }
    };

    let mut state = http::AppState::new(&settings);

    match &settings.airtable {
        Some(airtable) => {
            let client = Arc::new(AirtableClient::new(airtable)?);
            let order_repository: Arc<dyn OrderRepository> = Arc::new(
                AirtableOrderRepository::new(client.clone(), airtable.orders_table.clone()),
            );
            let user_repository: Arc<dyn UserRepository> = Arc::new(
                AirtableUserRepository::new(client.clone(), airtable.users_table.clone()),
            );
            let rate_repository: Arc<dyn RateRepository> = Arc::new(
                AirtableRateRepository::new(client, airtable.rates_table.clone()),
            );

            let (rate_tx, mut rate_rx) = mpsc::channel(512);
            let (order_tx, mut order_rx) = mpsc::channel(512);
            let (user_tx, mut user_rx) = mpsc::channel(512);

            log::info!("Starting rate service.");
            let mut rate_service = rates::RateService::new();
            let rate_handler = rates::RateRequestHandler::new(rate_repository);
            tokio::spawn(async move {
                rate_service.run(rate_handler, &mut rate_rx).await;
            });

            log::info!("Starting order service.");
            let mut order_service = orders::OrderService::new();
            let order_handler = orders::OrderRequestHandler::new(
                order_repository.clone(),
                image_host.clone(),
                rate_tx.clone(),
            );
            tokio::spawn(async move {
                order_service.run(order_handler, &mut order_rx).await;
            });

            log::info!("Starting user service.");
            let mut user_service = users::UserService::new();
            let user_handler = users::UserRequestHandler::new(
                user_repository.clone(),
                image_host,
                mailer,
                settings.server.public_url.clone(),
                settings.server.production,
            );
            tokio::spawn(async move {
                user_service.run(user_handler, &mut user_rx).await;
            });

            match &settings.sms {
                Some(sms) => {
                    log::info!("Starting payment notifier.");
                    let notifier = notifier::PaymentNotifier::new(
                        order_repository,
                        Arc::new(TwilioSmsGateway::new(sms)),
                        sms.country_code.clone(),
                        Duration::from_secs(settings.notifier.interval_secs),
                    )?;
                    notifier.start();
                }
                None => log::warn!("SMS is not configured; payment notifier not started."),
            }

            state = state.with_backend(http::Backend {
                rates: rate_tx,
                orders: order_tx,
                users: user_tx,
                authenticator: Arc::new(auth::CredentialsAuthenticator::new(user_repository)),
            });
        }
        None => {
            log::warn!("Airtable is not configured; datastore endpoints will answer 503.");
        }
    }

    log::info!("Starting HTTP server.");
    http::start_http_server(state, &settings.server).await
}
