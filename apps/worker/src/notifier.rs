//! Alert delivery.

use async_trait::async_trait;
use tracing::info;

use crate::error::NotifyError;

/// Longest SMS body Twilio accepts
const MAX_MESSAGE_LEN: usize = 1600;

/// Delivers one alert message to one destination
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError>;
}

/// Notifier that only records alerts in the service log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        info!(destination, "{message}");
        Ok(())
    }
}

/// Twilio account used for SMS alerts
#[derive(Debug, Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
}

/// SMS alerts through the Twilio Messages API
///
/// Destinations are ten digit North American numbers, sent as `+1<phone>`.
pub struct TwilioNotifier {
    client: reqwest::Client,
    api_base: String,
    credentials: TwilioCredentials,
}

impl TwilioNotifier {
    pub const DEFAULT_API_BASE: &'static str = "https://api.twilio.com";

    pub fn new(api_base: impl Into<String>, credentials: TwilioCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            credentials,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}/Messages.json", self.api_base, self.credentials.account_sid)
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        let phone = destination.trim();
        let message = message.trim();

        if phone.len() != 10 || !phone.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NotifyError::InvalidParameters);
        }
        if message.is_empty() || message.len() >= MAX_MESSAGE_LEN {
            return Err(NotifyError::InvalidParameters);
        }

        let to = format!("+1{phone}");
        let form = [
            ("From", self.credentials.from_phone.as_str()),
            ("To", to.as_str()),
            ("Body", message),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .form(&form)
            .send()
            .await?;

        match response.status().as_u16() {
            200 | 201 => Ok(()),
            status => Err(NotifyError::Status(status)),
        }
    }
}
