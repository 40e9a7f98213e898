use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::MessagingConfig;

/// Identifier returned by the messaging provider for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryId(pub String);

/// Outbound channels supported by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    WhatsApp,
    Email,
}

impl Channel {
    pub const fn label(self) -> &'static str {
        match self {
            Channel::WhatsApp => "whatsapp",
            Channel::Email => "email",
        }
    }
}

/// Transport errors surfaced by a concrete gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("messaging transport unavailable: {0}")]
    Transport(String),
    #[error("messaging provider rejected the request: {0}")]
    Rejected(String),
    #[error("messaging request timed out")]
    Timeout,
}

/// Dispatch failures; callers treat these as non-fatal and degrade the
/// affected record instead of aborting the workflow.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("recipient '{0}' has no digits to form a channel address")]
    EmptyRecipient(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Trait describing the outbound messaging provider (WhatsApp + email).
pub trait MessagingGateway: Send + Sync {
    fn send_whatsapp(&self, address: &str, text: &str) -> Result<DeliveryId, GatewayError>;
    fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<DeliveryId, GatewayError>;
}

/// Channel-specific formatting plus send, in front of a pluggable gateway.
pub struct NotificationDispatcher {
    gateway: std::sync::Arc<dyn MessagingGateway>,
    config: MessagingConfig,
}

impl NotificationDispatcher {
    pub fn new(gateway: std::sync::Arc<dyn MessagingGateway>, config: MessagingConfig) -> Self {
        Self { gateway, config }
    }

    /// Deliver `text` over `channel`, normalizing the recipient first.
    pub fn send(
        &self,
        channel: Channel,
        recipient: &str,
        subject: Option<&str>,
        text: &str,
    ) -> Result<DeliveryId, DispatchError> {
        match channel {
            Channel::WhatsApp => {
                let address = self.whatsapp_address(recipient)?;
                debug!(channel = channel.label(), %address, "dispatching notification");
                Ok(self.gateway.send_whatsapp(&address, text)?)
            }
            Channel::Email => {
                let subject = subject.unwrap_or_default();
                debug!(channel = channel.label(), to = recipient, "dispatching notification");
                Ok(self.gateway.send_email(recipient, subject, text)?)
            }
        }
    }

    /// Build the provider address: digits only, country prefix guaranteed,
    /// domain suffix appended.
    pub fn whatsapp_address(&self, raw: &str) -> Result<String, DispatchError> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(DispatchError::EmptyRecipient(raw.to_string()));
        }

        let number = if digits.starts_with(&self.config.country_prefix) {
            digits
        } else {
            format!("{}{}", self.config.country_prefix, digits)
        };

        Ok(format!("{}{}", number, self.config.address_domain))
    }
}

/// HTTP client for the messaging provider, usable from synchronous workflow
/// code. Every call is bounded by the configured timeout.
#[derive(Debug)]
pub struct HttpMessagingClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl HttpMessagingClient {
    pub fn new(config: &MessagingConfig) -> Result<Self, GatewayError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn post_message(
        &self,
        path: &str,
        payload: serde_json::Value,
    ) -> Result<DeliveryId, GatewayError> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Transport(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct ProviderResponse {
            id: Option<String>,
        }

        let body: ProviderResponse = response
            .json()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        Ok(DeliveryId(body.id.unwrap_or_default()))
    }
}

impl MessagingGateway for HttpMessagingClient {
    fn send_whatsapp(&self, address: &str, text: &str) -> Result<DeliveryId, GatewayError> {
        self.post_message(
            "messages",
            json!({
                "chatId": address,
                "text": text,
            }),
        )
    }

    fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<DeliveryId, GatewayError> {
        self.post_message(
            "mail",
            json!({
                "to": to,
                "subject": subject,
                "html": html,
            }),
        )
    }
}
