/// Outbound SMS through an HTTP gateway
///
/// Mirrors the mailer: a missing gateway configuration turns every send into
/// a logged no-op.
use crate::config::{ServerConfig, SmsConfig};
use crate::error::{ApiError, ApiResult};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct GatewayRequest<'a> {
    username: &'a str,
    password: &'a str,
    sender: &'a str,
    recipient: &'a str,
    message: &'a str,
}

pub struct SmsSender {
    client: reqwest::Client,
    config: Option<SmsConfig>,
}

impl SmsSender {
    pub fn new(config: &ServerConfig) -> Self {
        if config.sms.is_none() {
            tracing::warn!("SMS gateway not configured, outbound SMS disabled");
        }

        Self {
            client: reqwest::Client::new(),
            config: config.sms.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Phone verification code, valid for ten minutes
    pub async fn send_verification_otp(&self, recipient: &str, otp: &str) -> ApiResult<()> {
        let message = format!(
            "Your verification code is {}. It expires in 10 minutes.",
            otp
        );
        self.send(recipient, &message).await
    }

    async fn send(&self, recipient: &str, message: &str) -> ApiResult<()> {
        let Some(config) = &self.config else {
            tracing::warn!(recipient, "SMS send skipped, gateway not configured");
            return Ok(());
        };

        let response = self
            .client
            .post(&config.gateway_url)
            .json(&GatewayRequest {
                username: &config.username,
                password: &config.password,
                sender: &config.sender_alias,
                recipient,
                message,
            })
            .send()
            .await
            .map_err(|e| ApiError::Internal(format!("SMS gateway request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ApiError::Internal(format!(
                "SMS gateway returned {}",
                response.status()
            )));
        }

        tracing::debug!(recipient, "SMS sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    #[test]
    fn test_disabled_without_gateway_config() {
        let sender = SmsSender::new(&test_config());
        assert!(!sender.is_enabled());
    }

    #[tokio::test]
    async fn test_disabled_sender_sends_are_noops() {
        let sender = SmsSender::new(&test_config());
        assert!(sender
            .send_verification_otp("0766308272", "123456")
            .await
            .is_ok());
    }
}
