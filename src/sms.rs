//! Outbound SMS for verification codes.
//!
//! Delivery is fire-and-forget: a failed send is reported to the caller once
//! and never retried. Twilio is used when credentials are configured;
//! otherwise messages go to the log, which is only suitable for development.

use std::time::Duration;

use crate::config::Config;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Provider rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },
}

pub trait SmsSender: Send + Sync {
    /// Send `body` to an E.164 number (`+9715...`).
    fn send(&self, to: &str, body: &str) -> Result<(), SmsError>;
}

/// Twilio Messages API over blocking HTTP.
pub struct TwilioSender {
    client: reqwest::blocking::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    api_base: String,
}

impl TwilioSender {
    pub fn new(
        account_sid: String,
        auth_token: String,
        from_number: String,
        timeout: Duration,
    ) -> Result<Self, SmsError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            account_sid,
            auth_token,
            from_number,
            api_base: TWILIO_API_BASE.to_string(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.account_sid
        )
    }
}

impl SmsSender for TwilioSender {
    fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().unwrap_or_default();
            return Err(SmsError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
pub struct LogSmsSender;

impl SmsSender for LogSmsSender {
    fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
        log::info!("SMS to {}: {}", to, body);
        Ok(())
    }
}

/// Pick the sender the configuration supports.
pub fn sender_from_config(config: &Config) -> Result<Box<dyn SmsSender>, SmsError> {
    match (
        &config.twilio_account_sid,
        &config.twilio_auth_token,
        &config.twilio_from_number,
    ) {
        (Some(sid), Some(token), Some(from)) => Ok(Box::new(TwilioSender::new(
            sid.clone(),
            token.clone(),
            from.clone(),
            Duration::from_secs(config.upstream_timeout_secs),
        )?)),
        _ => {
            log::warn!("Twilio is not configured; verification SMS will only be logged");
            Ok(Box::new(LogSmsSender))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_url() {
        let sender = TwilioSender::new(
            "AC123".into(),
            "secret".into(),
            "+15550001111".into(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            sender.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn test_sender_from_config_falls_back_to_log() {
        let config = Config::default();
        let sender = sender_from_config(&config).unwrap();
        assert!(sender.send("+971500000000", "hello").is_ok());
    }

    #[test]
    fn test_recording_sender() {
        let sender = test_support::RecordingSender::default();
        sender.send("+971501234567", "code 123456").unwrap();
        assert_eq!(sender.last_body().as_deref(), Some("code 123456"));
        assert!(test_support::RecordingSender::failing()
            .send("+1", "x")
            .is_err());
    }
}
