//! Twilio REST client and send outcome classification.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Fixed retry backoff schedule, indexed by attempt number.
const BACKOFF_SCHEDULE: [Duration; 3] = [
    Duration::from_millis(200),
    Duration::from_millis(600),
    Duration::from_millis(1400),
];

/// An outbound SMS send.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub to: String,
    pub body: String,
    /// Where Twilio should POST status callbacks for this message.
    pub status_callback_url: Option<String>,
}

/// A provider acceptance (any 2xx with a message sid).
#[derive(Debug, Clone)]
pub struct SendSuccess {
    /// Twilio message sid; later correlated by the callback reconciler.
    pub sid: String,
    /// Vendor status at accept time (typically "queued" or "accepted").
    pub status: String,
    pub http_status: u16,
    pub raw_body: String,
}

/// A failed provider call, classified for the retry decision.
#[derive(Debug, Error)]
pub enum SendError {
    /// Twilio answered with a non-2xx status.
    #[error("twilio rejected send ({http_status}): {message}")]
    Rejected {
        http_status: u16,
        message: String,
        error_code: Option<i64>,
        raw_body: String,
    },

    /// The request timed out (connect or response deadline).
    #[error("twilio request timed out")]
    Timeout,

    /// Transport-level failure that is not a timeout.
    #[error("twilio transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Twilio answered 2xx but the body carried no message sid. Treated as
    /// non-retryable: resending could double-deliver.
    #[error("twilio returned {http_status} without a message sid")]
    MissingSid { http_status: u16, raw_body: String },
}

impl SendError {
    /// Retry decision for transient failures: request timeouts, 408, 429
    /// and 5xx retry; everything else is terminal for the message.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Rejected { http_status, .. } => {
                matches!(http_status, 408 | 429) || (500..=599).contains(http_status)
            }
            Self::Transport(_) | Self::MissingSid { .. } => false,
        }
    }

    /// HTTP status of the failed call, if one was received.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Rejected { http_status, .. } | Self::MissingSid { http_status, .. } => {
                Some(*http_status)
            }
            Self::Timeout | Self::Transport(_) => None,
        }
    }

    /// Raw response body of the failed call, if one was received.
    #[must_use]
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            Self::Rejected { raw_body, .. } | Self::MissingSid { raw_body, .. } => Some(raw_body),
            Self::Timeout | Self::Transport(_) => None,
        }
    }

    /// Twilio error code from the response body, if present.
    #[must_use]
    pub fn error_code(&self) -> Option<i64> {
        match self {
            Self::Rejected { error_code, .. } => *error_code,
            _ => None,
        }
    }
}

/// Backoff before retrying `attempt` (0-based). Out-of-range attempts get
/// the last schedule entry.
#[must_use]
pub fn backoff(attempt: usize) -> Duration {
    BACKOFF_SCHEDULE[attempt.min(BACKOFF_SCHEDULE.len() - 1)]
}

/// Send seam consumed by the dispatch worker; test doubles implement this.
#[async_trait]
pub trait TwilioSender: Send + Sync {
    async fn send(&self, request: &SendRequest) -> Result<SendSuccess, SendError>;
}

/// Configuration for [`TwilioClient`].
#[derive(Debug, Clone)]
pub struct TwilioClientConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Preferred over `from_number` when set.
    pub messaging_service_sid: Option<String>,
    pub from_number: Option<String>,
    /// Default `https://api.twilio.com`; overridden in tests.
    pub base_url: String,
    /// Whole-request timeout on the underlying HTTP client. The worker
    /// applies its own tighter per-attempt deadline on top.
    pub request_timeout: Duration,
}

/// Lenient view of Twilio's message resource response. Fields are optional
/// because error bodies and success bodies share this shape only loosely.
#[derive(Debug, Default, Deserialize)]
struct TwilioMessageBody {
    #[serde(default)]
    sid: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Twilio REST API client.
pub struct TwilioClient {
    http: reqwest::Client,
    config: TwilioClientConfig,
}

impl TwilioClient {
    /// Build a client; fails only if the TLS backend cannot initialize.
    pub fn new(config: TwilioClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.base_url.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl TwilioSender for TwilioClient {
    async fn send(&self, request: &SendRequest) -> Result<SendSuccess, SendError> {
        let mut form: Vec<(&str, &str)> = vec![("To", &request.to), ("Body", &request.body)];
        if let Some(url) = &request.status_callback_url {
            form.push(("StatusCallback", url));
        }
        if let Some(mss) = &self.config.messaging_service_sid {
            form.push(("MessagingServiceSid", mss));
        } else if let Some(from) = &self.config.from_number {
            form.push(("From", from));
        }

        let response = self
            .http
            .post(self.endpoint())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(classify_transport)?;

        let http_status = response.status().as_u16();
        let raw_body = response.text().await.map_err(classify_transport)?;
        let body: TwilioMessageBody = serde_json::from_str(&raw_body).unwrap_or_default();

        if !(200..300).contains(&http_status) {
            let message = body
                .message
                .unwrap_or_else(|| "twilio send failed".to_string());
            return Err(SendError::Rejected {
                http_status,
                message,
                error_code: body.error_code,
                raw_body,
            });
        }

        let Some(sid) = body.sid.filter(|s| !s.is_empty()) else {
            return Err(SendError::MissingSid {
                http_status,
                raw_body,
            });
        };

        Ok(SendSuccess {
            sid,
            status: body.status.unwrap_or_default(),
            http_status,
            raw_body,
        })
    }
}

fn classify_transport(error: reqwest::Error) -> SendError {
    if error.is_timeout() {
        SendError::Timeout
    } else {
        SendError::Transport(error)
    }
}
