//! Webhook notifications for the attendance tracker.
//!
//! Posts a notice to a configured HTTP endpoint when a check-in session
//! opens, e.g. a class group chat integration, so a level learns attendance
//! is being taken without anyone asking the delegate.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use att_core::types::Matricule;

/// Default request timeout for webhook deliveries.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Notification client errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The configured webhook URL was unusable.
    #[error("invalid webhook URL: {reason}")]
    InvalidWebhook { reason: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The endpoint refused the notice.
    #[error("webhook returned status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Webhook delivery client.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
pub struct Client {
    http: reqwest::Client,
    webhook_url: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Webhook URLs routinely embed access tokens.
        f.debug_struct("Client")
            .field("webhook_url", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new client for the given webhook endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty, whitespace-only, or not an
    /// http(s) endpoint, or if the HTTP client fails to build.
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, NotifyError> {
        let webhook_url = webhook_url.into();

        if webhook_url.is_empty() {
            return Err(NotifyError::InvalidWebhook {
                reason: "webhook URL cannot be empty",
            });
        }
        if webhook_url.trim().is_empty() {
            return Err(NotifyError::InvalidWebhook {
                reason: "webhook URL cannot be whitespace-only",
            });
        }
        if !webhook_url.starts_with("http://") && !webhook_url.starts_with("https://") {
            return Err(NotifyError::InvalidWebhook {
                reason: "webhook URL must start with http:// or https://",
            });
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(NotifyError::ClientBuild)?;

        Ok(Self { http, webhook_url })
    }

    /// Delivers a session-opened notice to the webhook.
    pub async fn send_session_opened(&self, notice: &SessionNotice) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            text: build_message(notice),
            course: notice.course.clone(),
            level: notice.level,
            scheduled_at: notice.scheduled_at.clone(),
            expires_at: notice.expires_at.clone(),
            delegate: notice.delegate.to_string(),
            lecture_description: notice.lecture_description.clone(),
        };

        let response = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// What just opened, ready for delivery.
///
/// Timestamps arrive preformatted; the caller decides rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNotice {
    pub course: String,
    pub level: i64,
    /// The course session's timetabled date-time.
    pub scheduled_at: String,
    /// End of the check-in window.
    pub expires_at: String,
    pub delegate: Matricule,
    pub lecture_description: String,
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
    text: String,
    course: String,
    level: i64,
    scheduled_at: String,
    expires_at: String,
    delegate: String,
    lecture_description: String,
}

fn build_message(notice: &SessionNotice) -> String {
    let mut message = format!(
        "Check-in open for {} (level {}) scheduled {}. Window closes at {}.",
        notice.course, notice.level, notice.scheduled_at, notice.expires_at,
    );
    if !notice.lecture_description.is_empty() {
        message.push_str(&format!(" Lecture: {}.", notice.lecture_description));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_notice() -> SessionNotice {
        SessionNotice {
            course: "DB101".to_string(),
            level: 2,
            scheduled_at: "2024-02-01T10:00:00Z".to_string(),
            expires_at: "2024-02-01T10:30:00Z".to_string(),
            delegate: Matricule::new("DEL001").unwrap(),
            lecture_description: "Relational algebra".to_string(),
        }
    }

    #[test]
    fn client_rejects_empty_webhook_url() {
        assert!(matches!(
            Client::new(""),
            Err(NotifyError::InvalidWebhook { .. })
        ));
    }

    #[test]
    fn client_rejects_whitespace_webhook_url() {
        assert!(matches!(
            Client::new("   "),
            Err(NotifyError::InvalidWebhook { .. })
        ));
    }

    #[test]
    fn client_rejects_non_http_webhook_url() {
        assert!(matches!(
            Client::new("ftp://chat.example.edu/hook"),
            Err(NotifyError::InvalidWebhook { .. })
        ));
    }

    #[test]
    fn client_accepts_https_webhook_url() {
        assert!(Client::new("https://chat.example.edu/hooks/t0k3n").is_ok());
    }

    #[test]
    fn client_debug_redacts_webhook_url() {
        let client = Client::new("https://chat.example.edu/hooks/t0k3n").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("t0k3n"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn build_message_names_course_and_window() {
        let message = build_message(&sample_notice());
        assert_eq!(
            message,
            "Check-in open for DB101 (level 2) scheduled 2024-02-01T10:00:00Z. \
             Window closes at 2024-02-01T10:30:00Z. Lecture: Relational algebra."
        );
    }

    #[test]
    fn build_message_omits_blank_lecture() {
        let mut notice = sample_notice();
        notice.lecture_description = String::new();
        let message = build_message(&notice);
        assert!(!message.contains("Lecture"));
        assert!(message.ends_with("10:30:00Z."));
    }

    #[test]
    fn payload_serializes_expected_fields() {
        let notice = sample_notice();
        let payload = WebhookPayload {
            text: build_message(&notice),
            course: notice.course.clone(),
            level: notice.level,
            scheduled_at: notice.scheduled_at.clone(),
            expires_at: notice.expires_at.clone(),
            delegate: notice.delegate.to_string(),
            lecture_description: notice.lecture_description.clone(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["course"], "DB101");
        assert_eq!(value["level"], 2);
        assert_eq!(value["delegate"], "DEL001");
        assert_eq!(value["expires_at"], "2024-02-01T10:30:00Z");
        assert!(
            value["text"]
                .as_str()
                .unwrap()
                .starts_with("Check-in open")
        );
    }

    #[tokio::test]
    async fn send_reports_transport_errors() {
        // Port 0 is never connectable; the request must fail client-side.
        let client = Client::new("http://127.0.0.1:0/hook").unwrap();
        let err = client
            .send_session_opened(&sample_notice())
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Request(_)));
    }
}
