//! Best-effort notification and analytics side channel.
//!
//! Everything here is fire-and-forget: a failed send is logged and dropped,
//! never retried, and never surfaced to the operation that triggered it. The
//! primary write has already succeeded by the time any of this runs.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::Tier;
use crate::config::AppConfig;

/// NotifyEvent
///
/// The events the core emits. Each maps to an email, an analytics beacon, or
/// both, depending on the implementation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotifyEvent {
    SubmissionReceived {
        name: String,
        email: String,
        interests: Vec<String>,
        nsfw_requested: bool,
    },
    LoginSucceeded {
        tier: Tier,
        origin_ip: String,
    },
    NsfwApproved {
        name: String,
        email: String,
    },
}

/// Notifier
///
/// Contract: `notify` never fails observably. Implementations swallow their own
/// errors after logging them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: NotifyEvent);
}

/// NotifierState
///
/// The concrete type used to share the notifier across the application state.
pub type NotifierState = Arc<dyn Notifier>;

/// dispatch
///
/// Detaches the send from the request that triggered it. The spawned task owns
/// its clone of the notifier; the handler returns without waiting.
pub fn dispatch(notifier: &NotifierState, event: NotifyEvent) {
    let notifier = notifier.clone();
    tokio::spawn(async move {
        notifier.notify(event).await;
    });
}

/// WebhookNotifier
///
/// Sends notification emails and analytics beacons as JSON POSTs to the
/// configured webhooks. Either webhook may be absent, which simply disables that
/// channel.
pub struct WebhookNotifier {
    client: reqwest::Client,
    email_webhook: Option<String>,
    analytics_webhook: Option<String>,
    admin_email: String,
}

impl WebhookNotifier {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            email_webhook: config.email_webhook.clone(),
            analytics_webhook: config.analytics_webhook.clone(),
            admin_email: config.admin_email.clone(),
        }
    }

    async fn post(&self, url: &str, payload: serde_json::Value) {
        if let Err(err) = self.client.post(url).json(&payload).send().await {
            tracing::warn!("notification post to {url} failed: {err}");
        }
    }

    /// The admin email for a new submission. Formatting stays here, out of the
    /// core flow.
    fn submission_email(&self, name: &str, email: &str, interests: &[String], nsfw: bool) -> serde_json::Value {
        let flag = if nsfw {
            "\n\nNSFW ACCESS REQUESTED (requires approval)"
        } else {
            ""
        };
        json!({
            "to": self.admin_email,
            "subject": format!("New contact form submission from {name}"),
            "text": format!(
                "New contact form submission:\n\nName: {name}\nEmail: {email}\nInterests: {}{flag}",
                interests.join(", ")
            ),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: NotifyEvent) {
        if let Some(url) = &self.email_webhook {
            match &event {
                NotifyEvent::SubmissionReceived {
                    name,
                    email,
                    interests,
                    nsfw_requested,
                } => {
                    self.post(url, self.submission_email(name, email, interests, *nsfw_requested))
                        .await;
                }
                NotifyEvent::NsfwApproved { name, email } => {
                    self.post(
                        url,
                        json!({
                            "to": email,
                            "subject": "Your access request was approved",
                            "text": format!("Hi {name}, your members-area access request has been approved."),
                        }),
                    )
                    .await;
                }
                NotifyEvent::LoginSucceeded { .. } => {}
            }
        }

        if let Some(url) = &self.analytics_webhook {
            // Every event doubles as an analytics data point.
            self.post(url, json!({ "point": event })).await;
        }
    }
}

/// NoopNotifier
///
/// Used in tests and in deployments with no webhooks configured at all.
#[derive(Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: NotifyEvent) {}
}
