//! Webhook delivery

use super::{Notification, NotificationKind, NotificationSink};
use crate::config::{NotificationConfig, WebhookConfig};
use crate::types::WebhookPayload;
use std::sync::Arc;

/// Sink that POSTs a [`WebhookPayload`] to every webhook subscribed to the notification's event
///
/// Progress notifications are dropped unless `notify_progress` is set. Each delivery runs on
/// its own spawned task; failures and timeouts are logged and otherwise ignored.
#[derive(Clone)]
pub struct WebhookNotifier {
    webhooks: Arc<Vec<WebhookConfig>>,
    notify_progress: bool,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a notifier for the configured webhooks
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            webhooks: Arc::new(config.webhooks.clone()),
            notify_progress: config.notify_progress,
            client: reqwest::Client::new(),
        }
    }

    fn matching(&self, kind: NotificationKind) -> Vec<WebhookConfig> {
        if kind == NotificationKind::Progress && !self.notify_progress {
            return Vec::new();
        }
        let event = kind.webhook_event();
        self.webhooks
            .iter()
            .filter(|w| w.events.contains(&event))
            .cloned()
            .collect()
    }

    /// Send the notification to every matching webhook and wait for all of them
    ///
    /// Returns the number of webhooks that answered with a success status.
    pub async fn deliver(&self, notification: &Notification) -> usize {
        let webhooks = self.matching(notification.kind);
        if webhooks.is_empty() {
            return 0;
        }

        let payload = WebhookPayload {
            event: notification.kind.as_str().to_string(),
            job_id: notification.job_id,
            title: notification.title.clone(),
            message: notification.message.clone(),
            timestamp: chrono::Utc::now().timestamp(),
        };

        let mut delivered = 0;
        for webhook in webhooks {
            let mut request = self
                .client
                .post(&webhook.url)
                .json(&payload)
                .timeout(webhook.timeout);

            if let Some(auth) = &webhook.auth_header {
                request = request.header("Authorization", auth);
            }

            match tokio::time::timeout(webhook.timeout, request.send()).await {
                Ok(Ok(response)) if response.status().is_success() => {
                    tracing::debug!(url = %webhook.url, "webhook sent successfully");
                    delivered += 1;
                }
                Ok(Ok(response)) => {
                    tracing::warn!(
                        url = %webhook.url,
                        status = %response.status(),
                        "webhook returned error status"
                    );
                }
                Ok(Err(e)) => {
                    tracing::warn!(url = %webhook.url, error = %e, "webhook failed");
                }
                Err(_) => {
                    tracing::warn!(
                        url = %webhook.url,
                        timeout = ?webhook.timeout,
                        "webhook timed out"
                    );
                }
            }
        }
        delivered
    }
}

impl NotificationSink for WebhookNotifier {
    fn notify(&self, notification: Notification) {
        if self.matching(notification.kind).is_empty() {
            return;
        }

        // Outside a runtime there is nothing to spawn onto
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no tokio runtime, dropping webhook notification");
            return;
        };

        let notifier = self.clone();
        handle.spawn(async move {
            notifier.deliver(&notification).await;
        });
    }
}
