//! Notification sinks
//!
//! The orchestrator reports job start, progress ticks, completion, failure and cancellation to
//! a [`NotificationSink`]. Delivery is fire-and-forget: `notify` never blocks the job task and
//! a delivery failure never changes job state.
//!
//! Sinks shipped here:
//! - [`TracingNotifier`]: writes each notification to the `tracing` log
//! - [`WebhookNotifier`]: POSTs a JSON payload to configured webhook URLs
//! - [`FanoutNotifier`]: forwards to several sinks

use crate::config::WebhookEvent;
use crate::types::JobId;
use std::sync::Arc;

mod webhook;

pub use webhook::WebhookNotifier;

/// What happened to the job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Execution task started
    Started,
    /// Progress tick
    Progress,
    /// Job completed
    Completed,
    /// Job failed
    Failed,
    /// Job was cancelled
    Cancelled,
}

impl NotificationKind {
    /// Lowercase name used in webhook payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Started => "started",
            NotificationKind::Progress => "progress",
            NotificationKind::Completed => "completed",
            NotificationKind::Failed => "failed",
            NotificationKind::Cancelled => "cancelled",
        }
    }

    /// Webhook subscription that matches this kind
    pub fn webhook_event(&self) -> WebhookEvent {
        match self {
            NotificationKind::Started => WebhookEvent::OnStarted,
            NotificationKind::Progress => WebhookEvent::OnProgress,
            NotificationKind::Completed => WebhookEvent::OnComplete,
            NotificationKind::Failed => WebhookEvent::OnFailed,
            NotificationKind::Cancelled => WebhookEvent::OnCancelled,
        }
    }
}

/// A single user-facing notification
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    /// Kind of notification
    pub kind: NotificationKind,
    /// Job the notification is about
    pub job_id: JobId,
    /// Job title
    pub title: String,
    /// Human-readable message
    pub message: String,
}

impl Notification {
    /// Build a notification
    pub fn new(
        kind: NotificationKind,
        job_id: JobId,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            job_id,
            title: title.into(),
            message: message.into(),
        }
    }

    /// "Downloading {title}"
    pub fn started(job_id: JobId, title: &str) -> Self {
        Self::new(
            NotificationKind::Started,
            job_id,
            title,
            format!("Downloading {}", title),
        )
    }

    /// Progress tick, e.g. "42% · 1.23MiB/s · ETA 00:12"
    pub fn progress(job_id: JobId, title: &str, percent: f32, speed: &str, eta: &str) -> Self {
        let mut message = format!("{:.0}%", percent);
        if !speed.is_empty() {
            message.push_str(" · ");
            message.push_str(speed);
        }
        if !eta.is_empty() {
            message.push_str(" · ETA ");
            message.push_str(eta);
        }
        Self::new(NotificationKind::Progress, job_id, title, message)
    }

    /// "Downloaded {title}"
    pub fn completed(job_id: JobId, title: &str) -> Self {
        Self::new(
            NotificationKind::Completed,
            job_id,
            title,
            format!("Downloaded {}", title),
        )
    }

    /// "Download failed: {error}"
    pub fn failed(job_id: JobId, title: &str, error: &str) -> Self {
        Self::new(
            NotificationKind::Failed,
            job_id,
            title,
            format!("Download failed: {}", error),
        )
    }

    /// "Download cancelled"
    pub fn cancelled(job_id: JobId, title: &str) -> Self {
        Self::new(
            NotificationKind::Cancelled,
            job_id,
            title,
            "Download cancelled",
        )
    }
}

/// Receiver of job notifications
///
/// `notify` is called from job execution tasks and must return promptly. Implementations that
/// do I/O spawn it.
pub trait NotificationSink: Send + Sync {
    /// Deliver (or schedule delivery of) one notification
    fn notify(&self, notification: Notification);
}

/// Sink that writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Progress => tracing::trace!(
                job_id = notification.job_id.0,
                title = %notification.title,
                message = %notification.message,
                "job progress"
            ),
            NotificationKind::Failed => tracing::warn!(
                job_id = notification.job_id.0,
                title = %notification.title,
                message = %notification.message,
                "job notification"
            ),
            _ => tracing::info!(
                job_id = notification.job_id.0,
                title = %notification.title,
                message = %notification.message,
                "job notification"
            ),
        }
    }
}

/// Sink that forwards every notification to each inner sink
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutNotifier {
    /// Create an empty fan-out
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of inner sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no inner sinks
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl NotificationSink for FanoutNotifier {
    fn notify(&self, notification: Notification) {
        for sink in &self.sinks {
            sink.notify(notification.clone());
        }
    }
}

/// Default sink for a configuration: the log, plus webhooks when any are configured
pub fn from_config(config: &crate::config::NotificationConfig) -> Arc<dyn NotificationSink> {
    let fanout = FanoutNotifier::new().with(Arc::new(TracingNotifier));
    if config.webhooks.is_empty() {
        return Arc::new(fanout);
    }
    Arc::new(fanout.with(Arc::new(WebhookNotifier::new(config))))
}
