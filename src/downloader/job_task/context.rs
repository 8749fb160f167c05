//! Job task context: shared state and cleanup for a single execution task.

use crate::config::Config;
use crate::db::Database;
use crate::notifications::Notification;
use crate::progress::ProgressBus;
use crate::types::{Event, JobId};
use tokio_util::sync::CancellationToken;

use super::super::MediaDownloader;

/// Shared context for a single execution task, reducing parameter passing between helpers.
pub(crate) struct JobTaskContext {
    pub(crate) id: JobId,
    /// Serial of this task's registration in the active job map
    pub(crate) serial: u64,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) downloader: MediaDownloader,
    /// Output stem claimed by this task, released on exit
    pub(super) stem: Option<String>,
}

impl JobTaskContext {
    pub(crate) fn new(
        downloader: MediaDownloader,
        id: JobId,
        serial: u64,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            id,
            serial,
            cancel_token,
            downloader,
            stem: None,
        }
    }

    pub(super) fn db(&self) -> &Database {
        &self.downloader.db
    }

    pub(super) fn config(&self) -> &Config {
        &self.downloader.config
    }

    pub(super) fn progress(&self) -> &ProgressBus {
        &self.downloader.progress
    }

    pub(super) fn emit(&self, event: Event) {
        self.downloader.emit_event(event);
    }

    pub(super) fn notify(&self, notification: Notification) {
        self.downloader.notifier.notify(notification);
    }

    /// Claim an output stem for this job under the configured collision policy
    pub(super) fn claim_stem(&mut self, base: &str) -> crate::Result<String> {
        let dir = &self.downloader.config.download.download_dir;
        let action = self.downloader.config.download.file_collision;

        let mut claimed = self.downloader.registry.claimed_stems.lock();
        let stem = crate::utils::resolve_output_stem(dir, base, self.id, action, &claimed)?;
        claimed.insert(stem.clone(), self.serial);
        drop(claimed);

        self.stem = Some(stem.clone());
        Ok(stem)
    }

    /// Drop everything this task holds: progress entry, output stem, active registration
    ///
    /// Runs on every exit path.
    pub(super) async fn release(&self) {
        self.progress().remove(self.id);

        if let Some(stem) = &self.stem {
            let mut claimed = self.downloader.registry.claimed_stems.lock();
            // Under overwrite, a retried task may have taken over the same stem
            if claimed.get(stem) == Some(&self.serial) {
                claimed.remove(stem);
            }
        }

        let mut active = self.downloader.registry.active_jobs.lock().await;
        // A retry may already have registered a newer task for this id
        if active.get(&self.id).is_some_and(|a| a.serial == self.serial) {
            active.remove(&self.id);
        }
    }
}
