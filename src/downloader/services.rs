//! Metadata probing and background services.

use crate::error::{Error, Result, ValidationError};
use crate::types::MediaInfo;

use super::MediaDownloader;

impl MediaDownloader {
    /// List title, uploader, duration and available formats for a URL
    ///
    /// Results are served from the probe cache while fresh; a miss asks the backend.
    pub async fn probe(&self, url: &str) -> Result<MediaInfo> {
        let url = url.trim();
        url::Url::parse(url).map_err(|e| {
            Error::Validation(ValidationError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })
        })?;

        if let Some(info) = self.probe_cache.get(url) {
            tracing::debug!(url, "Probe cache hit");
            return Ok(info);
        }

        let info = self.backend.probe(url).await?;
        tracing::debug!(url, formats = info.formats.len(), "Probed media");
        self.probe_cache.insert(info.clone());
        Ok(info)
    }

    /// Start the probe cache sweeper
    ///
    /// Removes expired entries every `probe.sweep_interval` until shutdown.
    pub(crate) fn start_probe_sweeper(&self) {
        let cache = self.probe_cache.clone();
        let shutdown = self.registry.shutdown_token.clone();
        let period = self.config.probe.sweep_interval;

        if period.is_zero() {
            tracing::debug!("Probe cache sweeper disabled");
            return;
        }

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Probe cache sweeper stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        let removed = cache.sweep_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "Swept expired probe results");
                        }
                    }
                }
            }
        });
    }
}
