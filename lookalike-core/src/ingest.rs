//! From image URL to stored signature.
//!
//! [`Pipeline`] turns one URL into a [`Signature`] (fetch, normalize, sign).
//! [`Ingestor`] runs the pipeline over every image of a profile and stores
//! the results. Per-image failures are logged and counted; they never abort
//! the rest of the batch.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::acquire::{Acquirer, ByteSource, DownloadStats};
use crate::cache::{MemoryCache, SignatureCache};
use crate::error::Result;
use crate::normalize::normalize_blocking;
use crate::profile::{NewProfile, ProfileId};
use crate::repository::ProfileRepository;
use crate::signature::{Signature, SignatureBuilder};

/// Fetch, normalize and sign.
pub struct Pipeline<S, C = MemoryCache> {
    acquirer: Acquirer<S>,
    builder: SignatureBuilder<C>,
    deadline: Option<Duration>,
}

impl<S: ByteSource, C: SignatureCache> Pipeline<S, C> {
    pub fn new(acquirer: Acquirer<S>, builder: SignatureBuilder<C>) -> Self {
        Self {
            acquirer,
            builder,
            deadline: None,
        }
    }

    /// Bound each acquisition (all attempts and sleeps) by `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn acquirer(&self) -> &Acquirer<S> {
        &self.acquirer
    }

    pub fn builder(&self) -> &SignatureBuilder<C> {
        &self.builder
    }

    /// Signature of the image at `url`, or `None` if any stage failed.
    ///
    /// The download outcome is folded into `stats`; a download that
    /// succeeds but does not decode still counts as a successful download.
    #[instrument(skip(self, stats))]
    pub async fn acquire_and_sign(&self, url: &str, stats: &mut DownloadStats) -> Option<Signature> {
        let fetched = self.acquirer.fetch_within(url, self.deadline).await;
        stats.record(&fetched);

        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(error = %e, "Image acquisition failed");
                return None;
            }
        };

        match normalize_blocking(fetched.bytes).await {
            Ok(canonical) => self.builder.build_blocking(canonical).await,
            Err(e) => {
                warn!(error = %e, "Image normalization failed");
                None
            }
        }
    }
}

/// Outcome of ingesting one profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileReport {
    pub profile_id: ProfileId,
    pub external_id: String,
    pub total_images: usize,
    pub successful: usize,
    pub failed: usize,
    pub download_stats: DownloadStats,
    /// Aggregate over every stored image of the profile, earlier runs included.
    pub average_signature: Option<Signature>,
}

impl ProfileReport {
    pub fn success_rate(&self) -> f64 {
        if self.total_images == 0 {
            0.0
        } else {
            self.successful as f64 / self.total_images as f64
        }
    }
}

/// Stores signed images for incoming profiles.
pub struct Ingestor<S, C, R: ProfileRepository + ?Sized> {
    pipeline: Pipeline<S, C>,
    repository: Arc<R>,
}

impl<S, C, R> Ingestor<S, C, R>
where
    S: ByteSource,
    C: SignatureCache,
    R: ProfileRepository + ?Sized,
{
    pub fn new(pipeline: Pipeline<S, C>, repository: Arc<R>) -> Self {
        Self {
            pipeline,
            repository,
        }
    }

    pub fn pipeline(&self) -> &Pipeline<S, C> {
        &self.pipeline
    }

    /// Upsert the profile and sign and store each of its images.
    ///
    /// Only repository failures on the profile itself are returned as
    /// errors; image failures are reflected in the report.
    #[instrument(skip_all, fields(external_id = %profile.external_id, images = profile.image_urls.len()))]
    pub async fn ingest_profile(&self, profile: &NewProfile) -> Result<ProfileReport> {
        let profile_id = self.repository.upsert_profile(profile).await?;

        let mut stats = DownloadStats::default();
        let mut successful = 0;
        let mut failed = 0;

        for url in &profile.image_urls {
            let Some(signature) = self.pipeline.acquire_and_sign(url, &mut stats).await else {
                failed += 1;
                continue;
            };

            match self
                .repository
                .save_signature(profile_id, url, signature)
                .await
            {
                Ok(_) => successful += 1,
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to store signature");
                    failed += 1;
                }
            }
        }

        let average_signature = self
            .repository
            .get_profile(profile_id)
            .await?
            .and_then(|stored| stored.average_signature());

        let report = ProfileReport {
            profile_id,
            external_id: profile.external_id.clone(),
            total_images: profile.image_urls.len(),
            successful,
            failed,
            download_stats: stats,
            average_signature,
        };

        info!(
            profile_id = %profile_id,
            successful,
            failed,
            success_rate = report.success_rate(),
            "Profile ingested"
        );
        Ok(report)
    }
}
