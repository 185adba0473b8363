//! Profile and signature storage.
//!
//! The engine only needs four operations from storage, captured by
//! [`ProfileRepository`]. Signatures must round-trip losslessly: bitstrings
//! and float arrays come back exactly as written.
//!
//! [`MemoryRepository`] keeps everything in process and can snapshot the
//! whole corpus to a CBOR file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::error::{LookalikeError, Result};
use crate::profile::{ImageId, NewProfile, Profile, ProfileId, ProfileImage};
use crate::signature::Signature;

/// One scannable row of the corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    pub profile_id: ProfileId,
    pub image_id: ImageId,
    pub url: String,
    pub signature: Option<Signature>,
}

/// Storage for profiles and their signed images.
///
/// Implementations must be thread-safe (`Send + Sync`). Readers must never
/// observe a half-written image; [`ProfileRepository::list_all_signatures`]
/// returns a snapshot that later writes do not affect.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Return the id of the profile with this external id, creating the
    /// profile if it does not exist yet.
    async fn upsert_profile(&self, profile: &NewProfile) -> Result<ProfileId>;

    async fn get_profile(&self, id: ProfileId) -> Result<Option<Profile>>;

    /// Attach a signed image to a profile. Saving the same URL again replaces
    /// that image's signature and keeps its id.
    async fn save_signature(
        &self,
        profile: ProfileId,
        url: &str,
        signature: Signature,
    ) -> Result<ImageId>;

    async fn list_all_signatures(&self) -> Result<Vec<CorpusEntry>>;
}

/// Serialized form of the whole corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    pub profiles: Vec<Profile>,
}

/// In-process repository.
#[derive(Default)]
pub struct MemoryRepository {
    profiles: RwLock<Vec<Profile>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CorpusSnapshot) -> Self {
        Self {
            profiles: RwLock::new(snapshot.profiles),
        }
    }

    pub async fn snapshot(&self) -> CorpusSnapshot {
        CorpusSnapshot {
            profiles: self.profiles.read().await.clone(),
        }
    }

    /// Load a CBOR snapshot; a missing file yields an empty repository.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No corpus snapshot, starting empty");
            return Ok(Self::new());
        }

        let bytes = std::fs::read(path).map_err(|e| {
            LookalikeError::Repository(format!("Failed to read {}: {e}", path.display()))
        })?;
        let snapshot: CorpusSnapshot = ciborium::from_reader(bytes.as_slice())
            .map_err(|e| LookalikeError::Serialization(format!("Invalid corpus snapshot: {e}")))?;

        info!(profiles = snapshot.profiles.len(), "Loaded corpus snapshot");
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the corpus as CBOR.
    ///
    /// The snapshot is written to a sibling temporary file, synced, then
    /// renamed over `path`, so an interrupted save leaves the previous
    /// snapshot in place.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot = self.snapshot().await;

        let mut bytes = Vec::new();
        ciborium::into_writer(&snapshot, &mut bytes)
            .map_err(|e| LookalikeError::Serialization(format!("CBOR encoding failed: {e}")))?;

        let staging = staging_path(path);
        let written = write_synced(&staging, &bytes).await;
        let renamed = match written {
            Ok(()) => tokio::fs::rename(&staging, path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = renamed {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(LookalikeError::Repository(format!(
                "Failed to write {}: {e}",
                path.display()
            )));
        }

        info!(path = %path.display(), profiles = snapshot.profiles.len(), "Saved corpus snapshot");
        Ok(())
    }

    pub async fn profile_count(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn image_count(&self) -> usize {
        self.profiles.read().await.iter().map(|p| p.images.len()).sum()
    }
}

/// `dir/.name.tmp` next to the snapshot, so the rename stays on one filesystem.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "corpus".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

#[async_trait]
impl ProfileRepository for MemoryRepository {
    async fn upsert_profile(&self, profile: &NewProfile) -> Result<ProfileId> {
        let mut profiles = self.profiles.write().await;

        if let Some(existing) = profiles
            .iter()
            .find(|p| p.external_id == profile.external_id)
        {
            return Ok(existing.id);
        }

        let created = Profile::from_new(profile);
        let id = created.id;
        profiles.push(created);
        debug!(profile_id = %id, external_id = %profile.external_id, "Created profile");
        Ok(id)
    }

    async fn get_profile(&self, id: ProfileId) -> Result<Option<Profile>> {
        Ok(self.profiles.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn save_signature(
        &self,
        profile: ProfileId,
        url: &str,
        signature: Signature,
    ) -> Result<ImageId> {
        let mut profiles = self.profiles.write().await;
        let owner = profiles
            .iter_mut()
            .find(|p| p.id == profile)
            .ok_or_else(|| LookalikeError::Repository(format!("Unknown profile {profile}")))?;

        if let Some(image) = owner.images.iter_mut().find(|image| image.url == url) {
            image.signature = Some(signature);
            return Ok(image.id);
        }

        let id = ImageId::new();
        owner.images.push(ProfileImage {
            id,
            url: url.to_string(),
            signature: Some(signature),
        });
        Ok(id)
    }

    async fn list_all_signatures(&self) -> Result<Vec<CorpusEntry>> {
        let profiles = self.profiles.read().await;
        Ok(profiles
            .iter()
            .flat_map(|profile| {
                profile.images.iter().map(move |image| CorpusEntry {
                    profile_id: profile.id,
                    image_id: image.id,
                    url: image.url.clone(),
                    signature: image.signature.clone(),
                })
            })
            .collect())
    }
}
