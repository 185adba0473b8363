//! Profiles and their images.
//!
//! A [`Profile`] is created once per external identifier (the id assigned by
//! the feed it was scraped from) and accumulates [`ProfileImage`]s over time.
//! Each image carries the signature computed when it was ingested.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::signature::Signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileId(pub Uuid);

impl ProfileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageId(pub Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Profile data as delivered by the feed, before ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub external_id: String,
    pub name: String,
    pub age: Option<u32>,
    /// Distance reported by the feed, in miles.
    pub distance: Option<u32>,
    pub image_urls: Vec<String>,
}

impl NewProfile {
    pub fn new(external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
            age: None,
            distance: None,
            image_urls: Vec::new(),
        }
    }

    pub fn with_images<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_urls.extend(urls.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileImage {
    pub id: ImageId,
    pub url: String,
    /// `None` only for records stored before signing existed.
    pub signature: Option<Signature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: ProfileId,
    pub external_id: String,
    pub name: String,
    pub age: Option<u32>,
    pub distance: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub images: Vec<ProfileImage>,
}

impl Profile {
    /// Create an empty profile from feed data. Image URLs are not copied;
    /// images are attached as they are signed.
    pub fn from_new(new: &NewProfile) -> Self {
        Self {
            id: ProfileId::new(),
            external_id: new.external_id.clone(),
            name: new.name.clone(),
            age: new.age,
            distance: new.distance,
            created_at: Utc::now(),
            images: Vec::new(),
        }
    }

    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            id: self.id,
            external_id: self.external_id.clone(),
            name: self.name.clone(),
            age: self.age,
            distance: self.distance,
        }
    }

    /// Aggregate signature over every signed image of this profile.
    pub fn average_signature(&self) -> Option<Signature> {
        let signatures: Vec<Signature> = self
            .images
            .iter()
            .filter_map(|image| image.signature.clone())
            .collect();
        Signature::average(&signatures)
    }
}

/// The scalar part of a profile, attached to query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: ProfileId,
    pub external_id: String,
    pub name: String,
    pub age: Option<u32>,
    pub distance: Option<u32>,
}

/// Reference to one stored image, attached to query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: ImageId,
    pub url: String,
}
