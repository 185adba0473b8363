//! Lookalike Core - perceptual image signatures and similarity retrieval
//!
//! This crate computes compact multi-feature fingerprints ("signatures") for
//! profile photos and finds the most similar previously seen photos for a
//! query image.
//!
//! # Features
//!
//! - Canonical normalization (orientation, 512×512 fill, tonal stretch, sharpen)
//! - Three perceptual hashes plus color, edge, brightness and texture features
//! - Weighted similarity score in [0, 1] with confidence levels
//! - Linear-scan retrieval over an abstract profile repository
//! - Retrying image acquisition with an optional overall deadline
//! - CBOR corpus snapshots
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lookalike_core::{
//!     Acquirer, HttpByteSource, Ingestor, Matcher, MemoryRepository, NewProfile, Pipeline,
//!     RetryPolicy, SignatureBuilder, DEFAULT_TOP_N,
//! };
//!
//! # async fn example() -> lookalike_core::Result<()> {
//! let repository = Arc::new(MemoryRepository::new());
//! let pipeline = Pipeline::new(
//!     Acquirer::new(HttpByteSource::new()?, RetryPolicy::default()),
//!     SignatureBuilder::new(),
//! );
//! let ingestor = Ingestor::new(pipeline, repository.clone());
//!
//! let profile = NewProfile::new("feed-42", "Jamie")
//!     .with_images(["https://example.com/a.jpg", "https://example.com/b.jpg"]);
//! ingestor.ingest_profile(&profile).await?;
//!
//! let mut stats = Default::default();
//! let query = ingestor
//!     .pipeline()
//!     .acquire_and_sign("https://example.com/query.jpg", &mut stats)
//!     .await;
//! let result = Matcher::new(repository)
//!     .find_best_matches(query.as_ref(), DEFAULT_TOP_N)
//!     .await?;
//! println!("confidence: {}", result.confidence_level);
//! # Ok(())
//! # }
//! ```

pub mod acquire;
pub mod cache;
pub mod error;
pub mod ingest;
pub mod matcher;
pub mod normalize;
pub mod profile;
pub mod repository;
pub mod signature;
pub mod similarity;

// Re-export main types for convenience
pub use acquire::{
    Acquired, Acquirer, ByteSource, DownloadStats, FetchError, Fetched, FetchedImage,
    MockByteSource, RetryPolicy,
};
pub use cache::{BoundedCache, MemoryCache, SignatureCache};
pub use error::{LookalikeError, Result};
pub use ingest::{Ingestor, Pipeline, ProfileReport};
pub use matcher::{
    ConfidenceLevel, Match, MatchResult, Matcher, MatcherConfig, DEFAULT_TOP_N, SIMILARITY_FLOOR,
};
pub use normalize::normalize;
pub use profile::{ImageId, ImageRef, NewProfile, Profile, ProfileId, ProfileImage, ProfileSummary};
pub use repository::{CorpusEntry, CorpusSnapshot, MemoryRepository, ProfileRepository};
pub use signature::{BitHash, ContentDigest, Signature, SignatureBuilder, SignatureHashes};
pub use similarity::{score, Scorer, SimilarityBreakdown, SimilarityWeights};

#[cfg(feature = "network")]
pub use acquire::{HttpByteSource, HttpSourceConfig};
