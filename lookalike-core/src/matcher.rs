//! Retrieval over the stored corpus.
//!
//! A query is scored against every stored signature (a linear scan), scores
//! below the similarity floor are dropped, and the remainder is ranked
//! best-first. The corpus is read as a snapshot, so ingestion running
//! alongside a query is neither blocked by it nor observed by it.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn, Span};

use crate::error::{LookalikeError, Result};
use crate::profile::{ImageRef, ProfileSummary};
use crate::repository::{CorpusEntry, ProfileRepository};
use crate::similarity::{Scorer, SimilarityWeights};
use crate::signature::Signature;

/// Minimum score for a corpus entry to count as a match.
pub const SIMILARITY_FLOOR: f64 = 0.70;

/// Number of matches returned when the caller does not say.
pub const DEFAULT_TOP_N: usize = 3;

/// Confidence attached to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfidenceLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    NoMatch,
}

impl ConfidenceLevel {
    /// Classify a score that already passed the floor.
    pub fn classify(score: f64) -> Self {
        if score >= 0.95 {
            Self::VeryHigh
        } else if score >= 0.90 {
            Self::High
        } else if score >= 0.85 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryHigh => "very-high",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::NoMatch => "no-match",
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matcher tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherConfig {
    pub similarity_floor: f64,
    pub weights: SimilarityWeights,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            similarity_floor: SIMILARITY_FLOOR,
            weights: SimilarityWeights::default(),
        }
    }
}

impl MatcherConfig {
    /// Defaults with `LOOKALIKE_SIMILARITY_FLOOR` applied when set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("LOOKALIKE_SIMILARITY_FLOOR") {
            config.similarity_floor = raw.trim().parse().map_err(|_| {
                LookalikeError::Config(format!("LOOKALIKE_SIMILARITY_FLOOR is not a number: {raw}"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_floor) {
            return Err(LookalikeError::Config(format!(
                "Similarity floor must be within [0, 1], got {}",
                self.similarity_floor
            )));
        }
        self.weights.validate()
    }
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub profile: ProfileSummary,
    pub image: ImageRef,
    pub similarity: f64,
    pub confidence_level: ConfidenceLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// At most `top_n` matches, best first.
    pub matches: Vec<Match>,
    pub best_match: Option<Match>,
    pub confidence_level: ConfidenceLevel,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self {
            matches: Vec::new(),
            best_match: None,
            confidence_level: ConfidenceLevel::NoMatch,
        }
    }
}

/// Keep the scores at or above `floor` and sort them best-first.
///
/// The sort is stable: equal scores keep their input order.
pub fn rank_scores<T>(scored: impl IntoIterator<Item = (T, f64)>, floor: f64) -> Vec<(T, f64)> {
    let mut kept: Vec<(T, f64)> = scored
        .into_iter()
        .filter(|(_, score)| *score >= floor)
        .collect();
    kept.sort_by(|a, b| b.1.total_cmp(&a.1));
    kept
}

/// Finds the stored images most similar to a query signature.
pub struct Matcher<R: ProfileRepository + ?Sized> {
    repository: Arc<R>,
    scorer: Scorer,
    floor: f64,
}

impl<R: ProfileRepository + ?Sized> Matcher<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            scorer: Scorer::default(),
            floor: SIMILARITY_FLOOR,
        }
    }

    pub fn with_config(repository: Arc<R>, config: MatcherConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            repository,
            scorer: Scorer::new(config.weights)?,
            floor: config.similarity_floor,
        })
    }

    pub fn similarity_floor(&self) -> f64 {
        self.floor
    }

    /// Rank the corpus against `query` and return at most `top_n` matches.
    ///
    /// A `None` query yields [`MatchResult::no_match`] without touching the
    /// repository. Entries without a signature are skipped.
    #[instrument(skip_all, fields(top_n = top_n))]
    pub async fn find_best_matches(
        &self,
        query: Option<&Signature>,
        top_n: usize,
    ) -> Result<MatchResult> {
        let Some(query) = query else {
            debug!("No query signature");
            return Ok(MatchResult::no_match());
        };

        let corpus = self.repository.list_all_signatures().await?;
        let corpus_size = corpus.len();
        let scorer = self.scorer;
        let query = query.clone();
        let span = Span::current();
        let scored = tokio::task::spawn_blocking(move || {
            span.in_scope(|| score_corpus(&scorer, &query, corpus))
        })
        .await?;
        let ranked = rank_scores(scored, self.floor);
        debug!(corpus = corpus_size, qualifying = ranked.len(), "Corpus scanned");

        // Profiles are resolved only for returned entries, and always for
        // the best one.
        let wanted = top_n.max(1);
        let mut all = Vec::with_capacity(wanted.min(ranked.len()));
        for (entry, similarity) in ranked {
            if all.len() == wanted {
                break;
            }
            let Some(profile) = self.repository.get_profile(entry.profile_id).await? else {
                warn!(profile_id = %entry.profile_id, "Matched image has no profile, skipping");
                continue;
            };
            all.push(Match {
                profile: profile.summary(),
                image: ImageRef {
                    id: entry.image_id,
                    url: entry.url,
                },
                similarity,
                confidence_level: ConfidenceLevel::classify(similarity),
            });
        }

        let Some(best) = all.first().cloned() else {
            info!("No match above floor");
            return Ok(MatchResult::no_match());
        };

        all.truncate(top_n);
        info!(
            best = best.similarity,
            confidence = %best.confidence_level,
            returned = all.len(),
            "Matches found"
        );
        Ok(MatchResult {
            confidence_level: best.confidence_level,
            best_match: Some(best),
            matches: all,
        })
    }
}

/// Score every signed entry. Output order follows the corpus order.
fn score_corpus(
    scorer: &Scorer,
    query: &Signature,
    corpus: Vec<CorpusEntry>,
) -> Vec<(CorpusEntry, f64)> {
    corpus
        .into_par_iter()
        .filter_map(|entry| {
            let similarity = scorer.score(query, entry.signature.as_ref()?);
            Some((entry, similarity))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::NewProfile;
    use crate::repository::MemoryRepository;

    #[test]
    fn test_confidence_boundaries() {
        assert_eq!(ConfidenceLevel::classify(1.0), ConfidenceLevel::VeryHigh);
        assert_eq!(ConfidenceLevel::classify(0.95), ConfidenceLevel::VeryHigh);
        assert_eq!(ConfidenceLevel::classify(0.949999), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::classify(0.90), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::classify(0.899999), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::classify(0.85), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::classify(0.84), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::classify(0.70), ConfidenceLevel::Low);
    }

    #[test]
    fn test_confidence_serializes_kebab_case() {
        let json = serde_json::to_string(&ConfidenceLevel::VeryHigh).unwrap();
        assert_eq!(json, "\"very-high\"");
        assert_eq!(ConfidenceLevel::NoMatch.to_string(), "no-match");
    }

    #[test]
    fn test_rank_scores_filters_and_sorts() {
        let ranked = rank_scores(
            [("a", 0.71), ("b", 0.69999), ("c", 0.95), ("d", 0.70), ("e", 0.95)],
            SIMILARITY_FLOOR,
        );
        let names: Vec<_> = ranked.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["c", "e", "a", "d"]);
    }

    #[test]
    fn test_rank_scores_is_non_increasing() {
        let scores = (0..50).map(|i| (i, ((i * 37) % 50) as f64 / 50.0));
        let ranked = rank_scores(scores, 0.5);
        assert_eq!(ranked.len(), 25);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_config_from_defaults() {
        let config = MatcherConfig::default();
        assert_eq!(config.similarity_floor, 0.70);
        assert!(config.validate().is_ok());

        let bad = MatcherConfig {
            similarity_floor: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[tokio::test]
    async fn test_none_query_is_no_match() {
        let repo = Arc::new(MemoryRepository::new());
        repo.upsert_profile(&NewProfile::new("x", "X")).await.unwrap();

        let matcher = Matcher::new(repo);
        let result = matcher.find_best_matches(None, 3).await.unwrap();
        assert!(result.matches.is_empty());
        assert!(result.best_match.is_none());
        assert_eq!(result.confidence_level, ConfidenceLevel::NoMatch);
    }

    #[tokio::test]
    async fn test_empty_corpus_is_no_match() {
        let matcher = Matcher::new(Arc::new(MemoryRepository::new()));
        let query = Signature::from_image(&image::DynamicImage::new_rgb8(8, 8)).unwrap();
        let result = matcher.find_best_matches(Some(&query), 3).await.unwrap();
        assert_eq!(result, MatchResult::no_match());
    }

    /// Delegates to a [`MemoryRepository`] and counts profile lookups.
    struct CountingRepository {
        inner: MemoryRepository,
        lookups: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ProfileRepository for CountingRepository {
        async fn upsert_profile(&self, profile: &NewProfile) -> Result<crate::ProfileId> {
            self.inner.upsert_profile(profile).await
        }

        async fn get_profile(&self, id: crate::ProfileId) -> Result<Option<crate::Profile>> {
            self.lookups.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.get_profile(id).await
        }

        async fn save_signature(
            &self,
            profile: crate::ProfileId,
            url: &str,
            signature: Signature,
        ) -> Result<crate::ImageId> {
            self.inner.save_signature(profile, url, signature).await
        }

        async fn list_all_signatures(&self) -> Result<Vec<CorpusEntry>> {
            self.inner.list_all_signatures().await
        }
    }

    fn gradient_signature() -> Signature {
        let img = image::RgbImage::from_fn(64, 64, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 4) as u8, 90])
        });
        Signature::from_image(&image::DynamicImage::ImageRgb8(img)).unwrap()
    }

    #[tokio::test]
    async fn test_profiles_resolved_only_for_returned_matches() {
        let repo = Arc::new(CountingRepository {
            inner: MemoryRepository::new(),
            lookups: Default::default(),
        });
        let signature = gradient_signature();
        for i in 0..6 {
            let id = repo
                .upsert_profile(&NewProfile::new(format!("feed-{i}"), "Sam"))
                .await
                .unwrap();
            repo.save_signature(id, &format!("https://img/{i}"), signature.clone())
                .await
                .unwrap();
        }
        let lookups = || repo.lookups.load(std::sync::atomic::Ordering::SeqCst);
        let matcher = Matcher::new(repo.clone());

        let result = matcher.find_best_matches(Some(&signature), 2).await.unwrap();
        assert_eq!(result.matches.len(), 2);
        assert_eq!(lookups(), 2);

        let result = matcher.find_best_matches(Some(&signature), 0).await.unwrap();
        assert!(result.matches.is_empty());
        let best = result.best_match.expect("best match without returned matches");
        assert_eq!(best.profile.external_id, "feed-0");
        assert_eq!(best.confidence_level, ConfidenceLevel::VeryHigh);
        assert_eq!(lookups(), 3);
    }
}
