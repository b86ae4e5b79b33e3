use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use ca_core::{CacheEntry, CacheStore, CachedReview, PlatformResearch, ResearchStatus, Result, Vertical};

pub mod backends;

pub use backends::{create_store, JsonFileStore, MemoryStore};

/// Wall-clock age after which an entry is treated as a miss. Entries are
/// never actively swept.
pub const EXPIRY_HOURS: i64 = 24;

/// Minimum ready reviews before article assembly is allowed.
pub const MIN_READY_REVIEWS: usize = 3;

const RESEARCH_PREFIX: &str = "research:";
const REVIEW_PREFIX: &str = "review:";

fn cache_key(prefix: &str, platform: &str) -> String {
    format!("{}{}", prefix, platform.to_lowercase())
}

fn is_live(entry: &CacheEntry, vertical: Vertical) -> bool {
    is_live_at(entry, vertical, Utc::now())
}

/// An entry aged exactly [`EXPIRY_HOURS`] is still a hit.
fn is_live_at(entry: &CacheEntry, vertical: Vertical, now: DateTime<Utc>) -> bool {
    entry.vertical == vertical && entry.age(now) <= Duration::hours(EXPIRY_HOURS)
}

/// Per-platform research results, keyed by lower-cased platform name.
///
/// A hit requires the entry to be present, no older than [`EXPIRY_HOURS`],
/// recorded under the requested vertical, and not a failed-research record.
/// Failed research is still written (so a broken query is not re-run in a
/// hot loop) but never served.
#[derive(Clone)]
pub struct ResearchCache {
    store: Arc<dyn CacheStore>,
}

impl ResearchCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, platform: &str, vertical: Vertical) -> Result<Option<PlatformResearch>> {
        let key = cache_key(RESEARCH_PREFIX, platform);
        let Some(entry) = self.store.get(&key).await? else {
            return Ok(None);
        };
        if !is_live(&entry, vertical) {
            return Ok(None);
        }
        let research: PlatformResearch = serde_json::from_value(entry.payload)?;
        if research.status == ResearchStatus::Error {
            return Ok(None);
        }
        Ok(Some(research))
    }

    /// Unconditional overwrite, success and error records alike.
    pub async fn put(&self, research: &PlatformResearch, vertical: Vertical) -> Result<()> {
        let key = cache_key(RESEARCH_PREFIX, &research.name);
        let entry = CacheEntry::new(serde_json::to_value(research)?, vertical);
        self.store.set(&key, entry).await
    }

    /// Names of platforms with a live, non-error research record.
    pub async fn ready_platforms(&self, vertical: Vertical) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for (key, entry) in self.store.entries().await? {
            if !key.starts_with(RESEARCH_PREFIX) || !is_live(&entry, vertical) {
                continue;
            }
            if let Ok(research) = serde_json::from_value::<PlatformResearch>(entry.payload) {
                if research.status != ResearchStatus::Error {
                    names.push(research.name);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn remove(&self, platform: &str) -> Result<()> {
        self.store.remove(&cache_key(RESEARCH_PREFIX, platform)).await
    }
}

/// Generated review content, keyed by lower-cased platform name. Written
/// once per review-generation pass and blindly overwritten on regeneration.
#[derive(Clone)]
pub struct ReviewCache {
    store: Arc<dyn CacheStore>,
}

impl ReviewCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, platform: &str, vertical: Vertical) -> Result<Option<CachedReview>> {
        let key = cache_key(REVIEW_PREFIX, platform);
        let Some(entry) = self.store.get(&key).await? else {
            return Ok(None);
        };
        if !is_live(&entry, vertical) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(entry.payload)?))
    }

    pub async fn put(&self, review: &CachedReview, vertical: Vertical) -> Result<()> {
        let key = cache_key(REVIEW_PREFIX, &review.platform_name);
        let entry = CacheEntry::new(serde_json::to_value(review)?, vertical);
        self.store.set(&key, entry).await
    }

    /// All live reviews for a vertical, sorted by platform name.
    pub async fn ready_reviews(&self, vertical: Vertical) -> Result<Vec<CachedReview>> {
        let mut reviews = Vec::new();
        for (key, entry) in self.store.entries().await? {
            if !key.starts_with(REVIEW_PREFIX) || !is_live(&entry, vertical) {
                continue;
            }
            if let Ok(review) = serde_json::from_value::<CachedReview>(entry.payload) {
                reviews.push(review);
            }
        }
        reviews.sort_by(|a, b| a.platform_name.cmp(&b.platform_name));
        Ok(reviews)
    }

    pub async fn ready_count(&self, vertical: Vertical) -> Result<usize> {
        Ok(self.ready_reviews(vertical).await?.len())
    }

    pub async fn remove(&self, platform: &str) -> Result<()> {
        self.store.remove(&cache_key(REVIEW_PREFIX, platform)).await
    }
}

/// Drop a platform from both caches so it can be re-researched. Two
/// independent best-effort deletes; a failure on one side does not block
/// the other.
pub async fn forget_platform(
    research: &ResearchCache,
    reviews: &ReviewCache,
    platform: &str,
) -> Result<()> {
    if let Err(e) = research.remove(platform).await {
        warn!("Failed to drop research entry for {}: {}", platform, e);
    }
    if let Err(e) = reviews.remove(platform).await {
        warn!("Failed to drop review entry for {}: {}", platform, e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_core::Infosheet;

    fn research(name: &str, status: ResearchStatus) -> PlatformResearch {
        PlatformResearch {
            name: name.to_string(),
            description: format!("{} description", name),
            infosheet: Infosheet::default(),
            key_features: vec![],
            pros: vec![],
            cons: vec![],
            raw_output: String::new(),
            citations: vec![],
            status,
        }
    }

    fn review(name: &str) -> CachedReview {
        CachedReview {
            platform_name: name.to_string(),
            overview_html: "<p>overview</p>".to_string(),
            infosheet: Infosheet::default(),
            pros: vec!["pro".to_string()],
            cons: vec![],
            verdict_html: "<p>verdict</p>".to_string(),
            affiliate_url: None,
            citations: vec![],
        }
    }

    #[tokio::test]
    async fn test_hit_requires_matching_vertical() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let cache = ResearchCache::new(store);
        cache
            .put(&research("Acme", ResearchStatus::Completed), Vertical::Gambling)
            .await
            .unwrap();

        assert!(cache.get("Acme", Vertical::Gambling).await.unwrap().is_some());
        assert!(cache.get("Acme", Vertical::Crypto).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let cache = ResearchCache::new(store);
        cache
            .put(&research("Acme", ResearchStatus::Completed), Vertical::Gambling)
            .await
            .unwrap();
        assert!(cache.get("ACME", Vertical::Gambling).await.unwrap().is_some());
    }

    #[test]
    fn test_entry_at_exact_expiry_is_still_live() {
        let entry = CacheEntry::new(serde_json::json!({}), Vertical::Gambling);
        let boundary = entry.stored_at + Duration::hours(EXPIRY_HOURS);
        assert!(is_live_at(&entry, Vertical::Gambling, boundary));
        assert!(!is_live_at(
            &entry,
            Vertical::Gambling,
            boundary + Duration::seconds(1)
        ));
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let mut entry = CacheEntry::new(
            serde_json::to_value(research("Acme", ResearchStatus::Completed)).unwrap(),
            Vertical::Gambling,
        );
        entry.stored_at = Utc::now() - Duration::hours(25);
        store.set("research:acme", entry).await.unwrap();

        let cache = ResearchCache::new(store);
        assert!(cache.get("Acme", Vertical::Gambling).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_record_is_cached_but_never_a_hit() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let cache = ResearchCache::new(store.clone());
        cache
            .put(&research("Broken", ResearchStatus::Error), Vertical::Gambling)
            .await
            .unwrap();

        assert!(store.get("research:broken").await.unwrap().is_some());
        assert!(cache.get("Broken", Vertical::Gambling).await.unwrap().is_none());
        assert!(cache.ready_platforms(Vertical::Gambling).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_overwrites_blindly() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let cache = ReviewCache::new(store);
        let mut r = review("Acme");
        cache.put(&r, Vertical::Gambling).await.unwrap();
        r.verdict_html = "<p>rewritten</p>".to_string();
        cache.put(&r, Vertical::Gambling).await.unwrap();

        let stored = cache.get("Acme", Vertical::Gambling).await.unwrap().unwrap();
        assert_eq!(stored.verdict_html, "<p>rewritten</p>");
    }

    #[tokio::test]
    async fn test_ready_reviews_filters_and_counts() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let cache = ReviewCache::new(store);
        cache.put(&review("Bravo"), Vertical::Gambling).await.unwrap();
        cache.put(&review("Acme"), Vertical::Gambling).await.unwrap();
        cache.put(&review("Coinly"), Vertical::Crypto).await.unwrap();

        let ready = cache.ready_reviews(Vertical::Gambling).await.unwrap();
        assert_eq!(ready.len(), 2);
        assert_eq!(ready[0].platform_name, "Acme");
        assert_eq!(cache.ready_count(Vertical::Crypto).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_forget_platform_clears_both_caches() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let research_cache = ResearchCache::new(store.clone());
        let review_cache = ReviewCache::new(store);
        research_cache
            .put(&research("Acme", ResearchStatus::Completed), Vertical::Gambling)
            .await
            .unwrap();
        review_cache.put(&review("Acme"), Vertical::Gambling).await.unwrap();

        forget_platform(&research_cache, &review_cache, "Acme").await.unwrap();
        assert!(research_cache.get("Acme", Vertical::Gambling).await.unwrap().is_none());
        assert!(review_cache.get("Acme", Vertical::Gambling).await.unwrap().is_none());
    }
}
