use tracing::{debug, info};

use ca_cache::ResearchCache;
use ca_core::{ModelClient, PlatformResearch, Result, Vertical};

use crate::delay::DelayPolicy;
use crate::research::{research_platform, ResearchOptions};

/// `(completed, total, platform_name, from_cache)`
pub type ResearchProgressFn<'a> = dyn Fn(usize, usize, &str, bool) + Send + Sync + 'a;

/// Drive research across a platform list, sequentially.
///
/// Cache hits skip the network entirely; misses are researched, written back
/// eagerly (success and error records alike, so partial progress survives a
/// later failure), and paced by the injected delay policy to stay under the
/// provider's rate limits. Result order matches input order.
pub async fn research_all_platforms(
    client: &dyn ModelClient,
    cache: &ResearchCache,
    names: &[String],
    vertical: Vertical,
    options: &ResearchOptions,
    delay: &dyn DelayPolicy,
    progress: &ResearchProgressFn<'_>,
) -> Result<Vec<PlatformResearch>> {
    let total = names.len();
    let mut results = Vec::with_capacity(total);
    let mut called_network = false;

    for (i, name) in names.iter().enumerate() {
        if let Some(hit) = cache.get(name, vertical).await? {
            debug!("Cache hit for {} ({})", name, vertical);
            progress(i + 1, total, name, true);
            results.push(hit);
            continue;
        }

        if called_network {
            delay.pause().await;
        }
        let research = research_platform(client, name, vertical, options).await;
        cache.put(&research, vertical).await?;
        called_network = true;
        progress(i + 1, total, name, false);
        results.push(research);
    }

    info!("✅ Researched {}/{} platforms", results.len(), total);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::NoDelay;
    use ca_cache::MemoryStore;
    use ca_core::CacheStore;
    use ca_models::DummyClient;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_second_run_is_all_cache_hits() {
        let client = DummyClient::new();
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let cache = ResearchCache::new(store);
        let options = ResearchOptions::default();
        let platforms = names(&["Acme", "Bravo", "Charlie"]);

        let first = research_all_platforms(
            &client,
            &cache,
            &platforms,
            Vertical::Gambling,
            &options,
            &NoDelay,
            &|_, _, _, _| {},
        )
        .await
        .unwrap();
        let calls_after_first = client.research_calls();
        assert!(calls_after_first >= 3);

        let hits = AtomicUsize::new(0);
        let second = research_all_platforms(
            &client,
            &cache,
            &platforms,
            Vertical::Gambling,
            &options,
            &NoDelay,
            &|_, _, _, from_cache| {
                if from_cache {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            },
        )
        .await
        .unwrap();

        // No new network calls, every platform a hit, identical content.
        assert_eq!(client.research_calls(), calls_after_first);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_vertical_mismatch_is_a_miss() {
        let client = DummyClient::new();
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let cache = ResearchCache::new(store);
        let options = ResearchOptions::default();
        let platforms = names(&["Acme"]);

        research_all_platforms(
            &client,
            &cache,
            &platforms,
            Vertical::Gambling,
            &options,
            &NoDelay,
            &|_, _, _, _| {},
        )
        .await
        .unwrap();
        let calls = client.research_calls();

        research_all_platforms(
            &client,
            &cache,
            &platforms,
            Vertical::Crypto,
            &options,
            &NoDelay,
            &|_, _, _, _| {},
        )
        .await
        .unwrap();
        assert!(client.research_calls() > calls);
    }

    #[tokio::test]
    async fn test_result_order_and_progress_sequence() {
        let client = DummyClient::new();
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let cache = ResearchCache::new(store);
        let platforms = names(&["Zeta", "Acme", "Midway"]);
        let seen: Mutex<Vec<(usize, String)>> = Mutex::new(Vec::new());

        let results = research_all_platforms(
            &client,
            &cache,
            &platforms,
            Vertical::Crypto,
            &ResearchOptions::default(),
            &NoDelay,
            &|done, total, name, _| {
                assert_eq!(total, 3);
                seen.lock().unwrap().push((done, name.to_string()));
            },
        )
        .await
        .unwrap();

        let order: Vec<String> = results.iter().map(|r| r.name.clone()).collect();
        assert_eq!(order, vec!["Zeta", "Acme", "Midway"]);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], (1, "Zeta".to_string()));
        assert_eq!(seen[2], (3, "Midway".to_string()));
    }
}
