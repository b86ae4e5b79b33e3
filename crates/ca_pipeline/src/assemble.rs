use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use ca_cache::{ResearchCache, ReviewCache, MIN_READY_REVIEWS};
use ca_core::citations::dedup_citations;
use ca_core::{
    ArticleConfig, CacheStore, CachedReview, Citation, GeneratedArticle, ModelClient,
    PlatformResearch, PlatformReview, QuickListEntry, RatingCategory, Result, SeoMode,
};
use ca_models::retry::RetryConfig;

use crate::delay::{DelayPolicy, FixedDelay};
use crate::generators::{
    generate_additional_section, generate_batch_ratings, generate_comparison_table,
    generate_faqs, generate_introduction, generate_platform_quick_list,
    generate_platform_review, generate_seo_metadata, local_quick_list, placeholder_review,
    ratings_for, TablePlatform,
};
use crate::orchestrator::{research_all_platforms, ResearchProgressFn};
use crate::research::ResearchOptions;

/// `(phase_name, detail)`
pub type PhaseProgressFn<'a> = dyn Fn(&str, Option<&str>) + Send + Sync + 'a;

/// Owns the collaborators and drives the full generate/assemble flows
/// sequentially. All model calls go through the retry executor; all cache
/// writes happen eagerly inside the loops so partial progress survives a
/// failure.
pub struct ArticlePipeline {
    client: Arc<dyn ModelClient>,
    research_cache: ResearchCache,
    review_cache: ReviewCache,
    options: ResearchOptions,
    delay: Arc<dyn DelayPolicy>,
}

impl ArticlePipeline {
    pub fn new(client: Arc<dyn ModelClient>, store: Arc<dyn CacheStore>) -> Self {
        Self {
            client,
            research_cache: ResearchCache::new(store.clone()),
            review_cache: ReviewCache::new(store),
            options: ResearchOptions::default(),
            delay: Arc::new(FixedDelay::default()),
        }
    }

    pub fn with_research_options(mut self, options: ResearchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_delay(mut self, delay: Arc<dyn DelayPolicy>) -> Self {
        self.delay = delay;
        self
    }

    pub fn research_cache(&self) -> &ResearchCache {
        &self.research_cache
    }

    pub fn review_cache(&self) -> &ReviewCache {
        &self.review_cache
    }

    fn retry(&self) -> &RetryConfig {
        &self.options.retry
    }

    /// Phase 1: research every configured platform, cache-first.
    pub async fn research_platforms(
        &self,
        config: &ArticleConfig,
        progress: &ResearchProgressFn<'_>,
    ) -> Result<Vec<PlatformResearch>> {
        let names: Vec<String> = config.platforms.iter().map(|p| p.name.clone()).collect();
        research_all_platforms(
            self.client.as_ref(),
            &self.research_cache,
            &names,
            config.vertical,
            &self.options,
            self.delay.as_ref(),
            progress,
        )
        .await
    }

    /// Fresh end-to-end run. Reviews are generated and cached as a side
    /// effect; sections run in a fixed sequential order and disabled
    /// sections make no model call at all.
    pub async fn generate_full_article(
        &self,
        config: &ArticleConfig,
        phase: &PhaseProgressFn<'_>,
    ) -> Result<GeneratedArticle> {
        let vertical = config.vertical;
        let names: Vec<String> = config.platforms.iter().map(|p| p.name.clone()).collect();

        phase("research", None);
        let research = self
            .research_platforms(config, &|done, total, name, from_cache| {
                let detail = format!(
                    "{}/{} {}{}",
                    done,
                    total,
                    name,
                    if from_cache { " (cached)" } else { "" }
                );
                phase("research", Some(&detail));
            })
            .await?;

        let citations = collect_citations(research.iter().flat_map(|r| r.citations.iter()));

        phase("reviews", None);
        let mut cached_reviews = Vec::with_capacity(research.len());
        for record in &research {
            phase("reviews", Some(&record.name));
            let review = match generate_platform_review(
                self.client.as_ref(),
                self.retry(),
                config,
                record,
            )
            .await
            {
                Ok(review) => review,
                Err(e) => {
                    // One broken review must not take down the whole article.
                    warn!("Review generation failed for {}: {}", record.name, e);
                    placeholder_review(record, config.affiliate_url_for(&record.name))
                }
            };
            self.review_cache.put(&review, vertical).await?;
            cached_reviews.push(review);
        }

        phase("ratings", None);
        let ratings = self.batch_ratings(vertical, &names).await;

        let reviews = attach_ratings(cached_reviews, &ratings);

        phase("quick_list", None);
        let quick_list = match generate_platform_quick_list(
            self.client.as_ref(),
            self.retry(),
            config,
            &research,
        )
        .await
        {
            Ok(list) => list,
            Err(e) => {
                warn!("Quick list generation failed, using descriptions: {}", e);
                research
                    .iter()
                    .map(|r| QuickListEntry {
                        platform_name: r.name.clone(),
                        blurb: r.description.clone(),
                    })
                    .collect()
            }
        };

        phase("introduction", None);
        let intro_html = generate_introduction(
            self.client.as_ref(),
            self.retry(),
            config,
            &names,
            &citations,
        )
        .await
        .unwrap_or_else(|e| {
            warn!("Introduction generation failed: {}", e);
            String::new()
        });

        let comparison_table = if config.include_comparison_table {
            phase("comparison_table", None);
            let platforms: Vec<TablePlatform> = research
                .iter()
                .map(|r| TablePlatform::from_research(r, vertical))
                .collect();
            match generate_comparison_table(
                self.client.as_ref(),
                self.retry(),
                config,
                &platforms,
                &ratings,
            )
            .await
            {
                Ok(table) => Some(table),
                Err(e) => {
                    warn!("Comparison table generation failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut additional_sections = Vec::new();
        if config.include_additional_sections {
            for heading in &config.additional_section_headings {
                phase("additional_sections", Some(heading));
                match generate_additional_section(
                    self.client.as_ref(),
                    self.retry(),
                    config,
                    heading,
                    &citations,
                )
                .await
                {
                    Ok(section) => additional_sections.push(section),
                    Err(e) => warn!("Section '{}' failed: {}", heading, e),
                }
            }
        }

        let faqs = if config.include_faqs {
            phase("faqs", None);
            generate_faqs(self.client.as_ref(), self.retry(), config, &names, &citations)
                .await
                .unwrap_or_else(|e| {
                    warn!("FAQ generation failed: {}", e);
                    Vec::new()
                })
        } else {
            Vec::new()
        };

        let seo = self.seo_metadata(config, &names, phase).await;

        info!("📄 Article generated for {} platforms", reviews.len());
        Ok(GeneratedArticle {
            intro_html,
            quick_list,
            comparison_table,
            reviews,
            additional_sections,
            faqs,
            citations,
            seo,
        })
    }

    /// Phase 2 of the two-phase workflow: build the article purely from the
    /// review cache. Requires at least [`MIN_READY_REVIEWS`] live reviews,
    /// otherwise `None`.
    pub async fn assemble_article_from_cache(
        &self,
        config: &ArticleConfig,
        phase: &PhaseProgressFn<'_>,
    ) -> Result<Option<GeneratedArticle>> {
        let vertical = config.vertical;
        let mut cached = self.review_cache.ready_reviews(vertical).await?;
        if cached.len() < MIN_READY_REVIEWS {
            info!(
                "Only {}/{} reviews cached for {}, not assembling",
                cached.len(),
                MIN_READY_REVIEWS,
                vertical
            );
            return Ok(None);
        }

        let names: Vec<String> = cached.iter().map(|r| r.platform_name.clone()).collect();
        let citations = collect_citations(cached.iter().flat_map(|r| r.citations.iter()));

        phase("ratings", None);
        let ratings = self.batch_ratings(vertical, &names).await;

        // Affiliate URLs can change between sessions; current config wins.
        for review in &mut cached {
            if let Some(url) = config.affiliate_url_for(&review.platform_name) {
                review.affiliate_url = Some(url);
            }
        }

        phase("quick_list", None);
        let quick_list = local_quick_list(&cached);

        phase("introduction", None);
        let intro_html = generate_introduction(
            self.client.as_ref(),
            self.retry(),
            config,
            &names,
            &citations,
        )
        .await
        .unwrap_or_else(|e| {
            warn!("Introduction generation failed: {}", e);
            String::new()
        });

        let comparison_table = if config.include_comparison_table {
            phase("comparison_table", None);
            let platforms: Vec<TablePlatform> = cached
                .iter()
                .map(|r| TablePlatform::from_review(r, vertical))
                .collect();
            match generate_comparison_table(
                self.client.as_ref(),
                self.retry(),
                config,
                &platforms,
                &ratings,
            )
            .await
            {
                Ok(table) => Some(table),
                Err(e) => {
                    warn!("Comparison table generation failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let faqs = if config.include_faqs {
            phase("faqs", None);
            generate_faqs(self.client.as_ref(), self.retry(), config, &names, &citations)
                .await
                .unwrap_or_else(|e| {
                    warn!("FAQ generation failed: {}", e);
                    Vec::new()
                })
        } else {
            Vec::new()
        };

        let seo = self.seo_metadata(config, &names, phase).await;

        let reviews = attach_ratings(cached, &ratings);
        info!("📄 Article assembled from cache for {} platforms", reviews.len());
        Ok(Some(GeneratedArticle {
            intro_html,
            quick_list,
            comparison_table,
            reviews,
            additional_sections: Vec::new(),
            faqs,
            citations,
            seo,
        }))
    }

    async fn batch_ratings(
        &self,
        vertical: ca_core::Vertical,
        names: &[String],
    ) -> HashMap<String, Vec<RatingCategory>> {
        match generate_batch_ratings(self.client.as_ref(), self.retry(), vertical, names).await {
            Ok(ratings) => ratings,
            Err(e) => {
                warn!("Batch rating failed, platforms stay unscored: {}", e);
                HashMap::new()
            }
        }
    }

    async fn seo_metadata(
        &self,
        config: &ArticleConfig,
        names: &[String],
        phase: &PhaseProgressFn<'_>,
    ) -> Option<ca_core::SeoMetadata> {
        if config.seo_mode == SeoMode::Off {
            return None;
        }
        phase("seo", None);
        match generate_seo_metadata(self.client.as_ref(), self.retry(), config, names).await {
            Ok(seo) => Some(seo),
            Err(e) => {
                warn!("SEO metadata generation failed: {}", e);
                None
            }
        }
    }
}

fn collect_citations<'a>(citations: impl Iterator<Item = &'a Citation>) -> Vec<Citation> {
    dedup_citations(citations.cloned().collect())
}

fn attach_ratings(
    reviews: Vec<CachedReview>,
    ratings: &HashMap<String, Vec<RatingCategory>>,
) -> Vec<PlatformReview> {
    reviews
        .into_iter()
        .map(|review| {
            let scored = ratings_for(ratings, &review.platform_name)
                .cloned()
                .unwrap_or_default();
            PlatformReview::from_cached(review, scored)
        })
        .collect()
}
