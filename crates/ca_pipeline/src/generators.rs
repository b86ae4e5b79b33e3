use std::collections::HashMap;

use serde::Deserialize;
use tracing::{info, warn};

use ca_core::citations::ensure_min_citations;
use ca_core::parse::extract_json;
use ca_core::types::NEEDS_MANUAL_REVIEW;
use ca_core::{
    ArticleConfig, ArticleSection, CachedReview, Citation, ComparisonRow, ComparisonTable,
    CompletionRequest, Faq, Infosheet, ModelClient, PlatformResearch, QuickListEntry,
    RatingCategory, Result, SeoMetadata, Vertical,
};
use ca_models::retry::{with_backoff, RetryConfig};

use crate::phrases::{balance_cons, fallback_pros};
use crate::prompts;

/// In-text citation minimums enforced on generated HTML.
pub const MIN_INTRO_CITATIONS: usize = 2;
pub const MIN_OVERVIEW_CITATIONS: usize = 2;
pub const MIN_VERDICT_CITATIONS: usize = 1;

/// Map a 1-10 average onto the 5-star scale. Inclusive lower bounds.
pub fn star_rating(average: f32) -> u8 {
    if average >= 9.0 {
        5
    } else if average >= 7.5 {
        4
    } else if average >= 6.0 {
        3
    } else if average >= 4.5 {
        2
    } else {
        1
    }
}

fn writing_model(config: &ArticleConfig) -> String {
    config.writing_model.clone().unwrap_or_default()
}

async fn complete_json<T: serde::de::DeserializeOwned>(
    client: &dyn ModelClient,
    retry: &RetryConfig,
    model: String,
    messages: Vec<ca_core::ChatMessage>,
) -> Result<T> {
    let raw = with_backoff(retry, || {
        client.complete(CompletionRequest::new(model.clone(), messages.clone()))
    })
    .await?;
    extract_json(&raw)
}

#[derive(Debug, Deserialize)]
struct HtmlPayload {
    #[serde(default)]
    html: String,
}

pub async fn generate_introduction(
    client: &dyn ModelClient,
    retry: &RetryConfig,
    config: &ArticleConfig,
    platform_names: &[String],
    citations: &[Citation],
) -> Result<String> {
    let messages = prompts::introduction_messages(config, platform_names, citations);
    let payload: HtmlPayload =
        complete_json(client, retry, writing_model(config), messages).await?;
    Ok(ensure_min_citations(&payload.html, citations, MIN_INTRO_CITATIONS))
}

#[derive(Debug, Deserialize)]
struct QuickEntryPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    blurb: String,
}

#[derive(Debug, Deserialize)]
struct QuickListPayload {
    #[serde(default)]
    entries: Vec<QuickEntryPayload>,
}

pub async fn generate_platform_quick_list(
    client: &dyn ModelClient,
    retry: &RetryConfig,
    config: &ArticleConfig,
    research: &[PlatformResearch],
) -> Result<Vec<QuickListEntry>> {
    let names: Vec<String> = research.iter().map(|r| r.name.clone()).collect();
    let messages = prompts::quick_list_messages(config, &names);
    let payload: QuickListPayload =
        complete_json(client, retry, writing_model(config), messages).await?;

    // One entry per platform in input order; pad from research descriptions
    // when the model skipped a platform.
    let entries = research
        .iter()
        .map(|r| {
            let blurb = payload
                .entries
                .iter()
                .find(|e| e.name.eq_ignore_ascii_case(&r.name))
                .map(|e| e.blurb.clone())
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| truncate_text(&r.description, 160));
            QuickListEntry {
                platform_name: r.name.clone(),
                blurb,
            }
        })
        .collect();
    Ok(entries)
}

/// Comparison-table input: what assembly knows about a platform, whichever
/// phase it came from.
#[derive(Debug, Clone)]
pub struct TablePlatform {
    pub name: String,
    pub infosheet: Infosheet,
    pub has_valid_data: bool,
}

impl TablePlatform {
    pub fn from_research(research: &PlatformResearch, vertical: Vertical) -> Self {
        Self {
            name: research.name.clone(),
            infosheet: research.infosheet.clone(),
            has_valid_data: research.has_valid_data(vertical),
        }
    }

    pub fn from_review(review: &CachedReview, vertical: Vertical) -> Self {
        let valid = review.infosheet.is_filled(vertical.license_field())
            || !review.citations.is_empty();
        Self {
            name: review.platform_name.clone(),
            infosheet: review.infosheet.clone(),
            has_valid_data: valid,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ColumnsPayload {
    #[serde(default)]
    columns: Vec<String>,
}

/// Column selection is delegated to the model (it sees the article context);
/// row values and star ratings are computed locally.
pub async fn generate_comparison_table(
    client: &dyn ModelClient,
    retry: &RetryConfig,
    config: &ArticleConfig,
    platforms: &[TablePlatform],
    ratings: &HashMap<String, Vec<RatingCategory>>,
) -> Result<ComparisonTable> {
    let names: Vec<String> = platforms.iter().map(|p| p.name.clone()).collect();
    let messages = prompts::comparison_columns_messages(config, &names);
    let payload: ColumnsPayload =
        complete_json(client, retry, writing_model(config), messages).await?;

    let catalogue = config.vertical.infosheet_fields();
    let mut columns: Vec<String> = payload
        .columns
        .into_iter()
        .filter(|c| catalogue.contains(&c.as_str()))
        .take(5)
        .collect();
    if columns.len() < 3 {
        warn!("Model chose {} usable columns, topping up from catalogue", columns.len());
        for field in catalogue {
            if columns.len() >= 3 {
                break;
            }
            if !columns.iter().any(|c| c == field) {
                columns.push(field.to_string());
            }
        }
    }

    let rows = platforms
        .iter()
        .map(|platform| {
            if !platform.has_valid_data {
                return ComparisonRow {
                    platform_name: platform.name.clone(),
                    values: vec![NEEDS_MANUAL_REVIEW.to_string(); columns.len()],
                    rating: "N/A".to_string(),
                };
            }
            let values = columns
                .iter()
                .map(|c| platform.infosheet.get(c).unwrap_or("—").to_string())
                .collect();
            let rating = ratings_for(ratings, &platform.name)
                .and_then(|r| average_score(r))
                .map(|avg| format!("{}/5", star_rating(avg)))
                .unwrap_or_else(|| "N/A".to_string());
            ComparisonRow {
                platform_name: platform.name.clone(),
                values,
                rating,
            }
        })
        .collect();

    Ok(ComparisonTable { columns, rows })
}

#[derive(Debug, Deserialize)]
struct ReviewPayload {
    #[serde(default)]
    overview_html: String,
    #[serde(default)]
    pros: Vec<String>,
    #[serde(default)]
    cons: Vec<String>,
    #[serde(default)]
    verdict_html: String,
}

/// Generate one platform review. A platform without usable research data
/// gets a fixed placeholder (no model call) rather than fabricated facts.
pub async fn generate_platform_review(
    client: &dyn ModelClient,
    retry: &RetryConfig,
    config: &ArticleConfig,
    research: &PlatformResearch,
) -> Result<CachedReview> {
    let affiliate_url = config.affiliate_url_for(&research.name);
    if !research.has_valid_data(config.vertical) {
        info!("⚠️ No usable research for {}, emitting placeholder review", research.name);
        return Ok(placeholder_review(research, affiliate_url));
    }

    let research_json = serde_json::to_string(&serde_json::json!({
        "description": research.description,
        "fields": research.infosheet.fields,
        "key_features": research.key_features,
        "pros": research.pros,
        "cons": research.cons,
    }))?;
    let messages =
        prompts::review_messages(config, &research.name, &research_json, &research.citations);
    let payload: ReviewPayload =
        complete_json(client, retry, writing_model(config), messages).await?;

    let model_pros: Vec<String> = payload
        .pros
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect();
    let pros = if model_pros.is_empty() {
        fallback_pros(research, config.vertical, &config.language)
    } else {
        model_pros
    };
    let cons = if payload.cons.iter().any(|c| !c.trim().is_empty()) {
        balance_cons(&pros, payload.cons)
    } else {
        balance_cons(&pros, research.cons.clone())
    };

    Ok(CachedReview {
        platform_name: research.name.clone(),
        overview_html: ensure_min_citations(
            &payload.overview_html,
            &research.citations,
            MIN_OVERVIEW_CITATIONS,
        ),
        infosheet: research.infosheet.clone(),
        pros,
        cons,
        verdict_html: ensure_min_citations(
            &payload.verdict_html,
            &research.citations,
            MIN_VERDICT_CITATIONS,
        ),
        affiliate_url,
        citations: research.citations.clone(),
    })
}

pub(crate) fn placeholder_review(
    research: &PlatformResearch,
    affiliate_url: Option<String>,
) -> CachedReview {
    CachedReview {
        platform_name: research.name.clone(),
        overview_html: format!(
            "<p>{}: {}. Research did not return enough verifiable data to \
             publish a review.</p>",
            research.name, NEEDS_MANUAL_REVIEW
        ),
        infosheet: research.infosheet.clone(),
        pros: vec![],
        cons: vec![],
        verdict_html: format!("<p>{}.</p>", NEEDS_MANUAL_REVIEW),
        affiliate_url,
        citations: research.citations.clone(),
    }
}

#[derive(Debug, Deserialize)]
struct FaqsPayload {
    #[serde(default)]
    faqs: Vec<Faq>,
}

pub async fn generate_faqs(
    client: &dyn ModelClient,
    retry: &RetryConfig,
    config: &ArticleConfig,
    platform_names: &[String],
    citations: &[Citation],
) -> Result<Vec<Faq>> {
    let messages = prompts::faqs_messages(config, platform_names, citations);
    let payload: FaqsPayload =
        complete_json(client, retry, writing_model(config), messages).await?;
    Ok(payload.faqs)
}

pub async fn generate_seo_metadata(
    client: &dyn ModelClient,
    retry: &RetryConfig,
    config: &ArticleConfig,
    platform_names: &[String],
) -> Result<SeoMetadata> {
    let messages = prompts::seo_messages(config, platform_names);
    complete_json(client, retry, writing_model(config), messages).await
}

#[derive(Debug, Deserialize)]
struct SectionPayload {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    html: String,
}

pub async fn generate_additional_section(
    client: &dyn ModelClient,
    retry: &RetryConfig,
    config: &ArticleConfig,
    heading: &str,
    citations: &[Citation],
) -> Result<ArticleSection> {
    let messages = prompts::additional_section_messages(config, heading, citations);
    let payload: SectionPayload =
        complete_json(client, retry, writing_model(config), messages).await?;
    Ok(ArticleSection {
        heading: if payload.heading.trim().is_empty() {
            heading.to_string()
        } else {
            payload.heading
        },
        html: ensure_min_citations(&payload.html, citations, 1),
    })
}

#[derive(Debug, Deserialize)]
struct RatingsPayload {
    #[serde(default)]
    ratings: HashMap<String, Vec<RatingCategory>>,
}

/// Score all platforms in one call so scores are comparable across platforms
/// researched in different sessions; per-platform scoring drifts.
pub async fn generate_batch_ratings(
    client: &dyn ModelClient,
    retry: &RetryConfig,
    vertical: Vertical,
    platform_names: &[String],
) -> Result<HashMap<String, Vec<RatingCategory>>> {
    let messages = prompts::batch_ratings_messages(vertical, platform_names);
    let payload: RatingsPayload =
        complete_json(client, retry, String::new(), messages).await?;
    Ok(payload.ratings)
}

pub fn ratings_for<'a>(
    ratings: &'a HashMap<String, Vec<RatingCategory>>,
    platform: &str,
) -> Option<&'a Vec<RatingCategory>> {
    ratings
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(platform))
        .map(|(_, r)| r)
}

fn average_score(ratings: &[RatingCategory]) -> Option<f32> {
    if ratings.is_empty() {
        return None;
    }
    let sum: f32 = ratings.iter().map(|r| r.score).sum();
    Some(sum / ratings.len() as f32)
}

/// Quick list built locally from cached overviews; used by cache-only
/// assembly, which makes no model call for this section.
pub fn local_quick_list(reviews: &[CachedReview]) -> Vec<QuickListEntry> {
    reviews
        .iter()
        .map(|r| QuickListEntry {
            platform_name: r.platform_name.clone(),
            blurb: truncate_text(&strip_tags(&r.overview_html), 160),
        })
        .collect()
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}…", truncated.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ca_core::types::RESEARCH_FAILED;
    use ca_core::{ChatMessage, Error, ResearchOutput, ResearchStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns one canned completion and counts calls.
    struct CannedClient {
        response: String,
        calls: AtomicUsize,
    }

    impl CannedClient {
        fn new(response: impl Into<String>) -> Self {
            Self {
                response: response.into(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelClient for CannedClient {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }

        async fn deep_research(&self, _messages: &[ChatMessage]) -> Result<ResearchOutput> {
            Err(Error::Model("not a research client".to_string()))
        }
    }

    fn retry() -> RetryConfig {
        RetryConfig::default()
            .with_max_retries(0)
            .with_base_delay(Duration::from_millis(1))
    }

    fn config() -> ArticleConfig {
        ArticleConfig::new(
            Vertical::Gambling,
            vec![ca_core::PlatformInput {
                name: "Acme".to_string(),
                affiliate_url: Some("https://aff.example/acme".to_string()),
            }],
        )
    }

    fn valid_research() -> PlatformResearch {
        let mut sheet = Infosheet::default();
        sheet.fields.insert("license".to_string(), "MGA".to_string());
        sheet.fields.insert("min_deposit".to_string(), "$10".to_string());
        sheet.fields.insert("payout_speed".to_string(), "24h".to_string());
        PlatformResearch {
            name: "Acme".to_string(),
            description: "Acme is a licensed operator.".to_string(),
            infosheet: sheet,
            key_features: vec!["Fast payouts".to_string()],
            pros: vec!["Licensed operator".to_string(), "Low deposit".to_string()],
            cons: vec!["No phone support".to_string(), "Slow weekends".to_string()],
            raw_output: String::new(),
            citations: ca_core::citations::normalize_citations(&[
                "https://a.com/acme".to_string(),
                "https://b.com/acme".to_string(),
            ]),
            status: ResearchStatus::Completed,
        }
    }

    #[test]
    fn test_star_rating_breakpoints() {
        assert_eq!(star_rating(9.2), 5);
        assert_eq!(star_rating(9.0), 5);
        assert_eq!(star_rating(7.5), 4);
        assert_eq!(star_rating(6.0), 3);
        assert_eq!(star_rating(4.5), 2);
        assert_eq!(star_rating(4.49), 1);
        assert_eq!(star_rating(1.0), 1);
    }

    #[tokio::test]
    async fn test_review_pros_fall_back_to_research_pros() {
        // Model returns empty pros; the research record has two.
        let client = CannedClient::new(
            r#"{"overview_html": "<p>Fine platform.</p>", "pros": [], "cons": ["x", "y", "z"], "verdict_html": "<p>Good.</p>"}"#,
        );
        let review = generate_platform_review(&client, &retry(), &config(), &valid_research())
            .await
            .unwrap();
        assert_eq!(review.pros, vec!["Licensed operator", "Low deposit"]);
        // Cons capped at len(pros) - 1.
        assert_eq!(review.cons.len(), 1);
        assert_eq!(review.affiliate_url.as_deref(), Some("https://aff.example/acme"));
    }

    #[tokio::test]
    async fn test_review_overview_gets_citation_minimum() {
        let client = CannedClient::new(
            r#"{"overview_html": "<p>No citations here.</p>", "pros": ["a", "b"], "cons": [], "verdict_html": "<p>Ok.</p>"}"#,
        );
        let review = generate_platform_review(&client, &retry(), &config(), &valid_research())
            .await
            .unwrap();
        assert!(review.overview_html.matches("<a ").count() >= MIN_OVERVIEW_CITATIONS);
    }

    #[tokio::test]
    async fn test_invalid_research_gets_placeholder_without_model_call() {
        let client = CannedClient::new("should never be used");
        let mut research = valid_research();
        research.status = ResearchStatus::Error;
        research.citations.clear();
        for value in research.infosheet.fields.values_mut() {
            *value = RESEARCH_FAILED.to_string();
        }

        let review = generate_platform_review(&client, &retry(), &config(), &research)
            .await
            .unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert!(review.overview_html.contains(NEEDS_MANUAL_REVIEW));
        assert!(review.pros.is_empty());
    }

    #[tokio::test]
    async fn test_comparison_table_marks_invalid_platforms() {
        let client = CannedClient::new(r#"{"columns": ["license", "min_deposit", "payout_speed"]}"#);
        let valid = TablePlatform::from_research(&valid_research(), Vertical::Gambling);
        let mut broken = valid.clone();
        broken.name = "Bravo".to_string();
        broken.has_valid_data = false;

        let mut ratings = HashMap::new();
        ratings.insert(
            "Acme".to_string(),
            vec![
                RatingCategory { category: "Trust & Licensing".to_string(), score: 9.5 },
                RatingCategory { category: "Bonuses".to_string(), score: 9.1 },
            ],
        );

        let table = generate_comparison_table(
            &client,
            &retry(),
            &config(),
            &[valid, broken],
            &ratings,
        )
        .await
        .unwrap();

        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.rows[0].rating, "5/5");
        assert_eq!(table.rows[0].values[0], "MGA");
        assert_eq!(table.rows[1].rating, "N/A");
        assert!(table.rows[1].values.iter().all(|v| v == NEEDS_MANUAL_REVIEW));
    }

    #[tokio::test]
    async fn test_comparison_columns_topped_up_when_model_underdelivers() {
        let client = CannedClient::new(r#"{"columns": ["license", "not_a_field"]}"#);
        let platforms = [TablePlatform::from_research(&valid_research(), Vertical::Gambling)];
        let table = generate_comparison_table(
            &client,
            &retry(),
            &config(),
            &platforms,
            &HashMap::new(),
        )
        .await
        .unwrap();
        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.columns[0], "license");
        assert!(table.rows[0].rating == "N/A");
    }

    #[tokio::test]
    async fn test_quick_list_pads_missing_platforms() {
        let client =
            CannedClient::new(r#"{"entries": [{"name": "acme", "blurb": "Top pick."}]}"#);
        let mut second = valid_research();
        second.name = "Bravo".to_string();
        second.description = "Bravo focuses on live dealers.".to_string();

        let list = generate_platform_quick_list(
            &client,
            &retry(),
            &config(),
            &[valid_research(), second],
        )
        .await
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].blurb, "Top pick.");
        assert_eq!(list[1].blurb, "Bravo focuses on live dealers.");
    }

    #[tokio::test]
    async fn test_malformed_generator_output_is_fatal() {
        let client = CannedClient::new("not json");
        let names = vec!["Acme".to_string()];
        let err = generate_seo_metadata(&client, &retry(), &config(), &names)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedOutput(_)));
        // One call only: parse failures are not retried.
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_local_quick_list_strips_tags_and_truncates() {
        let mut review = CachedReview {
            platform_name: "Acme".to_string(),
            overview_html: "<p>Short overview.</p>".to_string(),
            infosheet: Infosheet::default(),
            pros: vec![],
            cons: vec![],
            verdict_html: String::new(),
            affiliate_url: None,
            citations: vec![],
        };
        let list = local_quick_list(std::slice::from_ref(&review));
        assert_eq!(list[0].blurb, "Short overview.");

        review.overview_html = format!("<p>{}</p>", "long ".repeat(60));
        let list = local_quick_list(std::slice::from_ref(&review));
        assert!(list[0].blurb.chars().count() <= 161);
        assert!(list[0].blurb.ends_with('…'));
    }
}
