use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder value the research model uses when a fact is not public.
pub const NOT_DISCLOSED: &str = "Not publicly disclosed";
/// Placeholder value for facts the research model could not establish.
pub const UNKNOWN: &str = "Unknown";
/// Sentinel written into every infosheet field when research failed outright.
pub const RESEARCH_FAILED: &str = "Research failed";
/// Label attached to comparison rows for platforms without usable research.
pub const NEEDS_MANUAL_REVIEW: &str = "Requires manual review";

/// Content domain profile. Selects the infosheet field catalogue and the
/// rating categories used for scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vertical {
    Gambling,
    Crypto,
}

impl Vertical {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vertical::Gambling => "gambling",
            Vertical::Crypto => "crypto",
        }
    }

    /// Ordered infosheet field catalogue for this vertical.
    pub fn infosheet_fields(&self) -> &'static [&'static str] {
        match self {
            Vertical::Gambling => &[
                "license",
                "country",
                "min_deposit",
                "payment_methods",
                "payout_speed",
                "game_selection",
                "bonus_offer",
                "customer_support",
            ],
            Vertical::Crypto => &[
                "regulation",
                "headquarters",
                "trading_fees",
                "supported_assets",
                "min_deposit",
                "payment_methods",
                "security_features",
                "staking_support",
                "customer_support",
            ],
        }
    }

    /// Categories scored by the batch ratings call.
    pub fn rating_categories(&self) -> &'static [&'static str] {
        match self {
            Vertical::Gambling => &[
                "Trust & Licensing",
                "Game Variety",
                "Bonuses",
                "Payout Speed",
                "User Experience",
            ],
            Vertical::Crypto => &[
                "Security",
                "Fees",
                "Asset Selection",
                "Ease of Use",
                "Customer Support",
            ],
        }
    }

    /// The field naming the platform's regulator or license.
    pub fn license_field(&self) -> &'static str {
        match self {
            Vertical::Gambling => "license",
            Vertical::Crypto => "regulation",
        }
    }

    pub fn deposit_field(&self) -> &'static str {
        "min_deposit"
    }

    pub fn payout_field(&self) -> &'static str {
        match self {
            Vertical::Gambling => "payout_speed",
            Vertical::Crypto => "trading_fees",
        }
    }
}

impl fmt::Display for Vertical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vertical {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gambling" => Ok(Vertical::Gambling),
            "crypto" => Ok(Vertical::Crypto),
            other => Err(format!("Unknown vertical: {}", other)),
        }
    }
}

/// A normalized source reference. `domain` is always a bare hostname without
/// a `www.` prefix; `search_url` is a deterministically built search link
/// that resolves even when `source_url` does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub source_url: String,
    pub search_url: String,
    pub domain: String,
}

/// Vertical-dependent fact sheet for one platform. Written once by the
/// research pass, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Infosheet {
    pub fields: BTreeMap<String, String>,
    /// Comma list of up to 3 source domains backing the data.
    pub data_source: String,
    pub retrieved_at: Option<DateTime<Utc>>,
}

impl Infosheet {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Whether a field holds a real value rather than a placeholder.
    pub fn is_filled(&self, field: &str) -> bool {
        match self.get(field) {
            Some(v) => {
                !v.trim().is_empty()
                    && v != UNKNOWN
                    && v != NOT_DISCLOSED
                    && v != RESEARCH_FAILED
            }
            None => false,
        }
    }

    pub fn filled_count(&self, vertical: Vertical) -> usize {
        vertical
            .infosheet_fields()
            .iter()
            .filter(|f| self.is_filled(f))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchStatus {
    Pending,
    Researching,
    Completed,
    Error,
}

/// One platform's raw research bundle, as produced by the research pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformResearch {
    pub name: String,
    pub description: String,
    pub infosheet: Infosheet,
    pub key_features: Vec<String>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub raw_output: String,
    pub citations: Vec<Citation>,
    pub status: ResearchStatus,
}

impl PlatformResearch {
    /// Whether the record carries enough verified facts to write a review
    /// from. License+deposit, license+payout, or at least one citation.
    pub fn has_valid_data(&self, vertical: Vertical) -> bool {
        if self.status == ResearchStatus::Error {
            return false;
        }
        let license = self.infosheet.is_filled(vertical.license_field());
        let deposit = self.infosheet.is_filled(vertical.deposit_field());
        let payout = self.infosheet.is_filled(vertical.payout_field());
        (license && deposit) || (license && payout) || !self.citations.is_empty()
    }
}

/// Review content cached between the generation and assembly phases.
/// Deliberately carries no ratings: those are computed comparatively across
/// all cached platforms at assembly time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedReview {
    pub platform_name: String,
    pub overview_html: String,
    pub infosheet: Infosheet,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub verdict_html: String,
    pub affiliate_url: Option<String>,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingCategory {
    pub category: String,
    /// 1.0–10.0
    pub score: f32,
}

/// The assembled, ratings-attached review embedded in the final article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformReview {
    pub platform_name: String,
    pub overview_html: String,
    pub infosheet: Infosheet,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub verdict_html: String,
    pub affiliate_url: Option<String>,
    pub citations: Vec<Citation>,
    pub ratings: Vec<RatingCategory>,
}

impl PlatformReview {
    pub fn from_cached(review: CachedReview, ratings: Vec<RatingCategory>) -> Self {
        Self {
            platform_name: review.platform_name,
            overview_html: review.overview_html,
            infosheet: review.infosheet,
            pros: review.pros,
            cons: review.cons,
            verdict_html: review.verdict_html,
            affiliate_url: review.affiliate_url,
            citations: review.citations,
            ratings,
        }
    }

    pub fn average_score(&self) -> Option<f32> {
        if self.ratings.is_empty() {
            return None;
        }
        let sum: f32 = self.ratings.iter().map(|r| r.score).sum();
        Some(sum / self.ratings.len() as f32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickListEntry {
    pub platform_name: String,
    pub blurb: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub platform_name: String,
    /// Cell values in column order.
    pub values: Vec<String>,
    /// Star rating rendered as e.g. "4/5", or "N/A" for unscored platforms.
    pub rating: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    /// 3–5 infosheet fields the model judged most relevant for this article.
    pub columns: Vec<String>,
    pub rows: Vec<ComparisonRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faq {
    pub question: String,
    pub answer_html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoMetadata {
    pub title: String,
    pub description: String,
    pub slug: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSection {
    pub heading: String,
    pub html: String,
}

/// Top-level article aggregate. Assembled fresh on every generate/assemble
/// action; never persisted as one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub intro_html: String,
    pub quick_list: Vec<QuickListEntry>,
    pub comparison_table: Option<ComparisonTable>,
    pub reviews: Vec<PlatformReview>,
    pub additional_sections: Vec<ArticleSection>,
    pub faqs: Vec<Faq>,
    /// Deduplicated by domain across every section.
    pub citations: Vec<Citation>,
    pub seo: Option<SeoMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformInput {
    pub name: String,
    #[serde(default)]
    pub affiliate_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeoMode {
    Off,
    Light,
    Aggressive,
}

impl Default for SeoMode {
    fn default() -> Self {
        SeoMode::Light
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Neutral,
    Friendly,
    Professional,
    Enthusiastic,
}

impl Default for Tone {
    fn default() -> Self {
        Tone::Neutral
    }
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Neutral => "neutral",
            Tone::Friendly => "friendly",
            Tone::Professional => "professional",
            Tone::Enthusiastic => "enthusiastic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalLink {
    pub url: String,
    pub anchor_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionWordCounts {
    pub intro: u32,
    pub review: u32,
    pub additional: u32,
}

impl Default for SectionWordCounts {
    fn default() -> Self {
        Self {
            intro: 250,
            review: 400,
            additional: 300,
        }
    }
}

/// Everything the UI/config layer hands the pipeline for one article run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleConfig {
    pub vertical: Vertical,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub narrative: String,
    pub platforms: Vec<PlatformInput>,
    #[serde(default)]
    pub word_counts: SectionWordCounts,
    #[serde(default = "default_true")]
    pub include_comparison_table: bool,
    #[serde(default = "default_true")]
    pub include_faqs: bool,
    #[serde(default)]
    pub include_additional_sections: bool,
    #[serde(default)]
    pub additional_section_headings: Vec<String>,
    #[serde(default)]
    pub seo_keywords: Vec<String>,
    #[serde(default)]
    pub seo_mode: SeoMode,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub custom_instructions: String,
    #[serde(default)]
    pub internal_links: Vec<InternalLink>,
    #[serde(default)]
    pub writing_model: Option<String>,
    #[serde(default)]
    pub disclaimer: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_true() -> bool {
    true
}

impl ArticleConfig {
    pub fn new(vertical: Vertical, platforms: Vec<PlatformInput>) -> Self {
        Self {
            vertical,
            language: default_language(),
            narrative: String::new(),
            platforms,
            word_counts: SectionWordCounts::default(),
            include_comparison_table: true,
            include_faqs: true,
            include_additional_sections: false,
            additional_section_headings: Vec::new(),
            seo_keywords: Vec::new(),
            seo_mode: SeoMode::default(),
            tone: Tone::default(),
            custom_instructions: String::new(),
            internal_links: Vec::new(),
            writing_model: None,
            disclaimer: None,
        }
    }

    pub fn affiliate_url_for(&self, platform: &str) -> Option<String> {
        self.platforms
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(platform))
            .and_then(|p| p.affiliate_url.clone())
    }
}
