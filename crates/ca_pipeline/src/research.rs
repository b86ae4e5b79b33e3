use std::collections::BTreeMap;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, error, info};

use ca_core::citations::{normalize_citations, source_domains};
use ca_core::parse::extract_json;
use ca_core::types::{RESEARCH_FAILED, UNKNOWN};
use ca_core::{Infosheet, ModelClient, PlatformResearch, ResearchStatus, Result, Vertical};
use ca_models::retry::{with_backoff, RetryConfig};

use crate::prompts;

#[derive(Debug, Clone)]
pub struct ResearchOptions {
    pub retry: RetryConfig,
    /// Skip the second verification pass when at least this fraction of the
    /// vertical's infosheet fields came back filled on the first pass.
    pub verify_skip_ratio: f32,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            verify_skip_ratio: 0.6,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResearchPayload {
    #[serde(default)]
    description: String,
    #[serde(default)]
    fields: BTreeMap<String, String>,
    #[serde(default)]
    key_features: Vec<String>,
    #[serde(default)]
    pros: Vec<String>,
    #[serde(default)]
    cons: Vec<String>,
    #[serde(default)]
    sources: Vec<String>,
}

fn build_infosheet(payload: &ResearchPayload, vertical: Vertical) -> Infosheet {
    let mut sheet = Infosheet::default();
    for field in vertical.infosheet_fields() {
        let value = payload
            .fields
            .get(*field)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(UNKNOWN);
        sheet.fields.insert(field.to_string(), value.to_string());
    }
    sheet
}

/// Research one platform. Never fails: any unrecoverable error is converted
/// into a degraded-but-valid record with failure sentinels and status
/// `Error`, so batch callers always receive a well-typed result per platform.
pub async fn research_platform(
    client: &dyn ModelClient,
    name: &str,
    vertical: Vertical,
    options: &ResearchOptions,
) -> PlatformResearch {
    match research_platform_inner(client, name, vertical, options).await {
        Ok(research) => research,
        Err(e) => {
            error!("Research failed for {}: {}", name, e);
            failed_research(name, vertical)
        }
    }
}

async fn research_platform_inner(
    client: &dyn ModelClient,
    name: &str,
    vertical: Vertical,
    options: &ResearchOptions,
) -> Result<PlatformResearch> {
    info!("🔎 Researching platform: {}", name);
    let messages = prompts::research_messages(name, vertical);
    let first = with_backoff(&options.retry, || client.deep_research(&messages)).await?;
    let first_payload: ResearchPayload = extract_json(&first.content)?;

    let sheet = build_infosheet(&first_payload, vertical);
    let total = vertical.infosheet_fields().len();
    let threshold = (total as f32 * options.verify_skip_ratio).ceil() as usize;
    let filled = sheet.filled_count(vertical);

    // Skip the expensive verification pass when the first answer already
    // looks complete.
    let (payload, output) = if filled >= threshold {
        debug!(
            "First pass for {} filled {}/{} fields, skipping verification",
            name, filled, total
        );
        (first_payload, first)
    } else {
        info!(
            "⚠️ First pass for {} filled only {}/{} fields, verifying",
            name, filled, total
        );
        let follow_up = prompts::verification_messages(name, vertical, &first);
        let second = with_backoff(&options.retry, || client.deep_research(&follow_up)).await?;
        let second_payload: ResearchPayload = extract_json(&second.content)?;
        (second_payload, second)
    };

    let mut raw_sources = payload.sources.clone();
    if let Some(provider_citations) = &output.citations {
        raw_sources.extend(provider_citations.iter().cloned());
    }
    let citations = normalize_citations(&raw_sources);

    let mut infosheet = build_infosheet(&payload, vertical);
    infosheet.data_source = source_domains(&citations, 3).join(", ");
    infosheet.retrieved_at = Some(Utc::now());

    info!("✨ Research completed for {} ({} citations)", name, citations.len());
    Ok(PlatformResearch {
        name: name.to_string(),
        description: payload.description,
        infosheet,
        key_features: payload.key_features,
        pros: payload.pros,
        cons: payload.cons,
        raw_output: output.content,
        citations,
        status: ResearchStatus::Completed,
    })
}

fn failed_research(name: &str, vertical: Vertical) -> PlatformResearch {
    let mut sheet = Infosheet::default();
    for field in vertical.infosheet_fields() {
        sheet.fields.insert(field.to_string(), RESEARCH_FAILED.to_string());
    }
    sheet.retrieved_at = Some(Utc::now());
    PlatformResearch {
        name: name.to_string(),
        description: RESEARCH_FAILED.to_string(),
        infosheet: sheet,
        key_features: vec![],
        pros: vec![],
        cons: vec![],
        raw_output: String::new(),
        citations: vec![],
        status: ResearchStatus::Error,
    }
}
