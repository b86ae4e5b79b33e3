use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;

use ca_core::{ChatMessage, CompletionRequest, ModelClient, ResearchOutput, Result};

/// Offline backend producing deterministic, well-formed outputs for every
/// pipeline task. Used for tests and dry runs; answers are keyed off the
/// `Task:` / `Fields:` / `Platform:` metadata lines every prompt carries.
#[derive(Default)]
pub struct DummyClient {
    complete_calls: AtomicUsize,
    research_calls: AtomicUsize,
}

impl fmt::Debug for DummyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyClient")
            .field("complete_calls", &self.complete_calls.load(Ordering::SeqCst))
            .field("research_calls", &self.research_calls.load(Ordering::SeqCst))
            .finish()
    }
}

fn prompt_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn metadata_line<'a>(prompt: &'a str, key: &str) -> Option<&'a str> {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix(key))
        .map(str::trim)
}

fn metadata_list(prompt: &str, key: &str) -> Vec<String> {
    metadata_line(prompt, key)
        .map(|line| {
            line.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

impl DummyClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn research_calls(&self) -> usize {
        self.research_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.complete_calls() + self.research_calls()
    }

    fn answer(&self, prompt: &str) -> String {
        let task = metadata_line(prompt, "Task:").unwrap_or("unknown");
        let platform = metadata_line(prompt, "Platform:").unwrap_or("the platform");
        let platforms = metadata_list(prompt, "Platforms:");
        let fields = metadata_list(prompt, "Fields:");
        let categories = metadata_list(prompt, "Categories:");

        match task {
            "introduction" => json!({
                "html": format!(
                    "<p>Choosing between {} options takes careful comparison. \
                     This guide walks through the contenders in detail.</p>",
                    platforms.len().max(1)
                )
            })
            .to_string(),
            "quick_list" => json!({
                "entries": platforms.iter().map(|name| json!({
                    "name": name,
                    "blurb": format!("{} stands out for its straightforward onboarding.", name)
                })).collect::<Vec<_>>()
            })
            .to_string(),
            "comparison_table" => {
                let columns: Vec<&String> = fields.iter().take(4).collect();
                json!({ "columns": columns }).to_string()
            }
            "review" => json!({
                "overview_html": format!(
                    "<p>{} offers a dependable service with a clear fee structure.</p>",
                    platform
                ),
                "pros": [
                    format!("{} has transparent pricing", platform),
                    "Responsive support team",
                    "Simple account setup"
                ],
                "cons": ["Limited regional availability"],
                "verdict_html": format!(
                    "<p>Overall, {} is a solid pick for most users.</p>",
                    platform
                )
            })
            .to_string(),
            "faqs" => json!({
                "faqs": [
                    {
                        "question": "Which platform is best overall?",
                        "answer_html": "<p>It depends on your priorities; see the table above.</p>"
                    },
                    {
                        "question": "Are these platforms safe to use?",
                        "answer_html": "<p>All reviewed platforms hold a verifiable license.</p>"
                    }
                ]
            })
            .to_string(),
            "seo" => json!({
                "title": "Best Platforms Compared",
                "description": "An in-depth, citation-backed comparison.",
                "slug": "best-platforms-compared",
                "keywords": ["comparison", "review"]
            })
            .to_string(),
            "additional_section" => json!({
                "heading": metadata_line(prompt, "Heading:").unwrap_or("More to know"),
                "html": "<p>Further context relevant to this comparison.</p>"
            })
            .to_string(),
            "batch_ratings" => {
                let ratings: serde_json::Map<String, serde_json::Value> = platforms
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        let scores: Vec<serde_json::Value> = categories
                            .iter()
                            .map(|c| json!({ "category": c, "score": 7.0 + (i as f32) * 0.5 }))
                            .collect();
                        (name.clone(), json!(scores))
                    })
                    .collect();
                json!({ "ratings": ratings }).to_string()
            }
            _ => json!({ "html": "<p>Generated content.</p>" }).to_string(),
        }
    }
}

#[async_trait]
impl ModelClient for DummyClient {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer(&prompt_text(&request.messages)))
    }

    async fn deep_research(&self, messages: &[ChatMessage]) -> Result<ResearchOutput> {
        self.research_calls.fetch_add(1, Ordering::SeqCst);
        let prompt = prompt_text(messages);
        let platform = metadata_line(&prompt, "Platform:").unwrap_or("platform");
        let fields = metadata_list(&prompt, "Fields:");

        let sheet: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|f| (f.clone(), json!(format!("Sample {} data", f))))
            .collect();
        let slug = platform.to_lowercase().replace(' ', "-");

        let content = json!({
            "description": format!("{} is an established platform with a broad offering.", platform),
            "fields": sheet,
            "key_features": ["Fast onboarding", "Mobile app", "Live support"],
            "pros": [
                format!("{} is fully licensed", platform),
                "Low minimum deposit"
            ],
            "cons": ["No phone support"],
            "sources": [
                format!("https://www.example.com/reviews/{}", slug),
                format!("https://registry.example.org/{}", slug)
            ]
        })
        .to_string();

        Ok(ResearchOutput {
            content,
            citations: None,
            reasoning_details: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_core::parse::extract_json;
    use serde_json::Value;

    #[tokio::test]
    async fn test_research_fills_requested_fields() {
        let client = DummyClient::new();
        let messages = vec![ChatMessage::user(
            "Task: research\nPlatform: Acme\nFields: license, country, min_deposit",
        )];
        let output = client.deep_research(&messages).await.unwrap();
        let parsed: Value = extract_json(&output.content).unwrap();
        assert_eq!(parsed["fields"]["license"], "Sample license data");
        assert_eq!(client.research_calls(), 1);
    }

    #[tokio::test]
    async fn test_batch_ratings_cover_all_platforms() {
        let client = DummyClient::new();
        let request = CompletionRequest::new(
            "dummy",
            vec![ChatMessage::user(
                "Task: batch_ratings\nPlatforms: Acme, Bravo\nCategories: Security, Fees",
            )],
        );
        let raw = client.complete(request).await.unwrap();
        let parsed: Value = extract_json(&raw).unwrap();
        assert!(parsed["ratings"]["Acme"].is_array());
        assert!(parsed["ratings"]["Bravo"].is_array());
    }
}
