use ca_core::{ArticleConfig, ChatMessage, Citation, ResearchOutput, Vertical};

/// Render the closed citation set a generator may cite from, one per line as
/// `N. domain - url`.
pub fn citation_index(citations: &[Citation]) -> String {
    citations
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let link = if c.source_url.is_empty() {
                &c.search_url
            } else {
                &c.source_url
            };
            format!("{}. {} - {}", i + 1, c.domain, link)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Constraints shared by every content generator: language, tone, keywords,
/// internal links (each usable at most once article-wide), custom notes.
fn shared_context(config: &ArticleConfig) -> String {
    let mut lines = vec![
        format!("Language: {}", config.language),
        format!("Tone of voice: {}", config.tone.as_str()),
        format!("Vertical: {}", config.vertical),
    ];
    if !config.narrative.is_empty() {
        lines.push(format!("Article narrative: {}", config.narrative));
    }
    if !config.seo_keywords.is_empty() {
        lines.push(format!(
            "Target keywords ({:?} SEO mode): {}",
            config.seo_mode,
            config.seo_keywords.join(", ")
        ));
    }
    if !config.internal_links.is_empty() {
        let links = config
            .internal_links
            .iter()
            .map(|l| format!("{} ({})", l.anchor_text, l.url))
            .collect::<Vec<_>>()
            .join("; ");
        lines.push(format!(
            "Internal links, each may appear at most once in the whole article: {}",
            links
        ));
    }
    if !config.custom_instructions.is_empty() {
        lines.push(format!("Additional instructions: {}", config.custom_instructions));
    }
    lines.join("\n")
}

fn writer_system(config: &ArticleConfig) -> ChatMessage {
    ChatMessage::system(format!(
        "You are an expert comparison-content writer. Respond with strict JSON \
         only, no prose outside the JSON object.\n{}",
        shared_context(config)
    ))
}

pub fn research_messages(platform: &str, vertical: Vertical) -> Vec<ChatMessage> {
    let fields = vertical.infosheet_fields().join(", ");
    vec![
        ChatMessage::system(
            "You are a meticulous research assistant. Verify facts against \
             primary sources and respond with a single JSON object only.",
        ),
        ChatMessage::user(format!(
            "Task: research\nPlatform: {platform}\nVertical: {vertical}\nFields: {fields}\n\n\
             Research the platform \"{platform}\" and return one JSON object with:\n\
             - \"description\": two-sentence factual summary\n\
             - \"fields\": object keyed by exactly the field names above; use \
             \"Unknown\" or \"Not publicly disclosed\" when a fact cannot be verified\n\
             - \"key_features\": array of short strings\n\
             - \"pros\": array of short strings\n\
             - \"cons\": array of short strings\n\
             - \"sources\": array of URLs you actually consulted"
        )),
    ]
}

/// Second research pass: hand the first answer back as assistant context and
/// ask the model to close the gaps.
pub fn verification_messages(
    platform: &str,
    vertical: Vertical,
    first: &ResearchOutput,
) -> Vec<ChatMessage> {
    let mut messages = research_messages(platform, vertical);
    let mut assistant = ChatMessage::assistant(first.content.clone());
    assistant.reasoning_details = first.reasoning_details.clone();
    messages.push(assistant);
    messages.push(ChatMessage::user(
        "Several fields above are still Unknown or not disclosed. Double down on \
         those missing fields specifically, re-verify against primary sources, and \
         return the complete JSON object again in the same shape.",
    ));
    messages
}

pub fn introduction_messages(
    config: &ArticleConfig,
    platform_names: &[String],
    citations: &[Citation],
) -> Vec<ChatMessage> {
    vec![
        writer_system(config),
        ChatMessage::user(format!(
            "Task: introduction\nPlatforms: {}\n\nWrite an article introduction of \
             about {} words as HTML paragraphs, citing only from this source index:\n{}\n\n\
             Return JSON: {{\"html\": \"...\"}}",
            platform_names.join(", "),
            config.word_counts.intro,
            citation_index(citations)
        )),
    ]
}

pub fn quick_list_messages(config: &ArticleConfig, platform_names: &[String]) -> Vec<ChatMessage> {
    vec![
        writer_system(config),
        ChatMessage::user(format!(
            "Task: quick_list\nPlatforms: {}\n\nWrite one-line blurbs, one per \
             platform, in input order.\nReturn JSON: {{\"entries\": [{{\"name\": \"...\", \
             \"blurb\": \"...\"}}]}}",
            platform_names.join(", ")
        )),
    ]
}

pub fn comparison_columns_messages(
    config: &ArticleConfig,
    platform_names: &[String],
) -> Vec<ChatMessage> {
    let fields = config.vertical.infosheet_fields().join(", ");
    vec![
        writer_system(config),
        ChatMessage::user(format!(
            "Task: comparison_table\nPlatforms: {}\nFields: {}\n\nGiven the article \
             context above, choose the 3-5 most relevant comparison columns from the \
             field catalogue.\nReturn JSON: {{\"columns\": [\"...\"]}}",
            platform_names.join(", "),
            fields
        )),
    ]
}

pub fn review_messages(
    config: &ArticleConfig,
    platform: &str,
    research_json: &str,
    citations: &[Citation],
) -> Vec<ChatMessage> {
    vec![
        writer_system(config),
        ChatMessage::user(format!(
            "Task: review\nPlatform: {platform}\n\nUsing only the verified research \
             data below, write a review of about {} words. Cite only from the source \
             index.\n\nResearch data:\n{research_json}\n\nSource index:\n{}\n\n\
             Return JSON: {{\"overview_html\": \"...\", \"pros\": [\"...\"], \
             \"cons\": [\"...\"], \"verdict_html\": \"...\"}}",
            config.word_counts.review,
            citation_index(citations)
        )),
    ]
}

pub fn faqs_messages(config: &ArticleConfig, platform_names: &[String], citations: &[Citation]) -> Vec<ChatMessage> {
    vec![
        writer_system(config),
        ChatMessage::user(format!(
            "Task: faqs\nPlatforms: {}\n\nWrite 4-6 frequently asked questions with \
             concise HTML answers, citing only from this source index:\n{}\n\n\
             Return JSON: {{\"faqs\": [{{\"question\": \"...\", \"answer_html\": \"...\"}}]}}",
            platform_names.join(", "),
            citation_index(citations)
        )),
    ]
}

pub fn seo_messages(config: &ArticleConfig, platform_names: &[String]) -> Vec<ChatMessage> {
    vec![
        writer_system(config),
        ChatMessage::user(format!(
            "Task: seo\nPlatforms: {}\n\nProduce SEO metadata for the finished \
             article.\nReturn JSON: {{\"title\": \"...\", \"description\": \"...\", \
             \"slug\": \"...\", \"keywords\": [\"...\"]}}",
            platform_names.join(", ")
        )),
    ]
}

pub fn additional_section_messages(
    config: &ArticleConfig,
    heading: &str,
    citations: &[Citation],
) -> Vec<ChatMessage> {
    vec![
        writer_system(config),
        ChatMessage::user(format!(
            "Task: additional_section\nHeading: {heading}\n\nWrite a section of about \
             {} words under this heading as HTML, citing only from this source \
             index:\n{}\n\nReturn JSON: {{\"heading\": \"...\", \"html\": \"...\"}}",
            config.word_counts.additional,
            citation_index(citations)
        )),
    ]
}

/// All platforms are scored in one call so scores stay comparable across
/// platforms researched in different sessions.
pub fn batch_ratings_messages(vertical: Vertical, platform_names: &[String]) -> Vec<ChatMessage> {
    let categories = vertical.rating_categories().join(", ");
    vec![
        ChatMessage::system(
            "You are scoring platforms for a comparison article. Score every \
             platform relative to the others in this list, not in isolation. \
             Respond with strict JSON only.",
        ),
        ChatMessage::user(format!(
            "Task: batch_ratings\nPlatforms: {}\nCategories: {}\n\nScore each \
             platform 1.0-10.0 per category.\nReturn JSON: {{\"ratings\": \
             {{\"<platform>\": [{{\"category\": \"...\", \"score\": 0.0}}]}}}}",
            platform_names.join(", "),
            categories
        )),
    ]
}
