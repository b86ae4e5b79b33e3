use url::Url;

use crate::types::Citation;

/// Deterministic search link used as the guaranteed-resolvable fallback for
/// source URLs the model may have hallucinated.
pub fn google_search_url(query: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("https://www.google.com/search?q={}", encoded)
}

/// Turn one raw source string (URL or free text) into a `Citation`.
///
/// Only strings starting with `http://`/`https://` are treated as URLs;
/// anything else is wrapped as a non-URL research source whose search link is
/// built from the text itself.
pub fn normalize_citation(raw: &str) -> Citation {
    let raw = raw.trim();
    if raw.starts_with("http://") || raw.starts_with("https://") {
        let domain = Url::parse(raw)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .map(|h| h.trim_start_matches("www.").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Citation {
            title: domain.clone(),
            source_url: raw.to_string(),
            // Built from the full URL text, so it resolves to a search even
            // when the underlying domain is unreachable.
            search_url: google_search_url(raw),
            domain,
        }
    } else {
        Citation {
            title: raw.to_string(),
            source_url: String::new(),
            search_url: google_search_url(raw),
            domain: "research".to_string(),
        }
    }
}

/// Normalize a model's raw `sources` array and deduplicate it.
pub fn normalize_citations(raw: &[String]) -> Vec<Citation> {
    let normalized: Vec<Citation> = raw
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| normalize_citation(s))
        .collect();
    dedup_citations(normalized)
}

/// Deduplicate by lower-cased domain; the first citation for a domain wins,
/// independent of title differences.
pub fn dedup_citations(citations: Vec<Citation>) -> Vec<Citation> {
    let mut seen: Vec<String> = Vec::new();
    let mut result = Vec::new();
    for citation in citations {
        let key = citation.domain.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            result.push(citation);
        }
    }
    result
}

/// Up to `limit` unique source domains, for the human-readable attribution
/// string stamped into an infosheet.
pub fn source_domains(citations: &[Citation], limit: usize) -> Vec<String> {
    let mut domains = Vec::new();
    for citation in citations {
        let domain = citation.domain.to_lowercase();
        if domain != "research" && !domains.contains(&domain) {
            domains.push(domain);
            if domains.len() == limit {
                break;
            }
        }
    }
    domains
}

fn anchor_for(citation: &Citation) -> String {
    let href = if citation.source_url.is_empty() {
        &citation.search_url
    } else {
        &citation.source_url
    };
    format!(
        "<a href=\"{}\" target=\"_blank\" rel=\"noopener\">{}</a>",
        href, citation.domain
    )
}

fn anchor_count(html: &str) -> usize {
    html.to_lowercase().matches("<a ").count()
}

/// Guarantee at least `min` in-text citation anchors inside a block of
/// generated HTML. The content model is unreliable about inserting the
/// citations it was asked to use, so missing ones are synthesized from the
/// first not-yet-used citations and appended before the last closing
/// paragraph tag (or at the very end when no paragraph tag exists).
pub fn ensure_min_citations(html: &str, citations: &[Citation], min: usize) -> String {
    let existing = anchor_count(html);
    if existing >= min || citations.is_empty() {
        return html.to_string();
    }

    let mut anchors = Vec::new();
    for citation in citations {
        if anchors.len() + existing >= min {
            break;
        }
        let used = (!citation.source_url.is_empty() && html.contains(&citation.source_url))
            || html.contains(&citation.search_url);
        if !used {
            anchors.push(anchor_for(citation));
        }
    }
    if anchors.is_empty() {
        return html.to_string();
    }

    let injected = format!(" ({})", anchors.join(", "));
    match html.rfind("</p>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + injected.len());
            out.push_str(&html[..pos]);
            out.push_str(&injected);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{}{}", html, injected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_strips_www() {
        let citation = normalize_citation("https://www.example.com/review");
        assert_eq!(citation.domain, "example.com");
        assert_eq!(citation.source_url, "https://www.example.com/review");
        assert!(citation.search_url.starts_with("https://www.google.com/search?q="));
    }

    #[test]
    fn test_normalize_free_text_gets_search_fallback() {
        let citation = normalize_citation("Malta Gaming Authority register");
        assert_eq!(citation.domain, "research");
        assert!(citation.source_url.is_empty());
        assert!(citation.search_url.contains("Malta+Gaming+Authority"));
    }

    #[test]
    fn test_dedup_is_case_insensitive_first_wins() {
        let citations = vec![
            Citation {
                title: "first".to_string(),
                source_url: "https://a.com/x".to_string(),
                search_url: google_search_url("https://a.com/x"),
                domain: "a.com".to_string(),
            },
            Citation {
                title: "second".to_string(),
                source_url: "https://A.COM/y".to_string(),
                search_url: google_search_url("https://A.COM/y"),
                domain: "A.COM".to_string(),
            },
            Citation {
                title: "third".to_string(),
                source_url: "https://b.com".to_string(),
                search_url: google_search_url("https://b.com"),
                domain: "b.com".to_string(),
            },
        ];
        let deduped = dedup_citations(citations);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "first");
        assert_eq!(deduped[1].domain, "b.com");
    }

    #[test]
    fn test_min_citations_injected_before_closing_paragraph() {
        let citations = normalize_citations(&[
            "https://a.com/source".to_string(),
            "https://b.com/source".to_string(),
        ]);
        let html = ensure_min_citations("<p>Some text.</p>", &citations, 2);
        assert_eq!(anchor_count(&html), 2);
        let insert_pos = html.find("<a ").unwrap();
        assert!(insert_pos < html.rfind("</p>").unwrap());
        assert!(html.ends_with("</p>"));
    }

    #[test]
    fn test_min_citations_appended_without_paragraph_tag() {
        let citations = normalize_citations(&["https://a.com".to_string()]);
        let html = ensure_min_citations("Plain text block", &citations, 1);
        assert!(html.starts_with("Plain text block"));
        assert_eq!(anchor_count(&html), 1);
    }

    #[test]
    fn test_min_citations_noop_when_already_met() {
        let citations = normalize_citations(&["https://a.com".to_string()]);
        let html = "<p>See <a href=\"https://x.com\">x</a>.</p>";
        assert_eq!(ensure_min_citations(html, &citations, 1), html);
    }

    #[test]
    fn test_source_domains_limit() {
        let citations = normalize_citations(&[
            "https://a.com".to_string(),
            "https://b.com".to_string(),
            "https://c.com".to_string(),
            "https://d.com".to_string(),
        ]);
        let domains = source_domains(&citations, 3);
        assert_eq!(domains, vec!["a.com", "b.com", "c.com"]);
    }
}
