use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Extract and parse the first top-level JSON value from a model response.
///
/// Models wrap JSON in prose or code fences often enough that parsing the
/// raw text directly is hopeless; instead, the first balanced `{...}` or
/// `[...]` block is located (string- and escape-aware) and parsed.
pub fn extract_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let block = first_json_block(raw).ok_or_else(|| {
        Error::MalformedOutput(format!(
            "no JSON object or array found in response: {}",
            truncate(raw, 200)
        ))
    })?;
    serde_json::from_str(block)
        .map_err(|e| Error::MalformedOutput(format!("{} in: {}", e, truncate(block, 200))))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn first_json_block(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{' || b == b'[')?;
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        name: String,
        count: u32,
    }

    #[test]
    fn test_clean_json() {
        let parsed: Payload = extract_json(r#"{"name": "acme", "count": 3}"#).unwrap();
        assert_eq!(parsed, Payload { name: "acme".to_string(), count: 3 });
    }

    #[test]
    fn test_json_in_code_fence() {
        let raw = "```json\n{\"name\": \"acme\", \"count\": 3}\n```";
        let parsed: Payload = extract_json(raw).unwrap();
        assert_eq!(parsed.name, "acme");
    }

    #[test]
    fn test_json_wrapped_in_prose() {
        let raw = "Here is the data you asked for:\n{\"name\": \"acme\", \"count\": 3}\nLet me know if you need anything else.";
        let parsed: Payload = extract_json(raw).unwrap();
        assert_eq!(parsed.count, 3);
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_scanner() {
        let raw = r#"{"name": "ac{me}", "count": 1}"#;
        let parsed: Payload = extract_json(raw).unwrap();
        assert_eq!(parsed.name, "ac{me}");
    }

    #[test]
    fn test_array_extraction() {
        let raw = "sure: [1, 2, 3] done";
        let parsed: Vec<u32> = extract_json(raw).unwrap();
        assert_eq!(parsed, vec![1, 2, 3]);
    }

    #[test]
    fn test_unparseable_text_is_malformed_output() {
        let err = extract_json::<Payload>("I could not find any information.").unwrap_err();
        assert!(matches!(err, Error::MalformedOutput(_)));
    }

    #[test]
    fn test_wrong_shape_is_malformed_output() {
        let err = extract_json::<Payload>(r#"{"unexpected": true}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedOutput(_)));
    }
}
