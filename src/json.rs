//! JSON decoding with readable failure messages.
//!
//! Both the row dump and pageviews responses are decoded through
//! [`parse_json_with_context`], so a bad field reports its path and the text
//! around the offending column instead of a bare serde message.

use anyhow::Result;

/// Deserialize `body`, and on failure describe where and why it failed.
pub fn parse_json_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(jd).map_err(|err| {
        let inner = err.inner();
        let (line, column) = (inner.line(), inner.column());
        let path = err.path().to_string();

        let msg = inner.to_string();
        let loc = format!(" at line {line} column {column}");
        let reason = describe_mismatch(msg.strip_suffix(&loc).unwrap_or(&msg));

        let mut out = String::new();
        if !path.is_empty() && path != "." {
            out.push_str(&format!("at path '{path}': "));
        }
        out.push_str(&format!(
            "{reason} (line {line} col {column})\n{}",
            snippet_around(body, line, column, 20)
        ));
        anyhow::anyhow!(out)
    })
}

/// Rephrase serde's "invalid type: X, expected Y" as "expected Y, got X".
fn describe_mismatch(msg: &str) -> String {
    if let Some(rest) = msg.strip_prefix("invalid type: ")
        && let Some((actual, expected)) = rest.split_once(", expected ")
    {
        return format!("expected {}, got {}", expected.trim(), actual);
    }
    msg.to_string()
}

/// A window of `width` characters around the error column with a caret under it.
///
/// Works on chars rather than bytes; titles are routinely non-ASCII.
fn snippet_around(body: &str, line: usize, column: usize, width: usize) -> String {
    let target: Vec<char> = body
        .lines()
        .nth(line.saturating_sub(1))
        .unwrap_or("")
        .chars()
        .collect();
    if target.is_empty() {
        return "(empty line)".to_string();
    }

    let error_idx = column.saturating_sub(1).min(target.len() - 1);
    let start = error_idx.saturating_sub(width / 2);
    let end = (error_idx + width / 2).min(target.len());
    let slice: String = target[start..end].iter().collect();
    let caret = " ".repeat(error_idx - start) + "^";

    format!("...{slice}...\n   {caret}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Item {
        #[allow(dead_code)]
        article: String,
        #[allow(dead_code)]
        views: u64,
    }

    #[derive(Debug, Deserialize)]
    struct Body {
        #[allow(dead_code)]
        items: Vec<Item>,
    }

    #[test]
    fn test_describe_mismatch_invalid_type() {
        assert_eq!(
            describe_mismatch("invalid type: null, expected a string"),
            "expected a string, got null"
        );
    }

    #[test]
    fn test_describe_mismatch_passthrough() {
        assert_eq!(describe_mismatch("expected value"), "expected value");
    }

    #[test]
    fn test_parse_reports_field_path() {
        let body = r#"{"items": [{"article": "Foo", "views": "many"}]}"#;
        let err = parse_json_with_context::<Body>(body).unwrap_err().to_string();
        assert!(err.contains("items[0].views"), "{err}");
        assert!(err.contains("expected") && err.contains("got"), "{err}");
    }

    #[test]
    fn test_parse_negative_views_rejected() {
        let body = r#"{"items": [{"article": "Foo", "views": -3}]}"#;
        assert!(parse_json_with_context::<Body>(body).is_err());
    }

    #[test]
    fn test_snippet_handles_multibyte_characters() {
        let body = r#"{"items": [{"article": "Ünïcødé_Tïtlé", "views": null}]}"#;
        let err = parse_json_with_context::<Body>(body).unwrap_err().to_string();
        assert!(err.contains('^'), "{err}");
    }

    #[test]
    fn test_parse_valid_body() {
        let body = r#"{"items": [{"article": "Foo", "views": 3}]}"#;
        let parsed: Body = parse_json_with_context(body).unwrap();
        assert_eq!(parsed.items.len(), 1);
    }
}
