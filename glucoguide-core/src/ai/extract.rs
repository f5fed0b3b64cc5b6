//! Pulls the JSON object out of free-form model output.

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Returns the JSON candidate inside `text`.
///
/// A fenced ```` ```json ```` block wins; otherwise the span from the first `{`
/// to the last `}` is returned. `None` when neither is present.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find(FENCE_OPEN) {
        let body = &text[start + FENCE_OPEN.len()..];
        if let Some(end) = body.find(FENCE_CLOSE) {
            return Some(body[..end].trim());
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Removes a leading ```` ```json ```` and trailing ```` ``` ```` if present.
pub fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix(FENCE_OPEN).unwrap_or(text);
    let text = text.strip_prefix(FENCE_CLOSE).unwrap_or(text);
    text.strip_suffix(FENCE_CLOSE).unwrap_or(text).trim()
}

/// First `limit` characters of `text`, for error messages.
pub fn snippet(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block() {
        let text = "Here you go:\n```json\n{\"gi\": 38}\n```\nEnjoy!";
        assert_eq!(extract_json(text), Some("{\"gi\": 38}"));
    }

    #[test]
    fn test_outermost_braces() {
        let text = "Sure! {\"food\": \"apple\", \"extra\": {\"a\": 1}} hope that helps";
        assert_eq!(
            extract_json(text),
            Some("{\"food\": \"apple\", \"extra\": {\"a\": 1}}")
        );
    }

    #[test]
    fn test_no_json() {
        assert_eq!(extract_json("I cannot help with that."), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_snippet_respects_char_boundaries() {
        assert_eq!(snippet("héllo", 2), "hé");
        assert_eq!(snippet("hi", 200), "hi");
    }
}
