/// Candidate lookup keys for a piece of thinking text, most-specific first.
///
/// The cache is keyed by raw text at write time but upstream models echo
/// text back with cosmetic differences (trailing whitespace, markdown
/// emphasis stripped) on continuation, so reads probe several normalized
/// variants. Returns at most 3 distinct, non-empty strings.
pub fn normalize_text_variants(text: &str) -> Vec<String> {
    let mut variants = Vec::with_capacity(3);
    let mut seen = std::collections::HashSet::new();

    let mut push = |s: String| {
        if !s.is_empty() && seen.insert(s.clone()) {
            variants.push(s);
        }
    };

    push(text.to_string());

    let trimmed = text.trim().to_string();
    push(trimmed.clone());

    let whitespace_collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
    push(strip_markdown_emphasis(&whitespace_collapsed));

    variants
}

/// Strips the lightweight markdown emphasis markers models sometimes add or
/// drop on re-emission (`**bold**`, `*italic*`, `` `code` ``) without
/// attempting full markdown parsing.
fn strip_markdown_emphasis(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '*' | '_' | '`'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_deduplicate_when_already_normalized() {
        let variants = normalize_text_variants("plain text");
        assert_eq!(variants, vec!["plain text".to_string()]);
    }

    #[test]
    fn variants_include_trimmed_and_markdown_stripped() {
        let variants = normalize_text_variants("  **bold**  thought  ");
        assert!(variants.contains(&"  **bold**  thought  ".to_string()));
        assert!(variants.contains(&"**bold**  thought".to_string()));
        assert!(variants.iter().any(|v| !v.contains('*')));
    }

    #[test]
    fn empty_text_yields_no_variants() {
        assert!(normalize_text_variants("   ").is_empty());
    }
}
