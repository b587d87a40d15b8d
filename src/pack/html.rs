//! Rich-text cleanup for extracted description fields.
//!
//! Description HTML pulled from the storage engine accumulates copy-paste
//! artifacts and inconsistent whitespace. The cleanup normalizer wraps bare
//! text in a paragraph, strips span wrapper artifacts while preserving their
//! inner text, then applies a fixed sequence of textual touch-ups. The
//! sequence is deliberately textual, not a DOM pass: the fields hold
//! fragments, not documents.

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Compiled patterns for the cleanup sequence.
struct HtmlPatterns {
    block_open: Regex,
    styled_span: Regex,
    id_span: Regex,
    bare_br: Regex,
    bare_hr: Regex,
    nbsp: Regex,
    space_runs: Regex,
    empty_paragraph: Regex,
    paragraph_open_space: Regex,
    paragraph_close_space: Regex,
    bold_open_space: Regex,
    bold_close_space: Regex,
    bold_then_word: Regex,
}

impl HtmlPatterns {
    fn new() -> Self {
        Self {
            // Block containers that make a leading <p> wrapper unnecessary
            block_open: Regex::new(r"^<(?:p|h[1-6]|ol|ul|table|div|blockquote|section|figure|hr)[\s>/]").unwrap(),
            // Copy-pasted span wrappers; inner text survives, trimmed
            styled_span: Regex::new(r#"<span style="[^"]*">([^<]*)</span>"#).unwrap(),
            id_span: Regex::new(r#"<span id="[^"]*">([^<]*)</span>"#).unwrap(),
            bare_br: Regex::new(r"<br\s*/?>").unwrap(),
            bare_hr: Regex::new(r"<hr\s*/?>").unwrap(),
            nbsp: Regex::new(r"&nbsp;").unwrap(),
            space_runs: Regex::new(r" {2,}").unwrap(),
            empty_paragraph: Regex::new(r"<p>\s*</p>").unwrap(),
            paragraph_open_space: Regex::new(r"<p>\s+").unwrap(),
            paragraph_close_space: Regex::new(r"\s+</p>").unwrap(),
            bold_open_space: Regex::new(r"<strong>\s+").unwrap(),
            bold_close_space: Regex::new(r"\s+</strong>").unwrap(),
            bold_then_word: Regex::new(r"</strong>(\w)").unwrap(),
        }
    }
}

fn patterns() -> &'static HtmlPatterns {
    static PATTERNS: OnceLock<HtmlPatterns> = OnceLock::new();
    PATTERNS.get_or_init(HtmlPatterns::new)
}

/// Normalize one rich-text description fragment.
pub fn clean_html(input: &str) -> String {
    let p = patterns();
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut text = if p.block_open.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("<p>{trimmed}</p>")
    };

    text = p
        .styled_span
        .replace_all(&text, |caps: &Captures| caps[1].trim().to_string())
        .into_owned();
    text = p
        .id_span
        .replace_all(&text, |caps: &Captures| caps[1].trim().to_string())
        .into_owned();

    text = p.bare_br.replace_all(&text, "<br />").into_owned();
    text = p.bare_hr.replace_all(&text, "<hr />").into_owned();
    text = p.nbsp.replace_all(&text, " ").into_owned();
    text = p.space_runs.replace_all(&text, " ").into_owned();
    text = p.empty_paragraph.replace_all(&text, "").into_owned();
    text = p.paragraph_open_space.replace_all(&text, "<p>").into_owned();
    text = p.paragraph_close_space.replace_all(&text, "</p>").into_owned();
    text = p.bold_open_space.replace_all(&text, "<strong>").into_owned();
    text = p.bold_close_space.replace_all(&text, "</strong>").into_owned();
    text = p.bold_then_word.replace_all(&text, "</strong> $1").into_owned();

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_text_wrapped() {
        assert_eq!(clean_html("A simple line."), "<p>A simple line.</p>");
    }

    #[test]
    fn test_block_wrapped_text_untouched_by_wrapper() {
        assert_eq!(clean_html("<p>Already wrapped.</p>"), "<p>Already wrapped.</p>");
        assert_eq!(clean_html("<h2>Heading</h2>"), "<h2>Heading</h2>");
    }

    #[test]
    fn test_span_artifacts_stripped() {
        assert_eq!(
            clean_html(r#"<p><span style="color: #000"> pasted </span>text</p>"#),
            "<p>pastedtext</p>"
        );
        assert_eq!(
            clean_html(r#"<p><span id="ctl00_content">inner</span></p>"#),
            "<p>inner</p>"
        );
    }

    #[test]
    fn test_self_closing_br_and_hr() {
        assert_eq!(clean_html("<p>a<br>b</p>"), "<p>a<br />b</p>");
        assert_eq!(clean_html("<p>a</p><hr><p>b</p>"), "<p>a</p><hr /><p>b</p>");
    }

    #[test]
    fn test_nbsp_and_space_runs_collapsed() {
        assert_eq!(clean_html("<p>a&nbsp;&nbsp;b   c</p>"), "<p>a b c</p>");
    }

    #[test]
    fn test_empty_paragraphs_removed() {
        assert_eq!(clean_html("<p>a</p><p>  </p><p>b</p>"), "<p>a</p><p>b</p>");
    }

    #[test]
    fn test_paragraph_boundary_whitespace() {
        assert_eq!(clean_html("<p>  a  </p>"), "<p>a</p>");
    }

    #[test]
    fn test_bold_whitespace_normalized() {
        assert_eq!(clean_html("<p><strong> Bold </strong>text</p>"), "<p><strong>Bold</strong> text</p>");
    }

    #[test]
    fn test_bold_close_followed_by_word_gets_space() {
        assert_eq!(clean_html("<p><strong>Range</strong>30 feet</p>"), "<p><strong>Range</strong> 30 feet</p>");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(clean_html("   "), "");
    }

    #[test]
    fn test_idempotent() {
        let messy = r#"<p><strong> Frequency </strong>once per day<br>Effect&nbsp;lasts</p>"#;
        let once = clean_html(messy);
        assert_eq!(clean_html(&once), once);
    }
}
