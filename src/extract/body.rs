use once_cell::sync::Lazy;
use regex::Regex;

/// A run of five or more letters, i.e. something that reads like a word
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z]{5,}").expect("word pattern"));

/// Separator used between handle and relative time in post headers
const HEADER_SEPARATOR: char = '·';

/// Classifies located body text
///
/// Returns `None` when the text looks like a mis-captured header or metadata
/// line rather than the post body. Otherwise the trimmed text is returned;
/// located-but-empty text stays `Some("")`.
///
/// # Arguments
///
/// * `text` - The text of the element the body strategies resolved
/// * `author` - The record's author handle, if known
pub fn classify_body(text: &str, author: Option<&str>) -> Option<String> {
    let text = text.trim();
    if is_header_like(text, author) {
        None
    } else {
        Some(text.to_string())
    }
}

/// Returns true for short separator-only strings and author header lines
///
/// A text is header-like when it is shorter than 30 characters, contains a `·`
/// or a line break and no five-letter word, or when it starts with the author
/// handle and is shorter than 50 characters.
pub fn is_header_like(text: &str, author: Option<&str>) -> bool {
    let len = text.chars().count();

    let has_separator = text.contains(HEADER_SEPARATOR) || text.contains('\n');
    if len < 30 && has_separator && !WORD_RE.is_match(text) {
        return true;
    }

    match author {
        Some(author) if !author.is_empty() => text.starts_with(author) && len < 50,
        _ => false,
    }
}
