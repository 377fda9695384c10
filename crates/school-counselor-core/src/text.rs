//! Small text helpers shared by the classifier, link attachment, and page filter.

/// Lowercase and fold typographic apostrophes so `what’s` matches `what's`.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

/// Word-boundary keyword test on already-normalized text.
///
/// `term` must start at a word boundary. It must end at a word boundary,
/// optionally after a plural `s` / `es` suffix, so `course` matches
/// `courses` but `class` does not match `classic`. Terms may contain
/// spaces and punctuation (`"at glhs"`, `"what's up"`).
pub fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(term) {
        let start = from + pos;
        let end = start + term.len();
        if starts_at_boundary(haystack, start) && ends_at_boundary(haystack, end) {
            return true;
        }
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// True when any of `terms` matches per [`contains_term`].
pub fn contains_any<S: AsRef<str>>(haystack: &str, terms: &[S]) -> bool {
    terms.iter().any(|t| contains_term(haystack, t.as_ref()))
}

/// Number of distinct `terms` that match.
pub fn count_matches<S: AsRef<str>>(haystack: &str, terms: &[S]) -> usize {
    terms
        .iter()
        .filter(|t| contains_term(haystack, t.as_ref()))
        .count()
}

/// Whitespace-separated word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn starts_at_boundary(haystack: &str, start: usize) -> bool {
    haystack[..start]
        .chars()
        .next_back()
        .map_or(true, |c| !is_word_char(c))
}

fn ends_at_boundary(haystack: &str, end: usize) -> bool {
    let rest = &haystack[end..];
    let rest = rest
        .strip_prefix("es")
        .filter(|r| r.chars().next().map_or(true, |c| !is_word_char(c)))
        .or_else(|| rest.strip_prefix('s'))
        .unwrap_or(rest);
    rest.chars().next().map_or(true, |c| !is_word_char(c))
}
