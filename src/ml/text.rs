//! Text normalization shared by the training and serving paths.
//!
//! A fitted pipeline only works if the text it sees at inference time was
//! cleaned exactly like the text it was fitted on. Every caller goes through
//! the functions in this module; none of them re-implements a step.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Tokens kept from a page's content after stopword removal
pub const CONTENT_TOKEN_LIMIT: usize = 50;

/// English stopword set used for page content and TF-IDF tokenization
pub static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
        "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his",
        "himself", "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself",
        "they", "them", "their", "theirs", "themselves", "what", "which", "who", "whom", "this",
        "that", "that'll", "these", "those", "am", "is", "are", "was", "were", "be", "been",
        "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an", "the",
        "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
        "with", "about", "against", "between", "into", "through", "during", "before", "after",
        "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
        "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
        "any", "both", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not",
        "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will", "just", "don",
        "don't", "should", "should've", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren",
        "aren't", "couldn", "couldn't", "didn", "didn't", "doesn", "doesn't", "hadn", "hadn't",
        "hasn", "hasn't", "haven", "haven't", "isn", "isn't", "ma", "mightn", "mightn't", "mustn",
        "mustn't", "needn", "needn't", "shan", "shan't", "shouldn", "shouldn't", "wasn", "wasn't",
        "weren", "weren't", "won", "won't", "wouldn", "wouldn't",
    ]
    .into_iter()
    .collect()
});

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

static URL_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:http|ftp)s?://|www\.|\.|/").expect("valid regex"));

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Turn a URL into space-separated tokens.
///
/// `https://www.Example.com/path` and `http://www.Example.com/path` both
/// become `Example com path`.
pub fn normalize_url(url: &str) -> String {
    let stripped = url.replace("https://www.", "").replace("http://www.", "");
    let spaced = URL_SEPARATORS.replace_all(&stripped, " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean page content before it enters a model.
///
/// Steps, in order: drop stopwords (case-sensitive, on whitespace tokens),
/// keep the first [`CONTENT_TOKEN_LIMIT`] tokens, strip everything that is
/// neither a word character nor whitespace, lowercase. Tokens left empty by
/// the strip are dropped. Training rows and the inference row both go
/// through this function.
pub fn normalize_content(text: &str) -> String {
    let kept = text
        .split_whitespace()
        .filter(|token| !is_stopword(token))
        .take(CONTENT_TOKEN_LIMIT)
        .collect::<Vec<_>>()
        .join(" ");
    let stripped = NON_WORD.replace_all(&kept, "");
    stripped.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean raw page text at extraction time (no truncation).
///
/// Strips non-word characters and lowercases before dropping stopwords.
pub fn clean_page_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, "");
    stripped
        .split_whitespace()
        .filter(|token| !is_stopword(token))
        .collect::<Vec<_>>()
        .join(" ")
}
