use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, PartialEq)]
pub enum TextOrUrl {
    Text(String),
    Url(String),
}

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b((?:https?://|www\d{0,3}[.]|[a-z0-9.\-]+[.][a-z]{2,4}/)(?:[^\s()<>]+|\(([^\s()<>]+|(\([^\s()<>]+\)))*\))+(?:\(([^\s()<>]+|(\([^\s()<>]+\)))*\)|[^\s`!()\[\]{};:'".,<>?«»“”‘’]))"#)
        .expect("URL pattern is valid")
});

/// Splits a text message into plain runs and links. Links without a scheme
/// get `https://` so they open in a browser.
pub fn parse_text_for_urls(text: &str) -> Vec<TextOrUrl> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for found in URL_REGEX.find_iter(text) {
        if found.start() > cursor {
            segments.push(TextOrUrl::Text(text[cursor..found.start()].to_string()));
        }
        let link = found.as_str();
        let url = if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else {
            format!("https://{link}")
        };
        segments.push(TextOrUrl::Url(url));
        cursor = found.end();
    }

    if cursor < text.len() {
        segments.push(TextOrUrl::Text(text[cursor..].to_string()));
    }
    segments
}
