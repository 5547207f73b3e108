// src/ingest/mod.rs
pub mod accounts;
pub mod providers;
pub mod types;

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::sentiment::normalize_topic;

/// Normalize post text: decode entities, drop tags and links, unify quotes,
/// collapse whitespace. Capped at 1500 chars.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Shortened links carry no sentiment
    static RE_URL: OnceCell<Regex> = OnceCell::new();
    let re_url = RE_URL.get_or_init(|| Regex::new(r"https?://\S+").unwrap());
    out = re_url.replace_all(&out, " ").to_string();

    // 4) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 5) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Topics whose keyword occurs in `text`, case-insensitively. Returned keys
/// are normalized and keep the order of `topics`, without repeats.
pub fn match_topics(text: &str, topics: &[String]) -> Vec<String> {
    let hay = text.to_uppercase();
    let mut out: Vec<String> = Vec::new();
    for t in topics {
        let key = normalize_topic(t);
        if key.is_empty() || out.contains(&key) {
            continue;
        }
        if hay.contains(&key) {
            out.push(key);
        }
    }
    out
}
