// src/ingest/mod.rs
pub mod rss;

use crate::dedup::DedupStore;
use crate::model::Article;
use anyhow::Result;
use std::collections::HashSet;

/// Anything that can hand the pipeline a batch of candidate articles.
///
/// Must be safe to call repeatedly; each call is one fetch of the current feed
/// window.
#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Article>>;
    fn name(&self) -> &str;
}

/// Normalize feed text: decode entities, strip tags, straighten quotes,
/// collapse whitespace, cap at 1500 chars.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }
    out
}

/// Splits a fetched batch into articles never surfaced before.
///
/// Drops ids already in `store` and repeated ids inside the batch (first one
/// wins). Does not mark anything; the caller decides when ids become seen.
/// Returns (fresh, skipped).
pub fn filter_unseen(articles: Vec<Article>, store: &dyn DedupStore) -> (Vec<Article>, usize) {
    let mut batch_ids: HashSet<String> = HashSet::with_capacity(articles.len());
    let mut fresh = Vec::with_capacity(articles.len());
    let mut skipped = 0usize;

    for a in articles {
        if store.has_seen(&a.id) || !batch_ids.insert(a.id.clone()) {
            skipped += 1;
            continue;
        }
        fresh.push(a);
    }
    (fresh, skipped)
}
