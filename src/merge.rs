use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::domain::normalize_domain;
use crate::store::RecordStore;

/// One detail page's extraction output. Website order is discovery order;
/// the first entry is the primary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailResult {
    #[serde(default)]
    pub detail_url: String,
    #[serde(rename = "entryIndex", default)]
    pub entry_index: Option<usize>,
    #[serde(default)]
    pub websites: Vec<String>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

/// Key raw dataset items back to store rows: the echoed `entryIndex` when
/// valid, else the `detail_url` looked up in the store. Items matching
/// neither are dropped.
pub fn index_results(items: &[Value], store: &RecordStore) -> HashMap<usize, DetailResult> {
    let mut by_row = HashMap::new();
    for item in items {
        let result: DetailResult = match serde_json::from_value(item.clone()) {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping malformed result item: {e}");
                continue;
            }
        };
        let row = result
            .entry_index
            .filter(|&i| i < store.len())
            .or_else(|| store.find_by("detail_url", &result.detail_url));
        match row {
            Some(i) => {
                by_row.insert(i, result);
            }
            None => warn!("no record matches result for {:?}", result.detail_url),
        }
    }
    by_row
}

/// Merge extraction results into the store.
///
/// Websites: when the result found any, the first becomes the primary URL
/// (with its normalized domain); more than one also fills the count and the
/// pipe-joined "all" fields. A result with no websites leaves the existing
/// primary untouched. Phone and address fill only currently-empty fields.
///
/// Returns how many records went from no primary website to having one.
pub fn apply(store: &mut RecordStore, results: &HashMap<usize, DetailResult>) -> usize {
    let mut rows: Vec<usize> = results.keys().copied().collect();
    rows.sort_unstable();

    let mut gained = 0;
    for row in rows {
        let result = &results[&row];
        let websites = dedupe(&result.websites);

        if let Some(primary) = websites.first() {
            let was_missing = store.get(row, "website_url_primary").is_empty();
            store.set(row, "website_url_primary", primary.clone());
            store.set(row, "website_domain_primary", normalize_domain(primary));
            if websites.len() > 1 {
                let domains: Vec<String> =
                    websites.iter().map(|w| normalize_domain(w)).collect();
                store.set(row, "website_count", websites.len().to_string());
                store.set(row, "website_urls_all", websites.join("|"));
                store.set(row, "website_domains_all", domains.join("|"));
            }
            if was_missing {
                gained += 1;
            }
        }

        if !result.phone.is_empty() && store.get(row, "phone").is_empty() {
            store.set(row, "phone", result.phone.clone());
        }
        if !result.address.is_empty() && store.get(row, "address").is_empty() {
            store.set(row, "address", result.address.clone());
        }
    }
    gained
}

fn dedupe(urls: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.iter()
        .filter(|u| !u.trim().is_empty())
        .filter(|u| seen.insert(u.as_str()))
        .cloned()
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BASE_COLUMNS, ENRICH_COLUMNS};
    use serde_json::json;

    fn store_with_rows(n: usize) -> RecordStore {
        let mut store = RecordStore::new("unused.csv", &BASE_COLUMNS);
        store.ensure_columns(&ENRICH_COLUMNS);
        for i in 0..n {
            store.push(&[
                ("company_name", format!("Company {i}")),
                ("detail_url", format!("https://dir.example/{i}")),
            ]);
        }
        store
    }

    fn result(websites: &[&str], phone: &str, address: &str) -> DetailResult {
        DetailResult {
            websites: websites.iter().map(|w| w.to_string()).collect(),
            phone: phone.into(),
            address: address.into(),
            ..Default::default()
        }
    }

    #[test]
    fn first_website_becomes_primary_with_domain() {
        let mut store = store_with_rows(2);
        let results = HashMap::from([(1, result(&["http://Foo.com"], "", ""))]);
        assert_eq!(apply(&mut store, &results), 1);
        assert_eq!(store.get(1, "website_url_primary"), "http://Foo.com");
        assert_eq!(store.get(1, "website_domain_primary"), "foo.com");
        // Single website: no multi-website fields.
        assert_eq!(store.get(1, "website_count"), "");
        assert_eq!(store.get(0, "website_url_primary"), "");
    }

    #[test]
    fn multiple_websites_fill_count_and_joined_fields() {
        let mut store = store_with_rows(1);
        let results = HashMap::from([(
            0,
            result(&["https://www.a.com/x", "https://b.net"], "", ""),
        )]);
        apply(&mut store, &results);
        assert_eq!(store.get(0, "website_count"), "2");
        assert_eq!(
            store.get(0, "website_urls_all"),
            "https://www.a.com/x|https://b.net"
        );
        assert_eq!(store.get(0, "website_domains_all"), "a.com|b.net");
    }

    #[test]
    fn empty_result_never_blanks_existing_primary() {
        let mut store = store_with_rows(1);
        store.set(0, "website_url_primary", "https://kept.com");
        let results = HashMap::from([(0, result(&[], "", ""))]);
        assert_eq!(apply(&mut store, &results), 0);
        assert_eq!(store.get(0, "website_url_primary"), "https://kept.com");
    }

    #[test]
    fn phone_and_address_fill_only_if_empty() {
        let mut store = store_with_rows(1);
        store.set(0, "phone", "555-1234");

        let results = HashMap::from([(0, result(&[], "", "12 Main St"))]);
        apply(&mut store, &results);
        assert_eq!(store.get(0, "phone"), "555-1234");
        assert_eq!(store.get(0, "address"), "12 Main St");

        // A competing non-empty phone still loses to the present value.
        let results = HashMap::from([(0, result(&[], "555-9999", "99 Other Rd"))]);
        apply(&mut store, &results);
        assert_eq!(store.get(0, "phone"), "555-1234");
        assert_eq!(store.get(0, "address"), "12 Main St");
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let mut store = store_with_rows(1);
        let results = HashMap::from([(
            0,
            result(&["https://a.com", "https://b.com"], "555-0000", "Somewhere"),
        )]);
        let first = apply(&mut store, &results);
        let snapshot: Vec<String> = store
            .columns()
            .iter()
            .map(|c| store.get(0, c).to_string())
            .collect();
        let second = apply(&mut store, &results);
        let again: Vec<String> = store
            .columns()
            .iter()
            .map(|c| store.get(0, c).to_string())
            .collect();
        assert_eq!(first, 1);
        assert_eq!(second, 0);
        assert_eq!(snapshot, again);
    }

    #[test]
    fn duplicate_websites_collapse() {
        let mut store = store_with_rows(1);
        let results = HashMap::from([(
            0,
            result(&["https://a.com", "https://a.com", "https://b.com"], "", ""),
        )]);
        apply(&mut store, &results);
        assert_eq!(store.get(0, "website_count"), "2");
        assert_eq!(store.get(0, "website_urls_all"), "https://a.com|https://b.com");
    }

    #[test]
    fn items_key_by_index_with_url_fallback() {
        let store = store_with_rows(3);
        let items = vec![
            json!({ "entryIndex": 2, "websites": ["https://x.com"] }),
            // No index: matched through the store's detail_url column.
            json!({ "detail_url": "https://dir.example/0", "websites": ["https://y.com"] }),
            // Out-of-range index and unknown URL: dropped.
            json!({ "entryIndex": 99, "detail_url": "https://nowhere.example" }),
        ];
        let by_row = index_results(&items, &store);
        assert_eq!(by_row.len(), 2);
        assert_eq!(by_row[&2].websites, vec!["https://x.com"]);
        assert_eq!(by_row[&0].websites, vec!["https://y.com"]);
    }

    #[test]
    fn malformed_items_are_skipped() {
        let store = store_with_rows(1);
        let items = vec![
            json!({ "entryIndex": 0, "websites": "not-an-array" }),
            json!({ "entryIndex": 0, "websites": ["https://ok.com"] }),
        ];
        let by_row = index_results(&items, &store);
        assert_eq!(by_row[&0].websites, vec!["https://ok.com"]);
    }
}
